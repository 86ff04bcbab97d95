#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "macos")]
mod macos;

use super::TrayUpdate;
use crate::menu::builder::MenuDeps;
use crate::menu::router::EventRouter;
use anyhow::Result;
use std::sync::mpsc::Receiver;
use tokio::sync::broadcast;
use tray_icon::{Icon, TrayIcon};

/// Rebuild the menu so checkmarks and folder entries reflect the current
/// state. Runs on the tray thread, which owns the handle and the router.
pub(crate) fn refresh_menu(tray_icon: &TrayIcon, deps: &MenuDeps, router: &mut EventRouter) {
    match crate::menu::builder::build_menu(deps) {
        Ok((menu, new_router)) => {
            tray_icon.set_menu(Some(Box::new(menu)));
            *router = new_router;
        }
        Err(e) => log::warn!("Failed to rebuild menu: {}", e),
    }
}

/// The tray lives on a platform-owned thread; this is just a liveness token.
pub enum PlatformTray {
    #[cfg(target_os = "linux")]
    Linux,
    #[cfg(not(target_os = "linux"))]
    Detached,
}

#[cfg(target_os = "linux")]
pub fn create_tray(
    deps: MenuDeps,
    shutdown_tx: broadcast::Sender<()>,
    updates: Receiver<TrayUpdate>,
    icon: Icon,
) -> Result<PlatformTray> {
    linux::create_tray(deps, shutdown_tx, updates, icon)?;
    Ok(PlatformTray::Linux)
}

#[cfg(target_os = "windows")]
pub fn create_tray(
    deps: MenuDeps,
    shutdown_tx: broadcast::Sender<()>,
    updates: Receiver<TrayUpdate>,
    icon: Icon,
) -> Result<PlatformTray> {
    windows::create_tray(deps, shutdown_tx, updates, icon)?;
    Ok(PlatformTray::Detached)
}

#[cfg(target_os = "macos")]
pub fn create_tray(
    deps: MenuDeps,
    shutdown_tx: broadcast::Sender<()>,
    updates: Receiver<TrayUpdate>,
    icon: Icon,
) -> Result<PlatformTray> {
    macos::create_tray(deps, shutdown_tx, updates, icon)?;
    Ok(PlatformTray::Detached)
}
