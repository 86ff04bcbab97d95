use crate::menu::builder::MenuDeps;
use crate::menu::router::{EventRouter, HandlerResult};
use crate::tray::TrayUpdate;
use anyhow::Result;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tokio::sync::broadcast;
use tray_icon::menu::MenuEvent;
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

const POLL_INTERVAL: Duration = Duration::from_millis(30);

pub fn create_tray(
    deps: MenuDeps,
    shutdown_tx: broadcast::Sender<()>,
    updates: Receiver<TrayUpdate>,
    icon: Icon,
) -> Result<()> {
    // Everything runs on a dedicated thread: menu handlers use the blocking
    // engine handle calls, which must never run on a runtime thread, and the
    // tray handle must stay on the thread that created it.
    std::thread::spawn(move || {
        if let Err(e) = run_tray_loop(deps, shutdown_tx, updates, icon) {
            log::error!("Tray thread failed: {}", e);
        }
    });

    Ok(())
}

fn run_tray_loop(
    deps: MenuDeps,
    shutdown_tx: broadcast::Sender<()>,
    updates: Receiver<TrayUpdate>,
    icon: Icon,
) -> Result<()> {
    let (menu, mut router) = crate::menu::builder::build_menu(&deps)?;

    let tray_icon = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip("Tempo Tray")
        .with_icon(icon)
        .build()?;

    let menu_receiver = MenuEvent::receiver();

    loop {
        pump_run_loop(POLL_INTERVAL);

        loop {
            match updates.try_recv() {
                Ok(update) => apply_update(&tray_icon, update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        while let Ok(event) = menu_receiver.try_recv() {
            if handle_menu_event(&event.id.0, &router, &shutdown_tx) {
                return Ok(());
            }
            if crate::menu::builder::event_refreshes_menu(&event.id.0) {
                super::refresh_menu(&tray_icon, &deps, &mut router);
            }
        }
    }
}

/// Run one NSRunLoop slice so AppKit can deliver status item events.
fn pump_run_loop(duration: Duration) {
    use objc2::rc::Retained;
    use objc2::runtime::AnyObject;
    use objc2::{class, msg_send};

    unsafe {
        let run_loop: Retained<AnyObject> = msg_send![class!(NSRunLoop), currentRunLoop];
        let mode: Retained<AnyObject> = msg_send![
            class!(NSString),
            stringWithUTF8String: b"kCFRunLoopDefaultMode\0".as_ptr()
        ];
        let date: Retained<AnyObject> = msg_send![
            class!(NSDate),
            dateWithTimeIntervalSinceNow: duration.as_secs_f64()
        ];
        let _: bool = msg_send![&run_loop, runMode: &*mode, beforeDate: &*date];
    }
}

fn apply_update(tray_icon: &TrayIcon, update: TrayUpdate) {
    let result = match update {
        TrayUpdate::Icon(icon) => tray_icon.set_icon(Some(icon)),
        TrayUpdate::Tooltip(text) => tray_icon.set_tooltip(Some(text)),
    };
    if let Err(e) = result {
        log::warn!("Failed to update tray: {}", e);
    }
}

fn handle_menu_event(
    event_id: &str,
    router: &EventRouter,
    shutdown_tx: &broadcast::Sender<()>,
) -> bool {
    log::debug!("Menu event: {}", event_id);

    let result = router.route(event_id);
    if let Err(e) = &result {
        log::error!("Error handling menu event: {}", e);
        return false;
    }

    if matches!(result, Ok(HandlerResult::Quit)) {
        log::info!("Quitting application");
        let _ = shutdown_tx.send(());
        return true;
    }

    false
}
