use crate::menu::builder::MenuDeps;
use crate::menu::router::{EventRouter, HandlerResult};
use crate::tray::TrayUpdate;
use anyhow::Result;
use gtk::{self, glib};
use std::sync::mpsc::Receiver;
use tokio::sync::broadcast;
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

const POLL_INTERVAL_MS: u64 = 30;

pub fn create_tray(
    deps: MenuDeps,
    shutdown_tx: broadcast::Sender<()>,
    updates: Receiver<TrayUpdate>,
    icon: Icon,
) -> Result<()> {
    std::thread::spawn(move || {
        if gtk::init().is_err() {
            log::error!("Failed to initialize GTK");
            return;
        }

        let (menu, router) = match crate::menu::builder::build_menu(&deps) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Failed to build menu: {}", e);
                return;
            }
        };

        let tray_icon = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("Tempo Tray")
            .with_icon(icon)
            .build();

        let tray_icon = match tray_icon {
            Ok(icon) => icon,
            Err(e) => {
                log::error!("Failed to create tray icon: {}", e);
                return;
            }
        };

        setup_event_loop(tray_icon, deps, router, updates, shutdown_tx);
        gtk::main();
    });

    Ok(())
}

/// Poll menu events and pending tray updates from the GTK main loop. The
/// tray handle is owned by this closure, so all icon and tooltip writes
/// happen on the GTK thread.
fn setup_event_loop(
    tray_icon: TrayIcon,
    deps: MenuDeps,
    router: EventRouter,
    updates: Receiver<TrayUpdate>,
    shutdown_tx: broadcast::Sender<()>,
) {
    use tray_icon::menu::MenuEvent;

    let menu_receiver = MenuEvent::receiver();
    let mut router = router;

    glib::timeout_add_local(std::time::Duration::from_millis(POLL_INTERVAL_MS), move || {
        while let Ok(update) = updates.try_recv() {
            apply_update(&tray_icon, update);
        }

        while let Ok(event) = menu_receiver.try_recv() {
            if handle_menu_event(&event.id.0, &router, &shutdown_tx) {
                return glib::ControlFlow::Break;
            }
            if crate::menu::builder::event_refreshes_menu(&event.id.0) {
                super::refresh_menu(&tray_icon, &deps, &mut router);
            }
        }
        glib::ControlFlow::Continue
    });
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

    let should_quit = matches!(result, Ok(HandlerResult::Quit));
    if !should_quit {
        return false;
    }

    log::info!("Quitting application");
    gtk::main_quit();
    let _ = shutdown_tx.send(());
    true
}
