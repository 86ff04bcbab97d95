use super::router::{EventPattern, EventRoute, EventRouter, HandlerResult};
use crate::animation::source::{self, TOKEN_CPU, TOKEN_LOGO, TOKEN_MEM};
use crate::animation::speed::SpeedMetric;
use crate::animation::EngineHandle;
use crate::config::Settings;
use crate::paths;
use crate::timer::CountdownTimer;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tray_icon::menu::{CheckMenuItem, Menu, MenuItem, PredefinedMenuItem, Submenu};

const BUILTIN_ANIMATIONS: [(&str, &str); 3] = [
    (TOKEN_LOGO, "Logo"),
    (TOKEN_CPU, "CPU Gauge"),
    (TOKEN_MEM, "Memory Gauge"),
];

const SPEED_CHOICES: [(&str, &str); 4] = [
    ("original", "Original Speed"),
    ("cpu", "Follow CPU"),
    ("memory", "Follow Memory"),
    ("timer", "Follow Timer"),
];

/// Everything menu handlers need, cloned into each route closure.
#[derive(Clone)]
pub struct MenuDeps {
    pub engine: EngineHandle,
    pub timer: CountdownTimer,
    pub settings: Arc<Mutex<Settings>>,
    pub settings_path: PathBuf,
    pub animations_root: PathBuf,
}

pub fn build_menu(deps: &MenuDeps) -> Result<(Menu, EventRouter)> {
    let menu = Menu::new();
    let mut routes = Vec::new();

    append_timer_items(&menu, deps, &mut routes);
    let _ = menu.append(&PredefinedMenuItem::separator());

    let current = deps.engine.current_source_blocking();
    let entries = source::scan_source_entries(&deps.animations_root);

    append_animation_submenu(&menu, deps, &current, &entries, &mut routes);
    append_preview_submenu(&menu, deps, &entries, &mut routes);
    append_speed_submenu(&menu, deps, &mut routes);

    let _ = menu.append(&PredefinedMenuItem::separator());
    append_quit(&menu, deps, &mut routes);

    Ok((menu, EventRouter::new(routes)))
}

fn append_timer_items(menu: &Menu, deps: &MenuDeps, routes: &mut Vec<EventRoute>) {
    let _ = menu.append(&MenuItem::with_id("timer::start", "Start Timer", true, None));
    let _ = menu.append(&MenuItem::with_id("timer::pause", "Pause Timer", true, None));
    let _ = menu.append(&MenuItem::with_id("timer::reset", "Reset Timer", true, None));

    let timer = deps.timer.clone();
    routes.push(EventRoute {
        pattern: EventPattern::Prefix("timer::".to_string()),
        handler: Box::new(move |event_id| {
            match event_id {
                "timer::start" => timer.start(),
                "timer::pause" => timer.pause(),
                "timer::reset" => timer.reset(),
                other => log::warn!("Unknown timer event: {}", other),
            }
            Ok(HandlerResult::Continue)
        }),
    });
}

fn append_animation_submenu(
    menu: &Menu,
    deps: &MenuDeps,
    current: &str,
    entries: &[String],
    routes: &mut Vec<EventRoute>,
) {
    let submenu = Submenu::with_id("animations", "Animation", true);

    for (token, label) in BUILTIN_ANIMATIONS {
        let checked = source::identifiers_equal(current, token);
        let item = CheckMenuItem::with_id(format!("anim::{}", token), label, true, checked, None);
        let _ = submenu.append(&item);
    }

    if !entries.is_empty() {
        let _ = submenu.append(&PredefinedMenuItem::separator());
        for name in entries {
            let checked = source::identifiers_equal(current, name);
            let item = CheckMenuItem::with_id(format!("anim::{}", name), name, true, checked, None);
            let _ = submenu.append(&item);
        }
    }

    let _ = submenu.append(&PredefinedMenuItem::separator());
    let open_item = MenuItem::with_id("__open_animations__", "Open Animations Folder", true, None);
    let _ = submenu.append(&open_item);
    let _ = menu.append(&submenu);

    let select_deps = deps.clone();
    routes.push(EventRoute {
        pattern: EventPattern::Prefix("anim::".to_string()),
        handler: Box::new(move |event_id| {
            let identifier = &event_id["anim::".len()..];
            if select_deps.engine.select_source_blocking(identifier) {
                persist_settings(&select_deps, |settings| {
                    settings.animation = identifier.to_string();
                });
            } else {
                log::warn!("Keeping current animation, {:?} unusable", identifier);
            }
            Ok(HandlerResult::Continue)
        }),
    });

    let open_deps = deps.clone();
    routes.push(EventRoute {
        pattern: EventPattern::Exact("__open_animations__".to_string()),
        handler: Box::new(move |_| {
            if let Err(e) = paths::open_in_file_manager(&open_deps.animations_root) {
                log::warn!("Failed to open animations folder: {}", e);
            }
            Ok(HandlerResult::Continue)
        }),
    });
}

fn append_preview_submenu(
    menu: &Menu,
    deps: &MenuDeps,
    entries: &[String],
    routes: &mut Vec<EventRoute>,
) {
    let submenu = Submenu::with_id("preview", "Preview", true);

    for (token, label) in BUILTIN_ANIMATIONS {
        let item = MenuItem::with_id(format!("preview::{}", token), label, true, None);
        let _ = submenu.append(&item);
    }
    if !entries.is_empty() {
        let _ = submenu.append(&PredefinedMenuItem::separator());
        for name in entries {
            let item = MenuItem::with_id(format!("preview::{}", name), name, true, None);
            let _ = submenu.append(&item);
        }
    }
    let _ = submenu.append(&PredefinedMenuItem::separator());
    let stop = MenuItem::with_id("preview::__stop__", "Stop Preview", true, None);
    let _ = submenu.append(&stop);
    let _ = menu.append(&submenu);

    let engine = deps.engine.clone();
    routes.push(EventRoute {
        pattern: EventPattern::Prefix("preview::".to_string()),
        handler: Box::new(move |event_id| {
            let identifier = &event_id["preview::".len()..];
            if identifier == "__stop__" {
                engine.cancel_preview();
            } else {
                engine.start_preview(identifier);
            }
            Ok(HandlerResult::Continue)
        }),
    });
}

fn append_speed_submenu(menu: &Menu, deps: &MenuDeps, routes: &mut Vec<EventRoute>) {
    let selected = deps
        .settings
        .lock()
        .map(|s| s.speed_metric)
        .unwrap_or(SpeedMetric::MemoryPercent);

    let submenu = Submenu::with_id("speed", "Playback Speed", true);
    for (key, label) in SPEED_CHOICES {
        let checked = metric_for_key(key) == Some(selected);
        let item = CheckMenuItem::with_id(format!("speed::{}", key), label, true, checked, None);
        let _ = submenu.append(&item);
    }
    let _ = menu.append(&submenu);

    let speed_deps = deps.clone();
    routes.push(EventRoute {
        pattern: EventPattern::Prefix("speed::".to_string()),
        handler: Box::new(move |event_id| {
            let key = &event_id["speed::".len()..];
            match metric_for_key(key) {
                Some(metric) => {
                    speed_deps.engine.set_speed_metric(metric);
                    persist_settings(&speed_deps, |settings| settings.speed_metric = metric);
                }
                None => log::warn!("Unknown speed metric: {}", key),
            }
            Ok(HandlerResult::Continue)
        }),
    });
}

fn append_quit(menu: &Menu, deps: &MenuDeps, routes: &mut Vec<EventRoute>) {
    let quit_item = MenuItem::with_id("__quit__", "Quit", true, None);
    let _ = menu.append(&quit_item);

    let engine = deps.engine.clone();
    routes.push(EventRoute {
        pattern: EventPattern::Exact("__quit__".to_string()),
        handler: Box::new(move |_| {
            log::info!("Quit requested");
            engine.shutdown();
            Ok(HandlerResult::Quit)
        }),
    });
}

/// Events whose handling changes what the menu displays: the checked
/// animation, the folder-derived entry list, or the checked speed metric.
/// Platform loops rebuild the menu after routing one of these.
pub fn event_refreshes_menu(event_id: &str) -> bool {
    event_id.starts_with("anim::") || event_id.starts_with("speed::")
}

fn metric_for_key(key: &str) -> Option<SpeedMetric> {
    match key {
        "original" => Some(SpeedMetric::Original),
        "cpu" => Some(SpeedMetric::CpuPercent),
        "memory" => Some(SpeedMetric::MemoryPercent),
        "timer" => Some(SpeedMetric::TimerProgress),
        _ => None,
    }
}

fn persist_settings(deps: &MenuDeps, update: impl FnOnce(&mut Settings)) {
    let Ok(mut settings) = deps.settings.lock() else {
        return;
    };
    update(&mut settings);
    if let Err(e) = settings.save(&deps.settings_path) {
        log::warn!("Failed to save settings: {}", e);
    }
}
