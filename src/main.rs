use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempo_tray::animation::{self, AnimationEngine, EngineConfig};
use tempo_tray::config::Settings;
use tempo_tray::menu::builder::MenuDeps;
use tempo_tray::metrics::Sampler;
use tempo_tray::timer::CountdownTimer;
use tempo_tray::tray::{self, TrayManager};
use tempo_tray::paths;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting Tempo Tray...");

    let settings_path = paths::settings_path()?;
    let settings = Settings::load(&settings_path).unwrap_or_else(|e| {
        log::warn!("Failed to load settings, using defaults: {}", e);
        Settings::default()
    });

    let animations_root = paths::animations_dir()?;
    std::fs::create_dir_all(&animations_root)?;

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    // Two warm-up samples before anything renders, so the first CPU reading
    // is never the artificial 0%.
    let mut sampler = Sampler::new();
    sampler.warm_up().await;
    let metrics = sampler.spawn_refresh_loop();

    let timer = CountdownTimer::new(Duration::from_secs(settings.pomodoro_minutes * 60));

    let (sink, updates) = tray::update_channel();
    let engine = AnimationEngine::new(
        EngineConfig::from_settings(&settings, animations_root.clone()),
        metrics.clone(),
        timer.clone(),
        Box::new(sink.clone()),
    );
    let engine_handle = animation::spawn_engine(engine);

    tray::spawn_tooltip_task(metrics, timer.clone(), sink);

    let deps = MenuDeps {
        engine: engine_handle.clone(),
        timer,
        settings: Arc::new(Mutex::new(settings)),
        settings_path,
        animations_root,
    };
    let _tray = TrayManager::new(deps, shutdown_tx, updates)?;

    log::info!("Tempo Tray started");

    shutdown_rx.recv().await.ok();
    engine_handle.shutdown();
    log::info!("Shutdown signal received, exiting...");
    Ok(())
}
