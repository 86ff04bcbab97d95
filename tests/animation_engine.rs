use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tempo_tray::animation::decoder::Frame;
use tempo_tray::animation::source::{TOKEN_CPU, TOKEN_LOGO};
use tempo_tray::animation::{spawn_engine, AnimationEngine, EngineConfig, IconSink};
use tempo_tray::config::Settings;
use tempo_tray::metrics::{MetricsSnapshot, SnapshotHandle};
use tempo_tray::timer::CountdownTimer;

/// Records the raw pixels of every pushed frame; optionally refuses pushes.
#[derive(Clone, Default)]
struct RecordingSink {
    pushes: Arc<Mutex<Vec<Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    fn pushed_pixel(&self, push_index: usize, x: u32, y: u32) -> [u8; 4] {
        let pushes = self.pushes.lock().unwrap();
        let raw = &pushes[push_index];
        let offset = ((y * 32 + x) * 4) as usize;
        [raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]]
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl IconSink for RecordingSink {
    fn push_icon(&mut self, frame: &Frame) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("sink refused push");
        }
        self.pushes.lock().unwrap().push(frame.pixels().as_raw().clone());
        Ok(())
    }
}

fn write_png(path: &Path, color: [u8; 4]) {
    RgbaImage::from_pixel(8, 8, Rgba(color)).save(path).unwrap();
}

/// Three-frame folder of solid colors so pushed frames are identifiable by
/// their center pixel.
fn write_folder(root: &Path, name: &str, colors: &[[u8; 4]]) {
    let dir = root.join(name);
    std::fs::create_dir(&dir).unwrap();
    for (i, color) in colors.iter().enumerate() {
        write_png(&dir.join(format!("{}.png", i + 1)), *color);
    }
}

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

fn engine_with_root(root: &Path) -> (AnimationEngine, RecordingSink, SnapshotHandle) {
    let settings = Settings::default();
    let config = EngineConfig::from_settings(&settings, root.to_path_buf());
    let metrics = SnapshotHandle::new();
    let timer = CountdownTimer::new(Duration::from_secs(60));
    let sink = RecordingSink::default();
    let engine = AnimationEngine::new(config, metrics.clone(), timer, Box::new(sink.clone()));
    (engine, sink, metrics)
}

fn center_of_push(sink: &RecordingSink, push_index: usize) -> [u8; 4] {
    sink.pushed_pixel(push_index, 16, 16)
}

#[test]
fn selecting_a_folder_pushes_its_first_frame() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());

    assert!(engine.select_source("pulse"));

    assert_eq!(engine.current_source(), "pulse");
    assert_eq!(sink.push_count(), 1);
    assert_eq!(center_of_push(&sink, 0), RED);
}

#[test]
fn ticks_cycle_through_frames_and_wrap() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());
    engine.select_source("pulse");

    for _ in 0..4 {
        engine.tick();
    }

    // Install pushes frame 0; each tick pushes the current frame and then
    // advances, so the wrap back to frame 0 is visible.
    let colors: Vec<_> = (0..sink.push_count()).map(|i| center_of_push(&sink, i)).collect();
    assert_eq!(colors, vec![RED, RED, GREEN, BLUE, RED]);
}

#[test]
fn failed_select_keeps_current_animation() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());
    engine.select_source("pulse");
    let pushes_before = sink.push_count();

    assert!(!engine.select_source("no-such-animation"));

    assert_eq!(engine.current_source(), "pulse");
    assert_eq!(sink.push_count(), pushes_before);
}

#[test]
fn preview_does_not_touch_the_live_cursor() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "live", &[RED, GREEN, BLUE]);
    write_folder(temp.path(), "other", &[WHITE, WHITE, WHITE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());
    engine.select_source("live");

    // Advance the live cursor to frame 2.
    engine.tick();
    engine.tick();

    engine.start_preview("other");
    assert!(engine.preview_active());
    engine.tick();
    engine.tick();
    engine.cancel_preview();

    // The push after cancel resumes exactly where live playback froze.
    assert!(!engine.preview_active());
    let last = sink.push_count() - 1;
    assert_eq!(center_of_push(&sink, last), BLUE);
    assert_eq!(engine.current_source(), "live");
}

#[test]
fn selecting_the_previewed_animation_promotes_it() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "live", &[RED, RED, RED]);
    write_folder(temp.path(), "next", &[GREEN, BLUE, WHITE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());
    engine.select_source("live");

    engine.start_preview("next");
    engine.tick();
    let created_before = engine.ledger().created();

    assert!(engine.select_source("next"));

    // Promotion reuses the preview's frames (no re-decode) and keeps its
    // cursor, which the tick above moved to frame 1.
    assert_eq!(engine.ledger().created(), created_before);
    assert_eq!(engine.current_source(), "next");
    assert!(!engine.preview_active());
    let last = sink.push_count() - 1;
    assert_eq!(center_of_push(&sink, last), BLUE);
}

#[test]
fn cancel_preview_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());
    engine.select_source("pulse");
    let pushes_before = sink.push_count();

    engine.cancel_preview();
    engine.cancel_preview();

    assert_eq!(sink.push_count(), pushes_before);
}

#[test]
fn unresolvable_preview_is_ignored() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());
    engine.select_source("pulse");
    let pushes_before = sink.push_count();

    engine.start_preview("missing");

    assert!(!engine.preview_active());
    assert_eq!(sink.push_count(), pushes_before);
}

#[test]
fn repeated_switches_release_every_frame() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "a", &[RED, GREEN, BLUE]);
    write_folder(temp.path(), "b", &[WHITE, WHITE]);
    let (mut engine, _sink, _) = engine_with_root(temp.path());

    for _ in 0..5 {
        assert!(engine.select_source("a"));
        assert!(engine.select_source("b"));
    }
    engine.start_preview("a");
    engine.cancel_preview();
    engine.shutdown();

    let ledger = engine.ledger();
    assert_eq!(ledger.created(), ledger.released());
    assert_eq!(ledger.live(), 0);
}

#[test]
fn retired_frames_wait_for_a_successful_push() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "a", &[RED, GREEN, BLUE]);
    write_folder(temp.path(), "b", &[WHITE, WHITE]);
    let (mut engine, sink, _) = engine_with_root(temp.path());
    engine.select_source("a");

    sink.set_failing(true);
    engine.select_source("b");

    // The replaced frames stay alive while pushes fail: the OS may still be
    // presenting one of them.
    assert_eq!(engine.pending_release(), 3);
    assert_eq!(engine.ledger().live(), 5);

    sink.set_failing(false);
    engine.tick();

    assert_eq!(engine.pending_release(), 0);
    assert_eq!(engine.ledger().live(), 2);
}

#[test]
fn cpu_gauge_follows_the_latest_sample() {
    let temp = TempDir::new().unwrap();
    let (mut engine, sink, metrics) = engine_with_root(temp.path());

    let mut snapshot = MetricsSnapshot::default();
    snapshot.cpu_percent = 10.0;
    metrics.publish(snapshot.clone());
    assert!(engine.select_source(TOKEN_CPU));
    let first = sink.push_count() - 1;

    snapshot.cpu_percent = 95.0;
    metrics.publish(snapshot);
    engine.tick();
    let second = sink.push_count() - 1;

    let a = sink.pushes.lock().unwrap()[first].clone();
    let b = sink.pushes.lock().unwrap()[second].clone();
    assert_ne!(a, b, "gauge should re-render when the sample changes");
}

#[test]
fn switching_to_a_gauge_mid_playback_releases_the_folder() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (mut engine, _sink, metrics) = engine_with_root(temp.path());
    metrics.publish(MetricsSnapshot::default());
    engine.select_source("pulse");
    engine.tick();

    assert!(engine.select_source(TOKEN_CPU));

    // The gauge is a one-frame set refreshed per push; the folder's three
    // frames are gone once the install push succeeds.
    assert_eq!(engine.current_source(), TOKEN_CPU);
    assert_eq!(engine.ledger().live(), 1);
    assert_eq!(engine.next_interval(), Some(Duration::from_secs(1)));
}

#[test]
fn logo_needs_no_scheduling() {
    let temp = TempDir::new().unwrap();
    let (mut engine, sink, _) = engine_with_root(temp.path());

    assert!(engine.select_source(TOKEN_LOGO));

    assert_eq!(sink.push_count(), 1);
    assert_eq!(engine.next_interval(), None);
}

#[test]
fn folder_playback_uses_the_base_interval() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (mut engine, _sink, _) = engine_with_root(temp.path());
    engine.select_source("pulse");

    // Default metric is memory; the empty snapshot reads 0%, and the default
    // curve is flat at 100%, so the base interval comes through unscaled.
    assert_eq!(engine.next_interval(), Some(Duration::from_millis(150)));

    engine.set_base_interval_ms(80);
    assert_eq!(engine.next_interval(), Some(Duration::from_millis(80)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_handle_calls_run_on_plain_threads() {
    let temp = TempDir::new().unwrap();
    write_folder(temp.path(), "pulse", &[RED, GREEN, BLUE]);
    let (engine, _sink, _) = engine_with_root(temp.path());
    let handle = spawn_engine(engine);

    // Menu handlers run on tray threads, never inside the runtime; the
    // blocking handle variants must work from there.
    let worker = std::thread::spawn(move || {
        let selected = handle.select_source_blocking("pulse");
        let current = handle.current_source_blocking();
        handle.shutdown();
        (selected, current)
    });
    let (selected, current) = worker.join().unwrap();

    assert!(selected);
    assert_eq!(current, "pulse");
}

#[test]
fn init_falls_back_to_the_logo() {
    let temp = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.animation = "vanished".to_string();
    let config = EngineConfig::from_settings(&settings, temp.path().to_path_buf());
    let sink = RecordingSink::default();
    let mut engine = AnimationEngine::new(
        config,
        SnapshotHandle::new(),
        CountdownTimer::new(Duration::from_secs(60)),
        Box::new(sink.clone()),
    );

    engine.init();

    assert_eq!(engine.current_source(), TOKEN_LOGO);
    assert_eq!(sink.push_count(), 1);
}
