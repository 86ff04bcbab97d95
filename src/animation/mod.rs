pub mod decoder;
pub mod lifecycle;
pub mod percent;
pub mod source;
pub mod speed;

use crate::config::Settings;
use crate::metrics::SnapshotHandle;
use crate::timer::CountdownTimer;
use anyhow::Result;
use decoder::{Frame, FrameDecoder, FrameSet};
use lifecycle::ResourceLedger;
use source::{AnimationSource, ProceduralKind};
use speed::{SpeedCurve, SpeedMetric};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Redraw cadence for the procedural CPU/memory gauges, matching the
/// metrics sampler so every gauge push can show a fresh value.
pub const GAUGE_TICK_MS: u64 = 1000;

/// Where pushed icons go. The production sink forwards to the platform tray
/// loop; tests record what was pushed.
pub trait IconSink: Send {
    fn push_icon(&mut self, frame: &Frame) -> Result<()>;
}

/// Everything the engine needs from settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub animations_root: PathBuf,
    pub initial_animation: String,
    pub base_interval_ms: u64,
    pub min_interval_ms: u64,
    pub speed_metric: SpeedMetric,
    pub speed_curve: SpeedCurve,
    pub color_stops: Vec<[u8; 3]>,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings, animations_root: PathBuf) -> Self {
        Self {
            animations_root,
            initial_animation: settings.animation.clone(),
            base_interval_ms: settings.base_interval(),
            min_interval_ms: settings.min_interval_ms,
            speed_metric: settings.speed_metric,
            speed_curve: SpeedCurve::new(
                settings.speed_default_scale,
                settings.speed_points.clone(),
            ),
            color_stops: settings.color_stops(),
        }
    }
}

struct PlaybackContext {
    frames: FrameSet,
    cursor: usize,
}

struct PreviewState {
    identifier: String,
    source: AnimationSource,
    ctx: PlaybackContext,
}

/// The playback core. Owns the live and preview contexts, decides what frame
/// shows next and when, and accounts for every decoded frame through the
/// ledger. Drives a single [`IconSink`]; nothing else writes icons.
pub struct AnimationEngine {
    animations_root: PathBuf,
    decoder: FrameDecoder,
    ledger: ResourceLedger,
    sink: Box<dyn IconSink>,
    metrics: SnapshotHandle,
    timer: CountdownTimer,
    color_stops: Vec<[u8; 3]>,
    speed_metric: SpeedMetric,
    speed_curve: SpeedCurve,
    base_interval_ms: u64,
    min_interval_ms: u64,
    initial_animation: String,

    current_id: String,
    live_source: Option<AnimationSource>,
    live: Option<PlaybackContext>,
    preview: Option<PreviewState>,
    /// Frame sets replaced by a switch, held until the next successful push
    /// so the frame the OS may still be presenting outlives its replacement.
    retired: Vec<FrameSet>,
}

impl AnimationEngine {
    pub fn new(
        config: EngineConfig,
        metrics: SnapshotHandle,
        timer: CountdownTimer,
        sink: Box<dyn IconSink>,
    ) -> Self {
        let ledger = ResourceLedger::new();
        Self {
            animations_root: config.animations_root,
            decoder: FrameDecoder::new(ledger.clone()),
            ledger,
            sink,
            metrics,
            timer,
            color_stops: config.color_stops,
            speed_metric: config.speed_metric,
            speed_curve: config.speed_curve,
            base_interval_ms: config.base_interval_ms,
            min_interval_ms: config.min_interval_ms,
            initial_animation: config.initial_animation,
            current_id: String::new(),
            live_source: None,
            live: None,
            preview: None,
            retired: Vec::new(),
        }
    }

    /// Install the configured animation, falling back to the logo when the
    /// stored identifier no longer resolves.
    pub fn init(&mut self) {
        let initial = self.initial_animation.clone();
        if !self.select_source(&initial) {
            self.select_source(source::TOKEN_LOGO);
        }
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn current_source(&self) -> &str {
        &self.current_id
    }

    pub fn preview_active(&self) -> bool {
        self.preview.is_some()
    }

    /// Frames retired but not yet released, waiting on the next push.
    pub fn pending_release(&self) -> usize {
        self.retired.iter().map(|set| set.len()).sum()
    }

    pub fn set_speed_metric(&mut self, metric: SpeedMetric) {
        self.speed_metric = metric;
    }

    pub fn set_base_interval_ms(&mut self, interval_ms: u64) {
        self.base_interval_ms = interval_ms.max(1);
    }

    /// Switch the live animation. Returns false (keeping the previous
    /// animation and identifier) when the identifier does not resolve or
    /// decodes to nothing.
    pub fn select_source(&mut self, identifier: &str) -> bool {
        if self.preview.is_none()
            && self.live.is_some()
            && source::identifiers_equal(&self.current_id, identifier)
        {
            return true;
        }

        // Selecting the animation being previewed promotes the preview in
        // place, keeping its frames and cursor instead of re-decoding.
        if let Some(preview) = self.preview.take() {
            if source::identifiers_equal(&preview.identifier, identifier) {
                if let Some(old) = self.live.take() {
                    self.retired.push(old.frames);
                }
                self.current_id = preview.identifier;
                self.live_source = Some(preview.source);
                self.live = Some(preview.ctx);
                self.push_current();
                return true;
            }
            self.preview = Some(preview);
        }

        let Some(new_source) = source::resolve(identifier, &self.animations_root) else {
            log::warn!(
                "Animation {:?} not found, keeping {:?}",
                identifier,
                self.current_id
            );
            return false;
        };

        let frames = self.build_frame_set(&new_source);
        if frames.is_empty() {
            log::warn!(
                "Animation {:?} has no usable frames, keeping {:?}",
                identifier,
                self.current_id
            );
            return false;
        }

        if let Some(old) = self.live.take() {
            self.retired.push(old.frames);
        }
        if let Some(preview) = self.preview.take() {
            self.retired.push(preview.ctx.frames);
        }

        log::info!("Switching animation to {:?}", identifier);
        self.current_id = identifier.to_string();
        self.live_source = Some(new_source);
        self.live = Some(PlaybackContext { frames, cursor: 0 });
        self.push_current();
        true
    }

    /// Show an animation without committing to it. The live context is left
    /// untouched (its cursor freezes) and resumes when the preview ends.
    pub fn start_preview(&mut self, identifier: &str) {
        if let Some(preview) = &self.preview {
            if source::identifiers_equal(&preview.identifier, identifier) {
                return;
            }
        }

        let Some(preview_source) = source::resolve(identifier, &self.animations_root) else {
            log::warn!("Cannot preview {:?}: not found", identifier);
            return;
        };

        let frames = self.build_frame_set(&preview_source);
        if frames.is_empty() {
            log::warn!("Cannot preview {:?}: no usable frames", identifier);
            return;
        }

        if let Some(old) = self.preview.take() {
            self.retired.push(old.ctx.frames);
        }

        self.preview = Some(PreviewState {
            identifier: identifier.to_string(),
            source: preview_source,
            ctx: PlaybackContext { frames, cursor: 0 },
        });
        self.push_current();
    }

    /// End the preview and resume the live animation where it left off.
    /// Idempotent.
    pub fn cancel_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            self.retired.push(preview.ctx.frames);
            self.push_current();
        }
    }

    /// One scheduler callback: push the current frame, then advance.
    pub fn tick(&mut self) {
        self.push_current();
        self.advance_cursor();
    }

    /// Delay until the next tick. `None` means nothing animates (single
    /// static frame, or no source at all) and the scheduler should sleep
    /// until the next command.
    pub fn next_interval(&self) -> Option<Duration> {
        let source = self.active_source()?;
        if source.is_procedural_gauge() {
            return Some(Duration::from_millis(GAUGE_TICK_MS));
        }

        let ctx = self.active_context()?;
        if ctx.frames.len() <= 1 {
            return None;
        }

        let base_ms = if ctx.frames.is_single_image_animation() {
            ctx.frames
                .frame(ctx.cursor)
                .map(|f| f.duration().as_millis() as u64)
                .unwrap_or(self.base_interval_ms)
        } else {
            self.base_interval_ms
        };

        let scaled =
            self.speed_curve
                .scaled_interval_ms(base_ms, self.speed_percent(), self.min_interval_ms);
        Some(Duration::from_millis(scaled))
    }

    /// Drop every frame the engine holds. After this the ledger balances.
    pub fn shutdown(&mut self) {
        self.live = None;
        self.preview = None;
        self.retired.clear();
        log::debug!(
            "Engine shut down: {} frames created, {} released",
            self.ledger.created(),
            self.ledger.released()
        );
    }

    fn active_source(&self) -> Option<&AnimationSource> {
        self.preview
            .as_ref()
            .map(|p| &p.source)
            .or(self.live_source.as_ref())
    }

    fn active_context(&self) -> Option<&PlaybackContext> {
        self.preview.as_ref().map(|p| &p.ctx).or(self.live.as_ref())
    }

    fn speed_percent(&self) -> Option<f64> {
        match self.speed_metric {
            SpeedMetric::Original => None,
            SpeedMetric::CpuPercent => Some(f64::from(self.metrics.latest().cpu_percent)),
            SpeedMetric::MemoryPercent => Some(f64::from(self.metrics.latest().mem_percent)),
            SpeedMetric::TimerProgress => self.timer.progress_percent(),
        }
    }

    fn build_frame_set(&self, for_source: &AnimationSource) -> FrameSet {
        match for_source {
            AnimationSource::Procedural(ProceduralKind::Logo) => self.build_logo_set(),
            AnimationSource::Procedural(kind) => self.build_gauge_set(*kind),
            other => self.decoder.decode(other, self.base_interval_ms),
        }
    }

    fn build_logo_set(&self) -> FrameSet {
        let pixels = crate::tray::icon::logo_pixels();
        match Frame::from_pixels(pixels, GAUGE_TICK_MS, &self.ledger) {
            Ok(frame) => FrameSet::single(frame),
            Err(e) => {
                log::warn!("Cannot build logo frame: {}", e);
                FrameSet::empty()
            }
        }
    }

    fn build_gauge_set(&self, kind: ProceduralKind) -> FrameSet {
        let snapshot = self.metrics.latest();
        let percent = match kind {
            ProceduralKind::Cpu => snapshot.cpu_percent,
            ProceduralKind::Memory => snapshot.mem_percent,
            ProceduralKind::Logo => 0.0,
        };
        let percent = percent.clamp(0.0, 100.0).round() as u8;

        match percent::render_percent_icon(percent, &self.color_stops, &self.ledger) {
            Ok(frame) => FrameSet::single(frame),
            Err(e) => {
                log::warn!("Cannot render percent gauge: {}", e);
                FrameSet::empty()
            }
        }
    }

    /// Re-render the active gauge from the latest metrics sample, retiring
    /// the frame that is being replaced.
    fn refresh_gauge(&mut self) {
        let kind = match self.active_source() {
            Some(AnimationSource::Procedural(kind)) if *kind != ProceduralKind::Logo => *kind,
            _ => return,
        };

        let fresh = self.build_gauge_set(kind);
        if fresh.is_empty() {
            return;
        }

        let Some(ctx) = self
            .preview
            .as_mut()
            .map(|p| &mut p.ctx)
            .or(self.live.as_mut())
        else {
            return;
        };
        let old = std::mem::replace(&mut ctx.frames, fresh);
        ctx.cursor = 0;
        self.retired.push(old);
    }

    /// Push the active frame to the sink. Retired frames are only released
    /// after a push succeeds.
    fn push_current(&mut self) {
        if self
            .active_source()
            .map(|s| s.is_procedural_gauge())
            .unwrap_or(false)
        {
            self.refresh_gauge();
        }

        let ctx = match self.preview.as_ref().map(|p| &p.ctx).or(self.live.as_ref()) {
            Some(ctx) => ctx,
            None => return,
        };
        let frame = match ctx.frames.frame(ctx.cursor % ctx.frames.len().max(1)) {
            Some(frame) => frame,
            None => return,
        };

        let pushed = self.sink.push_icon(frame);
        match pushed {
            Ok(()) => self.retired.clear(),
            Err(e) => log::warn!("Icon push failed: {}", e),
        }
    }

    fn advance_cursor(&mut self) {
        let Some(ctx) = self
            .preview
            .as_mut()
            .map(|p| &mut p.ctx)
            .or(self.live.as_mut())
        else {
            return;
        };
        let len = ctx.frames.len();
        if len > 1 {
            ctx.cursor = (ctx.cursor + 1) % len;
        }
    }
}

pub enum EngineCommand {
    SelectSource {
        identifier: String,
        reply: oneshot::Sender<bool>,
    },
    StartPreview { identifier: String },
    CancelPreview,
    SetSpeedMetric(SpeedMetric),
    SetBaseIntervalMs(u64),
    CurrentSource { reply: oneshot::Sender<String> },
    Shutdown,
}

/// Cheap-to-clone command sender for the engine task. The blocking variants
/// exist for menu handlers, which run outside the async runtime.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    pub async fn select_source(&self, identifier: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let cmd = EngineCommand::SelectSource {
            identifier: identifier.to_string(),
            reply,
        };
        if self.tx.send(cmd).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub fn select_source_blocking(&self, identifier: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let cmd = EngineCommand::SelectSource {
            identifier: identifier.to_string(),
            reply,
        };
        if self.tx.send(cmd).is_err() {
            return false;
        }
        rx.blocking_recv().unwrap_or(false)
    }

    pub fn start_preview(&self, identifier: &str) {
        let _ = self.tx.send(EngineCommand::StartPreview {
            identifier: identifier.to_string(),
        });
    }

    pub fn cancel_preview(&self) {
        let _ = self.tx.send(EngineCommand::CancelPreview);
    }

    pub fn set_speed_metric(&self, metric: SpeedMetric) {
        let _ = self.tx.send(EngineCommand::SetSpeedMetric(metric));
    }

    pub fn set_base_interval_ms(&self, interval_ms: u64) {
        let _ = self.tx.send(EngineCommand::SetBaseIntervalMs(interval_ms));
    }

    pub fn current_source_blocking(&self) -> String {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(EngineCommand::CurrentSource { reply })
            .is_err()
        {
            return String::new();
        }
        rx.blocking_recv().unwrap_or_default()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineCommand::Shutdown);
    }
}

/// Run the engine on a background task, ticking between commands. This task
/// is the only writer to the icon sink.
pub fn spawn_engine(mut engine: AnimationEngine) -> EngineHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        engine.init();

        loop {
            let deadline = engine.next_interval();
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        None => break,
                        Some(cmd) => {
                            if handle_command(&mut engine, cmd) {
                                break;
                            }
                        }
                    }
                }
                _ = sleep_or_forever(deadline) => engine.tick(),
            }
        }

        engine.shutdown();
    });

    EngineHandle { tx }
}

/// Returns true when the engine should stop.
fn handle_command(engine: &mut AnimationEngine, cmd: EngineCommand) -> bool {
    match cmd {
        EngineCommand::SelectSource { identifier, reply } => {
            let _ = reply.send(engine.select_source(&identifier));
        }
        EngineCommand::StartPreview { identifier } => engine.start_preview(&identifier),
        EngineCommand::CancelPreview => engine.cancel_preview(),
        EngineCommand::SetSpeedMetric(metric) => engine.set_speed_metric(metric),
        EngineCommand::SetBaseIntervalMs(ms) => engine.set_base_interval_ms(ms),
        EngineCommand::CurrentSource { reply } => {
            let _ = reply.send(engine.current_source().to_string());
        }
        EngineCommand::Shutdown => return true,
    }
    false
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
