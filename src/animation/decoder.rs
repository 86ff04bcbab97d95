use super::lifecycle::ResourceLedger;
use super::source::{self, AnimationSource};
use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::{imageops, AnimationDecoder, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tray_icon::Icon;

/// Hard cap on frames per source; decoding stops here silently.
pub const MAX_FRAMES: usize = 64;

/// Output dimension of every frame (square).
pub const ICON_SIZE: u32 = 32;

/// Substituted when a container declares a zero inter-frame delay.
pub const DEFAULT_FRAME_DURATION_MS: u64 = 100;

/// One decoded, icon-sized frame. Creation registers with the ledger and
/// drop releases, so the engine can prove it never leaks across source
/// switches.
pub struct Frame {
    pixels: RgbaImage,
    icon: Icon,
    duration: Duration,
    ledger: ResourceLedger,
}

impl Frame {
    pub fn from_pixels(pixels: RgbaImage, duration_ms: u64, ledger: &ResourceLedger) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        let icon = Icon::from_rgba(pixels.as_raw().clone(), width, height)
            .context("building tray icon from frame pixels")?;
        ledger.record_created();
        Ok(Self {
            pixels,
            icon,
            duration: Duration::from_millis(duration_ms.max(1)),
            ledger: ledger.clone(),
        })
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn icon(&self) -> &Icon {
        &self.icon
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.ledger.record_released();
    }
}

/// Ordered, bounded frame sequence belonging to one playback context.
#[derive(Default)]
pub struct FrameSet {
    frames: Vec<Frame>,
    /// Frames carry individual durations (animated container) rather than
    /// playing at the fixed base interval (folder sequence).
    single_image: bool,
}

impl FrameSet {
    pub fn empty() -> Self {
        Self::default()
    }

    fn new(frames: Vec<Frame>, single_image: bool) -> Self {
        Self { frames, single_image }
    }

    pub fn single(frame: Frame) -> Self {
        Self { frames: vec![frame], single_image: false }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn is_single_image_animation(&self) -> bool {
        self.single_image
    }
}

/// Decodes animation sources into icon-sized frame sets.
pub struct FrameDecoder {
    icon_size: u32,
    ledger: ResourceLedger,
}

impl FrameDecoder {
    pub fn new(ledger: ResourceLedger) -> Self {
        Self { icon_size: ICON_SIZE, ledger }
    }

    /// Decode a non-procedural source. Failures are not fatal: missing or
    /// fully corrupt inputs yield an empty set the caller must not install.
    pub fn decode(&self, source: &AnimationSource, base_interval_ms: u64) -> FrameSet {
        match source {
            AnimationSource::SingleImage(path) => {
                if source::is_animated_container(path) {
                    let set = self.decode_animated(path);
                    if !set.is_empty() {
                        return set;
                    }
                    // A static WebP has no animation frames; decode it as a
                    // plain still instead of rejecting it.
                }
                self.decode_static(path, base_interval_ms)
            }
            AnimationSource::FolderSequence(path) => self.decode_folder(path, base_interval_ms),
            AnimationSource::Procedural(_) => FrameSet::empty(),
        }
    }

    /// GIF/WebP container: per-frame delays from metadata, decoded until the
    /// cap or the first broken frame (keeping the good prefix).
    fn decode_animated(&self, path: &Path) -> FrameSet {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("Cannot open {}: {}", path.display(), e);
                return FrameSet::empty();
            }
        };
        let reader = BufReader::new(file);

        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("gif"))
            .unwrap_or(false);

        let frames = if is_gif {
            match GifDecoder::new(reader) {
                Ok(decoder) => self.collect_animated(decoder.into_frames(), path),
                Err(e) => {
                    log::warn!("Cannot decode {}: {}", path.display(), e);
                    vec![]
                }
            }
        } else {
            match WebPDecoder::new(reader) {
                Ok(decoder) => self.collect_animated(decoder.into_frames(), path),
                Err(e) => {
                    log::warn!("Cannot decode {}: {}", path.display(), e);
                    vec![]
                }
            }
        };

        FrameSet::new(frames, true)
    }

    fn collect_animated(&self, frames: image::Frames<'_>, path: &Path) -> Vec<Frame> {
        let mut out = Vec::new();

        for result in frames {
            if out.len() >= MAX_FRAMES {
                break;
            }

            let frame = match result {
                Ok(frame) => frame,
                Err(e) => {
                    // Partially corrupt container: keep what decoded so far.
                    log::warn!(
                        "Frame {} of {} failed to decode, keeping {} frames: {}",
                        out.len(),
                        path.display(),
                        out.len(),
                        e
                    );
                    break;
                }
            };

            let (numer, denom) = frame.delay().numer_denom_ms();
            let mut duration_ms = if denom == 0 {
                0
            } else {
                u64::from(numer / denom)
            };
            if duration_ms == 0 {
                duration_ms = DEFAULT_FRAME_DURATION_MS;
            }

            let pixels = self.fit_to_icon(&frame.into_buffer());
            match Frame::from_pixels(pixels, duration_ms, &self.ledger) {
                Ok(frame) => out.push(frame),
                Err(e) => log::warn!("Skipping frame of {}: {}", path.display(), e),
            }
        }

        out
    }

    fn decode_static(&self, path: &Path, base_interval_ms: u64) -> FrameSet {
        match self.decode_file(path, base_interval_ms) {
            Some(frame) => FrameSet::new(vec![frame], false),
            None => FrameSet::empty(),
        }
    }

    /// Folder sequence: one frame per file in shared scan order, each at the
    /// base interval. Undecodable files are skipped, not fatal.
    fn decode_folder(&self, dir: &Path, base_interval_ms: u64) -> FrameSet {
        let mut frames = Vec::new();

        for path in source::scan_frame_files(dir) {
            if frames.len() >= MAX_FRAMES {
                break;
            }
            if let Some(frame) = self.decode_file(&path, base_interval_ms) {
                frames.push(frame);
            }
        }

        FrameSet::new(frames, false)
    }

    fn decode_file(&self, path: &Path, duration_ms: u64) -> Option<Frame> {
        let img = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                log::debug!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };

        let pixels = self.fit_to_icon(&img.to_rgba8());
        match Frame::from_pixels(pixels, duration_ms, &self.ledger) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Aspect-preserving scale onto a transparent square canvas, centered.
    fn fit_to_icon(&self, image: &RgbaImage) -> RgbaImage {
        let size = self.icon_size;
        let (w, h) = image.dimensions();
        let mut canvas = RgbaImage::new(size, size);
        if w == 0 || h == 0 {
            return canvas;
        }

        let scale = (f64::from(size) / f64::from(w)).min(f64::from(size) / f64::from(h));
        let dst_w = ((f64::from(w) * scale).round() as u32).max(1);
        let dst_h = ((f64::from(h) * scale).round() as u32).max(1);

        let resized = imageops::resize(image, dst_w, dst_h, imageops::FilterType::Lanczos3);
        let x = i64::from((size - dst_w.min(size)) / 2);
        let y = i64::from((size - dst_h.min(size)) / 2);
        imageops::overlay(&mut canvas, &resized, x, y);
        canvas
    }
}
