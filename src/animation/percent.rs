use super::decoder::{Frame, ICON_SIZE};
use super::lifecycle::ResourceLedger;
use anyhow::Result;
use image::{Rgba, RgbaImage};
use std::f64::consts::TAU;

/// Track pixels use the first stop at this alpha so an empty gauge is still
/// visible against the tray background.
const TRACK_ALPHA: u8 = 70;
const RING_THICKNESS: f64 = 4.0;

/// Color for a 0-100 value, linearly interpolated across the gradient stops.
/// Stops are spaced evenly over the range; a single stop is used as-is.
pub fn gradient_color(percent: u8, stops: &[[u8; 3]]) -> [u8; 3] {
    match stops {
        [] => [255, 255, 255],
        [only] => *only,
        _ => {
            let segments = (stops.len() - 1) as f64;
            let position = f64::from(percent.min(100)) / 100.0 * segments;
            let index = (position.floor() as usize).min(stops.len() - 2);
            let t = position - index as f64;

            let (a, b) = (stops[index], stops[index + 1]);
            [
                lerp_channel(a[0], b[0], t),
                lerp_channel(a[1], b[1], t),
                lerp_channel(a[2], b[2], t),
            ]
        }
    }
}

fn lerp_channel(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
}

/// Render a ring gauge frame for a 0-100 value. The filled arc starts at
/// 12 o'clock and sweeps clockwise; the unfilled remainder shows a dimmed
/// track. Pure: same inputs give identical pixels.
pub fn render_percent_icon(
    percent: u8,
    stops: &[[u8; 3]],
    ledger: &ResourceLedger,
) -> Result<Frame> {
    let percent = percent.min(100);
    let size = ICON_SIZE;
    let mut canvas = RgbaImage::new(size, size);

    let center = f64::from(size) / 2.0 - 0.5;
    let outer = f64::from(size) / 2.0 - 1.0;
    let inner = outer - RING_THICKNESS;
    let fill_fraction = f64::from(percent) / 100.0;

    let fill = gradient_color(percent, stops);
    let track = stops.first().copied().unwrap_or([255, 255, 255]);

    for y in 0..size {
        for x in 0..size {
            let dx = f64::from(x) - center;
            let dy = f64::from(y) - center;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < inner || distance > outer {
                continue;
            }

            // Angle fraction from 12 o'clock, clockwise.
            let mut angle = dx.atan2(-dy);
            if angle < 0.0 {
                angle += TAU;
            }
            let fraction = angle / TAU;

            let pixel = if fraction < fill_fraction {
                Rgba([fill[0], fill[1], fill[2], 255])
            } else {
                Rgba([track[0], track[1], track[2], TRACK_ALPHA])
            };
            canvas.put_pixel(x, y, pixel);
        }
    }

    Frame::from_pixels(canvas, 1000, ledger)
}
