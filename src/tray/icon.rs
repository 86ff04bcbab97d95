use crate::animation::decoder::ICON_SIZE;
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use tray_icon::Icon;

const FACE_COLOR: [u8; 3] = [0x58, 0xA6, 0xFF];
const HAND_COLOR: [u8; 3] = [0xE6, 0xED, 0xF3];

/// The default logo: a small clock face drawn at icon size. Used for the
/// initial tray icon and as the frame behind the reserved logo identifier.
pub fn logo_pixels() -> RgbaImage {
    let size = ICON_SIZE;
    let mut canvas = RgbaImage::new(size, size);

    let center = f64::from(size) / 2.0 - 0.5;
    let outer = f64::from(size) / 2.0 - 1.0;
    let inner = outer - 3.0;

    for y in 0..size {
        for x in 0..size {
            let dx = f64::from(x) - center;
            let dy = f64::from(y) - center;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance >= inner && distance <= outer {
                canvas.put_pixel(x, y, Rgba([FACE_COLOR[0], FACE_COLOR[1], FACE_COLOR[2], 255]));
            }
        }
    }

    // Hands at twelve and three.
    let mid = size / 2;
    let hand = Rgba([HAND_COLOR[0], HAND_COLOR[1], HAND_COLOR[2], 255]);
    for y in (size / 4)..mid {
        canvas.put_pixel(mid, y, hand);
        canvas.put_pixel(mid - 1, y, hand);
    }
    for x in mid..(size - size / 4) {
        canvas.put_pixel(x, mid, hand);
        canvas.put_pixel(x, mid - 1, hand);
    }

    canvas
}

pub fn create_logo_icon() -> Result<Icon> {
    let pixels = logo_pixels();
    let (width, height) = pixels.dimensions();
    Icon::from_rgba(pixels.into_raw(), width, height).context("building logo icon")
}
