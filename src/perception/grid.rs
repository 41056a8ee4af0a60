/// Coordinate grid overlay.
///
/// Draws a translucent line every `pitch` pixels in both directions and prints
/// the line's coordinate (in original pixel space) beside it, so the model can
/// read absolute positions straight off the image.
use image::{Rgba, RgbaImage, RgbImage};

// ── Minimal 5×5 bitmap font, digits only ──────────────────────────────────────
// Each glyph: 5 rows, each row is a u8 where bit4=leftmost pixel, bit0=rightmost.
const DIGITS_5X5: [[u8; 5]; 10] = [
    [0b01110, 0b10001, 0b10001, 0b10001, 0b01110], // 0
    [0b00100, 0b01100, 0b00100, 0b00100, 0b01110], // 1
    [0b01110, 0b10001, 0b00110, 0b01000, 0b11111], // 2
    [0b11110, 0b00001, 0b00110, 0b00001, 0b11110], // 3
    [0b00110, 0b01010, 0b10010, 0b11111, 0b00010], // 4
    [0b11111, 0b10000, 0b11110, 0b00001, 0b11110], // 5
    [0b01110, 0b10000, 0b11110, 0b10001, 0b01110], // 6
    [0b11111, 0b00001, 0b00010, 0b00100, 0b00100], // 7
    [0b01110, 0b10001, 0b01110, 0b10001, 0b01110], // 8
    [0b01110, 0b10001, 0b01111, 0b00001, 0b01110], // 9
];

/// Red at ~25% opacity.
pub const GRID_LINE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 64]);
/// Red at ~50% opacity.
pub const GRID_TEXT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 128]);

/// Distance of x labels from the top edge and y labels from the left edge.
const LABEL_INSET: u32 = 10;

fn draw_digit(overlay: &mut RgbaImage, digit: usize, px: u32, py: u32, scale: u32) {
    let Some(glyph) = DIGITS_5X5.get(digit) else { return };
    let (w, h) = overlay.dimensions();
    for (row, &bits) in glyph.iter().enumerate() {
        for col in 0..5u32 {
            if (bits >> (4 - col)) & 1 == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let x = px + col * scale + sx;
                    let y = py + row as u32 * scale + sy;
                    if x < w && y < h {
                        overlay.put_pixel(x, y, GRID_TEXT_COLOR);
                    }
                }
            }
        }
    }
}

fn draw_number(overlay: &mut RgbaImage, value: u32, px: u32, py: u32, scale: u32) {
    let step = 5 * scale + 1;
    for (i, c) in value.to_string().chars().enumerate() {
        if let Some(d) = c.to_digit(10) {
            draw_digit(overlay, d as usize, px + i as u32 * step, py, scale);
        }
    }
}

fn blend_pixel(base: &mut Rgba<u8>, over: &Rgba<u8>) {
    let alpha = over[3] as f32 / 255.0;
    if alpha == 0.0 {
        return;
    }
    for c in 0..3 {
        base[c] = (base[c] as f32 * (1.0 - alpha) + over[c] as f32 * alpha).round() as u8;
    }
    base[3] = 255;
}

/// Build the transparent overlay holding grid lines and coordinate labels.
pub fn grid_overlay(width: u32, height: u32, pitch: u32) -> RgbaImage {
    let mut overlay = RgbaImage::new(width, height);
    let pitch = pitch.max(1);
    let scale: u32 = if pitch >= 60 { 2 } else { 1 };

    for x in (0..width).step_by(pitch as usize) {
        for y in 0..height {
            overlay.put_pixel(x, y, GRID_LINE_COLOR);
        }
    }
    for y in (0..height).step_by(pitch as usize) {
        for x in 0..width {
            overlay.put_pixel(x, y, GRID_LINE_COLOR);
        }
    }

    for x in (0..width).step_by(pitch as usize) {
        draw_number(&mut overlay, x, x + 2, LABEL_INSET, scale);
    }
    for y in (0..height).step_by(pitch as usize) {
        draw_number(&mut overlay, y, LABEL_INSET, y + 2, scale);
    }
    overlay
}

/// Composite the coordinate grid over `capture` and flatten to opaque RGB.
pub fn draw_coordinate_grid(capture: &RgbaImage, pitch: u32) -> RgbImage {
    let (w, h) = capture.dimensions();
    let overlay = grid_overlay(w, h, pitch);
    let mut canvas = capture.clone();
    for (base, over) in canvas.pixels_mut().zip(overlay.pixels()) {
        blend_pixel(base, over);
    }
    image::DynamicImage::ImageRgba8(canvas).to_rgb8()
}
