//! Billboard texture rendering for anchored labels.

use image::{Rgba, RgbaImage};
use vision::LabelStyle;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// Horizontal advance per glyph in font units, including spacing.
const GLYPH_ADVANCE: u32 = 6;
const TEXT_PADDING_PX: u32 = 8;

/// Render `text` onto a square transparent texture: a rounded background
/// rectangle with the text centered on it.
///
/// The bitmap font is upper-case only and scaled by whole pixels so that a
/// glyph is as close to `style.font_px` tall as fits. Text wider than the
/// texture at scale 1 is clipped.
pub fn rasterize_label(text: &str, style: &LabelStyle) -> RgbaImage {
    let size = style.texture_px;
    let mut image = RgbaImage::new(size, size);
    fill_rounded_rect(&mut image, style.corner_radius_px, Rgba(style.background));

    let glyphs: Vec<char> = text.chars().flat_map(char::to_uppercase).collect();
    if glyphs.is_empty() {
        return image;
    }
    let available = size.saturating_sub(2 * TEXT_PADDING_PX);
    let mut scale = (style.font_px / GLYPH_HEIGHT).max(1);
    while scale > 1 && text_width(glyphs.len(), scale) > available {
        scale -= 1;
    }

    let width = text_width(glyphs.len(), scale) as i64;
    let left = (size as i64 - width) / 2;
    let top = (size as i64 - (GLYPH_HEIGHT * scale) as i64) / 2;
    let color = Rgba(style.foreground);
    for (index, ch) in glyphs.into_iter().enumerate() {
        let Some(rows) = glyph_bits(ch) else {
            continue;
        };
        let origin_x = left + (index as u32 * GLYPH_ADVANCE * scale) as i64;
        draw_glyph(&mut image, origin_x, top, &rows, scale, color);
    }
    image
}

fn text_width(glyphs: usize, scale: u32) -> u32 {
    let glyphs = glyphs as u32;
    (glyphs * GLYPH_ADVANCE).saturating_sub(GLYPH_ADVANCE - GLYPH_WIDTH) * scale
}

fn fill_rounded_rect(image: &mut RgbaImage, radius: u32, color: Rgba<u8>) {
    let width = image.width() as f32;
    let height = image.height() as f32;
    let radius = (radius as f32).min(width / 2.0).min(height / 2.0);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;
        let cx = px.clamp(radius, width - radius);
        let cy = py.clamp(radius, height - radius);
        if (px - cx).powi(2) + (py - cy).powi(2) <= radius * radius {
            *pixel = color;
        }
    }
}

fn draw_glyph(
    image: &mut RgbaImage,
    origin_x: i64,
    origin_y: i64,
    rows: &[u8; 7],
    scale: u32,
    color: Rgba<u8>,
) {
    let width = image.width() as i64;
    let height = image.height() as i64;
    for (row, pattern) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = origin_x + (col * scale + dx) as i64;
                    let py = origin_y + (row as u32 * scale + dy) as i64;
                    if (0..width).contains(&px) && (0..height).contains(&py) {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        '\'' => [0b00100, 0b00100, 0b01000, 0, 0, 0, 0],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}
