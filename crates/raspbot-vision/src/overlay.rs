//! Bitmap text stamping for still captures.
//!
//! Only the characters that appear in capture timestamps are drawn
//! (`0-9 _ : -` and space); anything else advances the cursor blank.

use image::{Rgb, RgbImage};

/// Left edge of the timestamp.
pub const STAMP_X: u32 = 10;
/// Baseline of the timestamp (bottom row of the glyphs).
pub const STAMP_BASELINE: u32 = 30;
/// Pixel size of one font dot.
pub const STAMP_SCALE: u32 = 3;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

// 5×7 glyphs, one byte per row, bit 4 = leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => [0; 7],
    }
}

/// Draw `text` with its bottom-left corner at (`x`, `baseline`).
///
/// Pixels that fall outside the image are skipped, so small frames get a
/// clipped stamp rather than a panic.
pub fn draw_text(img: &mut RgbImage, x: u32, baseline: u32, text: &str, scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1);
    let top = baseline.saturating_sub(GLYPH_H * scale);
    let advance = (GLYPH_W + 1) * scale;

    for (i, c) in text.chars().enumerate() {
        let left = x + i as u32 * advance;
        if left >= img.width() {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                fill_block(img, left + col * scale, top + row as u32 * scale, scale, color);
            }
        }
    }
}

/// Stamp `text` in white at the standard capture position.
pub fn stamp_timestamp(img: &mut RgbImage, text: &str) {
    draw_text(img, STAMP_X, STAMP_BASELINE, text, STAMP_SCALE, Rgb([255, 255, 255]));
}

fn fill_block(img: &mut RgbImage, x: u32, y: u32, size: u32, color: Rgb<u8>) {
    for dy in 0..size {
        for dx in 0..size {
            let (px, py) = (x + dx, y + dy);
            if px < img.width() && py < img.height() {
                img.put_pixel(px, py, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_count(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0 == [255, 255, 255]).count()
    }

    #[test]
    fn stamp_marks_pixels_above_baseline() {
        let mut img = RgbImage::new(320, 240);
        stamp_timestamp(&mut img, "20240101_120000");
        assert!(white_count(&img) > 0);
        // Nothing is drawn below the baseline.
        for y in STAMP_BASELINE..img.height() {
            for x in 0..img.width() {
                assert_ne!(img.get_pixel(x, y).0, [255, 255, 255]);
            }
        }
    }

    #[test]
    fn underscore_sits_on_bottom_row() {
        let mut img = RgbImage::new(20, 20);
        draw_text(&mut img, 0, 7, "_", 1, Rgb([255, 255, 255]));
        assert_eq!(white_count(&img), 5);
        assert_eq!(img.get_pixel(0, 6).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(0, 5).0, [0, 0, 0]);
    }

    #[test]
    fn tiny_image_is_clipped_not_panicking() {
        let mut img = RgbImage::new(4, 4);
        stamp_timestamp(&mut img, "20240101_120000");
        let mut empty = RgbImage::new(0, 0);
        stamp_timestamp(&mut empty, "0");
    }

    #[test]
    fn unknown_characters_are_blank() {
        let mut img = RgbImage::new(40, 20);
        draw_text(&mut img, 0, 10, "AB", 1, Rgb([255, 255, 255]));
        assert_eq!(white_count(&img), 0);
    }
}
