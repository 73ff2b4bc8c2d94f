//! Tray icon generation.
//!
//! Renders the current refresh rate as digits inside a ring, as raw RGBA.

/// Icon size in pixels.
pub const ICON_SIZE: u32 = 32;

const ACCENT: [u8; 3] = [0, 210, 210];
const BACKGROUND: [u8; 3] = [30, 30, 40];

const GLYPH_WIDTH: usize = 3;
const GLYPH_HEIGHT: usize = 5;

/// 3x5 bitmap glyphs, one row per byte, high bit on the left.
fn glyph(c: char) -> Option<[u8; GLYPH_HEIGHT]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'z' => [0b000, 0b111, 0b001, 0b010, 0b111],
        _ => return None,
    })
}

/// Text shown in the icon: the rate, or "Hz" when it is unknown.
pub fn icon_text(hz: u32) -> String {
    if hz > 0 {
        hz.to_string()
    } else {
        "Hz".to_string()
    }
}

/// Generate the refresh-rate icon as RGBA data.
pub fn generate_rate_icon(hz: u32) -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];

    let center = size as f32 / 2.0;
    let radius = size as f32 / 2.0 - 1.0;

    // Background disc with an accent ring
    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let dist = (dx * dx + dy * dy).sqrt();

            let color = if dist < radius - 2.0 {
                BACKGROUND
            } else {
                ACCENT
            };

            let alpha = if dist < radius {
                255
            } else if dist < radius + 1.0 {
                // Anti-aliased edge
                ((radius + 1.0 - dist) * 255.0) as u8
            } else {
                continue;
            };

            rgba[idx..idx + 3].copy_from_slice(&color);
            rgba[idx + 3] = alpha;
        }
    }

    draw_text(&mut rgba, size, &icon_text(hz));
    rgba
}

/// Draw `text` centered, using the largest scale that fits inside the ring.
fn draw_text(rgba: &mut [u8], size: usize, text: &str) {
    let glyphs: Vec<_> = text.chars().filter_map(glyph).collect();
    if glyphs.is_empty() {
        return;
    }

    let inner = size - 8;
    let scale = (1..=3)
        .rev()
        .find(|scale| text_width(glyphs.len(), *scale) <= inner)
        .unwrap_or(1);

    let width = text_width(glyphs.len(), scale);
    let height = GLYPH_HEIGHT * scale;
    let left = size.saturating_sub(width) / 2;
    let top = size.saturating_sub(height) / 2;

    for (i, rows) in glyphs.iter().enumerate() {
        let glyph_left = left + i * (GLYPH_WIDTH + 1) * scale;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let x = glyph_left + col * scale + sx;
                        let y = top + row * scale + sy;
                        if x < size && y < size {
                            let idx = (y * size + x) * 4;
                            rgba[idx..idx + 3].copy_from_slice(&ACCENT);
                            rgba[idx + 3] = 255;
                        }
                    }
                }
            }
        }
    }
}

fn text_width(chars: usize, scale: usize) -> usize {
    (chars * (GLYPH_WIDTH + 1) - 1) * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(rgba: &[u8], x: usize, y: usize) -> &[u8] {
        let idx = (y * ICON_SIZE as usize + x) * 4;
        &rgba[idx..idx + 4]
    }

    #[test]
    fn text_falls_back_to_hz() {
        assert_eq!(icon_text(0), "Hz");
        assert_eq!(icon_text(144), "144");
    }

    #[test]
    fn icon_has_expected_size_and_transparent_corners() {
        let rgba = generate_rate_icon(60);
        assert_eq!(rgba.len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
        assert_eq!(pixel(&rgba, 0, 0)[3], 0);
        assert_eq!(pixel(&rgba, 31, 31)[3], 0);
    }

    #[test]
    fn digits_are_drawn_in_accent_color() {
        let rgba = generate_rate_icon(120);
        let accent_pixels = (0..ICON_SIZE as usize)
            .flat_map(|y| (0..ICON_SIZE as usize).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                // Inside the ring only
                let d = ((x as f32 - 15.5).powi(2) + (y as f32 - 15.5).powi(2)).sqrt();
                d < 12.0 && pixel(&rgba, x, y)[..3] == ACCENT
            })
            .count();
        assert!(accent_pixels > 0);
    }

    #[test]
    fn different_rates_render_differently() {
        assert_ne!(generate_rate_icon(60), generate_rate_icon(144));
        assert_ne!(generate_rate_icon(0), generate_rate_icon(60));
    }

    #[test]
    fn wide_text_shrinks_to_fit() {
        // Three glyphs at scale 3 would overflow the ring
        assert!(text_width(3, 3) > ICON_SIZE as usize - 8);
        assert!(text_width(3, 2) <= ICON_SIZE as usize - 8);
    }
}
