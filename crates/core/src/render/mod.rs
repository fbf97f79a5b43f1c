//! Software rendering surface shared by all visual effects.
//!
//! Effects draw into an RGBA8 framebuffer through a handful of primitives.
//! The buffer doubles as the frame sink for the capture pipeline, which reads
//! it back verbatim after each tick.

/// Packed RGBA colour, one byte per channel.
pub type Rgba = [u8; 4];

pub const BLACK: Rgba = [0, 0, 0, 255];
pub const WHITE: Rgba = [255, 255, 255, 255];

/// RGBA8 framebuffer with the primitive operations effects need.
#[derive(Debug, Clone)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Surface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 4],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA8 pixel data, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self, colour: Rgba) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&colour);
        }
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, colour: Rgba) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let offset = (y as usize * self.width + x as usize) * 4;
        self.pixels[offset..offset + 4].copy_from_slice(&colour);
    }

    /// Alpha-blends `colour` over the existing pixel. `alpha` in `[0, 1]`
    /// multiplies the colour's own alpha channel.
    pub fn blend_pixel(&mut self, x: i32, y: i32, colour: Rgba, alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let alpha = (alpha.clamp(0.0, 1.0) * colour[3] as f32 / 255.0).clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let offset = (y as usize * self.width + x as usize) * 4;
        for channel in 0..3 {
            let src = colour[channel] as f32;
            let dst = self.pixels[offset + channel] as f32;
            self.pixels[offset + channel] = (dst + (src - dst) * alpha) as u8;
        }
        self.pixels[offset + 3] = 255;
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, colour: Rgba) {
        for yy in y.max(0)..(y + h).min(self.height as i32) {
            for xx in x.max(0)..(x + w).min(self.width as i32) {
                self.put_pixel(xx, yy, colour);
            }
        }
    }

    pub fn blend_rect(&mut self, x: i32, y: i32, w: i32, h: i32, colour: Rgba, alpha: f32) {
        for yy in y.max(0)..(y + h).min(self.height as i32) {
            for xx in x.max(0)..(x + w).min(self.width as i32) {
                self.blend_pixel(xx, yy, colour, alpha);
            }
        }
    }

    /// Vertical line between `y0` and `y1` inclusive, either order.
    pub fn vline(&mut self, x: i32, y0: i32, y1: i32, colour: Rgba) {
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for y in top..=bottom {
            self.put_pixel(x, y, colour);
        }
    }

    /// Draws `text` with the built-in 5x7 font, uppercased, `scale` pixels
    /// per font pixel. Characters outside the font advance without drawing.
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, colour: Rgba, alpha: f32, scale: i32) {
        let mut cursor = x;
        for ch in text.chars() {
            if let Some(glyph) = glyph_for(ch) {
                for (row, bits) in glyph.iter().enumerate() {
                    for col in 0..GLYPH_WIDTH {
                        if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                            self.blend_rect(
                                cursor + col as i32 * scale,
                                y + row as i32 * scale,
                                scale,
                                scale,
                                colour,
                                alpha,
                            );
                        }
                    }
                }
            }
            cursor += glyph_advance(scale);
        }
    }
}

/// Pixel width of a rendered string at the given scale, for centring.
pub fn text_width(text: &str, scale: i32) -> i32 {
    text.chars().count() as i32 * glyph_advance(scale)
}

pub const GLYPH_WIDTH: usize = 5;
pub const GLYPH_HEIGHT: usize = 7;

fn glyph_advance(scale: i32) -> i32 {
    (GLYPH_WIDTH as i32 + 1) * scale
}

type Glyph = [u8; GLYPH_HEIGHT];

fn glyph_for(ch: char) -> Option<&'static Glyph> {
    let upper = ch.to_ascii_uppercase();
    FONT.iter()
        .find(|(glyph_char, _)| *glyph_char == upper)
        .map(|(_, glyph)| glyph)
}

/// Uppercase 5x7 bitmap font: letters, digits and common lyric punctuation.
#[rustfmt::skip]
const FONT: &[(char, Glyph)] = &[
    ('A', [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('B', [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
    ('C', [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
    ('D', [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110]),
    ('E', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
    ('F', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('G', [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
    ('H', [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('I', [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('J', [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
    ('K', [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
    ('L', [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
    ('M', [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
    ('N', [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001]),
    ('O', [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('P', [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('Q', [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
    ('R', [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
    ('S', [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
    ('T', [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('U', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('V', [0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b01010, 0b00100]),
    ('W', [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001]),
    ('X', [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
    ('Y', [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('Z', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
    ('0', [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
    ('1', [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('2', [0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111]),
    ('3', [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
    ('4', [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
    ('5', [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
    ('6', [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
    ('7', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
    ('8', [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
    ('9', [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
    ('-', [0b00000, 0b00000, 0b00000, 0b01110, 0b00000, 0b00000, 0b00000]),
    ('.', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00110]),
    (',', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00100, 0b01000]),
    ('\'', [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000]),
    ('!', [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100]),
    ('?', [0b01110, 0b10001, 0b00001, 0b00110, 0b00100, 0b00000, 0b00100]),
    ('&', [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101]),
    ('(', [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010]),
    (')', [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000]),
    (':', [0b00000, 0b00110, 0b00110, 0b00000, 0b00110, 0b00110, 0b00000]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_paints_every_pixel() {
        let mut surface = Surface::new(4, 4);
        surface.clear([10, 20, 30, 255]);
        assert!(surface
            .pixels()
            .chunks_exact(4)
            .all(|p| p == [10, 20, 30, 255]));
    }

    #[test]
    fn out_of_bounds_drawing_is_ignored() {
        let mut surface = Surface::new(4, 4);
        surface.put_pixel(-1, 0, WHITE);
        surface.put_pixel(0, 99, WHITE);
        surface.fill_rect(-5, -5, 3, 3, WHITE);
        assert!(surface.pixels().chunks_exact(4).all(|p| p == [0, 0, 0, 0]));
    }

    #[test]
    fn blend_at_full_alpha_replaces_the_colour() {
        let mut surface = Surface::new(2, 2);
        surface.clear(BLACK);
        surface.blend_pixel(0, 0, [200, 100, 50, 255], 1.0);
        assert_eq!(&surface.pixels()[..4], &[200, 100, 50, 255]);
    }

    #[test]
    fn blend_at_zero_alpha_is_a_no_op() {
        let mut surface = Surface::new(2, 2);
        surface.clear(BLACK);
        surface.blend_pixel(0, 0, WHITE, 0.0);
        assert_eq!(&surface.pixels()[..4], &BLACK);
    }

    #[test]
    fn text_leaves_ink_on_the_surface() {
        let mut surface = Surface::new(64, 16);
        surface.clear(BLACK);
        surface.draw_text(1, 1, "Hi!", WHITE, 1.0, 1);
        let lit = surface
            .pixels()
            .chunks_exact(4)
            .filter(|p| p[0] > 0)
            .count();
        assert!(lit > 10);
    }

    #[test]
    fn text_width_scales_linearly() {
        assert_eq!(text_width("ab", 1), 12);
        assert_eq!(text_width("ab", 2), 24);
    }
}
