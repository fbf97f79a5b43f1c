use crate::features::AudioFeatures;
use crate::lyrics::ActiveLine;
use crate::render::Surface;

use super::{draw_lyric_overlay, draw_title_overlay, EffectDescriptor, VisualEffect};

// Coarse cell size keeps the per-frame cost proportional to the surface
// area / 16 rather than per pixel.
const CELL: usize = 4;

/// Old-school plasma field; band energy speeds the phase up so the pattern
/// pulses with the music.
#[derive(Debug, Default)]
pub struct Plasma {
    phase: f32,
}

impl Plasma {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> EffectDescriptor {
        EffectDescriptor {
            name: "plasma",
            draws_background_image: false,
            draws_lyric_words: true,
        }
    }
}

impl VisualEffect for Plasma {
    fn setup(&mut self, _surface: &mut Surface) {
        self.phase = 0.0;
    }

    fn draw(&mut self, surface: &mut Surface, features: &AudioFeatures) {
        self.phase += 0.03 + features.band_energy * 0.12;
        let phase = self.phase;

        let width = surface.width();
        let height = surface.height();
        for cell_y in 0..height.div_ceil(CELL) {
            for cell_x in 0..width.div_ceil(CELL) {
                let fx = cell_x as f32 * CELL as f32 / width as f32;
                let fy = cell_y as f32 * CELL as f32 / height as f32;
                let value = ((fx * 10.0 + phase).sin()
                    + (fy * 8.0 - phase * 0.7).sin()
                    + ((fx + fy) * 6.0 + phase * 1.3).sin())
                    / 3.0;
                let level = (value + 1.0) / 2.0;
                let colour = [
                    (level * 200.0) as u8,
                    (40.0 + level * 80.0) as u8,
                    (120.0 + (1.0 - level) * 135.0) as u8,
                    255,
                ];
                surface.fill_rect(
                    (cell_x * CELL) as i32,
                    (cell_y * CELL) as i32,
                    CELL as i32,
                    CELL as i32,
                    colour,
                );
            }
        }
    }

    fn draw_title(&mut self, surface: &mut Surface, title: &str) {
        draw_title_overlay(surface, title, [255, 255, 255, 255]);
    }

    fn display_lyrics(
        &mut self,
        surface: &mut Surface,
        line: &ActiveLine,
        is_playing: bool,
        _time: f32,
    ) {
        draw_lyric_overlay(surface, line, is_playing, [255, 255, 255, 255]);
    }
}
