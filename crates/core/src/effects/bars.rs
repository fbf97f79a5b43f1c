use crate::features::{AudioFeatures, SPECTRUM_MAX};
use crate::lyrics::ActiveLine;
use crate::render::{Rgba, Surface};

use super::{draw_lyric_overlay, draw_title_overlay, EffectDescriptor, VisualEffect};

const BACKGROUND: Rgba = [8, 8, 16, 255];
const PEAK_DECAY: f32 = 0.96;

/// Classic spectrum analyser: one bar per bin with a slowly falling peak cap.
#[derive(Debug, Default)]
pub struct SpectrumBars {
    peaks: Vec<f32>,
}

impl SpectrumBars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> EffectDescriptor {
        EffectDescriptor {
            name: "spectrum-bars",
            draws_background_image: false,
            draws_lyric_words: true,
        }
    }
}

impl VisualEffect for SpectrumBars {
    fn setup(&mut self, surface: &mut Surface) {
        surface.clear(BACKGROUND);
    }

    fn draw(&mut self, surface: &mut Surface, features: &AudioFeatures) {
        surface.clear(BACKGROUND);
        if features.spectrum.is_empty() {
            return;
        }
        if self.peaks.len() != features.spectrum.len() {
            self.peaks = vec![0.0; features.spectrum.len()];
        }

        let width = surface.width() as i32;
        let height = surface.height() as i32;
        let bar_width = (width / features.spectrum.len() as i32).max(1);

        for (index, value) in features.spectrum.iter().enumerate() {
            let level = value / SPECTRUM_MAX;
            self.peaks[index] = (self.peaks[index] * PEAK_DECAY).max(level);

            let bar_height = (level * (height as f32 - 20.0)) as i32;
            let x = index as i32 * bar_width;
            let hue = index as f32 / features.spectrum.len() as f32;
            let colour = [
                (80.0 + 160.0 * hue) as u8,
                (220.0 - 140.0 * hue) as u8,
                200,
                255,
            ];
            surface.fill_rect(x, height - bar_height, bar_width - 1, bar_height, colour);

            let peak_y = height - (self.peaks[index] * (height as f32 - 20.0)) as i32 - 2;
            surface.fill_rect(x, peak_y, bar_width - 1, 2, [240, 240, 240, 255]);
        }
    }

    fn draw_title(&mut self, surface: &mut Surface, title: &str) {
        draw_title_overlay(surface, title, [200, 200, 220, 255]);
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
