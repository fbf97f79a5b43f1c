use crate::features::AudioFeatures;
use crate::lyrics::ActiveLine;
use crate::render::{Rgba, Surface};

use super::{draw_lyric_overlay, draw_title_overlay, EffectDescriptor, VisualEffect};

const BACKGROUND: Rgba = [4, 10, 8, 255];

/// Oscilloscope-style waveform trace; the trace colour warms up with band
/// energy.
#[derive(Debug, Default)]
pub struct WaveformScope {
    smoothed: Vec<f32>,
}

impl WaveformScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> EffectDescriptor {
        EffectDescriptor {
            name: "waveform-scope",
            draws_background_image: false,
            draws_lyric_words: true,
        }
    }
}

impl VisualEffect for WaveformScope {
    fn setup(&mut self, surface: &mut Surface) {
        surface.clear(BACKGROUND);
    }

    fn draw(&mut self, surface: &mut Surface, features: &AudioFeatures) {
        surface.clear(BACKGROUND);
        if features.waveform.is_empty() {
            return;
        }
        if self.smoothed.len() != features.waveform.len() {
            self.smoothed = features.waveform.clone();
        }

        let width = surface.width() as i32;
        let height = surface.height() as i32;
        let mid = height / 2;
        let amplitude = (height as f32 / 2.0 - 10.0).max(1.0);
        let warmth = (features.band_energy * 180.0) as u8;
        let colour = [80u8.saturating_add(warmth), 220, 140, 255];

        let mut previous_y = mid;
        for x in 0..width {
            let sample_index =
                (x as usize * features.waveform.len() / width.max(1) as usize)
                    .min(features.waveform.len() - 1);
            self.smoothed[sample_index] +=
                (features.waveform[sample_index] - self.smoothed[sample_index]) * 0.5;
            let y = mid - (self.smoothed[sample_index] * amplitude) as i32;
            surface.vline(x, previous_y, y, colour);
            previous_y = y;
        }
    }

    fn draw_title(&mut self, surface: &mut Surface, title: &str) {
        draw_title_overlay(surface, title, [180, 220, 200, 255]);
    }

    fn display_lyrics(
        &mut self,
        surface: &mut Surface,
        line: &ActiveLine,
        is_playing: bool,
        _time: f32,
    ) {
        draw_lyric_overlay(surface, line, is_playing, [230, 255, 240, 255]);
    }
}
