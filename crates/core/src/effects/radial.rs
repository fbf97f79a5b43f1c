use std::f32::consts::TAU;

use crate::features::{AudioFeatures, SPECTRUM_MAX};
use crate::lyrics::ActiveLine;
use crate::render::{Rgba, Surface};

use super::{draw_lyric_overlay, draw_title_overlay, EffectDescriptor, VisualEffect};

const BACKGROUND: Rgba = [6, 6, 10, 255];

/// Spectrum wrapped around a slowly rotating ring; the ring radius breathes
/// with band energy.
#[derive(Debug, Default)]
pub struct RadialPulse {
    rotation: f32,
    radius: f32,
}

impl RadialPulse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> EffectDescriptor {
        EffectDescriptor {
            name: "radial-pulse",
            draws_background_image: false,
            draws_lyric_words: true,
        }
    }
}

impl VisualEffect for RadialPulse {
    fn setup(&mut self, surface: &mut Surface) {
        surface.clear(BACKGROUND);
        self.radius = surface.height() as f32 / 5.0;
    }

    fn draw(&mut self, surface: &mut Surface, features: &AudioFeatures) {
        surface.clear(BACKGROUND);
        let cx = surface.width() as f32 / 2.0;
        let cy = surface.height() as f32 / 2.0;
        let base = surface.height() as f32 / 5.0;

        let target = base * (1.0 + features.band_energy * 0.8);
        self.radius += (target - self.radius) * 0.3;
        self.rotation = (self.rotation + 0.01 + features.band_energy * 0.05) % TAU;

        if features.spectrum.is_empty() {
            return;
        }
        for (index, value) in features.spectrum.iter().enumerate() {
            let level = value / SPECTRUM_MAX;
            let angle = self.rotation + TAU * index as f32 / features.spectrum.len() as f32;
            let reach = self.radius + level * base * 1.5;

            // One spoke per bin, drawn as sampled points.
            let steps = reach as i32;
            for step in 0..steps {
                let distance = self.radius + (reach - self.radius) * step as f32 / steps as f32;
                let x = cx + angle.cos() * distance;
                let y = cy + angle.sin() * distance;
                let fade = 1.0 - step as f32 / steps.max(1) as f32 * 0.6;
                surface.blend_pixel(
                    x as i32,
                    y as i32,
                    [120, (100.0 + 155.0 * level) as u8, 255, 255],
                    fade,
                );
            }
        }
    }

    fn draw_title(&mut self, surface: &mut Surface, title: &str) {
        draw_title_overlay(surface, title, [170, 180, 255, 255]);
    }

    fn display_lyrics(
        &mut self,
        surface: &mut Surface,
        line: &ActiveLine,
        is_playing: bool,
        _time: f32,
    ) {
        draw_lyric_overlay(surface, line, is_playing, [220, 225, 255, 255]);
    }
}
