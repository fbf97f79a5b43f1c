use crate::features::AudioFeatures;
use crate::lyrics::ActiveLine;
use crate::render::{Rgba, Surface};

use super::{draw_lyric_overlay, draw_title_overlay, EffectDescriptor, VisualEffect};

const BACKGROUND: Rgba = [12, 6, 18, 255];
const MAX_PARTICLES: usize = 600;

#[derive(Debug, Clone, Copy)]
struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    life: f32,
}

/// Bass-reactive particle burst: band energy controls spawn rate and launch
/// velocity. The particle buffer lives on the instance, so switching away
/// and back starts from an empty field.
#[derive(Debug)]
pub struct BassParticles {
    particles: Vec<Particle>,
    rng: u64,
}

impl BassParticles {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            rng: 0x9e37_79b9_7f4a_7c15,
        }
    }

    pub fn descriptor() -> EffectDescriptor {
        EffectDescriptor {
            name: "bass-particles",
            draws_background_image: false,
            draws_lyric_words: true,
        }
    }

    // xorshift64*; deterministic per instance, good enough for sparks.
    fn next_unit(&mut self) -> f32 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        (self.rng.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 40) as f32 / (1 << 24) as f32
    }
}

impl VisualEffect for BassParticles {
    fn setup(&mut self, surface: &mut Surface) {
        surface.clear(BACKGROUND);
        self.particles.clear();
    }

    fn draw(&mut self, surface: &mut Surface, features: &AudioFeatures) {
        surface.clear(BACKGROUND);
        let width = surface.width() as f32;
        let height = surface.height() as f32;

        let spawn = (features.band_energy * 24.0) as usize;
        for _ in 0..spawn {
            if self.particles.len() >= MAX_PARTICLES {
                break;
            }
            let angle = self.next_unit() * std::f32::consts::TAU;
            let speed = 1.0 + features.band_energy * 5.0 * self.next_unit();
            self.particles.push(Particle {
                x: width / 2.0,
                y: height / 2.0,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: 1.0,
            });
        }

        for particle in &mut self.particles {
            particle.x += particle.vx;
            particle.y += particle.vy;
            particle.vy += 0.03;
            particle.life -= 0.015;
        }
        self.particles.retain(|particle| {
            particle.life > 0.0
                && particle.x >= -2.0
                && particle.x < width + 2.0
                && particle.y < height + 2.0
        });

        for particle in &self.particles {
            let heat = (particle.life * 255.0) as u8;
            surface.blend_rect(
                particle.x as i32,
                particle.y as i32,
                2,
                2,
                [255, heat, 80, 255],
                particle.life,
            );
        }
    }

    fn draw_title(&mut self, surface: &mut Surface, title: &str) {
        draw_title_overlay(surface, title, [240, 200, 180, 255]);
    }

    fn display_lyrics(
        &mut self,
        surface: &mut Surface,
        line: &ActiveLine,
        is_playing: bool,
        _time: f32,
    ) {
        draw_lyric_overlay(surface, line, is_playing, [255, 240, 220, 255]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particles_spawn_with_energy_and_decay_without() {
        let mut effect = BassParticles::new();
        let mut surface = Surface::new(64, 64);
        effect.setup(&mut surface);

        let loud = AudioFeatures {
            spectrum: vec![0.0; 8],
            band_energy: 1.0,
            waveform: vec![0.0; 8],
        };
        effect.draw(&mut surface, &loud);
        let spawned = effect.particles.len();
        assert!(spawned > 0);

        let quiet = AudioFeatures::default();
        for _ in 0..200 {
            effect.draw(&mut surface, &quiet);
        }
        assert!(effect.particles.len() < spawned);
    }

    #[test]
    fn fresh_instances_do_not_inherit_particles() {
        let mut surface = Surface::new(64, 64);
        let loud = AudioFeatures {
            spectrum: vec![0.0; 8],
            band_energy: 1.0,
            waveform: vec![0.0; 8],
        };
        let mut first = BassParticles::new();
        first.setup(&mut surface);
        first.draw(&mut surface, &loud);
        assert!(!first.particles.is_empty());

        let second = BassParticles::new();
        assert!(second.particles.is_empty());
    }
}
