use std::sync::Arc;

use crate::assets::ImageAsset;
use crate::features::AudioFeatures;
use crate::lyrics::ActiveLine;
use crate::render::{Rgba, Surface};

use super::{draw_lyric_overlay, draw_title_overlay, EffectDescriptor, VisualEffect};

const FALLBACK_TOP: Rgba = [30, 20, 50, 255];
const FALLBACK_BOTTOM: Rgba = [5, 5, 12, 255];

/// Song artwork scaled to fill the surface, brightened by band energy.
/// Until the artwork arrives, a dark gradient stands in. Loading is
/// fire-and-forget and never blocks a frame.
#[derive(Debug, Default)]
pub struct ArtworkBackdrop {
    image: Option<Arc<ImageAsset>>,
}

impl ArtworkBackdrop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptor() -> EffectDescriptor {
        EffectDescriptor {
            name: "artwork-backdrop",
            draws_background_image: true,
            draws_lyric_words: true,
        }
    }

    fn draw_fallback(surface: &mut Surface) {
        let height = surface.height();
        let width = surface.width() as i32;
        for y in 0..height {
            let t = y as f32 / height.max(1) as f32;
            let colour = [
                (FALLBACK_TOP[0] as f32 * (1.0 - t) + FALLBACK_BOTTOM[0] as f32 * t) as u8,
                (FALLBACK_TOP[1] as f32 * (1.0 - t) + FALLBACK_BOTTOM[1] as f32 * t) as u8,
                (FALLBACK_TOP[2] as f32 * (1.0 - t) + FALLBACK_BOTTOM[2] as f32 * t) as u8,
                255,
            ];
            surface.fill_rect(0, y as i32, width, 1, colour);
        }
    }
}

impl VisualEffect for ArtworkBackdrop {
    fn setup(&mut self, surface: &mut Surface) {
        Self::draw_fallback(surface);
    }

    fn draw(&mut self, surface: &mut Surface, features: &AudioFeatures) {
        let Some(image) = self.image.clone() else {
            Self::draw_fallback(surface);
            return;
        };
        if image.width == 0 || image.height == 0 {
            Self::draw_fallback(surface);
            return;
        }

        // Nearest-neighbour stretch; brightness rides the band energy.
        let brightness = 0.55 + features.band_energy * 0.45;
        let width = surface.width();
        let height = surface.height();
        for y in 0..height {
            let src_y = y * image.height / height.max(1);
            for x in 0..width {
                let src_x = x * image.width / width.max(1);
                let offset = (src_y * image.width + src_x) * 4;
                let colour = [
                    (image.rgba[offset] as f32 * brightness) as u8,
                    (image.rgba[offset + 1] as f32 * brightness) as u8,
                    (image.rgba[offset + 2] as f32 * brightness) as u8,
                    255,
                ];
                surface.put_pixel(x as i32, y as i32, colour);
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

    fn set_artwork(&mut self, image: Arc<ImageAsset>) {
        self.image = Some(image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_fallback_until_artwork_arrives() {
        let mut effect = ArtworkBackdrop::new();
        let mut surface = Surface::new(16, 16);
        effect.setup(&mut surface);
        effect.draw(&mut surface, &AudioFeatures::default());
        let before = surface.pixels().to_vec();

        effect.set_artwork(Arc::new(ImageAsset::solid(4, 4, [200, 10, 10, 255])));
        effect.draw(&mut surface, &AudioFeatures::default());
        assert_ne!(surface.pixels(), before.as_slice());
        // Red artwork dominates the frame once set.
        assert!(surface.pixels()[0] > surface.pixels()[2]);
    }
}
