//! Visual effect contract and registry.
//!
//! Every effect is an instance object constructed by the registry at
//! selection time. All working state (particle buffers, cached images,
//! smoothed values) lives on the instance, so switching effects abandons the
//! old state wholesale and the new effect's first frame starts clean.

use std::sync::Arc;

use serde::Serialize;

use crate::assets::ImageAsset;
use crate::features::AudioFeatures;
use crate::lyrics::ActiveLine;
use crate::render::{text_width, Rgba, Surface};
use crate::{Result, VizError};

mod artwork;
mod bars;
mod particles;
mod plasma;
mod radial;
mod scope;

pub use artwork::ArtworkBackdrop;
pub use bars::SpectrumBars;
pub use particles::BassParticles;
pub use plasma::Plasma;
pub use radial::RadialPulse;
pub use scope::WaveformScope;

/// The contract every swappable visual effect satisfies.
///
/// `draw` runs once per tick and must tolerate whatever state the session is
/// in: silence, missing artwork, an empty lyric line. Optional asset loading
/// is fire-and-forget through [`set_artwork`](VisualEffect::set_artwork);
/// `draw` never waits for it.
pub trait VisualEffect {
    /// One-time initialisation after the effect becomes active.
    fn setup(&mut self, surface: &mut Surface);

    /// Renders one frame from the current audio features.
    fn draw(&mut self, surface: &mut Surface, features: &AudioFeatures);

    /// Renders the song title overlay.
    fn draw_title(&mut self, surface: &mut Surface, title: &str);

    /// Renders the lyric overlay for the resolved active line.
    fn display_lyrics(
        &mut self,
        surface: &mut Surface,
        line: &ActiveLine,
        is_playing: bool,
        time: f32,
    );

    /// Delivers song artwork requested through the registry's loader hook.
    /// Default: the effect does not use images.
    fn set_artwork(&mut self, _image: Arc<ImageAsset>) {}
}

/// Immutable description of a registered effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectDescriptor {
    /// Unique, stable name used for selection and persistence.
    pub name: &'static str,
    /// Whether the effect wants song artwork loaded for it.
    pub draws_background_image: bool,
    /// Whether the effect renders per-word lyric overlays.
    pub draws_lyric_words: bool,
}

type EffectCtor = fn() -> Box<dyn VisualEffect>;

struct RegistryEntry {
    descriptor: EffectDescriptor,
    ctor: EffectCtor,
}

struct ActiveEffect {
    name: &'static str,
    instance: Box<dyn VisualEffect>,
    needs_setup: bool,
}

/// Ordered catalog of available effects plus the currently selected one.
///
/// Selection is by name, never by positional index, so it stays stable when
/// the catalog gains or loses entries. Iteration order is registration order.
#[derive(Default)]
pub struct EffectRegistry {
    entries: Vec<RegistryEntry>,
    active: Option<ActiveEffect>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in effects, in catalog order.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(EffectDescriptor, EffectCtor); 6] = [
            (SpectrumBars::descriptor(), || Box::new(SpectrumBars::new())),
            (WaveformScope::descriptor(), || {
                Box::new(WaveformScope::new())
            }),
            (BassParticles::descriptor(), || {
                Box::new(BassParticles::new())
            }),
            (RadialPulse::descriptor(), || Box::new(RadialPulse::new())),
            (Plasma::descriptor(), || Box::new(Plasma::new())),
            (ArtworkBackdrop::descriptor(), || {
                Box::new(ArtworkBackdrop::new())
            }),
        ];
        for (descriptor, ctor) in builtins {
            registry
                .register(descriptor, ctor)
                .expect("builtin effect names are unique");
        }
        registry
    }

    /// Adds an effect to the catalog. Names must be unique.
    pub fn register(&mut self, descriptor: EffectDescriptor, ctor: EffectCtor) -> Result<()> {
        if self
            .entries
            .iter()
            .any(|entry| entry.descriptor.name == descriptor.name)
        {
            return Err(VizError::InvalidInput(
                "effect name is already registered",
            ));
        }
        self.entries.push(RegistryEntry { descriptor, ctor });
        Ok(())
    }

    /// Catalog in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    pub fn descriptor(&self, name: &str) -> Option<&EffectDescriptor> {
        self.entries
            .iter()
            .map(|entry| &entry.descriptor)
            .find(|descriptor| descriptor.name == name)
    }

    /// Makes `name` the active effect, constructing a fresh instance. The
    /// previous instance and all of its transient state are dropped.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.descriptor.name == name)
            .ok_or_else(|| VizError::UnknownName {
                kind: "effect",
                name: name.to_string(),
            })?;

        tracing::info!(effect = entry.descriptor.name, "effect selected");
        self.active = Some(ActiveEffect {
            name: entry.descriptor.name,
            instance: (entry.ctor)(),
            needs_setup: true,
        });
        Ok(())
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|active| active.name)
    }

    pub fn active_descriptor(&self) -> Option<&EffectDescriptor> {
        self.active_name().and_then(|name| self.descriptor(name))
    }

    /// The active instance, running `setup` first if it has not run yet.
    pub fn active_effect(&mut self, surface: &mut Surface) -> Option<&mut dyn VisualEffect> {
        let active = self.active.as_mut()?;
        if active.needs_setup {
            active.instance.setup(surface);
            active.needs_setup = false;
        }
        Some(active.instance.as_mut())
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("entries", &self.entries.len())
            .field("active", &self.active_name())
            .finish()
    }
}

// Shared overlay helpers. Effects pick their own colours but all lay text
// out the same way.

const TITLE_SCALE: i32 = 2;
const LYRIC_SCALE: i32 = 3;
const WORD_GAP: i32 = 6;

pub(crate) fn draw_title_overlay(surface: &mut Surface, title: &str, colour: Rgba) {
    surface.draw_text(10, 10, title, colour, 0.9, TITLE_SCALE);
}

/// Centred lyric line near the bottom edge, one alpha per word. Paused
/// playback dims the whole line.
pub(crate) fn draw_lyric_overlay(
    surface: &mut Surface,
    line: &ActiveLine,
    is_playing: bool,
    colour: Rgba,
) {
    if line.is_empty() {
        return;
    }

    let total: i32 = line
        .words
        .iter()
        .map(|word| text_width(&word.text, LYRIC_SCALE))
        .sum::<i32>()
        + WORD_GAP * (line.words.len() as i32 - 1);
    let mut x = (surface.width() as i32 - total) / 2;
    let y = surface.height() as i32 - 8 * LYRIC_SCALE - 12;
    let dim = if is_playing { 1.0 } else { 0.6 };

    for word in &line.words {
        if word.opacity > 0.0 {
            surface.draw_text(x, y, &word.text, colour, word.opacity * dim, LYRIC_SCALE);
        }
        x += text_width(&word.text, LYRIC_SCALE) + WORD_GAP;
    }
}
