use serde::{Deserialize, Serialize};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub lyrics: LyricConfig,
    pub surface: SurfaceConfig,
    pub capture: CaptureConfig,
}

/// Configuration for the audio feature extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Number of time-domain samples fed into each FFT. Power of two.
    pub fft_size: usize,
    /// Number of spectrum bins handed to effects, after grouping FFT bins.
    pub spectrum_bins: usize,
    /// Low edge of the band-energy window in Hz.
    pub band_low_hz: f32,
    /// High edge of the band-energy window in Hz.
    pub band_high_hz: f32,
    /// Number of raw samples copied into the per-frame waveform snapshot.
    pub waveform_len: usize,
    /// Smoothing factor applied when band energy rises (0..1, higher = snappier).
    pub band_attack: f32,
    /// Smoothing factor applied when band energy falls (0..1).
    pub band_decay: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 2_048,
            spectrum_bins: 64,
            band_low_hz: 20.0,
            band_high_hz: 250.0,
            waveform_len: 512,
            band_attack: 0.6,
            band_decay: 0.12,
        }
    }
}

/// Tunable constants for lyric word fades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricConfig {
    /// Seconds before a word's start at which its fade-in begins.
    pub fade_in_lead: f32,
    /// Fade-out duration is `segment duration / word count * fade_out_scale`.
    /// The scale is a tunable default, not a contract.
    pub fade_out_scale: f32,
    /// Floor applied to the computed fade-out so zero-duration words and
    /// one-word segments never produce a degenerate window.
    pub min_fade_out: f32,
}

impl Default for LyricConfig {
    fn default() -> Self {
        Self {
            fade_in_lead: 0.3,
            fade_out_scale: 0.8,
            min_fade_out: 0.05,
        }
    }
}

/// Dimensions of the software rendering surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
        }
    }
}

/// Configuration for the capture pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub fps: u32,
    /// Ticks discarded after a headless start so the forced zero-seek has
    /// settled before the first recorded frame.
    pub settle_ticks: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            settle_ticks: 12,
        }
    }
}
