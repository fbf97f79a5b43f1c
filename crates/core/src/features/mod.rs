use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::config::AudioConfig;
use crate::Result;

/// Spectrum bin values are normalised into this range so effects stay
/// portable across sources and sample rates.
pub const SPECTRUM_MAX: f32 = 255.0;

const SPECTRUM_GAIN: f32 = 4.0;

/// Per-frame audio snapshot consumed by visual effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioFeatures {
    /// Magnitude per frequency bin, each in `[0, SPECTRUM_MAX]`.
    pub spectrum: Vec<f32>,
    /// Smoothed aggregate energy over the configured low band, in `[0, 1]`.
    pub band_energy: f32,
    /// Most recent time-domain samples, clamped to `[-1, 1]`.
    pub waveform: Vec<f32>,
}

/// Extracts a frequency-domain snapshot, a low-band energy scalar and a
/// waveform from the currently playing source, once per rendered frame.
///
/// FFT resources are planned once and reused; the per-frame cost is one
/// windowed transform plus a handful of passes over the bin array.
pub struct AudioFeatureExtractor {
    config: AudioConfig,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
    smoothed_band: f32,
}

impl AudioFeatureExtractor {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            planner: RealFftPlanner::new(),
            fft: None,
            smoothed_band: 0.0,
        }
    }

    /// Samples the given block of time-domain audio.
    ///
    /// Pass `None` (or fewer samples than one FFT window) when no source is
    /// attached or it has not buffered enough data yet: the extractor then
    /// returns a neutral snapshot instead of an error, and lets the smoothed
    /// band energy decay toward silence.
    pub fn sample(&mut self, samples: Option<&[f32]>) -> AudioFeatures {
        let Some(samples) = samples.filter(|s| s.len() >= self.config.fft_size) else {
            return self.neutral();
        };

        match self.analyse(samples) {
            Ok(features) => features,
            Err(error) => {
                tracing::warn!(%error, "feature extraction failed, emitting neutral frame");
                self.neutral()
            }
        }
    }

    fn neutral(&mut self) -> AudioFeatures {
        self.smoothed_band *= 1.0 - self.config.band_decay;
        if self.smoothed_band < 1e-4 {
            self.smoothed_band = 0.0;
        }
        AudioFeatures {
            spectrum: vec![0.0; self.config.spectrum_bins],
            band_energy: self.smoothed_band,
            waveform: vec![0.0; self.config.waveform_len],
        }
    }

    fn analyse(&mut self, samples: &[f32]) -> Result<AudioFeatures> {
        let fft_size = self.config.fft_size;
        let window = &samples[samples.len() - fft_size..];

        let fft = self.prepare_fft(fft_size)?;
        for (index, value) in window.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, fft_size);
        }
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        // Magnitudes normalised so a full-scale sine lands near SPECTRUM_MAX.
        let scale = SPECTRUM_GAIN * SPECTRUM_MAX / fft_size as f32;
        let magnitudes: Vec<f32> = fft
            .spectrum
            .iter()
            .map(|bin| (bin.norm() * scale).clamp(0.0, SPECTRUM_MAX))
            .collect();

        let spectrum = group_bins(&magnitudes, self.config.spectrum_bins);
        let raw_band = self.band_magnitude(&magnitudes, fft_size);
        let factor = if raw_band > self.smoothed_band {
            self.config.band_attack
        } else {
            self.config.band_decay
        };
        self.smoothed_band += (raw_band - self.smoothed_band) * factor;

        let waveform_len = self.config.waveform_len.min(samples.len());
        let waveform = samples[samples.len() - waveform_len..]
            .iter()
            .map(|value| value.clamp(-1.0, 1.0))
            .collect();

        Ok(AudioFeatures {
            spectrum,
            band_energy: self.smoothed_band.clamp(0.0, 1.0),
            waveform,
        })
    }

    /// Mean normalised magnitude over the configured frequency band.
    fn band_magnitude(&self, magnitudes: &[f32], fft_size: usize) -> f32 {
        let bin_hz = self.config.sample_rate as f32 / fft_size as f32;
        let low = (self.config.band_low_hz / bin_hz).floor() as usize;
        let high = ((self.config.band_high_hz / bin_hz).ceil() as usize).min(magnitudes.len() - 1);
        if low >= high {
            return 0.0;
        }

        let sum: f32 = magnitudes[low..=high].iter().sum();
        (sum / (high - low + 1) as f32 / SPECTRUM_MAX).clamp(0.0, 1.0)
    }

    fn prepare_fft(&mut self, size: usize) -> Result<&mut FftResources> {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
            });
        }

        Ok(self.fft.as_mut().expect("fft resources must exist"))
    }
}

/// Averages FFT bins down to a fixed, effect-facing bin count. The DC bin is
/// skipped so a constant offset does not light up the first bar.
fn group_bins(magnitudes: &[f32], bins: usize) -> Vec<f32> {
    if bins == 0 || magnitudes.len() <= 1 {
        return vec![0.0; bins];
    }

    let usable = &magnitudes[1..];
    let group = (usable.len() / bins).max(1);
    (0..bins)
        .map(|i| {
            let start = (i * group).min(usable.len() - 1);
            let end = ((i + 1) * group).min(usable.len());
            let slice = &usable[start..end];
            slice.iter().sum::<f32>() / slice.len() as f32
        })
        .collect()
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for AudioFeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioFeatureExtractor")
            .field("config", &self.config)
            .field("smoothed_band", &self.smoothed_band)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AudioConfig {
        AudioConfig {
            sample_rate: 48_000,
            fft_size: 1_024,
            spectrum_bins: 32,
            waveform_len: 128,
            ..AudioConfig::default()
        }
    }

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn neutral_snapshot_when_no_source_is_attached() {
        let mut extractor = AudioFeatureExtractor::new(config());
        let features = extractor.sample(None);

        assert_eq!(features.spectrum, vec![0.0; 32]);
        assert_eq!(features.waveform, vec![0.0; 128]);
        assert_eq!(features.band_energy, 0.0);
    }

    #[test]
    fn neutral_snapshot_when_starved() {
        let mut extractor = AudioFeatureExtractor::new(config());
        let short = vec![0.5; 100];
        let features = extractor.sample(Some(&short));
        assert_eq!(features.spectrum, vec![0.0; 32]);
    }

    #[test]
    fn spectrum_stays_within_bounds() {
        let mut extractor = AudioFeatureExtractor::new(config());
        let loud = vec![1.0; 1_024];
        let features = extractor.sample(Some(&loud));

        assert_eq!(features.spectrum.len(), 32);
        for bin in &features.spectrum {
            assert!((0.0..=SPECTRUM_MAX).contains(bin));
        }
        assert!((0.0..=1.0).contains(&features.band_energy));
    }

    #[test]
    fn low_tone_registers_band_energy() {
        let mut extractor = AudioFeatureExtractor::new(config());
        let tone = sine(110.0, 48_000, 2_048);

        // Repeated frames let the attack smoothing converge.
        let mut features = AudioFeatures::default();
        for _ in 0..8 {
            features = extractor.sample(Some(&tone));
        }
        assert!(features.band_energy > 0.05, "{}", features.band_energy);
    }

    #[test]
    fn high_tone_barely_moves_the_low_band() {
        let mut extractor = AudioFeatureExtractor::new(config());
        let tone = sine(8_000.0, 48_000, 2_048);

        let mut low_band = 0.0;
        for _ in 0..8 {
            low_band = extractor.sample(Some(&tone)).band_energy;
        }
        assert!(low_band < 0.05, "{low_band}");
    }

    #[test]
    fn band_energy_decays_after_the_source_detaches() {
        let mut extractor = AudioFeatureExtractor::new(config());
        let tone = sine(110.0, 48_000, 2_048);
        for _ in 0..8 {
            extractor.sample(Some(&tone));
        }
        let active = extractor.sample(Some(&tone)).band_energy;

        let decayed = extractor.sample(None).band_energy;
        assert!(decayed <= active);
    }

    #[test]
    fn waveform_is_clamped_and_sized() {
        let mut extractor = AudioFeatureExtractor::new(config());
        let mut samples = vec![0.0; 1_024];
        samples[1_000] = 7.5;
        let features = extractor.sample(Some(&samples));

        assert_eq!(features.waveform.len(), 128);
        assert!(features.waveform.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
