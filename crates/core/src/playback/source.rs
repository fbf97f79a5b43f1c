use std::collections::{HashMap, HashSet, VecDeque};
use std::f32::consts::PI;

use crate::{Result, VizError};

/// Events a source reports back to the transport, drained once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Enough data is buffered to begin playback.
    Ready { duration: f32 },
    /// Playback reached the natural end of the track.
    Ended,
    /// The source failed to load or decode.
    Error(String),
}

/// One attached audio source. Exactly one lives per playback session; the
/// transport owns it exclusively and the capture pipeline only taps it.
pub trait AudioSource {
    /// Advances the source by `dt` seconds of wall-clock time. Loading,
    /// playback position and event emission all happen here. The render
    /// loop drives sources cooperatively and never blocks on them.
    fn advance(&mut self, dt: f32);

    /// Begins playback. Fails with [`VizError::TransportRace`] when the
    /// source is not (or no longer) ready to play.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Requests a jump to `to` seconds. Applied on a later `advance`, so the
    /// transport keeps its seeking state until [`seek_pending`] clears.
    fn seek(&mut self, to: f32);

    /// True while a requested seek has not been applied yet.
    fn seek_pending(&self) -> bool;

    fn position(&self) -> f32;

    /// Duration, known once the source is ready.
    fn duration(&self) -> Option<f32>;

    fn is_ready(&self) -> bool;

    /// Drains events accumulated since the last call, oldest first.
    fn take_events(&mut self) -> Vec<SourceEvent>;

    /// Copies the most recent `out.len()` mono samples into `out`. Returns
    /// `false` when the source has not buffered that much yet; the feature
    /// extractor then emits a neutral snapshot.
    fn tap(&mut self, out: &mut [f32]) -> bool;
}

/// Opens audio sources for song URLs. The surrounding application supplies a
/// real decoder-backed factory; the core ships [`SimulatedFactory`] for the
/// CLI demo and tests.
pub trait SourceFactory {
    fn open(&self, url: &str) -> Box<dyn AudioSource>;
}

/// Deterministic source used by the CLI demo and the test suite: a sine
/// generator with a configurable load delay and a natural end at the
/// configured duration.
pub struct SimulatedSource {
    url: String,
    sample_rate: u32,
    duration: f32,
    ready_delay: f32,
    fail_load: bool,

    loaded_for: f32,
    ready: bool,
    playing: bool,
    position: f32,
    pending_seek: Option<f32>,
    phase: f32,
    events: Vec<SourceEvent>,
    ring: VecDeque<f32>,
}

const RING_CAPACITY: usize = 8_192;

impl SimulatedSource {
    pub fn new(url: &str, sample_rate: u32, duration: f32, ready_delay: f32) -> Self {
        Self {
            url: url.to_string(),
            sample_rate,
            duration,
            ready_delay,
            fail_load: false,
            loaded_for: 0.0,
            ready: false,
            playing: false,
            position: 0.0,
            pending_seek: None,
            phase: 0.0,
            events: Vec::new(),
            ring: VecDeque::with_capacity(RING_CAPACITY),
        }
    }

    fn failing(mut self) -> Self {
        self.fail_load = true;
        self
    }

    fn generate(&mut self, dt: f32) {
        // Two partials plus a slow swell keep the spectrum lively without
        // pulling in a decoder.
        let count = (dt * self.sample_rate as f32) as usize;
        let step = 1.0 / self.sample_rate as f32;
        for _ in 0..count {
            self.phase += step;
            let t = self.phase;
            let swell = 0.6 + 0.4 * (2.0 * PI * 0.5 * t).sin();
            let sample = swell * (0.7 * (2.0 * PI * 110.0 * t).sin() + 0.3 * (2.0 * PI * 440.0 * t).sin());
            if self.ring.len() == RING_CAPACITY {
                self.ring.pop_front();
            }
            self.ring.push_back(sample);
        }
    }
}

impl AudioSource for SimulatedSource {
    fn advance(&mut self, dt: f32) {
        if !self.ready {
            self.loaded_for += dt;
            if self.loaded_for >= self.ready_delay {
                if self.fail_load {
                    self.events
                        .push(SourceEvent::Error("simulated decode failure".into()));
                } else {
                    self.ready = true;
                    self.events.push(SourceEvent::Ready {
                        duration: self.duration,
                    });
                }
                // One-shot: keep quiet afterwards.
                self.loaded_for = f32::NEG_INFINITY;
            }
            return;
        }

        if let Some(to) = self.pending_seek.take() {
            self.position = to.clamp(0.0, self.duration);
        }

        if self.playing {
            self.position += dt;
            self.generate(dt);
            if self.position >= self.duration {
                self.position = self.duration;
                self.playing = false;
                self.events.push(SourceEvent::Ended);
            }
        }
    }

    fn play(&mut self) -> Result<()> {
        if !self.ready {
            return Err(VizError::TransportRace(format!(
                "source `{}` is not ready to play",
                self.url
            )));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, to: f32) {
        self.pending_seek = Some(to);
    }

    fn seek_pending(&self) -> bool {
        self.pending_seek.is_some()
    }

    fn position(&self) -> f32 {
        self.position
    }

    fn duration(&self) -> Option<f32> {
        self.ready.then_some(self.duration)
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn take_events(&mut self) -> Vec<SourceEvent> {
        std::mem::take(&mut self.events)
    }

    fn tap(&mut self, out: &mut [f32]) -> bool {
        if self.ring.len() < out.len() {
            return false;
        }
        let start = self.ring.len() - out.len();
        for (index, slot) in out.iter_mut().enumerate() {
            *slot = self.ring[start + index];
        }
        true
    }
}

/// Factory for [`SimulatedSource`] instances, with per-URL durations and
/// injectable load failures.
pub struct SimulatedFactory {
    sample_rate: u32,
    ready_delay: f32,
    default_duration: f32,
    durations: HashMap<String, f32>,
    failing: HashSet<String>,
}

impl SimulatedFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ready_delay: 0.1,
            default_duration: 30.0,
            durations: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn with_ready_delay(mut self, seconds: f32) -> Self {
        self.ready_delay = seconds;
        self
    }

    pub fn set_duration(&mut self, url: &str, seconds: f32) {
        self.durations.insert(url.to_string(), seconds);
    }

    /// All subsequent opens of `url` report a load error instead of Ready.
    pub fn fail_url(&mut self, url: &str) {
        self.failing.insert(url.to_string());
    }
}

impl SourceFactory for SimulatedFactory {
    fn open(&self, url: &str) -> Box<dyn AudioSource> {
        let duration = self
            .durations
            .get(url)
            .copied()
            .unwrap_or(self.default_duration);
        let source = SimulatedSource::new(url, self.sample_rate, duration, self.ready_delay);
        if self.failing.contains(url) {
            Box::new(source.failing())
        } else {
            Box::new(source)
        }
    }
}
