//! Transport state machine owning the single active audio source.
//!
//! The transport is modelled as an explicit state machine rather than a set
//! of booleans so that awkward interactions (a stray "ended" event raised by
//! a rewind-to-zero seek, a play racing a superseded load) are transition
//! rules that can be unit tested in isolation.

use serde::Serialize;

use crate::song::Song;
use crate::VizError;

pub mod source;

pub use source::{AudioSource, SimulatedFactory, SimulatedSource, SourceEvent, SourceFactory};

/// Transport states. `Seeking` remembers whether to resume into `Playing`
/// or settle into `Paused` once the jump lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportState {
    Idle,
    Loading,
    Playing,
    Paused,
    Seeking,
    Ended,
}

/// Snapshot of the playback session for UI binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: TransportState,
    pub is_playing: bool,
    pub is_seeking: bool,
    pub is_audio_loading: bool,
    pub is_ended: bool,
    pub position: f32,
    pub duration: f32,
    pub current_index: Option<usize>,
    /// Most recent non-fatal playback error, already reported via tracing.
    pub error: Option<String>,
}

/// Owns the active audio source and the song list, and exposes the
/// transport contract: select/toggle/seek/next/prev/stop.
pub struct PlaybackController {
    songs: Vec<Song>,
    factory: Box<dyn SourceFactory>,
    source: Option<Box<dyn AudioSource>>,
    current_index: Option<usize>,
    state: TransportState,
    resume_after_seek: bool,
    /// Bumped on every source swap; late completions for older generations
    /// can only belong to sources that were already dropped.
    generation: u64,
    play_retried: bool,
    duration: f32,
    last_error: Option<String>,
}

impl PlaybackController {
    pub fn new(songs: Vec<Song>, factory: Box<dyn SourceFactory>) -> Self {
        Self {
            songs,
            factory,
            source: None,
            current_index: None,
            state: TransportState::Idle,
            resume_after_seek: false,
            generation: 0,
            play_retried: false,
            duration: 0.0,
            last_error: None,
        }
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current_index.and_then(|index| self.songs.get(index))
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Stops and releases whatever is currently attached, then loads and
    /// plays the song at `index`. Releasing first is what prevents the
    /// "wrong song audio" race: a superseded source can never emit into the
    /// new session because it no longer exists.
    pub fn select_and_play(&mut self, index: usize) -> crate::Result<()> {
        let song = self
            .songs
            .get(index)
            .ok_or_else(|| VizError::UnknownName {
                kind: "song index",
                name: index.to_string(),
            })?;
        let duration = song.duration_seconds;
        let title = song.title.clone();
        let url = song.audio_source.clone();

        self.release_source("superseded by new selection");
        self.generation += 1;
        self.play_retried = false;
        self.last_error = None;
        self.resume_after_seek = false;
        self.duration = duration;
        self.current_index = Some(index);
        self.state = TransportState::Loading;

        tracing::info!(
            generation = self.generation,
            title = %title,
            "loading song"
        );
        self.source = Some(self.factory.open(&url));
        Ok(())
    }

    /// Flips play/pause on the currently attached source. No-op while no
    /// song is loaded or a load/seek is in flight.
    pub fn toggle_play(&mut self) {
        let Some(source) = self.source.as_mut() else {
            tracing::debug!("toggle_play ignored, no song loaded");
            return;
        };

        match self.state {
            TransportState::Playing => {
                source.pause();
                self.state = TransportState::Paused;
            }
            TransportState::Paused => match source.play() {
                Ok(()) => self.state = TransportState::Playing,
                Err(error) => {
                    tracing::warn!(%error, "resume failed");
                    self.last_error = Some(error.to_string());
                }
            },
            TransportState::Ended => {
                // Replay from the top; the rewind goes through the seeking
                // state so the jump cannot be mistaken for a real end.
                source.seek(0.0);
                self.resume_after_seek = true;
                self.state = TransportState::Seeking;
            }
            TransportState::Idle | TransportState::Loading | TransportState::Seeking => {
                tracing::debug!(state = ?self.state, "toggle_play ignored");
            }
        }
    }

    /// Jumps to `to` seconds, clamped to `[0, duration]`.
    pub fn seek(&mut self, to: f32) {
        let Some(source) = self.source.as_mut() else {
            tracing::debug!("seek ignored, no song loaded");
            return;
        };
        if matches!(self.state, TransportState::Idle | TransportState::Loading) {
            tracing::debug!(state = ?self.state, "seek ignored");
            return;
        }

        let resume = match self.state {
            TransportState::Playing => true,
            TransportState::Seeking => self.resume_after_seek,
            _ => false,
        };
        let clamped = to.clamp(0.0, self.duration.max(0.0));
        source.seek(clamped);
        self.resume_after_seek = resume;
        self.state = TransportState::Seeking;
    }

    /// Advances to the next song, wrapping past the end of the list.
    pub fn next(&mut self) -> crate::Result<()> {
        self.step(1)
    }

    /// Returns to the previous song, wrapping past the start of the list.
    pub fn prev(&mut self) -> crate::Result<()> {
        self.step(-1)
    }

    fn step(&mut self, direction: isize) -> crate::Result<()> {
        if self.songs.is_empty() {
            tracing::debug!("next/prev ignored, song list is empty");
            return Ok(());
        }
        let len = self.songs.len() as isize;
        let index = match self.current_index {
            Some(current) => (current as isize + direction).rem_euclid(len) as usize,
            None => 0,
        };
        self.select_and_play(index)
    }

    /// Tears the session down: stops audio and releases the source.
    pub fn stop_all(&mut self) {
        self.release_source("session stopped");
        self.current_index = None;
        self.state = TransportState::Idle;
        self.resume_after_seek = false;
    }

    /// Drives the attached source by `dt` seconds and applies its events to
    /// the state machine. Called once per rendered frame.
    pub fn tick(&mut self, dt: f32) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        source.advance(dt);
        let events = source.take_events();
        for event in events {
            self.apply_event(event);
        }

        // A landed seek transitions back out of Seeking.
        if self.state == TransportState::Seeking {
            if let Some(source) = self.source.as_mut() {
                if !source.seek_pending() {
                    self.state = if self.resume_after_seek {
                        match source.play() {
                            Ok(()) => TransportState::Playing,
                            Err(error) => {
                                tracing::warn!(%error, "resume after seek failed");
                                self.last_error = Some(error.to_string());
                                TransportState::Paused
                            }
                        }
                    } else {
                        TransportState::Paused
                    };
                }
            }
        }
    }

    fn apply_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Ready { duration } => self.on_ready(duration),
            SourceEvent::Ended => match self.state {
                // The discontinuity of an in-flight seek can surface as a
                // spurious end-of-track; it is not a real completion.
                TransportState::Seeking => {
                    tracing::debug!("ignoring ended event during seek");
                }
                TransportState::Playing => {
                    tracing::info!("track finished");
                    self.state = TransportState::Ended;
                }
                _ => {
                    tracing::debug!(state = ?self.state, "ignoring ended event");
                }
            },
            SourceEvent::Error(reason) => {
                let url = self
                    .current_song()
                    .map(|song| song.audio_source.clone())
                    .unwrap_or_default();
                let error = VizError::source_load(url, reason);
                tracing::error!(%error, "audio source failed");
                self.last_error = Some(error.to_string());
                self.release_source("load failed");
                self.state = TransportState::Idle;
            }
        }
    }

    fn on_ready(&mut self, duration: f32) {
        if self.state != TransportState::Loading {
            tracing::debug!(state = ?self.state, "ignoring ready event");
            return;
        }
        if duration > 0.0 {
            self.duration = duration;
        }

        let play_result = match self.source.as_mut() {
            Some(source) => source.play(),
            None => return,
        };
        match play_result {
            Ok(()) => {
                tracing::info!(generation = self.generation, "playback started");
                self.state = TransportState::Playing;
            }
            Err(error) if !self.play_retried => {
                // One retry against the latest song; a second failure is
                // surfaced instead of looping.
                self.play_retried = true;
                tracing::warn!(%error, "play raced a superseded source, retrying once");
                if let Some(song) = self.current_song() {
                    let url = song.audio_source.clone();
                    self.release_source("retrying after transport race");
                    self.source = Some(self.factory.open(&url));
                    self.state = TransportState::Loading;
                }
            }
            Err(error) => {
                tracing::error!(%error, "play failed after retry");
                self.last_error = Some(error.to_string());
                self.state = TransportState::Paused;
            }
        }
    }

    fn release_source(&mut self, reason: &str) {
        if let Some(mut source) = self.source.take() {
            source.pause();
            tracing::debug!(generation = self.generation, reason, "released audio source");
        }
    }

    pub fn position(&self) -> f32 {
        self.source
            .as_ref()
            .map(|source| source.position())
            .unwrap_or(0.0)
    }

    /// Read-only audio tap for the feature extractor and capture pipeline.
    /// Returns `false` while the source has not buffered `out.len()` samples.
    pub fn tap(&mut self, out: &mut [f32]) -> bool {
        match self.source.as_mut() {
            Some(source) => source.tap(out),
            None => false,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            is_playing: self.state == TransportState::Playing,
            is_seeking: self.state == TransportState::Seeking,
            is_audio_loading: self.state == TransportState::Loading,
            is_ended: self.state == TransportState::Ended,
            position: self.position(),
            duration: self.duration,
            current_index: self.current_index,
            error: self.last_error.clone(),
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("current_index", &self.current_index)
            .field("generation", &self.generation)
            .field("songs", &self.songs.len())
            .finish()
    }
}
