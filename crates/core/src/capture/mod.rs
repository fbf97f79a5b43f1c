//! Records rendered frames plus the live audio tap into one output blob.
//!
//! One pipeline serves both recording strategies. They differ only in what
//! happens before recording starts: the headless path forces a seek to zero
//! and discards a few settle ticks so an in-flight seek can never truncate
//! the lead-in. Everything from the first pushed frame to `stop` is
//! strategy-agnostic.

use serde::Serialize;

use crate::config::CaptureConfig;
use crate::playback::PlaybackController;
use crate::render::Surface;
use crate::{Result, VizError};

/// Capture session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureState {
    Idle,
    Armed,
    Recording,
    Finalizing,
    Done,
    Failed,
}

/// How the recording is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    /// Tap the on-screen surface and the already-playing source as-is.
    Interactive,
    /// Script-driven export: start from zero and run to the natural end.
    Headless,
}

/// The finished recording: a single playable blob plus its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutput {
    pub bytes: Vec<u8>,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub sample_rate: u32,
}

/// Magic bytes at the start of every capture blob.
pub const CAPTURE_MAGIC: &[u8; 4] = b"SVIZ";

/// Multiplexes per-tick frame and audio chunks into one output.
#[derive(Debug)]
pub struct CapturePipeline {
    config: CaptureConfig,
    sample_rate: u32,
    state: CaptureState,
    strategy: CaptureStrategy,
    chunks: Vec<Vec<u8>>,
    frame_count: u32,
    settle_remaining: u32,
    sink_dims: Option<(u32, u32)>,
    failure: Option<String>,
}

impl CapturePipeline {
    pub fn new(config: CaptureConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            state: CaptureState::Idle,
            strategy: CaptureStrategy::Interactive,
            chunks: Vec::new(),
            frame_count: 0,
            settle_remaining: 0,
            sink_dims: None,
            failure: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn strategy(&self) -> CaptureStrategy {
        self.strategy
    }

    /// Reason the last session failed, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.state == CaptureState::Done
    }

    fn is_session_active(&self) -> bool {
        matches!(
            self.state,
            CaptureState::Armed | CaptureState::Recording | CaptureState::Finalizing
        )
    }

    /// Reserves the pipeline for a new session with the given strategy.
    /// Refused (no-op, logged) while another session is active.
    pub fn arm(&mut self, strategy: CaptureStrategy) {
        if self.is_session_active() {
            tracing::warn!(state = ?self.state, "arm refused, capture session already active");
            return;
        }
        self.state = CaptureState::Armed;
        self.strategy = strategy;
        self.chunks.clear();
        self.frame_count = 0;
        self.settle_remaining = 0;
        self.sink_dims = None;
        self.failure = None;
        tracing::info!(?strategy, "capture armed");
    }

    /// Begins recording. Refused (no-op, logged) unless the pipeline is
    /// armed, so a second `start` without an intervening `stop` leaves
    /// exactly one active session.
    pub fn start(&mut self, playback: &mut PlaybackController) {
        if self.state != CaptureState::Armed {
            tracing::warn!(state = ?self.state, "start refused, capture session not armed");
            return;
        }

        if self.strategy == CaptureStrategy::Headless {
            // Align audio and video from a clean zero; the settle delay lets
            // the forced seek land before the first recorded frame.
            playback.seek(0.0);
            self.settle_remaining = self.config.settle_ticks;
        }
        self.state = CaptureState::Recording;
        tracing::info!(strategy = ?self.strategy, "capture recording");
    }

    /// Appends one tick's frame plus audio. Ignored outside `Recording` and
    /// during the headless settle window.
    pub fn push_frame(&mut self, surface: &Surface, audio: &[f32]) {
        if self.state != CaptureState::Recording {
            return;
        }
        if self.settle_remaining > 0 {
            self.settle_remaining -= 1;
            return;
        }

        if self.sink_dims.is_none() {
            self.sink_dims = Some((surface.width() as u32, surface.height() as u32));
        }

        let frame = surface.pixels();
        let mut chunk = Vec::with_capacity(8 + frame.len() + audio.len() * 4);
        chunk.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        chunk.extend_from_slice(&((audio.len() * 4) as u32).to_le_bytes());
        chunk.extend_from_slice(frame);
        for sample in audio {
            chunk.extend_from_slice(&sample.to_le_bytes());
        }
        self.chunks.push(chunk);
        self.frame_count += 1;
    }

    /// Flushes the buffered chunks into one blob and finishes the session.
    ///
    /// Fails the session when recording never started or the frame sink was
    /// never established. That session is lost but the pipeline can be
    /// re-armed.
    pub fn stop(&mut self) -> Result<CaptureOutput> {
        if self.state == CaptureState::Armed {
            // The session was reserved but recording never began; fail it so
            // the pipeline does not stay stuck in Armed forever.
            self.state = CaptureState::Failed;
            self.failure = Some("recording never started".into());
            let error = VizError::CaptureSetup("recording never started".into());
            tracing::error!(%error, "capture failed");
            return Err(error);
        }
        if self.state != CaptureState::Recording {
            let error = VizError::CaptureSetup(format!(
                "stop called with no active recording (state {:?})",
                self.state
            ));
            tracing::warn!(%error, "capture stop refused");
            return Err(error);
        }

        let Some((width, height)) = self.sink_dims else {
            self.state = CaptureState::Failed;
            self.failure = Some("frame sink was never established".into());
            let error = VizError::CaptureSetup("frame sink was never established".into());
            tracing::error!(%error, "capture failed");
            return Err(error);
        };

        self.state = CaptureState::Finalizing;
        let output = self.finalize(width, height)?;
        self.state = CaptureState::Done;
        tracing::info!(
            frames = output.frame_count,
            bytes = output.bytes.len(),
            "capture finished"
        );
        Ok(output)
    }

    fn finalize(&mut self, width: u32, height: u32) -> Result<CaptureOutput> {
        if self.frame_count == 0 {
            self.state = CaptureState::Failed;
            self.failure = Some("no frames were recorded".into());
            return Err(VizError::CaptureFinalize("no frames were recorded".into()));
        }

        let payload: usize = self.chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(24 + payload);
        bytes.extend_from_slice(CAPTURE_MAGIC);
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        bytes.extend_from_slice(&self.config.fps.to_le_bytes());
        bytes.extend_from_slice(&self.sample_rate.to_le_bytes());
        bytes.extend_from_slice(&self.frame_count.to_le_bytes());
        for chunk in self.chunks.drain(..) {
            bytes.extend_from_slice(&chunk);
        }

        Ok(CaptureOutput {
            bytes,
            frame_count: self.frame_count,
            width,
            height,
            fps: self.config.fps,
            sample_rate: self.sample_rate,
        })
    }

    /// Marks the session failed, e.g. when a headless export's audio source
    /// dies mid-capture. The attempt is not retried; the caller decides
    /// whether to arm a fresh session.
    pub fn fail(&mut self, reason: &str) {
        tracing::error!(reason, "capture session failed");
        self.state = CaptureState::Failed;
        self.failure = Some(reason.to_string());
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackController, SimulatedFactory};
    use crate::song::Song;

    fn playback() -> PlaybackController {
        let songs = vec![Song {
            id: "a".into(),
            title: "A".into(),
            audio_source: "mem://a".into(),
            duration_seconds: 10.0,
            artwork_url: None,
            lyric_track: None,
        }];
        let mut factory = SimulatedFactory::new(1_000).with_ready_delay(0.0);
        factory.set_duration("mem://a", 10.0);
        PlaybackController::new(songs, Box::new(factory))
    }

    fn pipeline() -> CapturePipeline {
        CapturePipeline::new(
            CaptureConfig {
                fps: 30,
                settle_ticks: 2,
            },
            1_000,
        )
    }

    #[test]
    fn interactive_capture_produces_a_headered_blob() {
        let mut playback = playback();
        let mut capture = pipeline();
        let surface = Surface::new(8, 4);

        capture.arm(CaptureStrategy::Interactive);
        capture.start(&mut playback);
        for _ in 0..3 {
            capture.push_frame(&surface, &[0.1, -0.1]);
        }
        let output = capture.stop().unwrap();

        assert!(capture.is_finished());
        assert_eq!(&output.bytes[..4], CAPTURE_MAGIC);
        assert_eq!(output.frame_count, 3);
        assert_eq!(output.width, 8);
        assert_eq!(output.height, 4);
        // Header + 3 chunks of (8 bytes + frame + audio).
        let expected = 24 + 3 * (8 + 8 * 4 * 4 + 2 * 4);
        assert_eq!(output.bytes.len(), expected);
    }

    #[test]
    fn second_start_without_stop_is_refused() {
        let mut playback = playback();
        let mut capture = pipeline();
        let surface = Surface::new(8, 4);

        capture.arm(CaptureStrategy::Interactive);
        capture.start(&mut playback);
        capture.push_frame(&surface, &[]);

        // Re-arming or re-starting must not disturb the active session.
        capture.arm(CaptureStrategy::Headless);
        capture.start(&mut playback);
        assert_eq!(capture.state(), CaptureState::Recording);
        assert_eq!(capture.strategy(), CaptureStrategy::Interactive);

        let output = capture.stop().unwrap();
        assert_eq!(output.frame_count, 1);
    }

    #[test]
    fn headless_start_forces_a_zero_seek_and_settle_delay() {
        let mut playback = playback();
        playback.select_and_play(0).unwrap();
        for _ in 0..5 {
            playback.tick(0.016);
        }
        playback.seek(5.0);
        playback.tick(0.016);

        let mut capture = pipeline();
        let surface = Surface::new(8, 4);
        capture.arm(CaptureStrategy::Headless);
        capture.start(&mut playback);
        assert!(playback.status().is_seeking);
        playback.tick(0.016);
        playback.tick(0.016);
        assert!(playback.position() < 1.0);

        // The first settle_ticks pushes are discarded.
        for _ in 0..4 {
            capture.push_frame(&surface, &[]);
        }
        let output = capture.stop().unwrap();
        assert_eq!(output.frame_count, 2);
    }

    #[test]
    fn stop_without_an_established_sink_fails_the_session() {
        let mut playback = playback();
        let mut capture = pipeline();

        capture.arm(CaptureStrategy::Interactive);
        capture.start(&mut playback);
        let result = capture.stop();

        assert!(matches!(result, Err(VizError::CaptureSetup(_))));
        assert_eq!(capture.state(), CaptureState::Failed);
        assert!(capture.failure().is_some());
    }

    #[test]
    fn stop_without_start_is_an_error_not_a_crash() {
        let mut capture = pipeline();
        assert!(capture.stop().is_err());
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn stopping_an_armed_but_never_started_session_fails_it() {
        let mut capture = pipeline();
        capture.arm(CaptureStrategy::Interactive);

        assert!(matches!(capture.stop(), Err(VizError::CaptureSetup(_))));
        assert_eq!(capture.state(), CaptureState::Failed);
        assert!(capture.failure().is_some());

        // A failed session must not block the next one.
        capture.arm(CaptureStrategy::Headless);
        assert_eq!(capture.state(), CaptureState::Armed);
        assert_eq!(capture.strategy(), CaptureStrategy::Headless);
    }

    #[test]
    fn failed_sessions_can_be_rearmed() {
        let mut playback = playback();
        let mut capture = pipeline();

        capture.arm(CaptureStrategy::Headless);
        capture.start(&mut playback);
        capture.fail("audio failed to load");
        assert_eq!(capture.state(), CaptureState::Failed);

        capture.arm(CaptureStrategy::Interactive);
        assert_eq!(capture.state(), CaptureState::Armed);
        assert!(capture.failure().is_none());
    }
}
