//! The fixed-rate render loop that wires the subsystems together.
//!
//! Ordering within one tick: the playback controller advances and drains
//! source events, the feature extractor samples the audio tap, the active
//! effect draws from those features, the lyric engine resolves the active
//! line for the overlay, and finally the capture pipeline observes the
//! finished frame. The loop never blocks: loads that have not completed are
//! simply absent from this tick's state.

use crate::assets::{ArtworkStore, ImageAsset};
use crate::capture::{CaptureOutput, CapturePipeline, CaptureState, CaptureStrategy};
use crate::config::AppConfig;
use crate::effects::EffectRegistry;
use crate::features::AudioFeatureExtractor;
use crate::lyrics::{ActiveLine, LyricTimingEngine};
use crate::playback::{PlaybackController, PlaybackStatus, SourceFactory};
use crate::render::Surface;
use crate::song::Song;
use crate::{Result, VizError};

/// How long a headless export waits for the source to become ready before
/// declaring the load dead.
const HEADLESS_LOAD_TIMEOUT_SECONDS: f32 = 10.0;

/// One visualization session: a surface, a playback session, the effect
/// catalog and an optional capture session.
pub struct VisualizerEngine {
    config: AppConfig,
    surface: Surface,
    playback: PlaybackController,
    lyrics: LyricTimingEngine,
    features: AudioFeatureExtractor,
    registry: EffectRegistry,
    artwork: ArtworkStore,
    capture: CapturePipeline,
    tap_buf: Vec<f32>,
    last_line: ActiveLine,
}

impl VisualizerEngine {
    pub fn new(config: AppConfig, songs: Vec<Song>, factory: Box<dyn SourceFactory>) -> Self {
        let surface = Surface::new(config.surface.width, config.surface.height);
        let playback = PlaybackController::new(songs, factory);
        let lyrics = LyricTimingEngine::new(config.lyrics.clone());
        let features = AudioFeatureExtractor::new(config.audio.clone());
        let capture = CapturePipeline::new(config.capture.clone(), config.audio.sample_rate);
        let tap_buf = vec![0.0; config.audio.fft_size];

        let mut registry = EffectRegistry::with_builtins();
        let first = registry.descriptors().next().map(|d| d.name);
        if let Some(first) = first {
            registry
                .select(first)
                .expect("first catalog entry is selectable");
        }

        Self {
            config,
            surface,
            playback,
            lyrics,
            features,
            registry,
            artwork: ArtworkStore::new(),
            capture,
            tap_buf,
            last_line: ActiveLine::default(),
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn status(&self) -> PlaybackStatus {
        self.playback.status()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// The lyric line rendered on the most recent tick.
    pub fn current_line(&self) -> &ActiveLine {
        &self.last_line
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController {
        &mut self.playback
    }

    /// Loads and plays the song at `index`, resetting per-song state.
    pub fn select_song(&mut self, index: usize) -> Result<()> {
        self.playback.select_and_play(index)?;
        self.after_song_change();
        Ok(())
    }

    /// Advances to the next song in the list, wrapping past the end.
    pub fn next(&mut self) -> Result<()> {
        self.playback.next()?;
        self.after_song_change();
        Ok(())
    }

    /// Returns to the previous song in the list, wrapping past the start.
    pub fn prev(&mut self) -> Result<()> {
        self.playback.prev()?;
        self.after_song_change();
        Ok(())
    }

    /// Per-song state must not survive a song switch: the memoized lyric
    /// layout belongs to the old track, and artwork wants are re-evaluated
    /// against the new song.
    fn after_song_change(&mut self) {
        self.lyrics.reset();
        self.request_artwork_if_wanted();
    }

    /// Switches the active effect mid-playback. Audio is untouched; the old
    /// effect instance is dropped along with its transient state.
    pub fn select_effect(&mut self, name: &str) -> Result<()> {
        self.registry.select(name)?;
        self.request_artwork_if_wanted();
        Ok(())
    }

    /// Delivers artwork fetched by the surrounding application. Stale
    /// completions (the song changed since the request) are dropped.
    pub fn artwork_loaded(&mut self, song_id: &str, image: ImageAsset) {
        if !self.artwork.complete(song_id, image) {
            return;
        }
        let current = self
            .playback
            .current_song()
            .filter(|song| song.id == song_id)
            .map(|song| song.id.clone());
        if current.is_some() {
            self.push_artwork_to_effect(song_id);
        }
    }

    /// Reports a failed artwork fetch; the session keeps rendering without
    /// a background image.
    pub fn artwork_failed(&mut self, song_id: &str, reason: &str) {
        self.artwork.fail(song_id, reason);
    }

    /// URL the application should fetch artwork from, if a request is
    /// outstanding.
    pub fn pending_artwork_url(&self) -> Option<&str> {
        self.artwork.pending_url()
    }

    fn request_artwork_if_wanted(&mut self) {
        let wants_image = self
            .registry
            .active_descriptor()
            .map(|descriptor| descriptor.draws_background_image)
            .unwrap_or(false);
        if !wants_image {
            self.artwork.clear();
            return;
        }
        let Some((song_id, url)) = self
            .playback
            .current_song()
            .and_then(|song| song.artwork_url.as_ref().map(|url| (song.id.clone(), url.clone())))
        else {
            // Nothing to load for this song; drop any request left over from
            // the previous one so its late completion cannot land here.
            self.artwork.clear();
            return;
        };

        if self.artwork.current_for(&song_id).is_some() {
            self.push_artwork_to_effect(&song_id);
        } else {
            self.artwork.request(&song_id, &url);
        }
    }

    fn push_artwork_to_effect(&mut self, song_id: &str) {
        if let Some(image) = self.artwork.current_for(song_id) {
            if let Some(effect) = self.registry.active_effect(&mut self.surface) {
                effect.set_artwork(image);
            }
        }
    }

    /// Arms the capture pipeline for the given strategy.
    pub fn arm_capture(&mut self, strategy: CaptureStrategy) {
        self.capture.arm(strategy);
    }

    /// Starts the armed capture session against the live playback session.
    pub fn start_capture(&mut self) {
        self.capture.start(&mut self.playback);
    }

    /// Stops the capture session and returns the finished output.
    pub fn stop_capture(&mut self) -> Result<CaptureOutput> {
        self.capture.stop()
    }

    /// Runs one tick of the render loop.
    pub fn tick(&mut self, dt: f32) {
        self.playback.tick(dt);

        let have_audio = self.playback.tap(&mut self.tap_buf);
        let features = self
            .features
            .sample(have_audio.then_some(self.tap_buf.as_slice()));

        let status = self.playback.status();
        let line = match self
            .playback
            .current_song()
            .and_then(|song| song.lyric_track.as_deref())
        {
            Some(track) => self.lyrics.resolve(track, status.position),
            None => ActiveLine::default(),
        };
        let title = self.playback.current_song().map(|song| song.title.clone());

        if let Some(effect) = self.registry.active_effect(&mut self.surface) {
            effect.draw(&mut self.surface, &features);
            effect.display_lyrics(&mut self.surface, &line, status.is_playing, status.position);
            if let Some(title) = &title {
                effect.draw_title(&mut self.surface, title);
            }
        }
        self.last_line = line;

        if self.capture.state() == CaptureState::Recording {
            let per_tick = (self.config.audio.sample_rate as f32 * dt) as usize;
            let audio: Vec<f32> = if have_audio {
                let start = self.tap_buf.len().saturating_sub(per_tick);
                self.tap_buf[start..].to_vec()
            } else {
                vec![0.0; per_tick]
            };
            self.capture.push_frame(&self.surface, &audio);
        }
    }

    /// Unattended export: load the song, start from zero, record until the
    /// natural end of the track and finalize. A load failure is fatal to
    /// this attempt; the caller may arm a fresh session and try again.
    pub fn export_headless(&mut self, index: usize) -> Result<CaptureOutput> {
        let dt = 1.0 / self.config.capture.fps.max(1) as f32;

        self.select_song(index)?;
        let mut waited = 0.0;
        while self.status().is_audio_loading && waited < HEADLESS_LOAD_TIMEOUT_SECONDS {
            self.tick(dt);
            waited += dt;
        }

        let status = self.status();
        if let Some(reason) = status.error.clone().filter(|_| !status.is_playing) {
            self.capture.fail(&reason);
            let url = self
                .playback
                .current_song()
                .map(|song| song.audio_source.clone())
                .unwrap_or_default();
            return Err(VizError::source_load(url, reason));
        }
        if status.is_audio_loading {
            let reason = "audio source never became ready".to_string();
            self.capture.fail(&reason);
            return Err(VizError::CaptureSetup(reason));
        }

        self.capture.arm(CaptureStrategy::Headless);
        self.capture.start(&mut self.playback);

        // Guard rail: duration plus slack, so a source that never ends
        // cannot hang the export.
        let max_ticks =
            ((status.duration + 5.0) * self.config.capture.fps as f32) as u32
                + self.config.capture.settle_ticks;
        let mut ticks = 0;
        while !self.status().is_ended && ticks < max_ticks {
            self.tick(dt);
            ticks += 1;
            if let Some(reason) = self.status().error {
                self.capture.fail(&reason);
                return Err(VizError::CaptureFinalize(reason));
            }
        }
        if !self.status().is_ended {
            tracing::warn!(ticks, "export hit the tick guard before end of track");
        }

        self.capture.stop()
    }
}

impl std::fmt::Debug for VisualizerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualizerEngine")
            .field("playback", &self.playback)
            .field("registry", &self.registry)
            .field("capture", &self.capture.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::SimulatedFactory;
    use crate::song::LyricSegment;

    fn songs() -> Vec<Song> {
        vec![
            Song {
                id: "a".into(),
                title: "Alpha".into(),
                audio_source: "mem://a".into(),
                duration_seconds: 1.0,
                artwork_url: Some("https://cdn.example/a.jpg".into()),
                lyric_track: Some(vec![LyricSegment {
                    start: 0.0,
                    end: 1.0,
                    sentence: "Hello world".into(),
                    words: None,
                }]),
            },
            Song {
                id: "b".into(),
                title: "Beta".into(),
                audio_source: "mem://b".into(),
                duration_seconds: 2.0,
                artwork_url: None,
                lyric_track: None,
            },
        ]
    }

    fn engine_with(songs: Vec<Song>) -> VisualizerEngine {
        let mut factory = SimulatedFactory::new(8_000).with_ready_delay(0.0);
        for song in &songs {
            factory.set_duration(&song.audio_source, song.duration_seconds);
        }
        let config = AppConfig {
            audio: crate::config::AudioConfig {
                sample_rate: 8_000,
                fft_size: 256,
                spectrum_bins: 16,
                waveform_len: 64,
                ..crate::config::AudioConfig::default()
            },
            surface: crate::config::SurfaceConfig {
                width: 64,
                height: 48,
            },
            capture: crate::config::CaptureConfig {
                fps: 30,
                settle_ticks: 2,
            },
            ..AppConfig::default()
        };
        VisualizerEngine::new(config, songs, Box::new(factory))
    }

    #[test]
    fn ticks_safely_with_no_song_selected() {
        let mut engine = engine_with(songs());
        engine.tick(0.016);
        assert!(!engine.status().is_playing);
        assert!(engine.current_line().is_empty());
    }

    #[test]
    fn resolves_lyrics_while_playing() {
        let mut engine = engine_with(songs());
        engine.select_song(0).unwrap();
        for _ in 0..20 {
            engine.tick(0.033);
        }
        assert!(engine.status().is_playing || engine.status().is_ended);
        assert!(!engine.current_line().is_empty());
    }

    #[test]
    fn switching_effects_does_not_restart_audio() {
        let mut engine = engine_with(songs());
        engine.select_song(1).unwrap();
        for _ in 0..5 {
            engine.tick(0.016);
        }
        let before = engine.status().position;
        engine.select_effect("plasma").unwrap();
        engine.tick(0.016);

        let status = engine.status();
        assert!(status.is_playing);
        assert!(status.position >= before);
        assert_eq!(engine.registry().active_name(), Some("plasma"));
    }

    #[test]
    fn next_song_does_not_reuse_the_previous_lyric_layout() {
        let mut songs = songs();
        songs[1].lyric_track = Some(vec![LyricSegment {
            start: 0.0,
            end: 2.0,
            sentence: "Brand new".into(),
            words: None,
        }]);
        let mut engine = engine_with(songs);

        engine.select_song(0).unwrap();
        for _ in 0..5 {
            engine.tick(0.033);
        }
        assert_eq!(engine.current_line().words[0].text, "Hello");

        // Both songs have an active segment at index zero; the layout must
        // be rebuilt for the new track, not served from the memo.
        engine.next().unwrap();
        for _ in 0..5 {
            engine.tick(0.033);
        }
        assert_eq!(engine.current_line().words[0].text, "Brand");
    }

    #[test]
    fn artwork_request_follows_the_selected_effect() {
        let mut engine = engine_with(songs());
        engine.select_song(0).unwrap();
        assert!(engine.pending_artwork_url().is_none());

        engine.select_effect("artwork-backdrop").unwrap();
        assert_eq!(
            engine.pending_artwork_url(),
            Some("https://cdn.example/a.jpg")
        );

        engine.artwork_loaded("a", ImageAsset::solid(4, 4, [9, 9, 9, 255]));
        assert!(engine.pending_artwork_url().is_none());
    }

    #[test]
    fn stale_artwork_for_a_previous_song_is_dropped() {
        let mut engine = engine_with(songs());
        engine.select_effect("artwork-backdrop").unwrap();
        engine.select_song(0).unwrap();
        engine.select_song(1).unwrap();

        // Song "b" has no artwork, so nothing is pending; "a"'s late
        // completion must not stick.
        engine.artwork_loaded("a", ImageAsset::solid(4, 4, [9, 9, 9, 255]));
        assert!(engine.pending_artwork_url().is_none());
    }

    #[test]
    fn headless_export_runs_to_done() {
        let mut engine = engine_with(songs());
        let output = engine.export_headless(0).unwrap();

        assert_eq!(engine.capture_state(), CaptureState::Done);
        assert!(output.frame_count > 10);
        assert_eq!(output.width, 64);
        assert_eq!(output.height, 48);
        assert!(engine.status().is_ended);
    }

    #[test]
    fn headless_export_fails_fast_on_a_dead_source() {
        let songs = songs();
        let mut factory = SimulatedFactory::new(8_000).with_ready_delay(0.0);
        factory.fail_url("mem://a");
        let config = AppConfig::default();
        let mut engine = VisualizerEngine::new(config, songs, Box::new(factory));

        let result = engine.export_headless(0);
        assert!(matches!(result, Err(VizError::SourceLoad { .. })));
        assert_eq!(engine.capture_state(), CaptureState::Failed);
    }
}
