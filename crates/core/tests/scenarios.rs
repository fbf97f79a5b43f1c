//! End-to-end scenarios across the whole engine.

use songviz_core::{
    AppConfig, AudioConfig, CaptureConfig, CaptureState, LyricConfig, LyricSegment,
    LyricTimingEngine, SimulatedFactory, Song, SurfaceConfig, VisualizerEngine,
};

fn lyric_track() -> Vec<LyricSegment> {
    vec![
        LyricSegment {
            start: 0.0,
            end: 2.0,
            sentence: "Hello world".into(),
            words: None,
        },
        LyricSegment {
            start: 2.0,
            end: 4.0,
            sentence: "Goodbye now".into(),
            words: None,
        },
        LyricSegment {
            start: 4.0,
            end: 6.0,
            sentence: "See you".into(),
            words: None,
        },
    ]
}

fn song(id: &str, duration: f32, with_lyrics: bool) -> Song {
    Song {
        id: id.to_string(),
        title: format!("Track {id}"),
        audio_source: format!("mem://{id}"),
        duration_seconds: duration,
        artwork_url: None,
        lyric_track: with_lyrics.then(lyric_track),
    }
}

fn engine_with(songs: Vec<Song>) -> VisualizerEngine {
    let mut factory = SimulatedFactory::new(8_000).with_ready_delay(0.0);
    for song in &songs {
        factory.set_duration(&song.audio_source, song.duration_seconds);
    }
    let config = AppConfig {
        audio: AudioConfig {
            sample_rate: 8_000,
            fft_size: 256,
            spectrum_bins: 16,
            waveform_len: 64,
            ..AudioConfig::default()
        },
        lyrics: LyricConfig::default(),
        surface: SurfaceConfig {
            width: 64,
            height: 48,
        },
        capture: CaptureConfig {
            fps: 30,
            settle_ticks: 2,
        },
    };
    VisualizerEngine::new(config, songs, Box::new(factory))
}

#[test]
fn three_segment_track_resolves_hello_at_one_second() {
    let mut engine = LyricTimingEngine::new(LyricConfig::default());
    let track = lyric_track();

    // Even synthesis gives each first-segment word one second.
    let line = engine.resolve(&track, 1.0);
    assert_eq!(line.words.len(), 2);
    assert_eq!(line.words[0].text, "Hello");
    assert!(line.words[0].opacity >= 0.99);
    assert!(line.words[1].opacity > 0.0);

    let line = engine.resolve(&track, 0.85);
    assert_eq!(line.words[1].text, "world");
    assert!(line.words[1].opacity > 0.0 && line.words[1].opacity < 1.0);
}

#[test]
fn next_from_the_last_of_three_songs_wraps_to_the_first() {
    let mut engine = engine_with(vec![
        song("a", 6.0, true),
        song("b", 6.0, false),
        song("c", 6.0, false),
    ]);

    engine.select_song(2).unwrap();
    engine.tick(0.016);
    engine.next().unwrap();
    assert_eq!(engine.status().current_index, Some(0));

    for _ in 0..5 {
        engine.tick(0.016);
    }
    assert!(engine.status().is_playing);
}

#[test]
fn full_session_plays_lyrics_and_exports() {
    let mut engine = engine_with(vec![song("a", 1.0, true)]);

    engine.select_song(0).unwrap();
    let mut saw_lyrics = false;
    for _ in 0..40 {
        engine.tick(0.033);
        saw_lyrics |= !engine.current_line().is_empty();
    }
    assert!(saw_lyrics);
    assert!(engine.status().is_ended);

    // The same engine can then run an unattended export of the same song.
    let capture = engine.export_headless(0).unwrap();
    assert_eq!(engine.capture_state(), CaptureState::Done);
    assert_eq!(&capture.bytes[..4], b"SVIZ");
    assert!(capture.frame_count > 10);
    // Every recorded frame carries at least its full RGBA payload.
    assert!(capture.bytes.len() > capture.frame_count as usize * 64 * 48 * 4);
}

#[test]
fn effect_switching_mid_session_keeps_everything_alive() {
    let mut engine = engine_with(vec![song("a", 6.0, true)]);
    engine.select_song(0).unwrap();

    let names: Vec<&str> = engine
        .registry()
        .descriptors()
        .map(|descriptor| descriptor.name)
        .collect();
    for name in names {
        engine.select_effect(name).unwrap();
        for _ in 0..3 {
            engine.tick(0.016);
        }
        assert!(engine.status().is_playing, "effect {name} broke playback");
    }
}
