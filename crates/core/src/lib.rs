//! Core library for the Songviz lyric visualiser.
//!
//! The crate turns a song (audio source plus word-level lyric timing) into a
//! real-time, audio-synchronised animation with swappable visual styles, and
//! can capture the rendered frames together with the live audio into a
//! single downloadable output. Each module owns a distinct subsystem:
//! playback transport, lyric timing, audio feature extraction, the effect
//! catalog, and the capture pipeline; [`engine`] wires them into one
//! fixed-rate render loop.

pub mod assets;
pub mod capture;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod features;
pub mod lyrics;
pub mod playback;
pub mod render;
pub mod song;

pub use assets::{ArtworkStore, ImageAsset};
pub use capture::{CaptureOutput, CapturePipeline, CaptureState, CaptureStrategy};
pub use config::{AppConfig, AudioConfig, CaptureConfig, LyricConfig, SurfaceConfig};
pub use effects::{EffectDescriptor, EffectRegistry, VisualEffect};
pub use engine::VisualizerEngine;
pub use error::{Result, VizError};
pub use features::{AudioFeatureExtractor, AudioFeatures};
pub use lyrics::{ActiveLine, LyricTimingEngine, ResolvedWord};
pub use playback::{
    AudioSource, PlaybackController, PlaybackStatus, SimulatedFactory, SourceEvent, SourceFactory,
    TransportState,
};
pub use render::Surface;
pub use song::{parse_lyric_track, parse_song_list, LyricSegment, Song, WordTiming};
