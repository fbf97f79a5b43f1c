/// Result alias that carries the custom [`VizError`] type.
pub type Result<T> = std::result::Result<T, VizError>;

/// Common error type for the core crate.
///
/// The taxonomy is deliberately small: every variant maps to a failure the
/// hosting application can degrade from (paused transport, blank frame,
/// disabled export) without tearing the session down.
#[derive(Debug, thiserror::Error)]
pub enum VizError {
    /// An audio or image source failed to fetch or decode. Non-fatal:
    /// playback stays stopped and the session remains usable.
    #[error("failed to load source `{url}`: {reason}")]
    SourceLoad { url: String, reason: String },
    /// Play was attempted against a source that had already been superseded
    /// by a newer selection. Retried once against the latest source before
    /// being surfaced.
    #[error("transport race: {0}")]
    TransportRace(String),
    /// A capture session could not establish its frame or audio sink.
    /// Fatal to that session only.
    #[error("capture setup failed: {0}")]
    CaptureSetup(String),
    /// Buffered capture chunks could not be assembled into a single output.
    #[error("capture finalize failed: {0}")]
    CaptureFinalize(String),
    /// Caller handed the engine data that violates a documented invariant.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Unknown effect or song referenced by name/index.
    #[error("unknown {kind} `{name}`")]
    UnknownName { kind: &'static str, name: String },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around FFT processing errors.
    #[error("fft processing failed: {0}")]
    Fft(#[from] realfft::FftError),
    /// Wrapper around JSON decoding errors for the song/lyric contract.
    #[error("malformed song data: {0}")]
    Json(#[from] serde_json::Error),
}

impl VizError {
    /// Creates a [`VizError::SourceLoad`] from url + reason pairs.
    pub fn source_load(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceLoad {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
