use crate::midi::MidiError;

/// Result alias that carries the custom [`CollageError`] type.
pub type Result<T> = std::result::Result<T, CollageError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CollageError {
    /// Free-form error surfaced to the user as-is.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// An image, audio, video, text or font asset could not be fetched or
    /// decoded. The pending run never starts.
    #[error("failed to load asset `{asset}`: {reason}")]
    AssetLoad { asset: String, reason: String },
    /// Malformed MIDI data.
    #[error("MIDI parse error: {0}")]
    Parse(#[from] MidiError),
    /// Malformed configuration or session manifest.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The caller handed the engine something it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The spectrum transform rejected its buffers.
    #[error("FFT failure: {0}")]
    Fft(#[from] realfft::FftError),
}

impl CollageError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Builds a [`CollageError::AssetLoad`] for `asset`.
    pub fn asset_load(asset: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetLoad {
            asset: asset.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for CollageError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for CollageError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
