//! Playback error taxonomy
//!
//! Every variant is fatal to the pipeline. Transient decode failures are
//! absorbed inside the decoder and only surface as [`PlaybackError::Decode`]
//! once decoding stops making progress.

use thiserror::Error;

/// Errors that abort playback
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The container could not be opened, parsed or read
    #[error("Failed to open or read container {path}: {source}")]
    Container {
        path: String,
        #[source]
        source: ffmpeg_next::Error,
    },
    /// The container has no decodable video track
    #[error("No video stream found in {0}")]
    NoVideoStream(String),
    /// No decoder exists for the stream's codec, or it failed to open
    #[error("Unsupported codec {codec}: {reason}")]
    UnsupportedCodec { codec: String, reason: String },
    /// The YUV 4:2:0 conversion context could not be created
    #[error("Failed to set up color conversion from {format}: {reason}")]
    ConversionSetup { format: String, reason: String },
    /// The decoder kept failing without producing a picture
    #[error("Decoding stalled after {attempts} failed attempts: {last}")]
    Decode { attempts: u32, last: String },
    /// GPU, window or surface failure reported by the presentation layer
    #[error("Presentation setup failed: {0}")]
    PresentationSetup(String),
}

impl PlaybackError {
    /// Short kind name used in logs and exit diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackError::Container { .. } => "ContainerError",
            PlaybackError::NoVideoStream(_) => "NoVideoStreamError",
            PlaybackError::UnsupportedCodec { .. } => "UnsupportedCodecError",
            PlaybackError::ConversionSetup { .. } => "ConversionSetupError",
            PlaybackError::Decode { .. } => "DecodeError",
            PlaybackError::PresentationSetup(_) => "PresentationSetupError",
        }
    }
}
