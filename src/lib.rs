//! Immersive Viewer Library
//!
//! A single-stream video viewer: decodes a media file with FFmpeg and plays
//! it in a window through wgpu, paced by the stream's own timestamps.

pub mod gpu_context;
pub mod settings;
pub mod shaders;
pub mod telemetry;
pub mod video;

pub use gpu_context::GpuContext;
pub use settings::{LateFrameMode, SettingsError, ViewerSettings};
pub use video::{
    CancellationToken, FfmpegSource, LateFramePolicy, PlaybackError, PlaybackPipeline, StepOutcome, StreamDescriptor,
    YuvRenderer,
};
