//! Video playback core
//!
//! Decodes a container's video stream with FFmpeg via the `ffmpeg-next` crate,
//! converts each picture to planar YUV 4:2:0, uploads the planes to GPU
//! textures and paces presentation against the stream timestamps.

mod backend;
mod convert;
mod decoder;
mod error;
mod frame;
mod geometry;
mod pacing;
mod pipeline;
mod renderer;
mod stream;
mod texture;
mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{PlaneUpload, RenderBackend};
pub use convert::{ColorConverter, ScalerQuality};
pub use decoder::{DecoderConfig, VideoDecoder, DEFAULT_MAX_DECODE_RETRIES};
pub use error::PlaybackError;
pub use frame::{chroma_size, plane_size, PictureBuffer, PictureFormat, PlanarPicture, Plane, PlaneIndex, PLANE_COUNT};
pub use geometry::{fit_extents, quad_vertices, QuadGeometry, QuadVertex, QUAD_INDICES};
pub use pacing::{wait_duration, Clock, FramePacer, PaceOutcome, SystemClock};
pub use pipeline::{CancellationToken, FfmpegSource, LateFramePolicy, PictureSource, PlaybackPipeline, StepOutcome};
pub use renderer::YuvRenderer;
pub use stream::{PixelAspect, StreamDescriptor, Timebase};
pub use texture::PlaneTexture;
pub use upload::{DisplayState, TextureSet, TextureUploader, UploadOutcome};
