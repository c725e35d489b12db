//! Color-space conversion to planar YUV 4:2:0
//!
//! The destination frame is allocated once at setup from the stream size and
//! rewritten in place for every picture, so conversion never allocates.

use serde::{Deserialize, Serialize};

use super::frame::{plane_size, PictureFormat, PlanarPicture, Plane, PlaneIndex};
use super::stream::StreamDescriptor;
use super::PlaybackError;

/// Scaling filter used by the software scaler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerQuality {
    Bilinear,
    #[default]
    Bicubic,
}

impl ScalerQuality {
    fn flags(self) -> ffmpeg_next::software::scaling::Flags {
        match self {
            ScalerQuality::Bilinear => ffmpeg_next::software::scaling::Flags::BILINEAR,
            ScalerQuality::Bicubic => ffmpeg_next::software::scaling::Flags::BICUBIC,
        }
    }
}

/// Converts decoded pictures into the fixed YUV 4:2:0 arena
pub struct ColorConverter {
    /// Software scaler, source format to YUV420P
    scaler: ffmpeg_next::software::scaling::Context,
    /// Destination arena, sized once at setup
    destination: ffmpeg_next::frame::Video,
    /// Destination width
    width: u32,
    /// Destination height
    height: u32,
    quality: ScalerQuality,
}

impl ColorConverter {
    /// Create the conversion context and destination arena
    pub fn new(
        descriptor: &StreamDescriptor,
        source_format: ffmpeg_next::format::Pixel,
        quality: ScalerQuality,
    ) -> Result<Self, PlaybackError> {
        let width = descriptor.width;
        let height = descriptor.height;

        let scaler = Self::create_scaler(source_format, width, height, width, height, quality)?;
        let destination = ffmpeg_next::frame::Video::new(ffmpeg_next::format::Pixel::YUV420P, width, height);

        tracing::debug!(
            "Color conversion {:?} -> YUV420P at {}x{}, strides {}/{}/{}",
            source_format,
            width,
            height,
            destination.stride(0),
            destination.stride(1),
            destination.stride(2)
        );

        Ok(Self {
            scaler,
            destination,
            width,
            height,
            quality,
        })
    }

    fn create_scaler(
        source_format: ffmpeg_next::format::Pixel,
        source_width: u32,
        source_height: u32,
        width: u32,
        height: u32,
        quality: ScalerQuality,
    ) -> Result<ffmpeg_next::software::scaling::Context, PlaybackError> {
        ffmpeg_next::software::scaling::Context::get(
            source_format,
            source_width,
            source_height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            quality.flags(),
        )
        .map_err(|e| PlaybackError::ConversionSetup {
            format: format!("{:?}", source_format),
            reason: e.to_string(),
        })
    }

    /// Convert `source` into the arena and return a view of the result
    ///
    /// The view borrows the converter, so the previous picture is always fully
    /// consumed before the arena is rewritten.
    pub fn convert(&mut self, source: &ffmpeg_next::frame::Video) -> Result<PlanarPicture<'_>, PlaybackError> {
        let input = self.scaler.input();
        if source.format() != input.format || source.width() != input.width || source.height() != input.height {
            tracing::debug!(
                "Source changed to {:?} {}x{}, rebuilding scaler",
                source.format(),
                source.width(),
                source.height()
            );
            self.scaler = Self::create_scaler(
                source.format(),
                source.width(),
                source.height(),
                self.width,
                self.height,
                self.quality,
            )?;
        }

        self.scaler
            .run(source, &mut self.destination)
            .map_err(|e| PlaybackError::ConversionSetup {
                format: format!("{:?}", source.format()),
                reason: e.to_string(),
            })?;

        let pts = source.timestamp().or_else(|| source.pts());
        Ok(self.picture(pts))
    }

    /// View of the arena tagged with the given timestamp
    fn picture(&self, pts: Option<i64>) -> PlanarPicture<'_> {
        let planes = PlaneIndex::ALL.map(|plane| {
            let (width, height) = plane_size(plane, self.width, self.height);
            Plane {
                data: self.destination.data(plane.index()),
                stride: self.destination.stride(plane.index()),
                width,
                height,
            }
        });

        PlanarPicture {
            width: self.width,
            height: self.height,
            format: PictureFormat::Yuv420p,
            pts,
            planes,
        }
    }
}
