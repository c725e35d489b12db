//! Per-playback stream metadata
//!
//! Built once after the container has been inspected and read-only afterwards.

/// Rational tick duration of a stream's timestamps, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    pub num: i32,
    pub den: i32,
}

impl Timebase {
    pub fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Convert a timestamp in ticks to seconds
    ///
    /// A zero denominator yields 0.0 rather than infinity.
    pub fn seconds(&self, ticks: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ticks as f64 * self.num as f64 / self.den as f64
    }
}

impl From<ffmpeg_next::Rational> for Timebase {
    fn from(r: ffmpeg_next::Rational) -> Self {
        Self::new(r.numerator(), r.denominator())
    }
}

/// Width/height of a single pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelAspect {
    pub num: i32,
    pub den: i32,
}

impl PixelAspect {
    pub const SQUARE: PixelAspect = PixelAspect { num: 1, den: 1 };

    /// Build from a possibly unknown ratio; 0/x and x/0 mean square pixels
    pub fn new(num: i32, den: i32) -> Self {
        if num <= 0 || den <= 0 {
            Self::SQUARE
        } else {
            Self { num, den }
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.num as f32 / self.den as f32
    }
}

impl Default for PixelAspect {
    fn default() -> Self {
        Self::SQUARE
    }
}

/// Immutable metadata of the selected video stream
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Index of the stream inside its container
    pub index: usize,
    /// Coded width in pixels
    pub width: u32,
    /// Coded height in pixels
    pub height: u32,
    /// Sample aspect ratio
    pub pixel_aspect: PixelAspect,
    /// Timestamp tick duration
    pub timebase: Timebase,
    /// Average frame rate, 0.0 when unknown
    pub frame_rate: f64,
    /// Duration in seconds, 0.0 when unknown
    pub duration: f64,
    /// Decoder name (e.g. "h264")
    pub codec_name: String,
    /// Source pixel format name (e.g. "YUV420P")
    pub pixel_format: String,
}

impl StreamDescriptor {
    /// Width the picture should occupy on screen, after applying the pixel aspect
    pub fn display_width(&self) -> f32 {
        self.width as f32 * self.pixel_aspect.as_f32()
    }

    /// Window-sized display dimensions, at least 1x1
    pub fn display_size(&self) -> (u32, u32) {
        ((self.display_width().round() as u32).max(1), self.height.max(1))
    }
}
