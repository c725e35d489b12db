//! Planar YUV 4:2:0 picture representation
//!
//! [`PlanarPicture`] is a borrowed view over converted pixel data, tagged with
//! the metadata the later stages need. The memory behind it is owned by a
//! fixed-size arena: the converter's destination frame for FFmpeg sources, or
//! a [`PictureBuffer`] for everything else.

/// Number of planes in a YUV 4:2:0 picture
pub const PLANE_COUNT: usize = 3;

/// Plane slot, also the texture unit it is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneIndex {
    Y = 0,
    U = 1,
    V = 2,
}

impl PlaneIndex {
    pub const ALL: [PlaneIndex; PLANE_COUNT] = [PlaneIndex::Y, PlaneIndex::U, PlaneIndex::V];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaneIndex::Y => "Y Plane Texture",
            PlaneIndex::U => "U Plane Texture",
            PlaneIndex::V => "V Plane Texture",
        }
    }
}

/// Pixel format tag carried by converted pictures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureFormat {
    Yuv420p,
}

/// Size of a chroma plane for a 4:2:0 picture of the given luma size
pub fn chroma_size(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(2), height.div_ceil(2))
}

/// Size of the given plane for a 4:2:0 picture of the given luma size
pub fn plane_size(plane: PlaneIndex, width: u32, height: u32) -> (u32, u32) {
    match plane {
        PlaneIndex::Y => (width, height),
        PlaneIndex::U | PlaneIndex::V => chroma_size(width, height),
    }
}

/// One plane of pixel data
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    /// Rows of `stride` bytes; the last row may stop after `width` bytes
    pub data: &'a [u8],
    /// Bytes between the start of consecutive rows (>= width)
    pub stride: usize,
    /// Logical width in pixels
    pub width: u32,
    /// Logical height in rows
    pub height: u32,
}

impl Plane<'_> {
    /// Whether `data` holds every visible byte described by the geometry
    pub fn is_valid(&self) -> bool {
        if self.height == 0 || self.width == 0 {
            return true;
        }
        let width = self.width as usize;
        self.stride >= width
            && self.data.len() >= self.stride * (self.height as usize - 1) + width
    }
}

/// A converted picture ready for upload
#[derive(Debug, Clone, Copy)]
pub struct PlanarPicture<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PictureFormat,
    /// Presentation timestamp in stream timebase ticks
    pub pts: Option<i64>,
    pub planes: [Plane<'a>; PLANE_COUNT],
}

impl<'a> PlanarPicture<'a> {
    pub fn plane(&self, plane: PlaneIndex) -> &Plane<'a> {
        &self.planes[plane.index()]
    }
}

/// Owned YUV 4:2:0 arena, allocated once and rewritten in place
///
/// Strides are rounded up to `align` bytes, mirroring the padding decoders
/// add to their own buffers.
#[derive(Debug, Clone)]
pub struct PictureBuffer {
    width: u32,
    height: u32,
    strides: [usize; PLANE_COUNT],
    planes: [Vec<u8>; PLANE_COUNT],
    pts: Option<i64>,
}

impl PictureBuffer {
    /// Allocate a buffer for the given luma size
    pub fn new(width: u32, height: u32, align: usize) -> Self {
        let align = align.max(1);
        let strides = PlaneIndex::ALL.map(|plane| {
            let (w, _) = plane_size(plane, width, height);
            (w as usize).div_ceil(align) * align
        });
        let planes = PlaneIndex::ALL.map(|plane| {
            let (_, h) = plane_size(plane, width, height);
            vec![0u8; strides[plane.index()] * h as usize]
        });

        Self {
            width,
            height,
            strides,
            planes,
            pts: None,
        }
    }

    pub fn stride(&self, plane: PlaneIndex) -> usize {
        self.strides[plane.index()]
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    /// Mutable access to a plane's bytes, including row padding
    pub fn plane_mut(&mut self, plane: PlaneIndex) -> &mut [u8] {
        &mut self.planes[plane.index()]
    }

    /// Fill every visible sample of a plane with one value
    pub fn fill(&mut self, plane: PlaneIndex, value: u8) {
        let (w, h) = plane_size(plane, self.width, self.height);
        let stride = self.stride(plane);
        let data = self.plane_mut(plane);
        for row in 0..h as usize {
            data[row * stride..row * stride + w as usize].fill(value);
        }
    }

    /// Borrow the buffer as a picture view
    pub fn as_picture(&self) -> PlanarPicture<'_> {
        let planes = PlaneIndex::ALL.map(|plane| {
            let (width, height) = plane_size(plane, self.width, self.height);
            Plane {
                data: &self.planes[plane.index()],
                stride: self.strides[plane.index()],
                width,
                height,
            }
        });

        PlanarPicture {
            width: self.width,
            height: self.height,
            format: PictureFormat::Yuv420p,
            pts: self.pts,
            planes,
        }
    }
}
