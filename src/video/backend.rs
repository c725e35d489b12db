//! Rendering seam between the playback core and the GPU
//!
//! The uploader and geometry manager only talk to the GPU through this trait,
//! which is implemented by [`super::YuvRenderer`] on wgpu.

use super::frame::PlaneIndex;
use super::geometry::QuadVertex;
use super::PlaybackError;

/// Pixel data for one plane write
#[derive(Debug, Clone, Copy)]
pub struct PlaneUpload<'a> {
    pub data: &'a [u8],
    /// Row pitch of `data` in bytes; applies to this write only
    pub stride: usize,
    pub width: u32,
    pub height: u32,
}

/// GPU operations the playback pipeline drives
pub trait RenderBackend {
    /// Recreate a plane texture at the given size and fill it
    fn allocate_plane(&mut self, plane: PlaneIndex, upload: &PlaneUpload<'_>);

    /// Overwrite the contents of an existing plane texture of the same size
    fn update_plane(&mut self, plane: PlaneIndex, upload: &PlaneUpload<'_>);

    /// Bind the Y, U and V textures to units 0, 1 and 2
    fn bind_planes(&mut self);

    /// Replace the display quad vertices
    fn write_quad(&mut self, vertices: &[QuadVertex; 4]);

    /// Draw the quad with the bound textures
    fn draw(&mut self) -> Result<(), PlaybackError>;
}
