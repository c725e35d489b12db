//! Plane texture upload
//!
//! Tracks the size of the GPU plane textures and chooses between a full
//! reallocation (size changed) and an in-place write (same size).

use super::backend::{PlaneUpload, RenderBackend};
use super::frame::{PlanarPicture, PlaneIndex};
use super::geometry::QuadGeometry;

/// Cached size of the three plane textures
#[derive(Debug, Clone, Default)]
pub struct TextureSet {
    size: Option<(u32, u32)>,
}

impl TextureSet {
    /// Luma size of the textures, `None` before the first upload
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.size == Some((width, height))
    }
}

/// Display state threaded through upload and geometry
///
/// Owned by the pipeline and passed by reference to each stage instead of
/// riding along on the picture. The pixel aspect is not part of it: the
/// window is sized to the display aspect and the quad maps storage pixels.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub textures: TextureSet,
    pub geometry: QuadGeometry,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Textures were reallocated for a new size
    pub reallocated: bool,
    /// The display quad was rewritten
    pub geometry_changed: bool,
}

/// Uploads converted pictures into the plane textures
#[derive(Debug, Default)]
pub struct TextureUploader;

impl TextureUploader {
    pub fn new() -> Self {
        Self
    }

    /// Upload all three planes of `picture` and bind them
    pub fn upload(
        &mut self,
        picture: &PlanarPicture<'_>,
        state: &mut DisplayState,
        backend: &mut impl RenderBackend,
    ) -> UploadOutcome {
        let reallocated = !state.textures.matches(picture.width, picture.height);

        for plane in PlaneIndex::ALL {
            let source = picture.plane(plane);
            let upload = PlaneUpload {
                data: source.data,
                stride: source.stride,
                width: source.width,
                height: source.height,
            };

            if reallocated {
                backend.allocate_plane(plane, &upload);
            } else {
                backend.update_plane(plane, &upload);
            }
        }

        let mut geometry_changed = false;
        if reallocated {
            tracing::debug!(
                "Plane textures reallocated: {:?} -> {}x{}",
                state.textures.size,
                picture.width,
                picture.height
            );
            state.textures.size = Some((picture.width, picture.height));

            geometry_changed = state.geometry.update(
                picture.width,
                picture.height,
                picture.width as f32,
                picture.height as f32,
                backend,
            );
        }

        backend.bind_planes();

        UploadOutcome {
            reallocated,
            geometry_changed,
        }
    }
}
