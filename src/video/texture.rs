//! Single-channel GPU texture for one picture plane
//!
//! Each of the Y, U and V planes lives in its own `R8Unorm` texture so the
//! chroma planes can be sampled at their native half resolution.

use super::backend::PlaneUpload;
use super::frame::PlaneIndex;

/// A GPU texture holding one 8-bit plane
pub struct PlaneTexture {
    /// The GPU texture
    texture: wgpu::Texture,
    /// Texture view for binding
    view: wgpu::TextureView,
    /// Texture width in pixels
    width: u32,
    /// Texture height in pixels
    height: u32,
}

impl PlaneTexture {
    /// Create a plane texture with the specified dimensions
    pub fn new(device: &wgpu::Device, plane: PlaneIndex, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(plane.label()),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            // COPY_DST for uploading data, TEXTURE_BINDING for shader sampling
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Write a plane into the texture
    ///
    /// `upload.stride` is used as the row pitch of this write only. Uploads
    /// that do not match the texture size are skipped.
    pub fn write(&self, queue: &wgpu::Queue, upload: &PlaneUpload<'_>) {
        if upload.width != self.width || upload.height != self.height {
            tracing::warn!(
                "Plane upload {}x{} does not match texture {}x{}, skipping",
                upload.width,
                upload.height,
                self.width,
                self.height
            );
            return;
        }
        if upload.width == 0 || upload.height == 0 {
            return;
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            upload.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(upload.stride as u32),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Get the texture view
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}
