//! Aspect-preserving display quad
//!
//! The quad is only recomputed and written to the GPU when the ratio between
//! the texture aspect and the picture's display aspect changes.

use super::backend::RenderBackend;

/// Vertex of the display quad, matching the vertex layout of `yuv_quad.wgsl`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y, 0.0],
            tex_coords: [u, v],
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Two triangles over the four quad vertices
pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

/// Build the quad for the given half extents
///
/// Vertex order: top-right, bottom-right, bottom-left, top-left.
pub fn quad_vertices(half_width: f32, half_height: f32) -> [QuadVertex; 4] {
    [
        QuadVertex::new(half_width, half_height, 1.0, 0.0),
        QuadVertex::new(half_width, -half_height, 1.0, 1.0),
        QuadVertex::new(-half_width, -half_height, 0.0, 1.0),
        QuadVertex::new(-half_width, half_height, 0.0, 0.0),
    ]
}

/// Half extents of the quad for a texture/picture aspect pair
///
/// A texture wider than the picture shrinks the quad vertically, a narrower
/// one shrinks it horizontally.
pub fn fit_extents(texture_ratio: f32, picture_ratio: f32) -> (f32, f32) {
    if texture_ratio > picture_ratio {
        (1.0, picture_ratio / texture_ratio)
    } else if texture_ratio < picture_ratio {
        (texture_ratio / picture_ratio, 1.0)
    } else {
        (1.0, 1.0)
    }
}

/// Cached display quad
#[derive(Debug, Clone)]
pub struct QuadGeometry {
    /// Ratio the current vertices were computed for
    ratio: Option<f32>,
    vertices: [QuadVertex; 4],
}

impl Default for QuadGeometry {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadGeometry {
    pub fn new() -> Self {
        Self {
            ratio: None,
            vertices: quad_vertices(1.0, 1.0),
        }
    }

    /// Recompute the quad if the aspect relationship changed
    ///
    /// Returns `true` when new vertices were written to `backend`.
    pub fn update(
        &mut self,
        texture_width: u32,
        texture_height: u32,
        picture_width: f32,
        picture_height: f32,
        backend: &mut impl RenderBackend,
    ) -> bool {
        if texture_height == 0 || picture_height <= 0.0 || picture_width <= 0.0 {
            return false;
        }

        let texture_ratio = texture_width as f32 / texture_height as f32;
        let picture_ratio = picture_width / picture_height;
        let ratio = texture_ratio / picture_ratio;

        if self.ratio == Some(ratio) {
            return false;
        }
        self.ratio = Some(ratio);

        let (half_width, half_height) = fit_extents(texture_ratio, picture_ratio);
        self.vertices = quad_vertices(half_width, half_height);
        backend.write_quad(&self.vertices);

        tracing::debug!(
            "Display quad recomputed: texture {:.4}, picture {:.4}, extents {:.4}x{:.4}",
            texture_ratio,
            picture_ratio,
            half_width,
            half_height
        );
        true
    }

    pub fn vertices(&self) -> &[QuadVertex; 4] {
        &self.vertices
    }

    pub fn ratio(&self) -> Option<f32> {
        self.ratio
    }
}
