//! Embedded WGSL shaders

/// YUV 4:2:0 quad shader: `vs_main` takes [`crate::video::QuadVertex`],
/// `fs_main` samples the three plane textures
pub const YUV_QUAD_SHADER: &str = include_str!("yuv_quad.wgsl");

/// Vertex entry point of [`YUV_QUAD_SHADER`]
pub const VERTEX_ENTRY: &str = "vs_main";

/// Fragment entry point of [`YUV_QUAD_SHADER`]
pub const FRAGMENT_ENTRY: &str = "fs_main";
