//! wgpu renderer for planar YUV pictures
//!
//! Draws the display quad sampling the three plane textures and converting
//! to RGB in the fragment shader. Implements [`RenderBackend`] so the
//! playback pipeline can drive it.

use wgpu::util::DeviceExt;

use super::backend::{PlaneUpload, RenderBackend};
use super::frame::{PlaneIndex, PLANE_COUNT};
use super::geometry::{quad_vertices, QuadVertex, QUAD_INDICES};
use super::texture::PlaneTexture;
use super::PlaybackError;
use crate::gpu_context::GpuContext;
use crate::shaders;

/// Renderer that owns the GPU context and the plane textures
pub struct YuvRenderer {
    gpu: GpuContext,
    /// Render pipeline for the textured quad
    pipeline: wgpu::RenderPipeline,
    /// Bind group layout for the three planes + sampler
    bind_group_layout: wgpu::BindGroupLayout,
    /// Linear clamp-to-edge sampler shared by all planes
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    planes: [Option<PlaneTexture>; PLANE_COUNT],
    bind_group: Option<wgpu::BindGroup>,
    /// A plane was reallocated since the bind group was built
    bindings_stale: bool,
    /// Frame drawn but not yet presented
    pending_frame: Option<wgpu::SurfaceTexture>,
}

impl YuvRenderer {
    /// Create the renderer on top of a configured GPU context
    pub fn new(gpu: GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("YUV Quad Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::YUV_QUAD_SHADER.into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Plane Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let plane_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("YUV Bind Group Layout"),
            entries: &[
                plane_entry(0),
                plane_entry(1),
                plane_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("YUV Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("YUV Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(shaders::VERTEX_ENTRY),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(shaders::FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.surface_format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&quad_vertices(1.0, 1.0)),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            gpu,
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
            index_buffer,
            planes: [None, None, None],
            bind_group: None,
            bindings_stale: true,
            pending_frame: None,
        }
    }

    /// Show the frame produced by the last successful `draw`
    pub fn present(&mut self) {
        if let Some(frame) = self.pending_frame.take() {
            frame.present();
        }
    }

    /// Follow a window resize
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gpu.resize(new_size);
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn acquire_frame(&mut self) -> Result<Option<wgpu::SurfaceTexture>, PlaybackError> {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("Surface lost or outdated, reconfiguring");
                self.gpu.reconfigure();
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(PlaybackError::PresentationSetup(
                "Out of GPU memory while acquiring surface".to_string(),
            )),
            Err(e) => {
                tracing::warn!("Surface error: {:?}", e);
                Ok(None)
            }
        }
    }
}

impl RenderBackend for YuvRenderer {
    fn allocate_plane(&mut self, plane: PlaneIndex, upload: &PlaneUpload<'_>) {
        let texture = PlaneTexture::new(&self.gpu.device, plane, upload.width, upload.height);
        texture.write(&self.gpu.queue, upload);
        self.planes[plane.index()] = Some(texture);
        self.bindings_stale = true;

        tracing::debug!("Allocated {} {}x{}", plane.label(), upload.width, upload.height);
    }

    fn update_plane(&mut self, plane: PlaneIndex, upload: &PlaneUpload<'_>) {
        if let Some(texture) = &self.planes[plane.index()] {
            texture.write(&self.gpu.queue, upload);
            return;
        }
        self.allocate_plane(plane, upload);
    }

    fn bind_planes(&mut self) {
        if !self.bindings_stale {
            return;
        }
        let [Some(y), Some(u), Some(v)] = &self.planes else {
            return;
        };

        self.bind_group = Some(self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("YUV Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(y.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(u.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(v.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
        self.bindings_stale = false;
    }

    fn write_quad(&mut self, vertices: &[QuadVertex; 4]) {
        self.gpu
            .queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
    }

    fn draw(&mut self) -> Result<(), PlaybackError> {
        let Some(frame) = self.acquire_frame()? else {
            return Ok(());
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("YUV Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("YUV Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(bind_group) = &self.bind_group {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.pending_frame = Some(frame);
        Ok(())
    }
}
