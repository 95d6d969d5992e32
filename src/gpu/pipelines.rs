//! Two-input render pipeline and its [`GraphicsBackend`] implementation
//!
//! The pipeline mimics a small slice of a fixed-function texture-unit model
//! on top of wgpu: textures are addressed by [`TextureId`], bound to numbered
//! units, and each sampler uniform selects which unit it reads from. At draw
//! time the two sampled units are resolved into a bind group.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::context::GpuContext;
use crate::backend::{AttributeLocation, GraphicsBackend, ProgramId, TextureId, UniformLocation};
use crate::coords::{self, Rotation};
use crate::error::GpuError;

/// The one program this pipeline links
pub const COMPOSITE_PROGRAM: ProgramId = ProgramId(1);

/// Vertex attributes in shader location order
const ATTRIBUTES: [&str; 3] = ["position", "inputTextureCoordinate", "inputTextureCoordinate2"];
/// Sampler uniforms in binding order
const SAMPLERS: [&str; 2] = ["inputImageTexture", "inputImageTexture2"];

const MAX_TEXTURE_UNITS: usize = 8;
const QUAD_FLOATS: usize = 8;

/// Full-screen quad in triangle-strip order
const QUAD_POSITIONS: [f32; QUAD_FLOATS] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

const VERTEX_SHADER: &str = include_str!("shaders/two_input_vertex.wgsl");
const DEFAULT_FRAGMENT_SHADER: &str = include_str!("shaders/overlay_blend.wgsl");

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const COORD_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
const COORD2_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x2];

struct UnitTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

impl UnitTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Compositor Input Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm, // Linear, no sRGB conversion
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Self {
            texture,
            view,
            size: (width, height),
        }
    }

    fn write(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        let (width, height) = self.size;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Render pipeline sampling two textures through independent coordinate sets
pub struct CompositePipeline {
    render_pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    // Sampled when a unit has nothing bound
    placeholder: UnitTexture,

    textures: HashMap<TextureId, UnitTexture>,
    next_texture: u32,
    units: [Option<TextureId>; MAX_TEXTURE_UNITS],
    sampler_units: [usize; SAMPLERS.len()],

    vertex_buffers: [wgpu::Buffer; ATTRIBUTES.len()],
    enabled: [bool; ATTRIBUTES.len()],
}

impl CompositePipeline {
    /// Pipeline with the default overlay blend
    pub fn new(ctx: &GpuContext) -> Self {
        Self::with_fragment(ctx, DEFAULT_FRAGMENT_SHADER)
    }

    /// Pipeline with a caller-supplied fragment stage.
    ///
    /// The fragment source is appended to the shared vertex stage and must
    /// define `fs_main(in: VertexOutput)`.
    pub fn with_fragment(ctx: &GpuContext, fragment_wgsl: &str) -> Self {
        Self::with_shaders(ctx, VERTEX_SHADER, fragment_wgsl)
    }

    /// Pipeline with caller-supplied vertex and fragment stages.
    ///
    /// The vertex source must define `vs_main` reading position, primary
    /// and secondary coordinates from locations 0, 1 and 2, and the
    /// `VertexOutput` struct consumed by `fs_main`.
    pub fn with_shaders(ctx: &GpuContext, vertex_wgsl: &str, fragment_wgsl: &str) -> Self {
        let device = &ctx.device;

        let source = format!("{vertex_wgsl}\n{fragment_wgsl}");
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Two-Input Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
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
            label: Some("Two-Input Bind Group Layout"),
            entries: &[
                // inputImageTexture
                texture_entry(0),
                // inputImageTexture2
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Two-Input Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let stride = (2 * std::mem::size_of::<f32>()) as wgpu::BufferAddress;
        let vertex_layout = |attributes: &'static [wgpu::VertexAttribute]| wgpu::VertexBufferLayout {
            array_stride: stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        };

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Two-Input Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    vertex_layout(&POSITION_ATTRS),
                    vertex_layout(&COORD_ATTRS),
                    vertex_layout(&COORD2_ATTRS),
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Two-Input Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // Transparent black, so an unbound secondary unit has no visible effect
        let placeholder = UnitTexture::new(device, 1, 1);
        placeholder.write(&ctx.queue, &[0, 0, 0, 0]);

        let identity = coords::rotation_coords(Rotation::Normal, false, false);
        let create_vertex_buffer = |label: &str, contents: &[f32]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(contents),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            })
        };
        let vertex_buffers = [
            create_vertex_buffer("Position Buffer", &QUAD_POSITIONS),
            create_vertex_buffer("Texture Coordinate Buffer", identity.as_slice()),
            create_vertex_buffer("Texture Coordinate 2 Buffer", identity.as_slice()),
        ];

        Self {
            render_pipeline,
            bind_group_layout,
            sampler,
            placeholder,
            textures: HashMap::new(),
            next_texture: 1,
            units: [None; MAX_TEXTURE_UNITS],
            sampler_units: [0, 1],
            vertex_buffers,
            enabled: [true, true, false],
        }
    }

    /// Borrow the pipeline as a [`GraphicsBackend`] for this frame's calls
    pub fn backend<'a>(&'a mut self, ctx: &'a GpuContext) -> CompositeBackend<'a> {
        CompositeBackend { ctx, pipeline: self }
    }

    fn unit_view(&self, unit: usize) -> &wgpu::TextureView {
        self.units
            .get(unit)
            .copied()
            .flatten()
            .and_then(|id| self.textures.get(&id))
            .map_or(&self.placeholder.view, |texture| &texture.view)
    }

    /// Draw the composited quad to the window surface
    pub fn render(&self, ctx: &GpuContext) -> Result<(), GpuError> {
        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Two-Input Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(self.unit_view(self.sampler_units[0])),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.unit_view(self.sampler_units[1])),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Composite Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Render Pass"),
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

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            for (slot, buffer) in self.vertex_buffers.iter().enumerate() {
                render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            render_pass.draw(0..4, 0..1);
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

/// [`CompositePipeline`] bound to a context for immediate GPU calls
pub struct CompositeBackend<'a> {
    ctx: &'a GpuContext,
    pipeline: &'a mut CompositePipeline,
}

impl GraphicsBackend for CompositeBackend<'_> {
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<AttributeLocation> {
        if program != COMPOSITE_PROGRAM {
            return None;
        }
        ATTRIBUTES
            .iter()
            .position(|attribute| *attribute == name)
            .map(|index| AttributeLocation(index as u32))
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if program != COMPOSITE_PROGRAM {
            return None;
        }
        SAMPLERS
            .iter()
            .position(|sampler| *sampler == name)
            .map(|index| UniformLocation(index as u32))
    }

    fn enable_vertex_attribute(&mut self, location: AttributeLocation) {
        if let Some(enabled) = self.pipeline.enabled.get_mut(location.0 as usize) {
            *enabled = true;
        }
    }

    fn set_vertex_attribute(&mut self, location: AttributeLocation, components: u32, data: &[f32]) {
        let index = location.0 as usize;
        if components != 2 || data.len() != QUAD_FLOATS {
            log::warn!(
                "Unsupported attribute data for location {}: {} components, {} floats",
                index,
                components,
                data.len()
            );
            return;
        }
        if !self.pipeline.enabled.get(index).copied().unwrap_or(false) {
            log::trace!("Attribute {} disabled, ignoring upload", index);
            return;
        }
        self.ctx
            .queue
            .write_buffer(&self.pipeline.vertex_buffers[index], 0, bytemuck::cast_slice(data));
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        let Some(slot) = self.pipeline.sampler_units.get_mut(location.0 as usize) else {
            return;
        };
        match usize::try_from(value) {
            Ok(unit) if unit < MAX_TEXTURE_UNITS => *slot = unit,
            _ => log::warn!("Texture unit {} out of range", value),
        }
    }

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.pipeline.next_texture);
        self.pipeline.next_texture += 1;
        self.pipeline
            .textures
            .insert(id, UnitTexture::new(&self.ctx.device, 1, 1));
        id
    }

    fn upload_texture(&mut self, unit: u32, texture: TextureId, width: u32, height: u32, rgba: &[u8]) {
        let expected = width as usize * height as usize * 4;
        if rgba.len() < expected {
            log::warn!("Texture upload needs {} bytes, got {}", expected, rgba.len());
            return;
        }
        let Some(existing) = self.pipeline.textures.get_mut(&texture) else {
            log::warn!("Upload to unknown texture {:?}", texture);
            return;
        };

        // Same name, new storage when the dimensions change
        if existing.size != (width, height) {
            existing.texture.destroy();
            *existing = UnitTexture::new(&self.ctx.device, width, height);
        }
        existing.write(&self.ctx.queue, &rgba[..expected]);

        self.bind_texture(unit, Some(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match self.pipeline.units.get_mut(unit as usize) {
            Some(slot) => *slot = texture,
            None => log::warn!("Texture unit {} out of range", unit),
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(removed) = self.pipeline.textures.remove(&texture) {
            removed.texture.destroy();
        }
        for slot in self.pipeline.units.iter_mut() {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }
}
