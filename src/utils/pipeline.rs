use eframe::epaint;
use eframe::wgpu::{
    self, util::DeviceExt, BindGroup, Buffer, CommandEncoder, Device, Extent3d, Queue,
    RenderPipeline, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    TextureView, TextureViewDescriptor,
};
use glam::Mat4;

use super::bloom::{BloomChain, OutputPass};
use super::errors::Result;
use super::shader_constants::WIREFRAME_SHADER;
use super::shader_validator::validate_shader;
use crate::config::ToneMapping;
use crate::frame_driver::FrameInputs;
use crate::scene::{MeshHandle, ShaderUniformSet};

/// Offscreen scene and bloom format
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

// Scene uniforms structure, mirrors `SceneUniforms` in wireframe.wgsl
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub time: f32,
    pub frequency: f32,
    pub _pad0: [f32; 2],
    pub color: [f32; 4],
}

impl SceneUniforms {
    pub fn new(view_proj: Mat4, set: &ShaderUniformSet) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            time: set.elapsed_time,
            frequency: set.frequency,
            _pad0: [0.0; 2],
            color: [set.red, set.green, set.blue, 1.0],
        }
    }
}

/// An offscreen texture and the view passes render into or sample from
pub struct RenderTarget {
    _texture: Texture,
    pub view: TextureView,
}

/// Helper: create an offscreen texture usable as attachment and binding
pub fn create_render_target(
    device: &Device,
    size: [u32; 2],
    format: TextureFormat,
    label: &str,
) -> RenderTarget {
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format,
        usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });

    let view = texture.create_view(&TextureViewDescriptor::default());
    RenderTarget {
        _texture: texture,
        view,
    }
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x3,
    offset: 0,
    shader_location: 0,
}];

struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

/// Scene pass: the displaced icosahedron drawn as a line list
pub struct WireframePass {
    pipeline: RenderPipeline,
    uniform_buffer: Buffer,
    bind_group: BindGroup,
    mesh: Option<GpuMesh>,
    mesh_generation: Option<u64>,
}

impl WireframePass {
    pub fn new(device: &Device) -> Result<Self> {
        validate_shader("wireframe", WIREFRAME_SHADER)?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wireframe_shader"),
            source: wgpu::ShaderSource::Wgsl(WIREFRAME_SHADER.into()),
        });

        let uniform_size = std::mem::size_of::<SceneUniforms>() as u64;
        log::trace!("Creating scene uniform buffer ({} bytes)", uniform_size);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_uniforms"),
            size: uniform_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bg"),
            layout: &uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wireframe_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("wireframe_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            uniform_buffer,
            bind_group,
            mesh: None,
            mesh_generation: None,
        })
    }

    /// Replace the GPU copy of the mesh when its generation changed
    pub fn upload_mesh(&mut self, device: &Device, mesh: &MeshHandle) {
        if self.mesh_generation == Some(mesh.generation) {
            return;
        }
        self.mesh_generation = Some(mesh.generation);

        let geometry = &mesh.geometry;
        if geometry.edges.is_empty() || geometry.sizing.radius <= 0.0 {
            log::debug!("Mesh generation {} is empty, nothing to draw", mesh.generation);
            self.mesh = None;
            return;
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wireframe_vertices"),
            contents: bytemuck::cast_slice(&geometry.positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wireframe_edges"),
            contents: bytemuck::cast_slice(&geometry.edges),
            usage: wgpu::BufferUsages::INDEX,
        });

        log::debug!(
            "Uploaded mesh generation {}: {} vertices, {} edges",
            mesh.generation,
            geometry.positions.len(),
            geometry.edge_count()
        );
        self.mesh = Some(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: geometry.edges.len() as u32,
        });
    }

    pub fn update_uniforms(&self, queue: &Queue, uniforms: &SceneUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn render(&self, encoder: &mut CommandEncoder, color: &TextureView, depth: &TextureView) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("wireframe_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(mesh) = &self.mesh {
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            rpass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

struct SceneTargets {
    size: [u32; 2],
    color: RenderTarget,
    depth: RenderTarget,
}

/// All GPU state of the visualizer, stored in egui's callback resources
pub struct VisualizerRenderer {
    wireframe: WireframePass,
    bloom: BloomChain,
    output: OutputPass,
    targets: Option<SceneTargets>,
}

impl VisualizerRenderer {
    pub fn new(
        device: &Device,
        target_format: TextureFormat,
        tone_mapping: ToneMapping,
    ) -> Result<Self> {
        log::info!("Creating visualizer renderer (target: {:?})", target_format);
        Ok(Self {
            wireframe: WireframePass::new(device)?,
            bloom: BloomChain::new(device)?,
            output: OutputPass::new(device, target_format, tone_mapping)?,
            targets: None,
        })
    }

    /// Recreate size-dependent targets when the viewport changed
    pub fn ensure_size(&mut self, device: &Device, queue: &Queue, size: [u32; 2]) {
        let size = [size[0].max(1), size[1].max(1)];
        if self.targets.as_ref().map(|t| t.size) == Some(size) {
            return;
        }
        log::debug!("Render targets resized to {}x{}", size[0], size[1]);

        let color = create_render_target(device, size, HDR_FORMAT, "scene_color");
        let depth = create_render_target(device, size, DEPTH_FORMAT, "scene_depth");

        self.bloom.resize(device, queue, &color.view, size);
        if let Some(bloom_view) = self.bloom.output_view() {
            self.output.rebind(device, queue, &color.view, bloom_view);
        }

        self.targets = Some(SceneTargets { size, color, depth });
    }

    /// Record the scene and bloom passes for one frame
    pub fn prepare(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        frame: &FrameInputs,
        mesh: &MeshHandle,
        size: [u32; 2],
    ) {
        self.ensure_size(device, queue, size);
        self.wireframe.upload_mesh(device, mesh);
        self.wireframe.update_uniforms(queue, &frame.uniforms);
        self.bloom.update(queue, &frame.bloom);

        if let Some(targets) = &self.targets {
            self.wireframe
                .render(encoder, &targets.color.view, &targets.depth.view);
            self.bloom.render(encoder);
        }
    }

    pub fn paint(&self, render_pass: &mut wgpu::RenderPass<'static>) {
        self.output.paint(render_pass);
    }
}

// Callback for rendering the visualizer into the central panel
pub struct VisualizerCallback {
    pub frame: FrameInputs,
    pub mesh: MeshHandle,
    /// Physical pixel size of the painted rect
    pub target_size: [u32; 2],
}

impl egui_wgpu::CallbackTrait for VisualizerCallback {
    fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        encoder: &mut wgpu::CommandEncoder,
        resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        if let Some(renderer) = resources.get_mut::<VisualizerRenderer>() {
            renderer.prepare(device, queue, encoder, &self.frame, &self.mesh, self.target_size);
        }
        Vec::new()
    }

    fn paint(
        &self,
        _info: epaint::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        resources: &egui_wgpu::CallbackResources,
    ) {
        let Some(renderer) = resources.get::<VisualizerRenderer>() else {
            return;
        };
        renderer.paint(render_pass);

        // Log first render only
        static FIRST_RENDER: std::sync::Once = std::sync::Once::new();
        FIRST_RENDER.call_once(|| {
            log::debug!("First visualizer render executed");
        });
    }
}
