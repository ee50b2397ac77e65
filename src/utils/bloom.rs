//! Bloom post-processing and the final output pass
//!
//! The chain runs on half-resolution HDR targets: a luminosity high pass,
//! a separable gaussian blur over five progressively halved mips, and a
//! weighted composite. The output pass adds the composite onto the scene,
//! tone maps, and writes to the egui surface.

use eframe::wgpu::{
    self, AddressMode, BindGroup, BindGroupLayout, Buffer, CommandEncoder, Device, FilterMode,
    Queue, RenderPipeline, Sampler, SamplerDescriptor, TextureFormat, TextureView,
};

use super::errors::Result;
use super::pipeline::{create_render_target, RenderTarget, HDR_FORMAT};
use super::shader_constants::{
    fullscreen_shader, BLOOM_BLUR_FRAGMENT, BLOOM_BRIGHT_FRAGMENT, BLOOM_COMPOSITE_FRAGMENT,
    OUTPUT_FRAGMENT,
};
use super::shader_validator::validate_shader;
use crate::config::ToneMapping;
use crate::scene::BloomParams;

// ============================================================================
// BLOOM CONSTANTS
// ============================================================================

pub const BLOOM_MIPS: usize = 5;
/// Gaussian kernel radius per mip; sigma equals the radius
pub const KERNEL_RADII: [u32; BLOOM_MIPS] = [3, 5, 7, 9, 11];
/// Base contribution of each mip before the radius lerp
pub const BLOOM_FACTORS: [f32; BLOOM_MIPS] = [1.0, 0.8, 0.6, 0.4, 0.2];

const SMOOTH_WIDTH: f32 = 0.01;
const MAX_KERNEL_WEIGHTS: usize = 12;

// ============================================================================

/// Blur target sizes: half the viewport (rounded), then halved per mip
pub fn mip_sizes(size: [u32; 2]) -> [[u32; 2]; BLOOM_MIPS] {
    let half_w = (size[0] as f32 / 2.0).round() as u32;
    let half_h = (size[1] as f32 / 2.0).round() as u32;
    std::array::from_fn(|i| [(half_w >> i).max(1), (half_h >> i).max(1)])
}

/// Normalised-density gaussian coefficients `0..kernel_radius`, packed for a
/// uniform array of vec4
pub fn gaussian_weights(kernel_radius: u32) -> [[f32; 4]; 3] {
    let sigma = kernel_radius.max(1) as f32;
    let mut weights = [[0.0; 4]; 3];
    for i in 0..(kernel_radius as usize).min(MAX_KERNEL_WEIGHTS) {
        let x = i as f32;
        weights[i / 4][i % 4] = 0.39894 * (-0.5 * x * x / (sigma * sigma)).exp() / sigma;
    }
    weights
}

/// Per-mip composite weight: `strength * mix(f, 1.2 - f, radius)`
pub fn composite_weights(strength: f32, radius: f32) -> [f32; BLOOM_MIPS] {
    BLOOM_FACTORS.map(|f| strength * (f + (1.2 - 2.0 * f) * radius))
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BrightUniforms {
    pub threshold: f32,
    pub smooth_width: f32,
    pub _pad0: [f32; 2],
}

impl BrightUniforms {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            smooth_width: SMOOTH_WIDTH,
            _pad0: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurUniforms {
    pub direction: [f32; 2],
    pub texel_size: [f32; 2],
    pub kernel_radius: u32,
    pub _pad0: [u32; 3],
    pub weights: [[f32; 4]; 3],
}

impl BlurUniforms {
    pub fn new(direction: [f32; 2], target_size: [u32; 2], kernel_radius: u32) -> Self {
        Self {
            direction,
            texel_size: [
                1.0 / target_size[0].max(1) as f32,
                1.0 / target_size[1].max(1) as f32,
            ],
            kernel_radius,
            _pad0: [0; 3],
            weights: gaussian_weights(kernel_radius),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositeUniforms {
    pub weights: [[f32; 4]; 2],
}

impl CompositeUniforms {
    pub fn new(params: &BloomParams) -> Self {
        let w = composite_weights(params.strength, params.radius);
        Self {
            weights: [[w[0], w[1], w[2], w[3]], [w[4], 0.0, 0.0, 0.0]],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OutputUniforms {
    pub tone_mapping: u32,
    pub encode_srgb: u32,
    pub exposure: f32,
    pub _pad0: f32,
}

impl OutputUniforms {
    pub fn new(tone_mapping: ToneMapping, target_format: TextureFormat) -> Self {
        Self {
            tone_mapping: tone_mapping.shader_index(),
            encode_srgb: u32::from(!target_format.is_srgb()),
            exposure: 1.0,
            _pad0: 0.0,
        }
    }
}

/// Layout for a full-screen pass: uniform @0, `textures` views from @1, one
/// sampler after them
fn texture_pass_layout(device: &Device, label: &str, textures: u32) -> BindGroupLayout {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];
    for binding in 1..=textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: textures + 1,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

fn texture_pass_bind_group(
    device: &Device,
    label: &str,
    layout: &BindGroupLayout,
    uniforms: &Buffer,
    views: &[&TextureView],
    sampler: &Sampler,
) -> BindGroup {
    let mut entries = vec![wgpu::BindGroupEntry {
        binding: 0,
        resource: uniforms.as_entire_binding(),
    }];
    for (i, view) in views.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        });
    }
    entries.push(wgpu::BindGroupEntry {
        binding: views.len() as u32 + 1,
        resource: wgpu::BindingResource::Sampler(sampler),
    });

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// Validate a post-processing fragment and build its full-screen pipeline
fn fullscreen_pipeline(
    device: &Device,
    label: &str,
    fragment: &str,
    layout: &BindGroupLayout,
    format: TextureFormat,
) -> Result<RenderPipeline> {
    let source = fullscreen_shader(fragment);
    validate_shader(label, &source)?;

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{}_pipeline_layout", label)),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{}_pipeline", label)),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    }))
}

fn uniform_buffer(device: &Device, label: &str, size: usize) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::UNIFORM,
        mapped_at_creation: false,
    })
}

fn linear_sampler(device: &Device, label: &str) -> Sampler {
    device.create_sampler(&SamplerDescriptor {
        label: Some(label),
        address_mode_u: AddressMode::ClampToEdge,
        address_mode_v: AddressMode::ClampToEdge,
        address_mode_w: AddressMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: FilterMode::Nearest,
        ..Default::default()
    })
}

/// Record one full-screen draw into `target`
fn run_fullscreen_pass(
    encoder: &mut CommandEncoder,
    label: &str,
    pipeline: &RenderPipeline,
    bind_group: &BindGroup,
    target: &TextureView,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    rpass.set_pipeline(pipeline);
    rpass.set_bind_group(0, bind_group, &[]);
    rpass.draw(0..3, 0..1);
}

/// Size-dependent textures and the bind groups that read them
struct BloomTargets {
    bright: RenderTarget,
    horizontal: Vec<RenderTarget>,
    vertical: Vec<RenderTarget>,
    composite: RenderTarget,
    bright_bind_group: BindGroup,
    /// Per mip: (horizontal pass input, vertical pass input)
    blur_bind_groups: Vec<(BindGroup, BindGroup)>,
    composite_bind_group: BindGroup,
}

pub struct BloomChain {
    bright_pipeline: RenderPipeline,
    blur_pipeline: RenderPipeline,
    composite_pipeline: RenderPipeline,
    single_texture_layout: BindGroupLayout,
    composite_layout: BindGroupLayout,
    sampler: Sampler,
    bright_uniforms: Buffer,
    /// Two per mip, horizontal then vertical
    blur_uniforms: Vec<Buffer>,
    composite_uniforms: Buffer,
    targets: Option<BloomTargets>,
}

impl BloomChain {
    pub fn new(device: &Device) -> Result<Self> {
        log::debug!("Creating bloom chain ({} mips)", BLOOM_MIPS);

        let single_texture_layout = texture_pass_layout(device, "bloom_single_bgl", 1);
        let composite_layout =
            texture_pass_layout(device, "bloom_composite_bgl", BLOOM_MIPS as u32);

        let bright_pipeline = fullscreen_pipeline(
            device,
            "bloom_bright",
            BLOOM_BRIGHT_FRAGMENT,
            &single_texture_layout,
            HDR_FORMAT,
        )?;
        let blur_pipeline = fullscreen_pipeline(
            device,
            "bloom_blur",
            BLOOM_BLUR_FRAGMENT,
            &single_texture_layout,
            HDR_FORMAT,
        )?;
        let composite_pipeline = fullscreen_pipeline(
            device,
            "bloom_composite",
            BLOOM_COMPOSITE_FRAGMENT,
            &composite_layout,
            HDR_FORMAT,
        )?;

        let blur_uniforms = (0..BLOOM_MIPS * 2)
            .map(|i| {
                uniform_buffer(
                    device,
                    &format!("bloom_blur_uniforms_{}", i),
                    std::mem::size_of::<BlurUniforms>(),
                )
            })
            .collect();

        Ok(Self {
            bright_pipeline,
            blur_pipeline,
            composite_pipeline,
            single_texture_layout,
            composite_layout,
            sampler: linear_sampler(device, "bloom_sampler"),
            bright_uniforms: uniform_buffer(
                device,
                "bloom_bright_uniforms",
                std::mem::size_of::<BrightUniforms>(),
            ),
            blur_uniforms,
            composite_uniforms: uniform_buffer(
                device,
                "bloom_composite_uniforms",
                std::mem::size_of::<CompositeUniforms>(),
            ),
            targets: None,
        })
    }

    /// Recreate the mip chain for a new viewport, reading from `scene_view`
    pub fn resize(
        &mut self,
        device: &Device,
        queue: &Queue,
        scene_view: &TextureView,
        size: [u32; 2],
    ) {
        let mips = mip_sizes(size);
        log::debug!("Bloom targets for {}x{}: {:?}", size[0], size[1], mips);

        let bright = create_render_target(device, mips[0], HDR_FORMAT, "bloom_bright_target");
        let horizontal: Vec<RenderTarget> = mips
            .iter()
            .enumerate()
            .map(|(i, &mip)| {
                create_render_target(device, mip, HDR_FORMAT, &format!("bloom_h_{}", i))
            })
            .collect();
        let vertical: Vec<RenderTarget> = mips
            .iter()
            .enumerate()
            .map(|(i, &mip)| {
                create_render_target(device, mip, HDR_FORMAT, &format!("bloom_v_{}", i))
            })
            .collect();
        let composite = create_render_target(device, mips[0], HDR_FORMAT, "bloom_composite_target");

        let bright_bind_group = texture_pass_bind_group(
            device,
            "bloom_bright_bg",
            &self.single_texture_layout,
            &self.bright_uniforms,
            &[scene_view],
            &self.sampler,
        );

        let mut blur_bind_groups = Vec::with_capacity(BLOOM_MIPS);
        for i in 0..BLOOM_MIPS {
            let input = if i == 0 { &bright.view } else { &vertical[i - 1].view };
            let h_uniforms = &self.blur_uniforms[i * 2];
            let v_uniforms = &self.blur_uniforms[i * 2 + 1];

            queue.write_buffer(
                h_uniforms,
                0,
                bytemuck::bytes_of(&BlurUniforms::new([1.0, 0.0], mips[i], KERNEL_RADII[i])),
            );
            queue.write_buffer(
                v_uniforms,
                0,
                bytemuck::bytes_of(&BlurUniforms::new([0.0, 1.0], mips[i], KERNEL_RADII[i])),
            );

            let h = texture_pass_bind_group(
                device,
                &format!("bloom_h_bg_{}", i),
                &self.single_texture_layout,
                h_uniforms,
                &[input],
                &self.sampler,
            );
            let v = texture_pass_bind_group(
                device,
                &format!("bloom_v_bg_{}", i),
                &self.single_texture_layout,
                v_uniforms,
                &[&horizontal[i].view],
                &self.sampler,
            );
            blur_bind_groups.push((h, v));
        }

        let blur_views: Vec<&TextureView> = vertical.iter().map(|t| &t.view).collect();
        let composite_bind_group = texture_pass_bind_group(
            device,
            "bloom_composite_bg",
            &self.composite_layout,
            &self.composite_uniforms,
            &blur_views,
            &self.sampler,
        );

        self.targets = Some(BloomTargets {
            bright,
            horizontal,
            vertical,
            composite,
            bright_bind_group,
            blur_bind_groups,
            composite_bind_group,
        });
    }

    /// The composited bloom, once targets exist
    pub fn output_view(&self) -> Option<&TextureView> {
        self.targets.as_ref().map(|t| &t.composite.view)
    }

    /// Upload the panel-driven parameters for this frame
    pub fn update(&self, queue: &Queue, params: &BloomParams) {
        queue.write_buffer(
            &self.bright_uniforms,
            0,
            bytemuck::bytes_of(&BrightUniforms::new(params.threshold)),
        );
        queue.write_buffer(
            &self.composite_uniforms,
            0,
            bytemuck::bytes_of(&CompositeUniforms::new(params)),
        );
    }

    pub fn render(&self, encoder: &mut CommandEncoder) {
        let Some(targets) = &self.targets else {
            return;
        };

        run_fullscreen_pass(
            encoder,
            "bloom_bright_pass",
            &self.bright_pipeline,
            &targets.bright_bind_group,
            &targets.bright.view,
        );

        for (i, (h, v)) in targets.blur_bind_groups.iter().enumerate() {
            run_fullscreen_pass(
                encoder,
                "bloom_blur_h_pass",
                &self.blur_pipeline,
                h,
                &targets.horizontal[i].view,
            );
            run_fullscreen_pass(
                encoder,
                "bloom_blur_v_pass",
                &self.blur_pipeline,
                v,
                &targets.vertical[i].view,
            );
        }

        run_fullscreen_pass(
            encoder,
            "bloom_composite_pass",
            &self.composite_pipeline,
            &targets.composite_bind_group,
            &targets.composite.view,
        );
    }
}

/// Final pass drawn inside egui's render pass
pub struct OutputPass {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    sampler: Sampler,
    uniforms: Buffer,
    settings: OutputUniforms,
    bind_group: Option<BindGroup>,
}

impl OutputPass {
    pub fn new(
        device: &Device,
        target_format: TextureFormat,
        tone_mapping: ToneMapping,
    ) -> Result<Self> {
        let layout = texture_pass_layout(device, "output_bgl", 2);
        let pipeline =
            fullscreen_pipeline(device, "output", OUTPUT_FRAGMENT, &layout, target_format)?;
        let settings = OutputUniforms::new(tone_mapping, target_format);
        log::info!(
            "Output pass: {:?} tone mapping, {:?} target (sRGB encode: {})",
            tone_mapping,
            target_format,
            settings.encode_srgb == 1
        );

        Ok(Self {
            pipeline,
            layout,
            sampler: linear_sampler(device, "output_sampler"),
            uniforms: uniform_buffer(
                device,
                "output_uniforms",
                std::mem::size_of::<OutputUniforms>(),
            ),
            settings,
            bind_group: None,
        })
    }

    /// Point the pass at freshly created scene and bloom targets
    pub fn rebind(
        &mut self,
        device: &Device,
        queue: &Queue,
        scene_view: &TextureView,
        bloom_view: &TextureView,
    ) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&self.settings));
        self.bind_group = Some(texture_pass_bind_group(
            device,
            "output_bg",
            &self.layout,
            &self.uniforms,
            &[scene_view, bloom_view],
            &self.sampler,
        ));
    }

    pub fn paint(&self, render_pass: &mut wgpu::RenderPass<'static>) {
        if let Some(bind_group) = &self.bind_group {
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_sizes_halve_from_half_resolution() {
        let mips = mip_sizes([1280, 720]);
        assert_eq!(mips[0], [640, 360]);
        assert_eq!(mips[1], [320, 180]);
        assert_eq!(mips[4], [40, 22]);
    }

    #[test]
    fn test_mip_sizes_round_and_never_hit_zero() {
        let mips = mip_sizes([3, 1]);
        assert_eq!(mips[0], [2, 1]);
        assert!(mips.iter().all(|m| m[0] >= 1 && m[1] >= 1));
    }

    #[test]
    fn test_gaussian_weights_fill_kernel_only() {
        let weights = gaussian_weights(3);
        let flat: Vec<f32> = weights.iter().flatten().copied().collect();
        assert!((flat[0] - 0.39894 / 3.0).abs() < 1e-6);
        assert!(flat[1] < flat[0] && flat[2] < flat[1]);
        assert!(flat[3..].iter().all(|&w| w == 0.0));

        let widest = gaussian_weights(11);
        let flat: Vec<f32> = widest.iter().flatten().copied().collect();
        assert!(flat[10] > 0.0);
        assert_eq!(flat[11], 0.0);
    }

    #[test]
    fn test_composite_weights_follow_radius() {
        assert_eq!(composite_weights(1.0, 0.0), BLOOM_FACTORS);

        let full = composite_weights(1.0, 1.0);
        for (w, f) in full.iter().zip(BLOOM_FACTORS) {
            assert!((w - (1.2 - f)).abs() < 1e-6);
        }

        let strong = composite_weights(2.0, 0.0);
        assert_eq!(strong[0], 2.0);
        assert_eq!(composite_weights(0.0, 0.5), [0.0; BLOOM_MIPS]);
    }

    #[test]
    fn test_uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<BrightUniforms>(), 16);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 80);
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 32);
        assert_eq!(std::mem::size_of::<OutputUniforms>(), 16);
    }

    #[test]
    fn test_blur_uniforms_texel_size() {
        let u = BlurUniforms::new([1.0, 0.0], [640, 360], 3);
        assert_eq!(u.texel_size, [1.0 / 640.0, 1.0 / 360.0]);
        assert_eq!(u.kernel_radius, 3);
    }

    #[test]
    fn test_output_encodes_srgb_only_for_linear_targets() {
        let linear = OutputUniforms::new(ToneMapping::Aces, TextureFormat::Bgra8Unorm);
        assert_eq!(linear.encode_srgb, 1);
        assert_eq!(linear.tone_mapping, 2);

        let srgb = OutputUniforms::new(ToneMapping::None, TextureFormat::Bgra8UnormSrgb);
        assert_eq!(srgb.encode_srgb, 0);
        assert_eq!(srgb.tone_mapping, 0);
    }

    #[test]
    fn test_composite_uniforms_pack_five_weights() {
        let params = BloomParams {
            threshold: 0.15,
            strength: 1.0,
            radius: 0.0,
        };
        let u = CompositeUniforms::new(&params);
        assert_eq!(u.weights[0], [1.0, 0.8, 0.6, 0.4]);
        assert_eq!(u.weights[1], [0.2, 0.0, 0.0, 0.0]);
    }
}
