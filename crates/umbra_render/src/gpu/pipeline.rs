use std::{borrow::Cow, collections::HashMap};

use slotmap::SlotMap;
use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendComponent,
    BlendFactor, BlendOperation, BlendState, BufferBindingType, ColorTargetState, ColorWrites,
    Device, ErrorFilter, FragmentState, PipelineLayoutDescriptor, RenderPipeline,
    RenderPipelineDescriptor, SamplerBindingType, ShaderModule, ShaderModuleDescriptor,
    ShaderSource, ShaderStages, TextureFormat, TextureSampleType, TextureViewDimension,
    VertexBufferLayout, VertexState,
};

use crate::{
    backend::{BlendMode, ShaderId},
    error::RenderError,
    logging,
    vertex::{Vertex, shadow_vertex_desc},
};

/// Texture slots the quad shader declares
pub const TEXTURE_SLOTS: usize = 16;

/// Which of the built-in programs a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Batched quads; `Some` uses a user shader module
    Quad(Option<ShaderId>),
    Shadow,
    Blit,
    Merge,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    kind: PipelineKind,
    blend: BlendMode,
    format: TextureFormat,
}

/// The fixed blend equations behind each [`BlendMode`]
pub fn blend_state(mode: BlendMode) -> Option<BlendState> {
    let both = |component: BlendComponent| BlendState {
        color: component,
        alpha: component,
    };
    match mode {
        BlendMode::None => None,
        BlendMode::Alpha => Some(BlendState::ALPHA_BLENDING),
        BlendMode::Additive => Some(both(BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOperation::Add,
        })),
        BlendMode::Multiply => Some(both(BlendComponent {
            src_factor: BlendFactor::Dst,
            dst_factor: BlendFactor::Zero,
            operation: BlendOperation::Add,
        })),
    }
}

/// Compiles WGSL inside a validation scope so a bad shader becomes an error, not a panic
pub fn compile_shader(
    device: &Device,
    label: &str,
    source: &str,
) -> Result<ShaderModule, RenderError> {
    device.push_error_scope(ErrorFilter::Validation);
    let module = device.create_shader_module(ShaderModuleDescriptor {
        label: Some(label),
        source: ShaderSource::Wgsl(Cow::Owned(source.to_owned())),
    });
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(module),
        Some(error) => {
            let message = error.to_string();
            logging::critical("compile_shader", &format!("`{label}`: {message}"));
            Err(RenderError::ShaderCompilation {
                label: label.to_owned(),
                message,
            })
        }
    }
}

/// Bind group layouts, built-in shader modules & every pipeline built so far
///
/// Pipelines are created on first use for each (program, blend mode, target format)
pub struct Pipelines {
    /// Group 0 of the quad program: [`TEXTURE_SLOTS`] textures, then as many samplers
    pub texture_layout: BindGroupLayout,
    /// One uniform buffer visible to both stages (camera, shadow & light uniforms)
    pub uniform_layout: BindGroupLayout,
    pub blit_layout: BindGroupLayout,
    pub merge_layout: BindGroupLayout,
    quad: ShaderModule,
    shadow: ShaderModule,
    blit: ShaderModule,
    merge: ShaderModule,
    light: ShaderModule,
    cache: HashMap<PipelineKey, RenderPipeline>,
}

impl Pipelines {
    pub fn new(device: &Device) -> Result<Self, RenderError> {
        let mut texture_entries: Vec<_> = (0..TEXTURE_SLOTS as u32).map(texture_entry).collect();
        texture_entries.extend((0..TEXTURE_SLOTS as u32).map(|i| sampler_entry(TEXTURE_SLOTS as u32 + i)));

        let texture_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Quad Texture Bind Group Layout"),
            entries: &texture_entries,
        });
        let uniform_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let blit_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let merge_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Merge Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                sampler_entry(3),
            ],
        });

        Ok(Self {
            quad: compile_shader(device, "quad", include_str!("../../shaders/quad.wgsl"))?,
            shadow: compile_shader(device, "shadow", include_str!("../../shaders/shadow.wgsl"))?,
            blit: compile_shader(device, "blit", include_str!("../../shaders/blit.wgsl"))?,
            merge: compile_shader(device, "merge", include_str!("../../shaders/merge.wgsl"))?,
            light: compile_shader(device, "light", include_str!("../../shaders/light.wgsl"))?,
            texture_layout,
            uniform_layout,
            blit_layout,
            merge_layout,
            cache: HashMap::new(),
        })
    }

    /// Looks up or builds a pipeline; `None` when a user shader is unknown or doesn't link
    pub fn get(
        &mut self,
        device: &Device,
        kind: PipelineKind,
        blend: BlendMode,
        format: TextureFormat,
        user_shaders: &SlotMap<ShaderId, ShaderModule>,
    ) -> Option<RenderPipeline> {
        let key = PipelineKey {
            kind,
            blend,
            format,
        };
        if let Some(pipeline) = self.cache.get(&key) {
            return Some(pipeline.clone());
        }

        let (module, layouts, buffers, label): (_, Vec<&BindGroupLayout>, Vec<VertexBufferLayout>, _) =
            match kind {
                PipelineKind::Quad(shader) => {
                    let module = match shader {
                        Some(id) => user_shaders.get(id)?,
                        None => &self.quad,
                    };
                    (
                        module,
                        vec![&self.texture_layout, &self.uniform_layout],
                        vec![Vertex::desc()],
                        "Quad Pipeline",
                    )
                }
                PipelineKind::Shadow => (
                    &self.shadow,
                    vec![&self.uniform_layout],
                    vec![shadow_vertex_desc()],
                    "Shadow Pipeline",
                ),
                PipelineKind::Blit => (&self.blit, vec![&self.blit_layout], vec![], "Blit Pipeline"),
                PipelineKind::Merge => {
                    (&self.merge, vec![&self.merge_layout], vec![], "Merge Pipeline")
                }
                PipelineKind::Light => {
                    (&self.light, vec![&self.uniform_layout], vec![], "Light Pipeline")
                }
            };

        device.push_error_scope(ErrorFilter::Validation);
        let pipeline = create_pipeline(device, label, module, &layouts, &buffers, format, blend);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Pipelines::get: {label} for {format:?} is invalid: {error}");
            return None;
        }
        log::debug!("Pipelines::get: built {label} for {format:?} with {blend:?}");
        self.cache.insert(key, pipeline.clone());
        Some(pipeline)
    }
}

fn texture_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::Filtering),
        count: None,
    }
}

fn create_pipeline(
    device: &Device,
    label: &str,
    module: &ShaderModule,
    layouts: &[&BindGroupLayout],
    buffers: &[VertexBufferLayout],
    format: TextureFormat,
    blend: BlendMode,
) -> RenderPipeline {
    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        primitive: Default::default(),
        depth_stencil: None,
        multisample: Default::default(),
        fragment: Some(FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: blend_state(blend),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
        cache: None,
    })
}
