//! [`GpuBackend`] on top of `wgpu`
//!
//! Every draw records its own render pass into one command encoder that is submitted at
//! [`end_frame`](GpuBackend::end_frame) or before a readback. Passes load the existing
//! contents, so draws, clears & fullscreen passes land in the order they were issued

mod pipeline;
mod target;
mod texture;

pub use pipeline::{PipelineKind, TEXTURE_SLOTS, blend_state, compile_shader};

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2};
use slotmap::SlotMap;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindingResource, Buffer,
    BufferDescriptor, BufferUsages, CommandEncoder, Device, DeviceDescriptor, Extent3d,
    IndexFormat, LoadOp, MapMode, Operations, Origin3d, PollType, Queue, RenderPass,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RequestAdapterOptions,
    ShaderModule, StoreOp, SurfaceTarget, TexelCopyBufferInfo, TexelCopyBufferLayout,
    TexelCopyTextureInfo, TextureAspect, TextureFormat, TextureView, WindowHandle,
    util::{BufferInitDescriptor, DeviceExt, new_instance_with_webgpu_detection},
};

use crate::{
    backend::{BlendMode, FullscreenPass, GpuBackend, PixelBuffer, PixelOrigin, ShaderId, rgba_len},
    batch::Batch,
    color::Color,
    error::RenderError,
    target::{TargetFormat, TargetId},
    texture::{Texture, TextureId, TextureOptions},
};

use pipeline::Pipelines;
use target::{Backbuffer, GpuTarget, texture_format};
use texture::GpuTexture;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ShadowUniform {
    view_proj: [[f32; 4]; 4],
    color: [f32; 4],
}

/// What "the screen" is for this backend
enum Screen {
    Surface(Backbuffer),
    /// Offscreen stand-in when there is no window
    Headless(GpuTarget),
}

/// Color attachment of the bound target
struct PassTarget {
    view: TextureView,
    format: TextureFormat,
}

/// `wgpu` device, resources & pipelines behind a [`Renderer`](crate::Renderer)
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    screen: Screen,
    pipelines: Pipelines,
    textures: SlotMap<TextureId, GpuTexture>,
    targets: SlotMap<TargetId, GpuTarget>,
    shaders: SlotMap<ShaderId, ShaderModule>,
    filler: GpuTexture,
    encoder: Option<CommandEncoder>,
    bound: Option<TargetId>,
    blend: BlendMode,
    in_frame: bool,
}

impl WgpuBackend {
    /// Creates a backend presenting to `window`
    pub async fn new(
        window: impl Into<SurfaceTarget<'static>> + WindowHandle,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let instance = new_instance_with_webgpu_detection(&Default::default()).await;
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                // Force find adapter that can present to this surface
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .map_err(|_| RenderError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;
        let backbuffer = Backbuffer::new(surface, &adapter, &device, width, height)?;
        Self::with_screen(device, queue, Screen::Surface(backbuffer))
    }

    /// Creates a backend whose screen is an offscreen RGBA8 texture
    pub async fn headless(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSizedTarget { width, height });
        }
        let instance = new_instance_with_webgpu_detection(&Default::default()).await;
        let adapter = instance
            .request_adapter(&RequestAdapterOptions::default())
            .await
            .map_err(|_| RenderError::NoAdapter)?;
        let (device, queue) = request_device(&adapter).await?;
        let screen = GpuTarget::new(&device, width, height, texture_format(TargetFormat::Rgba8));
        Self::with_screen(device, queue, Screen::Headless(screen))
    }

    fn with_screen(device: Device, queue: Queue, screen: Screen) -> Result<Self, RenderError> {
        let pipelines = Pipelines::new(&device)?;
        let filler = GpuTexture::filler(&device, &queue);
        log::info!("WgpuBackend: device ready ({TEXTURE_SLOTS} texture slots)");

        Ok(Self {
            device,
            queue,
            screen,
            pipelines,
            textures: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            filler,
            encoder: None,
            bound: None,
            blend: BlendMode::Alpha,
            in_frame: false,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Format of the screen's color attachment
    pub fn surface_format(&self) -> TextureFormat {
        match &self.screen {
            Screen::Surface(backbuffer) => backbuffer.format(),
            Screen::Headless(target) => target.format,
        }
    }

    /// View & format of the bound target, `None` (logged) if it can't be drawn to right now
    fn pass_target(&self, context: &str) -> Option<PassTarget> {
        match self.bound {
            Some(id) => match self.targets.get(id) {
                Some(target) => Some(PassTarget {
                    view: target.view.clone(),
                    format: target.format,
                }),
                None => {
                    log::warn!("WgpuBackend::{context}: bound target was destroyed");
                    None
                }
            },
            None => match &self.screen {
                Screen::Headless(target) => Some(PassTarget {
                    view: target.view.clone(),
                    format: target.format,
                }),
                Screen::Surface(backbuffer) => match backbuffer.frame() {
                    Some(frame) => Some(PassTarget {
                        view: frame.view.clone(),
                        format: backbuffer.format(),
                    }),
                    None => {
                        log::warn!("WgpuBackend::{context}: no frame in flight for the screen");
                        None
                    }
                },
            },
        }
    }

    fn pipeline(&mut self, kind: PipelineKind, format: TextureFormat) -> Option<RenderPipeline> {
        self.pipelines
            .get(&self.device, kind, self.blend, format, &self.shaders)
    }

    fn uniform_bind_group(&self, label: &str, contents: &[u8]) -> BindGroup {
        let buffer = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: BufferUsages::UNIFORM,
        });
        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(label),
            layout: &self.pipelines.uniform_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    /// Slot `i` samples `textures[i]`; unused or dead slots get the filler
    fn slot_bind_group(&self, textures: &[Texture]) -> BindGroup {
        let slots: Vec<&GpuTexture> = (0..TEXTURE_SLOTS)
            .map(|i| {
                textures
                    .get(i)
                    .and_then(|t| self.textures.get(t.id))
                    .unwrap_or(&self.filler)
            })
            .collect();

        let mut entries: Vec<BindGroupEntry> = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| BindGroupEntry {
                binding: i as u32,
                resource: BindingResource::TextureView(&slot.view),
            })
            .collect();
        entries.extend(slots.iter().enumerate().map(|(i, slot)| BindGroupEntry {
            binding: (TEXTURE_SLOTS + i) as u32,
            resource: BindingResource::Sampler(&slot.sampler),
        }));

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Quad Texture Bind Group"),
            layout: &self.pipelines.texture_layout,
            entries: &entries,
        })
    }

    /// Textures for a fullscreen pass in binding order, then their samplers
    fn sampled_bind_group(&self, layout: &BindGroupLayout, textures: &[Texture]) -> Option<BindGroup> {
        let sources = textures
            .iter()
            .map(|t| self.textures.get(t.id))
            .collect::<Option<Vec<_>>>()?;
        let count = sources.len() as u32;

        let mut entries: Vec<BindGroupEntry> = sources
            .iter()
            .zip(0..)
            .map(|(source, i)| BindGroupEntry {
                binding: i,
                resource: BindingResource::TextureView(&source.view),
            })
            .collect();
        entries.extend(sources.iter().zip(0..).map(|(source, i)| BindGroupEntry {
            binding: count + i,
            resource: BindingResource::Sampler(&source.sampler),
        }));

        Some(self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("Fullscreen Bind Group"),
            layout,
            entries: &entries,
        }))
    }

    fn encoder(&mut self) -> &mut CommandEncoder {
        self.encoder.get_or_insert_with(|| {
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Umbra Encoder"),
            })
        })
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
    }

    fn destroy_target_entry(&mut self, id: TargetId) {
        if let Some(target) = self.targets.remove(id) {
            if let Some(texture) = target.texture_id {
                self.textures.remove(texture);
            }
        }
        if self.bound == Some(id) {
            self.bound = None;
        }
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(Device, Queue), RenderError> {
    let info = adapter.get_info();
    log::info!("WgpuBackend: using {} ({:?})", info.name, info.backend);
    Ok(adapter
        .request_device(&DeviceDescriptor {
            label: Some("Umbra Device"),
            #[cfg(target_arch = "wasm32")]
            required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
            ..Default::default()
        })
        .await?)
}

fn begin_pass<'e>(
    encoder: &'e mut CommandEncoder,
    view: &TextureView,
    load: LoadOp<wgpu::Color>,
    label: &str,
) -> RenderPass<'e> {
    encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: Operations {
                load,
                store: StoreOp::Store,
            },
        })],
        ..Default::default()
    })
}

/// Tight & copy-aligned byte length of one RGBA8 row, `None` if it overflows `u32`
fn readback_row_bytes(width: u32) -> Option<(u32, u32)> {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let row_bytes = width.checked_mul(4)?;
    let padded = row_bytes.div_ceil(align).checked_mul(align)?;
    Some((row_bytes, padded))
}

/// Swaps red & blue of tightly packed 4-byte pixels
fn bgra_to_rgba(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
}

/// Copies `height` rows of `row_bytes` out of rows padded to `padded_row_bytes`
fn strip_row_padding(data: &[u8], row_bytes: usize, padded_row_bytes: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(row_bytes * height);
    for row in data.chunks(padded_row_bytes).take(height) {
        out.extend_from_slice(&row[..row_bytes]);
    }
    out
}

impl GpuBackend for WgpuBackend {
    fn max_texture_slots(&self) -> usize {
        TEXTURE_SLOTS
    }

    fn screen_size(&self) -> UVec2 {
        match &self.screen {
            Screen::Surface(backbuffer) => backbuffer.size(),
            Screen::Headless(target) => target.size,
        }
    }

    fn resize_screen(&mut self, width: u32, height: u32) {
        match &mut self.screen {
            Screen::Surface(backbuffer) => backbuffer.resize(&self.device, width, height),
            Screen::Headless(target) => {
                if width == 0 || height == 0 {
                    log::warn!("WgpuBackend::resize_screen: ignoring zero size for headless screen");
                    return;
                }
                *target = GpuTarget::new(&self.device, width, height, target.format);
            }
        }
    }

    fn set_vsync(&mut self, on: bool) {
        if let Screen::Surface(backbuffer) = &mut self.screen {
            backbuffer.set_vsync(&self.device, on);
        }
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        options: TextureOptions,
    ) -> Result<Texture, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSizedTexture { width, height });
        }
        let expected = rgba_len(width, height)?;
        if pixels.len() != expected {
            return Err(RenderError::TextureData {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        let texture =
            GpuTexture::from_pixels(&self.device, &self.queue, width, height, pixels, options);
        let id = self.textures.insert(texture);
        Ok(Texture { id, width, height })
    }

    fn destroy_texture(&mut self, texture: Texture) {
        if self.targets.values().any(|t| t.texture_id == Some(texture.id)) {
            log::warn!("WgpuBackend::destroy_texture: texture belongs to a render target");
            return;
        }
        self.textures.remove(texture.id);
    }

    fn texture_alive(&self, texture: Texture) -> bool {
        self.textures.contains_key(texture.id)
    }

    fn create_target(
        &mut self,
        width: u32,
        height: u32,
        format: TargetFormat,
    ) -> Result<(TargetId, Texture), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSizedTarget { width, height });
        }
        let mut target = GpuTarget::new(&self.device, width, height, texture_format(format));
        let texture_id = self
            .textures
            .insert(GpuTexture::from_view(&self.device, target.view.clone(), false));
        target.texture_id = Some(texture_id);
        let id = self.targets.insert(target);
        Ok((
            id,
            Texture {
                id: texture_id,
                width,
                height,
            },
        ))
    }

    fn destroy_target(&mut self, target: TargetId) {
        self.destroy_target_entry(target);
    }

    fn bind_target(&mut self, target: Option<TargetId>) {
        self.bound = target;
    }

    fn clear(&mut self, color: Color) {
        let Some(target) = self.pass_target("clear") else {
            return;
        };
        let encoder = self.encoder();
        begin_pass(encoder, &target.view, LoadOp::Clear(color.into()), "Clear Pass");
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn create_quad_shader(&mut self, label: &str, source: &str) -> Result<ShaderId, RenderError> {
        let module = compile_shader(&self.device, label, source)?;
        Ok(self.shaders.insert(module))
    }

    fn draw_batch(&mut self, batch: &Batch, view_proj: Mat4, shader: Option<ShaderId>) {
        if batch.is_empty() {
            return;
        }
        let Some(target) = self.pass_target("draw_batch") else {
            return;
        };
        let pipeline = match self.pipeline(PipelineKind::Quad(shader), target.format) {
            Some(pipeline) => pipeline,
            None if shader.is_some() => {
                log::warn!("WgpuBackend::draw_batch: quad shader unusable, using the built-in one");
                let Some(pipeline) = self.pipeline(PipelineKind::Quad(None), target.format) else {
                    return;
                };
                pipeline
            }
            None => return,
        };

        let textures = self.slot_bind_group(&batch.textures);
        let camera = self.uniform_bind_group(
            "Camera Uniform",
            bytemuck::bytes_of(&CameraUniform {
                view_proj: view_proj.to_cols_array_2d(),
            }),
        );
        let vertices = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&batch.vertices),
            usage: BufferUsages::VERTEX,
        });
        let indices = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&batch.indices),
            usage: BufferUsages::INDEX,
        });

        let encoder = self.encoder();
        let mut pass = begin_pass(encoder, &target.view, LoadOp::Load, "Quad Pass");
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &textures, &[]);
        pass.set_bind_group(1, &camera, &[]);
        pass.set_vertex_buffer(0, vertices.slice(..));
        pass.set_index_buffer(indices.slice(..), IndexFormat::Uint32);
        pass.draw_indexed(0..batch.indices.len() as u32, 0, 0..1);
    }

    fn draw_triangles(&mut self, positions: &[Vec2], view_proj: Mat4, color: Color) {
        if positions.is_empty() {
            return;
        }
        let Some(target) = self.pass_target("draw_triangles") else {
            return;
        };
        let Some(pipeline) = self.pipeline(PipelineKind::Shadow, target.format) else {
            return;
        };

        let uniform = self.uniform_bind_group(
            "Shadow Uniform",
            bytemuck::bytes_of(&ShadowUniform {
                view_proj: view_proj.to_cols_array_2d(),
                color: color.components(),
            }),
        );
        let points: Vec<[f32; 2]> = positions.iter().map(|p| p.to_array()).collect();
        let vertices = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("Shadow Vertex Buffer"),
            contents: bytemuck::cast_slice(&points),
            usage: BufferUsages::VERTEX,
        });

        let encoder = self.encoder();
        let mut pass = begin_pass(encoder, &target.view, LoadOp::Load, "Shadow Pass");
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &uniform, &[]);
        pass.set_vertex_buffer(0, vertices.slice(..));
        pass.draw(0..positions.len() as u32, 0..1);
    }

    fn draw_fullscreen(&mut self, pass: &FullscreenPass) {
        let Some(target) = self.pass_target("draw_fullscreen") else {
            return;
        };
        let (kind, bind_group) = match pass {
            FullscreenPass::Blit { texture } => (
                PipelineKind::Blit,
                self.sampled_bind_group(&self.pipelines.blit_layout, &[*texture]),
            ),
            FullscreenPass::Merge { scene, light } => (
                PipelineKind::Merge,
                self.sampled_bind_group(&self.pipelines.merge_layout, &[*scene, *light]),
            ),
            FullscreenPass::Light(uniform) => (
                PipelineKind::Light,
                Some(self.uniform_bind_group("Light Uniform", bytemuck::bytes_of(uniform))),
            ),
        };
        let Some(bind_group) = bind_group else {
            log::warn!("WgpuBackend::draw_fullscreen: source texture not loaded");
            return;
        };
        let Some(pipeline) = self.pipeline(kind, target.format) else {
            return;
        };

        let encoder = self.encoder();
        let mut render_pass = begin_pass(encoder, &target.view, LoadOp::Load, "Fullscreen Pass");
        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }

    fn read_pixels(&mut self, target: Option<TargetId>) -> Result<PixelBuffer, RenderError> {
        let (source, format, size) = match target {
            Some(id) => {
                let target = self.targets.get(id).ok_or(RenderError::InvalidTarget)?;
                (&target.texture, target.format, target.size)
            }
            None => match &self.screen {
                Screen::Headless(target) => (&target.texture, target.format, target.size),
                Screen::Surface(backbuffer) => {
                    if !backbuffer.can_read_back() {
                        return Err(RenderError::Readback(
                            "surface does not allow copies".into(),
                        ));
                    }
                    let frame = backbuffer.frame().ok_or_else(|| {
                        RenderError::Readback("no frame in flight for the screen".into())
                    })?;
                    (
                        &frame.surface_texture.texture,
                        backbuffer.format(),
                        backbuffer.size(),
                    )
                }
            },
        };

        let swizzle = match format {
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => false,
            TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => true,
            other => {
                return Err(RenderError::Readback(format!(
                    "can't read back {other:?}, only 8-bit RGBA/BGRA"
                )));
            }
        };

        let (row_bytes, padded_row_bytes) = readback_row_bytes(size.x)
            .ok_or(RenderError::TextureTooLarge {
                width: size.x,
                height: size.y,
            })?;
        let buffer: Buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded_row_bytes as u64 * size.y as u64,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Umbra Encoder"),
            })
        });
        encoder.copy_texture_to_buffer(
            TexelCopyTextureInfo {
                texture: source,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            TexelCopyBufferInfo {
                buffer: &buffer,
                layout: TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(size.y),
                },
            },
            Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
        );
        self.submit();

        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(PollType::Wait)
            .map_err(|err| RenderError::Readback(err.to_string()))?;
        receiver
            .recv()
            .map_err(|err| RenderError::Readback(err.to_string()))?
            .map_err(|err| RenderError::Readback(err.to_string()))?;

        let mut rgba = {
            let data = slice.get_mapped_range();
            strip_row_padding(
                &data,
                row_bytes as usize,
                padded_row_bytes as usize,
                size.y as usize,
            )
        };
        buffer.unmap();
        if swizzle {
            bgra_to_rgba(&mut rgba);
        }

        Ok(PixelBuffer {
            width: size.x,
            height: size.y,
            origin: PixelOrigin::TopLeft,
            rgba,
        })
    }

    fn begin_frame(&mut self) -> bool {
        self.in_frame = match &mut self.screen {
            Screen::Surface(backbuffer) => backbuffer.acquire(&self.device),
            Screen::Headless(_) => true,
        };
        self.in_frame
    }

    fn end_frame(&mut self) {
        if !self.in_frame {
            log::warn!("WgpuBackend::end_frame: no frame in flight");
        }
        self.submit();
        if let Screen::Surface(backbuffer) = &mut self.screen {
            backbuffer.present();
        }
        self.in_frame = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_stripped_per_row() {
        let data = [1, 2, 0, 0, 3, 4, 0, 0, 9, 9];
        assert_eq!(strip_row_padding(&data, 2, 4, 2), vec![1, 2, 3, 4]);
    }

    #[test]
    fn readback_rows_are_aligned_without_overflow() {
        assert_eq!(readback_row_bytes(1), Some((4, 256)));
        assert_eq!(readback_row_bytes(64), Some((256, 256)));
        assert_eq!(readback_row_bytes(65), Some((260, 512)));
        assert_eq!(readback_row_bytes(u32::MAX), None);
        assert_eq!(readback_row_bytes(u32::MAX / 4), None);
    }

    #[test]
    fn bgra_is_swizzled_to_rgba() {
        let mut pixels = [10, 20, 30, 40, 1, 2, 3, 4];
        bgra_to_rgba(&mut pixels);
        assert_eq!(pixels, [30, 20, 10, 40, 3, 2, 1, 4]);
    }

    #[test]
    fn uniform_layouts_match_the_shaders() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
        assert_eq!(std::mem::size_of::<ShadowUniform>(), 80);
        assert_eq!(std::mem::size_of::<crate::backend::LightUniform>(), 112);
    }
}
