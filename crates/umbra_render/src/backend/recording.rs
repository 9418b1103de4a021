use glam::{Mat4, UVec2, Vec2};
use slotmap::SlotMap;

use super::{BlendMode, FullscreenPass, GpuBackend, PixelBuffer, PixelOrigin, ShaderId, rgba_len};
use crate::{
    batch::Batch,
    color::Color,
    error::RenderError,
    target::{TargetFormat, TargetId},
    texture::{Texture, TextureId, TextureOptions},
};

/// Which fullscreen pass was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenKind {
    Blit,
    Merge,
    Light,
}

/// One call the renderer made, as seen by a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    EndFrame,
    BindTarget(Option<TargetId>),
    Clear {
        target: Option<TargetId>,
        color: Color,
    },
    SetBlendMode(BlendMode),
    DrawBatch {
        target: Option<TargetId>,
        batch: Batch,
        view_proj: Mat4,
        shader: Option<ShaderId>,
    },
    DrawTriangles {
        target: Option<TargetId>,
        positions: Vec<Vec2>,
        color: Color,
    },
    Fullscreen {
        target: Option<TargetId>,
        kind: FullscreenKind,
        pass: FullscreenPass,
    },
}

struct RecordedTarget {
    size: UVec2,
    texture: Texture,
}

/// GPU-less backend that logs every command
///
/// Textures & targets are tracked with the same generation-checked ids a real backend
/// hands out, so stale handles behave identically. Readback returns a deterministic
/// gradient in bottom-left row order
pub struct RecordingBackend {
    max_texture_slots: usize,
    screen_size: UVec2,
    vsync: bool,
    textures: SlotMap<TextureId, UVec2>,
    targets: SlotMap<TargetId, RecordedTarget>,
    shaders: SlotMap<ShaderId, String>,
    bound: Option<TargetId>,
    blend: BlendMode,
    in_frame: bool,
    fail_targets: bool,
    commands: Vec<Command>,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            max_texture_slots: 16,
            screen_size: UVec2::new(width, height),
            vsync: true,
            textures: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            bound: None,
            blend: BlendMode::Alpha,
            in_frame: false,
            fail_targets: false,
            commands: Vec::new(),
        }
    }

    pub fn with_texture_slots(mut self, slots: usize) -> Self {
        self.max_texture_slots = slots.max(1);
        self
    }

    /// Makes every following `create_target` fail, as an exhausted device would
    pub fn set_target_creation_fails(&mut self, fails: bool) {
        self.fail_targets = fails;
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Batches drawn so far
    pub fn batches(&self) -> impl Iterator<Item = (&Option<TargetId>, &Batch)> {
        self.commands.iter().filter_map(|c| match c {
            Command::DrawBatch { target, batch, .. } => Some((target, batch)),
            _ => None,
        })
    }

    pub fn bound_target(&self) -> Option<TargetId> {
        self.bound
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    fn target_size(&self, target: Option<TargetId>) -> Option<UVec2> {
        match target {
            None => Some(self.screen_size),
            Some(id) => self.targets.get(id).map(|t| t.size),
        }
    }
}

impl GpuBackend for RecordingBackend {
    fn max_texture_slots(&self) -> usize {
        self.max_texture_slots
    }

    fn screen_size(&self) -> UVec2 {
        self.screen_size
    }

    fn resize_screen(&mut self, width: u32, height: u32) {
        self.screen_size = UVec2::new(width, height);
    }

    fn set_vsync(&mut self, on: bool) {
        self.vsync = on;
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        _options: TextureOptions,
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
        let id = self.textures.insert(UVec2::new(width, height));
        Ok(Texture { id, width, height })
    }

    fn destroy_texture(&mut self, texture: Texture) {
        if self.targets.values().any(|t| t.texture.id == texture.id) {
            log::warn!("RecordingBackend::destroy_texture: texture belongs to a render target");
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
        _format: TargetFormat,
    ) -> Result<(TargetId, Texture), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::ZeroSizedTarget { width, height });
        }
        if self.fail_targets {
            return Err(RenderError::TargetCreation("out of device memory".into()));
        }
        let size = UVec2::new(width, height);
        let texture = Texture {
            id: self.textures.insert(size),
            width,
            height,
        };
        let id = self.targets.insert(RecordedTarget { size, texture });
        Ok((id, texture))
    }

    fn destroy_target(&mut self, target: TargetId) {
        if let Some(t) = self.targets.remove(target) {
            self.textures.remove(t.texture.id);
        }
        if self.bound == Some(target) {
            self.bound = None;
        }
    }

    fn bind_target(&mut self, target: Option<TargetId>) {
        self.bound = target;
        self.commands.push(Command::BindTarget(target));
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(Command::Clear {
            target: self.bound,
            color,
        });
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
        self.commands.push(Command::SetBlendMode(mode));
    }

    fn create_quad_shader(&mut self, label: &str, source: &str) -> Result<ShaderId, RenderError> {
        if !source.contains("fs_main") {
            let message = "missing entry point `fs_main`".to_string();
            crate::logging::critical("RecordingBackend::create_quad_shader", &message);
            return Err(RenderError::ShaderCompilation {
                label: label.to_string(),
                message,
            });
        }
        Ok(self.shaders.insert(source.to_string()))
    }

    fn draw_batch(&mut self, batch: &Batch, view_proj: Mat4, shader: Option<ShaderId>) {
        self.commands.push(Command::DrawBatch {
            target: self.bound,
            batch: batch.clone(),
            view_proj,
            shader,
        });
    }

    fn draw_triangles(&mut self, positions: &[Vec2], _view_proj: Mat4, color: Color) {
        self.commands.push(Command::DrawTriangles {
            target: self.bound,
            positions: positions.to_vec(),
            color,
        });
    }

    fn draw_fullscreen(&mut self, pass: &FullscreenPass) {
        let kind = match pass {
            FullscreenPass::Blit { .. } => FullscreenKind::Blit,
            FullscreenPass::Merge { .. } => FullscreenKind::Merge,
            FullscreenPass::Light(_) => FullscreenKind::Light,
        };
        self.commands.push(Command::Fullscreen {
            target: self.bound,
            kind,
            pass: *pass,
        });
    }

    fn read_pixels(&mut self, target: Option<TargetId>) -> Result<PixelBuffer, RenderError> {
        let size = self.target_size(target).ok_or(RenderError::InvalidTarget)?;
        let mut rgba = Vec::with_capacity(rgba_len(size.x, size.y)?);
        for y in 0..size.y {
            for x in 0..size.x {
                rgba.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        Ok(PixelBuffer {
            width: size.x,
            height: size.y,
            origin: PixelOrigin::BottomLeft,
            rgba,
        })
    }

    fn begin_frame(&mut self) -> bool {
        self.in_frame = true;
        self.commands.push(Command::BeginFrame);
        true
    }

    fn end_frame(&mut self) {
        if !self.in_frame {
            log::warn!("RecordingBackend::end_frame: no frame in flight");
        }
        self.in_frame = false;
        self.commands.push(Command::EndFrame);
    }
}
