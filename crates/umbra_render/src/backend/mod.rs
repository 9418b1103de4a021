//! The contract between the renderer & whatever talks to the GPU

mod recording;

pub use recording::{Command, FullscreenKind, RecordingBackend};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec2};
use slotmap::new_key_type;

use crate::{
    batch::Batch,
    color::Color,
    error::RenderError,
    target::{TargetFormat, TargetId},
    texture::{Texture, TextureOptions},
};

new_key_type! {
    /// Id of a user supplied quad shader
    pub struct ShaderId;
}

/// How fragment output combines with what is already in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Overwrite
    None,
    /// `src * a + dst * (1 - a)`
    #[default]
    Alpha,
    /// `src + dst`
    Additive,
    /// `src * dst`
    Multiply,
}

/// Uniforms of the light volume pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub inv_view_proj: [[f32; 4]; 4],
    pub position: [f32; 2],
    /// Pixel size of the target being lit
    pub screen_size: [f32; 2],
    pub color: [f32; 3],
    pub radius: f32,
    pub intensity: f32,
    pub _padding: [f32; 3],
}

impl LightUniform {
    pub fn new(
        view_proj: Mat4,
        screen_size: UVec2,
        position: Vec2,
        color: [f32; 3],
        radius: f32,
        intensity: f32,
    ) -> Self {
        Self {
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            position: position.to_array(),
            screen_size: screen_size.as_vec2().to_array(),
            color,
            radius,
            intensity,
            _padding: [0.0; 3],
        }
    }
}

/// Passes that cover the whole bound target with one triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FullscreenPass {
    /// Copy a texture over the target
    Blit { texture: Texture },
    /// `clamp(scene.rgb * light.rgb, 0, 1)` with alpha 1
    Merge { scene: Texture, light: Texture },
    /// Radial falloff for one point light
    Light(LightUniform),
}

/// Row order of a [`PixelBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOrigin {
    TopLeft,
    BottomLeft,
}

/// Tightly packed RGBA8 pixels read back from a target
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub origin: PixelOrigin,
    pub rgba: Vec<u8>,
}

/// Byte length of `width * height` tightly packed RGBA8 pixels
pub fn rgba_len(width: u32, height: u32) -> Result<usize, RenderError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(RenderError::TextureTooLarge { width, height })
}

/// Everything the renderer & light system need from a GPU
///
/// State (bound target, blend mode, quad shader) is sticky until changed. Draw calls
/// that can't be resolved (stale ids, no frame in flight) are logged & dropped; only
/// resource creation & readback report errors
pub trait GpuBackend {
    /// Hardware limit on textures per draw call
    fn max_texture_slots(&self) -> usize;

    fn screen_size(&self) -> UVec2;
    fn resize_screen(&mut self, width: u32, height: u32);
    fn set_vsync(&mut self, on: bool);

    /// `pixels` is tightly packed RGBA8, top row first
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        options: TextureOptions,
    ) -> Result<Texture, RenderError>;
    /// Refuses (with a warning) the color texture of a live render target
    fn destroy_texture(&mut self, texture: Texture);
    fn texture_alive(&self, texture: Texture) -> bool;

    /// Returns the target & the texture that samples its color attachment
    fn create_target(
        &mut self,
        width: u32,
        height: u32,
        format: TargetFormat,
    ) -> Result<(TargetId, Texture), RenderError>;
    fn destroy_target(&mut self, target: TargetId);

    /// `None` is the screen
    fn bind_target(&mut self, target: Option<TargetId>);
    fn clear(&mut self, color: Color);
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Compiles a replacement for the built-in quad shader (same vertex layout & bindings)
    fn create_quad_shader(&mut self, label: &str, source: &str) -> Result<ShaderId, RenderError>;

    fn draw_batch(&mut self, batch: &Batch, view_proj: Mat4, shader: Option<ShaderId>);
    /// Triangle list of solid `color`
    fn draw_triangles(&mut self, positions: &[Vec2], view_proj: Mat4, color: Color);
    fn draw_fullscreen(&mut self, pass: &FullscreenPass);

    /// Submits outstanding work & reads the given target back
    fn read_pixels(&mut self, target: Option<TargetId>) -> Result<PixelBuffer, RenderError>;

    /// Acquires the screen for drawing; `false` means skip this frame
    fn begin_frame(&mut self) -> bool;
    /// Submits & presents
    fn end_frame(&mut self);
}
