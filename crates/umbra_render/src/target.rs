use glam::UVec2;
use slotmap::new_key_type;

use crate::texture::Texture;

new_key_type! {
    /// Generation-checked id of an offscreen target owned by a backend
    pub struct TargetId;
}

/// Color format of an offscreen target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetFormat {
    /// 8-bit sRGB color, readable as pixels
    #[default]
    Rgba8,
    /// Half-float color for light accumulation
    Rgba16Float,
}

/// Offscreen framebuffer whose color texture can be sampled afterwards
///
/// Owned by whoever created it; create, destroy & resize go through the
/// [`Renderer`](crate::Renderer). Resizing is destroy + recreate
#[derive(Debug, PartialEq, Eq)]
pub struct RenderTarget {
    id: TargetId,
    size: UVec2,
    format: TargetFormat,
    texture: Texture,
}

impl RenderTarget {
    pub(crate) fn new(id: TargetId, size: UVec2, format: TargetFormat, texture: Texture) -> Self {
        Self {
            id,
            size,
            format,
            texture,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// The color attachment, usable in any draw call
    pub fn texture(&self) -> Texture {
        self.texture
    }

    pub fn binding(&self) -> TargetBinding {
        TargetBinding {
            id: self.id,
            size: self.size,
        }
    }
}

/// What the renderer remembers about the bound target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetBinding {
    pub id: TargetId,
    pub size: UVec2,
}

impl From<&RenderTarget> for TargetBinding {
    fn from(target: &RenderTarget) -> Self {
        target.binding()
    }
}
