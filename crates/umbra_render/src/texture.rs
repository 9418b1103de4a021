use glam::UVec2;
use slotmap::new_key_type;

use crate::math::UvRect;

new_key_type! {
    /// Generation-checked id of a texture owned by a backend
    pub struct TextureId;
}

/// Copyable handle to a GPU texture
///
/// Only the backend that created it can resolve it; once the texture is destroyed the
/// handle stays detectably invalid instead of aliasing a newer texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

/// Upload options for image textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureOptions {
    /// Nearest filtering instead of linear
    pub pixelated: bool,
    /// uv (0, 0) addresses the image's bottom-left instead of its top-left
    pub flip_vertically: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            pixelated: true,
            flip_vertically: true,
        }
    }
}

/// Cell in a [`TextureAtlas`], counted from the bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AtlasCoord {
    pub x: u32,
    pub y: u32,
}

impl AtlasCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Uniform grid over a texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureAtlas {
    x_count: u32,
    y_count: u32,
}

impl TextureAtlas {
    pub fn new(x_count: u32, y_count: u32) -> Self {
        Self {
            x_count: x_count.max(1),
            y_count: y_count.max(1),
        }
    }

    pub fn uv(&self, coord: AtlasCoord) -> UvRect {
        let x_inv = 1.0 / self.x_count as f32;
        let y_inv = 1.0 / self.y_count as f32;
        UvRect::new(
            coord.x as f32 * x_inv,
            coord.y as f32 * y_inv,
            (coord.x + 1) as f32 * x_inv,
            (coord.y + 1) as f32 * y_inv,
        )
    }
}

/// A texture plus the region of it to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub texture: Texture,
    pub uv: UvRect,
}

impl Sprite {
    pub fn new(texture: Texture) -> Self {
        Self {
            texture,
            uv: UvRect::FULL,
        }
    }

    pub fn from_atlas(texture: Texture, atlas: &TextureAtlas, coord: AtlasCoord) -> Self {
        Self {
            texture,
            uv: atlas.uv(coord),
        }
    }
}

/// Reverses the row order of a tightly packed image in place
pub fn flip_rows(pixels: &mut [u8], width: u32, height: u32, channels: u32) {
    let row = (width * channels) as usize;
    if row == 0 {
        return;
    }
    let rows = (height as usize).min(pixels.len() / row);
    for y in 0..rows / 2 {
        let (top, bottom) = pixels.split_at_mut((rows - 1 - y) * row);
        top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, vec2};

    #[test]
    fn atlas_cells_partition_unit_square() {
        let atlas = TextureAtlas::new(4, 2);
        let uv = atlas.uv(AtlasCoord::new(1, 1));
        assert_eq!(uv.min, vec2(0.25, 0.5));
        assert_eq!(uv.max, vec2(0.5, 1.0));
        assert_eq!(atlas.uv(AtlasCoord::new(0, 0)).min, Vec2::ZERO);
    }

    #[test]
    fn flipping_twice_restores_rows() {
        let original: Vec<u8> = (0..12).collect();
        let mut pixels = original.clone();
        flip_rows(&mut pixels, 2, 3, 2);
        assert_eq!(pixels, vec![8, 9, 10, 11, 4, 5, 6, 7, 0, 1, 2, 3]);
        flip_rows(&mut pixels, 2, 3, 2);
        assert_eq!(pixels, original);
    }
}
