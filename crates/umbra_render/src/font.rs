use glam::{Vec2, vec2};

use crate::{math::UvRect, texture::Texture};

/// Placement & atlas region of one glyph, in font pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphInfo {
    pub size: Vec2,
    /// Offset from the pen position on the baseline to the glyph's top-left
    pub bearing: Vec2,
    pub uv: UvRect,
    pub advance: f32,
}

/// Anything that can hand out glyph metrics for 8-bit character codes
///
/// Rasterising fonts is out of scope; implement this over whatever atlas you bake
pub trait GlyphProvider {
    fn glyph(&self, code: u8) -> Option<&GlyphInfo>;
    /// The atlas all glyph uvs refer to, `None` if nothing was baked
    fn texture(&self) -> Option<Texture>;
    /// Nominal pixel size the metrics were generated at
    fn size(&self) -> f32;
}

/// Table-backed glyph atlas
#[derive(Debug, Clone)]
pub struct Font {
    glyphs: Box<[Option<GlyphInfo>; 256]>,
    texture: Option<Texture>,
    size: f32,
}

impl Font {
    pub fn new(texture: Option<Texture>, size: f32) -> Self {
        Self {
            glyphs: Box::new([None; 256]),
            texture,
            size,
        }
    }

    pub fn set_glyph(&mut self, code: u8, glyph: GlyphInfo) {
        self.glyphs[code as usize] = Some(glyph);
    }

    pub fn remove_glyph(&mut self, code: u8) {
        self.glyphs[code as usize] = None;
    }

    /// Solid block glyphs for printable ASCII, drawn with a plain white texture
    pub fn fallback(white: Texture, size: f32) -> Self {
        let mut font = Self::new(Some(white), size);
        let advance = size * 0.7;

        font.set_glyph(
            b' ',
            GlyphInfo {
                advance,
                ..Default::default()
            },
        );
        for code in b'!'..=b'~' {
            font.set_glyph(
                code,
                GlyphInfo {
                    size: vec2(size * 0.55, size * 0.7),
                    bearing: vec2(size * 0.075, size * 0.7),
                    uv: UvRect::FULL,
                    advance,
                },
            );
        }
        font
    }
}

impl GlyphProvider for Font {
    fn glyph(&self, code: u8) -> Option<&GlyphInfo> {
        self.glyphs[code as usize].as_ref()
    }

    fn texture(&self) -> Option<Texture> {
        self.texture
    }

    fn size(&self) -> f32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn white() -> Texture {
        Texture {
            id: KeyData::from_ffi(1).into(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn fallback_covers_printable_ascii() {
        let font = Font::fallback(white(), 16.0);
        assert_eq!(font.size(), 16.0);
        assert!(font.glyph(b'A').is_some());
        assert!(font.glyph(b'~').is_some());
        assert!(font.glyph(b'\t').is_none());
        assert_eq!(font.glyph(b' ').unwrap().size, Vec2::ZERO);
    }

    #[test]
    fn glyphs_can_be_replaced() {
        let mut font = Font::new(None, 8.0);
        assert!(font.texture().is_none());
        font.set_glyph(
            b'x',
            GlyphInfo {
                advance: 3.0,
                ..Default::default()
            },
        );
        assert_eq!(font.glyph(b'x').unwrap().advance, 3.0);
        font.remove_glyph(b'x');
        assert!(font.glyph(b'x').is_none());
    }
}
