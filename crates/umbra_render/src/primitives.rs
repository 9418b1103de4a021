use glam::{Vec2, vec2};

use crate::{
    backend::GpuBackend,
    color::Color,
    draw_queue::DrawQueue,
    font::GlyphProvider,
    geometry::{Edge, Polygon},
    math::{Rect, UvRect},
    renderer::Renderer,
    texture::Texture,
};

/// Everything the renderer knows how to turn into quads
#[derive(Clone, Copy)]
pub enum Primitive<'a> {
    /// Axis-aligned rect; `None` texture means plain color
    Rect {
        rect: Rect,
        texture: Option<Texture>,
        colors: [Color; 4],
        uv: UvRect,
    },
    /// Thick segment, widened along the edge's normal
    Line { edge: Edge, width: f32, color: Color },
    /// Filled polygon; skipped unless [`Polygon::is_valid`]
    Polygon { polygon: &'a Polygon, color: Color },
    /// One line per polygon edge; skipped unless valid
    PolygonOutline {
        polygon: &'a Polygon,
        width: f32,
        color: Color,
    },
    /// Text whose first line's top sits at `position.y`; `None` font uses the built-in one
    Text {
        text: &'a str,
        position: Vec2,
        font: Option<&'a dyn GlyphProvider>,
        color: Color,
        scale: f32,
    },
}

/// Appends quads to the queue, swapping dead textures for the white default
pub(crate) struct QuadSink<'a> {
    pub queue: &'a mut DrawQueue,
    pub white: Texture,
    pub fallback_font: &'a dyn GlyphProvider,
    pub alive: &'a dyn Fn(Texture) -> bool,
}

impl QuadSink<'_> {
    fn resolve(&self, texture: Option<Texture>, context: &str) -> Texture {
        match texture {
            Some(texture) if (self.alive)(texture) => texture,
            Some(_) => {
                log::warn!("{context}: texture not loaded, using the default texture");
                self.white
            }
            None => self.white,
        }
    }

    pub fn emit(&mut self, primitive: Primitive<'_>) {
        match primitive {
            Primitive::Rect {
                rect,
                texture,
                colors,
                uv,
            } => {
                let texture = self.resolve(texture, "Renderer::draw_rect");
                self.queue
                    .push_quad(rect.corners(), uv.corners(), colors, texture);
            }
            Primitive::Line { edge, width, color } => self.line(&edge, width, color),
            Primitive::Polygon { polygon, color } => {
                if !polygon.is_valid() {
                    log::debug!("Renderer::draw_polygon: skipping invalid polygon");
                    return;
                }
                for corners in fan_quads(&polygon.vertices) {
                    self.queue
                        .push_quad(corners, [Vec2::ZERO; 4], [color; 4], self.white);
                }
            }
            Primitive::PolygonOutline {
                polygon,
                width,
                color,
            } => {
                if !polygon.is_valid() {
                    log::debug!("Renderer::draw_polygon_outline: skipping invalid polygon");
                    return;
                }
                for edge in polygon.edges() {
                    self.line(&edge, width, color);
                }
            }
            Primitive::Text {
                text,
                position,
                font,
                color,
                scale,
            } => {
                let font = font.unwrap_or(self.fallback_font);
                let Some(atlas) = font.texture() else {
                    log::warn!("Renderer::draw_string: font has no atlas texture");
                    return;
                };
                let texture = self.resolve(Some(atlas), "Renderer::draw_string");
                for (rect, uv) in layout_text(text, position, font, scale) {
                    self.queue
                        .push_quad(rect.corners(), uv.corners(), [color; 4], texture);
                }
            }
        }
    }

    fn line(&mut self, edge: &Edge, width: f32, color: Color) {
        self.queue
            .push_quad(line_corners(edge, width), UvRect::FULL.corners(), [color; 4], self.white);
    }
}

/// Quad of a thick line: p1 & p2 pushed out along the normal, then back along it
pub fn line_corners(edge: &Edge, width: f32) -> [Vec2; 4] {
    let half = edge.normal() * width / 2.0;
    [edge.p1 + half, edge.p2 + half, edge.p2 - half, edge.p1 - half]
}

/// Fan triangulation packed two triangles per quad: `(0, 2i+1, 2i+2, 2i+3)`
///
/// An odd triangle count repeats the last vertex, leaving one degenerate half-quad
pub fn fan_quads(vertices: &[Vec2]) -> Vec<[Vec2; 4]> {
    if vertices.len() < 3 {
        return Vec::new();
    }
    let mut fan = vertices.to_vec();
    if (fan.len() - 2) % 2 != 0 {
        fan.push(vertices[vertices.len() - 1]);
    }
    let quads = (fan.len() - 2) / 2;
    (0..quads)
        .map(|i| [fan[0], fan[2 * i + 1], fan[2 * i + 2], fan[2 * i + 3]])
        .collect()
}

/// Glyph rects & uvs for `text`, one per drawable byte
///
/// Glyphs are looked up by raw UTF-8 byte, so non-ASCII characters map to one glyph per
/// byte of their encoding. The pen starts one `scale` below `position`; `\n` returns to
/// `position.x` & drops another `scale`. Bytes without a glyph are skipped; glyphs with
/// no area only move the pen
pub fn layout_text(
    text: &str,
    position: Vec2,
    font: &dyn GlyphProvider,
    scale: f32,
) -> Vec<(Rect, UvRect)> {
    let factor = scale / font.size();
    let mut pen = vec2(position.x, position.y - scale);
    let mut out = Vec::with_capacity(text.len());

    for code in text.bytes() {
        if code == b'\n' {
            pen.x = position.x;
            pen.y -= scale;
            continue;
        }
        let Some(glyph) = font.glyph(code) else {
            continue;
        };

        let size = glyph.size * factor;
        if size.x > 0.0 && size.y > 0.0 {
            let origin = vec2(
                pen.x + glyph.bearing.x * factor,
                pen.y - (glyph.size.y - glyph.bearing.y) * factor,
            );
            out.push((Rect::new(origin, size), glyph.uv));
        }
        pen.x += glyph.advance * factor;
    }
    out
}

/// Builder for (textured) rectangles, drawn on `Drop`
pub struct RectangleBuilder<'a, B: GpuBackend> {
    renderer: &'a mut Renderer<B>,
    rect: Rect,
    colors: [Color; 4],
    uv: UvRect,
    texture: Option<Texture>,
}

impl<'a, B: GpuBackend> RectangleBuilder<'a, B> {
    pub(crate) fn new(renderer: &'a mut Renderer<B>) -> Self {
        Self {
            renderer,
            rect: Rect::new(Vec2::ZERO, vec2(64.0, 64.0)),
            colors: [Color::WHITE; 4],
            uv: UvRect::FULL,
            texture: None,
        }
    }
    /// Sets the position & size from a [`Rect`]
    pub fn with(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }
    /// Sets the world-space bottom-left corner
    pub fn at(mut self, position: impl Into<Vec2>) -> Self {
        self.rect.position = position.into();
        self
    }
    pub fn size(mut self, size: Vec2) -> Self {
        self.rect.size = size;
        self
    }
    pub fn color(mut self, color: Color) -> Self {
        self.colors = [color; 4];
        self
    }
    /// Per-corner colors in bl, br, tr, tl order
    pub fn colors(mut self, colors: [Color; 4]) -> Self {
        self.colors = colors;
        self
    }
    pub fn texture(mut self, texture: Texture) -> Self {
        self.texture = Some(texture);
        self
    }
    /// Defaults to the whole texture
    pub fn uv(mut self, uv: UvRect) -> Self {
        self.uv = uv;
        self
    }
}

impl<B: GpuBackend> Drop for RectangleBuilder<'_, B> {
    fn drop(&mut self) {
        self.renderer.submit(Primitive::Rect {
            rect: self.rect,
            texture: self.texture,
            colors: self.colors,
            uv: self.uv,
        });
    }
}

/// Builder for thick lines, drawn on `Drop`
pub struct LineBuilder<'a, B: GpuBackend> {
    renderer: &'a mut Renderer<B>,
    edge: Edge,
    width: f32,
    color: Color,
}

impl<'a, B: GpuBackend> LineBuilder<'a, B> {
    pub(crate) fn new(renderer: &'a mut Renderer<B>) -> Self {
        Self {
            renderer,
            edge: Edge::new(Vec2::ZERO, Vec2::ZERO),
            width: 1.0,
            color: Color::WHITE,
        }
    }
    pub fn from(mut self, p1: impl Into<Vec2>) -> Self {
        self.edge.p1 = p1.into();
        self
    }
    pub fn to(mut self, p2: impl Into<Vec2>) -> Self {
        self.edge.p2 = p2.into();
        self
    }
    pub fn edge(mut self, edge: Edge) -> Self {
        self.edge = edge;
        self
    }
    pub fn width(mut self, width: f32) -> Self {
        self.width = width;
        self
    }
    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl<B: GpuBackend> Drop for LineBuilder<'_, B> {
    fn drop(&mut self) {
        self.renderer.submit(Primitive::Line {
            edge: self.edge,
            width: self.width,
            color: self.color,
        });
    }
}

/// Builder for filled or outlined polygons, drawn on `Drop`
pub struct PolygonBuilder<'a, 'p, B: GpuBackend> {
    renderer: &'a mut Renderer<B>,
    polygon: &'p Polygon,
    outline: Option<f32>,
    color: Color,
}

impl<'a, 'p, B: GpuBackend> PolygonBuilder<'a, 'p, B> {
    pub(crate) fn new(renderer: &'a mut Renderer<B>, polygon: &'p Polygon) -> Self {
        Self {
            renderer,
            polygon,
            outline: None,
            color: Color::WHITE,
        }
    }
    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
    /// Draw only the edges, `width` thick
    pub fn outline(mut self, width: f32) -> Self {
        self.outline = Some(width);
        self
    }
}

impl<B: GpuBackend> Drop for PolygonBuilder<'_, '_, B> {
    fn drop(&mut self) {
        let primitive = match self.outline {
            Some(width) => Primitive::PolygonOutline {
                polygon: self.polygon,
                width,
                color: self.color,
            },
            None => Primitive::Polygon {
                polygon: self.polygon,
                color: self.color,
            },
        };
        self.renderer.submit(primitive);
    }
}

/// Builder for a string of glyph quads, drawn on `Drop`
pub struct TextBuilder<'a, 't, B: GpuBackend> {
    renderer: &'a mut Renderer<B>,
    text: &'t str,
    position: Vec2,
    font: Option<&'t dyn GlyphProvider>,
    color: Color,
    scale: f32,
}

impl<'a, 't, B: GpuBackend> TextBuilder<'a, 't, B> {
    pub(crate) fn new(renderer: &'a mut Renderer<B>, text: &'t str) -> Self {
        Self {
            renderer,
            text,
            position: Vec2::ZERO,
            font: None,
            color: Color::WHITE,
            scale: 16.0,
        }
    }
    /// Top-left of the first line
    pub fn at(mut self, position: impl Into<Vec2>) -> Self {
        self.position = position.into();
        self
    }
    pub fn font(mut self, font: &'t dyn GlyphProvider) -> Self {
        self.font = Some(font);
        self
    }
    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
    /// Line height in world units
    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

impl<B: GpuBackend> Drop for TextBuilder<'_, '_, B> {
    fn drop(&mut self) {
        self.renderer.submit(Primitive::Text {
            text: self.text,
            position: self.position,
            font: self.font,
            color: self.color,
            scale: self.scale,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{Font, GlyphInfo};
    use slotmap::KeyData;

    fn texture(n: u64) -> Texture {
        Texture {
            id: KeyData::from_ffi(n).into(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn line_is_widened_along_the_right_normal() {
        let corners = line_corners(&Edge::new(vec2(0.0, 0.0), vec2(10.0, 0.0)), 2.0);
        assert_eq!(
            corners,
            [vec2(0.0, -1.0), vec2(10.0, -1.0), vec2(10.0, 1.0), vec2(0.0, 1.0)]
        );
    }

    #[test]
    fn fan_pairs_triangles_into_quads() {
        let square = [vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(1.0, 1.0), vec2(0.0, 1.0)];
        assert_eq!(fan_quads(&square), vec![square]);

        // pentagon: 3 triangles, last vertex repeated
        let pentagon = [
            vec2(0.0, 0.0),
            vec2(2.0, 0.0),
            vec2(3.0, 1.0),
            vec2(1.0, 2.0),
            vec2(-1.0, 1.0),
        ];
        let quads = fan_quads(&pentagon);
        assert_eq!(quads.len(), 2);
        assert_eq!(quads[1], [pentagon[0], pentagon[3], pentagon[4], pentagon[4]]);

        // triangle: 1 triangle becomes a quad with a repeated corner
        assert_eq!(fan_quads(&square[..3]).len(), 1);
        assert!(fan_quads(&square[..2]).is_empty());
    }

    #[test]
    fn text_layout_follows_pen_and_newlines() {
        let mut font = Font::new(Some(texture(1)), 10.0);
        let glyph = GlyphInfo {
            size: vec2(4.0, 6.0),
            bearing: vec2(1.0, 5.0),
            uv: UvRect::FULL,
            advance: 5.0,
        };
        font.set_glyph(b'a', glyph);
        font.set_glyph(
            b' ',
            GlyphInfo {
                advance: 5.0,
                ..Default::default()
            },
        );

        // scale 20 doubles every metric
        let rects = layout_text("a a\na?", vec2(100.0, 200.0), &font, 20.0);
        assert_eq!(rects.len(), 3);

        let first = rects[0].0;
        assert_eq!(first.position, vec2(102.0, 178.0));
        assert_eq!(first.size, vec2(8.0, 12.0));
        // space advanced the pen without a quad
        assert_eq!(rects[1].0.position.x, 122.0);
        // newline back to x = 100, one line lower
        assert_eq!(rects[2].0.position, vec2(102.0, 158.0));
    }

    #[test]
    fn characters_without_glyphs_are_skipped() {
        let font = Font::fallback(texture(1), 16.0);
        assert_eq!(layout_text("é€A", Vec2::ZERO, &font, 16.0).len(), 1);
    }

    #[test]
    fn glyphs_are_looked_up_by_utf8_byte() {
        let mut font = Font::new(Some(texture(1)), 10.0);
        // 'é' encodes as 0xC3 0xA9; only the lead byte has a glyph
        font.set_glyph(
            0xC3,
            GlyphInfo {
                size: vec2(2.0, 2.0),
                uv: UvRect::new(0.5, 0.5, 1.0, 1.0),
                advance: 3.0,
                ..Default::default()
            },
        );
        font.set_glyph(0xE9, GlyphInfo { size: vec2(2.0, 2.0), ..Default::default() });

        let rects = layout_text("é", Vec2::ZERO, &font, 10.0);
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].1, UvRect::new(0.5, 0.5, 1.0, 1.0));
    }
}
