use glam::Vec2;

use crate::{color::Color, texture::Texture, vertex::Vertex};

/// Quads waiting for the next flush, in submission order
///
/// Always holds 4 vertices, 6 indices & 1 texture per quad. Indices are absolute
/// into `vertices`; the batcher rebases them per draw call
#[derive(Debug, Default)]
pub struct DrawQueue {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<Texture>,
}

impl DrawQueue {
    pub fn with_capacity(quads: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(quads * 4),
            indices: Vec::with_capacity(quads * 6),
            textures: Vec::with_capacity(quads),
        }
    }

    /// Appends one quad built from corners in bl, br, tr, tl order; two triangles 0-1-2, 0-2-3
    pub fn push_quad(
        &mut self,
        corners: [Vec2; 4],
        uvs: [Vec2; 4],
        colors: [Color; 4],
        texture: Texture,
    ) {
        let base = self.vertices.len() as u32;
        for i in 0..4 {
            self.vertices.push(Vertex::new(
                corners[i].to_array(),
                uvs[i].to_array(),
                colors[i].components(),
            ));
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        self.textures.push(texture);
    }

    pub fn quad_count(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.textures.clear();
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }
}
