use bytemuck::{Pod, Zeroable};
use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// A single vertex used in rendering batched quads
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
    /// Texture slot within the batch; rewritten by the batcher
    pub tex_index: f32,
}

impl Vertex {
    /// Creates a new vertex with position, texture coordinates & color
    ///
    /// - `position`: `[x, y]` in world space
    /// - `tex_coords`: `[u, v]` in normalized (0–1) texture space, v up
    /// - `color`: RGBA color multiplied with the sampled texel
    pub fn new(position: [f32; 2], tex_coords: [f32; 2], color: [f32; 4]) -> Self {
        Self {
            position,
            tex_coords,
            color,
            tex_index: 0.0,
        }
    }

    /// Returns the vertex buffer layout
    ///
    /// This must match the vertex shader input layout:
    /// - location 0: `vec2<f32>` (position)
    /// - location 1: `vec2<f32>` (texture coordinates)
    /// - location 2: `vec4<f32>` (color)
    /// - location 3: `f32` (texture slot)
    pub fn desc() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: &[
                VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: VertexFormat::Float32x2,
                },
                VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: VertexFormat::Float32x2,
                },
                VertexAttribute {
                    offset: 16,
                    shader_location: 2,
                    format: VertexFormat::Float32x4,
                },
                VertexAttribute {
                    offset: 32,
                    shader_location: 3,
                    format: VertexFormat::Float32,
                },
            ],
        }
    }
}

/// Position-only vertex for shadow volumes
pub fn shadow_vertex_desc() -> VertexBufferLayout<'static> {
    VertexBufferLayout {
        array_stride: 8,
        step_mode: VertexStepMode::Vertex,
        attributes: &[VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: VertexFormat::Float32x2,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_covers_the_whole_vertex() {
        let desc = Vertex::desc();
        assert_eq!(desc.array_stride, 36);
        let last = desc.attributes.last().unwrap();
        assert_eq!(last.offset + last.format.size(), desc.array_stride);
    }
}
