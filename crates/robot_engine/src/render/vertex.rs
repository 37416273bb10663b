//! Vertex format shared by every mesh in the engine

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem;

/// Interleaved vertex: position, color, and texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Per-vertex color, multiplied into the sampled texel.
    pub color: [f32; 3],
    /// Texture coordinates.
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Vertex buffer binding description for the graphics pipeline.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions matching the shader input locations.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: (3 * mem::size_of::<f32>()) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: (6 * mem::size_of::<f32>()) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn attribute_offsets_match_layout() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(Vertex::binding_description().stride, 32);
    }
}
