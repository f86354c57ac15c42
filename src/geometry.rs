// Quad mesh, per-frame uniforms and the procedural texture

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use std::mem::{offset_of, size_of};

/// Interleaved vertex as consumed by shaders/quad.vert
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, position) as u32)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, color) as u32)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(2)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(Vertex, uv) as u32)
                .build(),
        ]
    }
}

/// Uniform block at binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-0.5, -0.5, 0.0], color: [1.0, 0.0, 0.0], uv: [1.0, 0.0] },
    Vertex { position: [0.5, -0.5, 0.0], color: [0.0, 1.0, 0.0], uv: [0.0, 0.0] },
    Vertex { position: [0.5, 0.5, 0.0], color: [0.0, 0.0, 1.0], uv: [0.0, 1.0] },
    Vertex { position: [-0.5, 0.5, 0.0], color: [1.0, 1.0, 1.0], uv: [1.0, 1.0] },
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Byte length of tightly packed RGBA8 pixels
pub fn rgba8_byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// RGBA8 checkerboard of `size` x `size` pixels split into `cells` x `cells` squares
pub fn checkerboard(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let cells = cells.max(1);
    let cell_size = (size / cells).max(1);

    let mut pixels = Vec::with_capacity(rgba8_byte_len(size, size));
    for y in 0..size {
        for x in 0..size {
            let even = ((x / cell_size) + (y / cell_size)) % 2 == 0;
            pixels.extend_from_slice(if even { &a } else { &b });
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        assert_eq!(size_of::<Vertex>(), 32);

        let binding = Vertex::binding_description();
        assert_eq!(binding.stride, 32);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let attrs = Vertex::attribute_descriptions();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        let locations: Vec<u32> = attrs.iter().map(|a| a.location).collect();
        assert_eq!(offsets, [0, 12, 24]);
        assert_eq!(locations, [0, 1, 2]);
        assert_eq!(attrs[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn uniform_block_is_three_matrices() {
        assert_eq!(size_of::<UniformBufferObject>(), 3 * 64);
        let ubo = UniformBufferObject {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        };
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&ubo));
        assert_eq!(floats.len(), 48);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[5], 1.0);
        assert_eq!(floats[16], 1.0);
    }

    #[test]
    fn quad_indices_reference_every_vertex() {
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
        for v in 0..QUAD_VERTICES.len() as u16 {
            assert!(QUAD_INDICES.contains(&v));
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn rgba8_len_does_not_overflow_u32() {
        assert_eq!(rgba8_byte_len(256, 256), 262_144);
        assert_eq!(rgba8_byte_len(40_000, 40_000), 6_400_000_000);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let white = [255, 255, 255, 255];
        let black = [0, 0, 0, 255];
        let pixels = checkerboard(4, 2, white, black);
        assert_eq!(pixels.len(), 4 * 4 * 4);

        let pixel = |x: usize, y: usize| &pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), white);
        assert_eq!(pixel(1, 1), white);
        assert_eq!(pixel(2, 0), black);
        assert_eq!(pixel(0, 2), black);
        assert_eq!(pixel(3, 3), white);
    }

    #[test]
    fn checkerboard_tolerates_zero_cells() {
        let pixels = checkerboard(2, 0, [1, 2, 3, 4], [5, 6, 7, 8]);
        assert_eq!(pixels, [1, 2, 3, 4].repeat(4));
    }
}
