//! The unit quad every sprite instance is drawn with.

use bytemuck::{Pod, Zeroable};
use spritebatch_test_utils::{GpuBuffer, RenderContext};

/// Unit quad vertex with position and tex_coords.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            0 => Float32x2,  // position
            1 => Float32x2,  // tex_coords
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }
}

/// Quad spanning [-1,-1] to [1,1], UV origin at the top-left corner.
pub const UNIT_QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coords: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        tex_coords: [1.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        tex_coords: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coords: [0.0, 1.0],
    },
];

pub const UNIT_QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

pub const QUAD_INDEX_COUNT: u32 = UNIT_QUAD_INDICES.len() as u32;

pub const QUAD_INDEX_FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint16;

/// Device-resident vertex and index buffers for the unit quad.
#[derive(Debug, Clone)]
pub struct QuadMesh {
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
}

impl QuadMesh {
    pub fn new(ctx: &dyn RenderContext) -> Self {
        let vertex_buffer = ctx.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_quad_vbo"),
            size: std::mem::size_of_val(&UNIT_QUAD_VERTICES) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&UNIT_QUAD_VERTICES));

        let index_buffer = ctx.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_quad_ibo"),
            size: std::mem::size_of_val(&UNIT_QUAD_INDICES) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.write_buffer(&index_buffer, 0, bytemuck::cast_slice(&UNIT_QUAD_INDICES));

        Self {
            vertex_buffer,
            index_buffer,
        }
    }

    pub fn vertex_buffer(&self) -> &GpuBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &GpuBuffer {
        &self.index_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spritebatch_test_utils::MockRenderContext;

    #[test]
    fn test_vertex_stride() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        assert_eq!(QuadVertex::layout().array_stride, 16);
    }

    #[test]
    fn test_two_triangles() {
        assert_eq!(QUAD_INDEX_COUNT, 6);
        assert!(UNIT_QUAD_INDICES.iter().all(|&i| (i as usize) < UNIT_QUAD_VERTICES.len()));
    }

    #[test]
    fn test_mesh_upload() {
        let mock = MockRenderContext::new();
        let mesh = QuadMesh::new(&mock);

        assert_eq!(mock.count_buffer_creates(), 2);
        assert_eq!(mesh.vertex_buffer().size(), 64);
        assert_eq!(mesh.index_buffer().size(), 12);

        let indices = mock.buffer_writes(mesh.index_buffer().mock_id().unwrap());
        assert_eq!(indices, vec![bytemuck::cast_slice::<u16, u8>(&UNIT_QUAD_INDICES).to_vec()]);
    }
}
