use std::f32::consts::{FRAC_PI_2, PI, TAU};

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    vertex_attr_array, Buffer, BufferAddress, BufferUsages, Device, VertexAttribute,
    VertexBufferLayout, VertexStepMode,
};

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    /// Unit vector along increasing `uv.x`. `w` is the sign for which
    /// `cross(normal, tangent.xyz) * w` points up the texture.
    pub tangent: Vec4,
}

impl Vertex {
    const ATTRIBUTES: [VertexAttribute; 4] = vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x4,
    ];

    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
        step_mode: VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Sphere centered on the origin, counter-clockwise when seen from outside.
    ///
    /// `uv.x` wraps once around the equator and `uv.y` runs from the north
    /// pole (0) to the south pole (1).
    pub fn uv_sphere(radius: f32, sectors: u32, stacks: u32) -> Self {
        let sectors = sectors.max(3);
        let stacks = stacks.max(2);

        let mut vertices = Vec::with_capacity(((sectors + 1) * (stacks + 1)) as usize);
        for i in 0..=stacks {
            let phi = FRAC_PI_2 - PI * i as f32 / stacks as f32;
            for j in 0..=sectors {
                let theta = TAU * j as f32 / sectors as f32;
                let normal = Vec3::new(
                    phi.cos() * theta.cos(),
                    phi.sin(),
                    -phi.cos() * theta.sin(),
                );
                // d(normal)/d(theta), well defined at the poles too.
                let tangent = Vec3::new(-theta.sin(), 0., -theta.cos());
                vertices.push(Vertex {
                    position: normal * radius,
                    normal,
                    uv: Vec2::new(
                        j as f32 / sectors as f32,
                        i as f32 / stacks as f32,
                    ),
                    tangent: tangent.extend(1.),
                });
            }
        }

        let mut indices = Vec::with_capacity((6 * sectors * (stacks - 1)) as usize);
        for i in 0..stacks {
            for j in 0..sectors {
                let k1 = i * (sectors + 1) + j;
                let k2 = k1 + sectors + 1;
                if i != 0 {
                    indices.extend_from_slice(&[k1, k2, k1 + 1]);
                }
                if i != stacks - 1 {
                    indices.extend_from_slice(&[k1 + 1, k2, k2 + 1]);
                }
            }
        }

        Self { vertices, indices }
    }

    pub fn upload(&self, device: &Device) -> GpuMesh {
        GpuMesh {
            vertex_buffer: device.create_buffer_init(&BufferInitDescriptor {
                label: Some("mesh_vertex_buffer"),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&BufferInitDescriptor {
                label: Some("mesh_index_buffer"),
                contents: bytemuck::cast_slice(&self.indices),
                usage: BufferUsages::INDEX,
            }),
            index_count: self.indices.len() as u32,
        }
    }
}

pub struct GpuMesh {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub index_count: u32,
}
