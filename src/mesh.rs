//! Mesh data and the GPU mesh provider contract

use crate::backend::{
    BufferDescriptor, BufferHandle, BufferUsage, GpuBackend, GpuResult, IndexFormat, Vertex,
};
use glam::{Vec2, Vec3, Vec4};

/// CPU-side mesh data
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Average of all vertex positions
    pub fn centroid(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return Vec3::ZERO;
        }
        let sum: Vec3 = self.vertices.iter().map(|v| v.position).sum();
        sum / self.vertices.len() as f32
    }

    /// Unit cube centered at the origin
    pub fn cube() -> Self {
        let mut mesh = MeshData::new("Cube");

        // One quad per face: (normal, right-axis, up-axis)
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
        ];

        for (normal, right, up) in faces {
            let base = mesh.vertices.len() as u32;
            let corners = [
                (-right - up, Vec2::new(0.0, 1.0)),
                (right - up, Vec2::new(1.0, 1.0)),
                (right + up, Vec2::new(1.0, 0.0)),
                (-right + up, Vec2::new(0.0, 0.0)),
            ];
            for (corner, uv) in corners {
                mesh.vertices.push(Vertex {
                    position: (normal + corner) * 0.5,
                    normal,
                    uv,
                    tangent: right.extend(1.0),
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// UV sphere with the given segment/ring resolution
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = MeshData::new("Sphere");
        let seg_step = std::f32::consts::TAU / segments as f32;
        let ring_step = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_step;
            let (ring_radius, y) = (phi.sin(), phi.cos());
            for seg in 0..=segments {
                let theta = seg as f32 * seg_step;
                let normal = Vec3::new(
                    ring_radius * theta.cos(),
                    y,
                    ring_radius * theta.sin(),
                );
                mesh.vertices.push(Vertex {
                    position: normal * 0.5,
                    normal: normal.normalize_or_zero(),
                    uv: Vec2::new(seg as f32 / segments as f32, ring as f32 / rings as f32),
                    tangent: Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0),
                });
            }
        }

        let stride = segments + 1;
        for ring in 0..rings {
            for seg in 0..segments {
                let a = ring * stride + seg;
                let b = a + stride;
                mesh.indices
                    .extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        mesh
    }

    /// Flat plane on the XZ axes
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = MeshData::new("Plane");
        let n = subdivisions.max(1);

        for z in 0..=n {
            for x in 0..=n {
                let u = x as f32 / n as f32;
                let v = z as f32 / n as f32;
                mesh.vertices.push(Vertex {
                    position: Vec3::new((u - 0.5) * width, 0.0, (v - 0.5) * depth),
                    normal: Vec3::Y,
                    uv: Vec2::new(u, v),
                    tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
                });
            }
        }

        let stride = n + 1;
        for z in 0..n {
            for x in 0..n {
                let a = z * stride + x;
                let b = a + stride;
                mesh.indices
                    .extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }

        mesh
    }
}

/// GPU-resident mesh: the provider contract consumed by material draws
#[derive(Debug)]
pub struct GpuMesh {
    pub name: String,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_format: IndexFormat,
    pub index_count: u32,
    pub centroid: Vec3,
}

impl GpuMesh {
    /// Upload CPU mesh data into vertex/index buffers
    pub fn upload(gpu: &mut dyn GpuBackend, data: &MeshData) -> GpuResult<Self> {
        let vertex_buffer = gpu.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", data.name)),
                size: data.vertex_bytes().len() as u64,
                usage: BufferUsage::VERTEX,
            },
            data.vertex_bytes(),
        )?;
        let index_buffer = gpu.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", data.name)),
                size: data.index_bytes().len() as u64,
                usage: BufferUsage::INDEX,
            },
            data.index_bytes(),
        )?;
        Ok(Self {
            name: data.name.clone(),
            vertex_buffer,
            index_buffer,
            index_format: IndexFormat::Uint32,
            index_count: data.index_count() as u32,
            centroid: data.centroid(),
        })
    }

    pub fn destroy(&self, gpu: &mut dyn GpuBackend) {
        gpu.destroy_buffer(self.vertex_buffer);
        gpu.destroy_buffer(self.index_buffer);
    }
}
