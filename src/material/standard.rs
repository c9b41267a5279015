//! The built-in lit material

use crate::backend::{
    BindingEntry, BindingSetHandle, BindingSetLayoutEntry, BindingType, BufferDescriptor,
    BufferHandle, BufferUsage, GpuBackend, GpuError, GpuResult, ShaderStageFlags, UniformStaging,
    Vertex,
};
use crate::material::{
    BindingHasher, Material, MaterialTypeDesc, PipelineKey, ResourceSet, SharedPipelines,
};
use crate::mesh::GpuMesh;
use crate::texture::Texture;
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use std::sync::Arc;

/// GPU-side material parameters
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniform {
    pub base_color: Vec4,
    /// x = metallic, y = roughness, z/w unused
    pub surface: Vec4,
    pub emissive: Vec4,
}

/// Lit surface material with a base-color texture slot.
///
/// Instances hold their own parameter uniform buffer; pipelines and binding
/// sets live in the type's [`SharedPipelines`] caches.
pub struct StandardMaterial {
    caches: SharedPipelines,
    key: PipelineKey,
    uniform_buffer: BufferHandle,
    base_color: Vec4,
    metallic: f32,
    roughness: f32,
    emissive: Vec4,
    color_texture: Option<Arc<Texture>>,
    fallback: Arc<Texture>,
}

impl StandardMaterial {
    /// Binding-set layout and shader stages for this type. Register once per
    /// session via `Registry::register_material_type`.
    pub fn type_desc() -> MaterialTypeDesc {
        MaterialTypeDesc {
            name: "standard",
            vertex_shader: "standard.vert",
            fragment_shader: "standard.frag",
            vertex_layout: Vertex::layout(),
            binding_layout: vec![
                BindingSetLayoutEntry {
                    binding: 0,
                    visibility: ShaderStageFlags::VERTEX,
                    ty: BindingType::UniformBuffer,
                },
                BindingSetLayoutEntry {
                    binding: 1,
                    visibility: ShaderStageFlags::VERTEX_FRAGMENT,
                    ty: BindingType::UniformBuffer,
                },
                BindingSetLayoutEntry {
                    binding: 2,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::UniformBuffer,
                },
                BindingSetLayoutEntry {
                    binding: 3,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::UniformBuffer,
                },
                BindingSetLayoutEntry {
                    binding: 4,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::Texture,
                },
                BindingSetLayoutEntry {
                    binding: 5,
                    visibility: ShaderStageFlags::FRAGMENT,
                    ty: BindingType::Sampler { comparison: false },
                },
            ],
        }
    }

    pub fn new(
        gpu: &mut dyn GpuBackend,
        caches: SharedPipelines,
        key: PipelineKey,
        fallback: Arc<Texture>,
    ) -> GpuResult<Self> {
        let uniform_buffer = gpu.create_buffer(&BufferDescriptor {
            label: Some("standard material params".to_string()),
            size: std::mem::size_of::<MaterialUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        Ok(Self {
            caches,
            key,
            uniform_buffer,
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec4::ZERO,
            color_texture: None,
            fallback,
        })
    }

    pub fn set_base_color(&mut self, color: Vec4) {
        self.base_color = color;
    }

    pub fn set_metallic(&mut self, metallic: f32) {
        self.metallic = metallic.clamp(0.0, 1.0);
    }

    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness.clamp(0.0, 1.0);
    }

    pub fn set_emissive(&mut self, emissive: Vec4) {
        self.emissive = emissive;
    }

    pub fn set_color_texture(&mut self, texture: Option<Arc<Texture>>) {
        self.color_texture = texture;
    }

    pub fn uniform_buffer(&self) -> BufferHandle {
        self.uniform_buffer
    }

    /// The texture actually bound: the assigned one, or the fallback
    fn resolved_texture(&self) -> &Texture {
        self.color_texture.as_deref().unwrap_or(&self.fallback)
    }
}

impl Material for StandardMaterial {
    fn pipeline_key(&self) -> PipelineKey {
        self.key
    }

    fn upload_uniforms(&self, staging: &UniformStaging) {
        let uniform = MaterialUniform {
            base_color: self.base_color,
            surface: Vec4::new(self.metallic, self.roughness, 0.0, 0.0),
            emissive: self.emissive,
        };
        staging.write(self.uniform_buffer, bytemuck::bytes_of(&uniform));
    }

    fn binding_set(
        &self,
        gpu: &mut dyn GpuBackend,
        resources: &ResourceSet,
    ) -> GpuResult<BindingSetHandle> {
        let texture = self.resolved_texture();

        let mut hasher = BindingHasher::new();
        hasher
            .buffer(resources.transform_buffer)
            .buffer(resources.camera_buffer)
            .buffer(resources.light_buffer)
            .buffer(self.uniform_buffer)
            .view(texture.view)
            .sampler(texture.sampler);
        let hash = hasher.finish();

        let mut caches = self.caches.lock();
        let layout = caches
            .layout()
            .ok_or_else(|| GpuError::BindingSetCreationFailed("type not initialized".into()))?;
        let entries = [
            (
                0,
                BindingEntry::Buffer {
                    buffer: resources.transform_buffer,
                    offset: 0,
                    size: None,
                },
            ),
            (
                1,
                BindingEntry::Buffer {
                    buffer: resources.camera_buffer,
                    offset: 0,
                    size: None,
                },
            ),
            (
                2,
                BindingEntry::Buffer {
                    buffer: resources.light_buffer,
                    offset: 0,
                    size: None,
                },
            ),
            (
                3,
                BindingEntry::Buffer {
                    buffer: self.uniform_buffer,
                    offset: 0,
                    size: None,
                },
            ),
            (4, BindingEntry::Texture(texture.view)),
            (5, BindingEntry::Sampler(texture.sampler)),
        ];
        caches
            .binding_sets_mut()
            .get_or_create(hash, || gpu.create_binding_set(layout, &entries))
    }

    fn draw(
        &self,
        gpu: &mut dyn GpuBackend,
        key: PipelineKey,
        binding_set: BindingSetHandle,
        mesh: &GpuMesh,
    ) -> GpuResult<()> {
        let pipeline = self.caches.lock().pipeline(key).ok_or_else(|| {
            GpuError::RecordingFailed(format!(
                "no compiled pipeline for target={} subpass={} variant={}",
                key.render_target.0, key.subpass, key.variant
            ))
        })?;
        gpu.bind_pipeline(pipeline);
        gpu.bind_binding_set(0, binding_set);
        gpu.bind_vertex_buffer(0, mesh.vertex_buffer, 0);
        gpu.bind_index_buffer(mesh.index_buffer, 0, mesh.index_format);
        gpu.draw_indexed(0..mesh.index_count, 0, 0..1);
        Ok(())
    }

    fn destroy(&self, gpu: &mut dyn GpuBackend) {
        gpu.destroy_buffer(self.uniform_buffer);
    }
}
