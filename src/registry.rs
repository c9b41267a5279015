//! Central resource registry
//!
//! Owns the named texture, mesh, material, and perspective collections plus
//! the session-wide caches shared by every material type. The registry is the
//! last owner standing: teardown runs in dependency order so nothing is
//! destroyed while a consumer still references it.

use crate::backend::{
    BufferDescriptor, BufferHandle, BufferUsage, GpuBackend, GpuResult, PipelineConfig,
};
use crate::material::{MaterialRef, PipelineKey, SharedPipelines};
use crate::mesh::{GpuMesh, MeshData};
use crate::perspective::Perspective;
use crate::scene::{Light, LightSetUniform};
use crate::texture::Texture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Names of the textures resolved for unset material texture references
pub const DEFAULT_TEXTURE_2D: &str = "default";
pub const DEFAULT_TEXTURE_CUBE: &str = "default_cube";
pub const DEFAULT_TEXTURE_3D: &str = "default_3d";

pub struct Registry {
    textures: HashMap<String, Arc<Texture>>,
    meshes: HashMap<String, Arc<GpuMesh>>,
    materials: HashMap<String, MaterialRef>,
    lights: HashMap<String, Arc<RwLock<Light>>>,
    perspectives: HashMap<String, Arc<RwLock<Perspective>>>,
    material_types: Vec<SharedPipelines>,
    pipeline_configs: HashMap<PipelineKey, PipelineConfig>,
    light_buffer: BufferHandle,
}

impl Registry {
    /// Create the registry with its built-in content: the shared light
    /// buffer, white placeholder textures for each dimension, and the
    /// primitive meshes.
    pub fn initialize(gpu: &mut dyn GpuBackend) -> GpuResult<Self> {
        let light_buffer = gpu.create_buffer(&BufferDescriptor {
            label: Some("scene lights".to_string()),
            size: std::mem::size_of::<LightSetUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;

        let mut registry = Self {
            textures: HashMap::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            lights: HashMap::new(),
            perspectives: HashMap::new(),
            material_types: Vec::new(),
            pipeline_configs: HashMap::new(),
            light_buffer,
        };

        registry.register_texture(Texture::placeholder_2d(gpu, DEFAULT_TEXTURE_2D)?);
        registry.register_texture(Texture::placeholder_cube(gpu, DEFAULT_TEXTURE_CUBE)?);
        registry.register_texture(Texture::placeholder_3d(gpu, DEFAULT_TEXTURE_3D)?);

        registry.register_mesh(GpuMesh::upload(gpu, &MeshData::cube())?);
        registry.register_mesh(GpuMesh::upload(gpu, &MeshData::sphere(32, 16))?);
        registry.register_mesh(GpuMesh::upload(gpu, &MeshData::plane(1.0, 1.0, 1))?);

        log::info!("registry initialized with built-in textures and meshes");
        Ok(registry)
    }

    // Textures

    pub fn register_texture(&mut self, texture: Texture) -> Arc<Texture> {
        let texture = Arc::new(texture);
        self.textures
            .insert(texture.name.clone(), Arc::clone(&texture));
        texture
    }

    pub fn texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.textures.get(name).cloned()
    }

    /// The white placeholder used when a 2D texture reference is unset
    pub fn default_texture(&self) -> Arc<Texture> {
        self.textures[DEFAULT_TEXTURE_2D].clone()
    }

    // Meshes

    pub fn register_mesh(&mut self, mesh: GpuMesh) -> Arc<GpuMesh> {
        let mesh = Arc::new(mesh);
        self.meshes.insert(mesh.name.clone(), Arc::clone(&mesh));
        mesh
    }

    pub fn mesh(&self, name: &str) -> Option<Arc<GpuMesh>> {
        self.meshes.get(name).cloned()
    }

    // Materials

    pub fn register_material(&mut self, name: &str, material: MaterialRef) -> MaterialRef {
        self.materials
            .insert(name.to_string(), Arc::clone(&material));
        material
    }

    pub fn material(&self, name: &str) -> Option<MaterialRef> {
        self.materials.get(name).cloned()
    }

    /// Every registered material, iterated each tick for uniform upload
    pub fn materials(&self) -> impl Iterator<Item = &MaterialRef> {
        self.materials.values()
    }

    // Lights

    pub fn register_light(&mut self, name: &str, light: Light) -> Arc<RwLock<Light>> {
        let light = Arc::new(RwLock::new(light));
        self.lights.insert(name.to_string(), Arc::clone(&light));
        light
    }

    pub fn light(&self, name: &str) -> Option<Arc<RwLock<Light>>> {
        self.lights.get(name).cloned()
    }

    // Perspectives

    pub fn register_perspective(&mut self, perspective: Perspective) -> Arc<RwLock<Perspective>> {
        let name = perspective.name().to_string();
        let perspective = Arc::new(RwLock::new(perspective));
        self.perspectives.insert(name, Arc::clone(&perspective));
        perspective
    }

    pub fn perspective(&self, name: &str) -> Option<Arc<RwLock<Perspective>>> {
        self.perspectives.get(name).cloned()
    }

    pub fn perspectives(&self) -> impl Iterator<Item = &Arc<RwLock<Perspective>>> {
        self.perspectives.values()
    }

    // Material types and pipeline configs

    /// Register a material type's shared caches for session-wide maintenance
    /// (pipeline refresh on surface recreation, teardown)
    pub fn register_material_type(&mut self, caches: SharedPipelines) {
        self.material_types.push(caches);
    }

    pub fn material_types(&self) -> &[SharedPipelines] {
        &self.material_types
    }

    /// Register the fixed-function config compiled for a pipeline key. Must
    /// happen before the owning material type is initialized.
    pub fn register_pipeline_config(&mut self, key: PipelineKey, config: PipelineConfig) {
        self.pipeline_configs.insert(key, config);
    }

    pub fn pipeline_config(&self, key: PipelineKey) -> Option<&PipelineConfig> {
        self.pipeline_configs.get(&key)
    }

    pub fn pipeline_configs(&self) -> &HashMap<PipelineKey, PipelineConfig> {
        &self.pipeline_configs
    }

    /// The shared light buffer bound by every lit material
    pub fn light_buffer(&self) -> BufferHandle {
        self.light_buffer
    }

    /// Tear everything down in dependency order: perspectives first (they
    /// reference pipelines and buffers), then material instances, then the
    /// per-type caches, then meshes and textures, and the light buffer last.
    /// The scene graph must already be cleared.
    pub fn cleanup(&mut self, gpu: &mut dyn GpuBackend) {
        for (_, perspective) in self.perspectives.drain() {
            perspective.write().destroy(gpu);
        }
        for (_, material) in self.materials.drain() {
            material.read().destroy(gpu);
        }
        self.lights.clear();
        for caches in self.material_types.drain(..) {
            caches.lock().destroy(gpu);
        }
        for (_, mesh) in self.meshes.drain() {
            mesh.destroy(gpu);
        }
        for (_, texture) in self.textures.drain() {
            texture.destroy(gpu);
        }
        gpu.destroy_buffer(self.light_buffer);
        self.pipeline_configs.clear();
        log::info!("registry cleaned up");
    }
}
