//! Shared test scaffolding: a headless backend with the standard material
//! type compiled for one surface perspective.
#![allow(dead_code)]

use parking_lot::{Mutex, RwLock};
use scene_renderer::backend::{HeadlessGpu, PipelineConfig};
use scene_renderer::material::{MaterialPipelines, MaterialRef, PipelineKey, SharedPipelines};
use scene_renderer::scene::SceneGraph;
use scene_renderer::{Perspective, Registry, StandardMaterial};
use std::sync::Arc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn setup(surface_images: u32) -> (HeadlessGpu, Registry) {
    init_logger();
    let mut gpu = HeadlessGpu::new(640, 480, surface_images);
    let registry = Registry::initialize(&mut gpu).expect("registry init");
    (gpu, registry)
}

/// Register the standard material type compiled for `key` with the default
/// fixed-function config, and return its shared caches.
pub fn standard_type(
    gpu: &mut HeadlessGpu,
    registry: &mut Registry,
    key: PipelineKey,
) -> SharedPipelines {
    registry.register_pipeline_config(key, PipelineConfig::default());
    let caches = Arc::new(Mutex::new(MaterialPipelines::new(
        StandardMaterial::type_desc(),
    )));
    caches
        .lock()
        .initialize(gpu, registry.pipeline_configs(), &[key.render_target], 16)
        .expect("material type init");
    registry.register_material_type(Arc::clone(&caches));
    caches
}

pub fn standard_material(
    gpu: &mut HeadlessGpu,
    registry: &Registry,
    caches: &SharedPipelines,
    key: PipelineKey,
) -> MaterialRef {
    let material =
        StandardMaterial::new(gpu, Arc::clone(caches), key, registry.default_texture())
            .expect("material create");
    Arc::new(RwLock::new(material))
}

/// A surface perspective plus one cube entity drawn by the standard material
pub fn scene_with_cube(
    gpu: &mut HeadlessGpu,
    registry: &mut Registry,
) -> (SceneGraph, Perspective, MaterialRef) {
    let perspective = Perspective::for_surface(gpu, "main").expect("surface perspective");
    let key = perspective.key(0);
    let caches = standard_type(gpu, registry, key);
    let material = standard_material(gpu, registry, &caches, key);

    let mut scene = SceneGraph::new();
    let id = scene.spawn(gpu, "cube").expect("spawn");
    let entity = scene.get_mut(id).expect("entity");
    entity.attach(scene_renderer::scene::Component::Mesh(
        registry.mesh("Cube").expect("cube mesh"),
    ));
    entity.attach(scene_renderer::scene::Component::Material(Arc::clone(
        &material,
    )));

    (scene, perspective, material)
}
