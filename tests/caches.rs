mod common;

use scene_renderer::backend::{
    BufferDescriptor, BufferUsage, GpuBackend, PipelineConfig,
};
use scene_renderer::material::{PipelineKey, ResourceSet};
use scene_renderer::Perspective;

fn scratch_buffer(gpu: &mut scene_renderer::HeadlessGpu) -> scene_renderer::backend::BufferHandle {
    gpu.create_buffer(&BufferDescriptor {
        label: None,
        size: 64,
        usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
    })
    .unwrap()
}

#[test]
fn identical_resources_share_one_binding_set() {
    let (mut gpu, mut registry) = common::setup(2);
    let key = PipelineKey::new(gpu.surface_target().unwrap(), 0, 0);
    let caches = common::standard_type(&mut gpu, &mut registry, key);
    let material = common::standard_material(&mut gpu, &registry, &caches, key);

    let resources = ResourceSet {
        transform_buffer: scratch_buffer(&mut gpu),
        camera_buffer: scratch_buffer(&mut gpu),
        light_buffer: registry.light_buffer(),
    };

    let first = material.read().binding_set(&mut gpu, &resources).unwrap();
    let second = material.read().binding_set(&mut gpu, &resources).unwrap();
    assert_eq!(first, second);
    assert_eq!(gpu.binding_sets_created(), 1);
    assert_eq!(caches.lock().binding_sets().len(), 1);
}

#[test]
fn different_resource_identities_get_distinct_sets() {
    let (mut gpu, mut registry) = common::setup(2);
    let key = PipelineKey::new(gpu.surface_target().unwrap(), 0, 0);
    let caches = common::standard_type(&mut gpu, &mut registry, key);
    let material = common::standard_material(&mut gpu, &registry, &caches, key);

    let camera = scratch_buffer(&mut gpu);
    let resources_a = ResourceSet {
        transform_buffer: scratch_buffer(&mut gpu),
        camera_buffer: camera,
        light_buffer: registry.light_buffer(),
    };
    let resources_b = ResourceSet {
        transform_buffer: scratch_buffer(&mut gpu),
        camera_buffer: camera,
        light_buffer: registry.light_buffer(),
    };

    let a = material.read().binding_set(&mut gpu, &resources_a).unwrap();
    let b = material.read().binding_set(&mut gpu, &resources_b).unwrap();
    assert_ne!(a, b);
    assert_eq!(gpu.binding_sets_created(), 2);
}

#[test]
fn two_instances_with_shared_resources_still_dedup_per_identity() {
    let (mut gpu, mut registry) = common::setup(2);
    let key = PipelineKey::new(gpu.surface_target().unwrap(), 0, 0);
    let caches = common::standard_type(&mut gpu, &mut registry, key);

    // Each instance owns its parameter buffer, so the combined identity
    // differs and each gets its own set, created exactly once.
    let first = common::standard_material(&mut gpu, &registry, &caches, key);
    let second = common::standard_material(&mut gpu, &registry, &caches, key);

    let resources = ResourceSet {
        transform_buffer: scratch_buffer(&mut gpu),
        camera_buffer: scratch_buffer(&mut gpu),
        light_buffer: registry.light_buffer(),
    };

    for material in [&first, &second] {
        material.read().binding_set(&mut gpu, &resources).unwrap();
        material.read().binding_set(&mut gpu, &resources).unwrap();
    }
    assert_eq!(gpu.binding_sets_created(), 2);
    assert_eq!(caches.lock().binding_sets().len(), 2);
}

#[test]
fn initialize_compiles_one_pipeline_per_registered_config() {
    let (mut gpu, mut registry) = common::setup(2);
    let target = gpu.surface_target().unwrap();

    let opaque = PipelineKey::new(target, 0, 0);
    let transparent = PipelineKey::new(target, 0, 1);
    registry.register_pipeline_config(transparent, PipelineConfig::default());
    let caches = common::standard_type(&mut gpu, &mut registry, opaque);

    let caches = caches.lock();
    assert_eq!(caches.pipeline_count(), 2);
    assert_eq!(gpu.pipelines_created(), 2);
    assert!(caches.pipeline(opaque).is_some());
    assert!(caches.pipeline(transparent).is_some());
    assert_ne!(caches.pipeline(opaque), caches.pipeline(transparent));
}

#[test]
fn initialize_skips_configs_addressing_other_targets() {
    let (mut gpu, mut registry) = common::setup(2);
    let surface = gpu.surface_target().unwrap();
    let offscreen = Perspective::offscreen(&mut gpu, "env", 256, 256, false).unwrap();

    let surface_key = PipelineKey::new(surface, 0, 0);
    let offscreen_key = offscreen.key(0);
    registry.register_pipeline_config(offscreen_key, PipelineConfig::default());
    let surface_type = common::standard_type(&mut gpu, &mut registry, surface_key);

    // The surface type compiles its own variant only, even though the
    // offscreen config is registered session-wide
    {
        let caches = surface_type.lock();
        assert_eq!(caches.pipeline_count(), 1);
        assert!(caches.pipeline(surface_key).is_some());
        assert!(caches.pipeline(offscreen_key).is_none());
    }

    // And a type initialized for the offscreen target skips the surface one
    let offscreen_type = common::standard_type(&mut gpu, &mut registry, offscreen_key);
    let caches = offscreen_type.lock();
    assert_eq!(caches.pipeline_count(), 1);
    assert!(caches.pipeline(surface_key).is_none());
    assert_eq!(gpu.pipelines_created(), 2);
}

#[test]
fn refresh_recompiles_pipelines_but_keeps_binding_sets() {
    let (mut gpu, mut registry) = common::setup(2);
    let key = PipelineKey::new(gpu.surface_target().unwrap(), 0, 0);
    let caches = common::standard_type(&mut gpu, &mut registry, key);
    let material = common::standard_material(&mut gpu, &registry, &caches, key);

    let resources = ResourceSet {
        transform_buffer: scratch_buffer(&mut gpu),
        camera_buffer: scratch_buffer(&mut gpu),
        light_buffer: registry.light_buffer(),
    };
    material.read().binding_set(&mut gpu, &resources).unwrap();

    let old_pipeline = caches.lock().pipeline(key).unwrap();
    gpu.recreate_surface(800, 600).unwrap();
    caches
        .lock()
        .refresh_pipelines(&mut gpu, registry.pipeline_configs())
        .unwrap();

    let caches = caches.lock();
    let new_pipeline = caches.pipeline(key).unwrap();
    assert_ne!(old_pipeline, new_pipeline);
    assert_eq!(gpu.pipelines_created(), 2);
    assert_eq!(gpu.live_pipelines(), 1);
    // Binding sets reference buffers and images, not the surface
    assert_eq!(caches.binding_sets().len(), 1);
    assert_eq!(gpu.binding_sets_created(), 1);
}

#[test]
fn type_destroy_releases_pipelines_sets_and_layout() {
    let (mut gpu, mut registry) = common::setup(2);
    let key = PipelineKey::new(gpu.surface_target().unwrap(), 0, 0);
    let caches = common::standard_type(&mut gpu, &mut registry, key);
    let material = common::standard_material(&mut gpu, &registry, &caches, key);

    let resources = ResourceSet {
        transform_buffer: scratch_buffer(&mut gpu),
        camera_buffer: scratch_buffer(&mut gpu),
        light_buffer: registry.light_buffer(),
    };
    material.read().binding_set(&mut gpu, &resources).unwrap();

    caches.lock().destroy(&mut gpu);
    assert_eq!(gpu.live_pipelines(), 0);
    assert_eq!(gpu.live_binding_sets(), 0);
}
