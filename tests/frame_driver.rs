mod common;

use glam::{Mat4, Vec3, Vec4};
use scene_renderer::backend::ClearValue;
use scene_renderer::driver::{render_frame, update_frame, DriverConfig, EngineShared, FrameDriver};
use scene_renderer::material::{MaterialRef, MaterialUniform};
use scene_renderer::scene::{Component, Entity, Light, PointLight, TransformUniform};
use scene_renderer::{Perspective, SceneGraph, StandardMaterial};
use parking_lot::RwLock;
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Headless engine with one recorded surface perspective drawing one cube
fn engine() -> (EngineShared<scene_renderer::HeadlessGpu>, scene_renderer::scene::EntityId) {
    let (mut gpu, mut registry) = common::setup(2);
    let (scene, mut perspective, _material) = common::scene_with_cube(&mut gpu, &mut registry);
    let id = scene.find("cube").unwrap();

    perspective
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();
    registry.register_perspective(perspective);

    (EngineShared::new(gpu, scene, registry), id)
}

#[test]
fn update_uploads_resolved_world_transforms() {
    let (shared, id) = engine();

    let position = Vec3::new(2.0, 3.0, -4.0);
    shared
        .scene
        .write()
        .get_mut(id)
        .unwrap()
        .transform_mut()
        .set_position(position);

    update_frame(&shared, 0.016);
    render_frame(&shared).unwrap();

    let scene = shared.scene.read();
    let entity = scene.get(id).unwrap();
    let expected = TransformUniform::from_world(Mat4::from_translation(position));
    let gpu = shared.gpu.lock();
    let data = gpu.buffer_data(entity.transform_buffer()).unwrap();
    assert_eq!(data, bytemuck::bytes_of(&expected));
}

#[test]
fn behaviors_run_before_transform_uploads() {
    let (shared, id) = engine();

    let target = Vec3::new(0.0, 9.0, 0.0);
    shared
        .scene
        .write()
        .get_mut(id)
        .unwrap()
        .set_behavior(Box::new(move |entity: &mut Entity, _dt: f32| {
            entity.transform_mut().set_position(target);
        }));

    update_frame(&shared, 0.016);
    render_frame(&shared).unwrap();

    // The same tick's upload already reflects the behavior's move
    let scene = shared.scene.read();
    let entity = scene.get(id).unwrap();
    let expected = TransformUniform::from_world(Mat4::from_translation(target));
    let gpu = shared.gpu.lock();
    let data = gpu.buffer_data(entity.transform_buffer()).unwrap();
    assert_eq!(data, bytemuck::bytes_of(&expected));
}

#[test]
fn update_packs_world_space_lights() {
    let (shared, _id) = engine();

    let position = Vec3::new(1.0, 2.0, 3.0);
    {
        let mut scene = shared.scene.write();
        let mut gpu = shared.gpu.lock();
        let lamp = scene.spawn(&mut *gpu, "lamp").unwrap();
        drop(gpu);
        let entity = scene.get_mut(lamp).unwrap();
        entity.transform_mut().set_position(position);
        entity.attach(Component::Light(Arc::new(RwLock::new(Light::Point(
            PointLight::default(),
        )))));
    }

    update_frame(&shared, 0.016);
    render_frame(&shared).unwrap();

    let gpu = shared.gpu.lock();
    let registry = shared.registry.read();
    let data = gpu.buffer_data(registry.light_buffer()).unwrap();

    let count = u32::from_le_bytes(data[0..4].try_into().unwrap());
    assert_eq!(count, 1);
    let x = f32::from_le_bytes(data[16..20].try_into().unwrap());
    let y = f32::from_le_bytes(data[20..24].try_into().unwrap());
    let z = f32::from_le_bytes(data[24..28].try_into().unwrap());
    assert_eq!(Vec3::new(x, y, z), position);
}

#[test]
fn uniform_writes_stage_until_a_frame_renders() {
    let (shared, id) = engine();

    let position = Vec3::new(5.0, 0.0, 1.0);
    shared
        .scene
        .write()
        .get_mut(id)
        .unwrap()
        .transform_mut()
        .set_position(position);

    update_frame(&shared, 0.016);

    // The tick staged the write; the device buffer is untouched until a
    // frame flushes the slot
    let transform_buffer = shared.scene.read().get(id).unwrap().transform_buffer();
    let expected = TransformUniform::from_world(Mat4::from_translation(position));
    {
        let gpu = shared.gpu.lock();
        let data = gpu.buffer_data(transform_buffer).unwrap();
        assert_ne!(data, bytemuck::bytes_of(&expected));
    }
    assert_eq!(shared.staging.write_slot(), 0);

    render_frame(&shared).unwrap();

    let gpu = shared.gpu.lock();
    let data = gpu.buffer_data(transform_buffer).unwrap();
    assert_eq!(data, bytemuck::bytes_of(&expected));
    // The frame also published the next staging slot to the update loop
    assert_eq!(shared.staging.write_slot(), 1);
}

#[test]
fn despawn_drops_staged_writes_with_the_entity() {
    let (shared, id) = engine();

    update_frame(&shared, 0.016);
    let transform_buffer = shared.scene.read().get(id).unwrap().transform_buffer();
    shared.despawn(id);

    // The next frame's flush has nothing left to write for the entity
    render_frame(&shared).unwrap();
    let gpu = shared.gpu.lock();
    assert!(gpu.buffer_data(transform_buffer).is_none());
    assert!(shared.scene.read().get(id).is_none());
}

#[test]
fn update_ticks_while_the_render_lock_is_held() {
    let (shared, _id) = engine();
    let shared = Arc::new(shared);

    // Pin the gpu mutex as a long frame would
    let gpu = shared.gpu.lock();

    let (tx, rx) = mpsc::channel();
    let tick_shared = Arc::clone(&shared);
    let ticker = std::thread::spawn(move || {
        update_frame(&tick_shared, 0.016);
        let _ = tx.send(());
    });

    rx.recv_timeout(Duration::from_secs(5))
        .expect("update tick stalled behind the gpu lock");
    drop(gpu);
    ticker.join().unwrap();
}

#[test]
fn materials_upload_even_when_their_entity_is_inactive() {
    let (mut gpu, mut registry) = common::setup(2);
    let mut perspective = Perspective::for_surface(&mut gpu, "main").unwrap();
    let key = perspective.key(0);
    let caches = common::standard_type(&mut gpu, &mut registry, key);
    let concrete = Arc::new(RwLock::new(
        StandardMaterial::new(&mut gpu, Arc::clone(&caches), key, registry.default_texture())
            .unwrap(),
    ));
    let uniform_buffer = concrete.read().uniform_buffer();
    let material: MaterialRef = concrete.clone();

    let mut scene = SceneGraph::new();
    let id = scene.spawn(&mut gpu, "cube").unwrap();
    let entity = scene.get_mut(id).unwrap();
    entity.attach(Component::Mesh(registry.mesh("Cube").unwrap()));
    entity.attach(Component::Material(Arc::clone(&material)));

    perspective
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();
    registry.register_perspective(perspective);

    // Deactivation does not invalidate the recorded lists, so the entity
    // keeps drawing and its parameters must keep flowing
    scene.get_mut(id).unwrap().set_active(false);
    let color = Vec4::new(0.2, 0.4, 0.6, 1.0);
    concrete.write().set_base_color(color);

    let shared = EngineShared::new(gpu, scene, registry);
    update_frame(&shared, 0.016);
    render_frame(&shared).unwrap();

    let expected = MaterialUniform {
        base_color: color,
        surface: Vec4::new(0.0, 0.5, 0.0, 0.0),
        emissive: Vec4::ZERO,
    };
    let mut gpu = shared.gpu.lock();
    let data = gpu.buffer_data(uniform_buffer).unwrap();
    assert_eq!(data, bytemuck::bytes_of(&expected));

    let submitted = gpu.take_submitted();
    assert_eq!(gpu.command_list(submitted[0]).unwrap().draw_count(), 1);
}

#[test]
fn registry_held_materials_upload_uniforms() {
    let (mut gpu, mut registry) = common::setup(2);
    let perspective = Perspective::for_surface(&mut gpu, "main").unwrap();
    let key = perspective.key(0);
    let caches = common::standard_type(&mut gpu, &mut registry, key);
    let concrete = Arc::new(RwLock::new(
        StandardMaterial::new(&mut gpu, Arc::clone(&caches), key, registry.default_texture())
            .unwrap(),
    ));
    let uniform_buffer = concrete.read().uniform_buffer();
    let emissive = Vec4::new(0.0, 1.0, 0.0, 1.0);
    concrete.write().set_emissive(emissive);

    // Held by the registry only, attached to no entity
    let material: MaterialRef = concrete.clone();
    registry.register_material("glow", material);
    registry.register_perspective(perspective);

    let shared = EngineShared::new(gpu, SceneGraph::new(), registry);
    update_frame(&shared, 0.016);
    render_frame(&shared).unwrap();

    let expected = MaterialUniform {
        base_color: Vec4::ONE,
        surface: Vec4::new(0.0, 0.5, 0.0, 0.0),
        emissive,
    };
    let gpu = shared.gpu.lock();
    let data = gpu.buffer_data(uniform_buffer).unwrap();
    assert_eq!(data, bytemuck::bytes_of(&expected));
}

#[test]
fn render_submits_the_acquired_image_list_and_presents() {
    let (shared, _id) = engine();

    render_frame(&shared).unwrap();
    render_frame(&shared).unwrap();

    let mut gpu = shared.gpu.lock();
    assert_eq!(gpu.frames_presented(), 2);

    let submitted = gpu.take_submitted();
    assert_eq!(submitted.len(), 2);
    // Round-robin acquire: consecutive frames submit different per-image lists
    let first = gpu.command_list(submitted[0]).unwrap().surface_index;
    let second = gpu.command_list(submitted[1]).unwrap().surface_index;
    assert_ne!(first, second);
}

#[test]
fn surface_loss_rebuilds_pipelines_and_re_records() {
    let (shared, _id) = engine();

    render_frame(&shared).unwrap();

    let pipelines_before = {
        let mut gpu = shared.gpu.lock();
        gpu.force_surface_out_of_date();
        gpu.pipelines_created()
    };

    // The out-of-date frame recovers instead of presenting
    render_frame(&shared).unwrap();
    {
        let gpu = shared.gpu.lock();
        assert_eq!(gpu.frames_presented(), 1);
        assert!(gpu.pipelines_created() > pipelines_before);
    }

    // The next frame renders with the rebuilt state
    render_frame(&shared).unwrap();
    let gpu = shared.gpu.lock();
    assert_eq!(gpu.frames_presented(), 2);
}

#[test]
fn driver_threads_run_and_stop_on_request() {
    let (shared, _id) = engine();
    let shared = Arc::new(shared);

    let driver = FrameDriver::launch(
        Arc::clone(&shared),
        DriverConfig {
            update_interval: Duration::from_millis(1),
        },
    );
    std::thread::sleep(Duration::from_millis(50));
    shared.request_quit();
    driver.join();

    let gpu = shared.gpu.lock();
    assert!(gpu.frames_presented() > 0);
}

#[test]
fn shutdown_waits_for_the_gpu_to_drain() {
    let (shared, _id) = engine();
    let shared = Arc::new(shared);

    let driver = FrameDriver::launch(
        Arc::clone(&shared),
        DriverConfig {
            update_interval: Duration::from_millis(1),
        },
    );
    std::thread::sleep(Duration::from_millis(20));
    shared.request_quit();
    driver.join();

    // The render loop drains in-flight work before releasing the backend
    let gpu = shared.gpu.lock();
    assert!(gpu.idle_waits() >= 1);
}
