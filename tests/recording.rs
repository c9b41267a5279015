mod common;

use glam::Mat4;
use scene_renderer::backend::{ClearValue, UniformStaging};
use scene_renderer::perspective::{Perspective, MAX_VIEWS};
use scene_renderer::scene::Component;
use std::sync::Arc;

#[test]
fn records_one_list_per_surface_image() {
    let (mut gpu, mut registry) = common::setup(3);
    let (scene, mut perspective, _material) = common::scene_with_cube(&mut gpu, &mut registry);

    perspective
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();

    assert_eq!(perspective.command_lists().len(), 3);
    for (image, list) in perspective.command_lists().iter().enumerate() {
        let recorded = gpu.command_list(*list).unwrap();
        assert_eq!(recorded.surface_index, image as u32);
        assert_eq!(recorded.draw_count(), 1);
        assert_eq!(recorded.bound_pipelines().len(), 1);
    }
}

#[test]
fn adding_an_entity_adds_one_draw_after_re_record() {
    let (mut gpu, mut registry) = common::setup(2);
    let (mut scene, mut perspective, material) = common::scene_with_cube(&mut gpu, &mut registry);

    perspective
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();
    let before = gpu
        .command_list(perspective.command_lists()[0])
        .unwrap()
        .draw_count();

    let id = scene.spawn(&mut gpu, "second").unwrap();
    let entity = scene.get_mut(id).unwrap();
    entity.attach(Component::Mesh(registry.mesh("Sphere").unwrap()));
    entity.attach(Component::Material(Arc::clone(&material)));

    perspective
        .re_record(&mut gpu, &scene, registry.light_buffer())
        .unwrap();
    let after = gpu
        .command_list(perspective.command_lists()[0])
        .unwrap()
        .draw_count();

    assert_eq!(after, before + 1);
}

#[test]
fn inactive_and_meshless_entities_are_skipped() {
    let (mut gpu, mut registry) = common::setup(2);
    let (mut scene, mut perspective, material) = common::scene_with_cube(&mut gpu, &mut registry);

    // Inactive entity with full draw content
    let sleeping = scene.spawn(&mut gpu, "sleeping").unwrap();
    let entity = scene.get_mut(sleeping).unwrap();
    entity.attach(Component::Mesh(registry.mesh("Cube").unwrap()));
    entity.attach(Component::Material(Arc::clone(&material)));
    entity.set_active(false);

    // Material but no mesh: logged and skipped, not an error
    let meshless = scene.spawn(&mut gpu, "meshless").unwrap();
    scene
        .get_mut(meshless)
        .unwrap()
        .attach(Component::Material(Arc::clone(&material)));

    perspective
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();

    let recorded = gpu.command_list(perspective.command_lists()[0]).unwrap();
    assert_eq!(recorded.draw_count(), 1);
}

#[test]
fn materials_keyed_to_another_target_are_skipped_silently() {
    let (mut gpu, mut registry) = common::setup(2);
    let (mut scene, mut surface_perspective, _material) =
        common::scene_with_cube(&mut gpu, &mut registry);

    // Second material type compiled for an offscreen perspective only
    let mut offscreen = Perspective::offscreen(&mut gpu, "aux", 256, 256, false).unwrap();
    let off_key = offscreen.key(0);
    let off_caches = common::standard_type(&mut gpu, &mut registry, off_key);
    let off_material = common::standard_material(&mut gpu, &registry, &off_caches, off_key);

    let id = scene.spawn(&mut gpu, "aux only").unwrap();
    let entity = scene.get_mut(id).unwrap();
    entity.attach(Component::Mesh(registry.mesh("Cube").unwrap()));
    entity.attach(Component::Material(Arc::clone(&off_material)));

    surface_perspective
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();
    offscreen
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();

    // Surface pass sees only the surface-keyed cube; offscreen pass sees
    // only the aux entity
    let surface_list = gpu
        .command_list(surface_perspective.command_lists()[0])
        .unwrap();
    assert_eq!(surface_list.draw_count(), 1);

    assert_eq!(offscreen.command_lists().len(), 1);
    let offscreen_list = gpu.command_list(offscreen.command_lists()[0]).unwrap();
    assert_eq!(offscreen_list.draw_count(), 1);
}

#[test]
fn cube_perspective_activates_all_view_slots() {
    let (mut gpu, _registry) = common::setup(2);
    let mut perspective = Perspective::offscreen(&mut gpu, "env", 128, 128, true).unwrap();
    assert_eq!(perspective.view_count(), MAX_VIEWS);
    assert_eq!(gpu.target_layers(perspective.target()), 6);

    for face in 0..MAX_VIEWS {
        perspective.set_view(face, Mat4::IDENTITY, Mat4::IDENTITY);
    }
    let staging = UniformStaging::new(2);
    perspective.upload_camera(&staging);
    staging.flush(staging.rotate(), &mut gpu);

    let data = gpu.buffer_data(perspective.camera_buffer()).unwrap();
    // Active view count sits after the view array
    let count_offset = data.len() - 16;
    let count = u32::from_le_bytes(data[count_offset..count_offset + 4].try_into().unwrap());
    assert_eq!(count, MAX_VIEWS as u32);
}

#[test]
fn out_of_range_view_slot_is_dropped() {
    let (mut gpu, _registry) = common::setup(2);
    let mut perspective = Perspective::offscreen(&mut gpu, "flat", 128, 128, false).unwrap();
    assert_eq!(perspective.view_count(), 1);

    perspective.set_view(MAX_VIEWS, Mat4::IDENTITY, Mat4::IDENTITY);
    assert_eq!(perspective.view_count(), 1);
}

#[test]
fn re_record_reuses_the_stored_clear_value() {
    let (mut gpu, mut registry) = common::setup(2);
    let (scene, mut perspective, _material) = common::scene_with_cube(&mut gpu, &mut registry);

    let clear = ClearValue {
        color: [1.0, 0.0, 0.0, 1.0],
        depth: 0.0,
    };
    perspective
        .record(&mut gpu, &scene, registry.light_buffer(), clear)
        .unwrap();
    perspective
        .re_record(&mut gpu, &scene, registry.light_buffer())
        .unwrap();

    let recorded = gpu.command_list(perspective.command_lists()[0]).unwrap();
    assert_eq!(recorded.clear.color, clear.color);
    assert_eq!(recorded.clear.depth, clear.depth);
}

#[test]
fn invalidate_releases_recorded_lists() {
    let (mut gpu, mut registry) = common::setup(2);
    let (scene, mut perspective, _material) = common::scene_with_cube(&mut gpu, &mut registry);

    perspective
        .record(&mut gpu, &scene, registry.light_buffer(), ClearValue::default())
        .unwrap();
    let lists: Vec<_> = perspective.command_lists().to_vec();
    assert!(!lists.is_empty());

    perspective.invalidate(&mut gpu);
    assert!(!perspective.is_recorded());
    for list in lists {
        assert!(gpu.command_list(list).is_none());
    }
}
