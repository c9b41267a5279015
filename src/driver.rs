//! Frame driver: the update and render loops
//!
//! Update and render run on separate threads sharing one [`EngineShared`].
//! Only the render loop takes the `gpu` mutex; the update loop stages all of
//! its uniform writes through [`UniformStaging`] and touches scene and
//! registry locks only, so a long frame never stalls the simulation tick.
//! Paths that do hold the gpu mutex take it FIRST, then scene or registry
//! locks, never the other order.

use crate::backend::{GpuBackend, GpuError, GpuResult, UniformStaging};
use crate::registry::Registry;
use crate::scene::{EntityId, GpuLightData, LightSetUniform, SceneGraph, TransformUniform};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Frame driver tuning
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Fixed interval between update ticks
    pub update_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_micros(16_667),
        }
    }
}

/// State shared between the update and render loops
pub struct EngineShared<B: GpuBackend> {
    pub gpu: Mutex<B>,
    pub scene: RwLock<SceneGraph>,
    pub registry: RwLock<Registry>,
    pub staging: UniformStaging,
    quit: AtomicBool,
}

impl<B: GpuBackend> EngineShared<B> {
    pub fn new(gpu: B, scene: SceneGraph, registry: Registry) -> Self {
        let frames = gpu
            .surface_target()
            .map(|target| gpu.surface_image_count(target) as usize)
            .unwrap_or(2);
        Self {
            gpu: Mutex::new(gpu),
            scene: RwLock::new(scene),
            registry: RwLock::new(registry),
            staging: UniformStaging::new(frames),
            quit: AtomicBool::new(false),
        }
    }

    /// Remove an entity and its subtree, dropping any uniform writes still
    /// staged for their transform buffers
    pub fn despawn(&self, id: EntityId) {
        let mut gpu = self.gpu.lock();
        let mut scene = self.scene.write();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(entity) = scene.get(next) {
                self.staging.forget(entity.transform_buffer());
                pending.extend_from_slice(entity.children());
            }
        }
        scene.despawn(&mut *gpu, id);
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Release);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }
}

/// One update tick, in fixed order: behaviors run first so every later stage
/// sees their effects within the same tick, then resolved world transforms,
/// material parameters, cameras, and the aggregated light set are staged.
/// Nothing here takes the gpu mutex; all writes land in the current staging
/// slot and reach the device when the render loop flushes that slot, so a
/// tick never modifies a buffer a frame in flight is reading.
pub fn update_frame<B: GpuBackend>(shared: &EngineShared<B>, dt: f32) {
    let staging = &shared.staging;
    let mut scene = shared.scene.write();
    let registry = shared.registry.read();

    // 1. Behaviors. The behavior is moved out of its entity for the call so
    // it can mutate the entity freely, then moved back.
    let ids = scene.ids();
    for id in &ids {
        let Some(mut behavior) = scene.get_mut(*id).and_then(|e| e.take_behavior()) else {
            continue;
        };
        if let Some(entity) = scene.get_mut(*id) {
            if entity.is_active() {
                behavior.update(entity, dt);
            }
            entity.restore_behavior(behavior);
        }
    }

    // 2. Resolved world transforms
    for id in &ids {
        let world = scene.local_to_world(*id);
        if let Some(entity) = scene.get(*id) {
            let uniform = TransformUniform::from_world(world);
            staging.write(entity.transform_buffer(), bytemuck::bytes_of(&uniform));
        }
    }

    // 3. Material parameters, each shared instance once. Registry-held and
    // scene-attached materials both upload, and inactive entities are not
    // skipped: a recorded command list keeps drawing a deactivated entity, so
    // its parameters must stay current.
    let mut seen: HashSet<usize> = HashSet::new();
    for material in registry.materials() {
        if seen.insert(Arc::as_ptr(material) as *const () as usize) {
            material.read().upload_uniforms(staging);
        }
    }
    for id in &ids {
        let Some(entity) = scene.get(*id) else { continue };
        for material in &entity.materials() {
            if seen.insert(Arc::as_ptr(material) as *const () as usize) {
                material.read().upload_uniforms(staging);
            }
        }
    }

    // 4. Cameras
    for perspective in registry.perspectives() {
        perspective.read().upload_camera(staging);
    }

    // 5. Aggregated lights
    let mut lights: Vec<GpuLightData> = Vec::new();
    for id in &ids {
        let Some(entity) = scene.get(*id) else { continue };
        if !entity.is_active() {
            continue;
        }
        let entity_lights = entity.lights();
        if entity_lights.is_empty() {
            continue;
        }
        let position = scene.local_to_world(*id).w_axis.truncate();
        for light in entity_lights {
            lights.push(light.read().to_gpu_data(position));
        }
    }
    let uniform = LightSetUniform::pack(&lights);
    staging.write(registry.light_buffer(), bytemuck::bytes_of(&uniform));
}

/// One render frame: acquire, submit the recorded lists, present.
///
/// Offscreen perspectives submit all their lists every frame; the surface
/// perspective submits only the list recorded for the acquired image. A
/// surface-out-of-date result at any point triggers recovery and skips the
/// rest of the frame; the next frame renders with rebuilt state.
pub fn render_frame<B: GpuBackend>(shared: &EngineShared<B>) -> GpuResult<()> {
    let mut gpu = shared.gpu.lock();

    let image = match gpu.acquire_image() {
        Ok(image) => image,
        Err(GpuError::SurfaceOutOfDate) => {
            recover_surface(shared, &mut *gpu)?;
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    // Publish the next staging slot to the update loop, then land this
    // frame's staged uniforms before its lists execute
    let slot = shared.staging.rotate();
    shared.staging.flush(slot, &mut *gpu);

    let surface_target = gpu.surface_target();
    // Offscreen lists first so their results are ready when sampled by the
    // surface pass, then the list recorded for the acquired image
    let mut lists = Vec::new();
    let mut surface_lists = Vec::new();
    {
        let registry = shared.registry.read();
        for perspective in registry.perspectives() {
            let perspective = perspective.read();
            if Some(perspective.target()) == surface_target {
                if let Some(list) = perspective.command_list_for(image) {
                    surface_lists.push(list);
                }
            } else {
                lists.extend_from_slice(perspective.command_lists());
            }
        }
    }
    lists.extend(surface_lists);

    match gpu.submit(&lists) {
        Ok(()) => {}
        Err(GpuError::SurfaceOutOfDate) => {
            recover_surface(shared, &mut *gpu)?;
            return Ok(());
        }
        Err(err) => return Err(err),
    }

    match gpu.present() {
        Ok(()) => Ok(()),
        Err(GpuError::SurfaceOutOfDate) => {
            recover_surface(shared, &mut *gpu)?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Surface recovery protocol: drain the GPU, recreate swap-dependent state at
/// the current extent, recompile every material type's pipelines against the
/// new surface generation, and re-record every perspective. Completes before
/// the next frame is attempted.
pub fn recover_surface<B: GpuBackend>(
    shared: &EngineShared<B>,
    gpu: &mut B,
) -> GpuResult<()> {
    gpu.wait_idle();

    let Some(target) = gpu.surface_target() else {
        return Ok(());
    };
    let (width, height) = gpu.target_extent(target);
    gpu.recreate_surface(width, height)?;
    log::info!("surface recreated at {width}x{height}, rebuilding pipelines");

    let registry = shared.registry.read();
    let scene = shared.scene.read();

    for caches in registry.material_types() {
        caches
            .lock()
            .refresh_pipelines(&mut *gpu, registry.pipeline_configs())?;
    }
    for perspective in registry.perspectives() {
        perspective
            .write()
            .re_record(&mut *gpu, &scene, registry.light_buffer())?;
    }
    Ok(())
}

/// Owns the update and render threads
pub struct FrameDriver {
    update: Option<JoinHandle<()>>,
    render: Option<JoinHandle<()>>,
}

impl FrameDriver {
    /// Spawn both loops. They run until [`EngineShared::request_quit`].
    pub fn launch<B: GpuBackend + Send + 'static>(
        shared: Arc<EngineShared<B>>,
        config: DriverConfig,
    ) -> Self {
        let update_shared = Arc::clone(&shared);
        let update = std::thread::Builder::new()
            .name("update".to_string())
            .spawn(move || {
                let mut last = Instant::now();
                while !update_shared.quit_requested() {
                    let now = Instant::now();
                    let dt = (now - last).as_secs_f32();
                    last = now;
                    update_frame(&update_shared, dt);
                    std::thread::sleep(config.update_interval);
                }
            })
            .expect("failed to spawn update thread");

        let render_shared = shared;
        let render = std::thread::Builder::new()
            .name("render".to_string())
            .spawn(move || {
                while !render_shared.quit_requested() {
                    if let Err(err) = render_frame(&render_shared) {
                        log::error!("render frame failed: {err}");
                        render_shared.request_quit();
                    }
                }
                // Submitted frames must drain before anyone tears down the
                // resources they reference
                render_shared.gpu.lock().wait_idle();
            })
            .expect("failed to spawn render thread");

        Self {
            update: Some(update),
            render: Some(render),
        }
    }

    /// Wait for both loops to exit
    pub fn join(mut self) {
        if let Some(handle) = self.update.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.render.take() {
            let _ = handle.join();
        }
    }
}
