//! Perspectives: recorded views into the scene
//!
//! A perspective pairs a render target with a camera and holds one recorded
//! command list per presentable surface image. Recording walks the scene
//! once; replaying a frame is a plain submit of the stored lists. The lists
//! stay valid until the scene's draw content or the target's surface changes.

use crate::backend::{
    BufferDescriptor, BufferHandle, BufferUsage, ClearValue, CommandListHandle, GpuBackend,
    GpuError, GpuResult, OffscreenTargetDescriptor, RenderTargetHandle, TextureFormat,
    UniformStaging,
};
use crate::material::{PipelineKey, ResourceSet};
use crate::scene::SceneGraph;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Maximum simultaneous views per perspective (6 covers cube faces)
pub const MAX_VIEWS: usize = 6;

/// One camera view: matrices only, projection policy is the caller's
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveView {
    pub view: Mat4,
    pub proj: Mat4,
}

impl Default for PerspectiveView {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

/// GPU layout of one view slot
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ViewUniform {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
}

/// Camera buffer contents: every view slot plus the active count
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PerspectiveUniform {
    pub views: [ViewUniform; MAX_VIEWS],
    /// x = active view count
    pub view_count: [u32; 4],
}

impl Default for PerspectiveUniform {
    fn default() -> Self {
        Self {
            views: [ViewUniform {
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                view_proj: Mat4::IDENTITY,
            }; MAX_VIEWS],
            view_count: [0; 4],
        }
    }
}

/// A render target plus camera state and the recorded draw lists for it.
///
/// Surface perspectives borrow the backend's presentation target; offscreen
/// perspectives own their target and destroy it on teardown.
pub struct Perspective {
    name: String,
    target: RenderTargetHandle,
    subpass: u32,
    owns_target: bool,
    views: [PerspectiveView; MAX_VIEWS],
    view_count: usize,
    camera_buffer: BufferHandle,
    command_lists: Vec<CommandListHandle>,
    clear: ClearValue,
}

impl Perspective {
    /// Perspective rendering into the backend's presentation surface
    pub fn for_surface(gpu: &mut dyn GpuBackend, name: &str) -> GpuResult<Self> {
        let target = gpu.surface_target().ok_or_else(|| {
            GpuError::RenderTargetCreationFailed("backend has no presentation surface".into())
        })?;
        Self::new(gpu, name, target, false)
    }

    /// Perspective rendering into a fresh offscreen target. `cube` selects a
    /// six-layer target with all six view slots active.
    pub fn offscreen(
        gpu: &mut dyn GpuBackend,
        name: &str,
        width: u32,
        height: u32,
        cube: bool,
    ) -> GpuResult<Self> {
        let target = gpu.create_offscreen_target(&OffscreenTargetDescriptor {
            label: Some(name.to_string()),
            width,
            height,
            layers: if cube { 6 } else { 1 },
            color_format: TextureFormat::Rgba8Unorm,
            with_depth: true,
        })?;
        let mut perspective = Self::new(gpu, name, target, true)?;
        if cube {
            perspective.view_count = MAX_VIEWS;
        }
        Ok(perspective)
    }

    fn new(
        gpu: &mut dyn GpuBackend,
        name: &str,
        target: RenderTargetHandle,
        owns_target: bool,
    ) -> GpuResult<Self> {
        let camera_buffer = gpu.create_buffer(&BufferDescriptor {
            label: Some(format!("{name} camera")),
            size: std::mem::size_of::<PerspectiveUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        Ok(Self {
            name: name.to_string(),
            target,
            subpass: 0,
            owns_target,
            views: [PerspectiveView::default(); MAX_VIEWS],
            view_count: 1,
            camera_buffer,
            command_lists: Vec::new(),
            clear: ClearValue::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> RenderTargetHandle {
        self.target
    }

    pub fn camera_buffer(&self) -> BufferHandle {
        self.camera_buffer
    }

    /// The pipeline key a material must use to be drawn by this perspective
    pub fn key(&self, variant: u32) -> PipelineKey {
        PipelineKey::new(self.target, self.subpass, variant)
    }

    /// Set one view slot's matrices. Slots at or beyond the current active
    /// count extend it. Out-of-range slots are logged and dropped.
    pub fn set_view(&mut self, slot: usize, view: Mat4, proj: Mat4) {
        if slot >= MAX_VIEWS {
            log::error!(
                "perspective {}: view slot {slot} out of range (max {MAX_VIEWS})",
                self.name
            );
            return;
        }
        self.views[slot] = PerspectiveView { view, proj };
        self.view_count = self.view_count.max(slot + 1);
    }

    pub fn view(&self, slot: usize) -> Option<&PerspectiveView> {
        self.views[..self.view_count].get(slot)
    }

    pub fn view_count(&self) -> usize {
        self.view_count
    }

    /// Stage the current view matrices for the camera buffer. Called every
    /// update tick; does not invalidate recorded command lists.
    pub fn upload_camera(&self, staging: &UniformStaging) {
        let mut uniform = PerspectiveUniform {
            view_count: [self.view_count as u32, 0, 0, 0],
            ..Default::default()
        };
        for (slot, view) in self.views[..self.view_count].iter().enumerate() {
            uniform.views[slot] = ViewUniform {
                view: view.view,
                proj: view.proj,
                view_proj: view.proj * view.view,
            };
        }
        staging.write(self.camera_buffer, bytemuck::bytes_of(&uniform));
    }

    /// Record one command list per presentable image of the target.
    ///
    /// Every active entity carrying both a mesh and at least one material is
    /// considered; materials whose pipeline key does not address this target
    /// and subpass are skipped without noise, since entities routinely carry
    /// one material per perspective. An entity with materials but no mesh is
    /// a content error and is logged.
    pub fn record(
        &mut self,
        gpu: &mut dyn GpuBackend,
        scene: &SceneGraph,
        light_buffer: BufferHandle,
        clear: ClearValue,
    ) -> GpuResult<()> {
        self.release_lists(gpu);
        self.clear = clear;

        let (width, height) = gpu.target_extent(self.target);
        let image_count = gpu.surface_image_count(self.target);

        for image in 0..image_count {
            gpu.begin_commands(self.target, image, clear)?;
            gpu.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            gpu.set_scissor(0, 0, width, height);

            for id in scene.ids() {
                let Some(entity) = scene.get(id) else { continue };
                if !entity.is_active() {
                    continue;
                }
                let materials = entity.materials();
                if materials.is_empty() {
                    continue;
                }
                let Some(mesh) = entity.first_mesh() else {
                    log::warn!(
                        "entity {:?} has materials but no mesh, skipping",
                        entity.name()
                    );
                    continue;
                };

                let resources = ResourceSet {
                    transform_buffer: entity.transform_buffer(),
                    camera_buffer: self.camera_buffer,
                    light_buffer,
                };
                for material in &materials {
                    let material = material.read();
                    let key = material.pipeline_key();
                    if !key.matches(self.target, self.subpass) {
                        continue;
                    }
                    let binding_set = material.binding_set(gpu, &resources)?;
                    material.draw(gpu, key, binding_set, &mesh)?;
                }
            }

            let list = gpu.finish_commands()?;
            self.command_lists.push(list);
        }

        log::debug!(
            "perspective {}: recorded {} command list(s), {}x{}",
            self.name,
            self.command_lists.len(),
            width,
            height
        );
        Ok(())
    }

    /// Re-record with the previously supplied clear value. Used after scene
    /// content changes and after surface recreation.
    pub fn re_record(
        &mut self,
        gpu: &mut dyn GpuBackend,
        scene: &SceneGraph,
        light_buffer: BufferHandle,
    ) -> GpuResult<()> {
        let clear = self.clear;
        self.record(gpu, scene, light_buffer, clear)
    }

    /// The recorded list for one surface image, if recording happened
    pub fn command_list_for(&self, image: u32) -> Option<CommandListHandle> {
        self.command_lists.get(image as usize).copied()
    }

    pub fn command_lists(&self) -> &[CommandListHandle] {
        &self.command_lists
    }

    pub fn is_recorded(&self) -> bool {
        !self.command_lists.is_empty()
    }

    /// Drop recorded lists without touching the camera or target
    pub fn invalidate(&mut self, gpu: &mut dyn GpuBackend) {
        self.release_lists(gpu);
    }

    fn release_lists(&mut self, gpu: &mut dyn GpuBackend) {
        for list in self.command_lists.drain(..) {
            gpu.destroy_command_list(list);
        }
    }

    pub fn destroy(&mut self, gpu: &mut dyn GpuBackend) {
        self.release_lists(gpu);
        gpu.destroy_buffer(self.camera_buffer);
        if self.owns_target {
            gpu.destroy_render_target(self.target);
        }
    }
}
