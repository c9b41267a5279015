//! Headless backend implementation
//!
//! A pure-CPU [`GpuBackend`] that records command streams into inspectable
//! lists instead of talking to a device. It backs the test suite and any
//! offline tooling that needs the recording pipeline without a window.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::ops::Range;

/// One recorded command inside a command list
#[derive(Debug, Clone)]
pub enum RenderCommand {
    SetViewport { x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32 },
    SetScissor { x: u32, y: u32, width: u32, height: u32 },
    BindPipeline(RenderPipelineHandle),
    BindBindingSet { index: u32, set: BindingSetHandle },
    BindVertexBuffer { slot: u32, buffer: BufferHandle, offset: u64 },
    BindIndexBuffer { buffer: BufferHandle, offset: u64, format: IndexFormat },
    DrawIndexed { indices: Range<u32>, base_vertex: i32, instances: Range<u32> },
}

/// A sealed command list
#[derive(Debug, Clone)]
pub struct RecordedList {
    pub target: RenderTargetHandle,
    pub surface_index: u32,
    pub clear: ClearValue,
    pub commands: Vec<RenderCommand>,
}

impl RecordedList {
    /// Number of indexed draws in the list
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawIndexed { .. }))
            .count()
    }

    /// Pipelines bound by the list, in order
    pub fn bound_pipelines(&self) -> Vec<RenderPipelineHandle> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::BindPipeline(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

struct BufferRecord {
    size: u64,
    data: Vec<u8>,
}

struct TargetRecord {
    width: u32,
    height: u32,
    layers: u32,
    image_count: u32,
    generation: u64,
    is_surface: bool,
    color_view: Option<TextureViewHandle>,
}

struct PipelineRecord {
    target: RenderTargetHandle,
    target_generation: u64,
}

struct Recording {
    target: RenderTargetHandle,
    surface_index: u32,
    clear: ClearValue,
    commands: Vec<RenderCommand>,
}

/// In-memory recording backend
pub struct HeadlessGpu {
    buffers: HashMap<u64, BufferRecord>,
    textures: HashMap<u64, TextureDescriptor>,
    texture_views: HashMap<u64, TextureHandle>,
    samplers: HashMap<u64, SamplerDescriptor>,
    layouts: HashMap<u64, Vec<BindingSetLayoutEntry>>,
    binding_sets: HashMap<u64, Vec<(u32, BindingEntry)>>,
    pipelines: HashMap<u64, PipelineRecord>,
    targets: HashMap<u64, TargetRecord>,
    command_lists: HashMap<u64, RecordedList>,

    next_id: u64,
    recording: Option<Recording>,

    surface: RenderTargetHandle,
    acquired: Option<u32>,
    next_image: u32,
    out_of_date: bool,

    submitted: Vec<CommandListHandle>,
    frames_presented: u64,
    pipelines_created: u64,
    binding_sets_created: u64,
    idle_waits: u64,
}

impl HeadlessGpu {
    /// Create a backend with a simulated presentation surface
    pub fn new(width: u32, height: u32, surface_image_count: u32) -> Self {
        let mut gpu = Self {
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
            layouts: HashMap::new(),
            binding_sets: HashMap::new(),
            pipelines: HashMap::new(),
            targets: HashMap::new(),
            command_lists: HashMap::new(),
            next_id: 1,
            recording: None,
            surface: RenderTargetHandle(0),
            acquired: None,
            next_image: 0,
            out_of_date: false,
            submitted: Vec::new(),
            frames_presented: 0,
            pipelines_created: 0,
            binding_sets_created: 0,
            idle_waits: 0,
        };

        let id = gpu.alloc_id();
        gpu.targets.insert(
            id,
            TargetRecord {
                width,
                height,
                layers: 1,
                image_count: surface_image_count.max(1),
                generation: 0,
                is_surface: true,
                color_view: None,
            },
        );
        gpu.surface = RenderTargetHandle(id);
        gpu
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // Test and inspection hooks

    /// Make the next acquire or present fail with `SurfaceOutOfDate` once
    pub fn force_surface_out_of_date(&mut self) {
        self.out_of_date = true;
    }

    pub fn command_list(&self, list: CommandListHandle) -> Option<&RecordedList> {
        self.command_lists.get(&list.0)
    }

    pub fn live_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    pub fn live_binding_sets(&self) -> usize {
        self.binding_sets.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn pipelines_created(&self) -> u64 {
        self.pipelines_created
    }

    pub fn binding_sets_created(&self) -> u64 {
        self.binding_sets_created
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.data.as_slice())
    }

    /// Command lists submitted since the last call, oldest first
    pub fn take_submitted(&mut self) -> Vec<CommandListHandle> {
        std::mem::take(&mut self.submitted)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn idle_waits(&self) -> u64 {
        self.idle_waits
    }

    /// Layer count of a render target (6 for cube targets)
    pub fn target_layers(&self, target: RenderTargetHandle) -> u32 {
        self.targets.get(&target.0).map_or(0, |t| t.layers)
    }
}

impl GpuBackend for HeadlessGpu {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> GpuResult<BufferHandle> {
        if desc.size == 0 {
            return Err(GpuError::BufferCreationFailed("zero-sized buffer".into()));
        }
        let id = self.alloc_id();
        self.buffers.insert(
            id,
            BufferRecord {
                size: desc.size,
                data: vec![0; desc.size as usize],
            },
        );
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> GpuResult<BufferHandle> {
        let handle = self.create_buffer(desc)?;
        self.write_buffer(handle, 0, data);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(record) = self.buffers.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = (start + data.len()).min(record.size as usize);
            if start < end {
                record.data[start..end].copy_from_slice(&data[..end - start]);
            }
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> GpuResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::TextureCreationFailed("zero-sized texture".into()));
        }
        let id = self.alloc_id();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> GpuResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture.0) {
            return Err(GpuError::TextureCreationFailed("unknown texture".into()));
        }
        let id = self.alloc_id();
        self.texture_views.insert(id, texture);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, _texture: TextureHandle, _data: &[u8], _width: u32, _height: u32) {}

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.texture_views.retain(|_, t| *t != texture);
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> GpuResult<SamplerHandle> {
        let id = self.alloc_id();
        self.samplers.insert(id, desc.clone());
        Ok(SamplerHandle(id))
    }

    fn create_binding_set_layout(
        &mut self,
        entries: &[BindingSetLayoutEntry],
    ) -> GpuResult<BindingSetLayoutHandle> {
        let id = self.alloc_id();
        self.layouts.insert(id, entries.to_vec());
        Ok(BindingSetLayoutHandle(id))
    }

    fn destroy_binding_set_layout(&mut self, layout: BindingSetLayoutHandle) {
        self.layouts.remove(&layout.0);
    }

    fn create_binding_set(
        &mut self,
        layout: BindingSetLayoutHandle,
        entries: &[(u32, BindingEntry)],
    ) -> GpuResult<BindingSetHandle> {
        let expected = self
            .layouts
            .get(&layout.0)
            .ok_or_else(|| GpuError::BindingSetCreationFailed("unknown layout".into()))?;
        if expected.len() != entries.len() {
            return Err(GpuError::BindingSetCreationFailed(format!(
                "layout expects {} bindings, got {}",
                expected.len(),
                entries.len()
            )));
        }
        let id = self.alloc_id();
        self.binding_sets.insert(id, entries.to_vec());
        self.binding_sets_created += 1;
        Ok(BindingSetHandle(id))
    }

    fn destroy_binding_set(&mut self, set: BindingSetHandle) {
        self.binding_sets.remove(&set.0);
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> GpuResult<RenderPipelineHandle> {
        let target = self
            .targets
            .get(&desc.render_target.0)
            .ok_or_else(|| GpuError::PipelineCreationFailed("unknown render target".into()))?;
        if desc.vertex_shader.is_empty() {
            return Err(GpuError::PipelineCreationFailed("missing vertex shader".into()));
        }
        let generation = target.generation;
        let id = self.alloc_id();
        self.pipelines.insert(
            id,
            PipelineRecord {
                target: desc.render_target,
                target_generation: generation,
            },
        );
        self.pipelines_created += 1;
        Ok(RenderPipelineHandle(id))
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.pipelines.remove(&pipeline.0);
    }

    fn create_offscreen_target(
        &mut self,
        desc: &OffscreenTargetDescriptor,
    ) -> GpuResult<RenderTargetHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::RenderTargetCreationFailed(
                "zero-sized render target".into(),
            ));
        }
        let color = self.create_texture(&TextureDescriptor {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            mip_levels: 1,
            dimension: if desc.layers == 6 {
                TextureDimension::Cube
            } else {
                TextureDimension::D2
            },
            format: desc.color_format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?;
        let view = self.create_texture_view(color)?;
        let id = self.alloc_id();
        self.targets.insert(
            id,
            TargetRecord {
                width: desc.width,
                height: desc.height,
                layers: desc.layers,
                image_count: 1,
                generation: 0,
                is_surface: false,
                color_view: Some(view),
            },
        );
        Ok(RenderTargetHandle(id))
    }

    fn surface_target(&self) -> Option<RenderTargetHandle> {
        Some(self.surface)
    }

    fn surface_image_count(&self, target: RenderTargetHandle) -> u32 {
        self.targets.get(&target.0).map_or(0, |t| t.image_count)
    }

    fn target_extent(&self, target: RenderTargetHandle) -> (u32, u32) {
        self.targets
            .get(&target.0)
            .map_or((0, 0), |t| (t.width, t.height))
    }

    fn target_generation(&self, target: RenderTargetHandle) -> u64 {
        self.targets.get(&target.0).map_or(0, |t| t.generation)
    }

    fn target_color_view(&self, target: RenderTargetHandle) -> Option<TextureViewHandle> {
        self.targets.get(&target.0).and_then(|t| t.color_view)
    }

    fn recreate_surface(&mut self, width: u32, height: u32) -> GpuResult<()> {
        let record = self
            .targets
            .get_mut(&self.surface.0)
            .ok_or_else(|| GpuError::SurfaceCreationFailed("no surface target".into()))?;
        record.width = width.max(1);
        record.height = height.max(1);
        record.generation += 1;
        self.out_of_date = false;
        self.acquired = None;
        Ok(())
    }

    // The surface target lives as long as the backend
    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        if self.targets.get(&target.0).is_some_and(|t| !t.is_surface) {
            self.targets.remove(&target.0);
        }
    }

    fn begin_commands(
        &mut self,
        target: RenderTargetHandle,
        surface_index: u32,
        clear: ClearValue,
    ) -> GpuResult<()> {
        if self.recording.is_some() {
            return Err(GpuError::RecordingFailed(
                "previous command list not finished".into(),
            ));
        }
        let record = self
            .targets
            .get(&target.0)
            .ok_or_else(|| GpuError::RecordingFailed("unknown render target".into()))?;
        if surface_index >= record.image_count {
            return Err(GpuError::RecordingFailed(format!(
                "surface index {} out of range ({} images)",
                surface_index, record.image_count
            )));
        }
        self.recording = Some(Recording {
            target,
            surface_index,
            clear,
            commands: Vec::new(),
        });
        Ok(())
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32) {
        if let Some(rec) = self.recording.as_mut() {
            rec.commands.push(RenderCommand::SetViewport {
                x,
                y,
                width,
                height,
                min_depth,
                max_depth,
            });
        }
    }

    fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32) {
        if let Some(rec) = self.recording.as_mut() {
            rec.commands.push(RenderCommand::SetScissor { x, y, width, height });
        }
    }

    fn bind_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        if let Some(rec) = self.recording.as_mut() {
            rec.commands.push(RenderCommand::BindPipeline(pipeline));
        }
    }

    fn bind_binding_set(&mut self, index: u32, set: BindingSetHandle) {
        if let Some(rec) = self.recording.as_mut() {
            rec.commands.push(RenderCommand::BindBindingSet { index, set });
        }
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        if let Some(rec) = self.recording.as_mut() {
            rec.commands
                .push(RenderCommand::BindVertexBuffer { slot, buffer, offset });
        }
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        if let Some(rec) = self.recording.as_mut() {
            rec.commands
                .push(RenderCommand::BindIndexBuffer { buffer, offset, format });
        }
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        if let Some(rec) = self.recording.as_mut() {
            rec.commands.push(RenderCommand::DrawIndexed {
                indices,
                base_vertex,
                instances,
            });
        }
    }

    fn finish_commands(&mut self) -> GpuResult<CommandListHandle> {
        let rec = self
            .recording
            .take()
            .ok_or_else(|| GpuError::RecordingFailed("no command list in progress".into()))?;
        let id = self.alloc_id();
        self.command_lists.insert(
            id,
            RecordedList {
                target: rec.target,
                surface_index: rec.surface_index,
                clear: rec.clear,
                commands: rec.commands,
            },
        );
        Ok(CommandListHandle(id))
    }

    fn destroy_command_list(&mut self, list: CommandListHandle) {
        self.command_lists.remove(&list.0);
    }

    fn acquire_image(&mut self) -> GpuResult<u32> {
        if self.out_of_date {
            return Err(GpuError::SurfaceOutOfDate);
        }
        let count = self.surface_image_count(self.surface);
        let image = self.next_image % count;
        self.next_image = (self.next_image + 1) % count;
        self.acquired = Some(image);
        Ok(image)
    }

    fn submit(&mut self, lists: &[CommandListHandle]) -> GpuResult<()> {
        for list in lists {
            // Submitting a list recorded against a stale surface generation is
            // a programming error in the resize-recovery flow
            let record = self
                .command_lists
                .get(&list.0)
                .ok_or_else(|| GpuError::RecordingFailed("unknown command list".into()))?;
            for command in &record.commands {
                if let RenderCommand::BindPipeline(p) = command {
                    let pipeline = self.pipelines.get(&p.0).ok_or_else(|| {
                        GpuError::RecordingFailed("command list references destroyed pipeline".into())
                    })?;
                    if pipeline.target != record.target {
                        return Err(GpuError::RecordingFailed(
                            "pipeline compiled for a different render target".into(),
                        ));
                    }
                    let current = self.target_generation(pipeline.target);
                    if pipeline.target_generation != current {
                        return Err(GpuError::RecordingFailed(
                            "pipeline compiled against stale surface generation".into(),
                        ));
                    }
                }
            }
        }
        self.submitted.extend_from_slice(lists);
        Ok(())
    }

    fn present(&mut self) -> GpuResult<()> {
        if self.out_of_date {
            return Err(GpuError::SurfaceOutOfDate);
        }
        if self.acquired.take().is_none() {
            return Err(GpuError::PresentFailed("no acquired image".into()));
        }
        self.frames_presented += 1;
        Ok(())
    }

    fn wait_idle(&mut self) {
        self.idle_waits += 1;
    }
}
