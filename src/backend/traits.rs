//! Core backend abstraction
//!
//! [`GpuBackend`] is the single seam between the rendering core and the
//! concrete graphics API. The design assumes one explicit API with distinct
//! pipeline objects, discrete binding-set objects, and command lists that are
//! recorded once and replayed unchanged every frame.

use crate::backend::types::*;
use std::ops::Range;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("failed to create render target: {0}")]
    RenderTargetCreationFailed(String),
    #[error("failed to compile pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("failed to create binding set: {0}")]
    BindingSetCreationFailed(String),
    #[error("invalid command recording: {0}")]
    RecordingFailed(String),
    #[error("failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("failed to present: {0}")]
    PresentFailed(String),
    #[error("surface out of date")]
    SurfaceOutOfDate,
    #[error("out of memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewHandle(pub(crate) u64);

/// Handle to a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub(crate) u64);

/// Handle to a compiled render pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineHandle(pub(crate) u64);

/// Handle to a binding set (bundled buffer/image bindings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSetHandle(pub(crate) u64);

/// Handle to a binding-set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSetLayoutHandle(pub(crate) u64);

/// Handle to a render-target configuration (surface-presented or offscreen)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub(crate) u64);

/// Handle to a recorded command list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandListHandle(pub(crate) u64);

/// One bound resource inside a binding set
#[derive(Debug, Clone)]
pub enum BindingEntry {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        size: Option<u64>,
    },
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
}

/// Binding-set layout entry
#[derive(Debug, Clone)]
pub struct BindingSetLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    pub ty: BindingType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStageFlags(u32);

impl ShaderStageFlags {
    pub const VERTEX: Self = Self(1 << 0);
    pub const FRAGMENT: Self = Self(1 << 1);
    pub const VERTEX_FRAGMENT: Self = Self((1 << 0) | (1 << 1));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ShaderStageFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Binding type
#[derive(Debug, Clone)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer { read_only: bool },
    Texture,
    Sampler { comparison: bool },
}

/// Render pipeline descriptor.
///
/// A compiled pipeline is bound to one specific render-target configuration
/// and subpass; when the target's surface is recreated, every pipeline
/// compiled against it must be destroyed and recompiled. Shader binaries are
/// referenced by name and must already be loaded by the backend.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub render_target: RenderTargetHandle,
    pub subpass: u32,
    pub vertex_shader: String,
    pub fragment_shader: Option<String>,
    pub vertex_layouts: Vec<VertexBufferLayout>,
    pub binding_layouts: Vec<BindingSetLayoutHandle>,
    pub config: PipelineConfig,
}

/// Offscreen render-target descriptor
#[derive(Debug, Clone)]
pub struct OffscreenTargetDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// 6 for single-pass cube rendering, 1 otherwise
    pub layers: u32,
    pub color_format: TextureFormat,
    pub with_depth: bool,
}

/// Index format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// Main graphics backend trait.
///
/// Command recording is stateful: `begin_commands` opens a list targeting one
/// surface of a render target, the `bind_*`/`draw_*` calls append to it, and
/// `finish_commands` seals it into a replayable [`CommandListHandle`].
pub trait GpuBackend {
    // Buffers

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> GpuResult<BufferHandle>;

    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> GpuResult<BufferHandle>;

    /// Write data into a buffer immediately. Per-frame uniform data must not
    /// go through this while a frame reading the buffer is in flight; the
    /// frame driver stages such writes in
    /// [`UniformStaging`](crate::backend::UniformStaging) and flushes them at
    /// the frame boundary. Direct writes are for setup-time initialization.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    // Textures and samplers

    fn create_texture(&mut self, desc: &TextureDescriptor) -> GpuResult<TextureHandle>;

    fn create_texture_view(&mut self, texture: TextureHandle) -> GpuResult<TextureViewHandle>;

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32);

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> GpuResult<SamplerHandle>;

    // Binding sets

    fn create_binding_set_layout(
        &mut self,
        entries: &[BindingSetLayoutEntry],
    ) -> GpuResult<BindingSetLayoutHandle>;

    fn destroy_binding_set_layout(&mut self, layout: BindingSetLayoutHandle);

    fn create_binding_set(
        &mut self,
        layout: BindingSetLayoutHandle,
        entries: &[(u32, BindingEntry)],
    ) -> GpuResult<BindingSetHandle>;

    fn destroy_binding_set(&mut self, set: BindingSetHandle);

    // Pipelines

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> GpuResult<RenderPipelineHandle>;

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    // Render targets

    /// Create an offscreen render target of the given dimensions
    fn create_offscreen_target(
        &mut self,
        desc: &OffscreenTargetDescriptor,
    ) -> GpuResult<RenderTargetHandle>;

    /// The presentation-surface render target, if the backend owns one
    fn surface_target(&self) -> Option<RenderTargetHandle>;

    /// Number of presentable images for a surface target (1 for offscreen)
    fn surface_image_count(&self, target: RenderTargetHandle) -> u32;

    fn target_extent(&self, target: RenderTargetHandle) -> (u32, u32);

    /// Monotonic counter bumped every time the target's underlying surface
    /// is recreated; pipelines compiled against an older generation are stale
    fn target_generation(&self, target: RenderTargetHandle) -> u64;

    /// Sampleable color view of an offscreen target
    fn target_color_view(&self, target: RenderTargetHandle) -> Option<TextureViewHandle>;

    /// Tear down and recreate swap-dependent resources at the new extent.
    /// Keeps the surface target handle stable and bumps its generation.
    fn recreate_surface(&mut self, width: u32, height: u32) -> GpuResult<()>;

    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    // Command recording

    fn begin_commands(
        &mut self,
        target: RenderTargetHandle,
        surface_index: u32,
        clear: ClearValue,
    ) -> GpuResult<()>;

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32);

    fn set_scissor(&mut self, x: u32, y: u32, width: u32, height: u32);

    fn bind_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn bind_binding_set(&mut self, index: u32, set: BindingSetHandle);

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64);

    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat);

    fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    );

    fn finish_commands(&mut self) -> GpuResult<CommandListHandle>;

    fn destroy_command_list(&mut self, list: CommandListHandle);

    // Frame submission

    /// Block until a presentable surface image is available and return its
    /// index. Fails with [`GpuError::SurfaceOutOfDate`] when the surface
    /// must be recreated before rendering can continue.
    fn acquire_image(&mut self) -> GpuResult<u32>;

    /// Submit pre-recorded command lists for execution, in order
    fn submit(&mut self, lists: &[CommandListHandle]) -> GpuResult<()>;

    fn present(&mut self) -> GpuResult<()>;

    /// Block until all submitted GPU work has completed
    fn wait_idle(&mut self);
}
