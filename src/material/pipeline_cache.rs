//! Per-material-type pipeline and binding-set cache

use crate::backend::{
    BindingSetLayoutEntry, BindingSetLayoutHandle, GpuBackend, GpuError, GpuResult, PipelineConfig,
    RenderPipelineDescriptor, RenderPipelineHandle, RenderTargetHandle, VertexBufferLayout,
};
use crate::material::{BindingSetCache, PipelineKey};
use std::collections::HashMap;

/// Static description of one concrete material type: its shader stage
/// binaries (by name, already compiled), fixed vertex-input layout, and
/// fixed binding-set layout.
#[derive(Debug, Clone)]
pub struct MaterialTypeDesc {
    pub name: &'static str,
    pub vertex_shader: &'static str,
    pub fragment_shader: &'static str,
    pub vertex_layout: VertexBufferLayout,
    pub binding_layout: Vec<BindingSetLayoutEntry>,
}

/// The shared cache state owned by one concrete material type.
///
/// All instances of the type reference the same `MaterialPipelines` through
/// an `Arc<Mutex<_>>`; its lifetime is the rendering session, not any one
/// instance. Destroying an instance leaves these caches untouched.
pub struct MaterialPipelines {
    desc: MaterialTypeDesc,
    layout: Option<BindingSetLayoutHandle>,
    targets: Vec<RenderTargetHandle>,
    pipelines: HashMap<PipelineKey, RenderPipelineHandle>,
    binding_sets: BindingSetCache,
}

impl MaterialPipelines {
    pub fn new(desc: MaterialTypeDesc) -> Self {
        Self {
            desc,
            layout: None,
            targets: Vec::new(),
            pipelines: HashMap::new(),
            binding_sets: BindingSetCache::with_capacity(0),
        }
    }

    /// Register binding-set storage capacity, build the type's binding-set
    /// layout, and compile one pipeline per registered config whose render
    /// target is in `targets`. Configs addressing other targets belong to
    /// other material types and are left alone.
    ///
    /// Compilation failure is fatal: the error propagates and the caches stay
    /// unusable. Callers must register every [`PipelineConfig`] they care
    /// about before initializing, or fewer variants compile than expected.
    pub fn initialize(
        &mut self,
        gpu: &mut dyn GpuBackend,
        configs: &HashMap<PipelineKey, PipelineConfig>,
        targets: &[RenderTargetHandle],
        capacity: usize,
    ) -> GpuResult<()> {
        self.binding_sets = BindingSetCache::with_capacity(capacity);
        self.targets = targets.to_vec();
        self.layout = Some(gpu.create_binding_set_layout(&self.desc.binding_layout)?);
        self.compile_all(gpu, configs)?;
        log::info!(
            "material type {}: compiled {} pipeline variant(s)",
            self.desc.name,
            self.pipelines.len()
        );
        Ok(())
    }

    /// Destroy every compiled pipeline for this type and recompile against
    /// the current render-target configurations. Required whenever a render
    /// target's surface is recreated, since pipelines are bound to a specific
    /// surface generation.
    pub fn refresh_pipelines(
        &mut self,
        gpu: &mut dyn GpuBackend,
        configs: &HashMap<PipelineKey, PipelineConfig>,
    ) -> GpuResult<()> {
        for (_, pipeline) in self.pipelines.drain() {
            gpu.destroy_render_pipeline(pipeline);
        }
        self.compile_all(gpu, configs)
    }

    fn compile_all(
        &mut self,
        gpu: &mut dyn GpuBackend,
        configs: &HashMap<PipelineKey, PipelineConfig>,
    ) -> GpuResult<()> {
        let layout = self
            .layout
            .ok_or_else(|| GpuError::PipelineCreationFailed("type not initialized".into()))?;
        for (key, config) in configs
            .iter()
            .filter(|(key, _)| self.targets.contains(&key.render_target))
        {
            let pipeline = gpu.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(format!(
                    "{} target={} subpass={} variant={}",
                    self.desc.name,
                    key.render_target.0,
                    key.subpass,
                    key.variant
                )),
                render_target: key.render_target,
                subpass: key.subpass,
                vertex_shader: self.desc.vertex_shader.to_string(),
                fragment_shader: Some(self.desc.fragment_shader.to_string()),
                vertex_layouts: vec![self.desc.vertex_layout.clone()],
                binding_layouts: vec![layout],
                config: *config,
            })?;
            self.pipelines.insert(*key, pipeline);
        }
        Ok(())
    }

    /// Compiled pipeline for a key. `None` means the caller requested a key
    /// whose config was never registered, which is a setup bug.
    pub fn pipeline(&self, key: PipelineKey) -> Option<RenderPipelineHandle> {
        self.pipelines.get(&key).copied()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn layout(&self) -> Option<BindingSetLayoutHandle> {
        self.layout
    }

    pub fn binding_sets(&self) -> &BindingSetCache {
        &self.binding_sets
    }

    pub fn binding_sets_mut(&mut self) -> &mut BindingSetCache {
        &mut self.binding_sets
    }

    pub fn type_name(&self) -> &'static str {
        self.desc.name
    }

    /// Release pipelines, cached binding sets, and the layout. Must run once
    /// per type, after all instances are dropped and before device teardown.
    pub fn destroy(&mut self, gpu: &mut dyn GpuBackend) {
        for (_, pipeline) in self.pipelines.drain() {
            gpu.destroy_render_pipeline(pipeline);
        }
        self.binding_sets.destroy_all(gpu);
        if let Some(layout) = self.layout.take() {
            gpu.destroy_binding_set_layout(layout);
        }
    }
}
