//! Materials: pipeline variants, binding-set deduplication, and the
//! object-safe material contract.
//!
//! Each concrete material type owns one [`MaterialPipelines`] shared by all
//! of its instances. Pipelines are compiled per [`PipelineKey`] (render
//! target, subpass, variant) and binding sets are deduplicated by the hash of
//! the exact resources they bind.

mod binding_cache;
mod key;
mod pipeline_cache;
mod standard;

pub use binding_cache::{BindingHasher, BindingSetCache};
pub use key::PipelineKey;
pub use pipeline_cache::{MaterialPipelines, MaterialTypeDesc};
pub use standard::{MaterialUniform, StandardMaterial};

use crate::backend::{BindingSetHandle, BufferHandle, GpuBackend, GpuResult, UniformStaging};
use crate::mesh::GpuMesh;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Shared reference to a material instance
pub type MaterialRef = Arc<RwLock<dyn Material>>;

/// Shared reference to one material type's pipeline/binding-set caches
pub type SharedPipelines = Arc<Mutex<MaterialPipelines>>;

/// Per-draw resources supplied by the recorder, not owned by the material
#[derive(Debug, Clone, Copy)]
pub struct ResourceSet {
    pub transform_buffer: BufferHandle,
    pub camera_buffer: BufferHandle,
    pub light_buffer: BufferHandle,
}

/// The contract every material instance fulfills.
///
/// Dispatch is dynamic: the recorder walks entities holding `MaterialRef`s
/// and never needs to know the concrete type. Implementations must be cheap
/// to call per frame; anything expensive belongs in the type's shared caches.
pub trait Material: Send + Sync {
    /// The pipeline variant this instance draws with
    fn pipeline_key(&self) -> PipelineKey;

    /// Stage instance parameters for the material's uniform buffer. The
    /// write lands on the device when the next frame's staging slot flushes.
    fn upload_uniforms(&self, staging: &UniformStaging);

    /// Resolve (or lazily create) the deduplicated binding set for this
    /// instance's resources plus the per-draw resources in `resources`
    fn binding_set(
        &self,
        gpu: &mut dyn GpuBackend,
        resources: &ResourceSet,
    ) -> GpuResult<BindingSetHandle>;

    /// Append this instance's draw into the open command list
    fn draw(
        &self,
        gpu: &mut dyn GpuBackend,
        key: PipelineKey,
        binding_set: BindingSetHandle,
        mesh: &GpuMesh,
    ) -> GpuResult<()>;

    /// Release resources owned by this instance. The type's shared caches
    /// are torn down separately.
    fn destroy(&self, gpu: &mut dyn GpuBackend);
}
