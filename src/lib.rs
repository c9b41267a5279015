//! Scene renderer core
//!
//! A retained scene graph rendered through pre-recorded GPU command lists.
//! The main pieces:
//!
//! - [`backend`]: the [`GpuBackend`](backend::GpuBackend) seam over one
//!   explicit graphics API, plus a headless recording backend for tests.
//! - [`scene`]: arena-based scene graph, transforms, lights, behaviors.
//! - [`material`]: pipeline-variant and binding-set caches shared per
//!   material type, and the object-safe [`Material`](material::Material)
//!   contract.
//! - [`perspective`]: render targets paired with cameras, holding the
//!   recorded command lists replayed each frame.
//! - [`registry`]: named resource ownership and ordered teardown.
//! - [`driver`]: the threaded update/render loops.

pub mod backend;
pub mod driver;
pub mod material;
pub mod mesh;
pub mod perspective;
pub mod registry;
pub mod scene;
pub mod texture;

pub use backend::{GpuBackend, GpuError, GpuResult, HeadlessGpu, UniformStaging};
pub use driver::{DriverConfig, EngineShared, FrameDriver};
pub use material::{Material, MaterialRef, PipelineKey, SharedPipelines, StandardMaterial};
pub use mesh::{GpuMesh, MeshData};
pub use perspective::Perspective;
pub use registry::Registry;
pub use scene::{Entity, EntityId, SceneGraph, Transform};
