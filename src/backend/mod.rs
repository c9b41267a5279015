//! GPU backend abstraction
//!
//! The rendering core talks to exactly one explicit graphics API through the
//! [`GpuBackend`] trait. Window/swapchain ownership lives on the backend side
//! of the seam; this crate only consumes the surface contract the backend
//! exposes.

pub mod headless;
pub mod staging;
pub mod traits;
pub mod types;

pub use headless::HeadlessGpu;
pub use staging::UniformStaging;
pub use traits::*;
pub use types::*;
