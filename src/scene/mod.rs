//! Scene management: transforms, the entity arena, behaviors, and lights

mod behavior;
mod graph;
mod light;
mod transform;

pub use behavior::*;
pub use graph::*;
pub use light::*;
pub use transform::*;
