//! Per-entity update behaviors

use crate::scene::Entity;

/// A typed per-entity update, run by the update worker once per tick before
/// any uniform uploads. Replaces opaque callback values with a dispatchable
/// capability, same mechanism as the material contract.
pub trait Behavior: Send + Sync {
    fn update(&mut self, entity: &mut Entity, dt: f32);
}

/// Behavior implemented for plain closures, for simple demo-style updates
impl<F> Behavior for F
where
    F: FnMut(&mut Entity, f32) + Send + Sync,
{
    fn update(&mut self, entity: &mut Entity, dt: f32) {
        self(entity, dt)
    }
}
