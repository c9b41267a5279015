//! Binding-set deduplication cache

use crate::backend::{
    BindingSetHandle, BufferHandle, GpuBackend, GpuResult, SamplerHandle, TextureViewHandle,
};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Accumulates the identities of every buffer/image a binding set would
/// reference into one combined key
pub struct BindingHasher(DefaultHasher);

impl BindingHasher {
    pub fn new() -> Self {
        Self(DefaultHasher::new())
    }

    pub fn buffer(&mut self, buffer: BufferHandle) -> &mut Self {
        buffer.hash(&mut self.0);
        self
    }

    pub fn view(&mut self, view: TextureViewHandle) -> &mut Self {
        view.hash(&mut self.0);
        self
    }

    pub fn sampler(&mut self, sampler: SamplerHandle) -> &mut Self {
        sampler.hash(&mut self.0);
        self
    }

    pub fn finish(&self) -> u64 {
        self.0.finish()
    }
}

impl Default for BindingHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicated binding sets, keyed by the combined resource hash.
///
/// For a fixed key at most one binding set exists at any time; entities whose
/// resources hash identically share the cached set. Entries are never evicted
/// during steady-state rendering and are destroyed en masse when the owning
/// material type is torn down.
pub struct BindingSetCache {
    entries: HashMap<u64, BindingSetHandle>,
    capacity: usize,
}

impl BindingSetCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Return the cached set for `hash`, creating one lazily on first miss.
    /// Repeated calls with the same hash never allocate.
    pub fn get_or_create(
        &mut self,
        hash: u64,
        create: impl FnOnce() -> GpuResult<BindingSetHandle>,
    ) -> GpuResult<BindingSetHandle> {
        if let Some(set) = self.entries.get(&hash) {
            return Ok(*set);
        }
        let set = create()?;
        self.entries.insert(hash, set);
        if self.entries.len() > self.capacity {
            log::warn!(
                "binding-set cache grew past its registered capacity ({} > {})",
                self.entries.len(),
                self.capacity
            );
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity_hint(&self) -> usize {
        self.capacity
    }

    /// Destroy every cached set
    pub fn destroy_all(&mut self, gpu: &mut dyn GpuBackend) {
        for (_, set) in self.entries.drain() {
            gpu.destroy_binding_set(set);
        }
    }
}
