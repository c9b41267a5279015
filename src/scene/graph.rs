//! Arena-based scene graph
//!
//! Entities live in a flat arena and reference each other by index; ownership
//! is expressed solely by the arena. Parent links are plain back-references,
//! so the graph has no reference cycles to manage.

use crate::backend::{
    BufferDescriptor, BufferHandle, BufferUsage, GpuBackend, GpuResult,
};
use crate::material::MaterialRef;
use crate::mesh::GpuMesh;
use crate::scene::{Behavior, Light, Transform, TransformUniform};
use glam::Mat4;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Index of an entity in the scene arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(u32);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Discriminant for attached component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Mesh,
    Material,
    Light,
}

/// A component attached to an entity. Components are shared: the same
/// instance may be referenced by several entities and by the registry, and
/// lives as long as its longest holder.
#[derive(Clone)]
pub enum Component {
    Mesh(Arc<GpuMesh>),
    Material(MaterialRef),
    Light(Arc<RwLock<Light>>),
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Mesh(_) => ComponentKind::Mesh,
            Component::Material(_) => ComponentKind::Material,
            Component::Light(_) => ComponentKind::Light,
        }
    }
}

/// A named scene node with one transform, one behavior slot, and ordered
/// per-kind component lists
pub struct Entity {
    name: String,
    active: bool,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    transform: Transform,
    transform_buffer: BufferHandle,
    behavior: Option<Box<dyn Behavior>>,
    components: HashMap<ComponentKind, Vec<Component>>,
}

impl Entity {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// GPU uniform buffer holding this entity's resolved world transform
    pub fn transform_buffer(&self) -> BufferHandle {
        self.transform_buffer
    }

    pub fn set_behavior(&mut self, behavior: Box<dyn Behavior>) {
        self.behavior = Some(behavior);
    }

    pub(crate) fn take_behavior(&mut self) -> Option<Box<dyn Behavior>> {
        self.behavior.take()
    }

    pub(crate) fn restore_behavior(&mut self, behavior: Box<dyn Behavior>) {
        // Keep a behavior installed mid-update by the behavior itself
        if self.behavior.is_none() {
            self.behavior = Some(behavior);
        }
    }

    /// Append a component to the per-kind list. An entity may hold several
    /// components of the same kind, e.g. one material per render target.
    pub fn attach(&mut self, component: Component) {
        self.components
            .entry(component.kind())
            .or_default()
            .push(component);
    }

    /// First attached mesh, if any
    pub fn first_mesh(&self) -> Option<Arc<GpuMesh>> {
        self.components
            .get(&ComponentKind::Mesh)
            .and_then(|list| list.first())
            .and_then(|c| match c {
                Component::Mesh(mesh) => Some(Arc::clone(mesh)),
                _ => None,
            })
    }

    /// All attached materials, in attachment order
    pub fn materials(&self) -> Vec<MaterialRef> {
        self.components
            .get(&ComponentKind::Material)
            .map(|list| {
                list.iter()
                    .filter_map(|c| match c {
                        Component::Material(m) => Some(Arc::clone(m)),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All attached lights, in attachment order
    pub fn lights(&self) -> Vec<Arc<RwLock<Light>>> {
        self.components
            .get(&ComponentKind::Light)
            .map(|list| {
                list.iter()
                    .filter_map(|c| match c {
                        Component::Light(l) => Some(Arc::clone(l)),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.get(&kind).is_some_and(|l| !l.is_empty())
    }
}

/// The scene graph arena
#[derive(Default)]
pub struct SceneGraph {
    entities: Vec<Option<Entity>>,
    free: Vec<u32>,
    names: HashMap<String, EntityId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity factory: creates the node with a default transform and its GPU
    /// transform buffer, and registers it under its unique name.
    pub fn spawn(&mut self, gpu: &mut dyn GpuBackend, name: &str) -> GpuResult<EntityId> {
        let transform_buffer = gpu.create_buffer(&BufferDescriptor {
            label: Some(format!("{name} transform")),
            size: std::mem::size_of::<TransformUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;

        let entity = Entity {
            name: name.to_string(),
            active: true,
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            transform_buffer,
            behavior: None,
            components: HashMap::new(),
        };

        let id = match self.free.pop() {
            Some(slot) => {
                self.entities[slot as usize] = Some(entity);
                EntityId(slot)
            }
            None => {
                self.entities.push(Some(entity));
                EntityId(self.entities.len() as u32 - 1)
            }
        };
        if let Some(old) = self.names.insert(name.to_string(), id) {
            log::warn!("entity name {name:?} reused, shadowing {old:?}");
        }
        Ok(id)
    }

    /// Spawn and immediately parent under `parent`
    pub fn spawn_child(
        &mut self,
        gpu: &mut dyn GpuBackend,
        name: &str,
        parent: EntityId,
    ) -> GpuResult<EntityId> {
        let id = self.spawn(gpu, name)?;
        self.set_parent(id, Some(parent));
        Ok(id)
    }

    /// Re-parent an entity; `None` detaches it to the root
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) {
        let old_parent = self.get(child).and_then(|e| e.parent);
        if let Some(old) = old_parent {
            if let Some(entity) = self.get_mut(old) {
                entity.children.retain(|c| *c != child);
            }
        }
        if let Some(entity) = self.get_mut(child) {
            entity.parent = parent;
        }
        if let Some(new) = parent {
            if let Some(entity) = self.get_mut(new) {
                entity.children.push(child);
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index()).and_then(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id.index()).and_then(|e| e.as_mut())
    }

    /// Remove an entity and its subtree, releasing their transform buffers
    pub fn despawn(&mut self, gpu: &mut dyn GpuBackend, id: EntityId) {
        let Some(entity) = self.entities.get_mut(id.index()).and_then(|e| e.take()) else {
            return;
        };
        for child in &entity.children {
            self.despawn(gpu, *child);
        }
        if let Some(parent) = entity.parent {
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        gpu.destroy_buffer(entity.transform_buffer);
        self.names.remove(&entity.name);
        self.free.push(id.0);
    }

    /// All live entity ids, in arena order
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|_| EntityId(i as u32)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World-to-local matrix, recomputed by walking the parent chain on every
    /// query. Composition order: this node's parent-to-local applied after
    /// the parent's world-to-local.
    pub fn world_to_local(&self, id: EntityId) -> Mat4 {
        let Some(entity) = self.get(id) else {
            return Mat4::IDENTITY;
        };
        let local = entity.transform.parent_to_local();
        match entity.parent {
            Some(parent) => local * self.world_to_local(parent),
            None => local,
        }
    }

    /// Local-to-world matrix, inverse of [`Self::world_to_local`]
    pub fn local_to_world(&self, id: EntityId) -> Mat4 {
        self.world_to_local(id).inverse()
    }

    /// Release every entity's GPU resources. Components are shared and are
    /// released by their owning registry.
    pub fn clear(&mut self, gpu: &mut dyn GpuBackend) {
        for entity in self.entities.iter_mut().filter_map(|e| e.take()) {
            gpu.destroy_buffer(entity.transform_buffer);
        }
        self.entities.clear();
        self.free.clear();
        self.names.clear();
    }
}
