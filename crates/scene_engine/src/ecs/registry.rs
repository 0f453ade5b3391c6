//! Component store
//!
//! Each component kind lives in its own [`SecondaryMap`] keyed by entity,
//! and the registry keeps one such container per `TypeId`. The containers are
//! type-erased only behind [`ErasedStorage`]; every public accessor is generic
//! over the concrete component type.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use slotmap::{SecondaryMap, SlotMap};
use thiserror::Error;

use super::{Component, Entity, Query};

/// Errors raised by the component store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity handle is stale or null
    #[error("Entity {0:?} does not exist")]
    NoSuchEntity(Entity),

    /// The entity already owns a component of this kind
    #[error("Entity {entity:?} already has a {component} component")]
    ComponentAlreadyPresent {
        /// Entity the add was attempted on
        entity: Entity,
        /// Component type name
        component: &'static str,
    },

    /// The component kind cannot be added or removed this way
    #[error("Component {0} cannot be changed through this call")]
    Unsupported(String),
}

trait ErasedStorage {
    fn remove(&mut self, entity: Entity) -> bool;
    fn contains(&self, entity: Entity) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct ComponentStorage<T: Component> {
    components: SecondaryMap<Entity, T>,
}

impl<T: Component> ErasedStorage for ComponentStorage<T> {
    fn remove(&mut self, entity: Entity) -> bool {
        self.components.remove(entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        self.components.contains_key(entity)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Sparse mapping from entity to heterogeneous component records
#[derive(Default)]
pub struct Registry {
    entities: SlotMap<Entity, ()>,
    storages: HashMap<TypeId, Box<dyn ErasedStorage>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity with no components
    pub fn create(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Remove an entity and every component attached to it
    ///
    /// Returns `false` if the entity was already gone.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity).is_none() {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove(entity);
        }
        true
    }

    /// Whether the entity is alive
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry holds no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate live entities in slot order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    /// Attach a component; fails if the entity already has one of this kind
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<&mut T, EcsError> {
        if !self.contains(entity) {
            return Err(EcsError::NoSuchEntity(entity));
        }
        let storage = self.storage_mut_or_insert::<T>();
        if storage.components.contains_key(entity) {
            return Err(EcsError::ComponentAlreadyPresent {
                entity,
                component: std::any::type_name::<T>(),
            });
        }
        storage.components.insert(entity, component);
        storage.components.get_mut(entity).ok_or(EcsError::NoSuchEntity(entity))
    }

    /// Attach a component, replacing any existing one of the same kind
    pub fn insert_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<Option<T>, EcsError> {
        if !self.contains(entity) {
            return Err(EcsError::NoSuchEntity(entity));
        }
        Ok(self.storage_mut_or_insert::<T>().components.insert(entity, component))
    }

    /// Look up a component, tolerating its absence
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.components.get(entity)
    }

    /// Look up a component mutably, tolerating its absence
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.components.get_mut(entity)
    }

    /// Direct getter for a component the caller knows is present
    ///
    /// Asking for a missing component is a contract violation: it asserts in
    /// debug builds and yields `None` in release builds.
    pub fn component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let found = self.get_component::<T>(entity);
        debug_assert!(found.is_some(), "entity {entity:?} has no {}", std::any::type_name::<T>());
        found
    }

    /// Mutable direct getter, see [`Registry::component`]
    pub fn component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let found = self.get_component_mut::<T>(entity);
        debug_assert!(found.is_some(), "entity {entity:?} has no {}", std::any::type_name::<T>());
        found
    }

    /// Whether the entity owns a component of this kind
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.storages
            .get(&TypeId::of::<T>())
            .is_some_and(|storage| storage.contains(entity))
    }

    /// Detach and return a component
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storage_mut::<T>()?.components.remove(entity)
    }

    /// Entities owning every component in `Q`
    ///
    /// The list is a snapshot, so the registry may be mutated while walking it.
    pub fn view<Q: Query>(&self) -> Vec<Entity> {
        self.entities
            .keys()
            .filter(|&entity| Q::matches(self, entity))
            .collect()
    }

    /// Visit every entity owning the components in `Q`
    pub fn each<Q: Query>(&self, mut f: impl FnMut(Entity, Q::Item<'_>)) {
        for entity in self.entities.keys() {
            if let Some(item) = Q::fetch(self, entity) {
                f(entity, item);
            }
        }
    }

    /// Visit every component of one kind mutably
    pub fn each_mut<T: Component>(&mut self, mut f: impl FnMut(Entity, &mut T)) {
        if let Some(storage) = self.storage_mut::<T>() {
            for (entity, component) in &mut storage.components {
                f(entity, component);
            }
        }
    }

    fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any().downcast_ref::<ComponentStorage<T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<ComponentStorage<T>>())
    }

    fn storage_mut_or_insert<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentStorage::<T> { components: SecondaryMap::new() }));
        // The entry for TypeId::of::<T>() only ever holds ComponentStorage<T>.
        match storage.as_any_mut().downcast_mut::<ComponentStorage<T>>() {
            Some(storage) => storage,
            None => unreachable!("component storage registered under the wrong type"),
        }
    }
}
