//! Entity handles
//!
//! An entity plus a borrow of the scene that owns it. Handles are only ever
//! produced for live entities.

use super::{Scene, SceneError};
use crate::ecs::components::{TagComponent, TransformComponent, Uuid};
use crate::ecs::{Component, Entity};

/// Read-only handle
#[derive(Clone, Copy)]
pub struct EntityRef<'a> {
    scene: &'a Scene,
    entity: Entity,
}

impl<'a> EntityRef<'a> {
    pub(crate) fn new(scene: &'a Scene, entity: Entity) -> Self {
        Self { scene, entity }
    }

    /// Underlying entity
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Stable id
    pub fn uuid(&self) -> Uuid {
        self.scene.uuid_of(self.entity).unwrap_or(Uuid::NIL)
    }

    /// Display name
    pub fn tag(&self) -> &'a str {
        self.scene
            .get_component::<TagComponent>(self.entity)
            .map_or("", |tag| tag.tag.as_str())
    }

    /// Transform
    pub fn transform(&self) -> Option<&'a TransformComponent> {
        self.scene.get_component::<TransformComponent>(self.entity)
    }

    /// Whether the entity owns a `T`
    pub fn has<T: Component>(&self) -> bool {
        self.scene.has_component::<T>(self.entity)
    }

    /// Component lookup tolerating absence
    pub fn get<T: Component>(&self) -> Option<&'a T> {
        self.scene.get_component::<T>(self.entity)
    }

    /// Direct getter; a missing component asserts in debug builds
    pub fn component<T: Component>(&self) -> Option<&'a T> {
        self.scene.component::<T>(self.entity)
    }
}

/// Mutable handle
pub struct EntityMut<'a> {
    scene: &'a mut Scene,
    entity: Entity,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(scene: &'a mut Scene, entity: Entity) -> Self {
        Self { scene, entity }
    }

    /// Underlying entity
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Stable id
    pub fn uuid(&self) -> Uuid {
        self.scene.uuid_of(self.entity).unwrap_or(Uuid::NIL)
    }

    /// Reborrow as a read-only handle
    pub fn as_entity_ref(&self) -> EntityRef<'_> {
        EntityRef::new(self.scene, self.entity)
    }

    /// Builder pattern: Attach a component
    pub fn with<T: Component>(self, component: T) -> Result<Self, SceneError> {
        self.scene.add_component(self.entity, component)?;
        Ok(self)
    }

    /// Attach a component; fails if one of this kind is present
    pub fn add<T: Component>(&mut self, component: T) -> Result<&mut T, SceneError> {
        self.scene.add_component(self.entity, component)
    }

    /// Whether the entity owns a `T`
    pub fn has<T: Component>(&self) -> bool {
        self.scene.has_component::<T>(self.entity)
    }

    /// Component lookup tolerating absence
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.scene.get_component::<T>(self.entity)
    }

    /// Mutable component lookup tolerating absence
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.scene.get_component_mut::<T>(self.entity)
    }

    /// Detach a component
    pub fn remove<T: Component>(&mut self) -> Result<Option<T>, SceneError> {
        self.scene.remove_component::<T>(self.entity)
    }

    /// Rename
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        if let Some(component) = self.scene.get_component_mut::<TagComponent>(self.entity) {
            component.tag = tag.into();
        }
    }

    /// Transform, mutably
    pub fn transform_mut(&mut self) -> Option<&mut TransformComponent> {
        self.scene.get_component_mut::<TransformComponent>(self.entity)
    }

    /// Destroy the entity, consuming the handle
    pub fn destroy(self) -> Result<(), SceneError> {
        self.scene.destroy_entity(self.entity)
    }
}
