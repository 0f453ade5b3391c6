//! Copy of an entity's components, used by duplication and scene copies

use super::{
    BoxCollider2DComponent, CameraComponent, CircleCollider2DComponent, CircleRendererComponent,
    NativeScriptComponent, RigidBody2DComponent, ScriptComponent, SpriteRendererComponent,
    TransformComponent,
};
use crate::ecs::{Component, EcsError, Entity, Registry};

/// Every component of an entity except identity and tag
///
/// Values go through [`Component::duplicate`], so physics and script
/// handles are left behind.
#[derive(Debug, Clone, Default)]
pub struct ComponentBundle {
    transform: Option<TransformComponent>,
    sprite: Option<SpriteRendererComponent>,
    circle: Option<CircleRendererComponent>,
    camera: Option<CameraComponent>,
    native_script: Option<NativeScriptComponent>,
    rigid_body: Option<RigidBody2DComponent>,
    box_collider: Option<BoxCollider2DComponent>,
    circle_collider: Option<CircleCollider2DComponent>,
    script: Option<ScriptComponent>,
}

impl ComponentBundle {
    /// Capture the components of `entity`
    pub fn capture(registry: &Registry, entity: Entity) -> Self {
        Self {
            transform: copy(registry, entity),
            sprite: copy(registry, entity),
            circle: copy(registry, entity),
            camera: copy(registry, entity),
            native_script: copy(registry, entity),
            rigid_body: copy(registry, entity),
            box_collider: copy(registry, entity),
            circle_collider: copy(registry, entity),
            script: copy(registry, entity),
        }
    }

    /// Write the captured components onto `entity`, replacing existing ones
    pub fn apply(self, registry: &mut Registry, entity: Entity) -> Result<(), EcsError> {
        put(registry, entity, self.transform)?;
        put(registry, entity, self.sprite)?;
        put(registry, entity, self.circle)?;
        put(registry, entity, self.camera)?;
        put(registry, entity, self.native_script)?;
        put(registry, entity, self.rigid_body)?;
        put(registry, entity, self.box_collider)?;
        put(registry, entity, self.circle_collider)?;
        put(registry, entity, self.script)?;
        Ok(())
    }
}

fn copy<T: Component>(registry: &Registry, entity: Entity) -> Option<T> {
    registry.get_component::<T>(entity).map(Component::duplicate)
}

fn put<T: Component>(registry: &mut Registry, entity: Entity, value: Option<T>) -> Result<(), EcsError> {
    if let Some(value) = value {
        registry.insert_component(entity, value)?;
    }
    Ok(())
}
