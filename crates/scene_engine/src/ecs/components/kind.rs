//! Component kinds addressed by name
//!
//! Editors and scripts refer to components by kind rather than by Rust type.
//! Identity and tag are absent on purpose: they are fixed for an entity's
//! whole life.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use super::{
    BoxCollider2DComponent, CameraComponent, CircleCollider2DComponent, CircleRendererComponent,
    NativeScriptComponent, RigidBody2DComponent, ScriptComponent, SpriteRendererComponent,
    TransformComponent,
};
use crate::ecs::{Component, EcsError, Entity, Registry};

/// Optional component kinds plus the always-present transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    /// [`TransformComponent`]
    Transform,
    /// [`SpriteRendererComponent`]
    SpriteRenderer,
    /// [`CircleRendererComponent`]
    CircleRenderer,
    /// [`CameraComponent`]
    Camera,
    /// [`RigidBody2DComponent`]
    RigidBody2D,
    /// [`BoxCollider2DComponent`]
    BoxCollider2D,
    /// [`CircleCollider2DComponent`]
    CircleCollider2D,
    /// [`ScriptComponent`]
    Script,
    /// [`NativeScriptComponent`]
    NativeScript,
}

bitflags! {
    /// Set of component kinds present on an entity
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ComponentMask: u16 {
        /// Transform
        const TRANSFORM = 1 << 0;
        /// Sprite renderer
        const SPRITE_RENDERER = 1 << 1;
        /// Circle renderer
        const CIRCLE_RENDERER = 1 << 2;
        /// Camera
        const CAMERA = 1 << 3;
        /// Rigid body
        const RIGID_BODY_2D = 1 << 4;
        /// Box collider
        const BOX_COLLIDER_2D = 1 << 5;
        /// Circle collider
        const CIRCLE_COLLIDER_2D = 1 << 6;
        /// Script
        const SCRIPT = 1 << 7;
        /// Native script
        const NATIVE_SCRIPT = 1 << 8;
    }
}

impl ComponentKind {
    /// Every kind, in declaration order
    pub const ALL: [Self; 9] = [
        Self::Transform,
        Self::SpriteRenderer,
        Self::CircleRenderer,
        Self::Camera,
        Self::RigidBody2D,
        Self::BoxCollider2D,
        Self::CircleCollider2D,
        Self::Script,
        Self::NativeScript,
    ];

    /// Canonical name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transform => "Transform",
            Self::SpriteRenderer => "SpriteRenderer",
            Self::CircleRenderer => "CircleRenderer",
            Self::Camera => "Camera",
            Self::RigidBody2D => "RigidBody2D",
            Self::BoxCollider2D => "BoxCollider2D",
            Self::CircleCollider2D => "CircleCollider2D",
            Self::Script => "Script",
            Self::NativeScript => "NativeScript",
        }
    }

    /// Bit for this kind
    pub const fn mask(self) -> ComponentMask {
        match self {
            Self::Transform => ComponentMask::TRANSFORM,
            Self::SpriteRenderer => ComponentMask::SPRITE_RENDERER,
            Self::CircleRenderer => ComponentMask::CIRCLE_RENDERER,
            Self::Camera => ComponentMask::CAMERA,
            Self::RigidBody2D => ComponentMask::RIGID_BODY_2D,
            Self::BoxCollider2D => ComponentMask::BOX_COLLIDER_2D,
            Self::CircleCollider2D => ComponentMask::CIRCLE_COLLIDER_2D,
            Self::Script => ComponentMask::SCRIPT,
            Self::NativeScript => ComponentMask::NATIVE_SCRIPT,
        }
    }

    /// Kind of a component type, if it is addressable by kind
    pub fn of<T: Component>() -> Option<Self> {
        use std::any::TypeId;
        let id = TypeId::of::<T>();
        Self::ALL.into_iter().find(|kind| kind.component_type_id() == id)
    }

    fn component_type_id(self) -> std::any::TypeId {
        use std::any::TypeId;
        match self {
            Self::Transform => TypeId::of::<TransformComponent>(),
            Self::SpriteRenderer => TypeId::of::<SpriteRendererComponent>(),
            Self::CircleRenderer => TypeId::of::<CircleRendererComponent>(),
            Self::Camera => TypeId::of::<CameraComponent>(),
            Self::RigidBody2D => TypeId::of::<RigidBody2DComponent>(),
            Self::BoxCollider2D => TypeId::of::<BoxCollider2DComponent>(),
            Self::CircleCollider2D => TypeId::of::<CircleCollider2DComponent>(),
            Self::Script => TypeId::of::<ScriptComponent>(),
            Self::NativeScript => TypeId::of::<NativeScriptComponent>(),
        }
    }

    /// Whether the entity owns a component of this kind
    pub fn is_present(self, registry: &Registry, entity: Entity) -> bool {
        match self {
            Self::Transform => registry.has_component::<TransformComponent>(entity),
            Self::SpriteRenderer => registry.has_component::<SpriteRendererComponent>(entity),
            Self::CircleRenderer => registry.has_component::<CircleRendererComponent>(entity),
            Self::Camera => registry.has_component::<CameraComponent>(entity),
            Self::RigidBody2D => registry.has_component::<RigidBody2DComponent>(entity),
            Self::BoxCollider2D => registry.has_component::<BoxCollider2DComponent>(entity),
            Self::CircleCollider2D => registry.has_component::<CircleCollider2DComponent>(entity),
            Self::Script => registry.has_component::<ScriptComponent>(entity),
            Self::NativeScript => registry.has_component::<NativeScriptComponent>(entity),
        }
    }

    /// Attach a default-constructed component of this kind
    ///
    /// Transform is always present and native scripts need a factory, so both
    /// are rejected.
    pub fn add_default(self, registry: &mut Registry, entity: Entity) -> Result<(), EcsError> {
        match self {
            Self::Transform | Self::NativeScript => Err(EcsError::Unsupported(self.to_string())),
            Self::SpriteRenderer => add(registry, entity, SpriteRendererComponent::default()),
            Self::CircleRenderer => add(registry, entity, CircleRendererComponent::default()),
            Self::Camera => add(registry, entity, CameraComponent::default()),
            Self::RigidBody2D => add(registry, entity, RigidBody2DComponent::default()),
            Self::BoxCollider2D => add(registry, entity, BoxCollider2DComponent::default()),
            Self::CircleCollider2D => add(registry, entity, CircleCollider2DComponent::default()),
            Self::Script => add(registry, entity, ScriptComponent::default()),
        }
    }

    /// Detach the component of this kind, returning whether one was present
    ///
    /// Physics teardown is the caller's job; see `Scene::remove_component_by_kind`.
    pub fn remove(self, registry: &mut Registry, entity: Entity) -> Result<bool, EcsError> {
        let removed = match self {
            Self::Transform => return Err(EcsError::Unsupported(self.to_string())),
            Self::SpriteRenderer => registry.remove_component::<SpriteRendererComponent>(entity).is_some(),
            Self::CircleRenderer => registry.remove_component::<CircleRendererComponent>(entity).is_some(),
            Self::Camera => registry.remove_component::<CameraComponent>(entity).is_some(),
            Self::RigidBody2D => registry.remove_component::<RigidBody2DComponent>(entity).is_some(),
            Self::BoxCollider2D => registry.remove_component::<BoxCollider2DComponent>(entity).is_some(),
            Self::CircleCollider2D => registry.remove_component::<CircleCollider2DComponent>(entity).is_some(),
            Self::Script => registry.remove_component::<ScriptComponent>(entity).is_some(),
            Self::NativeScript => registry.remove_component::<NativeScriptComponent>(entity).is_some(),
        };
        Ok(removed)
    }

    /// Kinds present on an entity
    pub fn mask_of(registry: &Registry, entity: Entity) -> ComponentMask {
        Self::ALL
            .into_iter()
            .filter(|kind| kind.is_present(registry, entity))
            .fold(ComponentMask::empty(), |mask, kind| mask | kind.mask())
    }
}

fn add<T: Component>(registry: &mut Registry, entity: Entity, component: T) -> Result<(), EcsError> {
    registry.add_component(entity, component).map(|_| ())
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = EcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_end_matches("Component");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EcsError::Unsupported(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_suffix_and_case() {
        assert_eq!("RigidBody2D".parse::<ComponentKind>().unwrap(), ComponentKind::RigidBody2D);
        assert_eq!("boxcollider2dComponent".parse::<ComponentKind>().unwrap(), ComponentKind::BoxCollider2D);
        assert!("Identity".parse::<ComponentKind>().is_err());
    }

    #[test]
    fn test_of_maps_types_to_kinds() {
        assert_eq!(ComponentKind::of::<ScriptComponent>(), Some(ComponentKind::Script));
        assert_eq!(ComponentKind::of::<super::super::TagComponent>(), None);
    }

    #[test]
    fn test_add_remove_by_kind() {
        let mut registry = Registry::new();
        let entity = registry.create();

        ComponentKind::RigidBody2D.add_default(&mut registry, entity).unwrap();
        ComponentKind::CircleCollider2D.add_default(&mut registry, entity).unwrap();
        assert!(ComponentKind::RigidBody2D.add_default(&mut registry, entity).is_err());

        let mask = ComponentKind::mask_of(&registry, entity);
        assert_eq!(mask, ComponentMask::RIGID_BODY_2D | ComponentMask::CIRCLE_COLLIDER_2D);

        assert!(ComponentKind::RigidBody2D.remove(&mut registry, entity).unwrap());
        assert!(!ComponentKind::RigidBody2D.remove(&mut registry, entity).unwrap());
        assert!(ComponentKind::Transform.remove(&mut registry, entity).is_err());
    }
}
