//! Borrowed views of a scene used while its bridges are busy
//!
//! The scripting bridge runs hooks while the scene is half-borrowed, so it is
//! handed a [`SceneContext`] holding everything except the bridge itself.

use std::collections::HashMap;

use super::SceneError;
use crate::ecs::components::{
    BoxCollider2DComponent, CameraComponent, CircleCollider2DComponent, ComponentKind, IdComponent,
    RigidBody2DComponent, SpriteRendererComponent, TagComponent, TransformComponent, Uuid,
};
use crate::ecs::{EcsError, Entity, Registry};
use crate::foundation::math::Vec2;
use crate::physics::{ContactEvent, ContactListener, PhysicsBridge};
use crate::script::{CollisionPhase, EntitySnapshot, SceneAccess, SceneCommand, ScriptingBridge};

/// Work postponed until the physics world is unlocked
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredAction {
    /// Destroy an entity
    Destroy(Entity),
    /// Apply a script command
    Command(SceneCommand),
}

/// Mutable scene state minus the scripting bridge
pub(crate) struct SceneContext<'a> {
    pub registry: &'a mut Registry,
    pub physics: &'a mut PhysicsBridge,
    pub index: &'a mut HashMap<Uuid, Entity>,
    pub deferred: &'a mut Vec<DeferredAction>,
    /// Touching contacts ended by removing bodies or colliders, not yet reported
    pub ended: Vec<ContactEvent>,
}

impl SceneContext<'_> {
    /// Live entity for an id
    pub fn entity(&self, id: Uuid) -> Option<Entity> {
        self.index
            .get(&id)
            .copied()
            .filter(|&entity| self.registry.contains(entity))
    }

    /// Destroy now, or queue if physics is stepping
    ///
    /// Returns the id of an entity destroyed right away.
    pub fn destroy_entity(&mut self, entity: Entity) -> Option<Uuid> {
        if !self.registry.contains(entity) {
            return None;
        }
        if self.physics.is_locked() {
            log::debug!("Physics locked; deferring destruction of {entity:?}");
            self.deferred.push(DeferredAction::Destroy(entity));
            return None;
        }

        let id = self.registry.get_component::<IdComponent>(entity).map(|id| id.id);
        match self.physics.destroy_body(self.registry, entity) {
            Ok(ended) => self.ended.extend(ended),
            Err(err) => log::warn!("Failed to destroy body of {entity:?}: {err}"),
        }
        if let Some(id) = id {
            self.index.remove(&id);
        }
        self.registry.destroy(entity);
        log::trace!("Destroyed entity {entity:?}");
        id
    }

    /// Detach a component by kind, freeing its physics resources first
    pub fn remove_by_kind(&mut self, entity: Entity, kind: ComponentKind) -> Result<bool, SceneError> {
        if !self.registry.contains(entity) {
            return Err(SceneError::NoSuchEntity(entity));
        }
        if kind == ComponentKind::Transform {
            return Err(EcsError::Unsupported(kind.to_string()).into());
        }
        self.release_physics(entity, kind)?;
        Ok(kind.remove(self.registry, entity)?)
    }

    /// Free the body or fixture a component owns, keeping the ended contacts
    pub fn release_physics(&mut self, entity: Entity, kind: ComponentKind) -> Result<(), SceneError> {
        let ended = self.physics.release_component(self.registry, entity, kind)?;
        self.ended.extend(ended);
        Ok(())
    }

    fn apply_now(&mut self, entity: Entity, command: SceneCommand) -> Option<Uuid> {
        let registry = &mut *self.registry;
        match command {
            SceneCommand::Destroy(_) => return self.destroy_entity(entity),
            SceneCommand::SetTag(_, tag) => {
                if let Some(component) = registry.get_component_mut::<TagComponent>(entity) {
                    component.tag = tag;
                }
            }
            SceneCommand::SetTranslation(_, position) => {
                if let Some(transform) = registry.get_component_mut::<TransformComponent>(entity) {
                    transform.position = position;
                }
            }
            SceneCommand::SetRotation(_, rotation) => {
                if let Some(transform) = registry.get_component_mut::<TransformComponent>(entity) {
                    transform.rotation = rotation;
                }
            }
            SceneCommand::SetScale(_, scale) => {
                if let Some(transform) = registry.get_component_mut::<TransformComponent>(entity) {
                    transform.scale = scale;
                }
            }
            SceneCommand::AddComponent(_, kind) => {
                if let Err(err) = kind.add_default(registry, entity) {
                    log::warn!("Script could not add {kind} to {entity:?}: {err}");
                }
            }
            SceneCommand::RemoveComponent(_, kind) => {
                if let Err(err) = self.remove_by_kind(entity, kind) {
                    log::warn!("Script could not remove {kind} from {entity:?}: {err}");
                }
            }
            SceneCommand::ApplyLinearImpulse { impulse, point, .. } => {
                if let Err(err) = self.physics.apply_linear_impulse(registry, entity, impulse, point) {
                    log::warn!("Impulse on {entity:?} ignored: {err}");
                }
            }
            SceneCommand::ApplyLinearImpulseToCenter { impulse, .. } => {
                if let Err(err) = self.physics.apply_linear_impulse_to_center(registry, entity, impulse) {
                    log::warn!("Impulse on {entity:?} ignored: {err}");
                }
            }
            SceneCommand::SetBodyType(_, body_type) => {
                if let Err(err) = self.physics.set_body_type(registry, entity, body_type) {
                    log::warn!("Body type of {entity:?} unchanged: {err}");
                }
            }
            SceneCommand::SetFixedRotation(_, fixed) => {
                if let Err(err) = self.physics.set_fixed_rotation(registry, entity, fixed) {
                    log::warn!("Fixed rotation of {entity:?} unchanged: {err}");
                }
            }
            SceneCommand::SetBoxCollider(_, field) => {
                let applied = registry
                    .get_component_mut::<BoxCollider2DComponent>(entity)
                    .is_some_and(|collider| field.apply_box(collider));
                if !applied {
                    log::warn!("Box collider of {entity:?} unchanged: {field:?}");
                }
            }
            SceneCommand::SetCircleCollider(_, field) => {
                let applied = registry
                    .get_component_mut::<CircleCollider2DComponent>(entity)
                    .is_some_and(|collider| field.apply_circle(collider));
                if !applied {
                    log::warn!("Circle collider of {entity:?} unchanged: {field:?}");
                }
            }
            SceneCommand::SetSpriteColor(_, color) => {
                if let Some(sprite) = registry.get_component_mut::<SpriteRendererComponent>(entity) {
                    sprite.color = color;
                }
            }
            SceneCommand::SetSpriteTilingFactor(_, factor) => {
                if let Some(sprite) = registry.get_component_mut::<SpriteRendererComponent>(entity) {
                    sprite.tiling_factor = factor;
                }
            }
            SceneCommand::SetCameraPrimary(_, primary) => {
                if let Some(camera) = registry.get_component_mut::<CameraComponent>(entity) {
                    camera.primary = primary;
                }
            }
            // Instances live in the scripting bridge, which applies these itself
            SceneCommand::SetScriptField(_, name, _) => {
                log::debug!("Ignoring write to script field '{name}' of {entity:?}");
            }
        }
        None
    }
}

impl SceneAccess for SceneContext<'_> {
    fn registry(&self) -> &Registry {
        self.registry
    }

    fn registry_mut(&mut self) -> &mut Registry {
        self.registry
    }

    fn apply(&mut self, command: SceneCommand) -> Option<Uuid> {
        if self.physics.is_locked() {
            self.deferred.push(DeferredAction::Command(command));
            return None;
        }
        let target = command.target();
        let Some(entity) = self.entity(target) else {
            log::warn!("Dropping script command for missing entity {target}");
            return None;
        };
        self.apply_now(entity, command)
    }

    fn snapshot(&self) -> Vec<(Uuid, EntitySnapshot)> {
        snapshot(self.registry, self.physics)
    }

    fn take_ended_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.ended)
    }
}

/// What scripts may read about every entity, in registry order
///
/// Script field values are filled in by the scripting bridge.
pub(crate) fn snapshot(registry: &Registry, physics: &PhysicsBridge) -> Vec<(Uuid, EntitySnapshot)> {
    let mut entities = Vec::with_capacity(registry.len());
    registry.each::<(IdComponent, TagComponent, TransformComponent)>(|entity, (id, tag, transform)| {
        entities.push((
            id.id,
            EntitySnapshot {
                tag: tag.tag.clone(),
                translation: transform.position,
                rotation: transform.rotation,
                scale: transform.scale,
                components: ComponentKind::mask_of(registry, entity),
                linear_velocity: physics
                    .linear_velocity(registry, entity)
                    .unwrap_or_else(|_| Vec2::zeros()),
                rigid_body: registry.get_component::<RigidBody2DComponent>(entity).cloned(),
                box_collider: registry.get_component::<BoxCollider2DComponent>(entity).cloned(),
                circle_collider: registry.get_component::<CircleCollider2DComponent>(entity).cloned(),
                sprite: registry.get_component::<SpriteRendererComponent>(entity).cloned(),
                camera: registry.get_component::<CameraComponent>(entity).cloned(),
                script_fields: None,
            },
        ));
    });
    entities
}

/// Contact listener that forwards begin/end events to scripts
///
/// Runs inside the physics step. Whatever the hooks ask for is queued as
/// deferred work.
pub(crate) struct CollisionDispatcher<'a> {
    pub scripting: &'a mut ScriptingBridge,
    pub deferred: &'a mut Vec<DeferredAction>,
}

impl CollisionDispatcher<'_> {
    fn dispatch(&mut self, event: &ContactEvent, phase: CollisionPhase) {
        self.scripting.dispatch_contact(event, phase);
        self.deferred
            .extend(self.scripting.take_commands().into_iter().map(DeferredAction::Command));
    }
}

impl ContactListener for CollisionDispatcher<'_> {
    fn begin_contact(&mut self, event: &ContactEvent) {
        self.dispatch(event, CollisionPhase::Enter);
    }

    fn end_contact(&mut self, event: &ContactEvent) {
        self.dispatch(event, CollisionPhase::Leave);
    }
}
