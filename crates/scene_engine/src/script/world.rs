//! Scene access for scripts
//!
//! Scripts run while the scene is busy dispatching hooks, so they cannot hold
//! a reference into the registry. Instead they see a snapshot of every entity
//! taken before the pass, and every write is queued as a [`SceneCommand`].
//! Writes also patch the snapshot so a script reads back its own changes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::ScriptValue;
use crate::ecs::components::{
    BoxCollider2DComponent, CameraComponent, CircleCollider2DComponent, ComponentKind, ComponentMask,
    RigidBody2DComponent, SpriteRendererComponent, Uuid,
};
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::physics::BodyType;

/// One collider property and its new value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderField {
    /// Centre offset from the body origin
    Offset(Vec2),
    /// Box half extents
    Size(Vec2),
    /// Circle radius
    Radius(f32),
    /// Mass per unit area
    Density(f32),
    /// Friction coefficient
    Friction(f32),
    /// Bounciness
    Restitution(f32),
    /// Impact speed below which restitution is ignored
    RestitutionThreshold(f32),
}

impl ColliderField {
    /// Build from a property name as scripts spell it
    pub fn parse(name: &str, value: &ScriptValue) -> Option<Self> {
        let scalar = match value {
            ScriptValue::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            ScriptValue::Int(i) => Some(*i as f32),
            _ => None,
        };
        let vector = match value {
            ScriptValue::Vec2(v) => Some(*v),
            _ => None,
        };
        Some(match name {
            "offset" => Self::Offset(vector?),
            "size" => Self::Size(vector?),
            "radius" => Self::Radius(scalar?),
            "density" => Self::Density(scalar?),
            "friction" => Self::Friction(scalar?),
            "restitution" => Self::Restitution(scalar?),
            "restitution_threshold" => Self::RestitutionThreshold(scalar?),
            _ => return None,
        })
    }

    /// Write into a box collider; `false` if boxes have no such property
    pub fn apply_box(self, collider: &mut BoxCollider2DComponent) -> bool {
        match self {
            Self::Offset(v) => collider.offset = v,
            Self::Size(v) => collider.size = v,
            Self::Radius(_) => return false,
            Self::Density(f) => collider.density = f,
            Self::Friction(f) => collider.friction = f,
            Self::Restitution(f) => collider.restitution = f,
            Self::RestitutionThreshold(f) => collider.restitution_threshold = f,
        }
        true
    }

    /// Write into a circle collider; `false` if circles have no such property
    pub fn apply_circle(self, collider: &mut CircleCollider2DComponent) -> bool {
        match self {
            Self::Offset(v) => collider.offset = v,
            Self::Size(_) => return false,
            Self::Radius(f) => collider.radius = f,
            Self::Density(f) => collider.density = f,
            Self::Friction(f) => collider.friction = f,
            Self::Restitution(f) => collider.restitution = f,
            Self::RestitutionThreshold(f) => collider.restitution_threshold = f,
        }
        true
    }
}

/// A mutation requested by a script
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    /// Destroy the entity
    Destroy(Uuid),
    /// Replace the tag
    SetTag(Uuid, String),
    /// Replace the transform position
    SetTranslation(Uuid, Vec3),
    /// Replace the transform rotation
    SetRotation(Uuid, Vec3),
    /// Replace the transform scale
    SetScale(Uuid, Vec3),
    /// Attach a default component
    AddComponent(Uuid, ComponentKind),
    /// Detach a component
    RemoveComponent(Uuid, ComponentKind),
    /// Impulse at a world point
    ApplyLinearImpulse {
        /// Target entity
        entity: Uuid,
        /// Impulse in N·s
        impulse: Vec2,
        /// World point
        point: Vec2,
    },
    /// Impulse through the centre of mass
    ApplyLinearImpulseToCenter {
        /// Target entity
        entity: Uuid,
        /// Impulse in N·s
        impulse: Vec2,
    },
    /// Change the rigid body type
    SetBodyType(Uuid, BodyType),
    /// Lock or unlock body rotation
    SetFixedRotation(Uuid, bool),
    /// Change one box collider property
    SetBoxCollider(Uuid, ColliderField),
    /// Change one circle collider property
    SetCircleCollider(Uuid, ColliderField),
    /// Replace the sprite tint
    SetSpriteColor(Uuid, Vec4),
    /// Replace the sprite tiling factor
    SetSpriteTilingFactor(Uuid, f32),
    /// Flag or unflag the camera as primary
    SetCameraPrimary(Uuid, bool),
    /// Write a field of the entity's script instance
    SetScriptField(Uuid, String, ScriptValue),
}

impl SceneCommand {
    /// Entity the command applies to
    pub const fn target(&self) -> Uuid {
        match self {
            Self::Destroy(id)
            | Self::SetTag(id, _)
            | Self::SetTranslation(id, _)
            | Self::SetRotation(id, _)
            | Self::SetScale(id, _)
            | Self::AddComponent(id, _)
            | Self::RemoveComponent(id, _)
            | Self::SetBodyType(id, _)
            | Self::SetFixedRotation(id, _)
            | Self::SetBoxCollider(id, _)
            | Self::SetCircleCollider(id, _)
            | Self::SetSpriteColor(id, _)
            | Self::SetSpriteTilingFactor(id, _)
            | Self::SetCameraPrimary(id, _)
            | Self::SetScriptField(id, ..) => *id,
            Self::ApplyLinearImpulse { entity, .. } | Self::ApplyLinearImpulseToCenter { entity, .. } => *entity,
        }
    }
}

/// What scripts can read about an entity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntitySnapshot {
    /// Tag
    pub tag: String,
    /// Transform position
    pub translation: Vec3,
    /// Transform rotation
    pub rotation: Vec3,
    /// Transform scale
    pub scale: Vec3,
    /// Components present
    pub components: ComponentMask,
    /// Body velocity, zero without a live body
    pub linear_velocity: Vec2,
    /// Rigid body settings
    pub rigid_body: Option<RigidBody2DComponent>,
    /// Box collider settings
    pub box_collider: Option<BoxCollider2DComponent>,
    /// Circle collider settings
    pub circle_collider: Option<CircleCollider2DComponent>,
    /// Sprite data
    pub sprite: Option<SpriteRendererComponent>,
    /// Camera settings
    pub camera: Option<CameraComponent>,
    /// Field values of the live script instance, in declaration order
    pub script_fields: Option<Vec<(String, ScriptValue)>>,
}

impl EntitySnapshot {
    /// Mirror a component add so later reads in the same pass see it
    fn attach_default(&mut self, kind: ComponentKind) {
        self.components.insert(kind.mask());
        match kind {
            ComponentKind::RigidBody2D => {
                self.rigid_body.get_or_insert_with(RigidBody2DComponent::default);
            }
            ComponentKind::BoxCollider2D => {
                self.box_collider.get_or_insert_with(BoxCollider2DComponent::default);
            }
            ComponentKind::CircleCollider2D => {
                self.circle_collider.get_or_insert_with(CircleCollider2DComponent::default);
            }
            ComponentKind::SpriteRenderer => {
                self.sprite.get_or_insert_with(SpriteRendererComponent::default);
            }
            ComponentKind::Camera => {
                self.camera.get_or_insert_with(CameraComponent::default);
            }
            _ => {}
        }
    }

    fn detach(&mut self, kind: ComponentKind) {
        self.components.remove(kind.mask());
        match kind {
            ComponentKind::RigidBody2D => self.rigid_body = None,
            ComponentKind::BoxCollider2D => self.box_collider = None,
            ComponentKind::CircleCollider2D => self.circle_collider = None,
            ComponentKind::SpriteRenderer => self.sprite = None,
            ComponentKind::Camera => self.camera = None,
            ComponentKind::Script => self.script_fields = None,
            _ => {}
        }
    }

    /// Current value of a script field
    pub fn script_field(&self, name: &str) -> Option<&ScriptValue> {
        self.script_fields
            .iter()
            .flatten()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

#[derive(Default)]
struct SharedState {
    commands: Vec<SceneCommand>,
    order: Vec<Uuid>,
    entities: HashMap<Uuid, EntitySnapshot>,
}

/// Shared handle scripts use to read and mutate the scene
#[derive(Clone, Default)]
pub struct ScriptWorld {
    state: Rc<RefCell<SharedState>>,
}

impl ScriptWorld {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot; `entities` order is kept for name lookups
    pub fn refresh(&self, entities: impl IntoIterator<Item = (Uuid, EntitySnapshot)>) {
        let mut state = self.state.borrow_mut();
        state.order.clear();
        state.entities.clear();
        for (id, snapshot) in entities {
            state.order.push(id);
            state.entities.insert(id, snapshot);
        }
    }

    /// Record the field values of an entity's live script instance
    pub fn set_script_fields(&self, id: Uuid, fields: Vec<(String, ScriptValue)>) {
        if let Some(entity) = self.state.borrow_mut().entities.get_mut(&id) {
            entity.script_fields = Some(fields);
        }
    }

    /// Drop an entity from the snapshot after it was destroyed
    pub fn forget(&self, id: Uuid) {
        let mut state = self.state.borrow_mut();
        state.entities.remove(&id);
        state.order.retain(|&other| other != id);
    }

    /// Take every queued command, oldest first
    pub fn take_commands(&self) -> Vec<SceneCommand> {
        std::mem::take(&mut self.state.borrow_mut().commands)
    }

    /// Number of queued commands
    pub fn pending_commands(&self) -> usize {
        self.state.borrow().commands.len()
    }

    /// Whether the entity is in the snapshot
    pub fn exists(&self, id: Uuid) -> bool {
        self.state.borrow().entities.contains_key(&id)
    }

    /// Snapshot of one entity
    pub fn entity(&self, id: Uuid) -> Option<EntitySnapshot> {
        self.state.borrow().entities.get(&id).cloned()
    }

    /// First entity whose tag equals `name`
    pub fn find_by_name(&self, name: &str) -> Option<Uuid> {
        let state = self.state.borrow();
        state
            .order
            .iter()
            .copied()
            .find(|id| state.entities.get(id).is_some_and(|e| e.tag == name))
    }

    /// Queue a command without touching the snapshot
    pub fn push(&self, command: SceneCommand) {
        self.state.borrow_mut().commands.push(command);
    }

    /// Queue a destroy; returns `false` for an unknown entity
    ///
    /// The entity stays readable until the scene performs the destroy.
    pub fn destroy(&self, id: Uuid) -> bool {
        self.write(id, SceneCommand::Destroy(id), |_| {})
    }

    /// Queue a tag change
    pub fn set_tag(&self, id: Uuid, tag: String) -> bool {
        let patched = tag.clone();
        self.write(id, SceneCommand::SetTag(id, tag), move |e| e.tag = patched)
    }

    /// Queue a position change
    pub fn set_translation(&self, id: Uuid, translation: Vec3) -> bool {
        self.write(id, SceneCommand::SetTranslation(id, translation), |e| e.translation = translation)
    }

    /// Queue a rotation change
    pub fn set_rotation(&self, id: Uuid, rotation: Vec3) -> bool {
        self.write(id, SceneCommand::SetRotation(id, rotation), |e| e.rotation = rotation)
    }

    /// Queue a scale change
    pub fn set_scale(&self, id: Uuid, scale: Vec3) -> bool {
        self.write(id, SceneCommand::SetScale(id, scale), |e| e.scale = scale)
    }

    /// Queue a component add
    pub fn add_component(&self, id: Uuid, kind: ComponentKind) -> bool {
        self.write(id, SceneCommand::AddComponent(id, kind), |e| e.attach_default(kind))
    }

    /// Queue a component removal
    pub fn remove_component(&self, id: Uuid, kind: ComponentKind) -> bool {
        self.write(id, SceneCommand::RemoveComponent(id, kind), |e| e.detach(kind))
    }

    /// Queue an impulse at a world point
    pub fn apply_linear_impulse(&self, id: Uuid, impulse: Vec2, point: Vec2) -> bool {
        let command = SceneCommand::ApplyLinearImpulse {
            entity: id,
            impulse,
            point,
        };
        self.write(id, command, |_| {})
    }

    /// Queue an impulse through the centre of mass
    pub fn apply_linear_impulse_to_center(&self, id: Uuid, impulse: Vec2) -> bool {
        self.write(id, SceneCommand::ApplyLinearImpulseToCenter { entity: id, impulse }, |_| {})
    }

    /// Queue a body type change
    pub fn set_body_type(&self, id: Uuid, body_type: BodyType) -> bool {
        self.edit(id, SceneCommand::SetBodyType(id, body_type), |e| {
            e.rigid_body.as_mut().map(|body| body.body_type = body_type).is_some()
        })
    }

    /// Queue a fixed-rotation change; needs a rigid body
    pub fn set_fixed_rotation(&self, id: Uuid, fixed: bool) -> bool {
        self.edit(id, SceneCommand::SetFixedRotation(id, fixed), |e| {
            e.rigid_body.as_mut().map(|body| body.fixed_rotation = fixed).is_some()
        })
    }

    /// Queue a box collider change
    pub fn set_box_collider(&self, id: Uuid, field: ColliderField) -> bool {
        self.edit(id, SceneCommand::SetBoxCollider(id, field), |e| {
            e.box_collider.as_mut().is_some_and(|collider| field.apply_box(collider))
        })
    }

    /// Queue a circle collider change
    pub fn set_circle_collider(&self, id: Uuid, field: ColliderField) -> bool {
        self.edit(id, SceneCommand::SetCircleCollider(id, field), |e| {
            e.circle_collider.as_mut().is_some_and(|collider| field.apply_circle(collider))
        })
    }

    /// Queue a sprite tint change
    pub fn set_sprite_color(&self, id: Uuid, color: Vec4) -> bool {
        self.edit(id, SceneCommand::SetSpriteColor(id, color), |e| {
            e.sprite.as_mut().map(|sprite| sprite.color = color).is_some()
        })
    }

    /// Queue a sprite tiling change
    pub fn set_sprite_tiling_factor(&self, id: Uuid, factor: f32) -> bool {
        self.edit(id, SceneCommand::SetSpriteTilingFactor(id, factor), |e| {
            e.sprite.as_mut().map(|sprite| sprite.tiling_factor = factor).is_some()
        })
    }

    /// Queue a camera primary flag change
    pub fn set_camera_primary(&self, id: Uuid, primary: bool) -> bool {
        self.edit(id, SceneCommand::SetCameraPrimary(id, primary), |e| {
            e.camera.as_mut().map(|camera| camera.primary = primary).is_some()
        })
    }

    /// Queue a write to another instance's field
    ///
    /// The value is converted to the field's type; an unknown field or a
    /// value that does not fit is refused.
    pub fn set_script_field(&self, id: Uuid, name: &str, value: ScriptValue) -> bool {
        let Some(value) = self
            .entity(id)
            .and_then(|e| e.script_field(name).and_then(|current| current.coerce(value)))
        else {
            log::warn!("Script field '{name}' of entity {id} cannot take that value");
            return false;
        };
        let patched = value.clone();
        self.edit(id, SceneCommand::SetScriptField(id, name.to_string(), value), move |e| {
            let slot = e.script_fields.iter_mut().flatten().find(|(field, _)| field == name);
            slot.map(|(_, current)| *current = patched).is_some()
        })
    }

    fn write(&self, id: Uuid, command: SceneCommand, patch: impl FnOnce(&mut EntitySnapshot)) -> bool {
        self.edit(id, command, |e| {
            patch(e);
            true
        })
    }

    /// Queue `command` if `patch` accepts the entity
    fn edit(&self, id: Uuid, command: SceneCommand, patch: impl FnOnce(&mut EntitySnapshot) -> bool) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(snapshot) = state.entities.get_mut(&id) else {
            log::warn!("Script referenced unknown entity {id}");
            return false;
        };
        if !patch(snapshot) {
            return false;
        }
        state.commands.push(command);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with(entities: &[(u64, &str)]) -> ScriptWorld {
        let world = ScriptWorld::new();
        world.refresh(entities.iter().map(|&(id, tag)| {
            (
                Uuid::from_raw(id),
                EntitySnapshot {
                    tag: tag.to_string(),
                    scale: Vec3::new(1.0, 1.0, 1.0),
                    ..Default::default()
                },
            )
        }));
        world
    }

    #[test]
    fn test_writes_patch_snapshot_and_queue_commands() {
        let world = world_with(&[(1, "Player")]);
        let id = Uuid::from_raw(1);

        assert!(world.set_tag(id, "Hero".to_string()));
        assert!(world.set_translation(id, Vec3::new(1.0, 2.0, 3.0)));
        assert!(world.add_component(id, ComponentKind::RigidBody2D));

        let snapshot = world.entity(id).unwrap();
        assert_eq!(snapshot.tag, "Hero");
        assert_eq!(snapshot.translation, Vec3::new(1.0, 2.0, 3.0));
        assert!(snapshot.components.contains(ComponentMask::RIGID_BODY_2D));

        let commands = world.take_commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0], SceneCommand::SetTag(id, "Hero".to_string()));
        assert_eq!(world.pending_commands(), 0);
    }

    #[test]
    fn test_unknown_entity_is_rejected() {
        let world = world_with(&[(1, "Player")]);
        assert!(!world.destroy(Uuid::from_raw(99)));
        assert_eq!(world.pending_commands(), 0);
    }

    #[test]
    fn test_destroy_keeps_entity_readable_until_forgotten() {
        let world = world_with(&[(1, "Player")]);
        let id = Uuid::from_raw(1);
        assert!(world.destroy(id));
        assert!(world.exists(id));
        assert_eq!(world.take_commands()[0].target(), id);

        world.forget(id);
        assert!(!world.exists(id));
        assert_eq!(world.find_by_name("Player"), None);
    }

    #[test]
    fn test_component_writes_need_the_component() {
        let world = world_with(&[(1, "Crate")]);
        let id = Uuid::from_raw(1);

        assert!(!world.set_fixed_rotation(id, true));
        assert!(!world.set_sprite_color(id, Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert!(!world.set_camera_primary(id, false));
        assert_eq!(world.pending_commands(), 0);

        assert!(world.add_component(id, ComponentKind::BoxCollider2D));
        assert!(world.set_box_collider(id, ColliderField::Density(3.0)));
        assert!(!world.set_box_collider(id, ColliderField::Radius(2.0)));
        assert!(!world.set_circle_collider(id, ColliderField::Radius(2.0)));
        assert_eq!(world.entity(id).unwrap().box_collider.unwrap().density, 3.0);

        let commands = world.take_commands();
        assert_eq!(commands[1], SceneCommand::SetBoxCollider(id, ColliderField::Density(3.0)));
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_collider_field_parsing() {
        let offset = ScriptValue::Vec2(Vec2::new(1.0, 2.0));
        assert_eq!(
            ColliderField::parse("offset", &offset),
            Some(ColliderField::Offset(Vec2::new(1.0, 2.0)))
        );
        assert_eq!(
            ColliderField::parse("friction", &ScriptValue::Int(1)),
            Some(ColliderField::Friction(1.0))
        );
        assert_eq!(ColliderField::parse("size", &ScriptValue::Float(1.0)), None);
        assert_eq!(ColliderField::parse("mass", &ScriptValue::Float(1.0)), None);
    }

    #[test]
    fn test_script_field_writes_are_coerced() {
        let world = world_with(&[(1, "Player"), (2, "Crate")]);
        let player = Uuid::from_raw(1);
        world.set_script_fields(player, vec![("speed".to_string(), ScriptValue::Float(1.0))]);

        assert!(world.set_script_field(player, "speed", ScriptValue::Int(3)));
        assert!(!world.set_script_field(player, "speed", ScriptValue::Bool(true)));
        assert!(!world.set_script_field(player, "jump", ScriptValue::Int(3)));
        // No script instance
        assert!(!world.set_script_field(Uuid::from_raw(2), "speed", ScriptValue::Int(3)));

        assert_eq!(
            world.entity(player).unwrap().script_field("speed"),
            Some(&ScriptValue::Float(3.0))
        );
        assert_eq!(
            world.take_commands(),
            vec![SceneCommand::SetScriptField(player, "speed".to_string(), ScriptValue::Float(3.0))]
        );
    }

    #[test]
    fn test_find_by_name_returns_first_in_order() {
        let world = world_with(&[(5, "Enemy"), (3, "Enemy"), (4, "Player")]);
        assert_eq!(world.find_by_name("Enemy"), Some(Uuid::from_raw(5)));
        assert_eq!(world.find_by_name("Nobody"), None);
    }
}
