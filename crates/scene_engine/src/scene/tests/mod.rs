//! Scene scenario tests
//!
//! Shared fixtures live here; the scenarios are split by concern.

mod lifecycle;

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;

use crate::ecs::components::{
    BoxCollider2DComponent, CircleCollider2DComponent, RigidBody2DComponent, TransformComponent, Uuid,
};
use crate::ecs::Entity;
use crate::foundation::math::Vec3;
use crate::physics::BodyType;
use crate::scene::Scene;
use crate::script::{FieldInfo, HookArg, InstanceHandle, ScriptError, ScriptHost, ScriptValue, ScriptWorld};

pub(super) const DT: f32 = 1.0 / 60.0;

/// Hook calls seen by a [`RecordingHost`], as (entity, hook)
pub(super) type CallLog = Rc<RefCell<Vec<(Uuid, String)>>>;

/// Script host that knows a fixed set of classes and records every hook call
pub(super) struct RecordingHost {
    classes: Vec<String>,
    undefined: Vec<String>,
    instances: SlotMap<InstanceHandle, Uuid>,
    calls: CallLog,
    loaded: bool,
}

impl RecordingHost {
    pub(super) fn new(classes: &[&str]) -> (Self, CallLog) {
        let calls = CallLog::default();
        let host = Self {
            classes: classes.iter().map(|class| (*class).to_string()).collect(),
            undefined: Vec::new(),
            instances: SlotMap::with_key(),
            calls: Rc::clone(&calls),
            loaded: false,
        };
        (host, calls)
    }

    /// Builder pattern: Classes do not define these hooks
    pub(super) fn without(mut self, hooks: &[&str]) -> Self {
        self.undefined = hooks.iter().map(|hook| (*hook).to_string()).collect();
        self
    }
}

impl ScriptHost for RecordingHost {
    fn bind_world(&mut self, _world: ScriptWorld) {}

    fn load(&mut self) -> Result<(), ScriptError> {
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|known| known == class)
    }

    fn class_names(&self) -> Vec<String> {
        self.classes.clone()
    }

    fn fields(&self, class: &str) -> Option<Vec<FieldInfo>> {
        self.has_class(class).then(Vec::new)
    }

    fn instantiate(&mut self, class: &str, entity: Uuid) -> Result<InstanceHandle, ScriptError> {
        if !self.has_class(class) {
            return Err(ScriptError::ClassNotFound(class.to_string()));
        }
        Ok(self.instances.insert(entity))
    }

    fn has_method(&self, instance: InstanceHandle, name: &str, _arity: usize) -> bool {
        self.instances.contains_key(instance) && !self.undefined.iter().any(|hook| hook == name)
    }

    fn invoke(&mut self, instance: InstanceHandle, name: &str, _args: &[HookArg]) -> Result<(), ScriptError> {
        let entity = *self.instances.get(instance).ok_or(ScriptError::InvalidInstance)?;
        self.calls.borrow_mut().push((entity, name.to_string()));
        Ok(())
    }

    fn get_field(&self, _instance: InstanceHandle, name: &str) -> Result<ScriptValue, ScriptError> {
        Err(ScriptError::FieldNotFound {
            class: "recording".to_string(),
            field: name.to_string(),
        })
    }

    fn set_field(&mut self, _instance: InstanceHandle, name: &str, _value: ScriptValue) -> Result<(), ScriptError> {
        Err(ScriptError::FieldNotFound {
            class: "recording".to_string(),
            field: name.to_string(),
        })
    }

    fn release(&mut self, instance: InstanceHandle) {
        self.instances.remove(instance);
    }

    fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// Hooks called for one entity, in order
pub(super) fn calls_for(log: &CallLog, entity: Uuid) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|(id, _)| *id == entity)
        .map(|(_, hook)| hook.clone())
        .collect()
}

/// Static box, 10 x 1, top face at y = 0.5
pub(super) fn spawn_ground(scene: &mut Scene) -> Entity {
    let ground = scene.create_entity("Ground");
    scene
        .add_component(ground, RigidBody2DComponent::new(BodyType::Static))
        .unwrap();
    scene
        .add_component(ground, BoxCollider2DComponent::new(5.0, 0.5))
        .unwrap();
    ground
}

/// Dynamic circle of radius 0.5
pub(super) fn spawn_ball(scene: &mut Scene, name: &str, position: Vec3, restitution: f32) -> Entity {
    let ball = scene.create_entity(name);
    *scene.get_component_mut::<TransformComponent>(ball).unwrap() = TransformComponent::from_position(position);
    scene
        .add_component(ball, RigidBody2DComponent::new(BodyType::Dynamic))
        .unwrap();
    scene
        .add_component(ball, CircleCollider2DComponent::new(0.5).with_restitution(restitution))
        .unwrap();
    ball
}
