//! Scripting host contract

use rhai::{Dynamic, Map};

use super::value::{entity_to_int, float_array};
use super::{ScriptError, ScriptValue, ScriptWorld};
use crate::ecs::components::Uuid;
use crate::foundation::math::Vec2;
use crate::physics::Manifold;

slotmap::new_key_type! {
    /// Handle to a host-side script object
    pub struct InstanceHandle;
}

/// Hook names looked up on script classes
pub mod hooks {
    /// Called once after instantiation, no arguments
    pub const ON_CREATE: &str = "on_create";
    /// Called every running frame with `dt`
    pub const ON_UPDATE: &str = "on_update";
    /// Called once when the runtime stops or the entity is destroyed
    pub const ON_DESTROY: &str = "on_destroy";
    /// Called when a collider starts touching another, with `(info, other)`
    pub const ON_COLLISION_ENTER: &str = "on_collision_enter";
    /// Called when a collider stops touching another, with `(info, other)`
    pub const ON_COLLISION_LEAVE: &str = "on_collision_leave";
}

/// Contact geometry handed to collision hooks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollisionInfo {
    /// Contact normal, from the first fixture of the pair to the second
    pub normal: Vec2,
    /// Up to two world contact points
    pub points: Vec<Vec2>,
    /// Separation for each point
    pub separations: Vec<f32>,
}

impl From<&Manifold> for CollisionInfo {
    fn from(manifold: &Manifold) -> Self {
        Self {
            normal: manifold.normal,
            points: manifold.points().to_vec(),
            separations: manifold.separations().to_vec(),
        }
    }
}

impl CollisionInfo {
    /// Host representation: `#{ normal, points, separations }`
    pub fn to_dynamic(&self) -> Dynamic {
        let mut map = Map::new();
        map.insert("normal".into(), float_array(self.normal.as_slice()));
        let points: rhai::Array = self.points.iter().map(|p| float_array(p.as_slice())).collect();
        map.insert("points".into(), Dynamic::from_array(points));
        map.insert("separations".into(), float_array(&self.separations));
        Dynamic::from_map(map)
    }
}

/// Argument passed to a hook
#[derive(Debug, Clone, PartialEq)]
pub enum HookArg {
    /// A number such as the frame delta
    Float(f32),
    /// Another entity's id
    Entity(Uuid),
    /// Contact geometry
    Collision(CollisionInfo),
}

impl HookArg {
    /// Host representation
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            Self::Float(value) => Dynamic::from_float(*value),
            Self::Entity(id) => Dynamic::from_int(entity_to_int(*id)),
            Self::Collision(info) => info.to_dynamic(),
        }
    }
}

/// A public field declared by a script class
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Declared initial value, which also fixes the field type
    pub default: ScriptValue,
}

/// What the scene requires of a scripting runtime
///
/// Every call is synchronous and happens on the simulation thread.
pub trait ScriptHost {
    /// Give the host the call surface its scripts use to reach the scene
    fn bind_world(&mut self, world: ScriptWorld);

    /// (Re)load every class of the script module
    ///
    /// A module that cannot be read is an error; a single class failing to
    /// compile is logged and skipped.
    fn load(&mut self) -> Result<(), ScriptError>;

    /// Whether [`load`](Self::load) has succeeded at least once
    fn is_loaded(&self) -> bool;

    /// Whether a class with this fully-qualified name is loaded
    fn has_class(&self, class: &str) -> bool;

    /// Names of all loaded classes, sorted
    fn class_names(&self) -> Vec<String>;

    /// Declared public fields of a class
    fn fields(&self, class: &str) -> Option<Vec<FieldInfo>>;

    /// Create an object of `class` bound to an entity id
    fn instantiate(&mut self, class: &str, entity: Uuid) -> Result<InstanceHandle, ScriptError>;

    /// Whether the instance's class defines `name` taking `arity` arguments
    fn has_method(&self, instance: InstanceHandle, name: &str, arity: usize) -> bool;

    /// Invoke a method
    ///
    /// Hook dispatch checks [`has_method`](Self::has_method) first; a method the
    /// class lacks is still a silent no-op here.
    fn invoke(&mut self, instance: InstanceHandle, name: &str, args: &[HookArg]) -> Result<(), ScriptError>;

    /// Read a declared field
    fn get_field(&self, instance: InstanceHandle, name: &str) -> Result<ScriptValue, ScriptError>;

    /// Write a declared field
    fn set_field(&mut self, instance: InstanceHandle, name: &str, value: ScriptValue) -> Result<(), ScriptError>;

    /// Drop an instance; unknown handles are ignored
    fn release(&mut self, instance: InstanceHandle);

    /// Number of live instances
    fn instance_count(&self) -> usize;

    /// Apply pending module changes; returns whether a reload happened
    fn poll_reload(&mut self) -> Result<bool, ScriptError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Shape;
    use crate::foundation::math::Transform2;

    #[test]
    fn test_collision_info_from_manifold() {
        let ground = Shape::boxed(5.0, 0.5, Vec2::zeros());
        let ball = Shape::circle(0.5, Vec2::zeros());
        let manifold = crate::physics::manifold::collide(
            &ground,
            &Transform2::new(Vec2::zeros(), 0.0),
            &ball,
            &Transform2::new(Vec2::new(0.0, 0.9), 0.0),
        )
        .unwrap();

        let info = CollisionInfo::from(&manifold);
        assert_eq!(info.points.len(), 1);
        assert_eq!(info.separations.len(), 1);
        assert_eq!(info.normal, manifold.normal);

        let dynamic = info.to_dynamic();
        let map = dynamic.try_cast::<Map>().unwrap();
        assert!(map.contains_key("normal"));
        assert_eq!(map["points"].clone().into_array().unwrap().len(), 1);
    }

    #[test]
    fn test_entity_arg_is_an_integer() {
        let arg = HookArg::Entity(Uuid::from_raw(42));
        assert_eq!(arg.to_dynamic().as_int(), Ok(42));
    }
}
