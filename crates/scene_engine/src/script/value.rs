//! Script field values

use std::fmt;

use rhai::{Array, Dynamic, INT};

use crate::ecs::components::Uuid;
use crate::foundation::math::{Vec2, Vec3, Vec4};

/// A value stored in a script field
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f32),
    /// String
    String(String),
    /// 2D vector
    Vec2(Vec2),
    /// 3D vector
    Vec3(Vec3),
    /// 4D vector
    Vec4(Vec4),
    /// Reference to another entity by id
    Entity(Uuid),
}

impl ScriptValue {
    /// Name of the variant, used in diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Vec4(_) => "vec4",
            Self::Entity(_) => "entity",
        }
    }

    /// Whether a value can be stored in a field declared with `self`'s type
    ///
    /// Integers are accepted for float fields.
    pub fn accepts(&self, value: &Self) -> bool {
        matches!(
            (self, value),
            (Self::Bool(_), Self::Bool(_))
                | (Self::Int(_), Self::Int(_))
                | (Self::Float(_), Self::Float(_) | Self::Int(_))
                | (Self::String(_), Self::String(_))
                | (Self::Vec2(_), Self::Vec2(_))
                | (Self::Vec3(_), Self::Vec3(_))
                | (Self::Vec4(_), Self::Vec4(_))
                | (Self::Entity(_), Self::Entity(_) | Self::Int(_))
        )
    }

    /// Convert `value` into the type of a field declared as `self`
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(&self, value: Self) -> Option<Self> {
        if !self.accepts(&value) {
            return None;
        }
        Some(match (self, value) {
            (Self::Float(_), Self::Int(i)) => Self::Float(i as f32),
            (Self::Entity(_), Self::Int(i)) => Self::Entity(entity_from_int(i)),
            (_, value) => value,
        })
    }

    /// Host representation
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            Self::Bool(b) => Dynamic::from_bool(*b),
            Self::Int(i) => Dynamic::from_int(*i),
            Self::Float(f) => Dynamic::from_float(*f),
            Self::String(s) => Dynamic::from(s.clone()),
            Self::Vec2(v) => float_array(v.as_slice()),
            Self::Vec3(v) => float_array(v.as_slice()),
            Self::Vec4(v) => float_array(v.as_slice()),
            Self::Entity(id) => Dynamic::from_int(entity_to_int(*id)),
        }
    }

    /// Read a host value
    ///
    /// `declared` is the field's declared value; it decides whether an integer
    /// is an entity id. Returns `None` for unsupported shapes.
    pub fn from_dynamic(value: &Dynamic, declared: Option<&Self>) -> Option<Self> {
        if let Ok(b) = value.as_bool() {
            return Some(Self::Bool(b));
        }
        if let Ok(i) = value.as_int() {
            return Some(match declared {
                Some(Self::Entity(_)) => Self::Entity(entity_from_int(i)),
                _ => Self::Int(i),
            });
        }
        if let Ok(f) = value.as_float() {
            return Some(Self::Float(f));
        }
        if value.is_string() {
            return value.clone().into_string().ok().map(Self::String);
        }
        if value.is_array() {
            let array = value.clone().into_array().ok()?;
            let floats = array.iter().map(number).collect::<Option<Vec<f32>>>()?;
            return match floats.as_slice() {
                [x, y] => Some(Self::Vec2(Vec2::new(*x, *y))),
                [x, y, z] => Some(Self::Vec3(Vec3::new(*x, *y, *z))),
                [x, y, z, w] => Some(Self::Vec4(Vec4::new(*x, *y, *z, *w))),
                _ => None,
            };
        }
        None
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Vec2(v) => write!(f, "({}, {})", v.x, v.y),
            Self::Vec3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Self::Vec4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Self::Entity(id) => write!(f, "entity {id}"),
        }
    }
}

/// Entity ids travel through the host as signed integers
#[allow(clippy::cast_possible_wrap)]
pub(crate) const fn entity_to_int(id: Uuid) -> INT {
    id.raw() as INT
}

#[allow(clippy::cast_sign_loss)]
pub(crate) const fn entity_from_int(value: INT) -> Uuid {
    Uuid::from_raw(value as u64)
}

pub(crate) fn float_array(values: &[f32]) -> Dynamic {
    let array: Array = values.iter().map(|v| Dynamic::from_float(*v)).collect();
    Dynamic::from_array(array)
}

/// A host number as `f32`, accepting integers
#[allow(clippy::cast_precision_loss)]
pub(crate) fn number(value: &Dynamic) -> Option<f32> {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|i| i as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_travel_as_arrays() {
        let value = ScriptValue::Vec3(Vec3::new(1.0, 2.0, 3.0));
        let dynamic = value.to_dynamic();
        assert!(dynamic.is_array());
        assert_eq!(ScriptValue::from_dynamic(&dynamic, None), Some(value));
    }

    #[test]
    fn test_integer_arrays_become_vectors() {
        let array: Array = vec![Dynamic::from_int(1), Dynamic::from_float(2.5)];
        let value = ScriptValue::from_dynamic(&Dynamic::from_array(array), None);
        assert_eq!(value, Some(ScriptValue::Vec2(Vec2::new(1.0, 2.5))));
    }

    #[test]
    fn test_entity_hint_reads_integers_as_ids() {
        let id = Uuid::from_raw(u64::MAX - 3);
        let dynamic = ScriptValue::Entity(id).to_dynamic();
        assert_eq!(
            ScriptValue::from_dynamic(&dynamic, Some(&ScriptValue::Entity(Uuid::NIL))),
            Some(ScriptValue::Entity(id))
        );
        assert!(matches!(ScriptValue::from_dynamic(&dynamic, None), Some(ScriptValue::Int(_))));
    }

    #[test]
    fn test_coerce_follows_declared_type() {
        let declared = ScriptValue::Float(0.0);
        assert_eq!(declared.coerce(ScriptValue::Int(3)), Some(ScriptValue::Float(3.0)));
        assert_eq!(declared.coerce(ScriptValue::String("x".into())), None);
        assert_eq!(ScriptValue::Bool(false).coerce(ScriptValue::Bool(true)), Some(ScriptValue::Bool(true)));
    }

    #[test]
    fn test_unsupported_shapes_are_rejected() {
        let array: Array = vec![Dynamic::from_int(1)];
        assert_eq!(ScriptValue::from_dynamic(&Dynamic::from_array(array), None), None);
        assert_eq!(ScriptValue::from_dynamic(&Dynamic::UNIT, None), None);
    }
}
