//! Rigid bodies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::shape::{Fixture, FixtureHandle, MassData};
use crate::foundation::math::{Transform2, Vec2};

slotmap::new_key_type! {
    /// Handle to a body in a [`PhysicsWorld`](super::PhysicsWorld)
    pub struct BodyHandle;
}

/// How a body takes part in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves; infinite mass
    #[default]
    Static,
    /// Moves by its velocity only; infinite mass
    Kinematic,
    /// Fully simulated
    Dynamic,
}

impl BodyType {
    /// Lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Kinematic => "kinematic",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "kinematic" => Ok(Self::Kinematic),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!("unknown body type '{other}'")),
        }
    }
}

/// Parameters for creating a body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDef {
    /// Simulation mode
    pub body_type: BodyType,
    /// World position of the body origin
    pub position: Vec2,
    /// World angle in radians
    pub angle: f32,
    /// Initial linear velocity
    pub linear_velocity: Vec2,
    /// Initial angular velocity
    pub angular_velocity: f32,
    /// Prevent rotation
    pub fixed_rotation: bool,
    /// Multiplier on world gravity
    pub gravity_scale: f32,
    /// Caller data reported back in contact events
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::zeros(),
            angle: 0.0,
            linear_velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            fixed_rotation: false,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    /// Create a definition of the given type at the origin
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Default::default()
        }
    }

    /// Builder pattern: Set position
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Builder pattern: Set angle
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    /// Builder pattern: Set initial linear velocity
    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Builder pattern: Lock rotation
    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    /// Builder pattern: Set user data
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

pub(crate) struct Body {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub fixed_rotation: bool,
    pub gravity_scale: f32,
    pub user_data: u64,
    pub mass: f32,
    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub fixtures: Vec<FixtureHandle>,
}

impl Body {
    pub fn new(def: &BodyDef) -> Self {
        let mut body = Self {
            body_type: def.body_type,
            position: def.position,
            angle: def.angle,
            linear_velocity: def.linear_velocity,
            angular_velocity: if def.fixed_rotation { 0.0 } else { def.angular_velocity },
            fixed_rotation: def.fixed_rotation,
            gravity_scale: def.gravity_scale,
            user_data: def.user_data,
            mass: 0.0,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            fixtures: Vec::new(),
        };
        if body.body_type == BodyType::Static {
            body.linear_velocity = Vec2::zeros();
            body.angular_velocity = 0.0;
        }
        body.reset_mass(std::iter::empty::<&Fixture>());
        body
    }

    pub fn transform(&self) -> Transform2 {
        Transform2::new(self.position, self.angle)
    }

    /// Recompute mass from the attached fixtures; the body origin is the centre of mass.
    pub fn reset_mass<'a>(&mut self, fixtures: impl Iterator<Item = &'a Fixture>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inv_inertia = 0.0;

        if self.body_type != BodyType::Dynamic {
            return;
        }

        let total = fixtures
            .map(|fixture| fixture.shape.mass_data(fixture.density))
            .fold(MassData::default(), |acc, data| MassData {
                mass: acc.mass + data.mass,
                inertia: acc.inertia + data.inertia,
            });

        // Dynamic bodies always get a positive mass, like Box2D
        self.mass = if total.mass > 0.0 { total.mass } else { 1.0 };
        self.inv_mass = 1.0 / self.mass;
        if total.inertia > 0.0 && !self.fixed_rotation {
            self.inv_inertia = 1.0 / total.inertia;
        } else {
            self.angular_velocity = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_type_parse() {
        assert_eq!("Dynamic".parse::<BodyType>(), Ok(BodyType::Dynamic));
        assert_eq!(" static ".parse::<BodyType>(), Ok(BodyType::Static));
        assert!("floating".parse::<BodyType>().is_err());
    }

    #[test]
    fn test_dynamic_body_without_fixtures_has_unit_mass() {
        let body = Body::new(&BodyDef::new(BodyType::Dynamic));
        assert_eq!(body.mass, 1.0);
        assert_eq!(body.inv_mass, 1.0);
        assert_eq!(body.inv_inertia, 0.0);
    }

    #[test]
    fn test_static_body_ignores_initial_velocity() {
        let body = Body::new(&BodyDef::new(BodyType::Static).with_linear_velocity(Vec2::new(1.0, 0.0)));
        assert_eq!(body.linear_velocity, Vec2::zeros());
        assert_eq!(body.inv_mass, 0.0);
    }
}
