//! Physics-backed components
//!
//! The `runtime_*` fields are non-owning references into the physics world.
//! They are `None` until the world is (re)built and are never carried over by
//! [`Component::duplicate`].

use crate::ecs::Component;
use crate::foundation::math::Vec2;
use crate::physics::{BodyHandle, BodyType, FixtureHandle};

/// 2D rigid body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RigidBody2DComponent {
    /// Static, kinematic or dynamic
    pub body_type: BodyType,
    /// Prevent the body from rotating
    pub fixed_rotation: bool,
    /// Body in the live physics world
    pub runtime_body: Option<BodyHandle>,
}

impl RigidBody2DComponent {
    /// Create a body description of the given type
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Default::default()
        }
    }

    /// Builder pattern: Lock rotation
    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }
}

impl Component for RigidBody2DComponent {
    fn duplicate(&self) -> Self {
        Self {
            runtime_body: None,
            ..self.clone()
        }
    }
}

/// Axis-aligned (in body space) box collider
#[derive(Debug, Clone, PartialEq)]
pub struct BoxCollider2DComponent {
    /// Centre offset from the body origin
    pub offset: Vec2,
    /// Half extents before transform scale is applied
    pub size: Vec2,
    /// Mass per unit area
    pub density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounciness
    pub restitution: f32,
    /// Impact speed below which restitution is ignored
    pub restitution_threshold: f32,
    /// Fixture in the live physics world
    pub runtime_fixture: Option<FixtureHandle>,
}

impl Default for BoxCollider2DComponent {
    fn default() -> Self {
        Self {
            offset: Vec2::zeros(),
            size: Vec2::new(0.5, 0.5),
            density: 1.0,
            friction: 0.5,
            restitution: 0.0,
            restitution_threshold: 0.5,
            runtime_fixture: None,
        }
    }
}

impl BoxCollider2DComponent {
    /// Create a box collider with the given half extents
    pub fn new(half_width: f32, half_height: f32) -> Self {
        Self {
            size: Vec2::new(half_width, half_height),
            ..Default::default()
        }
    }

    /// Builder pattern: Set centre offset
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Builder pattern: Set density
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Builder pattern: Set restitution
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Builder pattern: Set friction
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }
}

impl Component for BoxCollider2DComponent {
    fn duplicate(&self) -> Self {
        Self {
            runtime_fixture: None,
            ..self.clone()
        }
    }
}

/// Circle collider
#[derive(Debug, Clone, PartialEq)]
pub struct CircleCollider2DComponent {
    /// Centre offset from the body origin
    pub offset: Vec2,
    /// Radius before transform scale is applied
    pub radius: f32,
    /// Mass per unit area
    pub density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounciness
    pub restitution: f32,
    /// Impact speed below which restitution is ignored
    pub restitution_threshold: f32,
    /// Fixture in the live physics world
    pub runtime_fixture: Option<FixtureHandle>,
}

impl Default for CircleCollider2DComponent {
    fn default() -> Self {
        Self {
            offset: Vec2::zeros(),
            radius: 0.5,
            density: 1.0,
            friction: 0.5,
            restitution: 0.0,
            restitution_threshold: 0.5,
            runtime_fixture: None,
        }
    }
}

impl CircleCollider2DComponent {
    /// Create a circle collider with the given radius
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            ..Default::default()
        }
    }

    /// Builder pattern: Set centre offset
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Builder pattern: Set density
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Builder pattern: Set restitution
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Builder pattern: Set friction
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }
}

impl Component for CircleCollider2DComponent {
    fn duplicate(&self) -> Self {
        Self {
            runtime_fixture: None,
            ..self.clone()
        }
    }
}
