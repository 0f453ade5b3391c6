//! 2D rigid-body physics
//!
//! [`PhysicsWorld`] is a small Box2D-style simulation: generational body and
//! fixture handles, an all-pairs broadphase with AABB culling, polygon and
//! circle narrowphase, and a sequential impulse solver. The world is locked
//! for the duration of [`PhysicsWorld::step`]; structural changes are
//! refused while locked.
//!
//! [`PhysicsBridge`] keeps a world in sync with the ECS physics components.

pub mod body;
pub mod shape;
pub mod manifold;
pub mod contact;
pub mod world;
mod solver;
pub mod bridge;

pub use body::{BodyDef, BodyHandle, BodyType};
pub use shape::{Aabb, Circle, FixtureDef, FixtureHandle, Polygon, Shape};
pub use manifold::Manifold;
pub use contact::{ContactEvent, ContactListener, ContactPhase, NullContactListener};
pub use world::PhysicsWorld;
pub use bridge::PhysicsBridge;

use thiserror::Error;

/// Penetration allowed before position correction kicks in, in metres
pub const LINEAR_SLOP: f32 = 0.005;

/// Errors raised by the physics world
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Gravity had a NaN or infinite component
    #[error("Invalid gravity vector ({0}, {1})")]
    InvalidGravity(f32, f32),

    /// Structural change requested during a step
    #[error("Physics world is locked")]
    Locked,

    /// Body handle is stale
    #[error("Unknown body handle")]
    InvalidBody,

    /// Fixture handle is stale
    #[error("Unknown fixture handle")]
    InvalidFixture,

    /// Shape has a degenerate size or non-finite parameters
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
}
