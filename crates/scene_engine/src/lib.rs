//! # Scene Engine
//!
//! Runtime core of an entity-based scene simulator.
//!
//! ## Features
//!
//! - **Component Store**: Typed, sparse per-kind component storage
//! - **2D Physics**: Rigid bodies, box and circle colliders, contact events
//! - **Scripting**: rhai classes bound to entities with lifecycle and collision hooks
//! - **Hot Reloading**: Script modules reload when their files change
//! - **Deferred Destruction**: Entities destroyed mid-step are removed after the step
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     let mut scene = Scene::new("Demo");
//!     let ball = scene.create_entity("Ball");
//!     scene.add_component(ball, RigidBody2DComponent::new(BodyType::Dynamic))?;
//!     scene.add_component(ball, CircleCollider2DComponent::new(0.5))?;
//!
//!     scene.start_runtime()?;
//!     for _ in 0..60 {
//!         scene.update_runtime(1.0 / 60.0)?;
//!     }
//!     scene.stop_runtime()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod physics;
pub mod script;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, SceneConfig},
        ecs::components::{
            BoxCollider2DComponent, CameraComponent, CircleCollider2DComponent, CircleRendererComponent,
            ComponentKind, IdComponent, NativeScriptComponent, RigidBody2DComponent, ScriptComponent,
            SpriteRendererComponent, TagComponent, TransformComponent, Uuid,
        },
        ecs::{Component, EcsError, Entity, Query, Registry},
        foundation::{
            math::{Vec2, Vec3, Vec4},
            time::{FixedTimestep, Timer},
        },
        physics::{BodyType, PhysicsError},
        scene::{EntityMut, EntityRef, NativeScript, Scene, SceneError, SceneState},
        script::{RhaiHost, ScriptError, ScriptHost, ScriptValue},
    };
}
