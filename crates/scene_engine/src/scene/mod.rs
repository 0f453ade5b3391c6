//! Scene runtime
//!
//! A [`Scene`] owns the component store, the physics bridge and the scripting
//! bridge, and drives them through an `Editing` / `Running` state machine.
//!
//! While running, a frame is:
//! 1. native script updates
//! 2. physics step (collision hooks fire here, with the world locked)
//! 3. deferred work queued during the step
//! 4. script `on_update`

mod context;
mod handle;
mod native;
mod runtime;

#[cfg(test)]
mod tests;

pub use context::DeferredAction;
pub use handle::{EntityMut, EntityRef};
pub use native::NativeScript;
pub use runtime::{Scene, SceneState};

use thiserror::Error;

use crate::config::ConfigError;
use crate::ecs::components::Uuid;
use crate::ecs::{EcsError, Entity};
use crate::physics::PhysicsError;
use crate::script::ScriptError;

/// Errors raised by the scene runtime
#[derive(Error, Debug)]
pub enum SceneError {
    /// Physics world could not be built or changed
    #[error("Physics: {0}")]
    Physics(#[from] PhysicsError),

    /// Scripting host failure
    #[error("Scripting: {0}")]
    Script(#[from] ScriptError),

    /// Component store rejected the request
    #[error("Components: {0}")]
    Ecs(#[from] EcsError),

    /// Scene configuration is unusable
    #[error("Configuration: {0}")]
    Config(#[from] ConfigError),

    /// An entity already carries this id
    #[error("An entity with id {0} already exists")]
    DuplicateUuid(Uuid),

    /// Entity handle is stale
    #[error("Entity {0:?} does not exist")]
    NoSuchEntity(Entity),

    /// Operation not allowed in the current runtime state
    #[error("Invalid scene state: {0}")]
    InvalidState(&'static str),
}
