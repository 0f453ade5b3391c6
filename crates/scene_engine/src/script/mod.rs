//! Scripting bridge
//!
//! [`ScriptHost`] is the contract the scene needs from a scripting runtime:
//! a class table, instances bound to entity ids, hook invocation and
//! reflected field access. [`RhaiHost`] implements it on top of rhai.
//! [`ScriptingBridge`] keeps one host instance per script-bearing entity and
//! drives the lifecycle hooks.
//!
//! Scripts never touch the registry directly. They talk to a [`ScriptWorld`],
//! which answers reads from a per-pass snapshot and queues writes as
//! [`SceneCommand`]s for the scene to apply.

pub mod value;
pub mod host;
pub mod world;
pub mod watcher;
pub mod rhai_host;
pub mod bridge;

pub use value::ScriptValue;
pub use host::{hooks, CollisionInfo, FieldInfo, HookArg, InstanceHandle, ScriptHost};
pub use world::{ColliderField, EntitySnapshot, SceneCommand, ScriptWorld};
pub use watcher::ModuleWatcher;
pub use rhai_host::RhaiHost;
pub use bridge::{CollisionPhase, SceneAccess, ScriptingBridge};

use thiserror::Error;

/// Errors raised by the scripting layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// No loaded class has this name
    #[error("Script class '{0}' not found")]
    ClassNotFound(String),

    /// The class declares no field with this name
    #[error("Field '{field}' not found on script class '{class}'")]
    FieldNotFound {
        /// Class that was searched
        class: String,
        /// Requested field
        field: String,
    },

    /// Value does not fit the declared field type
    #[error("Field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Declared type
        expected: &'static str,
        /// Supplied type
        found: &'static str,
    },

    /// Instance handle was released or never existed
    #[error("Invalid script instance")]
    InvalidInstance,

    /// A class failed to compile
    #[error("Failed to compile '{class}': {message}")]
    Compile {
        /// Class being compiled
        class: String,
        /// Compiler diagnostic
        message: String,
    },

    /// A hook raised an error
    #[error("Script error in {class}::{hook}: {message}")]
    Runtime {
        /// Class of the failing instance
        class: String,
        /// Hook being invoked
        hook: String,
        /// Error text from the runtime
        message: String,
    },

    /// The script module could not be read
    #[error("Script module unavailable: {0}")]
    ModuleUnavailable(String),

    /// File watching could not be set up
    #[error("Failed to watch script module: {0}")]
    Watch(String),
}
