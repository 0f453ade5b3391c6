//! Script component

use std::collections::BTreeMap;

use crate::ecs::Component;
use crate::script::{InstanceHandle, ScriptValue};

/// Binds an entity to a script class
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptComponent {
    /// Fully-qualified class name resolved against the host's class table
    pub class_name: String,
    /// Host object while the runtime is running
    pub instance: Option<InstanceHandle>,
    /// Field values set before a host object exists
    pub fields: BTreeMap<String, ScriptValue>,
}

impl ScriptComponent {
    /// Bind to a class by name
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    /// Builder pattern: Buffer a field value for instantiation
    pub fn with_field(mut self, name: impl Into<String>, value: ScriptValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

impl Component for ScriptComponent {
    fn duplicate(&self) -> Self {
        Self {
            instance: None,
            ..self.clone()
        }
    }
}
