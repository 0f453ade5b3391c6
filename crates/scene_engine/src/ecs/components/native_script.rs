//! Native script component

use std::fmt;
use std::rc::Rc;

use crate::ecs::Component;
use crate::scene::NativeScript;

type ScriptFactory = Rc<dyn Fn() -> Box<dyn NativeScript>>;

/// Per-entity Rust behaviour
///
/// The instance is created lazily by the first runtime update and dropped
/// when the runtime stops.
pub struct NativeScriptComponent {
    factory: ScriptFactory,
    pub(crate) instance: Option<Box<dyn NativeScript>>,
}

impl NativeScriptComponent {
    /// Bind a default-constructible script type
    pub fn bind<T: NativeScript + Default + 'static>() -> Self {
        Self::from_factory(|| Box::new(T::default()))
    }

    /// Bind a script produced by a factory closure
    pub fn from_factory(factory: impl Fn() -> Box<dyn NativeScript> + 'static) -> Self {
        Self {
            factory: Rc::new(factory),
            instance: None,
        }
    }

    /// Whether the script has been instantiated
    pub fn is_instantiated(&self) -> bool {
        self.instance.is_some()
    }

    pub(crate) fn instantiate(&self) -> Box<dyn NativeScript> {
        (self.factory)()
    }
}

impl Clone for NativeScriptComponent {
    fn clone(&self) -> Self {
        Self {
            factory: Rc::clone(&self.factory),
            instance: None,
        }
    }
}

impl fmt::Debug for NativeScriptComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeScriptComponent")
            .field("instantiated", &self.instance.is_some())
            .finish()
    }
}

impl Component for NativeScriptComponent {}
