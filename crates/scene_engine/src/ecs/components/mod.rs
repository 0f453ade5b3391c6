//! ECS Components module
//!
//! Every entity carries [`IdComponent`], [`TagComponent`] and
//! [`TransformComponent`]; everything else is optional.

pub mod identity;
pub mod transform;
pub mod render;
pub mod camera;
pub mod physics;
pub mod script;
pub mod native_script;
pub mod kind;
pub mod bundle;

pub use identity::{IdComponent, TagComponent, Uuid};
pub use transform::TransformComponent;
pub use render::{CircleRendererComponent, ShaderHandle, SpriteRendererComponent, TextureHandle};
pub use camera::CameraComponent;
pub use physics::{BoxCollider2DComponent, CircleCollider2DComponent, RigidBody2DComponent};
pub use script::ScriptComponent;
pub use native_script::NativeScriptComponent;
pub use kind::{ComponentKind, ComponentMask};
pub use bundle::ComponentBundle;
