//! Native (Rust) per-entity scripts

use super::Scene;
use crate::ecs::Entity;

/// Per-entity behaviour written in Rust
///
/// Instances are created lazily on the first running frame, run before
/// physics every frame, and get `on_destroy` when the runtime stops.
pub trait NativeScript {
    /// First running frame, before the first update
    fn on_create(&mut self, _scene: &mut Scene, _entity: Entity) {}

    /// Every running frame
    fn on_update(&mut self, _scene: &mut Scene, _entity: Entity, _dt: f32) {}

    /// Runtime stop
    fn on_destroy(&mut self, _scene: &mut Scene, _entity: Entity) {}
}
