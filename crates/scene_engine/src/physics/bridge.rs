//! Physics bridge
//!
//! Mirrors rigid-body and collider components into a [`PhysicsWorld`] and
//! copies simulated motion back into transforms. The bridge is the only owner
//! of bodies and fixtures; components just carry the handles.
//!
//! Transform scale is baked into fixture sizes when the world is built. A later
//! scale change has no effect until the next [`PhysicsBridge::rebuild`].

use super::{
    BodyDef, BodyHandle, BodyType, ContactEvent, ContactListener, FixtureDef, PhysicsError, PhysicsWorld, Shape,
};
use crate::config::SceneConfig;
use crate::ecs::components::{
    BoxCollider2DComponent, CircleCollider2DComponent, ComponentKind, IdComponent, RigidBody2DComponent,
    TransformComponent,
};
use crate::ecs::{Entity, Registry};
use crate::foundation::math::Vec2;

/// Owns the physics world of one scene
pub struct PhysicsBridge {
    world: Option<PhysicsWorld>,
    gravity: Vec2,
    velocity_iterations: u32,
    position_iterations: u32,
}

impl PhysicsBridge {
    /// Create an inactive bridge; no world exists until [`rebuild`](Self::rebuild)
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            world: None,
            gravity: config.gravity_vector(),
            velocity_iterations: config.velocity_iterations,
            position_iterations: config.position_iterations,
        }
    }

    /// Whether a world currently exists
    pub fn is_active(&self) -> bool {
        self.world.is_some()
    }

    /// The live world, if any
    pub fn world(&self) -> Option<&PhysicsWorld> {
        self.world.as_ref()
    }

    /// Whether the world is mid-step
    pub fn is_locked(&self) -> bool {
        self.world.as_ref().is_some_and(PhysicsWorld::is_locked)
    }

    #[cfg(test)]
    pub(crate) fn set_locked(&mut self, locked: bool) {
        if let Some(world) = self.world.as_mut() {
            world.set_locked(locked);
        }
    }

    /// Discard any existing world and build a fresh one from the components
    pub fn rebuild(&mut self, registry: &mut Registry) -> Result<(), PhysicsError> {
        if self.is_locked() {
            return Err(PhysicsError::Locked);
        }
        self.clear(registry);

        let mut world = PhysicsWorld::new(self.gravity)?;
        let mut bodies = 0;
        for entity in registry.view::<(RigidBody2DComponent, TransformComponent)>() {
            if let Err(err) = Self::build_body(&mut world, registry, entity) {
                self.clear(registry);
                return Err(err);
            }
            bodies += 1;
        }
        log::info!(
            "Physics world rebuilt: {} bodies, {} fixtures",
            bodies,
            world.fixture_count()
        );
        self.world = Some(world);
        Ok(())
    }

    /// Drop the world and clear every runtime handle
    pub fn clear(&mut self, registry: &mut Registry) {
        if self.world.take().is_some() {
            log::debug!("Physics world destroyed");
        }
        registry.each_mut::<RigidBody2DComponent>(|_, body| body.runtime_body = None);
        registry.each_mut::<BoxCollider2DComponent>(|_, collider| collider.runtime_fixture = None);
        registry.each_mut::<CircleCollider2DComponent>(|_, collider| collider.runtime_fixture = None);
    }

    fn build_body(world: &mut PhysicsWorld, registry: &mut Registry, entity: Entity) -> Result<(), PhysicsError> {
        let Some(transform) = registry.get_component::<TransformComponent>(entity).cloned() else {
            return Ok(());
        };
        let Some(rigid_body) = registry.get_component::<RigidBody2DComponent>(entity) else {
            return Ok(());
        };
        let user_data = registry
            .get_component::<IdComponent>(entity)
            .map_or(0, |id| id.id.raw());

        let def = BodyDef::new(rigid_body.body_type)
            .with_position(transform.position_2d())
            .with_angle(transform.rotation.z)
            .with_fixed_rotation(rigid_body.fixed_rotation)
            .with_user_data(user_data);
        let body = world.create_body(&def)?;
        if let Some(rigid_body) = registry.get_component_mut::<RigidBody2DComponent>(entity) {
            rigid_body.runtime_body = Some(body);
        }

        if let Some(collider) = registry.get_component_mut::<BoxCollider2DComponent>(entity) {
            let shape = Shape::boxed(
                collider.size.x * transform.scale.x,
                collider.size.y * transform.scale.y,
                collider.offset,
            );
            let def = FixtureDef::new(shape)
                .with_density(collider.density)
                .with_friction(collider.friction)
                .with_restitution(collider.restitution)
                .with_restitution_threshold(collider.restitution_threshold);
            match world.create_fixture(body, &def) {
                Ok(fixture) => collider.runtime_fixture = Some(fixture),
                Err(err) => log::warn!("Skipping box collider on {entity:?}: {err}"),
            }
        }

        if let Some(collider) = registry.get_component_mut::<CircleCollider2DComponent>(entity) {
            let shape = Shape::circle(collider.radius * transform.scale.x, collider.offset);
            let def = FixtureDef::new(shape)
                .with_density(collider.density)
                .with_friction(collider.friction)
                .with_restitution(collider.restitution)
                .with_restitution_threshold(collider.restitution_threshold);
            match world.create_fixture(body, &def) {
                Ok(fixture) => collider.runtime_fixture = Some(fixture),
                Err(err) => log::warn!("Skipping circle collider on {entity:?}: {err}"),
            }
        }
        Ok(())
    }

    /// Step the world and write body poses back into transforms
    ///
    /// Only `position.x`, `position.y` and `rotation.z` are written.
    pub fn step(&mut self, dt: f32, registry: &mut Registry, listener: &mut dyn ContactListener) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        world.step(dt, self.velocity_iterations, self.position_iterations, listener);

        for entity in registry.view::<(RigidBody2DComponent, TransformComponent)>() {
            let Some(body) = registry
                .get_component::<RigidBody2DComponent>(entity)
                .and_then(|rigid_body| rigid_body.runtime_body)
            else {
                continue;
            };
            let (Ok(position), Ok(angle)) = (world.position(body), world.angle(body)) else {
                continue;
            };
            if let Some(transform) = registry.get_component_mut::<TransformComponent>(entity) {
                transform.position.x = position.x;
                transform.position.y = position.y;
                transform.rotation.z = angle;
            }
        }
    }

    /// Destroy an entity's fixtures, then its body
    ///
    /// Refused with [`PhysicsError::Locked`] while the world is stepping; the
    /// caller must queue the request. Returns the touching contacts that ended
    /// with the fixtures.
    pub fn destroy_body(&mut self, registry: &mut Registry, entity: Entity) -> Result<Vec<ContactEvent>, PhysicsError> {
        if self.is_locked() {
            return Err(PhysicsError::Locked);
        }

        let box_fixture = registry
            .get_component_mut::<BoxCollider2DComponent>(entity)
            .and_then(|collider| collider.runtime_fixture.take());
        let circle_fixture = registry
            .get_component_mut::<CircleCollider2DComponent>(entity)
            .and_then(|collider| collider.runtime_fixture.take());
        let body = registry
            .get_component_mut::<RigidBody2DComponent>(entity)
            .and_then(|rigid_body| rigid_body.runtime_body.take());

        let Some(world) = self.world.as_mut() else {
            return Ok(Vec::new());
        };
        let mut ended = Vec::new();
        for fixture in box_fixture.into_iter().chain(circle_fixture) {
            match world.destroy_fixture(fixture) {
                Ok(events) => ended.extend(events),
                Err(err) => log::debug!("Fixture of {entity:?} already gone: {err}"),
            }
        }
        if let Some(body) = body {
            ended.extend(world.destroy_body(body)?);
        }
        Ok(ended)
    }

    /// Free the physics resources owned by one component before it is removed
    ///
    /// A rigid body takes its fixtures with it; a collider only drops its own
    /// fixture. Other kinds own nothing. Contacts that ended are returned.
    pub fn release_component(
        &mut self,
        registry: &mut Registry,
        entity: Entity,
        kind: ComponentKind,
    ) -> Result<Vec<ContactEvent>, PhysicsError> {
        let fixture = match kind {
            ComponentKind::RigidBody2D => return self.destroy_body(registry, entity),
            ComponentKind::BoxCollider2D => registry
                .get_component_mut::<BoxCollider2DComponent>(entity)
                .and_then(|collider| collider.runtime_fixture.take()),
            ComponentKind::CircleCollider2D => registry
                .get_component_mut::<CircleCollider2DComponent>(entity)
                .and_then(|collider| collider.runtime_fixture.take()),
            _ => None,
        };
        let (Some(world), Some(fixture)) = (self.world.as_mut(), fixture) else {
            return Ok(Vec::new());
        };
        world.destroy_fixture(fixture)
    }

    /// Apply an impulse at a world point
    pub fn apply_linear_impulse(
        &mut self,
        registry: &Registry,
        entity: Entity,
        impulse: Vec2,
        point: Vec2,
    ) -> Result<(), PhysicsError> {
        let (world, body) = self.live_body(registry, entity)?;
        world.apply_linear_impulse(body, impulse, point)
    }

    /// Apply an impulse through the centre of mass
    pub fn apply_linear_impulse_to_center(
        &mut self,
        registry: &Registry,
        entity: Entity,
        impulse: Vec2,
    ) -> Result<(), PhysicsError> {
        let (world, body) = self.live_body(registry, entity)?;
        world.apply_linear_impulse_to_center(body, impulse)
    }

    /// Current linear velocity of the entity's body
    pub fn linear_velocity(&self, registry: &Registry, entity: Entity) -> Result<Vec2, PhysicsError> {
        let body = Self::body_handle(registry, entity)?;
        self.world
            .as_ref()
            .ok_or(PhysicsError::InvalidBody)?
            .linear_velocity(body)
    }

    /// Change the body type on the component and, if built, on the live body
    pub fn set_body_type(
        &mut self,
        registry: &mut Registry,
        entity: Entity,
        body_type: BodyType,
    ) -> Result<(), PhysicsError> {
        let rigid_body = registry
            .get_component_mut::<RigidBody2DComponent>(entity)
            .ok_or(PhysicsError::InvalidBody)?;
        if let (Some(world), Some(body)) = (self.world.as_mut(), rigid_body.runtime_body) {
            world.set_body_type(body, body_type)?;
        }
        rigid_body.body_type = body_type;
        Ok(())
    }

    /// Lock or unlock rotation on the component and any live body
    pub fn set_fixed_rotation(&mut self, registry: &mut Registry, entity: Entity, fixed: bool) -> Result<(), PhysicsError> {
        let rigid_body = registry
            .get_component_mut::<RigidBody2DComponent>(entity)
            .ok_or(PhysicsError::InvalidBody)?;
        if let (Some(world), Some(body)) = (self.world.as_mut(), rigid_body.runtime_body) {
            world.set_fixed_rotation(body, fixed)?;
        }
        rigid_body.fixed_rotation = fixed;
        Ok(())
    }

    fn body_handle(registry: &Registry, entity: Entity) -> Result<BodyHandle, PhysicsError> {
        registry
            .get_component::<RigidBody2DComponent>(entity)
            .and_then(|rigid_body| rigid_body.runtime_body)
            .ok_or(PhysicsError::InvalidBody)
    }

    fn live_body(&mut self, registry: &Registry, entity: Entity) -> Result<(&mut PhysicsWorld, BodyHandle), PhysicsError> {
        let body = Self::body_handle(registry, entity)?;
        let world = self.world.as_mut().ok_or(PhysicsError::InvalidBody)?;
        Ok((world, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::Uuid;
    use crate::foundation::math::Vec3;
    use crate::physics::NullContactListener;
    use approx::assert_relative_eq;

    fn spawn(registry: &mut Registry, position: Vec3, body_type: BodyType) -> Entity {
        let entity = registry.create();
        registry.add_component(entity, IdComponent { id: Uuid::new() }).unwrap();
        registry
            .add_component(entity, TransformComponent::from_position(position))
            .unwrap();
        registry.add_component(entity, RigidBody2DComponent::new(body_type)).unwrap();
        entity
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let entity = spawn(&mut registry, Vec3::zeros(), BodyType::Dynamic);
        registry.add_component(entity, BoxCollider2DComponent::default()).unwrap();

        bridge.rebuild(&mut registry).unwrap();
        let first = registry.component::<RigidBody2DComponent>(entity).unwrap().runtime_body;
        bridge.rebuild(&mut registry).unwrap();
        let second = registry.component::<RigidBody2DComponent>(entity).unwrap().runtime_body;

        let world = bridge.world().unwrap();
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.fixture_count(), 1);
        assert!(first.is_some() && second.is_some());
        assert_eq!(world.user_data(second.unwrap()).unwrap(), registry.component::<IdComponent>(entity).unwrap().id.raw());
    }

    #[test]
    fn test_scale_is_baked_into_fixtures() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let entity = spawn(&mut registry, Vec3::zeros(), BodyType::Dynamic);
        registry.get_component_mut::<TransformComponent>(entity).unwrap().scale = Vec3::new(2.0, 3.0, 1.0);
        registry.add_component(entity, BoxCollider2DComponent::new(0.5, 0.5)).unwrap();

        bridge.rebuild(&mut registry).unwrap();
        let body = registry.component::<RigidBody2DComponent>(entity).unwrap().runtime_body.unwrap();
        // 2 x 3 box at density 1
        assert_relative_eq!(bridge.world().unwrap().mass(body).unwrap(), 6.0, epsilon = 1e-4);
    }

    #[test]
    fn test_zero_step_keeps_transforms() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let entity = spawn(&mut registry, Vec3::new(1.0, 2.0, 3.0), BodyType::Dynamic);
        registry.get_component_mut::<TransformComponent>(entity).unwrap().rotation = Vec3::new(0.1, 0.2, 0.3);

        bridge.rebuild(&mut registry).unwrap();
        bridge.step(0.0, &mut registry, &mut NullContactListener);

        let transform = registry.component::<TransformComponent>(entity).unwrap();
        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.rotation, Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_step_writes_xy_and_angle_only() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let entity = spawn(&mut registry, Vec3::new(0.0, 10.0, 4.0), BodyType::Dynamic);

        bridge.rebuild(&mut registry).unwrap();
        bridge.step(1.0 / 60.0, &mut registry, &mut NullContactListener);

        let transform = registry.component::<TransformComponent>(entity).unwrap();
        assert!(transform.position.y < 10.0);
        assert_eq!(transform.position.z, 4.0);
    }

    #[test]
    fn test_destroy_body_and_clear() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let entity = spawn(&mut registry, Vec3::zeros(), BodyType::Dynamic);
        registry.add_component(entity, CircleCollider2DComponent::default()).unwrap();
        let other = spawn(&mut registry, Vec3::new(5.0, 0.0, 0.0), BodyType::Static);
        bridge.rebuild(&mut registry).unwrap();

        bridge.destroy_body(&mut registry, entity).unwrap();
        assert_eq!(bridge.world().unwrap().body_count(), 1);
        assert_eq!(bridge.world().unwrap().fixture_count(), 0);
        assert!(registry.component::<CircleCollider2DComponent>(entity).unwrap().runtime_fixture.is_none());

        bridge.clear(&mut registry);
        assert!(!bridge.is_active());
        assert!(registry.component::<RigidBody2DComponent>(other).unwrap().runtime_body.is_none());
    }

    #[test]
    fn test_release_collider_keeps_body() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let entity = spawn(&mut registry, Vec3::zeros(), BodyType::Dynamic);
        registry.add_component(entity, BoxCollider2DComponent::default()).unwrap();
        bridge.rebuild(&mut registry).unwrap();

        bridge
            .release_component(&mut registry, entity, ComponentKind::BoxCollider2D)
            .unwrap();
        assert_eq!(bridge.world().unwrap().fixture_count(), 0);
        assert_eq!(bridge.world().unwrap().body_count(), 1);
        assert!(bridge
            .release_component(&mut registry, entity, ComponentKind::Camera)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_destroy_body_reports_ended_contacts() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let ground = spawn(&mut registry, Vec3::zeros(), BodyType::Static);
        registry.add_component(ground, BoxCollider2DComponent::new(5.0, 0.5)).unwrap();
        let ball = spawn(&mut registry, Vec3::new(0.0, 0.9, 0.0), BodyType::Dynamic);
        registry.add_component(ball, CircleCollider2DComponent::new(0.5)).unwrap();
        bridge.rebuild(&mut registry).unwrap();
        bridge.step(0.0, &mut registry, &mut NullContactListener);

        let ended = bridge.destroy_body(&mut registry, ball).unwrap();
        assert_eq!(ended.len(), 1);
        let ids = [ended[0].user_data_a, ended[0].user_data_b];
        assert!(ids.contains(&registry.component::<IdComponent>(ground).unwrap().id.raw()));
        assert!(ids.contains(&registry.component::<IdComponent>(ball).unwrap().id.raw()));
        assert!(bridge.destroy_body(&mut registry, ball).unwrap().is_empty());
    }

    #[test]
    fn test_set_body_type_updates_component_and_body() {
        let mut registry = Registry::new();
        let mut bridge = PhysicsBridge::new(&SceneConfig::default());
        let entity = spawn(&mut registry, Vec3::zeros(), BodyType::Dynamic);

        bridge.set_body_type(&mut registry, entity, BodyType::Kinematic).unwrap();
        assert_eq!(registry.component::<RigidBody2DComponent>(entity).unwrap().body_type, BodyType::Kinematic);

        bridge.rebuild(&mut registry).unwrap();
        bridge.set_body_type(&mut registry, entity, BodyType::Dynamic).unwrap();
        let body = registry.component::<RigidBody2DComponent>(entity).unwrap().runtime_body.unwrap();
        assert_eq!(bridge.world().unwrap().body_type(body).unwrap(), BodyType::Dynamic);

        bridge.apply_linear_impulse_to_center(&registry, entity, Vec2::new(2.0, 0.0)).unwrap();
        assert_relative_eq!(bridge.linear_velocity(&registry, entity).unwrap().x, 2.0, epsilon = 1e-6);
    }
}
