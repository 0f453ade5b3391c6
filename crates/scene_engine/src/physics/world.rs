//! Physics world

use std::collections::BTreeMap;

use slotmap::SlotMap;

use super::body::Body;
use super::manifold::{collide, Manifold};
use super::shape::Fixture;
use super::solver::{self, StepConfig};
use super::{
    BodyDef, BodyHandle, BodyType, ContactEvent, ContactListener, ContactPhase, FixtureDef, FixtureHandle,
    PhysicsError,
};
use crate::foundation::math::{cross, Vec2};

type ContactKey = (FixtureHandle, FixtureHandle);

/// Box2D-style rigid body world
///
/// Bodies and fixtures are addressed by generational handles; a handle to a
/// destroyed body is simply reported as [`PhysicsError::InvalidBody`].
pub struct PhysicsWorld {
    gravity: Vec2,
    bodies: SlotMap<BodyHandle, Body>,
    fixtures: SlotMap<FixtureHandle, Fixture>,
    /// Touching pairs keyed by (lower, higher) fixture handle
    contacts: BTreeMap<ContactKey, Manifold>,
    locked: bool,
}

impl PhysicsWorld {
    /// Create an empty world
    pub fn new(gravity: Vec2) -> Result<Self, PhysicsError> {
        if !gravity.x.is_finite() || !gravity.y.is_finite() {
            return Err(PhysicsError::InvalidGravity(gravity.x, gravity.y));
        }
        Ok(Self {
            gravity,
            bodies: SlotMap::with_key(),
            fixtures: SlotMap::with_key(),
            contacts: BTreeMap::new(),
            locked: false,
        })
    }

    /// World gravity
    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    /// Whether a step is in progress
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[cfg(test)]
    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of live fixtures
    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// Number of touching fixture pairs
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Add a body
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle, PhysicsError> {
        if self.locked {
            return Err(PhysicsError::Locked);
        }
        if !def.position.x.is_finite() || !def.position.y.is_finite() || !def.angle.is_finite() {
            return Err(PhysicsError::InvalidShape("body placement must be finite".to_string()));
        }
        Ok(self.bodies.insert(Body::new(def)))
    }

    /// Remove a body and all of its fixtures
    ///
    /// Returns an end event for every pair the body was touching, in pair
    /// order. No listener is called; the caller relays them.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<Vec<ContactEvent>, PhysicsError> {
        if self.locked {
            return Err(PhysicsError::Locked);
        }
        let fixtures = self.body(handle)?.fixtures.clone();
        let ended = self.end_contacts_of(&fixtures);
        for fixture in fixtures {
            self.fixtures.remove(fixture);
        }
        self.bodies.remove(handle);
        Ok(ended)
    }

    /// Attach a shape to a body
    pub fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Result<FixtureHandle, PhysicsError> {
        if self.locked {
            return Err(PhysicsError::Locked);
        }
        if !self.bodies.contains_key(body) {
            return Err(PhysicsError::InvalidBody);
        }
        def.shape.validate()?;
        if !def.density.is_finite() || def.density < 0.0 {
            return Err(PhysicsError::InvalidShape(format!("density {} is not valid", def.density)));
        }

        let handle = self.fixtures.insert(Fixture::new(body, def));
        if let Some(owner) = self.bodies.get_mut(body) {
            owner.fixtures.push(handle);
        }
        self.reset_mass(body);
        Ok(handle)
    }

    /// Detach a fixture from its body
    ///
    /// Like [`destroy_body`](Self::destroy_body), touching pairs are returned
    /// as end events.
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> Result<Vec<ContactEvent>, PhysicsError> {
        if self.locked {
            return Err(PhysicsError::Locked);
        }
        if !self.fixtures.contains_key(handle) {
            return Err(PhysicsError::InvalidFixture);
        }
        let ended = self.end_contacts_of(&[handle]);
        let fixture = self.fixtures.remove(handle).ok_or(PhysicsError::InvalidFixture)?;
        if let Some(body) = self.bodies.get_mut(fixture.body) {
            body.fixtures.retain(|&f| f != handle);
        }
        self.reset_mass(fixture.body);
        Ok(ended)
    }

    /// Fixtures attached to a body
    pub fn body_fixtures(&self, handle: BodyHandle) -> Result<&[FixtureHandle], PhysicsError> {
        Ok(&self.body(handle)?.fixtures)
    }

    /// Advance the simulation
    ///
    /// Contacts are refreshed first and reported to `listener`, then, for a
    /// positive `dt`, the solver runs. The world stays locked throughout.
    pub fn step(
        &mut self,
        dt: f32,
        velocity_iterations: u32,
        position_iterations: u32,
        listener: &mut dyn ContactListener,
    ) {
        self.locked = true;
        self.update_contacts(listener);
        if dt > 0.0 {
            let config = StepConfig {
                dt,
                gravity: self.gravity,
                velocity_iterations,
                position_iterations,
            };
            solver::solve(&config, &mut self.bodies, &self.fixtures, &self.contacts);
        }
        self.locked = false;
    }

    /// Body origin in world space
    pub fn position(&self, handle: BodyHandle) -> Result<Vec2, PhysicsError> {
        Ok(self.body(handle)?.position)
    }

    /// Body angle in radians
    pub fn angle(&self, handle: BodyHandle) -> Result<f32, PhysicsError> {
        Ok(self.body(handle)?.angle)
    }

    /// Body linear velocity
    pub fn linear_velocity(&self, handle: BodyHandle) -> Result<Vec2, PhysicsError> {
        Ok(self.body(handle)?.linear_velocity)
    }

    /// Body angular velocity
    pub fn angular_velocity(&self, handle: BodyHandle) -> Result<f32, PhysicsError> {
        Ok(self.body(handle)?.angular_velocity)
    }

    /// Overwrite the linear velocity; ignored for static bodies
    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec2) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.body_type != BodyType::Static {
            body.linear_velocity = velocity;
        }
        Ok(())
    }

    /// Apply an impulse at a world point; only dynamic bodies respond
    pub fn apply_linear_impulse(&mut self, handle: BodyHandle, impulse: Vec2, point: Vec2) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.body_type == BodyType::Dynamic {
            body.linear_velocity += body.inv_mass * impulse;
            body.angular_velocity += body.inv_inertia * cross(&(point - body.position), &impulse);
        }
        Ok(())
    }

    /// Apply an impulse through the centre of mass
    pub fn apply_linear_impulse_to_center(&mut self, handle: BodyHandle, impulse: Vec2) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.body_type == BodyType::Dynamic {
            body.linear_velocity += body.inv_mass * impulse;
        }
        Ok(())
    }

    /// Body simulation mode
    pub fn body_type(&self, handle: BodyHandle) -> Result<BodyType, PhysicsError> {
        Ok(self.body(handle)?.body_type)
    }

    /// Change the simulation mode and recompute mass
    pub fn set_body_type(&mut self, handle: BodyHandle, body_type: BodyType) -> Result<(), PhysicsError> {
        if self.locked {
            return Err(PhysicsError::Locked);
        }
        let body = self.body_mut(handle)?;
        if body.body_type == body_type {
            return Ok(());
        }
        body.body_type = body_type;
        if body_type == BodyType::Static {
            body.linear_velocity = Vec2::zeros();
            body.angular_velocity = 0.0;
        }
        self.reset_mass(handle);
        Ok(())
    }

    /// Lock or unlock rotation and recompute mass
    pub fn set_fixed_rotation(&mut self, handle: BodyHandle, fixed: bool) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.fixed_rotation == fixed {
            return Ok(());
        }
        body.fixed_rotation = fixed;
        body.angular_velocity = 0.0;
        self.reset_mass(handle);
        Ok(())
    }

    /// Whether the body's rotation is locked
    pub fn is_fixed_rotation(&self, handle: BodyHandle) -> Result<bool, PhysicsError> {
        Ok(self.body(handle)?.fixed_rotation)
    }

    /// Body mass, zero for static and kinematic bodies
    pub fn mass(&self, handle: BodyHandle) -> Result<f32, PhysicsError> {
        Ok(self.body(handle)?.mass)
    }

    /// User data stored at creation
    pub fn user_data(&self, handle: BodyHandle) -> Result<u64, PhysicsError> {
        Ok(self.body(handle)?.user_data)
    }

    /// Body owning a fixture
    pub fn fixture_body(&self, handle: FixtureHandle) -> Result<BodyHandle, PhysicsError> {
        self.fixtures
            .get(handle)
            .map(|fixture| fixture.body)
            .ok_or(PhysicsError::InvalidFixture)
    }

    fn body(&self, handle: BodyHandle) -> Result<&Body, PhysicsError> {
        self.bodies.get(handle).ok_or(PhysicsError::InvalidBody)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, PhysicsError> {
        self.bodies.get_mut(handle).ok_or(PhysicsError::InvalidBody)
    }

    fn reset_mass(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let fixtures = &self.fixtures;
        let attached: Vec<&Fixture> = body.fixtures.iter().filter_map(|&f| fixtures.get(f)).collect();
        body.reset_mass(attached.into_iter());
    }

    /// Drop every touching pair involving one of `fixtures`
    ///
    /// Events are built before anything is removed so both user data values
    /// are still known.
    fn end_contacts_of(&mut self, fixtures: &[FixtureHandle]) -> Vec<ContactEvent> {
        let keys: Vec<ContactKey> = self
            .contacts
            .keys()
            .copied()
            .filter(|(a, b)| fixtures.contains(a) || fixtures.contains(b))
            .collect();
        let mut ended = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(manifold) = self.contacts.remove(&key) {
                ended.push(self.event(ContactPhase::End, key, manifold));
            }
        }
        ended
    }

    fn should_collide(&self, a: &Fixture, b: &Fixture) -> bool {
        if a.body == b.body {
            return false;
        }
        match (self.bodies.get(a.body), self.bodies.get(b.body)) {
            (Some(body_a), Some(body_b)) => {
                body_a.body_type == BodyType::Dynamic || body_b.body_type == BodyType::Dynamic
            }
            _ => false,
        }
    }

    /// Recompute touching pairs and report the differences
    fn update_contacts(&mut self, listener: &mut dyn ContactListener) {
        let placed: Vec<_> = self
            .fixtures
            .iter()
            .filter_map(|(handle, fixture)| {
                let xf = self.bodies.get(fixture.body)?.transform();
                Some((handle, fixture, xf, fixture.shape.aabb(&xf)))
            })
            .collect();

        let mut current = BTreeMap::new();
        for (i, (handle_i, fixture_i, xf_i, aabb_i)) in placed.iter().enumerate() {
            for (handle_j, fixture_j, xf_j, aabb_j) in &placed[i + 1..] {
                if !aabb_i.overlaps(aabb_j) || !self.should_collide(fixture_i, fixture_j) {
                    continue;
                }
                // Lower handle is always fixture A
                let (key, manifold) = if handle_i < handle_j {
                    ((*handle_i, *handle_j), collide(&fixture_i.shape, xf_i, &fixture_j.shape, xf_j))
                } else {
                    ((*handle_j, *handle_i), collide(&fixture_j.shape, xf_j, &fixture_i.shape, xf_i))
                };
                if let Some(manifold) = manifold {
                    current.insert(key, manifold);
                }
            }
        }

        let previous = std::mem::replace(&mut self.contacts, current);
        for (key, manifold) in &previous {
            if !self.contacts.contains_key(key) {
                let event = self.event(ContactPhase::End, *key, *manifold);
                listener.end_contact(&event);
            }
        }
        for (key, manifold) in &self.contacts {
            if !previous.contains_key(key) {
                let event = self.event(ContactPhase::Begin, *key, *manifold);
                listener.begin_contact(&event);
            }
        }
    }

    fn event(&self, phase: ContactPhase, (fixture_a, fixture_b): ContactKey, manifold: Manifold) -> ContactEvent {
        let user_data = |fixture: FixtureHandle| {
            self.fixtures
                .get(fixture)
                .and_then(|f| self.bodies.get(f.body))
                .map_or(0, |body| body.user_data)
        };
        ContactEvent {
            phase,
            fixture_a,
            fixture_b,
            user_data_a: user_data(fixture_a),
            user_data_b: user_data(fixture_b),
            manifold,
        }
    }
}
