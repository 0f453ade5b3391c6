//! Sequential impulse solver
//!
//! Works on a dense copy of the bodies so pairs can be updated without
//! juggling two mutable borrows into the body map. Results are written back
//! once the step is finished.

use std::collections::{BTreeMap, HashMap};

use slotmap::SlotMap;

use super::body::Body;
use super::manifold::{collide, Manifold};
use super::shape::Fixture;
use super::{BodyHandle, BodyType, FixtureHandle, LINEAR_SLOP};
use crate::foundation::math::{cross, cross_sv, Transform2, Vec2};

const BAUMGARTE: f32 = 0.2;
const MAX_LINEAR_CORRECTION: f32 = 0.2;
const MAX_TRANSLATION: f32 = 2.0;
const MAX_ROTATION: f32 = 0.5 * std::f32::consts::PI;

#[derive(Debug, Clone, Copy)]
struct SolverBody {
    handle: BodyHandle,
    body_type: BodyType,
    position: Vec2,
    angle: f32,
    v: Vec2,
    w: f32,
    inv_mass: f32,
    inv_inertia: f32,
    gravity_scale: f32,
}

impl SolverBody {
    fn transform(&self) -> Transform2 {
        Transform2::new(self.position, self.angle)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
}

struct ContactConstraint {
    index_a: usize,
    index_b: usize,
    fixture_a: FixtureHandle,
    fixture_b: FixtureHandle,
    normal: Vec2,
    points: Vec<ConstraintPoint>,
    friction: f32,
}

/// Step parameters shared by the solver phases
pub(crate) struct StepConfig {
    pub dt: f32,
    pub gravity: Vec2,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

pub(crate) fn solve(
    step: &StepConfig,
    bodies: &mut SlotMap<BodyHandle, Body>,
    fixtures: &SlotMap<FixtureHandle, Fixture>,
    contacts: &BTreeMap<(FixtureHandle, FixtureHandle), Manifold>,
) {
    let mut solver_bodies: Vec<SolverBody> = bodies
        .iter()
        .map(|(handle, body)| SolverBody {
            handle,
            body_type: body.body_type,
            position: body.position,
            angle: body.angle,
            v: body.linear_velocity,
            w: body.angular_velocity,
            inv_mass: body.inv_mass,
            inv_inertia: body.inv_inertia,
            gravity_scale: body.gravity_scale,
        })
        .collect();
    let index: HashMap<BodyHandle, usize> = solver_bodies
        .iter()
        .enumerate()
        .map(|(i, body)| (body.handle, i))
        .collect();

    for body in &mut solver_bodies {
        if body.body_type == BodyType::Dynamic {
            body.v += step.dt * body.gravity_scale * step.gravity;
        }
    }

    let mut constraints = build_constraints(&solver_bodies, &index, fixtures, contacts);

    for _ in 0..step.velocity_iterations {
        for constraint in &mut constraints {
            solve_velocity(constraint, &mut solver_bodies);
        }
    }

    integrate_positions(step.dt, &mut solver_bodies);

    for _ in 0..step.position_iterations {
        let mut min_separation = 0.0_f32;
        for constraint in &constraints {
            min_separation = min_separation.min(solve_position(constraint, &mut solver_bodies, fixtures));
        }
        if min_separation >= -3.0 * LINEAR_SLOP {
            break;
        }
    }

    for solved in &solver_bodies {
        if let Some(body) = bodies.get_mut(solved.handle) {
            body.position = solved.position;
            body.angle = solved.angle;
            body.linear_velocity = solved.v;
            body.angular_velocity = solved.w;
        }
    }
}

fn build_constraints(
    solver_bodies: &[SolverBody],
    index: &HashMap<BodyHandle, usize>,
    fixtures: &SlotMap<FixtureHandle, Fixture>,
    contacts: &BTreeMap<(FixtureHandle, FixtureHandle), Manifold>,
) -> Vec<ContactConstraint> {
    let mut constraints = Vec::with_capacity(contacts.len());
    for (&(fixture_a, fixture_b), manifold) in contacts {
        let (Some(fa), Some(fb)) = (fixtures.get(fixture_a), fixtures.get(fixture_b)) else {
            continue;
        };
        let (Some(&index_a), Some(&index_b)) = (index.get(&fa.body), index.get(&fb.body)) else {
            continue;
        };

        let a = &solver_bodies[index_a];
        let b = &solver_bodies[index_b];
        let friction = (fa.friction * fb.friction).max(0.0).sqrt();
        let restitution = fa.restitution.max(fb.restitution);
        let threshold = fa.restitution_threshold.min(fb.restitution_threshold);
        let normal = manifold.normal;
        let tangent = Vec2::new(normal.y, -normal.x);

        let points = manifold
            .points()
            .iter()
            .map(|point| {
                let r_a = point - a.position;
                let r_b = point - b.position;
                let effective_mass = |axis: &Vec2| {
                    let rn_a = cross(&r_a, axis);
                    let rn_b = cross(&r_b, axis);
                    let k = a.inv_mass + b.inv_mass + a.inv_inertia * rn_a * rn_a + b.inv_inertia * rn_b * rn_b;
                    if k > 0.0 { 1.0 / k } else { 0.0 }
                };

                let dv = b.v + cross_sv(b.w, &r_b) - a.v - cross_sv(a.w, &r_a);
                let v_rel = normal.dot(&dv);
                let velocity_bias = if v_rel < -threshold { -restitution * v_rel } else { 0.0 };

                ConstraintPoint {
                    r_a,
                    r_b,
                    normal_mass: effective_mass(&normal),
                    tangent_mass: effective_mass(&tangent),
                    velocity_bias,
                    ..Default::default()
                }
            })
            .collect();

        constraints.push(ContactConstraint {
            index_a,
            index_b,
            fixture_a,
            fixture_b,
            normal,
            points,
            friction,
        });
    }
    constraints
}

fn solve_velocity(constraint: &mut ContactConstraint, bodies: &mut [SolverBody]) {
    let mut a = bodies[constraint.index_a];
    let mut b = bodies[constraint.index_b];
    let normal = constraint.normal;
    let tangent = Vec2::new(normal.y, -normal.x);

    // Friction first so the normal impulse has the final say on penetration
    for point in &mut constraint.points {
        let dv = b.v + cross_sv(b.w, &point.r_b) - a.v - cross_sv(a.w, &point.r_a);
        let lambda = -point.tangent_mass * dv.dot(&tangent);
        let max_friction = constraint.friction * point.normal_impulse;
        let accumulated = (point.tangent_impulse + lambda).clamp(-max_friction, max_friction);
        let applied = accumulated - point.tangent_impulse;
        point.tangent_impulse = accumulated;
        apply_impulse(&mut a, &mut b, point, applied * tangent);
    }

    for point in &mut constraint.points {
        let dv = b.v + cross_sv(b.w, &point.r_b) - a.v - cross_sv(a.w, &point.r_a);
        let lambda = -point.normal_mass * (dv.dot(&normal) - point.velocity_bias);
        let accumulated = (point.normal_impulse + lambda).max(0.0);
        let applied = accumulated - point.normal_impulse;
        point.normal_impulse = accumulated;
        apply_impulse(&mut a, &mut b, point, applied * normal);
    }

    bodies[constraint.index_a] = a;
    bodies[constraint.index_b] = b;
}

fn apply_impulse(a: &mut SolverBody, b: &mut SolverBody, point: &ConstraintPoint, impulse: Vec2) {
    a.v -= a.inv_mass * impulse;
    a.w -= a.inv_inertia * cross(&point.r_a, &impulse);
    b.v += b.inv_mass * impulse;
    b.w += b.inv_inertia * cross(&point.r_b, &impulse);
}

fn integrate_positions(dt: f32, bodies: &mut [SolverBody]) {
    for body in bodies.iter_mut().filter(|body| body.body_type != BodyType::Static) {
        let translation = dt * body.v;
        if translation.norm_squared() > MAX_TRANSLATION * MAX_TRANSLATION {
            body.v *= MAX_TRANSLATION / translation.norm();
        }
        let rotation = dt * body.w;
        if rotation * rotation > MAX_ROTATION * MAX_ROTATION {
            body.w *= MAX_ROTATION / rotation.abs();
        }
        body.position += dt * body.v;
        body.angle += dt * body.w;
    }
}

/// Push overlapping pairs apart; returns the deepest separation seen
fn solve_position(
    constraint: &ContactConstraint,
    bodies: &mut [SolverBody],
    fixtures: &SlotMap<FixtureHandle, Fixture>,
) -> f32 {
    let (Some(fa), Some(fb)) = (fixtures.get(constraint.fixture_a), fixtures.get(constraint.fixture_b)) else {
        return 0.0;
    };
    let mut a = bodies[constraint.index_a];
    let mut b = bodies[constraint.index_b];
    let mut min_separation = 0.0_f32;

    if let Some(manifold) = collide(&fa.shape, &a.transform(), &fb.shape, &b.transform()) {
        let normal = manifold.normal;
        for (point, separation) in manifold.points().iter().zip(manifold.separations()) {
            let r_a = point - a.position;
            let r_b = point - b.position;
            min_separation = min_separation.min(*separation);

            let correction = (BAUMGARTE * (separation + LINEAR_SLOP)).clamp(-MAX_LINEAR_CORRECTION, 0.0);
            let rn_a = cross(&r_a, &normal);
            let rn_b = cross(&r_b, &normal);
            let k = a.inv_mass + b.inv_mass + a.inv_inertia * rn_a * rn_a + b.inv_inertia * rn_b * rn_b;
            let impulse = if k > 0.0 { -correction / k } else { 0.0 };
            let p = impulse * normal;

            a.position -= a.inv_mass * p;
            a.angle -= a.inv_inertia * cross(&r_a, &p);
            b.position += b.inv_mass * p;
            b.angle += b.inv_inertia * cross(&r_b, &p);
        }
    }

    bodies[constraint.index_a] = a;
    bodies[constraint.index_b] = b;
    min_separation
}
