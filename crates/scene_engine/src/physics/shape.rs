//! Collision shapes and fixtures

use super::{BodyHandle, PhysicsError};
use crate::foundation::math::{cross, Rot2, Transform2, Vec2};

slotmap::new_key_type! {
    /// Handle to a fixture in a [`PhysicsWorld`](super::PhysicsWorld)
    pub struct FixtureHandle;
}

/// Circle in body space
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    /// Centre relative to the body origin
    pub center: Vec2,
    /// Radius
    pub radius: f32,
}

/// Convex polygon in body space, counter-clockwise winding
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Vertices relative to the body origin
    pub vertices: Vec<Vec2>,
    /// Outward edge normals; `normals[i]` belongs to edge `i -> i + 1`
    pub normals: Vec<Vec2>,
}

impl Polygon {
    /// Oriented box with the given half extents, centre and angle
    pub fn new_box(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let q = Rot2::new(angle);
        let corners = [
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ];
        let axes = [Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(-1.0, 0.0)];
        Self {
            vertices: corners.iter().map(|v| q.apply(v) + center).collect(),
            normals: axes.iter().map(|n| q.apply(n)).collect(),
        }
    }

    /// Polygon placed in world space
    pub fn transformed(&self, xf: &Transform2) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| xf.apply(v)).collect(),
            normals: self.normals.iter().map(|n| xf.q.apply(n)).collect(),
        }
    }

    fn mass_data(&self, density: f32) -> MassData {
        // Triangle fan about the first vertex
        let origin = self.vertices[0];
        let mut area = 0.0;
        let mut centroid = Vec2::zeros();
        let mut inertia = 0.0;
        for i in 1..self.vertices.len().saturating_sub(1) {
            let e1 = self.vertices[i] - origin;
            let e2 = self.vertices[i + 1] - origin;
            let d = cross(&e1, &e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;
            centroid += triangle_area * (e1 + e2) / 3.0;

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 / 3.0) * d * (int_x2 + int_y2);
        }
        if area <= 0.0 {
            return MassData::default();
        }
        let mass = density * area;
        let center = centroid / area;
        // Inertia about `origin`, then shifted to the body origin
        let about_origin = density * inertia;
        let about_center = about_origin - mass * center.norm_squared();
        let world_center = center + origin;
        MassData {
            mass,
            inertia: about_center + mass * world_center.norm_squared(),
        }
    }
}

/// Collision shape attached to a body
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Circle
    Circle(Circle),
    /// Convex polygon
    Polygon(Polygon),
}

impl Shape {
    /// Box with half extents centred on `center`
    pub fn boxed(half_width: f32, half_height: f32, center: Vec2) -> Self {
        Self::Polygon(Polygon::new_box(half_width, half_height, center, 0.0))
    }

    /// Circle centred on `center`
    pub fn circle(radius: f32, center: Vec2) -> Self {
        Self::Circle(Circle { center, radius })
    }

    /// World-space bounding box
    pub fn aabb(&self, xf: &Transform2) -> Aabb {
        match self {
            Self::Circle(circle) => {
                let c = xf.apply(&circle.center);
                let r = Vec2::new(circle.radius, circle.radius);
                Aabb { min: c - r, max: c + r }
            }
            Self::Polygon(polygon) => {
                let mut min = Vec2::new(f32::MAX, f32::MAX);
                let mut max = Vec2::new(f32::MIN, f32::MIN);
                for v in &polygon.vertices {
                    let w = xf.apply(v);
                    min = min.inf(&w);
                    max = max.sup(&w);
                }
                Aabb { min, max }
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), PhysicsError> {
        match self {
            Self::Circle(circle) => {
                if !(circle.radius.is_finite() && circle.radius > 0.0) {
                    return Err(PhysicsError::InvalidShape(format!("circle radius {}", circle.radius)));
                }
            }
            Self::Polygon(polygon) => {
                if polygon.vertices.len() < 3 || polygon.vertices.len() != polygon.normals.len() {
                    return Err(PhysicsError::InvalidShape("polygon needs at least 3 vertices".to_string()));
                }
                if polygon.mass_data(1.0).mass <= f32::EPSILON {
                    return Err(PhysicsError::InvalidShape("polygon has no area".to_string()));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn mass_data(&self, density: f32) -> MassData {
        match self {
            Self::Circle(circle) => {
                let mass = density * std::f32::consts::PI * circle.radius * circle.radius;
                MassData {
                    mass,
                    inertia: mass * (0.5 * circle.radius * circle.radius + circle.center.norm_squared()),
                }
            }
            Self::Polygon(polygon) => polygon.mass_data(density),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MassData {
    pub mass: f32,
    pub inertia: f32,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Lower corner
    pub min: Vec2,
    /// Upper corner
    pub max: Vec2,
}

impl Aabb {
    /// Whether two boxes overlap (touching counts)
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

/// Parameters for creating a fixture
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDef {
    /// Shape in body space
    pub shape: Shape,
    /// Mass per unit area
    pub density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounciness
    pub restitution: f32,
    /// Impact speed below which restitution is ignored
    pub restitution_threshold: f32,
}

impl FixtureDef {
    /// Create a definition with Box2D's default material
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            restitution_threshold: 1.0,
        }
    }

    /// Builder pattern: Set density
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Builder pattern: Set friction
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Builder pattern: Set restitution
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Builder pattern: Set restitution threshold
    pub fn with_restitution_threshold(mut self, threshold: f32) -> Self {
        self.restitution_threshold = threshold;
        self
    }
}

pub(crate) struct Fixture {
    pub body: BodyHandle,
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub restitution_threshold: f32,
}

impl Fixture {
    pub fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            restitution_threshold: def.restitution_threshold,
        }
    }
}
