//! Narrowphase contact generation
//!
//! All manifolds are in world space with the normal pointing from shape A to
//! shape B. A manifold is only produced for shapes that actually overlap
//! (negative separation); points that end up outside the reference face are
//! dropped.

use super::shape::{Circle, Polygon, Shape};
use super::LINEAR_SLOP;
use crate::foundation::math::{Transform2, Vec2};

/// World-space contact geometry between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    /// Unit normal from A to B
    pub normal: Vec2,
    /// Contact points, valid up to `point_count`
    pub points: [Vec2; 2],
    /// Signed separations, negative when overlapping
    pub separations: [f32; 2],
    /// Number of valid points (1 or 2)
    pub point_count: usize,
}

impl Manifold {
    fn single(normal: Vec2, point: Vec2, separation: f32) -> Self {
        Self {
            normal,
            points: [point, Vec2::zeros()],
            separations: [separation, 0.0],
            point_count: 1,
        }
    }

    /// Valid contact points
    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.point_count]
    }

    /// Separations for the valid points
    pub fn separations(&self) -> &[f32] {
        &self.separations[..self.point_count]
    }

    /// Deepest separation
    pub fn min_separation(&self) -> f32 {
        self.separations().iter().copied().fold(f32::MAX, f32::min)
    }

    fn flipped(mut self) -> Self {
        self.normal = -self.normal;
        self
    }
}

/// Compute the contact manifold between two placed shapes
pub fn collide(shape_a: &Shape, xf_a: &Transform2, shape_b: &Shape, xf_b: &Transform2) -> Option<Manifold> {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_circle(a, xf_a, b, xf_b),
        (Shape::Circle(a), Shape::Polygon(b)) => collide_polygon_circle(b, xf_b, a, xf_a).map(Manifold::flipped),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
    }
}

fn collide_circles(a: &Circle, xf_a: &Transform2, b: &Circle, xf_b: &Transform2) -> Option<Manifold> {
    let center_a = xf_a.apply(&a.center);
    let center_b = xf_b.apply(&b.center);
    let d = center_b - center_a;
    let radius = a.radius + b.radius;
    let dist_sq = d.norm_squared();
    if dist_sq >= radius * radius {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON { d / dist } else { Vec2::new(0.0, 1.0) };
    let surface_a = center_a + a.radius * normal;
    let surface_b = center_b - b.radius * normal;
    Some(Manifold::single(normal, 0.5 * (surface_a + surface_b), dist - radius))
}

fn collide_polygon_circle(
    polygon: &Polygon,
    xf_a: &Transform2,
    circle: &Circle,
    xf_b: &Transform2,
) -> Option<Manifold> {
    let center = xf_b.apply(&circle.center);
    let local = xf_a.apply_inverse(&center);
    let count = polygon.vertices.len();

    // Face of least penetration
    let mut face = 0;
    let mut face_separation = f32::MIN;
    for i in 0..count {
        let s = polygon.normals[i].dot(&(local - polygon.vertices[i]));
        if s > circle.radius {
            return None;
        }
        if s > face_separation {
            face_separation = s;
            face = i;
        }
    }

    let v1 = polygon.vertices[face];
    let v2 = polygon.vertices[(face + 1) % count];

    let (local_normal, distance) = if face_separation < f32::EPSILON {
        // Centre inside the polygon
        (polygon.normals[face], face_separation)
    } else {
        let u1 = (local - v1).dot(&(v2 - v1));
        let u2 = (local - v2).dot(&(v1 - v2));
        let toward = if u1 <= 0.0 {
            local - v1
        } else if u2 <= 0.0 {
            local - v2
        } else {
            return finish_polygon_circle(xf_a, center, polygon.normals[face], face_separation, circle.radius);
        };
        let dist = toward.norm();
        if dist > circle.radius || dist <= f32::EPSILON {
            return None;
        }
        (toward / dist, dist)
    };

    finish_polygon_circle(xf_a, center, local_normal, distance, circle.radius)
}

fn finish_polygon_circle(
    xf_a: &Transform2,
    center: Vec2,
    local_normal: Vec2,
    distance: f32,
    radius: f32,
) -> Option<Manifold> {
    let separation = distance - radius;
    if separation >= 0.0 {
        return None;
    }
    let normal = xf_a.q.apply(&local_normal);
    // Midway between the circle surface and the polygon surface
    let point = center - 0.5 * (radius + distance) * normal;
    Some(Manifold::single(normal, point, separation))
}

/// Largest separation of `b` along the face normals of `a`
fn max_separation(a: &Polygon, b: &Polygon) -> (usize, f32) {
    let mut best = (0, f32::MIN);
    for (i, (normal, vertex)) in a.normals.iter().zip(&a.vertices).enumerate() {
        let s = b
            .vertices
            .iter()
            .map(|v| normal.dot(&(v - vertex)))
            .fold(f32::MAX, f32::min);
        if s > best.1 {
            best = (i, s);
        }
    }
    best
}

fn clip_segment(input: [Vec2; 2], normal: &Vec2, offset: f32) -> Option<[Vec2; 2]> {
    let d0 = normal.dot(&input[0]) - offset;
    let d1 = normal.dot(&input[1]) - offset;

    let mut out = [Vec2::zeros(); 2];
    let mut count = 0;
    if d0 <= 0.0 {
        out[count] = input[0];
        count += 1;
    }
    if d1 <= 0.0 {
        out[count] = input[1];
        count += 1;
    }
    if d0 * d1 < 0.0 {
        let t = d0 / (d0 - d1);
        out[count] = input[0] + t * (input[1] - input[0]);
        count += 1;
    }
    (count == 2).then_some(out)
}

fn collide_polygons(a: &Polygon, xf_a: &Transform2, b: &Polygon, xf_b: &Transform2) -> Option<Manifold> {
    let a = a.transformed(xf_a);
    let b = b.transformed(xf_b);

    let (edge_a, separation_a) = max_separation(&a, &b);
    if separation_a >= 0.0 {
        return None;
    }
    let (edge_b, separation_b) = max_separation(&b, &a);
    if separation_b >= 0.0 {
        return None;
    }

    // Prefer A as the reference unless B is clearly better
    let (reference, incident, edge, flip) = if separation_b > separation_a + 0.1 * LINEAR_SLOP {
        (&b, &a, edge_b, true)
    } else {
        (&a, &b, edge_a, false)
    };

    let ref_normal = reference.normals[edge];
    let count = reference.vertices.len();
    let v11 = reference.vertices[edge];
    let v12 = reference.vertices[(edge + 1) % count];

    // Incident edge: most anti-parallel to the reference normal
    let incident_edge = incident
        .normals
        .iter()
        .enumerate()
        .min_by(|(_, n1), (_, n2)| n1.dot(&ref_normal).total_cmp(&n2.dot(&ref_normal)))
        .map_or(0, |(i, _)| i);
    let incident_count = incident.vertices.len();
    let segment = [
        incident.vertices[incident_edge],
        incident.vertices[(incident_edge + 1) % incident_count],
    ];

    let tangent = (v12 - v11).normalize();
    let segment = clip_segment(segment, &(-tangent), -tangent.dot(&v11))?;
    let segment = clip_segment(segment, &tangent, tangent.dot(&v12))?;

    let mut manifold = Manifold {
        normal: if flip { -ref_normal } else { ref_normal },
        points: [Vec2::zeros(); 2],
        separations: [0.0; 2],
        point_count: 0,
    };
    for point in segment {
        let separation = ref_normal.dot(&(point - v11));
        if separation < 0.0 {
            let slot = manifold.point_count;
            // Midway between the incident point and the reference face
            manifold.points[slot] = point - 0.5 * separation * ref_normal;
            manifold.separations[slot] = separation;
            manifold.point_count += 1;
        }
    }

    (manifold.point_count > 0).then_some(manifold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(x: f32, y: f32) -> Transform2 {
        Transform2::new(Vec2::new(x, y), 0.0)
    }

    #[test]
    fn test_circles_apart_produce_nothing() {
        let shape = Shape::circle(0.5, Vec2::zeros());
        assert!(collide(&shape, &at(0.0, 0.0), &shape, &at(1.0, 0.0)).is_none());
        assert!(collide(&shape, &at(0.0, 0.0), &shape, &at(2.0, 0.0)).is_none());
    }

    #[test]
    fn test_overlapping_circles() {
        let shape = Shape::circle(0.5, Vec2::zeros());
        let m = collide(&shape, &at(0.0, 0.0), &shape, &at(0.8, 0.0)).unwrap();
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.normal, Vec2::new(1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(m.separations[0], -0.2, epsilon = 1e-6);
        assert_relative_eq!(m.points[0], Vec2::new(0.4, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_circle_resting_into_box_face() {
        let ground = Shape::boxed(5.0, 0.5, Vec2::zeros());
        let ball = Shape::circle(0.5, Vec2::zeros());
        let m = collide(&ground, &at(0.0, 0.0), &ball, &at(1.0, 0.9)).unwrap();
        assert_relative_eq!(m.normal, Vec2::new(0.0, 1.0), epsilon = 1e-6);
        assert_relative_eq!(m.separations[0], -0.1, epsilon = 1e-5);

        // Same pair with the roles swapped flips the normal only
        let swapped = collide(&ball, &at(1.0, 0.9), &ground, &at(0.0, 0.0)).unwrap();
        assert_relative_eq!(swapped.normal, Vec2::new(0.0, -1.0), epsilon = 1e-6);
        assert_relative_eq!(swapped.separations[0], m.separations[0], epsilon = 1e-6);
    }

    #[test]
    fn test_circle_near_box_corner_misses() {
        let block = Shape::boxed(0.5, 0.5, Vec2::zeros());
        let ball = Shape::circle(0.5, Vec2::zeros());
        // Diagonal distance from corner is ~0.56 > radius
        assert!(collide(&block, &at(0.0, 0.0), &ball, &at(0.9, 0.9)).is_none());
    }

    #[test]
    fn test_box_on_box_gives_two_points() {
        let ground = Shape::boxed(5.0, 0.5, Vec2::zeros());
        let crate_box = Shape::boxed(0.5, 0.5, Vec2::zeros());
        let m = collide(&ground, &at(0.0, 0.0), &crate_box, &at(0.0, 0.95)).unwrap();

        assert_eq!(m.point_count, 2);
        assert_relative_eq!(m.normal, Vec2::new(0.0, 1.0), epsilon = 1e-6);
        for separation in m.separations() {
            assert_relative_eq!(*separation, -0.05, epsilon = 1e-5);
        }
        let xs: Vec<f32> = m.points().iter().map(|p| p.x).collect();
        assert!(xs.iter().any(|x| (x + 0.5).abs() < 1e-5));
        assert!(xs.iter().any(|x| (x - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_separated_boxes_produce_nothing() {
        let shape = Shape::boxed(0.5, 0.5, Vec2::zeros());
        assert!(collide(&shape, &at(0.0, 0.0), &shape, &at(1.01, 0.0)).is_none());
    }
}
