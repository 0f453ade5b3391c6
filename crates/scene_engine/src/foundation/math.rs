//! Math utilities and types
//!
//! 3D types for transforms handed to the renderer, plus the small set of 2D
//! helpers the physics world works in.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix2, Matrix4,
    Rotation3,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 2x2 matrix type
pub type Mat2 = Matrix2<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Build a rotation matrix from an Euler angle triple (radians, XYZ order)
pub fn euler_to_matrix(euler: &Vec3) -> Mat4 {
    Rotation3::from_euler_angles(euler.x, euler.y, euler.z).to_homogeneous()
}

/// Compose translation, Euler rotation and scale into a world matrix (TRS order)
pub fn compose_trs(position: &Vec3, euler: &Vec3, scale: &Vec3) -> Mat4 {
    Mat4::new_translation(position)
        * euler_to_matrix(euler)
        * Mat4::new_nonuniform_scaling(scale)
}

/// 2D rigid rotation stored as sine/cosine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot2 {
    /// Sine of the angle
    pub s: f32,
    /// Cosine of the angle
    pub c: f32,
}

impl Rot2 {
    /// Create a rotation from an angle in radians
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    /// Rotate a vector
    pub fn apply(&self, v: &Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Rotate a vector by the inverse rotation
    pub fn apply_inverse(&self, v: &Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }
}

/// 2D rigid transform (rotation then translation)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2 {
    /// Translation
    pub p: Vec2,
    /// Rotation
    pub q: Rot2,
}

impl Transform2 {
    /// Create a transform from a position and angle
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self { p: position, q: Rot2::new(angle) }
    }

    /// Map a local point into world space
    pub fn apply(&self, local: &Vec2) -> Vec2 {
        self.q.apply(local) + self.p
    }

    /// Map a world point into local space
    pub fn apply_inverse(&self, world: &Vec2) -> Vec2 {
        self.q.apply_inverse(&(world - self.p))
    }
}

/// 2D cross product of two vectors (z component of the 3D cross)
pub fn cross(a: &Vec2, b: &Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a scalar (z axis) with a vector
pub fn cross_sv(s: f32, v: &Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}
