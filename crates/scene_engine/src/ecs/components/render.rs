//! Rendering components
//!
//! Consumed only by the renderer; the runtime copies them but never reads them.

use crate::ecs::Component;
use crate::foundation::math::Vec4;

/// Opaque texture reference owned by the asset system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque shader reference owned by the asset system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// Textured or flat-coloured quad
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteRendererComponent {
    /// Tint colour (RGBA)
    pub color: Vec4,
    /// Optional texture
    pub texture: Option<TextureHandle>,
    /// Optional shader override
    pub shader: Option<ShaderHandle>,
    /// Texture coordinate multiplier
    pub tiling_factor: f32,
}

impl Default for SpriteRendererComponent {
    fn default() -> Self {
        Self {
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            texture: None,
            shader: None,
            tiling_factor: 1.0,
        }
    }
}

impl SpriteRendererComponent {
    /// Create a flat-coloured sprite
    pub fn new(color: Vec4) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// Builder pattern: Set texture
    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self
    }
}

impl Component for SpriteRendererComponent {}

/// Filled or ring-shaped circle
#[derive(Debug, Clone, PartialEq)]
pub struct CircleRendererComponent {
    /// Tint colour (RGBA)
    pub color: Vec4,
    /// Ring thickness, 1.0 is a filled disc
    pub thickness: f32,
    /// Edge fade
    pub fade: f32,
    /// Optional texture
    pub texture: Option<TextureHandle>,
    /// Optional shader override
    pub shader: Option<ShaderHandle>,
    /// Texture coordinate multiplier
    pub tiling_factor: f32,
}

impl Default for CircleRendererComponent {
    fn default() -> Self {
        Self {
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            thickness: 1.0,
            fade: 0.005,
            texture: None,
            shader: None,
            tiling_factor: 1.0,
        }
    }
}

impl Component for CircleRendererComponent {}
