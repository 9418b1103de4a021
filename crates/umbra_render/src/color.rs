use color::{AlphaColor, LinearSrgb};
use serde::Deserialize;

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct Color {
    inner: AlphaColor<LinearSrgb>,
}

impl Color {
    /// Create a new Color from RGBA components in [0..1]
    pub const fn new(components: [f32; 4]) -> Self {
        Self {
            inner: AlphaColor::new(components),
        }
    }

    /// Opaque color from RGB components
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new([r, g, b, 1.0])
    }

    /// Get raw RGBA components
    pub fn components(&self) -> [f32; 4] {
        self.inner.components
    }

    pub fn rgb_components(&self) -> [f32; 3] {
        let [r, g, b, _] = self.inner.components;
        [r, g, b]
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            inner: self.inner.with_alpha(alpha),
        }
    }
}

impl Color {
    pub const BLACK: Color = Self {
        inner: AlphaColor::BLACK,
    };
    pub const WHITE: Color = Self {
        inner: AlphaColor::WHITE,
    };
    pub const TRANSPARENT: Color = Self {
        inner: AlphaColor::TRANSPARENT,
    };
    pub const RED: Color = Self::rgb(1., 0., 0.);
    pub const GREEN: Color = Self::rgb(0., 1., 0.);
    pub const BLUE: Color = Self::rgb(0., 0., 1.);
    /// Teal-grey the engine clears to when nothing else is configured
    pub const CLEAR: Color = Self::rgb(0.2, 0.3, 0.3);
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from(components: [f32; 4]) -> Self {
        Self::new(components)
    }
}

// Convert Color to wgpu::Color (f64 RGBA)
impl From<Color> for wgpu::Color {
    fn from(value: Color) -> Self {
        let [r, g, b, a] = value.components();
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }
    }
}
