pub use glam::{IVec2, Mat4, UVec2, Vec2, Vec3, Vec4, vec2, vec3};

/// Axis-aligned rectangle defined by position (bottom-left corner) & size
///
/// World space is y-up, so `position` is the minimum corner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub position: Vec2,
    pub size: Vec2,
}

impl Rect {
    /// Create a new rectangle from position (bottom-left) & size
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self { position, size }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(vec2(x, y), vec2(w, h))
    }

    /// Returns the bottom-left corner (min coords)
    pub fn min(&self) -> Vec2 {
        self.position
    }

    /// Returns the top-right corner (max coords)
    pub fn max(&self) -> Vec2 {
        self.position + self.size
    }

    /// Returns the center point of the rectangle
    pub fn center(&self) -> Vec2 {
        self.position + self.size * 0.5
    }

    // Move the rectangle by the given delta vector
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    /// Returns true if the point is inside of the rectangle
    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.position).all() && point.cmple(self.position + self.size).all()
    }

    /// Returns the four corners in this order: bottom-left, bottom-right, top-right, top-left
    pub fn corners(&self) -> [Vec2; 4] {
        let bl = self.position;
        let br = vec2(bl.x + self.size.x, bl.y);
        let tr = bl + self.size;
        let tl = vec2(bl.x, bl.y + self.size.y);
        [bl, br, tr, tl]
    }
}

/// Texture-space rectangle as `(u_min, v_min)`..`(u_max, v_max)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl UvRect {
    /// The whole texture
    pub const FULL: UvRect = UvRect {
        min: Vec2::ZERO,
        max: Vec2::ONE,
    };

    pub fn new(u_min: f32, v_min: f32, u_max: f32, v_max: f32) -> Self {
        Self {
            min: vec2(u_min, v_min),
            max: vec2(u_max, v_max),
        }
    }

    /// Texture coordinates matching [`Rect::corners`] order
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            vec2(self.max.x, self.min.y),
            self.max,
            vec2(self.min.x, self.max.y),
        ]
    }
}

impl Default for UvRect {
    fn default() -> Self {
        Self::FULL
    }
}
