use glam::{IVec2, Mat4, Vec2, Vec3, Vec4};

/// 2D camera: position, roll, zoom & an orthographic viewport
///
/// `viewport_size` must be kept in sync with the target size by the owner; it starts
/// at `(-1, -1)` meaning "not set yet". World space is y-up & screen pixels start at
/// the bottom-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Roll in degrees
    pub rotation: f32,
    pub zoom: f32,
    pub viewport_size: IVec2,
    /// When set, `position` sits in the middle of the viewport instead of its bottom-left
    pub centered: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            zoom: 1.0,
            viewport_size: IVec2::new(-1, -1),
            centered: false,
        }
    }
}

impl Camera {
    pub fn new(viewport_width: i32, viewport_height: i32) -> Self {
        Self {
            viewport_size: IVec2::new(viewport_width, viewport_height),
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves a fraction `clamp(speed * dt, 0, 1)` of the way to `target`
    ///
    /// `max_distance` is accepted for API compatibility but is not enforced
    pub fn follow(&mut self, target: Vec2, dt: f32, speed: f32, _max_distance: f32) {
        let t = (speed * dt).clamp(0.0, 1.0);
        self.position = self.position.lerp(target, t);
    }

    /// Spring toward `target` with unit mass, integrated with explicit Euler
    ///
    /// A negative `stiffness` is logged & replaced by 1; a negative `damping` selects
    /// critical damping `2 * sqrt(stiffness)`. `max_distance` is not enforced
    pub fn follow_spring(
        &mut self,
        target: Vec2,
        dt: f32,
        _max_distance: f32,
        mut stiffness: f32,
        mut damping: f32,
    ) {
        if stiffness < 0.0 {
            log::error!(
                "Camera::follow_spring: stiffness was negative: {stiffness}, using 1 instead"
            );
            stiffness = 1.0;
        }
        if damping < 0.0 {
            damping = 2.0 * stiffness.sqrt();
        }

        let stretch = self.position - target;
        let acceleration = -stiffness * stretch - damping * self.velocity;

        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;
    }

    /// [`follow_spring`](Self::follow_spring) with stiffness 20 & critical damping
    pub fn follow_spring_critical(&mut self, target: Vec2, dt: f32) {
        self.follow_spring(target, dt, 5.0, 20.0, -1.0);
    }

    /// Orthographic projection over the viewport, depth -1..1
    pub fn projection_matrix(&self) -> Mat4 {
        let w = self.viewport_size.x as f32;
        let h = self.viewport_size.y as f32;

        if self.centered {
            Mat4::orthographic_rh_gl(-w / 2.0, w / 2.0, -h / 2.0, h / 2.0, -1.0, 1.0)
        } else {
            Mat4::orthographic_rh_gl(0.0, w, 0.0, h, -1.0, 1.0)
        }
    }

    /// scale(zoom) · roll · translate(-position)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_scale(Vec3::new(self.zoom, self.zoom, 1.0))
            * Mat4::from_rotation_z(-self.rotation.to_radians())
            * Mat4::from_translation(Vec3::new(-self.position.x, -self.position.y, 0.0))
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Pixel (bottom-left origin) to world coordinates
    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        let viewport = self.viewport_size.as_vec2();
        let ndc = 2.0 * screen / viewport - Vec2::ONE;
        let world = self.view_projection().inverse() * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
        Vec2::new(world.x, world.y) / world.w
    }

    /// World coordinates to pixel (bottom-left origin)
    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        let clip = self.view_projection() * Vec4::new(world.x, world.y, 0.0, 1.0);
        let ndc = Vec2::new(clip.x, clip.y) / clip.w;
        (ndc + Vec2::ONE) * 0.5 * self.viewport_size.as_vec2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::vec2;
    use proptest::prelude::*;

    #[test]
    fn projection_matches_pixel_ortho() {
        let cam = Camera::new(800, 600);
        assert_eq!(
            cam.projection_matrix(),
            Mat4::orthographic_rh_gl(0.0, 800.0, 0.0, 600.0, -1.0, 1.0)
        );

        let centered = Camera {
            centered: true,
            ..Camera::new(800, 600)
        };
        assert_eq!(
            centered.projection_matrix(),
            Mat4::orthographic_rh_gl(-400.0, 400.0, -300.0, 300.0, -1.0, 1.0)
        );
    }

    #[test]
    fn default_view_is_identity() {
        assert_eq!(Camera::default().view_matrix(), Mat4::IDENTITY);
        assert_eq!(Camera::default().viewport_size, IVec2::new(-1, -1));
    }

    #[test]
    fn bottom_left_pixel_maps_to_camera_position() {
        let cam = Camera {
            position: vec2(100.0, 50.0),
            ..Camera::new(800, 600)
        };
        let world = cam.screen_to_world(Vec2::ZERO);
        assert_relative_eq!(world.x, 100.0, epsilon = 1e-3);
        assert_relative_eq!(world.y, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn centered_camera_puts_position_mid_screen() {
        let cam = Camera {
            position: vec2(10.0, -20.0),
            centered: true,
            ..Camera::new(200, 100)
        };
        let world = cam.screen_to_world(vec2(100.0, 50.0));
        assert_relative_eq!(world.x, 10.0, epsilon = 1e-3);
        assert_relative_eq!(world.y, -20.0, epsilon = 1e-3);
    }

    #[test]
    fn zoom_shrinks_visible_world() {
        let cam = Camera {
            zoom: 2.0,
            ..Camera::new(200, 100)
        };
        let world = cam.screen_to_world(vec2(200.0, 100.0));
        assert_relative_eq!(world.x, 100.0, epsilon = 1e-3);
        assert_relative_eq!(world.y, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn follow_lerps_without_clamping() {
        let mut cam = Camera::default();
        cam.follow(vec2(100.0, 0.0), 0.1, 1.0, 5.0);
        assert_relative_eq!(cam.position.x, 10.0, epsilon = 1e-4);
        // still 90 away, the 5 unit max distance is not applied
        assert!(vec2(100.0, 0.0).distance(cam.position) > 5.0);

        cam.follow(vec2(100.0, 0.0), 10.0, 1.0, 5.0);
        assert_eq!(cam.position, vec2(100.0, 0.0));
    }

    #[test]
    fn critically_damped_spring_settles_without_overshoot() {
        let mut cam = Camera::default();
        let target = vec2(10.0, 0.0);
        for _ in 0..600 {
            cam.follow_spring_critical(target, 1.0 / 120.0);
            assert!(cam.position.x <= target.x + 1e-3);
        }
        assert_relative_eq!(cam.position.x, target.x, epsilon = 1e-2);
    }

    #[test]
    fn negative_stiffness_falls_back_to_one() {
        let mut a = Camera::default();
        let mut b = Camera::default();
        a.follow_spring(vec2(1.0, 0.0), 0.1, 5.0, -3.0, 0.0);
        b.follow_spring(vec2(1.0, 0.0), 0.1, 5.0, 1.0, 0.0);
        assert_eq!(a, b);
        // a = k * 1, v = 0.1, p = 0.01
        assert_relative_eq!(a.velocity.x, 0.1, epsilon = 1e-6);
        assert_relative_eq!(a.position.x, 0.01, epsilon = 1e-6);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut cam = Camera {
            position: vec2(3.0, 4.0),
            zoom: 3.0,
            ..Camera::new(10, 10)
        };
        cam.reset();
        assert_eq!(cam, Camera::default());
    }

    proptest! {
        #[test]
        fn screen_world_round_trip(
            x in 0.0f32..800.0,
            y in 0.0f32..600.0,
            px in -500.0f32..500.0,
            py in -500.0f32..500.0,
            rotation in -180.0f32..180.0,
            zoom in 0.25f32..4.0,
            centered: bool,
        ) {
            let cam = Camera {
                position: vec2(px, py),
                rotation,
                zoom,
                centered,
                ..Camera::new(800, 600)
            };
            let screen = vec2(x, y);
            let back = cam.world_to_screen(cam.screen_to_world(screen));
            prop_assert!((back - screen).length() < 0.05, "{screen} came back as {back}");
        }
    }
}
