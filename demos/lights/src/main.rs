use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use umbra::config::{EngineConfig, init_logging};
use umbra::lighting::{LightId, LightSystem};
use umbra::math::{Vec2, vec2, vec3};
use umbra::render::{Camera, Color, RenderError, RenderTarget, Renderer, TargetFormat, WgpuBackend};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const CONFIG_PATH: &str = "lights.toml";

fn main() -> Result<(), Box<dyn Error>> {
    let (config, load_error) = match EngineConfig::load(CONFIG_PATH) {
        Ok(config) => (config, None),
        Err(err) => (EngineConfig::default(), Some(err)),
    };
    init_logging(config.logging.clone());
    if let Some(err) = load_error {
        log::warn!("lights: using the default config, {CONFIG_PATH}: {err}");
    }

    let event_loop = EventLoop::new()?;
    let mut app = Application::new(config);
    Ok(event_loop.run_app(&mut app)?)
}

/// Everything that needs a window to exist
struct Scene {
    window: Arc<Window>,
    renderer: Renderer,
    lights: LightSystem,
    /// Follows the cursor
    cursor_light: LightId,
    scene: RenderTarget,
    light_map: RenderTarget,
}

struct Application {
    config: EngineConfig,
    scene: Option<Scene>,
    cursor: Vec2,
    shadows: bool,
    screenshot_requested: bool,
    last_frame: Instant,
}

impl Application {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scene: None,
            cursor: Vec2::ZERO,
            shadows: true,
            screenshot_requested: false,
            last_frame: Instant::now(),
        }
    }

    fn create_scene(&self, window: Arc<Window>) -> Result<Scene, RenderError> {
        let size = window.inner_size();
        let backend = pollster::block_on(WgpuBackend::new(window.clone(), size.width, size.height))?;
        let mut renderer = Renderer::with_defaults(backend, &self.config.renderer)?;
        let mut camera = Camera::new(size.width as i32, size.height as i32);
        camera.centered = true;
        renderer.set_camera(camera);

        let (width, height) = (size.width.max(1), size.height.max(1));
        let scene = renderer.create_render_target(width, height, TargetFormat::Rgba8)?;
        let light_map = renderer.create_render_target(width, height, TargetFormat::Rgba8)?;

        let mut lights = LightSystem::new(self.config.lighting.clone());
        let cursor_light = lights.create_light_source(Vec2::ZERO, vec3(1.0, 0.85, 0.6), 1.2, 420.0);
        lights.create_light_source(vec2(-260.0, 140.0), vec3(0.3, 0.5, 1.0), 0.8, 300.0);
        lights.create_light_source(vec2(280.0, -160.0), vec3(1.0, 0.3, 0.4), 0.8, 260.0);

        for center in [vec2(-120.0, -40.0), vec2(90.0, 80.0), vec2(180.0, -60.0)] {
            lights.create_obstacle(square(center, 30.0));
        }
        lights.create_obstacle(vec![
            vec2(-40.0, 160.0),
            vec2(-10.0, 200.0),
            vec2(-70.0, 200.0),
        ]);

        Ok(Scene {
            window,
            renderer,
            lights,
            cursor_light,
            scene,
            light_map,
        })
    }
}

/// Counter-clockwise square
fn square(center: Vec2, half: f32) -> Vec<Vec2> {
    vec![
        center + vec2(-half, -half),
        center + vec2(half, -half),
        center + vec2(half, half),
        center + vec2(-half, half),
    ]
}

impl Scene {
    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.renderer.resize(width, height);
        if let Some(camera) = self.renderer.camera_mut() {
            camera.viewport_size = (width as i32, height as i32).into();
        }
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.renderer
            .resize_render_target(&mut self.scene, width, height)?;
        self.renderer
            .resize_render_target(&mut self.light_map, width, height)
    }

    fn frame(&mut self, cursor: Vec2, dt: f32, shadows: bool, screenshot: bool) -> Result<(), RenderError> {
        let renderer = &mut self.renderer;
        let Some(camera) = renderer.camera() else {
            return Ok(());
        };
        let world_cursor = camera.screen_to_world(cursor);
        if let Some(light) = self.lights.light_mut(self.cursor_light) {
            light.position = world_cursor;
        }
        if let Some(camera) = renderer.camera_mut() {
            camera.follow_spring_critical(world_cursor * 0.1, dt);
        }

        if !renderer.begin_frame() {
            return Ok(());
        }

        renderer.set_render_target(Some(&self.scene));
        renderer.clear(Color::new([0.55, 0.55, 0.6, 1.0]));
        for y in -6..6 {
            for x in -8..8 {
                let shade = if (x + y) % 2 == 0 { 0.8 } else { 0.65 };
                renderer
                    .rect()
                    .at(vec2(x as f32, y as f32) * 64.0)
                    .size(vec2(64.0, 64.0))
                    .color(Color::rgb(shade, shade, shade));
            }
        }
        for (_, obstacle) in self.lights.obstacles() {
            renderer.polygon(obstacle).color(Color::rgb(0.25, 0.2, 0.3));
        }

        let ambient = self.lights.config().ambient_color;
        self.lights
            .render_lighting(renderer, &self.light_map, shadows, ambient);

        renderer.set_render_target(None);
        renderer.merge_light_scene(self.scene.texture(), self.light_map.texture());
        let stats = renderer.stats();
        renderer
            .text(&format!("draw calls {}  shadows {shadows}", stats.draw_calls))
            .at(vec2(-300.0, 220.0))
            .scale(14.0);

        if screenshot {
            match renderer.save_screenshot(None, "lights") {
                Ok(path) => log::info!("lights: screenshot saved to {}", path.display()),
                Err(err) => log::warn!("lights: screenshot failed: {err}"),
            }
        }
        renderer.end_frame();
        Ok(())
    }
}

impl ApplicationHandler for Application {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }
        let attributes = WindowAttributes::default().with_title("umbra lights");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("lights: failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };
        match self.create_scene(window) {
            Ok(scene) => self.scene = Some(scene),
            Err(err) => {
                log::error!("lights: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        match event {
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;

                scene.window.pre_present_notify();
                let screenshot = std::mem::take(&mut self.screenshot_requested);
                if let Err(err) = scene.frame(self.cursor, dt, self.shadows, screenshot) {
                    log::error!("lights: {err}");
                    if err.is_fatal() {
                        event_loop.exit();
                        return;
                    }
                }
                scene.window.request_redraw();
            }
            WindowEvent::CursorMoved { position, .. } => {
                // winit measures from the top-left, the camera from the bottom-left
                let height = scene.window.inner_size().height as f32;
                self.cursor = vec2(position.x as f32, height - position.y as f32);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::KeyP => self.screenshot_requested = true,
                KeyCode::Space => self.shadows = !self.shadows,
                KeyCode::Escape => event_loop.exit(),
                _ => {}
            },
            WindowEvent::Resized(size) => {
                if let Err(err) = scene.resize(size.width, size.height) {
                    log::error!("lights: {err}");
                }
            }
            WindowEvent::CloseRequested => {
                scene.lights.shutdown(&mut scene.renderer);
                event_loop.exit();
            }
            _ => {}
        }
    }
}
