use std::path::{Path, PathBuf};

use glam::{Mat4, UVec2, Vec2};

use crate::{
    backend::{BlendMode, FullscreenPass, GpuBackend, ShaderId},
    batch::Batcher,
    camera::Camera,
    color::Color,
    config::RendererConfig,
    draw_queue::DrawQueue,
    error::RenderError,
    font::{Font, GlyphProvider},
    geometry::{Edge, Polygon},
    gpu::WgpuBackend,
    math::{Rect, UvRect},
    primitives::{
        LineBuilder, PolygonBuilder, Primitive, QuadSink, RectangleBuilder, TextBuilder,
    },
    screenshot,
    target::{RenderTarget, TargetBinding, TargetFormat},
    texture::{Texture, TextureOptions},
};

/// Textures & font every renderer falls back to
///
/// Built once against a backend & handed to [`Renderer::new`]
pub struct DefaultResources {
    /// 1×1 white, used for untextured quads & as the stand-in for dead textures
    pub white: Texture,
    pub font: Font,
}

impl DefaultResources {
    pub fn create<B: GpuBackend>(backend: &mut B) -> Result<Self, RenderError> {
        let white =
            backend.create_texture(1, 1, &[255, 255, 255, 255], TextureOptions::default())?;
        Ok(Self {
            white,
            font: Font::fallback(white, 16.0),
        })
    }
}

/// Counters since the last [`Renderer::begin_frame`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub quads: usize,
    pub flushes: usize,
}

/// Batched quad renderer in front of a [`GpuBackend`]
///
/// Draw calls only append to a queue. The queue is turned into as few GPU draws as the
/// texture-slot limit allows on [`flush`](Self::flush), which also happens implicitly
/// before anything that would change where or how queued quads land
pub struct Renderer<B: GpuBackend = WgpuBackend> {
    backend: B,
    defaults: DefaultResources,
    camera: Option<Camera>,
    queue: DrawQueue,
    batcher: Batcher,
    target: Option<TargetBinding>,
    blend_mode: BlendMode,
    quad_shader: Option<ShaderId>,
    clear_color: Color,
    max_texture_slots: usize,
    stats: FrameStats,
}

impl<B: GpuBackend> Renderer<B> {
    pub fn new(mut backend: B, defaults: DefaultResources, config: &RendererConfig) -> Self {
        let hardware = backend.max_texture_slots().max(1);
        if config.max_texture_slots > hardware {
            log::warn!(
                "Renderer::new: {} texture slots requested, backend supports {hardware}",
                config.max_texture_slots
            );
        }
        backend.set_vsync(config.vsync);
        backend.set_blend_mode(BlendMode::Alpha);

        Self {
            backend,
            defaults,
            camera: None,
            queue: DrawQueue::with_capacity(config.quad_capacity),
            batcher: Batcher::default(),
            target: None,
            blend_mode: BlendMode::Alpha,
            quad_shader: None,
            clear_color: config.clear_color,
            max_texture_slots: config.max_texture_slots.clamp(1, hardware),
            stats: FrameStats::default(),
        }
    }

    /// Builds the [`DefaultResources`] on `backend` first
    pub fn with_defaults(mut backend: B, config: &RendererConfig) -> Result<Self, RenderError> {
        let defaults = DefaultResources::create(&mut backend)?;
        Ok(Self::new(backend, defaults, config))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn defaults(&self) -> &DefaultResources {
        &self.defaults
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.camera.as_mut()
    }

    /// The camera used by every following flush
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = Some(camera);
    }

    pub fn take_camera(&mut self) -> Option<Camera> {
        self.camera.take()
    }

    pub fn max_texture_slots(&self) -> usize {
        self.max_texture_slots
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Quads waiting for the next flush
    pub fn quad_count(&self) -> usize {
        self.queue.quad_count()
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    // region: frame

    /// Starts a frame: acquires the screen, clears the bound target & drops stale quads
    ///
    /// Returns `false` when the backend has nothing to draw into this frame
    pub fn begin_frame(&mut self) -> bool {
        self.stats = FrameStats::default();
        self.queue.clear();
        if !self.backend.begin_frame() {
            return false;
        }
        self.clear(self.clear_color);
        true
    }

    /// Flushes everything queued, then presents
    pub fn end_frame(&mut self) {
        self.flush();
        self.backend.end_frame();
    }

    /// Clears the bound target immediately; queued quads are not affected
    pub fn clear(&mut self, color: Color) {
        let size = self.target_size();
        if size.x == 0 || size.y == 0 {
            log::warn!("Renderer::clear: framebuffer size is zero, skipping clear");
            return;
        }
        self.backend.clear(color);
    }

    /// Drops queued quads without drawing them
    pub fn clear_draw_queue(&mut self) {
        self.queue.clear();
    }

    /// Resizes the screen
    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize_screen(width, height);
    }

    pub fn set_vsync(&mut self, on: bool) {
        self.backend.set_vsync(on);
    }

    /// Pixel size of whatever is currently bound
    pub fn target_size(&self) -> UVec2 {
        match self.target {
            Some(binding) => binding.size,
            None => self.backend.screen_size(),
        }
    }

    /// Turns the queue into batched draw calls against the bound target
    pub fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        if self.queue.textures().is_empty() {
            log::warn!("Renderer::flush: texture buffer empty");
            self.queue.clear();
            return;
        }
        let Some(camera) = self.camera.as_ref() else {
            log::warn!("Renderer::flush: camera not set");
            self.queue.clear();
            return;
        };
        let size = self.target_size();
        if size.x == 0 || size.y == 0 {
            log::warn!(
                "Renderer::flush: size is zero ({}, {}), skipping flush",
                size.x,
                size.y
            );
            self.queue.clear();
            return;
        }

        let view_proj = camera.view_projection();
        let backend = &mut self.backend;
        let shader = self.quad_shader;
        let draws = self
            .batcher
            .run(&self.queue, self.max_texture_slots, |batch| {
                backend.draw_batch(batch, view_proj, shader)
            });

        self.stats.draw_calls += draws;
        self.stats.quads += self.queue.quad_count();
        self.stats.flushes += 1;
        self.queue.clear();
    }

    // endregion

    // region: state

    /// Switches the target (`None` is the screen), flushing queued quads to the old one first
    pub fn set_render_target(&mut self, target: Option<&RenderTarget>) {
        self.bind_target(target.map(RenderTarget::binding));
    }

    /// [`set_render_target`](Self::set_render_target) from a remembered binding
    pub fn bind_target(&mut self, target: Option<TargetBinding>) {
        if !self.queue.is_empty() {
            self.flush();
        }
        if self.target == target {
            return;
        }
        self.target = target;
        self.backend.bind_target(target.map(|t| t.id));
    }

    pub fn render_target(&self) -> Option<TargetBinding> {
        self.target
    }

    /// Applies to the next GPU draw, including quads already queued
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
        self.backend.set_blend_mode(mode);
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Compiles a WGSL replacement for the quad shader
    pub fn create_quad_shader(&mut self, label: &str, source: &str) -> Result<ShaderId, RenderError> {
        self.backend.create_quad_shader(label, source)
    }

    /// Uses `shader` (or the built-in one for `None`) from here on; queued quads keep the old one
    pub fn set_quad_shader(&mut self, shader: Option<ShaderId>) {
        if self.quad_shader == shader {
            return;
        }
        self.flush();
        self.quad_shader = shader;
    }

    // endregion

    // region: resources

    /// Decodes an encoded image (PNG) & uploads it
    pub fn load_texture(
        &mut self,
        bytes: &[u8],
        options: TextureOptions,
    ) -> Result<Texture, RenderError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        self.load_texture_raw(width, height, &image, options)
    }

    /// Uploads tightly packed RGBA8 pixels, top row first
    pub fn load_texture_raw(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        options: TextureOptions,
    ) -> Result<Texture, RenderError> {
        self.backend.create_texture(width, height, pixels, options)
    }

    /// Releases a texture; quads still queued with it fall back to white
    pub fn destroy_texture(&mut self, texture: Texture) {
        if texture == self.defaults.white {
            log::warn!("Renderer::destroy_texture: refusing to destroy the default texture");
            return;
        }
        self.backend.destroy_texture(texture);
    }

    pub fn texture_alive(&self, texture: Texture) -> bool {
        self.backend.texture_alive(texture)
    }

    pub fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        format: TargetFormat,
    ) -> Result<RenderTarget, RenderError> {
        let (id, texture) = self.backend.create_target(width, height, format)?;
        Ok(RenderTarget::new(
            id,
            UVec2::new(width, height),
            format,
            texture,
        ))
    }

    /// Releases a target; if it was bound the screen is bound instead
    pub fn destroy_render_target(&mut self, target: RenderTarget) {
        if self.target.is_some_and(|t| t.id == target.id()) {
            self.bind_target(None);
        }
        self.backend.destroy_target(target.id());
    }

    /// Recreates `target` at a new size, keeping it bound if it was
    ///
    /// The old contents are lost
    pub fn resize_render_target(
        &mut self,
        target: &mut RenderTarget,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        if target.size() == UVec2::new(width, height) {
            return Ok(());
        }
        let was_bound = self.target.is_some_and(|t| t.id == target.id());
        if was_bound {
            self.flush();
        }

        let resized = self.create_render_target(width, height, target.format())?;
        let old = std::mem::replace(target, resized);
        self.backend.destroy_target(old.id());

        if was_bound {
            self.target = Some(target.binding());
            self.backend.bind_target(Some(target.id()));
        }
        Ok(())
    }

    // endregion

    // region: drawing

    /// Queues a primitive
    pub fn submit(&mut self, primitive: Primitive<'_>) {
        let backend = &self.backend;
        let alive = |texture: Texture| backend.texture_alive(texture);
        QuadSink {
            queue: &mut self.queue,
            white: self.defaults.white,
            fallback_font: &self.defaults.font,
            alive: &alive,
        }
        .emit(primitive);
    }

    /// Starts a rectangle; drawn when the builder drops
    pub fn rect(&mut self) -> RectangleBuilder<'_, B> {
        RectangleBuilder::new(self)
    }

    pub fn line(&mut self) -> LineBuilder<'_, B> {
        LineBuilder::new(self)
    }

    pub fn polygon<'p>(&mut self, polygon: &'p Polygon) -> PolygonBuilder<'_, 'p, B> {
        PolygonBuilder::new(self, polygon)
    }

    /// Same as `polygon(polygon).outline(width)`
    pub fn polygon_outline<'p>(
        &mut self,
        polygon: &'p Polygon,
        width: f32,
    ) -> PolygonBuilder<'_, 'p, B> {
        PolygonBuilder::new(self, polygon).outline(width)
    }

    pub fn text<'t>(&mut self, text: &'t str) -> TextBuilder<'_, 't, B> {
        TextBuilder::new(self, text)
    }

    /// Rect with per-corner colors (bl, br, tr, tl) & a uv region
    pub fn draw_rect(
        &mut self,
        rect: Rect,
        texture: Option<Texture>,
        colors: [Color; 4],
        uv: UvRect,
    ) {
        self.submit(Primitive::Rect {
            rect,
            texture,
            colors,
            uv,
        });
    }

    pub fn draw_line(&mut self, edge: Edge, width: f32, color: Color) {
        self.submit(Primitive::Line { edge, width, color });
    }

    pub fn draw_polygon(&mut self, polygon: &Polygon, color: Color) {
        self.submit(Primitive::Polygon { polygon, color });
    }

    pub fn draw_polygon_outline(&mut self, polygon: &Polygon, width: f32, color: Color) {
        self.submit(Primitive::PolygonOutline {
            polygon,
            width,
            color,
        });
    }

    /// `position` is the top-left of the first line & `scale` the line height
    ///
    /// Glyphs are indexed by raw UTF-8 byte, not by code point
    pub fn draw_string(
        &mut self,
        text: &str,
        position: Vec2,
        font: Option<&dyn GlyphProvider>,
        color: Color,
        scale: f32,
    ) {
        self.submit(Primitive::Text {
            text,
            position,
            font,
            color,
            scale,
        });
    }

    /// Copies `texture` over the whole bound target with the current blend mode
    pub fn blit_image(&mut self, texture: Texture) {
        if !self.backend.texture_alive(texture) {
            log::warn!("Renderer::blit_image: texture not loaded");
            return;
        }
        self.draw_fullscreen(&FullscreenPass::Blit { texture });
    }

    /// Writes opaque `clamp(scene.rgb * light.rgb)` over the whole bound target
    pub fn merge_light_scene(&mut self, scene: Texture, light: Texture) {
        if !self.backend.texture_alive(scene) || !self.backend.texture_alive(light) {
            log::warn!("Renderer::merge_light_scene: texture not loaded");
            return;
        }
        self.draw_fullscreen(&FullscreenPass::Merge { scene, light });
    }

    /// Runs a fullscreen pass after drawing whatever is queued
    pub fn draw_fullscreen(&mut self, pass: &FullscreenPass) {
        self.flush();
        self.backend.draw_fullscreen(pass);
    }

    /// Solid triangle list in world space, after drawing whatever is queued
    pub fn draw_shadow_triangles(&mut self, positions: &[Vec2], color: Color) {
        if positions.is_empty() {
            return;
        }
        self.flush();
        let Some(view_proj) = self.view_projection() else {
            log::warn!("Renderer::draw_shadow_triangles: camera not set");
            return;
        };
        self.backend.draw_triangles(positions, view_proj, color);
    }

    /// The camera's matrix, if there is a camera
    pub fn view_projection(&self) -> Option<Mat4> {
        self.camera.as_ref().map(Camera::view_projection)
    }

    // endregion

    // region: screenshots

    /// Saves a PNG to `screenshots/{name}{n}.png` with the first free `n`
    pub fn save_screenshot(
        &mut self,
        target: Option<&RenderTarget>,
        name: &str,
    ) -> Result<PathBuf, RenderError> {
        self.save_screenshot_in("screenshots", target, name)
    }

    /// Like [`save_screenshot`](Self::save_screenshot) with a custom directory
    ///
    /// Queued quads are flushed to the bound target first so they are part of the capture
    pub fn save_screenshot_in(
        &mut self,
        dir: impl AsRef<Path>,
        target: Option<&RenderTarget>,
        name: &str,
    ) -> Result<PathBuf, RenderError> {
        self.flush();
        let mut pixels = self.backend.read_pixels(target.map(RenderTarget::id))?;
        screenshot::to_top_left(&mut pixels);

        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = screenshot::next_free_path(dir, name, "png", screenshot::MAX_FILE_COUNT);
        screenshot::write_png(&path, &pixels)?;
        log::info!("Renderer::save_screenshot: wrote {}", path.display());
        Ok(path)
    }

    // endregion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, FullscreenKind, RecordingBackend};
    use glam::vec2;

    fn renderer() -> Renderer<RecordingBackend> {
        let mut renderer =
            Renderer::with_defaults(RecordingBackend::new(320, 240), &RendererConfig::default())
                .unwrap();
        renderer.set_camera(Camera::new(320, 240));
        renderer.backend_mut().take_commands();
        renderer
    }

    fn textures(renderer: &mut Renderer<RecordingBackend>, n: usize) -> Vec<Texture> {
        (0..n)
            .map(|_| {
                renderer
                    .load_texture_raw(1, 1, &[0, 0, 0, 255], TextureOptions::default())
                    .unwrap()
            })
            .collect()
    }

    fn quad(renderer: &mut Renderer<RecordingBackend>, texture: Option<Texture>) {
        renderer.draw_rect(
            Rect::from_xywh(0.0, 0.0, 10.0, 10.0),
            texture,
            [Color::WHITE; 4],
            UvRect::FULL,
        );
    }

    #[test]
    fn flushing_an_empty_queue_is_a_no_op() {
        let mut r = renderer();
        r.flush();
        assert!(r.backend().commands().is_empty());
        assert_eq!(r.stats(), FrameStats::default());
    }

    #[test]
    fn seventeen_textures_take_two_draw_calls() {
        let mut r = renderer();
        for texture in textures(&mut r, 17) {
            quad(&mut r, Some(texture));
        }
        assert_eq!(r.quad_count(), 17);
        r.flush();

        assert_eq!(r.backend().batches().count(), 2);
        assert_eq!(r.stats().draw_calls, 2);
        assert_eq!(r.stats().quads, 17);
        assert_eq!(r.quad_count(), 0);
    }

    #[test]
    fn texture_slots_respect_the_configured_limit() {
        let config = RendererConfig {
            max_texture_slots: 4,
            ..Default::default()
        };
        let mut r = Renderer::with_defaults(RecordingBackend::new(64, 64), &config).unwrap();
        r.set_camera(Camera::new(64, 64));
        assert_eq!(r.max_texture_slots(), 4);

        for texture in textures(&mut r, 9) {
            quad(&mut r, Some(texture));
        }
        r.flush();
        assert_eq!(r.backend().batches().count(), 3);
    }

    #[test]
    fn slots_never_exceed_the_backend_limit() {
        let backend = RecordingBackend::new(64, 64).with_texture_slots(8);
        let r = Renderer::with_defaults(backend, &RendererConfig::default()).unwrap();
        assert_eq!(r.max_texture_slots(), 8);
    }

    #[test]
    fn switching_targets_flushes_to_the_old_target_exactly_once() {
        let mut r = renderer();
        let target = r.create_render_target(64, 64, TargetFormat::Rgba8).unwrap();

        quad(&mut r, None);
        quad(&mut r, None);
        r.set_render_target(Some(&target));

        let draws: Vec<_> = r.backend().batches().collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(*draws[0].0, None);
        assert_eq!(draws[0].1.quad_count(), 2);
        assert_eq!(r.render_target(), Some(target.binding()));
        assert_eq!(r.target_size(), UVec2::new(64, 64));

        // binding the same target again only flushes
        quad(&mut r, None);
        r.set_render_target(Some(&target));
        let binds = r
            .backend()
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::BindTarget(_)))
            .count();
        assert_eq!(binds, 1);
        assert_eq!(r.backend().batches().last().unwrap().0, &Some(target.id()));
    }

    #[test]
    fn dead_textures_fall_back_to_white() {
        let mut r = renderer();
        let texture = textures(&mut r, 1)[0];
        r.destroy_texture(texture);
        quad(&mut r, Some(texture));
        r.flush();

        let (_, batch) = r.backend().batches().next().unwrap();
        assert_eq!(batch.textures, vec![r.defaults().white]);
    }

    #[test]
    fn the_default_texture_cannot_be_destroyed() {
        let mut r = renderer();
        let white = r.defaults().white;
        r.destroy_texture(white);
        assert!(r.texture_alive(white));
    }

    #[test]
    fn flush_without_camera_drops_the_queue() {
        let mut r = renderer();
        r.take_camera();
        quad(&mut r, None);
        r.flush();
        assert_eq!(r.backend().batches().count(), 0);
        assert_eq!(r.quad_count(), 0);
    }

    #[test]
    fn zero_sized_screen_skips_draws_and_clears() {
        let mut r = renderer();
        r.resize(0, 240);
        quad(&mut r, None);
        r.flush();
        r.clear(Color::RED);
        assert!(r.backend().commands().is_empty());
        assert_eq!(r.quad_count(), 0);
    }

    #[test]
    fn frame_clears_then_flushes_then_presents() {
        let mut r = renderer();
        quad(&mut r, None);
        assert!(r.begin_frame());
        assert_eq!(r.quad_count(), 0);
        quad(&mut r, None);
        r.end_frame();

        let commands = r.backend().commands();
        assert_eq!(commands[0], Command::BeginFrame);
        assert!(matches!(commands[1], Command::Clear { color, .. } if color == Color::CLEAR));
        assert!(matches!(&commands[2], Command::DrawBatch { batch, .. } if batch.quad_count() == 1));
        assert_eq!(commands[3], Command::EndFrame);
        assert_eq!(r.stats().flushes, 1);
    }

    #[test]
    fn blend_mode_is_state_not_a_flush() {
        let mut r = renderer();
        quad(&mut r, None);
        r.set_blend_mode(BlendMode::Additive);
        assert_eq!(r.quad_count(), 1);
        assert_eq!(r.blend_mode(), BlendMode::Additive);
        assert_eq!(
            r.backend().commands(),
            &[Command::SetBlendMode(BlendMode::Additive)]
        );
    }

    #[test]
    fn polygons_only_draw_when_valid() {
        let mut r = renderer();
        let mut pentagon = Polygon::new(vec![
            vec2(0.0, 0.0),
            vec2(2.0, 0.0),
            vec2(3.0, 1.0),
            vec2(1.0, 2.0),
            vec2(-1.0, 1.0),
        ]);
        r.draw_polygon(&pentagon, Color::GREEN);
        assert_eq!(r.quad_count(), 2);

        pentagon.vertices.reverse();
        r.draw_polygon(&pentagon, Color::GREEN);
        r.draw_polygon_outline(&pentagon, 1.0, Color::GREEN);
        assert_eq!(r.quad_count(), 2);

        pentagon.ensure_counter_clockwise();
        r.polygon_outline(&pentagon, 2.0).color(Color::RED);
        assert_eq!(r.quad_count(), 7);
    }

    #[test]
    fn text_without_a_font_uses_the_fallback() {
        let mut r = renderer();
        r.text("hi there\nok").at(vec2(0.0, 100.0)).scale(16.0);
        // the space produces no quad
        assert_eq!(r.quad_count(), 9);

        let mut empty = Font::new(None, 16.0);
        empty.set_glyph(b'a', Default::default());
        r.draw_string("aaa", Vec2::ZERO, Some(&empty), Color::WHITE, 16.0);
        assert_eq!(r.quad_count(), 9);
    }

    #[test]
    fn builders_draw_on_drop() {
        let mut r = renderer();
        let texture = textures(&mut r, 1)[0];
        r.rect().at(vec2(5.0, 5.0)).size(vec2(2.0, 3.0)).texture(texture);
        r.line().from(vec2(0.0, 0.0)).to(vec2(1.0, 1.0)).width(0.5);
        r.flush();

        let (_, batch) = r.backend().batches().next().unwrap();
        assert_eq!(batch.textures, vec![texture, r.defaults().white]);
        assert_eq!(batch.vertices[0].position, [5.0, 5.0]);
        assert_eq!(batch.vertices[2].position, [7.0, 8.0]);
        assert_eq!(batch.vertices[4].tex_index, 1.0);
    }

    #[test]
    fn fullscreen_passes_flush_first() {
        let mut r = renderer();
        let scene = r.create_render_target(32, 32, TargetFormat::Rgba8).unwrap();
        let light = r.create_render_target(32, 32, TargetFormat::Rgba16Float).unwrap();
        quad(&mut r, None);
        r.merge_light_scene(scene.texture(), light.texture());

        let commands = r.backend().commands();
        assert!(matches!(commands[0], Command::DrawBatch { .. }));
        assert!(matches!(
            commands[1],
            Command::Fullscreen {
                kind: FullscreenKind::Merge,
                ..
            }
        ));
    }

    #[test]
    fn target_textures_survive_destroy_texture() {
        let mut r = renderer();
        let target = r.create_render_target(16, 16, TargetFormat::Rgba8).unwrap();
        r.destroy_texture(target.texture());
        assert!(r.texture_alive(target.texture()));

        quad(&mut r, Some(target.texture()));
        r.blit_image(target.texture());

        let (_, batch) = r.backend().batches().next().unwrap();
        assert_eq!(batch.textures, vec![target.texture()]);
        assert!(r.backend().commands().iter().any(|c| matches!(
            c,
            Command::Fullscreen {
                kind: FullscreenKind::Blit,
                ..
            }
        )));
    }

    #[test]
    fn oversized_textures_are_rejected() {
        let mut r = renderer();
        let err = r
            .load_texture_raw(u32::MAX, u32::MAX, &[], TextureOptions::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::TextureTooLarge { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn dead_textures_are_not_blitted() {
        let mut r = renderer();
        let texture = textures(&mut r, 1)[0];
        r.destroy_texture(texture);
        r.blit_image(texture);
        assert!(r.backend().commands().is_empty());
    }

    #[test]
    fn quad_shader_changes_flush_and_tag_batches() {
        let mut r = renderer();
        let shader = r
            .create_quad_shader("tint", "@fragment fn fs_main() {}")
            .unwrap();
        assert!(r.create_quad_shader("broken", "nothing here").is_err());

        quad(&mut r, None);
        r.set_quad_shader(Some(shader));
        quad(&mut r, None);
        r.flush();

        let shaders: Vec<_> = r
            .backend()
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::DrawBatch { shader, .. } => Some(*shader),
                _ => None,
            })
            .collect();
        assert_eq!(shaders, vec![None, Some(shader)]);
    }

    #[test]
    fn resizing_a_bound_target_rebinds_it() {
        let mut r = renderer();
        let mut target = r.create_render_target(16, 16, TargetFormat::Rgba8).unwrap();
        r.set_render_target(Some(&target));
        let old = target.id();

        r.resize_render_target(&mut target, 32, 8).unwrap();
        assert_ne!(target.id(), old);
        assert_eq!(target.size(), UVec2::new(32, 8));
        assert_eq!(r.render_target(), Some(target.binding()));
        assert_eq!(r.backend().bound_target(), Some(target.id()));
        assert_eq!(r.backend().live_targets(), 1);

        r.destroy_render_target(target);
        assert_eq!(r.render_target(), None);
        assert_eq!(r.backend().live_targets(), 0);
    }

    #[test]
    fn screenshots_are_flipped_and_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = renderer();
        let target = r.create_render_target(4, 2, TargetFormat::Rgba8).unwrap();

        let first = r.save_screenshot_in(dir.path(), Some(&target), "shot").unwrap();
        let second = r.save_screenshot_in(dir.path(), Some(&target), "shot").unwrap();
        assert_eq!(first, dir.path().join("shot0.png"));
        assert_eq!(second, dir.path().join("shot1.png"));

        let image = image::open(&first).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (4, 2));
        // the recording backend reads bottom row first with green = row index
        assert_eq!(image.get_pixel(3, 0).0, [3, 1, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [0, 0, 0, 255]);
    }
}
