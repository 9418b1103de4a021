//! 2D point lights with hard polygon shadows
//!
//! Each light is rendered into a float scratch target (light volume, then shadow
//! volumes painted over it) and added onto the light map. The light map is meant to be
//! merged with the scene afterwards through [`Renderer::merge_light_scene`]

use glam::{Mat4, Vec2, Vec3};
use slotmap::{SlotMap, new_key_type};

use crate::{
    backend::{BlendMode, FullscreenPass, GpuBackend, LightUniform},
    color::Color,
    config::LightingConfig,
    geometry::{Orientation, Polygon, three_point_orientation},
    renderer::Renderer,
    target::{RenderTarget, TargetBinding, TargetFormat},
    texture::Texture,
};

new_key_type! {
    pub struct LightId;
    pub struct ObstacleId;
}

/// Four corners of an extruded shadow volume, in drawing order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowQuad {
    pub p1: Vec2,
    pub p2: Vec2,
    pub p3: Vec2,
    pub p4: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    pub position: Vec2,
    /// Linear RGB
    pub color: Vec3,
    pub intensity: f32,
    /// Distance at which the falloff reaches zero
    pub radius: f32,
}

impl Default for LightSource {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 1.0,
        }
    }
}

impl LightSource {
    pub fn new(position: Vec2, color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            radius,
        }
    }

    /// One quad per edge that faces the light, pushed `radius * projection` away from it
    ///
    /// An edge faces the light when `p1 → p2 → light` turns clockwise
    pub fn shadow_quads(&self, polygon: &Polygon, projection: f32) -> Vec<ShadowQuad> {
        let reach = self.radius * projection;
        polygon
            .edges()
            .filter(|edge| {
                three_point_orientation(edge.p1, edge.p2, self.position) == Orientation::Clockwise
            })
            .map(|edge| {
                let dir1 = (edge.p1 - self.position).normalize_or_zero();
                let dir2 = (edge.p2 - self.position).normalize_or_zero();
                ShadowQuad {
                    p1: edge.p1,
                    p2: edge.p2,
                    p3: edge.p2 + dir2 * reach,
                    p4: edge.p1 + dir1 * reach,
                }
            })
            .collect()
    }

    fn uniform(&self, view_proj: Mat4, target: TargetBinding) -> LightUniform {
        LightUniform::new(
            view_proj,
            target.size,
            self.position,
            self.color.to_array(),
            self.radius,
            self.intensity,
        )
    }
}

/// Triangle list for shadow quads: `(p1, p2, p3), (p1, p3, p4)` each
pub fn shadow_triangles(quads: &[ShadowQuad]) -> Vec<Vec2> {
    quads
        .iter()
        .flat_map(|q| [q.p1, q.p2, q.p3, q.p1, q.p3, q.p4])
        .collect()
}

/// Walks every obstacle's shadow for `light`, handing out at most `max_quads` quads at once
fn shadow_batches<'a>(
    light: &LightSource,
    obstacles: impl IntoIterator<Item = &'a Polygon>,
    projection: f32,
    max_quads: usize,
    buffer: &mut Vec<Vec2>,
    mut emit: impl FnMut(&[Vec2]),
) {
    let capacity = max_quads.max(1) * 6;
    buffer.clear();
    for obstacle in obstacles {
        for quad in light.shadow_quads(obstacle, projection) {
            if buffer.len() + 6 > capacity {
                emit(&buffer[..]);
                buffer.clear();
            }
            buffer.extend(shadow_triangles(&[quad]));
        }
    }
    if !buffer.is_empty() {
        emit(&buffer[..]);
        buffer.clear();
    }
}

/// Renderer state captured at the start of a lighting pass
#[derive(Clone, Copy)]
struct LightPass {
    view_proj: Mat4,
    target: TargetBinding,
    scratch: TargetBinding,
    scratch_texture: Texture,
    previous_target: Option<TargetBinding>,
    previous_blend: BlendMode,
}

impl LightPass {
    fn begin_light<B: GpuBackend>(&self, renderer: &mut Renderer<B>, light: &LightSource) {
        renderer.set_blend_mode(BlendMode::None);
        renderer.bind_target(Some(self.scratch));
        renderer.clear(Color::BLACK);
        renderer.draw_fullscreen(&FullscreenPass::Light(
            light.uniform(self.view_proj, self.target),
        ));
    }

    fn end_light<B: GpuBackend>(&self, renderer: &mut Renderer<B>) {
        renderer.set_blend_mode(BlendMode::Additive);
        renderer.bind_target(Some(self.target));
        renderer.blit_image(self.scratch_texture);
    }

    fn finish<B: GpuBackend>(self, renderer: &mut Renderer<B>) {
        renderer.set_blend_mode(self.previous_blend);
        renderer.bind_target(self.previous_target);
    }
}

/// Owns the lights & shadow casting obstacles of a scene
///
/// Handles are generation checked, so a deleted light or obstacle can't be reached
/// through an old id. The scratch target lives on the GPU and is only released by
/// [`shutdown`](Self::shutdown)
pub struct LightSystem {
    config: LightingConfig,
    lights: SlotMap<LightId, LightSource>,
    obstacles: SlotMap<ObstacleId, Polygon>,
    scratch: Option<RenderTarget>,
    shadow_vertices: Vec<Vec2>,
    precomputed: Vec<(LightId, Vec<Vec<Vec2>>)>,
}

impl LightSystem {
    pub fn new(config: LightingConfig) -> Self {
        Self {
            shadow_vertices: Vec::with_capacity(config.max_shadow_quads.max(1) * 6),
            config,
            lights: SlotMap::with_key(),
            obstacles: SlotMap::with_key(),
            scratch: None,
            precomputed: Vec::new(),
        }
    }

    pub fn config(&self) -> &LightingConfig {
        &self.config
    }

    // region: lights

    pub fn create_light_source(
        &mut self,
        position: Vec2,
        color: Vec3,
        intensity: f32,
        radius: f32,
    ) -> LightId {
        self.lights
            .insert(LightSource::new(position, color, intensity, radius))
    }

    /// `false` if the light was already gone
    pub fn delete_light_source(&mut self, id: LightId) -> bool {
        self.lights.remove(id).is_some()
    }

    pub fn light(&self, id: LightId) -> Option<&LightSource> {
        self.lights.get(id)
    }

    pub fn light_mut(&mut self, id: LightId) -> Option<&mut LightSource> {
        self.lights.get_mut(id)
    }

    pub fn lights(&self) -> impl Iterator<Item = (LightId, &LightSource)> {
        self.lights.iter()
    }

    pub fn clear_light_sources(&mut self) {
        self.lights.clear();
    }

    // endregion

    // region: obstacles

    /// Adds a shadow caster; `None` (with a warning) unless the polygon is valid
    pub fn create_obstacle(&mut self, vertices: Vec<Vec2>) -> Option<ObstacleId> {
        let polygon = Polygon::new(vertices);
        if !polygon.is_valid() {
            log::warn!("LightSystem::create_obstacle: polygon is not valid");
            return None;
        }
        Some(self.obstacles.insert(polygon))
    }

    pub fn delete_obstacle(&mut self, id: ObstacleId) -> bool {
        self.obstacles.remove(id).is_some()
    }

    pub fn obstacle(&self, id: ObstacleId) -> Option<&Polygon> {
        self.obstacles.get(id)
    }

    pub fn obstacles(&self) -> impl Iterator<Item = (ObstacleId, &Polygon)> {
        self.obstacles.iter()
    }

    pub fn clear_obstacles(&mut self) {
        self.obstacles.clear();
    }

    pub fn clear_lights_and_obstacles(&mut self) {
        self.lights.clear();
        self.obstacles.clear();
    }

    // endregion

    // region: rendering

    /// Renders the light map of the current scene into `target`
    ///
    /// `target` is cleared to `ambient` first. The renderer's bound target & blend mode
    /// are restored afterwards
    pub fn render_lighting<B: GpuBackend>(
        &mut self,
        renderer: &mut Renderer<B>,
        target: &RenderTarget,
        enable_shadows: bool,
        ambient: Color,
    ) {
        let Some(pass) = self.begin(renderer, target, ambient) else {
            return;
        };
        let projection = self.config.shadow_projection;
        let max_quads = self.config.max_shadow_quads;
        let shadow_color = self.config.shadow_color;

        for light in self.lights.values() {
            pass.begin_light(renderer, light);
            if enable_shadows {
                shadow_batches(
                    light,
                    self.obstacles.values(),
                    projection,
                    max_quads,
                    &mut self.shadow_vertices,
                    |vertices| renderer.draw_shadow_triangles(vertices, shadow_color),
                );
            }
            pass.end_light(renderer);
        }

        pass.finish(renderer);
    }

    /// Builds every light's shadow triangles once for [`render_precomputed_lighting`]
    ///
    /// Nothing invalidates the result; call this again after moving lights or obstacles
    ///
    /// [`render_precomputed_lighting`]: Self::render_precomputed_lighting
    pub fn precompute_shadow_vertices(&mut self) {
        let projection = self.config.shadow_projection;
        let max_quads = self.config.max_shadow_quads;

        self.precomputed.clear();
        for (id, light) in &self.lights {
            let mut batches = Vec::new();
            shadow_batches(
                light,
                self.obstacles.values(),
                projection,
                max_quads,
                &mut self.shadow_vertices,
                |vertices| batches.push(vertices.to_vec()),
            );
            self.precomputed.push((id, batches));
        }
    }

    pub fn has_precomputed_shadows(&self) -> bool {
        !self.precomputed.is_empty()
    }

    /// [`render_lighting`](Self::render_lighting) with shadows replayed from
    /// [`precompute_shadow_vertices`](Self::precompute_shadow_vertices)
    ///
    /// Does nothing (with a warning) if any current light has no precomputed entry
    pub fn render_precomputed_lighting<B: GpuBackend>(
        &mut self,
        renderer: &mut Renderer<B>,
        target: &RenderTarget,
        enable_shadows: bool,
        ambient: Color,
    ) {
        let missing = self
            .lights
            .keys()
            .any(|id| !self.precomputed.iter().any(|(light, _)| *light == id));
        if missing {
            log::warn!(
                "LightSystem::render_precomputed_lighting: precomputed shadow vertices not initialized"
            );
            return;
        }

        let Some(pass) = self.begin(renderer, target, ambient) else {
            return;
        };
        let shadow_color = self.config.shadow_color;

        for (id, batches) in &self.precomputed {
            let Some(light) = self.lights.get(*id) else {
                continue;
            };
            pass.begin_light(renderer, light);
            if enable_shadows {
                for vertices in batches {
                    renderer.draw_shadow_triangles(vertices, shadow_color);
                }
            }
            pass.end_light(renderer);
        }

        pass.finish(renderer);
    }

    /// Drops every light, obstacle & precomputed batch and releases the scratch target
    pub fn shutdown<B: GpuBackend>(&mut self, renderer: &mut Renderer<B>) {
        self.clear_lights_and_obstacles();
        self.precomputed.clear();
        if let Some(scratch) = self.scratch.take() {
            renderer.destroy_render_target(scratch);
        }
    }

    /// Prepares the scratch target & clears `target`
    ///
    /// `None` (logged) when there's no camera or the scratch target can't be made; the
    /// renderer's target & blend mode are untouched then
    fn begin<B: GpuBackend>(
        &mut self,
        renderer: &mut Renderer<B>,
        target: &RenderTarget,
        ambient: Color,
    ) -> Option<LightPass> {
        let Some(view_proj) = renderer.view_projection() else {
            log::warn!("LightSystem::render_lighting: camera not set");
            return None;
        };
        let previous_target = renderer.render_target();
        let previous_blend = renderer.blend_mode();

        let size = target.size();
        let scratch = match self.scratch.take() {
            Some(mut scratch) => {
                if let Err(err) = renderer.resize_render_target(&mut scratch, size.x, size.y) {
                    log::warn!("LightSystem::render_lighting: can't resize scratch target: {err}");
                    self.scratch = Some(scratch);
                    return None;
                }
                scratch
            }
            None => match renderer.create_render_target(size.x, size.y, TargetFormat::Rgba16Float) {
                Ok(scratch) => scratch,
                Err(err) => {
                    log::warn!("LightSystem::render_lighting: can't create scratch target: {err}");
                    return None;
                }
            },
        };
        let scratch = self.scratch.insert(scratch);

        renderer.set_render_target(Some(target));
        renderer.clear(ambient);

        Some(LightPass {
            view_proj,
            target: target.binding(),
            scratch: scratch.binding(),
            scratch_texture: scratch.texture(),
            previous_target,
            previous_blend,
        })
    }

    // endregion
}
