use glam::{Vec2, vec2};

use crate::{
    backend::GpuBackend,
    color::Color,
    math::Rect,
    renderer::Renderer,
    texture::{AtlasCoord, Texture, TextureAtlas},
};

/// Row-major grid of tile ids; row 0 is the bottom row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TileMap {
    pub tiles: Vec<u32>,
    pub width: usize,
    pub height: usize,
    /// World position of the bottom-left corner
    pub position: Vec2,
}

impl TileMap {
    pub fn new(tiles: Vec<u32>, width: usize, height: usize, position: Vec2) -> Self {
        Self {
            tiles,
            width,
            height,
            position,
        }
    }
}

/// Draws tile grids from one tileset texture, one rect per tile
#[derive(Debug, Clone)]
pub struct TilemapRenderer {
    tileset: Option<(Texture, TextureAtlas)>,
    /// Tile id `i` uses atlas cell `keys[i]`
    keys: Vec<AtlasCoord>,
    tile_size: f32,
    map: Option<TileMap>,
}

impl Default for TilemapRenderer {
    fn default() -> Self {
        Self {
            tileset: None,
            keys: Vec::new(),
            tile_size: 1.0,
            map: None,
        }
    }
}

impl TilemapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tileset(&mut self, texture: Texture, atlas: TextureAtlas) {
        self.tileset = Some((texture, atlas));
    }

    pub fn set_atlas_keys(&mut self, keys: Vec<AtlasCoord>) {
        self.keys = keys;
    }

    pub fn set_tile_size(&mut self, size: f32) {
        self.tile_size = size;
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// The map drawn by [`draw`](Self::draw)
    pub fn set_map(&mut self, map: TileMap) {
        self.map = Some(map);
    }

    pub fn map(&self) -> Option<&TileMap> {
        self.map.as_ref()
    }

    pub fn draw<B: GpuBackend>(&self, renderer: &mut Renderer<B>) {
        let Some(map) = &self.map else {
            log::warn!("TilemapRenderer::draw: map was not set, skipping render call");
            return;
        };
        self.draw_map(&map.tiles, map.width, map.height, map.position, renderer);
    }

    /// Draws `tiles` (`width * height` ids, row-major) with its bottom-left at `position`
    pub fn draw_map<B: GpuBackend>(
        &self,
        tiles: &[u32],
        width: usize,
        height: usize,
        position: Vec2,
        renderer: &mut Renderer<B>,
    ) {
        let Some((texture, atlas)) = self.tileset else {
            log::warn!("TilemapRenderer::draw_map: no tileset, skipping render call");
            return;
        };
        if tiles.len() < width * height {
            log::warn!(
                "TilemapRenderer::draw_map: {} tiles given for a {width}x{height} map",
                tiles.len()
            );
            return;
        }

        let size = vec2(self.tile_size, self.tile_size);
        for y in 0..height {
            for x in 0..width {
                let id = tiles[y * width + x];
                let Some(coord) = self.keys.get(id as usize) else {
                    log::warn!("TilemapRenderer::draw_map: tile id {id} has no atlas key");
                    continue;
                };
                let origin = position + vec2(x as f32, y as f32) * self.tile_size;
                renderer.draw_rect(
                    Rect::new(origin, size),
                    Some(texture),
                    [Color::WHITE; 4],
                    atlas.uv(*coord),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::RecordingBackend, camera::Camera, config::RendererConfig,
        texture::TextureOptions,
    };

    fn setup() -> (Renderer<RecordingBackend>, TilemapRenderer) {
        let mut renderer =
            Renderer::with_defaults(RecordingBackend::new(100, 100), &RendererConfig::default())
                .unwrap();
        renderer.set_camera(Camera::new(100, 100));
        let tileset = renderer
            .load_texture_raw(2, 1, &[255; 8], TextureOptions::default())
            .unwrap();

        let mut tiles = TilemapRenderer::new();
        tiles.set_tileset(tileset, TextureAtlas::new(2, 1));
        tiles.set_atlas_keys(vec![AtlasCoord::new(0, 0), AtlasCoord::new(1, 0)]);
        tiles.set_tile_size(8.0);
        (renderer, tiles)
    }

    #[test]
    fn nothing_is_drawn_without_a_map() {
        let (mut renderer, tiles) = setup();
        tiles.draw(&mut renderer);
        assert_eq!(renderer.quad_count(), 0);
    }

    #[test]
    fn one_rect_per_tile_from_the_bottom_left() {
        let (mut renderer, mut tiles) = setup();
        tiles.set_map(TileMap::new(vec![0, 1, 1, 0, 0, 1], 3, 2, vec2(10.0, 20.0)));
        tiles.draw(&mut renderer);
        assert_eq!(renderer.quad_count(), 6);

        renderer.flush();
        let (_, batch) = renderer.backend().batches().next().unwrap();
        assert_eq!(batch.textures.len(), 1);
        // tile (x = 1, y = 1) is the fifth quad
        assert_eq!(batch.vertices[16].position, [18.0, 28.0]);
        // its id 0 samples the left half of the tileset
        assert_eq!(batch.vertices[16].tex_coords, [0.0, 0.0]);
        assert_eq!(batch.vertices[18].tex_coords, [0.5, 1.0]);
    }

    #[test]
    fn unknown_ids_and_short_maps_are_skipped() {
        let (mut renderer, tiles) = setup();
        tiles.draw_map(&[0, 7, 1, 0], 2, 2, Vec2::ZERO, &mut renderer);
        assert_eq!(renderer.quad_count(), 3);

        tiles.draw_map(&[0, 1], 2, 2, Vec2::ZERO, &mut renderer);
        assert_eq!(renderer.quad_count(), 3);
    }
}
