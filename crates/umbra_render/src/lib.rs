//! Batched 2D rendering & shadow-casting point lights
//!
//! [`Renderer`] queues rects, lines, polygons & text, then batches them into as few
//! draw calls as the texture slot limit allows. [`LightSystem`] renders point lights
//! with hard shadows from polygon obstacles into a light map that gets multiplied over
//! the scene with [`Renderer::merge_light_scene`]
//!
//! The GPU sits behind [`GpuBackend`]: [`WgpuBackend`] talks to `wgpu`,
//! [`RecordingBackend`] records commands without a device

pub mod backend;
pub mod batch;
pub mod camera;
pub mod color;
pub mod config;
pub mod draw_queue;
pub mod error;
pub mod font;
pub mod geometry;
pub mod gpu;
pub mod lighting;
pub mod logging;
pub mod math;
pub mod primitives;
pub mod renderer;
pub mod screenshot;
pub mod target;
pub mod texture;
pub mod tilemap;
pub mod vertex;

pub use backend::{BlendMode, GpuBackend, PixelBuffer, PixelOrigin, RecordingBackend};
pub use camera::Camera;
pub use color::Color;
pub use config::{ConfigError, EngineConfig, LightingConfig, RendererConfig};
pub use error::RenderError;
pub use font::{Font, GlyphInfo, GlyphProvider};
pub use geometry::{Edge, Orientation, Polygon};
pub use gpu::WgpuBackend;
pub use lighting::{LightId, LightSource, LightSystem, ObstacleId};
pub use logging::{LoggingConfig, init_logging};
pub use math::{Rect, UvRect};
pub use renderer::{DefaultResources, FrameStats, Renderer};
pub use target::{RenderTarget, TargetFormat};
pub use texture::{AtlasCoord, Sprite, Texture, TextureAtlas, TextureOptions};
pub use tilemap::{TileMap, TilemapRenderer};

pub use glam;
