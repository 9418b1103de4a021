pub mod render {
    pub use umbra_render::{
        BlendMode, Camera, Color, DefaultResources, FrameStats, GpuBackend, RecordingBackend,
        RenderError, RenderTarget, Renderer, TargetFormat, WgpuBackend,
    };
}

pub mod texture {
    pub use umbra_render::{
        AtlasCoord, Font, GlyphInfo, GlyphProvider, Sprite, Texture, TextureAtlas,
        TextureOptions, TileMap, TilemapRenderer,
    };
}

pub mod lighting {
    pub use umbra_render::{LightId, LightSource, LightSystem, ObstacleId};
}

pub mod config {
    pub use umbra_render::{
        ConfigError, EngineConfig, LightingConfig, LoggingConfig, RendererConfig, init_logging,
    };
}

pub mod math {
    pub use umbra_render::glam::{Mat4, UVec2, Vec2, Vec3, vec2, vec3};
    pub use umbra_render::{Edge, Orientation, Polygon, Rect, UvRect};
}
