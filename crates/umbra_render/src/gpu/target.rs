use glam::UVec2;
use wgpu::{
    Adapter, Device, Extent3d, PresentMode, Surface, SurfaceConfiguration, SurfaceError,
    SurfaceTexture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    TextureView,
};

use crate::{error::RenderError, logging, target::TargetFormat, texture::TextureId};

/// Surface texture acquired for the current frame
pub struct AcquiredFrame {
    pub surface_texture: SurfaceTexture,
    pub view: TextureView,
}

/// Renders to the window's backbuffer (swapchain)
pub struct Backbuffer {
    surface: Surface<'static>,
    config: SurfaceConfiguration,
    frame: Option<AcquiredFrame>,
}

impl Backbuffer {
    pub fn new(
        surface: Surface<'static>,
        adapter: &Adapter,
        device: &Device,
        w: u32,
        h: u32,
    ) -> Result<Self, RenderError> {
        let mut config = surface
            .get_default_config(adapter, w.max(1), h.max(1))
            .ok_or(RenderError::UnsupportedSurface)?;
        config.present_mode = PresentMode::AutoVsync;
        // screenshots of the screen copy straight out of the surface texture
        if surface
            .get_capabilities(adapter)
            .usages
            .contains(TextureUsages::COPY_SRC)
        {
            config.usage |= TextureUsages::COPY_SRC;
        }
        (config.width, config.height) = (w, h);

        let backbuffer = Self {
            surface,
            config,
            frame: None,
        };
        backbuffer.configure(device);
        Ok(backbuffer)
    }

    fn configure(&self, device: &Device) {
        if self.config.width > 0 && self.config.height > 0 {
            self.surface.configure(device, &self.config);
        }
    }

    pub fn format(&self) -> TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.config.width, self.config.height)
    }

    pub fn can_read_back(&self) -> bool {
        self.config.usage.contains(TextureUsages::COPY_SRC)
    }

    /// Acquires the next surface texture; `false` means skip this frame
    pub fn acquire(&mut self, device: &Device) -> bool {
        if self.frame.is_some() {
            return true;
        }
        if self.config.width == 0 || self.config.height == 0 {
            return false;
        }
        match self.surface.get_current_texture() {
            Ok(surface_texture) => {
                let view = surface_texture.texture.create_view(&Default::default());
                self.frame = Some(AcquiredFrame {
                    surface_texture,
                    view,
                });
                true
            }
            Err(SurfaceError::Outdated | SurfaceError::Lost) => {
                log::warn!("Backbuffer::acquire: surface outdated, reconfiguring");
                self.configure(device);
                false
            }
            Err(SurfaceError::OutOfMemory) => {
                logging::critical("Backbuffer::acquire", "out of GPU memory");
                false
            }
            Err(err) => {
                log::warn!("Backbuffer::acquire: {err}");
                false
            }
        }
    }

    pub fn frame(&self) -> Option<&AcquiredFrame> {
        self.frame.as_ref()
    }

    pub fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.surface_texture.present();
        }
    }

    pub fn resize(&mut self, device: &Device, w: u32, h: u32) {
        // the old surface texture can't be presented after a reconfigure
        self.frame = None;
        (self.config.width, self.config.height) = (w, h);
        self.configure(device);
    }

    pub fn set_vsync(&mut self, device: &Device, on: bool) {
        self.config.present_mode = if on {
            PresentMode::Fifo
        } else {
            PresentMode::AutoNoVsync
        };
        self.configure(device);
    }
}

pub fn texture_format(format: TargetFormat) -> TextureFormat {
    match format {
        TargetFormat::Rgba8 => TextureFormat::Rgba8UnormSrgb,
        TargetFormat::Rgba16Float => TextureFormat::Rgba16Float,
    }
}

/// Offscreen color attachment that can also be sampled & copied out
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: TextureView,
    pub format: TextureFormat,
    pub size: UVec2,
    /// The entry in the backend's texture table that samples this target
    pub texture_id: Option<TextureId>,
}

impl GpuTarget {
    pub fn new(device: &Device, width: u32, height: u32, format: TextureFormat) -> Self {
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Offscreen Render Texture"),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());

        Self {
            texture,
            view,
            format,
            size: UVec2::new(width, height),
            texture_id: None,
        }
    }
}
