use wgpu::{
    AddressMode, Device, Extent3d, FilterMode, Origin3d, Queue, Sampler, SamplerDescriptor,
    TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect, TextureDescriptor,
    TextureDimension, TextureFormat, TextureUsages, TextureView,
};

use crate::texture::{TextureOptions, flip_rows};

/// A sampled view plus the sampler it's always read with
///
/// Image textures own their `wgpu::Texture` through the view; render target textures
/// share the view of their color attachment
pub struct GpuTexture {
    pub view: TextureView,
    pub sampler: Sampler,
}

impl GpuTexture {
    /// Uploads tightly packed RGBA8 pixels, top row first
    pub fn from_pixels(
        device: &Device,
        queue: &Queue,
        width: u32,
        height: u32,
        pixels: &[u8],
        options: TextureOptions,
    ) -> Self {
        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("Image Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // the quad shader samples at 1 - v; reversed rows put uv (0, 0) on the top-left
        let flipped;
        let data = if options.flip_vertically {
            pixels
        } else {
            let mut rows = pixels.to_vec();
            flip_rows(&mut rows, width, height, 4);
            flipped = rows;
            &flipped[..]
        };

        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        Self {
            view: texture.create_view(&Default::default()),
            sampler: sampler(device, options.pixelated),
        }
    }

    pub fn from_view(device: &Device, view: TextureView, pixelated: bool) -> Self {
        Self {
            view,
            sampler: sampler(device, pixelated),
        }
    }

    /// 1×1 white, bound to unused slots
    pub fn filler(device: &Device, queue: &Queue) -> Self {
        Self::from_pixels(
            device,
            queue,
            1,
            1,
            &[255, 255, 255, 255],
            TextureOptions::default(),
        )
    }
}

pub fn sampler(device: &Device, pixelated: bool) -> Sampler {
    let filter = if pixelated {
        FilterMode::Nearest
    } else {
        FilterMode::Linear
    };
    device.create_sampler(&SamplerDescriptor {
        label: Some("Texture Sampler"),
        address_mode_u: AddressMode::ClampToEdge,
        address_mode_v: AddressMode::ClampToEdge,
        address_mode_w: AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    })
}
