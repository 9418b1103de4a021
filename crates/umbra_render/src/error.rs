use thiserror::Error;

/// Errors produced by fallible rendering operations
///
/// Drawing, flushing & state changes never fail; they log & fall back instead.
/// Everything that acquires GPU resources or touches the file system returns this.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no compatible graphics adapter found")]
    NoAdapter,

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface does not support the adapter")]
    UnsupportedSurface,

    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompilation { label: String, message: String },

    #[error("texture of {width}x{height} expects {expected} bytes, got {actual}")]
    TextureData {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("texture of {width}x{height} is too large to address")]
    TextureTooLarge { width: u32, height: u32 },

    #[error("texture has zero area ({width}x{height})")]
    ZeroSizedTexture { width: u32, height: u32 },

    #[error("render target has zero area ({width}x{height})")]
    ZeroSizedTarget { width: u32, height: u32 },

    #[error("failed to create render target: {0}")]
    TargetCreation(String),

    #[error("render target handle is no longer valid")]
    InvalidTarget,

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Whether rendering can't meaningfully continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoAdapter
                | Self::Surface(_)
                | Self::Device(_)
                | Self::UnsupportedSurface
                | Self::ShaderCompilation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_errors_are_fatal() {
        let err = RenderError::ShaderCompilation {
            label: "quad".into(),
            message: "unexpected token".into(),
        };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "shader `quad` failed to compile: unexpected token"
        );
    }

    #[test]
    fn io_errors_are_recoverable() {
        let err: RenderError = std::io::Error::other("disk full").into();
        assert!(!err.is_fatal());
        assert!(!RenderError::InvalidTarget.is_fatal());
    }
}
