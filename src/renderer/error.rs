use std::path::PathBuf;
use ash::vk;
use thiserror::Error;

/// Failure categories of the renderer.
///
/// Everything except [`RenderError::StaleSurface`] is fatal: setup is never
/// retried and a failed frame aborts the application.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create {what}: {source}")]
    Initialization {
        what: &'static str,
        #[source]
        source: vk::Result,
    },

    #[error("Failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("No GPU exposes graphics and presentation queues for this surface")]
    NoSuitableDevice,

    #[error("Surface exposes no supported {0}")]
    UnsupportedSurface(&'static str),

    #[error("Presentation surface is out of date")]
    StaleSurface,

    #[error("Failed to load shader {path:?}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Window does not provide a usable {0} handle")]
    WindowHandle(&'static str),

    #[error("Frame failed during {stage}: {source}")]
    Frame {
        stage: &'static str,
        #[source]
        source: vk::Result,
    },
}

impl RenderError {
    /// Adapter for `map_err` on object creation calls.
    pub fn init(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |source| Self::Initialization { what, source }
    }

    /// Adapter for `map_err` on per-frame calls.
    pub fn frame(stage: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |source| Self::Frame { stage, source }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StaleSurface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_surface_is_recoverable() {
        assert!(!RenderError::StaleSurface.is_fatal());
        assert!(RenderError::NoSuitableDevice.is_fatal());
        assert!(RenderError::UnsupportedSurface("formats").is_fatal());
        assert!(RenderError::init("swapchain")(vk::Result::ERROR_OUT_OF_HOST_MEMORY).is_fatal());
    }

    #[test]
    fn init_adapter_keeps_context() {
        let err = RenderError::init("render pass")(vk::Result::ERROR_DEVICE_LOST);
        match &err {
            RenderError::Initialization { what, source } => {
                assert_eq!(*what, "render pass");
                assert_eq!(*source, vk::Result::ERROR_DEVICE_LOST);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().starts_with("Failed to create render pass"));
    }

    #[test]
    fn typed_error_survives_eyre_report() {
        let report = color_eyre::Report::new(RenderError::NoSuitableDevice);
        assert!(matches!(
            report.downcast_ref::<RenderError>(),
            Some(RenderError::NoSuitableDevice)
        ));
    }
}
