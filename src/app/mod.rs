use color_eyre::Result;

use crate::platform::{PlatformWindow, WindowConfig, WinitWindow};
use crate::renderer::{RenderConfig, RenderError, Renderer, VulkanRenderer};

pub struct App {
    // Declared first so the renderer is torn down before the window it presents to
    renderer: VulkanRenderer,
    window: WinitWindow,
}

impl App {
    pub fn new() -> Result<Self> {
        let window_config = WindowConfig::from_env();
        let render_config = RenderConfig::from_env();
        log::debug!("{:?}", window_config);
        log::debug!("{:?}", render_config);

        let window = WinitWindow::new(&window_config)?;
        let renderer = VulkanRenderer::init(&window, render_config)?;

        Ok(Self { renderer, window })
    }

    /// Pumps window messages and renders until the window closes
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering main loop");
        while self.window.is_running() {
            self.window.process_messages();
            if !self.window.is_running() {
                break;
            }

            if let Err(report) = self.renderer.render(&mut self.window) {
                match report.downcast_ref::<RenderError>() {
                    Some(e) if !e.is_fatal() => {
                        log::warn!("Skipping frame: {}", e);
                    }
                    _ => {
                        self.renderer.cleanup();
                        return Err(report);
                    }
                }
            }
        }

        log::info!("Window closed, shutting down");
        self.renderer.cleanup();
        Ok(())
    }
}
