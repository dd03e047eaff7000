use std::time::Duration;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::platform::PlatformWindow;
use crate::renderer::config::{parse_var, Flag};

const ENV_WIDTH: &str = "VKSHELL_WIDTH";
const ENV_HEIGHT: &str = "VKSHELL_HEIGHT";
const ENV_RESIZABLE: &str = "VKSHELL_RESIZABLE";

// How long a blocking pump waits for events
const WAIT_PUMP_TIMEOUT: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: String::from("vkshell"),
            width: 800,
            height: 600,
            resizable: true,
        }
    }
}

impl WindowConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(width) = parse_var::<u32>(&lookup, ENV_WIDTH).filter(|w| *w > 0) {
            config.width = width;
        }
        if let Some(height) = parse_var::<u32>(&lookup, ENV_HEIGHT).filter(|h| *h > 0) {
            config.height = height;
        }
        if let Some(resizable) = parse_var::<Flag>(&lookup, ENV_RESIZABLE) {
            config.resizable = resizable.0;
        }
        config
    }

    fn attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// Native window driven by a pumped winit event loop
pub struct WinitWindow {
    event_loop: EventLoop<()>,
    state: WindowState,
}

struct WindowState {
    attributes: WindowAttributes,
    window: Option<Window>,
    running: bool,
    resized: bool,
}

impl WinitWindow {
    /// Opens the window, pumping the event loop until the native window exists
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let event_loop = Self::create_event_loop()?;

        let mut this = Self {
            event_loop,
            state: WindowState {
                attributes: config.attributes(),
                window: None,
                running: true,
                resized: false,
            },
        };

        while this.state.window.is_none() {
            let status = this
                .event_loop
                .pump_app_events(Some(WAIT_PUMP_TIMEOUT), &mut this.state);
            if let PumpStatus::Exit(code) = status {
                return Err(eyre!("Event loop exited with code {} before the window opened", code));
            }
            if !this.state.running {
                return Err(eyre!("Window could not be created"));
            }
        }

        log::info!("Opened window {}x{}", this.width(), this.height());

        Ok(this)
    }

    fn create_event_loop() -> Result<EventLoop<()>> {
        let mut builder = EventLoop::builder();

        // Presentation on Linux goes through the Xlib surface provider
        #[cfg(target_os = "linux")]
        {
            use winit::platform::x11::EventLoopBuilderExtX11;
            builder.with_x11();
        }

        Ok(builder.build()?)
    }

    fn window(&self) -> Result<&Window> {
        self.state
            .window
            .as_ref()
            .ok_or_else(|| eyre!("Window has been closed"))
    }

    fn pump(&mut self, timeout: Duration) {
        let status = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            log::debug!("Event loop exited with code {}", code);
            self.state.running = false;
        }
    }

    fn inner_size(&self) -> PhysicalSize<u32> {
        self.state
            .window
            .as_ref()
            .map_or(PhysicalSize::new(0, 0), |window| window.inner_size())
    }
}

impl PlatformWindow for WinitWindow {
    fn process_messages(&mut self) {
        self.pump(Duration::ZERO);
    }

    fn wait_messages(&mut self) {
        self.pump(WAIT_PUMP_TIMEOUT);
    }

    fn is_running(&self) -> bool {
        self.state.running
    }

    fn width(&self) -> u32 {
        self.inner_size().width
    }

    fn height(&self) -> u32 {
        self.inner_size().height
    }

    fn native_handle(&self) -> Result<RawWindowHandle> {
        Ok(self.window()?.window_handle()?.as_raw())
    }

    fn instance_handle(&self) -> Result<RawDisplayHandle> {
        Ok(self.window()?.display_handle()?.as_raw())
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }
}

impl WindowState {
    fn close(&mut self, event_loop: &ActiveEventLoop) {
        self.running = false;
        event_loop.exit();
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            match event_loop.create_window(self.attributes.clone()) {
                Ok(window) => self.window = Some(window),
                Err(e) => {
                    log::error!("Failed to create window: {}", e);
                    self.close(event_loop);
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.close(event_loop);
            }
            WindowEvent::Resized(new_size) => {
                log::trace!("Window resized to {}x{}", new_size.width, new_size.height);
                self.resized = true;
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.resized = true;
            }
            WindowEvent::KeyboardInput {
                event:
                KeyEvent {
                    logical_key: Key::Named(NamedKey::Escape),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => {
                self.close(event_loop);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_config_overrides() {
        let config = WindowConfig::from_lookup(|key| match key {
            ENV_WIDTH => Some("1280".into()),
            ENV_HEIGHT => Some("0".into()),
            ENV_RESIZABLE => Some("false".into()),
            _ => None,
        });
        assert_eq!(config.width, 1280);
        // zero is not a usable initial size
        assert_eq!(config.height, 600);
        assert!(!config.resizable);
    }
}
