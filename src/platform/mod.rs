pub mod window;

use color_eyre::Result;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

pub use window::{WindowConfig, WinitWindow};

/// Capabilities the renderer needs from a native window.
///
/// The message pump is driven explicitly through [`process_messages`](Self::process_messages)
/// so the renderer can keep pumping while it waits for a minimized window to come back.
pub trait PlatformWindow {
    fn process_messages(&mut self);

    /// Like [`process_messages`](Self::process_messages) but may block briefly for new events
    fn wait_messages(&mut self) {
        self.process_messages();
    }

    fn is_running(&self) -> bool;

    /// Client area width in physical pixels, 0 while minimized
    fn width(&self) -> u32;

    /// Client area height in physical pixels, 0 while minimized
    fn height(&self) -> u32;

    fn native_handle(&self) -> Result<RawWindowHandle>;

    fn instance_handle(&self) -> Result<RawDisplayHandle>;

    /// Returns and clears the pending resize notification
    fn take_resized(&mut self) -> bool {
        false
    }
}
