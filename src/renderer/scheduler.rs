//! Frame pacing across several frames in flight.
//!
//! [`FrameScheduler`] owns the bookkeeping (current slot, which slot last used each
//! swapchain image, pending rebuilds) and drives a [`FrameBackend`] that performs the
//! actual GPU work.

use ash::vk;
use color_eyre::Result;

use crate::platform::PlatformWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: usize, suboptimal: bool },
    /// The swapchain no longer matches the surface
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented { suboptimal: bool },
    Stale,
}

/// What happened during one call to [`FrameScheduler::render_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Presented, then rebuilt the swapchain
    PresentedAndRebuilt,
    /// Nothing was submitted, the swapchain was rebuilt instead
    Rebuilt,
    /// Nothing was submitted, a rebuild is still waiting for a visible window
    Skipped,
}

/// GPU side of the frame protocol, indexed by frame slot and swapchain image
pub trait FrameBackend {
    /// Blocks until the slot's in-flight fence is signaled
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Blocks until the slot's previous present no longer waits on its render-finished
    /// semaphore. Does nothing when presents are not fenced.
    fn wait_present(&mut self, slot: usize) -> Result<()>;

    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Submits the image's commands, signaling the slot's in-flight fence
    fn submit(&mut self, slot: usize, image_index: usize) -> Result<()>;

    fn present(&mut self, slot: usize, image_index: usize) -> Result<PresentOutcome>;

    /// Blocks until queued submissions and fenced presents have completed
    fn wait_idle(&mut self) -> Result<()>;

    /// Releases everything sized by the swapchain. Must tolerate being called twice.
    fn destroy_swapchain(&mut self);

    /// Builds the swapchain and its dependents, returning the image count
    fn create_swapchain(&mut self, extent: vk::Extent2D) -> Result<usize>;
}

pub struct FrameScheduler {
    frames_in_flight: usize,
    current_frame: usize,
    /// Slot whose fence last covered each swapchain image
    images_in_flight: Vec<Option<usize>>,
    rebuild_pending: bool,
}

impl FrameScheduler {
    pub fn new(frames_in_flight: usize, image_count: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            current_frame: 0,
            images_in_flight: vec![None; image_count],
            rebuild_pending: false,
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn image_owner(&self, image_index: usize) -> Option<usize> {
        self.images_in_flight.get(image_index).copied().flatten()
    }

    pub fn image_count(&self) -> usize {
        self.images_in_flight.len()
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Makes the next frame rebuild the swapchain before drawing
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    pub fn render_frame(
        &mut self,
        backend: &mut dyn FrameBackend,
        window: &mut dyn PlatformWindow,
    ) -> Result<FrameStatus> {
        if self.rebuild_pending {
            return Ok(if self.rebuild(backend, window)? {
                FrameStatus::Rebuilt
            } else {
                FrameStatus::Skipped
            });
        }

        let slot = self.current_frame;
        backend.wait_for_slot(slot)?;
        backend.wait_present(slot)?;

        let image_index = match backend.acquire_next_image(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    log::trace!("Acquired suboptimal image {}", image_index);
                }
                image_index
            }
            AcquireOutcome::Stale => {
                log::debug!("Swapchain out of date on acquire");
                // The slot fence is still signaled, so the retry does not block
                return Ok(if self.rebuild(backend, window)? {
                    FrameStatus::Rebuilt
                } else {
                    FrameStatus::Skipped
                });
            }
        };

        backend.reset_slot(slot)?;

        if let Some(owner) = self.image_owner(image_index) {
            // The own slot's fence was waited on above and is reset now
            if owner != slot {
                backend.wait_for_slot(owner)?;
            }
        }
        if let Some(entry) = self.images_in_flight.get_mut(image_index) {
            *entry = Some(slot);
        }

        backend.submit(slot, image_index)?;
        let outcome = backend.present(slot, image_index)?;
        log::trace!("Frame slot {} presented image {} ({:?})", slot, image_index, outcome);

        let resized = window.take_resized();
        let stale = match outcome {
            PresentOutcome::Presented { suboptimal } => suboptimal,
            PresentOutcome::Stale => true,
        };

        let mut status = FrameStatus::Presented;
        if stale || resized {
            log::debug!(
                "Rebuilding swapchain after present (stale or suboptimal: {}, resized: {})",
                stale,
                resized,
            );
            if self.rebuild(backend, window)? {
                status = FrameStatus::PresentedAndRebuilt;
            }
        }

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        Ok(status)
    }

    /// Recreates the swapchain for the window's current size.
    ///
    /// Returns `false` when the window stopped running while it had no visible area; the
    /// rebuild is then retried by the next frame.
    pub fn rebuild(
        &mut self,
        backend: &mut dyn FrameBackend,
        window: &mut dyn PlatformWindow,
    ) -> Result<bool> {
        backend.wait_idle()?;
        backend.destroy_swapchain();
        self.rebuild_pending = true;

        while window.width() == 0 || window.height() == 0 {
            if !window.is_running() {
                log::debug!("Window closed while minimized, swapchain rebuild abandoned");
                return Ok(false);
            }
            window.wait_messages();
        }

        let extent = vk::Extent2D {
            width: window.width(),
            height: window.height(),
        };
        let image_count = backend.create_swapchain(extent)?;

        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count, None);
        self.rebuild_pending = false;

        log::debug!(
            "Swapchain rebuilt at {}x{} with {} images",
            extent.width,
            extent.height,
            image_count,
        );
        Ok(true)
    }
}
