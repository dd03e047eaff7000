use ash::vk;
use color_eyre::Result;

use crate::renderer::error::RenderError;

/// How "render finished" semaphores are keyed.
///
/// A semaphore waited on by a present can only be reused once that present is known to be
/// done. With present fences that is tracked per frame slot; without them the only safe
/// key is the swapchain image, whose reacquisition implies the previous present finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFinishedPolicy {
    PerSlot,
    PerImage,
}

impl RenderFinishedPolicy {
    pub fn for_present_fences(present_fences: bool) -> Self {
        if present_fences {
            Self::PerSlot
        } else {
            Self::PerImage
        }
    }

    pub fn count(self, frames_in_flight: usize, image_count: usize) -> usize {
        match self {
            Self::PerSlot => frames_in_flight,
            Self::PerImage => image_count,
        }
    }

    pub fn index(self, slot: usize, image_index: usize) -> usize {
        match self {
            Self::PerSlot => slot,
            Self::PerImage => image_index,
        }
    }
}

/// Semaphores and fences for every frame slot
pub struct FrameSyncSet {
    /// Signaled by acquire, waited by submit
    pub image_available: Vec<vk::Semaphore>,
    /// Signaled by submit, waited by present
    pub render_finished: Vec<vk::Semaphore>,
    /// Signaled when a slot's submission completes, created signaled
    pub in_flight: Vec<vk::Fence>,
    /// Signaled when a slot's present completes, empty without present fences
    pub present_fences: Vec<vk::Fence>,
    pub policy: RenderFinishedPolicy,
}

impl FrameSyncSet {
    pub fn new(
        device: &ash::Device,
        frames_in_flight: usize,
        image_count: usize,
        present_fences: bool,
    ) -> Result<Self> {
        let policy = RenderFinishedPolicy::for_present_fences(present_fences);
        let mut sync = Self {
            image_available: Vec::with_capacity(frames_in_flight),
            render_finished: Vec::new(),
            in_flight: Vec::with_capacity(frames_in_flight),
            present_fences: Vec::new(),
            policy,
        };

        // Release whatever was created before the failure
        if let Err(e) = sync.populate(device, frames_in_flight, image_count, present_fences) {
            unsafe { sync.destroy(device) };
            return Err(e);
        }

        log::debug!(
            "Created sync objects for {} frames in flight ({:?} render-finished semaphores)",
            frames_in_flight,
            policy,
        );
        Ok(sync)
    }

    fn populate(
        &mut self,
        device: &ash::Device,
        frames_in_flight: usize,
        image_count: usize,
        present_fences: bool,
    ) -> Result<()> {
        for _ in 0..frames_in_flight {
            self.image_available.push(create_semaphore(device)?);
            self.in_flight.push(create_signaled_fence(device)?);
            if present_fences {
                // Signaled so the first present of each slot does not block
                self.present_fences.push(create_signaled_fence(device)?);
            }
        }
        let render_finished = self.policy.count(frames_in_flight, image_count);
        for _ in 0..render_finished {
            self.render_finished.push(create_semaphore(device)?);
        }
        Ok(())
    }

    pub fn render_finished(&self, slot: usize, image_index: usize) -> vk::Semaphore {
        self.render_finished[self.policy.index(slot, image_index)]
    }

    pub fn present_fence(&self, slot: usize) -> Option<vk::Fence> {
        self.present_fences.get(slot).copied()
    }

    /// Matches per-image semaphores to a rebuilt swapchain's image count.
    ///
    /// The device must be idle.
    pub fn resize_for_images(
        &mut self,
        device: &ash::Device,
        image_count: usize,
    ) -> Result<()> {
        if self.policy != RenderFinishedPolicy::PerImage {
            return Ok(());
        }
        while self.render_finished.len() > image_count {
            if let Some(semaphore) = self.render_finished.pop() {
                unsafe { device.destroy_semaphore(semaphore, None) };
            }
        }
        while self.render_finished.len() < image_count {
            self.render_finished.push(create_semaphore(device)?);
        }
        Ok(())
    }

    /// # Safety
    /// None of the objects may still be in use by the device.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            for semaphore in self.image_available.drain(..).chain(self.render_finished.drain(..)) {
                device.destroy_semaphore(semaphore, None);
            }
            for fence in self.in_flight.drain(..).chain(self.present_fences.drain(..)) {
                device.destroy_fence(fence, None);
            }
        }
    }
}

fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let semaphore = unsafe {
        device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
    }
    .map_err(RenderError::init("semaphore"))?;
    Ok(semaphore)
}

fn create_signaled_fence(device: &ash::Device) -> Result<vk::Fence> {
    let fence = unsafe {
        device.create_fence(
            &vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED),
            None,
        )
    }
    .map_err(RenderError::init("fence"))?;
    Ok(fence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_follows_present_fence_capability() {
        assert_eq!(
            RenderFinishedPolicy::for_present_fences(true),
            RenderFinishedPolicy::PerSlot
        );
        assert_eq!(
            RenderFinishedPolicy::for_present_fences(false),
            RenderFinishedPolicy::PerImage
        );
    }

    #[test]
    fn per_slot_semaphores_ignore_image_index() {
        let policy = RenderFinishedPolicy::PerSlot;
        assert_eq!(policy.count(2, 3), 2);
        assert_eq!(policy.index(1, 2), 1);
        assert_eq!(policy.index(0, 2), 0);
    }

    #[test]
    fn per_image_semaphores_ignore_slot() {
        let policy = RenderFinishedPolicy::PerImage;
        assert_eq!(policy.count(2, 3), 3);
        assert_eq!(policy.index(1, 2), 2);
        assert_eq!(policy.index(0, 2), 2);
    }
}
