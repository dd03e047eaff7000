use std::ffi::{c_char, CStr};
use ash::vk;
use color_eyre::Result;

use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::surface::RenderSurface;
use crate::renderer::error::RenderError;
use crate::renderer::internals::queue::{find_queue_families, Queue, QueueFamilyIndices};

/// Logical device, its queues and the swapchain loader bound to it
pub struct RenderDevice {
    pub logical: ash::Device,
    pub physical: vk::PhysicalDevice,
    pub queue_families: QueueFamilyIndices,

    pub graphics_queue: Queue,
    pub present_queue: Queue,

    pub swapchain_loader: ash::khr::swapchain::Device,
    /// Presentation can signal fences (`VK_EXT_swapchain_maintenance1`)
    pub present_fences: bool,
}

impl RenderDevice {
    pub fn new(
        instance: &RenderInstance,
        surface: &RenderSurface,
    ) -> Result<Self> {
        let (physical_device, queue_families) =
            Self::select_physical_device(&instance.instance, surface)?;
        let (graphics_family, present_family) = queue_families
            .pair()
            .ok_or(RenderError::NoSuitableDevice)?;

        let present_fences = instance.surface_maintenance1
            && Self::supports_swapchain_maintenance1(&instance.instance, physical_device)?;

        let logical_device = Self::create_logical_device(
            &instance.instance,
            physical_device,
            &queue_families,
            present_fences,
        )?;

        let graphics_queue = unsafe {
            let queue = logical_device.get_device_queue(graphics_family, 0);
            Queue::new(graphics_family, queue)
        };
        let present_queue = unsafe {
            let queue = logical_device.get_device_queue(present_family, 0);
            Queue::new(present_family, queue)
        };

        let swapchain_loader = ash::khr::swapchain::Device::new(
            &instance.instance,
            &logical_device,
        );

        log::info!(
            "Logical device created (graphics family {}, present family {}, present fences {})",
            graphics_family,
            present_family,
            if present_fences { "on" } else { "off" },
        );

        Ok(Self {
            logical: logical_device,
            physical: physical_device,
            queue_families,
            graphics_queue,
            present_queue,
            swapchain_loader,
            present_fences,
        })
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.logical.device_wait_idle() }
            .map_err(RenderError::frame("device idle wait"))?;
        Ok(())
    }

    fn select_physical_device(
        instance: &ash::Instance,
        surface: &RenderSurface,
    ) -> Result<(vk::PhysicalDevice, QueueFamilyIndices)> {
        log::info!("Picking physical device...");
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(RenderError::init("physical device list"))?;

        let (device, indices) = select_first_suitable(&devices, |device| {
            if !Self::supports_extension(instance, device, ash::khr::swapchain::NAME)? {
                return Ok(None);
            }
            let families = unsafe {
                instance.get_physical_device_queue_family_properties(device)
            };
            let indices = find_queue_families(&families, |index| {
                surface.supports_present(device, index)
            })?;
            Ok(indices.is_complete().then_some(indices))
        })?;

        let props = unsafe { instance.get_physical_device_properties(device) };
        log::info!(
            "Selected GPU {:?} ({:?})",
            props.device_name_as_c_str().unwrap_or(c"<unnamed>"),
            props.device_type,
        );

        Ok((device, indices))
    }

    fn supports_extension(
        instance: &ash::Instance,
        device: vk::PhysicalDevice,
        name: &CStr,
    ) -> Result<bool> {
        let supported = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(RenderError::init("device extension list"))?
            .iter()
            .any(|props| props.extension_name_as_c_str().is_ok_and(|ext| ext == name));
        Ok(supported)
    }

    fn supports_swapchain_maintenance1(
        instance: &ash::Instance,
        device: vk::PhysicalDevice,
    ) -> Result<bool> {
        if !Self::supports_extension(instance, device, ash::ext::swapchain_maintenance1::NAME)? {
            return Ok(false);
        }

        let mut maintenance1_features =
            vk::PhysicalDeviceSwapchainMaintenance1FeaturesEXT::default();
        {
            let mut features = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut maintenance1_features);
            unsafe {
                instance.get_physical_device_features2(device, &mut features);
            }
        }

        Ok(maintenance1_features.swapchain_maintenance1 == vk::TRUE)
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: &QueueFamilyIndices,
        present_fences: bool,
    ) -> Result<ash::Device> {
        log::info!("Creating logical device...");
        let queue_priorities = [1.0];
        let queue_create_infos = queue_families
            .unique()
            .iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(*family)
                    .queue_priorities(&queue_priorities)
            })
            .collect::<Vec<_>>();

        let mut extensions = vec![ash::khr::swapchain::NAME];
        if present_fences {
            extensions.push(ash::ext::swapchain_maintenance1::NAME);
        }
        #[cfg(target_os = "macos")]
        extensions.push(ash::khr::portability_subset::NAME);

        let enabled_extension_names = extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();
        let enabled_features = vk::PhysicalDeviceFeatures::default();

        let mut maintenance1_features =
            vk::PhysicalDeviceSwapchainMaintenance1FeaturesEXT::default()
                .swapchain_maintenance1(true);
        let mut device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names)
            .enabled_features(&enabled_features);
        if present_fences {
            device_create_info = device_create_info.push_next(&mut maintenance1_features);
        }

        let device = unsafe {
            instance.create_device(physical_device, &device_create_info, None)
        }
        .map_err(RenderError::init("logical device"))?;
        Ok(device)
    }

    /// # Safety
    /// Every object created from this device must already be destroyed.
    pub unsafe fn destroy(&mut self) {
        unsafe {
            self.logical.destroy_device(None);
        }
    }
}

/// Returns the first device, in enumeration order, for which `probe` yields queue families.
/// No ranking between discrete and integrated GPUs is done.
pub fn select_first_suitable<D, F>(
    devices: &[D],
    mut probe: F,
) -> Result<(D, QueueFamilyIndices)>
where
    D: Copy,
    F: FnMut(D) -> Result<Option<QueueFamilyIndices>>,
{
    for device in devices {
        if let Some(indices) = probe(*device)? {
            return Ok((*device, indices));
        }
    }
    Err(RenderError::NoSuitableDevice.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(graphics: u32, present: u32) -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics: Some(graphics),
            present: Some(present),
        }
    }

    #[test]
    fn first_suitable_device_wins() {
        let devices = ["integrated", "discrete", "software"];
        let mut probed = Vec::new();
        let (device, indices) = select_first_suitable(&devices, |d| {
            probed.push(d);
            Ok(match d {
                "integrated" => None,
                _ => Some(complete(0, 0)),
            })
        })
        .unwrap();

        assert_eq!(device, "discrete");
        assert_eq!(indices, complete(0, 0));
        // The software device is never probed once a match is found
        assert_eq!(probed, vec!["integrated", "discrete"]);
    }

    #[test]
    fn no_devices_is_an_error() {
        let devices: [u32; 0] = [];
        let err = select_first_suitable(&devices, |_| Ok(Some(complete(0, 0)))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::NoSuitableDevice)
        ));
    }

    #[test]
    fn no_device_with_complete_queues_is_an_error() {
        let devices = [1u32, 2, 3];
        let err = select_first_suitable(&devices, |_| Ok(None)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::NoSuitableDevice)
        ));
    }

    #[test]
    fn probe_errors_abort_selection() {
        let devices = [1u32, 2];
        let result = select_first_suitable(&devices, |d| {
            if d == 1 {
                Err(RenderError::init("device extension list")(vk::Result::ERROR_DEVICE_LOST).into())
            } else {
                Ok(Some(complete(0, 0)))
            }
        });
        assert!(result.is_err());
    }
}
