use std::ffi::{c_char, c_void, CStr, CString};
use ash::vk;
use color_eyre::Result;

use crate::renderer::config::RenderConfig;
use crate::renderer::core::surface::SurfaceProvider;
use crate::renderer::error::RenderError;

/// Initializes Vulkan and keeps the Vulkan instance alive
pub struct RenderInstance {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    /// `VK_EXT_surface_maintenance1` is enabled, a prerequisite for present fences
    pub surface_maintenance1: bool,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl RenderInstance {
    const VALIDATION_LAYER: &'static CStr = c"VK_LAYER_KHRONOS_validation";

    pub fn new(
        config: &RenderConfig,
        surface: &dyn SurfaceProvider,
    ) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(RenderError::from)?;

        let enable_validation = config.enable_validation
            && Self::validation_layer_supported(&entry)?;

        let supported_extensions = unsafe {
            entry.enumerate_instance_extension_properties(None)
        }
        .map_err(RenderError::init("instance extension list"))?;
        let is_supported = |name: &CStr| {
            supported_extensions
                .iter()
                .any(|props| props.extension_name_as_c_str().is_ok_and(|ext| ext == name))
        };

        let mut extensions = surface.required_extensions()?;
        if enable_validation {
            extensions.push(ash::ext::debug_utils::NAME);
        }

        let surface_maintenance1 = config.present_fences
            && is_supported(ash::ext::surface_maintenance1::NAME)
            && is_supported(ash::khr::get_surface_capabilities2::NAME);
        if surface_maintenance1 {
            extensions.push(ash::khr::get_surface_capabilities2::NAME);
            extensions.push(ash::ext::surface_maintenance1::NAME);
        }

        #[cfg(target_os = "macos")]
        {
            extensions.push(ash::khr::portability_enumeration::NAME);
            extensions.push(ash::khr::get_physical_device_properties2::NAME);
        }

        let instance = Self::create_instance(&entry, config, enable_validation, &extensions)?;

        let debug_utils = if enable_validation {
            match Self::create_debug_utils_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!("Vulkan instance created");

        Ok(Self {
            entry,
            instance,
            surface_maintenance1,
            debug_utils,
        })
    }

    fn create_instance(
        entry: &ash::Entry,
        config: &RenderConfig,
        enable_validation: bool,
        extensions: &[&CStr],
    ) -> Result<ash::Instance> {
        let application_name = CString::new(config.application_name.as_str())
            .unwrap_or_else(|_| CString::from(c"vkshell"));
        let application_info = vk::ApplicationInfo::default()
            .application_name(&application_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"vkshell")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_2);

        let enabled_layer_names = if enable_validation {
            log::info!("Validation layers enabled");
            vec![Self::VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };
        let enabled_extension_names = extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();

        let mut debug_info = debug_utils_messenger_create_info();
        let mut instance_info = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_layer_names(&enabled_layer_names)
            .enabled_extension_names(&enabled_extension_names);
        if enable_validation {
            // Also report problems raised by vkCreateInstance/vkDestroyInstance themselves
            instance_info = instance_info.push_next(&mut debug_info);
        }

        #[cfg(target_os = "macos")]
        let instance_info = instance_info
            .flags(vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR);

        let instance = unsafe { entry.create_instance(&instance_info, None) }
            .map_err(RenderError::init("Vulkan instance"))?;
        Ok(instance)
    }

    fn create_debug_utils_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils_loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let debug_utils_info = debug_utils_messenger_create_info();
        let debug_utils_messenger = unsafe {
            debug_utils_loader.create_debug_utils_messenger(&debug_utils_info, None)
        }
        .map_err(RenderError::init("debug messenger"))?;
        Ok((debug_utils_loader, debug_utils_messenger))
    }

    fn validation_layer_supported(entry: &ash::Entry) -> Result<bool> {
        let supported = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(RenderError::init("instance layer list"))?
            .iter()
            .any(|props| {
                props
                    .layer_name_as_c_str()
                    .is_ok_and(|name| name == Self::VALIDATION_LAYER)
            });

        if !supported {
            log::warn!(
                "Validation layer {:?} requested but not available, continuing without it",
                Self::VALIDATION_LAYER
            );
        }
        Ok(supported)
    }

    /// # Safety
    /// Every object created from this instance must already be destroyed.
    pub unsafe fn destroy(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn debug_utils_messenger_create_info(
) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    let message_severity = vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    let message_type = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(message_severity)
        .message_type(message_type)
        .pfn_user_callback(Some(debug_callback))
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let msg_type = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "[General]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[Performance]",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[Validation]",
        _ => "[Unknown]",
    };
    let msg = unsafe {
        if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
            c"<no message>"
        } else {
            CStr::from_ptr((*p_callback_data).p_message)
        }
    };
    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            log::trace!("{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::debug!("{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("{} {:?}", msg_type, msg);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("{} {:?}", msg_type, msg);
        }
        _ => {
            log::warn!("[Unknown severity]{} {:?}", msg_type, msg);
        }
    }

    vk::FALSE
}
