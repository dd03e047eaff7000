use std::path::PathBuf;
use std::str::FromStr;

const ENV_VALIDATION: &str = "VKSHELL_VALIDATION";
const ENV_FRAMES_IN_FLIGHT: &str = "VKSHELL_FRAMES_IN_FLIGHT";
const ENV_PRESENT_FENCES: &str = "VKSHELL_PRESENT_FENCES";

/// Upper bound for `frames_in_flight`, each slot owns a fence and semaphores
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Contains configuration options for the renderer like validation, frames in flight and shaders
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub application_name: String,
    pub enable_validation: bool,
    pub frames_in_flight: usize,
    /// Use present fences when `VK_EXT_swapchain_maintenance1` is available
    pub present_fences: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            application_name: String::from("vkshell"),
            enable_validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            present_fences: true,
            vertex_shader: PathBuf::from("shaders/vert.spv"),
            fragment_shader: PathBuf::from("shaders/frag.spv"),
            clear_color: [0.2, 0.3, 0.3, 1.0],
        }
    }
}

impl RenderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides found through `lookup` on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(enable) = parse_var::<Flag>(&lookup, ENV_VALIDATION) {
            config.enable_validation = enable.0;
        }
        if let Some(frames) = parse_var::<usize>(&lookup, ENV_FRAMES_IN_FLIGHT) {
            if frames > MAX_FRAMES_IN_FLIGHT {
                log::warn!(
                    "{} frames in flight requested, capping at {}",
                    frames,
                    MAX_FRAMES_IN_FLIGHT
                );
            }
            config.frames_in_flight = frames.clamp(1, MAX_FRAMES_IN_FLIGHT);
        }
        if let Some(enable) = parse_var::<Flag>(&lookup, ENV_PRESENT_FENCES) {
            config.present_fences = enable.0;
        }

        config
    }
}

/// Boolean accepting `1/0`, `true/false`, `on/off`
pub(crate) struct Flag(pub bool);

impl FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(Flag(true)),
            "0" | "false" | "off" | "no" => Ok(Flag(false)),
            _ => Err(()),
        }
    }
}

pub(crate) fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring invalid value {:?} for {}", raw, key);
            None
        }
    }
}
