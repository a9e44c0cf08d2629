//! Bring-up settings

use crate::config::{Config, Deserialize, Serialize};

/// Settings for the headless bring-up, loadable from TOML or RON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BringUpConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable `VK_LAYER_KHRONOS_validation` and the debug messenger when available
    pub enable_validation: bool,
    /// Size in bytes of the uniform buffer
    pub buffer_size: u64,
    /// Number of primary command buffers to allocate
    pub command_buffer_count: u32,
    /// Number of descriptor sets to allocate
    pub descriptor_set_count: u32,
    /// Number of empty frames to submit
    pub frames: u32,
    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for BringUpConfig {
    fn default() -> Self {
        Self {
            app_name: "vk_unique bring-up".to_string(),
            enable_validation: cfg!(debug_assertions),
            buffer_size: 256,
            command_buffer_count: 2,
            descriptor_set_count: 2,
            frames: 3,
            log_level: "info".to_string(),
        }
    }
}

impl Config for BringUpConfig {}

impl BringUpConfig {
    /// Parsed log level, `Info` when unrecognised
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
