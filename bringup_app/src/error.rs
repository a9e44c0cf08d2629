//! Bring-up errors

use ash::vk;
use thiserror::Error;

use crate::config::ConfigError;

/// Everything that can stop the bring-up
#[derive(Error, Debug)]
pub enum BringUpError {
    /// The Vulkan loader could not be opened
    #[error("Failed to load Vulkan: {0}")]
    Load(#[from] ash::LoadingError),

    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No physical device exposes a graphics queue
    #[error("No suitable physical device found")]
    NoSuitableDevice,

    /// No memory type satisfies the buffer's requirements
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// The application name contains an interior NUL
    #[error("Invalid application name: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    /// Settings could not be loaded or saved
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<vk::Result> for BringUpError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for bring-up operations
pub type BringUpResult<T> = Result<T, BringUpError>;
