//! Error types for handle ownership

use ash::vk;
use thiserror::Error;

/// Errors raised by the handle registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// The object type has no entry in the registration table
    #[error("Unsupported handle kind: {0:?}")]
    UnsupportedKind(vk::ObjectType),
}

/// Result type for registry operations
pub type HandleResult<T> = Result<T, HandleError>;
