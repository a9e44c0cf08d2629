//! # vk_unique
//!
//! Move-only owners for raw Vulkan handles.
//!
//! Vulkan handles are plain integers or pointers with no lifetime of their own,
//! and each kind is released by its own entry point, often with extra context
//! (the owning device, the pool it came from, custom allocation callbacks).
//! [`UniqueHandle`] captures that context when a handle is wrapped and runs the
//! release exactly once: on drop, on reassignment, or on an explicit
//! [`UniqueHandle::release`].
//!
//! ## Features
//!
//! - **One generic owner**: every kind shares the same move and release logic
//! - **Declarative registry**: each kind is a single line in [`registry`]
//! - **Typed entry points**: a buffer owner can only hold a buffer destroyer
//! - **Extension lookup**: destroy functions resolved by name at construction,
//!   inert when the driver does not expose them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ash::vk;
//! use vk_unique::prelude::*;
//!
//! fn make_fence(device: &ash::Device) -> Result<UniqueHandle<vk::Fence>, vk::Result> {
//!     let info = vk::FenceCreateInfo::builder();
//!     let fence = unsafe { device.create_fence(&info, None)? };
//!     Ok(unsafe { UniqueHandle::new(fence, DeviceScoped::from_device(device, None)) })
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_const_for_fn)]

pub mod error;
pub mod handle;
pub mod loader;
pub mod registry;

#[cfg(test)]
mod testing;

pub use error::{HandleError, HandleResult};
pub use handle::{HandleKind, Release, ReleaseShape, UniqueHandle};

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        handle::{DeviceScoped, InstanceScoped, NoRelease, PoolScoped, TopLevel},
        loader::ProcResolver,
        registry::KindInfo,
        HandleError, HandleKind, UniqueHandle,
    };
}
