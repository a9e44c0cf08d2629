//! Scoped ownership of a single Vulkan handle
//!
//! `UniqueHandle<H>` owns exactly one raw Vulkan handle together with the
//! destruction payload that was captured when the handle was wrapped. The
//! payload is plain data (function pointer plus parent handles plus optional
//! allocation callbacks), never a closure, so every owner destroys its handle
//! with precisely the context it was built with.
//!
//! # Ownership rules
//!
//! - The null handle (`as_raw() == 0`) is the empty state and is never destroyed.
//! - `release` is the only destruction path. `Drop`, `take` and move-assignment
//!   all go through it.
//! - Owners are move-only. There is no `Clone`; two owners of one handle is the
//!   bug this type exists to prevent.
//! - Parents are borrowed by raw value only. Tearing down a parent before the
//!   children bound to it is a caller error that the owner cannot detect.
//!
//! ```rust,ignore
//! let buffer = unsafe { device.create_buffer(&info, None)? };
//! let buffer = unsafe { UniqueHandle::new(buffer, DeviceScoped::from_device(&device, None)) };
//! // ... use buffer.get() ...
//! // vkDestroyBuffer runs when `buffer` goes out of scope
//! ```

mod actions;

pub use actions::{
    allocator_ptr, DestroyDeviceChildFn, DestroyInstanceChildFn, DestroyTopLevelFn, DeviceScoped,
    InstanceScoped, NoRelease, PoolScoped, TopLevel,
};

use ash::vk::Handle;
use std::ffi::CStr;
use std::fmt;
use std::mem;

use crate::registry::{self, KindInfo};

/// Shape of the call needed to release a handle kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseShape {
    /// Not an owned resource; releasing is a deliberate no-op
    NoOp,
    /// `destroy(handle, allocator)`
    TopLevel,
    /// `destroy(instance, handle, allocator)` with a statically known entry point
    Instance,
    /// `destroy(instance, handle, allocator)` looked up by name on the instance
    DynamicInstance,
    /// `destroy(device, handle, allocator)`
    Device,
    /// `free(device, pool, 1, &handle)`
    Pool,
}

impl fmt::Display for ReleaseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOp => "no-op",
            Self::TopLevel => "self-sufficient",
            Self::Instance => "instance-scoped",
            Self::DynamicInstance => "dynamically-resolved",
            Self::Device => "device-scoped",
            Self::Pool => "pool-scoped",
        };
        f.write_str(name)
    }
}

/// A Vulkan handle kind with a registered destruction shape
///
/// Only the registration table in [`crate::registry`] implements this trait.
/// Wrapping a handle type that is not registered fails to compile:
///
/// ```compile_fail
/// use ash::vk;
/// use vk_unique::UniqueHandle;
///
/// let display = UniqueHandle::<vk::DisplayKHR>::null();
/// ```
pub trait HandleKind: Handle + Copy + Eq + fmt::Debug + 'static {
    /// Payload captured at construction and consumed by `release`
    type Release: Release<Self>;

    /// How this kind is released
    const SHAPE: ReleaseShape;

    /// Name of the Vulkan entry point that releases this kind, if any
    const DESTROY_FN: Option<&'static CStr>;

    /// Extension names of the same entry point, tried after `DESTROY_FN` when
    /// resolving by name
    const DESTROY_ALIASES: &'static [&'static CStr] = &[];
}

/// Deferred destruction bound to one handle
pub trait Release<H>: fmt::Debug {
    /// Destroy `handle` with the captured context.
    ///
    /// # Safety
    ///
    /// `handle` must be a live, non-null handle owned by the caller, and every
    /// parent captured in `self` must still be alive.
    unsafe fn release(&self, handle: H);
}

/// Move-only owner of a Vulkan handle
pub struct UniqueHandle<H: HandleKind> {
    handle: H,
    action: Option<H::Release>,
}

impl<H: HandleKind> UniqueHandle<H> {
    /// Take ownership of `handle`, binding the action that will destroy it.
    ///
    /// A null `handle` is accepted and stays inert until something is written
    /// through [`get_mut`](Self::get_mut).
    ///
    /// # Safety
    ///
    /// `handle` must not be owned by anything else, and `action` must be the
    /// correct release for it: the captured entry point must belong to the
    /// parent that created `handle`, and those parents must outlive this owner.
    pub unsafe fn new(handle: H, action: H::Release) -> Self {
        Self {
            handle,
            action: Some(action),
        }
    }

    /// An empty owner holding the null handle and no action
    pub fn null() -> Self {
        Self {
            handle: H::from_raw(0),
            action: None,
        }
    }

    /// The raw handle, for passing to Vulkan calls
    pub fn get(&self) -> H {
        self.handle
    }

    /// Mutable access to the raw handle slot.
    ///
    /// Meant for deferred initialisation: construct with a null handle and a
    /// bound action, then hand this slot to a `vkCreate*` call as its output.
    ///
    /// # Safety
    ///
    /// Whatever is written here will be destroyed with the bound action. Writing
    /// over a live handle leaks it, and writing a handle the action cannot
    /// destroy is undefined behaviour. An owner made with [`null`](Self::null)
    /// has no action, so anything written into it is never destroyed.
    pub unsafe fn get_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    /// Whether this owner holds the null handle
    pub fn is_null(&self) -> bool {
        self.handle.as_raw() == 0
    }

    /// The bound destruction payload, `None` once moved out
    pub fn action(&self) -> Option<&H::Release> {
        self.action.as_ref()
    }

    /// Registration entry for this handle kind
    pub fn kind(&self) -> KindInfo {
        registry::info::<H>()
    }

    /// Destroy the owned handle now.
    ///
    /// Does nothing when the handle is already null, so it may be called any
    /// number of times. The bound action is kept, so a handle written later
    /// through `get_mut` is destroyed with the same context.
    pub fn release(&mut self) {
        if self.is_null() {
            return;
        }

        let handle = mem::replace(&mut self.handle, H::from_raw(0));
        if let Some(action) = &self.action {
            log::trace!("Releasing {:?} {:#x} ({})", H::TYPE, handle.as_raw(), H::SHAPE);
            // Soundness was promised by the caller of `new`/`get_mut`
            unsafe { action.release(handle) };
        }
    }

    /// Move ownership out, leaving this owner null with no action.
    ///
    /// The returned owner destroys the handle with the original context.
    #[must_use = "dropping the returned owner destroys the handle immediately"]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::null())
    }
}

impl<H: HandleKind> Default for UniqueHandle<H> {
    fn default() -> Self {
        Self::null()
    }
}

impl<H: HandleKind> Drop for UniqueHandle<H> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<H: HandleKind> fmt::Debug for UniqueHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueHandle")
            .field("handle", &self.handle)
            .field("action", &self.action)
            .finish()
    }
}
