//! Destruction payloads, one per release shape
//!
//! Each payload is captured when a handle is wrapped and never changes
//! afterwards. Entry points are stored as typed function pointers so the
//! payload for `vk::Buffer` can only ever call a `vkDestroyBuffer`-shaped
//! function.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk::{self, Handle};
use std::fmt;
use std::ptr;

use super::{HandleKind, Release};
use crate::loader::{self, ProcResolver};
use crate::registry::{CoreDeviceChild, PooledKind};

/// `vkDestroyInstance` / `vkDestroyDevice` shaped entry point
pub type DestroyTopLevelFn<H> = unsafe extern "system" fn(H, *const vk::AllocationCallbacks);

/// `vkDestroySurfaceKHR` shaped entry point
pub type DestroyInstanceChildFn<H> =
    unsafe extern "system" fn(vk::Instance, H, *const vk::AllocationCallbacks);

/// `vkDestroyBuffer` shaped entry point
pub type DestroyDeviceChildFn<H> =
    unsafe extern "system" fn(vk::Device, H, *const vk::AllocationCallbacks);

/// Pointer form of an optional allocator override, as Vulkan expects it
pub fn allocator_ptr(allocator: &Option<vk::AllocationCallbacks>) -> *const vk::AllocationCallbacks {
    allocator
        .as_ref()
        .map_or(ptr::null(), |callbacks| callbacks as *const _)
}

/// Release for handles that are not owned resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRelease;

impl<H> Release<H> for NoRelease {
    unsafe fn release(&self, _handle: H) {}
}

/// Release for handles with no parent: instances and devices
pub struct TopLevel<H> {
    destroy: DestroyTopLevelFn<H>,
    allocator: Option<vk::AllocationCallbacks>,
}

impl<H: HandleKind> TopLevel<H> {
    /// Bind an explicit entry point
    pub fn new(destroy: DestroyTopLevelFn<H>, allocator: Option<vk::AllocationCallbacks>) -> Self {
        Self { destroy, allocator }
    }

    /// Allocation callbacks passed back at destruction
    pub fn allocator(&self) -> Option<&vk::AllocationCallbacks> {
        self.allocator.as_ref()
    }
}

impl TopLevel<vk::Instance> {
    /// `vkDestroyInstance` from a loaded instance
    pub fn from_instance(instance: &ash::Instance, allocator: Option<vk::AllocationCallbacks>) -> Self {
        Self::new(instance.fp_v1_0().destroy_instance, allocator)
    }
}

impl TopLevel<vk::Device> {
    /// `vkDestroyDevice` from a loaded device
    pub fn from_device(device: &ash::Device, allocator: Option<vk::AllocationCallbacks>) -> Self {
        Self::new(device.fp_v1_0().destroy_device, allocator)
    }
}

impl<H: HandleKind> Release<H> for TopLevel<H> {
    unsafe fn release(&self, handle: H) {
        (self.destroy)(handle, allocator_ptr(&self.allocator));
    }
}

impl<H> Clone for TopLevel<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for TopLevel<H> {}

impl<H> fmt::Debug for TopLevel<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopLevel")
            .field("destroy", &(self.destroy as usize as *const ()))
            .field("allocator", &self.allocator.is_some())
            .finish()
    }
}

/// Release for children of an instance
///
/// The entry point is optional: extension destroy functions are resolved by
/// name, and a failed lookup leaves a payload that releases nothing.
pub struct InstanceScoped<H> {
    instance: vk::Instance,
    destroy: Option<DestroyInstanceChildFn<H>>,
    allocator: Option<vk::AllocationCallbacks>,
}

impl<H: HandleKind> InstanceScoped<H> {
    /// Bind an explicit entry point
    pub fn new(
        instance: vk::Instance,
        destroy: DestroyInstanceChildFn<H>,
        allocator: Option<vk::AllocationCallbacks>,
    ) -> Self {
        Self {
            instance,
            destroy: Some(destroy),
            allocator,
        }
    }

    /// Look up `H::DESTROY_FN` on `instance` now.
    ///
    /// When the lookup fails the payload is inert: an object of this kind could
    /// not have been created through this instance without the same extension.
    ///
    /// # Safety
    ///
    /// `instance` must be a live instance the resolver can query.
    pub unsafe fn resolve<R>(
        resolver: &R,
        instance: vk::Instance,
        allocator: Option<vk::AllocationCallbacks>,
    ) -> Self
    where
        R: ProcResolver<vk::Instance> + ?Sized,
    {
        let destroy = unsafe { loader::resolve_destroy::<H, _, _, DestroyInstanceChildFn<H>>(resolver, instance) };

        Self {
            instance,
            destroy,
            allocator,
        }
    }

    /// Owning instance captured at construction
    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    /// Whether an entry point was bound
    pub fn is_resolved(&self) -> bool {
        self.destroy.is_some()
    }
}

impl InstanceScoped<vk::SurfaceKHR> {
    /// `vkDestroySurfaceKHR` from the surface extension loader
    pub fn from_surface_loader(
        instance: vk::Instance,
        loader: &Surface,
        allocator: Option<vk::AllocationCallbacks>,
    ) -> Self {
        Self::new(instance, loader.fp().destroy_surface_khr, allocator)
    }
}

impl<H: HandleKind> Release<H> for InstanceScoped<H> {
    unsafe fn release(&self, handle: H) {
        if let Some(destroy) = self.destroy {
            destroy(self.instance, handle, allocator_ptr(&self.allocator));
        }
    }
}

impl<H> Clone for InstanceScoped<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for InstanceScoped<H> {}

impl<H> fmt::Debug for InstanceScoped<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceScoped")
            .field("instance", &self.instance)
            .field("resolved", &self.destroy.is_some())
            .field("allocator", &self.allocator.is_some())
            .finish()
    }
}

/// Release for children of a logical device
pub struct DeviceScoped<H> {
    device: vk::Device,
    destroy: Option<DestroyDeviceChildFn<H>>,
    allocator: Option<vk::AllocationCallbacks>,
}

impl<H: HandleKind> DeviceScoped<H> {
    /// Bind an explicit entry point
    pub fn new(
        device: vk::Device,
        destroy: DestroyDeviceChildFn<H>,
        allocator: Option<vk::AllocationCallbacks>,
    ) -> Self {
        Self {
            device,
            destroy: Some(destroy),
            allocator,
        }
    }

    /// Look up `H::DESTROY_FN` on `device` now, then its extension aliases.
    ///
    /// Used for extension kinds and for kinds promoted to core after 1.0,
    /// whose core name is missing on devices that only enable the extension.
    ///
    /// # Safety
    ///
    /// `device` must be a live device the resolver can query.
    pub unsafe fn resolve<R>(
        resolver: &R,
        device: vk::Device,
        allocator: Option<vk::AllocationCallbacks>,
    ) -> Self
    where
        R: ProcResolver<vk::Device> + ?Sized,
    {
        let destroy = unsafe { loader::resolve_destroy::<H, _, _, DestroyDeviceChildFn<H>>(resolver, device) };

        Self {
            device,
            destroy,
            allocator,
        }
    }

    /// Owning device captured at construction
    pub fn device(&self) -> vk::Device {
        self.device
    }

    /// Whether an entry point was bound
    pub fn is_resolved(&self) -> bool {
        self.destroy.is_some()
    }
}

impl<H: CoreDeviceChild> DeviceScoped<H> {
    /// Core entry point for `H` from a loaded device
    pub fn from_device(device: &ash::Device, allocator: Option<vk::AllocationCallbacks>) -> Self {
        Self::new(device.handle(), H::core_entry(device), allocator)
    }
}

impl DeviceScoped<vk::SwapchainKHR> {
    /// `vkDestroySwapchainKHR` from the swapchain extension loader
    pub fn from_swapchain_loader(
        device: vk::Device,
        loader: &SwapchainLoader,
        allocator: Option<vk::AllocationCallbacks>,
    ) -> Self {
        Self::new(device, loader.fp().destroy_swapchain_khr, allocator)
    }
}

impl<H: HandleKind> Release<H> for DeviceScoped<H> {
    unsafe fn release(&self, handle: H) {
        if let Some(destroy) = self.destroy {
            destroy(self.device, handle, allocator_ptr(&self.allocator));
        }
    }
}

impl<H> Clone for DeviceScoped<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for DeviceScoped<H> {}

impl<H> fmt::Debug for DeviceScoped<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceScoped")
            .field("device", &self.device)
            .field("resolved", &self.destroy.is_some())
            .field("allocator", &self.allocator.is_some())
            .finish()
    }
}

/// Release for handles allocated from a pool: freed back to that pool
pub struct PoolScoped<H: PooledKind> {
    device: vk::Device,
    pool: H::Pool,
    free: H::FreeFn,
}

impl<H: PooledKind> PoolScoped<H> {
    /// Bind an explicit free entry point
    pub fn new(device: vk::Device, pool: H::Pool, free: H::FreeFn) -> Self {
        Self { device, pool, free }
    }

    /// Core free entry point for `H` from a loaded device
    pub fn from_device(device: &ash::Device, pool: H::Pool) -> Self {
        Self::new(device.handle(), pool, H::core_free(device))
    }

    /// Pool the handle is returned to
    pub fn pool(&self) -> H::Pool {
        self.pool
    }

    /// Owning device captured at construction
    pub fn device(&self) -> vk::Device {
        self.device
    }
}

impl<H: PooledKind> Release<H> for PoolScoped<H> {
    unsafe fn release(&self, handle: H) {
        H::free(self.free, self.device, self.pool, handle);
    }
}

impl<H: PooledKind> Clone for PoolScoped<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: PooledKind> Copy for PoolScoped<H> {}

impl<H: PooledKind> fmt::Debug for PoolScoped<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolScoped")
            .field("device", &self.device)
            .field("pool", &format_args!("{:#x}", self.pool.as_raw()))
            .finish()
    }
}
