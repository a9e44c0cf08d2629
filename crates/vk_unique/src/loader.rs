//! Name-based lookup of extension entry points
//!
//! Extension destroy functions are not part of ash's core tables. They are
//! resolved by name against the instance or device that owns the object, once,
//! when the owner is constructed.

use ash::vk;
use std::ffi::CStr;
use std::mem;

use crate::handle::HandleKind;

/// Something that can look up entry points on a parent handle
pub trait ProcResolver<P> {
    /// Look up `name` on `parent`, `None` when the driver does not expose it.
    ///
    /// # Safety
    ///
    /// `parent` must be a live handle this resolver is able to query.
    unsafe fn resolve(&self, parent: P, name: &CStr) -> vk::PFN_vkVoidFunction;
}

impl ProcResolver<vk::Instance> for ash::Entry {
    unsafe fn resolve(&self, instance: vk::Instance, name: &CStr) -> vk::PFN_vkVoidFunction {
        (self.static_fn().get_instance_proc_addr)(instance, name.as_ptr())
    }
}

impl ProcResolver<vk::Instance> for vk::PFN_vkGetInstanceProcAddr {
    unsafe fn resolve(&self, instance: vk::Instance, name: &CStr) -> vk::PFN_vkVoidFunction {
        (*self)(instance, name.as_ptr())
    }
}

impl ProcResolver<vk::Device> for ash::Instance {
    unsafe fn resolve(&self, device: vk::Device, name: &CStr) -> vk::PFN_vkVoidFunction {
        (self.fp_v1_0().get_device_proc_addr)(device, name.as_ptr())
    }
}

impl ProcResolver<vk::Device> for vk::PFN_vkGetDeviceProcAddr {
    unsafe fn resolve(&self, device: vk::Device, name: &CStr) -> vk::PFN_vkVoidFunction {
        (*self)(device, name.as_ptr())
    }
}

/// Look up the destroy entry point of `H` on `parent`: `H::DESTROY_FN` first,
/// then each of `H::DESTROY_ALIASES`. `None` when none of them is exposed.
///
/// # Safety
///
/// `parent` must be live, and `F` must match the signature of every name tried.
pub(crate) unsafe fn resolve_destroy<H, P, R, F>(resolver: &R, parent: P) -> Option<F>
where
    H: HandleKind,
    P: Copy,
    R: ProcResolver<P> + ?Sized,
    F: Copy,
{
    let names = H::DESTROY_FN.into_iter().chain(H::DESTROY_ALIASES.iter().copied());
    for name in names {
        if let Some(function) = unsafe { resolver.resolve(parent, name) } {
            return Some(unsafe { cast_entry_point(function) });
        }
    }

    if let Some(name) = H::DESTROY_FN {
        log::debug!(
            "{} is not available for {:?}; release disabled",
            name.to_string_lossy(),
            H::TYPE
        );
    }
    None
}

/// Reinterpret a resolved entry point as its real signature.
///
/// # Safety
///
/// `F` must be a function pointer type matching the entry point's actual
/// signature.
pub(crate) unsafe fn cast_entry_point<F: Copy>(function: unsafe extern "system" fn()) -> F {
    debug_assert_eq!(
        mem::size_of::<F>(),
        mem::size_of::<unsafe extern "system" fn()>()
    );
    mem::transmute_copy(&function)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{DeviceScoped, InstanceScoped};
    use crate::testing::{self, Call};
    use crate::UniqueHandle;
    use ash::vk::Handle;

    fn messenger(resolver: vk::PFN_vkGetInstanceProcAddr) -> UniqueHandle<vk::DebugUtilsMessengerEXT> {
        let instance = vk::Instance::from_raw(0x1000);
        unsafe {
            let action = InstanceScoped::resolve(&resolver, instance, None);
            UniqueHandle::new(vk::DebugUtilsMessengerEXT::from_raw(0x77), action)
        }
    }

    #[test]
    fn test_resolved_destroy_runs_once() {
        testing::reset();
        let owner = messenger(testing::get_instance_proc_addr);
        assert!(owner.action().is_some_and(InstanceScoped::is_resolved));
        drop(owner);

        assert_eq!(
            testing::calls(),
            vec![Call::InstanceChild {
                entry: "vkDestroyDebugUtilsMessengerEXT",
                parent: 0x1000,
                handle: 0x77,
                allocator: false,
            }]
        );
    }

    #[test]
    fn test_unresolvable_destroy_is_inert() {
        let _ = env_logger::builder().is_test(true).try_init();
        testing::reset();
        let mut owner = messenger(testing::get_instance_proc_addr_empty);
        assert!(owner.action().is_some_and(|action| !action.is_resolved()));

        owner.release();
        assert!(owner.is_null());
        drop(owner);
        assert!(testing::calls().is_empty());
    }

    #[test]
    fn test_lookup_happens_at_construction() {
        testing::reset();
        let owner = messenger(testing::get_instance_proc_addr);
        assert_eq!(
            testing::lookups(),
            vec!["vkDestroyDebugUtilsMessengerEXT".to_string()]
        );
        drop(owner);
        // releasing does not look anything up again
        assert_eq!(testing::lookups().len(), 1);
    }

    #[test]
    fn test_device_extension_resolution() {
        testing::reset();
        let resolver: vk::PFN_vkGetDeviceProcAddr = testing::get_device_proc_addr;
        let device = vk::Device::from_raw(0xd0);
        {
            let action = unsafe { DeviceScoped::resolve(&resolver, device, None) };
            let _swapchain = unsafe { UniqueHandle::new(vk::SwapchainKHR::from_raw(0x5c), action) };

            // not exposed by the fake device
            let action = unsafe { DeviceScoped::resolve(&resolver, device, None) };
            let _cache = unsafe { UniqueHandle::new(vk::ValidationCacheEXT::from_raw(0x5d), action) };
        }
        assert_eq!(
            testing::calls(),
            vec![Call::DeviceChild {
                entry: "vkDestroySwapchainKHR",
                parent: 0xd0,
                handle: 0x5c,
                allocator: false,
            }]
        );
    }

    #[test]
    fn test_promoted_kind_falls_back_to_extension_name() {
        let static_fn = vk::StaticFn {
            get_instance_proc_addr: testing::get_instance_proc_addr_for_device,
        };
        let instance = unsafe { ash::Instance::load(&static_fn, vk::Instance::from_raw(0x1000)) };
        testing::reset();
        {
            let action = unsafe { DeviceScoped::resolve(&instance, vk::Device::from_raw(0xd0), None) };
            assert!(action.is_resolved());
            let _slot = unsafe { UniqueHandle::new(vk::PrivateDataSlot::from_raw(0x1), action) };
        }
        assert_eq!(
            testing::lookups(),
            vec!["vkDestroyPrivateDataSlot", "vkDestroyPrivateDataSlotEXT"]
        );
        assert_eq!(
            testing::calls(),
            vec![Call::DeviceChild {
                entry: "vkDestroyPrivateDataSlotEXT",
                parent: 0xd0,
                handle: 0x1,
                allocator: false,
            }]
        );
    }

    #[test]
    fn test_promoted_kind_without_any_name_is_inert() {
        testing::reset();
        let resolver: vk::PFN_vkGetDeviceProcAddr = testing::get_device_proc_addr_empty;
        let mut slot = unsafe {
            let action = DeviceScoped::resolve(&resolver, vk::Device::from_raw(0xd0), None);
            UniqueHandle::new(vk::PrivateDataSlot::from_raw(0x1), action)
        };
        assert!(!slot.action().is_some_and(DeviceScoped::is_resolved));

        slot.release();
        drop(slot);
        assert!(testing::calls().is_empty());
        assert_eq!(testing::lookups().len(), 2);
    }
}
