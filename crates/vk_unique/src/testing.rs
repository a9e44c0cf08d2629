//! Recording fake entry points for unit tests
//!
//! Each fake appends a `Call` to a thread-local log, so tests running in
//! parallel never see each other's calls.

use ash::vk::{self, Handle};
use std::cell::RefCell;
use std::ffi::CStr;
use std::mem;
use std::os::raw::c_char;

use crate::handle::{DestroyDeviceChildFn, DestroyInstanceChildFn};

/// One observed call into a fake entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    TopLevel {
        entry: &'static str,
        handle: u64,
        allocator: bool,
    },
    InstanceChild {
        entry: &'static str,
        parent: u64,
        handle: u64,
        allocator: bool,
    },
    DeviceChild {
        entry: &'static str,
        parent: u64,
        handle: u64,
        allocator: bool,
    },
    Pool {
        entry: &'static str,
        device: u64,
        pool: u64,
        handle: u64,
    },
}

impl Call {
    pub fn handle(&self) -> u64 {
        match self {
            Self::TopLevel { handle, .. }
            | Self::InstanceChild { handle, .. }
            | Self::DeviceChild { handle, .. }
            | Self::Pool { handle, .. } => *handle,
        }
    }

    pub fn parent(&self) -> Option<u64> {
        match self {
            Self::TopLevel { .. } => None,
            Self::InstanceChild { parent, .. } | Self::DeviceChild { parent, .. } => Some(*parent),
            Self::Pool { device, .. } => Some(*device),
        }
    }
}

thread_local! {
    static CALLS: RefCell<Vec<Call>> = RefCell::new(Vec::new());
    static LOOKUPS: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

pub fn reset() {
    CALLS.with(|calls| calls.borrow_mut().clear());
    LOOKUPS.with(|lookups| lookups.borrow_mut().clear());
}

pub fn calls() -> Vec<Call> {
    CALLS.with(|calls| calls.borrow().clone())
}

pub fn lookups() -> Vec<String> {
    LOOKUPS.with(|lookups| lookups.borrow().clone())
}

fn record(call: Call) {
    CALLS.with(|calls| calls.borrow_mut().push(call));
}

fn record_lookup(name: *const c_char) -> String {
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
    LOOKUPS.with(|lookups| lookups.borrow_mut().push(name.clone()));
    name
}

pub unsafe extern "system" fn destroy_instance(
    instance: vk::Instance,
    allocator: *const vk::AllocationCallbacks,
) {
    record(Call::TopLevel {
        entry: "vkDestroyInstance",
        handle: instance.as_raw(),
        allocator: !allocator.is_null(),
    });
}

pub unsafe extern "system" fn destroy_device(
    device: vk::Device,
    allocator: *const vk::AllocationCallbacks,
) {
    record(Call::TopLevel {
        entry: "vkDestroyDevice",
        handle: device.as_raw(),
        allocator: !allocator.is_null(),
    });
}

macro_rules! fake_device_child {
    ($($name:ident: $handle:ty => $entry:literal),* $(,)?) => {$(
        pub unsafe extern "system" fn $name(
            device: vk::Device,
            handle: $handle,
            allocator: *const vk::AllocationCallbacks,
        ) {
            record(Call::DeviceChild {
                entry: $entry,
                parent: device.as_raw(),
                handle: handle.as_raw(),
                allocator: !allocator.is_null(),
            });
        }
    )*};
}

fake_device_child! {
    destroy_buffer: vk::Buffer => "vkDestroyBuffer",
    destroy_fence: vk::Fence => "vkDestroyFence",
    destroy_semaphore: vk::Semaphore => "vkDestroySemaphore",
    destroy_swapchain: vk::SwapchainKHR => "vkDestroySwapchainKHR",
    destroy_private_data_slot_ext: vk::PrivateDataSlot => "vkDestroyPrivateDataSlotEXT",
}

macro_rules! fake_instance_child {
    ($($name:ident: $handle:ty => $entry:literal),* $(,)?) => {$(
        pub unsafe extern "system" fn $name(
            instance: vk::Instance,
            handle: $handle,
            allocator: *const vk::AllocationCallbacks,
        ) {
            record(Call::InstanceChild {
                entry: $entry,
                parent: instance.as_raw(),
                handle: handle.as_raw(),
                allocator: !allocator.is_null(),
            });
        }
    )*};
}

fake_instance_child! {
    destroy_surface: vk::SurfaceKHR => "vkDestroySurfaceKHR",
    destroy_debug_messenger: vk::DebugUtilsMessengerEXT => "vkDestroyDebugUtilsMessengerEXT",
}

pub unsafe extern "system" fn free_command_buffers(
    device: vk::Device,
    pool: vk::CommandPool,
    count: u32,
    buffers: *const vk::CommandBuffer,
) {
    for index in 0..count as usize {
        record(Call::Pool {
            entry: "vkFreeCommandBuffers",
            device: device.as_raw(),
            pool: pool.as_raw(),
            handle: (*buffers.add(index)).as_raw(),
        });
    }
}

pub unsafe extern "system" fn free_descriptor_sets(
    device: vk::Device,
    pool: vk::DescriptorPool,
    count: u32,
    sets: *const vk::DescriptorSet,
) -> vk::Result {
    for index in 0..count as usize {
        record(Call::Pool {
            entry: "vkFreeDescriptorSets",
            device: device.as_raw(),
            pool: pool.as_raw(),
            handle: (*sets.add(index)).as_raw(),
        });
    }
    vk::Result::SUCCESS
}

pub unsafe extern "system" fn free_descriptor_sets_failing(
    device: vk::Device,
    pool: vk::DescriptorPool,
    count: u32,
    sets: *const vk::DescriptorSet,
) -> vk::Result {
    free_descriptor_sets(device, pool, count, sets);
    vk::Result::ERROR_OUT_OF_HOST_MEMORY
}

/// Instance that exposes only `vkDestroyDebugUtilsMessengerEXT`
pub unsafe extern "system" fn get_instance_proc_addr(
    _instance: vk::Instance,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    match record_lookup(name).as_str() {
        "vkDestroyDebugUtilsMessengerEXT" => {
            let destroy: DestroyInstanceChildFn<vk::DebugUtilsMessengerEXT> = destroy_debug_messenger;
            Some(mem::transmute::<_, unsafe extern "system" fn()>(destroy))
        }
        _ => None,
    }
}

/// Instance without any extension loaded
pub unsafe extern "system" fn get_instance_proc_addr_empty(
    _instance: vk::Instance,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    record_lookup(name);
    None
}

/// Device that exposes only `vkDestroySwapchainKHR`
pub unsafe extern "system" fn get_device_proc_addr(
    _device: vk::Device,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    match record_lookup(name).as_str() {
        "vkDestroySwapchainKHR" => {
            let destroy: DestroyDeviceChildFn<vk::SwapchainKHR> = destroy_swapchain;
            Some(mem::transmute::<_, unsafe extern "system" fn()>(destroy))
        }
        _ => None,
    }
}

/// Vulkan 1.2 style device: private data slots only through the EXT name
pub unsafe extern "system" fn get_device_proc_addr_ext_only(
    _device: vk::Device,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    match record_lookup(name).as_str() {
        "vkDestroyPrivateDataSlotEXT" => {
            let destroy: DestroyDeviceChildFn<vk::PrivateDataSlot> = destroy_private_data_slot_ext;
            Some(mem::transmute::<_, unsafe extern "system" fn()>(destroy))
        }
        _ => None,
    }
}

/// Device that exposes nothing at all
pub unsafe extern "system" fn get_device_proc_addr_empty(
    _device: vk::Device,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    record_lookup(name);
    None
}

/// Instance whose only entry point is a `vkGetDeviceProcAddr` backed by
/// `get_device_proc_addr_ext_only`. Lookups made while loading are not recorded.
pub unsafe extern "system" fn get_instance_proc_addr_for_device(
    _instance: vk::Instance,
    name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if CStr::from_ptr(name).to_bytes() == b"vkGetDeviceProcAddr" {
        let lookup: vk::PFN_vkGetDeviceProcAddr = get_device_proc_addr_ext_only;
        Some(mem::transmute::<_, unsafe extern "system" fn()>(lookup))
    } else {
        None
    }
}
