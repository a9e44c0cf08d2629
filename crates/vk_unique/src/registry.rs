//! Registration table of every owned Vulkan handle kind
//!
//! One line per kind. Adding a handle kind means adding it to the
//! `register_handles!` invocation below; the generic owner never changes.

use ash::vk::{self, Handle};
use std::ffi::CStr;
use std::fmt;

use crate::error::{HandleError, HandleResult};
use crate::handle::{
    DestroyDeviceChildFn, DeviceScoped, HandleKind, InstanceScoped, NoRelease, PoolScoped,
    ReleaseShape, TopLevel,
};

/// Registration entry describing how one handle kind is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    /// Vulkan object type of the handle
    pub object_type: vk::ObjectType,
    /// Shape of the release call
    pub shape: ReleaseShape,
    /// Name of the releasing entry point, `None` for no-op kinds
    pub destroy_fn: Option<&'static CStr>,
}

impl KindInfo {
    const fn new(
        object_type: vk::ObjectType,
        shape: ReleaseShape,
        destroy_fn: Option<&'static CStr>,
    ) -> Self {
        Self {
            object_type,
            shape,
            destroy_fn,
        }
    }

    /// Entry point name as UTF-8
    pub fn destroy_name(&self) -> Option<&'static str> {
        self.destroy_fn.and_then(|name| name.to_str().ok())
    }
}

impl fmt::Display for KindInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.destroy_name() {
            Some(name) => write!(f, "{:?} ({}, {})", self.object_type, self.shape, name),
            None => write!(f, "{:?} ({})", self.object_type, self.shape),
        }
    }
}

/// Device children whose destroy entry point lives in ash's Vulkan 1.0 device table
///
/// Kinds promoted to core later are resolved by name instead:
///
/// ```compile_fail
/// use ash::vk;
/// use vk_unique::prelude::*;
///
/// fn bind(device: &ash::Device) -> DeviceScoped<vk::PrivateDataSlot> {
///     DeviceScoped::from_device(device, None)
/// }
/// ```
pub trait CoreDeviceChild: HandleKind {
    /// The core destroy entry point on `device`
    fn core_entry(device: &ash::Device) -> DestroyDeviceChildFn<Self>;
}

/// Handles allocated from, and freed back to, a pool
pub trait PooledKind: HandleKind {
    /// Pool handle type
    type Pool: Handle + Copy + Eq + fmt::Debug;
    /// Free entry point type
    type FreeFn: Copy;

    /// The core free entry point on `device`
    fn core_free(device: &ash::Device) -> Self::FreeFn;

    /// Return one handle to its pool.
    ///
    /// # Safety
    ///
    /// `handle` must have been allocated from `pool` on `device`, and none of
    /// them may have been destroyed yet.
    unsafe fn free(free: Self::FreeFn, device: vk::Device, pool: Self::Pool, handle: Self);
}

const fn entry_name(bytes: &'static [u8]) -> &'static CStr {
    // Every caller passes a `concat!(name, "\0")` literal
    unsafe { CStr::from_bytes_with_nul_unchecked(bytes) }
}

macro_rules! entry {
    ($name:literal) => {
        entry_name(concat!($name, "\0").as_bytes())
    };
}

macro_rules! register_handles {
    (
        no_op: [$($noop:ident),* $(,)?],
        top_level: [$($top:ident => $top_fn:literal),* $(,)?],
        instance: [$($inst:ident => $inst_fn:literal),* $(,)?],
        dynamic_instance: [$($dyn_kind:ident => $dyn_fn:literal),* $(,)?],
        device_core: [$($core:ident => $core_fn:literal via $table:ident.$field:ident),* $(,)?],
        device_promoted: [$($promoted:ident => $promoted_fn:literal or $alias_fn:literal),* $(,)?],
        device_extension: [$($ext:ident => $ext_fn:literal),* $(,)?],
        pooled: [$($pooled:ident => $pooled_fn:literal),* $(,)?],
    ) => {
        $(
            impl HandleKind for vk::$noop {
                type Release = NoRelease;
                const SHAPE: ReleaseShape = ReleaseShape::NoOp;
                const DESTROY_FN: Option<&'static CStr> = None;
            }
        )*

        $(
            impl HandleKind for vk::$top {
                type Release = TopLevel<Self>;
                const SHAPE: ReleaseShape = ReleaseShape::TopLevel;
                const DESTROY_FN: Option<&'static CStr> = Some(entry!($top_fn));
            }
        )*

        $(
            impl HandleKind for vk::$inst {
                type Release = InstanceScoped<Self>;
                const SHAPE: ReleaseShape = ReleaseShape::Instance;
                const DESTROY_FN: Option<&'static CStr> = Some(entry!($inst_fn));
            }
        )*

        $(
            impl HandleKind for vk::$dyn_kind {
                type Release = InstanceScoped<Self>;
                const SHAPE: ReleaseShape = ReleaseShape::DynamicInstance;
                const DESTROY_FN: Option<&'static CStr> = Some(entry!($dyn_fn));
            }
        )*

        $(
            impl HandleKind for vk::$core {
                type Release = DeviceScoped<Self>;
                const SHAPE: ReleaseShape = ReleaseShape::Device;
                const DESTROY_FN: Option<&'static CStr> = Some(entry!($core_fn));
            }

            impl CoreDeviceChild for vk::$core {
                fn core_entry(device: &ash::Device) -> DestroyDeviceChildFn<Self> {
                    device.$table().$field
                }
            }
        )*

        $(
            impl HandleKind for vk::$promoted {
                type Release = DeviceScoped<Self>;
                const SHAPE: ReleaseShape = ReleaseShape::Device;
                const DESTROY_FN: Option<&'static CStr> = Some(entry!($promoted_fn));
                const DESTROY_ALIASES: &'static [&'static CStr] = &[entry!($alias_fn)];
            }
        )*

        $(
            impl HandleKind for vk::$ext {
                type Release = DeviceScoped<Self>;
                const SHAPE: ReleaseShape = ReleaseShape::Device;
                const DESTROY_FN: Option<&'static CStr> = Some(entry!($ext_fn));
            }
        )*

        $(
            impl HandleKind for vk::$pooled {
                type Release = PoolScoped<Self>;
                const SHAPE: ReleaseShape = ReleaseShape::Pool;
                const DESTROY_FN: Option<&'static CStr> = Some(entry!($pooled_fn));
            }
        )*

        /// Every registered handle kind
        pub const KINDS: &[KindInfo] = &[
            $(KindInfo::new(<vk::$noop as Handle>::TYPE, ReleaseShape::NoOp, None),)*
            $(KindInfo::new(<vk::$top as Handle>::TYPE, ReleaseShape::TopLevel, Some(entry!($top_fn))),)*
            $(KindInfo::new(<vk::$inst as Handle>::TYPE, ReleaseShape::Instance, Some(entry!($inst_fn))),)*
            $(KindInfo::new(<vk::$dyn_kind as Handle>::TYPE, ReleaseShape::DynamicInstance, Some(entry!($dyn_fn))),)*
            $(KindInfo::new(<vk::$core as Handle>::TYPE, ReleaseShape::Device, Some(entry!($core_fn))),)*
            $(KindInfo::new(<vk::$promoted as Handle>::TYPE, ReleaseShape::Device, Some(entry!($promoted_fn))),)*
            $(KindInfo::new(<vk::$ext as Handle>::TYPE, ReleaseShape::Device, Some(entry!($ext_fn))),)*
            $(KindInfo::new(<vk::$pooled as Handle>::TYPE, ReleaseShape::Pool, Some(entry!($pooled_fn))),)*
        ];
    };
}

register_handles! {
    no_op: [PhysicalDevice, Queue],
    top_level: [
        Instance => "vkDestroyInstance",
        Device => "vkDestroyDevice",
    ],
    instance: [
        SurfaceKHR => "vkDestroySurfaceKHR",
    ],
    dynamic_instance: [
        DebugUtilsMessengerEXT => "vkDestroyDebugUtilsMessengerEXT",
        DebugReportCallbackEXT => "vkDestroyDebugReportCallbackEXT",
    ],
    device_core: [
        Semaphore => "vkDestroySemaphore" via fp_v1_0.destroy_semaphore,
        Fence => "vkDestroyFence" via fp_v1_0.destroy_fence,
        DeviceMemory => "vkFreeMemory" via fp_v1_0.free_memory,
        Buffer => "vkDestroyBuffer" via fp_v1_0.destroy_buffer,
        Image => "vkDestroyImage" via fp_v1_0.destroy_image,
        Event => "vkDestroyEvent" via fp_v1_0.destroy_event,
        QueryPool => "vkDestroyQueryPool" via fp_v1_0.destroy_query_pool,
        BufferView => "vkDestroyBufferView" via fp_v1_0.destroy_buffer_view,
        ImageView => "vkDestroyImageView" via fp_v1_0.destroy_image_view,
        ShaderModule => "vkDestroyShaderModule" via fp_v1_0.destroy_shader_module,
        PipelineCache => "vkDestroyPipelineCache" via fp_v1_0.destroy_pipeline_cache,
        PipelineLayout => "vkDestroyPipelineLayout" via fp_v1_0.destroy_pipeline_layout,
        RenderPass => "vkDestroyRenderPass" via fp_v1_0.destroy_render_pass,
        Pipeline => "vkDestroyPipeline" via fp_v1_0.destroy_pipeline,
        DescriptorSetLayout => "vkDestroyDescriptorSetLayout" via fp_v1_0.destroy_descriptor_set_layout,
        Sampler => "vkDestroySampler" via fp_v1_0.destroy_sampler,
        DescriptorPool => "vkDestroyDescriptorPool" via fp_v1_0.destroy_descriptor_pool,
        Framebuffer => "vkDestroyFramebuffer" via fp_v1_0.destroy_framebuffer,
        CommandPool => "vkDestroyCommandPool" via fp_v1_0.destroy_command_pool,
    ],
    // ash stubs missing core entries with a panic, so these resolve by name
    device_promoted: [
        SamplerYcbcrConversion => "vkDestroySamplerYcbcrConversion" or "vkDestroySamplerYcbcrConversionKHR",
        DescriptorUpdateTemplate => "vkDestroyDescriptorUpdateTemplate" or "vkDestroyDescriptorUpdateTemplateKHR",
        PrivateDataSlot => "vkDestroyPrivateDataSlot" or "vkDestroyPrivateDataSlotEXT",
    ],
    device_extension: [
        SwapchainKHR => "vkDestroySwapchainKHR",
        ValidationCacheEXT => "vkDestroyValidationCacheEXT",
        AccelerationStructureNV => "vkDestroyAccelerationStructureNV",
        AccelerationStructureKHR => "vkDestroyAccelerationStructureKHR",
        IndirectCommandsLayoutNV => "vkDestroyIndirectCommandsLayoutNV",
        DeferredOperationKHR => "vkDestroyDeferredOperationKHR",
    ],
    pooled: [
        CommandBuffer => "vkFreeCommandBuffers",
        DescriptorSet => "vkFreeDescriptorSets",
    ],
}

impl PooledKind for vk::CommandBuffer {
    type Pool = vk::CommandPool;
    type FreeFn = vk::PFN_vkFreeCommandBuffers;

    fn core_free(device: &ash::Device) -> Self::FreeFn {
        device.fp_v1_0().free_command_buffers
    }

    unsafe fn free(free: Self::FreeFn, device: vk::Device, pool: vk::CommandPool, handle: Self) {
        free(device, pool, 1, &handle);
    }
}

impl PooledKind for vk::DescriptorSet {
    type Pool = vk::DescriptorPool;
    type FreeFn = vk::PFN_vkFreeDescriptorSets;

    fn core_free(device: &ash::Device) -> Self::FreeFn {
        device.fp_v1_0().free_descriptor_sets
    }

    unsafe fn free(free: Self::FreeFn, device: vk::Device, pool: vk::DescriptorPool, handle: Self) {
        // Requires a pool created with FREE_DESCRIPTOR_SET
        let result = free(device, pool, 1, &handle);
        if result != vk::Result::SUCCESS {
            log::warn!(
                "vkFreeDescriptorSets returned {:?} for descriptor set {:#x}",
                result,
                handle.as_raw()
            );
        }
    }
}

/// Registration entry for a statically known kind
pub const fn info<H: HandleKind>() -> KindInfo {
    KindInfo::new(H::TYPE, H::SHAPE, H::DESTROY_FN)
}

/// Registration entry for a runtime object type
pub fn lookup(object_type: vk::ObjectType) -> HandleResult<&'static KindInfo> {
    KINDS
        .iter()
        .find(|kind| kind.object_type == object_type)
        .ok_or(HandleError::UnsupportedKind(object_type))
}
