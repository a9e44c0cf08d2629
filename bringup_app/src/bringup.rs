//! Headless Vulkan bring-up
//!
//! Every object created here is owned by a [`UniqueHandle`]. Teardown needs no
//! code beyond waiting for the device: fields drop in declaration order, so
//! [`GpuObjects`] lists children before the objects they were created from.

use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_char, CStr, CString};

use vk_unique::prelude::*;
use vk_unique::registry::CoreDeviceChild;

use crate::error::{BringUpError, BringUpResult};
use crate::settings::BringUpConfig;

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// All objects of one bring-up, torn down children-first
pub struct GpuObjects {
    descriptor_sets: Vec<UniqueHandle<vk::DescriptorSet>>,
    descriptor_pool: UniqueHandle<vk::DescriptorPool>,
    descriptor_layout: UniqueHandle<vk::DescriptorSetLayout>,
    buffer: UniqueHandle<vk::Buffer>,
    memory: UniqueHandle<vk::DeviceMemory>,
    render_finished: UniqueHandle<vk::Semaphore>,
    in_flight: UniqueHandle<vk::Fence>,
    command_buffers: Vec<UniqueHandle<vk::CommandBuffer>>,
    command_pool: UniqueHandle<vk::CommandPool>,
    queue: UniqueHandle<vk::Queue>,
    device: UniqueHandle<vk::Device>,
    physical_device: UniqueHandle<vk::PhysicalDevice>,
    messenger: UniqueHandle<vk::DebugUtilsMessengerEXT>,
    instance: UniqueHandle<vk::Instance>,

    // Dispatch tables. Entry keeps the loader library mapped, so it goes last.
    device_fns: ash::Device,
    instance_fns: ash::Instance,
    entry: ash::Entry,
}

/// Wrap a core device child with the device's own destroy entry point.
///
/// # Safety
///
/// `handle` must have been created on `device` and not be owned elsewhere.
unsafe fn own_device_child<H>(device: &ash::Device, handle: H) -> UniqueHandle<H>
where
    H: CoreDeviceChild<Release = DeviceScoped<H>>,
{
    unsafe { UniqueHandle::new(handle, DeviceScoped::from_device(device, None)) }
}

impl GpuObjects {
    /// Create the whole object graph described by `config`
    pub fn create(config: &BringUpConfig) -> BringUpResult<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let validation = config.enable_validation && validation_available(&entry)?;
        if config.enable_validation && !validation {
            log::warn!("Validation requested but VK_LAYER_KHRONOS_validation or VK_EXT_debug_utils is missing");
        }

        let (instance_fns, instance) = create_instance(&entry, &config.app_name, validation)?;

        let messenger = if validation {
            create_messenger(&entry, &instance_fns)?
        } else {
            UniqueHandle::null()
        };

        let (physical_device, queue_family) = select_physical_device(&instance_fns)?;
        let (device_fns, device) = create_device(&instance_fns, physical_device.get(), queue_family)?;
        let queue = unsafe { UniqueHandle::new(device_fns.get_device_queue(queue_family, 0), NoRelease) };

        let command_pool = unsafe {
            let info = vk::CommandPoolCreateInfo::builder()
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                .queue_family_index(queue_family);
            own_device_child(&device_fns, device_fns.create_command_pool(&info, None)?)
        };

        let command_buffers = unsafe {
            let info = vk::CommandBufferAllocateInfo::builder()
                .command_pool(command_pool.get())
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(config.command_buffer_count.max(1));
            device_fns
                .allocate_command_buffers(&info)?
                .into_iter()
                .map(|buffer| UniqueHandle::new(buffer, PoolScoped::from_device(&device_fns, command_pool.get())))
                .collect::<Vec<_>>()
        };

        let in_flight = create_fence(&device_fns)?;
        let render_finished = create_semaphore(&device_fns)?;

        let buffer = unsafe {
            let info = vk::BufferCreateInfo::builder()
                .size(config.buffer_size.max(1))
                .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            own_device_child(&device_fns, device_fns.create_buffer(&info, None)?)
        };

        let memory = unsafe {
            let requirements = device_fns.get_buffer_memory_requirements(buffer.get());
            let properties = instance_fns.get_physical_device_memory_properties(physical_device.get());
            let memory_type = find_memory_type(
                &properties,
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            let info = vk::MemoryAllocateInfo::builder()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type);
            let memory = own_device_child(&device_fns, device_fns.allocate_memory(&info, None)?);
            device_fns.bind_buffer_memory(buffer.get(), memory.get(), 0)?;
            memory
        };

        let descriptor_layout = unsafe {
            let bindings = [vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::ALL)
                .build()];
            let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
            own_device_child(&device_fns, device_fns.create_descriptor_set_layout(&info, None)?)
        };

        let set_count = config.descriptor_set_count.max(1);
        let descriptor_pool = unsafe {
            let sizes = [vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: set_count,
            }];
            // Sets are freed one by one on drop
            let info = vk::DescriptorPoolCreateInfo::builder()
                .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
                .max_sets(set_count)
                .pool_sizes(&sizes);
            own_device_child(&device_fns, device_fns.create_descriptor_pool(&info, None)?)
        };

        let descriptor_sets = unsafe {
            let layouts = vec![descriptor_layout.get(); set_count as usize];
            let info = vk::DescriptorSetAllocateInfo::builder()
                .descriptor_pool(descriptor_pool.get())
                .set_layouts(&layouts);
            device_fns
                .allocate_descriptor_sets(&info)?
                .into_iter()
                .map(|set| UniqueHandle::new(set, PoolScoped::from_device(&device_fns, descriptor_pool.get())))
                .collect::<Vec<_>>()
        };

        let buffer_info = [vk::DescriptorBufferInfo {
            buffer: buffer.get(),
            offset: 0,
            range: vk::WHOLE_SIZE,
        }];
        let writes: Vec<_> = descriptor_sets
            .iter()
            .map(|set| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(set.get())
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_info)
                    .build()
            })
            .collect();
        unsafe { device_fns.update_descriptor_sets(&writes, &[]) };

        log::info!(
            "Bring-up complete: {} command buffers, {} descriptor sets, {} byte uniform buffer",
            command_buffers.len(),
            descriptor_sets.len(),
            config.buffer_size.max(1)
        );

        Ok(Self {
            descriptor_sets,
            descriptor_pool,
            descriptor_layout,
            buffer,
            memory,
            render_finished,
            in_flight,
            command_buffers,
            command_pool,
            queue,
            device,
            physical_device,
            messenger,
            instance,
            device_fns,
            instance_fns,
            entry,
        })
    }

    /// Record and submit an empty command buffer, then wait for it.
    ///
    /// The fence and semaphore are replaced afterwards; assigning over the old
    /// owners destroys the previous objects.
    pub fn submit_empty_frame(&mut self, frame: usize) -> BringUpResult<()> {
        let command_buffer = self.command_buffers[frame % self.command_buffers.len()].get();

        unsafe {
            let begin = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device_fns.begin_command_buffer(command_buffer, &begin)?;
            self.device_fns.end_command_buffer(command_buffer)?;

            let command_buffers = [command_buffer];
            let signal = [self.render_finished.get()];
            let submit = vk::SubmitInfo::builder()
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal);
            self.device_fns
                .queue_submit(self.queue.get(), &[submit.build()], self.in_flight.get())?;
            self.device_fns
                .wait_for_fences(&[self.in_flight.get()], true, u64::MAX)?;
        }

        // The semaphore stays signaled with nothing waiting on it, so both sync
        // objects are swapped for fresh unsignaled ones.
        self.in_flight = create_fence(&self.device_fns)?;
        self.render_finished = create_semaphore(&self.device_fns)?;

        log::debug!("Frame {} completed on {:?}", frame, self.queue.get());
        Ok(())
    }

    /// Log the owned objects and their registered release shapes
    pub fn log_inventory(&self) {
        match self.entry.try_enumerate_instance_version() {
            Ok(Some(version)) => log::info!(
                "Loader reports Vulkan {}.{}.{}",
                vk::api_version_major(version),
                vk::api_version_minor(version),
                vk::api_version_patch(version)
            ),
            Ok(None) => log::info!("Loader reports Vulkan 1.0"),
            Err(e) => log::warn!("Failed to query loader version: {:?}", e),
        }
        let limits = unsafe {
            self.instance_fns
                .get_physical_device_properties(self.physical_device.get())
                .limits
        };
        log::info!(
            "Device allows {} memory allocations and {} bound descriptor sets",
            limits.max_memory_allocation_count,
            limits.max_bound_descriptor_sets
        );

        log::info!("{:?} -> {}", self.instance, self.instance.kind());
        if !self.messenger.is_null() {
            log::info!("{:?} -> {}", self.messenger, self.messenger.kind());
        }
        log::info!("{:?} -> {}", self.physical_device, self.physical_device.kind());
        log::info!("{:?} -> {}", self.device, self.device.kind());
        log::info!("{:?} -> {}", self.queue, self.queue.kind());
        log::info!("{:?} -> {}", self.command_pool, self.command_pool.kind());
        for command_buffer in &self.command_buffers {
            log::info!("{:?} -> {}", command_buffer, command_buffer.kind());
        }
        log::info!("{:?} -> {}", self.in_flight, self.in_flight.kind());
        log::info!("{:?} -> {}", self.render_finished, self.render_finished.kind());
        log::info!("{:?} -> {}", self.memory, self.memory.kind());
        log::info!("{:?} -> {}", self.buffer, self.buffer.kind());
        log::info!("{:?} -> {}", self.descriptor_layout, self.descriptor_layout.kind());
        log::info!("{:?} -> {}", self.descriptor_pool, self.descriptor_pool.kind());
        for set in &self.descriptor_sets {
            log::info!("{:?} -> {}", set, set.kind());
        }
    }
}

impl Drop for GpuObjects {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device_fns.device_wait_idle() {
                log::error!("Failed to wait for device idle before teardown: {:?}", e);
            }
        }
        log::info!("Releasing GPU objects");
    }
}

fn validation_available(entry: &ash::Entry) -> BringUpResult<bool> {
    let layers = entry.enumerate_instance_layer_properties()?;
    let has_layer = layers
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);

    let extensions = entry.enumerate_instance_extension_properties(None)?;
    let has_debug_utils = extensions
        .iter()
        .any(|extension| unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) } == DebugUtils::name());

    Ok(has_layer && has_debug_utils)
}

fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    validation: bool,
) -> BringUpResult<(ash::Instance, UniqueHandle<vk::Instance>)> {
    let app_name = CString::new(app_name)?;
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&app_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_1);

    let (layers, extensions): (Vec<*const c_char>, Vec<*const c_char>) = if validation {
        (vec![VALIDATION_LAYER.as_ptr()], vec![DebugUtils::name().as_ptr()])
    } else {
        (Vec::new(), Vec::new())
    };

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions);

    unsafe {
        let instance_fns = entry.create_instance(&create_info, None)?;
        let instance = UniqueHandle::new(instance_fns.handle(), TopLevel::from_instance(&instance_fns, None));
        Ok((instance_fns, instance))
    }
}

fn create_messenger(
    entry: &ash::Entry,
    instance_fns: &ash::Instance,
) -> BringUpResult<UniqueHandle<vk::DebugUtilsMessengerEXT>> {
    let debug_utils = DebugUtils::new(entry, instance_fns);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe {
        let messenger = debug_utils.create_debug_utils_messenger(&create_info, None)?;
        // The destroy entry point is looked up by name rather than taken from the loader
        let release = InstanceScoped::resolve(entry, instance_fns.handle(), None);
        Ok(UniqueHandle::new(messenger, release))
    }
}

fn select_physical_device(
    instance_fns: &ash::Instance,
) -> BringUpResult<(UniqueHandle<vk::PhysicalDevice>, u32)> {
    let devices = unsafe { instance_fns.enumerate_physical_devices()? };

    for device in devices {
        let families = unsafe { instance_fns.get_physical_device_queue_family_properties(device) };
        let graphics = families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS));

        if let Some(index) = graphics {
            let properties = unsafe { instance_fns.get_physical_device_properties(device) };
            let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
            log::info!("Selected GPU: {}", name.to_string_lossy());

            let index = u32::try_from(index).map_err(|_| BringUpError::NoSuitableDevice)?;
            return Ok((unsafe { UniqueHandle::new(device, NoRelease) }, index));
        }
    }

    Err(BringUpError::NoSuitableDevice)
}

fn create_device(
    instance_fns: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
) -> BringUpResult<(ash::Device, UniqueHandle<vk::Device>)> {
    let priorities = [1.0_f32];
    let queue_infos = [vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(queue_family)
        .queue_priorities(&priorities)
        .build()];
    let create_info = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_infos);

    unsafe {
        let device_fns = instance_fns.create_device(physical_device, &create_info, None)?;
        let device = UniqueHandle::new(device_fns.handle(), TopLevel::from_device(&device_fns, None));
        Ok((device_fns, device))
    }
}

fn create_fence(device_fns: &ash::Device) -> BringUpResult<UniqueHandle<vk::Fence>> {
    let info = vk::FenceCreateInfo::builder();
    unsafe { Ok(own_device_child(device_fns, device_fns.create_fence(&info, None)?)) }
}

fn create_semaphore(device_fns: &ash::Device) -> BringUpResult<UniqueHandle<vk::Semaphore>> {
    let info = vk::SemaphoreCreateInfo::builder();
    unsafe { Ok(own_device_child(device_fns, device_fns.create_semaphore(&info, None)?)) }
}

/// Index of the first memory type allowed by `type_filter` with all of `required`
fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> BringUpResult<u32> {
    (0..properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && properties.memory_types[i as usize].property_flags.contains(required)
        })
        .ok_or(BringUpError::NoSuitableMemoryType)
}

/// Log level for a validation message. Verbose general chatter drops to trace.
fn message_level(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if kind == vk::DebugUtilsMessageTypeFlagsEXT::GENERAL {
        log::Level::Trace
    } else {
        log::Level::Debug
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let level = message_level(severity, kind);
    if level <= log::max_level() && !callback_data.is_null() {
        let data = unsafe { &*callback_data };
        let id = if data.p_message_id_name.is_null() {
            Cow::Borrowed("unnamed")
        } else {
            unsafe { CStr::from_ptr(data.p_message_id_name) }.to_string_lossy()
        };
        let message = unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy();
        log::log!(target: "vulkan", level, "{} ({:?}): {}", id, kind, message);
    }

    vk::FALSE
}
