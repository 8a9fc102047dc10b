//! Vulkan implementation of the device backend traits

use super::super::traits::{BackendError, DeviceBackend, PageMemory, SubmissionQueue};
use ash::extensions::ext::DebugUtils;
use ash::vk::{self, Handle};
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::{AllocationError, MemoryLocation};
use std::ffi::CString;

/// Buffer plus the sub-allocation it is bound to.
#[derive(Debug)]
pub struct VulkanPage {
    /// Raw Vulkan buffer handle
    pub buffer: vk::Buffer,
    allocation: Allocation,
}

/// Timeline semaphore used as a page fence.
#[derive(Debug)]
pub struct VulkanFence {
    /// Raw timeline semaphore handle
    pub semaphore: vk::Semaphore,
}

/// Vulkan device backend.
pub struct VulkanBackend {
    device: ash::Device,
    allocator: Allocator,
    debug_utils: Option<DebugUtils>,
    usage: vk::BufferUsageFlags,
}

impl VulkanBackend {
    /// Create a backend on an existing device.
    ///
    /// The device must have `bufferDeviceAddress` and `timelineSemaphore`
    /// enabled. Pass `debug_utils` to get object names in captures.
    pub fn new(
        instance: &ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        debug_utils: Option<DebugUtils>,
    ) -> Result<Self, BackendError> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        })
        .map_err(map_allocation_error)?;

        Ok(Self {
            device,
            allocator,
            debug_utils,
            usage: vk::BufferUsageFlags::TRANSFER_SRC
                | vk::BufferUsageFlags::UNIFORM_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER
                | vk::BufferUsageFlags::INDIRECT_BUFFER,
        })
    }

    /// Override the buffer usage flags of pages created from now on.
    /// `SHADER_DEVICE_ADDRESS` is always added.
    pub fn with_usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    /// Queue handle that signals this backend's fences.
    pub fn queue(&self, queue: vk::Queue) -> VulkanQueue {
        VulkanQueue {
            device: self.device.clone(),
            queue,
        }
    }
}

impl DeviceBackend for VulkanBackend {
    type Memory = VulkanPage;
    type Fence = VulkanFence;

    fn create_page(&mut self, capacity: usize) -> Result<PageMemory<VulkanPage>, BackendError> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(capacity as u64)
            .usage(self.usage | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(map_vk_error)?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = match self.allocator.allocate(&AllocationCreateDesc {
            name: "fencealloc page",
            requirements,
            location: MemoryLocation::CpuToGpu,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        }) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(map_allocation_error(err));
            }
        };

        let bound = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        let mapped = allocation.mapped_ptr().map(|ptr| ptr.cast::<u8>());

        let mapped = match (bound, mapped) {
            (Ok(()), Some(mapped)) => mapped,
            (bound, _) => {
                let _ = self.allocator.free(allocation);
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(match bound {
                    Err(err) => map_vk_error(err),
                    Ok(()) => BackendError::Unsupported("page memory is not host visible"),
                });
            }
        };

        let address_info = vk::BufferDeviceAddressInfo::builder().buffer(buffer);
        let device_address = unsafe { self.device.get_buffer_device_address(&address_info) };

        // SAFETY: gpu-allocator keeps CpuToGpu memory mapped until the
        // allocation is freed, which only happens in release_page.
        Ok(unsafe { PageMemory::new(VulkanPage { buffer, allocation }, mapped, device_address) })
    }

    fn create_fence(&mut self) -> Result<VulkanFence, BackendError> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::builder()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let info = vk::SemaphoreCreateInfo::builder().push_next(&mut type_info);

        let semaphore = unsafe { self.device.create_semaphore(&info, None) }.map_err(map_vk_error)?;
        Ok(VulkanFence { semaphore })
    }

    fn completed_value(&self, fence: &VulkanFence) -> u64 {
        match unsafe { self.device.get_semaphore_counter_value(fence.semaphore) } {
            Ok(value) => value,
            // A lost device never touches memory again.
            Err(vk::Result::ERROR_DEVICE_LOST) => u64::MAX,
            Err(_) => 0,
        }
    }

    fn release_page(&mut self, memory: PageMemory<VulkanPage>) {
        let page = memory.into_handle();
        if let Err(_err) = self.allocator.free(page.allocation) {
            #[cfg(feature = "log")]
            log::error!("[fencealloc] failed to free page memory: {}", _err);
        }
        unsafe { self.device.destroy_buffer(page.buffer, None) };
    }

    fn destroy_fence(&mut self, fence: VulkanFence) {
        unsafe { self.device.destroy_semaphore(fence.semaphore, None) };
    }

    fn set_debug_name(&mut self, memory: &VulkanPage, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };

        let info = vk::DebugUtilsObjectNameInfoEXT::builder()
            .object_type(vk::ObjectType::BUFFER)
            .object_handle(memory.buffer.as_raw())
            .object_name(&name);

        let _ = unsafe { debug_utils.set_debug_utils_object_name(self.device.handle(), &info) };
    }
}

/// A device queue that signals page fences.
pub struct VulkanQueue {
    device: ash::Device,
    queue: vk::Queue,
}

impl SubmissionQueue<VulkanFence> for VulkanQueue {
    fn signal(&mut self, fence: &VulkanFence, value: u64) -> Result<(), BackendError> {
        let semaphores = [fence.semaphore];
        let values = [value];

        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::builder().signal_semaphore_values(&values);
        let submit = vk::SubmitInfo::builder()
            .signal_semaphores(&semaphores)
            .push_next(&mut timeline_info);

        let submitted = unsafe {
            self.device
                .queue_submit(self.queue, &[submit.build()], vk::Fence::null())
        };
        submitted.map_err(map_vk_error)
    }
}

fn map_vk_error(err: vk::Result) -> BackendError {
    match err {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            BackendError::OutOfMemory
        }
        other => BackendError::Backend(format!("{:?}", other)),
    }
}

fn map_allocation_error(err: AllocationError) -> BackendError {
    match err {
        AllocationError::OutOfMemory => BackendError::OutOfMemory,
        other => BackendError::Backend(other.to_string()),
    }
}
