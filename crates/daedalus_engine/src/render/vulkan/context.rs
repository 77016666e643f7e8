//! Vulkan context management
//!
//! Owns the instance, the presentation surface, the selected adapter, the
//! logical device and its queues. Everything else in the backend borrows the
//! context; it is created first and destroyed last.
//!
//! Adapter and queue-family selection are split into pure functions
//! ([`QueueFamilyIndices::resolve`], [`select_adapter`]) so the policy can be
//! exercised without a driver.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::render::window::WindowSystem;

const ENGINE_NAME: &str = "Daedalus";
const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Capabilities of one queue family, as far as selection cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilySupport {
    /// Family accepts graphics work
    pub graphics: bool,
    /// Family can present to the target surface
    pub present: bool,
    /// Family accepts transfer work
    pub transfer: bool,
}

impl QueueFamilySupport {
    fn from_properties(properties: &vk::QueueFamilyProperties, present: bool) -> Self {
        Self {
            graphics: properties.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present,
            transfer: properties.queue_flags.contains(vk::QueueFlags::TRANSFER),
        }
    }
}

/// Resolved queue family indices for one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for graphics submission
    pub graphics: u32,
    /// Family used for presentation
    pub present: u32,
    /// Dedicated transfer-only family, when the adapter has one
    pub transfer: Option<u32>,
}

impl QueueFamilyIndices {
    /// Pick graphics and present families from a family list.
    ///
    /// The first family that does both wins outright. Otherwise the first
    /// graphics family and the first present family are taken independently.
    /// Returns `None` when either role cannot be filled.
    pub fn resolve(families: &[QueueFamilySupport]) -> Option<Self> {
        let mut graphics = None;
        let mut present = None;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if family.graphics && family.present {
                graphics = Some(index);
                present = Some(index);
                break;
            } else if family.graphics && graphics.is_none() {
                graphics = Some(index);
            } else if family.present && present.is_none() {
                present = Some(index);
            }
        }

        let transfer = families
            .iter()
            .position(|family| family.transfer && !family.graphics)
            .map(|index| index as u32);

        Some(Self {
            graphics: graphics?,
            present: present?,
            transfer,
        })
    }

    /// Whether graphics and presentation share one family
    pub fn is_combined(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct families that need a queue at device creation
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = BTreeSet::new();
        families.insert(self.graphics);
        families.insert(self.present);
        if let Some(transfer) = self.transfer {
            families.insert(transfer);
        }
        families.into_iter().collect()
    }
}

/// What adapter selection needs to know about one enumerated adapter
#[derive(Debug, Clone, Default)]
pub struct AdapterCandidate {
    /// Human-readable adapter name
    pub name: String,
    /// Whether `VK_KHR_swapchain` is available
    pub supports_swapchain: bool,
    /// Per-family capabilities, in enumeration order
    pub queue_families: Vec<QueueFamilySupport>,
}

/// Select the first adapter that can render and present.
///
/// Adapters lacking the swapchain extension are skipped. Returns the index of
/// the chosen candidate and its resolved families; `NoSupportedAdapter` when
/// nothing usable was enumerated, `NoSupportedQueueFamily` when usable
/// adapters exist but none has both a graphics and a present family.
pub fn select_adapter(candidates: &[AdapterCandidate]) -> VulkanResult<(usize, QueueFamilyIndices)> {
    let mut saw_usable_adapter = false;

    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.supports_swapchain {
            log::debug!("Skipping adapter '{}': no swapchain support", candidate.name);
            continue;
        }
        saw_usable_adapter = true;

        if let Some(indices) = QueueFamilyIndices::resolve(&candidate.queue_families) {
            return Ok((index, indices));
        }
        log::debug!("Skipping adapter '{}': no graphics/present family pair", candidate.name);
    }

    if saw_usable_adapter {
        Err(VulkanError::NoSupportedQueueFamily)
    } else {
        Err(VulkanError::NoSupportedAdapter)
    }
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create an instance with the window's required extensions.
    ///
    /// With `enable_validation` the Khronos validation layer and a debug
    /// messenger routed into `log` are added, if the layer is installed.
    pub fn new<W: WindowSystem>(window: &W, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::Loading(e.to_string()))?;

        let app_name_cstr = to_cstring(app_name)?;
        let engine_name_cstr = to_cstring(ENGINE_NAME)?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;

        let mut extension_names = required_extensions
            .iter()
            .map(|ext| to_cstring(ext))
            .collect::<VulkanResult<Vec<_>>>()?;

        let validation = enable_validation && Self::validation_layer_available(&entry)?;
        if enable_validation && !validation {
            log::warn!("{} requested but not installed; continuing without validation", VALIDATION_LAYER);
        }
        if validation {
            extension_names.push(DebugUtils::name().to_owned());
        }

        for name in &extension_names {
            log::debug!("Instance extension: {}", name.to_string_lossy());
        }

        let extensions: Vec<*const std::os::raw::c_char> = extension_names
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let layer_names = if validation {
            vec![to_cstring(VALIDATION_LAYER)?]
        } else {
            Vec::new()
        };
        let layers: Vec<*const std::os::raw::c_char> = layer_names
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe {
            entry.create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug_utils = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!("Created Vulkan instance for '{}' (validation: {})", app_name, validation);

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;

        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_bytes() == VALIDATION_LAYER.as_bytes()
        }))
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Vulkan entry points
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance dispatch table
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn to_cstring(value: &str) -> VulkanResult<CString> {
    CString::new(value)
        .map_err(|_| VulkanError::InitializationFailed(format!("Interior nul byte in '{}'", value)))
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Selected adapter and the facts recorded about it at selection time
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Physical device handle
    pub handle: vk::PhysicalDevice,
    /// Adapter name reported by the driver
    pub name: String,
    /// Size of the first memory heap in bytes
    pub first_heap_size: vk::DeviceSize,
}

/// Main Vulkan context that owns all core Vulkan resources
///
/// Destruction order is device, then surface, then instance.
pub struct GraphicsContext {
    device: Device,
    adapter: AdapterInfo,
    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: Option<vk::Queue>,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    instance: VulkanInstance,
}

impl GraphicsContext {
    /// Bootstrap the instance, surface, adapter and logical device for `window`
    pub fn initialize<W: WindowSystem>(window: &mut W, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, enable_validation)?;

        let surface_loader = Surface::new(instance.entry(), instance.instance());
        let surface = window
            .create_surface(instance.instance().handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;

        match Self::create_device(&instance, surface, &surface_loader) {
            Ok((device, adapter, queue_families)) => {
                let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
                let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
                let transfer_queue = queue_families
                    .transfer
                    .map(|family| unsafe { device.get_device_queue(family, 0) });

                log::info!(
                    "Logical device ready: graphics family {}, present family {}, transfer family {:?}",
                    queue_families.graphics,
                    queue_families.present,
                    queue_families.transfer
                );

                Ok(Self {
                    device,
                    adapter,
                    queue_families,
                    graphics_queue,
                    present_queue,
                    transfer_queue,
                    surface,
                    surface_loader,
                    instance,
                })
            }
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                Err(e)
            }
        }
    }

    fn create_device(
        instance: &VulkanInstance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<(Device, AdapterInfo, QueueFamilyIndices)> {
        let raw = instance.instance();
        let devices = unsafe {
            raw.enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        log::info!("{} compatible physical device(s)", devices.len());

        let mut candidates = Vec::with_capacity(devices.len());
        let mut heap_sizes = Vec::with_capacity(devices.len());
        for &device in &devices {
            let (candidate, heap_size) = Self::describe_adapter(raw, device, surface, surface_loader)?;
            log::info!(
                "  {} ({:.2} GiB)",
                candidate.name,
                heap_size as f64 / 1024.0 / 1024.0 / 1024.0
            );
            candidates.push(candidate);
            heap_sizes.push(heap_size);
        }

        let (index, queue_families) = select_adapter(&candidates)?;
        let adapter = AdapterInfo {
            handle: devices[index],
            name: candidates[index].name.clone(),
            first_heap_size: heap_sizes[index],
        };
        log::info!("Selected GPU: {}", adapter.name);

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            raw.create_device(adapter.handle, &create_info, None)
                .map_err(VulkanError::DeviceCreationFailed)?
        };

        Ok((device, adapter, queue_families))
    }

    fn describe_adapter(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<(AdapterCandidate, vk::DeviceSize)> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let memory = unsafe { instance.get_physical_device_memory_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let heap_size = if memory.memory_heap_count > 0 {
            memory.memory_heaps[0].size
        } else {
            0
        };

        let family_properties = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let mut queue_families = Vec::with_capacity(family_properties.len());
        for (index, family) in family_properties.iter().enumerate() {
            let present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index as u32, surface)
                    .map_err(VulkanError::Api)?
            };
            queue_families.push(QueueFamilySupport::from_properties(family, present));
        }

        let extensions = unsafe {
            instance.enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let supports_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });

        Ok((
            AdapterCandidate {
                name,
                supports_swapchain,
                queue_families,
            },
            heap_size,
        ))
    }

    /// Instance dispatch table
    pub fn instance(&self) -> &Instance {
        self.instance.instance()
    }

    /// Logical device dispatch table
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The selected adapter
    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// Physical device handle of the selected adapter
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.adapter.handle
    }

    /// Resolved queue family indices
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Queue used for graphics submission
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue used for presentation
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Dedicated transfer queue, if the adapter has one
    pub fn transfer_queue(&self) -> Option<vk::Queue> {
        self.transfer_queue
    }

    /// Presentation surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::error!("Device wait idle failed during teardown: {:?}", e);
            }
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
        log::debug!("Graphics context destroyed");
        // `instance` drops after this body, destroying the messenger and instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(graphics: bool, present: bool) -> QueueFamilySupport {
        QueueFamilySupport { graphics, present, transfer: graphics }
    }

    fn adapter(name: &str, swapchain: bool, families: Vec<QueueFamilySupport>) -> AdapterCandidate {
        AdapterCandidate {
            name: name.to_string(),
            supports_swapchain: swapchain,
            queue_families: families,
        }
    }

    #[test]
    fn test_combined_family_is_preferred() {
        let families = [family(true, false), family(false, true), family(true, true)];
        let indices = QueueFamilyIndices::resolve(&families).unwrap();
        assert_eq!(indices.graphics, 2);
        assert_eq!(indices.present, 2);
        assert!(indices.is_combined());
    }

    #[test]
    fn test_separate_families_take_first_of_each() {
        let families = [
            family(false, false),
            family(true, false),
            family(false, true),
            family(true, false),
            family(false, true),
        ];
        let indices = QueueFamilyIndices::resolve(&families).unwrap();
        assert_eq!(indices.graphics, 1);
        assert_eq!(indices.present, 2);
        assert!(!indices.is_combined());
        assert_eq!(indices.unique_families(), vec![1, 2]);
    }

    #[test]
    fn test_missing_present_family_fails() {
        let families = [family(true, false), family(true, false)];
        assert!(QueueFamilyIndices::resolve(&families).is_none());
        assert!(QueueFamilyIndices::resolve(&[]).is_none());
    }

    #[test]
    fn test_dedicated_transfer_family_is_recorded() {
        let families = [
            family(true, true),
            QueueFamilySupport { graphics: false, present: false, transfer: true },
        ];
        let indices = QueueFamilyIndices::resolve(&families).unwrap();
        assert_eq!(indices.transfer, Some(1));
        assert_eq!(indices.unique_families(), vec![0, 1]);

        let shared = QueueFamilyIndices::resolve(&[family(true, true)]).unwrap();
        assert_eq!(shared.transfer, None);
    }

    #[test]
    fn test_select_first_capable_adapter() {
        let candidates = [
            adapter("no swapchain", false, vec![family(true, true)]),
            adapter("no present", true, vec![family(true, false)]),
            adapter("good", true, vec![family(true, false), family(false, true)]),
            adapter("also good", true, vec![family(true, true)]),
        ];
        let (index, indices) = select_adapter(&candidates).unwrap();
        assert_eq!(index, 2);
        assert_eq!((indices.graphics, indices.present), (0, 1));
    }

    #[test]
    fn test_select_adapter_errors() {
        assert!(matches!(select_adapter(&[]), Err(VulkanError::NoSupportedAdapter)));

        let no_swapchain = [adapter("a", false, vec![family(true, true)])];
        assert!(matches!(select_adapter(&no_swapchain), Err(VulkanError::NoSupportedAdapter)));

        let no_families = [adapter("b", true, vec![family(true, false)])];
        assert!(matches!(select_adapter(&no_families), Err(VulkanError::NoSupportedQueueFamily)));
    }
}
