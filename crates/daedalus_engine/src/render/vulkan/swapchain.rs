//! Vulkan swapchain management
//!
//! [`SwapchainPlan`] negotiates extent, image count, format and present mode
//! from what the surface reports. [`Swapchain`] owns the resulting chain and
//! its image views with RAII cleanup.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::core::PresentModePreference;
use crate::render::vulkan::{GraphicsContext, VulkanError, VulkanResult};

/// Sentinel extent meaning "the surface size is decided by the swapchain"
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Pick the swapchain extent.
///
/// The surface's current extent wins unless it is the all-bits-set sentinel,
/// in which case the requested size is used, clamped to the supported range.
pub fn resolve_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    let current = capabilities.current_extent;
    if current.width != UNDEFINED_EXTENT && current.height != UNDEFINED_EXTENT {
        return current;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: clamp_if_valid(requested.width, min.width, max.width),
        height: clamp_if_valid(requested.height, min.height, max.height),
    }
}

fn clamp_if_valid(value: u32, min: u32, max: u32) -> u32 {
    if min <= max && max > 0 {
        value.clamp(min, max)
    } else {
        value
    }
}

/// One more image than the minimum, clamped to the maximum when one is given
pub fn resolve_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Use the first reported surface format.
///
/// A lone `UNDEFINED` entry means the surface has no preference, in which
/// case `B8G8R8A8_UNORM` / `SRGB_NONLINEAR` is used.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    match formats {
        [] => Err(VulkanError::SurfaceIncompatible("surface reports no formats".to_string())),
        [only] if only.format == vk::Format::UNDEFINED => Ok(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }),
        [first, ..] => Ok(*first),
    }
}

/// Map the preference to an available mode, falling back to FIFO
pub fn choose_present_mode(available: &[vk::PresentModeKHR], preference: PresentModePreference) -> vk::PresentModeKHR {
    let wanted = match preference {
        PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
    };

    if available.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Negotiated swapchain parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainPlan {
    /// Image extent in pixels
    pub extent: vk::Extent2D,
    /// Minimum image count requested from the driver
    pub image_count: u32,
    /// Image format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Transform applied by the presentation engine
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    /// Combine the surface's reported support into concrete parameters
    ///
    /// A zero-area extent is `SurfaceZeroArea`, which is transient: the
    /// caller keeps its current chain and retries once the surface has a
    /// size again.
    pub fn negotiate(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        requested: vk::Extent2D,
        preference: PresentModePreference,
    ) -> VulkanResult<Self> {
        let extent = resolve_extent(capabilities, requested);
        if extent.width == 0 || extent.height == 0 {
            return Err(VulkanError::SurfaceZeroArea);
        }

        Ok(Self {
            extent,
            image_count: resolve_image_count(capabilities),
            surface_format: choose_surface_format(formats)?,
            present_mode: choose_present_mode(present_modes, preference),
            pre_transform: capabilities.current_transform,
        })
    }

    /// Query the context's surface and negotiate against it
    pub fn query(
        context: &GraphicsContext,
        requested: vk::Extent2D,
        preference: PresentModePreference,
    ) -> VulkanResult<Self> {
        let loader = context.surface_loader();
        let physical_device = context.physical_device();
        let surface = context.surface();

        let capabilities = unsafe {
            loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        Self::negotiate(&capabilities, &formats, &present_modes, requested, preference)
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create a swapchain and one view per image from a negotiated plan
    pub fn new(context: &GraphicsContext, plan: &SwapchainPlan) -> VulkanResult<Self> {
        let device = context.device().clone();
        let swapchain_loader = SwapchainLoader::new(context.instance(), &device);
        let families = context.queue_families();
        let family_indices = [families.graphics, families.present];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface())
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        create_info = if families.is_combined() {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(plan.surface_format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            match unsafe { device.create_image_view(&view_info, None) } {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    unsafe {
                        for &view in &image_views {
                            device.destroy_image_view(view, None);
                        }
                        swapchain_loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(VulkanError::Api(e));
                }
            }
        }

        log::debug!(
            "Created swapchain: {} images, {}x{}, {:?}, {:?}",
            images.len(),
            plan.extent.width,
            plan.extent.height,
            plan.surface_format.format,
            plan.present_mode
        );

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format: plan.surface_format,
            extent: plan.extent,
            present_mode: plan.present_mode,
        })
    }

    /// Acquire the next presentable image, signaling `signal` when it is ready.
    ///
    /// Returns the image index and whether the chain is suboptimal.
    /// Out-of-date surfaces map to [`VulkanError::SwapchainOutOfDate`].
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> VulkanResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
                .map_err(VulkanError::from_swapchain_result)
        }
    }

    /// Queue `image_index` for presentation after `wait` is signaled.
    ///
    /// Returns whether the chain is suboptimal.
    pub fn queue_present(&self, queue: vk::Queue, wait: vk::Semaphore, image_index: u32) -> VulkanResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.swapchain_loader
                .queue_present(queue, &present_info)
                .map_err(VulkanError::from_swapchain_result)
        }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Get swapchain images
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Get image count
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn bgra_srgb() -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_sentinel_extent_uses_requested_size() {
        let caps = capabilities((u32::MAX, u32::MAX), 2, 3);
        let extent = resolve_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_current_extent_wins_over_request() {
        let caps = capabilities((1280, 720), 2, 3);
        let extent = resolve_extent(&caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn test_sentinel_extent_is_clamped_to_supported_range() {
        let caps = capabilities((u32::MAX, u32::MAX), 2, 3);
        let extent = resolve_extent(&caps, vk::Extent2D { width: 10_000, height: 0 });
        assert_eq!((extent.width, extent.height), (4096, 1));
    }

    #[test]
    fn test_image_count_policy() {
        assert_eq!(resolve_image_count(&capabilities((1, 1), 2, 3)), 3);
        assert_eq!(resolve_image_count(&capabilities((1, 1), 2, 0)), 3);
        assert_eq!(resolve_image_count(&capabilities((1, 1), 3, 3)), 3);
        assert_eq!(resolve_image_count(&capabilities((1, 1), 1, 0)), 2);
    }

    #[test]
    fn test_first_format_is_used() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            bgra_srgb(),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_single_undefined_format_falls_back() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_no_formats_is_incompatible() {
        assert!(matches!(choose_surface_format(&[]), Err(VulkanError::SurfaceIncompatible(_))));
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, PresentModePreference::Immediate), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&modes, PresentModePreference::Mailbox), vk::PresentModeKHR::MAILBOX);

        let all = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&all, PresentModePreference::Immediate), vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn test_negotiate_is_deterministic() {
        let caps = capabilities((u32::MAX, u32::MAX), 1, 0);
        let formats = [bgra_srgb()];
        let modes = [vk::PresentModeKHR::FIFO];
        let requested = vk::Extent2D { width: 640, height: 480 };

        let first = SwapchainPlan::negotiate(&caps, &formats, &modes, requested, PresentModePreference::Immediate).unwrap();
        let second = SwapchainPlan::negotiate(&caps, &formats, &modes, requested, PresentModePreference::Immediate).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.image_count, 2);
        assert_eq!((first.extent.width, first.extent.height), (640, 480));
    }

    #[test]
    fn test_negotiate_rejects_zero_extent() {
        let caps = capabilities((0, 0), 2, 3);
        let result = SwapchainPlan::negotiate(
            &caps,
            &[bgra_srgb()],
            &[vk::PresentModeKHR::FIFO],
            vk::Extent2D { width: 0, height: 0 },
            PresentModePreference::Fifo,
        );
        assert!(matches!(result, Err(VulkanError::SurfaceZeroArea)));
    }

    #[test]
    fn test_minimised_surface_is_transient_despite_requested_size() {
        // Surface already reports 0x0 while the last known drawable size is not
        let caps = capabilities((0, 0), 2, 3);
        let result = SwapchainPlan::negotiate(
            &caps,
            &[bgra_srgb()],
            &[vk::PresentModeKHR::FIFO],
            vk::Extent2D { width: 1280, height: 720 },
            PresentModePreference::Immediate,
        );

        match result {
            Err(e) => {
                assert!(matches!(e, VulkanError::SurfaceZeroArea));
                assert!(e.is_transient());
            }
            Ok(plan) => panic!("expected a deferred plan, got {:?}", plan),
        }
    }
}
