//! Vulkan backend error types
//!
//! Errors fall into two tiers. Swapchain staleness (`SwapchainOutOfDate`,
//! `SwapchainSuboptimal`) and a surface with no area (`SurfaceZeroArea`)
//! are transient: the chain is rebuilt, now or once the surface has a size
//! again. Everything else is fatal: the engine cannot render without it.

use ash::vk;
use thiserror::Error;

use crate::assets::AssetError;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader could not be found or initialised
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Instance or surface bootstrap failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No enumerated adapter was usable
    #[error("No supported graphics adapter found")]
    NoSupportedAdapter,

    /// Adapters exist, but none exposes both a graphics and a present family
    #[error("No queue family combination supports graphics and presentation")]
    NoSupportedQueueFamily,

    /// Logical device creation was rejected by the driver
    #[error("Device creation failed: {0:?}")]
    DeviceCreationFailed(vk::Result),

    /// The surface cannot back a swapchain (no formats reported)
    #[error("Surface incompatible: {0}")]
    SurfaceIncompatible(String),

    /// The swapchain no longer matches the surface and must be recreated
    #[error("Swapchain out of date")]
    SwapchainOutOfDate,

    /// The swapchain still works but no longer matches the surface exactly
    #[error("Swapchain suboptimal")]
    SwapchainSuboptimal,

    /// The surface currently has no area (minimised window)
    #[error("Surface has zero area")]
    SurfaceZeroArea,

    /// Shader bytecode was rejected before or during module creation
    #[error("Shader compile error: {0}")]
    ShaderCompile(String),

    /// Graphics pipeline or pipeline layout creation failed
    #[error("Pipeline creation failed: {0:?}")]
    PipelineCreate(vk::Result),

    /// Device memory allocation failed
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// Required asset (shader bytecode) could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

impl VulkanError {
    /// Whether this error is an expected, recoverable swapchain signal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SwapchainOutOfDate | Self::SwapchainSuboptimal | Self::SurfaceZeroArea
        )
    }

    /// Whether this error must terminate the engine.
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Classify a raw result code from acquire or present.
    ///
    /// `ERROR_OUT_OF_DATE_KHR` and `SUBOPTIMAL_KHR` become the transient
    /// variants; every other code stays a fatal `Api` error.
    pub fn from_swapchain_result(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SwapchainOutOfDate,
            vk::Result::SUBOPTIMAL_KHR => Self::SwapchainSuboptimal,
            other => Self::Api(other),
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_codes_are_transient() {
        assert!(VulkanError::from_swapchain_result(vk::Result::ERROR_OUT_OF_DATE_KHR).is_transient());
        assert!(VulkanError::from_swapchain_result(vk::Result::SUBOPTIMAL_KHR).is_transient());
        assert!(VulkanError::SurfaceZeroArea.is_transient());
    }

    #[test]
    fn test_other_codes_are_fatal() {
        let err = VulkanError::from_swapchain_result(vk::Result::ERROR_DEVICE_LOST);
        assert!(err.is_fatal());
        assert!(matches!(err, VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)));

        assert!(VulkanError::NoSupportedQueueFamily.is_fatal());
        assert!(VulkanError::PipelineCreate(vk::Result::ERROR_UNKNOWN).is_fatal());
    }
}
