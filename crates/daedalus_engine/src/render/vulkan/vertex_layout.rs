//! Vulkan-specific vertex layout definitions
//!
//! A vertex layout is an ordered list of attributes inside one interleaved
//! binding. Attribute `i` is bound to shader location `i`.

use ash::vk;
use crate::render::vulkan::{VulkanResult, VulkanError};

/// Shader-visible type of one vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// `vec2` of 32-bit floats
    Float2,
    /// `vec3` of 32-bit floats
    Float3,
    /// `vec4` of 32-bit floats
    Float4,
}

impl AttributeType {
    /// Size in bytes
    pub fn size(self) -> u32 {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }

    /// Matching Vulkan format
    pub fn format(self) -> vk::Format {
        match self {
            Self::Float2 => vk::Format::R32G32_SFLOAT,
            Self::Float3 => vk::Format::R32G32B32_SFLOAT,
            Self::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        }
    }
}

/// One attribute: its type and byte offset inside the vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Attribute type
    pub kind: AttributeType,
    /// Byte offset from the start of the vertex
    pub offset: u32,
}

/// Interleaved vertex layout for binding 0
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
}

impl VertexLayout {
    /// Layout with explicit offsets and a total vertex size of `stride` bytes.
    ///
    /// Fails if the list is empty or an attribute extends past the stride.
    pub fn new(attributes: Vec<VertexAttribute>, stride: u32) -> VulkanResult<Self> {
        if attributes.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "vertex layout needs at least one attribute".to_string(),
            });
        }

        if let Some((location, attribute)) = attributes
            .iter()
            .enumerate()
            .find(|(_, a)| a.offset + a.kind.size() > stride)
        {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "attribute {} ({:?} at offset {}) exceeds vertex stride {}",
                    location, attribute.kind, attribute.offset, stride
                ),
            });
        }

        Ok(Self { attributes, stride })
    }

    /// Tightly packed layout: offsets follow each other, stride is the sum
    pub fn packed(types: &[AttributeType]) -> VulkanResult<Self> {
        let mut offset = 0;
        let attributes = types
            .iter()
            .map(|&kind| {
                let attribute = VertexAttribute { kind, offset };
                offset += kind.size();
                attribute
            })
            .collect();
        Self::new(attributes, offset)
    }

    /// Attributes in location order
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Total size of one vertex in bytes
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Per-vertex binding 0 with this layout's stride
    pub fn binding_description(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// One description per attribute, location = list index
    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.attributes
            .iter()
            .enumerate()
            .map(|(location, attribute)| vk::VertexInputAttributeDescription {
                binding: 0,
                location: location as u32,
                format: attribute.kind.format(),
                offset: attribute.offset,
            })
            .collect()
    }
}
