//! Shader management and compilation
//!
//! SPIR-V shader loading and graphics pipeline creation following RAII
//! patterns. Shader modules exist only while a pipeline is being compiled.

use ash::{vk, Device};
use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use crate::assets::FileLoader;
use crate::core::ShaderConfig;
use crate::render::vulkan::{GraphicsContext, RenderPass, VertexLayout, VulkanError, VulkanResult};

/// First word of every SPIR-V module
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Validate SPIR-V bytecode and convert it to words
pub fn parse_spirv(bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    if bytes.is_empty() {
        return Err(VulkanError::ShaderCompile("SPIR-V bytecode is empty".to_string()));
    }

    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| VulkanError::ShaderCompile(format!("Invalid SPIR-V: {}", e)))?;

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&other) => Err(VulkanError::ShaderCompile(format!(
            "Bad SPIR-V magic number {:#010x}",
            other
        ))),
        None => Err(VulkanError::ShaderCompile("SPIR-V bytecode is empty".to_string())),
    }
}

/// Vertex and fragment bytecode for one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPair {
    vertex: Vec<u32>,
    fragment: Vec<u32>,
}

impl ShaderPair {
    /// Validate both stages from raw bytes
    pub fn from_bytes(vertex: &[u8], fragment: &[u8]) -> VulkanResult<Self> {
        Ok(Self {
            vertex: parse_spirv(vertex)?,
            fragment: parse_spirv(fragment)?,
        })
    }

    /// Read both stages through `loader` using the configured paths
    pub fn load<L: FileLoader + ?Sized>(loader: &L, config: &ShaderConfig) -> VulkanResult<Self> {
        log::debug!(
            "Loading shaders: {} / {}",
            config.vertex_shader_path,
            config.fragment_shader_path
        );
        let vertex = loader.read_all_bytes(Path::new(&config.vertex_shader_path))?;
        let fragment = loader.read_all_bytes(Path::new(&config.fragment_shader_path))?;
        Self::from_bytes(&vertex, &fragment)
    }

    /// Vertex stage words
    pub fn vertex_code(&self) -> &[u32] {
        &self.vertex
    }

    /// Fragment stage words
    pub fn fragment_code(&self) -> &[u32] {
        &self.fragment
    }
}

/// Shader module wrapper with RAII cleanup
struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    fn new(device: &Device, code: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let module = unsafe {
            device.create_shader_module(&create_info, None)
                .map_err(|e| VulkanError::ShaderCompile(format!("Shader module creation failed: {:?}", e)))?
        };

        Ok(Self { device: device.clone(), module })
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags, entry_point: &CStr) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(entry_point)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Graphics pipeline wrapper with RAII cleanup
///
/// Fixed state: triangle list, filled polygons, back-face culling with
/// clockwise front faces, no blending, no depth test. Viewport and scissor
/// are dynamic so a resize does not invalidate the pipeline.
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    target_format: vk::Format,
}

impl GraphicsPipeline {
    /// Compile `shaders` and `vertex_layout` against `render_pass`
    pub fn compile(
        context: &GraphicsContext,
        render_pass: &RenderPass,
        shaders: &ShaderPair,
        vertex_layout: &VertexLayout,
    ) -> VulkanResult<Self> {
        let device = context.device();

        let vertex_shader = ShaderModule::new(device, shaders.vertex_code())?;
        let fragment_shader = ShaderModule::new(device, shaders.fragment_code())?;

        let entry_point = CStr::from_bytes_with_nul(b"main\0")
            .map_err(|e| VulkanError::ShaderCompile(e.to_string()))?;

        let shader_stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX, entry_point),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT, entry_point),
        ];

        let bindings = [vertex_layout.binding_description()];
        let attributes = vertex_layout.attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; the values are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();

        let color_blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe {
            device.create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::PipelineCreate)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass.handle())
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info.build()],
                None,
            )
        };

        let pipeline = match pipelines {
            Ok(pipelines) if !pipelines.is_empty() => pipelines[0],
            Ok(_) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::PipelineCreate(vk::Result::ERROR_UNKNOWN));
            }
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::PipelineCreate(err));
            }
        };

        log::debug!(
            "Compiled graphics pipeline for {:?} ({} vertex attributes, stride {})",
            render_pass.color_format(),
            attributes.len(),
            vertex_layout.stride()
        );

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
            target_format: render_pass.color_format(),
        })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Colour format the pipeline was compiled against
    pub fn target_format(&self) -> vk::Format {
        self.target_format
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryFileLoader;

    fn minimal_module() -> Vec<u8> {
        // Header only: magic, version 1.0, generator, bound, schema
        [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_valid_header_parses() {
        let words = parse_spirv(&minimal_module()).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_empty_bytecode_is_rejected() {
        assert!(matches!(parse_spirv(&[]), Err(VulkanError::ShaderCompile(_))));
    }

    #[test]
    fn test_unaligned_bytecode_is_rejected() {
        let mut bytes = minimal_module();
        bytes.push(0);
        assert!(matches!(parse_spirv(&bytes), Err(VulkanError::ShaderCompile(_))));
    }

    #[test]
    fn test_wrong_magic_is_rejected() {
        let bytes: Vec<u8> = [0xDEAD_BEEF_u32, 0, 0, 0]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        assert!(matches!(parse_spirv(&bytes), Err(VulkanError::ShaderCompile(_))));
    }

    #[test]
    fn test_load_through_file_loader() {
        let loader = MemoryFileLoader::new()
            .with_file("vertex.spv", minimal_module())
            .with_file("fragment.spv", minimal_module());
        let config = ShaderConfig::new("vertex.spv", "fragment.spv");

        let pair = ShaderPair::load(&loader, &config).unwrap();
        assert_eq!(pair.vertex_code().len(), 5);
        assert_eq!(pair.fragment_code().len(), 5);
    }

    #[test]
    fn test_missing_shader_file_is_an_asset_error() {
        let loader = MemoryFileLoader::new().with_file("vertex.spv", minimal_module());
        let config = ShaderConfig::new("vertex.spv", "fragment.spv");

        let result = ShaderPair::load(&loader, &config);
        assert!(matches!(result, Err(VulkanError::Asset(_))));
    }
}
