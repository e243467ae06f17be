// SPDX-License-Identifier: CEPL-1.0
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use lumen_render::{FrameRecorder, GpuError, RenderSize};
use tracing::debug;

use crate::context::VkContext;
use crate::gpu::VkSurfaceFormat;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub color: [f32; 3],
}

pub const TRIANGLE: [Vertex; 3] = [
    // top (red)
    Vertex {
        pos: [0.0, -0.5],
        color: [1.0, 0.0, 0.0],
    },
    // right (green)
    Vertex {
        pos: [0.5, 0.5],
        color: [0.0, 1.0, 0.0],
    },
    // left (blue)
    Vertex {
        pos: [-0.5, 0.5],
        color: [0.0, 0.0, 1.0],
    },
];

fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    req: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && props.memory_types[i as usize].property_flags.contains(req)
    })
}

/// Fixed triangle: one host-visible vertex buffer and one pipeline built
/// against the current render pass.
pub struct TrianglePass {
    ctx: Arc<VkContext>,
    vertex_buffer: vk::Buffer,
    vertex_memory: vk::DeviceMemory,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl TrianglePass {
    /// Uploads the vertices and creates the pipeline layout. The pipeline
    /// itself is built once a render pass exists.
    pub fn new(ctx: Arc<VkContext>) -> Result<Self> {
        let mut pass = TrianglePass {
            ctx,
            vertex_buffer: vk::Buffer::null(),
            vertex_memory: vk::DeviceMemory::null(),
            layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
        };
        unsafe {
            pass.upload_vertices().context("upload triangle vertices")?;
            let layout_info = vk::PipelineLayoutCreateInfo {
                s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
                ..Default::default()
            };
            pass.layout = pass
                .ctx
                .device()
                .create_pipeline_layout(&layout_info, None)
                .context("create_pipeline_layout")?;
        }
        Ok(pass)
    }

    unsafe fn upload_vertices(&mut self) -> Result<()> {
        let device = self.ctx.device();
        let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE);
        let size = bytes.len() as vk::DeviceSize;

        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        self.vertex_buffer = device.create_buffer(&bci, None)?;

        let req = device.get_buffer_memory_requirements(self.vertex_buffer);
        let props = self
            .ctx
            .instance()
            .get_physical_device_memory_properties(self.ctx.physical_device());
        let mem_type = find_memory_type(
            &props,
            req.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .ok_or_else(|| anyhow!("no host-visible coherent memory type"))?;
        let mai = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: req.size,
            memory_type_index: mem_type,
            ..Default::default()
        };
        self.vertex_memory = device.allocate_memory(&mai, None)?;
        device.bind_buffer_memory(self.vertex_buffer, self.vertex_memory, 0)?;

        let ptr = device.map_memory(self.vertex_memory, 0, size, vk::MemoryMapFlags::empty())?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
        device.unmap_memory(self.vertex_memory);
        Ok(())
    }

    unsafe fn create_pipeline(&self, render_pass: vk::RenderPass) -> Result<vk::Pipeline> {
        let device = self.ctx.device();

        let vs_bytes = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
        let fs_bytes = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));
        let vs_code = read_spv(&mut Cursor::new(&vs_bytes[..]))?;
        let fs_code = read_spv(&mut Cursor::new(&fs_bytes[..]))?;
        let vs_ci = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: vs_code.as_ptr(),
            code_size: vs_code.len() * 4,
            ..Default::default()
        };
        let fs_ci = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: fs_code.as_ptr(),
            code_size: fs_code.len() * 4,
            ..Default::default()
        };
        let vs = device.create_shader_module(&vs_ci, None)?;
        let fs = match device.create_shader_module(&fs_ci, None) {
            Ok(fs) => fs,
            Err(err) => {
                device.destroy_shader_module(vs, None);
                return Err(err.into());
            }
        };
        let entry = c"main";

        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
        ];

        let vb = vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let va = [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::size_of::<[f32; 2]>() as u32,
            },
        ];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: 1,
            p_vertex_binding_descriptions: &vb,
            vertex_attribute_description_count: va.len() as u32,
            p_vertex_attribute_descriptions: va.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };
        // viewport/scissor follow the swapchain extent at record time
        let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout: self.layout,
            render_pass,
            subpass: 0,
            ..Default::default()
        };

        let created = device.create_graphics_pipelines(
            vk::PipelineCache::null(),
            std::slice::from_ref(&pipeline_info),
            None,
        );
        device.destroy_shader_module(vs, None);
        device.destroy_shader_module(fs, None);

        match created {
            Ok(pipelines) => pipelines
                .first()
                .copied()
                .ok_or_else(|| anyhow!("create_graphics_pipelines returned nothing")),
            Err((_, err)) => Err(anyhow!("create_graphics_pipelines failed: {:?}", err)),
        }
    }
}

impl FrameRecorder<VkContext> for TrianglePass {
    fn render_pass_changed(
        &mut self,
        _gpu: &VkContext,
        render_pass: vk::RenderPass,
        format: VkSurfaceFormat,
    ) -> Result<(), GpuError> {
        // device is idle here: setup or recreation
        let pipeline = unsafe { self.create_pipeline(render_pass) }.map_err(|err| {
            GpuError::Backend {
                op: "create_graphics_pipelines",
                reason: format!("{:#}", err),
            }
        })?;
        let old = std::mem::replace(&mut self.pipeline, pipeline);
        unsafe { self.ctx.device().destroy_pipeline(old, None) };
        debug!("triangle pipeline built for {:?}", format.format);
        Ok(())
    }

    fn record(
        &mut self,
        gpu: &VkContext,
        cmd: vk::CommandBuffer,
        size: RenderSize,
    ) -> Result<(), GpuError> {
        if self.pipeline == vk::Pipeline::null() {
            return Err(GpuError::Backend {
                op: "record",
                reason: "pipeline not built".into(),
            });
        }
        let device = gpu.device();
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: size.width as f32,
            height: size.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        };
        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
            device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor));
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer], &[0]);
            device.cmd_draw(cmd, TRIANGLE.len() as u32, 1, 0, 0);
        }
        Ok(())
    }
}

impl Drop for TrianglePass {
    fn drop(&mut self) {
        // null handles are no-ops
        unsafe {
            let d = self.ctx.device();
            d.destroy_pipeline(self.pipeline, None);
            d.destroy_pipeline_layout(self.layout, None);
            d.destroy_buffer(self.vertex_buffer, None);
            d.free_memory(self.vertex_memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&TRIANGLE).len(), 60);
    }

    #[test]
    fn memory_type_honors_bits_and_flags() {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        props.memory_types[2].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        let want = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&props, 0b111, want), Some(2));
        assert_eq!(find_memory_type(&props, 0b011, want), None);
        assert_eq!(
            find_memory_type(&props, 0b011, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
    }
}
