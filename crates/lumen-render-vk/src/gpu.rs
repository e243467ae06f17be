// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use ash::vk;
use lumen_render::{
    Acquired, Gpu, GpuError, ImageUsage, PresentMode, PresentState, RenderSize, Submission,
    SurfaceCaps, SwapchainDesc,
};

use crate::context::VkContext;

/// Format plus color space, as negotiated with the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VkSurfaceFormat {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
}

/// Sorts a non-success `vk::Result` into the core's categories.
pub fn classify(op: &'static str) -> impl Fn(vk::Result) -> GpuError {
    move |result| match result {
        vk::Result::ERROR_OUT_OF_DATE_KHR => GpuError::OutOfDate,
        vk::Result::TIMEOUT | vk::Result::NOT_READY => GpuError::Timeout,
        vk::Result::ERROR_DEVICE_LOST => GpuError::DeviceLost,
        vk::Result::ERROR_SURFACE_LOST_KHR => GpuError::SurfaceLost,
        other => GpuError::Backend {
            op,
            reason: format!("{:?}", other),
        },
    }
}

fn timeout_ns(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

fn extent(size: RenderSize) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

fn size(extent: vk::Extent2D) -> RenderSize {
    RenderSize::new(extent.width, extent.height)
}

fn vk_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

fn present_mode(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        _ => None,
    }
}

fn image_usage(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(ImageUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    flags
}

impl Gpu for VkContext {
    type Surface = vk::SurfaceKHR;
    type Format = VkSurfaceFormat;
    type Swapchain = vk::SwapchainKHR;
    type Image = vk::Image;
    type ImageView = vk::ImageView;
    type RenderPass = vk::RenderPass;
    type Framebuffer = vk::Framebuffer;
    type CommandPool = vk::CommandPool;
    type CommandBuffer = vk::CommandBuffer;
    type Fence = vk::Fence;
    type Semaphore = vk::Semaphore;

    fn wait_idle(&self) -> Result<(), GpuError> {
        unsafe { self.device().device_wait_idle() }.map_err(classify("device_wait_idle"))
    }

    fn supports_present(&self, surface: vk::SurfaceKHR) -> Result<bool, GpuError> {
        unsafe {
            self.surface_loader().get_physical_device_surface_support(
                self.physical_device(),
                self.queue_family(),
                surface,
            )
        }
        .map_err(classify("get_physical_device_surface_support"))
    }

    fn surface_formats(&self, surface: vk::SurfaceKHR) -> Result<Vec<VkSurfaceFormat>, GpuError> {
        let formats = unsafe {
            self.surface_loader()
                .get_physical_device_surface_formats(self.physical_device(), surface)
        }
        .map_err(classify("get_physical_device_surface_formats"))?;
        Ok(formats
            .into_iter()
            .map(|f| VkSurfaceFormat {
                format: f.format,
                color_space: f.color_space,
            })
            .collect())
    }

    fn surface_present_modes(&self, surface: vk::SurfaceKHR) -> Result<Vec<PresentMode>, GpuError> {
        let modes = unsafe {
            self.surface_loader()
                .get_physical_device_surface_present_modes(self.physical_device(), surface)
        }
        .map_err(classify("get_physical_device_surface_present_modes"))?;
        Ok(modes.into_iter().filter_map(present_mode).collect())
    }

    fn surface_caps(&self, surface: vk::SurfaceKHR) -> Result<SurfaceCaps, GpuError> {
        let caps = unsafe {
            self.surface_loader()
                .get_physical_device_surface_capabilities(self.physical_device(), surface)
        }
        .map_err(classify("get_physical_device_surface_capabilities"))?;
        Ok(SurfaceCaps {
            current_extent: size(caps.current_extent),
            min_extent: size(caps.min_image_extent),
            max_extent: size(caps.max_image_extent),
            min_image_count: caps.min_image_count,
            max_image_count: caps.max_image_count,
        })
    }

    fn create_swapchain(&self, desc: &SwapchainDesc<Self>) -> Result<vk::SwapchainKHR, GpuError> {
        let caps = unsafe {
            self.surface_loader()
                .get_physical_device_surface_capabilities(self.physical_device(), desc.surface)
        }
        .map_err(classify("get_physical_device_surface_capabilities"))?;

        // Prefer IDENTITY if supported, otherwise use current to avoid extra blits.
        let pre_transform = if caps
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            caps.current_transform
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: desc.surface,
            min_image_count: desc.min_image_count,
            image_format: desc.format.format,
            image_color_space: desc.format.color_space,
            image_extent: extent(desc.extent),
            image_array_layers: 1,
            image_usage: image_usage(desc.usage),
            image_sharing_mode: vk::SharingMode::EXCLUSIVE, // single graphics queue family
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: vk_present_mode(desc.present_mode),
            clipped: vk::TRUE,
            // the previous chain is always gone before a rebuild
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };
        unsafe { self.swapchain_loader().create_swapchain(&swap_info, None) }
            .map_err(classify("create_swapchain"))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>, GpuError> {
        unsafe { self.swapchain_loader().get_swapchain_images(swapchain) }
            .map_err(classify("get_swapchain_images"))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader().destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: VkSurfaceFormat,
    ) -> Result<vk::ImageView, GpuError> {
        let sub = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: format.format,
            subresource_range: sub,
            ..Default::default()
        };
        unsafe { self.device().create_image_view(&iv_info, None) }
            .map_err(classify("create_image_view"))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device().destroy_image_view(view, None) }
    }

    fn create_render_pass(&self, format: VkSurfaceFormat) -> Result<vk::RenderPass, GpuError> {
        // single color attachment -> present
        let color_att = vk::AttachmentDescription {
            format: format.format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let att_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &att_ref,
            ..Default::default()
        };
        // layout transition waits for the acquire semaphore's stage
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let rp_info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_att,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        unsafe { self.device().create_render_pass(&rp_info, None) }
            .map_err(classify("create_render_pass"))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device().destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        size: RenderSize,
    ) -> Result<vk::Framebuffer, GpuError> {
        let fb_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: size.width,
            height: size.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device().create_framebuffer(&fb_info, None) }
            .map_err(classify("create_framebuffer"))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device().destroy_framebuffer(framebuffer, None) }
    }

    fn create_command_pool(&self) -> Result<vk::CommandPool, GpuError> {
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: self.queue_family(),
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        unsafe { self.device().create_command_pool(&pool_info, None) }
            .map_err(classify("create_command_pool"))
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>, GpuError> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { self.device().allocate_command_buffers(&alloc_info) }
            .map_err(classify("allocate_command_buffers"))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        // frees every buffer allocated from it
        unsafe { self.device().destroy_command_pool(pool, None) }
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence, GpuError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        unsafe { self.device().create_fence(&ci, None) }.map_err(classify("create_fence"))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device().destroy_fence(fence, None) }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore, GpuError> {
        let ci = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device().create_semaphore(&ci, None) }
            .map_err(classify("create_semaphore"))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device().destroy_semaphore(semaphore, None) }
    }

    fn wait_fence(&self, fence: vk::Fence, timeout: Duration) -> Result<(), GpuError> {
        unsafe {
            self.device()
                .wait_for_fences(std::slice::from_ref(&fence), true, timeout_ns(timeout))
        }
        .map_err(classify("wait_for_fences"))
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<(), GpuError> {
        unsafe { self.device().reset_fences(std::slice::from_ref(&fence)) }
            .map_err(classify("reset_fences"))
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        timeout: Duration,
    ) -> Result<Acquired, GpuError> {
        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader().acquire_next_image(
                swapchain,
                timeout_ns(timeout),
                signal,
                vk::Fence::null(),
            )
        }
        .map_err(classify("acquire_next_image"))?;
        Ok(Acquired {
            image_index,
            suboptimal,
        })
    }

    fn begin_commands(&self, cmd: vk::CommandBuffer) -> Result<(), GpuError> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe {
            self.device()
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(classify("reset_command_buffer"))?;
            self.device()
                .begin_command_buffer(cmd, &begin)
                .map_err(classify("begin_command_buffer"))
        }
    }

    fn end_commands(&self, cmd: vk::CommandBuffer) -> Result<(), GpuError> {
        unsafe { self.device().end_command_buffer(cmd) }.map_err(classify("end_command_buffer"))
    }

    fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        size: RenderSize,
        clear_color: [f32; 4],
    ) {
        let clears = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: extent(size),
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.device()
                .cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE)
        }
    }

    fn end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device().cmd_end_render_pass(cmd) }
    }

    fn submit(&self, submission: &Submission<Self>) -> Result<(), GpuError> {
        let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &submission.wait,
            p_wait_dst_stage_mask: &wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &submission.command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &submission.signal,
            ..Default::default()
        };
        unsafe {
            self.device()
                .queue_submit(self.queue(), std::slice::from_ref(&submit), submission.fence)
        }
        .map_err(classify("queue_submit"))
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> Result<PresentState, GpuError> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let suboptimal = unsafe { self.swapchain_loader().queue_present(self.queue(), &present) }
            .map_err(classify("queue_present"))?;
        Ok(if suboptimal {
            PresentState::Suboptimal
        } else {
            PresentState::Optimal
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_and_loss_are_classified() {
        let c = classify("op");
        assert_eq!(c(vk::Result::ERROR_OUT_OF_DATE_KHR), GpuError::OutOfDate);
        assert_eq!(c(vk::Result::TIMEOUT), GpuError::Timeout);
        assert_eq!(c(vk::Result::NOT_READY), GpuError::Timeout);
        assert_eq!(c(vk::Result::ERROR_DEVICE_LOST), GpuError::DeviceLost);
        assert_eq!(c(vk::Result::ERROR_SURFACE_LOST_KHR), GpuError::SurfaceLost);
    }

    #[test]
    fn other_results_keep_their_name() {
        let err = classify("queue_submit")(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert_eq!(
            err,
            GpuError::Backend {
                op: "queue_submit",
                reason: "ERROR_OUT_OF_DEVICE_MEMORY".into(),
            }
        );
    }

    #[test]
    fn present_modes_round_trip_known_values() {
        for mode in [PresentMode::Fifo, PresentMode::Mailbox, PresentMode::Immediate] {
            assert_eq!(present_mode(vk_present_mode(mode)), Some(mode));
        }
        assert_eq!(present_mode(vk::PresentModeKHR::FIFO_RELAXED), None);
    }

    #[test]
    fn usage_flags_map() {
        let flags = image_usage(ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST);
        assert_eq!(
            flags,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST
        );
    }

    #[test]
    fn huge_timeouts_saturate() {
        assert_eq!(timeout_ns(Duration::from_millis(2)), 2_000_000);
        assert_eq!(timeout_ns(Duration::MAX), u64::MAX);
    }
}
