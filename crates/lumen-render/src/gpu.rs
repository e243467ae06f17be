// SPDX-License-Identifier: CEPL-1.0
use std::fmt::Debug;
use std::time::Duration;

use crate::error::GpuError;
use crate::settings::{ImageUsage, PresentMode};
use crate::RenderSize;

/// Surface limits as reported by the presentation engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceCaps {
    /// `UNDEFINED_EXTENT` in both dimensions when the compositor defers
    /// sizing to the application.
    pub current_extent: RenderSize,
    pub min_extent: RenderSize,
    pub max_extent: RenderSize,
    pub min_image_count: u32,
    /// 0 means no upper bound.
    pub max_image_count: u32,
}

/// Everything the backend needs to create one swapchain.
pub struct SwapchainDesc<G: Gpu + ?Sized> {
    pub surface: G::Surface,
    pub format: G::Format,
    pub extent: RenderSize,
    pub min_image_count: u32,
    pub usage: ImageUsage,
    pub present_mode: PresentMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acquired {
    pub image_index: u32,
    /// The image is usable but the swapchain no longer matches the surface
    /// exactly.
    pub suboptimal: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentState {
    Optimal,
    Suboptimal,
}

/// One queue submission: wait on `wait` at color-attachment output, signal
/// `signal` and `fence` on completion.
pub struct Submission<G: Gpu + ?Sized> {
    pub command_buffer: G::CommandBuffer,
    pub wait: G::Semaphore,
    pub signal: G::Semaphore,
    pub fence: G::Fence,
}

/// Device operations the frame loop is built on.
///
/// Handles are plain `Copy` values; ownership lives in the core types
/// ([`crate::Swapchain`], [`crate::RenderTargets`], [`crate::FrameRing`]),
/// which call the matching `destroy_*` exactly once.
pub trait Gpu {
    type Surface: Copy + Debug;
    type Format: Copy + Debug + PartialEq;
    type Swapchain: Copy + Debug;
    type Image: Copy + Debug;
    type ImageView: Copy + Debug;
    type RenderPass: Copy + Debug;
    type Framebuffer: Copy + Debug;
    type CommandPool: Copy + Debug;
    type CommandBuffer: Copy + Debug;
    type Fence: Copy + Debug;
    type Semaphore: Copy + Debug;

    fn wait_idle(&self) -> Result<(), GpuError>;

    // surface queries
    fn supports_present(&self, surface: Self::Surface) -> Result<bool, GpuError>;
    fn surface_formats(&self, surface: Self::Surface) -> Result<Vec<Self::Format>, GpuError>;
    fn surface_present_modes(&self, surface: Self::Surface) -> Result<Vec<PresentMode>, GpuError>;
    fn surface_caps(&self, surface: Self::Surface) -> Result<SurfaceCaps, GpuError>;

    // swapchain
    fn create_swapchain(&self, desc: &SwapchainDesc<Self>) -> Result<Self::Swapchain, GpuError>;
    fn swapchain_images(&self, swapchain: Self::Swapchain) -> Result<Vec<Self::Image>, GpuError>;
    fn destroy_swapchain(&self, swapchain: Self::Swapchain);
    fn create_image_view(
        &self,
        image: Self::Image,
        format: Self::Format,
    ) -> Result<Self::ImageView, GpuError>;
    fn destroy_image_view(&self, view: Self::ImageView);

    // render targets
    fn create_render_pass(&self, format: Self::Format) -> Result<Self::RenderPass, GpuError>;
    fn destroy_render_pass(&self, render_pass: Self::RenderPass);
    fn create_framebuffer(
        &self,
        render_pass: Self::RenderPass,
        view: Self::ImageView,
        extent: RenderSize,
    ) -> Result<Self::Framebuffer, GpuError>;
    fn destroy_framebuffer(&self, framebuffer: Self::Framebuffer);

    // sync objects and command buffers
    fn create_command_pool(&self) -> Result<Self::CommandPool, GpuError>;
    fn allocate_command_buffers(
        &self,
        pool: Self::CommandPool,
        count: u32,
    ) -> Result<Vec<Self::CommandBuffer>, GpuError>;
    /// Also frees every command buffer allocated from `pool`.
    fn destroy_command_pool(&self, pool: Self::CommandPool);
    fn create_fence(&self, signaled: bool) -> Result<Self::Fence, GpuError>;
    fn destroy_fence(&self, fence: Self::Fence);
    fn create_semaphore(&self) -> Result<Self::Semaphore, GpuError>;
    fn destroy_semaphore(&self, semaphore: Self::Semaphore);

    // per frame
    /// `GpuError::Timeout` when the fence is still unsignaled after `timeout`.
    fn wait_fence(&self, fence: Self::Fence, timeout: Duration) -> Result<(), GpuError>;
    fn reset_fence(&self, fence: Self::Fence) -> Result<(), GpuError>;
    /// `GpuError::OutOfDate` when the swapchain must be rebuilt first.
    fn acquire_next_image(
        &self,
        swapchain: Self::Swapchain,
        signal: Self::Semaphore,
        timeout: Duration,
    ) -> Result<Acquired, GpuError>;
    /// Resets `cmd` and begins one-time recording.
    fn begin_commands(&self, cmd: Self::CommandBuffer) -> Result<(), GpuError>;
    fn end_commands(&self, cmd: Self::CommandBuffer) -> Result<(), GpuError>;
    fn begin_render_pass(
        &self,
        cmd: Self::CommandBuffer,
        render_pass: Self::RenderPass,
        framebuffer: Self::Framebuffer,
        extent: RenderSize,
        clear_color: [f32; 4],
    );
    fn end_render_pass(&self, cmd: Self::CommandBuffer);
    fn submit(&self, submission: &Submission<Self>) -> Result<(), GpuError>;
    fn present(
        &self,
        swapchain: Self::Swapchain,
        image_index: u32,
        wait: Self::Semaphore,
    ) -> Result<PresentState, GpuError>;
}

/// Pipeline provider: records the draw body inside the loop's render pass.
pub trait FrameRecorder<G: Gpu> {
    /// Called after setup and whenever recreation replaces the render pass,
    /// so pipelines built against the old one can be rebuilt.
    fn render_pass_changed(
        &mut self,
        gpu: &G,
        render_pass: G::RenderPass,
        format: G::Format,
    ) -> Result<(), GpuError>;

    /// Binds pipeline and geometry and issues the draw. Viewport and scissor
    /// must cover `extent`.
    fn record(&mut self, gpu: &G, cmd: G::CommandBuffer, extent: RenderSize)
        -> Result<(), GpuError>;
}
