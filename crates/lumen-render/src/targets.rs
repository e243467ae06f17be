// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::gpu::Gpu;
use crate::swapchain::Swapchain;
use crate::RenderSize;

/// One render pass (single color attachment, no depth, one subpass) plus one
/// framebuffer per swapchain image.
///
/// The render pass depends only on the pixel format; the framebuffers depend
/// on extent, image views and render pass and are always rebuilt together.
pub struct RenderTargets<G: Gpu> {
    gpu: Arc<G>,
    framebuffers: Vec<G::Framebuffer>,
    render_pass: G::RenderPass,
    format: G::Format,
    extent: RenderSize,
}

impl<G: Gpu> RenderTargets<G> {
    pub fn new(gpu: Arc<G>, swapchain: &Swapchain<G>) -> RenderResult<Self> {
        let format = swapchain.format();
        let render_pass = gpu
            .create_render_pass(format)
            .map_err(RenderError::gpu("create render pass"))?;

        let mut targets = RenderTargets {
            gpu,
            framebuffers: Vec::new(),
            render_pass,
            format,
            extent: swapchain.extent(),
        };
        targets.rebuild_framebuffers(swapchain)?;
        Ok(targets)
    }

    /// Destroys every framebuffer. Must run before the views they reference.
    pub fn release_framebuffers(&mut self) {
        for framebuffer in self.framebuffers.drain(..).rev() {
            self.gpu.destroy_framebuffer(framebuffer);
        }
    }

    /// Replaces the framebuffers with one per view of `swapchain`.
    ///
    /// On failure the partial set is released, so no framebuffer outlives
    /// the views it was built on.
    pub fn rebuild_framebuffers(&mut self, swapchain: &Swapchain<G>) -> RenderResult<()> {
        self.release_framebuffers();
        self.extent = swapchain.extent();
        self.framebuffers.reserve(swapchain.views().len());
        for &view in swapchain.views() {
            match self
                .gpu
                .create_framebuffer(self.render_pass, view, self.extent)
            {
                Ok(framebuffer) => self.framebuffers.push(framebuffer),
                Err(source) => {
                    self.release_framebuffers();
                    return Err(RenderError::Gpu {
                        stage: "create framebuffer",
                        source,
                    });
                }
            }
        }
        debug!(
            "rebuilt {} framebuffers at {}x{}",
            self.framebuffers.len(),
            self.extent.width,
            self.extent.height
        );
        Ok(())
    }

    /// Swaps in a render pass for `format` if it differs from the current
    /// one. Returns whether the render pass changed.
    ///
    /// Framebuffers must already be released.
    pub fn ensure_format(&mut self, format: G::Format) -> RenderResult<bool> {
        if format == self.format {
            return Ok(false);
        }
        debug_assert!(self.framebuffers.is_empty());

        let render_pass = self
            .gpu
            .create_render_pass(format)
            .map_err(RenderError::gpu("create render pass"))?;
        let old = std::mem::replace(&mut self.render_pass, render_pass);
        self.gpu.destroy_render_pass(old);
        debug!("render pass rebuilt for {:?} (was {:?})", format, self.format);
        self.format = format;
        Ok(true)
    }

    pub fn render_pass(&self) -> G::RenderPass {
        self.render_pass
    }

    pub fn format(&self) -> G::Format {
        self.format
    }

    pub fn extent(&self) -> RenderSize {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Framebuffer for a presentable image index, if in range.
    pub fn framebuffer(&self, image_index: u32) -> Option<G::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }
}

impl<G: Gpu> Drop for RenderTargets<G> {
    fn drop(&mut self) {
        self.release_framebuffers();
        self.gpu.destroy_render_pass(self.render_pass);
    }
}
