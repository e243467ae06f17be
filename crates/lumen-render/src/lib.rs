// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic swapchain lifecycle and frame pacing.
//!
//! The core is generic over [`Gpu`], which a backend implements with its own
//! handle types. [`FrameLoop`] owns the swapchain, render targets and the
//! frame ring and drives the acquire/record/submit/present protocol.

mod error;
mod frame_loop;
mod gpu;
mod resize;
mod ring;
mod settings;
mod swapchain;
mod targets;

pub use error::{GpuError, RenderError, RenderResult};
pub use frame_loop::{FrameLoop, FrameStatus};
pub use gpu::{Acquired, FrameRecorder, Gpu, PresentState, Submission, SurfaceCaps, SwapchainDesc};
pub use resize::ResizeState;
pub use ring::{FrameRing, FrameSlot};
pub use settings::{FrameSettings, ImageUsage, PresentMode};
pub use swapchain::{
    choose_present_mode, image_count, resolve_extent, Swapchain, SwapchainRequest,
    UNDEFINED_EXTENT,
};
pub use targets::RenderTargets;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimized window).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
