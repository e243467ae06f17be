// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device bring-up, the [`lumen_render::Gpu`] implementation
//! and the fixed triangle pipeline.

mod context;
mod debug;
mod gpu;
mod triangle;

pub use context::{first_graphics_family, VkContext};
pub use gpu::{classify, VkSurfaceFormat};
pub use triangle::{TrianglePass, Vertex, TRIANGLE};

/// Frame loop over the Vulkan backend drawing the fixed triangle.
pub type VkFrameLoop = lumen_render::FrameLoop<VkContext, TrianglePass>;
