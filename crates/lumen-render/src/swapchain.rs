// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{RenderError, RenderResult};
use crate::gpu::{Gpu, SurfaceCaps, SwapchainDesc};
use crate::settings::{ImageUsage, PresentMode};
use crate::RenderSize;

/// `current_extent` value meaning "the application picks the size".
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Caller-side parameters for a swapchain build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainRequest {
    /// Current window extent.
    pub extent: RenderSize,
    pub usage: ImageUsage,
    pub min_image_count: u32,
    pub present_mode: PresentMode,
}

/// Surface's current extent, or the wanted extent clamped to the surface
/// bounds when the compositor leaves sizing to us.
pub fn resolve_extent(caps: &SurfaceCaps, want: RenderSize) -> RenderSize {
    let current = caps.current_extent;
    if current.width != UNDEFINED_EXTENT && current.height != UNDEFINED_EXTENT {
        return current;
    }
    if want.is_empty() {
        return caps.min_extent;
    }
    // max/min rather than clamp: drivers have been seen reporting min > max
    RenderSize {
        width: want.width.max(caps.min_extent.width).min(caps.max_extent.width),
        height: want.height.max(caps.min_extent.height).min(caps.max_extent.height),
    }
}

/// Requested image count raised to the surface minimum and capped by its
/// maximum (0 == unbounded).
pub fn image_count(caps: &SurfaceCaps, requested: u32) -> u32 {
    let count = requested.max(caps.min_image_count);
    if caps.max_image_count == 0 {
        count
    } else {
        count.min(caps.max_image_count)
    }
}

pub fn choose_present_mode(available: &[PresentMode], preferred: PresentMode) -> PresentMode {
    if available.contains(&preferred) {
        preferred
    } else {
        PresentMode::Fifo
    }
}

/// Presentable image chain plus one view per image.
///
/// Images belong to the presentation engine; only the views and the
/// swapchain handle are released on drop (views first).
pub struct Swapchain<G: Gpu> {
    gpu: Arc<G>,
    handle: G::Swapchain,
    format: G::Format,
    extent: RenderSize,
    present_mode: PresentMode,
    images: Vec<G::Image>,
    views: Vec<G::ImageView>,
}

impl<G: Gpu> Swapchain<G> {
    /// Builds a swapchain for `surface`.
    ///
    /// Nothing is created unless the queue family can present and the
    /// surface reports at least one format. A failure after the handle exists
    /// releases everything created so far.
    pub fn create(gpu: Arc<G>, surface: G::Surface, request: &SwapchainRequest) -> RenderResult<Self> {
        let presentable = gpu
            .supports_present(surface)
            .map_err(RenderError::gpu("query present support"))?;
        if !presentable {
            return Err(RenderError::PresentUnsupported);
        }

        let formats = gpu
            .surface_formats(surface)
            .map_err(RenderError::gpu("query surface formats"))?;
        // first entry, not the "best" one
        let format = *formats.first().ok_or(RenderError::NoSurfaceFormats)?;

        let caps = gpu
            .surface_caps(surface)
            .map_err(RenderError::gpu("query surface capabilities"))?;
        let extent = resolve_extent(&caps, request.extent);
        if extent.is_empty() {
            return Err(RenderError::ZeroExtent);
        }

        let modes = gpu
            .surface_present_modes(surface)
            .map_err(RenderError::gpu("query present modes"))?;
        let present_mode = choose_present_mode(&modes, request.present_mode);
        let min_image_count = image_count(&caps, request.min_image_count);

        debug!(
            "swapchain request: {}x{} (window {}x{}), images >= {}, {:?}",
            extent.width,
            extent.height,
            request.extent.width,
            request.extent.height,
            min_image_count,
            present_mode
        );

        let desc = SwapchainDesc {
            surface,
            format,
            extent,
            min_image_count,
            usage: request.usage,
            present_mode,
        };
        let handle = gpu
            .create_swapchain(&desc)
            .map_err(RenderError::gpu("create swapchain"))?;

        let mut swapchain = Swapchain {
            gpu,
            handle,
            format,
            extent,
            present_mode,
            images: Vec::new(),
            views: Vec::new(),
        };
        swapchain.images = swapchain
            .gpu
            .swapchain_images(handle)
            .map_err(RenderError::gpu("get swapchain images"))?;

        swapchain.views.reserve(swapchain.images.len());
        for &image in &swapchain.images {
            let view = swapchain
                .gpu
                .create_image_view(image, format)
                .map_err(RenderError::gpu("create image view"))?;
            swapchain.views.push(view);
        }

        info!(
            "swapchain ready ({}x{}, {:?}, {} images, {:?})",
            extent.width,
            extent.height,
            format,
            swapchain.images.len(),
            present_mode
        );
        Ok(swapchain)
    }

    pub fn handle(&self) -> G::Swapchain {
        self.handle
    }

    pub fn format(&self) -> G::Format {
        self.format
    }

    pub fn extent(&self) -> RenderSize {
        self.extent
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[G::Image] {
        &self.images
    }

    pub fn views(&self) -> &[G::ImageView] {
        &self.views
    }
}

impl<G: Gpu> Drop for Swapchain<G> {
    fn drop(&mut self) {
        for view in self.views.drain(..).rev() {
            self.gpu.destroy_image_view(view);
        }
        self.gpu.destroy_swapchain(self.handle);
    }
}
