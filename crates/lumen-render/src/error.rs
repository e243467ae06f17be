// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use thiserror::Error;

/// Classification of a non-success return from a device call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The swapchain no longer matches the surface and must be rebuilt.
    #[error("swapchain is out of date")]
    OutOfDate,

    /// A bounded wait expired before the device signaled.
    #[error("device wait timed out")]
    Timeout,

    #[error("device lost")]
    DeviceLost,

    #[error("surface lost")]
    SurfaceLost,

    /// Any other backend failure, with the backend's own description.
    #[error("{op}: {reason}")]
    Backend { op: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("graphics queue family cannot present to this surface")]
    PresentUnsupported,

    #[error("surface reports no supported formats")]
    NoSurfaceFormats,

    /// The surface currently has no area (minimized window).
    #[error("surface has zero area")]
    ZeroExtent,

    #[error("frames in flight must be at least 1")]
    InvalidRingSize,

    /// The slot's fence (or an acquire) did not signal within the timeout.
    #[error("frame slot {slot} not signaled within {timeout:?}; device unresponsive")]
    DeviceUnresponsive { slot: usize, timeout: Duration },

    /// The presentation engine returned an index with no render target.
    #[error("acquired image {index} but only {count} framebuffers exist")]
    ImageIndexOutOfRange { index: u32, count: usize },

    #[error("{stage} failed: {source}")]
    Gpu {
        stage: &'static str,
        #[source]
        source: GpuError,
    },
}

impl RenderError {
    pub(crate) fn gpu(stage: &'static str) -> impl FnOnce(GpuError) -> RenderError {
        move |source| RenderError::Gpu { stage, source }
    }
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
