// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use bitflags::bitflags;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// Vsync, target monitor refresh rate. Always supported.
    #[default]
    Fifo,
    /// Vsync without blocking, fps uncapped.
    Mailbox,
    Immediate,
}

bitflags! {
    /// How swapchain images will be used.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const COLOR_ATTACHMENT = 1 << 0;
        const TRANSFER_SRC = 1 << 1;
        const TRANSFER_DST = 1 << 2;
    }
}

/// Knobs for the frame loop, resolved from config before setup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSettings {
    /// Ring size N: how many frames may have GPU work outstanding.
    pub frames_in_flight: usize,
    pub min_image_count: u32,
    pub present_mode: PresentMode,
    pub usage: ImageUsage,
    pub clear_color: [f32; 4],
    /// Upper bound on the fence wait and on image acquisition.
    pub fence_timeout: Duration,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            min_image_count: 3,
            present_mode: PresentMode::Fifo,
            usage: ImageUsage::COLOR_ATTACHMENT,
            clear_color: [1.0, 0.0, 1.0, 1.0],
            fence_timeout: Duration::from_secs(2),
        }
    }
}
