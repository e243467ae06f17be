// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::error::{GpuError, RenderError, RenderResult};
use crate::gpu::{FrameRecorder, Gpu, PresentState, Submission};
use crate::resize::ResizeState;
use crate::ring::FrameRing;
use crate::settings::FrameSettings;
use crate::swapchain::{Swapchain, SwapchainRequest};
use crate::targets::RenderTargets;
use crate::RenderSize;

/// Outcome of one [`FrameLoop::render_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was submitted and presented.
    Continue,
    /// The swapchain was stale and has been rebuilt; the triggering frame may
    /// have been dropped.
    Recreated,
    /// Nothing was done because the window has no area.
    Skipped,
}

/// Drives wait, acquire, record, submit and present, and rebuilds the
/// swapchain when it goes stale.
///
/// Slots are picked by `frame_counter % N`, never by the image index the
/// presentation engine hands back.
pub struct FrameLoop<G: Gpu, R: FrameRecorder<G>> {
    // fields drop top to bottom: reverse of setup order
    ring: FrameRing<G>,
    recorder: R,
    targets: RenderTargets<G>,
    swapchain: Option<Swapchain<G>>,
    gpu: Arc<G>,

    surface: G::Surface,
    settings: FrameSettings,
    resize: ResizeState,
    frame_counter: u64,
    recreations: u64,
}

impl<G: Gpu, R: FrameRecorder<G>> FrameLoop<G, R> {
    pub fn new(
        gpu: Arc<G>,
        surface: G::Surface,
        mut recorder: R,
        settings: FrameSettings,
        window_extent: RenderSize,
    ) -> RenderResult<Self> {
        if settings.frames_in_flight == 0 {
            return Err(RenderError::InvalidRingSize);
        }

        let request = swapchain_request(&settings, window_extent);
        let swapchain = Swapchain::create(gpu.clone(), surface, &request)?;
        let targets = RenderTargets::new(gpu.clone(), &swapchain)?;
        recorder
            .render_pass_changed(&gpu, targets.render_pass(), targets.format())
            .map_err(RenderError::gpu("build pipeline"))?;
        let ring = FrameRing::new(gpu.clone(), settings.frames_in_flight)?;

        info!(
            "frame loop ready: {} frames in flight, {} images",
            ring.len(),
            swapchain.image_count()
        );

        Ok(Self {
            ring,
            recorder,
            targets,
            swapchain: Some(swapchain),
            gpu,
            surface,
            settings,
            resize: ResizeState::new(window_extent),
            frame_counter: 0,
            recreations: 0,
        })
    }

    /// Window resize notification. Only records the new extent; the rebuild
    /// happens inside the next frame.
    pub fn notify_resized(&mut self, extent: RenderSize) {
        debug!("resize notified: {}x{}", extent.width, extent.height);
        self.resize.notify(extent);
    }

    /// Renders one frame.
    ///
    /// Staleness is reported as [`FrameStatus::Recreated`]; any error is
    /// fatal and the loop should stop.
    pub fn render_frame(&mut self) -> RenderResult<FrameStatus> {
        if self.resize.extent().is_empty() {
            return Ok(FrameStatus::Skipped);
        }
        let Some(handle) = self.swapchain.as_ref().map(Swapchain::handle) else {
            return self.recreate();
        };

        let index = self.ring.slot_index(self.frame_counter);
        let slot = self.ring.slot(index).ok_or(RenderError::InvalidRingSize)?;
        let timeout = self.settings.fence_timeout;

        // only this slot's fence gates reuse
        self.gpu
            .wait_fence(slot.fence, timeout)
            .map_err(|err| unresponsive(index, timeout, "wait for frame fence", err))?;

        let acquired = match self.gpu.acquire_next_image(handle, slot.acquire, timeout) {
            Ok(acquired) => acquired,
            Err(GpuError::OutOfDate) => {
                // fence untouched: the slot is still idle
                debug!("acquire: swapchain out of date");
                self.resize.mark_stale();
                return self.recreate();
            }
            Err(err) => return Err(unresponsive(index, timeout, "acquire next image", err)),
        };

        let framebuffer = self.targets.framebuffer(acquired.image_index).ok_or(
            RenderError::ImageIndexOutOfRange {
                index: acquired.image_index,
                count: self.targets.len(),
            },
        )?;

        self.gpu
            .reset_fence(slot.fence)
            .map_err(RenderError::gpu("reset frame fence"))?;

        let cmd = slot.command_buffer;
        let extent = self.targets.extent();
        self.gpu
            .begin_commands(cmd)
            .map_err(RenderError::gpu("begin command buffer"))?;
        self.gpu.begin_render_pass(
            cmd,
            self.targets.render_pass(),
            framebuffer,
            extent,
            self.settings.clear_color,
        );
        self.recorder
            .record(&self.gpu, cmd, extent)
            .map_err(RenderError::gpu("record draw"))?;
        self.gpu.end_render_pass(cmd);
        self.gpu
            .end_commands(cmd)
            .map_err(RenderError::gpu("end command buffer"))?;

        self.gpu
            .submit(&Submission {
                command_buffer: cmd,
                wait: slot.acquire,
                signal: slot.release,
                fence: slot.fence,
            })
            .map_err(RenderError::gpu("queue submit"))?;

        trace!(
            "frame {} submitted on slot {} to image {}",
            self.frame_counter,
            index,
            acquired.image_index
        );

        let presented = self.gpu.present(handle, acquired.image_index, slot.release);
        self.frame_counter += 1;

        let stale = match &presented {
            Ok(PresentState::Optimal) => acquired.suboptimal,
            Ok(PresentState::Suboptimal) | Err(GpuError::OutOfDate) => true,
            Err(source) => {
                return Err(RenderError::Gpu {
                    stage: "queue present",
                    source: source.clone(),
                })
            }
        };
        if stale {
            debug!("present: swapchain stale ({:?})", presented);
            self.resize.mark_stale();
        }
        if self.resize.is_stale() {
            return self.recreate();
        }
        Ok(FrameStatus::Continue)
    }

    /// Rebuilds the swapchain and framebuffers against the latest window
    /// extent. The ring is left alone.
    ///
    /// A window with no area defers the rebuild: the stale flag stays set
    /// and [`FrameStatus::Skipped`] is returned.
    pub fn recreate(&mut self) -> RenderResult<FrameStatus> {
        let extent = self.resize.extent();
        if extent.is_empty() {
            self.resize.mark_stale();
            debug!("recreation deferred: window has no area");
            return Ok(FrameStatus::Skipped);
        }
        self.resize.take();

        self.gpu
            .wait_idle()
            .map_err(RenderError::gpu("wait for device idle"))?;

        // framebuffers -> views -> swapchain
        self.targets.release_framebuffers();
        self.swapchain = None;

        let request = swapchain_request(&self.settings, extent);
        let swapchain = match Swapchain::create(self.gpu.clone(), self.surface, &request) {
            Ok(swapchain) => swapchain,
            Err(RenderError::ZeroExtent) => {
                self.resize.mark_stale();
                debug!("recreation deferred: surface has no area");
                return Ok(FrameStatus::Skipped);
            }
            Err(err) => return Err(err),
        };

        if self.targets.ensure_format(swapchain.format())? {
            self.recorder
                .render_pass_changed(&self.gpu, self.targets.render_pass(), swapchain.format())
                .map_err(RenderError::gpu("rebuild pipeline"))?;
        }
        self.targets.rebuild_framebuffers(&swapchain)?;

        let built = swapchain.extent();
        let images = swapchain.image_count();
        self.swapchain = Some(swapchain);
        self.recreations += 1;

        info!(
            "swapchain recreated ({}x{}, {} images, #{})",
            built.width, built.height, images, self.recreations
        );
        Ok(FrameStatus::Recreated)
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn is_stale(&self) -> bool {
        self.resize.is_stale()
    }

    pub fn swapchain(&self) -> Option<&Swapchain<G>> {
        self.swapchain.as_ref()
    }

    pub fn targets(&self) -> &RenderTargets<G> {
        &self.targets
    }

    pub fn ring(&self) -> &FrameRing<G> {
        &self.ring
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }
}

impl<G: Gpu, R: FrameRecorder<G>> Drop for FrameLoop<G, R> {
    fn drop(&mut self) {
        // GPU may still read the ring and framebuffers
        if let Err(err) = self.gpu.wait_idle() {
            warn!("wait for idle before teardown failed: {}", err);
        }
    }
}

fn swapchain_request(settings: &FrameSettings, extent: RenderSize) -> SwapchainRequest {
    SwapchainRequest {
        extent,
        usage: settings.usage,
        min_image_count: settings.min_image_count,
        present_mode: settings.present_mode,
    }
}

/// Timeouts become `DeviceUnresponsive`; anything else is a plain device error.
fn unresponsive(
    slot: usize,
    timeout: std::time::Duration,
    stage: &'static str,
    err: GpuError,
) -> RenderError {
    match err {
        GpuError::Timeout => {
            error!("{} on slot {} exceeded {:?}", stage, slot, timeout);
            RenderError::DeviceUnresponsive { slot, timeout }
        }
        source => RenderError::Gpu { stage, source },
    }
}
