// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::gpu::Gpu;

/// Primitives for one frame slot.
///
/// Slot lifecycle: idle (fence signaled) -> CPU waits on fence -> CPU resets
/// fence -> CPU records -> submit (fence unsignaled, GPU executing) -> GPU
/// signals fence -> idle. The command buffer may only be recorded after the
/// wait-and-reset step.
pub struct FrameSlot<G: Gpu> {
    pub fence: G::Fence,
    /// Signaled by acquire, waited on by the submission.
    pub acquire: G::Semaphore,
    /// Signaled by the submission, waited on by present.
    pub release: G::Semaphore,
    pub command_buffer: G::CommandBuffer,
}

impl<G: Gpu> Clone for FrameSlot<G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G: Gpu> Copy for FrameSlot<G> {}

impl<G: Gpu> fmt::Debug for FrameSlot<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSlot")
            .field("fence", &self.fence)
            .field("acquire", &self.acquire)
            .field("release", &self.release)
            .field("command_buffer", &self.command_buffer)
            .finish()
    }
}

/// Fixed-size ring of N frame slots, selected round-robin by frame number.
pub struct FrameRing<G: Gpu> {
    gpu: Arc<G>,
    pool: G::CommandPool,
    command_buffers: Vec<G::CommandBuffer>,
    fences: Vec<G::Fence>,
    acquire: Vec<G::Semaphore>,
    release: Vec<G::Semaphore>,
}

impl<G: Gpu> FrameRing<G> {
    /// Creates `slots` slots. Fences start signaled so the first pass over
    /// the ring never blocks.
    pub fn new(gpu: Arc<G>, slots: usize) -> RenderResult<Self> {
        if slots == 0 {
            return Err(RenderError::InvalidRingSize);
        }
        let count = u32::try_from(slots).map_err(|_| RenderError::InvalidRingSize)?;

        let pool = gpu
            .create_command_pool()
            .map_err(RenderError::gpu("create command pool"))?;
        let mut ring = FrameRing {
            gpu,
            pool,
            command_buffers: Vec::new(),
            fences: Vec::with_capacity(slots),
            acquire: Vec::with_capacity(slots),
            release: Vec::with_capacity(slots),
        };
        ring.command_buffers = ring
            .gpu
            .allocate_command_buffers(pool, count)
            .map_err(RenderError::gpu("allocate command buffers"))?;

        for _ in 0..slots {
            let fence = ring
                .gpu
                .create_fence(true)
                .map_err(RenderError::gpu("create fence"))?;
            ring.fences.push(fence);
            let acquire = ring
                .gpu
                .create_semaphore()
                .map_err(RenderError::gpu("create semaphore"))?;
            ring.acquire.push(acquire);
            let release = ring
                .gpu
                .create_semaphore()
                .map_err(RenderError::gpu("create semaphore"))?;
            ring.release.push(release);
        }

        debug!("frame ring ready with {} slots", slots);
        Ok(ring)
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    /// Slot number for a frame counter value.
    pub fn slot_index(&self, frame: u64) -> usize {
        (frame % self.len() as u64) as usize
    }

    /// Bounds-checked slot lookup.
    pub fn slot(&self, index: usize) -> Option<FrameSlot<G>> {
        Some(FrameSlot {
            fence: *self.fences.get(index)?,
            acquire: *self.acquire.get(index)?,
            release: *self.release.get(index)?,
            command_buffer: *self.command_buffers.get(index)?,
        })
    }

    pub fn fences(&self) -> &[G::Fence] {
        &self.fences
    }
}

impl<G: Gpu> Drop for FrameRing<G> {
    fn drop(&mut self) {
        // reverse of creation; a partially built slot has a prefix of its objects
        for index in (0..self.fences.len()).rev() {
            if let Some(&release) = self.release.get(index) {
                self.gpu.destroy_semaphore(release);
            }
            if let Some(&acquire) = self.acquire.get(index) {
                self.gpu.destroy_semaphore(acquire);
            }
            self.gpu.destroy_fence(self.fences[index]);
        }
        self.command_buffers.clear();
        self.gpu.destroy_command_pool(self.pool);
    }
}
