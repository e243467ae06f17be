// SPDX-License-Identifier: CEPL-1.0
//! In-memory `Gpu` that logs every call, tracks live handles and fence
//! states, and lets tests script acquire/present results.
#![allow(dead_code)]

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use lumen_render::{
    Acquired, FrameRecorder, Gpu, GpuError, PresentMode, PresentState, RenderSize, Submission,
    SurfaceCaps, SwapchainDesc, UNDEFINED_EXTENT,
};

pub const SURFACE: u64 = 0xface;
pub const FORMAT_A: u32 = 44; // B8G8R8A8_UNORM
pub const FORMAT_B: u32 = 50; // B8G8R8A8_SRGB

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Swapchain,
    ImageView,
    RenderPass,
    Framebuffer,
    CommandPool,
    Fence,
    Semaphore,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Create(Kind, u64),
    Destroy(Kind, u64),
    WaitIdle,
    WaitFence(u64),
    ResetFence(u64),
    Acquire { swapchain: u64, semaphore: u64 },
    BeginCommands(u64),
    BeginRenderPass { framebuffer: u64, extent: RenderSize, clear: [f32; 4] },
    Draw { cmd: u64, extent: RenderSize },
    EndRenderPass,
    EndCommands(u64),
    Submit { cmd: u64, wait: u64, signal: u64, fence: u64 },
    Present { swapchain: u64, image: u32, wait: u64 },
    Marker(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    /// Submitted work not yet observed complete.
    Pending,
}

#[derive(Clone, Debug)]
pub struct SurfaceConfig {
    pub present_supported: bool,
    pub formats: Vec<u32>,
    pub modes: Vec<PresentMode>,
    pub caps: SurfaceCaps,
    /// Images handed out on top of the requested minimum.
    pub extra_images: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            present_supported: true,
            formats: vec![FORMAT_A, FORMAT_B],
            modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
            caps: SurfaceCaps {
                current_extent: RenderSize::new(UNDEFINED_EXTENT, UNDEFINED_EXTENT),
                min_extent: RenderSize::new(16, 16),
                max_extent: RenderSize::new(4096, 4096),
                min_image_count: 2,
                max_image_count: 8,
            },
            extra_images: 0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainInfo {
    pub extent: RenderSize,
    pub format: u32,
    pub present_mode: PresentMode,
    pub images: u32,
}

#[derive(Default)]
pub struct State {
    next_id: u64,
    pub live: Vec<(Kind, u64)>,
    pub events: Vec<Event>,
    pub violations: Vec<String>,
    pub fences: HashMap<u64, FenceState>,
    /// Fences whose work never completes (a hung GPU).
    pub stuck: HashSet<u64>,
    /// Pending fences in submission order.
    queue: Vec<u64>,
    pub max_pending: usize,
    pub surface: SurfaceConfig,
    pub swapchains: HashMap<u64, SwapchainInfo>,
    pub framebuffers: HashMap<u64, RenderSize>,
    pub acquire_script: VecDeque<Result<Acquired, GpuError>>,
    pub present_script: VecDeque<Result<PresentState, GpuError>>,
    next_image: HashMap<u64, u32>,
    calls: HashMap<&'static str, usize>,
    fail_at: Option<(&'static str, usize)>,
}

impl State {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn create(&mut self, kind: Kind) -> u64 {
        let id = self.id();
        self.live.push((kind, id));
        self.events.push(Event::Create(kind, id));
        id
    }

    fn destroy(&mut self, kind: Kind, id: u64) {
        match self.live.iter().position(|&entry| entry == (kind, id)) {
            Some(pos) => {
                self.live.remove(pos);
            }
            None => self
                .violations
                .push(format!("destroy of dead or unknown {:?} {}", kind, id)),
        }
        self.events.push(Event::Destroy(kind, id));
    }

    fn is_live(&self, kind: Kind, id: u64) -> bool {
        self.live.contains(&(kind, id))
    }

    fn require(&mut self, kind: Kind, id: u64, op: &str) {
        if !self.is_live(kind, id) {
            self.violations
                .push(format!("{} used dead {:?} {}", op, kind, id));
        }
    }

    /// Counts the call and fails it if it was armed with `fail_at`.
    fn call(&mut self, op: &'static str) -> Result<(), GpuError> {
        let count = self.calls.entry(op).or_insert(0);
        let nth = *count;
        *count += 1;
        if self.fail_at == Some((op, nth)) {
            return Err(GpuError::Backend {
                op,
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }

    /// In-order queue: completing one submission completes everything
    /// submitted before it.
    fn complete_through(&mut self, fence: u64) {
        if let Some(pos) = self.queue.iter().position(|&f| f == fence) {
            for done in self.queue.drain(..=pos) {
                self.fences.insert(done, FenceState::Signaled);
            }
        }
    }

    fn pending(&self) -> usize {
        self.fences
            .values()
            .filter(|&&state| state == FenceState::Pending)
            .count()
    }
}

#[derive(Default)]
pub struct MockGpu {
    state: RefCell<State>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surface(surface: SurfaceConfig) -> Self {
        let gpu = Self::default();
        gpu.state.borrow_mut().surface = surface;
        gpu
    }

    pub fn state(&self) -> Ref<'_, State> {
        self.state.borrow()
    }

    pub fn edit<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.borrow_mut())
    }

    /// Fails the `nth` (0-based) call of `op`.
    pub fn fail_at(&self, op: &'static str, nth: usize) {
        self.state.borrow_mut().fail_at = Some((op, nth));
    }

    pub fn script_acquire(&self, result: Result<Acquired, GpuError>) {
        self.state.borrow_mut().acquire_script.push_back(result);
    }

    pub fn script_present(&self, result: Result<PresentState, GpuError>) {
        self.state.borrow_mut().present_script.push_back(result);
    }

    pub fn mark(&self, label: &'static str) {
        self.state.borrow_mut().events.push(Event::Marker(label));
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Events logged after the last `mark(label)`.
    pub fn events_since(&self, label: &'static str) -> Vec<Event> {
        let state = self.state.borrow();
        let start = state
            .events
            .iter()
            .rposition(|event| *event == Event::Marker(label))
            .map_or(0, |pos| pos + 1);
        state.events[start..].to_vec()
    }

    pub fn live(&self) -> Vec<(Kind, u64)> {
        self.state.borrow().live.clone()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn fence_state(&self, fence: u64) -> Option<FenceState> {
        self.state.borrow().fences.get(&fence).copied()
    }

    pub fn max_pending(&self) -> usize {
        self.state.borrow().max_pending
    }

    pub fn swapchain_info(&self, swapchain: u64) -> Option<SwapchainInfo> {
        self.state.borrow().swapchains.get(&swapchain).copied()
    }

    /// Called by [`TestRecorder`] in place of real draw commands.
    pub fn draw(&self, cmd: u64, extent: RenderSize) {
        self.state.borrow_mut().events.push(Event::Draw { cmd, extent });
    }
}

impl Gpu for MockGpu {
    type Surface = u64;
    type Format = u32;
    type Swapchain = u64;
    type Image = u64;
    type ImageView = u64;
    type RenderPass = u64;
    type Framebuffer = u64;
    type CommandPool = u64;
    type CommandBuffer = u64;
    type Fence = u64;
    type Semaphore = u64;

    fn wait_idle(&self) -> Result<(), GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("wait_idle")?;
        s.events.push(Event::WaitIdle);
        let queued: Vec<u64> = s.queue.drain(..).collect();
        for fence in queued {
            s.fences.insert(fence, FenceState::Signaled);
        }
        s.stuck.clear();
        Ok(())
    }

    fn supports_present(&self, surface: u64) -> Result<bool, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("supports_present")?;
        assert_eq!(surface, SURFACE);
        Ok(s.surface.present_supported)
    }

    fn surface_formats(&self, _surface: u64) -> Result<Vec<u32>, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("surface_formats")?;
        Ok(s.surface.formats.clone())
    }

    fn surface_present_modes(&self, _surface: u64) -> Result<Vec<PresentMode>, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("surface_present_modes")?;
        Ok(s.surface.modes.clone())
    }

    fn surface_caps(&self, _surface: u64) -> Result<SurfaceCaps, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("surface_caps")?;
        Ok(s.surface.caps)
    }

    fn create_swapchain(&self, desc: &SwapchainDesc<Self>) -> Result<u64, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("create_swapchain")?;
        let images = desc.min_image_count + s.surface.extra_images;
        let id = s.create(Kind::Swapchain);
        s.swapchains.insert(
            id,
            SwapchainInfo {
                extent: desc.extent,
                format: desc.format,
                present_mode: desc.present_mode,
                images,
            },
        );
        Ok(id)
    }

    fn swapchain_images(&self, swapchain: u64) -> Result<Vec<u64>, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("swapchain_images")?;
        s.require(Kind::Swapchain, swapchain, "swapchain_images");
        let count = s.swapchains.get(&swapchain).map_or(0, |info| info.images);
        // owned by the presentation engine: not tracked as live
        Ok((0..count).map(|_| s.id()).collect())
    }

    fn destroy_swapchain(&self, swapchain: u64) {
        self.state.borrow_mut().destroy(Kind::Swapchain, swapchain);
    }

    fn create_image_view(&self, _image: u64, _format: u32) -> Result<u64, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("create_image_view")?;
        Ok(s.create(Kind::ImageView))
    }

    fn destroy_image_view(&self, view: u64) {
        let mut s = self.state.borrow_mut();
        if s.framebuffers.keys().any(|&fb| s.is_live(Kind::Framebuffer, fb)) {
            s.violations
                .push(format!("image view {} destroyed under a live framebuffer", view));
        }
        s.destroy(Kind::ImageView, view);
    }

    fn create_render_pass(&self, _format: u32) -> Result<u64, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("create_render_pass")?;
        Ok(s.create(Kind::RenderPass))
    }

    fn destroy_render_pass(&self, render_pass: u64) {
        self.state.borrow_mut().destroy(Kind::RenderPass, render_pass);
    }

    fn create_framebuffer(
        &self,
        render_pass: u64,
        view: u64,
        extent: RenderSize,
    ) -> Result<u64, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("create_framebuffer")?;
        s.require(Kind::RenderPass, render_pass, "create_framebuffer");
        s.require(Kind::ImageView, view, "create_framebuffer");
        let id = s.create(Kind::Framebuffer);
        s.framebuffers.insert(id, extent);
        Ok(id)
    }

    fn destroy_framebuffer(&self, framebuffer: u64) {
        self.state.borrow_mut().destroy(Kind::Framebuffer, framebuffer);
    }

    fn create_command_pool(&self) -> Result<u64, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("create_command_pool")?;
        Ok(s.create(Kind::CommandPool))
    }

    fn allocate_command_buffers(&self, pool: u64, count: u32) -> Result<Vec<u64>, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("allocate_command_buffers")?;
        s.require(Kind::CommandPool, pool, "allocate_command_buffers");
        Ok((0..count).map(|_| s.id()).collect())
    }

    fn destroy_command_pool(&self, pool: u64) {
        self.state.borrow_mut().destroy(Kind::CommandPool, pool);
    }

    fn create_fence(&self, signaled: bool) -> Result<u64, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("create_fence")?;
        let id = s.create(Kind::Fence);
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        s.fences.insert(id, state);
        Ok(id)
    }

    fn destroy_fence(&self, fence: u64) {
        let mut s = self.state.borrow_mut();
        if s.fences.get(&fence) == Some(&FenceState::Pending) {
            s.violations
                .push(format!("fence {} destroyed with work pending", fence));
        }
        s.destroy(Kind::Fence, fence);
    }

    fn create_semaphore(&self) -> Result<u64, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("create_semaphore")?;
        Ok(s.create(Kind::Semaphore))
    }

    fn destroy_semaphore(&self, semaphore: u64) {
        self.state.borrow_mut().destroy(Kind::Semaphore, semaphore);
    }

    fn wait_fence(&self, fence: u64, _timeout: Duration) -> Result<(), GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("wait_fence")?;
        s.require(Kind::Fence, fence, "wait_fence");
        s.events.push(Event::WaitFence(fence));
        match s.fences.get(&fence).copied() {
            Some(FenceState::Signaled) => Ok(()),
            Some(FenceState::Pending) if !s.stuck.contains(&fence) => {
                s.complete_through(fence);
                Ok(())
            }
            _ => Err(GpuError::Timeout),
        }
    }

    fn reset_fence(&self, fence: u64) -> Result<(), GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("reset_fence")?;
        s.events.push(Event::ResetFence(fence));
        if s.fences.get(&fence) != Some(&FenceState::Signaled) {
            s.violations
                .push(format!("fence {} reset while not signaled", fence));
        }
        s.fences.insert(fence, FenceState::Unsignaled);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: u64,
        signal: u64,
        _timeout: Duration,
    ) -> Result<Acquired, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("acquire_next_image")?;
        s.require(Kind::Swapchain, swapchain, "acquire_next_image");
        s.events.push(Event::Acquire {
            swapchain,
            semaphore: signal,
        });
        if let Some(result) = s.acquire_script.pop_front() {
            return result;
        }
        let images = s.swapchains.get(&swapchain).map_or(1, |info| info.images);
        let next = s.next_image.entry(swapchain).or_insert(0);
        let image_index = *next % images;
        *next += 1;
        Ok(Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn begin_commands(&self, cmd: u64) -> Result<(), GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("begin_commands")?;
        s.events.push(Event::BeginCommands(cmd));
        Ok(())
    }

    fn end_commands(&self, cmd: u64) -> Result<(), GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("end_commands")?;
        s.events.push(Event::EndCommands(cmd));
        Ok(())
    }

    fn begin_render_pass(
        &self,
        _cmd: u64,
        render_pass: u64,
        framebuffer: u64,
        extent: RenderSize,
        clear_color: [f32; 4],
    ) {
        let mut s = self.state.borrow_mut();
        s.require(Kind::RenderPass, render_pass, "begin_render_pass");
        s.require(Kind::Framebuffer, framebuffer, "begin_render_pass");
        s.events.push(Event::BeginRenderPass {
            framebuffer,
            extent,
            clear: clear_color,
        });
    }

    fn end_render_pass(&self, _cmd: u64) {
        self.state.borrow_mut().events.push(Event::EndRenderPass);
    }

    fn submit(&self, submission: &Submission<Self>) -> Result<(), GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("submit")?;
        let fence = submission.fence;
        s.events.push(Event::Submit {
            cmd: submission.command_buffer,
            wait: submission.wait,
            signal: submission.signal,
            fence,
        });
        if s.fences.get(&fence) != Some(&FenceState::Unsignaled) {
            s.violations
                .push(format!("submit with fence {} not reset", fence));
        }
        s.fences.insert(fence, FenceState::Pending);
        s.queue.push(fence);
        let pending = s.pending();
        s.max_pending = s.max_pending.max(pending);
        Ok(())
    }

    fn present(&self, swapchain: u64, image_index: u32, wait: u64) -> Result<PresentState, GpuError> {
        let mut s = self.state.borrow_mut();
        s.call("present")?;
        s.require(Kind::Swapchain, swapchain, "present");
        s.events.push(Event::Present {
            swapchain,
            image: image_index,
            wait,
        });
        s.present_script
            .pop_front()
            .unwrap_or(Ok(PresentState::Optimal))
    }
}

/// Pipeline provider stand-in: remembers render-pass changes and draws.
#[derive(Default)]
pub struct TestRecorder {
    pub render_passes: Vec<(u64, u32)>,
    pub draws: usize,
}

impl FrameRecorder<MockGpu> for TestRecorder {
    fn render_pass_changed(
        &mut self,
        _gpu: &MockGpu,
        render_pass: u64,
        format: u32,
    ) -> Result<(), GpuError> {
        self.render_passes.push((render_pass, format));
        Ok(())
    }

    fn record(&mut self, gpu: &MockGpu, cmd: u64, extent: RenderSize) -> Result<(), GpuError> {
        self.draws += 1;
        gpu.draw(cmd, extent);
        Ok(())
    }
}
