// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use lumen_core::{init_tracing, FpsCounter};
use lumen_platform::{create_window, render_size};
use lumen_render::{FrameLoop, FrameStatus};
use lumen_render_vk::{TrianglePass, VkContext, VkFrameLoop};
use tracing::{debug, error, info};

use lumen_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::{AppCfg, Args};

struct App {
    cfg: AppCfg,
    // dropped before the window it renders into
    frame_loop: Option<VkFrameLoop>,
    window: Option<Window>,
    fps: FpsCounter,
    minimized: bool,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        Self {
            cfg,
            frame_loop: None,
            window: None,
            fps: FpsCounter::default(),
            minimized: false,
            fatal: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = create_window(event_loop, &self.cfg.window_settings())?;
        let ctx = Arc::new(VkContext::new(&window, &window).context("vulkan init")?);
        let pass = TrianglePass::new(ctx.clone())?;
        let frame_loop = FrameLoop::new(
            ctx.clone(),
            ctx.surface(),
            pass,
            self.cfg.frame_settings(),
            render_size(window.inner_size()),
        )
        .context("frame loop setup")?;

        self.frame_loop = Some(frame_loop);
        self.window = Some(window);
        Ok(())
    }

    /// Stops rendering and keeps `err` for `main` to report.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.frame_loop = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let size = render_size(new_size);
                debug!("Resized -> {}x{}", size.width, size.height);
                // only flags the loop; the rebuild happens inside a frame
                if let Some(frame_loop) = &mut self.frame_loop {
                    frame_loop.notify_resized(size);
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(frame_loop) = &mut self.frame_loop else {
                    return;
                };
                match frame_loop.render_frame() {
                    Ok(FrameStatus::Continue) => {
                        self.minimized = false;
                        self.fps.frame();
                    }
                    Ok(FrameStatus::Recreated) => {
                        self.minimized = false;
                        debug!("swapchain rebuilt (frame {})", frame_loop.frame_counter());
                    }
                    Ok(FrameStatus::Skipped) => {
                        if !self.minimized {
                            info!("window has no area; rendering paused");
                        }
                        self.minimized = true;
                    }
                    Err(e) => self.fail(event_loop, anyhow::Error::new(e).context("render loop")),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.frame_loop.is_none() {
            return;
        }

        let now = Instant::now();
        if self.minimized {
            // sleep until a resize brings the window back
            event_loop.set_control_flow(ControlFlow::Wait);
            self.fps.reset(now);
            return;
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
        if let Some(fps) = self.fps.tick(now) {
            info!("fps ~ {:.0}", fps);
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut cfg = AppCfg::load(&args.config);
    cfg.apply_args(&args);
    info!(
        "{} frames in flight, {:?} present mode",
        cfg.render.frames_in_flight, cfg.render.present_mode
    );

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
