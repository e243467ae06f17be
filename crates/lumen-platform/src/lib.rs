// SPDX-License-Identifier: CEPL-1.0
//! Window provider: re-exports winit and creates the render window.

pub use winit;

use anyhow::{Context, Result};
use lumen_render::RenderSize;
use tracing::info;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "lumen".to_string(),
        }
    }
}

pub fn create_window(event_loop: &ActiveEventLoop, settings: &WindowSettings) -> Result<Window> {
    let attrs = Window::default_attributes()
        .with_title(settings.title.clone())
        .with_inner_size(LogicalSize::new(settings.width, settings.height));
    let window = event_loop.create_window(attrs).context("create_window")?;
    let size = render_size(window.inner_size());
    info!(
        "window \"{}\" created ({}x{} physical)",
        settings.title, size.width, size.height
    );
    Ok(window)
}

/// Drawable extent in physical pixels; zero in either dimension while
/// minimized.
pub fn render_size(size: PhysicalSize<u32>) -> RenderSize {
    RenderSize::new(size.width, size.height)
}
