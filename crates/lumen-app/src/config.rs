// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use lumen_platform::WindowSettings;
use lumen_render::{FrameSettings, ImageUsage, PresentMode};
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG: &str = "lumen.toml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Frames the CPU may run ahead of the GPU
    #[arg(long)]
    pub frames_in_flight: Option<usize>,

    /// Preferred present mode; falls back to fifo when unsupported
    #[arg(long, value_enum)]
    pub present_mode: Option<PresentModeCfg>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Fifo,
    Mailbox,
    Immediate,
}

impl From<PresentModeCfg> for PresentMode {
    fn from(mode: PresentModeCfg) -> Self {
        match mode {
            PresentModeCfg::Fifo => PresentMode::Fifo,
            PresentModeCfg::Mailbox => PresentMode::Mailbox,
            PresentModeCfg::Immediate => PresentMode::Immediate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let defaults = WindowSettings::default();
        Self {
            width: defaults.width,
            height: defaults.height,
            title: defaults.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    pub min_image_count: u32,
    pub present_mode: PresentModeCfg,
    pub fence_timeout_ms: u64,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let defaults = FrameSettings::default();
        Self {
            clear_color: defaults.clear_color,
            frames_in_flight: defaults.frames_in_flight,
            min_image_count: defaults.min_image_count,
            present_mode: PresentModeCfg::Fifo,
            fence_timeout_ms: defaults.fence_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

impl AppCfg {
    pub fn parse(src: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(src)
    }

    /// A missing file means defaults; a malformed one is reported and
    /// ignored.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(src) => match Self::parse(&src) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!("{}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                debug!("{}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Command-line flags win over the file.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(n) = args.frames_in_flight {
            self.render.frames_in_flight = n;
        }
        if let Some(mode) = args.present_mode {
            self.render.present_mode = mode;
        }
    }

    /// A zero `fence_timeout_ms` falls back to the default timeout.
    pub fn frame_settings(&self) -> FrameSettings {
        let fence_timeout = match self.render.fence_timeout_ms {
            0 => {
                let fallback = FrameSettings::default().fence_timeout;
                warn!("fence_timeout_ms = 0 is not usable; using {:?}", fallback);
                fallback
            }
            ms => Duration::from_millis(ms),
        };
        FrameSettings {
            frames_in_flight: self.render.frames_in_flight,
            min_image_count: self.render.min_image_count,
            present_mode: self.render.present_mode.into(),
            usage: ImageUsage::COLOR_ATTACHMENT,
            clear_color: self.render.clear_color,
            fence_timeout,
        }
    }

    pub fn window_settings(&self) -> WindowSettings {
        WindowSettings {
            width: self.window.width,
            height: self.window.height,
            title: self.window.title.clone(),
        }
    }
}
