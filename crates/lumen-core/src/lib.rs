// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::{Duration, Instant};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
    if installed.is_err() {
        // a test harness or embedding app got there first
        tracing::debug!("tracing subscriber already installed; keeping it");
    }
}

/// Counts rendered frames and reports the rate once per window.
#[derive(Debug)]
pub struct FpsCounter {
    window: Duration,
    frames: u32,
    window_start: Instant,
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: Duration, now: Instant) -> Self {
        Self {
            window,
            frames: 0,
            window_start: now,
        }
    }

    pub fn frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    /// Drops the partial window, e.g. while rendering is paused.
    pub fn reset(&mut self, now: Instant) {
        self.frames = 0;
        self.window_start = now;
    }

    /// Returns frames per second once a full window has elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_twice_keeps_first_subscriber() {
        init_tracing();
        init_tracing();
        tracing::info!("still logging after second init");
    }

    #[test]
    fn reports_nothing_before_window_elapses() {
        let start = Instant::now();
        let mut fps = FpsCounter::starting_at(Duration::from_secs(1), start);
        fps.frame();
        assert_eq!(fps.tick(start + Duration::from_millis(500)), None);
    }

    #[test]
    fn reports_rate_and_restarts_window() {
        let start = Instant::now();
        let mut fps = FpsCounter::starting_at(Duration::from_secs(1), start);
        for _ in 0..60 {
            fps.frame();
        }
        let rate = fps.tick(start + Duration::from_secs(1)).unwrap();
        assert!((rate - 60.0).abs() < 0.01);

        // new window starts empty
        assert_eq!(fps.tick(start + Duration::from_millis(1500)), None);
        let rate = fps.tick(start + Duration::from_secs(2)).unwrap();
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn reset_discards_partial_window() {
        let start = Instant::now();
        let mut fps = FpsCounter::starting_at(Duration::from_secs(1), start);
        fps.frame();
        fps.frame();
        fps.reset(start + Duration::from_millis(900));
        assert_eq!(fps.tick(start + Duration::from_millis(1200)), None);
    }
}
