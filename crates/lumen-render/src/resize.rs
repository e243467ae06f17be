// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;

/// Stale flag plus the latest known window extent.
///
/// Set from the window's resize callback and from acquire/present return
/// codes; consumed exactly once per rebuild. Setting it never touches GPU
/// state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeState {
    stale: bool,
    extent: RenderSize,
}

impl ResizeState {
    pub fn new(extent: RenderSize) -> Self {
        Self {
            stale: false,
            extent,
        }
    }

    /// Resize notification from the window.
    pub fn notify(&mut self, extent: RenderSize) {
        self.stale = true;
        self.extent = extent;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn extent(&self) -> RenderSize {
        self.extent
    }

    /// Clears the flag, returning the extent to rebuild against if it was set.
    pub fn take(&mut self) -> Option<RenderSize> {
        std::mem::take(&mut self.stale).then_some(self.extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_sets_flag_and_extent() {
        let mut state = ResizeState::new(RenderSize::new(800, 600));
        assert!(!state.is_stale());
        state.notify(RenderSize::new(1024, 768));
        assert!(state.is_stale());
        assert_eq!(state.extent(), RenderSize::new(1024, 768));
    }

    #[test]
    fn take_consumes_once() {
        let mut state = ResizeState::new(RenderSize::new(800, 600));
        state.notify(RenderSize::new(640, 480));
        state.notify(RenderSize::new(1280, 720));
        assert_eq!(state.take(), Some(RenderSize::new(1280, 720)));
        assert_eq!(state.take(), None);
        // extent survives the flag
        assert_eq!(state.extent(), RenderSize::new(1280, 720));
    }

    #[test]
    fn mark_stale_keeps_extent() {
        let mut state = ResizeState::new(RenderSize::new(800, 600));
        state.mark_stale();
        assert_eq!(state.take(), Some(RenderSize::new(800, 600)));
    }
}
