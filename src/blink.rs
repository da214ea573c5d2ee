//! Rising-edge blink counter
//!
//! Counts one blink per contiguous run of `blink_detected` frames, however
//! many ticks the eyes stay closed.

use crate::types::Frame;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlinkEdgeDetector {
    last_state: bool,
    count: u32,
}

impl BlinkEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one delivered frame. Returns true on a rising edge.
    pub fn observe(&mut self, frame: &Frame) -> bool {
        self.observe_state(frame.blink_detected)
    }

    pub fn observe_state(&mut self, blinking: bool) -> bool {
        let rising = blinking && !self.last_state;
        if rising {
            self.count += 1;
        }
        self.last_state = blinking;
        rising
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_blinking(&self) -> bool {
        self.last_state
    }

    /// Zero the counter. The edge state is kept so a held blink is not
    /// counted again.
    pub fn reset_count(&mut self) {
        self.count = 0;
    }
}
