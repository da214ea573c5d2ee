//! Per-exercise scoring strategies
//!
//! Each strategy consumes the latest delivered frame on a fixed 100 ms
//! sub-tick while the session is playing and updates the running counters in
//! [`SessionState`]. Blink events arrive separately, on the frame's rising
//! edge.

use crate::session::SessionState;
use crate::types::{ExerciseKind, Frame, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Scoring sub-tick period
pub const SCORING_TICK_MS: f64 = 100.0;
/// Follow-dot target relocation period
pub const TARGET_RELOCATE_MS: f64 = 2000.0;
/// Minimum detector confidence for a follow-dot tick to count
pub const CONFIDENCE_GATE: f64 = 0.5;
/// |yaw| + |pitch| above this counts as unstable (degrees)
pub const HEAD_DEVIATION_LIMIT: f64 = 5.0;
pub const STABILITY_PENALTY: f64 = 0.2;
pub const STABILITY_RECOVERY: f64 = 0.05;
pub const MAX_STABILITY: f64 = 100.0;

/// Moving target for the follow-dot exercise
#[derive(Debug, Clone)]
pub struct DotTarget {
    position: Point2,
    relocated_at_ms: f64,
    rng: StdRng,
}

impl DotTarget {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            position: Point2::new(0.5, 0.5),
            relocated_at_ms: 0.0,
            rng,
        }
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    /// Move the target once `TARGET_RELOCATE_MS` has passed since the last
    /// relocation. Returns true when it moved.
    pub fn update(&mut self, elapsed_ms: f64) -> bool {
        if elapsed_ms - self.relocated_at_ms < TARGET_RELOCATE_MS {
            return false;
        }
        // Keep the dot inside the central 80% of the field
        self.position = Point2::new(self.rng.gen_range(0.1..0.9), self.rng.gen_range(0.1..0.9));
        self.relocated_at_ms = elapsed_ms;
        true
    }

    pub fn reset(&mut self) {
        self.position = Point2::new(0.5, 0.5);
        self.relocated_at_ms = 0.0;
    }
}

#[derive(Debug, Clone)]
pub enum ScoringEngine {
    FollowDot(DotTarget),
    BlinkTraining,
    HeadStability,
}

impl ScoringEngine {
    pub fn for_exercise(kind: ExerciseKind, seed: Option<u64>) -> Self {
        match kind {
            ExerciseKind::FollowDot => Self::FollowDot(DotTarget::new(seed)),
            ExerciseKind::BlinkTraining => Self::BlinkTraining,
            ExerciseKind::HeadStability => Self::HeadStability,
        }
    }

    /// Current follow-dot target, if this exercise has one
    pub fn target(&self) -> Option<Point2> {
        match self {
            Self::FollowDot(target) => Some(target.position()),
            _ => None,
        }
    }

    /// One 100 ms scoring step. `elapsed_ms` is measured from session start.
    pub fn score_tick(&mut self, state: &mut SessionState, frame: Option<&Frame>, elapsed_ms: f64) {
        match self {
            Self::FollowDot(target) => {
                target.update(elapsed_ms);
                // Confidence gating only; gaze-to-target distance is not scored
                if frame.is_some_and(|f| f.confidence > CONFIDENCE_GATE) {
                    state.score += 1.0;
                }
            }
            Self::BlinkTraining => {}
            Self::HeadStability => {
                let Some(frame) = frame else {
                    return;
                };
                let next = if frame.head_deviation() > HEAD_DEVIATION_LIMIT {
                    state.head_stability_score - STABILITY_PENALTY
                } else {
                    state.head_stability_score + STABILITY_RECOVERY
                };
                state.head_stability_score = next.clamp(0.0, MAX_STABILITY);
                state.score = state.head_stability_score;
            }
        }
    }

    /// Rising edge of a blink, already added to `state.blink_count`
    pub fn on_blink(&mut self, state: &mut SessionState) {
        if let Self::BlinkTraining = self {
            state.score = state.blink_count as f64;
        }
    }

    pub fn reset(&mut self) {
        if let Self::FollowDot(target) = self {
            target.reset();
        }
    }
}
