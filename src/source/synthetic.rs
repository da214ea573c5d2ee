// Synthetic physiological frame generator
//
// Produces a frame purely from elapsed time and a physiological profile, so
// exercises can be demonstrated without a camera. Head pose is a slow sway
// plus a faster micro-tremor, gaze jumps between pseudo-random fixation
// targets (saccades) with vestibulo-ocular counter-rotation, and blinks come
// from a periodic forced blink plus a random per-tick chance.
//
// Only the jitter and random-blink terms draw from the random source. The
// generator takes an injected `StdRng` so runs can be replayed with a seed.

use crate::types::{unit, EyeLandmarkSet, Frame, PhysiologicalProfile, Point2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

/// Duration of the eased part of a saccade
pub const SACCADE_DURATION_MS: f64 = 250.0;
/// Gaze shifts by 1/VOR_DIVISOR per degree of head rotation
pub const VOR_DIVISOR: f64 = 35.0;
/// Base period of the forced blink, divided by the profile's blink multiplier
pub const FORCED_BLINK_PERIOD_MS: f64 = 3500.0;
pub const BLINK_DURATION_MS: f64 = 150.0;

pub const OPEN_EYE: f64 = 0.94;
pub const CLOSED_EYE: f64 = 0.02;
pub const MIN_OPEN_EYE: f64 = 0.1;

const MOVING_BLINK_CHANCE: f64 = 0.002;
const FIXATION_BLINK_CHANCE: f64 = 0.0005;

const LEFT_EYE_CENTER: Point2 = Point2::new(0.40, 0.42);
const RIGHT_EYE_CENTER: Point2 = Point2::new(0.60, 0.42);

pub struct SyntheticGenerator {
    profile: PhysiologicalProfile,
    rng: StdRng,
    random_blink_until_ms: f64,
}

impl SyntheticGenerator {
    pub fn new(profile: PhysiologicalProfile, rng: StdRng) -> Self {
        Self {
            profile,
            rng,
            random_blink_until_ms: f64::NEG_INFINITY,
        }
    }

    pub fn seeded(profile: PhysiologicalProfile, seed: u64) -> Self {
        Self::new(profile, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(profile: PhysiologicalProfile) -> Self {
        Self::new(profile, StdRng::from_entropy())
    }

    pub fn profile(&self) -> PhysiologicalProfile {
        self.profile
    }

    pub fn set_profile(&mut self, profile: PhysiologicalProfile) {
        self.profile = profile;
    }

    /// Produce the frame for elapsed time `t_ms`
    pub fn next_frame(&mut self, t_ms: f64) -> Frame {
        let params = self.profile.params();
        let (yaw, pitch, roll) = head_pose(t_ms, params.head_stability_mult);

        let interval = params.saccade_interval_ms;
        let index = (t_ms / interval).floor();
        let phase_ms = t_ms - index * interval;
        let mut gaze = saccade_gaze(index, phase_ms);

        if params.gaze_jitter > 0.0 {
            gaze.x += self.rng.gen_range(-1.0..1.0) * params.gaze_jitter;
            gaze.y += self.rng.gen_range(-1.0..1.0) * params.gaze_jitter;
        }

        // Vestibulo-ocular reflex: eyes counter-rotate against the head
        let gaze_x = (gaze.x - yaw / VOR_DIVISOR).clamp(-1.0, 1.0);
        let gaze_y = (gaze.y - pitch / VOR_DIVISOR).clamp(-1.0, 1.0);

        let moving = phase_ms < interval / 2.0;
        let blinking = self.blink_state(t_ms, moving, params.blink_rate_mult);

        let openness_left = eyelid_openness(blinking, gaze_y, pitch, t_ms, params.head_stability_mult);
        let openness_right = unit(openness_left * (1.0 - params.asymmetry));

        let mouth_symmetry = unit(1.0 - params.asymmetry - 0.01 * (t_ms / 1700.0).sin().abs());
        let confidence = unit(0.97 - 0.02 * (t_ms / 3100.0).sin().abs());

        Frame {
            yaw,
            pitch,
            roll,
            eye_openness_left: openness_left,
            eye_openness_right: openness_right,
            mouth_symmetry,
            gaze_x,
            gaze_y,
            blink_detected: blinking,
            confidence,
            left_eye: Some(project_eye(LEFT_EYE_CENTER, yaw, pitch, gaze_x, gaze_y, openness_left)),
            right_eye: Some(project_eye(RIGHT_EYE_CENTER, yaw, pitch, gaze_x, gaze_y, openness_right)),
        }
        .clamped()
    }

    fn blink_state(&mut self, t_ms: f64, moving: bool, blink_rate_mult: f64) -> bool {
        if t_ms < self.random_blink_until_ms {
            return true;
        }

        let chance = if moving {
            MOVING_BLINK_CHANCE
        } else {
            FIXATION_BLINK_CHANCE
        };
        let probability = (chance * blink_rate_mult).min(1.0);
        if self.rng.gen_bool(probability) {
            self.random_blink_until_ms = t_ms + BLINK_DURATION_MS;
            return true;
        }

        forced_blink(t_ms, blink_rate_mult)
    }
}

/// Yaw, pitch and roll in degrees: slow sway plus micro-tremor
pub fn head_pose(t_ms: f64, stability_mult: f64) -> (f64, f64, f64) {
    let wave = |period_ms: f64, phase: f64| (TAU * t_ms / period_ms + phase).sin();

    let yaw = 2.0 * wave(5000.0, 0.0) + 0.3 * wave(1200.0, 0.4);
    let pitch = 1.5 * wave(6000.0, 1.1) + 0.25 * wave(900.0, 0.0);
    let roll = 1.0 * wave(4000.0, 0.5) + 0.2 * wave(1500.0, 2.0);

    (
        yaw * stability_mult,
        pitch * stability_mult,
        roll * stability_mult,
    )
}

/// Pseudo-random fixation target for a saccade interval
pub fn saccade_target(seed: f64) -> Point2 {
    Point2::new((seed * 12.9898).sin() * 0.7, (seed * 78.233).cos() * 0.5)
}

pub fn ease_out_cubic(progress: f64) -> f64 {
    let p = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powi(3)
}

/// Gaze while travelling from the previous interval's target to the current one
pub fn saccade_gaze(index: f64, phase_ms: f64) -> Point2 {
    let from = saccade_target(index - 1.0);
    let to = saccade_target(index);
    let eased = ease_out_cubic(phase_ms / SACCADE_DURATION_MS);
    Point2::new(
        from.x + (to.x - from.x) * eased,
        from.y + (to.y - from.y) * eased,
    )
}

/// Periodic blink that fires once every `3500 / blink_rate_mult` ms
pub fn forced_blink(t_ms: f64, blink_rate_mult: f64) -> bool {
    if blink_rate_mult <= 0.0 || t_ms < 0.0 {
        return false;
    }
    let period = FORCED_BLINK_PERIOD_MS / blink_rate_mult;
    t_ms % period < BLINK_DURATION_MS.min(period / 2.0)
}

fn eyelid_openness(blinking: bool, gaze_y: f64, pitch: f64, t_ms: f64, tremor_mult: f64) -> f64 {
    if blinking {
        return CLOSED_EYE;
    }
    let gaze_down = gaze_y.max(0.0) * 0.15;
    let pitch_down = pitch.max(0.0) * 0.004;
    let tremor = (t_ms / 130.0).sin().abs() * 0.01 * tremor_mult;
    (OPEN_EYE - gaze_down - pitch_down - tremor).max(MIN_OPEN_EYE)
}

/// Place the five eye landmarks from head pose, gaze and lid closure
pub fn project_eye(
    center: Point2,
    yaw: f64,
    pitch: f64,
    gaze_x: f64,
    gaze_y: f64,
    openness: f64,
) -> EyeLandmarkSet {
    let head = center.offset(-yaw * 0.003, pitch * 0.003);
    let closure = (1.0 - openness) * 0.02;

    EyeLandmarkSet {
        pupil: head.offset(gaze_x * 0.02, gaze_y * 0.012).clamp_unit(),
        upper_lid: head.offset(0.0, -0.02 + closure).clamp_unit(),
        lower_lid: head.offset(0.0, 0.02).clamp_unit(),
        inner_corner: head.offset(if center.x < 0.5 { 0.04 } else { -0.04 }, 0.0).clamp_unit(),
        outer_corner: head.offset(if center.x < 0.5 { -0.04 } else { 0.04 }, 0.0).clamp_unit(),
    }
}
