//! Temporal smoothing for detector frames
//!
//! Exponential interpolation between the previously emitted frame and the new
//! raw frame: `smoothed = prev + (raw - prev) * factor`. Pose-like fields and
//! landmark points use separate factors. Only the detector path is smoothed;
//! the synthetic generator is already temporally coherent.

use crate::types::{blend, EyeLandmarkSet, Frame};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POSE_FACTOR: f64 = 0.5;
pub const DEFAULT_LANDMARK_FACTOR: f64 = 0.6;

/// Blend factors for the smoothing filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingFilter {
    pub pose_factor: f64,
    pub landmark_factor: f64,
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self {
            pose_factor: DEFAULT_POSE_FACTOR,
            landmark_factor: DEFAULT_LANDMARK_FACTOR,
        }
    }
}

impl SmoothingFilter {
    pub fn new(pose_factor: f64, landmark_factor: f64) -> Self {
        Self {
            pose_factor,
            landmark_factor,
        }
    }

    /// Smooth `raw` against `previous` and store the result back into
    /// `previous`. The first frame passes through unchanged.
    pub fn apply(&self, previous: &mut Option<Frame>, raw: Frame) -> Frame {
        let smoothed = match previous.as_ref() {
            None => raw,
            Some(prev) => self.blend_frames(prev, raw),
        };
        *previous = Some(smoothed.clone());
        smoothed
    }

    fn blend_frames(&self, prev: &Frame, raw: Frame) -> Frame {
        let f = self.pose_factor;
        Frame {
            yaw: blend(prev.yaw, raw.yaw, f),
            pitch: blend(prev.pitch, raw.pitch, f),
            roll: blend(prev.roll, raw.roll, f),
            eye_openness_left: blend(prev.eye_openness_left, raw.eye_openness_left, f),
            eye_openness_right: blend(prev.eye_openness_right, raw.eye_openness_right, f),
            mouth_symmetry: blend(prev.mouth_symmetry, raw.mouth_symmetry, f),
            gaze_x: blend(prev.gaze_x, raw.gaze_x, f),
            gaze_y: blend(prev.gaze_y, raw.gaze_y, f),
            // Discrete and quality fields are never interpolated
            blink_detected: raw.blink_detected,
            confidence: raw.confidence,
            left_eye: self.blend_eye(prev.left_eye.as_ref(), raw.left_eye),
            right_eye: self.blend_eye(prev.right_eye.as_ref(), raw.right_eye),
        }
        .clamped()
    }

    fn blend_eye(
        &self,
        prev: Option<&EyeLandmarkSet>,
        raw: Option<EyeLandmarkSet>,
    ) -> Option<EyeLandmarkSet> {
        match (prev, raw) {
            (Some(prev), Some(raw)) => Some(prev.blend(&raw, self.landmark_factor)),
            (None, raw) => raw,
            (Some(prev), None) => Some(*prev),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2;

    fn pose(yaw: f64, pitch: f64) -> Frame {
        Frame {
            yaw,
            pitch,
            confidence: 0.9,
            ..Frame::neutral()
        }
    }

    #[test]
    fn test_first_frame_passes_through() {
        let filter = SmoothingFilter::default();
        let mut previous = None;
        let out = filter.apply(&mut previous, pose(20.0, -10.0));
        assert_eq!(out.yaw, 20.0);
        assert_eq!(out.pitch, -10.0);
        assert_eq!(previous, Some(out));
    }

    #[test]
    fn test_half_step_blend() {
        let filter = SmoothingFilter::default();
        let mut previous = Some(pose(0.0, 0.0));
        let out = filter.apply(&mut previous, pose(10.0, -4.0));
        assert!((out.yaw - 5.0).abs() < 1e-9);
        assert!((out.pitch + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_converges_to_constant_input() {
        let filter = SmoothingFilter::default();
        let mut previous = Some(pose(0.0, 0.0));
        let target = pose(1.0, 1.0);

        let mut out = Frame::neutral();
        for _ in 0..10 {
            out = filter.apply(&mut previous, target.clone());
        }
        // 0.5^10 < 0.001
        assert!((out.yaw - 1.0).abs() < 0.001);
        assert!((out.pitch - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_landmarks_use_landmark_factor() {
        let filter = SmoothingFilter::new(0.5, 0.6);
        let zero = EyeLandmarkSet::default();
        let one = EyeLandmarkSet {
            pupil: Point2::new(1.0, 1.0),
            ..EyeLandmarkSet::default()
        };
        let mut previous = Some(Frame {
            left_eye: Some(zero),
            ..Frame::neutral()
        });
        let out = filter.apply(
            &mut previous,
            Frame {
                left_eye: Some(one),
                ..Frame::neutral()
            },
        );
        let pupil = out.left_eye.unwrap().pupil;
        assert!((pupil.x - 0.6).abs() < 1e-9);
        assert!((pupil.y - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_blink_and_confidence_not_smoothed() {
        let filter = SmoothingFilter::default();
        let mut previous = Some(pose(0.0, 0.0));
        let out = filter.apply(
            &mut previous,
            Frame {
                blink_detected: true,
                confidence: 0.3,
                ..Frame::neutral()
            },
        );
        assert!(out.blink_detected);
        assert_eq!(out.confidence, 0.3);
    }
}
