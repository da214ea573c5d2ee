// Detector adapter
//
// Wraps an external landmark/blendshape detector and converts its output into
// the same frame shape the synthetic generator produces. The detector model
// itself is opaque; it is created once, shared by reference count, and its
// initialization state is an explicit tagged value.

use crate::error::{RehabError, RehabResult};
use crate::source::capture::CaptureFrame;
use crate::types::{unit, EyeLandmarkSet, Frame, Point2};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Face mesh indices used by the adapter (478-point topology)
pub mod landmark_index {
    pub const NOSE_TIP: usize = 1;
    pub const LEFT_CHEEK: usize = 234;
    pub const RIGHT_CHEEK: usize = 454;

    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const LEFT_EYE_UPPER: usize = 159;
    pub const LEFT_EYE_LOWER: usize = 145;

    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_UPPER: usize = 386;
    pub const RIGHT_EYE_LOWER: usize = 374;

    pub const LEFT_IRIS: usize = 468;
    pub const RIGHT_IRIS: usize = 473;

    /// Mesh without iris refinement
    pub const FACE_MESH_LEN: usize = 468;
    pub const WITH_IRIS_LEN: usize = 478;
}

pub mod blendshape {
    pub const EYE_BLINK_LEFT: &str = "eyeBlinkLeft";
    pub const EYE_BLINK_RIGHT: &str = "eyeBlinkRight";
    pub const MOUTH_SMILE_LEFT: &str = "mouthSmileLeft";
    pub const MOUTH_SMILE_RIGHT: &str = "mouthSmileRight";
}

/// Degrees per unit of normalized landmark offset
pub const HEAD_POSE_SCALE: f64 = 100.0;
/// Nose-below-eyes offset (as a fraction of face width) for a level head
pub const NEUTRAL_NOSE_DROP: f64 = 0.28;
/// Confidence reported when the face is lost
pub const NO_FACE_CONFIDENCE: f64 = 0.3;
const DEFAULT_FACE_CONFIDENCE: f64 = 0.9;

/// Output of one detector call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Empty when no face was found
    pub landmarks: Vec<Point2>,
    pub blendshapes: HashMap<String, f64>,
    /// Face presence score, if the detector reports one
    pub score: Option<f64>,
}

impl Detection {
    pub fn no_face() -> Self {
        Self::default()
    }

    pub fn has_face(&self) -> bool {
        self.landmarks.len() >= landmark_index::FACE_MESH_LEN
    }

    fn blendshape(&self, name: &str) -> f64 {
        self.blendshapes.get(name).copied().unwrap_or(0.0)
    }
}

/// Opaque landmark/blendshape detector
pub trait FaceDetector: Send + Sync {
    /// Run inference on one image. Treated as a bounded-latency call.
    fn detect(&self, frame: &CaptureFrame, timestamp_ms: f64) -> RehabResult<Detection>;
}

pub enum ModelState {
    Loading,
    Ready(Arc<dyn FaceDetector>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ModelStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Shared detector model, created once per process or session
pub struct DetectorResource {
    state: RwLock<ModelState>,
}

impl DetectorResource {
    pub fn loading() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(ModelState::Loading),
        })
    }

    pub fn ready(detector: Arc<dyn FaceDetector>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(ModelState::Ready(detector)),
        })
    }

    pub fn mark_ready(&self, detector: Arc<dyn FaceDetector>) {
        *self.state.write() = ModelState::Ready(detector);
        log::info!("Detector model ready");
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("Detector model failed to load: {}", reason);
        *self.state.write() = ModelState::Failed(reason);
    }

    pub fn status(&self) -> ModelStatus {
        match &*self.state.read() {
            ModelState::Loading => ModelStatus::Loading,
            ModelState::Ready(_) => ModelStatus::Ready,
            ModelState::Failed(reason) => ModelStatus::Failed(reason.clone()),
        }
    }

    pub fn detector(&self) -> Option<Arc<dyn FaceDetector>> {
        match &*self.state.read() {
            ModelState::Ready(detector) => Some(Arc::clone(detector)),
            _ => None,
        }
    }
}

/// Both-eye blink decision from blendshape scores. A blink is either strong
/// (mean above 0.5) or subtle (mean above 0.2 with both eyes closing together).
pub fn is_blink(left: f64, right: f64) -> bool {
    let avg = (left + right) / 2.0;
    let strong = avg > 0.5;
    let subtle = avg > 0.2 && (left - right).abs() < 0.2 && left > 0.1 && right > 0.1;
    strong || subtle
}

/// Converts detector output into raw (unsmoothed) frames
pub struct DetectorAdapter {
    resource: Arc<DetectorResource>,
    last_capture_ms: Option<f64>,
    last_result: Option<Frame>,
}

impl DetectorAdapter {
    pub fn new(resource: Arc<DetectorResource>) -> Self {
        Self {
            resource,
            last_capture_ms: None,
            last_result: None,
        }
    }

    /// Process one captured image. Returns `None` when the capture source
    /// reported no new data since the last call; nothing is updated then.
    pub fn process(&mut self, capture: &CaptureFrame) -> Option<Frame> {
        if self.last_capture_ms == Some(capture.timestamp_ms) {
            return None;
        }
        self.last_capture_ms = Some(capture.timestamp_ms);

        let previous = self.last_result.clone().unwrap_or_else(Frame::neutral);

        let frame = match self.resource.detector() {
            None => {
                log::debug!("Detector not ready ({:?}), re-emitting previous frame", self.resource.status());
                previous
            }
            Some(detector) => match detector.detect(capture, capture.timestamp_ms) {
                Ok(detection) if detection.has_face() => frame_from_detection(&detection),
                Ok(_) => Frame {
                    confidence: NO_FACE_CONFIDENCE,
                    blink_detected: false,
                    ..previous
                },
                Err(e) => {
                    log::warn!("Face detection failed, re-emitting previous frame: {}", e);
                    previous
                }
            },
        };

        self.last_result = Some(frame.clone());
        Some(frame)
    }

    /// Frame emitted while no capture stream is available
    pub fn unavailable_frame(&self) -> Frame {
        Frame {
            confidence: 0.0,
            blink_detected: false,
            ..self.last_result.clone().unwrap_or_else(Frame::neutral)
        }
    }
}

/// Build a frame from a detection that contains a face
pub fn frame_from_detection(detection: &Detection) -> Frame {
    use landmark_index::*;

    let lm = &detection.landmarks;
    let nose = lm[NOSE_TIP];
    let left_cheek = lm[LEFT_CHEEK];
    let right_cheek = lm[RIGHT_CHEEK];

    let face_width = (right_cheek.x - left_cheek.x).abs().max(1e-6);
    let cheek_mid = left_cheek.midpoint(right_cheek);
    let yaw = (nose.x - cheek_mid.x) / face_width * HEAD_POSE_SCALE;

    let eye_mid_y = (lm[LEFT_EYE_OUTER].y
        + lm[LEFT_EYE_INNER].y
        + lm[RIGHT_EYE_OUTER].y
        + lm[RIGHT_EYE_INNER].y)
        / 4.0;
    let pitch = ((nose.y - eye_mid_y) / face_width - NEUTRAL_NOSE_DROP) * HEAD_POSE_SCALE;

    let outer_left = lm[LEFT_EYE_OUTER];
    let outer_right = lm[RIGHT_EYE_OUTER];
    let roll = (outer_right.y - outer_left.y)
        .atan2(outer_right.x - outer_left.x)
        .to_degrees();

    let blink_left = detection.blendshape(blendshape::EYE_BLINK_LEFT);
    let blink_right = detection.blendshape(blendshape::EYE_BLINK_RIGHT);
    let smile_left = detection.blendshape(blendshape::MOUTH_SMILE_LEFT);
    let smile_right = detection.blendshape(blendshape::MOUTH_SMILE_RIGHT);

    let has_iris = lm.len() >= WITH_IRIS_LEN;
    let (left_pupil, right_pupil) = if has_iris {
        (lm[LEFT_IRIS], lm[RIGHT_IRIS])
    } else {
        (
            lm[LEFT_EYE_OUTER].midpoint(lm[LEFT_EYE_INNER]),
            lm[RIGHT_EYE_OUTER].midpoint(lm[RIGHT_EYE_INNER]),
        )
    };

    let left_eye = EyeLandmarkSet {
        pupil: left_pupil,
        upper_lid: lm[LEFT_EYE_UPPER],
        lower_lid: lm[LEFT_EYE_LOWER],
        inner_corner: lm[LEFT_EYE_INNER],
        outer_corner: lm[LEFT_EYE_OUTER],
    };
    let right_eye = EyeLandmarkSet {
        pupil: right_pupil,
        upper_lid: lm[RIGHT_EYE_UPPER],
        lower_lid: lm[RIGHT_EYE_LOWER],
        inner_corner: lm[RIGHT_EYE_INNER],
        outer_corner: lm[RIGHT_EYE_OUTER],
    };

    let (gl_x, gl_y) = eye_gaze(&left_eye);
    let (gr_x, gr_y) = eye_gaze(&right_eye);

    Frame {
        yaw,
        pitch,
        roll,
        eye_openness_left: unit(1.0 - blink_left),
        eye_openness_right: unit(1.0 - blink_right),
        mouth_symmetry: unit(1.0 - (smile_left - smile_right).abs()),
        gaze_x: (gl_x + gr_x) / 2.0,
        gaze_y: (gl_y + gr_y) / 2.0,
        blink_detected: is_blink(blink_left, blink_right),
        confidence: detection.score.unwrap_or(DEFAULT_FACE_CONFIDENCE),
        left_eye: Some(left_eye),
        right_eye: Some(right_eye),
    }
    .clamped()
}

/// Pupil position inside the eye opening, mapped to [-1, 1] on both axes
fn eye_gaze(eye: &EyeLandmarkSet) -> (f64, f64) {
    let normalize = |value: f64, a: f64, b: f64| {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let span = hi - lo;
        if span < 1e-6 {
            0.0
        } else {
            ((value - lo) / span * 2.0 - 1.0).clamp(-1.0, 1.0)
        }
    };
    (
        normalize(eye.pupil.x, eye.inner_corner.x, eye.outer_corner.x),
        normalize(eye.pupil.y, eye.upper_lid.y, eye.lower_lid.y),
    )
}

impl std::fmt::Debug for DetectorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorAdapter")
            .field("status", &self.resource.status())
            .field("last_capture_ms", &self.last_capture_ms)
            .finish()
    }
}

/// Error for detectors that have not produced any output
pub fn detection_error(message: impl Into<String>) -> RehabError {
    RehabError::Detection(message.into())
}
