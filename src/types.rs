use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Clamp a value into [0, 1]. NaN maps to 0.
#[inline]
pub fn unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[inline]
fn signed_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

/// Exponential interpolation from `prev` toward `raw`
#[inline]
pub fn blend(prev: f64, raw: f64, factor: f64) -> f64 {
    prev + (raw - prev) * factor
}

/// Normalized image-space point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn blend(self, raw: Point2, factor: f64) -> Self {
        Self::new(blend(self.x, raw.x, factor), blend(self.y, raw.y, factor))
    }

    pub fn clamp_unit(self) -> Self {
        Self::new(unit(self.x), unit(self.y))
    }

    pub fn midpoint(self, other: Point2) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Five named points around one eye, used for visualization only
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeLandmarkSet {
    pub pupil: Point2,
    pub upper_lid: Point2,
    pub lower_lid: Point2,
    pub inner_corner: Point2,
    pub outer_corner: Point2,
}

impl EyeLandmarkSet {
    pub fn blend(&self, raw: &EyeLandmarkSet, factor: f64) -> Self {
        Self {
            pupil: self.pupil.blend(raw.pupil, factor),
            upper_lid: self.upper_lid.blend(raw.upper_lid, factor),
            lower_lid: self.lower_lid.blend(raw.lower_lid, factor),
            inner_corner: self.inner_corner.blend(raw.inner_corner, factor),
            outer_corner: self.outer_corner.blend(raw.outer_corner, factor),
        }
    }

    pub fn points(&self) -> [Point2; 5] {
        [
            self.pupil,
            self.upper_lid,
            self.lower_lid,
            self.inner_corner,
            self.outer_corner,
        ]
    }
}

/// One facial-pose measurement, produced once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Degrees
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub eye_openness_left: f64,
    pub eye_openness_right: f64,
    pub mouth_symmetry: f64,
    /// [-1, 1]
    pub gaze_x: f64,
    pub gaze_y: f64,
    pub blink_detected: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_eye: Option<EyeLandmarkSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_eye: Option<EyeLandmarkSet>,
}

impl Frame {
    /// Centered head, open eyes, no confidence. Emitted before any real
    /// measurement exists.
    pub fn neutral() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            eye_openness_left: 1.0,
            eye_openness_right: 1.0,
            mouth_symmetry: 1.0,
            gaze_x: 0.0,
            gaze_y: 0.0,
            blink_detected: false,
            confidence: 0.0,
            left_eye: None,
            right_eye: None,
        }
    }

    /// Enforce the bounded ranges every frame must satisfy
    pub fn clamped(mut self) -> Self {
        self.eye_openness_left = unit(self.eye_openness_left);
        self.eye_openness_right = unit(self.eye_openness_right);
        self.mouth_symmetry = unit(self.mouth_symmetry);
        self.confidence = unit(self.confidence);
        self.gaze_x = signed_unit(self.gaze_x);
        self.gaze_y = signed_unit(self.gaze_y);
        self
    }

    /// Combined head deviation used by the stability scorer
    pub fn head_deviation(&self) -> f64 {
        self.yaw.abs() + self.pitch.abs()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Multipliers the synthetic generator applies for a profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileParams {
    pub head_stability_mult: f64,
    pub blink_rate_mult: f64,
    pub gaze_jitter: f64,
    pub asymmetry: f64,
    pub saccade_interval_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhysiologicalProfile {
    #[default]
    Healthy,
    Low,
    High,
}

impl PhysiologicalProfile {
    pub const ALL: [PhysiologicalProfile; 3] = [Self::Healthy, Self::Low, Self::High];

    pub fn params(self) -> ProfileParams {
        match self {
            Self::Healthy => ProfileParams {
                head_stability_mult: 1.0,
                blink_rate_mult: 1.0,
                gaze_jitter: 0.02,
                asymmetry: 0.0,
                saccade_interval_ms: 1800.0,
            },
            Self::Low => ProfileParams {
                head_stability_mult: 4.0,
                blink_rate_mult: 0.15,
                gaze_jitter: 0.12,
                asymmetry: 0.3,
                saccade_interval_ms: 1800.0,
            },
            Self::High => ProfileParams {
                head_stability_mult: 0.2,
                blink_rate_mult: 6.0,
                gaze_jitter: 0.01,
                asymmetry: 0.0,
                saccade_interval_ms: 800.0,
            },
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Healthy => "Typical adult baseline",
            Self::Low => "Reduced blinking, unstable head, facial droop",
            Self::High => "Hyperactive blinking and rapid saccades",
        }
    }
}

impl fmt::Display for PhysiologicalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Healthy => "healthy",
            Self::Low => "low",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

impl FromStr for PhysiologicalProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "healthy" | "normal" => Ok(Self::Healthy),
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            other => Err(format!(
                "Unknown profile '{}'. Expected one of: healthy, low, high",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseKind {
    FollowDot,
    BlinkTraining,
    HeadStability,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 3] = [Self::FollowDot, Self::BlinkTraining, Self::HeadStability];

    pub fn clinical_unit(self) -> &'static str {
        match self {
            Self::FollowDot => "%",
            Self::BlinkTraining => "BPM",
            Self::HeadStability => "%",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::FollowDot => "Follow the Dot",
            Self::BlinkTraining => "Blink Training",
            Self::HeadStability => "Head Stability",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FollowDot => "follow-dot",
            Self::BlinkTraining => "blink-training",
            Self::HeadStability => "head-stability",
        };
        f.write_str(name)
    }
}

impl FromStr for ExerciseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "follow-dot" | "followdot" | "gaze" => Ok(Self::FollowDot),
            "blink-training" | "blinktraining" | "blink" => Ok(Self::BlinkTraining),
            "head-stability" | "headstability" | "head" => Ok(Self::HeadStability),
            other => Err(format!(
                "Unknown exercise '{}'. Expected one of: follow-dot, blink-training, head-stability",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Idle,
    Playing,
    Finished,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClinicalStatus {
    Good,
    Warning,
    Critical,
}

/// Which frame producer the scheduler dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceMode {
    #[default]
    Synthetic,
    Detected,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
