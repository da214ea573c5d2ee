//! Clinical analysis synthesis
//!
//! A finished session is summarized as a [`SessionAnalysis`]. Two paths exist:
//!
//! - **Demonstration**: synthetic sessions look up a fixed result per
//!   exercise and profile, so a demo always tells the same clinical story.
//! - **Measured**: detector sessions derive the clinical value from the
//!   session counters and grade it against fixed thresholds.
//!
//! Analyses are created once and never mutated.

use crate::types::{ClinicalStatus, ExerciseKind, PhysiologicalProfile};
use serde::{Deserialize, Serialize};

/// Normal resting blink rate range (blinks per minute)
pub const NORMAL_BPM: (f64, f64) = (10.0, 30.0);
pub const STABILITY_CRITICAL: f64 = 60.0;
pub const STABILITY_WARNING: f64 = 80.0;
pub const ACCURACY_CRITICAL: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAnalysis {
    pub exercise_kind: ExerciseKind,
    pub duration_seconds: u32,
    pub score: f64,
    pub clinical_value: f64,
    pub clinical_unit: String,
    pub status: ClinicalStatus,
    pub recommendation: String,
    pub notes: Vec<String>,
}

/// Session counters the measured path works from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredInputs {
    pub elapsed_seconds: f64,
    pub score: f64,
    pub blink_count: u32,
    pub head_stability_score: f64,
}

/// How a finished session is turned into a clinical result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisBasis {
    Demonstration(PhysiologicalProfile),
    Measured,
}

struct DemoEntry {
    value: f64,
    status: ClinicalStatus,
    recommendation: &'static str,
    notes: [&'static str; 2],
}

fn demo_entry(kind: ExerciseKind, profile: PhysiologicalProfile) -> DemoEntry {
    use ClinicalStatus::*;
    use ExerciseKind::*;
    use PhysiologicalProfile::*;

    match (kind, profile) {
        (FollowDot, Healthy) => DemoEntry {
            value: 94.0,
            status: Good,
            recommendation: "Oculomotor tracking within normal limits. Continue routine exercises.",
            notes: ["Smooth Pursuit Intact", "Accurate Saccade Targeting"],
        },
        (FollowDot, Low) => DemoEntry {
            value: 42.0,
            status: Critical,
            recommendation: "Tracking accuracy markedly reduced. Refer for neuro-ophthalmic assessment.",
            notes: ["Saccadic Intrusions", "Gaze Fixation Loss"],
        },
        (FollowDot, High) => DemoEntry {
            value: 71.0,
            status: Warning,
            recommendation: "Saccades overshoot the target. Practice slow pursuit drills daily.",
            notes: ["Hypermetric Saccades", "Overshoot Corrections"],
        },
        (BlinkTraining, Healthy) => DemoEntry {
            value: 17.0,
            status: Good,
            recommendation: "Blink rate is healthy. No intervention needed.",
            notes: ["Normal Blink Rate", "Complete Lid Closure"],
        },
        (BlinkTraining, Low) => DemoEntry {
            value: 6.0,
            status: Warning,
            recommendation: "Blink rate well below normal. Use lubricating drops and take screen breaks.",
            notes: ["Severe Dry Eye Risk", "Incomplete Blink Pattern"],
        },
        (BlinkTraining, High) => DemoEntry {
            value: 38.0,
            status: Warning,
            recommendation: "Blink rate elevated. Check for ocular surface irritation or fatigue.",
            notes: ["Excessive Blinking", "Possible Ocular Irritation"],
        },
        (HeadStability, Healthy) => DemoEntry {
            value: 92.0,
            status: Good,
            recommendation: "Head posture is stable. Continue balance training as planned.",
            notes: ["Stable Head Posture", "Normal Vestibular Control"],
        },
        (HeadStability, Low) => DemoEntry {
            value: 45.0,
            status: Critical,
            recommendation: "Marked postural sway. Refer for vestibular rehabilitation.",
            notes: ["Significant Postural Sway", "Vestibular Compensation Deficit"],
        },
        (HeadStability, High) => DemoEntry {
            value: 97.0,
            status: Good,
            recommendation: "Very little head movement. Add gentle neck mobility work.",
            notes: ["Minimal Head Movement", "Possible Neck Rigidity"],
        },
    }
}

/// Fixed result for a synthetic session
pub fn demonstration(
    kind: ExerciseKind,
    profile: PhysiologicalProfile,
    duration_seconds: u32,
    score: f64,
) -> SessionAnalysis {
    let entry = demo_entry(kind, profile);
    SessionAnalysis {
        exercise_kind: kind,
        duration_seconds,
        score,
        clinical_value: entry.value,
        clinical_unit: kind.clinical_unit().to_string(),
        status: entry.status,
        recommendation: entry.recommendation.to_string(),
        notes: entry.notes.iter().map(|n| n.to_string()).collect(),
    }
}

/// Result computed from a detector session's counters
pub fn measured(kind: ExerciseKind, duration_seconds: u32, inputs: MeasuredInputs) -> SessionAnalysis {
    let (value, status, recommendation, notes) = match kind {
        ExerciseKind::BlinkTraining => {
            let minutes = (inputs.elapsed_seconds / 60.0).max(1.0);
            let bpm = inputs.blink_count as f64 / minutes;
            let value = (bpm * 10.0).round() / 10.0;
            if bpm < NORMAL_BPM.0 {
                (
                    value,
                    ClinicalStatus::Warning,
                    "Blink rate below normal. Practice deliberate full blinks.",
                    vec!["Reduced Blink Rate"],
                )
            } else if bpm > NORMAL_BPM.1 {
                (
                    value,
                    ClinicalStatus::Warning,
                    "Blink rate above normal. Rest the eyes and re-test.",
                    vec!["Elevated Blink Rate"],
                )
            } else {
                (
                    value,
                    ClinicalStatus::Good,
                    "Blink rate within normal range.",
                    vec!["Normal Blink Rate"],
                )
            }
        }
        ExerciseKind::HeadStability => {
            let stability = inputs.head_stability_score.round();
            if stability < STABILITY_CRITICAL {
                (
                    stability,
                    ClinicalStatus::Critical,
                    "Head stability poor. Refer for vestibular assessment.",
                    vec!["Significant Postural Sway"],
                )
            } else if stability < STABILITY_WARNING {
                (
                    stability,
                    ClinicalStatus::Warning,
                    "Head stability reduced. Continue stabilization exercises.",
                    vec!["Mild Postural Sway"],
                )
            } else {
                (
                    stability,
                    ClinicalStatus::Good,
                    "Head stability within normal limits.",
                    vec!["Stable Head Posture"],
                )
            }
        }
        ExerciseKind::FollowDot => {
            let seconds = inputs.elapsed_seconds.max(1.0);
            let accuracy = (inputs.score / (seconds * 10.0) * 100.0).round().min(100.0);
            if accuracy < ACCURACY_CRITICAL {
                (
                    accuracy,
                    ClinicalStatus::Critical,
                    "Tracking accuracy low. Repeat with good lighting and refer if persistent.",
                    vec!["Gaze Fixation Loss"],
                )
            } else {
                (
                    accuracy,
                    ClinicalStatus::Good,
                    "Tracking accuracy within normal limits.",
                    vec!["Smooth Pursuit Intact"],
                )
            }
        }
    };

    SessionAnalysis {
        exercise_kind: kind,
        duration_seconds,
        score: inputs.score,
        clinical_value: value,
        clinical_unit: kind.clinical_unit().to_string(),
        status,
        recommendation: recommendation.to_string(),
        notes: notes.into_iter().map(String::from).collect(),
    }
}

/// Dispatch on the analysis basis
pub fn analyze(
    kind: ExerciseKind,
    basis: AnalysisBasis,
    duration_seconds: u32,
    inputs: MeasuredInputs,
) -> SessionAnalysis {
    match basis {
        AnalysisBasis::Demonstration(profile) => {
            demonstration(kind, profile, duration_seconds, inputs.score)
        }
        AnalysisBasis::Measured => measured(kind, duration_seconds, inputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(elapsed_seconds: f64, score: f64, blinks: u32, stability: f64) -> MeasuredInputs {
        MeasuredInputs {
            elapsed_seconds,
            score,
            blink_count: blinks,
            head_stability_score: stability,
        }
    }

    #[test]
    fn test_blink_training_low_demo() {
        let analysis = demonstration(
            ExerciseKind::BlinkTraining,
            PhysiologicalProfile::Low,
            60,
            2.0,
        );
        assert_eq!(analysis.clinical_value, 6.0);
        assert_eq!(analysis.clinical_unit, "BPM");
        assert_eq!(analysis.status, ClinicalStatus::Warning);
        assert_eq!(
            analysis.notes,
            vec!["Severe Dry Eye Risk", "Incomplete Blink Pattern"]
        );
    }

    #[test]
    fn test_every_demo_entry_has_two_notes() {
        for kind in ExerciseKind::ALL {
            for profile in PhysiologicalProfile::ALL {
                let analysis = demonstration(kind, profile, 60, 0.0);
                assert_eq!(analysis.notes.len(), 2);
                assert_eq!(analysis.clinical_unit, kind.clinical_unit());
            }
        }
    }

    #[test]
    fn test_head_stability_thresholds() {
        let grade = |h| measured(ExerciseKind::HeadStability, 30, inputs(30.0, 0.0, 0, h)).status;
        assert_eq!(grade(45.0), ClinicalStatus::Critical);
        assert_eq!(grade(59.4), ClinicalStatus::Critical);
        assert_eq!(grade(60.0), ClinicalStatus::Warning);
        assert_eq!(grade(79.0), ClinicalStatus::Warning);
        assert_eq!(grade(80.0), ClinicalStatus::Good);
    }

    #[test]
    fn test_follow_dot_accuracy_capped() {
        let analysis = measured(ExerciseKind::FollowDot, 60, inputs(45.0, 450.0, 0, 100.0));
        assert_eq!(analysis.clinical_value, 100.0);
        assert_eq!(analysis.status, ClinicalStatus::Good);

        let analysis = measured(ExerciseKind::FollowDot, 60, inputs(10.0, 200.0, 0, 100.0));
        assert_eq!(analysis.clinical_value, 100.0);

        let analysis = measured(ExerciseKind::FollowDot, 60, inputs(40.0, 120.0, 0, 100.0));
        assert_eq!(analysis.clinical_value, 30.0);
        assert_eq!(analysis.status, ClinicalStatus::Critical);
    }

    #[test]
    fn test_bpm_floors_elapsed_at_one_minute() {
        // 8 blinks in 20 s counts as 8 BPM, not 24
        let analysis = measured(ExerciseKind::BlinkTraining, 60, inputs(20.0, 8.0, 8, 100.0));
        assert_eq!(analysis.clinical_value, 8.0);
        assert_eq!(analysis.status, ClinicalStatus::Warning);

        let analysis = measured(ExerciseKind::BlinkTraining, 120, inputs(120.0, 36.0, 36, 100.0));
        assert_eq!(analysis.clinical_value, 18.0);
        assert_eq!(analysis.status, ClinicalStatus::Good);

        let analysis = measured(ExerciseKind::BlinkTraining, 60, inputs(60.0, 31.0, 31, 100.0));
        assert_eq!(analysis.status, ClinicalStatus::Warning);
    }

    #[test]
    fn test_bpm_graded_before_rounding() {
        let grade = |blinks| measured(ExerciseKind::BlinkTraining, 120, inputs(120.0, 0.0, blinks, 100.0));

        let slow = grade(19);
        assert_eq!(slow.clinical_value, 9.5);
        assert_eq!(slow.status, ClinicalStatus::Warning);

        let fast = grade(61);
        assert_eq!(fast.clinical_value, 30.5);
        assert_eq!(fast.status, ClinicalStatus::Warning);

        assert_eq!(grade(20).status, ClinicalStatus::Good);
        assert_eq!(grade(60).status, ClinicalStatus::Good);

        // 10 blinks in 90 s is 6.67 BPM, reported to one decimal
        let analysis = measured(ExerciseKind::BlinkTraining, 90, inputs(90.0, 0.0, 10, 100.0));
        assert_eq!(analysis.clinical_value, 6.7);
    }

    #[test]
    fn test_follow_dot_zero_elapsed_does_not_divide_by_zero() {
        let analysis = measured(ExerciseKind::FollowDot, 60, inputs(0.0, 0.0, 0, 100.0));
        assert_eq!(analysis.clinical_value, 0.0);
        assert!(analysis.clinical_value.is_finite());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(demonstration(
            ExerciseKind::HeadStability,
            PhysiologicalProfile::High,
            30,
            97.0,
        ))
        .unwrap();
        assert_eq!(json["clinicalUnit"], "%");
        assert_eq!(json["exerciseKind"], "HeadStability");
        assert_eq!(json["status"], "Good");
    }
}
