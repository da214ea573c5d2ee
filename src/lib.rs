//! Real-time biometric signal pipeline and scoring engine for ocular
//! rehabilitation exercises.
//!
//! Frames come from one of two sources, the synthetic physiological
//! simulator or a camera-driven face detector, and flow one way:
//!
//! ```text
//! FrameSource -> SmoothingFilter -> BlinkEdgeDetector -> ExerciseSession -> SessionAnalysis
//! ```
//!
//! [`controller::ExerciseController`] owns the whole chain and is the only
//! writer of pipeline and session state.

pub mod analysis;
pub mod blink;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod source;
pub mod types;

pub use analysis::{AnalysisBasis, MeasuredInputs, SessionAnalysis};
pub use blink::BlinkEdgeDetector;
pub use config::{ConfigError, RehabConfig};
pub use controller::{
    ControllerCommand, ControllerEvent, ControllerHandle, ExerciseController, RunSummary,
};
pub use error::{RehabError, RehabResult};
pub use filter::SmoothingFilter;
pub use scheduler::{FrameScheduler, PipelineState, SchedulerConfig, TickOutcome};
pub use session::{ExerciseSession, SessionState};
pub use source::{FrameSource, SyntheticGenerator};
pub use types::{
    ClinicalStatus, ExerciseKind, EyeLandmarkSet, Frame, PhysiologicalProfile, Point2,
    ProfileParams, SessionPhase, SourceMode,
};
