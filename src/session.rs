// Exercise session state machine
//
// Idle -> Playing -> Finished, and back to Idle on restart. While playing the
// session runs a 1 Hz countdown and a 100 ms scoring sub-loop, both driven by
// the monotonic time the caller passes to `advance`. Reaching zero finishes
// the session and freezes its counters; the analysis is computed exactly once
// at that boundary.

use crate::analysis::{self, AnalysisBasis, MeasuredInputs, SessionAnalysis};
use crate::error::{RehabError, RehabResult};
use crate::scoring::{ScoringEngine, MAX_STABILITY, SCORING_TICK_MS};
use crate::types::{ExerciseKind, Frame, PhysiologicalProfile, Point2, SessionPhase};
use serde::Serialize;

const COUNTDOWN_TICK_MS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub exercise_kind: ExerciseKind,
    pub phase: SessionPhase,
    pub time_left_seconds: u32,
    pub score: f64,
    pub blink_count: u32,
    pub head_stability_score: f64,
}

impl SessionState {
    pub fn new(exercise_kind: ExerciseKind, duration_seconds: u32) -> Self {
        Self {
            exercise_kind,
            phase: SessionPhase::Idle,
            time_left_seconds: duration_seconds,
            score: 0.0,
            blink_count: 0,
            head_stability_score: MAX_STABILITY,
        }
    }
}

/// What happened during one `advance` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTick {
    /// Remaining seconds after each countdown step, in order
    pub countdown: Vec<u32>,
    /// Set when the countdown reached zero during this call
    pub finished: Option<SessionAnalysis>,
}

#[derive(Debug, Clone)]
pub struct ExerciseSession {
    state: SessionState,
    duration_seconds: u32,
    engine: ScoringEngine,
    basis: AnalysisBasis,
    seed: Option<u64>,
    latest: Option<Frame>,
    started_ms: f64,
    next_countdown_ms: f64,
    next_score_ms: f64,
    analysis: Option<SessionAnalysis>,
}

impl ExerciseSession {
    pub fn new(kind: ExerciseKind, duration_seconds: u32, seed: Option<u64>) -> Self {
        Self {
            state: SessionState::new(kind, duration_seconds),
            duration_seconds,
            engine: ScoringEngine::for_exercise(kind, seed),
            basis: AnalysisBasis::Demonstration(PhysiologicalProfile::Healthy),
            seed,
            latest: None,
            started_ms: 0.0,
            next_countdown_ms: 0.0,
            next_score_ms: 0.0,
            analysis: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn kind(&self) -> ExerciseKind {
        self.state.exercise_kind
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn basis(&self) -> AnalysisBasis {
        self.basis
    }

    /// Choose how the result will be computed when the session finishes
    pub fn set_basis(&mut self, basis: AnalysisBasis) {
        self.basis = basis;
    }

    /// Frozen result, once finished
    pub fn analysis(&self) -> Option<&SessionAnalysis> {
        self.analysis.as_ref()
    }

    /// Follow-dot target position, if the exercise has one
    pub fn target(&self) -> Option<Point2> {
        self.engine.target()
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.duration_seconds
            .saturating_sub(self.state.time_left_seconds)
    }

    pub fn start(&mut self, now_ms: f64) -> RehabResult<()> {
        self.require(SessionPhase::Idle, "start")?;

        self.started_ms = now_ms;
        self.next_countdown_ms = now_ms + COUNTDOWN_TICK_MS;
        self.next_score_ms = now_ms + SCORING_TICK_MS;
        self.state.phase = SessionPhase::Playing;
        log::info!(
            "{} session started ({}s)",
            self.state.exercise_kind.title(),
            self.duration_seconds
        );

        if self.duration_seconds == 0 {
            self.finish()?;
        }
        Ok(())
    }

    /// Deliver one published frame. Ignored unless playing.
    pub fn on_frame(&mut self, frame: &Frame, blink_started: bool) {
        if self.state.phase != SessionPhase::Playing {
            return;
        }
        if blink_started {
            self.state.blink_count += 1;
            self.engine.on_blink(&mut self.state);
        }
        self.latest = Some(frame.clone());
    }

    /// Run the scoring sub-loop and countdown up to `now_ms`
    pub fn advance(&mut self, now_ms: f64) -> SessionTick {
        let mut tick = SessionTick::default();
        if self.state.phase != SessionPhase::Playing {
            return tick;
        }

        let end_ms = self.started_ms + self.duration_seconds as f64 * COUNTDOWN_TICK_MS;

        while self.next_score_ms <= now_ms.min(end_ms) {
            let elapsed = self.next_score_ms - self.started_ms;
            self.engine
                .score_tick(&mut self.state, self.latest.as_ref(), elapsed);
            self.next_score_ms += SCORING_TICK_MS;
        }

        while self.next_countdown_ms <= now_ms && self.state.time_left_seconds > 0 {
            self.state.time_left_seconds -= 1;
            self.next_countdown_ms += COUNTDOWN_TICK_MS;
            tick.countdown.push(self.state.time_left_seconds);
        }

        if self.state.time_left_seconds == 0 {
            match self.finish() {
                Ok(analysis) => tick.finished = Some(analysis),
                Err(e) => log::error!("Failed to finish session: {}", e),
            }
        }
        tick
    }

    /// End the session now and compute its analysis
    pub fn finish(&mut self) -> RehabResult<SessionAnalysis> {
        self.require(SessionPhase::Playing, "finish")?;

        let inputs = MeasuredInputs {
            elapsed_seconds: self.elapsed_seconds() as f64,
            score: self.state.score,
            blink_count: self.state.blink_count,
            head_stability_score: self.state.head_stability_score,
        };
        let result = analysis::analyze(
            self.state.exercise_kind,
            self.basis,
            self.duration_seconds,
            inputs,
        );

        self.state.phase = SessionPhase::Finished;
        log::info!(
            "{} session finished: {} {} ({:?})",
            self.state.exercise_kind.title(),
            result.clinical_value,
            result.clinical_unit,
            result.status
        );
        self.analysis = Some(result.clone());
        Ok(result)
    }

    /// Back to Idle with fresh counters. Exercise kind and basis are kept.
    pub fn restart(&mut self) {
        self.state = SessionState::new(self.state.exercise_kind, self.duration_seconds);
        self.engine.reset();
        self.latest = None;
        self.analysis = None;
    }

    /// Replace the exercise; the session returns to Idle
    pub fn set_exercise(&mut self, kind: ExerciseKind) {
        if kind != self.state.exercise_kind {
            self.engine = ScoringEngine::for_exercise(kind, self.seed);
            self.state.exercise_kind = kind;
        }
        self.restart();
    }

    fn require(&self, phase: SessionPhase, action: &str) -> RehabResult<()> {
        if self.state.phase == phase {
            Ok(())
        } else {
            Err(RehabError::InvalidTransition {
                from: self.state.phase.to_string(),
                action: action.to_string(),
            })
        }
    }
}
