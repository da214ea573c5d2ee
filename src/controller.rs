// Exercise controller - the single active producer
//
// The controller owns the frame scheduler and the exercise session and is the
// only code that mutates either. Each step:
// - applies queued commands (start, finish, mode/profile/exercise switches)
// - ticks the scheduler and feeds a published frame into the session
// - advances the session countdown and scoring sub-loop
// - returns the resulting events in order
//
// `run` drives steps from a tokio interval until cancelled or shut down, then
// deactivates the scheduler so the capture stream is released before it
// returns.

use crate::analysis::{AnalysisBasis, SessionAnalysis};
use crate::collaborators::Announcer;
use crate::config::RehabConfig;
use crate::error::{RehabError, RehabResult};
use crate::filter::SmoothingFilter;
use crate::scheduler::{FrameScheduler, SchedulerConfig, TickOutcome};
use crate::session::{ExerciseSession, SessionState};
use crate::source::{CaptureProvider, DetectorResource};
use crate::types::{ExerciseKind, Frame, PhysiologicalProfile, SessionPhase, SourceMode};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Last seconds of the countdown that are announced
const ANNOUNCE_COUNTDOWN_FROM: u32 = 3;

/// Commands accepted by the controller, applied at the start of the next step
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    Start,
    Finish,
    Restart,
    SetMode(SourceMode),
    SetProfile(PhysiologicalProfile),
    SetExercise(ExerciseKind),
    Shutdown,
}

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Frame(Frame),
    BlinkCounted(u32),
    Countdown { time_left_seconds: u32 },
    PhaseChanged(SessionPhase),
    Finished(SessionAnalysis),
    PermissionDenied(String),
    SourceExhausted,
}

/// Cloneable remote control for a controller, usable from other tasks
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<ControllerCommand>,
    cancel_token: CancellationToken,
}

impl ControllerHandle {
    pub fn send(&self, command: ControllerCommand) -> RehabResult<()> {
        self.commands
            .send(command)
            .map_err(|_| RehabError::ChannelClosed)
    }

    /// Stop the run loop immediately
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub frames_published: u64,
    pub analyses: Vec<SessionAnalysis>,
    pub final_state: SessionState,
    pub cancelled: bool,
}

pub struct ExerciseController {
    config: RehabConfig,
    scheduler: FrameScheduler,
    session: ExerciseSession,
    announcer: Arc<dyn Announcer>,
    commands_tx: mpsc::UnboundedSender<ControllerCommand>,
    commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    cancel_token: CancellationToken,
    analyses: Vec<SessionAnalysis>,
    shutdown: bool,
}

impl ExerciseController {
    pub fn new(
        config: RehabConfig,
        capture: Arc<dyn CaptureProvider>,
        detector: Arc<DetectorResource>,
        kind: ExerciseKind,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        let scheduler = FrameScheduler::new(
            SchedulerConfig {
                profile: config.profile,
                filter: SmoothingFilter::new(config.pose_smoothing, config.landmark_smoothing),
                detector_interval_ms: config.detector_interval_ms,
                seed: config.seed,
            },
            capture,
            detector,
        );

        let mut session = ExerciseSession::new(kind, config.session_seconds, config.seed);
        session.set_basis(AnalysisBasis::Demonstration(config.profile));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Self {
            config,
            scheduler,
            session,
            announcer,
            commands_tx,
            commands_rx,
            cancel_token: CancellationToken::new(),
            analyses: Vec::new(),
            shutdown: false,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            commands: self.commands_tx.clone(),
            cancel_token: self.cancel_token.clone(),
        }
    }

    pub fn session(&self) -> &ExerciseSession {
        &self.session
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// One iteration at monotonic time `now_ms`
    pub async fn step(&mut self, now_ms: f64) -> Vec<ControllerEvent> {
        let mut events = Vec::new();

        while let Ok(command) = self.commands_rx.try_recv() {
            self.apply(command, now_ms, &mut events).await;
        }
        if self.shutdown {
            return events;
        }

        match self.scheduler.tick(now_ms) {
            TickOutcome::Published {
                frame,
                blink_started,
            } => {
                let counted = blink_started && self.session.phase() == SessionPhase::Playing;
                self.session.on_frame(&frame, blink_started);
                if counted {
                    events.push(ControllerEvent::BlinkCounted(self.session.state().blink_count));
                }
                events.push(ControllerEvent::Frame(frame));
            }
            TickOutcome::Exhausted => events.push(ControllerEvent::SourceExhausted),
            TickOutcome::Throttled | TickOutcome::Duplicate | TickOutcome::Inactive => {}
        }

        let tick = self.session.advance(now_ms);
        for time_left_seconds in tick.countdown {
            if (1..=ANNOUNCE_COUNTDOWN_FROM).contains(&time_left_seconds) {
                self.announcer.announce(&time_left_seconds.to_string());
            }
            events.push(ControllerEvent::Countdown { time_left_seconds });
        }
        if let Some(analysis) = tick.finished {
            self.on_finished(analysis, &mut events);
        }

        events
    }

    async fn apply(
        &mut self,
        command: ControllerCommand,
        now_ms: f64,
        events: &mut Vec<ControllerEvent>,
    ) {
        log::debug!("Applying command: {:?}", command);
        match command {
            ControllerCommand::Start => match self.session.start(now_ms) {
                Ok(()) => {
                    self.announcer
                        .announce(&format!("Starting {}", self.session.kind().title()));
                    events.push(ControllerEvent::PhaseChanged(SessionPhase::Playing));
                    // Zero-length sessions finish immediately
                    if let Some(analysis) = self.session.analysis().cloned() {
                        self.on_finished(analysis, events);
                    }
                }
                Err(e) => log::warn!("{}", e),
            },
            ControllerCommand::Finish => match self.session.finish() {
                Ok(analysis) => self.on_finished(analysis, events),
                Err(e) => log::warn!("{}", e),
            },
            ControllerCommand::Restart => {
                self.session.restart();
                events.push(ControllerEvent::PhaseChanged(SessionPhase::Idle));
            }
            ControllerCommand::SetProfile(profile) => {
                self.config.profile = profile;
                self.scheduler.set_profile(profile);
                self.session.set_basis(self.basis());
            }
            ControllerCommand::SetMode(mode) => {
                self.reset_if_playing(events);
                if let Err(e) = self.scheduler.set_mode(mode).await {
                    log::error!("Failed to switch frame source to {}: {}", mode, e);
                }
                if let Some(reason) = self.scheduler.permission_denied() {
                    events.push(ControllerEvent::PermissionDenied(reason.to_string()));
                }
                self.session.set_basis(self.basis());
            }
            ControllerCommand::SetExercise(kind) => {
                // Releases capture before the new exercise re-acquires it
                self.scheduler.deactivate();
                self.session.set_exercise(kind);
                events.push(ControllerEvent::PhaseChanged(SessionPhase::Idle));
                if let Err(e) = self.scheduler.activate().await {
                    log::error!("Failed to reactivate frame source: {}", e);
                }
            }
            ControllerCommand::Shutdown => {
                self.shutdown = true;
                self.scheduler.deactivate();
            }
        }
    }

    fn basis(&self) -> AnalysisBasis {
        match self.scheduler.mode() {
            SourceMode::Synthetic => AnalysisBasis::Demonstration(self.config.profile),
            SourceMode::Detected => AnalysisBasis::Measured,
        }
    }

    fn reset_if_playing(&mut self, events: &mut Vec<ControllerEvent>) {
        if self.session.phase() == SessionPhase::Playing {
            log::info!("Session reset by source switch");
            self.session.restart();
            events.push(ControllerEvent::PhaseChanged(SessionPhase::Idle));
        }
    }

    fn on_finished(&mut self, analysis: SessionAnalysis, events: &mut Vec<ControllerEvent>) {
        self.announcer.announce(&format!(
            "Exercise complete. {} {}",
            analysis.clinical_value, analysis.clinical_unit
        ));
        events.push(ControllerEvent::PhaseChanged(SessionPhase::Finished));
        events.push(ControllerEvent::Finished(analysis.clone()));
        self.analyses.push(analysis);
    }

    fn summary(&self, cancelled: bool) -> RunSummary {
        RunSummary {
            frames_published: self.scheduler.state().processed_frames,
            analyses: self.analyses.clone(),
            final_state: self.session.state().clone(),
            cancelled,
        }
    }

    /// Drive steps on the wall clock until cancelled or shut down
    pub async fn run(
        mut self,
        events: mpsc::UnboundedSender<ControllerEvent>,
    ) -> RehabResult<RunSummary> {
        let mut ticker = interval(Duration::from_millis(self.config.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let origin = Instant::now();
        let cancel_token = self.cancel_token.clone();
        let mut cancelled = false;

        log::info!(
            "Controller loop started ({}ms ticks, {})",
            self.config.tick_ms,
            self.session.kind()
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    log::info!("Controller loop cancelled");
                    cancelled = true;
                    break;
                }

                _ = ticker.tick() => {
                    let now_ms = origin.elapsed().as_secs_f64() * 1000.0;
                    for event in self.step(now_ms).await {
                        if events.send(event).is_err() {
                            log::debug!("Event receiver dropped");
                        }
                    }
                    if self.shutdown {
                        break;
                    }
                }
            }
        }

        self.scheduler.deactivate();
        Ok(self.summary(cancelled))
    }

    /// Run one session on a virtual clock, as fast as possible. Starts the
    /// session and steps until it finishes. The event callback sees every
    /// event in order.
    pub async fn run_virtual<F>(self, on_event: F) -> RehabResult<RunSummary>
    where
        F: FnMut(&ControllerEvent),
    {
        self.run_virtual_sessions(1, on_event).await
    }

    /// Run `sessions` back-to-back sessions on one virtual clock, restarting
    /// between them. Each finished session adds one analysis to the summary.
    pub async fn run_virtual_sessions<F>(
        mut self,
        sessions: u32,
        mut on_event: F,
    ) -> RehabResult<RunSummary>
    where
        F: FnMut(&ControllerEvent),
    {
        let tick_ms = self.config.tick_ms as f64;
        // One extra second of slack past the configured duration
        let session_ms = (self.config.session_seconds as f64 + 1.0) * 1000.0;

        let mut now_ms = 0.0;
        for round in 0..sessions.max(1) {
            if round > 0 {
                self.enqueue(ControllerCommand::Restart)?;
            }
            self.enqueue(ControllerCommand::Start)?;

            let deadline = now_ms + session_ms;
            while now_ms <= deadline && !self.shutdown {
                let events = self.step(now_ms).await;
                let finished = events
                    .iter()
                    .any(|e| matches!(e, ControllerEvent::Finished(_)));
                events.iter().for_each(&mut on_event);
                now_ms += tick_ms;
                if finished {
                    break;
                }
            }
            if self.shutdown {
                break;
            }
        }

        self.scheduler.deactivate();
        Ok(self.summary(false))
    }

    fn enqueue(&self, command: ControllerCommand) -> RehabResult<()> {
        self.commands_tx
            .send(command)
            .map_err(|_| RehabError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NullAnnouncer;
    use crate::source::detector::tests::{detection, FixedDetector};
    use crate::source::tests::ScriptedCapture;
    use crate::source::NoCapture;
    use crate::types::ClinicalStatus;
    use parking_lot::Mutex;
    use std::sync::atomic::Ordering;

    #[derive(Default)]
    struct RecordingAnnouncer {
        lines: Mutex<Vec<String>>,
    }

    impl Announcer for RecordingAnnouncer {
        fn announce(&self, text: &str) {
            self.lines.lock().push(text.to_string());
        }
    }

    fn config(seconds: u32, profile: PhysiologicalProfile) -> RehabConfig {
        RehabConfig {
            session_seconds: seconds,
            profile,
            seed: Some(7),
            ..Default::default()
        }
    }

    fn synthetic(kind: ExerciseKind, seconds: u32, profile: PhysiologicalProfile) -> ExerciseController {
        ExerciseController::new(
            config(seconds, profile),
            Arc::new(NoCapture),
            DetectorResource::loading(),
            kind,
            Arc::new(NullAnnouncer),
        )
    }

    #[tokio::test]
    async fn test_synthetic_session_uses_demo_table() {
        let controller = synthetic(ExerciseKind::BlinkTraining, 60, PhysiologicalProfile::Low);
        let summary = controller.run_virtual(|_| {}).await.unwrap();

        assert_eq!(summary.analyses.len(), 1);
        let analysis = &summary.analyses[0];
        assert_eq!(analysis.clinical_value, 6.0);
        assert_eq!(analysis.clinical_unit, "BPM");
        assert_eq!(analysis.status, ClinicalStatus::Warning);
        assert_eq!(
            analysis.notes,
            vec!["Severe Dry Eye Risk", "Incomplete Blink Pattern"]
        );
        assert_eq!(summary.final_state.phase, SessionPhase::Finished);
        assert_eq!(summary.final_state.time_left_seconds, 0);
    }

    #[tokio::test]
    async fn test_repeated_sessions_restart_between_runs() {
        let controller = synthetic(ExerciseKind::HeadStability, 2, PhysiologicalProfile::Healthy);
        let mut phases = Vec::new();
        let summary = controller
            .run_virtual_sessions(3, |event| {
                if let ControllerEvent::PhaseChanged(phase) = event {
                    phases.push(*phase);
                }
            })
            .await
            .unwrap();

        assert_eq!(summary.analyses.len(), 3);
        assert!(summary.analyses.iter().all(|a| a.clinical_value == 92.0));
        assert_eq!(
            phases,
            vec![
                SessionPhase::Playing,
                SessionPhase::Finished,
                SessionPhase::Idle,
                SessionPhase::Playing,
                SessionPhase::Finished,
                SessionPhase::Idle,
                SessionPhase::Playing,
                SessionPhase::Finished,
            ]
        );
        assert_eq!(summary.final_state.phase, SessionPhase::Finished);
    }

    #[tokio::test]
    async fn test_event_order_for_short_session() {
        let controller = synthetic(ExerciseKind::HeadStability, 3, PhysiologicalProfile::Healthy);
        let mut countdown = Vec::new();
        let mut phases = Vec::new();
        let mut frames = 0;
        controller
            .run_virtual(|event| match event {
                ControllerEvent::Countdown { time_left_seconds } => countdown.push(*time_left_seconds),
                ControllerEvent::PhaseChanged(phase) => phases.push(*phase),
                ControllerEvent::Frame(_) => frames += 1,
                _ => {}
            })
            .await
            .unwrap();

        assert_eq!(countdown, vec![2, 1, 0]);
        assert_eq!(phases, vec![SessionPhase::Playing, SessionPhase::Finished]);
        assert!(frames > 100);
    }

    #[tokio::test]
    async fn test_blinks_counted_monotonically() {
        let controller = synthetic(ExerciseKind::BlinkTraining, 20, PhysiologicalProfile::High);
        let mut counts = Vec::new();
        let summary = controller
            .run_virtual(|event| {
                if let ControllerEvent::BlinkCounted(n) = event {
                    counts.push(*n);
                }
            })
            .await
            .unwrap();

        assert!(!counts.is_empty());
        assert!(counts.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(summary.final_state.blink_count, *counts.last().unwrap());
    }

    #[tokio::test]
    async fn test_announces_start_countdown_and_result() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let controller = ExerciseController::new(
            config(5, PhysiologicalProfile::Healthy),
            Arc::new(NoCapture),
            DetectorResource::loading(),
            ExerciseKind::FollowDot,
            announcer.clone(),
        );
        controller.run_virtual(|_| {}).await.unwrap();

        let lines = announcer.lines.lock().clone();
        assert_eq!(lines.first().map(String::as_str), Some("Starting Follow the Dot"));
        assert!(lines.contains(&"3".to_string()));
        assert!(lines.contains(&"1".to_string()));
        assert!(!lines.contains(&"4".to_string()));
        assert!(lines.last().unwrap().contains("94"));
    }

    #[tokio::test]
    async fn test_mode_switch_while_playing_resets_session() {
        let capture = ScriptedCapture::endless();
        let mut controller = ExerciseController::new(
            config(60, PhysiologicalProfile::Healthy),
            capture.clone(),
            DetectorResource::ready(FixedDetector::new(Ok(detection(0.0, 0.0)))),
            ExerciseKind::FollowDot,
            Arc::new(NullAnnouncer),
        );
        let handle = controller.handle();

        handle.send(ControllerCommand::Start).unwrap();
        controller.step(0.0).await;
        controller.step(500.0).await;
        assert_eq!(controller.session().phase(), SessionPhase::Playing);

        handle
            .send(ControllerCommand::SetMode(SourceMode::Detected))
            .unwrap();
        let events = controller.step(600.0).await;
        assert!(events.contains(&ControllerEvent::PhaseChanged(SessionPhase::Idle)));
        assert_eq!(controller.session().phase(), SessionPhase::Idle);
        assert_eq!(controller.scheduler().mode(), SourceMode::Detected);
        assert_eq!(controller.session().basis(), AnalysisBasis::Measured);

        handle.send(ControllerCommand::Shutdown).unwrap();
        controller.step(700.0).await;
        assert!(controller.is_shutdown());
        assert_eq!(capture.released.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_denied_capture_reported() {
        let mut controller = ExerciseController::new(
            config(60, PhysiologicalProfile::Healthy),
            ScriptedCapture::denied(),
            DetectorResource::loading(),
            ExerciseKind::HeadStability,
            Arc::new(NullAnnouncer),
        );
        controller
            .handle()
            .send(ControllerCommand::SetMode(SourceMode::Detected))
            .unwrap();

        let events = controller.step(0.0).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, ControllerEvent::PermissionDenied(_))));
        let frame = events.iter().find_map(|e| match e {
            ControllerEvent::Frame(f) => Some(f.clone()),
            _ => None,
        });
        assert_eq!(frame.map(|f| f.confidence), Some(0.0));
    }

    #[tokio::test]
    async fn test_exercise_switch_releases_capture() {
        let capture = ScriptedCapture::endless();
        let mut controller = ExerciseController::new(
            config(60, PhysiologicalProfile::Healthy),
            capture.clone(),
            DetectorResource::ready(FixedDetector::new(Ok(detection(0.0, 0.0)))),
            ExerciseKind::FollowDot,
            Arc::new(NullAnnouncer),
        );
        let handle = controller.handle();
        handle
            .send(ControllerCommand::SetMode(SourceMode::Detected))
            .unwrap();
        controller.step(0.0).await;

        handle
            .send(ControllerCommand::SetExercise(ExerciseKind::BlinkTraining))
            .unwrap();
        controller.step(100.0).await;

        assert_eq!(capture.released.load(Ordering::Relaxed), 1);
        assert_eq!(controller.session().kind(), ExerciseKind::BlinkTraining);
        assert_eq!(controller.scheduler().mode(), SourceMode::Detected);
        assert!(controller.scheduler().is_active());
    }

    #[tokio::test]
    async fn test_restart_after_finish() {
        let mut controller = synthetic(ExerciseKind::HeadStability, 30, PhysiologicalProfile::Low);
        let handle = controller.handle();

        handle.send(ControllerCommand::Start).unwrap();
        controller.step(0.0).await;
        handle.send(ControllerCommand::Finish).unwrap();
        let events = controller.step(2000.0).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, ControllerEvent::Finished(a) if a.status == ClinicalStatus::Critical)));

        handle.send(ControllerCommand::Restart).unwrap();
        controller.step(2100.0).await;
        let state = controller.session().state();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert_eq!(state.head_stability_score, 100.0);
        assert_eq!(state.time_left_seconds, 30);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let capture = ScriptedCapture::endless();
        let mut controller = ExerciseController::new(
            RehabConfig {
                tick_ms: 1,
                ..config(60, PhysiologicalProfile::Healthy)
            },
            capture.clone(),
            DetectorResource::ready(FixedDetector::new(Ok(detection(0.0, 0.0)))),
            ExerciseKind::FollowDot,
            Arc::new(NullAnnouncer),
        );
        let handle = controller.handle();
        handle
            .send(ControllerCommand::SetMode(SourceMode::Detected))
            .unwrap();
        controller.step(0.0).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(controller.run(tx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
        let summary = task.await.unwrap().unwrap();

        assert!(summary.cancelled);
        assert_eq!(capture.released.load(Ordering::Relaxed), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let controller = synthetic(ExerciseKind::FollowDot, 60, PhysiologicalProfile::Healthy);
        let handle = controller.handle();
        handle.send(ControllerCommand::Shutdown).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let summary = controller.run(tx).await.unwrap();
        assert!(!summary.cancelled);
        assert!(handle.send(ControllerCommand::Start).is_err());
    }
}
