use crate::cli::{self, RunArgs};
use crate::exit_codes;
use oculo_rehab::collaborators::{
    Announcer, JsonReportSink, LogAnnouncer, NullAnnouncer, PatientInfo, ReportPayload,
    ReportSink, ScoreHistory,
};
use oculo_rehab::controller::{ControllerCommand, ControllerEvent, ExerciseController, RunSummary};
use oculo_rehab::source::{DetectorResource, NoCapture};
use oculo_rehab::RehabConfig;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn execute(args: RunArgs) -> i32 {
    let mut config = match RehabConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let kind = match cli::parse_exercise(&args.exercise) {
        Ok(k) => k,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if let Some(profile) = &args.profile {
        match cli::parse_profile(profile) {
            Ok(p) => config.profile = p,
            Err(msg) => {
                eprintln!("Error: {}", msg);
                return exit_codes::INPUT_ERROR;
            }
        }
    }
    if let Some(duration) = args.duration {
        if duration == 0 {
            eprintln!("Error: --duration must be at least 1 second");
            return exit_codes::INPUT_ERROR;
        }
        config.session_seconds = duration;
    }
    if args.repeat == 0 {
        eprintln!("Error: --repeat must be at least 1");
        return exit_codes::INPUT_ERROR;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let profile = config.profile;
    let history_len = config.history_len;
    let announcer: Arc<dyn Announcer> = if args.quiet {
        Arc::new(NullAnnouncer)
    } else {
        Arc::new(LogAnnouncer)
    };

    if !args.quiet {
        eprintln!(
            "Running {} ({} profile, {}s x{}{})...",
            kind.title(),
            profile,
            config.session_seconds,
            args.repeat,
            if args.realtime { ", realtime" } else { "" }
        );
    }

    // The command line has no camera; sessions run on the simulator
    let controller = ExerciseController::new(
        config,
        Arc::new(NoCapture),
        DetectorResource::loading(),
        kind,
        announcer,
    );

    let summary = if args.realtime {
        run_realtime(controller, args.repeat).await
    } else {
        controller
            .run_virtual_sessions(args.repeat, |_| {})
            .await
            .map_err(|e| e.to_string())
    };
    let summary = match summary {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let Some(analysis) = summary.analyses.last().cloned() else {
        eprintln!("Error: session ended without a result");
        return exit_codes::EXECUTION_ERROR;
    };

    if !args.quiet {
        eprintln!(
            "Finished: {} {} ({:?}) after {} frames",
            analysis.clinical_value, analysis.clinical_unit, analysis.status, summary.frames_published
        );
    }

    let mut history = ScoreHistory::new(history_len);
    for finished in &summary.analyses {
        history.record(kind, finished.score);
    }

    let patient = args.patient.map(PatientInfo::named).unwrap_or_default();
    let payload = ReportPayload::new(patient, analysis, history.recent(kind));

    let sink = match &args.output {
        Some(path) => JsonReportSink::to_file(path),
        None => JsonReportSink::stdout(),
    }
    .compact(args.compact);

    if let Err(e) = sink.submit(&payload) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    if !args.quiet {
        if let Some(path) = &args.output {
            eprintln!("Report written to {}", path);
        }
    }

    exit_codes::SUCCESS
}

/// Run on the wall clock, restarting until `sessions` have finished and then
/// shutting the controller down
async fn run_realtime(controller: ExerciseController, sessions: u32) -> Result<RunSummary, String> {
    let handle = controller.handle();
    handle
        .send(ControllerCommand::Start)
        .map_err(|e| e.to_string())?;
    let mut remaining = sessions.max(1);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(controller.run(tx));

    while let Some(event) = rx.recv().await {
        match event {
            ControllerEvent::Countdown { time_left_seconds } => {
                log::info!("{}s left", time_left_seconds);
            }
            ControllerEvent::BlinkCounted(count) => log::debug!("Blink #{}", count),
            ControllerEvent::Finished(_) => {
                remaining = remaining.saturating_sub(1);
                let next = if remaining == 0 {
                    vec![ControllerCommand::Shutdown]
                } else {
                    vec![ControllerCommand::Restart, ControllerCommand::Start]
                };
                for command in next {
                    handle.send(command).map_err(|e| e.to_string())?;
                }
            }
            _ => {}
        }
    }

    task.await
        .map_err(|e| format!("Controller task failed: {}", e))?
        .map_err(|e| e.to_string())
}
