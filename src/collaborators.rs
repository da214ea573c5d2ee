// External collaborators
//
// The core hands results to two outside parties: an announcer that speaks
// short status lines, and a report sink that receives the finished analysis
// with patient metadata and recent score history. Both are fire-and-forget
// from the core's point of view.

use crate::analysis::SessionAnalysis;
use crate::error::RehabResult;
use crate::types::ExerciseKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

/// Best-effort text announcements. Implementations must not block.
pub trait Announcer: Send + Sync {
    fn announce(&self, text: &str);
}

/// Writes announcements to the log at info level
#[derive(Debug, Default, Clone)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, text: &str) {
        log::info!("[announce] {}", text);
    }
}

#[derive(Debug, Default, Clone)]
pub struct NullAnnouncer;

impl Announcer for NullAnnouncer {
    fn announce(&self, _text: &str) {}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: Option<String>,
    pub patient_id: Option<String>,
    pub notes: Option<String>,
}

impl PatientInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Everything handed to a report sink for one finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub patient: PatientInfo,
    pub analysis: SessionAnalysis,
    /// Oldest first, including this session's score
    pub score_history: Vec<f64>,
}

impl ReportPayload {
    pub fn new(patient: PatientInfo, analysis: SessionAnalysis, score_history: Vec<f64>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            patient,
            analysis,
            score_history,
        }
    }
}

pub trait ReportSink: Send + Sync {
    fn submit(&self, payload: &ReportPayload) -> RehabResult<()>;
}

/// Writes the payload as JSON to a file, or stdout when no path is set
#[derive(Debug, Clone, Default)]
pub struct JsonReportSink {
    path: Option<PathBuf>,
    compact: bool,
}

impl JsonReportSink {
    pub fn stdout() -> Self {
        Self::default()
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            compact: false,
        }
    }

    pub fn compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn render(&self, payload: &ReportPayload) -> RehabResult<String> {
        let json = if self.compact {
            serde_json::to_string(payload)?
        } else {
            serde_json::to_string_pretty(payload)?
        };
        Ok(json)
    }
}

impl ReportSink for JsonReportSink {
    fn submit(&self, payload: &ReportPayload) -> RehabResult<()> {
        let json = self.render(payload)?;
        match &self.path {
            Some(path) => {
                std::fs::write(path, json)?;
                log::info!("Report written to {}", path.display());
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(json.as_bytes())?;
                handle.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

/// Recent final scores per exercise, bounded in length
#[derive(Debug, Clone)]
pub struct ScoreHistory {
    capacity: usize,
    entries: HashMap<ExerciseKind, VecDeque<f64>>,
}

impl ScoreHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, kind: ExerciseKind, score: f64) {
        let ring = self.entries.entry(kind).or_default();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(score);
    }

    /// Scores for one exercise, oldest first
    pub fn recent(&self, kind: ExerciseKind) -> Vec<f64> {
        self.entries
            .get(&kind)
            .map(|ring| ring.iter().copied().collect())
            .unwrap_or_default()
    }
}
