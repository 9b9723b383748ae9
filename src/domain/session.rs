//! Monitoring session state and the end-of-session summary

use crate::domain::posture::{PostureLabel, Region};
use chrono::Utc;
use serde::Serialize;
use smallvec::SmallVec;
use std::path::PathBuf;
use uuid::Uuid;

/// Placeholder reported when a session produced no alerts
pub const NO_INCORRECT_POSTURES: &str = "No Incorrect Postures";

/// Generate a new UUIDv7 (time-sortable)
pub fn new_session_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current wall-clock time in epoch seconds
#[inline]
pub fn epoch_secs() -> i64 {
    Utc::now().timestamp()
}

/// Mutable state of one monitoring session (camera open to camera close)
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: String,
    pub started_at: i64, // epoch seconds
    total_alerts: u32,
    incorrect_postures: SmallVec<[&'static str; 4]>,
    /// Frames captured this session. Bookkeeping only: the upload reads the
    /// evidence store, which may also hold files from an earlier session
    /// whose upload failed.
    evidence: Vec<PathBuf>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::started_at(epoch_secs())
    }

    pub fn started_at(started_at: i64) -> Self {
        Self {
            id: new_session_id(),
            started_at,
            total_alerts: 0,
            incorrect_postures: SmallVec::new(),
            evidence: Vec::new(),
        }
    }

    pub fn increment_alerts(&mut self) {
        self.total_alerts += 1;
    }

    /// Remember the posture that triggered an alert. Duplicates are ignored,
    /// first-seen order is kept.
    pub fn record_label(&mut self, region: Region, label: PostureLabel) {
        let text = label.describe(region);
        if !self.incorrect_postures.contains(&text) {
            self.incorrect_postures.push(text);
        }
    }

    pub fn queue_evidence(&mut self, path: PathBuf) {
        self.evidence.push(path);
    }

    pub fn total_alerts(&self) -> u32 {
        self.total_alerts
    }

    pub fn incorrect_postures(&self) -> &[&'static str] {
        &self.incorrect_postures
    }

    pub fn evidence(&self) -> &[PathBuf] {
        &self.evidence
    }

    /// Forget captured frames once they have been uploaded and removed
    pub fn clear_evidence(&mut self) {
        self.evidence.clear();
    }

    /// Build the summary pushed to the backend when the session ends
    pub fn summary(&self, end_time: i64) -> SessionSummary {
        let incorrect_postures = if self.incorrect_postures.is_empty() {
            vec![NO_INCORRECT_POSTURES.to_string()]
        } else {
            self.incorrect_postures.iter().map(|s| s.to_string()).collect()
        };
        SessionSummary {
            start_time: self.started_at,
            end_time,
            total_alerts: self.total_alerts,
            incorrect_postures,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// End-of-session data sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub start_time: i64,
    pub end_time: i64,
    pub total_alerts: u32,
    pub incorrect_postures: Vec<String>,
}

impl SessionSummary {
    /// Incorrect postures as the JSON-encoded list expected by the backend
    pub fn incorrect_postures_json(&self) -> String {
        serde_json::to_string(&self.incorrect_postures).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).max(0)
    }
}
