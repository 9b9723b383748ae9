//! Alert reporter - session bookkeeping and backend reporting
//!
//! During monitoring the reporter counts alerts, remembers the distinct
//! incorrect postures, stores evidence frames and queues notifications.
//! When monitoring stops, `finish_session` runs three stages in order:
//!
//! 1. upload every file in the evidence store, including leftovers from an
//!    earlier session whose upload failed
//! 2. remove the uploaded files, only if the upload succeeded, then check
//!    the store is empty
//! 3. push the session summary, always
//!
//! A failing stage is logged and reported; it never aborts the others. A
//! store that still holds files after cleanup is only a warning.

use crate::domain::posture::{PostureLabel, Region};
use crate::domain::session::{SessionState, SessionSummary};
use crate::infra::metrics::Metrics;
use crate::io::backend::{Backend, UploadOutcome};
use crate::io::evidence::{EvidenceError, EvidenceStore};
use crate::io::source::Frame;
use crate::services::notify_worker::NotifySender;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// End-of-session step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Upload,
    Cleanup,
    Summary,
}

impl SessionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStage::Upload => "upload",
            SessionStage::Cleanup => "cleanup",
            SessionStage::Summary => "summary",
        }
    }
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionStage::Upload => "uploading incorrect-posture images",
            SessionStage::Cleanup => "clearing the local image store",
            SessionStage::Summary => "sending the session summary",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Done,
    /// Not attempted, with the reason
    Skipped(&'static str),
    /// Completed, but left state that needs attention
    Inconsistent(String),
    Failed(String),
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// What happened at the end of a session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub summary: SessionSummary,
    pub upload: StageOutcome,
    pub cleanup: StageOutcome,
    pub push: StageOutcome,
}

impl SessionReport {
    /// Failed stages with their error text, in execution order
    pub fn failures(&self) -> Vec<(SessionStage, &str)> {
        [
            (SessionStage::Upload, &self.upload),
            (SessionStage::Cleanup, &self.cleanup),
            (SessionStage::Summary, &self.push),
        ]
        .into_iter()
        .filter_map(|(stage, outcome)| match outcome {
            StageOutcome::Failed(msg) => Some((stage, msg.as_str())),
            _ => None,
        })
        .collect()
    }

    /// No stage failed. Inconsistent stages still count as clean.
    pub fn is_clean(&self) -> bool {
        !(self.upload.is_failed() || self.cleanup.is_failed() || self.push.is_failed())
    }
}

pub struct AlertReporter {
    session: SessionState,
    notifier: NotifySender,
    evidence: EvidenceStore,
    backend: Arc<dyn Backend>,
    metrics: Arc<Metrics>,
}

impl AlertReporter {
    pub fn new(
        session: SessionState,
        notifier: NotifySender,
        evidence: EvidenceStore,
        backend: Arc<dyn Backend>,
        metrics: Arc<Metrics>,
    ) -> Self {
        info!(session_id = %session.id, evidence_dir = %evidence.dir().display(), "session_started");
        Self { session, notifier, evidence, backend, metrics }
    }

    /// Queue an alert notification. Never blocks and never fails the caller.
    pub fn notify(&self, region: Region) -> bool {
        self.notifier.notify(region)
    }

    pub fn record_alert(&mut self, region: Region, label: PostureLabel) {
        self.session.increment_alerts();
        self.session.record_label(region, label);
    }

    /// Save the frame that triggered an alert
    pub fn queue_evidence(&mut self, frame: &Frame) -> Option<PathBuf> {
        match self.evidence.save(frame) {
            Ok(path) => {
                self.metrics.record_evidence_captured();
                self.session.queue_evidence(path.clone());
                Some(path)
            }
            Err(e) => {
                self.metrics.record_evidence_failed();
                warn!(session_id = %self.session.id, seq = %frame.seq, error = %e, "evidence_save_failed");
                None
            }
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Upload, clean up, and push the summary
    pub async fn finish_session(self, end_time: i64) -> SessionReport {
        let Self { mut session, notifier, mut evidence, backend, .. } = self;
        // Lets the notify worker drain and stop
        drop(notifier);

        let (upload, uploaded) = upload_stage(&session, &evidence, backend.as_ref()).await;

        let cleanup = match upload {
            StageOutcome::Done | StageOutcome::Inconsistent(_) => {
                cleanup_stage(&mut session, &mut evidence, &uploaded)
            }
            StageOutcome::Skipped(_) => StageOutcome::Skipped("nothing to clear"),
            StageOutcome::Failed(_) => StageOutcome::Skipped("upload failed"),
        };
        if let StageOutcome::Inconsistent(msg) = &cleanup {
            warn!(
                session_id = %session.id,
                dir = %evidence.dir().display(),
                detail = %msg,
                "evidence_store_inconsistent"
            );
        }

        let summary = session.summary(end_time);
        let push = match backend.push_summary(&summary).await {
            Ok(()) => {
                info!(
                    session_id = %session.id,
                    total_alerts = %summary.total_alerts,
                    duration_secs = %summary.duration_secs(),
                    incorrect_postures = %summary.incorrect_postures_json(),
                    "session_summary_pushed"
                );
                StageOutcome::Done
            }
            Err(e) => StageOutcome::Failed(e.to_string()),
        };

        let report = SessionReport { session_id: session.id, summary, upload, cleanup, push };
        for (stage, msg) in report.failures() {
            error!(
                session_id = %report.session_id,
                stage = %stage.as_str(),
                error = %msg,
                text = %format!("Error {}: {}", stage, msg),
                "session_stage_failed"
            );
        }
        report
    }
}

/// Upload the store's contents; returns the outcome and the files sent
async fn upload_stage(
    session: &SessionState,
    evidence: &EvidenceStore,
    backend: &dyn Backend,
) -> (StageOutcome, Vec<PathBuf>) {
    let files = match evidence.list() {
        Ok(files) => files,
        Err(e) => return (StageOutcome::Failed(e.to_string()), Vec::new()),
    };

    let outcome = match backend.upload_evidence(&files).await {
        Ok(UploadOutcome::Uploaded(count)) => {
            info!(
                session_id = %session.id,
                count = %count,
                captured_this_session = %session.evidence().len(),
                "evidence_uploaded"
            );
            StageOutcome::Done
        }
        Ok(UploadOutcome::NoEvidence) => StageOutcome::Skipped("no evidence"),
        Err(e) => StageOutcome::Failed(e.to_string()),
    };
    (outcome, files)
}

/// Remove the uploaded files, then check nothing else arrived meanwhile
fn cleanup_stage(
    session: &mut SessionState,
    evidence: &mut EvidenceStore,
    uploaded: &[PathBuf],
) -> StageOutcome {
    if let Err(e) = evidence.remove(uploaded) {
        return StageOutcome::Failed(e.to_string());
    }
    session.clear_evidence();

    match evidence.verify_empty() {
        Ok(()) => StageOutcome::Done,
        Err(e @ EvidenceError::NotEmpty { .. }) => StageOutcome::Inconsistent(e.to_string()),
        Err(e) => StageOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::NO_INCORRECT_POSTURES;
    use crate::io::backend::BackendError;
    use crate::services::notify_worker::create_notify_worker;
    use async_trait::async_trait;
    use bytes::Bytes;
    use crate::io::source::ImageFormat;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeBackend {
        fail_upload: bool,
        /// Written into the store while the upload is in flight
        late_file: Option<PathBuf>,
        uploads: Mutex<Vec<usize>>,
        summaries: Mutex<Vec<SessionSummary>>,
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn identify(&self) -> Result<bool, BackendError> {
            Ok(true)
        }

        async fn notify(&self, _: Region) -> Result<(), BackendError> {
            Ok(())
        }

        async fn upload_evidence(&self, files: &[PathBuf]) -> Result<UploadOutcome, BackendError> {
            if files.is_empty() {
                return Ok(UploadOutcome::NoEvidence);
            }
            if self.fail_upload {
                return Err(BackendError::UploadIncomplete { failed: files.len(), total: files.len() });
            }
            if let Some(path) = &self.late_file {
                std::fs::write(path, b"late").unwrap();
            }
            self.uploads.lock().push(files.len());
            Ok(UploadOutcome::Uploaded(files.len()))
        }

        async fn push_summary(&self, summary: &SessionSummary) -> Result<(), BackendError> {
            self.summaries.lock().push(summary.clone());
            Ok(())
        }
    }

    fn reporter(backend: Arc<FakeBackend>, dir: &std::path::Path) -> AlertReporter {
        let metrics = Arc::new(Metrics::new());
        let (sender, _worker) = create_notify_worker(backend.clone(), metrics.clone(), 4);
        AlertReporter::new(
            SessionState::started_at(1_000),
            sender,
            EvidenceStore::open(dir).unwrap(),
            backend,
            metrics,
        )
    }

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, Bytes::from_static(b"img"), ImageFormat::Png)
    }

    #[tokio::test]
    async fn test_clean_session_without_alerts() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let report = reporter(backend.clone(), dir.path()).finish_session(1_060).await;

        assert!(report.is_clean());
        assert_eq!(report.upload, StageOutcome::Skipped("no evidence"));
        assert_eq!(report.summary.incorrect_postures, vec![NO_INCORRECT_POSTURES.to_string()]);
        assert_eq!(backend.summaries.lock().len(), 1);
        assert!(backend.uploads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_successful_upload_clears_store() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let mut reporter = reporter(backend.clone(), dir.path());

        reporter.record_alert(Region::Back, PostureLabel::Reclined);
        assert!(reporter.queue_evidence(&frame(3)).is_some());
        assert_eq!(reporter.session().evidence().len(), 1);

        let report = reporter.finish_session(1_100).await;
        assert!(report.is_clean());
        assert_eq!(report.cleanup, StageOutcome::Done);
        assert_eq!(report.summary.total_alerts, 1);
        assert_eq!(report.summary.incorrect_postures, vec!["reclined back".to_string()]);
        assert_eq!(*backend.uploads.lock(), vec![1]);
        assert!(EvidenceStore::open(dir.path()).unwrap().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_files_and_still_pushes_summary() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend { fail_upload: true, ..Default::default() });
        let mut reporter = reporter(backend.clone(), dir.path());

        reporter.record_alert(Region::Neck, PostureLabel::ForwardLeaning);
        reporter.queue_evidence(&frame(0));

        let report = reporter.finish_session(1_100).await;
        assert!(!report.is_clean());
        assert_eq!(report.cleanup, StageOutcome::Skipped("upload failed"));
        assert_eq!(report.push, StageOutcome::Done);

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, SessionStage::Upload);

        assert_eq!(backend.summaries.lock().len(), 1);
        assert_eq!(EvidenceStore::open(dir.path()).unwrap().list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_left_after_cleanup_is_a_warning() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FakeBackend {
            late_file: Some(dir.path().join("99.png")),
            ..Default::default()
        });
        let mut reporter = reporter(backend.clone(), dir.path());

        reporter.record_alert(Region::Back, PostureLabel::ForwardLeaning);
        reporter.queue_evidence(&frame(0));

        let report = reporter.finish_session(1_100).await;
        assert_eq!(report.upload, StageOutcome::Done);
        assert!(matches!(report.cleanup, StageOutcome::Inconsistent(_)));
        assert_eq!(report.push, StageOutcome::Done);
        assert!(report.is_clean());
        assert!(report.failures().is_empty());

        assert_eq!(backend.summaries.lock().len(), 1);
        // only the uploaded frame was removed
        let left = EvidenceStore::open(dir.path()).unwrap().list().unwrap();
        assert_eq!(left, vec![dir.path().join("99.png")]);
    }

    #[tokio::test]
    async fn test_upload_includes_leftovers_from_earlier_session() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0.png"), b"old").unwrap();
        let backend = Arc::new(FakeBackend::default());
        let mut reporter = reporter(backend.clone(), dir.path());

        reporter.record_alert(Region::Neck, PostureLabel::ForwardLeaning);
        assert_eq!(reporter.queue_evidence(&frame(5)), Some(dir.path().join("1.png")));
        assert_eq!(reporter.session().evidence().len(), 1);

        let report = reporter.finish_session(1_100).await;
        assert_eq!(report.cleanup, StageOutcome::Done);
        assert_eq!(*backend.uploads.lock(), vec![2]);
        assert!(EvidenceStore::open(dir.path()).unwrap().is_empty().unwrap());
    }

    #[test]
    fn test_stage_display_is_readable() {
        assert_eq!(SessionStage::Upload.to_string(), "uploading incorrect-posture images");
        assert_eq!(SessionStage::Summary.as_str(), "summary");
    }
}
