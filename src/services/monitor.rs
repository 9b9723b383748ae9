//! Posture monitor - per-frame orchestration
//!
//! Each frame: classify both regions for the configured viewpoint, push the
//! labels into their history windows, then check the back window and the
//! neck window for a due alert. An alert notifies the backend, counts
//! toward the session, and saves the frame as evidence.

use crate::domain::keypoints::KeypointSet;
use crate::domain::posture::{CameraViewpoint, PostureLabel, Region};
use crate::domain::session::SessionState;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::source::Frame;
use crate::services::classifier::classify;
use crate::services::history::RegionHistoryBuffer;
use crate::services::reporter::{AlertReporter, SessionReport};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Decisions taken for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    pub neck: PostureLabel,
    /// `None` when the back could not be classified and nothing was pushed
    pub back: Option<PostureLabel>,
    /// Alerts fired on this frame, back first
    pub alerts: SmallVec<[(Region, PostureLabel); 2]>,
}

pub struct PostureMonitor {
    viewpoint: CameraViewpoint,
    neck: RegionHistoryBuffer,
    back: RegionHistoryBuffer,
    reporter: AlertReporter,
    metrics: Arc<Metrics>,
}

impl PostureMonitor {
    pub fn new(
        viewpoint: CameraViewpoint,
        window_size: usize,
        reporter: AlertReporter,
        metrics: Arc<Metrics>,
    ) -> Self {
        info!(viewpoint = %viewpoint.as_str(), window_size = %window_size, "monitor_initialized");
        Self {
            viewpoint,
            neck: RegionHistoryBuffer::new(Region::Neck, window_size),
            back: RegionHistoryBuffer::new(Region::Back, window_size),
            reporter,
            metrics,
        }
    }

    pub fn from_config(config: &Config, reporter: AlertReporter, metrics: Arc<Metrics>) -> Self {
        Self::new(config.viewpoint(), config.window_size(), reporter, metrics)
    }

    /// Classify one frame and fire any alerts that became due
    pub fn process(&mut self, keypoints: &KeypointSet, frame: &Frame) -> FrameOutcome {
        let start = Instant::now();
        let labels = classify(keypoints, self.viewpoint);

        self.neck.push(labels.neck);
        match labels.back {
            Some(label) => self.back.push(label),
            None => {
                self.metrics.record_classification_skipped();
                debug!(seq = %frame.seq, "back_classification_skipped");
            }
        }

        let mut alerts: SmallVec<[(Region, PostureLabel); 2]> = SmallVec::new();
        for history in [&mut self.back, &mut self.neck] {
            if let Some(label) = history.take_alert() {
                alerts.push((history.region(), label));
            }
        }
        for &(region, label) in &alerts {
            self.fire(region, label, frame);
        }

        debug!(
            seq = %frame.seq,
            neck = %labels.neck,
            back = %labels.back.map_or("none", |l| l.as_str()),
            neck_window = %self.neck.len(),
            back_window = %self.back.len(),
            "frame_classified"
        );
        self.metrics.record_frame(start.elapsed().as_micros() as u64);

        FrameOutcome { neck: labels.neck, back: labels.back, alerts }
    }

    fn fire(&mut self, region: Region, label: PostureLabel, frame: &Frame) {
        self.metrics.record_alert(region);
        let queued = self.reporter.notify(region);
        self.reporter.record_alert(region, label);
        let evidence = self.reporter.queue_evidence(frame);

        info!(
            session_id = %self.reporter.session().id,
            region = %region,
            posture = %label.describe(region),
            seq = %frame.seq,
            notify_queued = %queued,
            evidence = %evidence.as_ref().map_or_else(|| "none".into(), |p| p.display().to_string()),
            "alert_fired"
        );
    }

    /// Neck posture shown to the user (oldest label in the window)
    pub fn neck_posture(&self) -> Option<PostureLabel> {
        self.neck.current_label()
    }

    /// Back posture shown to the user (oldest label in the window)
    pub fn back_posture(&self) -> Option<PostureLabel> {
        self.back.current_label()
    }

    pub fn history(&self, region: Region) -> &RegionHistoryBuffer {
        match region {
            Region::Neck => &self.neck,
            Region::Back => &self.back,
        }
    }

    pub fn viewpoint(&self) -> CameraViewpoint {
        self.viewpoint
    }

    pub fn session(&self) -> &SessionState {
        self.reporter.session()
    }

    pub async fn finish_session(self, end_time: i64) -> SessionReport {
        self.reporter.finish_session(end_time).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keypoints::{Landmark, Point};
    use crate::domain::session::SessionSummary;
    use crate::io::backend::{Backend, BackendError, UploadOutcome};
    use crate::io::evidence::EvidenceStore;
    use crate::services::notify_worker::create_notify_worker;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::tempdir;

    struct NullBackend;

    #[async_trait]
    impl Backend for NullBackend {
        async fn identify(&self) -> Result<bool, BackendError> {
            Ok(true)
        }
        async fn notify(&self, _: Region) -> Result<(), BackendError> {
            Ok(())
        }
        async fn upload_evidence(&self, f: &[PathBuf]) -> Result<UploadOutcome, BackendError> {
            Ok(UploadOutcome::Uploaded(f.len()))
        }
        async fn push_summary(&self, _: &SessionSummary) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn monitor(viewpoint: CameraViewpoint, window: usize, dir: &std::path::Path) -> PostureMonitor {
        let metrics = Arc::new(Metrics::new());
        let backend: Arc<dyn Backend> = Arc::new(NullBackend);
        let (sender, _worker) = create_notify_worker(backend.clone(), metrics.clone(), 16);
        let reporter = AlertReporter::new(
            SessionState::started_at(0),
            sender,
            EvidenceStore::open(dir).unwrap(),
            backend,
            metrics.clone(),
        );
        PostureMonitor::new(viewpoint, window, reporter, metrics)
    }

    /// Right-side pose with the head well above the shoulders
    fn right_side(hip_angle: f32) -> KeypointSet {
        let hip = Point::new(0.5, 0.6);
        let dir = (-hip_angle).to_radians();
        KeypointSet::default()
            .with_point(Landmark::Nose, Point::new(0.5, 0.05))
            .with_point(Landmark::LeftShoulder, Point::new(0.5, 0.3))
            .with_point(Landmark::RightShoulder, Point::new(hip.x + 0.3 * dir.cos(), hip.y + 0.3 * dir.sin()))
            .with_point(Landmark::RightHip, hip)
            .with_point(Landmark::RightKnee, Point::new(0.8, 0.6))
    }

    /// Frontal pose, sitting straight
    fn frontal(nose_y: f32) -> KeypointSet {
        KeypointSet::default()
            .with_point(Landmark::Nose, Point::new(0.5, nose_y))
            .with_point(Landmark::LeftShoulder, Point::new(0.6, 0.5))
            .with_point(Landmark::RightShoulder, Point::new(0.4, 0.5))
            .with_point(Landmark::LeftHip, Point::new(0.6, 0.9))
            .with_point(Landmark::RightHip, Point::new(0.4, 0.9))
    }

    /// Frontal pose where nose-hip and shoulder-hip spans are equal
    fn frontal_tie() -> KeypointSet {
        let p = Point::new(0.5, 0.5);
        KeypointSet::default()
            .with_point(Landmark::Nose, p)
            .with_point(Landmark::LeftShoulder, p)
            .with_point(Landmark::RightShoulder, p)
            .with_point(Landmark::LeftHip, Point::new(0.6, 0.9))
            .with_point(Landmark::RightHip, Point::new(0.4, 0.9))
    }

    #[test]
    fn test_sustained_forward_lean_alerts_once() {
        let dir = tempdir().unwrap();
        let mut monitor = monitor(CameraViewpoint::LateralRight, 5, dir.path());
        let pose = right_side(80.0);

        let mut fired = Vec::new();
        for seq in 0..5 {
            fired.extend(monitor.process(&pose, &Frame::empty(seq)).alerts);
        }

        assert_eq!(fired.as_slice(), &[(Region::Back, PostureLabel::ForwardLeaning)]);
        assert_eq!(monitor.session().total_alerts(), 1);
        assert_eq!(monitor.session().incorrect_postures(), &["forward-leaning back"]);
        assert_eq!(monitor.session().evidence().len(), 1);
        assert_eq!(monitor.back_posture(), Some(PostureLabel::ForwardLeaning));
        assert_eq!(monitor.neck_posture(), Some(PostureLabel::Upright));
    }

    #[test]
    fn test_upright_frame_holds_alert_back() {
        let dir = tempdir().unwrap();
        let mut monitor = monitor(CameraViewpoint::LateralRight, 5, dir.path());

        monitor.process(&right_side(100.0), &Frame::empty(0));
        for seq in 1..5 {
            let outcome = monitor.process(&right_side(130.0), &Frame::empty(seq));
            assert!(outcome.alerts.is_empty());
        }
        // upright label ages out on the next push
        let outcome = monitor.process(&right_side(130.0), &Frame::empty(5));
        assert_eq!(outcome.alerts.as_slice(), &[(Region::Back, PostureLabel::Reclined)]);
    }

    #[test]
    fn test_two_windows_alert_twice() {
        let dir = tempdir().unwrap();
        let mut monitor = monitor(CameraViewpoint::LateralRight, 4, dir.path());
        let pose = right_side(130.0);

        let count: usize = (0..8)
            .map(|seq| monitor.process(&pose, &Frame::empty(seq)).alerts.len())
            .sum();
        assert_eq!(count, 2);
        assert_eq!(monitor.session().incorrect_postures(), &["reclined back"]);
    }

    #[test]
    fn test_frontal_tie_skips_back_push() {
        let dir = tempdir().unwrap();
        let mut monitor = monitor(CameraViewpoint::Frontal, 3, dir.path());

        let outcome = monitor.process(&frontal_tie(), &Frame::empty(0));
        assert_eq!(outcome.back, None);
        assert!(monitor.history(Region::Back).is_empty());
        assert_eq!(monitor.history(Region::Neck).len(), 1);
    }

    #[test]
    fn test_nan_keypoints_skip_back_push() {
        let dir = tempdir().unwrap();
        let mut monitor = monitor(CameraViewpoint::LateralRight, 2, dir.path());
        let pose = right_side(80.0).with_point(Landmark::RightHip, Point::new(f32::NAN, f32::NAN));

        for seq in 0..4 {
            let outcome = monitor.process(&pose, &Frame::empty(seq));
            assert_eq!(outcome.back, None);
            assert!(outcome.alerts.is_empty());
        }
        assert!(monitor.history(Region::Back).is_empty());
        assert_eq!(monitor.history(Region::Neck).len(), 2);
    }

    #[test]
    fn test_frontal_upright_never_alerts() {
        let dir = tempdir().unwrap();
        let mut monitor = monitor(CameraViewpoint::Frontal, 3, dir.path());

        for seq in 0..9 {
            let outcome = monitor.process(&frontal(0.2), &Frame::empty(seq));
            assert_eq!(outcome.back, Some(PostureLabel::Upright));
            assert!(outcome.alerts.is_empty());
        }
        assert_eq!(monitor.back_posture(), Some(PostureLabel::Upright));
        assert_eq!(monitor.session().total_alerts(), 0);
    }

    #[test]
    fn test_neck_and_back_fire_on_same_frame() {
        let dir = tempdir().unwrap();
        let mut monitor = monitor(CameraViewpoint::LateralRight, 2, dir.path());
        // nose level with both shoulders, hips reclined
        let pose = right_side(130.0)
            .with_point(Landmark::Nose, Point::new(0.5, 0.3))
            .with_point(Landmark::LeftShoulder, Point::new(0.5, 0.35));
        let pose = pose.with_point(
            Landmark::RightShoulder,
            Point::new(pose.point(Landmark::RightShoulder).x, 0.35),
        );

        monitor.process(&pose, &Frame::empty(0));
        let outcome = monitor.process(&pose, &Frame::empty(1));

        assert_eq!(outcome.alerts.len(), 2);
        assert_eq!(outcome.alerts[0].0, Region::Back);
        assert_eq!(outcome.alerts[1], (Region::Neck, PostureLabel::ForwardLeaning));
        assert_eq!(monitor.session().total_alerts(), 2);
    }
}
