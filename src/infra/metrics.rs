//! Lock-free metrics collection and periodic reporting
//!
//! The frame loop and the notify worker update counters concurrently, so all
//! counters are atomics. Reporting swaps the periodic counters to zero.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only; never use them for coordination or alert decisions.

use crate::domain::posture::Region;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

pub struct Metrics {
    // Monotonic counters
    frames_total: AtomicU64,
    classifications_skipped: AtomicU64,
    neck_alerts: AtomicU64,
    back_alerts: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    notifications_dropped: AtomicU64,
    evidence_captured: AtomicU64,
    evidence_failed: AtomicU64,
    // Periodic counters (reset on report)
    frames_since_report: AtomicU64,
    latency_sum_us: AtomicU64,
    latency_max_us: AtomicU64,
    last_report_time: Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_total: AtomicU64::new(0),
            classifications_skipped: AtomicU64::new(0),
            neck_alerts: AtomicU64::new(0),
            back_alerts: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            notifications_dropped: AtomicU64::new(0),
            evidence_captured: AtomicU64::new(0),
            evidence_failed: AtomicU64::new(0),
            frames_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            last_report_time: Mutex::new(Instant::now()),
        }
    }

    /// Record a processed frame and its classification latency
    #[inline]
    pub fn record_frame(&self, latency_us: u64) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        self.frames_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    /// A frame produced no label for a region (frontal back tie)
    #[inline]
    pub fn record_classification_skipped(&self) {
        self.classifications_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert(&self, region: Region) {
        let counter = match region {
            Region::Neck => &self.neck_alerts,
            Region::Back => &self.back_alerts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Notification discarded because the queue was full or closed
    #[inline]
    pub fn record_notification_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evidence_captured(&self) {
        self.evidence_captured.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evidence_failed(&self) {
        self.evidence_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_total(&self) -> u64 {
        self.frames_total.load(Ordering::Relaxed)
    }

    pub fn alerts(&self, region: Region) -> u64 {
        match region {
            Region::Neck => self.neck_alerts.load(Ordering::Relaxed),
            Region::Back => self.back_alerts.load(Ordering::Relaxed),
        }
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    pub fn notifications_failed(&self) -> u64 {
        self.notifications_failed.load(Ordering::Relaxed)
    }

    pub fn notifications_dropped(&self) -> u64 {
        self.notifications_dropped.load(Ordering::Relaxed)
    }

    /// Build a summary and reset the periodic counters
    pub fn report(&self) -> MetricsSummary {
        let frames = self.frames_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let secs = elapsed.as_secs_f64();
        let frames_per_sec = if secs > 0.0 { frames as f64 / secs } else { 0.0 };
        let avg_latency_us = if frames > 0 { latency_sum / frames } else { 0 };

        MetricsSummary {
            frames_total: self.frames_total.load(Ordering::Relaxed),
            frames_per_sec,
            avg_latency_us,
            max_latency_us: max_latency,
            classifications_skipped: self.classifications_skipped.load(Ordering::Relaxed),
            neck_alerts: self.neck_alerts.load(Ordering::Relaxed),
            back_alerts: self.back_alerts.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            evidence_captured: self.evidence_captured.load(Ordering::Relaxed),
            evidence_failed: self.evidence_failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub frames_total: u64,
    pub frames_per_sec: f64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    pub classifications_skipped: u64,
    pub neck_alerts: u64,
    pub back_alerts: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub notifications_dropped: u64,
    pub evidence_captured: u64,
    pub evidence_failed: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            frames_total = %self.frames_total,
            fps = format!("{:.1}", self.frames_per_sec),
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            skipped = %self.classifications_skipped,
            neck_alerts = %self.neck_alerts,
            back_alerts = %self.back_alerts,
            notify_sent = %self.notifications_sent,
            notify_failed = %self.notifications_failed,
            notify_dropped = %self.notifications_dropped,
            evidence = %self.evidence_captured,
            "metrics"
        );
    }
}
