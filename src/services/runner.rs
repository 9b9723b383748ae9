//! Frame loop - pulls frames, runs detection, feeds the monitor
//!
//! The loop stops when the shutdown signal flips to `true`, when the frame
//! source runs dry, or when the source fails. A detection error only skips
//! that frame. End-of-session reporting is the caller's job and runs after
//! any of these exits.

use crate::io::source::{AcquisitionError, FrameSource, PoseDetector};
use crate::services::monitor::PostureMonitor;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Why the frame loop ended
#[derive(Debug)]
pub enum LoopExit {
    /// Shutdown was requested
    Stopped,
    /// The source has no more frames
    Exhausted,
    /// Frame acquisition failed
    Failed(AcquisitionError),
}

/// Run the monitor over `source` until stopped.
///
/// `frame_interval` paces the loop; zero processes frames back to back.
pub async fn run_monitoring<S, D>(
    monitor: &mut PostureMonitor,
    source: &mut S,
    detector: &mut D,
    mut shutdown: watch::Receiver<bool>,
    frame_interval: Duration,
) -> LoopExit
where
    S: FrameSource + ?Sized,
    D: PoseDetector + ?Sized,
{
    let mut pacer = (!frame_interval.is_zero()).then(|| {
        let mut pacer = interval(frame_interval);
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        pacer
    });
    let mut frames: u64 = 0;

    info!(frame_interval_ms = %frame_interval.as_millis(), "monitoring_started");

    let exit = loop {
        if *shutdown.borrow() {
            break LoopExit::Stopped;
        }

        match pacer.as_mut() {
            Some(pacer) => {
                tokio::select! {
                    _ = pacer.tick() => {}
                    changed = shutdown.changed() => {
                        // A dropped sender counts as a stop request
                        if changed.is_err() || *shutdown.borrow() {
                            break LoopExit::Stopped;
                        }
                        continue;
                    }
                }
            }
            // Let the notify worker and the signal handler run
            None => tokio::task::yield_now().await,
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break LoopExit::Exhausted,
            Err(e) => break LoopExit::Failed(e),
        };

        match detector.detect(&frame) {
            Ok(keypoints) => {
                monitor.process(&keypoints, &frame);
                frames += 1;
            }
            Err(e) => warn!(seq = %frame.seq, error = %e, "detection_failed"),
        }
    };

    match &exit {
        LoopExit::Stopped => info!(frames = %frames, "monitoring_stopped"),
        LoopExit::Exhausted => info!(frames = %frames, "frame_source_exhausted"),
        LoopExit::Failed(e) => error!(frames = %frames, error = %e, "frame_acquisition_failed"),
    }
    exit
}
