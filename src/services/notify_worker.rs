//! Notify worker - delivers alert notifications off the frame loop
//!
//! The monitor must never wait on the network. Alerts are enqueued with
//! `try_send` on a bounded channel; the worker task drains it and performs
//! the HTTP call. When the queue is full the notification is dropped.

use crate::domain::posture::Region;
use crate::infra::metrics::Metrics;
use crate::io::backend::Backend;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

/// An alert notification waiting for delivery
#[derive(Debug)]
pub struct NotifyCmd {
    pub region: Region,
    /// When the command was enqueued (for queue delay measurement)
    pub enqueued_at: Instant,
}

/// Non-blocking handle used by the reporter
#[derive(Clone)]
pub struct NotifySender {
    tx: mpsc::Sender<NotifyCmd>,
    metrics: Arc<Metrics>,
}

impl NotifySender {
    pub fn new(tx: mpsc::Sender<NotifyCmd>, metrics: Arc<Metrics>) -> Self {
        Self { tx, metrics }
    }

    /// Queue a notification. Returns false if it had to be dropped.
    pub fn notify(&self, region: Region) -> bool {
        let cmd = NotifyCmd { region, enqueued_at: Instant::now() };
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(cmd)) => {
                warn!(region = %cmd.region, "notify_queue_full");
                self.metrics.record_notification_dropped();
                false
            }
            Err(TrySendError::Closed(cmd)) => {
                warn!(region = %cmd.region, "notify_queue_closed");
                self.metrics.record_notification_dropped();
                false
            }
        }
    }
}

/// Worker that sends queued notifications to the backend
pub struct NotifyWorker {
    backend: Arc<dyn Backend>,
    rx: mpsc::Receiver<NotifyCmd>,
    metrics: Arc<Metrics>,
}

impl NotifyWorker {
    pub fn new(
        backend: Arc<dyn Backend>,
        rx: mpsc::Receiver<NotifyCmd>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { backend, rx, metrics }
    }

    /// Run until every sender is dropped and the queue is drained
    pub async fn run(mut self) {
        info!("notify_worker_started");

        while let Some(cmd) = self.rx.recv().await {
            let queue_delay_us = cmd.enqueued_at.elapsed().as_micros() as u64;
            let send_start = Instant::now();

            match self.backend.notify(cmd.region).await {
                Ok(()) => {
                    self.metrics.record_notification_sent();
                    info!(
                        region = %cmd.region,
                        queue_delay_us = %queue_delay_us,
                        send_us = %(send_start.elapsed().as_micros() as u64),
                        "notify_sent"
                    );
                }
                Err(e) => {
                    self.metrics.record_notification_failed();
                    warn!(
                        region = %cmd.region,
                        queue_delay_us = %queue_delay_us,
                        error = %e,
                        "notify_failed"
                    );
                }
            }
        }

        info!("notify_worker_stopped");
    }
}

/// Create a notification channel and worker
///
/// Returns the sender (for the reporter) and the worker (to be spawned)
pub fn create_notify_worker(
    backend: Arc<dyn Backend>,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (NotifySender, NotifyWorker) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    let worker = NotifyWorker::new(backend, rx, metrics.clone());
    (NotifySender::new(tx, metrics), worker)
}
