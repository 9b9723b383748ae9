//! Posture monitor - sitting posture alerts from body keypoints
//!
//! Classifies neck and back posture per frame, raises an alert when a bad
//! posture persists for a full window, and reports the session to the
//! backend when monitoring stops.
//!
//! Module structure:
//! - `domain/` - Core types (Keypoints, Posture labels, Session)
//! - `io/` - External interfaces (Frame source, Replay, Evidence, Backend)
//! - `services/` - Logic (Classifier, History, Monitor, Reporter, Runner)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::{bail, Context};
use clap::Parser;
use posture_monitor::domain::{CameraViewpoint, SessionState};
use posture_monitor::domain::session::epoch_secs;
use posture_monitor::infra::{Config, Metrics};
use posture_monitor::io::{AcquisitionError, Backend, EvidenceStore, HttpBackend, Recording};
use posture_monitor::services::{
    create_notify_worker, run_monitoring, AlertReporter, LoopExit, PostureMonitor,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Posture monitor - neck and back posture alerts
#[derive(Parser, Debug)]
#[command(name = "posture-monitor", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// JSONL recording of detections to replay as the frame source
    #[arg(short, long)]
    recording: Option<PathBuf>,

    /// Camera viewpoint: lateral-right, frontal, lateral-left (or 1, 2, 3)
    #[arg(short, long)]
    viewpoint: Option<CameraViewpoint>,

    /// Observations per region window (overrides alert duration and fps)
    #[arg(short, long)]
    window_size: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-frame labels
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("posture-monitor starting");

    let args = Args::parse();

    let config_path = Config::resolve_config_path(args.config);
    let mut config = Config::load_from_path(&config_path);
    if let Some(viewpoint) = args.viewpoint {
        config = config.with_viewpoint(viewpoint);
    }
    if let Some(window_size) = args.window_size {
        config = config.with_window_size(window_size);
    }

    info!(
        config_file = %config.config_file(),
        backend_url = %config.backend_url(),
        viewpoint = %config.viewpoint().as_str(),
        alert_duration_secs = %config.alert_duration_secs(),
        fps = %config.fps(),
        window_size = %config.window_size(),
        evidence_dir = %config.evidence_dir().display(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::from_config(&config).context("Failed to create backend client")?);

    if config.verify_credentials() {
        let identified = backend.identify().await.context("Failed to verify credentials")?;
        if !identified {
            bail!("backend did not recognise account {}", config.credentials().email);
        }
        info!(email = %config.credentials().email, "credentials_verified");
    }

    // Frame acquisition must be available before monitoring starts
    let recording_path = args.recording.ok_or_else(|| {
        AcquisitionError::Unavailable("no camera source; pass --recording <file>".to_string())
    })?;
    let recording = Recording::load(&recording_path)
        .with_context(|| format!("Failed to open recording {}", recording_path.display()))?;
    info!(recording = %recording_path.display(), frames = %recording.len(), "frame_source_ready");
    let (mut frames, mut detector) = recording.into_replay();

    let evidence =
        EvidenceStore::open(config.evidence_dir()).context("Failed to open evidence store")?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start notify worker (alerts leave the frame loop through a bounded queue)
    let (notifier, worker) =
        create_notify_worker(backend.clone(), metrics.clone(), config.notify_queue_size());
    let worker_handle = tokio::spawn(worker.run());

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    let metrics_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    let session = SessionState::new();
    let reporter = AlertReporter::new(session, notifier, evidence, backend, metrics.clone());
    let mut monitor = PostureMonitor::from_config(&config, reporter, metrics.clone());

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let exit = run_monitoring(
        &mut monitor,
        &mut frames,
        &mut detector,
        shutdown_rx,
        Duration::from_millis(config.frame_interval_ms()),
    )
    .await;

    // Session reporting runs however the loop ended
    let report = monitor.finish_session(epoch_secs()).await;

    metrics_task.abort();
    if tokio::time::timeout(Duration::from_secs(10), worker_handle).await.is_err() {
        warn!("notify_worker_drain_timeout");
    }
    metrics.report().log();

    info!(
        session_id = %report.session_id,
        total_alerts = %report.summary.total_alerts,
        clean = %report.is_clean(),
        "posture-monitor shutdown complete"
    );

    if let LoopExit::Failed(e) = exit {
        return Err(anyhow::Error::new(e).context("Monitoring stopped on frame acquisition failure"));
    }
    Ok(())
}
