//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument (parsed by the binary)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::posture::CameraViewpoint;
use crate::services::history::window_capacity;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Account credentials sent with every backend request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the reporting service, e.g. "http://192.168.1.20:8000"
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Check credentials against the backend before monitoring starts
    #[serde(default)]
    pub verify_credentials: bool,
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub viewpoint: CameraViewpoint,
    /// How long a bad posture must persist before alerting
    #[serde(default = "default_alert_duration_secs")]
    pub alert_duration_secs: f64,
    /// Effective capture rate used to size the history window
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Explicit window size; overrides the duration/fps derivation
    #[serde(default)]
    pub window_size: Option<usize>,
    /// Delay between replayed frames (0 = as fast as possible)
    #[serde(default)]
    pub frame_interval_ms: u64,
}

fn default_alert_duration_secs() -> f64 {
    10.0
}

fn default_fps() -> f64 {
    19.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceConfig {
    /// Directory holding captured frames until they are uploaded
    #[serde(default = "default_evidence_dir")]
    pub dir: String,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self { dir: default_evidence_dir() }
    }
}

fn default_evidence_dir() -> String {
    "incorrect_postures".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Bounded queue between the frame loop and the notify worker
    #[serde(default = "default_notify_queue_size")]
    pub queue_size: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { queue_size: default_notify_queue_size() }
    }
}

fn default_notify_queue_size() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub backend: BackendConfig,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    backend_url: String,
    credentials: Credentials,
    backend_timeout_ms: u64,
    verify_credentials: bool,
    viewpoint: CameraViewpoint,
    alert_duration_secs: f64,
    fps: f64,
    window_size: Option<usize>,
    frame_interval_ms: u64,
    evidence_dir: PathBuf,
    notify_queue_size: usize,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            credentials: Credentials { email: String::new(), password: String::new() },
            backend_timeout_ms: default_timeout_ms(),
            verify_credentials: false,
            viewpoint: CameraViewpoint::LateralRight,
            alert_duration_secs: default_alert_duration_secs(),
            fps: default_fps(),
            window_size: None,
            frame_interval_ms: 0,
            evidence_dir: PathBuf::from(default_evidence_dir()),
            notify_queue_size: default_notify_queue_size(),
            metrics_interval_secs: default_metrics_interval_secs(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path: explicit `--config` value, then the
    /// environment, then the dev default
    pub fn resolve_config_path(cli: Option<String>) -> String {
        cli.or_else(|| env::var("CONFIG_FILE").ok())
            .unwrap_or_else(|| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            backend_url: toml_config.backend.base_url.trim_end_matches('/').to_string(),
            credentials: Credentials {
                email: toml_config.backend.email,
                password: toml_config.backend.password,
            },
            backend_timeout_ms: toml_config.backend.timeout_ms,
            verify_credentials: toml_config.backend.verify_credentials,
            viewpoint: toml_config.monitor.viewpoint,
            alert_duration_secs: toml_config.monitor.alert_duration_secs,
            fps: toml_config.monitor.fps,
            window_size: toml_config.monitor.window_size,
            frame_interval_ms: toml_config.monitor.frame_interval_ms,
            evidence_dir: PathBuf::from(toml_config.evidence.dir),
            notify_queue_size: toml_config.notify.queue_size.max(1),
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from a path, falling back to defaults on error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Number of observations each region keeps before an alert can fire
    pub fn window_size(&self) -> usize {
        self.window_size
            .map(|n| n.max(1))
            .unwrap_or_else(|| window_capacity(self.alert_duration_secs, self.fps))
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn backend_timeout_ms(&self) -> u64 {
        self.backend_timeout_ms
    }

    pub fn verify_credentials(&self) -> bool {
        self.verify_credentials
    }

    pub fn viewpoint(&self) -> CameraViewpoint {
        self.viewpoint
    }

    pub fn alert_duration_secs(&self) -> f64 {
        self.alert_duration_secs
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    pub fn evidence_dir(&self) -> &Path {
        &self.evidence_dir
    }

    pub fn notify_queue_size(&self) -> usize {
        self.notify_queue_size
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Override the viewpoint (command line takes precedence over the file)
    pub fn with_viewpoint(mut self, viewpoint: CameraViewpoint) -> Self {
        self.viewpoint = viewpoint;
        self
    }

    /// Fix the window size, bypassing the duration/fps derivation
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }
}
