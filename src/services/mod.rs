//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `geometry` - Angle and distance between keypoints
//! - `classifier` - Neck and back posture classifiers per viewpoint
//! - `history` - Per-region sliding window and alert gate
//! - `monitor` - Per-frame orchestration of classify, push, alert
//! - `reporter` - Session bookkeeping and end-of-session reporting
//! - `notify_worker` - Async alert notification worker
//! - `runner` - Frame loop driving the monitor

pub mod classifier;
pub mod geometry;
pub mod history;
pub mod monitor;
pub mod notify_worker;
pub mod reporter;
pub mod runner;

// Re-export commonly used types
pub use classifier::{classify, Classification};
pub use history::{window_capacity, RegionHistoryBuffer};
pub use monitor::{FrameOutcome, PostureMonitor};
pub use notify_worker::{create_notify_worker, NotifyCmd, NotifySender, NotifyWorker};
pub use reporter::{AlertReporter, SessionReport, SessionStage, StageOutcome};
pub use runner::{run_monitoring, LoopExit};
