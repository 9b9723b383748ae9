//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `source` - Frame source and pose detector boundaries
//! - `replay` - Recorded detection stream standing in for camera + model
//! - `evidence` - Local directory of incorrect-posture frames
//! - `backend` - HTTP client for the reporting service

pub mod backend;
pub mod evidence;
pub mod replay;
pub mod source;

// Re-export commonly used types
pub use backend::{Backend, BackendError, HttpBackend, UploadOutcome};
pub use evidence::{EvidenceError, EvidenceStore};
pub use replay::{Recording, ReplayDetector, ReplayFrames};
pub use source::{AcquisitionError, Frame, FrameSource, ImageFormat, PoseDetector};
