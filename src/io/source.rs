//! Frame acquisition and inference boundaries
//!
//! Camera capture and the pose-estimation model live outside this crate.
//! The monitor only sees them through two traits:
//! - `FrameSource` yields captured frames until the stream ends
//! - `PoseDetector` turns a frame into the 17 keypoints of the subject
//!
//! Concrete inference backends are injected at construction; nothing in the
//! pipeline depends on which model produced the keypoints.

use crate::domain::keypoints::KeypointSet;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Encoding of a captured frame, used to name evidence files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    /// Serialized detection record, used when no image was captured
    Json,
    Raw,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Json => "json",
            ImageFormat::Raw => "bin",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => ImageFormat::Jpeg,
            Some("png") => ImageFormat::Png,
            Some("json") => ImageFormat::Json,
            _ => ImageFormat::Raw,
        }
    }
}

/// One captured video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the capture stream, starting at 0
    pub seq: u64,
    pub image: Bytes,
    pub format: ImageFormat,
}

impl Frame {
    pub fn new(seq: u64, image: Bytes, format: ImageFormat) -> Self {
        Self { seq, image, format }
    }

    /// A frame with no pixel data, for sources without a camera
    pub fn empty(seq: u64) -> Self {
        Self { seq, image: Bytes::new(), format: ImageFormat::Raw }
    }
}

/// Failures before or during frame capture and detection
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no camera or frame source available: {0}")]
    Unavailable(String),

    #[error("failed to read frame {seq} from {path}")]
    ReadFrame {
        seq: u64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read recording {path}")]
    ReadRecording {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid recording entry on line {line}")]
    ParseRecording {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("recording line {line} has {count} keypoints, expected 17")]
    KeypointCount { line: usize, count: usize },

    #[error("pose detection failed for frame {seq}: {reason}")]
    Detection { seq: u64, reason: String },
}

/// Source of captured frames
pub trait FrameSource {
    /// Next frame, or `Ok(None)` once the stream has ended
    fn next_frame(&mut self) -> Result<Option<Frame>, AcquisitionError>;
}

/// Pose-estimation model: one blocking call per frame
pub trait PoseDetector {
    fn detect(&mut self, frame: &Frame) -> Result<KeypointSet, AcquisitionError>;
}
