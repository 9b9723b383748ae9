//! Replay of recorded detections
//!
//! A recording is a JSONL file with one entry per captured frame:
//!
//! ```text
//! {"keypoints": [[y, x, score], ... 17 rows], "image": "frames/0001.jpg"}
//! ```
//!
//! Rows use the model's `[y, x, score]` order. `image` is optional and
//! resolved relative to the recording file; without it the entry itself
//! stands in for the frame. Blank lines and lines starting with `#` are
//! ignored.
//!
//! The recording splits into a `FrameSource` and a `PoseDetector` that stay
//! in lockstep, replacing the camera and the model for offline runs.

use crate::domain::keypoints::KeypointSet;
use crate::io::source::{AcquisitionError, Frame, FrameSource, ImageFormat, PoseDetector};
use bytes::Bytes;
use serde::Deserialize;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RecordEntry {
    keypoints: Vec<[f32; 3]>,
    #[serde(default)]
    image: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct RecordedFrame {
    keypoints: KeypointSet,
    image: Option<PathBuf>,
    raw: Bytes,
}

/// Parsed recording, ready to be replayed
#[derive(Debug, Clone)]
pub struct Recording {
    frames: Vec<RecordedFrame>,
}

impl Recording {
    /// Read and parse a recording file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AcquisitionError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            AcquisitionError::ReadRecording { path: path.to_path_buf(), source }
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let recording = Self::parse(&content, base_dir)?;
        debug!(path = %path.display(), frames = %recording.len(), "recording_loaded");
        Ok(recording)
    }

    /// Parse recording content; image paths are resolved against `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, AcquisitionError> {
        let mut frames = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let entry: RecordEntry = serde_json::from_str(trimmed)
                .map_err(|source| AcquisitionError::ParseRecording { line: line_no, source })?;
            let keypoints = KeypointSet::from_model_output(&entry.keypoints).ok_or(
                AcquisitionError::KeypointCount { line: line_no, count: entry.keypoints.len() },
            )?;

            frames.push(RecordedFrame {
                keypoints,
                image: entry.image.map(|p| if p.is_absolute() { p } else { base_dir.join(p) }),
                raw: Bytes::copy_from_slice(trimmed.as_bytes()),
            });
        }

        if frames.is_empty() {
            return Err(AcquisitionError::Unavailable("recording contains no frames".to_string()));
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into a frame source and a detector replaying the same frames
    pub fn into_replay(self) -> (ReplayFrames, ReplayDetector) {
        let mut frames = VecDeque::with_capacity(self.frames.len());
        let mut detections = VecDeque::with_capacity(self.frames.len());
        for recorded in self.frames {
            frames.push_back((recorded.image, recorded.raw));
            detections.push_back(recorded.keypoints);
        }
        (ReplayFrames { frames, next_seq: 0 }, ReplayDetector { detections, next_seq: 0 })
    }
}

/// Frames of a recording, read lazily from disk
pub struct ReplayFrames {
    frames: VecDeque<(Option<PathBuf>, Bytes)>,
    next_seq: u64,
}

impl ReplayFrames {
    /// `count` frames without pixel data
    pub fn blank(count: usize) -> Self {
        Self { frames: (0..count).map(|_| (None, Bytes::new())).collect(), next_seq: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplayFrames {
    fn next_frame(&mut self) -> Result<Option<Frame>, AcquisitionError> {
        let Some((image, raw)) = self.frames.pop_front() else {
            return Ok(None);
        };
        let seq = self.next_seq;
        self.next_seq += 1;

        let frame = match image {
            Some(path) => {
                let bytes = fs::read(&path)
                    .map_err(|source| AcquisitionError::ReadFrame { seq, path: path.clone(), source })?;
                Frame::new(seq, Bytes::from(bytes), ImageFormat::from_path(&path))
            }
            None if raw.is_empty() => Frame::empty(seq),
            None => Frame::new(seq, raw, ImageFormat::Json),
        };
        Ok(Some(frame))
    }
}

/// Detector answering each frame with its recorded keypoints
pub struct ReplayDetector {
    detections: VecDeque<KeypointSet>,
    next_seq: u64,
}

impl ReplayDetector {
    pub fn from_keypoints<I: IntoIterator<Item = KeypointSet>>(keypoints: I) -> Self {
        Self { detections: keypoints.into_iter().collect(), next_seq: 0 }
    }
}

impl PoseDetector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<KeypointSet, AcquisitionError> {
        if frame.seq != self.next_seq {
            return Err(AcquisitionError::Detection {
                seq: frame.seq,
                reason: format!("replay expected frame {}", self.next_seq),
            });
        }
        let keypoints = self.detections.pop_front().ok_or_else(|| AcquisitionError::Detection {
            seq: frame.seq,
            reason: "recording has no more detections".to_string(),
        })?;
        self.next_seq += 1;
        Ok(keypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keypoints::{Landmark, Point};
    use tempfile::tempdir;

    fn entry_line(nose_y: f32, image: Option<&str>) -> String {
        let mut rows = vec![[0.5f32, 0.5, 0.9]; 17];
        rows[0] = [nose_y, 0.4, 0.8];
        let mut value = serde_json::json!({ "keypoints": rows });
        if let Some(image) = image {
            value["image"] = serde_json::json!(image);
        }
        value.to_string()
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let content = format!("# header\n\n{}\n{}\n", entry_line(0.2, None), entry_line(0.3, None));
        let recording = Recording::parse(&content, Path::new(".")).unwrap();
        assert_eq!(recording.len(), 2);
    }

    #[test]
    fn test_parse_rejects_wrong_keypoint_count() {
        let content = r#"{"keypoints": [[0.1, 0.2, 0.3]]}"#;
        let err = Recording::parse(content, Path::new(".")).unwrap_err();
        assert!(matches!(err, AcquisitionError::KeypointCount { line: 1, count: 1 }));
    }

    #[test]
    fn test_parse_reports_line_of_invalid_json() {
        let content = format!("{}\nnot json\n", entry_line(0.2, None));
        let err = Recording::parse(&content, Path::new(".")).unwrap_err();
        assert!(matches!(err, AcquisitionError::ParseRecording { line: 2, .. }));
    }

    #[test]
    fn test_empty_recording_is_unavailable() {
        let err = Recording::parse("# nothing\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, AcquisitionError::Unavailable(_)));
    }

    #[test]
    fn test_replay_frames_and_detections_stay_in_step() {
        let content = format!("{}\n{}\n", entry_line(0.2, None), entry_line(0.3, None));
        let (mut frames, mut detector) =
            Recording::parse(&content, Path::new(".")).unwrap().into_replay();

        let first = frames.next_frame().unwrap().unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(first.format, ImageFormat::Json);
        let keypoints = detector.detect(&first).unwrap();
        assert_eq!(keypoints.point(Landmark::Nose), Point::new(0.4, 0.2));

        let second = frames.next_frame().unwrap().unwrap();
        assert_eq!(detector.detect(&second).unwrap().point(Landmark::Nose).y, 0.3);

        assert!(frames.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_detector_rejects_out_of_order_frame() {
        let mut detector = ReplayDetector::from_keypoints(vec![KeypointSet::default(); 2]);
        let err = detector.detect(&Frame::empty(1)).unwrap_err();
        assert!(matches!(err, AcquisitionError::Detection { seq: 1, .. }));
    }

    #[test]
    fn test_image_is_read_relative_to_recording() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("0.jpg"), b"jpeg-bytes").unwrap();
        let recording_path = dir.path().join("session.jsonl");
        fs::write(&recording_path, entry_line(0.2, Some("0.jpg")) + "\n").unwrap();

        let (mut frames, _) = Recording::load(&recording_path).unwrap().into_replay();
        let frame = frames.next_frame().unwrap().unwrap();
        assert_eq!(frame.format, ImageFormat::Jpeg);
        assert_eq!(&frame.image[..], b"jpeg-bytes");
    }

    #[test]
    fn test_missing_image_is_a_read_error() {
        let dir = tempdir().unwrap();
        let content = entry_line(0.2, Some("missing.png"));
        let (mut frames, _) = Recording::parse(&content, dir.path()).unwrap().into_replay();
        let err = frames.next_frame().unwrap_err();
        assert!(matches!(err, AcquisitionError::ReadFrame { seq: 0, .. }));
    }

    #[test]
    fn test_blank_frames() {
        let mut frames = ReplayFrames::blank(2);
        assert_eq!(frames.remaining(), 2);
        assert!(frames.next_frame().unwrap().unwrap().image.is_empty());
        assert_eq!(frames.next_frame().unwrap().unwrap().seq, 1);
        assert!(frames.next_frame().unwrap().is_none());
    }
}
