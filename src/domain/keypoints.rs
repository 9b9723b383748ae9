//! Body keypoints produced by the pose-estimation model for one frame

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of landmarks emitted by the model
pub const NUM_KEYPOINTS: usize = 17;

/// Anatomical landmarks in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landmark {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Landmark {
    pub const ALL: [Landmark; NUM_KEYPOINTS] = [
        Landmark::Nose,
        Landmark::LeftEye,
        Landmark::RightEye,
        Landmark::LeftEar,
        Landmark::RightEar,
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftElbow,
        Landmark::RightElbow,
        Landmark::LeftWrist,
        Landmark::RightWrist,
        Landmark::LeftHip,
        Landmark::RightHip,
        Landmark::LeftKnee,
        Landmark::RightKnee,
        Landmark::LeftAnkle,
        Landmark::RightAnkle,
    ];

    /// Position of this landmark in the model output
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Landmark::Nose => "nose",
            Landmark::LeftEye => "left_eye",
            Landmark::RightEye => "right_eye",
            Landmark::LeftEar => "left_ear",
            Landmark::RightEar => "right_ear",
            Landmark::LeftShoulder => "left_shoulder",
            Landmark::RightShoulder => "right_shoulder",
            Landmark::LeftElbow => "left_elbow",
            Landmark::RightElbow => "right_elbow",
            Landmark::LeftWrist => "left_wrist",
            Landmark::RightWrist => "right_wrist",
            Landmark::LeftHip => "left_hip",
            Landmark::RightHip => "right_hip",
            Landmark::LeftKnee => "left_knee",
            Landmark::RightKnee => "right_knee",
            Landmark::LeftAnkle => "left_ankle",
            Landmark::RightAnkle => "right_ankle",
        }
    }
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 2D point in normalized image coordinates (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A single detected landmark with its confidence
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    pub point: Point,
    pub score: f32,
}

/// Snapshot of all 17 landmarks for one frame.
///
/// Built once per frame and never mutated afterwards. Classifiers only read
/// coordinates; the score is kept for consumers that filter low-confidence
/// points (rendering, logging).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointSet {
    points: [Keypoint; NUM_KEYPOINTS],
}

impl KeypointSet {
    pub fn new(points: [Keypoint; NUM_KEYPOINTS]) -> Self {
        Self { points }
    }

    /// Build from raw model output rows of `[y, x, score]`.
    ///
    /// Returns `None` unless exactly 17 rows are supplied.
    pub fn from_model_output(rows: &[[f32; 3]]) -> Option<Self> {
        if rows.len() != NUM_KEYPOINTS {
            return None;
        }
        let mut points = [Keypoint::default(); NUM_KEYPOINTS];
        for (slot, &[y, x, score]) in points.iter_mut().zip(rows) {
            *slot = Keypoint { point: Point::new(x, y), score };
        }
        Some(Self { points })
    }

    /// Coordinates of a landmark
    #[inline]
    pub fn point(&self, landmark: Landmark) -> Point {
        self.points[landmark.index()].point
    }

    #[inline]
    pub fn keypoint(&self, landmark: Landmark) -> Keypoint {
        self.points[landmark.index()]
    }

    /// Return a copy with one landmark moved
    pub fn with_point(mut self, landmark: Landmark, point: Point) -> Self {
        self.points[landmark.index()].point = point;
        self
    }
}

impl Default for KeypointSet {
    fn default() -> Self {
        Self { points: [Keypoint::default(); NUM_KEYPOINTS] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_order_matches_model_output() {
        assert_eq!(Landmark::Nose.index(), 0);
        assert_eq!(Landmark::LeftShoulder.index(), 5);
        assert_eq!(Landmark::RightHip.index(), 12);
        assert_eq!(Landmark::RightAnkle.index(), 16);
        for (i, landmark) in Landmark::ALL.iter().enumerate() {
            assert_eq!(landmark.index(), i);
        }
    }

    #[test]
    fn test_from_model_output_swaps_axes() {
        let mut rows = [[0.0f32; 3]; NUM_KEYPOINTS];
        rows[0] = [0.25, 0.75, 0.9];
        let set = KeypointSet::from_model_output(&rows).unwrap();

        let nose = set.keypoint(Landmark::Nose);
        assert_eq!(nose.point, Point::new(0.75, 0.25));
        assert_eq!(nose.score, 0.9);
    }

    #[test]
    fn test_from_model_output_rejects_wrong_length() {
        let rows = [[0.0f32; 3]; 16];
        assert!(KeypointSet::from_model_output(&rows).is_none());
    }
}
