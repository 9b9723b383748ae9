//! Posture vocabulary: monitored regions, labels, and camera viewpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monitored body area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Neck,
    Back,
}

impl Region {
    /// Value sent to the backend in the `alert` field
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Neck => "neck",
            Region::Back => "back",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Posture observed for one region in one frame.
///
/// Neck uses only `Upright` and `ForwardLeaning`; back uses all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostureLabel {
    Upright,
    ForwardLeaning,
    Reclined,
}

impl PostureLabel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureLabel::Upright => "upright",
            PostureLabel::ForwardLeaning => "forward-leaning",
            PostureLabel::Reclined => "reclined",
        }
    }

    #[inline]
    pub fn is_upright(&self) -> bool {
        matches!(self, PostureLabel::Upright)
    }

    /// Human-readable text used on screen and in the session summary,
    /// e.g. "forward-leaning neck" or "reclined back"
    pub fn describe(&self, region: Region) -> &'static str {
        match (self, region) {
            (PostureLabel::Upright, Region::Neck) => "upright neck",
            (PostureLabel::ForwardLeaning, Region::Neck) => "forward-leaning neck",
            (PostureLabel::Reclined, Region::Neck) => "reclined neck",
            (PostureLabel::Upright, Region::Back) => "upright back",
            (PostureLabel::ForwardLeaning, Region::Back) => "forward-leaning back",
            (PostureLabel::Reclined, Region::Back) => "reclined back",
        }
    }
}

impl fmt::Display for PostureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera mounting position, fixed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum CameraViewpoint {
    LateralRight,
    Frontal,
    LateralLeft,
}

impl CameraViewpoint {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraViewpoint::LateralRight => "lateral-right",
            CameraViewpoint::Frontal => "frontal",
            CameraViewpoint::LateralLeft => "lateral-left",
        }
    }
}

impl fmt::Display for CameraViewpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraViewpoint {
    type Err = String;

    /// Accepts the kebab-case names and the onboarding menu codes 1, 2, 3
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "lateral-right" | "lateral_right" => Ok(CameraViewpoint::LateralRight),
            "2" | "frontal" => Ok(CameraViewpoint::Frontal),
            "3" | "lateral-left" | "lateral_left" => Ok(CameraViewpoint::LateralLeft),
            other => Err(format!(
                "unknown camera viewpoint '{}': expected lateral-right, frontal, lateral-left (or 1, 2, 3)",
                other
            )),
        }
    }
}

impl TryFrom<String> for CameraViewpoint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
