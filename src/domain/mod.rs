//! Domain models - core posture types
//!
//! This module contains the canonical data types used throughout the system:
//! - `KeypointSet` - the 17 landmarks detected in one frame
//! - `PostureLabel` / `Region` - per-region classification results
//! - `CameraViewpoint` - camera mounting position selecting the classifiers
//! - `SessionState` - alert bookkeeping for one monitoring session

pub mod keypoints;
pub mod posture;
pub mod session;

// Re-export commonly used types at module level
pub use keypoints::{Keypoint, KeypointSet, Landmark, Point, NUM_KEYPOINTS};
pub use posture::{CameraViewpoint, PostureLabel, Region};
pub use session::{SessionState, SessionSummary, NO_INCORRECT_POSTURES};
