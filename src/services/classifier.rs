//! Geometric posture classifiers
//!
//! Every classifier is a pure function of a `KeypointSet` (plus the camera
//! viewpoint for the back). The viewpoint picks the variant:
//! - lateral-right / lateral-left: nose-to-shoulder height and hip angle
//! - frontal: shoulder angles and nose/shoulder-to-hip distances

use crate::domain::keypoints::{KeypointSet, Landmark};
use crate::domain::posture::{CameraViewpoint, PostureLabel};
use crate::services::geometry::{angle, distance};

/// Max vertical nose/shoulder separation (normalized) that reads as a
/// dropped head in side view
pub const LATERAL_NECK_MAX_DROP: f32 = 0.08;

/// Minimum shoulder angle for an upright head in frontal view. The left
/// shoulder is measured on the opposite winding, so its bound is `360 - 35`.
pub const FRONTAL_NECK_MIN_ANGLE: f32 = 35.0;
pub const FRONTAL_NECK_MAX_REFLEX_ANGLE: f32 = 360.0 - FRONTAL_NECK_MIN_ANGLE;

/// Open interval of upright hip angles seen from the right
pub const RIGHT_HIP_UPRIGHT: (f32, f32) = (90.0, 115.0);

/// Open interval of upright hip angles seen from the left (reflex winding)
pub const LEFT_HIP_UPRIGHT: (f32, f32) = (245.0, 270.0);

/// Side of the body facing a lateral camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateralSide {
    Right,
    Left,
}

impl LateralSide {
    pub fn from_viewpoint(viewpoint: CameraViewpoint) -> Option<Self> {
        match viewpoint {
            CameraViewpoint::LateralRight => Some(LateralSide::Right),
            CameraViewpoint::LateralLeft => Some(LateralSide::Left),
            CameraViewpoint::Frontal => None,
        }
    }
}

/// Labels produced for one frame.
///
/// `back` is `None` when the back classifier cannot decide: a frontal tie or
/// a NaN hip angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub neck: PostureLabel,
    pub back: Option<PostureLabel>,
}

/// Run the neck and back classifiers matching the viewpoint
pub fn classify(keypoints: &KeypointSet, viewpoint: CameraViewpoint) -> Classification {
    match LateralSide::from_viewpoint(viewpoint) {
        Some(side) => Classification {
            neck: lateral_neck(keypoints),
            back: lateral_back(keypoints, side),
        },
        None => Classification { neck: frontal_neck(keypoints), back: frontal_back(keypoints) },
    }
}

/// Side view: the head is forward-leaning when the nose sits almost level
/// with both shoulders
pub fn lateral_neck(keypoints: &KeypointSet) -> PostureLabel {
    let nose_y = keypoints.point(Landmark::Nose).y;
    let left_drop = (nose_y - keypoints.point(Landmark::LeftShoulder).y).abs();
    let right_drop = (nose_y - keypoints.point(Landmark::RightShoulder).y).abs();

    if left_drop < LATERAL_NECK_MAX_DROP && right_drop < LATERAL_NECK_MAX_DROP {
        PostureLabel::ForwardLeaning
    } else {
        PostureLabel::Upright
    }
}

/// Front view: the nose must stay high enough above the shoulder line,
/// measured as the angle at each shoulder
pub fn frontal_neck(keypoints: &KeypointSet) -> PostureLabel {
    let nose = keypoints.point(Landmark::Nose);
    let left_shoulder = keypoints.point(Landmark::LeftShoulder);
    let right_shoulder = keypoints.point(Landmark::RightShoulder);

    let right_shoulder_angle = angle(nose, right_shoulder, left_shoulder);
    let left_shoulder_angle = angle(nose, left_shoulder, right_shoulder);

    if right_shoulder_angle > FRONTAL_NECK_MIN_ANGLE
        && left_shoulder_angle < FRONTAL_NECK_MAX_REFLEX_ANGLE
    {
        PostureLabel::Upright
    } else {
        PostureLabel::ForwardLeaning
    }
}

/// Side view: classify from the shoulder-hip-knee angle of the visible side
pub fn lateral_back(keypoints: &KeypointSet, side: LateralSide) -> Option<PostureLabel> {
    let hip_angle = match side {
        LateralSide::Right => angle(
            keypoints.point(Landmark::RightShoulder),
            keypoints.point(Landmark::RightHip),
            keypoints.point(Landmark::RightKnee),
        ),
        LateralSide::Left => angle(
            keypoints.point(Landmark::LeftShoulder),
            keypoints.point(Landmark::LeftHip),
            keypoints.point(Landmark::LeftKnee),
        ),
    };
    hip_angle_label(side, hip_angle)
}

/// Map a hip angle to a back label. Interval bounds are exclusive for
/// upright; a bound value itself counts as the adjacent incorrect posture.
/// A NaN angle (non-finite keypoints) has no label.
pub fn hip_angle_label(side: LateralSide, hip_angle: f32) -> Option<PostureLabel> {
    if hip_angle.is_nan() {
        return None;
    }
    let label = match side {
        LateralSide::Right => {
            let (low, high) = RIGHT_HIP_UPRIGHT;
            if hip_angle <= low {
                PostureLabel::ForwardLeaning
            } else if hip_angle >= high {
                PostureLabel::Reclined
            } else {
                PostureLabel::Upright
            }
        }
        // mirrored: small reflex angles lean back, large ones lean forward
        LateralSide::Left => {
            let (low, high) = LEFT_HIP_UPRIGHT;
            if hip_angle <= low {
                PostureLabel::Reclined
            } else if hip_angle >= high {
                PostureLabel::ForwardLeaning
            } else {
                PostureLabel::Upright
            }
        }
    };
    Some(label)
}

/// Front view: leaning toward the camera brings the nose closer to the hips
/// than the shoulders are. Returns `None` on an exact tie.
pub fn frontal_back(keypoints: &KeypointSet) -> Option<PostureLabel> {
    let nose = keypoints.point(Landmark::Nose);
    let left_hip = keypoints.point(Landmark::LeftHip);
    let right_hip = keypoints.point(Landmark::RightHip);

    let shoulder_hip_dist = distance(keypoints.point(Landmark::LeftShoulder), left_hip)
        + distance(keypoints.point(Landmark::RightShoulder), right_hip);
    let nose_hip_dist = distance(nose, left_hip) + distance(nose, right_hip);

    if nose_hip_dist < shoulder_hip_dist {
        Some(PostureLabel::ForwardLeaning)
    } else if nose_hip_dist > shoulder_hip_dist {
        Some(PostureLabel::Upright)
    } else {
        None
    }
}
