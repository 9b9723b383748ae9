//! Planar geometry helpers shared by the posture classifiers

use crate::domain::keypoints::Point;

/// Directed angle at vertex `p2`, from the ray `p2→p1` to the ray `p2→p3`,
/// in degrees within `[0, 360)`.
///
/// Negative differences are shifted by 360 rather than folded to an absolute
/// angle: the classifier thresholds depend on this winding (a lateral-left
/// hip reads around 250° where a lateral-right hip reads around 100°).
#[inline]
pub fn angle(p1: Point, p2: Point, p3: Point) -> f32 {
    let to_p3 = (p3.y - p2.y).atan2(p3.x - p2.x);
    let to_p1 = (p1.y - p2.y).atan2(p1.x - p2.x);
    let degrees = (to_p3 - to_p1).to_degrees();

    if degrees < 0.0 {
        let shifted = degrees + 360.0;
        // a tiny negative difference can round up to exactly 360
        if shifted >= 360.0 {
            0.0
        } else {
            shifted
        }
    } else {
        degrees
    }
}

/// Euclidean distance in normalized image coordinates
#[inline]
pub fn distance(a: Point, b: Point) -> f32 {
    (b.x - a.x).hypot(b.y - a.y)
}
