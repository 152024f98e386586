use nalgebra as na;

use crate::bbox::{BBox, Ltwh};
use crate::pose::{CoordSpace, Keypoint, Pose, RawKeypoint};

#[inline]
pub fn map_keypoint(raw: &RawKeypoint, region: &BBox<Ltwh>, space: CoordSpace) -> Keypoint {
    let (x, y) = match space {
        CoordSpace::Normalized => (
            raw.x * region.width() + region.left(),
            raw.y * region.height() + region.top(),
        ),
        CoordSpace::Pixel => (raw.x + region.left(), raw.y + region.top()),
    };

    Keypoint {
        joint: raw.joint,
        point: na::Point2::new(x, y),
        visibility: raw.visibility,
    }
}

/// Moves region-local joints into full-frame pixel coordinates.
pub fn map_to_frame(raw: &[RawKeypoint], region: &BBox<Ltwh>, space: CoordSpace) -> Pose {
    Pose::from_keypoints(raw.iter().map(|r| map_keypoint(r, region, space)))
}
