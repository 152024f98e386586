use nalgebra as na;

const MIN_SEGMENT_LEN: f32 = 1e-6;

/// Angle at `b` between `b->a` and `b->c`, in degrees within [0, 180].
///
/// `None` when one of the segments has zero length or the points are not finite.
pub fn three_point_angle(
    a: na::Point2<f32>,
    b: na::Point2<f32>,
    c: na::Point2<f32>,
) -> Option<f32> {
    let ba = a - b;
    let bc = c - b;

    if ba.norm() < MIN_SEGMENT_LEN || bc.norm() < MIN_SEGMENT_LEN {
        return None;
    }

    let radians = bc.y.atan2(bc.x) - ba.y.atan2(ba.x);
    let mut angle = radians.to_degrees().abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }

    angle.is_finite().then(|| angle)
}

/// Inclination of the line `a -> b` in degrees, `None` for a (near) vertical line.
pub fn line_angle(a: na::Point2<f32>, b: na::Point2<f32>, min_dx: f32) -> Option<f32> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;

    if !(dx.abs() > min_dx) {
        return None;
    }

    let angle = dy.atan2(dx).to_degrees();
    angle.is_finite().then(|| angle)
}

#[inline]
pub fn distance(a: &na::Point2<f32>, b: &na::Point2<f32>) -> f32 {
    na::distance(a, b)
}
