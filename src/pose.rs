use nalgebra as na;
use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    Nose,
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

impl Joint {
    pub const COUNT: usize = 13;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::Nose,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Whether estimator output is relative to the region size or in region pixels
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSpace {
    Normalized,
    Pixel,
}

/// Joint as reported by the estimator, in the cropped region's frame
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawKeypoint {
    pub joint: Joint,
    pub x: f32,
    pub y: f32,
    pub visibility: f32,
}

/// Joint in full-frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub joint: Joint,
    pub point: na::Point2<f32>,
    pub visibility: f32,
}

impl Keypoint {
    #[inline]
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }
}

/// All joints of one athlete in one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    joints: [Option<Keypoint>; Joint::COUNT],
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keypoints(keypoints: impl IntoIterator<Item = Keypoint>) -> Self {
        let mut pose = Self::new();
        for kp in keypoints {
            pose.insert(kp);
        }
        pose
    }

    #[inline]
    pub fn insert(&mut self, kp: Keypoint) {
        self.joints[kp.joint.index()] = Some(kp);
    }

    #[inline]
    pub fn get(&self, joint: Joint) -> Option<&Keypoint> {
        self.joints[joint.index()].as_ref()
    }

    /// Point of `joint` when its visibility is above `threshold`.
    #[inline]
    pub fn point(&self, joint: Joint, threshold: f32) -> Option<na::Point2<f32>> {
        self.get(joint)
            .filter(|kp| kp.is_visible(threshold))
            .map(|kp| kp.point)
    }

    pub fn all_visible(&self, joints: &[Joint], threshold: f32) -> bool {
        joints
            .iter()
            .all(|&j| self.get(j).map_or(false, |kp| kp.is_visible(threshold)))
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.joints.iter().flatten()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.iter().all(Option::is_none)
    }
}

/// Pose estimation capability, run on one cropped athlete region
pub trait PoseEstimator {
    fn coord_space(&self) -> CoordSpace {
        CoordSpace::Normalized
    }

    /// `Ok(None)` when no body was found in the region.
    fn estimate(&mut self, region: ArrayView3<'_, u8>) -> Result<Option<Vec<RawKeypoint>>, Error>;
}
