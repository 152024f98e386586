//! Per-frame posture scoring against fixed fencing stance criteria.
//!
//! Only criteria whose joints are visible count towards the maximum, so a
//! partly occluded athlete is scored on what can actually be seen.

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::math;
use crate::pose::{Joint, Pose};
use crate::track::Identity;

const LEVEL_MIN_DX: f32 = 0.01;

/// Reading of a metric whose reference length is zero
const NEUTRAL_READING: f32 = 50.0;
const MAX_BALANCE: f32 = 25.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PostureConfig {
    /// Every joint of a criterion must be above this to evaluate it
    pub visibility_threshold: f32,
    /// Joints below this are never used for geometry
    pub point_threshold: f32,
    /// Visibility required by the stance recognizer
    pub stance_visibility: f32,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            point_threshold: 0.3,
            stance_visibility: 0.6,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionStatus {
    Good,
    #[serde(rename = "Over-Bent")]
    OverBent,
    #[serde(rename = "Under-Extended")]
    UnderExtended,
    Tilted,
    Unclear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CriterionKind {
    /// Angle at the middle joint
    Angle([Joint; 3]),
    /// Inclination of the line between two joints
    Level([Joint; 2]),
}

impl CriterionKind {
    pub fn joints(&self) -> &[Joint] {
        match self {
            Self::Angle(j) => &j[..],
            Self::Level(j) => &j[..],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureCriterion {
    pub name: &'static str,
    pub kind: CriterionKind,
    pub ideal: (f32, f32),
}

pub const CRITERIA: [PostureCriterion; 5] = [
    PostureCriterion {
        name: "Front Knee",
        kind: CriterionKind::Angle([Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle]),
        ideal: (85.0, 125.0),
    },
    PostureCriterion {
        name: "Rear Knee",
        kind: CriterionKind::Angle([Joint::RightHip, Joint::RightKnee, Joint::RightAnkle]),
        ideal: (115.0, 155.0),
    },
    PostureCriterion {
        name: "Weapon Elbow",
        kind: CriterionKind::Angle([Joint::RightShoulder, Joint::RightElbow, Joint::RightWrist]),
        ideal: (100.0, 150.0),
    },
    PostureCriterion {
        name: "Off-Arm Elbow",
        kind: CriterionKind::Angle([Joint::LeftShoulder, Joint::LeftElbow, Joint::LeftWrist]),
        ideal: (70.0, 130.0),
    },
    PostureCriterion {
        name: "Shoulder Level",
        kind: CriterionKind::Level([Joint::LeftShoulder, Joint::RightShoulder]),
        ideal: (-20.0, 20.0),
    },
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CriterionResult {
    pub name: String,
    pub angle: Option<f32>,
    pub status: CriterionStatus,
}

impl CriterionResult {
    #[inline]
    pub fn is_evaluated(&self) -> bool {
        self.status != CriterionStatus::Unclear
    }
}

/// Continuous posture readings, each within [0, 100] except `balance` (0..=25).
///
/// A reading whose joints are missing is 0, one whose reference length
/// collapses to zero is 50.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct PostureMetrics {
    /// Nose over the hip center
    pub head_position: f32,
    pub shoulder_level: f32,
    /// Weapon elbow angle as a share of a straight arm
    pub arm_angle: f32,
    /// Rear knee against the 90..=120 lunge range
    pub leg_posture: f32,
    pub overall_balance: f32,
    /// Shoulder (8) + hip (8) + torso (9) alignment, every ratio capped at 1
    pub balance: f32,
}

impl PostureMetrics {
    pub fn measure(pose: &Pose, threshold: f32) -> Self {
        let pt = |j: Joint| pose.point(j, threshold);

        let nose = pt(Joint::Nose);
        let hips = pt(Joint::LeftHip).zip(pt(Joint::RightHip));
        let shoulders = pt(Joint::LeftShoulder).zip(pt(Joint::RightShoulder));

        let head_position = match (nose, hips) {
            (Some(nose), Some((lh, rh))) => {
                let center = na::center(&lh, &rh);
                deviation_score((nose.x - center.x).abs(), (nose.y - center.y).abs(), 100.0)
            }
            _ => 0.0,
        };

        let shoulder_level = shoulders.map_or(0.0, |(ls, rs)| {
            deviation_score((ls.y - rs.y).abs(), math::distance(&ls, &rs), 200.0)
        });

        let arm_angle = joint_angle(
            pose,
            [Joint::RightShoulder, Joint::RightElbow, Joint::RightWrist],
            threshold,
        )
        .map_or(0.0, |angle| angle / 180.0 * 100.0);

        let leg_posture = joint_angle(
            pose,
            [Joint::RightHip, Joint::RightKnee, Joint::RightAnkle],
            threshold,
        )
        .map_or(0.0, lunge_quality);

        let overall_balance = match (hips, shoulders) {
            (Some((lh, rh)), Some((ls, rs))) => {
                let avg = ((lh.y - rh.y).abs() + (ls.y - rs.y).abs()) / 2.0;
                deviation_score(avg, math::distance(&lh, &ls), 200.0)
            }
            _ => 0.0,
        };

        let mut balance = 0.0;
        if let Some((ls, rs)) = shoulders {
            balance += alignment((ls.y - rs.y).abs(), math::distance(&ls, &rs), 8.0);
        }
        if let Some((lh, rh)) = hips {
            balance += alignment((lh.y - rh.y).abs(), math::distance(&lh, &rh), 8.0);
        }
        if let (Some(nose), Some(lh)) = (nose, pt(Joint::LeftHip)) {
            balance += alignment((nose.x - lh.x).abs(), (nose.y - lh.y).abs(), 9.0);
        }

        Self {
            head_position: reading(head_position, 100.0),
            shoulder_level: reading(shoulder_level, 100.0),
            arm_angle: reading(arm_angle, 100.0),
            leg_posture: reading(leg_posture, 100.0),
            overall_balance: reading(overall_balance, 100.0),
            balance: reading(balance, MAX_BALANCE),
        }
    }
}

/// `100 - deviation / reference * gain`, neutral for a zero reference.
#[inline]
fn deviation_score(deviation: f32, reference: f32, gain: f32) -> f32 {
    if !(reference > 0.0) {
        return NEUTRAL_READING;
    }

    100.0 - deviation / reference * gain
}

/// `(1 - min(deviation / reference, 1)) * weight`, nothing for a zero reference.
#[inline]
fn alignment(deviation: f32, reference: f32, weight: f32) -> f32 {
    if !(reference > 0.0) {
        return 0.0;
    }

    (1.0 - (deviation / reference).min(1.0)) * weight
}

fn lunge_quality(angle: f32) -> f32 {
    if (90.0..=120.0).contains(&angle) {
        100.0
    } else if angle < 90.0 {
        angle / 90.0 * 100.0
    } else {
        100.0 - (angle - 120.0) / 0.6
    }
}

/// Clamped into `[0, max]` and rounded to one decimal, 0 when not finite.
#[inline]
fn reading(value: f32, max: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }

    (value.clamp(0.0, max) * 10.0).round() / 10.0
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PostureReport {
    pub identity: Identity,
    pub criteria: Vec<CriterionResult>,
    pub score: u32,
    pub max_score: u32,
    pub metrics: PostureMetrics,
}

impl PostureReport {
    /// Share of evaluable criteria in their ideal range, 0 when nothing was evaluable.
    pub fn percent(&self) -> f32 {
        if self.max_score == 0 {
            return 0.0;
        }

        (self.score as f32 / self.max_score as f32 * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StanceLabel {
    #[serde(rename = "Lunge/Attack Stance")]
    AttackStance,
    #[serde(rename = "Lunge Posture")]
    LungePosture,
}

impl StanceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttackStance => "Lunge/Attack Stance",
            Self::LungePosture => "Lunge Posture",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostureEvaluator {
    config: PostureConfig,
}

impl PostureEvaluator {
    pub fn new(config: PostureConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, identity: Identity, pose: &Pose) -> PostureReport {
        let mut score = 0;
        let mut max_score = 0;

        let criteria = CRITERIA
            .iter()
            .map(|crit| {
                let result = self.evaluate_criterion(crit, pose);
                if result.is_evaluated() {
                    max_score += 1;
                    if result.status == CriterionStatus::Good {
                        score += 1;
                    }
                }
                result
            })
            .collect();

        PostureReport {
            identity,
            criteria,
            score,
            max_score,
            metrics: PostureMetrics::measure(pose, self.config.point_threshold),
        }
    }

    fn evaluate_criterion(&self, crit: &PostureCriterion, pose: &Pose) -> CriterionResult {
        let unclear = CriterionResult {
            name: crit.name.to_string(),
            angle: None,
            status: CriterionStatus::Unclear,
        };

        if !pose.all_visible(crit.kind.joints(), self.config.visibility_threshold) {
            return unclear;
        }

        let pt = |j: Joint| pose.point(j, self.config.point_threshold);
        let (lo, hi) = crit.ideal;

        match crit.kind {
            CriterionKind::Angle([a, b, c]) => {
                let angle = match (pt(a), pt(b), pt(c)) {
                    (Some(a), Some(b), Some(c)) => math::three_point_angle(a, b, c),
                    _ => None,
                };

                match angle {
                    Some(angle) => {
                        let status = if angle < lo {
                            CriterionStatus::OverBent
                        } else if angle > hi {
                            CriterionStatus::UnderExtended
                        } else {
                            CriterionStatus::Good
                        };

                        CriterionResult {
                            name: crit.name.to_string(),
                            angle: Some(angle),
                            status,
                        }
                    }
                    None => unclear,
                }
            }
            CriterionKind::Level([a, b]) => {
                let tilt = match (pt(a), pt(b)) {
                    (Some(a), Some(b)) => math::line_angle(a, b, LEVEL_MIN_DX),
                    _ => None,
                };

                match tilt {
                    Some(tilt) => CriterionResult {
                        name: crit.name.to_string(),
                        angle: Some(tilt),
                        status: if (lo..=hi).contains(&tilt) {
                            CriterionStatus::Good
                        } else {
                            CriterionStatus::Tilted
                        },
                    },
                    None => unclear,
                }
            }
        }
    }

    /// Coarse stance labels of one frame, counted into per-athlete stats.
    pub fn recognize_stances(&self, pose: &Pose) -> Vec<StanceLabel> {
        let vis = self.config.stance_visibility;
        let mut labels = Vec::new();

        let arm = [Joint::RightShoulder, Joint::RightElbow, Joint::RightWrist];
        if pose.all_visible(&arm, vis) {
            if let Some(angle) = joint_angle(pose, arm, vis) {
                if angle > 160.0 {
                    labels.push(StanceLabel::AttackStance);
                }
            }
        }

        let front = [Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle];
        let rear = [Joint::RightHip, Joint::RightKnee, Joint::RightAnkle];
        if pose.all_visible(&front, vis) && pose.all_visible(&rear, vis) {
            if let (Some(f), Some(r)) = (joint_angle(pose, front, vis), joint_angle(pose, rear, vis)) {
                if f < 100.0 && r > 140.0 {
                    labels.push(StanceLabel::LungePosture);
                }
            }
        }

        labels
    }
}

/// Angle at the middle of three joints, `None` when any is below `threshold`.
pub fn joint_angle(pose: &Pose, joints: [Joint; 3], threshold: f32) -> Option<f32> {
    let [a, b, c] = joints;
    math::three_point_angle(
        pose.point(a, threshold)?,
        pose.point(b, threshold)?,
        pose.point(c, threshold)?,
    )
}
