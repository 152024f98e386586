//! Per-athlete action segmentation.
//!
//! A hysteresis state machine over the reference joint's velocity: motion
//! above `vel_start` opens an action, and `confirmation` consecutive frames
//! below `vel_end` close it again. The frames the athlete spent settling
//! are trimmed off the end of the segment.

use serde_derive::{Deserialize, Serialize};
use std::mem;
use tracing::debug;

use crate::math;
use crate::pose::Joint;
use crate::posture::joint_angle;
use crate::rolling_window::{PoseSample, RollingWindow};
use crate::scoring::ActionMetrics;

const WEAPON_ARM: [Joint; 3] = [Joint::RightShoulder, Joint::RightElbow, Joint::RightWrist];
const REAR_LEG: [Joint; 3] = [Joint::RightHip, Joint::RightKnee, Joint::RightAnkle];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// px/s, IDLE -> ACTION above this
    pub vel_start: f32,
    /// px/s, frames below this count towards the end of an action
    pub vel_end: f32,
    pub min_duration_secs: f32,
    pub min_window: usize,
    pub min_confirmation: usize,
    pub reference_joint: Joint,
    pub point_threshold: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            vel_start: 10.0,
            vel_end: 100.0,
            min_duration_secs: 0.01,
            min_window: 5,
            min_confirmation: 3,
            reference_joint: Joint::RightHip,
            point_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    Idle,
    Action,
}

/// Accepted action, never empty
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSegment {
    samples: Vec<PoseSample>,
}

impl ActionSegment {
    #[inline]
    pub fn first(&self) -> &PoseSample {
        &self.samples[0]
    }

    #[inline]
    pub fn last(&self) -> &PoseSample {
        &self.samples[self.samples.len() - 1]
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.last().timestamp - self.first().timestamp
    }

    pub fn metrics(&self, joint: Joint, threshold: f32) -> ActionMetrics {
        let duration = self.duration();

        let anchors: Vec<_> = self
            .samples
            .iter()
            .filter_map(|s| s.pose.point(joint, threshold))
            .collect();

        let lunge_speed = match (anchors.first(), anchors.last()) {
            (Some(a), Some(b)) if anchors.len() > 1 && duration > 0.0 => {
                math::distance(a, b) / duration
            }
            _ => 0.0,
        };

        let max_arm_angle = self
            .samples
            .iter()
            .filter_map(|s| joint_angle(&s.pose, WEAPON_ARM, threshold))
            .fold(None, |acc: Option<f32>, a| Some(acc.map_or(a, |m| m.max(a))));

        let min_rear_knee_angle = self
            .samples
            .iter()
            .filter_map(|s| joint_angle(&s.pose, REAR_LEG, threshold))
            .fold(None, |acc: Option<f32>, a| Some(acc.map_or(a, |m| m.min(a))));

        ActionMetrics {
            lunge_speed,
            max_arm_angle,
            min_rear_knee_angle,
            duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionSegmenter {
    config: SegmenterConfig,
    window: RollingWindow,
    confirmation: usize,
    state: SegmenterState,
    buffer: Vec<PoseSample>,
    idle_count: usize,
    settle_start: Option<u64>,
}

impl ActionSegmenter {
    pub fn new(config: SegmenterConfig, fps: f32) -> Self {
        let size = RollingWindow::size_for(fps, config.min_window);
        let confirmation = RollingWindow::size_for(fps, config.min_confirmation);

        Self {
            window: RollingWindow::new(config.reference_joint, config.point_threshold, size),
            confirmation,
            state: SegmenterState::Idle,
            buffer: Vec::new(),
            idle_count: 0,
            settle_start: None,
            config,
        }
    }

    #[inline]
    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// Feeds the next sample, returns a segment when an action has just ended.
    pub fn push(&mut self, sample: PoseSample) -> Option<ActionSegment> {
        self.window.push(sample.clone());
        let velocity = self.window.velocity()?;

        match self.state {
            SegmenterState::Idle => {
                if velocity > self.config.vel_start {
                    debug!(
                        "action started at frame {} ({:.1} px/s)",
                        sample.frame_index, velocity
                    );

                    self.state = SegmenterState::Action;
                    self.buffer = self.window.iter().cloned().collect();
                    self.idle_count = 0;
                    self.settle_start = None;
                }

                None
            }

            SegmenterState::Action => {
                self.buffer.push(sample);

                if velocity < self.config.vel_end {
                    if self.idle_count == 0 {
                        self.settle_start = self.window.oldest().map(|s| s.frame_index);
                    }
                    self.idle_count += 1;
                } else {
                    self.idle_count = 0;
                    self.settle_start = None;
                }

                if self.idle_count >= self.confirmation {
                    self.close()
                } else {
                    None
                }
            }
        }
    }

    /// Closes an action still open at the end of the stream.
    pub fn finish(&mut self) -> Option<ActionSegment> {
        let segment = match self.state {
            SegmenterState::Action => self.close(),
            SegmenterState::Idle => None,
        };

        self.window.clear();
        segment
    }

    fn close(&mut self) -> Option<ActionSegment> {
        let mut samples = mem::take(&mut self.buffer);

        if let Some(settle) = self.settle_start.take() {
            samples.retain(|s| s.frame_index <= settle);
        }

        self.state = SegmenterState::Idle;
        self.idle_count = 0;

        let (first, last) = match (samples.first(), samples.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                debug!("discarding empty action");
                return None;
            }
        };

        let duration = last.timestamp - first.timestamp;
        if !(duration >= self.config.min_duration_secs) {
            debug!(
                "discarding action at frame {}: {:.3}s is too short",
                first.frame_index, duration
            );
            return None;
        }

        debug!(
            "action closed, frames {}..={} ({:.2}s)",
            first.frame_index, last.frame_index, duration
        );

        Some(ActionSegment { samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, Pose};
    use nalgebra as na;

    const FPS: f32 = 25.0;

    fn hip_sample(index: u64, x: f32) -> PoseSample {
        let pose = Pose::from_keypoints([Keypoint {
            joint: Joint::RightHip,
            point: na::Point2::new(x, 200.0),
            visibility: 0.9,
        }]);
        PoseSample::new(index, index as f32 / FPS, pose)
    }

    fn run(segmenter: &mut ActionSegmenter, xs: &[f32]) -> Vec<ActionSegment> {
        let mut out: Vec<_> = xs
            .iter()
            .enumerate()
            .filter_map(|(i, &x)| segmenter.push(hip_sample(i as u64, x)))
            .collect();
        out.extend(segmenter.finish());
        out
    }

    /// Moves 20px per frame for `frames` frames starting at `from`.
    fn moving(from: f32, frames: usize) -> Vec<f32> {
        (0..frames).map(|i| from + 20.0 * i as f32).collect()
    }

    #[test]
    fn test_constant_hip_yields_nothing() {
        let mut seg = ActionSegmenter::new(SegmenterConfig::default(), FPS);
        let out = run(&mut seg, &[250.0; 100]);

        assert!(out.is_empty());
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_linear_move_yields_one_action() {
        let mut seg = ActionSegmenter::new(SegmenterConfig::default(), FPS);

        let mut xs = moving(100.0, 11);
        xs.extend([300.0; 7]);
        let out = run(&mut seg, &xs);

        assert_eq!(out.len(), 1);
        let action = &out[0];
        assert_eq!(action.first().frame_index, 0);
        assert_eq!(action.last().frame_index, 10);

        let metrics = action.metrics(Joint::RightHip, 0.3);
        assert!((metrics.duration - 0.4).abs() < 1e-4);
        assert!((metrics.lunge_speed - 500.0).abs() < 1e-1, "{}", metrics.lunge_speed);
        assert_eq!(metrics.max_arm_angle, None);
    }

    #[test]
    fn test_open_action_is_flushed_by_finish() {
        let mut seg = ActionSegmenter::new(SegmenterConfig::default(), FPS);

        let mut xs = moving(100.0, 11);
        xs.extend([300.0; 5]);

        for (i, &x) in xs.iter().enumerate() {
            assert!(seg.push(hip_sample(i as u64, x)).is_none());
        }
        // two low windows so far, short of the five needed
        assert_eq!(seg.state(), SegmenterState::Action);

        let action = seg.finish().unwrap();
        assert_eq!(action.first().frame_index, 0);
        assert_eq!(action.last().frame_index, 10);

        let metrics = action.metrics(Joint::RightHip, 0.3);
        assert!((metrics.lunge_speed - 500.0).abs() < 1e-1, "{}", metrics.lunge_speed);
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_action_closes_after_confirmation() {
        let mut seg = ActionSegmenter::new(SegmenterConfig::default(), FPS);

        let mut xs = moving(100.0, 11);
        xs.extend([300.0; 9]);

        let mut closed_at = None;
        for (i, &x) in xs.iter().enumerate() {
            if let Some(segment) = seg.push(hip_sample(i as u64, x)) {
                closed_at = Some(i);
                assert_eq!(segment.last().frame_index, 10);
            }
        }

        // first still window at frame 14, five low frames later
        assert_eq!(closed_at, Some(18));
        assert_eq!(seg.state(), SegmenterState::Idle);
        assert!(seg.finish().is_none());
    }

    #[test]
    fn test_short_pause_keeps_one_action() {
        let mut seg = ActionSegmenter::new(SegmenterConfig::default(), FPS);

        // 6 held frames give only 3 low-velocity windows
        let mut xs = moving(100.0, 11);
        xs.extend([300.0; 6]);
        xs.extend(moving(320.0, 10));
        xs.extend([500.0; 20]);

        let out = run(&mut seg, &xs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].first().frame_index, 0);
        assert!(out[0].last().frame_index > 17);
    }

    #[test]
    fn test_long_pause_splits_actions() {
        let mut seg = ActionSegmenter::new(SegmenterConfig::default(), FPS);

        let mut xs = moving(100.0, 11);
        xs.extend([300.0; 12]);
        xs.extend(moving(320.0, 10));
        xs.extend([500.0; 20]);

        let out = run(&mut seg, &xs);
        assert_eq!(out.len(), 2);
        assert!(out[0].last().frame_index < out[1].first().frame_index);
    }

    #[test]
    fn test_short_action_is_discarded() {
        let config = SegmenterConfig {
            min_duration_secs: 1.0,
            ..SegmenterConfig::default()
        };
        let mut seg = ActionSegmenter::new(config, FPS);

        let mut xs = moving(100.0, 11);
        xs.extend([300.0; 20]);

        assert!(run(&mut seg, &xs).is_empty());
    }

    #[test]
    fn test_missing_hip_does_not_start_action() {
        let mut seg = ActionSegmenter::new(SegmenterConfig::default(), FPS);

        for i in 0..30 {
            let sample = PoseSample::new(i, i as f32 / FPS, Pose::new());
            assert!(seg.push(sample).is_none());
        }
        assert_eq!(seg.state(), SegmenterState::Idle);
    }
}
