use crate::pose::{Joint, Pose};
use nalgebra as na;
use std::collections::VecDeque;

/// One athlete's pose at one frame
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSample {
    pub frame_index: u64,
    pub timestamp: f32,
    pub pose: Pose,
}

impl PoseSample {
    pub fn new(frame_index: u64, timestamp: f32, pose: Pose) -> Self {
        Self {
            frame_index,
            timestamp,
            pose,
        }
    }
}

/// Last `N` samples of one athlete with the velocity of a reference joint across them
#[derive(Debug, Clone)]
pub struct RollingWindow {
    joint: Joint,
    threshold: f32,
    size: usize,
    history: VecDeque<PoseSample>,
}

impl RollingWindow {
    pub fn new(joint: Joint, threshold: f32, size: usize) -> Self {
        let size = size.max(2);
        Self {
            joint,
            threshold,
            size,
            history: VecDeque::with_capacity(size),
        }
    }

    /// Window length for a stream: `max(min_size, fps / 5)` frames.
    #[inline]
    pub fn size_for(fps: f32, min_size: usize) -> usize {
        ((fps / 5.0) as usize).max(min_size)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Appends the newest sample, dropping the oldest one once full.
    pub fn push(&mut self, sample: PoseSample) {
        if self.is_full() {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.history.len() >= self.size
    }

    fn anchor(&self, sample: &PoseSample) -> Option<na::Point2<f32>> {
        sample.pose.point(self.joint, self.threshold)
    }

    /// Speed between the oldest and newest sample in px/s, `None` until the window fills up.
    ///
    /// A missing anchor joint at either end or a non-positive time span reads as zero.
    pub fn velocity(&self) -> Option<f32> {
        if !self.is_full() {
            return None;
        }

        let oldest = self.history.front()?;
        let newest = self.history.back()?;

        let (a, b) = match (self.anchor(oldest), self.anchor(newest)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Some(0.0),
        };

        let dt = newest.timestamp - oldest.timestamp;
        if !(dt > 0.0) {
            return Some(0.0);
        }

        let v = na::distance(&a, &b) / dt;
        Some(if v.is_finite() { v } else { 0.0 })
    }

    #[inline]
    pub fn oldest(&self) -> Option<&PoseSample> {
        self.history.front()
    }

    /// Oldest to newest
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &PoseSample> {
        self.history.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
