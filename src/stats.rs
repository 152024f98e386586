use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::posture::{PostureMetrics, PostureReport, StanceLabel};
use crate::scoring::NOT_AVAILABLE;
use crate::track::Identity;

/// Running posture totals of one athlete over a video
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub identity: Identity,
    pub frames_detected: u64,
    pub total_score: f32,
    pub average_score: f32,
    /// Mean of the per-frame posture metrics
    pub average_metrics: PostureMetrics,
    /// Only the leading label of a frame is counted
    pub stance_counts: BTreeMap<StanceLabel, u64>,
    pub actions: usize,
}

impl PlayerStats {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            frames_detected: 0,
            total_score: 0.0,
            average_score: 0.0,
            average_metrics: PostureMetrics::default(),
            stance_counts: BTreeMap::new(),
            actions: 0,
        }
    }

    pub fn record(&mut self, report: &PostureReport, stances: &[StanceLabel]) {
        self.frames_detected += 1;
        self.total_score += report.percent();
        self.average_score = self.total_score / self.frames_detected as f32;

        let n = self.frames_detected as f32;
        let avg = &mut self.average_metrics;
        let m = &report.metrics;
        for (slot, value) in [
            (&mut avg.head_position, m.head_position),
            (&mut avg.shoulder_level, m.shoulder_level),
            (&mut avg.arm_angle, m.arm_angle),
            (&mut avg.leg_posture, m.leg_posture),
            (&mut avg.overall_balance, m.overall_balance),
            (&mut avg.balance, m.balance),
        ] {
            *slot += (value - *slot) / n;
        }

        if let Some(label) = stances.first() {
            *self.stance_counts.entry(*label).or_insert(0) += 1;
        }
    }
}

/// Posture summary of both athletes at one frame
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FrameLogEntry {
    pub frame_index: u64,
    pub scores: [f32; 2],
    pub labels: [Vec<StanceLabel>; 2],
}

impl FrameLogEntry {
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            ..Default::default()
        }
    }

    #[inline]
    fn slot(identity: Identity) -> Option<usize> {
        match identity {
            1 => Some(0),
            2 => Some(1),
            _ => None,
        }
    }

    pub fn set(&mut self, identity: Identity, score: f32, labels: Vec<StanceLabel>) {
        if let Some(i) = Self::slot(identity) {
            self.scores[i] = score;
            self.labels[i] = labels;
        }
    }

    pub fn score(&self, identity: Identity) -> f32 {
        Self::slot(identity).map_or(0.0, |i| self.scores[i])
    }

    /// Comma separated labels of `identity`, "N/A" when there are none.
    pub fn labels_display(&self, identity: Identity) -> String {
        let labels = match Self::slot(identity) {
            Some(i) => &self.labels[i],
            None => return NOT_AVAILABLE.to_string(),
        };

        if labels.is_empty() {
            return NOT_AVAILABLE.to_string();
        }

        labels
            .iter()
            .map(StanceLabel::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
