use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::track::Identity;

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Lunge speed above `frame_width * ratio` px/s counts as a thrust
    pub thrust_speed_ratio: f32,
    pub base_score: f32,
    pub arm_extension_deg: f32,
    pub arm_extension_bonus: f32,
    pub arm_full_extension_deg: f32,
    pub arm_full_extension_bonus: f32,
    pub speed_ratio: f32,
    pub speed_bonus: f32,
    pub fast_speed_ratio: f32,
    pub fast_speed_bonus: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            thrust_speed_ratio: 0.1,
            base_score: 5.0,
            arm_extension_deg: 160.0,
            arm_extension_bonus: 1.5,
            arm_full_extension_deg: 170.0,
            arm_full_extension_bonus: 2.5,
            speed_ratio: 0.15,
            speed_bonus: 1.0,
            fast_speed_ratio: 0.2,
            fast_speed_bonus: 2.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    #[serde(rename = "thrust")]
    Thrust,
    #[serde(rename = "block/movement")]
    BlockOrMovement,
}

impl ActionType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Thrust => "thrust",
            Self::BlockOrMovement => "block/movement",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    fn from_angle(angle: Option<f32>) -> Self {
        match angle {
            Some(a) => MetricValue::Number(a as f64),
            None => MetricValue::Text(NOT_AVAILABLE.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ActionMetrics {
    /// Hip travel over the action, px/s
    pub lunge_speed: f32,
    pub max_arm_angle: Option<f32>,
    pub min_rear_knee_angle: Option<f32>,
    pub duration: f32,
}

impl ActionMetrics {
    pub fn to_map(&self) -> BTreeMap<String, MetricValue> {
        let mut map = BTreeMap::new();
        map.insert(
            "lunge_speed_px_s".to_string(),
            MetricValue::Number(self.lunge_speed as f64),
        );
        map.insert(
            "max_arm_extension_deg".to_string(),
            MetricValue::from_angle(self.max_arm_angle),
        );
        map.insert(
            "min_rear_knee_deg".to_string(),
            MetricValue::from_angle(self.min_rear_knee_angle),
        );
        map.insert(
            "duration_s".to_string(),
            MetricValue::Number(self.duration as f64),
        );
        map
    }
}

/// Finalized action, never changed once created
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub id: String,
    pub identity: Identity,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub score: f32,
    pub frame_index: u64,
    pub timestamp_sec: f32,
    pub timestamp_str: String,
    pub duration: f32,
    pub metrics: BTreeMap<String, MetricValue>,
}

/// "MM:SS" of a stream offset, minutes wrap every hour.
pub fn format_timestamp(secs: f32) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };

    format!("{:02}:{:02}", (total / 60) % 60, total % 60)
}

#[derive(Debug, Clone)]
pub struct ActionScorer {
    config: ScoringConfig,
    frame_width: f32,
}

impl ActionScorer {
    pub fn new(config: ScoringConfig, frame_width: u32) -> Self {
        Self {
            config,
            frame_width: frame_width as f32,
        }
    }

    pub fn classify(&self, metrics: &ActionMetrics) -> ActionType {
        if metrics.lunge_speed > self.frame_width * self.config.thrust_speed_ratio {
            ActionType::Thrust
        } else {
            ActionType::BlockOrMovement
        }
    }

    /// Weighted rubric in [0, 10], rounded to one decimal.
    pub fn score(&self, metrics: &ActionMetrics) -> f32 {
        let cfg = &self.config;
        let mut score = cfg.base_score;

        if let Some(arm) = metrics.max_arm_angle {
            if arm > cfg.arm_full_extension_deg {
                score += cfg.arm_full_extension_bonus;
            } else if arm > cfg.arm_extension_deg {
                score += cfg.arm_extension_bonus;
            }
        }

        let speed = metrics.lunge_speed;
        if speed > self.frame_width * cfg.fast_speed_ratio {
            score += cfg.fast_speed_bonus;
        } else if speed > self.frame_width * cfg.speed_ratio {
            score += cfg.speed_bonus;
        }

        if !score.is_finite() {
            return 0.0;
        }

        (score.clamp(0.0, 10.0) * 10.0).round() / 10.0
    }

    pub fn record(
        &self,
        seq: usize,
        identity: Identity,
        frame_index: u64,
        timestamp_sec: f32,
        metrics: &ActionMetrics,
    ) -> ActionRecord {
        ActionRecord {
            id: format!("action_{}", seq),
            identity,
            action_type: self.classify(metrics),
            score: self.score(metrics),
            frame_index,
            timestamp_sec,
            timestamp_str: format_timestamp(timestamp_sec),
            duration: metrics.duration,
            metrics: metrics.to_map(),
        }
    }
}
