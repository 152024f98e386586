use serde_derive::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;

/// Person detection capability, backed by whatever model the caller runs.
pub trait PersonDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub confidence_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
        }
    }
}

/// Drops low-confidence boxes and clamps the rest into the frame.
pub fn postprocess(
    config: &DetectorConfig,
    detections: Vec<Detection>,
    frame_width: u32,
    frame_height: u32,
) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence > config.confidence_threshold)
        .filter_map(|d| {
            let bbox = d.bbox.clamp_to(frame_width, frame_height)?;

            Some(Detection {
                bbox,
                confidence: d.confidence,
            })
        })
        .collect()
}
