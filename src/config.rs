use serde_derive::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::detector::DetectorConfig;
use crate::error::Error;
use crate::pool::PoolConfig;
use crate::posture::PostureConfig;
use crate::scoring::ScoringConfig;
use crate::segmenter::SegmenterConfig;
use crate::tracker::TrackerConfig;

/// Every tunable of the analysis, all sections are optional in YAML
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub detector: DetectorConfig,
    pub posture: PostureConfig,
    pub segmenter: SegmenterConfig,
    pub scoring: ScoringConfig,
    pub pool: PoolConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(contents)?)
    }
}
