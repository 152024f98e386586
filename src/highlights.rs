use serde_derive::{Deserialize, Serialize};

use crate::scoring::{ActionRecord, ActionType};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Highlight {
    pub frame_index: u64,
    pub record: ActionRecord,
}

impl From<&ActionRecord> for Highlight {
    fn from(record: &ActionRecord) -> Self {
        Self {
            frame_index: record.frame_index,
            record: record.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Highlights {
    pub needs_improvement: Highlight,
    pub highlight: Highlight,
}

/// Lowest and highest scoring actions, `None` with fewer than two records.
///
/// Equal scores keep list order, so the earlier record is the worst and the
/// later one the best.
pub fn select_highlights(records: &[ActionRecord]) -> Option<Highlights> {
    if records.len() < 2 {
        return None;
    }

    let mut sorted: Vec<&ActionRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.score.total_cmp(&b.score));

    Some(Highlights {
        needs_improvement: Highlight::from(*sorted.first()?),
        highlight: Highlight::from(*sorted.last()?),
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Attack,
    Defense,
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 2] = [ActionCategory::Attack, ActionCategory::Defense];

    pub fn of(action_type: ActionType) -> Self {
        match action_type {
            ActionType::Thrust => Self::Attack,
            ActionType::BlockOrMovement => Self::Defense,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: ActionCategory,
    pub count: usize,
    /// Mean score on a 0-100 scale, `None` without observations
    pub average: Option<f32>,
}

pub fn summarize(records: &[ActionRecord]) -> Vec<CategorySummary> {
    ActionCategory::ALL
        .iter()
        .map(|&category| {
            let scores: Vec<f32> = records
                .iter()
                .filter(|r| ActionCategory::of(r.action_type) == category)
                .map(|r| r.score)
                .collect();

            let average = if scores.is_empty() {
                None
            } else {
                Some(scores.iter().sum::<f32>() / scores.len() as f32 * 10.0)
            };

            CategorySummary {
                category,
                count: scores.len(),
                average,
            }
        })
        .collect()
}
