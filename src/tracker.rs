//! IoU tracker that keeps two athletes on stable identities.
//!
//! Identities are handed out left to right when tracks are created and
//! never re-sorted afterwards, so athletes crossing each other keep their
//! slot as long as the boxes keep overlapping frame to frame.

use munkres::{solve_assignment, WeightMatrix};
use serde_derive::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::detection::Detection;
use crate::track::{Identity, Track, TrackedPerson};

pub const IDENTITIES: [Identity; 2] = [1, 2];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStrategy {
    /// Highest IoU first, earlier tracks win ties
    Greedy,
    /// Min-cost assignment over `1 - IoU`
    Optimal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub iou_threshold: f32,
    pub max_misses: u32,
    pub strategy: AssignmentStrategy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_misses: 10,
            strategy: AssignmentStrategy::Greedy,
        }
    }
}

pub struct IdentityTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_track_id: u32,
}

impl IdentityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(IDENTITIES.len()),
            next_track_id: 0,
        }
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedPerson> {
        let max_misses = self.config.max_misses;

        for t in &mut self.tracks {
            t.misses += 1;
        }

        self.tracks.retain(|t| {
            if t.misses > max_misses {
                debug!(
                    "removing track {} (identity {}) after {} misses",
                    t.track_id, t.identity, t.misses
                );
                return false;
            }
            true
        });

        let matches = match self.config.strategy {
            AssignmentStrategy::Greedy => self.greedy_assignment(detections),
            AssignmentStrategy::Optimal => self.optimal_assignment(detections),
        };

        let mut matched = vec![false; detections.len()];
        for (ti, di) in matches {
            self.tracks[ti].hit(detections[di].bbox);
            matched[di] = true;
        }

        let mut missed: Vec<&Detection> = detections
            .iter()
            .enumerate()
            .filter(|(i, _)| !matched[*i])
            .map(|(_, d)| d)
            .collect();
        missed.sort_by(|a, b| {
            a.center_x()
                .partial_cmp(&b.center_x())
                .unwrap_or(Ordering::Equal)
        });

        let mut free = self.free_identities().into_iter();
        for det in missed {
            let identity = match free.next() {
                Some(id) => id,
                None => break,
            };

            let track_id = self.next_track_id;
            self.next_track_id += 1;

            debug!("new track {} assigned to identity {}", track_id, identity);
            self.tracks.push(Track::new(track_id, identity, det.bbox));
        }

        let mut out: Vec<TrackedPerson> = self
            .tracks
            .iter()
            .filter(|t| t.misses == 0)
            .map(Into::into)
            .collect();
        out.sort_by_key(|p| p.identity);

        out
    }

    fn free_identities(&self) -> Vec<Identity> {
        IDENTITIES
            .iter()
            .copied()
            .filter(|id| !self.tracks.iter().any(|t| t.identity == *id))
            .collect()
    }

    fn greedy_assignment(&self, detections: &[Detection]) -> Vec<(usize, usize)> {
        let threshold = self.config.iou_threshold;
        let mut candidates = Vec::new();

        for (ti, t) in self.tracks.iter().enumerate() {
            for (di, d) in detections.iter().enumerate() {
                let iou = t.bbox.iou(&d.bbox);
                if iou > threshold {
                    candidates.push((ti, di, iou));
                }
            }
        }

        // stable, so equal IoU keeps track creation order
        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

        let mut track_used = vec![false; self.tracks.len()];
        let mut det_used = vec![false; detections.len()];
        let mut matches = Vec::new();

        for (ti, di, _) in candidates {
            if !track_used[ti] && !det_used[di] {
                track_used[ti] = true;
                det_used[di] = true;
                matches.push((ti, di));
            }
        }

        matches
    }

    fn optimal_assignment(&self, detections: &[Detection]) -> Vec<(usize, usize)> {
        if self.tracks.is_empty() || detections.is_empty() {
            return Vec::new();
        }

        let threshold = self.config.iou_threshold;
        let n = detections.len().max(self.tracks.len());

        let mut mat = WeightMatrix::from_fn(n, |(r, c)| {
            if r < self.tracks.len() && c < detections.len() {
                1.0 - self.tracks[r].bbox.iou(&detections[c].bbox)
            } else {
                100000.0
            }
        });

        match solve_assignment(&mut mat) {
            Ok(positions) => positions
                .into_iter()
                .filter(|p| p.row < self.tracks.len() && p.column < detections.len())
                .filter(|p| self.tracks[p.row].bbox.iou(&detections[p.column].bbox) > threshold)
                .map(|p| (p.row, p.column))
                .collect(),
            Err(_) => {
                warn!("assignment could not be solved, falling back to greedy matching");
                self.greedy_assignment(detections)
            }
        }
    }
}

impl Default for IdentityTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
