//! Per-video pipeline: detection, tracking, pose, posture and action scoring.
//!
//! All state of a run lives in a `VideoContext` created by `analyze`, so one
//! analyzer can process several videos one after another without any
//! tracker or segmenter state leaking between them.

use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detector::{self, PersonDetector};
use crate::error::Error;
use crate::frame::{Frame, FrameSource, VideoInfo};
use crate::highlights::{select_highlights, summarize, CategorySummary, Highlights};
use crate::mapper;
use crate::pose::{Pose, PoseEstimator};
use crate::posture::PostureEvaluator;
use crate::rolling_window::PoseSample;
use crate::scoring::{ActionRecord, ActionScorer};
use crate::segmenter::{ActionSegment, ActionSegmenter, SegmenterConfig};
use crate::stats::{FrameLogEntry, PlayerStats};
use crate::track::{Identity, TrackedPerson};
use crate::tracker::{IdentityTracker, IDENTITIES};

/// Cooperative cancellation flag, checked between frames
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub info: VideoInfo,
    pub status: JobStatus,
    pub frames_processed: u64,
    /// Ordered by start timestamp
    pub actions: Vec<ActionRecord>,
    pub frame_log: Vec<FrameLogEntry>,
    pub players: Vec<PlayerStats>,
    pub highlights: Option<Highlights>,
    pub summary: Vec<CategorySummary>,
}

struct Athlete {
    track_id: u32,
    segmenter: ActionSegmenter,
}

struct VideoContext {
    info: VideoInfo,
    fps: f32,
    tracker: IdentityTracker,
    evaluator: PostureEvaluator,
    scorer: ActionScorer,
    segmenter_config: SegmenterConfig,
    athletes: BTreeMap<Identity, Athlete>,
    players: BTreeMap<Identity, PlayerStats>,
    actions: Vec<ActionRecord>,
    frame_log: Vec<FrameLogEntry>,
    frames_processed: u64,
    seq: usize,
}

impl VideoContext {
    fn new(config: &Config, info: VideoInfo) -> Self {
        Self {
            fps: info.effective_fps(),
            tracker: IdentityTracker::new(config.tracker.clone()),
            evaluator: PostureEvaluator::new(config.posture.clone()),
            scorer: ActionScorer::new(config.scoring.clone(), info.width),
            segmenter_config: config.segmenter.clone(),
            athletes: BTreeMap::new(),
            players: IDENTITIES
                .iter()
                .map(|&id| (id, PlayerStats::new(id)))
                .collect(),
            actions: Vec::new(),
            frame_log: Vec::new(),
            frames_processed: 0,
            seq: 0,
            info,
        }
    }

    fn push_sample(&mut self, person: &TrackedPerson, sample: PoseSample) {
        let identity = person.identity;
        let mut finished = Vec::new();

        let athlete = self.athletes.entry(identity).or_insert_with(|| Athlete {
            track_id: person.track_id,
            segmenter: ActionSegmenter::new(self.segmenter_config.clone(), self.fps),
        });

        if athlete.track_id != person.track_id {
            debug!(
                "identity {} moved from track {} to track {}, restarting segmentation",
                identity, athlete.track_id, person.track_id
            );

            finished.extend(athlete.segmenter.finish());
            *athlete = Athlete {
                track_id: person.track_id,
                segmenter: ActionSegmenter::new(self.segmenter_config.clone(), self.fps),
            };
        }

        finished.extend(athlete.segmenter.push(sample));

        for segment in finished {
            self.accept(identity, segment);
        }
    }

    fn accept(&mut self, identity: Identity, segment: ActionSegment) {
        let metrics = segment.metrics(
            self.segmenter_config.reference_joint,
            self.segmenter_config.point_threshold,
        );

        self.seq += 1;
        let start = segment.first();
        let record = self
            .scorer
            .record(self.seq, identity, start.frame_index, start.timestamp, &metrics);

        info!(
            "{}: athlete {} {} at {} scored {:.1}",
            record.id,
            identity,
            record.action_type.label(),
            record.timestamp_str,
            record.score
        );

        if let Some(stats) = self.players.get_mut(&identity) {
            stats.actions += 1;
        }

        let pos = self
            .actions
            .partition_point(|r| r.timestamp_sec <= record.timestamp_sec);
        self.actions.insert(pos, record);
    }

    fn finish(&mut self) {
        let mut finished = Vec::new();
        for (&identity, athlete) in self.athletes.iter_mut() {
            if let Some(segment) = athlete.segmenter.finish() {
                finished.push((identity, segment));
            }
        }

        for (identity, segment) in finished {
            self.accept(identity, segment);
        }
    }

    fn into_report(self, status: JobStatus) -> AnalysisReport {
        AnalysisReport {
            info: self.info,
            status,
            frames_processed: self.frames_processed,
            highlights: select_highlights(&self.actions),
            summary: summarize(&self.actions),
            actions: self.actions,
            frame_log: self.frame_log,
            players: self.players.into_values().collect(),
        }
    }
}

pub struct VideoAnalyzer<D, P> {
    config: Config,
    detector: D,
    estimator: P,
}

impl<D: PersonDetector, P: PoseEstimator> VideoAnalyzer<D, P> {
    pub fn new(config: Config, detector: D, estimator: P) -> Self {
        Self {
            config,
            detector,
            estimator,
        }
    }

    /// Runs the whole video through the pipeline.
    ///
    /// Decode errors abort the run. Cancellation stops before the next frame
    /// and returns what has been finalized so far, actions still in
    /// progress are dropped.
    pub fn analyze<S: FrameSource>(
        &mut self,
        mut source: S,
        cancel: &CancelToken,
    ) -> Result<AnalysisReport, Error> {
        let info = source.info();
        let mut ctx = VideoContext::new(&self.config, info);

        info!(
            "analyzing {}x{} video at {:.1} fps",
            info.width, info.height, ctx.fps
        );

        let status = loop {
            if cancel.is_cancelled() {
                break JobStatus::Cancelled;
            }

            match source.next_frame()? {
                Some(frame) => self.process_frame(&mut ctx, &frame),
                None => break JobStatus::Completed,
            }
        };

        drop(source);

        match status {
            JobStatus::Completed => ctx.finish(),
            JobStatus::Cancelled => {
                info!("analysis cancelled after {} frames", ctx.frames_processed)
            }
        }

        info!(
            "analysis done: {} frames, {} actions",
            ctx.frames_processed,
            ctx.actions.len()
        );

        Ok(ctx.into_report(status))
    }

    fn process_frame(&mut self, ctx: &mut VideoContext, frame: &Frame) {
        let (width, height) = frame.dims();

        let detections = match self.detector.detect(frame) {
            Ok(dets) => detector::postprocess(&self.config.detector, dets, width, height),
            Err(err) => {
                warn!("frame {}: detection failed: {}", frame.index, err);
                Vec::new()
            }
        };

        let people = ctx.tracker.update(&detections);
        let mut entry = FrameLogEntry::new(frame.index);

        for person in &people {
            let pose = match self.estimate(frame, person) {
                Some(pose) => pose,
                None => continue,
            };

            let report = ctx.evaluator.evaluate(person.identity, &pose);
            let stances = ctx.evaluator.recognize_stances(&pose);

            if let Some(stats) = ctx.players.get_mut(&person.identity) {
                stats.record(&report, &stances);
            }
            entry.set(person.identity, report.percent(), stances);

            ctx.push_sample(person, PoseSample::new(frame.index, frame.timestamp, pose));
        }

        ctx.frame_log.push(entry);
        ctx.frames_processed += 1;
    }

    fn estimate(&mut self, frame: &Frame, person: &TrackedPerson) -> Option<Pose> {
        let (region, rect) = frame.crop(&person.bbox)?;

        match self.estimator.estimate(region) {
            Ok(Some(raw)) => Some(mapper::map_to_frame(
                &raw,
                &rect,
                self.estimator.coord_space(),
            )),
            Ok(None) => {
                debug!(
                    "frame {}: no pose for athlete {}",
                    frame.index, person.identity
                );
                None
            }
            Err(err) => {
                warn!(
                    "frame {}: pose estimation failed for athlete {}: {}",
                    frame.index, person.identity, err
                );
                None
            }
        }
    }
}
