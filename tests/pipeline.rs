use fencing_track::highlights::ActionCategory;
use fencing_track::pool::PoolConfig;
use fencing_track::{
    ActionType, CancelToken, Config, CoordSpace, Detection, Error, Frame, FrameSource, JobStatus,
    Joint, PersonDetector, PoseEstimator, RawKeypoint, VideoAnalyzer, VideoInfo, WorkerPool,
};
use ndarray::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const FPS: f32 = 25.0;

struct FakeSource {
    next: u64,
    total: u64,
    fail_at: Option<u64>,
    cancel_at: Option<(u64, CancelToken)>,
    dropped: Arc<AtomicBool>,
}

impl FakeSource {
    fn new(total: u64) -> Self {
        Self {
            next: 0,
            total,
            fail_at: None,
            cancel_at: None,
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for FakeSource {
    fn info(&self) -> VideoInfo {
        VideoInfo {
            width: WIDTH,
            height: HEIGHT,
            fps: FPS,
            frame_count: Some(self.total),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        if self.next >= self.total {
            return Ok(None);
        }

        if self.fail_at == Some(self.next) {
            return Err(Error::Decode(format!("corrupt packet at {}", self.next)));
        }

        if let Some((at, token)) = &self.cancel_at {
            if *at == self.next {
                token.cancel();
            }
        }

        let index = self.next;
        self.next += 1;

        Ok(Some(Frame::new(
            index,
            index as f32 / FPS,
            Array3::zeros((HEIGHT as usize, WIDTH as usize, 3)),
        )))
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Athlete 1 lunges 20px per frame for 10 frames, athlete 2 stands still.
struct FakeDetector {
    fail_on: Vec<u64>,
}

fn lunger_left(index: u64) -> f32 {
    100.0 + 20.0 * index.min(10) as f32
}

impl PersonDetector for FakeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error> {
        if self.fail_on.contains(&frame.index) {
            return Err(Error::Detector("model timeout".into()));
        }

        let x = lunger_left(frame.index);

        // right athlete first, plus a low confidence box
        Ok(vec![
            Detection::new(450.0, 100.0, 530.0, 300.0, 0.8),
            Detection::new(x, 100.0, x + 80.0, 300.0, 0.9),
            Detection::new(200.0, 0.0, 260.0, 40.0, 0.1),
        ])
    }
}

/// Same region-local pose for everyone, hip at (40, 100). Boxes up to 80px
/// wide get a straight weapon arm, wider ones a 90 degree bend.
struct FakeEstimator;

impl PoseEstimator for FakeEstimator {
    fn coord_space(&self) -> CoordSpace {
        CoordSpace::Pixel
    }

    fn estimate(&mut self, region: ArrayView3<'_, u8>) -> Result<Option<Vec<RawKeypoint>>, Error> {
        let kp = |joint, x, y| RawKeypoint {
            joint,
            x,
            y,
            visibility: 0.9,
        };

        let wrist = if region.shape()[1] > 80 {
            kp(Joint::RightWrist, 60.0, 60.0)
        } else {
            kp(Joint::RightWrist, 79.0, 40.0)
        };

        Ok(Some(vec![
            kp(Joint::Nose, 40.0, 10.0),
            kp(Joint::LeftShoulder, 30.0, 40.0),
            kp(Joint::RightShoulder, 40.0, 40.0),
            kp(Joint::RightElbow, 60.0, 40.0),
            wrist,
            kp(Joint::RightHip, 40.0, 100.0),
            kp(Joint::RightKnee, 40.0, 150.0),
            kp(Joint::RightAnkle, 30.0, 195.0),
        ]))
    }
}

/// Athlete 2 (90px wide) walks left from the first frame for 20 frames,
/// athlete 1 lunges over frames 7..=11 only.
struct DuelDetector;

impl PersonDetector for DuelDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Error> {
        let i = frame.index as f32;
        let left = 20.0 + 20.0 * (i - 6.0).clamp(0.0, 5.0);
        let right = 540.0 - 10.0 * i.min(20.0);

        Ok(vec![
            Detection::new(left, 100.0, left + 80.0, 300.0, 0.9),
            Detection::new(right, 100.0, right + 90.0, 300.0, 0.9),
        ])
    }
}

struct FailingEstimator;

impl PoseEstimator for FailingEstimator {
    fn estimate(&mut self, _region: ArrayView3<'_, u8>) -> Result<Option<Vec<RawKeypoint>>, Error> {
        Err(Error::Pose("no landmarks".into()))
    }
}

fn analyzer() -> VideoAnalyzer<FakeDetector, FakeEstimator> {
    VideoAnalyzer::new(
        Config::default(),
        FakeDetector {
            fail_on: Vec::new(),
        },
        FakeEstimator,
    )
}

#[test]
fn test_two_fencers_tracked_left_to_right() {
    let report = analyzer()
        .analyze(FakeSource::new(20), &CancelToken::new())
        .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.frames_processed, 20);
    assert_eq!(report.frame_log.len(), 20);
    assert_eq!(report.players.len(), 2);
    assert_eq!(report.players[0].identity, 1);
    assert_eq!(report.players[0].frames_detected, 20);
    assert_eq!(report.players[1].identity, 2);
    assert_eq!(report.players[1].frames_detected, 20);
    assert_eq!(report.frame_log[0].labels_display(1), "Lunge/Attack Stance");
}

#[test]
fn test_lunge_produces_scored_thrust() {
    let report = analyzer()
        .analyze(FakeSource::new(20), &CancelToken::new())
        .unwrap();

    assert_eq!(report.actions.len(), 1);
    let action = &report.actions[0];

    assert_eq!(action.id, "action_1");
    assert_eq!(action.identity, 1);
    assert_eq!(action.action_type, ActionType::Thrust);
    assert_eq!(action.frame_index, 0);
    assert_eq!(action.timestamp_str, "00:00");
    assert_eq!(action.score, 9.5);

    let speed = action.metrics["lunge_speed_px_s"].as_f64().unwrap();
    assert!((speed - 500.0).abs() < 0.5, "{}", speed);
    assert!((action.duration - 0.4).abs() < 1e-4);

    assert_eq!(report.players[0].actions, 1);
    assert_eq!(report.players[1].actions, 0);
    assert!(report.highlights.is_none());

    let attack = &report.summary[0];
    assert_eq!(attack.category, ActionCategory::Attack);
    assert_eq!(attack.count, 1);
    assert_eq!(attack.average, Some(95.0));
    assert_eq!(report.summary[1].average, None);
}

#[test]
fn test_actions_ordered_by_start_not_by_finalization() {
    let mut analyzer = VideoAnalyzer::new(Config::default(), DuelDetector, FakeEstimator);
    let report = analyzer
        .analyze(FakeSource::new(35), &CancelToken::new())
        .unwrap();

    assert_eq!(report.actions.len(), 2);

    // athlete 1 settles first but started later
    let first = &report.actions[0];
    let second = &report.actions[1];
    assert!(first.timestamp_sec <= second.timestamp_sec);

    assert_eq!(first.id, "action_2");
    assert_eq!(first.identity, 2);
    assert_eq!(first.frame_index, 0);
    assert_eq!(first.score, 7.0);

    assert_eq!(second.id, "action_1");
    assert_eq!(second.identity, 1);
    assert_eq!(second.frame_index, 3);
    assert_eq!(second.score, 9.5);
    assert!((second.timestamp_sec - 0.12).abs() < 1e-4);

    let speed = first.metrics["lunge_speed_px_s"].as_f64().unwrap();
    assert!((speed - 250.0).abs() < 0.5, "{}", speed);

    let highlights = report.highlights.as_ref().unwrap();
    assert_eq!(highlights.needs_improvement.record.id, "action_2");
    assert_eq!(highlights.needs_improvement.frame_index, 0);
    assert_eq!(highlights.highlight.record.id, "action_1");
    assert_eq!(highlights.highlight.frame_index, 3);

    let attack = &report.summary[0];
    assert_eq!(attack.count, 2);
    assert!((attack.average.unwrap() - 82.5).abs() < 1e-3);
    assert_eq!(report.players[0].actions, 1);
    assert_eq!(report.players[1].actions, 1);
}

#[test]
fn test_action_at_end_of_video_is_kept() {
    // stream ends before the settle is confirmed
    let report = analyzer()
        .analyze(FakeSource::new(18), &CancelToken::new())
        .unwrap();

    assert_eq!(report.actions.len(), 1);
    assert!((report.actions[0].duration - 0.4).abs() < 1e-4);
}

#[test]
fn test_cancellation_returns_partial_report() {
    let cancel = CancelToken::new();
    let mut source = FakeSource::new(20);
    source.cancel_at = Some((5, cancel.clone()));
    let dropped = source.dropped.clone();

    let report = analyzer().analyze(source, &cancel).unwrap();

    assert_eq!(report.status, JobStatus::Cancelled);
    assert_eq!(report.frames_processed, 6);
    // the lunge was still in progress
    assert!(report.actions.is_empty());
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn test_decode_error_aborts() {
    let mut source = FakeSource::new(20);
    source.fail_at = Some(3);

    let res = analyzer().analyze(source, &CancelToken::new());
    assert!(matches!(res, Err(Error::Decode(_))));
}

#[test]
fn test_detector_failure_is_not_fatal() {
    let mut analyzer = VideoAnalyzer::new(
        Config::default(),
        FakeDetector {
            fail_on: vec![14, 15],
        },
        FakeEstimator,
    );

    let report = analyzer
        .analyze(FakeSource::new(20), &CancelToken::new())
        .unwrap();

    assert_eq!(report.frames_processed, 20);
    assert_eq!(report.frame_log[14].score(1), 0.0);
    assert_eq!(report.frame_log[14].labels_display(1), "N/A");
    assert_eq!(report.players[0].frames_detected, 18);
    assert_eq!(report.actions.len(), 1);
}

#[test]
fn test_pose_failure_skips_athletes() {
    let mut analyzer = VideoAnalyzer::new(
        Config::default(),
        FakeDetector {
            fail_on: Vec::new(),
        },
        FailingEstimator,
    );

    let report = analyzer
        .analyze(FakeSource::new(20), &CancelToken::new())
        .unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert!(report.actions.is_empty());
    assert!(report.players.iter().all(|p| p.frames_detected == 0));
}

#[test]
fn test_report_serializes() {
    let report = analyzer()
        .analyze(FakeSource::new(20), &CancelToken::new())
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["status"], "Completed");
    assert_eq!(json["actions"][0]["type"], "thrust");
    assert!(json["actions"][0]["metrics"]["min_rear_knee_deg"].is_number());
    assert!(json["actions"][0]["metrics"]["duration_s"].is_number());
    assert!(json["highlights"].is_null());
}

#[test]
fn test_pool_runs_independent_videos() {
    let pool = WorkerPool::new(&PoolConfig {
        workers: 2,
        queue_size: 4,
    });

    let handles: Vec<_> = (0..3)
        .map(|_| {
            pool.analyze(
                Config::default(),
                FakeDetector {
                    fail_on: Vec::new(),
                },
                FakeEstimator,
                FakeSource::new(20),
            )
            .unwrap()
        })
        .collect();

    for handle in handles {
        let report = handle.wait().unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].id, "action_1");
    }
}
