pub mod analyzer;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod highlights;
pub mod mapper;
pub mod math;
pub mod pool;
pub mod pose;
pub mod posture;
pub mod rolling_window;
pub mod scoring;
pub mod segmenter;
pub mod stats;
pub mod tracker;

mod track;

pub use analyzer::{AnalysisReport, CancelToken, JobStatus, VideoAnalyzer};
pub use config::Config;
pub use detection::Detection;
pub use detector::PersonDetector;
pub use error::Error;
pub use frame::{Frame, FrameSource, VideoInfo};
pub use pool::{JobHandle, WorkerPool};
pub use pose::{CoordSpace, Joint, Keypoint, Pose, PoseEstimator, RawKeypoint};
pub use scoring::{ActionRecord, ActionType, MetricValue};
pub use track::{Identity, Track, TrackedPerson};
