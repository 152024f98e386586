use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config Error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Decode Error: {0}")]
    Decode(String),

    #[error("Detector Error: {0}")]
    Detector(String),

    #[error("Pose Error: {0}")]
    Pose(String),

    #[error("Worker pool is shut down")]
    WorkerGone,

    #[error("Job panicked")]
    JobPanicked,
}
