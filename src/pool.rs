use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use serde_derive::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::analyzer::{AnalysisReport, CancelToken, VideoAnalyzer};
use crate::config::Config;
use crate::detector::PersonDetector;
use crate::error::Error;
use crate::frame::FrameSource;
use crate::pose::PoseEstimator;

static JOB_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
    /// Jobs waiting for a worker, `submit` blocks beyond this
    pub queue_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_size: 16,
        }
    }
}

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle of a submitted job
pub struct JobHandle<T> {
    id: u64,
    cancel: CancelToken,
    result: Receiver<Result<T, Error>>,
}

impl<T> JobHandle<T> {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[inline]
    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Blocks until the job is done.
    pub fn wait(self) -> Result<T, Error> {
        self.result.recv().map_err(|_| Error::WorkerGone)?
    }

    /// Result of a finished job, `None` while it is still queued or running.
    pub fn try_wait(&self) -> Option<Result<T, Error>> {
        match self.result.try_recv() {
            Ok(res) => Some(res),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerGone)),
        }
    }
}

/// Fixed set of threads running independent jobs
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Self {
        let (sender, receiver) = bounded::<Task>(config.queue_size);
        let workers = (0..config.workers.max(1))
            .map(|n| {
                let rx = receiver.clone();
                thread::spawn(move || {
                    while let Ok(task) = rx.recv() {
                        task();
                    }
                    debug!("worker {} stopped", n);
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn submit<F, T>(&self, job: F) -> Result<JobHandle<T>, Error>
    where
        F: FnOnce(&CancelToken) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(Error::WorkerGone)?;

        let id = JOB_ID.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        let (tx, rx) = bounded(1);

        let token = cancel.clone();
        let task: Task = Box::new(move || {
            info!("job {} started", id);
            let res = panic::catch_unwind(AssertUnwindSafe(|| job(&token)))
                .unwrap_or_else(|_| Err(Error::JobPanicked));

            match &res {
                Ok(_) => info!("job {} finished", id),
                Err(err) => warn!("job {} failed: {}", id, err),
            }

            // the handle may have been dropped already
            let _ = tx.send(res);
        });

        sender.send(task).map_err(|_| Error::WorkerGone)?;

        Ok(JobHandle {
            id,
            cancel,
            result: rx,
        })
    }

    /// Queues a video, the job owns its own analyzer.
    pub fn analyze<S, D, P>(
        &self,
        config: Config,
        detector: D,
        estimator: P,
        source: S,
    ) -> Result<JobHandle<AnalysisReport>, Error>
    where
        S: FrameSource + Send + 'static,
        D: PersonDetector + Send + 'static,
        P: PoseEstimator + Send + 'static,
    {
        self.submit(move |cancel| {
            let mut analyzer = VideoAnalyzer::new(config, detector, estimator);
            analyzer.analyze(source, cancel)
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(&PoolConfig::default())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}
