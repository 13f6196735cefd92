use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use svgbatch_common::{AggregateStats, Job, ResultRecord};

use crate::coordinator::BatchProgress;
use crate::error::CoordinatorError;

pub type WorkerId = usize;

/// Pushed to presentation subscribers in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    JobCompleted(ResultRecord),
    BatchFinished,
    BatchFailed(String),
    /// The last worker of a stopped batch has drained.
    BatchStopped,
}

/// What a worker sends back after running one job.
#[derive(Debug)]
pub(crate) enum WorkerReport {
    Completed(ResultRecord),
    Fatal(String),
}

pub(crate) type Reply<T> = Sender<Result<T, CoordinatorError>>;

/// Everything the coordination loop consumes, from workers and from callers.
#[derive(Debug)]
pub(crate) enum LoopMsg {
    Report {
        worker_id: WorkerId,
        report: WorkerReport,
    },
    WorkerExited {
        worker_id: WorkerId,
    },
    StartBatch {
        jobs: Vec<Job>,
        worker_count: usize,
        reply: Reply<usize>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Subscribe {
        events: Sender<CoordinatorEvent>,
    },
    Terminate,
}

/// State the loop publishes after every mutation, readable without a round trip.
#[derive(Debug, Clone, Default)]
pub(crate) struct Published {
    pub stats: AggregateStats,
    pub progress: BatchProgress,
    pub started_at: Option<Instant>,
    pub finished_after: Option<Duration>,
}
