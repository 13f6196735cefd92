//! Batch coordinator.
//!
//! All batch state lives on a single coordination loop thread. Workers report
//! through the same channel that carries `start_batch`/`pause`/`resume`/`stop`
//! requests, so every state change is handled one message at a time and no
//! field needs its own lock. A worker gets its next job only after it reported
//! the previous one (pull dispatch), which caps the jobs in flight at the
//! worker count.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use svgbatch_common::{AggregateStats, Job, JobQueue, ResultRecord, StatisticsAggregator};

use crate::error::CoordinatorError;
use crate::events::{CoordinatorEvent, LoopMsg, Published, Reply, WorkerId, WorkerReport};
use crate::invoker::TransformInvoker;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Dispatch bookkeeping for the current (or last) batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProgress {
    pub state: RunState,
    pub batch: u64,
    pub total: usize,
    pub dispatched: usize,
    /// Results received, crashed ones included.
    pub completed: usize,
    /// Jobs handed to a worker and not yet reported, i.e. busy workers.
    pub in_flight: usize,
    /// Live worker threads, busy or idle, spawned and not yet joined.
    pub workers: usize,
    pub elapsed: Duration,
}

pub struct Coordinator {
    tx: Sender<LoopMsg>,
    published: Arc<Mutex<Published>>,
    thread: Option<JoinHandle<()>>,
}

impl Coordinator {
    pub fn new(invoker: Arc<dyn TransformInvoker>) -> Result<Self, CoordinatorError> {
        let (tx, rx) = unbounded();
        let published = Arc::new(Mutex::new(Published::default()));

        let thread = {
            let state = CoordinationLoop::new(invoker, tx.clone(), rx, Arc::clone(&published));
            thread::Builder::new()
                .name("svgbatch-coordinator".into())
                .spawn(move || state.run())
                .map_err(CoordinatorError::Spawn)?
        };

        Ok(Self {
            tx,
            published,
            thread: Some(thread),
        })
    }

    /// Starts a batch and returns the number of workers spawned.
    pub fn start_batch(&self, jobs: Vec<Job>, worker_count: usize) -> Result<usize, CoordinatorError> {
        self.request(|reply| LoopMsg::StartBatch {
            jobs,
            worker_count,
            reply,
        })
    }

    pub fn pause(&self) -> Result<(), CoordinatorError> {
        self.request(|reply| LoopMsg::Pause { reply })
    }

    pub fn resume(&self) -> Result<(), CoordinatorError> {
        self.request(|reply| LoopMsg::Resume { reply })
    }

    /// Withholds further dispatch. Returns without waiting for in-flight jobs.
    pub fn stop(&self) -> Result<(), CoordinatorError> {
        self.request(|reply| LoopMsg::Stop { reply })
    }

    /// Registers a presentation listener. Events emitted before this call are not replayed.
    pub fn subscribe(&self) -> Receiver<CoordinatorEvent> {
        let (events, rx) = unbounded();
        if self.tx.send(LoopMsg::Subscribe { events }).is_err() {
            warn!("[coordinator] subscribe after the loop exited");
        }
        rx
    }

    pub fn snapshot(&self) -> AggregateStats {
        self.published.lock().stats.clone()
    }

    pub fn progress(&self) -> BatchProgress {
        let published = self.published.lock();
        let mut progress = published.progress.clone();
        progress.elapsed = match (published.finished_after, published.started_at) {
            (Some(done), _) => done,
            (None, Some(start)) => start.elapsed(),
            (None, None) => Duration::ZERO,
        };
        progress
    }

    pub fn state(&self) -> RunState {
        self.published.lock().progress.state
    }

    fn request<T>(&self, msg: impl FnOnce(Reply<T>) -> LoopMsg) -> Result<T, CoordinatorError> {
        let (reply, rx) = bounded(1);
        self.tx
            .send(msg(reply))
            .map_err(|_| CoordinatorError::Disconnected)?;
        rx.recv().map_err(|_| CoordinatorError::Disconnected)?
    }
}

impl Drop for Coordinator {
    /// Stops any batch and blocks until in-flight jobs have drained.
    fn drop(&mut self) {
        let _ = self.tx.send(LoopMsg::Terminate);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("[coordinator] coordination loop panicked");
            }
        }
    }
}

struct CoordinationLoop {
    invoker: Arc<dyn TransformInvoker>,
    tx: Sender<LoopMsg>,
    rx: Receiver<LoopMsg>,
    published: Arc<Mutex<Published>>,

    state: RunState,
    queue: JobQueue,
    stats: StatisticsAggregator,
    workers: HashMap<WorkerId, Worker>,
    /// Workers that reported while paused, in the order they went idle.
    idle: VecDeque<WorkerId>,
    next_worker_id: WorkerId,

    batch: u64,
    completed: usize,
    in_flight: usize,
    failed: bool,
    stop_reported: bool,
    started_at: Option<Instant>,
    finished_after: Option<Duration>,

    subscribers: Vec<Sender<CoordinatorEvent>>,
    pending: Vec<CoordinatorEvent>,
    terminating: bool,
}

impl CoordinationLoop {
    fn new(
        invoker: Arc<dyn TransformInvoker>,
        tx: Sender<LoopMsg>,
        rx: Receiver<LoopMsg>,
        published: Arc<Mutex<Published>>,
    ) -> Self {
        Self {
            invoker,
            tx,
            rx,
            published,
            state: RunState::Idle,
            queue: JobQueue::default(),
            stats: StatisticsAggregator::new(),
            workers: HashMap::new(),
            idle: VecDeque::new(),
            next_worker_id: 0,
            batch: 0,
            completed: 0,
            in_flight: 0,
            failed: false,
            stop_reported: false,
            started_at: None,
            finished_after: None,
            subscribers: Vec::new(),
            pending: Vec::new(),
            terminating: false,
        }
    }

    fn run(mut self) {
        debug!("[coordinator] loop started");
        while let Ok(msg) = self.rx.recv() {
            match msg {
                LoopMsg::Report { worker_id, report } => match report {
                    WorkerReport::Completed(record) => self.on_worker_completed(worker_id, record),
                    WorkerReport::Fatal(message) => self.on_worker_fatal_error(worker_id, message),
                },
                LoopMsg::WorkerExited { worker_id } => self.on_worker_exited(worker_id),
                LoopMsg::StartBatch {
                    jobs,
                    worker_count,
                    reply,
                } => {
                    let result = self.start_batch(jobs, worker_count);
                    self.settle(reply, result);
                }
                LoopMsg::Pause { reply } => {
                    let result = self.pause();
                    self.settle(reply, result);
                }
                LoopMsg::Resume { reply } => {
                    let result = self.resume();
                    self.settle(reply, result);
                }
                LoopMsg::Stop { reply } => {
                    let result = self.stop();
                    self.settle(reply, result);
                }
                LoopMsg::Subscribe { events } => self.subscribers.push(events),
                LoopMsg::Terminate => self.terminate(),
            }

            self.publish();
            self.flush_events();
            if self.terminating && self.workers.is_empty() {
                break;
            }
        }
        debug!("[coordinator] loop exited");
    }

    /// Publishes state and events before answering, so a caller never sees stale progress.
    fn settle<T>(&mut self, reply: Reply<T>, result: Result<T, CoordinatorError>) {
        if let Err(e) = &result {
            warn!("[coordinator] rejected: {}", e);
        }
        self.publish();
        self.flush_events();
        let _ = reply.send(result);
    }

    fn start_batch(&mut self, jobs: Vec<Job>, worker_count: usize) -> Result<usize, CoordinatorError> {
        if jobs.is_empty() {
            return Err(CoordinatorError::InvalidArgument("job list is empty".into()));
        }
        if worker_count == 0 {
            return Err(CoordinatorError::InvalidArgument(
                "worker count must be at least 1".into(),
            ));
        }
        match self.state {
            RunState::Idle => {}
            RunState::Stopped if self.workers.is_empty() => {}
            RunState::Stopped => {
                return Err(CoordinatorError::Draining {
                    workers: self.workers.len(),
                })
            }
            state => {
                return Err(CoordinatorError::InvalidState {
                    operation: "start a batch",
                    state,
                })
            }
        }

        let count = worker_count.min(jobs.len());
        let mut spawned = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.next_worker_id;
            self.next_worker_id += 1;
            match Worker::spawn(id, Arc::clone(&self.invoker), self.tx.clone()) {
                Ok(worker) => spawned.push(worker),
                Err(e) => {
                    // nothing dispatched yet, the spawned ones exit and ack as usual
                    for mut worker in spawned {
                        worker.shutdown();
                        self.workers.insert(worker.id(), worker);
                    }
                    return Err(CoordinatorError::Spawn(e));
                }
            }
        }

        self.batch += 1;
        self.queue.reset(jobs);
        self.stats.reset();
        self.idle.clear();
        self.completed = 0;
        self.in_flight = 0;
        self.failed = false;
        self.stop_reported = false;
        self.started_at = Some(Instant::now());
        self.finished_after = None;
        self.state = RunState::Running;
        info!(
            "[coordinator] batch {} started: {} jobs on {} workers",
            self.batch,
            self.queue.len(),
            count
        );

        for worker in spawned {
            let id = worker.id();
            self.workers.insert(id, worker);
            self.feed(id);
        }
        Ok(count)
    }

    fn pause(&mut self) -> Result<(), CoordinatorError> {
        if self.state != RunState::Running {
            return Err(CoordinatorError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }
        self.state = RunState::Paused;
        info!(
            "[coordinator] batch {} paused with {} jobs in flight",
            self.batch, self.in_flight
        );
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CoordinatorError> {
        if self.state != RunState::Paused {
            return Err(CoordinatorError::InvalidState {
                operation: "resume",
                state: self.state,
            });
        }
        self.state = RunState::Running;
        info!(
            "[coordinator] batch {} resumed, feeding {} idle workers",
            self.batch,
            self.idle.len()
        );

        while let Some(id) = self.idle.pop_front() {
            if !self.feed(id) {
                self.retire(id);
            }
        }
        self.finish_if_done();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CoordinatorError> {
        match self.state {
            RunState::Running | RunState::Paused => {
                info!(
                    "[coordinator] batch {} stopping, draining {} jobs",
                    self.batch, self.in_flight
                );
                self.enter_stopped();
                self.report_stopped_if_drained();
                Ok(())
            }
            state => Err(CoordinatorError::InvalidState {
                operation: "stop",
                state,
            }),
        }
    }

    fn on_worker_completed(&mut self, worker_id: WorkerId, record: ResultRecord) {
        self.release(worker_id);
        self.completed += 1;
        debug!(
            "[coordinator] worker {} done with {:?} (crashed={}), {}/{}",
            worker_id,
            record.input,
            record.crashed,
            self.completed,
            self.queue.len()
        );

        self.stats.record(&record);
        self.emit(CoordinatorEvent::JobCompleted(record));

        match self.state {
            RunState::Running => {
                if !self.feed(worker_id) {
                    self.retire(worker_id);
                    self.finish_if_done();
                }
            }
            RunState::Paused => {
                if self.all_done() {
                    self.finish_batch();
                } else {
                    self.idle.push_back(worker_id);
                }
            }
            RunState::Stopped => {
                self.retire(worker_id);
                self.report_stopped_if_drained();
            }
            RunState::Idle => {
                warn!("[coordinator] result from worker {} outside a batch", worker_id);
                self.retire(worker_id);
            }
        }
    }

    fn on_worker_fatal_error(&mut self, worker_id: WorkerId, message: String) {
        self.release(worker_id);
        self.retire(worker_id);
        error!(
            "[coordinator] batch {} failed on worker {}: {}",
            self.batch, worker_id, message
        );
        self.fail_batch(message);
    }

    fn on_worker_exited(&mut self, worker_id: WorkerId) {
        if let Some(worker) = self.workers.remove(&worker_id) {
            if worker.is_busy() {
                error!("[coordinator] worker {} exited while holding a job", worker_id);
                self.in_flight = self.in_flight.saturating_sub(1);
            }
            worker.join();
        }
        self.idle.retain(|&id| id != worker_id);
        self.report_stopped_if_drained();
    }

    fn terminate(&mut self) {
        self.terminating = true;
        if matches!(self.state, RunState::Running | RunState::Paused) {
            self.enter_stopped();
        }
        self.retire_all();
    }

    /// Hands the next pending job to `worker_id`. False if the queue is exhausted.
    fn feed(&mut self, worker_id: WorkerId) -> bool {
        let Some(worker) = self.workers.get_mut(&worker_id) else {
            return false;
        };
        let Some(job) = self.queue.next() else {
            return false;
        };
        debug!(
            "[coordinator] job {} -> worker {}: {:?}",
            self.queue.dispatched() - 1,
            worker_id,
            job.input
        );
        match worker.run(job) {
            Ok(()) => {
                self.in_flight += 1;
                true
            }
            Err(job) => {
                // receiver gone means the thread already ended
                if let Some(worker) = self.workers.remove(&worker_id) {
                    worker.join();
                }
                self.fail_batch(format!(
                    "worker {} stopped unexpectedly before {:?}",
                    worker_id, job.input
                ));
                false
            }
        }
    }

    fn release(&mut self, worker_id: WorkerId) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.mark_idle();
        }
    }

    fn retire(&mut self, worker_id: WorkerId) {
        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.shutdown();
        }
    }

    fn retire_all(&mut self) {
        self.idle.clear();
        for worker in self.workers.values_mut() {
            if !worker.is_busy() {
                worker.shutdown();
            }
        }
    }

    fn all_done(&self) -> bool {
        self.queue.is_exhausted() && self.in_flight == 0
    }

    fn finish_if_done(&mut self) {
        if self.state == RunState::Running && self.all_done() {
            self.finish_batch();
        }
    }

    fn finish_batch(&mut self) {
        self.state = RunState::Idle;
        self.retire_all();
        self.finished_after = self.started_at.map(|t| t.elapsed());
        let stats = self.stats.snapshot();
        info!(
            "[coordinator] batch {} finished: {} cleaned, {} crashed",
            self.batch, stats.completed_count, stats.crashed_count
        );
        self.emit(CoordinatorEvent::BatchFinished);
    }

    fn fail_batch(&mut self, message: String) {
        if matches!(self.state, RunState::Running | RunState::Paused) {
            self.enter_stopped();
        }
        if !self.failed {
            self.failed = true;
            self.emit(CoordinatorEvent::BatchFailed(message));
        }
        self.report_stopped_if_drained();
    }

    fn enter_stopped(&mut self) {
        self.state = RunState::Stopped;
        self.retire_all();
    }

    fn report_stopped_if_drained(&mut self) {
        if self.state != RunState::Stopped || self.stop_reported || !self.workers.is_empty() {
            return;
        }
        self.stop_reported = true;
        self.finished_after = self.started_at.map(|t| t.elapsed());
        info!(
            "[coordinator] batch {} stopped after {} of {} jobs",
            self.batch,
            self.completed,
            self.queue.len()
        );
        self.emit(CoordinatorEvent::BatchStopped);
    }

    fn emit(&mut self, event: CoordinatorEvent) {
        self.pending.push(event);
    }

    fn flush_events(&mut self) {
        for event in self.pending.drain(..) {
            self.subscribers.retain(|s| s.send(event.clone()).is_ok());
        }
    }

    fn publish(&self) {
        let mut published = self.published.lock();
        published.stats = self.stats.snapshot();
        published.progress = BatchProgress {
            state: self.state,
            batch: self.batch,
            total: self.queue.len(),
            dispatched: self.queue.dispatched(),
            completed: self.completed,
            in_flight: self.in_flight,
            workers: self.workers.len(),
            elapsed: Duration::ZERO,
        };
        published.started_at = self.started_at;
        published.finished_after = self.finished_after;
    }
}
