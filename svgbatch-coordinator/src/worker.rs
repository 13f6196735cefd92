use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use log::{debug, error, warn};

use svgbatch_common::{Job, ResultRecord};

use crate::events::{LoopMsg, WorkerId, WorkerReport};
use crate::invoker::TransformInvoker;

enum WorkerCommand {
    Run(Job),
    Shutdown,
}

/// The coordinator's handle on one worker thread.
///
/// Pull dispatch means the inbox never holds more than one command.
pub(crate) struct Worker {
    id: WorkerId,
    inbox: Sender<WorkerCommand>,
    thread: Option<JoinHandle<()>>,
    busy: bool,
    shutdown_requested: bool,
}

impl Worker {
    pub(crate) fn spawn(
        id: WorkerId,
        invoker: Arc<dyn TransformInvoker>,
        reports: Sender<LoopMsg>,
    ) -> std::io::Result<Self> {
        let (inbox, rx) = unbounded::<WorkerCommand>();

        let thread = thread::Builder::new()
            .name(format!("svgbatch-worker-{}", id))
            .spawn(move || {
                while let Ok(cmd) = rx.recv() {
                    let job = match cmd {
                        WorkerCommand::Run(job) => job,
                        WorkerCommand::Shutdown => break,
                    };

                    debug!("[worker {}] cleaning {:?}", id, job.input);
                    let report = run_job(id, invoker.as_ref(), &job);
                    if reports.send(LoopMsg::Report { worker_id: id, report }).is_err() {
                        break;
                    }
                }
                debug!("[worker {}] exiting", id);
                let _ = reports.send(LoopMsg::WorkerExited { worker_id: id });
            })?;

        Ok(Self {
            id,
            inbox,
            thread: Some(thread),
            busy: false,
            shutdown_requested: false,
        })
    }

    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }

    /// Hands one job to an idle worker. Gives the job back if the thread is gone.
    pub(crate) fn run(&mut self, job: Job) -> Result<(), Job> {
        debug_assert!(!self.busy, "worker {} already holds a job", self.id);
        debug_assert!(!self.shutdown_requested);
        match self.inbox.send(WorkerCommand::Run(job)) {
            Ok(()) => {
                self.busy = true;
                Ok(())
            }
            Err(err) => match err.into_inner() {
                WorkerCommand::Run(job) => Err(job),
                WorkerCommand::Shutdown => unreachable!(),
            },
        }
    }

    /// Marks the current job as reported back.
    pub(crate) fn mark_idle(&mut self) {
        self.busy = false;
    }

    /// Asks the thread to exit once it holds no job. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        if self.shutdown_requested {
            return;
        }
        self.shutdown_requested = true;
        let _ = self.inbox.send(WorkerCommand::Shutdown);
    }

    /// Joins the thread; call after its exit acknowledgment arrived.
    pub(crate) fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("[worker {}] thread panicked during shutdown", self.id);
            }
        }
    }
}

fn run_job(id: WorkerId, invoker: &dyn TransformInvoker, job: &Job) -> WorkerReport {
    match panic::catch_unwind(AssertUnwindSafe(|| invoker.invoke(job))) {
        Ok(Ok(record)) => WorkerReport::Completed(record),
        Ok(Err(e)) => {
            error!("[worker {}] invoker failed on {:?}: {}", id, job.input, e);
            WorkerReport::Fatal(e.to_string())
        }
        Err(_) => {
            warn!("[worker {}] invoker panicked on {:?}", id, job.input);
            WorkerReport::Completed(ResultRecord::crashed(job, 0))
        }
    }
}
