//! Ordered batch of pending jobs with a dispatch cursor.

use crate::job::Job;

/// Jobs `[0, cursor)` have been handed out, `[cursor, len)` are pending.
///
/// No locking: the queue is only ever touched from the coordination loop.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Vec<Job>,
    cursor: usize,
}

impl JobQueue {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs, cursor: 0 }
    }

    /// Replaces the batch and rewinds the cursor.
    pub fn reset(&mut self, jobs: Vec<Job>) {
        self.jobs = jobs;
        self.cursor = 0;
    }

    /// Hands out the next pending job, advancing the cursor.
    pub fn next(&mut self) -> Option<Job> {
        let job = self.jobs.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(job)
    }

    /// The job the next call to [`JobQueue::next`] would return.
    pub fn peek(&self) -> Option<&Job> {
        self.jobs.get(self.cursor)
    }

    pub fn remaining(&self) -> usize {
        self.jobs.len() - self.cursor
    }

    pub fn dispatched(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.jobs.len()
    }
}
