use std::{collections::VecDeque, sync::Arc};

use crate::{job::Job, semaphore::BinarySemaphore};

/// FIFO queue of jobs waiting for a worker.
///
/// The queue has no locking of its own. It lives inside the pool's state
/// mutex, so every operation here happens with that mutex held. Only the
/// `has_jobs` semaphore is shared outside of the lock, so that workers can
/// sleep on it without holding the pool mutex.
#[derive(Debug)]
pub(crate) struct JobQueue {
    jobs: VecDeque<Job>,
    has_jobs: Arc<BinarySemaphore>,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
            has_jobs: Arc::new(BinarySemaphore::new(false)),
        }
    }

    /// Get the semaphore that is posted whenever the queue has jobs.
    pub(crate) fn signal(&self) -> Arc<BinarySemaphore> {
        self.has_jobs.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Append a job to the back of the queue and wake a worker.
    pub(crate) fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
        self.has_jobs.post();
    }

    /// Take the oldest job out of the queue, if any.
    pub(crate) fn pull(&mut self) -> Option<Job> {
        let job = self.jobs.pop_front();

        // Posts coalesce, so several pushes may have produced only a single
        // pending wake-up. Pass it on while there is still work left.
        if !self.jobs.is_empty() {
            self.has_jobs.post();
        }

        job
    }

    /// Unlink every queued job without running it.
    ///
    /// The jobs are handed back so that the caller can drop them after
    /// releasing the pool mutex, since dropping a closure runs arbitrary
    /// destructors.
    pub(crate) fn clear(&mut self) -> VecDeque<Job> {
        std::mem::take(&mut self.jobs)
    }
}
