use std::sync::Arc;

use crate::{pool::Shared, semaphore::BinarySemaphore};

/// A type which receives notifications from a worker.
pub(crate) trait Listener {
    fn on_started(&mut self) {}

    /// Called with the pool mutex held, right after a job has been taken out
    /// of the queue.
    fn on_job_started(&mut self) {}

    fn on_job_completed(&mut self, _panicked: bool) {}
}

/// A worker thread which belongs to a thread pool and executes jobs.
///
/// A worker alternates between waiting on the queue's semaphore and running
/// the jobs it pulls, until it wakes up to find the pool shut down.
pub(crate) struct Worker<L: Listener> {
    id: usize,
    shared: Arc<Shared>,

    /// Posted whenever the queue has jobs, and once more on shutdown.
    has_jobs: Arc<BinarySemaphore>,

    /// Receiver of various worker events.
    listener: L,
}

impl<L: Listener> Worker<L> {
    pub(crate) fn new(id: usize, shared: Arc<Shared>, listener: L) -> Self {
        let has_jobs = shared.lock().queue.signal();

        Self {
            id,
            shared,
            has_jobs,
            listener,
        }
    }

    pub(crate) fn run(mut self) {
        self.listener.on_started();
        log::debug!("worker {} started", self.id);

        // Main worker loop
        loop {
            self.has_jobs.wait();

            let job = {
                let mut state = self.shared.lock();

                if state.shutdown {
                    break;
                }

                // Another worker may have emptied the queue between the post
                // and our wake-up.
                match state.queue.pull() {
                    Some(job) => {
                        self.listener.on_job_started();
                        job
                    }
                    None => continue,
                }
            };

            log::trace!("worker {} running {:?}", self.id, job);

            let panicked = job.run();
            self.listener.on_job_completed(panicked);
        }

        // Only one permit exists, so pass the shutdown wake-up along to the
        // next sleeping worker.
        self.has_jobs.post();

        log::debug!("worker {} stopped", self.id);
    }
}
