use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
};

/// A single unit of work waiting to be run by a worker thread.
///
/// A job is run at most once. Jobs that are dropped without being run (for
/// example because the pool was destroyed while they were still queued) are
/// simply dropped along with whatever the closure captured.
pub(crate) struct Job {
    closure: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    pub(crate) fn new(closure: Box<dyn FnOnce() + Send + 'static>) -> Self {
        Self { closure }
    }

    /// Run the job on the current thread, consuming it.
    ///
    /// Returns `true` if the closure panicked. The panic payload is discarded
    /// since nothing is waiting on the outcome of a job.
    pub(crate) fn run(self) -> bool {
        match catch_unwind(AssertUnwindSafe(self.closure)) {
            Ok(()) => false,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("Box<dyn Any>");

                log::warn!("job panicked: {}", message);

                true
            }
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Job(..)")
    }
}
