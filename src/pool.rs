//! Implementation of the thread pool itself.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Condvar,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use once_cell::sync::Lazy;

use crate::{
    error::{InitError, PoolClosedError},
    job::Job,
    queue::JobQueue,
    worker::{Listener, Worker},
};

#[cfg(target_has_atomic = "64")]
type AtomicCounter = std::sync::atomic::AtomicU64;

#[cfg(not(target_has_atomic = "64"))]
type AtomicCounter = std::sync::atomic::AtomicU32;

static CORE_COUNT: Lazy<usize> = Lazy::new(|| num_cpus::get().max(1));

/// A builder for constructing a customized [`ThreadPool`].
///
/// # Examples
///
/// ```
/// let custom_pool = thpool::ThreadPool::builder()
///     .name("my-pool")
///     .size(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct Builder {
    name: Option<String>,
    size: Option<usize>,
    stack_size: Option<usize>,
    poll_interval: Duration,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            name: None,
            size: None,
            stack_size: None,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl Builder {
    /// Set a custom thread name prefix for threads spawned by this thread
    /// pool. Each worker is named `{name}-{index}`.
    ///
    /// # Examples
    ///
    /// ```
    /// let pool = thpool::ThreadPool::builder().name("my-pool").build().unwrap();
    /// ```
    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the number of worker threads in this thread pool. The number of
    /// threads is fixed for the lifetime of the pool.
    ///
    /// If not set, one thread per CPU core on the current system is used.
    ///
    /// A size of zero is rejected when the pool is built.
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the size of the stack (in bytes) for threads in this thread pool.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// enforces a larger minimum stack size.
    ///
    /// The stack size if not specified will be the default size for new Rust
    /// threads, currently 2 MiB. This can also be overridden by setting the
    /// `RUST_MIN_STACK` environment variable if not specified in code.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Set how often [`ThreadPool::wait`] checks whether the pool has drained.
    ///
    /// The default is 1 millisecond.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Create a thread pool according to the configuration set with this
    /// builder.
    ///
    /// Blocks until every worker thread has started. If any worker fails to
    /// spawn, the workers spawned so far are stopped and joined before the
    /// error is returned.
    pub fn build(self) -> Result<ThreadPool, InitError> {
        let size = self.size.unwrap_or(*CORE_COUNT);

        if size == 0 {
            return Err(InitError::ZeroThreads);
        }

        if let Some(name) = self.name.as_ref() {
            if name.as_bytes().contains(&0) {
                return Err(InitError::InvalidName);
            }
        }

        let shared = Shared {
            state: Mutex::new(State {
                queue: JobQueue::new(),
                shutdown: false,
            }),
            slots: (0..size).map(|_| WorkerSlot::default()).collect(),
            thread_count: Mutex::new(0),
            thread_cvar: Condvar::new(),
            completed_jobs_count: Default::default(),
            panicked_jobs_count: Default::default(),
            poll_interval: self.poll_interval,
        };

        let mut pool = ThreadPool {
            shared: Arc::new(shared),
            workers: Vec::with_capacity(size),
        };

        for id in 0..size {
            // Configure the thread based on the thread pool configuration.
            let mut builder = thread::Builder::new();

            if let Some(name) = self.name.as_ref() {
                builder = builder.name(format!("{}-{}", name, id));
            }

            if let Some(stack_size) = self.stack_size {
                builder = builder.stack_size(stack_size);
            }

            if let Err(e) = pool.spawn_worker(builder, id) {
                log::error!("failed to spawn worker {}: {}", id, e);

                // Dropping the pool joins whatever was spawned already.
                drop(pool);

                return Err(InitError::Spawn(e));
            }
        }

        pool.shared.wait_for_threads(size);

        log::debug!("thread pool started with {} workers", size);

        Ok(pool)
    }
}

/// A fixed-size pool of worker threads that run jobs from a shared FIFO
/// queue.
///
/// Jobs are started in the order they were submitted. With more than one
/// worker they may finish in any order.
///
/// Dropping the thread pool has the same effect as calling
/// [`destroy`](ThreadPool::destroy): jobs that are already running are
/// allowed to finish, but jobs still waiting in the queue are dropped without
/// being run. Call [`wait`](ThreadPool::wait) first if every submitted job
/// should run.
///
/// # Monitoring
///
/// Each pool instance provides methods for gathering various statistics on the
/// pool's usage, such as the number of running and queued jobs. While these
/// methods provide the most up-to-date numbers upon invocation, they should
/// not be used for controlling program behavior since they can become
/// immediately outdated due to the live nature of the pool.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Create a new thread pool with the given number of worker threads.
    ///
    /// If you'd like to customize the thread pool's behavior then use
    /// [`ThreadPool::builder`].
    ///
    /// # Examples
    ///
    /// ```
    /// let pool = thpool::ThreadPool::new(4).unwrap();
    /// assert_eq!(pool.threads(), 4);
    ///
    /// assert!(thpool::ThreadPool::new(0).is_err());
    /// ```
    #[inline]
    pub fn new(threads: usize) -> Result<Self, InitError> {
        Self::builder().size(threads).build()
    }

    /// Get a builder for creating a customized thread pool.
    #[inline]
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Get the number of worker threads currently alive in the thread pool.
    pub fn threads(&self) -> usize {
        *self.shared.thread_count()
    }

    /// Get the number of jobs queued for execution, but not yet started.
    #[inline]
    pub fn queued_jobs(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Get the number of jobs currently running.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::{thread::sleep, time::Duration};
    ///
    /// let pool = thpool::ThreadPool::new(1).unwrap();
    ///
    /// // Nothing is running yet.
    /// assert_eq!(pool.running_jobs(), 0);
    ///
    /// // Start a job.
    /// pool.execute(|| sleep(Duration::from_millis(100))).unwrap();
    ///
    /// // Wait a little for the job to start.
    /// sleep(Duration::from_millis(10));
    /// assert_eq!(pool.running_jobs(), 1);
    ///
    /// // Wait for the job to complete.
    /// pool.wait();
    /// assert_eq!(pool.running_jobs(), 0);
    /// ```
    pub fn running_jobs(&self) -> usize {
        self.shared
            .slots
            .iter()
            .filter(|slot| !slot.idle.load(Ordering::Acquire))
            .count()
    }

    /// Get the number of jobs completed (successfully or otherwise) by this
    /// pool since it was created.
    #[inline]
    #[allow(clippy::useless_conversion)]
    pub fn completed_jobs(&self) -> u64 {
        self.shared.completed_jobs_count.load(Ordering::Acquire).into()
    }

    /// Get the number of jobs that have panicked since the pool was created.
    ///
    /// A panicking job does not take its worker thread down with it.
    #[inline]
    #[allow(clippy::useless_conversion)]
    pub fn panicked_jobs(&self) -> u64 {
        self.shared.panicked_jobs_count.load(Ordering::Acquire).into()
    }

    /// Submit a closure to be executed by the thread pool.
    ///
    /// The closure is appended to the back of the queue and picked up by the
    /// next worker to become free. Nothing is returned from the job; send the
    /// result somewhere from inside the closure if it is needed.
    ///
    /// # Errors
    ///
    /// Returns the closure back if the pool has shut down. Submitting through
    /// the pool itself never fails since the pool is consumed by shutdown, but
    /// a [`Submitter`] can outlive it.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
    ///
    /// let pool = thpool::ThreadPool::new(4).unwrap();
    /// let counter = Arc::new(AtomicUsize::new(0));
    ///
    /// for _ in 0..100 {
    ///     let counter = counter.clone();
    ///     pool.execute(move || {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///     }).unwrap();
    /// }
    ///
    /// pool.wait();
    /// assert_eq!(counter.load(Ordering::SeqCst), 100);
    /// ```
    pub fn execute<F>(&self, closure: F) -> Result<(), PoolClosedError<F>>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.push(closure)
    }

    /// Get a handle for submitting jobs to this pool from elsewhere.
    ///
    /// Submitters can be cloned and shared between threads freely. Unlike the
    /// pool itself they may outlive the pool, in which case submissions are
    /// rejected.
    pub fn submitter(&self) -> Submitter {
        Submitter {
            shared: self.shared.clone(),
        }
    }

    /// Block until the queue is empty and every worker is idle.
    ///
    /// The pool is checked at the configured
    /// [`poll_interval`](Builder::poll_interval). A job submitted from
    /// another thread right after the check passes is not waited for.
    pub fn wait(&self) {
        while !self.shared.is_drained() {
            thread::sleep(self.shared.poll_interval);
        }
    }

    /// Block until the pool has drained, or until the given timeout passes.
    ///
    /// Returns `true` if the pool drained before the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_deadline(Instant::now() + timeout)
    }

    /// Block until the pool has drained, or the given deadline passes.
    ///
    /// Returns `true` if the pool drained before the deadline.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        loop {
            if self.shared.is_drained() {
                return true;
            }

            match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => {
                    thread::sleep(self.shared.poll_interval.min(remaining));
                }
                _ => return false,
            }
        }
    }

    /// Shut down this thread pool and block until all worker threads have
    /// stopped.
    ///
    /// Jobs that are already running are allowed to finish. Jobs still
    /// waiting in the queue are dropped without being run.
    pub fn destroy(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let has_jobs = {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.queue.signal()
        };

        // Each worker passes the wake-up on to the next one as it exits.
        has_jobs.post();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("worker thread panicked during shutdown");
            }
        }

        let dropped = self.shared.lock().queue.clear();

        if !dropped.is_empty() {
            log::debug!("dropping {} queued jobs that never ran", dropped.len());
        }
    }

    fn spawn_worker(&mut self, builder: thread::Builder, id: usize) -> std::io::Result<()> {
        let worker = Worker::new(
            id,
            self.shared.clone(),
            WorkerListener {
                id,
                shared: self.shared.clone(),
                registered: false,
            },
        );

        let handle = builder.spawn(move || worker.run())?;
        self.workers.push(handle);

        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Already shut down by `destroy`, or no worker was ever spawned.
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.threads())
            .field("queued_jobs", &self.queued_jobs())
            .field("running_jobs", &self.running_jobs())
            .field("completed_jobs", &self.completed_jobs())
            .finish()
    }
}

/// A cloneable handle for submitting jobs to a [`ThreadPool`].
///
/// # Examples
///
/// ```
/// let pool = thpool::ThreadPool::new(2).unwrap();
/// let submitter = pool.submitter();
///
/// std::thread::spawn(move || {
///     submitter.execute(|| println!("hello from the pool")).unwrap();
/// })
/// .join()
/// .unwrap();
///
/// pool.wait();
/// ```
#[derive(Clone)]
pub struct Submitter {
    shared: Arc<Shared>,
}

impl Submitter {
    /// Submit a closure to be executed by the thread pool.
    ///
    /// See [`ThreadPool::execute`].
    pub fn execute<F>(&self, closure: F) -> Result<(), PoolClosedError<F>>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.push(closure)
    }

    /// Check whether the pool has been shut down.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().shutdown
    }
}

impl fmt::Debug for Submitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submitter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// State guarded by the pool mutex.
pub(crate) struct State {
    pub(crate) queue: JobQueue,
    pub(crate) shutdown: bool,
}

struct WorkerSlot {
    /// Cleared with the pool mutex held when the worker takes a job, set again
    /// once the job has finished.
    idle: AtomicBool,
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self {
            idle: AtomicBool::new(true),
        }
    }
}

/// Thread pool state shared by the owner and the worker threads.
pub(crate) struct Shared {
    state: Mutex<State>,
    slots: Box<[WorkerSlot]>,
    thread_count: Mutex<usize>,
    thread_cvar: Condvar,
    completed_jobs_count: AtomicCounter,
    panicked_jobs_count: AtomicCounter,
    poll_interval: Duration,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        // No user code runs while the lock is held, so the state is never
        // left half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn thread_count(&self) -> MutexGuard<'_, usize> {
        self.thread_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn push<F>(&self, closure: F) -> Result<(), PoolClosedError<F>>
    where
        F: FnOnce() + Send + 'static,
    {
        let closure = Box::new(closure);
        let mut state = self.lock();

        if state.shutdown {
            return Err(PoolClosedError(*closure));
        }

        state.queue.push(Job::new(closure));

        Ok(())
    }

    fn is_drained(&self) -> bool {
        let state = self.lock();

        state.queue.is_empty()
            && self
                .slots
                .iter()
                .all(|slot| slot.idle.load(Ordering::Acquire))
    }

    fn wait_for_threads(&self, count: usize) {
        let mut thread_count = self.thread_count();

        while *thread_count < count {
            thread_count = self
                .thread_cvar
                .wait(thread_count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct WorkerListener {
    id: usize,
    shared: Arc<Shared>,
    registered: bool,
}

impl Listener for WorkerListener {
    fn on_started(&mut self) {
        *self.shared.thread_count() += 1;
        self.shared.thread_cvar.notify_all();
        self.registered = true;
    }

    fn on_job_started(&mut self) {
        // Relaxed is enough: the pool mutex is held here and by every reader
        // that makes drain decisions.
        self.shared.slots[self.id]
            .idle
            .store(false, Ordering::Relaxed);
    }

    fn on_job_completed(&mut self, panicked: bool) {
        self.shared
            .completed_jobs_count
            .fetch_add(1, Ordering::Release);

        if panicked {
            self.shared
                .panicked_jobs_count
                .fetch_add(1, Ordering::Release);
        }

        self.shared.slots[self.id]
            .idle
            .store(true, Ordering::Release);
    }
}

impl Drop for WorkerListener {
    fn drop(&mut self) {
        if self.registered {
            let mut count = self.shared.thread_count();
            *count = count.saturating_sub(1);
            self.shared.thread_cvar.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_after_shutdown_does_not_repeat_it() {
        let mut pool = ThreadPool::new(2).unwrap();
        let has_jobs = pool.shared.lock().queue.signal();

        pool.shutdown();
        assert!(pool.workers.is_empty());

        // The last worker to exit leaves the relayed wake-up behind.
        has_jobs.wait();

        drop(pool);
        assert!(!has_jobs.is_set());
    }

    #[test]
    fn drop_without_destroy_joins_workers() {
        let pool = ThreadPool::new(3).unwrap();
        let shared = pool.shared.clone();

        drop(pool);

        assert!(shared.lock().shutdown);
        assert_eq!(*shared.thread_count(), 0);
    }
}
