use std::{error::Error, fmt, io};

/// An error returned when a job could not be submitted because the thread
/// pool has already been shut down.
///
/// Contains the original closure that failed to be submitted. This allows you
/// to run it somewhere else or take some other action.
pub struct PoolClosedError<T>(pub(crate) T);

impl<T> PoolClosedError<T> {
    /// Extracts the inner closure that could not be submitted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Error for PoolClosedError<T> {}

impl<T> fmt::Debug for PoolClosedError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PoolClosedError(..)")
    }
}

impl<T> fmt::Display for PoolClosedError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("thread pool is shut down")
    }
}

/// An error returned when a thread pool could not be created.
///
/// No threads are left running when this error is returned.
pub enum InitError {
    /// The pool was configured with zero worker threads.
    ZeroThreads,

    /// The configured thread name contains a null byte.
    InvalidName,

    /// The operating system refused to spawn a worker thread.
    Spawn(io::Error),
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Debug for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroThreads => f.write_str("ZeroThreads"),
            Self::InvalidName => f.write_str("InvalidName"),
            Self::Spawn(e) => f.debug_tuple("Spawn").field(e).finish(),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroThreads => f.write_str("thread pool size must be non-zero"),
            Self::InvalidName => f.write_str("thread pool name must not contain null bytes"),
            Self::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}
