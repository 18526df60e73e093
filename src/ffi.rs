//! C-compatible interface to the thread pool.
//!
//! Jobs are submitted as a function pointer plus an opaque argument pointer.
//! The pool never looks at the argument or the function's return value; the
//! caller must keep whatever the argument points to alive until the job has
//! run (or the pool has been destroyed).

use std::{
    os::raw::{c_int, c_void},
    ptr,
};

use crate::ThreadPool;

/// Signature of a job function accepted by [`thpool_add_work`].
pub type JobFunction = unsafe extern "C" fn(arg: *mut c_void) -> *mut c_void;

/// Argument pointer moved into a worker thread.
struct SendPtr(*mut c_void);

// The caller of `thpool_add_work` is responsible for the pointee being safe to
// use from a worker thread.
unsafe impl Send for SendPtr {}

impl SendPtr {
    // Closures must capture the wrapper as a whole, not the raw pointer field.
    fn get(&self) -> *mut c_void {
        self.0
    }
}

/// Create a thread pool with `threads` worker threads.
///
/// Returns a null pointer if `threads` is less than 1 or the pool could not be
/// created. A non-null pool must eventually be passed to [`thpool_destroy`].
#[no_mangle]
pub extern "C" fn thpool_init(threads: c_int) -> *mut ThreadPool {
    let threads = match usize::try_from(threads) {
        Ok(threads) if threads > 0 => threads,
        _ => {
            log::error!("cannot create thread pool with {} threads", threads);
            return ptr::null_mut();
        }
    };

    match ThreadPool::new(threads) {
        Ok(pool) => Box::into_raw(Box::new(pool)),
        Err(e) => {
            log::error!("failed to create thread pool: {}", e);
            ptr::null_mut()
        }
    }
}

/// Add a job to the pool's queue.
///
/// Returns 0 on success, or -1 if `pool` or `function` is null, in which case
/// nothing is queued.
///
/// # Safety
///
/// `pool` must be null or a pointer returned by [`thpool_init`] that has not
/// been destroyed. `arg` must remain valid until `function` has returned.
#[no_mangle]
pub unsafe extern "C" fn thpool_add_work(
    pool: *const ThreadPool,
    function: Option<JobFunction>,
    arg: *mut c_void,
) -> c_int {
    let pool = match pool.as_ref() {
        Some(pool) => pool,
        None => return -1,
    };

    let function = match function {
        Some(function) => function,
        None => {
            log::error!("refusing to add job with a null function");
            return -1;
        }
    };

    let arg = SendPtr(arg);

    let result = pool.execute(move || unsafe {
        function(arg.get());
    });

    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Block until every queued job has been run and all workers are idle.
///
/// # Safety
///
/// `pool` must be null or a live pointer returned by [`thpool_init`].
#[no_mangle]
pub unsafe extern "C" fn thpool_wait(pool: *const ThreadPool) {
    if let Some(pool) = pool.as_ref() {
        pool.wait();
    }
}

/// Stop all worker threads and free the pool.
///
/// Running jobs finish first. Jobs still in the queue are never run.
///
/// # Safety
///
/// `pool` must be null or a pointer returned by [`thpool_init`]. It must not
/// be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn thpool_destroy(pool: *mut ThreadPool) {
    if !pool.is_null() {
        let pool = Box::from_raw(pool);
        (*pool).destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    unsafe extern "C" fn increment(arg: *mut c_void) -> *mut c_void {
        (*(arg as *const AtomicUsize)).fetch_add(1, Ordering::SeqCst);
        ptr::null_mut()
    }

    #[test]
    fn init_rejects_non_positive_sizes() {
        assert!(thpool_init(0).is_null());
        assert!(thpool_init(-1).is_null());
    }

    #[test]
    fn add_work_and_wait() {
        let counter = AtomicUsize::new(0);
        let arg = &counter as *const AtomicUsize as *mut c_void;

        unsafe {
            let pool = thpool_init(4);
            assert!(!pool.is_null());

            for _ in 0..100 {
                assert_eq!(thpool_add_work(pool, Some(increment), arg), 0);
            }

            thpool_wait(pool);
            assert_eq!(counter.load(Ordering::SeqCst), 100);

            thpool_destroy(pool);
        }
    }

    #[test]
    fn null_function_is_rejected() {
        unsafe {
            let pool = thpool_init(1);

            assert_eq!(thpool_add_work(pool, None, ptr::null_mut()), -1);
            assert_eq!((*pool).queued_jobs(), 0);

            thpool_wait(pool);
            assert_eq!((*pool).completed_jobs(), 0);

            thpool_destroy(pool);
        }
    }

    #[test]
    fn null_pool_is_ignored() {
        unsafe {
            assert_eq!(
                thpool_add_work(ptr::null(), Some(increment), ptr::null_mut()),
                -1
            );
            thpool_wait(ptr::null());
            thpool_destroy(ptr::null_mut());
        }
    }
}
