use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A semaphore which can only hold a single permit.
///
/// Posting while a permit is already available does nothing to the value, so
/// any number of posts made while nobody is waiting collapse into a single
/// pending wake-up. Waiting consumes exactly one permit.
#[derive(Debug)]
pub(crate) struct BinarySemaphore {
    value: Mutex<bool>,
    cvar: Condvar,
}

impl BinarySemaphore {
    pub(crate) fn new(initial: bool) -> Self {
        Self {
            value: Mutex::new(initial),
            cvar: Condvar::new(),
        }
    }

    /// Make a permit available and wake up one waiter, if any. Never blocks
    /// for longer than it takes to acquire the internal lock.
    pub(crate) fn post(&self) {
        let mut value = self.lock();
        *value = true;
        self.cvar.notify_one();
    }

    /// Block until a permit is available, then consume it.
    pub(crate) fn wait(&self) {
        let mut value = self.lock();

        // Loop to guard against spurious wake-ups, and against another waiter
        // taking the permit first.
        while !*value {
            value = self
                .cvar
                .wait(value)
                .unwrap_or_else(PoisonError::into_inner);
        }

        *value = false;
    }

    #[cfg(test)]
    pub(crate) fn is_set(&self) -> bool {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        // The protected value is a plain flag, so a poisoned lock still holds
        // a meaningful value.
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn posts_coalesce() {
        let sem = BinarySemaphore::new(false);

        sem.post();
        sem.post();
        sem.post();
        assert!(sem.is_set());

        sem.wait();
        assert!(!sem.is_set());
    }

    #[test]
    fn initial_permit_is_consumed() {
        let sem = BinarySemaphore::new(true);

        sem.wait();
        assert!(!sem.is_set());
    }

    #[test]
    fn post_wakes_one_waiter() {
        let sem = Arc::new(BinarySemaphore::new(false));
        let woken = Arc::new(AtomicUsize::new(0));

        let waiters = (0..2)
            .map(|_| {
                let sem = sem.clone();
                let woken = woken.clone();

                thread::spawn(move || {
                    sem.wait();
                    woken.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect::<Vec<_>>();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(woken.load(Ordering::SeqCst), 0);

        sem.post();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(woken.load(Ordering::SeqCst), 1);

        sem.post();
        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 2);
    }
}
