use crate::loom::sync::atomic::{AtomicUsize, Ordering};
use crate::loom::sync::{Condvar, Mutex};

/// Counts the outstanding leases of one arena generation.
///
/// Leases are acquired under the pool lock but completed from any thread
/// without coordination. [`wait`] blocks until the count drops to zero.
///
/// [`wait`]: Self::wait
#[derive(Debug)]
pub(crate) struct Completion {
    outstanding: AtomicUsize,
    lock: Mutex<()>,
    zero: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            lock: Mutex::new(()),
            zero: Condvar::new(),
        }
    }

    /// Registers a new lease.
    #[inline]
    pub(crate) fn acquire(&self) {
        let old = self.outstanding.fetch_add(1, Ordering::Relaxed);

        // Leaking handles is safe, so the count must never overflow.
        if old > usize::MAX >> 1 {
            crate::abort();
        }
    }

    /// Completes a lease, waking any drainer if it was the last one.
    #[inline]
    pub(crate) fn complete(&self) {
        // Release pairs with the Acquire load in `wait` so every write made
        // through the lease is visible before the arena is reset.
        let old = self.outstanding.fetch_sub(1, Ordering::Release);

        if old == 0 {
            // Every lease completes at most once.
            crate::abort();
        }

        if old == 1 {
            let _guard = self.lock.lock();
            self.zero.notify_all();
        }
    }

    #[inline]
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Blocks until every lease has completed. There is no timeout.
    pub(crate) fn wait(&self) {
        if self.outstanding() == 0 {
            return;
        }

        let mut guard = self.lock.lock();
        while self.outstanding() != 0 {
            self.zero.wait(&mut guard);
        }
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use std::vec::Vec;

    use super::Completion;

    const THREADS: usize = 4;
    const ITERATIONS: usize = 10_000;

    #[test]
    fn test_wait_without_leases() {
        let completion = Completion::new();
        completion.wait();
        assert_eq!(completion.outstanding(), 0);
    }

    #[test]
    fn test_wait_blocks_until_zero() {
        let completion = Arc::new(Completion::new());
        completion.acquire();
        completion.acquire();

        let waiter = {
            let completion = completion.clone();
            thread::spawn(move || completion.wait())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        completion.complete();
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        completion.complete();
        waiter.join().unwrap();
        assert_eq!(completion.outstanding(), 0);
    }

    #[test]
    fn test_concurrent_complete() {
        let completion = Arc::new(Completion::new());
        for _ in 0..THREADS * ITERATIONS {
            completion.acquire();
        }

        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let completion = completion.clone();
                thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        completion.complete();
                    }
                })
            })
            .collect();

        completion.wait();
        for th in threads {
            th.join().unwrap();
        }

        assert_eq!(completion.outstanding(), 0);
    }
}

#[cfg(all(loom, test))]
mod loom_tests {
    use std::vec::Vec;

    use loom::sync::Arc;
    use loom::thread;

    use super::Completion;

    const THREADS: usize = 2;
    const ITERATIONS: usize = 3;

    #[test]
    fn test_complete() {
        loom::model(|| {
            let completion = Arc::new(Completion::new());
            for _ in 0..THREADS * ITERATIONS {
                completion.acquire();
            }

            let threads: Vec<_> = (0..THREADS)
                .map(|_| {
                    let completion = completion.clone();
                    thread::spawn(move || {
                        for _ in 0..ITERATIONS {
                            completion.complete();
                        }
                    })
                })
                .collect();

            for th in threads {
                th.join().unwrap();
            }

            assert_eq!(completion.outstanding(), 0);
        });
    }

    #[test]
    fn test_wait_while_completing() {
        loom::model(|| {
            let completion = Arc::new(Completion::new());
            for _ in 0..THREADS {
                completion.acquire();
            }

            let threads: Vec<_> = (0..THREADS)
                .map(|_| {
                    let completion = completion.clone();
                    thread::spawn(move || completion.complete())
                })
                .collect();

            // Must neither return early nor miss the final wakeup.
            completion.wait();
            assert_eq!(completion.outstanding(), 0);

            for th in threads {
                th.join().unwrap();
            }
        });
    }
}
