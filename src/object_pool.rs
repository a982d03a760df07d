use core::fmt::{self, Debug, Formatter};

use alloc::boxed::Box;
use crossbeam_queue::{ArrayQueue, SegQueue};

/// Clears state that the next holder of a pooled value must not observe.
pub trait Reset {
    fn reset(&mut self);
}

/// A two-tier pool of reusable values.
///
/// [`get`] first pops from a bounded lock-free queue, then from an unbounded free list, and
/// finally builds a new value with the factory. [`put`] prefers the bounded queue and spills to
/// the free list when it is full.
///
/// Values on the free list are idle and may be dropped at any time with [`reclaim`], so a value
/// that was put back is not guaranteed to be handed out again.
///
/// # Examples
///
/// ```
/// # use arenapool::ObjectPool;
/// #
/// let pool = ObjectPool::new(1, || Vec::<u8>::with_capacity(64));
///
/// let a = pool.get();
/// let b = pool.get();
/// pool.put(a);
/// pool.put(b);
///
/// assert_eq!(pool.fast_len(), 1);
/// assert_eq!(pool.free_len(), 1);
/// ```
///
/// [`get`]: Self::get
/// [`put`]: Self::put
/// [`reclaim`]: Self::reclaim
pub struct ObjectPool<T> {
    fast: Option<ArrayQueue<T>>,
    free: SegQueue<T>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    reset: Option<fn(&mut T)>,
}

impl<T> ObjectPool<T> {
    /// Creates a pool whose fast-path queue holds up to `capacity` values. A `capacity` of `0`
    /// disables the queue and only the free list is used.
    pub fn new<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            // `ArrayQueue` cannot be empty.
            fast: (capacity > 0).then(|| ArrayQueue::new(capacity)),
            free: SegQueue::new(),
            factory: Box::new(factory),
            reset: None,
        }
    }

    /// Returns a pooled value or builds a new one.
    #[inline]
    pub fn get(&self) -> T {
        if let Some(value) = self.fast.as_ref().and_then(ArrayQueue::pop) {
            return value;
        }

        match self.free.pop() {
            Some(value) => value,
            None => (self.factory)(),
        }
    }

    /// Returns `value` to the pool, resetting it first if the pool was built with
    /// [`resetting`].
    ///
    /// [`resetting`]: Self::resetting
    #[inline]
    pub fn put(&self, mut value: T) {
        if let Some(reset) = self.reset {
            reset(&mut value);
        }

        let value = match &self.fast {
            Some(fast) => match fast.push(value) {
                Ok(()) => return,
                Err(value) => value,
            },
            None => value,
        };

        self.free.push(value);
    }

    /// Drops every idle value on the free list and returns how many were dropped.
    ///
    /// Values in the fast-path queue are kept.
    pub fn reclaim(&self) -> usize {
        let mut count = 0;
        while self.free.pop().is_some() {
            count += 1;
        }
        count
    }

    /// Returns the capacity of the fast-path queue.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.fast.as_ref().map_or(0, ArrayQueue::capacity)
    }

    #[inline]
    pub fn fast_len(&self) -> usize {
        self.fast.as_ref().map_or(0, ArrayQueue::len)
    }

    #[inline]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }
}

impl<T> ObjectPool<T>
where
    T: Reset,
{
    /// Creates a pool that calls [`Reset::reset`] on every value passed to [`put`].
    ///
    /// [`put`]: Self::put
    pub fn resetting<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            reset: Some(<T as Reset>::reset),
            ..Self::new(capacity, factory)
        }
    }
}

impl<T> Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("capacity", &self.capacity())
            .field("fast_len", &self.fast_len())
            .field("free_len", &self.free_len())
            .field("resetting", &self.reset.is_some())
            .finish()
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    use super::{ObjectPool, Reset};

    const THREADS: usize = 4;
    const ITERATIONS: usize = 10_000;

    #[derive(Debug, Default)]
    struct Scratch {
        id: usize,
        dirty: bool,
    }

    impl Reset for Scratch {
        fn reset(&mut self) {
            self.dirty = false;
        }
    }

    fn counting(capacity: usize) -> (ObjectPool<Scratch>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let pool = {
            let created = created.clone();
            ObjectPool::new(capacity, move || Scratch {
                id: created.fetch_add(1, Ordering::Relaxed),
                dirty: false,
            })
        };
        (pool, created)
    }

    #[test]
    fn test_get_creates_lazily() {
        let (pool, created) = counting(2);
        assert_eq!(created.load(Ordering::Relaxed), 0);

        let a = pool.get();
        let b = pool.get();
        assert_eq!((a.id, b.id), (0, 1));
        assert_eq!(created.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_fast_path_then_free_list() {
        let (pool, created) = counting(1);
        let a = pool.get();
        let b = pool.get();
        let c = pool.get();

        pool.put(a);
        pool.put(b);
        pool.put(c);
        assert_eq!(pool.fast_len(), 1);
        assert_eq!(pool.free_len(), 2);

        // The fast path is drained first.
        assert_eq!(pool.get().id, 0);
        let mut rest = [pool.get().id, pool.get().id];
        rest.sort_unstable();
        assert_eq!(rest, [1, 2]);
        assert_eq!(created.load(Ordering::Relaxed), 3);

        assert_eq!(pool.get().id, 3);
    }

    #[test]
    fn test_zero_capacity_uses_free_list() {
        let (pool, created) = counting(0);
        assert_eq!(pool.capacity(), 0);

        let a = pool.get();
        pool.put(a);
        assert_eq!(pool.fast_len(), 0);
        assert_eq!(pool.free_len(), 1);

        assert_eq!(pool.get().id, 0);
        assert_eq!(created.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_reclaim() {
        let (pool, created) = counting(1);
        let values: Vec<_> = (0..4).map(|_| pool.get()).collect();
        for value in values {
            pool.put(value);
        }

        assert_eq!(pool.reclaim(), 3);
        assert_eq!(pool.free_len(), 0);
        assert_eq!(pool.fast_len(), 1);

        pool.get();
        assert_eq!(pool.get().id, 4);
        assert_eq!(created.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_reset_hook() {
        let pool = ObjectPool::resetting(1, Scratch::default);
        let mut value = pool.get();
        value.dirty = true;
        pool.put(value);
        assert!(!pool.get().dirty);

        let plain = ObjectPool::new(1, Scratch::default);
        let mut value = plain.get();
        value.dirty = true;
        plain.put(value);
        assert!(plain.get().dirty);
    }

    #[test]
    fn test_threads() {
        let (pool, created) = counting(2);
        let pool = Arc::new(pool);

        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        let value = pool.get();
                        pool.put(value);
                    }
                })
            })
            .collect();

        for th in threads {
            th.join().unwrap();
        }

        let created = created.load(Ordering::Relaxed);
        assert!(created <= THREADS);
        assert_eq!(pool.fast_len() + pool.free_len(), created);
    }
}
