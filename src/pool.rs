use core::mem;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::arena::Arena;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::object_pool::ObjectPool;
use crate::writer::WriteHandle;

/// A recycling pool of [`Arena`]s.
///
/// The pool serves every request from one current arena. When it runs full, a recycled (or
/// new) arena takes its place and the exhausted one is handed to a background thread. That
/// thread waits until every lease on the arena has been released, resets it and returns it to
/// the recycler.
///
/// `Pool` is cheap to clone. All clones share the same arenas.
///
/// # Leaked leases
///
/// Reclamation has no timeout. A handle that is never released or dropped (for example one
/// passed to [`mem::forget`]) keeps its arena from ever being recycled, and the reclamation
/// thread waits forever.
///
/// # Examples
///
/// ```
/// # use arenapool::{Pool, KIB, MIB};
/// #
/// let pool = Pool::new(MIB, 64 * KIB, 1).unwrap();
///
/// let mut w = pool.get_writer(11).unwrap();
/// let _ = w.write(b"hello arena");
///
/// let mut r = w.to_reader();
/// assert_eq!(r.peek(5).unwrap(), b"hello");
///
/// let mut buf = [0; 32];
/// let outcome = r.read(&mut buf);
/// assert!(outcome.is_end());
/// assert_eq!(&buf[..outcome.read()], b"hello arena");
///
/// r.release();
/// ```
#[derive(Debug, Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: PoolConfig,
    current: Mutex<Arena>,
    recycler: Arc<ObjectPool<Arena>>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    arenas_created: AtomicU64,
    swaps: AtomicU64,
    recycled: AtomicU64,
    oversized: AtomicU64,
}

/// A snapshot of the pool's counters, see [`Pool::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Arenas allocated, including the first one.
    pub arenas_created: u64,
    /// Times an exhausted arena was replaced.
    pub swaps: u64,
    /// Arenas that were drained, reset and returned to the recycler.
    pub recycled: u64,
    /// Requests above the reasonable limit that bypassed the arenas.
    pub oversized: u64,
}

impl Pool {
    /// Creates a pool of arenas of `size` bytes.
    ///
    /// `recycler_capacity` bounds the fast-path queue of recycled arenas, `0` disables it. Fails
    /// with [`Error::InvalidConfiguration`] unless `reasonable_limit * 10 <= size`.
    pub fn new(size: usize, reasonable_limit: usize, recycler_capacity: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(size, reasonable_limit, recycler_capacity))
    }

    /// Creates a pool from a [`PoolConfig`]. The first arena is allocated eagerly.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let counters = Arc::new(Counters::default());

        let recycler = {
            let counters = counters.clone();
            let name = config.name.clone();
            let size = config.arena_size;
            let reasonable_limit = config.reasonable_limit;

            ObjectPool::new(config.recycler_capacity, move || {
                new_arena(&name, size, reasonable_limit, &counters)
            })
        };

        let current = new_arena(
            &config.name,
            config.arena_size,
            config.reasonable_limit,
            &counters,
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                current: Mutex::new(current),
                recycler: Arc::new(recycler),
                counters,
            }),
        })
    }

    /// Leases a block of `size` bytes.
    ///
    /// Requests above the reasonable limit get a standalone block. Fails only with
    /// [`Error::InvalidSize`] for `size == 0`; a full arena is swapped out transparently.
    pub fn get_writer(&self, size: usize) -> Result<WriteHandle> {
        let (result, retired) = {
            let mut current = self.shared.current.lock();

            match current.request(size) {
                Err(Error::ArenaFull { .. }) => {
                    let fresh = self.shared.recycler.get();
                    let retired = mem::replace(&mut *current, fresh);
                    self.shared.counters.swaps.fetch_add(1, Ordering::Relaxed);

                    debug!(
                        pool = %self.shared.config.name,
                        size,
                        retired_generation = retired.generation(),
                        outstanding = retired.outstanding(),
                        "arena exhausted, swapping"
                    );

                    (current.request(size), Some(retired))
                }
                result => (result, None),
            }
        };

        if let Some(retired) = retired {
            self.retire(retired);
        }

        match result {
            Ok(w) => {
                if !w.is_arena_backed() {
                    self.shared.counters.oversized.fetch_add(1, Ordering::Relaxed);
                }
                Ok(w)
            }
            // A fresh arena fits any request up to the reasonable limit.
            Err(Error::ArenaFull { .. }) => {
                error!(
                    pool = %self.shared.config.name,
                    size,
                    "fresh arena cannot serve request"
                );
                Err(Error::InvalidConfiguration {
                    arena_size: self.shared.config.arena_size,
                    reasonable_limit: self.shared.config.reasonable_limit,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Returns a snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;

        PoolStats {
            arenas_created: counters.arenas_created.load(Ordering::Relaxed),
            swaps: counters.swaps.load(Ordering::Relaxed),
            recycled: counters.recycled.load(Ordering::Relaxed),
            oversized: counters.oversized.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Hands an exhausted arena to a reclamation thread.
    fn retire(&self, arena: Arena) {
        let name = self.shared.config.name.clone();
        let recycler = self.shared.recycler.clone();
        let counters = self.shared.counters.clone();

        let spawned = thread::Builder::new()
            .name(format!("{name}-reclaim"))
            .spawn(move || reclaim(arena, &name, &recycler, &counters));

        if let Err(err) = spawned {
            // The arena is dropped with the closure. Its block is freed once the last handle
            // is released.
            warn!(
                pool = %self.shared.config.name,
                error = %err,
                "failed to spawn arena reclamation thread"
            );
        }
    }
}

fn new_arena(name: &str, size: usize, reasonable_limit: usize, counters: &Counters) -> Arena {
    let created = counters.arenas_created.fetch_add(1, Ordering::Relaxed) + 1;
    debug!(pool = %name, size, reasonable_limit, created, "allocating arena");

    Arena::with_checked_limits(size, reasonable_limit)
}

fn reclaim(mut arena: Arena, name: &str, recycler: &ObjectPool<Arena>, counters: &Counters) {
    arena.drain();

    // Nothing can lease from a retired arena, so it stays drained.
    if let Err(err) = arena.reset() {
        warn!(pool = %name, error = %err, "dropping arena that failed to reset");
        return;
    }

    counters.recycled.fetch_add(1, Ordering::Relaxed);
    debug!(pool = %name, generation = arena.generation(), "arena recycled");

    recycler.put(arena);
}

#[cfg(all(not(loom), test))]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};
    use std::vec::Vec;

    use super::{Pool, PoolStats};
    use crate::{Error, PoolConfig, WriteOutcome};

    fn wait_for(pool: &Pool, f: impl Fn(PoolStats) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !f(pool.stats()) {
            assert!(Instant::now() < deadline, "timed out: {:?}", pool.stats());
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            Pool::new(100, 11, 0).unwrap_err(),
            Error::InvalidConfiguration {
                arena_size: 100,
                reasonable_limit: 11,
            }
        );
        assert!(Pool::with_config(PoolConfig::default().with_arena_size(0)).is_err());
    }

    #[test]
    fn test_first_arena_is_eager() {
        let pool = Pool::new(1000, 100, 0).unwrap();
        assert_eq!(
            pool.stats(),
            PoolStats {
                arenas_created: 1,
                ..PoolStats::default()
            }
        );
        assert_eq!(pool.shared.current.lock().cursor(), 0);
    }

    #[test]
    fn test_invalid_size() {
        let pool = Pool::new(1000, 100, 0).unwrap();
        assert_eq!(pool.get_writer(0).unwrap_err(), Error::InvalidSize);
        assert_eq!(pool.stats().swaps, 0);
    }

    #[test]
    fn test_exhaustion_swaps() {
        let pool = Pool::new(1000, 100, 1).unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            handles.push(pool.get_writer(100).unwrap());
        }
        assert_eq!(pool.stats().swaps, 0);

        let w = pool.get_writer(100).unwrap();
        assert!(w.is_arena_backed());
        assert_eq!(pool.stats().swaps, 1);
        assert_eq!(pool.stats().arenas_created, 2);
        assert_eq!(pool.shared.current.lock().cursor(), 100);
        assert_eq!(pool.shared.current.lock().outstanding(), 1);
    }

    #[test]
    fn test_recycling() {
        let pool = Pool::new(1000, 100, 1).unwrap();

        let first: Vec<_> = (0..10).map(|_| pool.get_writer(100).unwrap()).collect();
        let _second = pool.get_writer(100).unwrap();
        assert_eq!(pool.stats().swaps, 1);

        // The retired arena waits for its leases.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.stats().recycled, 0);

        for w in first {
            w.to_reader().release();
        }
        wait_for(&pool, |stats| stats.recycled == 1);
        assert_eq!(pool.shared.recycler.fast_len(), 1);

        // Exhaust the second arena; the recycled one comes back with its cursor at 0.
        let _rest: Vec<_> = (0..9).map(|_| pool.get_writer(100).unwrap()).collect();
        let _w = pool.get_writer(100).unwrap();

        let current = pool.shared.current.lock();
        assert_eq!(current.generation(), 1);
        assert_eq!(current.cursor(), 100);
        drop(current);

        let stats = pool.stats();
        assert_eq!(stats.swaps, 2);
        assert_eq!(stats.arenas_created, 2);
    }

    #[test]
    fn test_recycled_arena_accepts_full_size() {
        let pool = Pool::new(1000, 100, 0).unwrap();

        for _ in 0..10 {
            pool.get_writer(100).unwrap().release();
        }
        pool.get_writer(100).unwrap().release();
        wait_for(&pool, |stats| stats.recycled == 1);

        // 9 more fill the current arena, the next ten come from the recycled one.
        for _ in 0..9 {
            pool.get_writer(100).unwrap().release();
        }
        let handles: Vec<_> = (0..10).map(|_| pool.get_writer(100).unwrap()).collect();
        assert_eq!(handles.len(), 10);

        let stats = pool.stats();
        assert_eq!(stats.swaps, 2);
        assert_eq!(stats.arenas_created, 2);
        assert_eq!(pool.shared.current.lock().remaining(), 0);
    }

    #[test]
    fn test_oversized() {
        let pool = Pool::new(1000, 100, 0).unwrap();
        for _ in 0..10 {
            let _ = pool.get_writer(100).unwrap();
        }

        let mut w = pool.get_writer(101).unwrap();
        assert!(!w.is_arena_backed());
        assert_eq!(w.capacity(), 101);
        assert_eq!(w.write(&[9; 101]), WriteOutcome::Complete(101));
        w.to_reader().release();

        let stats = pool.stats();
        assert_eq!(stats.oversized, 1);
        assert_eq!(stats.swaps, 0);
        assert_eq!(pool.shared.current.lock().outstanding(), 0);
    }

    #[test]
    fn test_leaked_lease_stalls_only_its_arena() {
        let pool = Pool::new(1000, 100, 0).unwrap();

        let leaked = pool.get_writer(100).unwrap();
        for _ in 0..9 {
            pool.get_writer(100).unwrap().release();
        }

        // Swaps into a second arena while the first one cannot drain.
        for _ in 0..20 {
            pool.get_writer(100).unwrap().release();
        }
        wait_for(&pool, |stats| stats.recycled >= 1);

        let stats = pool.stats();
        assert_eq!(stats.swaps, 2);
        assert_eq!(stats.recycled, 1);
        assert_eq!(stats.arenas_created, 3);

        leaked.release();
        wait_for(&pool, |stats| stats.recycled == 2);
    }
}
