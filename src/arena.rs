use tracing::trace;

use crate::block::BlockRef;
use crate::config::check_limits;
use crate::error::{Error, Result};
use crate::lease::Lease;
use crate::writer::WriteHandle;

/// A bump allocation arena over one fixed-size block.
///
/// Every request up to the reasonable limit is carved out of the block by advancing a cursor.
/// Larger requests bypass the arena and get a block of their own. Once the block is used up the
/// arena reports [`Error::ArenaFull`] until it is [`reset`].
///
/// # Examples
///
/// ```
/// # use arenapool::Arena;
/// #
/// let mut arena = Arena::new(1000, 100).unwrap();
///
/// let mut buffers = Vec::new();
/// for _ in 0..10 {
///     // All 10 buffers will be allocated in the same block.
///     let mut w = arena.request(100).unwrap();
///     let _ = w.write(b"hello");
///
///     buffers.push(w.to_reader());
/// }
///
/// assert!(arena.request(1).unwrap_err().is_arena_full());
/// assert_eq!(arena.outstanding(), 10);
///
/// // The buffers may outlive the arena they were allocated with.
/// drop(arena);
///
/// assert_eq!(buffers[0].as_slice(), b"hello");
/// ```
///
/// [`reset`]: Self::reset
#[derive(Debug)]
pub struct Arena {
    block: BlockRef,
    cursor: usize,
    reasonable_limit: usize,
    generation: u64,
}

impl Arena {
    /// Creates a new `Arena` with a block of `size` bytes.
    ///
    /// Fails with [`Error::InvalidConfiguration`] unless `reasonable_limit * 10 <= size`, which
    /// keeps a single request from starving the arena.
    pub fn new(size: usize, reasonable_limit: usize) -> Result<Self> {
        check_limits(size, reasonable_limit)?;

        Ok(Self::with_checked_limits(size, reasonable_limit))
    }

    /// Creates an `Arena` for limits that were already validated.
    #[inline]
    pub(crate) fn with_checked_limits(size: usize, reasonable_limit: usize) -> Self {
        Self {
            block: BlockRef::new(size),
            cursor: 0,
            reasonable_limit,
            generation: 0,
        }
    }

    /// Leases `size` bytes from the arena.
    ///
    /// - `size == 0` fails with [`Error::InvalidSize`].
    /// - `size` above the reasonable limit returns a handle over a fresh standalone block that
    ///   is not tracked by the arena.
    /// - If the block cannot fit `size` more bytes this fails with [`Error::ArenaFull`] and the
    ///   arena is left untouched.
    pub fn request(&mut self, size: usize) -> Result<WriteHandle> {
        if size == 0 {
            return Err(Error::InvalidSize);
        }

        if size > self.reasonable_limit {
            trace!(
                size,
                reasonable_limit = self.reasonable_limit,
                "oversized request bypasses arena"
            );
            return Ok(WriteHandle::new(Lease::standalone(size)));
        }

        let remaining = self.remaining();
        if size > remaining {
            return Err(Error::ArenaFull {
                requested: size,
                remaining,
            });
        }

        // SAFETY: `cursor + size <= len` and the cursor only moves forward until the next reset,
        // which requires every lease of this generation to be released.
        let lease = unsafe { Lease::tracked(&self.block, self.cursor, size) };
        self.cursor += size;

        Ok(WriteHandle::new(lease))
    }

    /// Blocks until every lease issued from this arena generation has been released.
    ///
    /// There is no timeout. A leaked lease blocks forever, so this belongs on a background
    /// thread.
    #[inline]
    pub fn drain(&self) {
        self.block.completion().wait();
    }

    /// Moves the cursor back to the start so the whole block can be leased again.
    ///
    /// The content is not zeroed. Fails with [`Error::LeasesOutstanding`] if any lease is still
    /// held, call [`drain`] first.
    ///
    /// [`drain`]: Self::drain
    pub fn reset(&mut self) -> Result<()> {
        let outstanding = self.outstanding();
        if outstanding != 0 {
            return Err(Error::LeasesOutstanding { outstanding });
        }

        self.cursor = 0;
        self.generation += 1;
        Ok(())
    }

    /// Returns the size of the backing block.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.block.len()
    }

    /// Returns the offset of the next free byte.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.cursor
    }

    #[inline]
    pub fn reasonable_limit(&self) -> usize {
        self.reasonable_limit
    }

    /// Returns the number of leases that were issued and not yet released.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.block.completion().outstanding()
    }

    /// Returns how many times the arena has been reset.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use std::vec::Vec;

    use proptest::prelude::*;

    use crate::{Arena, Error, ReadHandle, WriteOutcome};

    #[test]
    fn test_arena() {
        let mut arena = Arena::new(4000, 400).unwrap();
        assert_eq!(arena.capacity(), 4000);
        assert_eq!(arena.cursor(), 0);

        let mut handles = Vec::new();
        for i in 1..=10 {
            handles.push(arena.request(400).unwrap());
            assert_eq!(arena.cursor(), 400 * i);
            assert_eq!(arena.outstanding(), i);
        }

        assert_eq!(
            arena.request(1).unwrap_err(),
            Error::ArenaFull {
                requested: 1,
                remaining: 0,
            }
        );
        assert_eq!(arena.cursor(), 4000);
        assert_eq!(arena.outstanding(), 10);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            Arena::new(100, 11),
            Err(Error::InvalidConfiguration { .. })
        ));

        let mut arena = Arena::new(100, 10).unwrap();
        assert_eq!(arena.request(0).unwrap_err(), Error::InvalidSize);
        assert_eq!(arena.cursor(), 0);
        assert_eq!(arena.outstanding(), 0);
    }

    #[test]
    fn test_full_does_not_mutate() {
        let mut arena = Arena::new(100, 10).unwrap();
        for _ in 0..9 {
            arena.request(10).unwrap().release();
        }
        let _w = arena.request(5).unwrap();

        assert!(arena.request(10).unwrap_err().is_arena_full());
        assert_eq!(arena.cursor(), 95);
        assert_eq!(arena.outstanding(), 1);

        // A smaller request still fits.
        let _w2 = arena.request(5).unwrap();
        assert_eq!(arena.cursor(), 100);
    }

    #[test]
    fn test_oversized_bypass() {
        let mut arena = Arena::new(100, 10).unwrap();
        for _ in 0..10 {
            let _ = arena.request(10).unwrap();
        }
        assert!(arena.request(10).unwrap_err().is_arena_full());

        let mut w = arena.request(500).unwrap();
        assert!(!w.is_arena_backed());
        assert_eq!(w.capacity(), 500);
        assert_eq!(arena.cursor(), 100);
        assert_eq!(arena.outstanding(), 0);

        assert_eq!(w.write(&[1; 500]), WriteOutcome::Complete(500));
        let r = w.to_reader();
        assert_eq!(arena.outstanding(), 0);
        r.release();
        assert_eq!(arena.outstanding(), 0);
    }

    #[test]
    fn test_reset() {
        let mut arena = Arena::new(100, 10).unwrap();
        let mut w = arena.request(10).unwrap();
        let _ = w.write(b"generation");
        let r = w.to_reader();

        assert_eq!(
            arena.reset(),
            Err(Error::LeasesOutstanding { outstanding: 1 })
        );
        assert_eq!(arena.cursor(), 10);

        r.release();
        arena.drain();
        arena.reset().unwrap();
        assert_eq!(arena.cursor(), 0);
        assert_eq!(arena.generation(), 1);

        // Content is not zeroed.
        let w = arena.request(10).unwrap();
        assert_eq!(w.as_slice(), b"generation");
    }

    #[test]
    fn test_double_release_counts_once() {
        let mut arena = Arena::new(100, 10).unwrap();
        let a = arena.request(10).unwrap();
        let b = arena.request(10).unwrap().to_reader();
        assert_eq!(arena.outstanding(), 2);

        a.release();
        b.release();
        assert_eq!(arena.outstanding(), 0);
        arena.reset().unwrap();
    }

    #[test]
    fn test_drain_waits_for_readers() {
        let mut arena = Arena::new(1000, 100).unwrap();
        let (tx, rx) = mpsc::channel::<ReadHandle>();

        for i in 0..10u8 {
            let mut w = arena.request(100).unwrap();
            let _ = w.write(&[i; 100]);
            tx.send(w.to_reader()).unwrap();
        }
        drop(tx);

        let consumer = thread::spawn(move || {
            let mut seen = 0;
            while let Ok(r) = rx.recv() {
                thread::sleep(Duration::from_millis(1));
                assert!(r.as_slice().iter().all(|b| *b == r.as_slice()[0]));
                seen += 1;
                r.release();
            }
            seen
        });

        arena.drain();
        assert_eq!(arena.outstanding(), 0);
        arena.reset().unwrap();
        assert_eq!(consumer.join().unwrap(), 10);
    }

    proptest! {
        #[test]
        fn requests_are_disjoint(sizes in proptest::collection::vec(1_usize..=100, 1..64)) {
            let mut arena = Arena::new(1000, 100).unwrap();
            let base = arena.request(1).unwrap().as_slice().as_ptr() as usize;

            let mut ranges = Vec::new();
            let mut handles = Vec::new();
            for size in sizes {
                match arena.request(size) {
                    Ok(w) => {
                        let start = w.as_slice().as_ptr() as usize - base;
                        ranges.push((start, start + size));
                        handles.push(w);
                    }
                    Err(err) => prop_assert!(err.is_arena_full()),
                }
            }

            for (i, a) in ranges.iter().enumerate() {
                prop_assert!(a.1 <= 1000);
                for b in &ranges[i + 1..] {
                    prop_assert!(a.1 <= b.0 || b.1 <= a.0);
                }
            }
            prop_assert_eq!(arena.outstanding(), handles.len());
        }
    }
}
