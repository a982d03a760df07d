use core::cmp;
use core::fmt::{self, Debug, Formatter};

use crate::lease::Lease;
use crate::reader::ReadHandle;

/// The result of [`WriteHandle::write`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All bytes were written.
    Complete(usize),
    /// Only the contained number of bytes fit. The handle is now full and the written prefix
    /// stays committed.
    Short(usize),
}

impl WriteOutcome {
    /// Returns the number of bytes written.
    #[inline]
    pub fn written(self) -> usize {
        match self {
            Self::Complete(n) | Self::Short(n) => n,
        }
    }

    #[inline]
    pub fn is_short(self) -> bool {
        matches!(self, Self::Short(_))
    }
}

/// A unique, write-once view into a fixed size block leased from an [`Arena`].
///
/// Unlike other buffers, `WriteHandle` cannot grow. The exact wanted size must be known at time
/// of request. Writes past the capacity are truncated, see [`write`].
///
/// The lease ends when the handle is released, dropped or converted with [`to_reader`].
///
/// [`Arena`]: crate::Arena
/// [`write`]: Self::write
/// [`to_reader`]: Self::to_reader
pub struct WriteHandle {
    lease: Lease,
    at: usize,
    /// High-water mark of committed bytes. The reader covers `[0, filled)`.
    filled: usize,
}

impl WriteHandle {
    #[inline]
    pub(crate) fn new(lease: Lease) -> Self {
        Self {
            lease,
            at: 0,
            filled: 0,
        }
    }

    /// Copies as much of `src` as fits into the handle.
    ///
    /// If `src` is longer than [`remaining`], the prefix that fits is written and
    /// [`WriteOutcome::Short`] is returned. **The prefix is not rolled back**: it stays in the
    /// block and is visible to the reader. No further writes are possible after a short write.
    ///
    /// Writing to a full handle returns `Short(0)`.
    ///
    /// [`remaining`]: Self::remaining
    pub fn write(&mut self, src: &[u8]) -> WriteOutcome {
        let remaining = self.remaining();
        if remaining == 0 {
            return WriteOutcome::Short(0);
        }

        let n = cmp::min(src.len(), remaining);
        let at = self.at;
        self.lease.as_mut_slice()[at..at + n].copy_from_slice(&src[..n]);
        self.at += n;
        self.filled = cmp::max(self.filled, self.at);

        if src.len() > remaining {
            WriteOutcome::Short(n)
        } else {
            WriteOutcome::Complete(n)
        }
    }

    /// Returns the number of bytes that can still be written.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.at
    }

    /// Returns the size of the leased block.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.lease.len()
    }

    /// Returns the number of bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.at
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.at == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns `true` if the block lives in an arena, `false` for oversized requests.
    #[inline]
    pub fn is_arena_backed(&self) -> bool {
        self.lease.is_tracked()
    }

    /// Moves the write position back to the start of the block.
    ///
    /// Bytes already written stay in place and stay readable until they are overwritten.
    #[inline]
    pub fn rewind(&mut self) {
        self.at = 0;
    }

    /// Returns the whole block, including bytes that were not written through this handle.
    ///
    /// A recycled arena is not zeroed, so unwritten bytes may hold data of a previous lease.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.lease.as_slice()
    }

    /// Returns the whole block mutably.
    ///
    /// Writing through the slice does not move the write position, but the whole block counts
    /// as committed: the reader will cover all of it.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.filled = self.capacity();
        self.lease.as_mut_slice()
    }

    /// Converts the handle into a [`ReadHandle`], transferring the lease to the reader.
    ///
    /// The reader starts at offset 0 and ends at the furthest byte ever committed, through
    /// [`write`] or [`as_mut_slice`]. A [`rewind`] does not shorten it.
    ///
    /// [`write`]: Self::write
    /// [`as_mut_slice`]: Self::as_mut_slice
    /// [`rewind`]: Self::rewind
    #[inline]
    pub fn to_reader(self) -> ReadHandle {
        ReadHandle::new(self.lease, self.filled)
    }

    /// Releases the lease. The block must not be used afterwards, which the handle enforces by
    /// being consumed. Dropping the handle has the same effect.
    #[inline]
    pub fn release(mut self) {
        self.lease.release();
    }
}

impl Debug for WriteHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("capacity", &self.capacity())
            .field("written", &self.at)
            .field("filled", &self.filled)
            .field("arena_backed", &self.is_arena_backed())
            .finish()
    }
}

#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
impl std::io::Write for WriteHandle {
    /// Returns `Ok(0)` once the handle is full, which makes `write_all` fail with
    /// [`WriteZero`](std::io::ErrorKind::WriteZero).
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(WriteHandle::write(self, buf).written())
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use std::vec::Vec;

    use proptest::prelude::*;

    use super::{WriteHandle, WriteOutcome};
    use crate::reader::ReadOutcome;
    use crate::block::BlockRef;
    use crate::lease::Lease;

    fn handle(block: &BlockRef, offset: usize, len: usize) -> WriteHandle {
        WriteHandle::new(unsafe { Lease::tracked(block, offset, len) })
    }

    #[test]
    fn test_write() {
        let block = BlockRef::new(100);
        let mut w = handle(&block, 0, 10);
        assert_eq!(w.capacity(), 10);
        assert_eq!(w.remaining(), 10);
        assert!(w.is_empty());

        assert_eq!(w.write(b"hello"), WriteOutcome::Complete(5));
        assert_eq!(w.len(), 5);
        assert_eq!(w.remaining(), 5);
        assert_eq!(&w.as_slice()[..5], b"hello");

        assert_eq!(w.write(b"world"), WriteOutcome::Complete(5));
        assert!(w.is_full());
        assert_eq!(w.as_slice(), b"helloworld");
    }

    #[test]
    fn test_short_write_commits_prefix() {
        let block = BlockRef::new(100);
        let mut w = handle(&block, 0, 8);

        assert_eq!(w.write(b"abc"), WriteOutcome::Complete(3));

        let outcome = w.write(b"0123456789");
        assert!(outcome.is_short());
        assert_eq!(outcome.written(), 5);
        assert!(w.is_full());
        assert_eq!(w.as_slice(), b"abc01234");

        assert_eq!(w.write(b"x"), WriteOutcome::Short(0));
        assert_eq!(w.write(b""), WriteOutcome::Short(0));
        assert_eq!(w.as_slice(), b"abc01234");

        let r = w.to_reader();
        assert_eq!(r.remaining_bytes(), b"abc01234");
    }

    #[test]
    fn test_rewind() {
        let block = BlockRef::new(100);
        let mut w = handle(&block, 0, 4);
        assert_eq!(w.write(b"abcd"), WriteOutcome::Complete(4));

        w.rewind();
        assert_eq!(w.remaining(), 4);
        assert_eq!(w.write(b"xy"), WriteOutcome::Complete(2));
        assert_eq!(w.len(), 2);
        assert_eq!(w.as_slice(), b"xycd");

        // Bytes committed before the rewind stay readable.
        assert_eq!(w.to_reader().remaining_bytes(), b"xycd");
    }

    #[test]
    fn test_mut_slice_to_reader() {
        let block = BlockRef::new(100);
        let mut w = handle(&block, 0, 5);
        w.as_mut_slice().copy_from_slice(b"hello");
        assert_eq!(w.len(), 0);

        let mut r = w.to_reader();
        assert_eq!(r.len(), 5);
        assert_eq!(r.as_slice(), b"hello");

        let mut buf = [0; 5];
        assert_eq!(r.read(&mut buf), ReadOutcome::End(5));
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_partial_write_then_mut_slice() {
        let block = BlockRef::new(100);
        let mut w = handle(&block, 0, 6);
        assert_eq!(w.write(b"ab"), WriteOutcome::Complete(2));
        w.as_mut_slice()[2..].copy_from_slice(b"cdef");

        assert_eq!(w.to_reader().as_slice(), b"abcdef");
    }

    #[test]
    fn test_to_reader_transfers_lease() {
        let block = BlockRef::new(100);
        let mut w = handle(&block, 10, 10);
        let _ = w.write(b"0123456789");
        assert_eq!(block.completion().outstanding(), 1);

        let r = w.to_reader();
        assert_eq!(block.completion().outstanding(), 1);

        r.release();
        assert_eq!(block.completion().outstanding(), 0);
    }

    #[test]
    fn test_release() {
        let block = BlockRef::new(100);
        let w = handle(&block, 0, 10);
        let w2 = handle(&block, 10, 10);
        assert_eq!(block.completion().outstanding(), 2);

        w.release();
        assert_eq!(block.completion().outstanding(), 1);

        drop(w2);
        assert_eq!(block.completion().outstanding(), 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_io_write() {
        use std::io::{ErrorKind, Write};

        let block = BlockRef::new(100);
        let mut w = handle(&block, 0, 6);

        w.write_all(b"abc").unwrap();
        let err = w.write_all(b"defgh").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteZero);
        assert_eq!(w.as_slice(), b"abcdef");
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(
            capacity in 1_usize..256,
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..16),
        ) {
            let block = BlockRef::new(256);
            let mut w = handle(&block, 0, capacity);

            let mut expected = Vec::new();
            for chunk in &chunks {
                let remaining = w.remaining();
                let outcome = w.write(chunk);

                prop_assert_eq!(outcome.written(), chunk.len().min(remaining));
                prop_assert_eq!(
                    outcome.is_short(),
                    remaining == 0 || chunk.len() > remaining
                );
                expected.extend_from_slice(&chunk[..outcome.written()]);
            }

            prop_assert!(w.len() <= capacity);
            prop_assert_eq!(w.len(), expected.len());
            prop_assert_eq!(&w.as_slice()[..expected.len()], &expected[..]);
        }
    }
}
