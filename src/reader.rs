use core::cmp;
use core::fmt::{self, Debug, Formatter};

use crate::error::{Error, Result};
use crate::lease::Lease;

/// The result of [`ReadHandle::read`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The contained number of bytes was read and more bytes are left.
    More(usize),
    /// The contained number of bytes was read and the end of the data was reached.
    End(usize),
}

impl ReadOutcome {
    /// Returns the number of bytes read.
    #[inline]
    pub fn read(self) -> usize {
        match self {
            Self::More(n) | Self::End(n) => n,
        }
    }

    #[inline]
    pub fn is_end(self) -> bool {
        matches!(self, Self::End(_))
    }
}

/// A cursor over the bytes committed through a [`WriteHandle`], starting at offset 0.
///
/// Every byte view returned by a `ReadHandle` borrows the handle. Releasing the handle consumes
/// it, so no view can be used once the block may be recycled.
///
/// [`WriteHandle`]: crate::WriteHandle
pub struct ReadHandle {
    lease: Lease,
    len: usize,
    at: usize,
}

impl ReadHandle {
    #[inline]
    pub(crate) fn new(lease: Lease, len: usize) -> Self {
        debug_assert!(len <= lease.len());

        Self { lease, len, at: 0 }
    }

    /// Copies up to `dst.len()` unread bytes into `dst`.
    ///
    /// Returns [`ReadOutcome::End`] from the call that consumes the final bytes and from every
    /// call after that.
    pub fn read(&mut self, dst: &mut [u8]) -> ReadOutcome {
        let src = self.remaining_bytes();
        if src.is_empty() {
            return ReadOutcome::End(0);
        }

        let n = cmp::min(dst.len(), src.len());
        dst[..n].copy_from_slice(&src[..n]);
        self.at += n;

        if self.at == self.len {
            ReadOutcome::End(n)
        } else {
            ReadOutcome::More(n)
        }
    }

    /// Returns the next `n` unread bytes without advancing.
    pub fn peek(&self, n: usize) -> Result<&[u8]> {
        let src = self.remaining_bytes();
        if n > src.len() {
            return Err(Error::InsufficientData {
                requested: n,
                available: src.len(),
            });
        }

        Ok(&src[..n])
    }

    /// Returns the unread bytes. The view is valid until the next read.
    #[inline]
    pub fn remaining_bytes(&self) -> &[u8] {
        &self.as_slice()[self.at..]
    }

    /// Advances the read position by up to `cnt` bytes.
    #[inline]
    pub fn advance(&mut self, cnt: usize) {
        self.at = self.at.saturating_add(cnt).min(self.len);
    }

    /// Returns the number of unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len - self.at
    }

    /// Returns the number of readable bytes, read or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the size of the leased block.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.lease.len()
    }

    /// Returns all readable bytes, regardless of the read position.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.lease.as_slice()[..self.len]
    }

    #[inline]
    pub fn is_arena_backed(&self) -> bool {
        self.lease.is_tracked()
    }

    /// Releases the lease, allowing the arena to be recycled once its other leases complete.
    /// Dropping the handle has the same effect.
    #[inline]
    pub fn release(mut self) {
        self.lease.release();
    }
}

impl AsRef<[u8]> for ReadHandle {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Debug for ReadHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("len", &self.len)
            .field("at", &self.at)
            .field("arena_backed", &self.is_arena_backed())
            .finish()
    }
}

#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
mod io {
    use std::io::{self, BufRead, Read};

    use super::ReadHandle;

    impl Read for ReadHandle {
        #[inline]
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            Ok(ReadHandle::read(self, buf).read())
        }
    }

    impl BufRead for ReadHandle {
        #[inline]
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            Ok(self.remaining_bytes())
        }

        #[inline]
        fn consume(&mut self, amt: usize) {
            self.advance(amt);
        }
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use std::vec::Vec;

    use proptest::prelude::*;

    use super::{ReadHandle, ReadOutcome};
    use crate::block::BlockRef;
    use crate::lease::Lease;
    use crate::writer::WriteHandle;
    use crate::Error;

    fn reader(block: &BlockRef, content: &[u8]) -> ReadHandle {
        let mut w = WriteHandle::new(unsafe { Lease::tracked(block, 0, content.len()) });
        assert!(!w.write(content).is_short());
        w.to_reader()
    }

    #[test]
    fn test_read() {
        let block = BlockRef::new(100);
        let mut r = reader(&block, b"0123456789");
        assert_eq!(r.len(), 10);
        assert_eq!(r.capacity(), 10);

        let mut buf = [0; 4];
        assert_eq!(r.read(&mut buf), ReadOutcome::More(4));
        assert_eq!(&buf, b"0123");
        assert_eq!(r.read(&mut buf), ReadOutcome::More(4));
        assert_eq!(&buf, b"4567");

        let outcome = r.read(&mut buf);
        assert_eq!(outcome, ReadOutcome::End(2));
        assert!(outcome.is_end());
        assert_eq!(&buf[..2], b"89");

        assert_eq!(r.read(&mut buf), ReadOutcome::End(0));
    }

    #[test]
    fn test_read_exact_end() {
        let block = BlockRef::new(100);
        let mut r = reader(&block, b"abcd");

        let mut buf = [0; 4];
        assert_eq!(r.read(&mut buf), ReadOutcome::End(4));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_peek() {
        let block = BlockRef::new(100);
        let mut r = reader(&block, b"abcdef");

        assert_eq!(r.peek(3).unwrap(), b"abc");
        assert_eq!(r.peek(3).unwrap(), b"abc");
        assert_eq!(r.peek(6).unwrap(), b"abcdef");
        assert_eq!(
            r.peek(7),
            Err(Error::InsufficientData {
                requested: 7,
                available: 6,
            })
        );

        let mut buf = [0; 4];
        let _ = r.read(&mut buf);
        assert_eq!(r.peek(2).unwrap(), b"ef");
        assert!(r.peek(3).is_err());
        assert_eq!(r.remaining_bytes(), b"ef");
        assert_eq!(r.as_slice(), b"abcdef");
    }

    #[test]
    fn test_release() {
        let block = BlockRef::new(100);
        let r = reader(&block, b"abc");
        assert_eq!(block.completion().outstanding(), 1);

        r.release();
        assert_eq!(block.completion().outstanding(), 0);
    }

    #[test]
    fn test_standalone_release() {
        let mut w = WriteHandle::new(Lease::standalone(3));
        let _ = w.write(b"xyz");

        let r = w.to_reader();
        assert!(!r.is_arena_backed());
        assert_eq!(r.as_slice(), b"xyz");
        r.release();
    }

    #[test]
    fn test_advance() {
        let block = BlockRef::new(100);
        let mut r = reader(&block, b"abcdef");

        r.advance(2);
        assert_eq!(r.remaining_bytes(), b"cdef");
        r.advance(0);
        assert_eq!(r.remaining(), 4);

        r.advance(usize::MAX);
        assert_eq!(r.remaining(), 0);
        assert!(r.remaining_bytes().is_empty());

        let mut buf = [0; 4];
        assert_eq!(r.read(&mut buf), ReadOutcome::End(0));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_io_read() {
        use std::io::{BufRead, Read};

        let block = BlockRef::new(100);
        let mut r = reader(&block, b"line one\nline two\n");

        let mut line = String::new();
        r.read_line(&mut line).unwrap();
        assert_eq!(line, "line one\n");

        let mut rest = Vec::new();
        r.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"line two\n");
    }

    proptest! {
        #[test]
        fn round_trip(
            content in proptest::collection::vec(any::<u8>(), 0..512),
            extra in 0_usize..64,
            chunk in 1_usize..64,
        ) {
            let block = BlockRef::new(1024);
            let capacity = content.len() + extra;
            prop_assume!(capacity > 0);

            let mut w = WriteHandle::new(unsafe { Lease::tracked(&block, 0, capacity) });
            prop_assert!(!w.write(&content).is_short());
            let mut r = w.to_reader();

            let mut out = Vec::new();
            let mut buf = vec![0; chunk];
            loop {
                let outcome = r.read(&mut buf);
                out.extend_from_slice(&buf[..outcome.read()]);
                if outcome.is_end() {
                    break;
                }
            }

            prop_assert_eq!(out, content);
        }
    }
}
