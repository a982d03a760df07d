use core::ptr::NonNull;
use core::slice;

use alloc::boxed::Box;

use crate::block::BlockRef;

/// The right to use one byte range of a block.
///
/// A tracked lease counts towards the completion counter of its arena until it is released.
/// Standalone leases own a private allocation and release as a no-op.
#[derive(Debug)]
pub(crate) struct Lease {
    region: Region,
    released: bool,
}

#[derive(Debug)]
enum Region {
    Arena {
        block: BlockRef,
        ptr: NonNull<u8>,
        len: usize,
    },
    Standalone(Box<[u8]>),
}

impl Lease {
    /// Leases `len` bytes of `block` starting at `offset` and registers the lease with the
    /// block's completion counter.
    ///
    /// # Safety
    ///
    /// `offset + len` must not exceed the length of the block and the range must not overlap with
    /// any other lease of the same arena generation.
    #[inline]
    pub(crate) unsafe fn tracked(block: &BlockRef, offset: usize, len: usize) -> Self {
        debug_assert!(offset + len <= block.len());

        // SAFETY: The caller guarantees that the range stays within the block.
        let ptr = unsafe { block.offset(offset) };
        block.completion().acquire();

        Self {
            region: Region::Arena {
                block: block.clone(),
                ptr,
                len,
            },
            released: false,
        }
    }

    /// Allocates a zeroed block of exactly `len` bytes outside of any arena.
    #[inline]
    pub(crate) fn standalone(len: usize) -> Self {
        Self {
            region: Region::Standalone(vec![0; len].into_boxed_slice()),
            released: false,
        }
    }

    #[inline]
    pub(crate) fn is_tracked(&self) -> bool {
        matches!(self.region, Region::Arena { .. })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        match &self.region {
            Region::Arena { len, .. } => *len,
            Region::Standalone(buf) => buf.len(),
        }
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        match &self.region {
            // SAFETY: The range belongs exclusively to this lease and stays allocated while the
            // `BlockRef` is held.
            Region::Arena { ptr, len, .. } => unsafe { slice::from_raw_parts(ptr.as_ptr(), *len) },
            Region::Standalone(buf) => &buf[..],
        }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.region {
            // SAFETY: See `as_slice`. `&mut self` guarantees unique access.
            Region::Arena { ptr, len, .. } => unsafe {
                slice::from_raw_parts_mut(ptr.as_ptr(), *len)
            },
            Region::Standalone(buf) => &mut buf[..],
        }
    }

    /// Signals the completion of the lease. Only the first call has an effect.
    #[inline]
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Region::Arena { block, .. } = &self.region {
            block.completion().complete();
        }
    }
}

impl Drop for Lease {
    #[inline]
    fn drop(&mut self) {
        self.release();
    }
}

unsafe impl Send for Lease {}
unsafe impl Sync for Lease {}

#[cfg(all(not(loom), test))]
mod tests {
    use super::Lease;
    use crate::block::BlockRef;

    #[test]
    fn test_release_is_idempotent() {
        let block = BlockRef::new(100);

        let mut lease = unsafe { Lease::tracked(&block, 10, 20) };
        assert!(lease.is_tracked());
        assert_eq!(lease.len(), 20);
        assert_eq!(block.completion().outstanding(), 1);

        lease.release();
        assert_eq!(block.completion().outstanding(), 0);

        lease.release();
        lease.release();
        assert_eq!(block.completion().outstanding(), 0);

        drop(lease);
        assert_eq!(block.completion().outstanding(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let block = BlockRef::new(100);

        let a = unsafe { Lease::tracked(&block, 0, 50) };
        let b = unsafe { Lease::tracked(&block, 50, 50) };
        assert_eq!(block.completion().outstanding(), 2);

        drop(a);
        assert_eq!(block.completion().outstanding(), 1);
        drop(b);
        assert_eq!(block.completion().outstanding(), 0);
    }

    #[test]
    fn test_lease_outlives_block_ref() {
        let block = BlockRef::new(16);
        let mut lease = unsafe { Lease::tracked(&block, 8, 8) };
        drop(block);

        lease.as_mut_slice().copy_from_slice(&[7; 8]);
        assert_eq!(lease.as_slice(), &[7; 8]);
    }

    #[test]
    fn test_standalone() {
        let mut lease = Lease::standalone(32);
        assert!(!lease.is_tracked());
        assert_eq!(lease.len(), 32);
        assert_eq!(lease.as_slice(), &[0; 32]);

        lease.release();
        lease.release();
    }
}
