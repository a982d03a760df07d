use core::alloc::Layout;
use core::ops::Deref;
use core::ptr::NonNull;

use alloc::boxed::Box;

use crate::completion::Completion;
use crate::loom::sync::atomic::{AtomicUsize, Ordering};

/// A reference to a [`Block`], similar to an [`Arc`].
///
/// Every handle issued from an arena holds one, so the backing memory outlives
/// the arena and the pool that created it.
///
/// [`Arc`]: alloc::sync::Arc
#[derive(Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct BlockRef {
    inner: NonNull<Block>,
}

impl BlockRef {
    /// Allocates a new, zeroed block of `size` bytes.
    ///
    /// `size` must be non-zero and must not exceed `isize::MAX`; both are checked when the
    /// arena configuration is validated.
    #[inline]
    pub(crate) fn new(size: usize) -> Self {
        let boxed = Box::new(Block::new(size));
        let ptr = NonNull::from(Box::leak(boxed));

        Self { inner: ptr }
    }
}

impl Deref for BlockRef {
    type Target = Block;

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { self.inner.as_ref() }
    }
}

impl Clone for BlockRef {
    #[inline]
    fn clone(&self) -> Self {
        let old_rc = self.ref_count.fetch_add(1, Ordering::Relaxed);

        // Since leaking elements is a safe operation, we must make sure to
        // NEVER overflow the reference count.
        if old_rc > usize::MAX >> 1 {
            crate::abort();
        }

        Self { inner: self.inner }
    }
}

impl Drop for BlockRef {
    #[inline]
    fn drop(&mut self) {
        let old_rc = self.ref_count.fetch_sub(1, Ordering::Release);

        if old_rc != 1 {
            return;
        }

        // Fence to prevent reordering of data access after deletion.
        // Synchronizes with the Release load.
        self.ref_count.load(Ordering::Acquire);

        // SAFETY: We've had the last reference to the underlying value.
        unsafe {
            drop(Box::from_raw(self.inner.as_ptr()));
        }
    }
}

unsafe impl Send for BlockRef {}
unsafe impl Sync for BlockRef {}

/// A fixed-capacity byte region together with the completion counter of the
/// leases issued from it.
#[derive(Debug)]
pub(crate) struct Block {
    layout: Layout,
    ptr: NonNull<u8>,
    ref_count: AtomicUsize,
    completion: Completion,
}

impl Block {
    fn new(size: usize) -> Self {
        debug_assert!(size > 0);
        debug_assert!(size <= isize::MAX as usize);

        // SAFETY: The size is non-zero and never exceeds `isize::MAX`, the alignment of `u8` is
        // 1.
        let layout = unsafe { Layout::from_size_align_unchecked(size, 1) };

        // Zeroed once so every byte is initialized. Later generations keep stale bytes.
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            alloc::alloc::handle_alloc_error(layout);
        };

        Self {
            layout,
            ptr,
            ref_count: AtomicUsize::new(1),
            completion: Completion::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }

    /// Returns a pointer to the byte at `offset`.
    ///
    /// # Safety
    ///
    /// `offset` must not exceed [`len`].
    ///
    /// [`len`]: Self::len
    #[inline]
    pub(crate) unsafe fn offset(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.len());

        // SAFETY: The caller guarantees that `offset` stays within the allocation.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) }
    }

    #[inline]
    pub(crate) fn completion(&self) -> &Completion {
        &self.completion
    }
}

impl Drop for Block {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: The given pointer and layout were previously used to allocate the memory.
        unsafe {
            alloc::alloc::dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    use super::BlockRef;
    use crate::loom::sync::atomic::Ordering;

    #[test]
    fn test_block() {
        let block = BlockRef::new(4000);
        assert_eq!(block.len(), 4000);
        assert_eq!(block.ref_count.load(Ordering::Relaxed), 1);

        let ptr = unsafe { block.offset(1000) };
        assert_eq!(ptr.as_ptr() as usize, block.ptr.as_ptr() as usize + 1000);

        let block2 = block.clone();
        assert_eq!(block, block2);
        assert_eq!(block.ref_count.load(Ordering::Relaxed), 2);

        drop(block2);
        assert_eq!(block.ref_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_block_threads() {
        let block = Arc::new(BlockRef::new(100));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let block = block.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        drop(BlockRef::clone(&block));
                    }
                })
            })
            .collect();

        for th in threads {
            th.join().unwrap();
        }

        assert_eq!(block.ref_count.load(Ordering::Relaxed), 1);
    }
}
