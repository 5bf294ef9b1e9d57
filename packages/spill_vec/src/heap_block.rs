use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

use crate::heap_buf::HeapBuf;

/// Exclusive ownership of a heap allocation holding a sequence of elements,
/// detached from any container.
///
/// A block is the currency of the zero-copy hand-off protocol: detaching one
/// from a [`SpillVec`](crate::SpillVec) via
/// [`detach_memory()`](crate::SpillVec::detach_memory) moves responsibility
/// for the allocation to the block, and attaching it to another container via
/// [`attach_memory()`](crate::SpillVec::attach_memory) moves it onward, all
/// without copying a single element. Dropping a block drops its elements and
/// releases the allocation.
///
/// Every block is tight: it holds exactly as many element slots as it holds
/// elements, and it is never empty. Its byte length is therefore always
/// `len() * size_of::<T>()`.
///
/// For hand-off across boundaries that cannot carry a Rust value, a block
/// can be dismantled into raw parts and later rebuilt:
///
/// ```
/// use spill_vec::{HeapBlock, SpillVec};
///
/// let mut numbers: SpillVec<u64, 2> = SpillVec::new();
/// for value in 0..32 {
///     numbers.push(value)?;
/// }
///
/// let block = numbers.detach_memory()?.expect("container had spilled to the heap");
/// let (ptr, len) = block.into_raw_parts();
///
/// // ... the pointer crosses some subsystem boundary ...
///
/// // SAFETY: the parts came straight out of into_raw_parts.
/// let block = unsafe { HeapBlock::from_raw_parts(ptr, len) };
/// assert_eq!(block.len(), 32);
/// # Ok::<(), spill_vec::Error>(())
/// ```
pub struct HeapBlock<T> {
    /// The owned allocation. Its capacity always equals `len`.
    buf: HeapBuf<T>,

    /// Number of initialized elements in the allocation. Always non-zero.
    len: usize,
}

impl<T> HeapBlock<T> {
    /// Wraps an allocation that holds `len` initialized elements.
    ///
    /// The buffer capacity must equal `len`; containers shrink to fit before
    /// detaching to guarantee this.
    pub(crate) fn from_buf(buf: HeapBuf<T>, len: usize) -> Self {
        debug_assert!(len > 0, "blocks are never empty");
        debug_assert_eq!(
            buf.capacity(),
            len,
            "blocks hold exactly as many slots as elements"
        );

        Self { buf, len }
    }

    /// Dismantles the block into its buffer and element count, without
    /// dropping elements or releasing memory.
    pub(crate) fn into_buf(self) -> (HeapBuf<T>, usize) {
        let len = self.len;

        // Prevent our Drop from running; ownership moves to the caller.
        let this = mem::ManuallyDrop::new(self);

        // SAFETY: `this` is never used again and its Drop is suppressed, so
        // the buffer is read out exactly once.
        let buf = unsafe { ptr::read(&raw const this.buf) };

        (buf, len)
    }

    /// Number of elements in the block. Never zero.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial accessor, mutation only obscures failures elsewhere.
    #[expect(
        clippy::len_without_is_empty,
        reason = "blocks are never empty, so an is_empty() would be a constant"
    )]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Length of the block in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        // Cannot overflow because the allocation layout was validated to fit
        // in isize::MAX bytes when it was created.
        self.len.wrapping_mul(size_of::<T>())
    }

    /// Pointer to the first element.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.buf.ptr().as_ptr().cast_const()
    }

    /// The elements as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: all `len` slots hold initialized elements for the lifetime
        // of the block, and the block owns the allocation exclusively.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// Dismantles the block into a raw pointer and element count, without
    /// dropping elements or releasing memory.
    ///
    /// The caller becomes responsible for the allocation and the elements in
    /// it. The usual way to discharge that responsibility is to rebuild the
    /// block with [`HeapBlock::from_raw_parts`] and drop it or attach it to
    /// a container.
    #[must_use]
    pub fn into_raw_parts(self) -> (NonNull<T>, usize) {
        let (buf, len) = self.into_buf();
        let (ptr, _capacity) = buf.into_raw_parts();
        (ptr, len)
    }

    /// Rebuilds a block from raw parts.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was obtained from the global allocator with the layout of
    ///   `[T; len]`, as produced by [`HeapBlock::into_raw_parts`] or an
    ///   equivalent allocation.
    /// - `len` is non-zero and the first `len` slots hold initialized
    ///   elements.
    /// - Ownership of the allocation is not held anywhere else.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: NonNull<T>, len: usize) -> Self {
        // SAFETY: Forwarding the allocation provenance requirements to the
        // caller.
        let buf = unsafe { HeapBuf::from_raw_parts(ptr, len) };

        Self::from_buf(buf, len)
    }
}

impl<T> Drop for HeapBlock<T> {
    fn drop(&mut self) {
        // SAFETY: all `len` slots hold initialized elements that nothing
        // else will drop; the allocation itself is released by the buffer's
        // own Drop afterwards.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.buf.ptr().as_ptr(),
                self.len,
            ));
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for HeapBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapBlock")
            .field("len", &self.len)
            .field("elements", &self.as_slice())
            .finish()
    }
}

// SAFETY: The block exclusively owns its allocation and the elements in it;
// sending it to another thread moves unique ownership of the T values, which
// is sound exactly when T itself may be sent.
unsafe impl<T: Send> Send for HeapBlock<T> {}

// SAFETY: Shared access to the block only permits shared access to its
// elements, which is sound exactly when T permits shared access across
// threads.
unsafe impl<T: Sync> Sync for HeapBlock<T> {}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::SpillVec;

    /// Increments a shared counter when dropped.
    struct DropTally {
        tally: Rc<Cell<usize>>,
    }

    impl Drop for DropTally {
        fn drop(&mut self) {
            self.tally.set(self.tally.get().wrapping_add(1));
        }
    }

    fn spilled_block<const COUNT: usize>() -> HeapBlock<u32> {
        let mut vec: SpillVec<u32, 1> = SpillVec::new();
        for value in 0..COUNT {
            vec.push(value as u32).unwrap();
        }
        vec.detach_memory()
            .unwrap()
            .expect("pushing past the inline capacity must have spilled")
    }

    #[test]
    fn reports_lengths_and_contents() {
        let block = spilled_block::<5>();

        assert_eq!(block.len(), 5);
        assert_eq!(block.byte_len(), 5 * size_of::<u32>());
        assert_eq!(block.as_slice(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn raw_parts_round_trip() {
        let block = spilled_block::<3>();
        let original = block.as_ptr();

        let (ptr, len) = block.into_raw_parts();
        assert_eq!(len, 3);

        // SAFETY: the parts came straight out of into_raw_parts.
        let block = unsafe { HeapBlock::from_raw_parts(ptr, len) };
        assert_eq!(block.as_ptr(), original);
        assert_eq!(block.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn drop_releases_every_element() {
        let tally = Rc::new(Cell::new(0));

        let mut vec: SpillVec<DropTally, 1> = SpillVec::new();
        for _ in 0..4 {
            vec.push(DropTally {
                tally: Rc::clone(&tally),
            })
            .unwrap();
        }

        let block = vec
            .detach_memory()
            .unwrap()
            .expect("pushing past the inline capacity must have spilled");
        assert_eq!(tally.get(), 0);

        drop(block);
        assert_eq!(tally.get(), 4);
    }
}
