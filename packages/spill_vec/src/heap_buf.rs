use std::alloc::{self, Layout};
use std::fmt;
use std::mem;
use std::ptr::NonNull;

use crate::{Error, Result};

/// The largest element count a heap allocation can ever hold for element type
/// `T`, as imposed by the Rust allocator APIs (no allocation may exceed
/// `isize::MAX` bytes). Zero-sized types are unbounded.
#[expect(
    clippy::integer_division,
    reason = "truncating division is exactly the element count that fits"
)]
pub(crate) const fn max_elements<T>() -> usize {
    if size_of::<T>() == 0 {
        usize::MAX
    } else {
        // usize::MAX >> 1 is the isize::MAX byte ceiling.
        (usize::MAX >> 1) / size_of::<T>()
    }
}

/// Exclusive owner of one heap allocation holding uninitialized slots for
/// `capacity` elements of type `T`.
///
/// This type only manages the allocation itself. It never reads, writes,
/// drops or otherwise interprets element slots; tracking which slots hold
/// live elements is entirely the caller's concern. The allocation is released
/// when the buffer is dropped.
///
/// Never constructed for zero-sized element types; containers of those never
/// allocate at all.
pub(crate) struct HeapBuf<T> {
    /// Start of the allocation. Points to memory obtained from the global
    /// allocator with the layout of `[T; capacity]`.
    ptr: NonNull<T>,

    /// Number of element slots in the allocation. Always non-zero.
    capacity: usize,
}

impl<T> HeapBuf<T> {
    /// Computes the allocation layout for `capacity` element slots.
    fn layout(capacity: usize) -> Result<Layout> {
        Layout::array::<T>(capacity).map_err(|_| Error::CapacityOverflow {
            requested: capacity,
            max: max_elements::<T>(),
        })
    }

    /// Allocates a fresh buffer with slots for exactly `capacity` elements.
    ///
    /// The slots are uninitialized. Fails without side effects if the
    /// capacity is not representable or the allocator declines.
    pub(crate) fn allocate(capacity: usize) -> Result<Self> {
        debug_assert!(capacity > 0, "heap buffers are never zero-capacity");
        debug_assert!(
            size_of::<T>() > 0,
            "heap buffers are never created for zero-sized element types"
        );

        let layout = Self::layout(capacity)?;

        // SAFETY: The layout has non-zero size because both the capacity and
        // the element size are non-zero, as asserted above.
        let ptr = unsafe { alloc::alloc(layout) };

        let ptr = NonNull::new(ptr.cast::<T>()).ok_or(Error::AllocationFailed {
            bytes: layout.size(),
        })?;

        Ok(Self { ptr, capacity })
    }

    /// Resizes the allocation in place to `new_capacity` element slots,
    /// letting the allocator move the bytes if it cannot extend the block
    /// where it sits.
    ///
    /// On failure the existing allocation is untouched and remains valid;
    /// this is what makes failed growth atomic for the containers built on
    /// top.
    pub(crate) fn resize(&mut self, new_capacity: usize) -> Result<()> {
        debug_assert!(new_capacity > 0, "heap buffers are never zero-capacity");

        if new_capacity == self.capacity {
            return Ok(());
        }

        let old_layout = Self::layout(self.capacity)
            .expect("layout was already validated when the buffer was allocated");
        let new_layout = Self::layout(new_capacity)?;

        // SAFETY: `ptr` was allocated by the global allocator with
        // `old_layout`, and the new size is non-zero and was validated by
        // `layout()` to not overflow `isize::MAX`.
        let new_ptr = unsafe { alloc::realloc(self.ptr.as_ptr().cast::<u8>(), old_layout, new_layout.size()) };

        let new_ptr = NonNull::new(new_ptr.cast::<T>()).ok_or(Error::AllocationFailed {
            bytes: new_layout.size(),
        })?;

        self.ptr = new_ptr;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Start of the allocation.
    #[must_use]
    pub(crate) fn ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// Number of element slots in the allocation.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Dismantles the buffer into its allocation without releasing it.
    ///
    /// The caller becomes responsible for the allocation, typically by
    /// rebuilding a buffer around it later via [`HeapBuf::from_raw_parts`].
    #[must_use]
    pub(crate) fn into_raw_parts(self) -> (NonNull<T>, usize) {
        let parts = (self.ptr, self.capacity);
        mem::forget(self);
        parts
    }

    /// Reassembles a buffer from a previously dismantled allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must have been obtained from the global allocator with the
    /// layout of `[T; capacity]` (as produced by [`HeapBuf::into_raw_parts`]
    /// or an equivalent allocation), `capacity` must be that allocation's
    /// slot count and must be non-zero, and ownership of the allocation must
    /// not be held anywhere else.
    pub(crate) unsafe fn from_raw_parts(ptr: NonNull<T>, capacity: usize) -> Self {
        debug_assert!(capacity > 0, "heap buffers are never zero-capacity");

        Self { ptr, capacity }
    }
}

impl<T> Drop for HeapBuf<T> {
    fn drop(&mut self) {
        let layout = Self::layout(self.capacity)
            .expect("layout was already validated when the buffer was allocated");

        // SAFETY: `ptr` was allocated by the global allocator with exactly
        // this layout and has not been released yet; we own it exclusively.
        unsafe {
            alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), layout);
        }
    }
}

impl<T> fmt::Debug for HeapBuf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapBuf")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use super::*;

    #[test]
    fn allocate_resize_release() {
        let mut buf = HeapBuf::<u64>::allocate(4).unwrap();
        assert_eq!(buf.capacity(), 4);

        // Write and read back through the raw slots to prove the allocation
        // is usable for its stated capacity.
        for index in 0..4 {
            // SAFETY: index is within the allocated capacity.
            unsafe {
                buf.ptr().as_ptr().add(index).write(index as u64);
            }
        }

        buf.resize(64).unwrap();
        assert_eq!(buf.capacity(), 64);

        for index in 0..4 {
            // SAFETY: the first four slots were written above and resize
            // preserves existing bytes.
            let value = unsafe { buf.ptr().as_ptr().add(index).read() };
            assert_eq!(value, index as u64);
        }

        buf.resize(2).unwrap();
        assert_eq!(buf.capacity(), 2);
    }

    #[test]
    fn raw_parts_round_trip() {
        let buf = HeapBuf::<u32>::allocate(8).unwrap();
        let original = buf.ptr();

        let (ptr, capacity) = buf.into_raw_parts();
        assert_eq!(ptr, original);
        assert_eq!(capacity, 8);

        // SAFETY: the parts came straight out of into_raw_parts.
        let rebuilt = unsafe { HeapBuf::from_raw_parts(ptr, capacity) };
        assert_eq!(rebuilt.capacity(), 8);
    }

    #[test]
    fn rejects_unrepresentable_capacity() {
        let result = HeapBuf::<u64>::allocate(max_elements::<u64>().wrapping_add(1));
        assert!(matches!(result, Err(Error::CapacityOverflow { .. })));
    }

    #[test]
    fn max_elements_scales_with_element_size() {
        assert!(max_elements::<u8>() > max_elements::<u64>());
        assert_eq!(max_elements::<()>(), usize::MAX);
    }
}
