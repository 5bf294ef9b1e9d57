use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop, MaybeUninit};
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::ptr;
use std::slice::{self, SliceIndex};

use bytemuck::AnyBitPattern;

use crate::heap_buf::{HeapBuf, max_elements};
use crate::iter::IntoIter;
use crate::{Error, FillMode, Filled, HeapBlock, Result, Uninit};

/// The provenance-tagged backing store of a container.
///
/// The variant records who owns the memory the elements live in: the inline
/// variant is part of the container value itself and is never separately
/// released, while the spilled variant owns a heap allocation that is
/// released when the variant is dropped or its ownership is transferred away.
pub(crate) enum Storage<T, const N: usize> {
    /// Elements live in this embedded buffer. The buffer incurs no
    /// initialization cost; slots come to life only when elements are
    /// written into them.
    Inline([MaybeUninit<T>; N]),

    /// Elements live in a heap allocation owned by this container.
    Spilled(HeapBuf<T>),
}

impl<T, const N: usize> Storage<T, N> {
    /// A fresh inline store with every slot uninitialized.
    pub(crate) const fn new_inline() -> Self {
        Self::Inline([const { MaybeUninit::uninit() }; N])
    }

    /// Pointer to the first element slot of whichever store is active.
    pub(crate) fn base_ptr(&self) -> *const T {
        match self {
            Self::Inline(buf) => buf.as_ptr().cast::<T>(),
            Self::Spilled(buf) => buf.ptr().as_ptr().cast_const(),
        }
    }

    /// Mutable pointer to the first element slot of whichever store is
    /// active.
    pub(crate) fn base_ptr_mut(&mut self) -> *mut T {
        match self {
            Self::Inline(buf) => buf.as_mut_ptr().cast::<T>(),
            Self::Spilled(buf) => buf.ptr().as_ptr(),
        }
    }
}

/// A dynamic array that stores up to `N` elements inline, inside its own
/// value, and transparently spills to the heap when that capacity is
/// exceeded.
///
/// Small, short-lived sequences (geometry coordinates, small argument lists,
/// shape axes) overwhelmingly fit in a modest fixed capacity. `SpillVec`
/// makes that common case free of heap traffic while still supporting
/// unbounded growth: the first growth beyond `N` elements moves the contents
/// into a heap allocation and the container carries on as a plain dynamic
/// array from there.
///
/// # Key properties
///
/// - **Inline first**: creation is a `const fn` and costs nothing; no element
///   slot is initialized until an element is written into it.
/// - **Fallible growth**: every operation that may allocate returns a
///   [`Result`](std::result::Result) and leaves the container untouched when
///   the allocator declines, so callers decide what allocation failure means
///   for them.
/// - **Amortized spilling**: growth beyond the current capacity reserves
///   1.5x the capacity (or the exact requested amount, whichever is larger),
///   bounding the cost of repeated appends.
/// - **Explicit ownership transfer**: a spilled container can hand its heap
///   allocation to another container or out to raw-pointer custody without
///   copying elements; see [`detach_memory()`](Self::detach_memory),
///   [`attach_memory()`](Self::attach_memory) and
///   [`transfer_from()`](Self::transfer_from).
/// - **Optional initialization**: the [`FillMode`] parameter selects, at
///   compile time, whether `resize` value-initializes new slots ([`Filled`],
///   the default) or exposes them untouched for trivial element types
///   ([`Uninit`]).
///
/// # Example
///
/// ```
/// use spill_vec::SpillVec;
///
/// let mut axes: SpillVec<u32, 4> = SpillVec::new();
///
/// for value in [1, 2, 3, 4] {
///     axes.push(value)?;
/// }
///
/// // Four elements fit in the inline buffer; no allocation has happened.
/// assert!(axes.is_inline());
///
/// // The fifth element spills the contents to the heap.
/// axes.push(5)?;
/// assert!(!axes.is_inline());
/// assert_eq!(axes.as_slice(), &[1, 2, 3, 4, 5]);
/// # Ok::<(), spill_vec::Error>(())
/// ```
///
/// # What this container does not do
///
/// There is no mid-sequence insertion or removal, and any mutating operation
/// may invalidate all outstanding references into the container. The
/// container is thread-mobile (`Send` when `T: Send`) but offers no internal
/// synchronization; sharing one across threads is the caller's concern.
pub struct SpillVec<T, const N: usize, M: FillMode = Filled> {
    /// Where the elements currently live. Inline until a growth operation
    /// spills; spilled forever after, short of an explicit shrink or
    /// ownership transfer.
    storage: Storage<T, N>,

    /// Number of live elements. Slots at `[len, capacity)` are never assumed
    /// initialized.
    len: usize,

    /// The compile-time fill mode; see [`FillMode`].
    _mode: PhantomData<M>,
}

impl<T, const N: usize, M: FillMode> SpillVec<T, N, M> {
    /// Creates an empty container backed by its inline buffer.
    ///
    /// Never allocates and initializes no element slots.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: Storage::new_inline(),
            len: 0,
            _mode: PhantomData,
        }
    }

    /// Creates an empty container with room for at least `capacity` elements.
    ///
    /// Stays inline when the inline buffer already suffices; otherwise
    /// spills immediately. Fails if the capacity is not representable or the
    /// allocator declines.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut vec = Self::new();
        vec.reserve(capacity)?;
        Ok(vec)
    }

    /// Creates a container holding clones of the given elements.
    pub fn from_slice(values: &[T]) -> Result<Self>
    where
        T: Clone,
    {
        let mut vec = Self::new();
        vec.assign(values)?;
        Ok(vec)
    }

    /// Number of live elements.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial accessor, mutation only obscures failures elsewhere.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Number of bytes occupied by the live elements.
    #[must_use]
    pub const fn len_bytes(&self) -> usize {
        // Cannot overflow because len is bounded by max_len(), which is
        // itself derived from the byte-size limit.
        self.len.wrapping_mul(size_of::<T>())
    }

    /// `true` if the container holds no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the container can hold before the next growth.
    ///
    /// Zero-sized element types never occupy memory, so their capacity is
    /// unbounded.
    #[must_use]
    pub fn capacity(&self) -> usize {
        if size_of::<T>() == 0 {
            return usize::MAX;
        }

        match &self.storage {
            Storage::Inline(_) => N,
            Storage::Spilled(buf) => buf.capacity(),
        }
    }

    /// The largest element count this container type can ever hold, as
    /// imposed by the allocator APIs.
    #[must_use]
    pub const fn max_len() -> usize {
        max_elements::<T>()
    }

    /// `true` while the elements live in the inline buffer.
    ///
    /// Inline storage is part of the container value itself; it was never
    /// allocated and is never freed. Once a growth operation spills to the
    /// heap this returns `false` until an explicit
    /// [`shrink_to_fit()`](Self::shrink_to_fit) of an emptied container or
    /// an ownership transfer restores the inline state.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }

    /// Pointer to the first element.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.storage.base_ptr()
    }

    /// Mutable pointer to the first element.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.storage.base_ptr_mut()
    }

    /// The live elements as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: Slots in [0, len) were either written by a mutating
        // operation or exposed by Uninit-mode resize, which bounds the
        // element type so that any memory content is a valid value. The
        // container owns the backing store for the lifetime of the borrow.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// The live elements as a mutable slice.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len;

        // SAFETY: As in as_slice(), plus exclusive access via &mut self.
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }

    /// Checked element access.
    ///
    /// Returns [`Error::IndexOutOfBounds`] when `index` is at or beyond the
    /// number of live elements. The indexing operator is the unchecked
    /// flavor (it panics on misuse rather than reporting).
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.len;
        self.as_slice()
            .get(index)
            .ok_or(Error::IndexOutOfBounds { index, len })
    }

    /// Checked mutable element access.
    ///
    /// Returns [`Error::IndexOutOfBounds`] when `index` is at or beyond the
    /// number of live elements.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(Error::IndexOutOfBounds { index, len })
    }

    /// Appends an element, growing the capacity with the amortized strategy
    /// when the current store is full.
    ///
    /// On failure the container and the rejected value's ownership semantics
    /// are unaffected in the sense that no element was added; the value
    /// itself is dropped with the error because it could not be placed.
    pub fn push(&mut self, value: T) -> Result<()> {
        let needed = self.len.checked_add(1).ok_or(Error::CapacityOverflow {
            requested: usize::MAX,
            max: Self::max_len(),
        })?;

        if needed > self.capacity() {
            self.grow_amortized(needed)?;
        }

        // SAFETY: Index len is within the capacity ensured above.
        let slot = unsafe { self.as_mut_ptr().add(self.len) };

        // SAFETY: The slot is unoccupied, properly aligned and exclusively
        // ours to write.
        unsafe {
            ptr::write(slot, value);
        }

        self.len = needed;
        Ok(())
    }

    /// Removes and returns the last element, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        // Cannot underflow; checked non-zero above.
        self.len = self.len.wrapping_sub(1);

        // SAFETY: The new len is within the original live range.
        let slot = unsafe { self.as_ptr().add(self.len) };

        // SAFETY: The slot held a live element and is now outside the live
        // range, so nothing else will touch or drop it.
        Some(unsafe { ptr::read(slot) })
    }

    /// Replaces the contents with clones of the given elements.
    ///
    /// Capacity is reserved up front, so on failure the previous contents
    /// are still intact.
    pub fn assign(&mut self, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        self.reserve(values.len())?;
        self.clear();

        for value in values {
            // SAFETY: Capacity for the whole source was reserved above and
            // len counts the slots already filled by this loop.
            let slot = unsafe { self.as_mut_ptr().add(self.len) };

            // SAFETY: The slot is unoccupied and exclusively ours to write.
            unsafe {
                ptr::write(slot, value.clone());
            }

            // Incrementing per element keeps the container consistent if a
            // clone panics partway. Cannot overflow; bounded by values.len().
            self.len = self.len.wrapping_add(1);
        }

        Ok(())
    }

    /// Replaces the contents with elements taken from the given source,
    /// consuming them.
    ///
    /// This is the destructive-move flavor of [`assign()`](Self::assign):
    /// ownership of each element moves into the container and the source is
    /// left to its own empty-but-valid devices. The exact-size bound lets
    /// the whole reservation happen up front, so on failure the previous
    /// contents are still intact.
    pub fn assign_take<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = values.into_iter();
        self.reserve(iter.len())?;
        self.clear();

        for value in iter {
            // Exact size is a cooperative contract, not a guarantee, so the
            // fallible push keeps a lying iterator sound.
            self.push(value)?;
        }

        Ok(())
    }

    /// Drops all live elements and sets the length to zero.
    ///
    /// The capacity and the backing store are retained; a spilled container
    /// stays spilled.
    pub fn clear(&mut self) {
        let live = self.len;

        // Zero the length first so a panicking element Drop leaks the
        // remainder instead of double-dropping it.
        self.len = 0;

        // SAFETY: The first `live` slots held live elements that nothing
        // else will drop now that len is zero.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.as_mut_ptr(), live));
        }
    }

    /// Ensures capacity for at least `new_capacity` elements, growing to
    /// exactly that amount.
    ///
    /// No-op when the current capacity already suffices. Fails with
    /// [`Error::CapacityOverflow`] when the request exceeds
    /// [`max_len()`](Self::max_len), or with [`Error::AllocationFailed`]
    /// when the allocator declines; either way the container is untouched.
    pub fn reserve(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity <= self.capacity() {
            return Ok(());
        }

        if new_capacity > Self::max_len() {
            return Err(Error::CapacityOverflow {
                requested: new_capacity,
                max: Self::max_len(),
            });
        }

        self.grow_exact(new_capacity)
    }

    /// Shrinks the backing store to the smallest footprint that holds the
    /// live elements.
    ///
    /// Inline or already-tight stores are left alone. An emptied spilled
    /// container returns to its inline buffer, releasing the heap block;
    /// otherwise the block is reallocated down to exactly the live element
    /// count.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        let len = self.len;

        let Storage::Spilled(buf) = &mut self.storage else {
            return Ok(());
        };

        if buf.capacity() == len {
            return Ok(());
        }

        if len == 0 {
            // Dropping the spilled variant releases the heap block.
            self.storage = Storage::new_inline();
            return Ok(());
        }

        buf.resize(len)
    }

    /// Detaches the heap allocation from a spilled container, handing the
    /// elements over without copying them.
    ///
    /// Returns `Ok(None)` for an inline-backed container (inline memory is
    /// part of the container value and can never be owned elsewhere) and for
    /// an empty spilled container (whose block is simply released). A
    /// non-empty spilled container is first shrunk so the block is exactly
    /// as long as its contents, then reset to empty inline state; the
    /// returned [`HeapBlock`] now carries sole responsibility for the
    /// elements and the allocation.
    pub fn detach_memory(&mut self) -> Result<Option<HeapBlock<T>>> {
        let len = self.len;

        let Storage::Spilled(buf) = &mut self.storage else {
            return Ok(None);
        };

        if len == 0 {
            self.storage = Storage::new_inline();
            return Ok(None);
        }

        if buf.capacity() != len {
            buf.resize(len)?;
        }

        let Storage::Spilled(buf) = mem::replace(&mut self.storage, Storage::new_inline()) else {
            unreachable!("storage was matched as spilled above");
        };

        self.len = 0;
        Ok(Some(HeapBlock::from_buf(buf, len)))
    }

    /// Adopts a detached heap block as this container's backing store.
    ///
    /// Any current elements are dropped and a current heap block is
    /// released. Afterwards both the length and the capacity equal the
    /// block's element count. Never allocates.
    pub fn attach_memory(&mut self, block: HeapBlock<T>) {
        self.clear();

        let (buf, len) = block.into_buf();

        // Dropping the previous storage releases a spilled block; the
        // inline variant owns nothing.
        self.storage = Storage::Spilled(buf);
        self.len = len;

        #[cfg(debug_assertions)]
        self.integrity_check();
    }

    /// Takes all elements out of another container, leaving it empty.
    ///
    /// When the source has spilled this is a constant-time pointer steal:
    /// this container's own contents are dropped and released, the source's
    /// heap block is adopted wholesale, and the source reverts to its inline
    /// buffer. When the source is still inline its elements are moved across
    /// one by one instead, since adopting a pointer into another container's
    /// inline buffer would dangle the moment that container goes away.
    ///
    /// The element-wise path may need to grow this container first; that
    /// reservation is the only fallible step and happens before anything is
    /// disturbed, so on failure both containers are exactly as they were.
    /// The two containers may have different inline capacities.
    pub fn transfer_from<const OTHER_N: usize>(
        &mut self,
        other: &mut SpillVec<T, OTHER_N, M>,
    ) -> Result<()> {
        if matches!(other.storage, Storage::Spilled(_)) {
            self.clear();

            let Storage::Spilled(buf) = mem::replace(&mut other.storage, Storage::new_inline())
            else {
                unreachable!("storage was matched as spilled above");
            };

            // Dropping our previous storage releases our own heap block, if
            // any; our elements were already dropped above.
            self.storage = Storage::Spilled(buf);
            self.len = other.len;
            other.len = 0;

            #[cfg(debug_assertions)]
            self.integrity_check();

            return Ok(());
        }

        // Inline source: element-wise destructive move. Reserve before
        // touching anything so failure leaves both sides intact.
        self.reserve(other.len)?;
        self.clear();

        // SAFETY: The two containers are distinct objects (guaranteed by
        // the two exclusive references), the source slots [0, other.len)
        // hold live elements, and capacity for all of them was reserved
        // above. The bitwise copy moves the elements; clearing the source
        // length below ensures they are dropped exactly once, by us.
        unsafe {
            ptr::copy_nonoverlapping(other.as_ptr(), self.as_mut_ptr(), other.len);
        }

        self.len = other.len;
        other.len = 0;

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(())
    }

    /// Grows capacity to at least `min_capacity` using the amortized growth
    /// factor: the target is 1.5x the current capacity or `min_capacity`,
    /// whichever is larger, capped at [`max_len()`](Self::max_len).
    fn grow_amortized(&mut self, min_capacity: usize) -> Result<()> {
        let capacity = self.capacity();

        // Cannot overflow: capacity is bounded by max_len(), which leaves
        // more than half of the usize range as headroom.
        let amortized = capacity.wrapping_add(capacity >> 1);

        let target = amortized.max(min_capacity).min(Self::max_len());

        if target < min_capacity {
            return Err(Error::CapacityOverflow {
                requested: min_capacity,
                max: Self::max_len(),
            });
        }

        self.grow_exact(target)
    }

    /// Grows capacity to exactly `new_capacity` slots.
    ///
    /// A spilled store is resized in place, letting the allocator move the
    /// bytes when it must; on failure the existing block is untouched. An
    /// inline store gets a fresh allocation and the live elements are moved
    /// across bitwise, after which the container is spilled for good.
    fn grow_exact(&mut self, new_capacity: usize) -> Result<()> {
        debug_assert!(
            new_capacity > self.capacity(),
            "growth must actually grow; callers filter no-op requests"
        );

        if let Storage::Spilled(buf) = &mut self.storage {
            buf.resize(new_capacity)?;

            #[cfg(debug_assertions)]
            self.integrity_check();

            return Ok(());
        }

        let new_buf = HeapBuf::allocate(new_capacity)?;

        // SAFETY: The inline slots [0, len) hold the live elements, the new
        // allocation has room for them, and the two regions cannot overlap.
        // In Rust a bitwise copy relocates a value completely, so the
        // inline slots are simply dead afterwards; no per-element teardown
        // is owed.
        unsafe {
            ptr::copy_nonoverlapping(self.as_ptr(), new_buf.ptr().as_ptr(), self.len);
        }

        self.storage = Storage::Spilled(new_buf);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(())
    }

    /// Verifies the relationship between length, capacity and storage
    /// provenance. Debug builds only.
    #[cfg(debug_assertions)]
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    fn integrity_check(&self) {
        assert!(
            self.len <= self.capacity(),
            "{} live elements exceed the capacity of {}",
            self.len,
            self.capacity()
        );

        if size_of::<T>() > 0 {
            if let Storage::Spilled(buf) = &self.storage {
                assert!(
                    buf.capacity() > 0,
                    "a spilled container never holds a zero-capacity block"
                );
            }
        }
    }
}

impl<T: Default, const N: usize> SpillVec<T, N, Filled> {
    /// Resizes the container to hold exactly `new_len` elements.
    ///
    /// Growth reserves amortized capacity, then value-initializes every new
    /// slot with `T::default()`. Shrinking drops the surplus elements and
    /// retains the capacity. On failure the container is untouched.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len > self.len {
            if new_len > self.capacity() {
                self.grow_amortized(new_len)?;
            }

            while self.len < new_len {
                // SAFETY: Index len is within the capacity ensured above.
                let slot = unsafe { self.as_mut_ptr().add(self.len) };

                // SAFETY: The slot is unoccupied and exclusively ours to
                // write.
                unsafe {
                    ptr::write(slot, T::default());
                }

                // Incrementing per element keeps the container consistent
                // if a constructor panics partway. Bounded by new_len.
                self.len = self.len.wrapping_add(1);
            }
        } else {
            self.truncate_to(new_len);
        }

        Ok(())
    }
}

impl<T: AnyBitPattern, const N: usize> SpillVec<T, N, Uninit> {
    /// Resizes the container to hold exactly `new_len` elements without
    /// initializing any of them.
    ///
    /// Growth reserves amortized capacity and then simply exposes the new
    /// slots: for `AnyBitPattern` element types whatever the memory holds is
    /// a valid value, so no time is spent writing soon-to-be-overwritten
    /// data. The caller is expected to write the new slots before relying
    /// on their contents. Shrinking just lowers the length; these element
    /// types have no teardown.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len > self.capacity() {
            self.grow_amortized(new_len)?;
        }

        self.len = new_len;
        Ok(())
    }
}

impl<T, const N: usize, M: FillMode> SpillVec<T, N, M> {
    /// Drops the elements at `[new_len, len)` and lowers the length.
    fn truncate_to(&mut self, new_len: usize) {
        debug_assert!(new_len <= self.len);

        // Cannot underflow; asserted above.
        let surplus = self.len.wrapping_sub(new_len);

        // Lower the length first so a panicking element Drop leaks the
        // remainder instead of double-dropping it.
        self.len = new_len;

        // SAFETY: new_len is within the original live range.
        let first_surplus = unsafe { self.as_mut_ptr().add(new_len) };

        // SAFETY: The `surplus` slots starting at new_len held live
        // elements that are now outside the live range.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first_surplus, surplus));
        }
    }
}

impl<T, const N: usize, M: FillMode> Drop for SpillVec<T, N, M> {
    fn drop(&mut self) {
        // The storage field's own Drop releases a spilled heap block.
        self.clear();
    }
}

impl<T, const N: usize, M: FillMode> Default for SpillVec<T, N, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize, M: FillMode> Deref for SpillVec<T, N, M> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T, const N: usize, M: FillMode> DerefMut for SpillVec<T, N, M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T, I: SliceIndex<[T]>, const N: usize, M: FillMode> Index<I> for SpillVec<T, N, M> {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        Index::index(self.as_slice(), index)
    }
}

impl<T, I: SliceIndex<[T]>, const N: usize, M: FillMode> IndexMut<I> for SpillVec<T, N, M> {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        IndexMut::index_mut(self.as_mut_slice(), index)
    }
}

impl<T: fmt::Debug, const N: usize, M: FillMode> fmt::Debug for SpillVec<T, N, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_slice(), f)
    }
}

impl<T: Clone, const N: usize, M: FillMode> Clone for SpillVec<T, N, M> {
    fn clone(&self) -> Self {
        let mut clone = Self::new();
        clone
            .assign(self.as_slice())
            .expect("we do not intend to handle allocation failure in infallible trait surfaces - OOM results in panic");
        clone
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source.as_slice())
            .expect("we do not intend to handle allocation failure in infallible trait surfaces - OOM results in panic");
    }
}

impl<T, U, const N: usize, const OTHER_N: usize, M, OTHER_M> PartialEq<SpillVec<U, OTHER_N, OTHER_M>>
    for SpillVec<T, N, M>
where
    T: PartialEq<U>,
    M: FillMode,
    OTHER_M: FillMode,
{
    fn eq(&self, other: &SpillVec<U, OTHER_N, OTHER_M>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: PartialEq<U>, U, const N: usize, M: FillMode> PartialEq<[U]> for SpillVec<T, N, M> {
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T: PartialEq<U>, U, const N: usize, M: FillMode> PartialEq<&[U]> for SpillVec<T, N, M> {
    fn eq(&self, other: &&[U]) -> bool {
        self.as_slice() == *other
    }
}

impl<T: PartialEq<U>, U, const N: usize, const LEN: usize, M: FillMode> PartialEq<[U; LEN]>
    for SpillVec<T, N, M>
{
    fn eq(&self, other: &[U; LEN]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, const N: usize, M: FillMode> Eq for SpillVec<T, N, M> {}

impl<T: Hash, const N: usize, M: FillMode> Hash for SpillVec<T, N, M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Hash::hash(self.as_slice(), state);
    }
}

impl<T, const N: usize, M: FillMode> Extend<T> for SpillVec<T, N, M> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();

        let (lower, _) = iter.size_hint();
        self.reserve(self.len.saturating_add(lower))
            .expect("we do not intend to handle allocation failure in infallible trait surfaces - OOM results in panic");

        for value in iter {
            self.push(value)
                .expect("we do not intend to handle allocation failure in infallible trait surfaces - OOM results in panic");
        }
    }
}

impl<T, const N: usize, M: FillMode> FromIterator<T> for SpillVec<T, N, M> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vec = Self::new();
        vec.extend(iter);
        vec
    }
}

impl<'a, T, const N: usize, M: FillMode> IntoIterator for &'a SpillVec<T, N, M> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T, const N: usize, M: FillMode> IntoIterator for &'a mut SpillVec<T, N, M> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T, const N: usize, M: FillMode> IntoIterator for SpillVec<T, N, M> {
    type Item = T;
    type IntoIter = IntoIter<T, N>;

    fn into_iter(self) -> Self::IntoIter {
        let this = ManuallyDrop::new(self);

        // SAFETY: `this` suppresses the container's Drop and is never used
        // again after the reads below, so storage ownership moves into the
        // iterator exactly once.
        let storage = unsafe { ptr::read(&raw const this.storage) };

        IntoIter::from_parts(storage, this.len)
    }
}

// SAFETY: The container exclusively owns its backing store; the raw pointer
// in the spilled variant refers to an allocation owned by this value alone,
// so sending the container between threads moves unique ownership of the T
// values, which is sound exactly when T itself may be sent.
unsafe impl<T: Send, const N: usize, M: FillMode> Send for SpillVec<T, N, M> {}

// SAFETY: Shared access to the container only permits shared access to its
// elements, which is sound exactly when T permits shared access across
// threads.
unsafe impl<T: Sync, const N: usize, M: FillMode> Sync for SpillVec<T, N, M> {}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::collections::hash_map::DefaultHasher;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(SpillVec<u32, 4>: Send, Sync);
    assert_impl_all!(SpillVec<String, 4>: Send, Sync);
    assert_not_impl_any!(SpillVec<Rc<u32>, 4>: Send, Sync);

    /// Increments a shared counter when dropped.
    #[derive(Clone)]
    struct DropTally {
        tally: Rc<Cell<usize>>,
    }

    impl DropTally {
        fn new(tally: &Rc<Cell<usize>>) -> Self {
            Self {
                tally: Rc::clone(tally),
            }
        }
    }

    impl Drop for DropTally {
        fn drop(&mut self) {
            self.tally.set(self.tally.get() + 1);
        }
    }

    #[test]
    fn starts_empty_inline() {
        let vec: SpillVec<u32, 8> = SpillVec::new();

        assert_eq!(vec.len(), 0);
        assert!(vec.is_empty());
        assert_eq!(vec.capacity(), 8);
        assert!(vec.is_inline());
    }

    #[test]
    fn fifth_push_spills_a_four_slot_container() {
        let mut vec: SpillVec<u32, 4> = SpillVec::new();

        for value in [1, 2, 3] {
            vec.push(value).unwrap();
        }
        assert_eq!(vec.len(), 3);
        assert!(vec.is_inline());

        vec.push(4).unwrap();
        assert_eq!(vec.len(), 4);
        assert!(vec.is_inline());

        vec.push(5).unwrap();
        assert!(!vec.is_inline());
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn long_push_sequence_preserves_count_and_order() {
        let mut vec: SpillVec<usize, 8> = SpillVec::new();

        for value in 0..1000 {
            vec.push(value).unwrap();
        }

        assert_eq!(vec.len(), 1000);
        assert!(vec.iter().copied().eq(0..1000));
    }

    #[test]
    fn spilling_moves_values_intact() {
        let mut vec: SpillVec<String, 2> = SpillVec::new();

        vec.push("alpha".to_string()).unwrap();
        vec.push("beta".to_string()).unwrap();
        assert!(vec.is_inline());

        vec.push("gamma".to_string()).unwrap();
        assert!(!vec.is_inline());
        assert_eq!(vec.as_slice(), ["alpha", "beta", "gamma"]);
    }

    #[test]
    fn reserve_meets_or_exceeds_request() {
        let mut vec: SpillVec<u32, 4> = SpillVec::new();

        vec.reserve(100).unwrap();
        assert!(vec.capacity() >= 100);
        assert_eq!(vec.len(), 0);

        // A smaller request is a no-op.
        let capacity = vec.capacity();
        vec.reserve(10).unwrap();
        assert_eq!(vec.capacity(), capacity);
    }

    #[test]
    fn reserve_rejects_unrepresentable_capacity() {
        let mut vec: SpillVec<u64, 4> = SpillVec::new();

        let result = vec.reserve(usize::MAX);
        assert!(matches!(result, Err(Error::CapacityOverflow { .. })));

        // Failure left the container untouched.
        assert!(vec.is_inline());
        assert_eq!(vec.capacity(), 4);
    }

    #[test]
    fn push_amortizes_growth() {
        let mut vec: SpillVec<u32, 4> = SpillVec::new();

        for value in 0..5 {
            vec.push(value).unwrap();
        }

        // The spill reserved 1.5x the inline capacity, not one extra slot.
        assert_eq!(vec.capacity(), 6);
    }

    #[test]
    fn resize_value_initializes_new_slots() {
        let mut vec: SpillVec<u32, 4> = SpillVec::new();
        vec.push(7).unwrap();

        vec.resize(6).unwrap();
        assert_eq!(vec.as_slice(), &[7, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn resize_round_trip_preserves_prefix() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[1, 2, 3]).unwrap();

        vec.resize(10).unwrap();
        vec.resize(2).unwrap();
        assert_eq!(vec.as_slice(), &[1, 2]);

        // Shrinking retained the grown capacity.
        assert!(vec.capacity() >= 10);
    }

    #[test]
    fn resize_shrink_drops_surplus_exactly_once() {
        thread_local! {
            static RESIZE_DROPS: Cell<usize> = const { Cell::new(0) };
        }

        /// Value-constructible drop counter, since `resize` requires
        /// `Default` for its growth direction.
        #[derive(Default)]
        struct DefaultTally;

        impl Drop for DefaultTally {
            fn drop(&mut self) {
                RESIZE_DROPS.with(|drops| drops.set(drops.get() + 1));
            }
        }

        let mut vec: SpillVec<DefaultTally, 2> = SpillVec::new();

        vec.resize(5).unwrap();
        assert_eq!(RESIZE_DROPS.with(Cell::get), 0);

        vec.resize(2).unwrap();
        assert_eq!(RESIZE_DROPS.with(Cell::get), 3);

        drop(vec);
        assert_eq!(RESIZE_DROPS.with(Cell::get), 5);
    }

    #[test]
    fn clear_retains_capacity_and_store() {
        let mut vec: SpillVec<u32, 2> = SpillVec::new();
        for value in 0..10 {
            vec.push(value).unwrap();
        }

        let capacity = vec.capacity();
        vec.clear();

        assert!(vec.is_empty());
        assert_eq!(vec.capacity(), capacity);
        assert!(!vec.is_inline());
    }

    #[test]
    fn shrink_to_fit_tightens_spilled_store() {
        let mut vec: SpillVec<u32, 2> = SpillVec::new();
        for value in 0..10 {
            vec.push(value).unwrap();
        }

        vec.resize(3).unwrap();
        vec.shrink_to_fit().unwrap();

        assert_eq!(vec.capacity(), 3);
        assert_eq!(vec.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn shrink_to_fit_returns_emptied_container_inline() {
        let mut vec: SpillVec<u32, 2> = SpillVec::new();
        for value in 0..10 {
            vec.push(value).unwrap();
        }
        assert!(!vec.is_inline());

        vec.clear();
        vec.shrink_to_fit().unwrap();

        assert!(vec.is_inline());
        assert_eq!(vec.capacity(), 2);
    }

    #[test]
    fn shrink_to_fit_is_noop_inline() {
        let mut vec: SpillVec<u32, 8> = SpillVec::from_slice(&[1, 2]).unwrap();

        vec.shrink_to_fit().unwrap();
        assert!(vec.is_inline());
        assert_eq!(vec.capacity(), 8);
    }

    #[test]
    fn checked_access_reports_bounds() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[10, 20, 30]).unwrap();

        assert_eq!(*vec.at(2).unwrap(), 30);
        assert!(matches!(
            vec.at(3),
            Err(Error::IndexOutOfBounds { index: 3, len: 3 })
        ));

        *vec.at_mut(0).unwrap() = 11;
        assert_eq!(vec.as_slice(), &[11, 20, 30]);
        assert!(matches!(vec.at_mut(9), Err(Error::IndexOutOfBounds { .. })));
    }

    #[test]
    fn assign_replaces_contents() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[1, 2, 3]).unwrap();

        vec.assign(&[9, 8]).unwrap();
        assert_eq!(vec.as_slice(), &[9, 8]);

        // Assigning more than the inline capacity spills.
        vec.assign(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5, 6]);
        assert!(!vec.is_inline());
    }

    #[test]
    fn assign_drops_previous_contents_exactly_once() {
        let tally = Rc::new(Cell::new(0));
        let mut vec: SpillVec<DropTally, 4> = SpillVec::new();

        for _ in 0..3 {
            vec.push(DropTally::new(&tally)).unwrap();
        }

        // Keep the source alive past the assertions so only the container's
        // own drops are counted.
        let source = [DropTally::new(&tally)];
        vec.assign(&source).unwrap();

        // The three original elements are gone; the assign source clone is
        // still live inside the container.
        assert_eq!(tally.get(), 3);
        assert_eq!(vec.len(), 1);
    }

    #[test]
    fn assign_take_moves_elements_out_of_the_source() {
        let source = vec!["alpha".to_string(), "beta".to_string()];

        let mut vec: SpillVec<String, 4> = SpillVec::new();
        vec.assign_take(source.into_iter()).unwrap();

        assert_eq!(vec.as_slice(), ["alpha", "beta"]);
    }

    #[test]
    fn pop_returns_elements_in_reverse() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[1, 2, 3]).unwrap();

        assert_eq!(vec.pop(), Some(3));
        assert_eq!(vec.pop(), Some(2));
        assert_eq!(vec.pop(), Some(1));
        assert_eq!(vec.pop(), None);
    }

    #[test]
    fn detach_on_inline_container_yields_nothing() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[1, 2, 3]).unwrap();

        assert!(vec.detach_memory().unwrap().is_none());

        // The container is unaffected.
        assert_eq!(vec.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn detach_on_empty_spilled_container_releases_and_reverts() {
        let mut vec: SpillVec<u32, 2> = SpillVec::new();
        for value in 0..6 {
            vec.push(value).unwrap();
        }
        vec.clear();
        assert!(!vec.is_inline());

        assert!(vec.detach_memory().unwrap().is_none());
        assert!(vec.is_inline());
        assert_eq!(vec.capacity(), 2);
    }

    #[test]
    fn detach_yields_tight_block_and_resets_container() {
        let mut vec: SpillVec<u32, 2> = SpillVec::new();
        for value in 0..5 {
            vec.push(value).unwrap();
        }

        let block = vec.detach_memory().unwrap().expect("container had spilled");

        assert_eq!(block.len(), 5);
        assert_eq!(block.byte_len(), 5 * size_of::<u32>());
        assert_eq!(block.as_slice(), &[0, 1, 2, 3, 4]);

        assert_eq!(vec.len(), 0);
        assert!(vec.is_inline());
        assert_eq!(vec.capacity(), 2);
    }

    #[test]
    fn attach_after_detach_round_trips() {
        let mut vec: SpillVec<u32, 2> = SpillVec::new();
        for value in 0..5 {
            vec.push(value).unwrap();
        }

        let block = vec.detach_memory().unwrap().expect("container had spilled");

        let mut other: SpillVec<u32, 8> = SpillVec::new();
        other.attach_memory(block);

        assert_eq!(other.as_slice(), &[0, 1, 2, 3, 4]);
        assert_eq!(other.len(), 5);
        assert_eq!(other.capacity(), 5);
        assert!(!other.is_inline());
    }

    #[test]
    fn attach_drops_previous_contents() {
        let tally = Rc::new(Cell::new(0));

        let mut source: SpillVec<DropTally, 1> = SpillVec::new();
        for _ in 0..3 {
            source.push(DropTally::new(&tally)).unwrap();
        }
        let block = source
            .detach_memory()
            .unwrap()
            .expect("container had spilled");

        let mut vec: SpillVec<DropTally, 4> = SpillVec::new();
        vec.push(DropTally::new(&tally)).unwrap();

        vec.attach_memory(block);

        // The single previous element was dropped; the three block elements
        // are now owned by the container.
        assert_eq!(tally.get(), 1);

        drop(vec);
        assert_eq!(tally.get(), 4);
    }

    #[test]
    fn transfer_from_spilled_source_steals_the_block() {
        let mut source: SpillVec<u32, 2> = SpillVec::new();
        for value in 0..8 {
            source.push(value).unwrap();
        }
        assert!(!source.is_inline());
        let block_ptr = source.as_ptr();

        let mut target: SpillVec<u32, 4> = SpillVec::from_slice(&[99]).unwrap();
        target.transfer_from(&mut source).unwrap();

        // Constant-time steal: the target now reads from the very same
        // allocation the source used to own.
        assert_eq!(target.as_ptr(), block_ptr);
        assert!(target.iter().copied().eq(0..8));

        assert_eq!(source.len(), 0);
        assert!(source.is_inline());
    }

    #[test]
    fn transfer_from_inline_source_moves_elements() {
        let tally = Rc::new(Cell::new(0));

        let mut source: SpillVec<DropTally, 4> = SpillVec::new();
        for _ in 0..3 {
            source.push(DropTally::new(&tally)).unwrap();
        }
        assert!(source.is_inline());

        let mut target: SpillVec<DropTally, 2> = SpillVec::new();
        target.transfer_from(&mut source).unwrap();

        assert_eq!(target.len(), 3);
        assert_eq!(source.len(), 0);

        // The moved elements were not dropped by the transfer.
        assert_eq!(tally.get(), 0);

        drop(source);
        assert_eq!(tally.get(), 0);

        drop(target);
        assert_eq!(tally.get(), 3);
    }

    #[test]
    fn transfer_between_differing_inline_capacities() {
        let mut source: SpillVec<u32, 16> = SpillVec::from_slice(&[1, 2, 3]).unwrap();
        let mut target: SpillVec<u32, 2> = SpillVec::new();

        target.transfer_from(&mut source).unwrap();

        assert_eq!(target.as_slice(), &[1, 2, 3]);
        assert!(!target.is_inline());
        assert!(source.is_empty());
    }

    #[test]
    fn transfer_drops_target_contents_exactly_once() {
        let tally = Rc::new(Cell::new(0));

        let mut source: SpillVec<DropTally, 1> = SpillVec::new();
        for _ in 0..2 {
            source.push(DropTally::new(&tally)).unwrap();
        }

        let mut target: SpillVec<DropTally, 1> = SpillVec::new();
        for _ in 0..2 {
            target.push(DropTally::new(&tally)).unwrap();
        }

        target.transfer_from(&mut source).unwrap();

        // Both of the target's own elements are gone, nothing else is.
        assert_eq!(tally.get(), 2);

        drop(target);
        drop(source);
        assert_eq!(tally.get(), 4);
    }

    #[test]
    fn drop_releases_every_element() {
        let tally = Rc::new(Cell::new(0));

        let mut vec: SpillVec<DropTally, 2> = SpillVec::new();
        for _ in 0..7 {
            vec.push(DropTally::new(&tally)).unwrap();
        }

        drop(vec);
        assert_eq!(tally.get(), 7);
    }

    #[test]
    fn uninit_mode_resize_skips_initialization() {
        let mut vec: SpillVec<u8, 4, Uninit> = SpillVec::new();

        vec.resize(1024).unwrap();
        assert_eq!(vec.len(), 1024);
        assert!(!vec.is_inline());

        // The contract is write-before-read; fill the buffer and verify.
        vec.as_mut_slice().fill(0xA5);
        assert!(vec.iter().all(|&byte| byte == 0xA5));

        vec.resize(4).unwrap();
        assert_eq!(vec.len(), 4);
    }

    #[test]
    fn uninit_mode_supports_ordinary_operations() {
        let mut vec: SpillVec<u32, 2, Uninit> = SpillVec::new();

        vec.push(1).unwrap();
        vec.push(2).unwrap();
        vec.push(3).unwrap();

        assert_eq!(vec.as_slice(), &[1, 2, 3]);
        assert!(!vec.is_inline());
        assert_eq!(vec.pop(), Some(3));
    }

    #[test]
    fn zero_sized_elements_never_spill() {
        let mut vec: SpillVec<(), 4> = SpillVec::new();

        assert_eq!(vec.capacity(), usize::MAX);
        assert_eq!(SpillVec::<(), 4>::max_len(), usize::MAX);

        for _ in 0..100 {
            vec.push(()).unwrap();
        }

        assert_eq!(vec.len(), 100);
        assert!(vec.is_inline());
        assert!(vec.detach_memory().unwrap().is_none());
        assert_eq!(vec.pop(), Some(()));
    }

    #[test]
    fn len_bytes_tracks_len() {
        let mut vec: SpillVec<u64, 4> = SpillVec::new();
        vec.push(1).unwrap();
        vec.push(2).unwrap();

        assert_eq!(vec.len_bytes(), 2 * size_of::<u64>());
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[1, 2, 3]).unwrap();
        let clone = vec.clone();

        vec.push(4).unwrap();

        assert_eq!(clone.as_slice(), &[1, 2, 3]);
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn equality_spans_capacities_and_slices() {
        let a: SpillVec<u32, 2> = SpillVec::from_slice(&[1, 2, 3]).unwrap();
        let b: SpillVec<u32, 8> = SpillVec::from_slice(&[1, 2, 3]).unwrap();

        assert_eq!(a, b);
        assert_eq!(a, [1, 2, 3]);
        assert_eq!(a, [1, 2, 3].as_slice());
        assert_ne!(a, [1, 2]);
    }

    #[test]
    fn equal_containers_hash_alike() {
        fn hash_of(value: &impl Hash) -> u64 {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        }

        let a: SpillVec<u32, 2> = SpillVec::from_slice(&[1, 2, 3]).unwrap();
        let b: SpillVec<u32, 8> = SpillVec::from_slice(&[1, 2, 3]).unwrap();

        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn debug_formats_as_a_sequence() {
        let vec: SpillVec<u32, 4> = SpillVec::from_slice(&[1, 2, 3]).unwrap();

        assert_eq!(format!("{vec:?}"), "[1, 2, 3]");
    }

    #[test]
    fn slice_surface_via_deref() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[3, 1, 2]).unwrap();

        assert_eq!(vec.first(), Some(&3));
        assert_eq!(vec.last(), Some(&2));
        assert_eq!(vec[1], 1);

        vec.sort_unstable();
        assert_eq!(vec.as_slice(), &[1, 2, 3]);

        vec[0] = 9;
        assert_eq!(vec.as_slice(), &[9, 2, 3]);

        let mut total = 0;
        for value in &vec {
            total += value;
        }
        assert_eq!(total, 14);
    }

    #[test]
    fn collects_from_an_iterator() {
        let vec: SpillVec<u32, 4> = (0..10).collect();

        assert_eq!(vec.len(), 10);
        assert!(!vec.is_inline());
        assert!(vec.iter().copied().eq(0..10));
    }

    #[test]
    fn extend_appends_to_existing_contents() {
        let mut vec: SpillVec<u32, 4> = SpillVec::from_slice(&[1]).unwrap();

        vec.extend([2, 3, 4, 5]);
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn with_capacity_pre_sizes() {
        let vec = SpillVec::<u32, 4>::with_capacity(100).unwrap();
        assert!(vec.capacity() >= 100);
        assert!(vec.is_empty());

        let vec = SpillVec::<u32, 4>::with_capacity(2).unwrap();
        assert!(vec.is_inline());
    }
}
