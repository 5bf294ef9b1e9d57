//! A hybrid dynamic array with inline-first storage and explicit heap
//! ownership transfer.
//!
//! This crate provides [`SpillVec<T, N>`], a contiguous container that keeps
//! its elements in a fixed-capacity buffer embedded in the container value
//! for as long as they fit, and transparently migrates them to a heap
//! allocation the first time growth exceeds that capacity. Small sequences,
//! which dominate most workloads, therefore never touch the allocator at
//! all, while large sequences behave like an ordinary growable array.
//!
//! # Key Features
//!
//! - **Inline storage first**: up to `N` elements live inside the container
//!   value; creation is free and allocation-free
//! - **Transparent spilling**: growth beyond `N` moves the elements to the
//!   heap with 1.5x amortized capacity expansion
//! - **Fallible allocation**: every growing operation reports
//!   [`Error::AllocationFailed`] or [`Error::CapacityOverflow`] instead of
//!   aborting, and failure never disturbs existing contents
//! - **Zero-copy hand-off**: a spilled container's allocation can be
//!   detached as a [`HeapBlock`], attached to another container, stolen
//!   wholesale with [`SpillVec::transfer_from()`], or dismantled into raw
//!   parts for custody across subsystem boundaries
//! - **Compile-time fill modes**: the [`Filled`] mode value-initializes
//!   slots exposed by `resize`, while the [`Uninit`] mode skips that cost
//!   for trivial element types that will be overwritten anyway
//! - **Slice everywhere**: the container dereferences to `[T]`, so the
//!   whole slice API (iteration, sorting, searching, indexing) just works
//!
//! # Examples
//!
//! ## Staying inline
//!
//! ```rust
//! use spill_vec::SpillVec;
//!
//! // Room for four coordinates inside the container value itself.
//! let mut corners: SpillVec<(f32, f32), 4> = SpillVec::new();
//!
//! corners.push((0.0, 0.0))?;
//! corners.push((1.0, 0.0))?;
//! corners.push((1.0, 1.0))?;
//! corners.push((0.0, 1.0))?;
//!
//! // All four fit inline; no heap allocation has happened.
//! assert!(corners.is_inline());
//! assert_eq!(corners.len(), 4);
//! # Ok::<(), spill_vec::Error>(())
//! ```
//!
//! ## Spilling to the heap
//!
//! ```rust
//! use spill_vec::SpillVec;
//!
//! let mut values: SpillVec<u32, 4> = SpillVec::new();
//!
//! for value in 0..100 {
//!     values.push(value)?;
//! }
//!
//! // The contents moved to the heap when the fifth element arrived.
//! assert!(!values.is_inline());
//! assert_eq!(values.len(), 100);
//! assert_eq!(values[99], 99);
//! # Ok::<(), spill_vec::Error>(())
//! ```
//!
//! ## Handing a heap allocation to another container
//!
//! ```rust
//! use spill_vec::SpillVec;
//!
//! let mut producer: SpillVec<u64, 2> = SpillVec::new();
//! for value in 0..1000 {
//!     producer.push(value)?;
//! }
//!
//! // Detach the allocation; the producer reverts to its empty inline state.
//! let block = producer.detach_memory()?.expect("producer had spilled");
//! assert!(producer.is_empty());
//!
//! // Attach it elsewhere; not a single element was copied.
//! let mut consumer: SpillVec<u64, 2> = SpillVec::new();
//! consumer.attach_memory(block);
//! assert_eq!(consumer.len(), 1000);
//! # Ok::<(), spill_vec::Error>(())
//! ```
//!
//! ## Skipping initialization for scratch buffers
//!
//! ```rust
//! use spill_vec::{SpillVec, Uninit};
//!
//! // A large read buffer that will be filled by I/O before anyone reads it.
//! let mut scratch: SpillVec<u8, 64, Uninit> = SpillVec::new();
//! scratch.resize(64 * 1024)?;
//!
//! // The 64 KiB were exposed without being written; fill before reading.
//! scratch.as_mut_slice().fill(0);
//! # Ok::<(), spill_vec::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! Containers and blocks are thread-mobile ([`Send`] when the element type
//! is) but offer no internal synchronization; sharing one between threads
//! requires external locking, as with any `&mut`-mutated structure.

mod error;
mod fill;
mod heap_block;
mod heap_buf;
mod iter;
mod vec;

pub use error::Error;
pub(crate) use error::Result;
pub use fill::{FillMode, Filled, Uninit};
pub use heap_block::HeapBlock;
pub use iter::IntoIter;
pub use vec::SpillVec;
