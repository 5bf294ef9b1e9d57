//! Compile-time selection of how a container treats slots exposed by growth.
//!
//! The fill mode is a type parameter rather than a runtime flag so the safety
//! reasoning is settled during compilation: a container that skips element
//! initialization can only ever be instantiated for element types where that
//! is harmless.

/// Determines what a container does with element slots that `resize` exposes
/// beyond the previous length, and symmetrically whether shrinking runs any
/// per-element teardown.
///
/// This trait is sealed; the only implementations are [`Filled`] and
/// [`Uninit`].
pub trait FillMode: sealed::Sealed + 'static {}

/// New slots are value-initialized with `T::default()` and live elements are
/// dropped when the container shrinks or is destroyed.
///
/// This is the default mode and the right choice for every element type that
/// carries resources or whose values must be well-defined immediately after
/// `resize`.
#[derive(Debug)]
pub enum Filled {}

/// New slots are exposed without being written.
///
/// Growth via `resize` is restricted to [`bytemuck::AnyBitPattern`] element
/// types: trivial, drop-free types for which every bit pattern is a valid
/// value, so skipping both initialization and teardown is harmless. This
/// avoids touching large buffers that the caller is about to overwrite
/// anyway.
///
/// Caller contract: a slot exposed by `resize` in this mode holds arbitrary
/// bytes until the caller writes it.
#[derive(Debug)]
pub enum Uninit {}

impl FillMode for Filled {}
impl FillMode for Uninit {}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Filled {}
    impl Sealed for super::Uninit {}
}
