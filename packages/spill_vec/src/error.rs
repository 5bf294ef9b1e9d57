use thiserror::Error;

/// Errors that can occur when operating on the containers in this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked for more element slots than the element type can ever
    /// address. The limit is `isize::MAX` bytes divided by the element size,
    /// as imposed by the Rust allocator APIs.
    #[error(
        "requested capacity of {requested} elements exceeds the maximum of {max} for this element type"
    )]
    CapacityOverflow {
        /// The capacity that was requested, in elements.
        requested: usize,

        /// The largest capacity the element type permits, in elements.
        max: usize,
    },

    /// The memory allocator declined to provide the requested block. The
    /// container is left exactly as it was before the failed operation.
    #[error("memory allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// Size of the allocation request that failed, in bytes.
        bytes: usize,
    },

    /// A checked element accessor was given an index at or beyond the number
    /// of live elements.
    #[error("index {index} is out of bounds of the {len} elements in the container")]
    IndexOutOfBounds {
        /// The index that was requested.
        index: usize,

        /// The number of live elements at the time of the call.
        len: usize,
    },
}

/// A specialized `Result` type for container operations, returning the
/// crate's [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn index_error_names_both_bounds() {
        let error = Error::IndexOutOfBounds { index: 8, len: 3 };

        let message = error.to_string();
        assert!(message.contains('8'));
        assert!(message.contains('3'));
    }

    #[test]
    fn capacity_overflow_is_error() {
        let error = Error::CapacityOverflow {
            requested: usize::MAX,
            max: 1024,
        };

        // Verify it is a valid Error that can be used in Result context.
        let result: Result<()> = Err(error);
        assert!(result.is_err());
    }
}
