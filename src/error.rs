//! Errors surfaced by filter construction and reassembly.

/// Failures of [`Builder::populate`](crate::Builder::populate) and of reassembling a filter with
/// [`Xor8::from_parts`](crate::Xor8::from_parts) or its deserializers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Peeling failed on every seed the builder was allowed to try. Almost always caused by a
    /// duplicate key.
    #[error("too many iterations ({iterations}), you probably have duplicate keys")]
    TooManyIterations {
        /// Number of construction attempts made.
        iterations: usize,
    },

    /// More keys than a filter with `u32` block lengths can hold.
    #[error("{keys} keys do not fit in a single filter")]
    TooManyKeys {
        /// Number of keys supplied.
        keys: usize,
    },

    /// A filter triple with empty blocks. Built filters always have at least ten slots per block.
    #[error("block length must be non-zero")]
    ZeroBlockLength,

    /// A fingerprint array whose length is not three times the block length.
    #[error("expected {expected} fingerprints, found {actual}")]
    FingerprintLength {
        /// `3 * block_length`
        expected: usize,
        /// Length supplied
        actual: usize,
    },
}
