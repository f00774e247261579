//! This library implements Xor8 filters -- data structures for fast approximation of set
//! membership using little memory. Probabilistic filters like xor filters are useful for
//! quickly estimating the existence of an entity to avoid using an expensive resource.
//! For example, they can be used to [reduce disk writes] in a cache or [identify malicious URLs].
//!
//! An Xor8 filter stores one 8-bit fingerprint per slot in three equal blocks, about 1.23 slots
//! per key. A key is reported present when the xor of its three slots equals its fingerprint,
//! which never misses a member and accepts a non-member with probability 2^-8.
//!
//! Filters are built once from a set of distinct 64-bit keys and are immutable afterwards.
//! Construction peels a random 3-uniform hypergraph and reseeds when peeling gets stuck; a
//! [`Builder`] keeps the peeling buffers between builds so that many filters can be built
//! without reallocating. Lookups are pure and can be shared freely between threads.
//!
//! ```
//! use xor8::{Builder, Filter};
//!
//! let keys: Vec<u64> = (0..10_000).map(|k| k * 31).collect();
//! let filter = xor8::populate(&keys).unwrap();
//! assert!(keys.iter().all(|key| filter.contains(key)));
//!
//! // Duplicates cannot be placed; construction gives up once the retry budget is spent.
//! let err = Builder::new().max_iterations(5).populate(&[42, 42]).unwrap_err();
//! assert_eq!(err, xor8::Error::TooManyIterations { iterations: 5 });
//! ```
//!
//! This library is `no_std` and needs an allocator. Diagnostics go through [`tracing`]; install
//! a subscriber in the application to see them.
//!
//! Filters are implemented as described in the paper
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters] and in Daniel Lemire's [go]
//! implementation.
//!
//! [reduce disk writes]: https://en.wikipedia.org/wiki/Bloom_filter#Cache_filtering
//! [identify malicious URLs]: https://en.wikipedia.org/wiki/Bloom_filter#Examples
//! [`tracing`]: https://docs.rs/tracing
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters]: https://arxiv.org/abs/1912.08258
//! [go]: https://github.com/FastFilter/xorfilter

#![no_std]
// Configuration attributes
#![warn(missing_docs)]
#![deny(clippy::all, clippy::cargo, clippy::nursery)]
#![allow(
    clippy::len_without_is_empty,
    clippy::useless_attribute,
    clippy::cargo_common_metadata
)]

extern crate alloc;

mod builder;
mod error;
mod hash;
mod hash_proxy;
mod scratch;
mod xor8;

pub use builder::{Builder, BuilderConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_RANDOM_SEED};
pub use error::Error;
pub use hash_proxy::HashProxy;
pub use xor8::{populate, Xor8, Xor8Ref};

/// Methods common to xor filters.
pub trait Filter<Type> {
    /// Returns `true` if the filter probably contains the specified key.
    ///
    /// There can never be a false negative, but there is a small possibility of false positives.
    /// Refer to individual filters' documentation for false positive rates.
    fn contains(&self, key: &Type) -> bool;

    /// Returns the number of fingerprints in the filter.
    fn len(&self) -> usize;
}

/// A filter that can be handed to external storage as a fixed-size descriptor plus a fingerprint
/// buffer, and read back without copying through [`FilterRef::from_dma`].
pub trait DmaSerializable {
    /// Bytes needed by [`DmaSerializable::dma_copy_descriptor_to`].
    const DESCRIPTOR_LEN: usize;

    /// Writes the filter's descriptor into the first `DESCRIPTOR_LEN` bytes of `out`.
    fn dma_copy_descriptor_to(&self, out: &mut [u8]);

    /// The fingerprint array as raw bytes.
    fn dma_fingerprints(&self) -> &[u8];
}

/// A filter borrowing its fingerprints from an external buffer.
pub trait FilterRef<'a, Type>: Filter<Type> {
    /// Required alignment of the fingerprint buffer passed to [`FilterRef::from_dma`].
    const FINGERPRINT_ALIGNMENT: usize;

    /// Rebuilds a filter view from the output of [`DmaSerializable`].
    ///
    /// # Panics
    ///
    /// Panics if the descriptor is too short or does not describe the fingerprint buffer, which
    /// includes a zero block length.
    fn from_dma(descriptor: &[u8], fingerprints: &'a [u8]) -> Self;
}
