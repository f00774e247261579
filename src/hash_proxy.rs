//! Implements a hashing proxy for xor filters.

use crate::{Builder, Error, Filter, Xor8};
use alloc::vec::Vec;
use core::{
    convert::TryFrom,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Arbitrary key type proxy for xor filters.
///
/// A `HashProxy` exposes a [`Filter`] trait for arbitrary key types, using a `Filter<u64>` as
/// an underlying keystore. The performance and collision rate of the `HashProxy` filter depends
/// on the choice of [`Hasher`] and underlying [`Filter`]. A `HashProxy` is immutable once
/// constructed.
///
/// ```
/// # extern crate alloc;
/// # extern crate std;
/// use std::collections::hash_map::DefaultHasher;
/// use xor8::{Filter, HashProxy, Xor8};
/// # use alloc::vec::Vec;
///
/// let fruits = vec!["apple", "banana", "tangerine", "watermelon"];
/// let filter: HashProxy<_, DefaultHasher, Xor8> = HashProxy::try_from_keys(&fruits).unwrap();
///
/// for fruit in &fruits {
///     assert!(filter.contains(fruit));
/// }
/// ```
///
/// Two distinct keys that hash to the same `u64` are duplicates to the underlying filter, so
/// construction can fail with [`Error::TooManyIterations`] if the hasher collides.
///
/// Because of `HashProxy`s' key type parameter, the existence of a key can only be checked using
/// types a `HashProxy` is constructed with.
///
/// ```compile_fail
/// # extern crate std;
/// use std::collections::hash_map::DefaultHasher;
/// use std::hash::{Hash, Hasher};
/// use xor8::{Filter, HashProxy, Xor8};
///
/// let fruits = vec!["apple", "banana", "tangerine", "watermelon"];
/// let fruits: HashProxy<_, DefaultHasher, Xor8> = HashProxy::try_from_keys(&fruits).unwrap();
///
/// let mut hasher = DefaultHasher::default();
/// "tangerine".hash(&mut hasher);
/// let tangerine_hash = hasher.finish();
///
/// assert!(fruits.contains(&tangerine_hash)); // doesn't work!
/// ```
///
/// Serializing and deserializing `HashProxy`s can be enabled with the [`serde`] feature.
///
/// [`Filter`]: crate::Filter
/// [`Hasher`]: core::hash::Hasher
/// [`serde`]: http://serde.rs
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64>,
{
    filter: F,
    _hasher: PhantomData<H>,
    _type: PhantomData<T>,
}

#[inline]
fn hash<T: Hash, H: Hasher + Default>(key: &T) -> u64 {
    let mut hasher = H::default();
    key.hash(&mut hasher);
    hasher.finish()
}

impl<T, H, F> Filter<T> for HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64>,
{
    /// Returns `true` if the underlying filter contains the specified key.
    fn contains(&self, key: &T) -> bool {
        self.filter.contains(&hash::<T, H>(key))
    }

    fn len(&self) -> usize {
        self.filter.len()
    }
}

impl<T, H, F> HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64> + TryFrom<Vec<u64>, Error = Error>,
{
    /// Hashes `keys` and builds the underlying filter from the digests.
    pub fn try_from_keys(keys: &[T]) -> Result<Self, Error> {
        let keys: Vec<u64> = keys.iter().map(hash::<T, H>).collect();
        Ok(Self::wrap(F::try_from(keys)?))
    }
}

impl<T, H> HashProxy<T, H, Xor8>
where
    T: Hash,
    H: Hasher + Default,
{
    /// Like [`HashProxy::try_from_keys`], but builds with `builder` so its buffers and seed
    /// sequence are reused.
    pub fn build(builder: &mut Builder, keys: &[T]) -> Result<Self, Error> {
        let filter = builder.populate_iter(keys.iter().map(hash::<T, H>))?;
        Ok(Self::wrap(filter))
    }
}

impl<T, H, F> HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64>,
{
    const fn wrap(filter: F) -> Self {
        Self {
            filter,
            _hasher: PhantomData,
            _type: PhantomData,
        }
    }

    /// The underlying `u64` filter.
    pub const fn filter(&self) -> &F {
        &self.filter
    }
}
