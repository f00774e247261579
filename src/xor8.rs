//! Implements Xor8 filters as described in [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters].
//!
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters]: https://arxiv.org/abs/1912.08258

use crate::{
    error::Error,
    hash::{fingerprint, mix, Slots},
    Builder, DmaSerializable, Filter, FilterRef,
};
use alloc::{boxed::Box, vec::Vec};
use core::convert::TryFrom;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "bincode")]
use alloc::string::ToString;
#[cfg(feature = "bincode")]
use bincode::{
    de::{Decode, Decoder},
    error::DecodeError,
    Encode,
};

/// Length of the DMA descriptor: seed then block length, little-endian.
const DESCRIPTOR_LEN: usize = 8 + 4;

/// Xor filter using 8-bit fingerprints.
///
/// An `Xor8` filter uses <10 bits per entry of the set is it constructed from, and has a false
/// positive rate of about 2^-8 (0.39%).
///
/// An `Xor8` is constructed from a set of distinct 64-bit unsigned integers and is immutable.
/// Construction fails only when every seed tried leaves a cycle, which in practice means the
/// keys were not distinct.
///
/// ```
/// # extern crate alloc;
/// use xor8::{Filter, Xor8};
/// use core::convert::TryFrom;
/// # use alloc::vec::Vec;
/// # use rand::Rng;
///
/// # let mut rng = rand::thread_rng();
/// const SAMPLE_SIZE: usize = 1_000_000;
/// let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
/// let filter = Xor8::try_from(&keys).unwrap();
///
/// // no false negatives
/// for key in keys {
///     assert!(filter.contains(&key));
/// }
///
/// // bits per entry
/// let bpe = (filter.len() as f64) * 8.0 / (SAMPLE_SIZE as f64);
/// assert!(bpe < 10., "Bits per entry is {}", bpe);
///
/// // false positive rate
/// let false_positives: usize = (0..SAMPLE_SIZE)
///     .map(|_| rng.gen())
///     .filter(|n| filter.contains(n))
///     .count();
/// let fp_rate: f64 = (false_positives * 100) as f64 / SAMPLE_SIZE as f64;
/// assert!(fp_rate < 0.45, "False positive rate is {}", fp_rate);
/// ```
///
/// A filter is fully described by the triple `(seed, block_length, fingerprints)`; see
/// [`Xor8::into_parts`] and [`Xor8::from_parts`]. Serializing and deserializing `Xor8` filters
/// can be enabled with the [`serde`] feature (or [`bincode`] for bincode).
///
/// Deserialization goes through [`Xor8::from_parts`], so malformed input is rejected up front
/// rather than panicking on lookup.
///
/// [`serde`]: http://serde.rs
/// [`bincode`]: https://docs.rs/bincode
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawXor8"))]
#[cfg_attr(feature = "bincode", derive(Encode))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xor8 {
    pub(crate) seed: u64,
    pub(crate) block_length: u32,
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    pub(crate) fingerprints: Box<[u8]>,
}

/// Unchecked wire form of an [`Xor8`].
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct RawXor8 {
    seed: u64,
    block_length: u32,
    #[serde(with = "serde_bytes")]
    fingerprints: Box<[u8]>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawXor8> for Xor8 {
    type Error = Error;

    fn try_from(raw: RawXor8) -> Result<Self, Self::Error> {
        Self::from_parts(raw.seed, raw.block_length, raw.fingerprints)
    }
}

#[cfg(feature = "bincode")]
impl<Context> Decode<Context> for Xor8 {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let seed = u64::decode(decoder)?;
        let block_length = u32::decode(decoder)?;
        let fingerprints = Box::<[u8]>::decode(decoder)?;
        Self::from_parts(seed, block_length, fingerprints)
            .map_err(|err| DecodeError::OtherString(err.to_string()))
    }
}

#[cfg(feature = "bincode")]
bincode::impl_borrow_decode!(Xor8);

#[inline]
fn contains(key: u64, seed: u64, block_length: u32, fingerprints: &[u8]) -> bool {
    let hash = mix(key, seed);
    let [h0, h1, h2] = Slots::from_hash(hash, block_length).global(block_length);
    fingerprint(hash) == fingerprints[h0] ^ fingerprints[h1] ^ fingerprints[h2]
}

impl Filter<u64> for Xor8 {
    /// Returns `true` if the filter contains the specified key. Has a false positive rate of
    /// about 0.39% and no false negatives.
    fn contains(&self, key: &u64) -> bool {
        contains(*key, self.seed, self.block_length, &self.fingerprints)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl Xor8 {
    /// The seed fixing this filter's hashing.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Slots per block. The filter holds three blocks.
    pub const fn block_length(&self) -> u32 {
        self.block_length
    }

    /// All `3 * block_length` fingerprints, block 0 first.
    pub fn fingerprints(&self) -> &[u8] {
        &self.fingerprints
    }

    /// Splits the filter into `(seed, block_length, fingerprints)`.
    pub fn into_parts(self) -> (u64, u32, Box<[u8]>) {
        (self.seed, self.block_length, self.fingerprints)
    }

    /// Reassembles a filter from the triple returned by [`Xor8::into_parts`].
    ///
    /// Fails unless `block_length` is non-zero and `fingerprints` holds exactly
    /// `3 * block_length` entries, which is what lookups index into.
    pub fn from_parts(
        seed: u64,
        block_length: u32,
        fingerprints: impl Into<Box<[u8]>>,
    ) -> Result<Self, Error> {
        let fingerprints = fingerprints.into();
        check_layout(block_length, fingerprints.len())?;
        Ok(Self {
            seed,
            block_length,
            fingerprints,
        })
    }
}

fn check_layout(block_length: u32, len: usize) -> Result<(), Error> {
    if block_length == 0 {
        return Err(Error::ZeroBlockLength);
    }
    let expected = 3 * block_length as usize;
    if len != expected {
        return Err(Error::FingerprintLength {
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Builds a filter with a default-configured, single-use [`Builder`].
///
/// The keys must be distinct. Use a [`Builder`] directly to tune the retry budget or to amortize
/// allocations over many filters.
pub fn populate(keys: &[u64]) -> Result<Xor8, Error> {
    Builder::new().populate(keys)
}

impl TryFrom<&[u64]> for Xor8 {
    type Error = Error;

    fn try_from(keys: &[u64]) -> Result<Self, Self::Error> {
        populate(keys)
    }
}

impl TryFrom<&Vec<u64>> for Xor8 {
    type Error = Error;

    fn try_from(v: &Vec<u64>) -> Result<Self, Self::Error> {
        populate(v)
    }
}

impl TryFrom<Vec<u64>> for Xor8 {
    type Error = Error;

    fn try_from(v: Vec<u64>) -> Result<Self, Self::Error> {
        populate(&v)
    }
}

impl DmaSerializable for Xor8 {
    const DESCRIPTOR_LEN: usize = DESCRIPTOR_LEN;

    fn dma_copy_descriptor_to(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.seed.to_le_bytes());
        out[8..DESCRIPTOR_LEN].copy_from_slice(&self.block_length.to_le_bytes());
    }

    fn dma_fingerprints(&self) -> &[u8] {
        &self.fingerprints
    }
}

/// Like [`Xor8`] except that it can be constructed 0-copy from external buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xor8Ref<'a> {
    seed: u64,
    block_length: u32,
    fingerprints: &'a [u8],
}

impl<'a> Filter<u64> for Xor8Ref<'a> {
    /// Returns `true` if the filter contains the specified key. Has a false positive rate of
    /// about 0.39% and no false negatives.
    fn contains(&self, key: &u64) -> bool {
        contains(*key, self.seed, self.block_length, self.fingerprints)
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl<'a> FilterRef<'a, u64> for Xor8Ref<'a> {
    const FINGERPRINT_ALIGNMENT: usize = 1;

    fn from_dma(descriptor: &[u8], fingerprints: &'a [u8]) -> Self {
        assert!(
            descriptor.len() >= DESCRIPTOR_LEN,
            "Invalid descriptor provided - must be at least {} bytes",
            DESCRIPTOR_LEN
        );
        let mut seed = [0; 8];
        seed.copy_from_slice(&descriptor[..8]);
        let mut block_length = [0; 4];
        block_length.copy_from_slice(&descriptor[8..DESCRIPTOR_LEN]);
        let block_length = u32::from_le_bytes(block_length);

        assert_ne!(
            block_length, 0,
            "Invalid descriptor provided - block length must be non-zero"
        );
        assert_eq!(
            fingerprints.len(),
            3 * block_length as usize,
            "Invalid fingerprint buffer provided - length must be 3 * block length"
        );

        Self {
            seed: u64::from_le_bytes(seed),
            block_length,
            fingerprints,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        xor8::Xor8Ref, Builder, BuilderConfig, DmaSerializable, Error, Filter, FilterRef, Xor8,
    };
    use core::convert::TryFrom;

    use alloc::{collections::BTreeSet, vec, vec::Vec};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_initialization() {
        const SAMPLE_SIZE: usize = 1_000_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Xor8::try_from(&keys).unwrap();

        for key in keys {
            assert!(filter.contains(&key));
        }
    }

    #[test]
    fn test_bits_per_entry() {
        const SAMPLE_SIZE: usize = 1_000_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Xor8::try_from(&keys).unwrap();
        let bpe = (filter.len() as f64) * 8.0 / (SAMPLE_SIZE as f64);

        assert!(bpe < 10., "Bits per entry is {}", bpe);
    }

    #[test]
    fn test_false_positives() {
        const SAMPLE_SIZE: usize = 1_000_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Xor8::try_from(&keys).unwrap();

        let false_positives: usize = (0..SAMPLE_SIZE)
            .map(|_| rng.gen())
            .filter(|n| filter.contains(n))
            .count();
        let fp_rate: f64 = (false_positives * 100) as f64 / SAMPLE_SIZE as f64;
        assert!(fp_rate < 0.45, "False positive rate is {}", fp_rate);
        assert!(fp_rate > 0.33, "False positive rate is {}", fp_rate);
    }

    #[test]
    fn test_false_positives_disjoint_queries() {
        const KEYS: usize = 10_000;
        const QUERIES: usize = 1_000_000;
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let keys: BTreeSet<u64> = (0..KEYS).map(|_| rng.gen()).collect();
        let filter = Xor8::try_from(keys.iter().copied().collect::<Vec<_>>()).unwrap();

        let mut queried = 0;
        let mut false_positives = 0;
        while queried < QUERIES {
            let key: u64 = rng.gen();
            if keys.contains(&key) {
                continue;
            }
            queried += 1;
            if filter.contains(&key) {
                false_positives += 1;
            }
        }

        // 2^-8 of 1M is ~3906 with a standard deviation of ~62.
        assert!(
            (3_500..4_300).contains(&false_positives),
            "{} false positives",
            false_positives
        );
    }

    #[test]
    fn test_small_keys() {
        let filter = Xor8::try_from(vec![1u64, 2, 3, 4, 5]).unwrap();
        for key in 1..=5 {
            assert!(filter.contains(&key));
        }
    }

    #[test]
    fn test_empty_filter() {
        let filter = Xor8::try_from(Vec::<u64>::new()).unwrap();
        assert_eq!(filter.len(), 30);
        assert_eq!(filter.block_length(), 10);
        assert!(filter.fingerprints().iter().all(|&fp| fp == 0));
    }

    #[test]
    fn test_duplicates_fail() {
        assert_eq!(
            Xor8::try_from(vec![42u64, 42]),
            Err(Error::TooManyIterations { iterations: 100 })
        );
    }

    #[test]
    fn test_parts_roundtrip() {
        let keys: Vec<u64> = (0..10_000).map(|k| k * 7919).collect();
        let filter = crate::populate(&keys).unwrap();
        let copy = filter.clone();

        let (seed, block_length, fingerprints) = filter.into_parts();
        assert_eq!(fingerprints.len(), 3 * block_length as usize);

        let restored = Xor8::from_parts(seed, block_length, fingerprints).unwrap();
        assert_eq!(restored, copy);
        for key in &keys {
            assert!(restored.contains(key));
        }
    }

    #[test]
    fn test_from_parts_rejects_bad_length() {
        assert_eq!(
            Xor8::from_parts(1, 10, vec![0u8; 29]),
            Err(Error::FingerprintLength {
                expected: 30,
                actual: 29
            })
        );
    }

    #[test]
    fn test_from_parts_rejects_zero_block_length() {
        assert_eq!(
            Xor8::from_parts(1, 0, Vec::new()),
            Err(Error::ZeroBlockLength)
        );
    }

    #[test]
    fn test_dma_roundtrip() {
        const SAMPLE_SIZE: usize = 100_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Xor8::try_from(&keys).unwrap();

        // Unaligned descriptor is fine.
        let mut descriptor = [0; Xor8::DESCRIPTOR_LEN + 1];
        filter.dma_copy_descriptor_to(&mut descriptor[1..]);
        assert_eq!(&descriptor[1..9], &filter.seed().to_le_bytes());
        assert_eq!(&descriptor[9..], &filter.block_length().to_le_bytes());

        let filter_ref = Xor8Ref::from_dma(&descriptor[1..], filter.dma_fingerprints());
        assert_eq!(filter_ref.len(), filter.len());

        for key in &keys {
            assert!(filter_ref.contains(key));
        }
        for _ in 0..10_000 {
            let key = rng.gen();
            assert_eq!(filter_ref.contains(&key), filter.contains(&key));
        }
    }

    #[test]
    #[should_panic(expected = "Invalid fingerprint buffer provided - length must be 3 * block length")]
    fn test_dma_truncated_fingerprints() {
        let keys: Vec<u64> = (0..1_000).collect();
        let filter = Builder::with_config(BuilderConfig::default())
            .populate(&keys)
            .unwrap();

        let mut descriptor = [0; Xor8::DESCRIPTOR_LEN];
        filter.dma_copy_descriptor_to(&mut descriptor);

        let serialized = filter.dma_fingerprints();
        let serialized = &serialized[..serialized.len() - 1];

        Xor8Ref::from_dma(&descriptor, serialized);
    }

    #[test]
    #[should_panic(expected = "Invalid descriptor provided - block length must be non-zero")]
    fn test_dma_zero_block_length() {
        let mut descriptor = [0; Xor8::DESCRIPTOR_LEN];
        descriptor[..8].copy_from_slice(&7u64.to_le_bytes());

        Xor8Ref::from_dma(&descriptor, &[]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let keys: Vec<u64> = (0..10_000).collect();
        let filter = Xor8::try_from(&keys).unwrap();
        let config = bincode::config::standard();

        let bytes = bincode::serde::encode_to_vec(&filter, config).unwrap();
        let (restored, _): (Xor8, usize) =
            bincode::serde::decode_from_slice(&bytes, config).unwrap();

        assert_eq!(restored, filter);
        for key in &keys {
            assert!(restored.contains(key));
        }
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_roundtrip() {
        let keys: Vec<u64> = (0..10_000).collect();
        let filter = Xor8::try_from(&keys).unwrap();
        let config = bincode::config::standard();

        let bytes = bincode::encode_to_vec(&filter, config).unwrap();
        let (restored, _): (Xor8, usize) = bincode::decode_from_slice(&bytes, config).unwrap();

        assert_eq!(restored, filter);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_rejects_malformed_triple() {
        use serde_bytes::ByteBuf;

        let config = bincode::config::standard();

        let bytes =
            bincode::serde::encode_to_vec((3u64, 100u32, ByteBuf::from(vec![0u8; 30])), config)
                .unwrap();
        let decoded: Result<(Xor8, usize), _> = bincode::serde::decode_from_slice(&bytes, config);
        assert!(decoded.is_err());

        let bytes = bincode::serde::encode_to_vec((3u64, 0u32, ByteBuf::new()), config).unwrap();
        let decoded: Result<(Xor8, usize), _> = bincode::serde::decode_from_slice(&bytes, config);
        assert!(decoded.is_err());
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_bincode_rejects_malformed_triple() {
        let config = bincode::config::standard();

        let bytes = bincode::encode_to_vec((3u64, 100u32, vec![0u8; 30]), config).unwrap();
        let decoded: Result<(Xor8, usize), _> = bincode::decode_from_slice(&bytes, config);
        assert!(decoded.is_err());

        let bytes = bincode::encode_to_vec((3u64, 0u32, Vec::<u8>::new()), config).unwrap();
        let decoded: Result<(Xor8, usize), _> = bincode::decode_from_slice(&bytes, config);
        assert!(decoded.is_err());
    }
}
