//! Hash mixing shared by construction and lookup.
//!
//! Everything here is a pure function of a key and a seed. A filter's seed fixes the digest of
//! every key, and the digest alone fixes the key's three slots and its fingerprint.

/// [`MurmurHash3`]'s 64-bit finalizer. Flipping one input bit flips about half of the output
/// bits ([avalanche]).
///
/// [`MurmurHash3`]: https://github.com/aappleby/smhasher/blob/master/src/MurmurHash3.cpp
/// [avalanche]: https://en.wikipedia.org/wiki/Avalanche_effect
#[inline]
pub const fn mix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Digest of `key` under `seed`.
#[inline]
pub const fn mix(key: u64, seed: u64) -> u64 {
    mix64(key.wrapping_add(seed))
}

/// Advances `state` and returns the next output of Sebastiano Vigna's [`SplitMix64`] generator.
///
/// Builders keep `state` across attempts and across filters, so every retry sees a fresh seed.
///
/// [`SplitMix64`]: http://xoroshiro.di.unimi.it/splitmix64.c
#[inline]
pub fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// [A fast alternative to the modulo reduction](http://lemire.me/blog/2016/06/27/a-fast-alternative-to-the-modulo-reduction/)
#[inline]
pub const fn reduce(hash: u32, n: u32) -> u32 {
    ((hash as u64 * n as u64) >> 32) as u32
}

/// Slot of `hash` inside block `block` (0, 1 or 2), relative to the start of that block.
#[inline]
pub const fn slot(block: usize, hash: u64, block_length: u32) -> usize {
    // 0, 21 and 42 bits: one digest feeds three roughly independent reductions.
    let rotated = hash.rotate_left(block as u32 * 21) as u32;
    reduce(rotated, block_length) as usize
}

/// Folds a digest down to its 8-bit fingerprint.
#[inline]
pub const fn fingerprint(hash: u64) -> u8 {
    (hash ^ (hash >> 32)) as u8
}

/// A key's digest together with its slot in each of the three blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slots {
    /// Key digest
    pub hash: u64,
    /// Block-relative slots h_0, h_1, h_2 derived from `hash`.
    pub hset: [usize; 3],
}

impl Slots {
    #[inline]
    pub const fn from_hash(hash: u64, block_length: u32) -> Self {
        Self {
            hash,
            hset: [
                slot(0, hash, block_length),
                slot(1, hash, block_length),
                slot(2, hash, block_length),
            ],
        }
    }

    #[inline]
    pub const fn from_key(key: u64, block_length: u32, seed: u64) -> Self {
        Self::from_hash(mix(key, seed), block_length)
    }

    /// Slots as indexes into the concatenated fingerprint array.
    #[inline]
    pub const fn global(&self, block_length: u32) -> [usize; 3] {
        let bl = block_length as usize;
        [self.hset[0], self.hset[1] + bl, self.hset[2] + 2 * bl]
    }
}
