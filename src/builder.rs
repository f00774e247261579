//! Construction of [`Xor8`] filters by hypergraph peeling.
//!
//! See Algorithms 3 and 4 in [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters].
//!
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters]: https://arxiv.org/abs/1912.08258

use crate::{
    error::Error,
    hash::{fingerprint, slot, splitmix64, Slots},
    scratch::{KeyIndex, KeyIndexViews, Scratch, XorSet},
    Xor8,
};
use alloc::vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Attempts made before [`Error::TooManyIterations`] when none is configured.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Initial state of a builder's seed generator when none is configured.
pub const DEFAULT_RANDOM_SEED: u64 = 1;

/// The blocks a key must be removed from once it is peeled from block `b`.
const OTHER_BLOCKS: [[usize; 2]; 3] = [[1, 2], [0, 2], [0, 1]];

/// Tunables of a [`Builder`].
///
/// Zero values select the defaults, so a partially filled config (for instance one deserialized
/// with missing fields) is always usable.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderConfig {
    /// How many seeds to try before giving up. Lower values are useful when there is another
    /// filter to fall back on.
    pub max_iterations: usize,
    /// State of the seed generator. Builders with equal state produce identical filters from
    /// identical keys.
    pub random_seed: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            random_seed: DEFAULT_RANDOM_SEED,
        }
    }
}

/// Builds [`Xor8`] filters, keeping its working memory between builds.
///
/// Building many filters from one `Builder` avoids reallocating the peeling buffers each time;
/// the filters produced are the same as those of fresh builders in the same generator state.
/// Each build advances the seed generator, so consecutive filters get unrelated seeds.
///
/// `populate` takes `&mut self`: a builder serves one build at a time. Give each thread its own
/// builder to construct filters in parallel.
///
/// ```
/// use xor8::{Builder, Filter};
///
/// let mut builder = Builder::new().max_iterations(10);
/// for batch in [[1u64, 2, 3], [4, 5, 6]] {
///     let filter = builder.populate(&batch).unwrap();
///     assert!(batch.iter().all(|key| filter.contains(key)));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    max_iterations: usize,
    rng: u64,
    scratch: Scratch,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of slots per block for `size` keys: 1.23 slots per key plus 32, split evenly.
///
/// Fails with [`Error::TooManyKeys`] when a block would outgrow `u32`, i.e. past roughly
/// 10.4 billion keys.
pub fn block_length_for(size: usize) -> Result<u32, Error> {
    let capacity = (libm::ceil(1.23 * size as f64) as usize).saturating_add(32);
    let capacity = capacity / 3 * 3; // round down to a multiple of 3
    u32::try_from(capacity / 3).map_err(|_| Error::TooManyKeys { keys: size })
}

impl Builder {
    /// A builder with [`BuilderConfig::default`].
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    /// A builder with the given retry budget and generator state.
    pub fn with_config(config: BuilderConfig) -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            rng: DEFAULT_RANDOM_SEED,
            scratch: Scratch::new(),
        }
        .max_iterations(config.max_iterations)
        .random_seed(config.random_seed)
    }

    /// Sets the retry budget. `0` restores [`DEFAULT_MAX_ITERATIONS`].
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = if max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            max_iterations
        };
        self
    }

    /// Resets the seed generator. `0` is not a valid state and is replaced by
    /// [`DEFAULT_RANDOM_SEED`].
    pub fn random_seed(mut self, random_seed: u64) -> Self {
        self.rng = if random_seed == 0 {
            DEFAULT_RANDOM_SEED
        } else {
            random_seed
        };
        self
    }

    /// Current configuration. `random_seed` is the generator's present state, so a builder made
    /// from this config continues the same seed sequence.
    pub fn config(&self) -> BuilderConfig {
        BuilderConfig {
            max_iterations: self.max_iterations,
            random_seed: self.rng,
        }
    }

    /// Bytes held by the builder's working buffers.
    pub fn footprint(&self) -> usize {
        self.scratch.footprint()
    }

    /// Builds a filter from a set of distinct keys.
    ///
    /// The caller must make sure the keys are distinct. Duplicates make construction fail with
    /// [`Error::TooManyIterations`]. Key sets too large for `u32` block lengths fail with
    /// [`Error::TooManyKeys`] before any memory is reserved.
    pub fn populate(&mut self, keys: &[u64]) -> Result<Xor8, Error> {
        self.populate_iter(keys.iter().copied())
    }

    /// Builds a filter from a key iterator. Can be used directly if you don't have a contiguous
    /// array of u64 keys.
    ///
    /// Note: the iterator is walked once per construction attempt. If the keys come out of an
    /// expensive mapping, collecting them first may be cheaper.
    pub fn populate_iter<T>(&mut self, keys: T) -> Result<Xor8, Error>
    where
        T: ExactSizeIterator<Item = u64> + Clone,
    {
        let size = keys.len();
        let block_length = block_length_for(size)?;
        let max_iterations = self.max_iterations;
        if self.rng == 0 {
            self.rng = DEFAULT_RANDOM_SEED;
        }

        let (
            KeyIndexViews {
                stack,
                queues: mut queues,
            },
            mut sets,
        ) = self.scratch.split(size, block_length as usize);

        let mut seed = splitmix64(&mut self.rng);
        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > max_iterations {
                tracing::warn!(
                    keys = size,
                    iterations = max_iterations,
                    "xor filter construction ran out of seeds"
                );
                return Err(Error::TooManyIterations {
                    iterations: max_iterations,
                });
            }

            let peeled = peel(
                keys.clone(),
                block_length,
                seed,
                &mut sets,
                &mut queues,
                stack,
            );
            tracing::trace!(attempt = iterations, seed, peeled, keys = size);
            if peeled == size {
                break;
            }

            // A cycle is left in the hypergraph; reset and try again.
            for block in sets.iter_mut() {
                block.fill(XorSet::default());
            }
            seed = splitmix64(&mut self.rng);
            tracing::debug!(attempt = iterations, peeled, keys = size, "reseeding");
        }
        tracing::debug!(
            keys = size,
            block_length,
            attempts = iterations,
            "built xor filter"
        );

        let mut fingerprints = vec![0u8; 3 * block_length as usize].into_boxed_slice();
        assign(stack, block_length, &mut fingerprints);

        Ok(Xor8 {
            seed,
            block_length,
            fingerprints,
        })
    }
}

/// Enqueues slot `idx` of a block if exactly one key is left in it.
#[allow(non_snake_case)]
#[inline]
fn try_enqueue(H_block: &[XorSet], idx: usize, Q_block: &mut [KeyIndex], qblock_size: &mut usize) {
    if H_block[idx].count == 1 {
        // With a single key left, the mask is that key's digest.
        Q_block[*qblock_size] = KeyIndex {
            hash: H_block[idx].mask,
            index: idx,
        };
        *qblock_size += 1;
    }
}

/// One peeling attempt under `seed`. Records peeled keys on `stack` in peeling order and returns
/// how many were peeled; the attempt succeeded if that is every key.
///
/// `sets` must be zeroed on entry.
fn peel<T>(
    keys: T,
    block_length: u32,
    seed: u64,
    sets: &mut [&mut [XorSet]; 3],
    queues: &mut [&mut [KeyIndex]; 3],
    stack: &mut [KeyIndex],
) -> usize
where
    T: Iterator<Item = u64>,
{
    // Add each key to its set in every block.
    for key in keys {
        let Slots { hash, hset } = Slots::from_key(key, block_length, seed);
        for b in 0..3 {
            let set = &mut sets[b][hset[b]];
            set.mask ^= hash;
            set.count += 1;
        }
    }

    // Sets holding a single key seed the queues.
    let mut q_sizes = [0usize; 3];
    for b in 0..3 {
        for idx in 0..block_length as usize {
            try_enqueue(&sets[b], idx, &mut queues[b], &mut q_sizes[b]);
        }
    }

    let mut stack_size = 0;
    while q_sizes.iter().any(|&n| n > 0) {
        for b in 0..3 {
            while q_sizes[b] > 0 {
                q_sizes[b] -= 1;
                let mut ki = queues[b][q_sizes[b]];
                // Emptied since it was queued: its key went out through another block.
                if sets[b][ki.index].count == 0 {
                    continue;
                }

                ki.index += b * block_length as usize;
                stack[stack_size] = ki;
                stack_size += 1;

                // Remove the key from its other two sets and queue those left with one key.
                for j in OTHER_BLOCKS[b] {
                    let idx = slot(j, ki.hash, block_length);
                    let set = &mut sets[j][idx];
                    set.mask ^= ki.hash;
                    set.count -= 1;
                    try_enqueue(&sets[j], idx, &mut queues[j], &mut q_sizes[j]);
                }
            }
        }
    }
    stack_size
}

/// Fills in fingerprints so that every key on `stack` satisfies
/// `B[h0] ^ B[h1] ^ B[h2] == fingerprint(hash)`.
///
/// Keys are resolved in reverse peeling order; when a key's own slot is written, its other two
/// slots already hold their final values.
fn assign(stack: &[KeyIndex], block_length: u32, fingerprints: &mut [u8]) {
    for ki in stack.iter().rev() {
        let mut fp = fingerprint(ki.hash);
        for idx in Slots::from_hash(ki.hash, block_length).global(block_length) {
            if idx != ki.index {
                fp ^= fingerprints[idx];
            }
        }
        fingerprints[ki.index] = fp;
    }
}
