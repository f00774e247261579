//! Reusable working memory for filter construction.

use alloc::vec::Vec;

/// The digest of a key and the index of the slot it was peeled from.
///
/// In a pending queue `index` is relative to the queue's block; on the construction stack it is
/// global, i.e. already offset by the block's position in the fingerprint array.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyIndex {
    pub hash: u64,
    pub index: usize,
}

/// A slot accumulator. Keys mapped to the slot are folded into `mask` by xor.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct XorSet {
    pub mask: u64,
    pub count: u32,
}

/// Construction stack and one pending queue per block, carved from one buffer.
pub struct KeyIndexViews<'a> {
    pub stack: &'a mut [KeyIndex],
    pub queues: [&'a mut [KeyIndex]; 3],
}

/// Buffers kept by a [`Builder`](crate::Builder) between builds.
///
/// Buffers only grow. Every request hands back zeroed memory, so a build behaves the same
/// whether its buffers are fresh or recycled.
#[derive(Default, Debug, Clone)]
pub struct Scratch {
    key_indexes: Vec<KeyIndex>,
    sets: Vec<XorSet>,
}

/// Zeroes the first `len` entries of `store`, growing it first if needed.
fn ensure<T: Default + Copy>(store: &mut Vec<T>, len: usize) -> &mut [T] {
    if store.len() < len {
        store.clear();
        store.resize(len, T::default());
    } else {
        store[..len].fill(T::default());
    }
    &mut store[..len]
}

fn carve_key_indexes(
    store: &mut Vec<KeyIndex>,
    size: usize,
    block_length: usize,
) -> KeyIndexViews<'_> {
    let store = ensure(store, size + 3 * block_length);
    let (stack, rest) = store.split_at_mut(size);
    let (q0, rest) = rest.split_at_mut(block_length);
    let (q1, q2) = rest.split_at_mut(block_length);
    KeyIndexViews {
        stack,
        queues: [q0, q1, q2],
    }
}

fn carve_sets(store: &mut Vec<XorSet>, block_length: usize) -> [&mut [XorSet]; 3] {
    let store = ensure(store, 3 * block_length);
    let (s0, rest) = store.split_at_mut(block_length);
    let (s1, s2) = rest.split_at_mut(block_length);
    [s0, s1, s2]
}

impl Scratch {
    pub const fn new() -> Self {
        Self {
            key_indexes: Vec::new(),
            sets: Vec::new(),
        }
    }

    /// Working sets of one build: a stack of `size` entries and three queues of `block_length`
    /// entries, plus one accumulator block of `block_length` sets per filter block.
    pub fn split(
        &mut self,
        size: usize,
        block_length: usize,
    ) -> (KeyIndexViews<'_>, [&mut [XorSet]; 3]) {
        (
            carve_key_indexes(&mut self.key_indexes, size, block_length),
            carve_sets(&mut self.sets, block_length),
        )
    }

    /// Bytes currently held by the arena.
    pub fn footprint(&self) -> usize {
        self.key_indexes.capacity() * core::mem::size_of::<KeyIndex>()
            + self.sets.capacity() * core::mem::size_of::<XorSet>()
    }
}
