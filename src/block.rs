// src/block.rs
use crate::layout::BlockId;

/// The whole virtual disk: `num_blocks` blocks of `block_size` bytes, held in memory.
///
/// Metadata regions are only written here by the persistence layer, right
/// before the store is dumped to the backing file.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockStore {
    block_size: usize,
    bytes: Vec<u8>,
}

impl BlockStore {
    pub fn new(block_size: usize, num_blocks: u32) -> Self {
        Self {
            block_size,
            bytes: vec![0u8; block_size * num_blocks as usize],
        }
    }

    /// Wraps a raw image. `bytes.len()` must be a multiple of `block_size`.
    pub fn from_bytes(block_size: usize, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len() % block_size, 0);
        Self { block_size, bytes }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_blocks(&self) -> usize {
        self.bytes.len() / self.block_size
    }

    pub fn block(&self, id: BlockId) -> &[u8] {
        let start = id as usize * self.block_size;
        &self.bytes[start..start + self.block_size]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut [u8] {
        let start = id as usize * self.block_size;
        &mut self.bytes[start..start + self.block_size]
    }

    /// Contiguous run of `count` blocks starting at `first`.
    pub fn region(&self, first: u32, count: u32) -> &[u8] {
        let start = first as usize * self.block_size;
        &self.bytes[start..start + count as usize * self.block_size]
    }

    pub fn region_mut(&mut self, first: u32, count: u32) -> &mut [u8] {
        let start = first as usize * self.block_size;
        &mut self.bytes[start..start + count as usize * self.block_size]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("block_size", &self.block_size)
            .field("num_blocks", &self.num_blocks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::BlockStore;

    #[test]
    fn blocks_do_not_overlap() {
        let mut store = BlockStore::new(8, 4);
        store.block_mut(1).fill(0xAA);
        store.block_mut(2)[0] = 1;
        assert_eq!(store.block(0), &[0u8; 8]);
        assert_eq!(store.block(1), &[0xAA; 8]);
        assert_eq!(store.region(1, 2).len(), 16);
        assert_eq!(store.region(2, 1)[0], 1);
        assert_eq!(store.num_blocks(), 4);
    }
}
