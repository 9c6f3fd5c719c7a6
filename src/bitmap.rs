// src/bitmap.rs
use std::ops::Range;

/// Availability map, one slot per block or inode. `true` = in use.
///
/// On disk the map is bit-packed, least significant bit first, bit set = in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    slots: Vec<bool>,
}

impl Bitmap {
    /// A map with every slot free.
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_free(&self, index: usize) -> bool {
        !self.slots[index]
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.slots[index]
    }

    pub fn mark_used(&mut self, index: usize) {
        self.slots[index] = true;
    }

    pub fn mark_free(&mut self, index: usize) {
        self.slots[index] = false;
    }

    /// Lowest free slot inside `range` (first-fit). Linear in the range length.
    pub fn first_free(&self, range: Range<usize>) -> Option<usize> {
        range.into_iter().find(|&i| !self.slots[i])
    }

    pub fn count_free(&self, range: Range<usize>) -> usize {
        self.slots[range].iter().filter(|used| !**used).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.slots
    }

    /// Packs the map into `out`, which must hold at least `len.div_ceil(8)` bytes.
    pub fn encode_into(&self, out: &mut [u8]) {
        for byte in out.iter_mut() {
            *byte = 0;
        }
        for (idx, used) in self.slots.iter().enumerate() {
            if *used {
                out[idx / 8] |= 1 << (idx % 8);
            }
        }
    }

    pub fn decode(raw: &[u8], len: usize) -> Self {
        let slots = (0..len)
            .map(|idx| raw[idx / 8] & (1 << (idx % 8)) != 0)
            .collect();
        Self { slots }
    }
}
