//! Fixed-length occupancy bitmap for pool partitions.
//!
//! One bit per slot, packed into `u64` words; a set bit means the slot is in
//! use. [`first_clear`](OccupancyBitmap::first_clear) scans left to right and
//! skips full words with a single comparison.
//!
//! ```text
//!   len = 70
//!   words[0]: bits 0..64   ──► 0xFFFF_FFFF_FFFF_FFFF (full, skipped)
//!   words[1]: bits 64..70  ──► 0b00_1011             (bit 66 is first clear)
//!             bits 70..128 are padding and always stay clear
//! ```

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyBitmap {
    words: Vec<u64>,
    len: usize,
}

impl OccupancyBitmap {
    /// Creates a bitmap of `len` clear bits.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the bit at `idx`; out-of-range indices read as clear.
    pub fn get(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        self.words[idx / WORD_BITS] & (1 << (idx % WORD_BITS)) != 0
    }

    /// Sets the bit at `idx`, returning its previous value.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= len`.
    pub fn set(&mut self, idx: usize) -> bool {
        assert!(idx < self.len, "bit index {idx} out of range {}", self.len);
        let word = &mut self.words[idx / WORD_BITS];
        let mask = 1 << (idx % WORD_BITS);
        let prev = *word & mask != 0;
        *word |= mask;
        prev
    }

    /// Clears the bit at `idx`, returning its previous value.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= len`.
    pub fn clear(&mut self, idx: usize) -> bool {
        assert!(idx < self.len, "bit index {idx} out of range {}", self.len);
        let word = &mut self.words[idx / WORD_BITS];
        let mask = 1 << (idx % WORD_BITS);
        let prev = *word & mask != 0;
        *word &= !mask;
        prev
    }

    /// Index of the lowest clear bit, if any.
    pub fn first_clear(&self) -> Option<usize> {
        for (word_idx, &word) in self.words.iter().enumerate() {
            if word == u64::MAX {
                continue;
            }
            let idx = word_idx * WORD_BITS + word.trailing_ones() as usize;
            // padding bits in the last word are clear but not addressable
            return (idx < self.len).then_some(idx);
        }
        None
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_full(&self) -> bool {
        self.count_ones() == self.len
    }

    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Expands the bitmap into one `bool` per slot.
    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|idx| self.get(idx)).collect()
    }
}
