use blockpatch_common::{PatchError, Result};

/// Number of blocks in one 16x16x16 chunk section.
pub const SECTION_VOLUME: usize = 4096;

/// Index of a block inside a section, `y*256 + z*16 + x`.
pub fn block_index(x: usize, y: usize, z: usize) -> usize {
    (y << 8) | (z << 4) | x
}

/// 4096 fixed-width entries packed into 64-bit words. Entries may straddle
/// two words; the low bits of an entry always live in the lower word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBlockArray {
    bits_per_entry: u8,
    backing: Vec<u64>,
}

impl PackedBlockArray {
    pub const MAX_BITS: u8 = 32;

    /// Creates a zeroed array.
    pub fn new(bits_per_entry: u8) -> Result<Self> {
        Self::check_bits(bits_per_entry)?;
        Ok(Self {
            bits_per_entry,
            backing: vec![0; Self::words_for(bits_per_entry)],
        })
    }

    /// Wraps words read off the wire. The word count must match the width.
    pub fn from_words(bits_per_entry: u8, backing: Vec<u64>) -> Result<Self> {
        Self::check_bits(bits_per_entry)?;
        let expected = Self::words_for(bits_per_entry);
        if backing.len() != expected {
            return Err(PatchError::unsupported(format!(
                "{} words for {} bits per entry, expected {}",
                backing.len(),
                bits_per_entry,
                expected
            )));
        }
        Ok(Self {
            bits_per_entry,
            backing,
        })
    }

    /// Number of 64-bit words needed for `bits_per_entry`.
    pub fn words_for(bits_per_entry: u8) -> usize {
        (SECTION_VOLUME * bits_per_entry as usize + 63) / 64
    }

    fn check_bits(bits_per_entry: u8) -> Result<()> {
        if bits_per_entry == 0 || bits_per_entry > Self::MAX_BITS {
            return Err(PatchError::unsupported(format!(
                "bits per entry {} outside 1..={}",
                bits_per_entry,
                Self::MAX_BITS
            )));
        }
        Ok(())
    }

    pub fn bits_per_entry(&self) -> u8 {
        self.bits_per_entry
    }

    pub fn words(&self) -> &[u64] {
        &self.backing
    }

    pub fn into_words(self) -> Vec<u64> {
        self.backing
    }

    /// Largest value an entry can hold.
    pub fn max_value(&self) -> u32 {
        self.mask() as u32
    }

    fn mask(&self) -> u64 {
        (1u64 << self.bits_per_entry) - 1
    }

    pub fn get(&self, index: usize) -> Result<u32> {
        PatchError::range_check(index, SECTION_VOLUME)?;

        let bits = self.bits_per_entry as usize;
        let pos = index * bits;
        let start_long = pos / 64;
        let end_long = ((index + 1) * bits - 1) / 64;
        let start_offset = pos % 64;

        let value = if start_long == end_long {
            self.backing[start_long] >> start_offset
        } else {
            let low = 64 - start_offset;
            (self.backing[start_long] >> start_offset) | (self.backing[end_long] << low)
        };
        Ok((value & self.mask()) as u32)
    }

    /// Stores `value mod 2^bits` at `index`.
    pub fn set(&mut self, index: usize, value: u32) -> Result<()> {
        PatchError::range_check(index, SECTION_VOLUME)?;

        let bits = self.bits_per_entry as usize;
        let pos = index * bits;
        let start_long = pos / 64;
        let end_long = ((index + 1) * bits - 1) / 64;
        let start_offset = pos % 64;
        self.write_split(start_long, end_long, start_offset as u32, value as u64 & self.mask());
        Ok(())
    }

    fn write_split(&mut self, start_long: usize, end_long: usize, start_offset: u32, value: u64) {
        let mask = self.mask();
        self.backing[start_long] &= !(mask << start_offset);
        self.backing[start_long] |= value << start_offset;

        if start_long != end_long {
            let low = 64 - start_offset;
            self.backing[end_long] &= !(mask >> low);
            self.backing[end_long] |= value >> low;
        }
    }

    /// Replaces every entry equal to `from` with `to`. Returns how many changed.
    pub fn bulk_replace(&mut self, from: u32, to: u32) -> usize {
        let to = (to as u64 & self.mask()) as u32;
        self.remap(|value| if value == from { to } else { value })
    }

    /// Rewrites every entry in one pass over the backing words. Results are
    /// masked to the entry width. Returns how many entries changed.
    pub fn remap<F: FnMut(u32) -> u32>(&mut self, mut f: F) -> usize {
        let mask = self.mask();
        // Infallible closure, so the error arm is unreachable.
        self.try_remap(|value| Ok((f(value) as u64 & mask) as u32))
            .unwrap_or(0)
    }

    /// Like [`remap`](Self::remap), but stops at the first error. Entries
    /// before the failing one have already been rewritten; callers that need
    /// atomicity work on a copy. A result wider than the entry width fails
    /// with `UnsupportedFormat`.
    pub fn try_remap<F: FnMut(u32) -> Result<u32>>(&mut self, mut f: F) -> Result<usize> {
        let bits = self.bits_per_entry as u32;
        let mask = self.mask();
        let mut changed = 0;
        let mut word = 0usize;
        let mut offset = 0u32;

        for _ in 0..SECTION_VOLUME {
            let straddles = offset + bits > 64;
            let value = if straddles {
                ((self.backing[word] >> offset) | (self.backing[word + 1] << (64 - offset))) & mask
            } else {
                (self.backing[word] >> offset) & mask
            };

            let new_value = f(value as u32)? as u64;
            if new_value > mask {
                return Err(PatchError::unsupported(format!(
                    "value {} does not fit in {} bits",
                    new_value, bits
                )));
            }
            if new_value != value {
                let end = if straddles { word + 1 } else { word };
                self.write_split(word, end, offset, new_value);
                changed += 1;
            }

            offset += bits;
            if offset >= 64 {
                offset -= 64;
                word += 1;
            }
        }
        Ok(changed)
    }

    /// Copy of this array at a wider width with every entry preserved.
    pub fn resized(&self, bits_per_entry: u8) -> Result<Self> {
        if bits_per_entry < self.bits_per_entry {
            return Err(PatchError::unsupported(format!(
                "cannot narrow {} bits to {}",
                self.bits_per_entry, bits_per_entry
            )));
        }
        let mut resized = Self::new(bits_per_entry)?;
        for (index, value) in self.iter().enumerate() {
            resized.set(index, value)?;
        }
        Ok(resized)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        // Indices are always in range here.
        (0..SECTION_VOLUME).map(move |index| self.get(index).unwrap_or(0))
    }
}
