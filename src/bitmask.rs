//! Fixed-width bit array backing every kernel capability/state mask the hub keeps.
//!
//! Grounded on the bit-storage approach in the reference crate's `attribute_set.rs` (there built
//! directly atop `bitvec`); here it's pulled out as its own untyped component per the spec, with
//! [`crate::attribute_set::AttributeSet`] layered on top for typed access.

use crate::error::{Error, Result};
use bitvec::prelude::*;

/// A fixed-width array of bits, stored as 32-bit words, loaded once from a kernel ioctl buffer.
///
/// `width` is fixed at construction; no allocation happens afterwards.
#[derive(Clone, Debug)]
pub struct BitMask {
    bits: BitVec<u32, Lsb0>,
    width: usize,
}

impl BitMask {
    /// Creates an all-zero mask able to hold `width` bits.
    pub fn new(width: usize) -> Self {
        BitMask {
            bits: BitVec::repeat(false, width),
            width,
        }
    }

    /// Number of addressable bits.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns `false` when `i >= width()`, otherwise the bit's value.
    #[inline]
    pub fn test(&self, i: usize) -> bool {
        self.bits.get(i).map_or(false, |b| *b)
    }

    /// Sets bit `i`. A no-op if `i >= width()`.
    pub fn set(&mut self, i: usize, value: bool) {
        if let Some(mut bit) = self.bits.get_mut(i) {
            *bit = value;
        }
    }

    /// `true` iff any bit in the half-open range `[lo, hi)` is set.
    ///
    /// Returns `InvalidArgument` (and leaves the mask untouched) when `lo >= hi` or `hi > width`.
    pub fn any(&self, lo: usize, hi: usize) -> Result<bool> {
        if lo >= hi || hi > self.width {
            return Err(Error::InvalidArgument(format!(
                "bad range [{lo}, {hi}) for mask of width {}",
                self.width
            )));
        }
        Ok(self.bits[lo..hi].any())
    }

    /// Overwrites the mask's storage with raw `EVIOCGBIT`-style word output (native-endian
    /// `u32`s, low bit of word 0 corresponding to index 0). Extra words beyond `width` are
    /// ignored; a short buffer leaves the remaining bits zero.
    pub fn load_from_buffer(&mut self, words: &[u32]) {
        self.bits.fill(false);
        let bits_from_words = BitSlice::<u32, Lsb0>::from_slice(words);
        let n = bits_from_words.len().min(self.width);
        self.bits[..n].copy_from_bitslice(&bits_from_words[..n]);
    }

    /// Overwrites the mask's storage from a raw byte buffer, as returned by the `u8`-typed
    /// `EVIOCG*` ioctls (`EVIOCGKEY`, `EVIOCGSW`, `EVIOCGLED`, ...).
    pub fn load_from_bytes(&mut self, bytes: &[u8]) {
        self.bits.fill(false);
        let bits_from_bytes = BitSlice::<u8, Lsb0>::from_slice(bytes);
        let n = bits_from_bytes.len().min(self.width);
        for i in 0..n {
            self.bits.set(i, bits_from_bytes[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_mask_is_all_zero() {
        let mask = BitMask::new(40);
        assert!((0..40).all(|i| !mask.test(i)));
        assert_eq!(mask.any(0, 40).unwrap(), false);
    }

    #[test]
    fn test_is_false_past_width() {
        let mask = BitMask::new(8);
        assert!(!mask.test(100));
    }

    #[test]
    fn any_matches_existential_over_range() {
        let mut mask = BitMask::new(64);
        mask.set(40, true);
        assert!(!mask.any(0, 40).unwrap());
        assert!(mask.any(0, 41).unwrap());
        assert!(mask.any(40, 41).unwrap());
        assert!(!mask.any(41, 64).unwrap());
    }

    #[test]
    fn any_rejects_bad_ranges() {
        let mask = BitMask::new(32);
        assert!(mask.any(5, 5).is_err());
        assert!(mask.any(10, 5).is_err());
        assert!(mask.any(0, 33).is_err());
    }

    #[test]
    fn load_from_buffer_round_trips_word_layout() {
        let mut mask = BitMask::new(40);
        // bit 0 and bit 33 set
        mask.load_from_buffer(&[0x0000_0001, 0x0000_0002]);
        assert!(mask.test(0));
        assert!(mask.test(33));
        assert!(!mask.test(1));
        assert!(!mask.test(32));
    }

    #[test]
    fn load_from_buffer_truncates_extra_words() {
        let mut mask = BitMask::new(8);
        mask.load_from_buffer(&[0xff, 0xffff_ffff]);
        assert!((0..8).all(|i| mask.test(i)));
        assert_eq!(mask.width(), 8);
    }
}
