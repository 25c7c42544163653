//! Bases and the 3-bit packed base container.
//!
//! A [`PackedBases`] object stores a sequence of [`Base`] values using 3 bits per base.
//! Each 64-bit word holds 21 bases in its low 63 bits, so a base never crosses a word boundary.
//! The top bit of every word, as well as all bits past the last base, are always zero.
//!
//! # Examples
//!
//! ```
//! use giraf::bases::{self, Base, PackedBases};
//!
//! let seq = bases::bases_from_ascii(b"GATTACA");
//! let packed = PackedBases::from_bases(&seq);
//! assert_eq!(packed.len(), 7);
//! assert_eq!(packed.words().len(), 1);
//! assert_eq!(packed.get(1).unwrap(), Base::A);
//! assert_eq!(packed.to_bases(), seq);
//! ```

use crate::{GirafError, Result};

use std::fmt::Display;
use std::ops::Range;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A nucleotide with a 3-bit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Base {
    A = 0,
    C = 1,
    G = 2,
    T = 3,
    N = 4,
}

impl Base {
    /// Number of bits used for a base.
    pub const BITS: usize = 3;

    /// Number of distinct bases.
    pub const SIGMA: usize = 5;

    const MASK: u64 = 0b111;

    const DECODE: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

    /// Returns the 3-bit code of the base.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns the base with the given code, or [`GirafError::InvalidBase`] for codes `5..8`.
    #[inline]
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Base::A),
            1 => Ok(Base::C),
            2 => Ok(Base::G),
            3 => Ok(Base::T),
            4 => Ok(Base::N),
            _ => Err(GirafError::InvalidBase(code as u64)),
        }
    }

    /// Converts a character to a base.
    ///
    /// Characters outside `acgtACGT` become [`Base::N`].
    #[inline]
    pub fn from_ascii(c: u8) -> Self {
        match c {
            b'A' | b'a' => Base::A,
            b'C' | b'c' => Base::C,
            b'G' | b'g' => Base::G,
            b'T' | b't' => Base::T,
            _ => Base::N,
        }
    }

    /// Returns the base as an upper case character.
    #[inline]
    pub fn to_ascii(self) -> u8 {
        Self::DECODE[self as usize]
    }

    /// Returns the complementary base. `N` is its own complement.
    pub fn complement(self) -> Self {
        match self {
            Base::A => Base::T,
            Base::C => Base::G,
            Base::G => Base::C,
            Base::T => Base::A,
            Base::N => Base::N,
        }
    }
}

impl Display for Base {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_ascii() as char)
    }
}

/// Converts a DNA string to bases.
pub fn bases_from_ascii(sequence: &[u8]) -> Vec<Base> {
    sequence.iter().map(|&c| Base::from_ascii(c)).collect()
}

/// Converts bases to an upper case DNA string.
pub fn bases_to_ascii(sequence: &[Base]) -> Vec<u8> {
    sequence.iter().map(|base| base.to_ascii()).collect()
}

//-----------------------------------------------------------------------------

/// A sequence of bases packed at 3 bits per base into 64-bit words.
///
/// The length is stored explicitly, as the last word may be partially filled.
/// The number of words is always `len.div_ceil(21)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedBases {
    words: Vec<u64>,
    len: usize,
}

impl PackedBases {
    /// Number of bases stored in a single word.
    pub const BASES_PER_WORD: usize = 64 / Base::BITS;

    /// Returns the number of words needed for `len` bases.
    #[inline]
    pub fn words_for(len: usize) -> usize {
        len.div_ceil(Self::BASES_PER_WORD)
    }

    #[inline]
    fn split(index: usize) -> (usize, usize) {
        (index / Self::BASES_PER_WORD, (index % Self::BASES_PER_WORD) * Base::BITS)
    }

    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sequence with space for `capacity` bases.
    pub fn with_capacity(capacity: usize) -> Self {
        PackedBases {
            words: Vec::with_capacity(Self::words_for(capacity)),
            len: 0,
        }
    }

    /// Builds a packed sequence from the given bases.
    pub fn from_bases(bases: &[Base]) -> Self {
        let mut result = Self::with_capacity(bases.len());
        for &base in bases {
            result.append(base);
        }
        result
    }

    /// Builds a packed sequence from raw words, as read from a file.
    ///
    /// Returns an error if the number of words does not match the length, if a base code is invalid, or if any unused bit is set.
    pub fn from_words(words: Vec<u64>, len: usize) -> Result<Self> {
        if words.len() != Self::words_for(len) {
            return Err(GirafError::InvalidRecord(format!(
                "{} words for {} packed bases; expected {}", words.len(), len, Self::words_for(len)
            )));
        }
        for (i, &word) in words.iter().enumerate() {
            let in_word = (len - i * Self::BASES_PER_WORD).min(Self::BASES_PER_WORD);
            let used_bits = in_word * Base::BITS;
            if used_bits < 64 && word >> used_bits != 0 {
                return Err(GirafError::InvalidBase(word >> used_bits));
            }
            for j in 0..in_word {
                let code = (word >> (j * Base::BITS)) & Base::MASK;
                Base::from_code(code as u8)?;
            }
        }
        Ok(PackedBases { words, len })
    }

    /// Returns the number of bases.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the sequence is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the packed words.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Appends a base to the end of the sequence.
    pub fn append(&mut self, base: Base) {
        let (word, shift) = Self::split(self.len);
        if word == self.words.len() {
            self.words.push(0);
        }
        self.words[word] |= (base.code() as u64) << shift;
        self.len += 1;
    }

    /// Appends all bases from another packed sequence.
    pub fn extend(&mut self, other: &PackedBases) {
        if self.len % Self::BASES_PER_WORD == 0 {
            // Word-aligned: the words can be copied directly.
            self.words.extend_from_slice(&other.words);
            self.len += other.len;
            return;
        }
        self.words.reserve(Self::words_for(self.len + other.len) - self.words.len());
        for base in other.iter() {
            self.append(base);
        }
    }

    /// Returns the base at the given index.
    ///
    /// Returns [`GirafError::IndexOutOfRange`] if `index >= self.len()`.
    pub fn get(&self, index: usize) -> Result<Base> {
        if index >= self.len {
            return Err(GirafError::IndexOutOfRange { index, len: self.len });
        }
        Ok(self.get_unchecked(index))
    }

    // The words have been validated on construction, so every code below `len` is valid.
    #[inline]
    fn get_unchecked(&self, index: usize) -> Base {
        let (word, shift) = Self::split(index);
        let code = (self.words[word] >> shift) & Base::MASK;
        match code {
            0 => Base::A,
            1 => Base::C,
            2 => Base::G,
            3 => Base::T,
            _ => Base::N,
        }
    }

    /// Returns the bases in the given range.
    ///
    /// Returns [`GirafError::IndexOutOfRange`] if the range extends past the end.
    pub fn slice(&self, range: Range<usize>) -> Result<Vec<Base>> {
        if range.end > self.len {
            return Err(GirafError::IndexOutOfRange { index: range.end - 1, len: self.len });
        }
        Ok(range.map(|i| self.get_unchecked(i)).collect())
    }

    /// Returns an iterator over the bases.
    pub fn iter(&self) -> impl Iterator<Item = Base> + '_ {
        (0..self.len).map(|i| self.get_unchecked(i))
    }

    /// Unpacks the sequence.
    pub fn to_bases(&self) -> Vec<Base> {
        let mut result = Vec::with_capacity(self.len);
        result.extend(self.iter());
        result
    }
}

impl From<&[Base]> for PackedBases {
    fn from(bases: &[Base]) -> Self {
        Self::from_bases(bases)
    }
}

impl FromIterator<Base> for PackedBases {
    fn from_iter<I: IntoIterator<Item = Base>>(iter: I) -> Self {
        let mut result = PackedBases::new();
        for base in iter {
            result.append(base);
        }
        result
    }
}

//-----------------------------------------------------------------------------
