//! CIGAR operations.
//!
//! A CIGAR is stored as a sequence of [`RunLengthOp`] values over [`CigarCode`].
//! The operations use the BAM numbering on the wire and the usual symbols `MIDNSHP=X` in text.
//!
//! # Examples
//!
//! ```
//! use giraf::cigar::{self, CigarCode};
//!
//! let ops = cigar::parse_cigar(b"1S4=2I1X3=").unwrap();
//! assert_eq!(ops.len(), 5);
//! assert_eq!(ops[0].value, CigarCode::SoftClip);
//! assert_eq!(cigar::query_len(&ops), 11);
//! assert_eq!(cigar::reference_len(&ops), 8);
//! assert_eq!(cigar::format_cigar(&ops), "1S4=2I1X3=");
//! ```

use crate::rle::{self, RunLengthOp};
use crate::{GirafError, Result};

use std::fmt::Display;
use std::str;

//-----------------------------------------------------------------------------

/// A CIGAR operation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CigarCode {
    /// `M`: alignment match; the base is copied from the reference.
    Match,
    /// `I`: insertion to the reference.
    Insertion,
    /// `D`: deletion from the reference.
    Deletion,
    /// `N`: skipped region of the reference.
    Skip,
    /// `S`: soft clip; the bases are present in the read.
    SoftClip,
    /// `H`: hard clip; the bases are not present in the read.
    HardClip,
    /// `P`: padding.
    Padding,
    /// `=`: sequence match.
    Equal,
    /// `X`: sequence mismatch.
    Mismatch,
}

impl CigarCode {
    const SYMBOLS: &'static [u8; 9] = b"MIDNSHP=X";

    const CODES: [CigarCode; 9] = [
        CigarCode::Match, CigarCode::Insertion, CigarCode::Deletion,
        CigarCode::Skip, CigarCode::SoftClip, CigarCode::HardClip,
        CigarCode::Padding, CigarCode::Equal, CigarCode::Mismatch,
    ];

    /// Returns the 1-byte code used in the binary format.
    pub fn to_wire(self) -> u8 {
        match self {
            CigarCode::Match => 0,
            CigarCode::Insertion => 1,
            CigarCode::Deletion => 2,
            CigarCode::Skip => 3,
            CigarCode::SoftClip => 4,
            CigarCode::HardClip => 5,
            CigarCode::Padding => 6,
            CigarCode::Equal => 7,
            CigarCode::Mismatch => 8,
        }
    }

    /// Returns the operation for a 1-byte code from the binary format.
    pub fn from_wire(code: u8) -> Result<Self> {
        Self::CODES.get(code as usize).copied().ok_or(GirafError::InvalidCigarOp(code))
    }

    /// Returns the text symbol of the operation.
    pub fn symbol(self) -> u8 {
        Self::SYMBOLS[self.to_wire() as usize]
    }

    /// Returns the operation for a text symbol.
    pub fn from_symbol(symbol: u8) -> Option<Self> {
        let code = Self::SYMBOLS.iter().position(|&c| c == symbol)?;
        Some(Self::CODES[code])
    }

    /// Returns `true` if the operation consumes bases from the read.
    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarCode::Match | CigarCode::Insertion | CigarCode::SoftClip | CigarCode::Equal | CigarCode::Mismatch
        )
    }

    /// Returns `true` if the operation consumes bases from the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarCode::Match | CigarCode::Deletion | CigarCode::Skip | CigarCode::Equal | CigarCode::Mismatch
        )
    }

    /// Returns `true` if the read bases covered by the operation cannot be copied from the reference.
    ///
    /// These bases are stored explicitly in the binary format.
    pub fn is_explicit(self) -> bool {
        matches!(self, CigarCode::SoftClip | CigarCode::Mismatch | CigarCode::Insertion)
    }
}

impl Display for CigarCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol() as char)
    }
}

//-----------------------------------------------------------------------------

/// A CIGAR as a sequence of runs.
pub type Cigar = Vec<RunLengthOp<CigarCode>>;

/// Parses a CIGAR string.
///
/// An empty string or `*` is an empty CIGAR.
/// Adjacent operations of the same type are merged, and operations longer than [`u16::MAX`] are split.
pub fn parse_cigar(cigar: &[u8]) -> Result<Cigar> {
    let mut result = Cigar::new();
    if cigar.is_empty() || cigar == b"*" {
        return Ok(result);
    }

    let mut start = 0;
    while start < cigar.len() {
        let end = cigar[start..].iter().position(|c| !c.is_ascii_digit()).map(|x| start + x).ok_or(
            GirafError::Parse(format!("CIGAR {} ends with a number", String::from_utf8_lossy(cigar)))
        )?;
        if end == start {
            return Err(GirafError::Parse(format!("Missing operation length in CIGAR {}", String::from_utf8_lossy(cigar))));
        }
        // The slice contains only ASCII digits.
        let len = str::from_utf8(&cigar[start..end]).unwrap_or_default().parse::<usize>().map_err(|err| {
            GirafError::Parse(format!("Invalid CIGAR operation length: {}", err))
        })?;
        let op = CigarCode::from_symbol(cigar[end]).ok_or(
            GirafError::Parse(format!("Invalid CIGAR operation: {}", cigar[end] as char))
        )?;
        rle::push_run(&mut result, len, op);
        start = end + 1;
    }

    Ok(result)
}

/// Formats the CIGAR as a string. An empty CIGAR becomes `*`.
pub fn format_cigar(cigar: &[RunLengthOp<CigarCode>]) -> String {
    if cigar.is_empty() {
        return String::from("*");
    }
    let mut result = String::new();
    for op in cigar {
        result.push_str(&op.len.to_string());
        result.push(op.value.symbol() as char);
    }
    result
}

/// Returns the number of read bases covered by the CIGAR.
pub fn query_len(cigar: &[RunLengthOp<CigarCode>]) -> usize {
    cigar.iter().filter(|op| op.value.consumes_query()).map(|op| op.len as usize).sum()
}

/// Returns the number of reference bases covered by the CIGAR.
pub fn reference_len(cigar: &[RunLengthOp<CigarCode>]) -> usize {
    cigar.iter().filter(|op| op.value.consumes_reference()).map(|op| op.len as usize).sum()
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
