//! Error type shared by the codec, the transport, and the text format.

use std::io;

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Errors produced while encoding or decoding alignment records.
///
/// All errors are fatal for the record in question.
/// A corrupt record is reported to the caller instead of being skipped.
#[derive(Debug, Error)]
pub enum GirafError {
    /// An annotation uses a type byte outside `AcCsSiIfZHB`.
    #[error("Unknown annotation type: {}", *.0 as char)]
    UnknownAnnotationType(u8),

    /// The buffer ends before the record or one of its fields does.
    #[error("Truncated record: needed {needed} bytes, found {available}")]
    TruncatedRecord { needed: usize, available: usize },

    /// The path refers to a node that is not in the reference graph.
    #[error("Unknown node: {0}")]
    UnknownNode(u32),

    /// The read name does not fit in the 1-byte length field.
    #[error("Read name too long: {0} bytes (maximum 255)")]
    NameTooLong(usize),

    /// Access past the end of a packed sequence.
    #[error("Index {index} out of range for a sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A 3-bit base code outside `0..5`, or stray bits in a packed word.
    #[error("Invalid base code: {0}")]
    InvalidBase(u64),

    /// A CIGAR operation code outside the supported table.
    #[error("Invalid CIGAR operation: {0}")]
    InvalidCigarOp(u8),

    /// A count does not fit in the width of its field.
    #[error("Too many {field}: {len} (maximum {max})")]
    FieldOverflow { field: &'static str, len: usize, max: usize },

    /// The record violates an invariant of the format.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// An annotation value cannot be represented with its type.
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// A text record cannot be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error from the underlying stream.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, GirafError>;

impl GirafError {
    /// Returns a [`GirafError::TruncatedRecord`] for the given byte counts.
    pub fn truncated(needed: usize, available: usize) -> Self {
        GirafError::TruncatedRecord { needed, available }
    }
}

//-----------------------------------------------------------------------------
