//! Run-length encoding with 16-bit run lengths.
//!
//! The same codec is used for CIGAR operations and for base quality values.
//! Logical runs longer than [`u16::MAX`] are split into several consecutive runs with the same value.
//!
//! # Examples
//!
//! ```
//! use giraf::rle::{self, RunLengthOp};
//!
//! let quality = [40, 5, 5, 5, 5, 5, 5, 5, 30, 20, 20, 20, 1];
//! let runs = rle::encode(&quality);
//! assert_eq!(runs, vec![
//!     RunLengthOp::new(1, 40), RunLengthOp::new(7, 5), RunLengthOp::new(1, 30),
//!     RunLengthOp::new(3, 20), RunLengthOp::new(1, 1),
//! ]);
//! assert_eq!(rle::decode(&runs), quality);
//! ```

//-----------------------------------------------------------------------------

/// A run of `len` copies of `value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunLengthOp<T> {
    /// Length of the run.
    pub len: u16,
    /// Value repeated in the run.
    pub value: T,
}

impl<T> RunLengthOp<T> {
    /// Creates a new run.
    pub fn new(len: u16, value: T) -> Self {
        RunLengthOp { len, value }
    }
}

/// Appends a logical run of arbitrary length to the operations.
///
/// The run is merged with the last operation if the values are equal.
/// Long runs are split at [`u16::MAX`].
pub fn push_run<T: Copy + PartialEq>(ops: &mut Vec<RunLengthOp<T>>, len: usize, value: T) {
    let mut remaining = len;
    if let Some(last) = ops.last_mut() {
        if last.value == value {
            let extra = remaining.min((u16::MAX - last.len) as usize);
            last.len += extra as u16;
            remaining -= extra;
        }
    }
    while remaining > 0 {
        let len = remaining.min(u16::MAX as usize);
        ops.push(RunLengthOp::new(len as u16, value));
        remaining -= len;
    }
}

/// Encodes the values as runs.
///
/// Adjacent equal values are merged, and the result never contains adjacent runs with the same value unless a run had to be split.
pub fn encode<T: Copy + PartialEq>(values: &[T]) -> Vec<RunLengthOp<T>> {
    let mut result: Vec<RunLengthOp<T>> = Vec::new();
    let mut iter = values.iter();
    let mut value = match iter.next() {
        Some(value) => *value,
        None => return result,
    };
    let mut len = 1;
    for &next in iter {
        if next == value {
            len += 1;
        } else {
            push_run(&mut result, len, value);
            value = next;
            len = 1;
        }
    }
    push_run(&mut result, len, value);
    result
}

/// Expands the runs into values.
///
/// Zero-length runs and adjacent runs with equal values are accepted.
pub fn decode<T: Copy>(ops: &[RunLengthOp<T>]) -> Vec<T> {
    let mut result = Vec::with_capacity(expanded_len(ops));
    for op in ops {
        result.extend(std::iter::repeat(op.value).take(op.len as usize));
    }
    result
}

/// Returns the total length of the runs.
pub fn expanded_len<T>(ops: &[RunLengthOp<T>]) -> usize {
    ops.iter().map(|op| op.len as usize).sum()
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
