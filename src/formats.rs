//! Text representation of alignment records.
//!
//! ### Record lines
//!
//! Each record is a single line with tab-separated fields:
//!
//! 1. Read name.
//! 2. Flag as a decimal integer.
//! 3. Target path as a comma-separated list of node identifiers.
//! 4. Start offset in the first node.
//! 5. End offset (exclusive) in the last node.
//! 6. CIGAR string, or `*` if empty.
//! 7. Read sequence, or `*` if empty.
//! 8. Alignment score.
//! 9. Mapping quality.
//! 10. Base quality values in Phred+33 encoding, or `*` if missing.
//!
//! Any remaining fields are typed annotations in the SAM `TAG:TYPE:VALUE` format.
//!
//! ### Header lines
//!
//! Lines starting with `@` or `#` are header lines.
//! They are skipped when reading records.
//! See [`is_header_line`].

use crate::annotation::Annotation;
use crate::bases;
use crate::cigar;
use crate::record::AlignmentRecord;
use crate::rle;
use crate::{GirafError, Result};

use std::io::{self, BufRead, Write};
use std::str::FromStr;


//-----------------------------------------------------------------------------

/// Offset of Phred+33 quality values.
pub const PHRED_OFFSET: u8 = 33;

/// Placeholder for a missing field.
pub const MISSING_FIELD: &[u8] = b"*";

/// Number of mandatory fields in a record line.
pub const MANDATORY_FIELDS: usize = 10;

/// Returns `true` if the buffer contains a header line.
///
/// A header line starts with `@` or `#`.
pub fn is_header_line(buf: &[u8]) -> bool {
    matches!(buf.first(), Some(b'@') | Some(b'#'))
}

//-----------------------------------------------------------------------------

fn parse_number<T: FromStr>(field: &[u8], name: &str) -> Result<T> {
    std::str::from_utf8(field).ok().and_then(|s| s.parse::<T>().ok()).ok_or(
        GirafError::Parse(format!("Invalid {}: {}", name, String::from_utf8_lossy(field)))
    )
}

fn parse_path(field: &[u8]) -> Result<Vec<u32>> {
    if field == MISSING_FIELD || field.is_empty() {
        return Ok(Vec::new());
    }
    field.split(|&c| c == b',').map(|id| parse_number::<u32>(id, "node identifier")).collect()
}

fn parse_quality(field: &[u8]) -> Result<Vec<rle::RunLengthOp<u8>>> {
    if field == MISSING_FIELD {
        return Ok(Vec::new());
    }
    let mut values = Vec::with_capacity(field.len());
    for &c in field {
        if c < PHRED_OFFSET {
            return Err(GirafError::Parse(format!("Invalid quality character: {}", c as char)));
        }
        values.push(c - PHRED_OFFSET);
    }
    Ok(rle::encode(&values))
}

impl AlignmentRecord {
    /// Parses a record from a text line.
    ///
    /// A trailing newline is ignored.
    /// The record is not validated; see [`AlignmentRecord::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use giraf::AlignmentRecord;
    ///
    /// let line = b"read1\t16\t1,2\t3\t4\t2S5=1X2=\tGGTACACGTT\t12\t60\t??????????\tNM:i:1";
    /// let record = AlignmentRecord::from_text(line).unwrap();
    /// assert_eq!(record.path, vec![1, 2]);
    /// assert!(record.is_reverse());
    /// assert_eq!(record.base_quality(), vec![30; 10]);
    /// assert_eq!(record.to_text(), line.to_vec());
    /// ```
    pub fn from_text(line: &[u8]) -> Result<Self> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let fields: Vec<&[u8]> = line.split(|&c| c == b'\t').collect();
        if fields.len() < MANDATORY_FIELDS {
            return Err(GirafError::Parse(format!(
                "Expected at least {} fields, found {}", MANDATORY_FIELDS, fields.len()
            )));
        }

        let name = String::from_utf8_lossy(fields[0]).to_string();
        let flag = parse_number::<u8>(fields[1], "flag")?;
        let path = parse_path(fields[2])?;
        let t_start = parse_number::<u32>(fields[3], "start offset")?;
        let t_end = parse_number::<u32>(fields[4], "end offset")?;
        let cigar = cigar::parse_cigar(fields[5])?;
        let sequence = if fields[6] == MISSING_FIELD { Vec::new() } else { bases::bases_from_ascii(fields[6]) };
        let score = parse_number::<i64>(fields[7], "score")?;
        let mapq = parse_number::<u8>(fields[8], "mapping quality")?;
        let quality = parse_quality(fields[9])?;
        let annotations = fields[MANDATORY_FIELDS..].iter()
            .map(|field| Annotation::parse(field))
            .collect::<Result<Vec<_>>>()?;

        Ok(AlignmentRecord {
            name, flag, path, t_start, t_end,
            cigar, sequence, score, mapq, quality,
            annotations,
        })
    }

    /// Returns the record as a text line without the trailing newline.
    pub fn to_text(&self) -> Vec<u8> {
        let mut buffer: Vec<u8> = Vec::new();

        buffer.extend_from_slice(self.name.as_bytes());
        buffer.push(b'\t');
        buffer.extend_from_slice(self.flag.to_string().as_bytes());
        buffer.push(b'\t');
        if self.path.is_empty() {
            buffer.extend_from_slice(MISSING_FIELD);
        }
        for (i, node_id) in self.path.iter().enumerate() {
            if i > 0 {
                buffer.push(b',');
            }
            buffer.extend_from_slice(node_id.to_string().as_bytes());
        }
        buffer.push(b'\t');
        buffer.extend_from_slice(self.t_start.to_string().as_bytes());
        buffer.push(b'\t');
        buffer.extend_from_slice(self.t_end.to_string().as_bytes());
        buffer.push(b'\t');
        buffer.extend_from_slice(cigar::format_cigar(&self.cigar).as_bytes());
        buffer.push(b'\t');
        if self.sequence.is_empty() {
            buffer.extend_from_slice(MISSING_FIELD);
        } else {
            buffer.extend(self.sequence.iter().map(|base| base.to_ascii()));
        }
        buffer.push(b'\t');
        buffer.extend_from_slice(self.score.to_string().as_bytes());
        buffer.push(b'\t');
        buffer.extend_from_slice(self.mapq.to_string().as_bytes());
        buffer.push(b'\t');
        if self.quality.is_empty() {
            buffer.extend_from_slice(MISSING_FIELD);
        } else {
            buffer.extend(self.base_quality().iter().map(|&q| q.saturating_add(PHRED_OFFSET)));
        }
        for annotation in self.annotations.iter() {
            buffer.push(b'\t');
            buffer.extend_from_slice(annotation.to_string().as_bytes());
        }

        buffer
    }
}

/// Writes the record as a text line.
pub fn write_text_record<T: Write>(record: &AlignmentRecord, output: &mut T) -> io::Result<()> {
    let mut buffer = record.to_text();
    buffer.push(b'\n');
    output.write_all(&buffer)
}

//-----------------------------------------------------------------------------

/// An iterator over the text records in a reader.
///
/// Header lines and empty lines are skipped.
/// Parse errors include the line number.
pub struct TextRecords<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    line_num: usize,
    failed: bool,
}

/// Returns an iterator over the text records in the reader.
pub fn read_text_records<R: BufRead>(reader: R) -> TextRecords<R> {
    TextRecords {
        reader,
        buffer: Vec::new(),
        line_num: 0,
        failed: false,
    }
}

impl<R: BufRead> TextRecords<R> {
    /// Returns the number of lines read so far.
    pub fn lines(&self) -> usize {
        self.line_num
    }

    fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_num += 1;
            let line = self.buffer.strip_suffix(b"\n").unwrap_or(&self.buffer);
            if line.is_empty() || line == b"\r" || is_header_line(line) {
                continue;
            }
            return AlignmentRecord::from_text(line).map(Some).map_err(|err| match err {
                GirafError::Parse(msg) => GirafError::Parse(format!("Line {}: {}", self.line_num, msg)),
                err => err,
            });
        }
    }
}

impl<R: BufRead> Iterator for TextRecords<R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            },
        }
    }
}

//-----------------------------------------------------------------------------
