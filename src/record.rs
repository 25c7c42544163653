//! Alignment records and their binary encoding.
//!
//! An [`AlignmentRecord`] is the alignment of a read to a path in a reference graph.
//! The binary encoding drops the read bases that can be copied from the reference, packs the remaining bases at 3 bits per base, and stores CIGAR operations and base qualities as runs.
//! Decoding the full record therefore requires the same [`ReferenceGraph`] that the alignment refers to.
//! [`EncodedRecord`] contains the fields as stored on the wire and can be decoded without a graph.
//!
//! # Binary layout
//!
//! All integers are little-endian.
//!
//! | Field | Width |
//! |---|---|
//! | `block_size` | `u32`, bytes after this field |
//! | name length | `u8` |
//! | name | raw bytes |
//! | flag | `u8` |
//! | `t_start` | `u32` |
//! | `t_end` | `u32` |
//! | path length | `u16` |
//! | path | `u32` per node |
//! | CIGAR length | `u16` |
//! | CIGAR | `u16` run length + `u8` operation |
//! | explicit bases | `u32` base count |
//! | packed words | `u64` per 21 bases |
//! | score | `i64` |
//! | mapping quality | `u8` |
//! | quality length | `u16` |
//! | quality | `u16` run length + `u8` value |
//! | annotations | until the end of the block |
//!
//! Records are written back to back, and the total size of a record is `block_size + 4` bytes.
//!
//! # Explicit bases
//!
//! The bases covered by soft clips, mismatches, and insertions are stored explicitly.
//! The encoder finds them by walking the CIGAR with a cursor in the read.
//! With [`QueryCursor::Legacy`] (the default), the cursor advances over every operation, including deletions and other operations that do not consume the read.
//! This is how existing files were written, but it selects the wrong bases once such an operation precedes an explicit one.
//! [`QueryCursor::Strict`] advances only over operations that consume the read.
//! The decoder is the same for both rules, so only the strict rule guarantees a faithful round trip for every CIGAR.

use crate::annotation::Annotation;
use crate::bases::{Base, PackedBases};
use crate::cigar::{self, Cigar, CigarCode};
use crate::graph::ReferenceGraph;
use crate::rle::{self, RunLengthOp};
use crate::{GirafError, Result};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Rule for advancing the read cursor while collecting explicit bases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryCursor {
    /// Advance over every CIGAR operation. Compatible with existing files.
    #[default]
    Legacy,
    /// Advance only over operations that consume the read.
    Strict,
}

/// Parameters for encoding records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncoderParams {
    /// Rule for collecting explicit bases.
    pub cursor: QueryCursor,
}

/// Collects the read bases covered by explicit CIGAR operations.
///
/// Returns [`GirafError::InvalidRecord`] if an explicit operation extends past the end of the read.
pub fn collect_explicit_bases(cigar: &[RunLengthOp<CigarCode>], sequence: &[Base], cursor: QueryCursor) -> Result<PackedBases> {
    let mut result = PackedBases::new();
    let mut offset = 0;
    for op in cigar {
        let len = op.len as usize;
        if op.value.is_explicit() {
            let bases = sequence.get(offset..offset + len).ok_or(
                GirafError::InvalidRecord(format!(
                    "CIGAR operation {}{} at read offset {} extends past the end of a read of length {}",
                    op.len, op.value, offset, sequence.len()
                ))
            )?;
            for &base in bases {
                result.append(base);
            }
        }
        if cursor == QueryCursor::Legacy || op.value.consumes_query() {
            offset += len;
        }
    }
    Ok(result)
}

/// Returns `true` if the legacy cursor rule selects different bases than the strict rule for this CIGAR.
pub fn legacy_cursor_diverges(cigar: &[RunLengthOp<CigarCode>]) -> bool {
    let mut skipped = false;
    for op in cigar {
        if op.len == 0 {
            continue;
        }
        if op.value.is_explicit() && skipped {
            return true;
        }
        if !op.value.consumes_query() {
            skipped = true;
        }
    }
    false
}

//-----------------------------------------------------------------------------

/// An alignment of a read to a path in a reference graph.
///
/// The read sequence is stored in full and in the orientation of the path.
/// The base quality values, if present, are stored as runs that expand to one value per base.
///
/// # Examples
///
/// ```
/// use giraf::{AlignmentRecord, EncoderParams, SequenceGraph};
/// use giraf::{bases, cigar, rle};
///
/// let mut graph = SequenceGraph::new();
/// graph.add_node(1, &bases::bases_from_ascii(b"GATTACA"));
/// graph.add_node(2, &bases::bases_from_ascii(b"CATTAG"));
///
/// let record = AlignmentRecord {
///     name: String::from("read1"),
///     flag: 0,
///     path: vec![1, 2],
///     t_start: 3,
///     t_end: 4,
///     cigar: cigar::parse_cigar(b"2S5=1X2=").unwrap(),
///     sequence: bases::bases_from_ascii(b"GGTACACGTT"),
///     score: 12,
///     mapq: 60,
///     quality: rle::encode(&[30u8; 10]),
///     annotations: Vec::new(),
/// };
/// let encoded = record.encode(&EncoderParams::default()).unwrap();
/// assert_eq!(encoded.len(), record.encoded_len(&EncoderParams::default()).unwrap());
/// let (decoded, len) = AlignmentRecord::decode(&encoded, &graph).unwrap();
/// assert_eq!(len, encoded.len());
/// assert_eq!(decoded, record);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentRecord {
    /// Name of the read.
    pub name: String,
    /// Flags; see the `FLAG_*` constants.
    pub flag: u8,
    /// Node identifiers on the target path.
    pub path: Vec<u32>,
    /// Start offset in the first node of the path.
    pub t_start: u32,
    /// End offset (exclusive) in the last node of the path.
    pub t_end: u32,
    /// CIGAR operations.
    pub cigar: Cigar,
    /// Read sequence.
    pub sequence: Vec<Base>,
    /// Alignment score.
    pub score: i64,
    /// Mapping quality.
    pub mapq: u8,
    /// Base quality values as runs. May be empty.
    pub quality: Vec<RunLengthOp<u8>>,
    /// Additional typed annotations.
    pub annotations: Vec<Annotation>,
}

impl AlignmentRecord {
    /// The read is paired.
    pub const FLAG_PAIRED: u8 = 0x01;
    /// The read is properly paired.
    pub const FLAG_PROPER_PAIR: u8 = 0x02;
    /// The read is unmapped.
    pub const FLAG_UNMAPPED: u8 = 0x04;
    /// The mate is unmapped.
    pub const FLAG_MATE_UNMAPPED: u8 = 0x08;
    /// The read is aligned to the reverse strand.
    pub const FLAG_REVERSE: u8 = 0x10;
    /// The mate is aligned to the reverse strand.
    pub const FLAG_MATE_REVERSE: u8 = 0x20;
    /// The read is the first fragment.
    pub const FLAG_FIRST: u8 = 0x40;
    /// The read is the last fragment.
    pub const FLAG_LAST: u8 = 0x80;

    /// Maximum length of the read name in bytes.
    pub const MAX_NAME_LEN: usize = u8::MAX as usize;

    /// Returns `true` if the read is aligned to the reverse strand.
    pub fn is_reverse(&self) -> bool {
        self.flag & Self::FLAG_REVERSE != 0
    }

    /// Returns the base quality values, one per base, or an empty vector if they are missing.
    pub fn base_quality(&self) -> Vec<u8> {
        rle::decode(&self.quality)
    }

    /// Checks the invariants required for encoding the record.
    ///
    /// The name must fit in 255 bytes, the path must be non-empty, all counts must fit in their fields, the CIGAR must cover the read exactly, and the quality values must be either missing or cover the read exactly.
    pub fn validate(&self) -> Result<()> {
        if self.name.len() > Self::MAX_NAME_LEN {
            return Err(GirafError::NameTooLong(self.name.len()));
        }
        if self.path.is_empty() {
            return Err(GirafError::InvalidRecord(format!("Read {} has an empty path", self.name)));
        }
        check_count("path nodes", self.path.len())?;
        check_count("CIGAR operations", self.cigar.len())?;
        check_count("quality runs", self.quality.len())?;

        let query_len = cigar::query_len(&self.cigar);
        if query_len != self.sequence.len() {
            return Err(GirafError::InvalidRecord(format!(
                "Read {}: CIGAR covers {} bases in a read of length {}", self.name, query_len, self.sequence.len()
            )));
        }
        let quality_len = rle::expanded_len(&self.quality);
        if !self.quality.is_empty() && quality_len != self.sequence.len() {
            return Err(GirafError::InvalidRecord(format!(
                "Read {}: {} quality values for a read of length {}", self.name, quality_len, self.sequence.len()
            )));
        }
        Ok(())
    }

    /// Returns the bases that must be stored explicitly.
    pub fn explicit_bases(&self, cursor: QueryCursor) -> Result<PackedBases> {
        collect_explicit_bases(&self.cigar, &self.sequence, cursor)
    }

    fn wire_fields<'a>(&'a self, explicit: &'a PackedBases) -> WireFields<'a> {
        WireFields {
            name: self.name.as_bytes(),
            flag: self.flag,
            t_start: self.t_start,
            t_end: self.t_end,
            path: &self.path,
            cigar: &self.cigar,
            explicit,
            score: self.score,
            mapq: self.mapq,
            quality: &self.quality,
            annotations: &self.annotations,
        }
    }

    /// Returns the total size of the encoding in bytes, including the `block_size` field.
    pub fn encoded_len(&self, params: &EncoderParams) -> Result<usize> {
        let explicit = self.explicit_bases(params.cursor)?;
        Ok(BLOCK_SIZE_FIELD + self.wire_fields(&explicit).block_size())
    }

    /// Appends the binary encoding of the record to the buffer.
    ///
    /// The buffer is unchanged if the record is invalid.
    pub fn encode_into(&self, buffer: &mut Vec<u8>, params: &EncoderParams) -> Result<()> {
        self.validate()?;
        let explicit = self.explicit_bases(params.cursor)?;
        self.wire_fields(&explicit).encode_into(buffer)
    }

    /// Returns the binary encoding of the record.
    pub fn encode(&self, params: &EncoderParams) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.encode_into(&mut buffer, params)?;
        Ok(buffer)
    }

    /// Converts the record to the fields stored on the wire.
    pub fn to_encoded(&self, params: &EncoderParams) -> Result<EncodedRecord> {
        self.validate()?;
        let explicit = self.explicit_bases(params.cursor)?;
        Ok(EncodedRecord {
            name: self.name.clone(),
            flag: self.flag,
            t_start: self.t_start,
            t_end: self.t_end,
            path: self.path.clone(),
            cigar: self.cigar.clone(),
            explicit,
            score: self.score,
            mapq: self.mapq,
            quality: self.quality.clone(),
            annotations: self.annotations.clone(),
        })
    }

    /// Decodes a record from the start of the buffer, reconstructing the read sequence from the graph.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn decode<G: ReferenceGraph + ?Sized>(buffer: &[u8], graph: &G) -> Result<(Self, usize)> {
        let (encoded, len) = EncodedRecord::decode(buffer)?;
        Ok((encoded.into_record(graph)?, len))
    }
}

fn check_count(field: &'static str, len: usize) -> Result<()> {
    if len > u16::MAX as usize {
        return Err(GirafError::FieldOverflow { field, len, max: u16::MAX as usize });
    }
    Ok(())
}

//-----------------------------------------------------------------------------

// Size of the `block_size` field.
const BLOCK_SIZE_FIELD: usize = 4;

// Total size of the fixed-width fields after `block_size`.
const FIXED_FIELDS: usize = 1 + 1 + 4 + 4 + 2 + 2 + 4 + 8 + 1 + 2;

// Borrowed record fields in the order they are written.
struct WireFields<'a> {
    name: &'a [u8],
    flag: u8,
    t_start: u32,
    t_end: u32,
    path: &'a [u32],
    cigar: &'a [RunLengthOp<CigarCode>],
    explicit: &'a PackedBases,
    score: i64,
    mapq: u8,
    quality: &'a [RunLengthOp<u8>],
    annotations: &'a [Annotation],
}

impl WireFields<'_> {
    fn block_size(&self) -> usize {
        let annotations: usize = self.annotations.iter().map(|a| a.encoded_len()).sum();
        FIXED_FIELDS + self.name.len() + 4 * self.path.len() + 3 * self.cigar.len()
            + 8 * self.explicit.words().len() + 3 * self.quality.len() + annotations
    }

    fn check(&self) -> Result<usize> {
        if self.name.len() > AlignmentRecord::MAX_NAME_LEN {
            return Err(GirafError::NameTooLong(self.name.len()));
        }
        check_count("path nodes", self.path.len())?;
        check_count("CIGAR operations", self.cigar.len())?;
        check_count("quality runs", self.quality.len())?;
        if self.explicit.len() > u32::MAX as usize {
            return Err(GirafError::FieldOverflow { field: "explicit bases", len: self.explicit.len(), max: u32::MAX as usize });
        }
        let block_size = self.block_size();
        if block_size > u32::MAX as usize {
            return Err(GirafError::FieldOverflow { field: "bytes in a record", len: block_size, max: u32::MAX as usize });
        }
        Ok(block_size)
    }

    fn encode_into(&self, buffer: &mut Vec<u8>) -> Result<()> {
        let block_size = self.check()?;
        buffer.reserve(BLOCK_SIZE_FIELD + block_size);

        buffer.write_u32::<LittleEndian>(block_size as u32)?;
        buffer.push(self.name.len() as u8);
        buffer.extend_from_slice(self.name);
        buffer.push(self.flag);
        buffer.write_u32::<LittleEndian>(self.t_start)?;
        buffer.write_u32::<LittleEndian>(self.t_end)?;

        buffer.write_u16::<LittleEndian>(self.path.len() as u16)?;
        for &node_id in self.path {
            buffer.write_u32::<LittleEndian>(node_id)?;
        }

        buffer.write_u16::<LittleEndian>(self.cigar.len() as u16)?;
        for op in self.cigar {
            buffer.write_u16::<LittleEndian>(op.len)?;
            buffer.push(op.value.to_wire());
        }

        buffer.write_u32::<LittleEndian>(self.explicit.len() as u32)?;
        for &word in self.explicit.words() {
            buffer.write_u64::<LittleEndian>(word)?;
        }

        buffer.write_i64::<LittleEndian>(self.score)?;
        buffer.push(self.mapq);

        buffer.write_u16::<LittleEndian>(self.quality.len() as u16)?;
        for op in self.quality {
            buffer.write_u16::<LittleEndian>(op.len)?;
            buffer.push(op.value);
        }

        for annotation in self.annotations {
            annotation.encode_into(buffer);
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

// Reads little-endian fields from a record block.
// Reading past the end of the block is reported as a truncated record.
struct FieldReader<'a> {
    block: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(block: &'a [u8]) -> Self {
        FieldReader { block, offset: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).filter(|&end| end <= self.block.len()).ok_or(
            GirafError::truncated(BLOCK_SIZE_FIELD + self.offset.saturating_add(len), BLOCK_SIZE_FIELD + self.block.len())
        )?;
        let result = &self.block[self.offset..end];
        self.offset = end;
        Ok(result)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.bytes(2)?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(4)?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.bytes(8)?))
    }

    fn remaining(&mut self) -> &'a [u8] {
        let result = &self.block[self.offset..];
        self.offset = self.block.len();
        result
    }
}

//-----------------------------------------------------------------------------

/// Record fields as stored in the binary format.
///
/// The read sequence is represented only by the explicit bases.
/// Use [`EncodedRecord::into_record`] to reconstruct the full read with a reference graph.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedRecord {
    /// Name of the read.
    pub name: String,
    /// Flags; see [`AlignmentRecord::FLAG_REVERSE`] and others.
    pub flag: u8,
    /// Start offset in the first node of the path.
    pub t_start: u32,
    /// End offset (exclusive) in the last node of the path.
    pub t_end: u32,
    /// Node identifiers on the target path.
    pub path: Vec<u32>,
    /// CIGAR operations.
    pub cigar: Cigar,
    /// Read bases that cannot be copied from the reference.
    pub explicit: PackedBases,
    /// Alignment score.
    pub score: i64,
    /// Mapping quality.
    pub mapq: u8,
    /// Base quality values as runs.
    pub quality: Vec<RunLengthOp<u8>>,
    /// Additional typed annotations.
    pub annotations: Vec<Annotation>,
}

impl EncodedRecord {
    fn wire_fields(&self) -> WireFields<'_> {
        WireFields {
            name: self.name.as_bytes(),
            flag: self.flag,
            t_start: self.t_start,
            t_end: self.t_end,
            path: &self.path,
            cigar: &self.cigar,
            explicit: &self.explicit,
            score: self.score,
            mapq: self.mapq,
            quality: &self.quality,
            annotations: &self.annotations,
        }
    }

    /// Returns the value of the `block_size` field for this record.
    pub fn block_size(&self) -> usize {
        self.wire_fields().block_size()
    }

    /// Appends the binary encoding of the record to the buffer.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) -> Result<()> {
        self.wire_fields().encode_into(buffer)
    }

    /// Reads the `block_size` field from the start of the buffer.
    ///
    /// Returns the total size of the record in bytes.
    pub fn record_len(buffer: &[u8]) -> Result<usize> {
        if buffer.len() < BLOCK_SIZE_FIELD {
            return Err(GirafError::truncated(BLOCK_SIZE_FIELD, buffer.len()));
        }
        Ok(BLOCK_SIZE_FIELD + LittleEndian::read_u32(buffer) as usize)
    }

    /// Decodes a record from the start of the buffer.
    ///
    /// Returns the record and the number of bytes consumed.
    /// Returns [`GirafError::TruncatedRecord`] if the buffer is shorter than the record or if the fields do not fit in the declared block.
    /// Returns [`GirafError::InvalidRecord`] if the read name is not valid UTF-8.
    pub fn decode(buffer: &[u8]) -> Result<(Self, usize)> {
        let total = Self::record_len(buffer)?;
        if buffer.len() < total {
            return Err(GirafError::truncated(total, buffer.len()));
        }
        let mut reader = FieldReader::new(&buffer[BLOCK_SIZE_FIELD..total]);

        let name_len = reader.u8()? as usize;
        let name = String::from_utf8(reader.bytes(name_len)?.to_vec()).map_err(|_| {
            GirafError::InvalidRecord(String::from("Read name is not valid UTF-8"))
        })?;
        let flag = reader.u8()?;
        let t_start = reader.u32()?;
        let t_end = reader.u32()?;

        let path_len = reader.u16()? as usize;
        let path = reader.bytes(4 * path_len)?.chunks_exact(4).map(LittleEndian::read_u32).collect();

        let cigar_len = reader.u16()? as usize;
        let mut cigar = Cigar::with_capacity(cigar_len);
        for op in reader.bytes(3 * cigar_len)?.chunks_exact(3) {
            let code = CigarCode::from_wire(op[2])?;
            cigar.push(RunLengthOp::new(LittleEndian::read_u16(op), code));
        }

        let explicit_len = reader.u32()? as usize;
        let words = PackedBases::words_for(explicit_len);
        let words: Vec<u64> = reader.bytes(8 * words)?.chunks_exact(8).map(LittleEndian::read_u64).collect();
        let explicit = PackedBases::from_words(words, explicit_len)?;

        let score = reader.i64()?;
        let mapq = reader.u8()?;

        let quality_len = reader.u16()? as usize;
        let quality = reader.bytes(3 * quality_len)?.chunks_exact(3).map(|op| {
            RunLengthOp::new(LittleEndian::read_u16(op), op[2])
        }).collect();

        let annotations = Annotation::decode_all(reader.remaining())?;

        let record = EncodedRecord {
            name, flag, t_start, t_end,
            path, cigar, explicit,
            score, mapq, quality,
            annotations,
        };
        Ok((record, total))
    }

    /// Reconstructs the full alignment record using the reference graph.
    ///
    /// Bases for `M` and `=` operations are copied from the reference path starting at `t_start`.
    /// Bases for `S`, `X`, and `I` operations are taken from the explicit bases in order.
    /// `X`, `D`, and `N` operations advance the reference without copying from it.
    ///
    /// Returns [`GirafError::UnknownNode`] if a node on the path is missing from the graph.
    /// Returns [`GirafError::InvalidRecord`] if the CIGAR does not match the bases from either source or if the quality values do not cover the read.
    pub fn into_record<G: ReferenceGraph + ?Sized>(self, graph: &G) -> Result<AlignmentRecord> {
        let explicit = self.explicit.to_bases();
        let reference = graph.path_bases(&self.path, self.t_start as usize, self.t_end as usize)?;

        let mut sequence: Vec<Base> = Vec::with_capacity(cigar::query_len(&self.cigar));
        let mut explicit_offset = 0;
        let mut ref_offset = 0;
        for op in self.cigar.iter() {
            let len = op.len as usize;
            let (from_reference, from_explicit, advance_reference) = match op.value {
                CigarCode::Match | CigarCode::Equal => (true, false, true),
                CigarCode::Mismatch => (false, true, true),
                CigarCode::Insertion | CigarCode::SoftClip => (false, true, false),
                CigarCode::Deletion | CigarCode::Skip => (false, false, true),
                CigarCode::HardClip | CigarCode::Padding => (false, false, false),
            };
            if advance_reference && ref_offset + len > reference.len() {
                return Err(GirafError::InvalidRecord(format!(
                    "Read {}: CIGAR extends past the end of the reference path ({} bases)", self.name, reference.len()
                )));
            }
            if from_reference {
                sequence.extend_from_slice(&reference[ref_offset..ref_offset + len]);
            }
            if from_explicit {
                let bases = explicit.get(explicit_offset..explicit_offset + len).ok_or(
                    GirafError::InvalidRecord(format!(
                        "Read {}: CIGAR needs more than {} explicit bases", self.name, explicit.len()
                    ))
                )?;
                sequence.extend_from_slice(bases);
                explicit_offset += len;
            }
            if advance_reference {
                ref_offset += len;
            }
        }
        if explicit_offset != explicit.len() {
            return Err(GirafError::InvalidRecord(format!(
                "Read {}: CIGAR uses {} of {} explicit bases", self.name, explicit_offset, explicit.len()
            )));
        }
        let quality_len = rle::expanded_len(&self.quality);
        if !self.quality.is_empty() && quality_len != sequence.len() {
            return Err(GirafError::InvalidRecord(format!(
                "Read {}: {} quality values for a read of length {}", self.name, quality_len, sequence.len()
            )));
        }

        Ok(AlignmentRecord {
            name: self.name,
            flag: self.flag,
            path: self.path,
            t_start: self.t_start,
            t_end: self.t_end,
            cigar: self.cigar,
            sequence,
            score: self.score,
            mapq: self.mapq,
            quality: self.quality,
            annotations: self.annotations,
        })
    }
}

//-----------------------------------------------------------------------------
