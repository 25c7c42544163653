//! Reading and writing streams of binary records.
//!
//! A record stream is a concatenation of encoded records with no header or separators.
//! Record files are record streams compressed with BGZF.
//!
//! # Examples
//!
//! ```
//! use giraf::{AlignmentRecord, EncoderParams, SequenceGraph};
//! use giraf::stream::{RecordReader, RecordWriter};
//! use giraf::{bases, cigar, rle};
//!
//! let mut graph = SequenceGraph::new();
//! graph.add_node(1, &bases::bases_from_ascii(b"GATTACA"));
//!
//! let record = AlignmentRecord {
//!     name: String::from("read1"),
//!     flag: 0,
//!     path: vec![1],
//!     t_start: 1,
//!     t_end: 6,
//!     cigar: cigar::parse_cigar(b"5=").unwrap(),
//!     sequence: bases::bases_from_ascii(b"ATTAC"),
//!     score: 5,
//!     mapq: 60,
//!     quality: rle::encode(&[35u8; 5]),
//!     annotations: Vec::new(),
//! };
//!
//! let mut writer = RecordWriter::new(Vec::new(), EncoderParams::default());
//! writer.write(&record).unwrap();
//! writer.write(&record).unwrap();
//! assert_eq!(writer.records(), 2);
//! let buffer = writer.into_inner();
//!
//! let mut reader = RecordReader::new(&buffer[..]);
//! let records: Vec<AlignmentRecord> = reader.records(&graph).collect::<Result<_, _>>().unwrap();
//! assert_eq!(records, vec![record.clone(), record]);
//! ```

use crate::bgzf::{BgzfParams, BgzfReader, BgzfWriter};
use crate::graph::ReferenceGraph;
use crate::record::{AlignmentRecord, EncodedRecord, EncoderParams};
use crate::{GirafError, Result};

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use log::debug;

//-----------------------------------------------------------------------------

/// Writes encoded records to a stream.
pub struct RecordWriter<W: Write> {
    inner: W,
    params: EncoderParams,
    buffer: Vec<u8>,
    records: usize,
    bytes: usize,
}

impl<W: Write> RecordWriter<W> {
    /// Creates a new writer using the given encoder parameters.
    pub fn new(inner: W, params: EncoderParams) -> Self {
        RecordWriter {
            inner,
            params,
            buffer: Vec::new(),
            records: 0,
            bytes: 0,
        }
    }

    /// Returns the number of records written.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Returns the number of uncompressed bytes written.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn write_buffer(&mut self) -> Result<()> {
        self.inner.write_all(&self.buffer)?;
        self.records += 1;
        self.bytes += self.buffer.len();
        Ok(())
    }

    /// Encodes and writes the record.
    ///
    /// Nothing is written if the record cannot be encoded.
    pub fn write(&mut self, record: &AlignmentRecord) -> Result<()> {
        self.buffer.clear();
        record.encode_into(&mut self.buffer, &self.params)?;
        self.write_buffer()
    }

    /// Writes a record that has already been converted to its wire fields.
    pub fn write_encoded(&mut self, record: &EncodedRecord) -> Result<()> {
        self.buffer.clear();
        record.encode_into(&mut self.buffer)?;
        self.write_buffer()
    }

    /// Flushes the inner writer.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

//-----------------------------------------------------------------------------

// Reads until the buffer is full or the reader is exhausted.
// Returns the number of bytes read.
fn read_fully<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut offset = 0;
    while offset < buffer.len() {
        match reader.read(&mut buffer[offset..]) {
            Ok(0) => break,
            Ok(n) => offset += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(offset)
}

/// Reads encoded records from a stream.
///
/// The reader consumes exactly one record at a time.
/// A stream that ends cleanly between records is exhausted, while a stream that ends within a record is truncated.
pub struct RecordReader<R: Read> {
    inner: R,
    buffer: Vec<u8>,
    records: usize,
}

impl<R: Read> RecordReader<R> {
    /// Creates a new reader.
    pub fn new(inner: R) -> Self {
        RecordReader {
            inner,
            buffer: Vec::new(),
            records: 0,
        }
    }

    /// Returns the number of records read.
    pub fn records_read(&self) -> usize {
        self.records
    }

    /// Returns the next record without the reference sequence, or [`None`] at the end of the stream.
    ///
    /// Returns [`GirafError::TruncatedRecord`] if the stream ends within a record.
    pub fn next_encoded(&mut self) -> Result<Option<EncodedRecord>> {
        let mut prefix = [0u8; 4];
        let len = read_fully(&mut self.inner, &mut prefix)?;
        if len == 0 {
            return Ok(None);
        }
        if len < prefix.len() {
            return Err(GirafError::truncated(prefix.len(), len));
        }

        // The buffer grows with the data actually read, not with the declared size.
        let block_size = LittleEndian::read_u32(&prefix);
        let total = prefix.len() + block_size as usize;
        self.buffer.clear();
        self.buffer.extend_from_slice(&prefix);
        (&mut self.inner).take(block_size as u64).read_to_end(&mut self.buffer)?;
        if self.buffer.len() < total {
            return Err(GirafError::truncated(total, self.buffer.len()));
        }

        let (record, _) = EncodedRecord::decode(&self.buffer)?;
        self.records += 1;
        Ok(Some(record))
    }

    /// Returns the next record with the read sequence reconstructed from the graph, or [`None`] at the end of the stream.
    pub fn next_record<G: ReferenceGraph + ?Sized>(&mut self, graph: &G) -> Result<Option<AlignmentRecord>> {
        match self.next_encoded()? {
            Some(record) => Ok(Some(record.into_record(graph)?)),
            None => Ok(None),
        }
    }

    /// Returns an iterator over the remaining records.
    ///
    /// The iterator stops after the first error.
    pub fn records<'a, G: ReferenceGraph + ?Sized>(&'a mut self, graph: &'a G) -> RecordIter<'a, R, G> {
        RecordIter {
            reader: self,
            graph,
            failed: false,
        }
    }

    /// Returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// An iterator over the records in a [`RecordReader`].
pub struct RecordIter<'a, R: Read, G: ReferenceGraph + ?Sized> {
    reader: &'a mut RecordReader<R>,
    graph: &'a G,
    failed: bool,
}

impl<'a, R: Read, G: ReferenceGraph + ?Sized> Iterator for RecordIter<'a, R, G> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.next_record(self.graph) {
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

/// Opens a BGZF-compressed record file for writing.
///
/// Fails if the file exists and `overwrite` is not set.
pub fn create_record_file<P: AsRef<Path>>(filename: P, params: EncoderParams, bgzf: BgzfParams, overwrite: bool) -> Result<RecordWriter<BgzfWriter<BufWriter<File>>>> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let file = options.open(&filename)?;
    debug!("Writing records to {}", filename.as_ref().display());
    Ok(RecordWriter::new(BgzfWriter::new(BufWriter::new(file), bgzf), params))
}

/// Opens a BGZF-compressed record file for reading.
pub fn open_record_file<P: AsRef<Path>>(filename: P) -> Result<RecordReader<BgzfReader<BufReader<File>>>> {
    let file = File::open(&filename)?;
    debug!("Reading records from {}", filename.as_ref().display());
    Ok(RecordReader::new(BgzfReader::new(BufReader::new(file))))
}

/// Writes the records to a BGZF-compressed file, replacing any existing file.
///
/// Returns the number of records written.
pub fn write_records_to_file<P: AsRef<Path>>(filename: P, records: &[AlignmentRecord], params: &EncoderParams) -> Result<usize> {
    let mut writer = create_record_file(&filename, params.clone(), BgzfParams::default(), true)?;
    for record in records {
        writer.write(record)?;
    }
    let count = writer.records();
    writer.into_inner().finish()?;
    Ok(count)
}

/// Reads all records from a BGZF-compressed file.
pub fn read_records_from_file<P: AsRef<Path>, G: ReferenceGraph + ?Sized>(filename: P, graph: &G) -> Result<Vec<AlignmentRecord>> {
    let mut reader = open_record_file(&filename)?;
    let records = reader.records(graph).collect::<Result<Vec<_>>>()?;
    debug!("Read {} records", records.len());
    Ok(records)
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
