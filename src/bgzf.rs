//! BGZF compression for record streams.
//!
//! BGZF is a series of gzip members, each containing at most 64 KiB of data.
//! Every member carries its compressed size in a `BC` extra subfield, and the file ends with an empty member.
//! Because the members are concatenated gzip streams, any multi-member gzip decoder can read the file.
//!
//! [`BgzfWriter`] buffers data, compresses full blocks (optionally in parallel), and writes them in order.
//! [`BgzfReader`] decompresses the concatenated members.
//!
//! # Examples
//!
//! ```
//! use giraf::bgzf::{BgzfParams, BgzfReader, BgzfWriter};
//! use std::io::{Read, Write};
//!
//! let data: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
//! let mut writer = BgzfWriter::new(Vec::new(), BgzfParams::default());
//! writer.write_all(&data).unwrap();
//! let compressed = writer.finish().unwrap();
//! assert!(compressed.ends_with(&giraf::bgzf::EOF_MARKER));
//!
//! let mut reader = BgzfReader::new(&compressed[..]);
//! let mut decompressed = Vec::new();
//! reader.read_to_end(&mut decompressed).unwrap();
//! assert_eq!(decompressed, data);
//! ```

use std::io::{self, Read, Write};
use std::thread;

use byteorder::{LittleEndian, WriteBytesExt};

use flate2::Compression;
use flate2::Crc;
use flate2::read::MultiGzDecoder;
use flate2::write::DeflateEncoder;

use log::debug;

//-----------------------------------------------------------------------------

/// Maximum amount of uncompressed data in a block.
pub const MAX_BLOCK_DATA: usize = 0xFF00;

/// Maximum size of a compressed block, including the header and the footer.
pub const MAX_BLOCK_SIZE: usize = 0x10000;

// Header with the `BC` subfield; the last two bytes are the block size minus one.
const HEADER: [u8; 16] = [
    0x1F, 0x8B, 0x08, 0x04, // magic, deflate, FEXTRA
    0x00, 0x00, 0x00, 0x00, // mtime
    0x00, 0xFF, // extra flags, unknown OS
    0x06, 0x00, // XLEN
    b'B', b'C', 0x02, 0x00, // subfield identifier and length
];

const HEADER_SIZE: usize = HEADER.len() + 2;

// CRC32 and uncompressed size.
const FOOTER_SIZE: usize = 8;

/// The empty block at the end of a BGZF file.
pub const EOF_MARKER: [u8; 28] = [
    0x1F, 0x8B, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1B, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

/// Compression parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BgzfParams {
    /// Number of blocks compressed in parallel.
    pub threads: usize,
    /// Compression level from 0 to 9.
    pub level: u32,
}

impl BgzfParams {
    /// Default compression level.
    pub const DEFAULT_LEVEL: u32 = 6;

    /// Maximum compression level.
    pub const MAX_LEVEL: u32 = 9;
}

impl Default for BgzfParams {
    fn default() -> Self {
        BgzfParams {
            threads: 1,
            level: Self::DEFAULT_LEVEL,
        }
    }
}

//-----------------------------------------------------------------------------

fn deflate(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len()), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Compresses the data into a single BGZF block.
///
/// Returns an error if there is more than [`MAX_BLOCK_DATA`] bytes of data.
pub fn compress_block(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    if data.len() > MAX_BLOCK_DATA {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Cannot compress {} bytes into a single block", data.len())
        ));
    }

    let mut compressed = deflate(data, level)?;
    if HEADER_SIZE + compressed.len() + FOOTER_SIZE > MAX_BLOCK_SIZE {
        compressed = deflate(data, 0)?;
    }
    let block_size = HEADER_SIZE + compressed.len() + FOOTER_SIZE;
    if block_size > MAX_BLOCK_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("Compressed block size {} exceeds the maximum {}", block_size, MAX_BLOCK_SIZE)
        ));
    }

    let mut crc = Crc::new();
    crc.update(data);

    let mut block: Vec<u8> = Vec::with_capacity(block_size);
    block.extend_from_slice(&HEADER);
    block.write_u16::<LittleEndian>((block_size - 1) as u16)?;
    block.extend_from_slice(&compressed);
    block.write_u32::<LittleEndian>(crc.sum())?;
    block.write_u32::<LittleEndian>(data.len() as u32)?;
    Ok(block)
}

//-----------------------------------------------------------------------------

/// A writer that compresses the data in BGZF format.
///
/// The data is buffered until there is enough for one block per thread.
/// The blocks are then compressed in parallel and written in order.
/// Call [`BgzfWriter::finish`] to write the remaining data and the EOF marker.
/// If the writer is dropped without finishing, the same is attempted and any errors are ignored.
pub struct BgzfWriter<W: Write> {
    inner: Option<W>,
    params: BgzfParams,
    buffer: Vec<u8>,
    blocks: usize,
    bytes: usize,
}

impl<W: Write> BgzfWriter<W> {
    /// Creates a new writer with the given parameters.
    ///
    /// The number of threads is at least 1, and the level is capped at [`BgzfParams::MAX_LEVEL`].
    pub fn new(inner: W, params: BgzfParams) -> Self {
        let params = BgzfParams {
            threads: params.threads.max(1),
            level: params.level.min(BgzfParams::MAX_LEVEL),
        };
        let capacity = params.threads * MAX_BLOCK_DATA;
        BgzfWriter {
            inner: Some(inner),
            params,
            buffer: Vec::with_capacity(capacity),
            blocks: 0,
            bytes: 0,
        }
    }

    /// Returns the number of blocks written so far, excluding the EOF marker.
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Returns the number of compressed bytes written so far.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn capacity(&self) -> usize {
        self.params.threads * MAX_BLOCK_DATA
    }

    // Compresses and writes all buffered data.
    fn write_blocks(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let level = self.params.level;
        let chunks: Vec<&[u8]> = self.buffer.chunks(MAX_BLOCK_DATA).collect();
        let compressed: Vec<io::Result<Vec<u8>>> = if chunks.len() == 1 {
            vec![compress_block(chunks[0], level)]
        } else {
            thread::scope(|scope| {
                let handles: Vec<_> = chunks.iter().map(|&chunk| {
                    scope.spawn(move || compress_block(chunk, level))
                }).collect();
                handles.into_iter().map(|handle| {
                    handle.join().unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "Compression thread panicked")))
                }).collect()
            })
        };

        let inner = self.inner.as_mut().ok_or(io::Error::new(io::ErrorKind::Other, "Writer has already been finished"))?;
        let mut total = 0;
        for block in compressed {
            let block = block?;
            inner.write_all(&block)?;
            total += block.len();
            self.blocks += 1;
        }
        debug!("Wrote {} bytes of data in {} compressed bytes", self.buffer.len(), total);
        self.bytes += total;
        self.buffer.clear();
        Ok(())
    }

    /// Writes the remaining data and the EOF marker and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.finish_stream()?;
        self.inner.take().ok_or(io::Error::new(io::ErrorKind::Other, "Writer has already been finished"))
    }

    fn finish_stream(&mut self) -> io::Result<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        self.write_blocks()?;
        if let Some(inner) = self.inner.as_mut() {
            inner.write_all(&EOF_MARKER)?;
            inner.flush()?;
        }
        self.bytes += EOF_MARKER.len();
        debug!("Finished a BGZF stream with {} blocks", self.blocks);
        Ok(())
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.buffer.len() >= self.capacity() {
            self.write_blocks()?;
        }
        let len = buf.len().min(self.capacity() - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..len]);
        Ok(len)
    }

    // Partial blocks are compressed on flush.
    fn flush(&mut self) -> io::Result<()> {
        self.write_blocks()?;
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for BgzfWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.finish_stream();
        }
    }
}

//-----------------------------------------------------------------------------

/// A reader that decompresses BGZF data.
///
/// Plain gzip files with one or more members are also accepted.
pub struct BgzfReader<R: Read> {
    inner: MultiGzDecoder<R>,
}

impl<R: Read> BgzfReader<R> {
    /// Creates a new reader.
    pub fn new(inner: R) -> Self {
        BgzfReader {
            inner: MultiGzDecoder::new(inner),
        }
    }

    /// Returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use byteorder::{ByteOrder, LittleEndian};
    use rand::Rng;

    fn compress(data: &[u8], params: BgzfParams) -> Vec<u8> {
        let mut writer = BgzfWriter::new(Vec::new(), params);
        let result = writer.write_all(data);
        assert!(result.is_ok(), "Failed to write data: {}", result.unwrap_err());
        let result = writer.finish();
        assert!(result.is_ok(), "Failed to finish the stream: {}", result.unwrap_err());
        result.unwrap()
    }

    fn decompress(data: &[u8]) -> Vec<u8> {
        let mut reader = BgzfReader::new(data);
        let mut result = Vec::new();
        let status = reader.read_to_end(&mut result);
        assert!(status.is_ok(), "Failed to decompress data: {}", status.unwrap_err());
        result
    }

    // Returns the sizes of the blocks in the stream.
    fn block_sizes(data: &[u8]) -> Vec<usize> {
        let mut result = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let block = &data[offset..];
            assert!(block.len() >= EOF_MARKER.len(), "Incomplete block at offset {}", offset);
            assert_eq!(&block[0..16], &HEADER, "Invalid block header at offset {}", offset);
            let size = LittleEndian::read_u16(&block[16..18]) as usize + 1;
            assert!(size <= MAX_BLOCK_SIZE, "Block at offset {} is too large", offset);
            result.push(size);
            offset += size;
        }
        assert_eq!(offset, data.len(), "Blocks do not cover the stream");
        result
    }

    fn random_data(len: usize, alphabet: u8) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen_range(0..alphabet)).collect()
    }

    #[test]
    fn empty_stream() {
        let compressed = compress(&[], BgzfParams::default());
        assert_eq!(compressed, EOF_MARKER.to_vec());
        assert!(decompress(&compressed).is_empty());
    }

    #[test]
    fn eof_marker_is_a_block() {
        let empty = compress_block(&[], BgzfParams::DEFAULT_LEVEL).unwrap();
        assert_eq!(block_sizes(&empty), vec![empty.len()]);
        assert!(decompress(&empty).is_empty());
        assert_eq!(block_sizes(&EOF_MARKER), vec![EOF_MARKER.len()]);
    }

    #[test]
    fn single_thread() {
        let data = random_data(5 * MAX_BLOCK_DATA + 123, 4);
        let compressed = compress(&data, BgzfParams::default());
        let sizes = block_sizes(&compressed);
        assert_eq!(sizes.len(), 7, "Expected 6 data blocks and the EOF marker");
        assert_eq!(decompress(&compressed), data);
    }

    #[test]
    fn multiple_threads() {
        let data = random_data(10 * MAX_BLOCK_DATA + 1, 16);
        let single = compress(&data, BgzfParams::default());
        let parallel = compress(&data, BgzfParams { threads: 4, level: BgzfParams::DEFAULT_LEVEL });
        assert_eq!(parallel, single, "Parallel compression changed the output");
        assert_eq!(decompress(&parallel), data);
    }

    #[test]
    fn incompressible_data() {
        let data = random_data(3 * MAX_BLOCK_DATA, u8::MAX);
        for level in [0, 1, 9] {
            let compressed = compress(&data, BgzfParams { threads: 2, level });
            block_sizes(&compressed);
            assert_eq!(decompress(&compressed), data, "Wrong data at level {}", level);
        }
    }

    #[test]
    fn small_writes_and_flush() {
        let data = random_data(3 * MAX_BLOCK_DATA, 4);
        let mut writer = BgzfWriter::new(Vec::new(), BgzfParams::default());
        for chunk in data.chunks(1000) {
            writer.write_all(chunk).unwrap();
        }
        writer.flush().unwrap();
        assert_eq!(writer.blocks(), 3);
        let compressed = writer.finish().unwrap();
        assert_eq!(decompress(&compressed), data);
    }

    #[test]
    fn oversized_block() {
        let data = vec![0; MAX_BLOCK_DATA + 1];
        assert!(compress_block(&data, BgzfParams::DEFAULT_LEVEL).is_err());
    }

    #[test]
    fn finish_on_drop() {
        let data = random_data(1000, 4);
        let mut buffer = Vec::new();
        {
            let mut writer = BgzfWriter::new(&mut buffer, BgzfParams::default());
            writer.write_all(&data).unwrap();
        }
        assert!(buffer.ends_with(&EOF_MARKER));
        assert_eq!(decompress(&buffer), data);
    }
}

//-----------------------------------------------------------------------------
