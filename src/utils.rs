//! Utility functions for working with files.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

//-----------------------------------------------------------------------------

/// Returns a human-readable representation of the given number of bytes.
///
/// Sizes use binary units from bytes to pebibytes.
pub fn human_readable_size(bytes: usize) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.3} {}", value, UNITS[unit])
}

/// Returns a human-readable size of the file, or [`None`] if the file cannot be accessed.
pub fn file_size<P: AsRef<Path>>(filename: P) -> Option<String> {
    fs::metadata(filename).ok().map(|metadata| human_readable_size(metadata.len() as usize))
}

/// Returns `true` if the path refers to an existing file or directory.
pub fn file_exists<P: AsRef<Path>>(filename: P) -> bool {
    filename.as_ref().exists()
}

/// Gzip magic number, shared by BGZF files.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Returns `true` if the buffered data starts with the gzip magic number.
///
/// The reader position is not changed.
pub fn starts_with_gzip_magic<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    let buffer = reader.fill_buf()?;
    Ok(buffer.starts_with(&GZIP_MAGIC))
}

/// Returns a buffered reader for the file, decompressing it if it is gzip-compressed.
///
/// Multi-member files, including BGZF, are read through all members.
pub fn open_file<P: AsRef<Path>>(filename: P) -> io::Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(File::open(filename)?);
    if starts_with_gzip_magic(&mut reader)? {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
