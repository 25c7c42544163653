//! Typed annotations attached to alignment records.
//!
//! An annotation corresponds to a SAM-style optional field `TAG:TYPE:VALUE`.
//! In the binary format, it is stored as the tag (2 bytes), the type (1 byte), and a type-dependent payload:
//!
//! * `A`, `c`, `C`: 1 byte.
//! * `s`, `S`: 2 bytes, little-endian.
//! * `i`, `I`, `f`: 4 bytes, little-endian. Floats are stored as IEEE-754 bit patterns.
//! * `Z`, `H`, `B`: the raw value followed by a `0` byte.
//!
//! # Examples
//!
//! ```
//! use giraf::annotation::{Annotation, AnnotationValue};
//!
//! let field = Annotation::parse(b"NM:i:3").unwrap();
//! assert_eq!(field.value, AnnotationValue::Int32(3));
//! let bytes = field.encode();
//! assert_eq!(bytes, vec![b'N', b'M', b'i', 3, 0, 0, 0]);
//! let (decoded, len) = Annotation::decode(&bytes).unwrap();
//! assert_eq!(decoded, field);
//! assert_eq!(len, bytes.len());
//! assert_eq!(decoded.to_string(), "NM:i:3");
//! ```

use crate::{GirafError, Result};

use std::fmt::Display;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};

//-----------------------------------------------------------------------------

/// Value of an annotation.
///
/// String values are stored without the terminating `0` byte.
#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationValue {
    /// `A`: a printable character.
    Char(u8),
    /// `c`: signed 8-bit integer.
    Int8(i8),
    /// `C`: unsigned 8-bit integer.
    UInt8(u8),
    /// `s`: signed 16-bit integer.
    Int16(i16),
    /// `S`: unsigned 16-bit integer.
    UInt16(u16),
    /// `i`: signed 32-bit integer.
    Int32(i32),
    /// `I`: unsigned 32-bit integer.
    UInt32(u32),
    /// `f`: single-precision float.
    Float32(f32),
    /// `Z`: a string.
    Str(Vec<u8>),
    /// `H`: a hex string.
    Hex(Vec<u8>),
    /// `B`: an opaque byte string.
    Bytes(Vec<u8>),
}

impl AnnotationValue {
    /// Supported type bytes.
    pub const TYPES: &'static [u8] = b"AcCsSiIfZHB";

    /// Returns the type byte of the value.
    pub fn type_byte(&self) -> u8 {
        match self {
            AnnotationValue::Char(_) => b'A',
            AnnotationValue::Int8(_) => b'c',
            AnnotationValue::UInt8(_) => b'C',
            AnnotationValue::Int16(_) => b's',
            AnnotationValue::UInt16(_) => b'S',
            AnnotationValue::Int32(_) => b'i',
            AnnotationValue::UInt32(_) => b'I',
            AnnotationValue::Float32(_) => b'f',
            AnnotationValue::Str(_) => b'Z',
            AnnotationValue::Hex(_) => b'H',
            AnnotationValue::Bytes(_) => b'B',
        }
    }

    /// Returns the payload size for fixed-size types, or [`None`] for strings.
    ///
    /// Returns [`GirafError::UnknownAnnotationType`] for unsupported types.
    fn fixed_size(typ: u8) -> Result<Option<usize>> {
        match typ {
            b'A' | b'c' | b'C' => Ok(Some(1)),
            b's' | b'S' => Ok(Some(2)),
            b'i' | b'I' | b'f' => Ok(Some(4)),
            b'Z' | b'H' | b'B' => Ok(None),
            _ => Err(GirafError::UnknownAnnotationType(typ)),
        }
    }

    fn parse_number<T: FromStr>(value: &str, typ: u8) -> Result<T>
    where
        T::Err: Display,
    {
        value.trim().parse::<T>().map_err(|err| {
            GirafError::InvalidAnnotation(format!("Invalid value {} for type {}: {}", value, typ as char, err))
        })
    }

    fn string_payload(value: &str) -> Result<Vec<u8>> {
        let bytes = value.as_bytes();
        let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
        if bytes.contains(&0) {
            return Err(GirafError::InvalidAnnotation(format!("String value {:?} contains a 0 byte", value)));
        }
        Ok(bytes.to_vec())
    }

    /// Parses a value of the given type from text.
    ///
    /// A single trailing `0` byte in a string value is ignored.
    pub fn from_text(typ: u8, value: &str) -> Result<Self> {
        match typ {
            b'A' => {
                if value.len() != 1 {
                    return Err(GirafError::InvalidAnnotation(format!("Invalid char value: {}", value)));
                }
                Ok(AnnotationValue::Char(value.as_bytes()[0]))
            },
            b'c' => Ok(AnnotationValue::Int8(Self::parse_number(value, typ)?)),
            b'C' => Ok(AnnotationValue::UInt8(Self::parse_number(value, typ)?)),
            b's' => Ok(AnnotationValue::Int16(Self::parse_number(value, typ)?)),
            b'S' => Ok(AnnotationValue::UInt16(Self::parse_number(value, typ)?)),
            b'i' => Ok(AnnotationValue::Int32(Self::parse_number(value, typ)?)),
            b'I' => Ok(AnnotationValue::UInt32(Self::parse_number(value, typ)?)),
            b'f' => Ok(AnnotationValue::Float32(Self::parse_number(value, typ)?)),
            b'Z' => Ok(AnnotationValue::Str(Self::string_payload(value)?)),
            b'H' => Ok(AnnotationValue::Hex(Self::string_payload(value)?)),
            b'B' => Ok(AnnotationValue::Bytes(Self::string_payload(value)?)),
            _ => Err(GirafError::UnknownAnnotationType(typ)),
        }
    }
}

impl Display for AnnotationValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotationValue::Char(value) => write!(f, "{}", *value as char),
            AnnotationValue::Int8(value) => write!(f, "{}", value),
            AnnotationValue::UInt8(value) => write!(f, "{}", value),
            AnnotationValue::Int16(value) => write!(f, "{}", value),
            AnnotationValue::UInt16(value) => write!(f, "{}", value),
            AnnotationValue::Int32(value) => write!(f, "{}", value),
            AnnotationValue::UInt32(value) => write!(f, "{}", value),
            AnnotationValue::Float32(value) => write!(f, "{}", value),
            AnnotationValue::Str(value) | AnnotationValue::Hex(value) | AnnotationValue::Bytes(value) => {
                write!(f, "{}", String::from_utf8_lossy(value))
            },
        }
    }
}

//-----------------------------------------------------------------------------

/// A tagged annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Two-character tag.
    pub tag: [u8; 2],
    /// Typed value.
    pub value: AnnotationValue,
}

impl Annotation {
    // Tag and type.
    const HEADER_SIZE: usize = 3;

    /// Creates a new annotation.
    pub fn new(tag: [u8; 2], value: AnnotationValue) -> Self {
        Annotation { tag, value }
    }

    /// Creates an annotation from a tag, a type byte, and a value in text form.
    ///
    /// Returns an error if the tag is not exactly 2 bytes, if the type is unsupported, or if the value cannot be parsed.
    pub fn from_text(tag: &[u8], typ: u8, value: &str) -> Result<Self> {
        let tag: [u8; 2] = tag.try_into().map_err(|_| {
            GirafError::InvalidAnnotation(format!("Invalid tag: {}", String::from_utf8_lossy(tag)))
        })?;
        let value = AnnotationValue::from_text(typ, value)?;
        Ok(Annotation { tag, value })
    }

    /// Parses the annotation from a `TAG:TYPE:VALUE` string.
    pub fn parse(field: &[u8]) -> Result<Self> {
        if field.len() < 5 || field[2] != b':' || field[4] != b':' {
            return Err(GirafError::Parse(format!("Invalid annotation: {}", String::from_utf8_lossy(field))));
        }
        let value = std::str::from_utf8(&field[5..]).map_err(|err| {
            GirafError::Parse(format!("Invalid annotation value: {}", err))
        })?;
        Self::from_text(&field[0..2], field[3], value)
    }

    /// Returns the type byte of the annotation.
    pub fn type_byte(&self) -> u8 {
        self.value.type_byte()
    }

    /// Returns the size of the encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + match &self.value {
            AnnotationValue::Char(_) | AnnotationValue::Int8(_) | AnnotationValue::UInt8(_) => 1,
            AnnotationValue::Int16(_) | AnnotationValue::UInt16(_) => 2,
            AnnotationValue::Int32(_) | AnnotationValue::UInt32(_) | AnnotationValue::Float32(_) => 4,
            AnnotationValue::Str(value) | AnnotationValue::Hex(value) | AnnotationValue::Bytes(value) => value.len() + 1,
        }
    }

    /// Appends the encoding to the buffer.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.tag);
        buffer.push(self.type_byte());
        match &self.value {
            AnnotationValue::Char(value) => buffer.push(*value),
            AnnotationValue::Int8(value) => buffer.push(*value as u8),
            AnnotationValue::UInt8(value) => buffer.push(*value),
            AnnotationValue::Int16(value) => buffer.extend_from_slice(&value.to_le_bytes()),
            AnnotationValue::UInt16(value) => buffer.extend_from_slice(&value.to_le_bytes()),
            AnnotationValue::Int32(value) => buffer.extend_from_slice(&value.to_le_bytes()),
            AnnotationValue::UInt32(value) => buffer.extend_from_slice(&value.to_le_bytes()),
            AnnotationValue::Float32(value) => buffer.extend_from_slice(&value.to_bits().to_le_bytes()),
            AnnotationValue::Str(value) | AnnotationValue::Hex(value) | AnnotationValue::Bytes(value) => {
                buffer.extend_from_slice(value);
                buffer.push(0);
            },
        }
    }

    /// Returns the encoding as a new buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut result);
        result
    }

    /// Decodes an annotation from the start of the buffer.
    ///
    /// Returns the annotation and the number of bytes consumed.
    pub fn decode(buffer: &[u8]) -> Result<(Self, usize)> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(GirafError::truncated(Self::HEADER_SIZE, buffer.len()));
        }
        let tag = [buffer[0], buffer[1]];
        let typ = buffer[2];
        let payload = &buffer[Self::HEADER_SIZE..];

        let size = match AnnotationValue::fixed_size(typ)? {
            Some(size) => size,
            None => {
                let len = payload.iter().position(|&c| c == 0).ok_or(
                    GirafError::truncated(buffer.len() + 1, buffer.len())
                )?;
                let bytes = payload[..len].to_vec();
                let value = match typ {
                    b'Z' => AnnotationValue::Str(bytes),
                    b'H' => AnnotationValue::Hex(bytes),
                    _ => AnnotationValue::Bytes(bytes),
                };
                return Ok((Annotation { tag, value }, Self::HEADER_SIZE + len + 1));
            },
        };
        if payload.len() < size {
            return Err(GirafError::truncated(Self::HEADER_SIZE + size, buffer.len()));
        }

        let value = match typ {
            b'A' => AnnotationValue::Char(payload[0]),
            b'c' => AnnotationValue::Int8(payload[0] as i8),
            b'C' => AnnotationValue::UInt8(payload[0]),
            b's' => AnnotationValue::Int16(LittleEndian::read_i16(payload)),
            b'S' => AnnotationValue::UInt16(LittleEndian::read_u16(payload)),
            b'i' => AnnotationValue::Int32(LittleEndian::read_i32(payload)),
            b'I' => AnnotationValue::UInt32(LittleEndian::read_u32(payload)),
            _ => AnnotationValue::Float32(f32::from_bits(LittleEndian::read_u32(payload))),
        };
        Ok((Annotation { tag, value }, Self::HEADER_SIZE + size))
    }

    /// Decodes all annotations in the buffer.
    ///
    /// The annotations must cover the buffer exactly.
    pub fn decode_all(buffer: &[u8]) -> Result<Vec<Self>> {
        let mut result = Vec::new();
        let mut offset = 0;
        while offset < buffer.len() {
            let (annotation, len) = Self::decode(&buffer[offset..])?;
            result.push(annotation);
            offset += len;
        }
        Ok(result)
    }
}

/// Encodes an annotation given as a tag, a type byte, and a value in text form.
pub fn encode(tag: &[u8], typ: u8, value: &str) -> Result<Vec<u8>> {
    Ok(Annotation::from_text(tag, typ, value)?.encode())
}

impl Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}:{}:{}", self.tag[0] as char, self.tag[1] as char, self.type_byte() as char, self.value)
    }
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
