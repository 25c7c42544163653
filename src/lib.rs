//! # Giraf: compact binary records for sequence to graph alignments
//!
//! A giraf record describes the alignment of a read to a path in a pangenome graph.
//! The text format stores the read name, the target path, the CIGAR string, the full read sequence, the base quality values, and optional SAM-style annotations.
//! This crate implements a binary encoding that is considerably smaller:
//!
//! * Read bases that match the reference are dropped, as they can be copied from the graph when decoding.
//! * The remaining bases are packed at 3 bits per base; see [`PackedBases`].
//! * CIGAR operations and base quality values are stored as runs; see [`rle`].
//! * Annotations use a compact typed encoding; see [`Annotation`].
//! * Each record is prefixed by its size, so records can be concatenated into a stream; see [`stream`].
//!
//! Record streams are usually compressed with BGZF ([`bgzf`]).
//! See [`AlignmentRecord`] for the binary layout and [`formats`] for the text format.
//!
//! ### Reference graphs
//!
//! Decoding a record requires the sequences of the nodes on its path.
//! They are provided by any type implementing [`ReferenceGraph`].
//! The crate includes [`SequenceGraph`], which can be loaded from GFA, and an implementation for [`gbwt::GBZ`].
//!
//! ### Explicit bases
//!
//! Records written by older tools select the explicit bases with a cursor rule that is incorrect for some CIGAR strings.
//! The rule is selected with [`EncoderParams`]; see [`QueryCursor`] for details.

pub mod annotation;
pub mod bases;
pub mod bgzf;
pub mod cigar;
pub mod error;
pub mod formats;
pub mod graph;
pub mod record;
pub mod rle;
pub mod stream;
pub mod utils;

pub use annotation::{Annotation, AnnotationValue};
pub use bases::{Base, PackedBases};
pub use bgzf::{BgzfParams, BgzfReader, BgzfWriter};
pub use cigar::{Cigar, CigarCode};
pub use error::{GirafError, Result};
pub use graph::{ReferenceGraph, SequenceGraph};
pub use record::{AlignmentRecord, EncodedRecord, EncoderParams, QueryCursor};
pub use rle::RunLengthOp;
pub use stream::{RecordReader, RecordWriter};
