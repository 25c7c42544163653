//! Reference graphs used for reconstructing read sequences.
//!
//! The decoder only needs the sequences of the nodes on the target path.
//! Any structure implementing [`ReferenceGraph`] can provide them.
//! This module includes an in-memory [`SequenceGraph`] that can be loaded from GFA, as well as an implementation for [`gbwt::GBZ`].
//!
//! Node identifiers are unsigned integers, and node sequences are always read in the forward orientation.

use crate::bases::{Base, PackedBases};
use crate::{utils, GirafError, Result};

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use gbwt::GBZ;

use log::debug;


//-----------------------------------------------------------------------------

/// A read-only source of node sequences.
///
/// The graph may be shared between threads decoding records in parallel.
pub trait ReferenceGraph {
    /// Returns the length of the node sequence, or [`None`] if there is no such node.
    fn node_len(&self, node_id: u32) -> Option<usize>;

    /// Returns the bases in the semiopen interval `start..end` of the node sequence.
    ///
    /// Returns [`GirafError::UnknownNode`] if the node does not exist.
    fn bases(&self, node_id: u32, start: usize, end: usize) -> Result<Vec<Base>>;

    /// Returns the reference sequence covered by the path.
    ///
    /// The sequence starts at offset `t_start` of the first node and ends before offset `t_end` of the last node.
    /// Nodes between the first and the last node are included in full.
    fn path_bases(&self, path: &[u32], t_start: usize, t_end: usize) -> Result<Vec<Base>> {
        let mut result = Vec::new();
        let (first, last) = match (path.first(), path.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(result),
        };
        if path.len() == 1 {
            if t_end < t_start {
                return Err(GirafError::InvalidRecord(format!(
                    "Target interval {}..{} on a single node is reversed", t_start, t_end
                )));
            }
            return self.bases(first, t_start, t_end);
        }

        let first_len = self.node_len(first).ok_or(GirafError::UnknownNode(first))?;
        result.extend(self.bases(first, t_start, first_len)?);
        for &node_id in &path[1..path.len() - 1] {
            let len = self.node_len(node_id).ok_or(GirafError::UnknownNode(node_id))?;
            result.extend(self.bases(node_id, 0, len)?);
        }
        result.extend(self.bases(last, 0, t_end)?);
        Ok(result)
    }
}

// Checks that the interval is valid for a node of the given length.
fn check_interval(node_id: u32, start: usize, end: usize, len: usize) -> Result<()> {
    if start > end || end > len {
        return Err(GirafError::InvalidRecord(format!(
            "Interval {}..{} is outside node {} of length {}", start, end, node_id, len
        )));
    }
    Ok(())
}

//-----------------------------------------------------------------------------

/// An in-memory graph storing only node sequences.
///
/// # Examples
///
/// ```
/// use giraf::graph::{ReferenceGraph, SequenceGraph};
/// use giraf::bases;
///
/// let gfa = b"H\tVN:Z:1.1\nS\t1\tGATT\nS\t2\tACA\nL\t1\t+\t2\t+\t0M\n";
/// let graph = SequenceGraph::from_gfa(&gfa[..]).unwrap();
/// assert_eq!(graph.nodes(), 2);
/// let seq = graph.path_bases(&[1, 2], 1, 2).unwrap();
/// assert_eq!(bases::bases_to_ascii(&seq), b"ATTAC".to_vec());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceGraph {
    sequences: BTreeMap<u32, PackedBases>,
}

impl SequenceGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes in the graph.
    pub fn nodes(&self) -> usize {
        self.sequences.len()
    }

    /// Returns `true` if the graph contains the node.
    pub fn has_node(&self, node_id: u32) -> bool {
        self.sequences.contains_key(&node_id)
    }

    /// Adds a node with the given sequence, replacing any existing node with the same identifier.
    pub fn add_node(&mut self, node_id: u32, sequence: &[Base]) {
        self.sequences.insert(node_id, PackedBases::from_bases(sequence));
    }

    /// Reads the graph from GFA segment lines.
    ///
    /// Lines other than `S` lines are ignored.
    /// Segment names must be unsigned integers.
    pub fn from_gfa<R: BufRead>(reader: R) -> Result<Self> {
        let mut result = SequenceGraph::new();
        for (line_num, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            let line = line.strip_suffix(b"\r").unwrap_or(&line);
            if !line.starts_with(b"S\t") {
                continue;
            }
            let mut fields = line.split(|&c| c == b'\t').skip(1);
            let name = fields.next().unwrap_or_default();
            let node_id = std::str::from_utf8(name).ok().and_then(|s| s.parse::<u32>().ok()).ok_or(
                GirafError::Parse(format!("Line {}: segment name {} is not a node identifier", line_num + 1, String::from_utf8_lossy(name)))
            )?;
            let sequence = fields.next().ok_or(
                GirafError::Parse(format!("Line {}: missing sequence for segment {}", line_num + 1, node_id))
            )?;
            result.sequences.insert(node_id, sequence.iter().map(|&c| Base::from_ascii(c)).collect());
        }
        Ok(result)
    }

    /// Loads the graph from a GFA file, which may be gzip-compressed.
    pub fn load_gfa<P: AsRef<Path>>(filename: P) -> Result<Self> {
        debug!("Loading GFA segments from {}", filename.as_ref().display());
        let reader = utils::open_file(&filename)?;
        let graph = Self::from_gfa(reader)?;
        debug!("Loaded {} segments", graph.nodes());
        Ok(graph)
    }
}

impl ReferenceGraph for SequenceGraph {
    fn node_len(&self, node_id: u32) -> Option<usize> {
        self.sequences.get(&node_id).map(|seq| seq.len())
    }

    fn bases(&self, node_id: u32, start: usize, end: usize) -> Result<Vec<Base>> {
        let sequence = self.sequences.get(&node_id).ok_or(GirafError::UnknownNode(node_id))?;
        check_interval(node_id, start, end, sequence.len())?;
        sequence.slice(start..end)
    }
}

//-----------------------------------------------------------------------------

impl ReferenceGraph for GBZ {
    fn node_len(&self, node_id: u32) -> Option<usize> {
        self.sequence_len(node_id as usize)
    }

    fn bases(&self, node_id: u32, start: usize, end: usize) -> Result<Vec<Base>> {
        let sequence = self.sequence(node_id as usize).ok_or(GirafError::UnknownNode(node_id))?;
        check_interval(node_id, start, end, sequence.len())?;
        Ok(sequence[start..end].iter().map(|&c| Base::from_ascii(c)).collect())
    }
}

//-----------------------------------------------------------------------------
