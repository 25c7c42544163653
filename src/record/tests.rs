use super::*;

use crate::annotation::AnnotationValue;
use crate::bases;
use crate::graph::SequenceGraph;

use rand::Rng;

//-----------------------------------------------------------------------------

// Graph and record construction.

fn test_graph() -> SequenceGraph {
    let mut graph = SequenceGraph::new();
    graph.add_node(1, &bases::bases_from_ascii(b"GATTACA"));
    graph.add_node(2, &bases::bases_from_ascii(b"CATTAG"));
    graph.add_node(3, &bases::bases_from_ascii(b"ACGTACGTAC"));
    graph
}

fn annotations(count: usize) -> Vec<Annotation> {
    let all = [
        Annotation::new(*b"NM", AnnotationValue::Int32(2)),
        Annotation::new(*b"RG", AnnotationValue::Str(b"group1".to_vec())),
        Annotation::new(*b"XF", AnnotationValue::Float32(-0.5)),
        Annotation::new(*b"XC", AnnotationValue::Char(b'+')),
        Annotation::new(*b"XS", AnnotationValue::UInt16(1000)),
        Annotation::new(*b"XB", AnnotationValue::Bytes(vec![1, 2, 3])),
    ];
    all.iter().cycle().take(count).cloned().collect()
}

// Reference for path [1, 2, 3] from offset 3 to offset 4 is TACA CATTAG ACGT.
fn known_record(num_annotations: usize) -> AlignmentRecord {
    AlignmentRecord {
        name: String::from("read/1"),
        flag: AlignmentRecord::FLAG_REVERSE | AlignmentRecord::FLAG_FIRST,
        path: vec![1, 2, 3],
        t_start: 3,
        t_end: 4,
        cigar: cigar::parse_cigar(b"2S4=1X3=2I5=1S").unwrap(),
        sequence: bases::bases_from_ascii(b"NNTACAGATTGGAGACGC"),
        score: -17,
        mapq: 42,
        quality: rle::encode(&[40, 40, 30, 30, 30, 30, 20, 20, 20, 20, 20, 10, 10, 30, 30, 30, 30, 2]),
        annotations: annotations(num_annotations),
    }
}

fn check_round_trip(record: &AlignmentRecord, graph: &SequenceGraph, params: &EncoderParams, name: &str) {
    let encoded = record.encode(params);
    assert!(encoded.is_ok(), "Failed to encode {}: {}", name, encoded.unwrap_err());
    let encoded = encoded.unwrap();

    let block_size = LittleEndian::read_u32(&encoded) as usize;
    assert_eq!(block_size + 4, encoded.len(), "Wrong block size for {}", name);
    assert_eq!(record.encoded_len(params).unwrap(), encoded.len(), "Wrong predicted size for {}", name);

    let decoded = AlignmentRecord::decode(&encoded, graph);
    assert!(decoded.is_ok(), "Failed to decode {}: {}", name, decoded.unwrap_err());
    let (decoded, len) = decoded.unwrap();
    assert_eq!(len, encoded.len(), "Wrong number of bytes consumed for {}", name);
    assert_eq!(&decoded, record, "Wrong decoded record for {}", name);
}

//-----------------------------------------------------------------------------

// Explicit bases.

#[test]
fn explicit_bases_known() {
    let cigar = cigar::parse_cigar(b"1S4=2I1X3=").unwrap();
    let read = bases::bases_from_ascii(b"ACGTGGTCA");
    let explicit = collect_explicit_bases(&cigar, &read, QueryCursor::Legacy);
    assert!(explicit.is_ok(), "Failed to collect explicit bases: {}", explicit.unwrap_err());
    let explicit = explicit.unwrap();
    assert_eq!(explicit.len(), 4);
    assert_eq!(explicit.to_bases(), bases::bases_from_ascii(b"AGTC"));
}

#[test]
fn legacy_and_strict_cursors() {
    let cigar = cigar::parse_cigar(b"2=2D1X2=").unwrap();
    let read = bases::bases_from_ascii(b"ACGTA");
    assert!(legacy_cursor_diverges(&cigar));

    let strict = collect_explicit_bases(&cigar, &read, QueryCursor::Strict).unwrap();
    assert_eq!(strict.to_bases(), vec![Base::G], "Wrong explicit base with the strict cursor");
    // The legacy cursor skips two read bases for the deletion.
    let legacy = collect_explicit_bases(&cigar, &read, QueryCursor::Legacy).unwrap();
    assert_eq!(legacy.to_bases(), vec![Base::A], "Wrong explicit base with the legacy cursor");

    // Past the end of the read.
    let cigar = cigar::parse_cigar(b"4=3D1X").unwrap();
    let read = bases::bases_from_ascii(b"ACGTA");
    assert!(collect_explicit_bases(&cigar, &read, QueryCursor::Legacy).is_err());
    assert!(collect_explicit_bases(&cigar, &read, QueryCursor::Strict).is_ok());

    let cigar = cigar::parse_cigar(b"2S3=1X1I3=2D").unwrap();
    assert!(!legacy_cursor_diverges(&cigar), "Trailing deletion reported as divergent");
}

//-----------------------------------------------------------------------------

// Encoding and decoding.

#[test]
fn known_layout() {
    let mut graph = SequenceGraph::new();
    graph.add_node(7, &bases::bases_from_ascii(b"ACGT"));
    let record = AlignmentRecord {
        name: String::from("r"),
        flag: AlignmentRecord::FLAG_REVERSE,
        path: vec![7],
        t_start: 1,
        t_end: 4,
        cigar: cigar::parse_cigar(b"1X2=").unwrap(),
        sequence: bases::bases_from_ascii(b"TGT"),
        score: -1,
        mapq: 60,
        quality: rle::encode(&[30u8, 30, 30]),
        annotations: vec![Annotation::new(*b"NM", AnnotationValue::UInt8(1))],
    };
    let encoded = record.encode(&EncoderParams::default()).unwrap();

    let mut truth: Vec<u8> = Vec::new();
    truth.extend_from_slice(&(29u32 + 1 + 4 + 3 * 2 + 8 + 3 + 4).to_le_bytes());
    truth.extend_from_slice(&[1, b'r', 0x10]);
    truth.extend_from_slice(&1u32.to_le_bytes());
    truth.extend_from_slice(&4u32.to_le_bytes());
    truth.extend_from_slice(&1u16.to_le_bytes());
    truth.extend_from_slice(&7u32.to_le_bytes());
    truth.extend_from_slice(&2u16.to_le_bytes());
    truth.extend_from_slice(&[1, 0, 8, 2, 0, 7]);
    truth.extend_from_slice(&1u32.to_le_bytes());
    truth.extend_from_slice(&(Base::T.code() as u64).to_le_bytes());
    truth.extend_from_slice(&(-1i64).to_le_bytes());
    truth.push(60);
    truth.extend_from_slice(&1u16.to_le_bytes());
    truth.extend_from_slice(&[3, 0, 30]);
    truth.extend_from_slice(&[b'N', b'M', b'C', 1]);
    assert_eq!(encoded, truth, "Wrong binary layout");

    check_round_trip(&record, &graph, &EncoderParams::default(), "known layout");
}

#[test]
fn round_trip_with_annotations() {
    let graph = test_graph();
    for count in [0, 1, 6, 20] {
        let record = known_record(count);
        let name = format!("record with {} annotations", count);
        check_round_trip(&record, &graph, &EncoderParams::default(), &name);
        check_round_trip(&record, &graph, &EncoderParams { cursor: QueryCursor::Strict }, &name);
    }
}

#[test]
fn missing_quality() {
    let graph = test_graph();
    let mut record = known_record(1);
    record.quality.clear();
    check_round_trip(&record, &graph, &EncoderParams::default(), "record without quality values");
    assert!(record.base_quality().is_empty());
}

#[test]
fn strict_cursor_with_deletions() {
    let graph = test_graph();
    // Reference TACA CATTAG ACGT; delete AC and skip CAT.
    let record = AlignmentRecord {
        name: String::from("gapped"),
        flag: 0,
        path: vec![1, 2, 3],
        t_start: 3,
        t_end: 4,
        cigar: cigar::parse_cigar(b"2=2D1X3N1I2=1X").unwrap(),
        sequence: bases::bases_from_ascii(b"TAGCAGT"),
        score: 5,
        mapq: 0,
        quality: Vec::new(),
        annotations: Vec::new(),
    };
    check_round_trip(&record, &graph, &EncoderParams { cursor: QueryCursor::Strict }, "gapped record");

    // The legacy rule either fails or selects the wrong bases for this CIGAR.
    if let Ok(encoded) = record.encode(&EncoderParams::default()) {
        let decoded = AlignmentRecord::decode(&encoded, &graph);
        if let Ok((decoded, _)) = decoded {
            assert_ne!(decoded, record, "Legacy cursor reproduced a divergent record");
        }
    }
}

#[test]
fn concatenated_records() {
    let graph = test_graph();
    let params = EncoderParams::default();
    let records: Vec<AlignmentRecord> = (0..5).map(|i| {
        let mut record = known_record(i);
        record.name = format!("read{}", i);
        record
    }).collect();

    let mut buffer = Vec::new();
    for record in records.iter() {
        let result = record.encode_into(&mut buffer, &params);
        assert!(result.is_ok(), "Failed to encode {}: {}", record.name, result.unwrap_err());
    }

    let mut offset = 0;
    for record in records.iter() {
        let (decoded, len) = AlignmentRecord::decode(&buffer[offset..], &graph).unwrap();
        assert_eq!(&decoded, record, "Wrong record at offset {}", offset);
        offset += len;
    }
    assert_eq!(offset, buffer.len(), "Records do not cover the buffer");
}

#[test]
fn encoded_record_fields() {
    let record = known_record(2);
    let params = EncoderParams::default();
    let encoded = record.to_encoded(&params).unwrap();
    assert_eq!(encoded.explicit.to_bases(), bases::bases_from_ascii(b"NNGGGC"));

    let bytes = record.encode(&params).unwrap();
    let mut buffer = Vec::new();
    encoded.encode_into(&mut buffer).unwrap();
    assert_eq!(buffer, bytes, "Different encodings from the two paths");
    assert_eq!(encoded.block_size() + 4, bytes.len());

    let (decoded, _) = EncodedRecord::decode(&bytes).unwrap();
    assert_eq!(decoded, encoded);
    let full = decoded.into_record(&test_graph()).unwrap();
    assert_eq!(full, record);
}

//-----------------------------------------------------------------------------

// Error handling.

#[test]
fn truncated_records() {
    let record = known_record(3);
    let encoded = record.encode(&EncoderParams::default()).unwrap();
    let graph = test_graph();
    for len in 0..encoded.len() {
        let result = AlignmentRecord::decode(&encoded[..len], &graph);
        assert!(
            matches!(result, Err(GirafError::TruncatedRecord { .. })),
            "Did not detect truncation at {} of {} bytes", len, encoded.len()
        );
    }
}

#[test]
fn inconsistent_block_size() {
    let record = known_record(0);
    let mut encoded = record.encode(&EncoderParams::default()).unwrap();
    // Declare a block that ends before the quality runs.
    let short = (encoded.len() - 4 - 3 * record.quality.len()) as u32;
    encoded[0..4].copy_from_slice(&short.to_le_bytes());
    let result = EncodedRecord::decode(&encoded);
    assert!(matches!(result, Err(GirafError::TruncatedRecord { .. })), "Fields overran the block undetected");
}

#[test]
fn invalid_records() {
    let params = EncoderParams::default();

    let mut record = known_record(0);
    record.name = "x".repeat(256);
    assert!(matches!(record.encode(&params), Err(GirafError::NameTooLong(256))));
    record.name = "x".repeat(255);
    assert!(record.encode(&params).is_ok(), "Rejected a name of 255 bytes");

    let mut record = known_record(0);
    record.path.clear();
    assert!(matches!(record.encode(&params), Err(GirafError::InvalidRecord(_))));

    let mut record = known_record(0);
    record.sequence.pop();
    assert!(matches!(record.encode(&params), Err(GirafError::InvalidRecord(_))));

    let mut record = known_record(0);
    record.quality.push(RunLengthOp::new(1, 0));
    assert!(matches!(record.encode(&params), Err(GirafError::InvalidRecord(_))));

    let mut record = known_record(0);
    record.path = vec![1; u16::MAX as usize + 1];
    assert!(matches!(record.encode(&params), Err(GirafError::FieldOverflow { .. })));

    let mut buffer = vec![1, 2, 3];
    let mut record = known_record(0);
    record.name = "x".repeat(300);
    assert!(record.encode_into(&mut buffer, &params).is_err());
    assert_eq!(buffer, vec![1, 2, 3], "Invalid record modified the buffer");
}

#[test]
fn decoding_errors() {
    let record = known_record(1);
    let encoded = record.encode(&EncoderParams::default()).unwrap();

    // Node 3 is missing.
    let mut graph = SequenceGraph::new();
    graph.add_node(1, &bases::bases_from_ascii(b"GATTACA"));
    graph.add_node(2, &bases::bases_from_ascii(b"CATTAG"));
    assert!(matches!(AlignmentRecord::decode(&encoded, &graph), Err(GirafError::UnknownNode(3))));

    // Node 3 is too short for the CIGAR.
    graph.add_node(3, &bases::bases_from_ascii(b"ACGT"));
    let mut short = record.clone();
    short.t_end = 2;
    let encoded_short = short.encode(&EncoderParams::default()).unwrap();
    assert!(matches!(AlignmentRecord::decode(&encoded_short, &graph), Err(GirafError::InvalidRecord(_))));

    // Invalid CIGAR operation code in the first operation.
    let cigar_offset = 4 + 1 + record.name.len() + 1 + 4 + 4 + 2 + 4 * record.path.len() + 2;
    let mut corrupt = encoded.clone();
    corrupt[cigar_offset + 2] = 12;
    assert!(matches!(EncodedRecord::decode(&corrupt), Err(GirafError::InvalidCigarOp(12))));

    // Unknown annotation type.
    let mut corrupt = encoded.clone();
    let type_offset = corrupt.len() - record.annotations[0].encoded_len() + 2;
    corrupt[type_offset] = b'q';
    assert!(matches!(EncodedRecord::decode(&corrupt), Err(GirafError::UnknownAnnotationType(b'q'))));
}

#[test]
fn quality_does_not_cover_read() {
    let graph = test_graph();
    let params = EncoderParams::default();
    let record = known_record(0);

    // The encoder of wire fields does not validate the record.
    let mut encoded = record.to_encoded(&params).unwrap();
    encoded.quality.push(RunLengthOp::new(5, 7));
    let mut buffer = Vec::new();
    encoded.encode_into(&mut buffer).unwrap();
    assert!(EncodedRecord::decode(&buffer).is_ok(), "Wire fields were rejected");
    assert!(
        matches!(AlignmentRecord::decode(&buffer, &graph), Err(GirafError::InvalidRecord(_))),
        "Accepted 23 quality values for a read of length 18"
    );

    // Quality values may be missing.
    encoded.quality.clear();
    let mut buffer = Vec::new();
    encoded.encode_into(&mut buffer).unwrap();
    let (decoded, _) = AlignmentRecord::decode(&buffer, &graph).unwrap();
    assert!(decoded.validate().is_ok(), "Decoded record is not valid");
    assert!(decoded.quality.is_empty());
}

#[test]
fn invalid_name_bytes() {
    let record = known_record(0);
    let mut encoded = record.encode(&EncoderParams::default()).unwrap();
    // The name starts after the block size and the name length.
    encoded[5] = 0xFF;
    assert!(matches!(EncodedRecord::decode(&encoded), Err(GirafError::InvalidRecord(_))));
}

//-----------------------------------------------------------------------------

// Randomized records.

fn random_base(rng: &mut impl Rng) -> Base {
    Base::from_code(rng.gen_range(0..5)).unwrap()
}

fn random_graph(nodes: u32, rng: &mut impl Rng) -> SequenceGraph {
    let mut graph = SequenceGraph::new();
    for node_id in 1..=nodes {
        let len = rng.gen_range(1..40);
        let seq: Vec<Base> = (0..len).map(|_| random_base(rng)).collect();
        graph.add_node(node_id, &seq);
    }
    graph
}

fn random_record(graph: &SequenceGraph, nodes: u32, id: usize, with_gaps: bool, rng: &mut impl Rng) -> AlignmentRecord {
    let first = rng.gen_range(1..=nodes);
    let last = rng.gen_range(first..=nodes);
    let path: Vec<u32> = (first..=last).collect();
    let t_start = rng.gen_range(0..graph.node_len(first).unwrap());
    let t_end = graph.node_len(last).unwrap();
    let t_end = if path.len() == 1 { rng.gen_range(t_start..=t_end) } else { rng.gen_range(0..=t_end) };
    let reference = graph.path_bases(&path, t_start, t_end).unwrap();

    let mut cigar = Cigar::new();
    let mut sequence = Vec::new();
    if rng.gen_bool(0.3) {
        let len = rng.gen_range(1..5);
        rle::push_run(&mut cigar, len, CigarCode::SoftClip);
        sequence.extend((0..len).map(|_| random_base(rng)));
    }
    let mut offset = 0;
    while offset < reference.len() {
        let len = rng.gen_range(1..=(reference.len() - offset).min(8));
        let choices = if with_gaps { 6 } else { 4 };
        let op = match rng.gen_range(0..choices) {
            0 => CigarCode::Equal,
            1 => CigarCode::Match,
            2 => CigarCode::Mismatch,
            3 => CigarCode::Insertion,
            4 => CigarCode::Deletion,
            _ => CigarCode::Skip,
        };
        match op {
            CigarCode::Equal | CigarCode::Match => sequence.extend_from_slice(&reference[offset..offset + len]),
            CigarCode::Mismatch | CigarCode::Insertion => sequence.extend((0..len).map(|_| random_base(rng))),
            _ => {},
        }
        if op.consumes_reference() {
            offset += len;
        }
        rle::push_run(&mut cigar, len, op);
    }
    if rng.gen_bool(0.3) {
        let len = rng.gen_range(1..5);
        rle::push_run(&mut cigar, len, CigarCode::SoftClip);
        sequence.extend((0..len).map(|_| random_base(rng)));
    }

    let quality: Vec<u8> = (0..sequence.len()).map(|_| rng.gen_range(20..23)).collect();
    AlignmentRecord {
        name: format!("random{}", id),
        flag: rng.gen(),
        path,
        t_start: t_start as u32,
        t_end: t_end as u32,
        cigar,
        sequence,
        score: rng.gen_range(-1000..1000),
        mapq: rng.gen(),
        quality: rle::encode(&quality),
        annotations: annotations(rng.gen_range(0..4)),
    }
}

#[test]
fn random_round_trip_strict() {
    let mut rng = rand::thread_rng();
    let nodes = 8;
    let graph = random_graph(nodes, &mut rng);
    let params = EncoderParams { cursor: QueryCursor::Strict };
    for i in 0..200 {
        let record = random_record(&graph, nodes, i, true, &mut rng);
        check_round_trip(&record, &graph, &params, &record.name.clone());
    }
}

#[test]
fn random_round_trip_legacy() {
    let mut rng = rand::thread_rng();
    let nodes = 8;
    let graph = random_graph(nodes, &mut rng);
    let params = EncoderParams::default();
    for i in 0..200 {
        let record = random_record(&graph, nodes, i, false, &mut rng);
        assert!(!legacy_cursor_diverges(&record.cigar), "Gap-free CIGAR reported as divergent");
        check_round_trip(&record, &graph, &params, &record.name.clone());
    }
}

//-----------------------------------------------------------------------------
