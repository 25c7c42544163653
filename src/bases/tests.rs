use super::*;

use rand::Rng;

//-----------------------------------------------------------------------------

fn random_bases(len: usize, rng: &mut impl Rng) -> Vec<Base> {
    (0..len).map(|_| Base::from_code(rng.gen_range(0..5)).unwrap()).collect()
}

#[test]
fn base_codes() {
    for code in 0..5 {
        let base = Base::from_code(code);
        assert!(base.is_ok(), "Failed to decode base code {}", code);
        assert_eq!(base.unwrap().code(), code, "Wrong code for base {}", code);
    }
    for code in 5..8 {
        assert!(Base::from_code(code).is_err(), "Accepted invalid base code {}", code);
    }
}

#[test]
fn ascii_conversion() {
    let seq = bases_from_ascii(b"gattacaNXR");
    assert_eq!(
        seq,
        vec![Base::G, Base::A, Base::T, Base::T, Base::A, Base::C, Base::A, Base::N, Base::N, Base::N]
    );
    assert_eq!(bases_to_ascii(&seq), b"GATTACANNN".to_vec());
    assert_eq!(Base::A.complement(), Base::T);
    assert_eq!(Base::N.complement(), Base::N);
}

//-----------------------------------------------------------------------------

#[test]
fn empty_sequence() {
    let packed = PackedBases::new();
    assert!(packed.is_empty());
    assert_eq!(packed.words().len(), 0);
    assert!(packed.to_bases().is_empty());
    assert!(matches!(packed.get(0), Err(GirafError::IndexOutOfRange { index: 0, len: 0 })));
}

#[test]
fn round_trip_all_lengths() {
    let mut rng = rand::thread_rng();
    for len in 0..1000 {
        let seq = random_bases(len, &mut rng);
        let packed = PackedBases::from_bases(&seq);
        assert_eq!(packed.len(), len, "Wrong length");
        assert_eq!(packed.words().len(), len.div_ceil(21), "Wrong number of words for length {}", len);
        assert_eq!(packed.to_bases(), seq, "Wrong sequence for length {}", len);
    }
}

#[test]
fn word_boundaries() {
    let seq: Vec<Base> = (0..43).map(|i| Base::from_code((i % 5) as u8).unwrap()).collect();
    let packed = PackedBases::from_bases(&seq);
    assert_eq!(packed.words().len(), 3);
    for (i, base) in seq.iter().enumerate() {
        assert_eq!(packed.get(i).unwrap(), *base, "Wrong base at offset {}", i);
    }
    for word in packed.words() {
        assert_eq!(word >> 63, 0, "The top bit of a word is in use");
    }
    assert!(packed.get(43).is_err(), "Got a base past the end");
}

#[test]
fn append_and_extend() {
    let mut rng = rand::thread_rng();
    for (left, right) in [(0, 5), (5, 0), (21, 30), (20, 22), (13, 50)] {
        let a = random_bases(left, &mut rng);
        let b = random_bases(right, &mut rng);
        let mut packed = PackedBases::from_bases(&a);
        packed.extend(&PackedBases::from_bases(&b));
        let mut truth = a.clone();
        truth.extend_from_slice(&b);
        assert_eq!(packed, PackedBases::from_bases(&truth), "Wrong concatenation of {} and {} bases", left, right);
    }
}

#[test]
fn from_words() {
    let seq = bases_from_ascii(b"ACGTNACGTNACGTNACGTNACGTN");
    let packed = PackedBases::from_bases(&seq);

    let copy = PackedBases::from_words(packed.words().to_vec(), packed.len());
    assert!(copy.is_ok(), "Failed to rebuild from words: {}", copy.unwrap_err());
    assert_eq!(copy.unwrap(), packed);

    // Wrong number of words.
    assert!(PackedBases::from_words(packed.words().to_vec(), 10).is_err());

    // Base code 7 in the first position.
    let mut words = packed.words().to_vec();
    words[0] |= 0b111;
    assert!(matches!(PackedBases::from_words(words, packed.len()), Err(GirafError::InvalidBase(_))));

    // A bit past the last base.
    let mut words = packed.words().to_vec();
    words[1] |= 1 << 20;
    assert!(PackedBases::from_words(words, packed.len()).is_err());
}

#[test]
fn slices() {
    let mut rng = rand::thread_rng();
    let seq = random_bases(100, &mut rng);
    let packed = PackedBases::from_bases(&seq);
    for (start, end) in [(0, 0), (0, 21), (15, 30), (20, 22), (42, 100), (99, 100)] {
        let slice = packed.slice(start..end);
        assert!(slice.is_ok(), "Failed to extract {}..{}: {}", start, end, slice.unwrap_err());
        assert_eq!(slice.unwrap(), seq[start..end].to_vec(), "Wrong bases in {}..{}", start, end);
    }
    assert!(matches!(packed.slice(90..101), Err(GirafError::IndexOutOfRange { index: 100, len: 100 })));
    assert!(matches!(packed.get(100), Err(GirafError::IndexOutOfRange { .. })));
}

//-----------------------------------------------------------------------------
