use super::*;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn records(pairs: &[(i64, &[u8])]) -> Vec<Record> {
    pairs
        .iter()
        .map(|(k, v)| Record::new(*k, v.to_vec()))
        .collect()
}

fn uniform_index(n: i64, stride: i64) -> LearnedIndex {
    let recs: Vec<Record> = (0..n)
        .map(|i| Record::new(i * stride, format!("v{i}").into_bytes()))
        .collect();
    LearnedIndex::build(recs)
}

// -------------------- Build & get --------------------

#[test]
fn every_trained_key_is_found() {
    let idx = uniform_index(10_000, 3);
    for i in 0..10_000i64 {
        let expected = format!("v{i}");
        assert_eq!(
            idx.get(i * 3),
            Some(expected.as_bytes()),
            "key {}",
            i * 3
        );
    }
}

#[test]
fn absent_keys_return_none() {
    let idx = uniform_index(1000, 2); // even keys only
    for i in 0..1000i64 {
        assert!(idx.get(i * 2 + 1).is_none(), "odd key {}", i * 2 + 1);
    }
    assert!(idx.get(-5).is_none());
    assert!(idx.get(i64::MAX).is_none());
}

#[test]
fn build_sorts_unsorted_input() {
    let idx = LearnedIndex::build(records(&[(30, b"c"), (10, b"a"), (20, b"b")]));
    assert_eq!(idx.get(10), Some(b"a".as_slice()));
    assert_eq!(idx.get(20), Some(b"b".as_slice()));
    assert_eq!(idx.get(30), Some(b"c".as_slice()));
}

#[test]
fn empty_index_answers_absent() {
    let idx = LearnedIndex::build(Vec::new());
    assert!(idx.is_empty());
    assert!(idx.get(1).is_none());
    assert!(idx.scan(0, 100).is_empty());
}

#[test]
fn tombstones_are_reported_as_empty_values() {
    let idx = LearnedIndex::build(records(&[(1, b"live"), (2, b"")]));
    assert_eq!(idx.get(2), Some(b"".as_slice()));
}

#[test]
fn skewed_distribution_still_finds_all_keys() {
    // Clustered + sparse tails stress the error bounds.
    let mut recs = Vec::new();
    for i in 0..500i64 {
        recs.push(Record::new(i, b"dense".to_vec()));
    }
    for i in 0..50i64 {
        recs.push(Record::new(1_000_000 + i * 997, b"sparse".to_vec()));
    }
    let idx = LearnedIndex::build(recs);

    for i in 0..500i64 {
        assert_eq!(idx.get(i), Some(b"dense".as_slice()), "dense {i}");
    }
    for i in 0..50i64 {
        let k = 1_000_000 + i * 997;
        assert_eq!(idx.get(k), Some(b"sparse".as_slice()), "sparse {k}");
    }
}

// -------------------- Append --------------------

#[test]
fn append_extends_the_sorted_tail() {
    let mut idx = uniform_index(1000, 2);
    let tail: Vec<Record> = (1000..1200i64)
        .map(|i| Record::new(i * 2, format!("v{i}").into_bytes()))
        .collect();
    idx.append(tail);

    assert_eq!(idx.len(), 1200);
    for i in 0..1200i64 {
        let expected = format!("v{i}");
        assert_eq!(idx.get(i * 2), Some(expected.as_bytes()), "key {}", i * 2);
    }
}

#[test]
fn append_empty_is_a_no_op() {
    let mut idx = uniform_index(10, 1);
    idx.append(Vec::new());
    assert_eq!(idx.len(), 10);
}

#[test]
#[should_panic]
fn append_below_current_max_panics() {
    let mut idx = uniform_index(10, 10);
    idx.append(records(&[(5, b"late")]));
}

// -------------------- Scan --------------------

#[test]
fn scan_returns_inclusive_sorted_range() {
    let idx = uniform_index(1000, 3);
    let got = idx.scan(30, 60);
    let keys: Vec<i64> = got.iter().map(|r| r.key).collect();
    assert_eq!(keys, vec![30, 33, 36, 39, 42, 45, 48, 51, 54, 57, 60]);
}

#[test]
fn scan_clamps_to_data_bounds() {
    let idx = uniform_index(100, 1);
    assert_eq!(idx.scan(-50, 5).len(), 6);
    assert_eq!(idx.scan(95, 500).len(), 5);
    assert!(idx.scan(200, 300).is_empty());
    assert!(idx.scan(50, 40).is_empty()); // inverted
}

// -------------------- Diagnostics --------------------

#[test]
fn diagnostics_are_sampled_and_capped() {
    let idx = uniform_index(20_000, 1);
    let points = idx.export_diagnostics();
    assert!(!points.is_empty());
    assert!(points.len() <= 5001);

    for p in &points {
        assert_eq!(p.error, p.real_pos as i64 - p.predicted_pos);
    }
}

#[test]
fn benchmark_reports_positive_averages() {
    let idx = uniform_index(5000, 1);
    let (bin_ns, learned_ns) = idx.benchmark_internal(200);
    assert!(bin_ns >= 0.0);
    assert!(learned_ns >= 0.0);
}

#[test]
fn benchmark_on_empty_index_is_zero() {
    let idx = LearnedIndex::build(Vec::new());
    assert_eq!(idx.benchmark_internal(100), (0.0, 0.0));
}

// -------------------- Persistence --------------------

#[test]
fn save_load_roundtrip_preserves_lookups() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx.li");

    let idx = uniform_index(2000, 5);
    idx.save(&path).unwrap();

    let loaded = LearnedIndex::load(&path).unwrap();
    assert_eq!(loaded.len(), idx.len());
    for i in 0..2000i64 {
        assert_eq!(loaded.get(i * 5), idx.get(i * 5), "key {}", i * 5);
    }
}

#[test]
fn load_rejects_foreign_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not-an-index.li");
    std::fs::write(&path, b"definitely not a learned index").unwrap();

    assert!(matches!(
        LearnedIndex::load(&path),
        Err(LearnedError::Corrupt(_)) | Err(LearnedError::Io(_))
    ));
}

#[test]
fn load_rejects_truncated_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx.li");

    uniform_index(500, 1).save(&path).unwrap();
    let data = std::fs::read(&path).unwrap();
    std::fs::write(&path, &data[..data.len() / 2]).unwrap();

    assert!(LearnedIndex::load(&path).is_err());
}

#[test]
fn load_missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        LearnedIndex::load(dir.path().join("absent.li")),
        Err(LearnedError::Io(_))
    ));
}
