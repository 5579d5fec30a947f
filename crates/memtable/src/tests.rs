use super::*;

#[test]
fn put_get_overwrite() {
    let m = Memtable::new();
    m.put(1, b"v1".to_vec());
    assert_eq!(m.get(1).unwrap(), b"v1".to_vec());

    m.put(1, b"v2".to_vec());
    assert_eq!(m.get(1).unwrap(), b"v2".to_vec());
    assert_eq!(m.len(), 1);
}

#[test]
fn tombstone_is_stored_and_visible() {
    let m = Memtable::new();
    m.put(5, b"alive".to_vec());
    m.put(5, Vec::new());

    // The tombstone is a real entry here; interpretation is the engine's job.
    assert_eq!(m.get(5).unwrap(), Vec::<u8>::new());
    assert_eq!(m.len(), 1);
}

#[test]
fn get_missing_returns_none() {
    let m = Memtable::new();
    assert!(m.get(99).is_none());
}

#[test]
fn scan_is_inclusive_and_sorted() {
    let m = Memtable::new();
    for k in [5i64, 1, 9, 3, 7] {
        m.put(k, format!("v{k}").into_bytes());
    }

    let items = m.scan(3, 7);
    let keys: Vec<i64> = items.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![3, 5, 7]);

    assert!(m.scan(10, 20).is_empty());
    assert!(m.scan(7, 3).is_empty()); // inverted range
}

#[test]
fn scan_handles_negative_keys() {
    let m = Memtable::new();
    m.put(-10, b"a".to_vec());
    m.put(0, b"b".to_vec());
    m.put(10, b"c".to_vec());

    let keys: Vec<i64> = m.scan(i64::MIN, i64::MAX).iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![-10, 0, 10]);
}

#[test]
fn for_each_visits_in_ascending_order() {
    let m = Memtable::new();
    for k in [2i64, -4, 8, 0] {
        m.put(k, Vec::new());
    }

    let mut seen = Vec::new();
    m.for_each(|k, _| seen.push(k));
    assert_eq!(seen, vec![-4, 0, 2, 8]);
}

#[test]
fn to_sorted_vec_snapshots_everything() {
    let m = Memtable::new();
    m.put(3, b"c".to_vec());
    m.put(1, b"a".to_vec());
    m.put(2, Vec::new());

    let snap = m.to_sorted_vec();
    assert_eq!(snap.len(), 3);
    assert_eq!(snap[0], (1, b"a".to_vec()));
    assert_eq!(snap[1], (2, Vec::new()));
    assert_eq!(snap[2], (3, b"c".to_vec()));
}

#[test]
fn concurrent_writers_do_not_lose_entries() {
    use std::sync::Arc;

    let m = Arc::new(Memtable::new());
    let mut handles = Vec::new();
    for t in 0..4i64 {
        let m = Arc::clone(&m);
        handles.push(std::thread::spawn(move || {
            for i in 0..250i64 {
                m.put(t * 1000 + i, b"v".to_vec());
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(m.len(), 1000);
}
