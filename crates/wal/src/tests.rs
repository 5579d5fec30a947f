use super::*;
use std::fs;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn replay_all(wal: &Wal) -> Vec<(i64, Vec<u8>)> {
    let mut recs = Vec::new();
    wal.replay(|k, v| recs.push((k, v))).unwrap();
    recs
}

// -------------------- Basic write & replay --------------------

#[test]
fn append_and_replay_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let wal = Wal::open(&path).unwrap();
    wal.append(1, b"alpha").unwrap();
    wal.append(-7, b"beta").unwrap();
    wal.append(3, b"").unwrap(); // tombstone
    wal.sync().unwrap();

    let recs = replay_all(&wal);
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0], (1, b"alpha".to_vec()));
    assert_eq!(recs[1], (-7, b"beta".to_vec()));
    assert_eq!(recs[2], (3, Vec::new()));
}

#[test]
fn empty_wal_replays_nothing() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("empty.wal")).unwrap();
    assert!(replay_all(&wal).is_empty());
}

#[test]
fn missing_file_replays_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("never-written.wal");
    let wal = Wal::open(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert!(replay_all(&wal).is_empty());
}

#[test]
fn replay_is_repeatable() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("test.wal")).unwrap();
    wal.append(10, b"x").unwrap();

    assert_eq!(replay_all(&wal).len(), 1);
    assert_eq!(replay_all(&wal).len(), 1);
}

// -------------------- Size & truncate --------------------

#[test]
fn size_reflects_appends() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("test.wal")).unwrap();
    assert_eq!(wal.size().unwrap(), 0);

    wal.append(1, b"12345").unwrap();
    assert_eq!(wal.size().unwrap(), (HEADER_BYTES + 5) as u64);
}

#[test]
fn truncate_resets_to_zero() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("test.wal")).unwrap();
    wal.append(1, b"abc").unwrap();
    wal.append(2, b"def").unwrap();
    assert!(wal.size().unwrap() > 0);

    wal.truncate().unwrap();
    assert_eq!(wal.size().unwrap(), 0);
    assert!(replay_all(&wal).is_empty());
}

#[test]
fn append_after_truncate_works() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("test.wal")).unwrap();
    wal.append(1, b"old").unwrap();
    wal.truncate().unwrap();
    wal.append(2, b"new").unwrap();

    let recs = replay_all(&wal);
    assert_eq!(recs, vec![(2, b"new".to_vec())]);
}

// -------------------- Corruption tolerance --------------------

#[test]
fn torn_tail_yields_complete_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let wal = Wal::open(&path).unwrap();
        wal.append(1, b"complete").unwrap();
        wal.append(2, b"will-be-torn").unwrap();
        wal.close().unwrap();
    }

    // Chop bytes off the second record to simulate a crash mid-append.
    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() - 5]).unwrap();

    let wal = Wal::open(&path).unwrap();
    let recs = replay_all(&wal);
    assert_eq!(recs, vec![(1, b"complete".to_vec())]);
}

#[test]
fn crc_mismatch_stops_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let wal = Wal::open(&path).unwrap();
        wal.append(1, b"good").unwrap();
        wal.append(2, b"flipped").unwrap();
        wal.append(3, b"unreachable").unwrap();
        wal.close().unwrap();
    }

    // Flip a value byte inside the second record.
    let mut data = fs::read(&path).unwrap();
    let second_value_start = (HEADER_BYTES + 4) + HEADER_BYTES;
    data[second_value_start] ^= 0xff;
    fs::write(&path, &data).unwrap();

    let wal = Wal::open(&path).unwrap();
    let recs = replay_all(&wal);
    assert_eq!(recs, vec![(1, b"good".to_vec())]);
}

#[test]
fn garbage_header_stops_replay_without_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let wal = Wal::open(&path).unwrap();
        wal.append(9, b"ok").unwrap();
        wal.close().unwrap();
    }

    // Append a full garbage frame header claiming an enormous value.
    let mut data = fs::read(&path).unwrap();
    data.extend_from_slice(&[0xffu8; HEADER_BYTES]);
    fs::write(&path, &data).unwrap();

    let wal = Wal::open(&path).unwrap();
    let recs = replay_all(&wal);
    assert_eq!(recs, vec![(9, b"ok".to_vec())]);
}

// -------------------- Concurrency --------------------

#[test]
fn concurrent_appends_all_land() {
    use std::sync::Arc;

    let dir = tempdir().unwrap();
    let wal = Arc::new(Wal::open(dir.path().join("test.wal")).unwrap());

    let mut handles = Vec::new();
    for t in 0..4i64 {
        let wal = Arc::clone(&wal);
        handles.push(std::thread::spawn(move || {
            for i in 0..50i64 {
                wal.append(t * 1000 + i, b"v").unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(replay_all(&wal).len(), 200);
}
