use crate::{Builder, MergeIterator, Table};
use anyhow::Result;
use tempfile::tempdir;

fn build_table(path: &std::path::Path, entries: &[(i64, &[u8])]) -> Result<Table> {
    let mut b = Builder::create(path)?;
    for (k, v) in entries {
        b.add(*k, v)?;
    }
    b.finish()?;
    Table::open(path)
}

#[test]
fn merge_interleaves_disjoint_tables() -> Result<()> {
    let dir = tempdir()?;
    let a = build_table(&dir.path().join("a.sst"), &[(1, b"a"), (3, b"c")])?;
    let b = build_table(&dir.path().join("b.sst"), &[(2, b"b"), (4, b"d")])?;

    let mut merge = MergeIterator::new(&[&a, &b])?;
    let keys: Vec<i64> = merge.collect_all().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn newest_source_wins_on_duplicate_keys() -> Result<()> {
    let dir = tempdir()?;
    // Sources are given oldest-first; "new" shadows "old".
    let old = build_table(&dir.path().join("old.sst"), &[(1, b"old1"), (2, b"old2")])?;
    let new = build_table(&dir.path().join("new.sst"), &[(2, b"new2"), (3, b"new3")])?;

    let mut merge = MergeIterator::new(&[&old, &new])?;
    let entries = merge.collect_all();
    assert_eq!(
        entries,
        vec![
            (1, b"old1".to_vec()),
            (2, b"new2".to_vec()),
            (3, b"new3".to_vec()),
        ]
    );
    Ok(())
}

#[test]
fn tombstones_flow_through_merge() -> Result<()> {
    let dir = tempdir()?;
    let old = build_table(&dir.path().join("old.sst"), &[(1, b"alive")])?;
    let new = build_table(&dir.path().join("new.sst"), &[(1, b"")])?;

    let mut merge = MergeIterator::new(&[&old, &new])?;
    let entries = merge.collect_all();
    // The tombstone survives the merge; it is not dropped here.
    assert_eq!(entries, vec![(1, Vec::new())]);
    Ok(())
}

#[test]
fn three_way_duplicate_takes_newest() -> Result<()> {
    let dir = tempdir()?;
    let t0 = build_table(&dir.path().join("t0.sst"), &[(5, b"v0")])?;
    let t1 = build_table(&dir.path().join("t1.sst"), &[(5, b"v1")])?;
    let t2 = build_table(&dir.path().join("t2.sst"), &[(5, b"v2")])?;

    let mut merge = MergeIterator::new(&[&t0, &t1, &t2])?;
    assert_eq!(merge.collect_all(), vec![(5, b"v2".to_vec())]);
    Ok(())
}

#[test]
fn empty_input_list_is_exhausted() -> Result<()> {
    let mut merge = MergeIterator::new(&[])?;
    assert!(merge.next_entry().is_none());
    Ok(())
}

#[test]
fn merge_output_feeds_a_builder() -> Result<()> {
    // The compaction shape: merge N inputs, stream into a new table.
    let dir = tempdir()?;
    let a = build_table(&dir.path().join("a.sst"), &[(1, b"x"), (2, b"y")])?;
    let b = build_table(&dir.path().join("b.sst"), &[(2, b"z"), (9, b"w")])?;

    let out_path = dir.path().join("merged.sst");
    let mut builder = Builder::create(&out_path)?;
    let mut merge = MergeIterator::new(&[&a, &b])?;
    while let Some((k, v)) = merge.next_entry() {
        builder.add(k, &v)?;
    }
    builder.finish()?;

    let merged = Table::open(&out_path)?;
    assert_eq!(merged.get(1).as_deref(), Some(b"x".as_slice()));
    assert_eq!(merged.get(2).as_deref(), Some(b"z".as_slice()));
    assert_eq!(merged.get(9).as_deref(), Some(b"w".as_slice()));
    Ok(())
}
