use crate::format::{SSTABLE_MAGIC, FOOTER_BYTES};
use crate::Builder;
use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Seek, SeekFrom};
use tempfile::tempdir;

#[test]
fn build_writes_valid_footer() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.sst");

    let mut b = Builder::create(&path)?;
    b.add(1, b"apple")?;
    b.add(2, b"banana")?;
    b.add(3, b"")?; // tombstone
    b.finish()?;

    let mut f = std::fs::File::open(&path)?;
    let filesize = f.metadata()?.len();
    assert!(filesize > FOOTER_BYTES);

    f.seek(SeekFrom::Start(filesize - FOOTER_BYTES))?;
    let index_start = f.read_u64::<LittleEndian>()?;
    let magic = f.read_u64::<LittleEndian>()?;
    assert_eq!(magic, SSTABLE_MAGIC);
    assert!(index_start < filesize);
    Ok(())
}

#[test]
fn build_stages_through_tmp_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.sst");

    let mut b = Builder::create(&path)?;
    b.add(1, b"v")?;

    // Before finish: only the temp file exists.
    assert!(!path.exists());
    assert!(path.with_extension("sst.tmp").exists());

    b.finish()?;
    assert!(path.exists());
    assert!(!path.with_extension("sst.tmp").exists());
    Ok(())
}

#[test]
fn out_of_order_key_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let mut b = Builder::create(dir.path().join("test.sst"))?;
    b.add(10, b"v")?;
    assert!(b.add(10, b"dup").is_err());
    assert!(b.add(5, b"older").is_err());
    Ok(())
}

#[test]
fn abort_removes_temp_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.sst");
    let mut b = Builder::create(&path)?;
    b.add(1, b"v")?;
    b.abort();

    assert!(!path.exists());
    assert!(!path.with_extension("sst.tmp").exists());
    Ok(())
}

#[test]
fn len_tracks_added_records() -> Result<()> {
    let dir = tempdir()?;
    let mut b = Builder::create(dir.path().join("test.sst"))?;
    assert!(b.is_empty());
    b.add(1, b"a")?;
    b.add(2, b"b")?;
    assert_eq!(b.len(), 2);
    Ok(())
}
