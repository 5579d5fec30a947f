use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result as IoResult, Seek, SeekFrom, Write};

/// "LOOMSST1" — identifies an SSTable written by this crate.
pub const SSTABLE_MAGIC: u64 = 0x4C4F_4F4D_5353_5431;

/// One sparse index entry is recorded every this many data entries.
pub const INDEX_SAMPLE_RATE: u64 = 100;

/// Trailing footer: index_start(8) + magic(8).
pub const FOOTER_BYTES: u64 = 8 + 8;

/// Returns the position where the footer starts (filesize - FOOTER_BYTES).
pub fn footer_pos(filesize: u64) -> u64 {
    filesize.saturating_sub(FOOTER_BYTES)
}

/// Convenience: write footer (index_start + magic).
pub fn write_footer<W: Write>(w: &mut W, index_start: u64) -> IoResult<()> {
    w.write_u64::<LittleEndian>(index_start)?;
    w.write_u64::<LittleEndian>(SSTABLE_MAGIC)?;
    Ok(())
}

/// Convenience: read footer (index_start, magic).
pub fn read_footer<R: Read + Seek>(r: &mut R) -> IoResult<(u64, u64)> {
    let filesize = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(footer_pos(filesize)))?;
    let index_start = r.read_u64::<LittleEndian>()?;
    let magic = r.read_u64::<LittleEndian>()?;
    Ok((index_start, magic))
}
