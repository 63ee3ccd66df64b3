//! Human-readable layout dump of a serialized container, for debugging and
//! for comparing files produced by different writers.
//!
//! The dump works on raw bytes and does not build the object graph, so it
//! also describes files whose chunks fail to load.

use std::fmt::Write as _;

use bfres_core::relocation::RelocationTable;
use bfres_core::string_pool::STRING_POOL_SIGNATURE;
use bfres_core::{ByteOrder, ByteReader, Error, RelocationSection, Result, Version};

use crate::res_file::FILE_SIGNATURE;

struct PooledString {
    offset: u64,
    text: String,
}

/// Dump the header, string pool, and relocation table of `data`.
pub fn dump(data: &[u8]) -> Result<String> {
    let mut reader = ByteReader::new(data, ByteOrder::Little);
    reader.read_signature(&FILE_SIGNATURE)?;
    let mark = reader.temporary_seek(0x0C, |r| r.read_array::<2>())?;
    let order =
        ByteOrder::from_mark(mark).ok_or(Error::InvalidByteOrderMark(u16::from_be_bytes(mark)))?;
    reader.set_byte_order(order);

    let version = Version::from_packed(reader.temporary_seek(0x08, |r| r.read_u32())?);
    let revision = version.revision()?;
    let alignment = reader.temporary_seek(0x0E, |r| r.read_u8())?;
    let name_offset = u64::from(reader.temporary_seek(0x10, |r| r.read_u32())?);
    let relocation_offset = u64::from(reader.temporary_seek(0x18, |r| r.read_u32())?);
    let file_size = reader.temporary_seek(0x1C, |r| r.read_u32())?;
    let block_base: u64 = if revision.has_reserved_blocks() { 0x58 } else { 0x38 };
    let pool_offset = reader.temporary_seek(block_base + 0x38, |r| r.read_u64())?;

    let strings = read_strings(&mut reader, pool_offset)?;
    let table = RelocationTable::read(&mut reader, relocation_offset)?;

    let mut out = String::new();
    writeln!(out, "[header]").unwrap();
    writeln!(out, "version     {version}").unwrap();
    writeln!(out, "byte order  {}", order.name()).unwrap();
    writeln!(out, "alignment   {:#x}", 1u64 << alignment.min(63)).unwrap();
    match strings.iter().find(|s| s.offset == name_offset) {
        Some(name) => writeln!(out, "name        {:?}", name.text).unwrap(),
        None => writeln!(out, "name        <{name_offset:#x}>").unwrap(),
    }
    writeln!(out, "file size   {file_size:#x}").unwrap();

    writeln!(out).unwrap();
    writeln!(out, "[strings]").unwrap();
    for string in &strings {
        writeln!(out, "{:#x} {:?}", string.offset, string.text).unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "[relocations]").unwrap();
    for (index, section) in table.sections.iter().enumerate() {
        let name = RelocationSection::ALL
            .get(index)
            .map_or("section", |s| s.name());
        writeln!(
            out,
            "{name} base {:#x} size {:#x}",
            section.base, section.size
        )
        .unwrap();
        for entry in &section.entries {
            writeln!(out, "  {entry}").unwrap();
        }
    }

    Ok(out)
}

/// Walk the `_STR` block. Strings that are not UTF-8 are shown by length.
fn read_strings(reader: &mut ByteReader<'_>, pool_offset: u64) -> Result<Vec<PooledString>> {
    if pool_offset == 0 {
        return Ok(Vec::new());
    }
    reader.temporary_seek(pool_offset, |r| {
        r.read_signature(&STRING_POOL_SIGNATURE)?;
        r.skip(12)?;
        let count = r.read_u32()? as usize;
        let mut strings = Vec::with_capacity(count.min(r.len()));
        for _ in 0..count {
            r.align(2)?;
            let len = r.read_u16()? as usize;
            let offset = r.position();
            let bytes = r.read_bytes(len)?;
            let text = match std::str::from_utf8(bytes) {
                Ok(text) => text.to_owned(),
                Err(_) => format!("<{len} bytes>"),
            };
            // The terminator is one byte or one UTF-16 unit; both end on
            // the next 2-byte boundary.
            r.skip(1)?;
            r.align(2)?;
            strings.push(PooledString { offset, text });
        }
        Ok(strings)
    })
}
