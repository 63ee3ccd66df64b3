//! Relocation table (`_RLT`): every absolute offset the runtime must rebase.
//!
//! Entries describe runs of 8-byte offsets: `offset_count` consecutive offsets
//! starting at `offset`, followed by `padding_count` words to skip, repeated
//! `struct_count` times. Entries are grouped into numbered sections, one per
//! file region.

use std::fmt;

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{Error, Result, narrow};

/// Offsets one entry can describe before it is split.
pub const MAX_OFFSETS_PER_ENTRY: u32 = 255;

/// Signature of the relocation block.
pub const RELOCATION_SIGNATURE: [u8; 4] = *b"_RLT";

const HEADER_SIZE: u64 = 0x10;
const SECTION_SIZE: u64 = 0x18;
const ENTRY_SIZE: u64 = 0x08;

/// File regions of a full container, in table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelocationSection {
    Main,
    IndexBuffer,
    VertexBuffer,
    MemoryPool,
    ExternalFiles,
}

impl RelocationSection {
    pub const ALL: [RelocationSection; 5] = [
        RelocationSection::Main,
        RelocationSection::IndexBuffer,
        RelocationSection::VertexBuffer,
        RelocationSection::MemoryPool,
        RelocationSection::ExternalFiles,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            RelocationSection::Main => "main",
            RelocationSection::IndexBuffer => "index buffer",
            RelocationSection::VertexBuffer => "vertex buffer",
            RelocationSection::MemoryPool => "memory pool",
            RelocationSection::ExternalFiles => "external files",
        }
    }
}

/// One run of relocated offsets.
#[derive(Clone, Debug, Eq)]
pub struct RelocationEntry {
    pub offset: u32,
    pub struct_count: u16,
    pub offset_count: u8,
    pub padding_count: u8,
    /// Diagnostic label, not stored in the file.
    pub hint: String,
}

impl PartialEq for RelocationEntry {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
            && self.struct_count == other.struct_count
            && self.offset_count == other.offset_count
            && self.padding_count == other.padding_count
    }
}

impl fmt::Display for RelocationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x} structs {} offsets {} padding {}",
            self.offset, self.struct_count, self.offset_count, self.padding_count
        )
    }
}

/// Start and size of the region a section covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionRegion {
    pub base: u32,
    pub size: u32,
}

/// Collects entries per section while a container is written.
#[derive(Clone, Debug)]
pub struct RelocationTableBuilder {
    sections: Vec<Vec<RelocationEntry>>,
}

impl RelocationTableBuilder {
    pub fn new(section_count: usize) -> Self {
        Self {
            sections: vec![Vec::new(); section_count],
        }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Total number of entries across sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self, section: usize) -> &[RelocationEntry] {
        self.sections.get(section).map_or(&[], Vec::as_slice)
    }

    /// Register `offset_count` offsets at `offset`, repeated for `struct_count`
    /// structs. Runs longer than [`MAX_OFFSETS_PER_ENTRY`] are split into
    /// consecutive entries.
    pub fn add(
        &mut self,
        section: usize,
        offset: u64,
        offset_count: u32,
        struct_count: u32,
        padding_count: u32,
        hint: &str,
    ) -> Result<()> {
        if struct_count == 0 {
            return Err(Error::EmptyRelocationEntry {
                offset,
                hint: hint.to_owned(),
            });
        }
        if offset_count > MAX_OFFSETS_PER_ENTRY {
            self.add(
                section,
                offset,
                MAX_OFFSETS_PER_ENTRY,
                struct_count,
                padding_count,
                hint,
            )?;
            return self.add(
                section,
                offset + u64::from(MAX_OFFSETS_PER_ENTRY) * 8,
                offset_count - MAX_OFFSETS_PER_ENTRY,
                struct_count,
                padding_count,
                hint,
            );
        }
        if offset_count == 0 {
            return Ok(());
        }

        let entry = RelocationEntry {
            offset: narrow("relocated offset", offset)?,
            struct_count: narrow("relocation struct count", struct_count)?,
            offset_count: narrow("relocation offset count", offset_count)?,
            padding_count: narrow("relocation padding count", padding_count)?,
            hint: hint.to_owned(),
        };
        self.sections
            .get_mut(section)
            .ok_or(Error::InvalidValue {
                what: "relocation section",
                value: section as u64,
            })?
            .push(entry);
        Ok(())
    }

    /// Assemble the table once every region has been written.
    pub fn build(self, regions: &[SectionRegion]) -> Result<RelocationTable> {
        if regions.len() != self.sections.len() {
            return Err(Error::InvalidValue {
                what: "relocation region count",
                value: regions.len() as u64,
            });
        }

        let mut first = 0usize;
        let mut sections = Vec::with_capacity(regions.len());
        for (mut entries, region) in self.sections.into_iter().zip(regions) {
            entries.sort_by_key(|e| e.offset);
            log::trace!(
                "relocation section base {:#x} size {:#x}: {} entries",
                region.base,
                region.size,
                entries.len()
            );
            sections.push(RelocationTableSection {
                base: region.base,
                size: region.size,
                first_entry_index: narrow("relocation entry index", first as u64)?,
                entries,
            });
            first += sections.last().map_or(0, |s| s.entries.len());
        }
        Ok(RelocationTable { sections })
    }
}

/// A section of an assembled table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelocationTableSection {
    pub base: u32,
    pub size: u32,
    pub first_entry_index: i32,
    pub entries: Vec<RelocationEntry>,
}

/// Assembled relocation table, ready to write or parsed from a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelocationTable {
    pub sections: Vec<RelocationTableSection>,
}

impl RelocationTable {
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }

    pub fn byte_size(&self) -> u64 {
        HEADER_SIZE
            + SECTION_SIZE * self.sections.len() as u64
            + ENTRY_SIZE * self.entry_count() as u64
    }

    /// Write the block at the next 8-byte boundary and return its offset.
    pub fn write(&self, writer: &mut ByteWriter) -> Result<u64> {
        writer.align(8)?;
        let start = writer.position();

        writer.write_signature(&RELOCATION_SIGNATURE)?;
        writer.write_u32(narrow("relocation table offset", start)?)?;
        writer.write_u32(narrow("relocation section count", self.sections.len() as u64)?)?;
        writer.write_u32(0)?;

        for section in &self.sections {
            writer.write_u64(0)?;
            writer.write_u32(section.base)?;
            writer.write_u32(section.size)?;
            writer.write_i32(section.first_entry_index)?;
            writer.write_i32(narrow("relocation entry count", section.entries.len() as u64)?)?;
        }

        for entry in self.sections.iter().flat_map(|s| &s.entries) {
            writer.write_u32(entry.offset)?;
            writer.write_u16(entry.struct_count)?;
            writer.write_u8(entry.offset_count)?;
            writer.write_u8(entry.padding_count)?;
        }
        Ok(start)
    }

    /// Parse the block at `offset`, checking its signature and self offset.
    pub fn read(reader: &mut ByteReader<'_>, offset: u64) -> Result<Self> {
        reader.temporary_seek(offset, |r| {
            r.read_signature(&RELOCATION_SIGNATURE)?;
            let stored = r.read_u32()?;
            if u64::from(stored) != offset {
                return Err(Error::InvalidValue {
                    what: "relocation table offset",
                    value: stored.into(),
                });
            }
            let section_count = r.read_u32()? as usize;
            r.skip(4)?;

            let mut layout = Vec::with_capacity(section_count.min(16));
            for _ in 0..section_count {
                r.skip(8)?;
                let base = r.read_u32()?;
                let size = r.read_u32()?;
                let first = r.read_i32()?;
                let count = r.read_i32()?;
                layout.push((base, size, first, count));
            }

            let mut sections = Vec::with_capacity(layout.len());
            let entries_start = r.position();
            for (base, size, first, count) in layout {
                let (Ok(first_index), Ok(count)) = (u64::try_from(first), usize::try_from(count))
                else {
                    return Err(Error::InvalidValue {
                        what: "relocation section range",
                        value: first as u64,
                    });
                };
                r.seek(entries_start + first_index * ENTRY_SIZE)?;
                let entries = r.read_vec(count, |r| {
                    Ok(RelocationEntry {
                        offset: r.read_u32()?,
                        struct_count: r.read_u16()?,
                        offset_count: r.read_u8()?,
                        padding_count: r.read_u8()?,
                        hint: String::new(),
                    })
                })?;
                sections.push(RelocationTableSection {
                    base,
                    size,
                    first_entry_index: first,
                    entries,
                });
            }
            Ok(RelocationTable { sections })
        })
    }
}
