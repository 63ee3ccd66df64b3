//! Graph saver.
//!
//! Writing is two-pass. Headers are written in place with placeholders for
//! every child offset; the children are queued and written later, after which
//! the placeholders are backpatched. Two queues exist:
//!
//! - the item queue (`save`, `save_list`, `save_dict`, `save_custom`), drained
//!   by [`ResFileSaver::save_entries`]. Draining may queue more entries and
//!   keeps going until the queue is exhausted;
//! - the second-pass block list (`save_block`), flushed explicitly by the
//!   caller with [`ResFileSaver::write_blocks`] once all sibling headers of a
//!   level are written.
//!
//! Strings go to the [`StringPool`], raw buffer bytes and external payloads to
//! data blocks written after the pool.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::cursor::{ByteOrder, ByteWriter, StringEncoding};
use crate::dict::{DICT_SIGNATURE, DictKeys, build_nodes};
use crate::error::{Error, Result, narrow, narrow_len};
use crate::options::SaveOptions;
use crate::registry::{ItemEntry, ItemKey, ItemKind, ItemRegistry, Payload};
use crate::relocation::{
    RelocationEntry, RelocationSection, RelocationTableBuilder, SectionRegion,
};
use crate::res_data::ResData;
use crate::string_pool::{PLACEHOLDER_OFFSET, StringPool, StringPoolLayout};
use crate::version::{Revision, Version};

/// Size of the zeroed memory pool block.
pub const MEMORY_POOL_SIZE: usize = 0x120;

/// A reserved 8-byte offset field, filled by [`ResFileSaver::write_offset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetSlot(u64);

impl OffsetSlot {
    pub fn position(self) -> u64 {
        self.0
    }
}

/// Position of the chunk being written inside its list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListSlot {
    pub index: usize,
    pub len: usize,
}

/// Buffer data region a block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferRegion {
    Index,
    Vertex,
}

impl BufferRegion {
    fn section(self) -> RelocationSection {
        match self {
            BufferRegion::Index => RelocationSection::IndexBuffer,
            BufferRegion::Vertex => RelocationSection::VertexBuffer,
        }
    }
}

struct SecondPassBlock<'a> {
    data: &'a dyn ResData,
    slots: Vec<OffsetSlot>,
    target: Option<u64>,
}

/// Buffer bytes addressed by 4-byte offsets relative to the buffer region.
struct BufferBlock<'a> {
    region: BufferRegion,
    parts: Vec<&'a [u8]>,
    sites: Vec<u64>,
}

/// External payload addressed by an absolute offset.
struct ExternalBlock<'a> {
    data: &'a [u8],
    sites: Vec<u64>,
}

/// Writes an object graph borrowed for `'a`.
pub struct ResFileSaver<'a> {
    writer: ByteWriter,
    version: Version,
    revision: Revision,
    options: SaveOptions,
    items: ItemRegistry<'a>,
    strings: StringPool,
    known_strings: Vec<String>,
    second_pass: Vec<SecondPassBlock<'a>>,
    second_pass_lookup: HashMap<ItemKey, usize>,
    buffers: Vec<BufferBlock<'a>>,
    buffer_lookup: HashMap<ItemKey, usize>,
    externals: Vec<ExternalBlock<'a>>,
    external_lookup: HashMap<ItemKey, usize>,
    relocations: RelocationTableBuilder,
    regions: [SectionRegion; 5],
    list_slot: Option<ListSlot>,
    buffer_info: Option<u64>,
    string_pool: Option<StringPoolLayout>,
}

impl<'a> ResFileSaver<'a> {
    pub fn new(version: Version, order: ByteOrder, options: SaveOptions) -> Result<Self> {
        let revision = version.revision()?;
        let strings = StringPool::with_encoding(options.default_encoding);
        Ok(Self {
            writer: ByteWriter::new(order),
            version,
            revision,
            options,
            items: ItemRegistry::default(),
            strings,
            known_strings: Vec::new(),
            second_pass: Vec::new(),
            second_pass_lookup: HashMap::new(),
            buffers: Vec::new(),
            buffer_lookup: HashMap::new(),
            externals: Vec::new(),
            external_lookup: HashMap::new(),
            relocations: RelocationTableBuilder::new(RelocationSection::ALL.len()),
            regions: [SectionRegion::default(); 5],
            list_slot: None,
            buffer_info: None,
            string_pool: None,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn options(&self) -> &SaveOptions {
        &self.options
    }

    /// Strings of the loaded file, in the order they were stored.
    pub fn set_known_strings(&mut self, strings: Vec<String>) {
        self.known_strings = strings;
    }

    /// Set while a list element is being written.
    pub fn list_slot(&self) -> Option<ListSlot> {
        self.list_slot
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }

    // ---- explicit offsets ----

    /// Write a zeroed offset and return its slot.
    pub fn save_offset(&mut self) -> Result<OffsetSlot> {
        let slot = OffsetSlot(self.writer.position());
        self.writer.write_u64(0)?;
        Ok(slot)
    }

    /// Store the current position into `slot`.
    pub fn write_offset(&mut self, slot: OffsetSlot) -> Result<()> {
        let here = self.writer.position();
        self.writer.write_u64_at(slot.0, here)
    }

    /// An absent reference.
    pub fn write_null(&mut self) -> Result<()> {
        self.writer.write_u64(0)
    }

    // ---- queued items ----

    fn reserve_site(&mut self, index: usize) -> Result<()> {
        let site = self.writer.position();
        self.items.add_site(index, site);
        self.writer.write_u64(PLACEHOLDER_OFFSET)
    }

    /// Reserve an offset to `data`, written once however often it is reserved.
    pub fn save<T: ResData>(&mut self, data: &'a T) -> Result<()> {
        let (index, _) = self.items.register(ItemKey::of(data, ItemKind::ResData), || {
            ItemEntry::new(Payload::Data(data), ItemKind::ResData)
        });
        self.reserve_site(index)
    }

    /// [`save`](Self::save), or a null offset for `None`.
    pub fn save_option<T: ResData>(&mut self, data: Option<&'a T>) -> Result<()> {
        match data {
            Some(data) => self.save(data),
            None => self.write_null(),
        }
    }

    /// Reserve an offset to a contiguous run of `items`. An empty list is null.
    ///
    /// Lists are identified by their first element. A list whose elements
    /// already sit back to back in the file reuses that placement; otherwise
    /// it is written in full.
    pub fn save_list<T: ResData>(&mut self, items: impl IntoIterator<Item = &'a T>) -> Result<()> {
        let items: Vec<&'a T> = items.into_iter().collect();
        let Some(&first) = items.first() else {
            return self.write_null();
        };

        let (list, created) = self.items.register(ItemKey::of(first, ItemKind::List), || {
            ItemEntry::new(Payload::List(Vec::new()), ItemKind::List)
        });
        if created {
            let mut elements = Vec::with_capacity(items.len());
            for &item in &items {
                let (element, _) = self.items.register(ItemKey::of(item, ItemKind::ResData), || {
                    ItemEntry::new(Payload::Data(item), ItemKind::ResData)
                });
                let entry = &mut self.items.entries[element];
                if entry.target.is_none() && entry.list.is_none() {
                    entry.list = Some(list);
                }
                elements.push(element);
            }
            self.items.entries[list].payload = Payload::List(elements);
        }
        self.reserve_site(list)
    }

    /// Reserve an offset to a `_DIC` block. An empty dictionary is null.
    pub fn save_dict<D: DictKeys>(&mut self, dict: &'a D) -> Result<()> {
        if dict.dict_keys().is_empty() {
            return self.write_null();
        }
        let (index, _) = self.items.register(ItemKey::of(dict, ItemKind::Dict), || {
            ItemEntry::new(Payload::Dict(dict), ItemKind::Dict)
        });
        self.reserve_site(index)
    }

    /// Reserve an offset to bytes produced by `write`, keyed by `key`.
    pub fn save_custom<K: ?Sized + 'static>(
        &mut self,
        key: &'a K,
        write: impl FnOnce(&mut ResFileSaver<'a>) -> Result<()> + 'a,
    ) -> Result<()> {
        self.save_custom_aligned(key, 8, write)
    }

    pub fn save_custom_aligned<K: ?Sized + 'static>(
        &mut self,
        key: &'a K,
        align: u64,
        write: impl FnOnce(&mut ResFileSaver<'a>) -> Result<()> + 'a,
    ) -> Result<()> {
        let (index, _) = self.items.register(ItemKey::of(key, ItemKind::Custom), || {
            let mut entry = ItemEntry::new(Payload::Custom(Some(Box::new(write))), ItemKind::Custom);
            entry.align = align;
            entry
        });
        self.reserve_site(index)
    }

    /// Reserve an offset to a pooled string in the default encoding.
    pub fn save_string(&mut self, value: Option<&str>) -> Result<()> {
        self.reserve_string(value, None)
    }

    pub fn save_string_encoded(
        &mut self,
        value: Option<&str>,
        encoding: StringEncoding,
    ) -> Result<()> {
        self.reserve_string(value, Some(encoding))
    }

    fn reserve_string(&mut self, value: Option<&str>, encoding: Option<StringEncoding>) -> Result<()> {
        let Some(value) = value else {
            return self.write_null();
        };
        self.strings.reserve(value, encoding, self.writer.position());
        self.writer.write_u64(PLACEHOLDER_OFFSET)
    }

    /// Address of a pooled string once the pool is written.
    pub fn string_position(&self, value: &str) -> Option<u64> {
        self.strings.position(value)
    }

    // ---- second pass ----

    /// Reserve an offset to `data`, written by [`write_blocks`](Self::write_blocks).
    pub fn save_block<T: ResData>(&mut self, data: &'a T) -> Result<()> {
        let key = ItemKey::of(data, ItemKind::ResData);
        if let Some(&index) = self.second_pass_lookup.get(&key) {
            if let Some(target) = self.second_pass[index].target {
                return self.writer.write_u64(target);
            }
            let slot = self.save_offset()?;
            self.second_pass[index].slots.push(slot);
            return Ok(());
        }
        let slot = self.save_offset()?;
        self.second_pass_lookup.insert(key, self.second_pass.len());
        self.second_pass.push(SecondPassBlock {
            data,
            slots: vec![slot],
            target: None,
        });
        Ok(())
    }

    /// Write every pending second-pass block and fill its slots.
    pub fn write_blocks(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.second_pass.len() {
            if self.second_pass[index].target.is_none() {
                self.writer.align(8)?;
                let here = self.writer.position();
                self.second_pass[index].target = Some(here);
                for slot in &self.second_pass[index].slots {
                    self.writer.write_u64_at(slot.0, here)?;
                }
                let data = self.second_pass[index].data;
                data.save(self)?;
            }
            index += 1;
        }
        Ok(())
    }

    // ---- data blocks ----

    /// Reserve a 4-byte buffer-relative offset to `parts`, laid out back to
    /// back with 8-byte alignment each.
    pub fn save_buffer_offset<K: ?Sized + 'static>(
        &mut self,
        region: BufferRegion,
        key: &'a K,
        parts: Vec<&'a [u8]>,
    ) -> Result<()> {
        let site = self.writer.position();
        self.writer.write_u32(0)?;
        let key = ItemKey::of(key, ItemKind::Custom);
        match self.buffer_lookup.get(&key) {
            Some(&index) => self.buffers[index].sites.push(site),
            None => {
                self.buffer_lookup.insert(key, self.buffers.len());
                self.buffers.push(BufferBlock {
                    region,
                    parts,
                    sites: vec![site],
                });
            }
        }
        Ok(())
    }

    /// Reserve an absolute offset to an external payload. Empty payloads are null.
    pub fn save_external_data(&mut self, data: &'a [u8]) -> Result<()> {
        if data.is_empty() {
            return self.write_null();
        }
        let site = self.writer.position();
        self.writer.write_u64(PLACEHOLDER_OFFSET)?;
        let key = ItemKey::of(data, ItemKind::Custom);
        match self.external_lookup.get(&key) {
            Some(&index) => self.externals[index].sites.push(site),
            None => {
                self.external_lookup.insert(key, self.externals.len());
                self.externals.push(ExternalBlock {
                    data,
                    sites: vec![site],
                });
            }
        }
        Ok(())
    }

    // ---- relocation ----

    pub fn save_relocate_entry_to_section(
        &mut self,
        offset: u64,
        offset_count: u32,
        struct_count: u32,
        padding_count: u32,
        section: RelocationSection,
        hint: &str,
    ) -> Result<()> {
        self.relocations.add(
            section.index(),
            offset,
            offset_count,
            struct_count,
            padding_count,
            hint,
        )
    }

    /// Relocate the offsets of the chunk being written.
    ///
    /// Inside a list only the first element registers, covering the whole
    /// list; outside a list the entry covers this chunk alone.
    pub fn relocate_struct(
        &mut self,
        offset: u64,
        offset_count: u32,
        padding_count: u32,
        section: RelocationSection,
        hint: &str,
    ) -> Result<()> {
        let struct_count = match self.list_slot {
            Some(slot) if slot.index > 0 => return Ok(()),
            Some(slot) => slot.len,
            None => 1,
        };
        self.save_relocate_entry_to_section(
            offset,
            offset_count,
            narrow_len("relocated list length", struct_count)?,
            padding_count,
            section,
            hint,
        )
    }

    /// Entries registered so far for `section`.
    pub fn relocation_entries(&self, section: RelocationSection) -> &[RelocationEntry] {
        self.relocations.entries(section.index())
    }

    // ---- draining ----

    /// Write every queued entry, including entries queued while draining.
    pub fn save_entries(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.items.len() {
            self.write_entry(index)?;
            index += 1;
        }
        log::debug!("drained {} queued entries", self.items.len());
        Ok(())
    }

    fn write_entry(&mut self, index: usize) -> Result<()> {
        let entry = &self.items.entries[index];
        if entry.target.is_some() || entry.list.is_some() {
            return Ok(());
        }
        let align = entry.align;
        log::trace!("writing queued {} #{index}", entry.kind.name());

        match &entry.payload {
            Payload::Data(data) => {
                let data = *data;
                self.begin_entry(index, align)?;
                data.save(self)?;
                self.items.entries[index].end = Some(self.writer.position());
                Ok(())
            }
            Payload::Dict(dict) => {
                let dict = *dict;
                self.begin_entry(index, align)?;
                self.write_dict(dict)
            }
            Payload::List(elements) => {
                let elements = elements.clone();
                self.write_list(index, &elements)
            }
            Payload::Custom(_) => {
                let write = match &mut self.items.entries[index].payload {
                    Payload::Custom(write) => write.take(),
                    _ => None,
                };
                self.begin_entry(index, align)?;
                match write {
                    Some(write) => write(self),
                    None => Ok(()),
                }
            }
        }
    }

    fn begin_entry(&mut self, index: usize, align: u64) -> Result<()> {
        self.writer.align(align)?;
        self.items.entries[index].target = Some(self.writer.position());
        Ok(())
    }

    /// Start of `elements` if every one is already written directly after
    /// the previous one.
    fn placed_run(&self, elements: &[usize]) -> Option<u64> {
        let start = self.items.entries[*elements.first()?].target?;
        let mut next = start;
        for &element in elements {
            let entry = &self.items.entries[element];
            if entry.target != Some(next) {
                return None;
            }
            next = entry.end?;
        }
        Some(start)
    }

    fn write_list(&mut self, list: usize, elements: &[usize]) -> Result<()> {
        if elements.is_empty() {
            return Ok(());
        }
        if let Some(target) = self.placed_run(elements) {
            self.items.entries[list].target = Some(target);
            return Ok(());
        }

        let align = self.items.entries[list].align;
        self.begin_entry(list, align)?;
        let len = elements.len();
        for (position, &element) in elements.iter().enumerate() {
            let Payload::Data(data) = self.items.entries[element].payload else {
                continue;
            };
            let here = self.writer.position();
            let first_placement = self.items.entries[element].target.is_none();
            if first_placement {
                self.items.entries[element].target = Some(here);
            }

            let outer = self.list_slot.replace(ListSlot {
                index: position,
                len,
            });
            let result = data.save(self);
            self.list_slot = outer;
            result?;
            if first_placement {
                self.items.entries[element].end = Some(self.writer.position());
            }
        }
        Ok(())
    }

    /// Backpatch every reserved site with its entry's final position.
    pub fn write_offsets(&mut self) -> Result<()> {
        for entry in &self.items.entries {
            match entry.target {
                Some(target) => {
                    for &site in &entry.pending_offsets {
                        self.writer.write_u64_at(site, target)?;
                    }
                }
                None if !entry.pending_offsets.is_empty() => {
                    return Err(Error::UnresolvedReference {
                        kind: entry.kind.name(),
                        sites: entry.pending_offsets.len(),
                    });
                }
                None => {}
            }
        }
        Ok(())
    }

    // ---- fixed blocks ----

    /// Write a `_DIC` block at the next 8-byte boundary.
    pub fn write_dict<D: DictKeys + ?Sized>(&mut self, dict: &D) -> Result<()> {
        let keys = dict.dict_keys();
        let nodes = build_nodes(&keys)?;

        self.writer.align(8)?;
        let start = self.writer.position();
        self.writer.write_signature(&DICT_SIGNATURE)?;
        self.writer.write_i32(narrow_len("dictionary size", keys.len())?)?;
        for node in &nodes {
            self.writer.write_u32(node.reference)?;
            self.writer.write_u16(node.left)?;
            self.writer.write_u16(node.right)?;
            self.save_string(Some(&node.key))?;
        }
        self.save_relocate_entry_to_section(
            start + 16,
            1,
            narrow_len("dictionary size", nodes.len())?,
            1,
            RelocationSection::Main,
            "dictionary keys",
        )
    }

    /// Write the buffer info block and point `slot` at it. Its size and
    /// region fields are filled by [`write_buffers`](Self::write_buffers).
    pub fn write_buffer_info(&mut self, slot: OffsetSlot) -> Result<()> {
        self.writer.align(8)?;
        let start = self.writer.position();
        self.write_offset(slot)?;
        self.writer.write_u32(0)?;
        self.writer.write_u32(0)?;
        self.writer.write_u64(0)?;
        self.writer.write_zeros(16)?;
        self.buffer_info = Some(start);
        self.save_relocate_entry_to_section(
            start + 8,
            1,
            1,
            0,
            RelocationSection::IndexBuffer,
            "buffer info",
        )
    }

    /// Emit the string pool and patch every string site.
    pub fn write_string_pool(&mut self) -> Result<StringPoolLayout> {
        let known: &[String] = if self.options.preserve_string_order {
            &self.known_strings
        } else {
            &[]
        };
        let layout = self
            .strings
            .write(&mut self.writer, known)?;
        log::debug!(
            "string pool at {:#x}: {} strings, {:#x} bytes",
            layout.offset,
            layout.count,
            layout.size
        );

        self.regions[RelocationSection::Main.index()] = SectionRegion {
            base: 0,
            size: narrow("main section size", self.writer.position())?,
        };
        self.string_pool = Some(layout);
        Ok(layout)
    }

    /// Write index data, then vertex data, and fill the buffer info block.
    pub fn write_buffers(&mut self, alignment: u64) -> Result<()> {
        if !self.buffers.is_empty() {
            self.writer.align(alignment)?;
        }
        let start = self.writer.position();

        for region in [BufferRegion::Index, BufferRegion::Vertex] {
            let used = self.buffers.iter().any(|b| b.region == region);
            if used {
                self.writer.align(8)?;
            }
            let base = self.writer.position();
            for block in self.buffers.iter().filter(|b| b.region == region) {
                self.writer.align(8)?;
                let relative: u32 = narrow("buffer offset", self.writer.position() - start)?;
                for part in &block.parts {
                    self.writer.align(8)?;
                    self.writer.write_bytes(part)?;
                }
                for &site in &block.sites {
                    self.writer.write_u32_at(site, relative)?;
                }
            }
            if used {
                self.writer.align(8)?;
            }
            self.regions[region.section().index()] = SectionRegion {
                base: narrow("buffer region offset", base)?,
                size: narrow("buffer region size", self.writer.position() - base)?,
            };
        }

        let end = self.writer.position();
        if let Some(info) = self.buffer_info {
            self.writer
                .write_u32_at(info + 4, narrow("buffer size", end - start)?)?;
            self.writer.write_u64_at(info + 8, start)?;
        }
        log::debug!(
            "buffer data at {start:#x}: {} blocks, {:#x} bytes",
            self.buffers.len(),
            end - start
        );
        Ok(())
    }

    /// Write the zeroed memory pool block and point `slot` at it.
    pub fn write_memory_pool(&mut self, slot: OffsetSlot) -> Result<()> {
        self.writer.align(8)?;
        let start = self.writer.position();
        self.write_offset(slot)?;
        self.writer.write_zeros(MEMORY_POOL_SIZE)?;
        self.regions[RelocationSection::MemoryPool.index()] = SectionRegion {
            base: narrow("memory pool offset", start)?,
            size: MEMORY_POOL_SIZE as u32,
        };
        Ok(())
    }

    /// Write external payloads, each at a multiple of `alignment`.
    pub fn write_external_data(&mut self, alignment: u64) -> Result<()> {
        let mut base = None;
        for block in &self.externals {
            self.writer.align(alignment)?;
            let at = self.writer.position();
            base.get_or_insert(at);
            self.writer.write_bytes(block.data)?;
            for &site in &block.sites {
                self.writer.write_u64_at(site, at)?;
            }
        }
        let end = self.writer.position();
        let base = base.unwrap_or(end);
        self.regions[RelocationSection::ExternalFiles.index()] = SectionRegion {
            base: narrow("external data offset", base)?,
            size: narrow("external data size", end - base)?,
        };
        Ok(())
    }

    /// Build and write the relocation table; returns its offset.
    pub fn write_relocation_table(&mut self) -> Result<u64> {
        let builder = std::mem::replace(
            &mut self.relocations,
            RelocationTableBuilder::new(RelocationSection::ALL.len()),
        );
        let table = builder.build(&self.regions)?;
        let at = table.write(&mut self.writer)?;
        if let Some(pool) = self.string_pool {
            self.writer
                .write_u32_at(pool.offset + 4, narrow("string pool size", at - pool.offset)?)?;
        }
        log::debug!(
            "relocation table at {at:#x}: {} entries",
            table.entry_count()
        );
        Ok(at)
    }
}

impl Deref for ResFileSaver<'_> {
    type Target = ByteWriter;

    fn deref(&self) -> &ByteWriter {
        &self.writer
    }
}

impl DerefMut for ResFileSaver<'_> {
    fn deref_mut(&mut self) -> &mut ByteWriter {
        &mut self.writer
    }
}
