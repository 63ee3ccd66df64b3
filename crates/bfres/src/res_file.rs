//! The container root: file header, top-level tables, and the save sequence.

use std::path::Path;
use std::rc::Rc;

use bfres_core::relocation::RelocationTable;
use bfres_core::string_pool::STRING_POOL_SIGNATURE;
use bfres_core::{
    ByteOrder, Error, LoadOptions, RelocationSection, ResData, ResDict, ResFileLoader,
    ResFileSaver, Result, Revision, SaveOptions, Version, narrow, narrow_len,
};

use crate::anim::SkeletalAnim;
use crate::external::ExternalFile;
use crate::model::Model;

pub const FILE_SIGNATURE: [u8; 4] = *b"FRES";

/// Second half of the eight-byte file magic.
const SIGNATURE_PADDING: [u8; 4] = *b"    ";

const BYTE_ORDER_MARK: u16 = 0xFEFF;

const FILE_NAME_FIELD: u64 = 0x10;
const RELOCATION_TABLE_FIELD: u64 = 0x18;
const FILE_SIZE_FIELD: u64 = 0x1C;

/// A whole BFRES container.
#[derive(Clone, Debug, PartialEq)]
pub struct ResFile {
    pub name: String,
    pub version: Version,
    pub byte_order: ByteOrder,
    /// Log2 of the alignment of buffer and external file data.
    pub alignment: u8,
    pub target_address_size: u8,
    pub flag: u16,
    /// Header block present from layout revision 9 on, kept as read.
    pub reserved: [u8; 32],
    /// Header flags present from layout revision 9 on.
    pub external_flags: u8,
    pub models: ResDict<Rc<Model>>,
    pub skeletal_anims: ResDict<Rc<SkeletalAnim>>,
    pub external_files: ResDict<Rc<ExternalFile>>,
    /// String pool order of the file this was loaded from. Saving keeps it
    /// so an unmodified file is written back byte for byte.
    pub string_order: Vec<String>,
}

impl Default for ResFile {
    fn default() -> Self {
        Self::new("", Version::new(0, 5, 0, 3))
    }
}

impl ResFile {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            byte_order: ByteOrder::Little,
            alignment: 0x0C,
            target_address_size: 0x40,
            flag: 0,
            reserved: [0; 32],
            external_flags: 0,
            models: ResDict::new(),
            skeletal_anims: ResDict::new(),
            external_files: ResDict::new(),
            string_order: Vec::new(),
        }
    }

    pub fn revision(&self) -> Result<Revision> {
        self.version.revision()
    }

    /// Alignment of buffer and external file data in bytes.
    pub fn alignment_bytes(&self) -> Result<u64> {
        1u64.checked_shl(u32::from(self.alignment))
            .filter(|&bytes| bytes <= u64::from(u32::MAX))
            .ok_or(Error::ValueOutOfRange {
                what: "file alignment",
                value: u64::from(self.alignment),
            })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with(data, LoadOptions::default())
    }

    pub fn from_bytes_with(data: &[u8], options: LoadOptions) -> Result<Self> {
        let mut loader = ResFileLoader::new(data, options);
        Self::load(&mut loader)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(SaveOptions::default())
    }

    pub fn to_bytes_with(&self, options: SaveOptions) -> Result<Vec<u8>> {
        let mut saver = ResFileSaver::new(self.version, self.byte_order, options)?;
        self.save(&mut saver)?;
        Ok(saver.into_bytes())
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read the container starting at offset 0.
    pub fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        loader.seek(0)?;
        loader.read_signature(&FILE_SIGNATURE)?;
        loader.read_signature(&SIGNATURE_PADDING)?;
        let mark = loader.temporary_seek(0x0C, |l| l.read_array::<2>())?;
        let byte_order = ByteOrder::from_mark(mark)
            .ok_or(Error::InvalidByteOrderMark(u16::from_be_bytes(mark)))?;
        loader.set_byte_order(byte_order);

        let version = Version::from_packed(loader.read_u32()?);
        loader.set_version(version)?;
        let revision = loader.revision();
        log::debug!("loading container version {version} ({})", byte_order.name());

        loader.skip(2)?;
        let alignment = loader.read_u8()?;
        let target_address_size = loader.read_u8()?;
        // The file name offset duplicates the name string below.
        loader.skip(4)?;
        let flag = loader.read_u16()?;
        loader.skip(2)?;
        let relocation_offset = loader.read_u32()?;
        let file_size = loader.read_u32()?;
        if file_size as usize != loader.len() {
            return Err(Error::SizeMismatch {
                header: file_size,
                actual: loader.len(),
            });
        }

        let name = loader.load_string()?.unwrap_or_default();
        let models_offset = loader.read_offset()?;
        let model_dict_offset = loader.read_offset()?;
        let mut reserved = [0; 32];
        if revision.has_reserved_blocks() {
            reserved = loader.read_array()?;
        }
        let anims_offset = loader.read_offset()?;
        let anim_dict_offset = loader.read_offset()?;
        // Memory pool, rebuilt on save.
        loader.skip(8)?;
        let buffer_info_offset = loader.read_offset()?;
        let external_files_offset = loader.read_offset()?;
        let external_file_dict_offset = loader.read_offset()?;
        loader.skip(8)?;
        let string_pool_offset = loader.read_offset()?;
        loader.skip(4)?;
        let model_count = loader.read_u16()? as usize;
        let anim_count = loader.read_u16()? as usize;
        let external_file_count = loader.read_u16()? as usize;
        let external_flags = if revision.has_reserved_blocks() {
            let flags = loader.read_u8()?;
            loader.skip(1)?;
            flags
        } else {
            loader.skip(2)?;
            0
        };
        loader.skip(4)?;

        if buffer_info_offset != 0 {
            let base = loader.temporary_seek(buffer_info_offset + 8, |l| l.read_u64())?;
            loader.set_buffer_base(base);
        }
        if string_pool_offset != 0 {
            loader.temporary_seek(string_pool_offset, |l| {
                l.read_signature(&STRING_POOL_SIGNATURE)
            })?;
        }
        if loader.options().validates_relocation_table() && relocation_offset != 0 {
            let table = RelocationTable::read(loader, u64::from(relocation_offset))?;
            log::trace!("relocation table: {} entries", table.entry_count());
        }

        let models = loader.load_list_at(model_count, models_offset)?;
        let models = loader.load_dict_at(model_dict_offset, models)?;
        let skeletal_anims = loader.load_list_at(anim_count, anims_offset)?;
        let skeletal_anims = loader.load_dict_at(anim_dict_offset, skeletal_anims)?;
        let external_files = loader.load_list_at(external_file_count, external_files_offset)?;
        let external_files = loader.load_dict_at(external_file_dict_offset, external_files)?;
        log::debug!(
            "loaded {} models, {} skeletal anims, {} external files ({} chunks)",
            models.len(),
            skeletal_anims.len(),
            external_files.len(),
            loader.loaded_count()
        );

        Ok(Self {
            name,
            version,
            byte_order,
            alignment,
            target_address_size,
            flag,
            reserved,
            external_flags,
            models,
            skeletal_anims,
            external_files,
            string_order: loader.known_strings(),
        })
    }

    fn has_buffers(&self) -> bool {
        self.models.values().any(|m| m.has_buffers())
    }

    /// Write the container into a fresh saver.
    pub fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let revision = saver.revision();
        let alignment = self.alignment_bytes()?;
        saver.set_known_strings(self.string_order.clone());
        log::debug!("saving {:?} as version {}", self.name, self.version);

        saver.write_signature(&FILE_SIGNATURE)?;
        saver.write_signature(&SIGNATURE_PADDING)?;
        saver.write_u32(self.version.packed())?;
        saver.write_u16(BYTE_ORDER_MARK)?;
        saver.write_u8(self.alignment)?;
        saver.write_u8(self.target_address_size)?;
        saver.write_u32(0)?;
        saver.write_u16(self.flag)?;
        saver.write_u16(0)?;
        saver.write_u32(0)?;
        saver.write_u32(0)?;

        let pos = saver.position();
        saver.save_relocate_entry_to_section(pos, 3, 1, 0, RelocationSection::Main, "file header")?;
        saver.save_string(Some(&self.name))?;
        let models_slot = saver.save_offset()?;
        let model_dict_slot = saver.save_offset()?;
        if revision.has_reserved_blocks() {
            saver.write_bytes(&self.reserved)?;
        }

        let base = saver.position();
        for (offset, count, section) in [
            (0x00, 2, RelocationSection::Main),
            (0x10, 1, RelocationSection::MemoryPool),
            (0x18, 1, RelocationSection::Main),
            (0x20, 2, RelocationSection::Main),
            (0x38, 1, RelocationSection::Main),
        ] {
            saver.save_relocate_entry_to_section(base + offset, count, 1, 0, section, "file header")?;
        }
        let anims_slot = saver.save_offset()?;
        let anim_dict_slot = saver.save_offset()?;
        let memory_pool_slot = saver.save_offset()?;
        let buffer_info_slot = saver.save_offset()?;
        let external_files_slot = saver.save_offset()?;
        let external_file_dict_slot = saver.save_offset()?;
        saver.write_null()?;
        let string_pool_field = saver.position();
        saver.write_u64(0)?;
        saver.write_u32(0)?;
        saver.write_u16(narrow_len("model count", self.models.len())?)?;
        saver.write_u16(narrow_len("skeletal anim count", self.skeletal_anims.len())?)?;
        saver.write_u16(narrow_len("external file count", self.external_files.len())?)?;
        if revision.has_reserved_blocks() {
            saver.write_u8(self.external_flags)?;
            saver.write_u8(0)?;
        } else {
            saver.write_u16(0)?;
        }
        saver.write_u32(0)?;

        // Top-level arrays are written inline, right after the header.
        if !self.models.is_empty() {
            saver.align(8)?;
            saver.write_offset(models_slot)?;
            let pos = saver.position();
            let count = narrow_len("model count", self.models.len())?;
            saver.save_relocate_entry_to_section(pos + 8, 10, count, 4, RelocationSection::Main, "models")?;
            for model in self.models.values() {
                model.save(saver)?;
            }
        }
        if !self.skeletal_anims.is_empty() {
            saver.align(8)?;
            saver.write_offset(anims_slot)?;
            let pos = saver.position();
            let count = narrow_len("skeletal anim count", self.skeletal_anims.len())?;
            saver.save_relocate_entry_to_section(
                pos + 8,
                7,
                count,
                3,
                RelocationSection::Main,
                "skeletal anims",
            )?;
            for anim in self.skeletal_anims.values() {
                anim.save(saver)?;
            }
        }
        if self.has_buffers() {
            saver.write_buffer_info(buffer_info_slot)?;
        }
        if !self.external_files.is_empty() {
            saver.align(8)?;
            saver.write_offset(external_files_slot)?;
            let pos = saver.position();
            let count = narrow_len("external file count", self.external_files.len())?;
            saver.save_relocate_entry_to_section(
                pos,
                1,
                count,
                1,
                RelocationSection::ExternalFiles,
                "external files",
            )?;
            for file in self.external_files.values() {
                file.save(saver)?;
            }
        }

        if !self.models.is_empty() {
            saver.align(8)?;
            saver.write_offset(model_dict_slot)?;
            saver.write_dict(&self.models)?;
        }
        if !self.skeletal_anims.is_empty() {
            saver.align(8)?;
            saver.write_offset(anim_dict_slot)?;
            saver.write_dict(&self.skeletal_anims)?;
        }
        if !self.external_files.is_empty() {
            saver.align(8)?;
            saver.write_offset(external_file_dict_slot)?;
            saver.write_dict(&self.external_files)?;
        }

        saver.write_blocks()?;
        saver.save_entries()?;
        saver.write_offsets()?;

        let pool = saver.write_string_pool()?;
        saver.write_u64_at(string_pool_field, pool.offset)?;
        saver.write_u32_at(string_pool_field + 8, pool.size)?;
        saver.write_buffers(alignment)?;
        saver.write_memory_pool(memory_pool_slot)?;
        saver.write_external_data(alignment)?;
        let relocation_offset = saver.write_relocation_table()?;

        let name_offset = saver
            .string_position(&self.name)
            .ok_or(Error::MissingData("file name string"))?;
        saver.write_u32_at(FILE_NAME_FIELD, narrow("file name offset", name_offset)?)?;
        saver.write_u32_at(
            RELOCATION_TABLE_FIELD,
            narrow("relocation table offset", relocation_offset)?,
        )?;
        let file_size = narrow_len("file size", saver.len())?;
        saver.write_u32_at(FILE_SIZE_FIELD, file_size)?;
        log::debug!("saved {file_size:#x} bytes");
        Ok(())
    }
}
