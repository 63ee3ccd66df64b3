//! Graph loader.
//!
//! Chunks read their own fields and ask the loader to follow offsets. Every
//! followed offset is read under a temporary seek, so the caller's cursor is
//! back where it was afterwards. Chunks are cached by start offset: reading
//! the same offset twice yields the same `Rc`.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::cursor::{ByteOrder, ByteReader, StringEncoding};
use crate::dict::{DICT_SIGNATURE, ResDict};
use crate::error::{Error, Result};
use crate::options::LoadOptions;
use crate::res_data::ResData;
use crate::version::{Revision, Version};

/// Reads an object graph out of a borrowed byte slice.
pub struct ResFileLoader<'d> {
    reader: ByteReader<'d>,
    version: Version,
    revision: Revision,
    options: LoadOptions,
    data_map: HashMap<u64, Rc<dyn Any>>,
    strings: BTreeMap<(u64, StringEncoding), String>,
    buffer_base: u64,
}

impl<'d> ResFileLoader<'d> {
    /// The version defaults to the oldest supported layout until
    /// [`set_version`](Self::set_version) is called.
    pub fn new(data: &'d [u8], options: LoadOptions) -> Self {
        Self {
            reader: ByteReader::new(data, ByteOrder::Little),
            version: Version::new(0, 5, 0, 0),
            revision: Revision::V5,
            options,
            data_map: HashMap::new(),
            strings: BTreeMap::new(),
            buffer_base: 0,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Select the layout revision for everything read afterwards.
    pub fn set_version(&mut self, version: Version) -> Result<()> {
        self.revision = version.revision()?;
        self.version = version;
        Ok(())
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Absolute start of the buffer data region.
    pub fn buffer_base(&self) -> u64 {
        self.buffer_base
    }

    pub fn set_buffer_base(&mut self, offset: u64) {
        self.buffer_base = offset;
    }

    /// Number of distinct chunks loaded so far.
    pub fn loaded_count(&self) -> usize {
        self.data_map.len()
    }

    /// Every string read so far, in file order.
    pub fn known_strings(&self) -> Vec<String> {
        self.strings.values().cloned().collect()
    }

    /// Run `f` at `pos`, then restore the current position even if `f` fails.
    pub fn temporary_seek<T>(
        &mut self,
        pos: u64,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.reader.position();
        let result = self.reader.seek(pos).and_then(|()| f(self));
        self.reader.restore(saved);
        result
    }

    /// Read `T` at the current position, sharing the instance per start offset.
    ///
    /// `T::load` always runs so the cursor advances past the chunk; when the
    /// offset was loaded before, the fresh value is dropped in favor of the
    /// cached one.
    pub fn read_res_data<T: ResData>(&mut self) -> Result<Rc<T>> {
        let start = self.reader.position();
        let value = T::load(self)?;
        if let Some(existing) = self.data_map.get(&start) {
            return Rc::clone(existing)
                .downcast::<T>()
                .map_err(|_| Error::ConflictingType { offset: start });
        }
        let value = Rc::new(value);
        self.data_map.insert(start, value.clone() as Rc<dyn Any>);
        Ok(value)
    }

    /// Follow the offset at the cursor. A zero offset is `None`.
    pub fn load<T: ResData>(&mut self) -> Result<Option<Rc<T>>> {
        let offset = self.reader.read_offset()?;
        self.load_at(offset)
    }

    pub fn load_at<T: ResData>(&mut self, offset: u64) -> Result<Option<Rc<T>>> {
        if offset == 0 {
            return Ok(None);
        }
        self.temporary_seek(offset, |l| l.read_res_data()).map(Some)
    }

    /// Follow the offset at the cursor to `count` consecutive chunks.
    pub fn load_list<T: ResData>(&mut self, count: usize) -> Result<Vec<Rc<T>>> {
        let offset = self.reader.read_offset()?;
        self.load_list_at(count, offset)
    }

    pub fn load_list_at<T: ResData>(&mut self, count: usize, offset: u64) -> Result<Vec<Rc<T>>> {
        if offset == 0 || count == 0 {
            return Ok(Vec::new());
        }
        self.temporary_seek(offset, |l| {
            let mut items = Vec::with_capacity(count.min(l.reader.len()));
            for _ in 0..count {
                items.push(l.read_res_data()?);
            }
            Ok(items)
        })
    }

    /// Follow the offset at the cursor to a `_DIC` block and pair its keys
    /// with `values`.
    pub fn load_dict<T>(&mut self, values: Vec<T>) -> Result<ResDict<T>> {
        let offset = self.reader.read_offset()?;
        self.load_dict_at(offset, values)
    }

    pub fn load_dict_at<T>(&mut self, offset: u64, values: Vec<T>) -> Result<ResDict<T>> {
        let keys = self.load_dict_keys_at(offset)?;
        ResDict::from_parts(keys, values)
    }

    /// Keys of the `_DIC` block at `offset`, root excluded. Null is empty.
    pub fn load_dict_keys_at(&mut self, offset: u64) -> Result<Vec<String>> {
        if offset == 0 {
            return Ok(Vec::new());
        }
        self.temporary_seek(offset, |l| {
            l.reader.read_signature(&DICT_SIGNATURE)?;
            let count = l.reader.read_i32()?;
            let count = usize::try_from(count).map_err(|_| Error::InvalidValue {
                what: "dictionary size",
                value: count as u64,
            })?;

            let mut keys = Vec::with_capacity(count.min(l.reader.len()));
            for node in 0..=count {
                l.reader.skip(8)?;
                let key = l.load_string()?.unwrap_or_default();
                if node > 0 {
                    keys.push(key);
                }
            }
            Ok(keys)
        })
    }

    /// Follow the offset at the cursor and run `read` there.
    pub fn load_custom<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        let offset = self.reader.read_offset()?;
        self.load_custom_at(offset, read)
    }

    pub fn load_custom_at<T>(
        &mut self,
        offset: u64,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if offset == 0 {
            return Ok(None);
        }
        self.temporary_seek(offset, read).map(Some)
    }

    /// Follow a string offset in the default encoding.
    pub fn load_string(&mut self) -> Result<Option<String>> {
        let encoding = self.options.default_encoding;
        self.load_string_encoded(encoding)
    }

    pub fn load_string_encoded(&mut self, encoding: StringEncoding) -> Result<Option<String>> {
        let offset = self.reader.read_offset()?;
        self.load_string_at(offset, encoding)
    }

    /// Read the pooled string whose bytes start at `offset`, cached per
    /// offset and encoding.
    pub fn load_string_at(
        &mut self,
        offset: u64,
        encoding: StringEncoding,
    ) -> Result<Option<String>> {
        if offset == 0 {
            return Ok(None);
        }
        if let Some(value) = self.strings.get(&(offset, encoding)) {
            return Ok(Some(value.clone()));
        }
        let prefix = offset.checked_sub(2).ok_or(Error::OffsetOutOfBounds {
            offset,
            len: self.reader.len(),
        })?;
        let value = self
            .reader
            .temporary_seek(prefix, |r| r.read_prefixed_string(encoding))?;
        self.strings.insert((offset, encoding), value.clone());
        Ok(Some(value))
    }
}

impl<'d> Deref for ResFileLoader<'d> {
    type Target = ByteReader<'d>;

    fn deref(&self) -> &ByteReader<'d> {
        &self.reader
    }
}

impl DerefMut for ResFileLoader<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}
