//! User data attached to models, bones, materials, and animations.

use bfres_core::{
    Error, RelocationSection, ResData, ResFileLoader, ResFileSaver, Result, StringEncoding,
    narrow_len,
};

use crate::arrays::{
    load_bytes, load_f32s, load_i32s, load_strings, save_bytes, save_f32s, save_i32s,
    save_strings,
};

/// Typed payload of a [`UserData`] entry.
#[derive(Clone, Debug, PartialEq)]
pub enum UserDataValue {
    Int32(Vec<i32>),
    Single(Vec<f32>),
    /// Strings in the file's default encoding.
    String(Vec<String>),
    /// Strings stored as UTF-16.
    WString(Vec<String>),
    Byte(Vec<u8>),
}

impl Default for UserDataValue {
    fn default() -> Self {
        Self::Int32(Vec::new())
    }
}

impl UserDataValue {
    fn type_code(&self) -> u8 {
        match self {
            Self::Int32(_) => 0,
            Self::Single(_) => 1,
            Self::String(_) => 2,
            Self::WString(_) => 3,
            Self::Byte(_) => 4,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Single(v) => v.len(),
            Self::String(v) | Self::WString(v) => v.len(),
            Self::Byte(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserData {
    pub name: String,
    pub value: UserDataValue,
}

impl UserData {
    pub fn new(name: impl Into<String>, value: UserDataValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl ResData for UserData {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let name = loader.load_string()?.unwrap_or_default();
        let data = loader.read_offset()?;
        let count = loader.read_u32()? as usize;
        let kind = loader.read_u8()?;
        loader.skip(3)?;

        let value = match kind {
            0 => UserDataValue::Int32(load_i32s(loader, count, data)?),
            1 => UserDataValue::Single(load_f32s(loader, count, data)?),
            2 => UserDataValue::String(load_strings(loader, count, data, None)?),
            3 => UserDataValue::WString(load_strings(
                loader,
                count,
                data,
                Some(StringEncoding::Utf16),
            )?),
            4 => UserDataValue::Byte(load_bytes(loader, count, data)?),
            other => {
                return Err(Error::InvalidValue {
                    what: "user data type",
                    value: u64::from(other),
                });
            }
        };
        Ok(Self { name, value })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 2, 1, RelocationSection::Main, "user data")?;
        saver.save_string(Some(&self.name))?;
        match &self.value {
            UserDataValue::Int32(v) => save_i32s(saver, v)?,
            UserDataValue::Single(v) => save_f32s(saver, v)?,
            UserDataValue::String(v) => save_strings(saver, v, None, "user data strings")?,
            UserDataValue::WString(v) => {
                save_strings(saver, v, Some(StringEncoding::Utf16), "user data strings")?
            }
            UserDataValue::Byte(v) => save_bytes(saver, v)?,
        }
        saver.write_u32(narrow_len("user data count", self.value.len())?)?;
        saver.write_u8(self.value.type_code())?;
        saver.write_zeros(3)
    }
}
