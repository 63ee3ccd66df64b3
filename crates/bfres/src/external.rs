//! Files embedded verbatim in the container.

use bfres_core::{ResData, ResFileLoader, ResFileSaver, Result, narrow_len};

use crate::arrays::load_bytes;

/// An opaque embedded file. The header relocates its data offset; the
/// payload itself lives in the external-files section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalFile {
    pub data: Vec<u8>,
}

impl ExternalFile {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl ResData for ExternalFile {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let offset = loader.read_offset()?;
        let size = loader.read_u32()? as usize;
        loader.skip(4)?;
        Ok(Self {
            data: load_bytes(loader, size, offset)?,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        saver.save_external_data(&self.data)?;
        saver.write_u32(narrow_len("external file size", self.data.len())?)?;
        saver.write_u32(0)
    }
}
