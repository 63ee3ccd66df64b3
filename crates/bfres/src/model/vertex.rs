//! Vertex buffers (`FVTX`) and their attributes.

use std::rc::Rc;

use bfres_core::{
    BufferRegion, ByteOrder, Error, RelocationSection, ResData, ResDict, ResFileLoader,
    ResFileSaver, Result, align_up, narrow, narrow_len,
};

pub const VERTEX_BUFFER_SIGNATURE: [u8; 4] = *b"FVTX";

/// Named vertex attribute. `format` is always stored big-endian.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexAttrib {
    pub name: String,
    pub format: u32,
    pub offset: u16,
    pub buffer_index: u8,
}

impl ResData for VertexAttrib {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let name = loader.load_string()?.unwrap_or_default();
        let format = loader.with_byte_order(ByteOrder::Big, |r| r.read_u32())?;
        let offset = loader.read_u16()?;
        let buffer_index = loader.read_u8()?;
        loader.skip(1)?;
        Ok(Self {
            name,
            format,
            offset,
            buffer_index,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 1, 1, RelocationSection::Main, "vertex attribute")?;
        saver.save_string(Some(&self.name))?;
        saver.with_byte_order(ByteOrder::Big, |w| w.write_u32(self.format))?;
        saver.write_u16(self.offset)?;
        saver.write_u8(self.buffer_index)?;
        saver.write_u8(0)
    }
}

/// One raw vertex stream with its layout info.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexBufferData {
    pub stride: u32,
    pub divisor: u32,
    pub flags: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexBuffer {
    pub index: u16,
    pub vertex_count: u32,
    pub vertex_skin_count: u8,
    pub attributes: ResDict<Rc<VertexAttrib>>,
    pub buffers: Vec<VertexBufferData>,
}

impl ResData for VertexBuffer {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        loader.read_signature(&VERTEX_BUFFER_SIGNATURE)?;
        loader.skip(4)?;
        let attributes_offset = loader.read_offset()?;
        let attribute_dict_offset = loader.read_offset()?;
        let size_offset = loader.read_offset()?;
        let stride_offset = loader.read_offset()?;
        let buffer_offset = loader.read_u32()?;
        let attribute_count = loader.read_u8()? as usize;
        let buffer_count = loader.read_u8()? as usize;
        let index = loader.read_u16()?;
        let vertex_count = loader.read_u32()?;
        let vertex_skin_count = loader.read_u8()?;
        loader.skip(3)?;

        let attributes = loader.load_list_at(attribute_count, attributes_offset)?;
        let attributes = loader.load_dict_at(attribute_dict_offset, attributes)?;

        let sizes = loader
            .load_custom_at(size_offset, |l| {
                l.read_vec(buffer_count, |r| {
                    let size = r.read_u32()?;
                    let flags = r.read_u32()?;
                    r.skip(8)?;
                    Ok((size, flags))
                })
            })?
            .unwrap_or_default();
        let strides = loader
            .load_custom_at(stride_offset, |l| {
                l.read_vec(buffer_count, |r| {
                    let stride = r.read_u32()?;
                    let divisor = r.read_u32()?;
                    r.skip(8)?;
                    Ok((stride, divisor))
                })
            })?
            .unwrap_or_default();
        if sizes.len() != buffer_count {
            return Err(Error::MissingData("vertex buffer size info"));
        }
        if strides.len() != buffer_count {
            return Err(Error::MissingData("vertex buffer stride info"));
        }

        let mut at = loader.buffer_base() + u64::from(buffer_offset);
        let mut buffers = Vec::with_capacity(buffer_count);
        for ((size, flags), (stride, divisor)) in sizes.into_iter().zip(strides) {
            let data = loader.temporary_seek(at, |l| Ok(l.read_bytes(size as usize)?.to_vec()))?;
            at += align_up(u64::from(size), 8);
            buffers.push(VertexBufferData {
                stride,
                divisor,
                flags,
                data,
            });
        }

        Ok(Self {
            index,
            vertex_count,
            vertex_skin_count,
            attributes,
            buffers,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.write_signature(&VERTEX_BUFFER_SIGNATURE)?;
        saver.write_u32(0)?;
        saver.relocate_struct(pos + 8, 4, 3, RelocationSection::Main, "vertex buffer")?;
        saver.save_list(self.attributes.values().map(|a| &**a))?;
        saver.save_dict(&self.attributes)?;

        if self.buffers.is_empty() {
            saver.write_null()?;
            saver.write_null()?;
            saver.write_u32(0)?;
        } else {
            let buffers = &self.buffers;
            // Size and stride tables are keyed by the slice and the Vec so
            // they register as distinct entries.
            saver.save_custom(buffers.as_slice(), move |s| {
                for buffer in buffers {
                    s.write_u32(narrow_len("vertex buffer size", buffer.data.len())?)?;
                    s.write_u32(buffer.flags)?;
                    s.write_zeros(8)?;
                }
                Ok(())
            })?;
            saver.save_custom(buffers, move |s| {
                for buffer in buffers {
                    s.write_u32(buffer.stride)?;
                    s.write_u32(buffer.divisor)?;
                    s.write_zeros(8)?;
                }
                Ok(())
            })?;
            let parts = buffers.iter().map(|b| b.data.as_slice()).collect();
            saver.save_buffer_offset(BufferRegion::Vertex, buffers, parts)?;
        }

        saver.write_u8(narrow_len("vertex attribute count", self.attributes.len())?)?;
        saver.write_u8(narrow_len("vertex buffer count", self.buffers.len())?)?;
        saver.write_u16(self.index)?;
        saver.write_u32(self.vertex_count)?;
        saver.write_u8(self.vertex_skin_count)?;
        saver.write_zeros(3)
    }
}

/// Total vertex count over `buffers`, as stored in the model header.
pub(crate) fn total_vertex_count<'v>(
    buffers: impl IntoIterator<Item = &'v Rc<VertexBuffer>>,
) -> Result<u32> {
    let total: u64 = buffers.into_iter().map(|b| u64::from(b.vertex_count)).sum();
    narrow("total vertex count", total)
}
