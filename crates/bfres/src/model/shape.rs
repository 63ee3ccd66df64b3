//! Shapes (`FSHP`) and their index meshes.

use std::rc::Rc;

use bfres_core::{
    BufferRegion, Error, RelocationSection, ResData, ResFileLoader, ResFileSaver, Result,
    Revision, narrow_len,
};

use super::vertex::VertexBuffer;
use crate::arrays::{load_u16s, read_f32s, save_u16s, write_f32s};

pub const SHAPE_SIGNATURE: [u8; 4] = *b"FSHP";

/// Width of one index in a mesh's index buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexFormat {
    UInt8,
    #[default]
    UInt16,
    UInt32,
}

impl IndexFormat {
    pub fn from_raw(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::UInt8),
            1 => Ok(Self::UInt16),
            2 => Ok(Self::UInt32),
            _ => Err(Error::InvalidValue {
                what: "index format",
                value: u64::from(value),
            }),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::UInt8 => 0,
            Self::UInt16 => 1,
            Self::UInt32 => 2,
        }
    }

    /// Bytes per index.
    pub fn size(self) -> usize {
        match self {
            Self::UInt8 => 1,
            Self::UInt16 => 2,
            Self::UInt32 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubMesh {
    pub offset: u32,
    pub count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mesh {
    pub primitive_type: u32,
    pub index_format: IndexFormat,
    pub first_vertex: u32,
    pub sub_meshes: Vec<SubMesh>,
    /// Raw index buffer in file byte order.
    pub index_data: Vec<u8>,
}

impl Mesh {
    pub fn index_count(&self) -> usize {
        self.index_data.len() / self.index_format.size()
    }
}

impl ResData for Mesh {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let sub_mesh_offset = loader.read_offset()?;
        let data_offset = loader.read_u32()?;
        let primitive_type = loader.read_u32()?;
        let index_format = IndexFormat::from_raw(loader.read_u32()?)?;
        let index_count = loader.read_u32()? as usize;
        let first_vertex = loader.read_u32()?;
        let sub_mesh_count = loader.read_u16()? as usize;
        loader.skip(2)?;

        let sub_meshes = loader
            .load_custom_at(sub_mesh_offset, |l| {
                l.read_vec(sub_mesh_count, |r| {
                    Ok(SubMesh {
                        offset: r.read_u32()?,
                        count: r.read_u32()?,
                    })
                })
            })?
            .unwrap_or_default();

        let size = index_count
            .checked_mul(index_format.size())
            .ok_or(Error::ValueOutOfRange {
                what: "index count",
                value: index_count as u64,
            })?;
        let at = loader.buffer_base() + u64::from(data_offset);
        let index_data = loader.temporary_seek(at, |l| Ok(l.read_bytes(size)?.to_vec()))?;

        Ok(Self {
            primitive_type,
            index_format,
            first_vertex,
            sub_meshes,
            index_data,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        if self.index_data.len() % self.index_format.size() != 0 {
            return Err(Error::InvalidValue {
                what: "index buffer length",
                value: self.index_data.len() as u64,
            });
        }

        let pos = saver.position();
        saver.relocate_struct(pos, 1, 3, RelocationSection::Main, "mesh")?;
        if self.sub_meshes.is_empty() {
            saver.write_null()?;
        } else {
            let sub_meshes = &self.sub_meshes;
            saver.save_custom(sub_meshes, move |s| {
                for sub_mesh in sub_meshes {
                    s.write_u32(sub_mesh.offset)?;
                    s.write_u32(sub_mesh.count)?;
                }
                Ok(())
            })?;
        }
        let parts = vec![self.index_data.as_slice()];
        saver.save_buffer_offset(BufferRegion::Index, &self.index_data, parts)?;
        saver.write_u32(self.primitive_type)?;
        saver.write_u32(self.index_format.raw())?;
        saver.write_u32(narrow_len("index count", self.index_count())?)?;
        saver.write_u32(self.first_vertex)?;
        saver.write_u16(narrow_len("sub mesh count", self.sub_meshes.len())?)?;
        saver.write_u16(0)
    }
}

/// Axis-aligned bounding box of one mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounding {
    pub center: [f32; 3],
    pub extent: [f32; 3],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    pub name: String,
    pub flags: u32,
    pub index: u16,
    pub material_index: u16,
    pub bone_index: u16,
    pub vertex_buffer_index: u16,
    pub vertex_skin_count: u8,
    /// Usually also listed in the owning model's vertex buffers.
    pub vertex_buffer: Rc<VertexBuffer>,
    pub meshes: Vec<Rc<Mesh>>,
    pub skin_bone_indices: Vec<u16>,
    /// One per mesh.
    pub bounding_boxes: Vec<Bounding>,
    /// One per mesh. Older layouts store only the first component.
    pub bounding_radii: Vec<[f32; 4]>,
}

impl ResData for Shape {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let revision = loader.revision();
        loader.read_signature(&SHAPE_SIGNATURE)?;
        let flags = loader.read_u32()?;
        let name = loader.load_string()?.unwrap_or_default();
        let vertex_buffer = loader
            .load::<VertexBuffer>()?
            .ok_or(Error::MissingData("shape vertex buffer"))?;
        let meshes_offset = loader.read_offset()?;
        let skin_offset = loader.read_offset()?;
        let bounding_offset = loader.read_offset()?;
        let radius_offset = loader.read_offset()?;
        loader.skip(8)?;
        let index = loader.read_u16()?;
        let material_index = loader.read_u16()?;
        let bone_index = loader.read_u16()?;
        let vertex_buffer_index = loader.read_u16()?;
        let skin_count = loader.read_u16()? as usize;
        let vertex_skin_count = loader.read_u8()?;
        let mesh_count = loader.read_u8()? as usize;
        loader.skip(4)?;

        let meshes = loader.load_list_at(mesh_count, meshes_offset)?;
        let skin_bone_indices = load_u16s(loader, skin_count, skin_offset)?;
        let bounding_boxes = loader
            .load_custom_at(bounding_offset, |l| {
                l.read_vec(mesh_count, |r| {
                    Ok(Bounding {
                        center: read_f32s(r)?,
                        extent: read_f32s(r)?,
                    })
                })
            })?
            .unwrap_or_default();
        let bounding_radii = loader
            .load_custom_at(radius_offset, |l| {
                l.read_vec(mesh_count, |r| match revision {
                    Revision::V5 => Ok([r.read_f32()?, 0.0, 0.0, 0.0]),
                    Revision::V9 | Revision::V10 => read_f32s(r),
                })
            })?
            .unwrap_or_default();

        Ok(Self {
            name,
            flags,
            index,
            material_index,
            bone_index,
            vertex_buffer_index,
            vertex_skin_count,
            vertex_buffer,
            meshes,
            skin_bone_indices,
            bounding_boxes,
            bounding_radii,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        for (what, len) in [
            ("bounding box count", self.bounding_boxes.len()),
            ("bounding radius count", self.bounding_radii.len()),
        ] {
            if len != 0 && len != self.meshes.len() {
                return Err(Error::InvalidValue {
                    what,
                    value: len as u64,
                });
            }
        }

        let revision = saver.revision();
        let pos = saver.position();
        saver.write_signature(&SHAPE_SIGNATURE)?;
        saver.write_u32(self.flags)?;
        saver.relocate_struct(pos + 8, 6, 4, RelocationSection::Main, "shape")?;
        saver.save_string(Some(&self.name))?;
        saver.save(&*self.vertex_buffer)?;
        saver.save_list(self.meshes.iter().map(|m| &**m))?;
        save_u16s(saver, &self.skin_bone_indices)?;

        if self.bounding_boxes.is_empty() {
            saver.write_null()?;
        } else {
            let boxes = &self.bounding_boxes;
            saver.save_custom(boxes, move |s| {
                for bounding in boxes {
                    write_f32s(s, &bounding.center)?;
                    write_f32s(s, &bounding.extent)?;
                }
                Ok(())
            })?;
        }
        if self.bounding_radii.is_empty() {
            saver.write_null()?;
        } else {
            let radii = &self.bounding_radii;
            saver.save_custom(radii, move |s| {
                for radius in radii {
                    match revision {
                        Revision::V5 => s.write_f32(radius[0])?,
                        Revision::V9 | Revision::V10 => write_f32s(s, radius)?,
                    }
                }
                Ok(())
            })?;
        }
        saver.write_null()?;

        saver.write_u16(self.index)?;
        saver.write_u16(self.material_index)?;
        saver.write_u16(self.bone_index)?;
        saver.write_u16(self.vertex_buffer_index)?;
        saver.write_u16(narrow_len("skin bone index count", self.skin_bone_indices.len())?)?;
        saver.write_u8(self.vertex_skin_count)?;
        saver.write_u8(narrow_len("mesh count", self.meshes.len())?)?;
        saver.write_u32(0)
    }
}
