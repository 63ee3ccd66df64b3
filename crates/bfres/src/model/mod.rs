//! Models (`FMDL`) and everything they own.

mod material;
mod shape;
mod skeleton;
mod vertex;

use std::rc::Rc;

use bfres_core::{Error, ResData, ResDict, ResFileLoader, ResFileSaver, Result, narrow_len};

pub use material::{
    MATERIAL_SIGNATURE, Material, RenderInfo, RenderInfoValue, Sampler, ShaderAssign, ShaderParam,
};
pub use shape::{Bounding, IndexFormat, Mesh, SHAPE_SIGNATURE, Shape, SubMesh};
pub use skeleton::{Bone, SKELETON_SIGNATURE, Skeleton};
pub use vertex::{VERTEX_BUFFER_SIGNATURE, VertexAttrib, VertexBuffer, VertexBufferData};

use crate::user_data::UserData;

pub const MODEL_SIGNATURE: [u8; 4] = *b"FMDL";

/// Models are stored as an array directly under the file header, which
/// relocates them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    pub name: String,
    pub path: Option<String>,
    pub flags: u32,
    pub skeleton: Rc<Skeleton>,
    pub vertex_buffers: Vec<Rc<VertexBuffer>>,
    pub shapes: ResDict<Rc<Shape>>,
    pub materials: ResDict<Rc<Material>>,
    pub user_data: ResDict<Rc<UserData>>,
}

impl Model {
    /// Whether saving this model places anything in the buffer sections.
    pub(crate) fn has_buffers(&self) -> bool {
        !self.vertex_buffers.is_empty()
            || self
                .shapes
                .values()
                .any(|s| !s.meshes.is_empty() || !s.vertex_buffer.buffers.is_empty())
    }
}

impl ResData for Model {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        loader.read_signature(&MODEL_SIGNATURE)?;
        let flags = loader.read_u32()?;
        let name = loader.load_string()?.unwrap_or_default();
        let path = loader.load_string()?;
        let skeleton = loader
            .load::<Skeleton>()?
            .ok_or(Error::MissingData("model skeleton"))?;
        let vertex_buffers_offset = loader.read_offset()?;
        let shapes_offset = loader.read_offset()?;
        let shape_dict_offset = loader.read_offset()?;
        let materials_offset = loader.read_offset()?;
        let material_dict_offset = loader.read_offset()?;
        let user_data_offset = loader.read_offset()?;
        let user_data_dict_offset = loader.read_offset()?;
        loader.skip(8)?;
        let vertex_buffer_count = loader.read_u16()? as usize;
        let shape_count = loader.read_u16()? as usize;
        let material_count = loader.read_u16()? as usize;
        let user_data_count = loader.read_u16()? as usize;
        // Total vertex count is derived from the buffers on save.
        loader.skip(8)?;

        let vertex_buffers = loader.load_list_at(vertex_buffer_count, vertex_buffers_offset)?;
        let shapes = loader.load_list_at(shape_count, shapes_offset)?;
        let shapes = loader.load_dict_at(shape_dict_offset, shapes)?;
        let materials = loader.load_list_at(material_count, materials_offset)?;
        let materials = loader.load_dict_at(material_dict_offset, materials)?;
        let user_data = loader.load_list_at(user_data_count, user_data_offset)?;
        let user_data = loader.load_dict_at(user_data_dict_offset, user_data)?;

        Ok(Self {
            name,
            path,
            flags,
            skeleton,
            vertex_buffers,
            shapes,
            materials,
            user_data,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        saver.write_signature(&MODEL_SIGNATURE)?;
        saver.write_u32(self.flags)?;
        saver.save_string(Some(&self.name))?;
        saver.save_string(self.path.as_deref())?;
        saver.save_block(&*self.skeleton)?;
        saver.save_list(self.vertex_buffers.iter().map(|v| &**v))?;
        saver.save_list(self.shapes.values().map(|s| &**s))?;
        saver.save_dict(&self.shapes)?;
        saver.save_list(self.materials.values().map(|m| &**m))?;
        saver.save_dict(&self.materials)?;
        saver.save_list(self.user_data.values().map(|u| &**u))?;
        saver.save_dict(&self.user_data)?;
        saver.write_null()?;
        saver.write_u16(narrow_len("vertex buffer count", self.vertex_buffers.len())?)?;
        saver.write_u16(narrow_len("shape count", self.shapes.len())?)?;
        saver.write_u16(narrow_len("material count", self.materials.len())?)?;
        saver.write_u16(narrow_len("model user data count", self.user_data.len())?)?;
        saver.write_u32(vertex::total_vertex_count(&self.vertex_buffers)?)?;
        saver.write_u32(0)
    }
}
