//! Skeletons (`FSKL`) and bones.

use std::rc::Rc;

use bfres_core::{
    Error, RelocationSection, ResData, ResDict, ResFileLoader, ResFileSaver, Result, narrow_len,
};

use crate::arrays::{load_u16s, read_f32s, save_u16s, write_f32s};
use crate::user_data::UserData;

pub const SKELETON_SIGNATURE: [u8; 4] = *b"FSKL";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bone {
    pub name: String,
    pub user_data: ResDict<Rc<UserData>>,
    /// Present in the file from layout revision 9 on.
    pub reserved: [u8; 16],
    pub index: u16,
    pub parent_index: u16,
    pub smooth_matrix_index: i16,
    pub rigid_matrix_index: i16,
    pub billboard_index: u16,
    pub flags: u32,
    pub scale: [f32; 3],
    pub rotation: [f32; 4],
    pub position: [f32; 3],
}

impl ResData for Bone {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let name = loader.load_string()?.unwrap_or_default();
        let user_data_offset = loader.read_offset()?;
        let user_data_dict_offset = loader.read_offset()?;
        let mut reserved = [0; 16];
        if loader.revision().has_reserved_blocks() {
            reserved = loader.read_array()?;
        }
        let index = loader.read_u16()?;
        let parent_index = loader.read_u16()?;
        let smooth_matrix_index = loader.read_i16()?;
        let rigid_matrix_index = loader.read_i16()?;
        let billboard_index = loader.read_u16()?;
        let user_data_count = loader.read_u16()? as usize;
        let flags = loader.read_u32()?;
        let scale = read_f32s(loader)?;
        let rotation = read_f32s(loader)?;
        let position = read_f32s(loader)?;

        let user_data = loader.load_list_at(user_data_count, user_data_offset)?;
        let user_data = loader.load_dict_at(user_data_dict_offset, user_data)?;

        Ok(Self {
            name,
            user_data,
            reserved,
            index,
            parent_index,
            smooth_matrix_index,
            rigid_matrix_index,
            billboard_index,
            flags,
            scale,
            rotation,
            position,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let reserved = saver.revision().has_reserved_blocks();
        let size: u32 = if reserved { 0x60 } else { 0x50 };
        let pos = saver.position();
        saver.relocate_struct(pos, 3, size / 8 - 3, RelocationSection::Main, "bone")?;
        saver.save_string(Some(&self.name))?;
        saver.save_list(self.user_data.values().map(|u| &**u))?;
        saver.save_dict(&self.user_data)?;
        if reserved {
            saver.write_bytes(&self.reserved)?;
        }
        saver.write_u16(self.index)?;
        saver.write_u16(self.parent_index)?;
        saver.write_i16(self.smooth_matrix_index)?;
        saver.write_i16(self.rigid_matrix_index)?;
        saver.write_u16(self.billboard_index)?;
        saver.write_u16(narrow_len("bone user data count", self.user_data.len())?)?;
        saver.write_u32(self.flags)?;
        write_f32s(saver, &self.scale)?;
        write_f32s(saver, &self.rotation)?;
        write_f32s(saver, &self.position)
    }
}

/// Bone hierarchy of a model. Written after the model headers, in the
/// second pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skeleton {
    pub flags: u32,
    pub bones: ResDict<Rc<Bone>>,
    /// Smooth matrices first, then rigid ones.
    pub matrix_to_bone: Vec<u16>,
    /// One row-major 3x4 matrix per smooth matrix.
    pub inverse_model_matrices: Vec<[f32; 12]>,
    /// Present in the file from layout revision 9 on.
    pub reserved: [u8; 8],
}

impl Skeleton {
    pub fn smooth_matrix_count(&self) -> usize {
        self.inverse_model_matrices.len()
    }

    pub fn rigid_matrix_count(&self) -> usize {
        self.matrix_to_bone
            .len()
            .saturating_sub(self.inverse_model_matrices.len())
    }
}

impl ResData for Skeleton {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        loader.read_signature(&SKELETON_SIGNATURE)?;
        let flags = loader.read_u32()?;
        let bone_dict_offset = loader.read_offset()?;
        let bones_offset = loader.read_offset()?;
        let matrix_to_bone_offset = loader.read_offset()?;
        let inverse_offset = loader.read_offset()?;
        loader.skip(8)?;
        let bone_count = loader.read_u16()? as usize;
        let smooth_count = loader.read_u16()? as usize;
        let rigid_count = loader.read_u16()? as usize;
        loader.skip(2)?;
        let mut reserved = [0; 8];
        if loader.revision().has_reserved_blocks() {
            reserved = loader.read_array()?;
        }

        let bones = loader.load_list_at(bone_count, bones_offset)?;
        let bones = loader.load_dict_at(bone_dict_offset, bones)?;
        let matrix_to_bone = load_u16s(loader, smooth_count + rigid_count, matrix_to_bone_offset)?;
        let inverse_model_matrices = loader
            .load_custom_at(inverse_offset, |l| l.read_vec(smooth_count, read_f32s))?
            .unwrap_or_default();

        Ok(Self {
            flags,
            bones,
            matrix_to_bone,
            inverse_model_matrices,
            reserved,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        if self.matrix_to_bone.len() < self.inverse_model_matrices.len() {
            return Err(Error::InvalidValue {
                what: "matrix to bone count",
                value: self.matrix_to_bone.len() as u64,
            });
        }

        let pos = saver.position();
        saver.write_signature(&SKELETON_SIGNATURE)?;
        saver.write_u32(self.flags)?;
        saver.relocate_struct(pos + 8, 4, 0, RelocationSection::Main, "skeleton")?;
        saver.save_dict(&self.bones)?;
        saver.save_list(self.bones.values().map(|b| &**b))?;
        save_u16s(saver, &self.matrix_to_bone)?;
        if self.inverse_model_matrices.is_empty() {
            saver.write_null()?;
        } else {
            let matrices = &self.inverse_model_matrices;
            saver.save_custom(matrices, move |s| {
                matrices.iter().try_for_each(|m| write_f32s(s, m))
            })?;
        }
        saver.write_null()?;
        saver.write_u16(narrow_len("bone count", self.bones.len())?)?;
        saver.write_u16(narrow_len("smooth matrix count", self.smooth_matrix_count())?)?;
        saver.write_u16(narrow_len("rigid matrix count", self.rigid_matrix_count())?)?;
        saver.write_u16(0)?;
        if saver.revision().has_reserved_blocks() {
            saver.write_bytes(&self.reserved)?;
        }
        Ok(())
    }
}
