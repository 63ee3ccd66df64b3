//! Materials (`FMAT`) and the chunks only materials reference.

use std::rc::Rc;

use bfres_core::{
    Error, RelocationSection, ResData, ResDict, ResFileLoader, ResFileSaver, Result, narrow_len,
};

use crate::arrays::{
    load_bytes, load_f32s, load_i32s, load_i64s, load_strings, save_bytes, save_f32s, save_i32s,
    save_i64s, save_string_values, save_strings,
};
use crate::user_data::UserData;

pub const MATERIAL_SIGNATURE: [u8; 4] = *b"FMAT";

#[derive(Clone, Debug, PartialEq)]
pub enum RenderInfoValue {
    Int32(Vec<i32>),
    Single(Vec<f32>),
    String(Vec<String>),
}

impl Default for RenderInfoValue {
    fn default() -> Self {
        Self::Int32(Vec::new())
    }
}

impl RenderInfoValue {
    fn type_code(&self) -> u8 {
        match self {
            Self::Int32(_) => 0,
            Self::Single(_) => 1,
            Self::String(_) => 2,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Single(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderInfo {
    pub name: String,
    pub value: RenderInfoValue,
}

impl ResData for RenderInfo {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let name = loader.load_string()?.unwrap_or_default();
        let data = loader.read_offset()?;
        let count = loader.read_u16()? as usize;
        let kind = loader.read_u8()?;
        loader.skip(5)?;
        let value = match kind {
            0 => RenderInfoValue::Int32(load_i32s(loader, count, data)?),
            1 => RenderInfoValue::Single(load_f32s(loader, count, data)?),
            2 => RenderInfoValue::String(load_strings(loader, count, data, None)?),
            other => {
                return Err(Error::InvalidValue {
                    what: "render info type",
                    value: u64::from(other),
                });
            }
        };
        Ok(Self { name, value })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 2, 1, RelocationSection::Main, "render info")?;
        saver.save_string(Some(&self.name))?;
        match &self.value {
            RenderInfoValue::Int32(v) => save_i32s(saver, v)?,
            RenderInfoValue::Single(v) => save_f32s(saver, v)?,
            RenderInfoValue::String(v) => save_strings(saver, v, None, "render info strings")?,
        }
        saver.write_u16(narrow_len("render info count", self.value.len())?)?;
        saver.write_u8(self.value.type_code())?;
        saver.write_zeros(5)
    }
}

/// Texture sampler. The hardware sampler state is kept as raw bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sampler {
    pub name: String,
    pub state: [u8; 32],
}

impl ResData for Sampler {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let name = loader.load_string()?.unwrap_or_default();
        let state = loader.read_array()?;
        Ok(Self { name, state })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 1, 4, RelocationSection::Main, "sampler")?;
        saver.save_string(Some(&self.name))?;
        saver.write_bytes(&self.state)
    }
}

/// Shader parameter descriptor. Values live in the material's parameter
/// data at `data_offset`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderParam {
    pub name: String,
    pub param_type: u8,
    pub data_offset: u16,
    pub depended_index: u16,
    pub depend_index: u16,
}

impl ResData for ShaderParam {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let name = loader.load_string()?.unwrap_or_default();
        let data_offset = loader.read_u16()?;
        let depended_index = loader.read_u16()?;
        let param_type = loader.read_u8()?;
        loader.skip(1)?;
        let depend_index = loader.read_u16()?;
        Ok(Self {
            name,
            param_type,
            data_offset,
            depended_index,
            depend_index,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 1, 1, RelocationSection::Main, "shader param")?;
        saver.save_string(Some(&self.name))?;
        saver.write_u16(self.data_offset)?;
        saver.write_u16(self.depended_index)?;
        saver.write_u8(self.param_type)?;
        saver.write_u8(0)?;
        saver.write_u16(self.depend_index)
    }
}

/// Binds a material to a shading model. Often shared between materials.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderAssign {
    pub shader_archive_name: String,
    pub shading_model_name: String,
    pub revision: u32,
    pub attrib_assigns: ResDict<String>,
    pub sampler_assigns: ResDict<String>,
    pub shader_options: ResDict<String>,
}

impl ResData for ShaderAssign {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let shader_archive_name = loader.load_string()?.unwrap_or_default();
        let shading_model_name = loader.load_string()?.unwrap_or_default();
        let attrib_offset = loader.read_offset()?;
        let attrib_dict_offset = loader.read_offset()?;
        let sampler_offset = loader.read_offset()?;
        let sampler_dict_offset = loader.read_offset()?;
        let option_offset = loader.read_offset()?;
        let option_dict_offset = loader.read_offset()?;
        let revision = loader.read_u32()?;
        let attrib_count = loader.read_u8()? as usize;
        let sampler_count = loader.read_u8()? as usize;
        let option_count = loader.read_u16()? as usize;

        let mut table = |count, values, dict| -> Result<ResDict<String>> {
            let values = load_strings(loader, count, values, None)?;
            loader.load_dict_at(dict, values)
        };
        let attrib_assigns = table(attrib_count, attrib_offset, attrib_dict_offset)?;
        let sampler_assigns = table(sampler_count, sampler_offset, sampler_dict_offset)?;
        let shader_options = table(option_count, option_offset, option_dict_offset)?;

        Ok(Self {
            shader_archive_name,
            shading_model_name,
            revision,
            attrib_assigns,
            sampler_assigns,
            shader_options,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 8, 1, RelocationSection::Main, "shader assign")?;
        saver.save_string(Some(&self.shader_archive_name))?;
        saver.save_string(Some(&self.shading_model_name))?;
        for assigns in [
            &self.attrib_assigns,
            &self.sampler_assigns,
            &self.shader_options,
        ] {
            save_string_values(saver, assigns, "shader assign values")?;
            saver.save_dict(assigns)?;
        }
        saver.write_u32(self.revision)?;
        saver.write_u8(narrow_len("attrib assign count", self.attrib_assigns.len())?)?;
        saver.write_u8(narrow_len("sampler assign count", self.sampler_assigns.len())?)?;
        saver.write_u16(narrow_len("shader option count", self.shader_options.len())?)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub flags: u32,
    pub index: u16,
    pub render_infos: ResDict<Rc<RenderInfo>>,
    pub shader_assign: Option<Rc<ShaderAssign>>,
    pub texture_names: Vec<String>,
    pub samplers: ResDict<Rc<Sampler>>,
    pub shader_params: ResDict<Rc<ShaderParam>>,
    pub shader_param_data: Vec<u8>,
    pub user_data: ResDict<Rc<UserData>>,
    /// Per-sampler runtime slots, stored from layout revision 10 on.
    pub sampler_slots: Vec<i64>,
    /// Per-texture runtime slots, stored from layout revision 10 on.
    pub texture_slots: Vec<i64>,
}

impl ResData for Material {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let has_slots = loader.revision().has_material_slots();
        loader.read_signature(&MATERIAL_SIGNATURE)?;
        let flags = loader.read_u32()?;
        let name = loader.load_string()?.unwrap_or_default();
        let render_info_offset = loader.read_offset()?;
        let render_info_dict_offset = loader.read_offset()?;
        let shader_assign = loader.load::<ShaderAssign>()?;
        let texture_offset = loader.read_offset()?;
        let sampler_offset = loader.read_offset()?;
        let sampler_dict_offset = loader.read_offset()?;
        let param_offset = loader.read_offset()?;
        let param_dict_offset = loader.read_offset()?;
        let param_data_offset = loader.read_offset()?;
        let user_data_offset = loader.read_offset()?;
        let user_data_dict_offset = loader.read_offset()?;
        loader.skip(8)?;
        let (sampler_slot_offset, texture_slot_offset) = if has_slots {
            (loader.read_offset()?, loader.read_offset()?)
        } else {
            (0, 0)
        };
        let index = loader.read_u16()?;
        let render_info_count = loader.read_u16()? as usize;
        let sampler_count = loader.read_u8()? as usize;
        let texture_count = loader.read_u8()? as usize;
        let param_count = loader.read_u16()? as usize;
        let param_data_size = loader.read_u16()? as usize;
        let user_data_count = loader.read_u16()? as usize;
        loader.skip(4)?;

        let render_infos = loader.load_list_at(render_info_count, render_info_offset)?;
        let render_infos = loader.load_dict_at(render_info_dict_offset, render_infos)?;
        let texture_names = load_strings(loader, texture_count, texture_offset, None)?;
        let samplers = loader.load_list_at(sampler_count, sampler_offset)?;
        let samplers = loader.load_dict_at(sampler_dict_offset, samplers)?;
        let shader_params = loader.load_list_at(param_count, param_offset)?;
        let shader_params = loader.load_dict_at(param_dict_offset, shader_params)?;
        let shader_param_data = load_bytes(loader, param_data_size, param_data_offset)?;
        let user_data = loader.load_list_at(user_data_count, user_data_offset)?;
        let user_data = loader.load_dict_at(user_data_dict_offset, user_data)?;
        let sampler_slots = load_i64s(loader, sampler_count, sampler_slot_offset)?;
        let texture_slots = load_i64s(loader, texture_count, texture_slot_offset)?;

        Ok(Self {
            name,
            flags,
            index,
            render_infos,
            shader_assign,
            texture_names,
            samplers,
            shader_params,
            shader_param_data,
            user_data,
            sampler_slots,
            texture_slots,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let has_slots = saver.revision().has_material_slots();
        if has_slots {
            for (what, len, expected) in [
                ("sampler slot count", self.sampler_slots.len(), self.samplers.len()),
                ("texture slot count", self.texture_slots.len(), self.texture_names.len()),
            ] {
                if len != 0 && len != expected {
                    return Err(Error::InvalidValue {
                        what,
                        value: len as u64,
                    });
                }
            }
        }
        let pos = saver.position();
        saver.write_signature(&MATERIAL_SIGNATURE)?;
        saver.write_u32(self.flags)?;
        if has_slots {
            saver.relocate_struct(pos + 8, 12, 6, RelocationSection::Main, "material")?;
            saver.relocate_struct(pos + 0x70, 2, 16, RelocationSection::Main, "material slots")?;
        } else {
            saver.relocate_struct(pos + 8, 12, 4, RelocationSection::Main, "material")?;
        }
        saver.save_string(Some(&self.name))?;
        saver.save_list(self.render_infos.values().map(|r| &**r))?;
        saver.save_dict(&self.render_infos)?;
        saver.save_option(self.shader_assign.as_deref())?;
        save_strings(saver, &self.texture_names, None, "texture names")?;
        saver.save_list(self.samplers.values().map(|s| &**s))?;
        saver.save_dict(&self.samplers)?;
        saver.save_list(self.shader_params.values().map(|p| &**p))?;
        saver.save_dict(&self.shader_params)?;
        save_bytes(saver, &self.shader_param_data)?;
        saver.save_list(self.user_data.values().map(|u| &**u))?;
        saver.save_dict(&self.user_data)?;
        saver.write_null()?;
        if has_slots {
            save_i64s(saver, &self.sampler_slots)?;
            save_i64s(saver, &self.texture_slots)?;
        }
        saver.write_u16(self.index)?;
        saver.write_u16(narrow_len("render info count", self.render_infos.len())?)?;
        saver.write_u8(narrow_len("sampler count", self.samplers.len())?)?;
        saver.write_u8(narrow_len("texture count", self.texture_names.len())?)?;
        saver.write_u16(narrow_len("shader param count", self.shader_params.len())?)?;
        saver.write_u16(narrow_len("shader param data size", self.shader_param_data.len())?)?;
        saver.write_u16(narrow_len("material user data count", self.user_data.len())?)?;
        saver.write_u32(0)
    }
}
