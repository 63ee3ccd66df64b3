//! Skeletal animations (`FSKA`), per-bone tracks, and key curves.

use std::rc::Rc;

use bfres_core::{
    Error, RelocationSection, ResData, ResDict, ResFileLoader, ResFileSaver, Result, narrow_len,
};

use crate::arrays::{
    load_bytes, load_f32s, load_i8s, load_i16s, load_u16s, save_bytes, save_f32s, save_i8s,
    save_i16s, save_u16s,
};
use crate::user_data::UserData;

pub const SKELETAL_ANIM_SIGNATURE: [u8; 4] = *b"FSKA";

/// Interpolation of an [`AnimCurve`], bits 4..7 of its flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CurveType {
    #[default]
    Cubic,
    Linear,
    BakedFloat,
    StepInt,
    BakedInt,
    StepBool,
}

impl CurveType {
    pub fn from_raw(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::Cubic),
            1 => Ok(Self::Linear),
            2 => Ok(Self::BakedFloat),
            4 => Ok(Self::StepInt),
            5 => Ok(Self::BakedInt),
            6 => Ok(Self::StepBool),
            _ => Err(Error::InvalidValue {
                what: "curve type",
                value: u64::from(value),
            }),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::Cubic => 0,
            Self::Linear => 1,
            Self::BakedFloat => 2,
            Self::StepInt => 4,
            Self::BakedInt => 5,
            Self::StepBool => 6,
        }
    }

    /// Stored values per key: Hermite coefficients for cubic curves, value
    /// and delta for linear ones.
    pub fn elements_per_key(self) -> usize {
        match self {
            Self::Cubic => 4,
            Self::Linear => 2,
            Self::BakedFloat | Self::StepInt | Self::BakedInt | Self::StepBool => 1,
        }
    }
}

/// Frame numbers of a curve in their stored width.
#[derive(Clone, Debug, PartialEq)]
pub enum CurveFrames {
    Single(Vec<f32>),
    /// Fixed point with 5 fractional bits.
    Decimal10x5(Vec<i16>),
    Byte(Vec<u8>),
}

impl Default for CurveFrames {
    fn default() -> Self {
        Self::Single(Vec::new())
    }
}

impl CurveFrames {
    fn type_code(&self) -> u16 {
        match self {
            Self::Single(_) => 0,
            Self::Decimal10x5(_) => 1,
            Self::Byte(_) => 2,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(v) => v.len(),
            Self::Decimal10x5(v) => v.len(),
            Self::Byte(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key values of a curve, before `scale` and `offset` are applied.
#[derive(Clone, Debug, PartialEq)]
pub enum CurveKeys {
    Single(Vec<f32>),
    Int16(Vec<i16>),
    SByte(Vec<i8>),
}

impl Default for CurveKeys {
    fn default() -> Self {
        Self::Single(Vec::new())
    }
}

impl CurveKeys {
    fn type_code(&self) -> u16 {
        match self {
            Self::Single(_) => 0,
            Self::Int16(_) => 1,
            Self::SByte(_) => 2,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::SByte(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimCurve {
    pub curve_type: CurveType,
    pub frames: CurveFrames,
    /// `frames.len() * curve_type.elements_per_key()` values.
    pub keys: CurveKeys,
    /// Byte offset of the animated member inside the bone transform.
    pub anim_data_offset: u32,
    pub start_frame: f32,
    pub end_frame: f32,
    pub scale: f32,
    pub offset: f32,
    pub delta: f32,
}

impl AnimCurve {
    fn flags(&self) -> u16 {
        self.frames.type_code() | (self.keys.type_code() << 2) | (self.curve_type.raw() << 4)
    }
}

impl ResData for AnimCurve {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let frames_offset = loader.read_offset()?;
        let keys_offset = loader.read_offset()?;
        let flags = loader.read_u16()?;
        let key_count = loader.read_u16()? as usize;
        let anim_data_offset = loader.read_u32()?;
        let start_frame = loader.read_f32()?;
        let end_frame = loader.read_f32()?;
        let scale = loader.read_f32()?;
        let offset = loader.read_f32()?;
        let delta = loader.read_f32()?;
        loader.skip(4)?;

        let curve_type = CurveType::from_raw((flags >> 4) & 0x7)?;
        if curve_type == CurveType::StepBool {
            return Err(Error::NotImplemented("step bool curves"));
        }

        let frames = match flags & 0x3 {
            0 => CurveFrames::Single(load_f32s(loader, key_count, frames_offset)?),
            1 => CurveFrames::Decimal10x5(load_i16s(loader, key_count, frames_offset)?),
            2 => CurveFrames::Byte(load_bytes(loader, key_count, frames_offset)?),
            other => {
                return Err(Error::InvalidValue {
                    what: "curve frame type",
                    value: u64::from(other),
                });
            }
        };

        let element_count = key_count * curve_type.elements_per_key();
        let keys = match (flags >> 2) & 0x3 {
            0 => CurveKeys::Single(load_f32s(loader, element_count, keys_offset)?),
            1 => CurveKeys::Int16(load_i16s(loader, element_count, keys_offset)?),
            2 => CurveKeys::SByte(load_i8s(loader, element_count, keys_offset)?),
            _ => return Err(Error::NotImplemented("packed curve keys")),
        };

        Ok(Self {
            curve_type,
            frames,
            keys,
            anim_data_offset,
            start_frame,
            end_frame,
            scale,
            offset,
            delta,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        if self.curve_type == CurveType::StepBool {
            return Err(Error::NotImplemented("step bool curves"));
        }
        let expected = self.frames.len() * self.curve_type.elements_per_key();
        if self.keys.len() != expected {
            return Err(Error::InvalidValue {
                what: "curve key count",
                value: self.keys.len() as u64,
            });
        }

        let pos = saver.position();
        saver.relocate_struct(pos, 2, 4, RelocationSection::Main, "anim curve")?;
        match &self.frames {
            CurveFrames::Single(v) => save_f32s(saver, v)?,
            CurveFrames::Decimal10x5(v) => save_i16s(saver, v)?,
            CurveFrames::Byte(v) => save_bytes(saver, v)?,
        }
        match &self.keys {
            CurveKeys::Single(v) => save_f32s(saver, v)?,
            CurveKeys::Int16(v) => save_i16s(saver, v)?,
            CurveKeys::SByte(v) => save_i8s(saver, v)?,
        }
        saver.write_u16(self.flags())?;
        saver.write_u16(narrow_len("curve key count", self.frames.len())?)?;
        saver.write_u32(self.anim_data_offset)?;
        saver.write_f32(self.start_frame)?;
        saver.write_f32(self.end_frame)?;
        saver.write_f32(self.scale)?;
        saver.write_f32(self.offset)?;
        saver.write_f32(self.delta)?;
        saver.write_u32(0)
    }
}

/// Animation track of one bone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoneAnim {
    pub name: String,
    pub flags: u32,
    pub begin_rotation: u8,
    pub begin_translate: u8,
    pub begin_base_translate: u16,
    pub begin_curve: u16,
    /// Base pose values, laid out according to `flags`.
    pub base_data: Vec<f32>,
    pub curves: Vec<Rc<AnimCurve>>,
}

impl ResData for BoneAnim {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let name = loader.load_string()?.unwrap_or_default();
        let curves_offset = loader.read_offset()?;
        let base_data_offset = loader.read_offset()?;
        let flags = loader.read_u32()?;
        let begin_rotation = loader.read_u8()?;
        let begin_translate = loader.read_u8()?;
        let curve_count = loader.read_u8()? as usize;
        let base_data_count = loader.read_u8()? as usize;
        let begin_base_translate = loader.read_u16()?;
        let begin_curve = loader.read_u16()?;
        loader.skip(4)?;

        let curves = loader.load_list_at(curve_count, curves_offset)?;
        let base_data = load_f32s(loader, base_data_count, base_data_offset)?;

        Ok(Self {
            name,
            flags,
            begin_rotation,
            begin_translate,
            begin_base_translate,
            begin_curve,
            base_data,
            curves,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 3, 2, RelocationSection::Main, "bone anim")?;
        saver.save_string(Some(&self.name))?;
        saver.save_list(self.curves.iter().map(|c| &**c))?;
        save_f32s(saver, &self.base_data)?;
        saver.write_u32(self.flags)?;
        saver.write_u8(self.begin_rotation)?;
        saver.write_u8(self.begin_translate)?;
        saver.write_u8(narrow_len("curve count", self.curves.len())?)?;
        saver.write_u8(narrow_len("base data count", self.base_data.len())?)?;
        saver.write_u16(self.begin_base_translate)?;
        saver.write_u16(self.begin_curve)?;
        saver.write_u32(0)
    }
}

/// Stored as an array directly under the file header, which relocates it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletalAnim {
    pub name: String,
    pub path: Option<String>,
    pub flags: u32,
    pub frame_count: i32,
    pub baked_size: u32,
    /// Skeleton bone index per bone animation.
    pub bind_indices: Vec<u16>,
    pub bone_anims: Vec<Rc<BoneAnim>>,
    pub user_data: ResDict<Rc<UserData>>,
}

impl ResData for SkeletalAnim {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        loader.read_signature(&SKELETAL_ANIM_SIGNATURE)?;
        let flags = loader.read_u32()?;
        let name = loader.load_string()?.unwrap_or_default();
        let path = loader.load_string()?;
        // Bound skeleton, resolved at runtime.
        loader.skip(8)?;
        let bind_offset = loader.read_offset()?;
        let bone_anims_offset = loader.read_offset()?;
        let user_data_offset = loader.read_offset()?;
        let user_data_dict_offset = loader.read_offset()?;
        let frame_count = loader.read_i32()?;
        let baked_size = loader.read_u32()?;
        let bone_anim_count = loader.read_u16()? as usize;
        let user_data_count = loader.read_u16()? as usize;
        loader.skip(4)?;

        let bind_indices = load_u16s(loader, bone_anim_count, bind_offset)?;
        let bone_anims = loader.load_list_at(bone_anim_count, bone_anims_offset)?;
        let user_data = loader.load_list_at(user_data_count, user_data_offset)?;
        let user_data = loader.load_dict_at(user_data_dict_offset, user_data)?;

        Ok(Self {
            name,
            path,
            flags,
            frame_count,
            baked_size,
            bind_indices,
            bone_anims,
            user_data,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        if !self.bind_indices.is_empty() && self.bind_indices.len() != self.bone_anims.len() {
            return Err(Error::InvalidValue {
                what: "bind index count",
                value: self.bind_indices.len() as u64,
            });
        }

        saver.write_signature(&SKELETAL_ANIM_SIGNATURE)?;
        saver.write_u32(self.flags)?;
        saver.save_string(Some(&self.name))?;
        saver.save_string(self.path.as_deref())?;
        saver.write_null()?;
        save_u16s(saver, &self.bind_indices)?;
        saver.save_list(self.bone_anims.iter().map(|b| &**b))?;
        saver.save_list(self.user_data.values().map(|u| &**u))?;
        saver.save_dict(&self.user_data)?;
        saver.write_i32(self.frame_count)?;
        saver.write_u32(self.baked_size)?;
        saver.write_u16(narrow_len("bone anim count", self.bone_anims.len())?)?;
        saver.write_u16(narrow_len("skeletal anim user data count", self.user_data.len())?)?;
        saver.write_u32(0)
    }
}
