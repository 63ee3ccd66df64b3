//! Animations.

mod skeletal;

pub use skeletal::{
    AnimCurve, BoneAnim, CurveFrames, CurveKeys, CurveType, SKELETAL_ANIM_SIGNATURE, SkeletalAnim,
};
