use std::rc::Rc;

use bfres_core::{ResDict, Version};

use crate::anim::{AnimCurve, BoneAnim, CurveFrames, CurveKeys, CurveType, SkeletalAnim};
use crate::model::{
    Bone, Bounding, IndexFormat, Material, Mesh, Model, RenderInfo, RenderInfoValue, Sampler,
    ShaderAssign, ShaderParam, Shape, Skeleton, SubMesh, VertexAttrib, VertexBuffer,
    VertexBufferData,
};
use crate::{ExternalFile, ResFile, UserData, UserDataValue};

pub const V5: Version = Version::new(0, 5, 0, 3);
pub const V9: Version = Version::new(0, 9, 0, 0);
pub const V10: Version = Version::new(0, 10, 0, 0);

/// Appears five times across the sample graph.
pub const SHARED_TAG: &str = "shared_tag";

fn tag() -> ResDict<Rc<UserData>> {
    [(
        "tag",
        Rc::new(UserData::new(
            "tag",
            UserDataValue::String(vec![SHARED_TAG.to_owned()]),
        )),
    )]
    .into_iter()
    .collect()
}

fn assigns(pairs: &[(&str, &str)]) -> ResDict<String> {
    pairs
        .iter()
        .map(|&(key, value)| (key, value.to_owned()))
        .collect()
}

fn skeleton() -> Skeleton {
    let root = Bone {
        name: "Root".into(),
        user_data: tag(),
        index: 0,
        parent_index: 0xFFFF,
        smooth_matrix_index: 0,
        rigid_matrix_index: -1,
        scale: [1.0, 1.0, 1.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        ..Bone::default()
    };
    let spine = Bone {
        name: "Spine".into(),
        index: 1,
        parent_index: 0,
        smooth_matrix_index: -1,
        rigid_matrix_index: 1,
        flags: 0x0100_0000,
        scale: [1.0, 1.0, 1.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        position: [0.0, 2.5, 0.0],
        ..Bone::default()
    };
    Skeleton {
        flags: 0x1100,
        bones: [("Root", Rc::new(root)), ("Spine", Rc::new(spine))]
            .into_iter()
            .collect(),
        matrix_to_bone: vec![0, 1],
        inverse_model_matrices: vec![[
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0,
        ]],
        reserved: [0; 8],
    }
}

fn vertex_buffer() -> VertexBuffer {
    let attributes = [
        VertexAttrib {
            name: "_p0".into(),
            format: 0x0000_0B01,
            offset: 0,
            buffer_index: 0,
        },
        VertexAttrib {
            name: "_u0".into(),
            format: 0x0000_0A07,
            offset: 0,
            buffer_index: 1,
        },
    ];
    VertexBuffer {
        index: 0,
        vertex_count: 3,
        vertex_skin_count: 0,
        attributes: attributes
            .into_iter()
            .map(|a| (a.name.clone(), Rc::new(a)))
            .collect(),
        buffers: vec![
            VertexBufferData {
                stride: 12,
                divisor: 0,
                flags: 0,
                data: (0..36).collect(),
            },
            VertexBufferData {
                stride: 8,
                divisor: 0,
                flags: 0,
                data: (100..124).collect(),
            },
        ],
    }
}

fn shape(name: &str, index: u16, vertex_buffer: &Rc<VertexBuffer>) -> Shape {
    Shape {
        name: name.into(),
        flags: 2,
        index,
        material_index: index,
        bone_index: 1,
        vertex_buffer_index: 0,
        vertex_skin_count: 1,
        vertex_buffer: vertex_buffer.clone(),
        meshes: vec![Rc::new(Mesh {
            primitive_type: 3,
            index_format: IndexFormat::UInt16,
            first_vertex: 0,
            sub_meshes: vec![SubMesh {
                offset: 0,
                count: 3,
            }],
            index_data: vec![0, 0, 1, 0, 2, 0],
        })],
        skin_bone_indices: vec![1],
        bounding_boxes: vec![Bounding {
            center: [0.0, 1.0, 0.0],
            extent: [0.5, 1.0, 0.5],
        }],
        bounding_radii: vec![[1.5, 0.0, 0.0, 0.0]],
    }
}

fn materials(version: Version) -> ResDict<Rc<Material>> {
    let slots = version.major2 >= 10;
    let shader_assign = Rc::new(ShaderAssign {
        shader_archive_name: "uking_mat".into(),
        shading_model_name: "uking_mat".into(),
        revision: 0,
        attrib_assigns: assigns(&[("_p0", "_p0"), ("_u0", "_u0")]),
        sampler_assigns: assigns(&[("_a0", "_a0")]),
        shader_options: assigns(&[("gsys_alpha_test_enable", "0")]),
    });

    let skin = Material {
        name: "Skin".into(),
        flags: 1,
        index: 0,
        render_infos: [
            RenderInfo {
                name: "gsys_render_state_mode".into(),
                value: RenderInfoValue::String(vec!["opaque".into(), SHARED_TAG.into()]),
            },
            RenderInfo {
                name: "gsys_depth_test_func".into(),
                value: RenderInfoValue::Int32(vec![3]),
            },
        ]
        .into_iter()
        .map(|r| (r.name.clone(), Rc::new(r)))
        .collect(),
        shader_assign: Some(shader_assign.clone()),
        texture_names: vec!["skin_alb".into(), SHARED_TAG.into()],
        samplers: [(
            "_a0",
            Rc::new(Sampler {
                name: "_a0".into(),
                state: [1; 32],
            }),
        )]
        .into_iter()
        .collect(),
        shader_params: [(
            "albedo_color",
            Rc::new(ShaderParam {
                name: "albedo_color".into(),
                param_type: 0x0E,
                data_offset: 0,
                depended_index: 0,
                depend_index: 0,
            }),
        )]
        .into_iter()
        .collect(),
        shader_param_data: (0..16).collect(),
        user_data: tag(),
        sampler_slots: if slots { vec![-1] } else { Vec::new() },
        texture_slots: if slots { vec![-1, -1] } else { Vec::new() },
    };
    let eyes = Material {
        name: "Eyes".into(),
        flags: 1,
        index: 1,
        shader_assign: Some(shader_assign),
        texture_names: vec!["eye_alb".into()],
        user_data: tag(),
        texture_slots: if slots { vec![-1] } else { Vec::new() },
        ..Material::default()
    };
    [("Skin", Rc::new(skin)), ("Eyes", Rc::new(eyes))]
        .into_iter()
        .collect()
}

fn model(version: Version) -> Model {
    let vertex_buffer = Rc::new(vertex_buffer());
    let shapes = [
        ("Body", Rc::new(shape("Body", 0, &vertex_buffer))),
        ("Head", Rc::new(shape("Head", 1, &vertex_buffer))),
    ]
    .into_iter()
    .collect();
    let user_data = [
        UserData::new("note", UserDataValue::WString(vec!["héllo".into()])),
        UserData::new("weights", UserDataValue::Single(vec![1.0, 0.25])),
        UserData::new("raw", UserDataValue::Byte(vec![9, 8, 7])),
    ]
    .into_iter()
    .map(|u| (u.name.clone(), Rc::new(u)))
    .collect();

    Model {
        name: "Sphere".into(),
        path: None,
        flags: 1,
        skeleton: Rc::new(skeleton()),
        vertex_buffers: vec![vertex_buffer],
        shapes,
        materials: materials(version),
        user_data,
    }
}

fn skeletal_anim() -> SkeletalAnim {
    let cubic = AnimCurve {
        curve_type: CurveType::Cubic,
        frames: CurveFrames::Single(vec![0.0, 30.0]),
        keys: CurveKeys::Single(vec![0.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]),
        anim_data_offset: 0x10,
        start_frame: 0.0,
        end_frame: 30.0,
        scale: 1.0,
        offset: 0.0,
        delta: 1.0,
    };
    let linear = AnimCurve {
        curve_type: CurveType::Linear,
        frames: CurveFrames::Decimal10x5(vec![0, 960]),
        keys: CurveKeys::Int16(vec![0, 100, 100, 0]),
        anim_data_offset: 0x14,
        start_frame: 0.0,
        end_frame: 30.0,
        scale: 0.01,
        offset: 0.0,
        delta: 0.0,
    };
    SkeletalAnim {
        name: "Walk".into(),
        path: Some("anim/Walk".into()),
        flags: 0x4,
        frame_count: 30,
        baked_size: 0,
        bind_indices: vec![1],
        bone_anims: vec![Rc::new(BoneAnim {
            name: "Spine".into(),
            flags: 0x3_0000,
            begin_rotation: 3,
            begin_translate: 7,
            begin_base_translate: 3,
            begin_curve: 0,
            base_data: vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            curves: vec![Rc::new(cubic), Rc::new(linear)],
        })],
        user_data: ResDict::new(),
    }
}

/// A container touching every chunk type.
pub fn sample_file(version: Version) -> ResFile {
    let mut file = ResFile::new("sample", version);
    file.alignment = 0x0C;
    file.models.insert("Sphere", Rc::new(model(version)));
    file.skeletal_anims.insert("Walk", Rc::new(skeletal_anim()));
    file.external_files.insert(
        "readme.txt",
        Rc::new(ExternalFile::new(b"external payload".to_vec())),
    );
    file
}

/// Number of times `needle` occurs in `haystack`.
pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

pub fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}
