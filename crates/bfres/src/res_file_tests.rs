use std::rc::Rc;

use bfres_core::relocation::RelocationTable;
use bfres_core::{ByteOrder, ByteReader, Error, LoadOptions, Version};

use crate::{ResFile, UserData, UserDataValue};
use crate::anim::{AnimCurve, CurveType};
use crate::test_utils::{SHARED_TAG, V5, V9, V10, count_occurrences, read_u64, sample_file};

fn assert_round_trip(version: Version) {
    let file = sample_file(version);
    let bytes = file.to_bytes().unwrap();
    let loaded = ResFile::from_bytes(&bytes).unwrap();

    assert_eq!(loaded.name, "sample");
    assert_eq!(loaded.version, version);
    assert_eq!(loaded.alignment, file.alignment);
    assert_eq!(loaded.models, file.models);
    assert_eq!(loaded.skeletal_anims, file.skeletal_anims);
    assert_eq!(loaded.external_files, file.external_files);

    assert_eq!(loaded.to_bytes().unwrap(), bytes);
}

fn relocation_table(bytes: &[u8]) -> RelocationTable {
    let offset = u32::from_le_bytes(bytes[0x18..0x1C].try_into().unwrap());
    let mut reader = ByteReader::new(bytes, ByteOrder::Little);
    RelocationTable::read(&mut reader, u64::from(offset)).unwrap()
}

#[test]
fn round_trip_v5() {
    assert_round_trip(V5);
}

#[test]
fn round_trip_v9() {
    assert_round_trip(V9);
}

#[test]
fn round_trip_v10() {
    assert_round_trip(V10);
}

#[test]
fn round_trip_big_endian() {
    let mut file = sample_file(V5);
    file.byte_order = ByteOrder::Big;
    let bytes = file.to_bytes().unwrap();
    assert_eq!(&bytes[0x0C..0x0E], &[0xFE, 0xFF]);

    let loaded = ResFile::from_bytes(&bytes).unwrap();
    assert_eq!(loaded.byte_order, ByteOrder::Big);
    assert_eq!(loaded.models, file.models);
    assert_eq!(loaded.skeletal_anims, file.skeletal_anims);
}

#[test]
fn header_fields_survive() {
    let mut file = sample_file(V9);
    file.flag = 0x3;
    file.external_flags = 1;
    file.reserved[31] = 0xAB;

    let loaded = ResFile::from_bytes(&file.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded.flag, 0x3);
    assert_eq!(loaded.external_flags, 1);
    assert_eq!(loaded.reserved[31], 0xAB);
}

#[test]
fn shared_chunks_stay_shared() {
    let bytes = sample_file(V5).to_bytes().unwrap();
    let loaded = ResFile::from_bytes(&bytes).unwrap();
    let model = loaded.models.get("Sphere").unwrap();

    let body = model.shapes.get("Body").unwrap();
    let head = model.shapes.get("Head").unwrap();
    assert!(Rc::ptr_eq(&body.vertex_buffer, &head.vertex_buffer));
    assert!(Rc::ptr_eq(&body.vertex_buffer, &model.vertex_buffers[0]));

    let skin = model.materials.get("Skin").unwrap();
    let eyes = model.materials.get("Eyes").unwrap();
    assert!(Rc::ptr_eq(
        skin.shader_assign.as_ref().unwrap(),
        eyes.shader_assign.as_ref().unwrap()
    ));
}

#[test]
fn shared_vertex_data_written_once() {
    let bytes = sample_file(V5).to_bytes().unwrap();
    let stream: Vec<u8> = (0..36).collect();
    assert_eq!(count_occurrences(&bytes, &stream), 1);
}

#[test]
fn repeated_string_pooled_once() {
    let bytes = sample_file(V5).to_bytes().unwrap();
    assert_eq!(count_occurrences(&bytes, SHARED_TAG.as_bytes()), 1);

    let loaded = ResFile::from_bytes(&bytes).unwrap();
    let position = |s: &str| loaded.string_order.iter().position(|k| k == s);
    assert!(position(SHARED_TAG).is_some());
    assert_eq!(position(""), Some(0));
}

#[test]
fn same_text_pooled_per_encoding() {
    let mut file = sample_file(V5);
    let mut anim = (**file.skeletal_anims.get("Walk").unwrap()).clone();
    let wide = UserDataValue::WString(vec!["abc".into()]);
    let narrow = UserDataValue::String(vec!["abc".into()]);
    anim.user_data.insert("w", Rc::new(UserData::new("w", wide.clone())));
    anim.user_data.insert("a", Rc::new(UserData::new("a", narrow.clone())));
    file.skeletal_anims.insert("Walk", Rc::new(anim));

    let bytes = file.to_bytes().unwrap();
    assert_eq!(count_occurrences(&bytes, &[3, 0, b'a', b'b', b'c', 0]), 1);
    assert_eq!(
        count_occurrences(&bytes, &[6, 0, b'a', 0, b'b', 0, b'c', 0, 0, 0]),
        1
    );

    let loaded = ResFile::from_bytes(&bytes).unwrap();
    let user_data = &loaded.skeletal_anims.get("Walk").unwrap().user_data;
    assert_eq!(user_data.get("w").unwrap().value, wide);
    assert_eq!(user_data.get("a").unwrap().value, narrow);
    assert_eq!(loaded.to_bytes().unwrap(), bytes);
}

#[test]
fn shape_list_relocated_once() {
    let bytes = sample_file(V5).to_bytes().unwrap();
    let model = read_u64(&bytes, 0x28) as usize;
    let shapes = read_u64(&bytes, model + 0x28);

    let table = relocation_table(&bytes);
    let main = &table.sections[0].entries;
    let entry = main.iter().find(|e| u64::from(e.offset) == shapes + 8).unwrap();
    assert_eq!(entry.struct_count, 2);
    assert_eq!(entry.offset_count, 6);
    assert_eq!(entry.padding_count, 4);
    assert!(!main.iter().any(|e| u64::from(e.offset) == shapes + 0x58));
}

#[test]
fn relocation_sections_cover_regions() {
    let bytes = sample_file(V5).to_bytes().unwrap();
    let table = relocation_table(&bytes);
    assert_eq!(table.sections.len(), 5);

    let mut firsts = Vec::new();
    let mut total = 0;
    for section in &table.sections {
        firsts.push(section.first_entry_index);
        total += section.entries.len() as i32;
        assert!(section.entries.windows(2).all(|w| w[0].offset <= w[1].offset));
    }
    assert_eq!(firsts[0], 0);
    assert!(firsts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(total as usize, table.entry_count());

    let buffer_info = read_u64(&bytes, 0x38 + 0x18) as u32;
    let index = &table.sections[1];
    assert_eq!(index.entries[0].offset, buffer_info + 8);
    assert!(index.size > 0);
    assert_eq!(table.sections[4].entries.len(), 1);
}

#[test]
fn null_path_writes_zero() {
    let bytes = sample_file(V5).to_bytes().unwrap();
    let model = read_u64(&bytes, 0x28) as usize;
    assert_eq!(read_u64(&bytes, model + 0x10), 0);

    let anim = read_u64(&bytes, 0x38) as usize;
    assert_ne!(read_u64(&bytes, anim + 0x10), 0);

    let loaded = ResFile::from_bytes(&bytes).unwrap();
    assert_eq!(loaded.models.get("Sphere").unwrap().path, None);
    assert_eq!(
        loaded.skeletal_anims.get("Walk").unwrap().path.as_deref(),
        Some("anim/Walk")
    );
}

#[test]
fn header_size_and_offsets() {
    let bytes = sample_file(V5).to_bytes().unwrap();
    assert_eq!(&bytes[..8], b"FRES    ");
    let size = u32::from_le_bytes(bytes[0x1C..0x20].try_into().unwrap());
    assert_eq!(size as usize, bytes.len());

    let name = u32::from_le_bytes(bytes[0x10..0x14].try_into().unwrap()) as usize;
    assert_eq!(&bytes[name..name + 7], b"sample\0");
}

#[test]
fn empty_file_round_trip() {
    let file = ResFile::new("empty", V9);
    let bytes = file.to_bytes().unwrap();
    let loaded = ResFile::from_bytes(&bytes).unwrap();
    assert!(loaded.models.is_empty());
    assert!(loaded.skeletal_anims.is_empty());
    assert!(loaded.external_files.is_empty());
    assert_eq!(loaded.to_bytes().unwrap(), bytes);
}

#[test]
fn rejects_bad_signature() {
    let mut bytes = sample_file(V5).to_bytes().unwrap();
    bytes[0] = b'X';
    let err = ResFile::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidSignature { offset: 0, .. }));
}

#[test]
fn rejects_unsupported_version() {
    let mut bytes = sample_file(V5).to_bytes().unwrap();
    bytes[0x08..0x0C].copy_from_slice(&Version::new(0, 3, 0, 0).packed().to_le_bytes());
    let err = ResFile::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(v) if v.major2 == 3));

    let err = ResFile::new("x", Version::new(1, 0, 0, 0)).to_bytes().unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(_)));
}

#[test]
fn rejects_size_mismatch() {
    let mut bytes = sample_file(V5).to_bytes().unwrap();
    let len = bytes.len();
    bytes.push(0);
    let err = ResFile::from_bytes(&bytes).unwrap_err();
    assert!(matches!(
        err,
        Error::SizeMismatch { header, actual } if header as usize == len && actual == len + 1
    ));
}

#[test]
fn rejects_bad_byte_order_mark() {
    let mut bytes = sample_file(V5).to_bytes().unwrap();
    bytes[0x0C] = 0x12;
    let err = ResFile::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidByteOrderMark(_)));
}

#[test]
fn relocation_table_validation_is_optional() {
    let mut bytes = sample_file(V5).to_bytes().unwrap();
    let offset = u32::from_le_bytes(bytes[0x18..0x1C].try_into().unwrap()) as usize;
    bytes[offset + 4] ^= 0x08;

    assert!(ResFile::from_bytes(&bytes).is_err());
    let options = LoadOptions::new().validate_relocation_table(false);
    assert!(ResFile::from_bytes_with(&bytes, options).is_ok());
}

#[test]
fn step_bool_curves_not_implemented() {
    let mut file = sample_file(V5);
    let mut anim = (**file.skeletal_anims.get("Walk").unwrap()).clone();
    let mut bone_anim = (*anim.bone_anims[0]).clone();
    bone_anim.curves = vec![Rc::new(AnimCurve {
        curve_type: CurveType::StepBool,
        ..AnimCurve::default()
    })];
    anim.bone_anims = vec![Rc::new(bone_anim)];
    file.skeletal_anims.insert("Walk", Rc::new(anim));

    let err = file.to_bytes().unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)));
}

#[test]
fn mismatched_curve_keys_rejected() {
    let mut file = sample_file(V5);
    let mut anim = (**file.skeletal_anims.get("Walk").unwrap()).clone();
    let mut bone_anim = (*anim.bone_anims[0]).clone();
    let mut curve = (*bone_anim.curves[0]).clone();
    curve.curve_type = CurveType::Linear;
    bone_anim.curves[0] = Rc::new(curve);
    anim.bone_anims = vec![Rc::new(bone_anim)];
    file.skeletal_anims.insert("Walk", Rc::new(anim));

    let err = file.to_bytes().unwrap_err();
    assert!(matches!(err, Error::InvalidValue { what: "curve key count", .. }));
}

#[test]
fn mismatched_material_slots_rejected() {
    let mut file = sample_file(V10);
    let mut model = (**file.models.get("Sphere").unwrap()).clone();
    let mut skin = (**model.materials.get("Skin").unwrap()).clone();
    skin.texture_slots = vec![-1, -1, -1];
    model.materials.insert("Skin", Rc::new(skin));
    file.models.insert("Sphere", Rc::new(model));

    let err = file.to_bytes().unwrap_err();
    assert!(matches!(err, Error::InvalidValue { what: "texture slot count", value: 3 }));

    // Slots are not stored before revision 10.
    file.version = V9;
    assert!(file.to_bytes().is_ok());
}

#[test]
fn path_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bfres");
    let file = sample_file(V10);
    file.save_to_path(&path).unwrap();

    let loaded = ResFile::from_path(&path).unwrap();
    assert_eq!(loaded.models, file.models);
    assert_eq!(std::fs::read(&path).unwrap(), loaded.to_bytes().unwrap());
}

#[test]
fn missing_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ResFile::from_path(dir.path().join("missing.bfres")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
