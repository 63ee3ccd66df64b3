use crate::{Error, Revision, Version};

#[test]
fn packed_round_trip() {
    let version = Version::new(0, 9, 1, 2);

    assert_eq!(version.packed(), 0x0009_0102);
    assert_eq!(Version::from_packed(0x0009_0102), version);
    assert_eq!(version.to_string(), "0.9.1.2");
}

#[test]
fn revision_selection() {
    assert_eq!(Version::new(0, 5, 0, 3).revision().unwrap(), Revision::V5);
    assert_eq!(Version::new(0, 8, 0, 0).revision().unwrap(), Revision::V5);
    assert_eq!(Version::new(0, 9, 0, 0).revision().unwrap(), Revision::V9);
    assert_eq!(Version::new(0, 10, 0, 0).revision().unwrap(), Revision::V10);
}

#[test]
fn unknown_versions_are_rejected() {
    for version in [Version::new(0, 4, 0, 0), Version::new(0, 11, 0, 0), Version::new(3, 5, 0, 0)] {
        let err = version.revision().unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(v) if v == version));
    }
}

#[test]
fn revision_capabilities() {
    assert!(!Revision::V5.has_reserved_blocks());
    assert!(Revision::V9.has_reserved_blocks());
    assert!(!Revision::V9.has_material_slots());
    assert!(Revision::V10.has_material_slots());
}
