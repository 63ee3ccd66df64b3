//! Loader/saver behavior over a small two-chunk graph.

use std::rc::Rc;

use crate::relocation::RelocationEntry;
use crate::{
    ByteOrder, ByteReader, Error, LoadOptions, RelocationSection, ResData, ResDict,
    ResFileLoader, ResFileSaver, Result, SaveOptions, Version,
};

#[derive(Debug, PartialEq)]
struct Leaf {
    value: u32,
    label: Option<String>,
}

impl ResData for Leaf {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let value = loader.read_u32()?;
        loader.skip(4)?;
        let label = loader.load_string()?;
        Ok(Self { value, label })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos + 8, 1, 1, RelocationSection::Main, "leaf")?;
        saver.write_u32(self.value)?;
        saver.write_u32(0)?;
        saver.save_string(self.label.as_deref())
    }
}

#[derive(Debug, PartialEq)]
struct Word(u32);

impl ResData for Word {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        Ok(Self(loader.read_u32()?))
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        saver.write_u32(self.0)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Branch {
    leaves: Vec<Rc<Leaf>>,
    favorite: Option<Rc<Leaf>>,
    numbers: Vec<u16>,
    child: Option<Rc<Branch>>,
}

impl ResData for Branch {
    fn load(loader: &mut ResFileLoader<'_>) -> Result<Self> {
        let leaves_offset = loader.read_offset()?;
        let favorite = loader.load()?;
        let numbers_offset = loader.read_offset()?;
        let child = loader.load()?;
        let leaf_count = loader.read_u32()? as usize;
        let number_count = loader.read_u32()? as usize;

        let leaves = loader.load_list_at(leaf_count, leaves_offset)?;
        let numbers = loader
            .load_custom_at(numbers_offset, |l| l.read_vec(number_count, |r| r.read_u16()))?
            .unwrap_or_default();
        Ok(Self {
            leaves,
            favorite,
            numbers,
            child,
        })
    }

    fn save<'a>(&'a self, saver: &mut ResFileSaver<'a>) -> Result<()> {
        let pos = saver.position();
        saver.relocate_struct(pos, 4, 1, RelocationSection::Main, "branch")?;
        saver.save_list(self.leaves.iter().map(|leaf| &**leaf))?;
        saver.save_option(self.favorite.as_deref())?;
        if self.numbers.is_empty() {
            saver.write_null()?;
        } else {
            let numbers = &self.numbers;
            saver.save_custom(numbers, move |s| {
                for &n in numbers {
                    s.write_u16(n)?;
                }
                Ok(())
            })?;
        }
        saver.save_option(self.child.as_deref())?;
        saver.write_u32(self.leaves.len() as u32)?;
        saver.write_u32(self.numbers.len() as u32)
    }
}

fn new_saver<'a>() -> ResFileSaver<'a> {
    ResFileSaver::new(
        Version::new(0, 5, 0, 3),
        ByteOrder::Little,
        SaveOptions::default(),
    )
    .unwrap()
}

fn finish(mut saver: ResFileSaver<'_>) -> Vec<u8> {
    saver.save_entries().unwrap();
    saver.write_offsets().unwrap();
    saver.write_string_pool().unwrap();
    saver.into_bytes()
}

fn save_graph(root: &Branch) -> Vec<u8> {
    let mut saver = new_saver();
    saver.save(root).unwrap();
    finish(saver)
}

fn load_graph(bytes: &[u8]) -> Rc<Branch> {
    let mut loader = ResFileLoader::new(bytes, LoadOptions::default());
    loader.load::<Branch>().unwrap().unwrap()
}

fn offset_at(bytes: &[u8], pos: u64) -> u64 {
    let mut reader = ByteReader::new(bytes, ByteOrder::Little);
    reader.seek(pos).unwrap();
    reader.read_u64().unwrap()
}

fn leaf(value: u32, label: &str) -> Rc<Leaf> {
    Rc::new(Leaf {
        value,
        label: Some(label.to_owned()),
    })
}

fn sample() -> Branch {
    let leaves = vec![leaf(0, "leaf0"), leaf(1, "leaf1"), leaf(2, "leaf2")];
    Branch {
        favorite: Some(leaves[1].clone()),
        leaves,
        numbers: vec![7, 8, 9],
        child: None,
    }
}

#[test]
fn graph_round_trip() {
    let root = sample();

    let loaded = load_graph(&save_graph(&root));

    assert_eq!(*loaded, root);
}

#[test]
fn shared_child_is_written_once() {
    let bytes = save_graph(&sample());

    // root offset at 0, branch at 8, leaves list right after the branch
    assert_eq!(offset_at(&bytes, 0), 0x08);
    assert_eq!(offset_at(&bytes, 0x08), 0x30);
    assert_eq!(offset_at(&bytes, 0x10), 0x40);

    let loaded = load_graph(&bytes);
    let favorite = loaded.favorite.as_ref().unwrap();
    assert!(Rc::ptr_eq(favorite, &loaded.leaves[1]));
}

#[test]
fn list_registers_one_relocation_entry() {
    let root = sample();
    let mut saver = new_saver();
    saver.save(&root).unwrap();
    saver.save_entries().unwrap();

    let entry = |offset, struct_count, offset_count, padding_count| RelocationEntry {
        offset,
        struct_count,
        offset_count,
        padding_count,
        hint: String::new(),
    };
    assert_eq!(
        saver.relocation_entries(RelocationSection::Main),
        &[entry(0x08, 1, 4, 1), entry(0x38, 3, 1, 1)]
    );
}

#[test]
fn null_references_load_as_absent() {
    let root = Branch::default();

    let bytes = save_graph(&root);

    for field in [0x08, 0x10, 0x18, 0x20] {
        assert_eq!(offset_at(&bytes, field), 0);
    }
    assert_eq!(*load_graph(&bytes), root);
}

#[test]
fn repeated_string_is_pooled_once() {
    let root = Branch {
        leaves: (0..5).map(|i| leaf(i, "shared")).collect(),
        ..Branch::default()
    };

    let bytes = save_graph(&root);

    let hits = bytes.windows(6).filter(|w| w == b"shared").count();
    assert_eq!(hits, 1);
    let label_sites: Vec<_> = (0..5).map(|i| offset_at(&bytes, 0x38 + i * 16)).collect();
    assert!(label_sites.iter().all(|&site| site == label_sites[0]));
}

#[test]
fn queue_grows_while_draining() {
    let mut root = Branch::default();
    for depth in 0..4 {
        root = Branch {
            leaves: vec![leaf(depth, "level")],
            child: Some(Rc::new(root)),
            ..Branch::default()
        };
    }

    let loaded = load_graph(&save_graph(&root));

    let mut depth = 0;
    let mut node = Some(&loaded);
    while let Some(branch) = node {
        if let Some(first) = branch.leaves.first() {
            assert_eq!(first.value, 3 - depth);
        }
        depth += 1;
        node = branch.child.as_ref();
    }
    assert_eq!(depth, 5);
}

#[test]
fn lists_sharing_a_first_element_share_placement() {
    let leaves = vec![leaf(1, "a"), leaf(2, "b")];
    let root = Branch {
        leaves: leaves.clone(),
        child: Some(Rc::new(Branch {
            leaves,
            ..Branch::default()
        })),
        ..Branch::default()
    };

    let loaded = load_graph(&save_graph(&root));

    let child = loaded.child.as_ref().unwrap();
    assert!(Rc::ptr_eq(&loaded.leaves[0], &child.leaves[0]));
    assert!(Rc::ptr_eq(&loaded.leaves[1], &child.leaves[1]));
}

#[test]
fn overlapping_lists_are_written_in_full() {
    let (x, y, z) = (leaf(1, "x"), leaf(2, "y"), leaf(3, "z"));
    let root = Branch {
        leaves: vec![x, y.clone()],
        child: Some(Rc::new(Branch {
            leaves: vec![y, z],
            ..Branch::default()
        })),
        ..Branch::default()
    };

    let loaded = load_graph(&save_graph(&root));

    assert_eq!(*loaded, root);
    let child = loaded.child.as_ref().unwrap();
    assert_eq!(child.leaves[1].value, 3);
}

#[test]
fn custom_block_is_keyed_by_identity() {
    let data = vec![1u32, 2, 3];
    let mut saver = new_saver();
    for _ in 0..2 {
        saver
            .save_custom(&data, |s| {
                for &v in &data {
                    s.write_u32(v)?;
                }
                Ok(())
            })
            .unwrap();
    }

    let bytes = finish(saver);

    assert_eq!(offset_at(&bytes, 0), 0x10);
    assert_eq!(offset_at(&bytes, 8), 0x10);
    assert_eq!(&bytes[0x10..0x14], &[1, 0, 0, 0]);
}

#[test]
fn second_pass_blocks_are_written_on_request() {
    let shared = Leaf {
        value: 42,
        label: None,
    };
    let mut saver = new_saver();
    saver.save_block(&shared).unwrap();
    saver.save_block(&shared).unwrap();
    assert_eq!(offset_at(saver.as_bytes(), 0), 0);

    saver.write_blocks().unwrap();
    let bytes = finish(saver);

    assert_eq!(offset_at(&bytes, 0), 0x10);
    assert_eq!(offset_at(&bytes, 8), 0x10);
    let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
    let loaded = loader.load_at::<Leaf>(0x10).unwrap().unwrap();
    assert_eq!(*loaded, shared);
}

#[test]
fn explicit_offset_slot() {
    let mut saver = new_saver();
    let slot = saver.save_offset().unwrap();
    saver.write_u32(0xAABB).unwrap();
    saver.align(8).unwrap();
    saver.write_offset(slot).unwrap();

    assert_eq!(slot.position(), 0);
    assert_eq!(offset_at(saver.as_bytes(), 0), 0x10);
}

#[test]
fn same_offset_as_two_types_is_rejected() {
    let root = sample();
    let bytes = save_graph(&root);
    let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());

    loader.load_at::<Leaf>(0x30).unwrap();
    let err = loader.load_at::<Word>(0x30).unwrap_err();

    assert!(matches!(err, Error::ConflictingType { offset: 0x30 }));
}

#[test]
fn dictionary_keys_round_trip() {
    let dict: ResDict<u32> = [("alpha", 1), ("beta", 2)].into_iter().collect();
    let mut saver = new_saver();
    saver.save_dict(&dict).unwrap();
    let bytes = finish(saver);

    let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
    let offset = loader.read_offset().unwrap();
    let keys = loader.load_dict_keys_at(offset).unwrap();

    assert_eq!(keys, ["alpha", "beta"]);
    assert_eq!(&bytes[8..12], b"_DIC");
    assert_eq!(loader.known_strings(), ["", "alpha", "beta"]);

    let rebuilt = loader.load_dict_at(offset, vec![1, 2]).unwrap();
    assert_eq!(rebuilt, dict);
}

#[test]
fn empty_dictionary_is_null() {
    let dict: ResDict<u32> = ResDict::new();
    let mut saver = new_saver();
    saver.save_dict(&dict).unwrap();

    let bytes = finish(saver);

    assert_eq!(offset_at(&bytes, 0), 0);
}

#[test]
fn known_strings_are_emitted_first() {
    let mut saver = new_saver();
    for value in ["alpha", "beta", "zeta"] {
        saver.save_string(Some(value)).unwrap();
    }
    saver.set_known_strings(vec!["zeta".into(), "alpha".into()]);
    saver.write_string_pool().unwrap();

    let zeta = saver.string_position("zeta").unwrap();
    let alpha = saver.string_position("alpha").unwrap();
    let beta = saver.string_position("beta").unwrap();
    assert!(zeta < alpha && alpha < beta);
}

#[test]
fn string_order_can_be_reset() {
    let mut saver = ResFileSaver::new(
        Version::new(0, 5, 0, 3),
        ByteOrder::Little,
        SaveOptions::new().preserve_string_order(false),
    )
    .unwrap();
    for value in ["alpha", "zeta"] {
        saver.save_string(Some(value)).unwrap();
    }
    saver.set_known_strings(vec!["zeta".into(), "alpha".into()]);
    saver.write_string_pool().unwrap();

    assert!(saver.string_position("alpha") < saver.string_position("zeta"));
}

#[test]
fn loaded_strings_are_cached_by_offset() {
    let root = Branch {
        leaves: (0..3).map(|i| leaf(i, "same")).collect(),
        ..Branch::default()
    };
    let bytes = save_graph(&root);
    let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());

    loader.load::<Branch>().unwrap();

    assert_eq!(loader.known_strings(), ["same"]);
    assert_eq!(loader.loaded_count(), 4);
}

#[test]
fn temporary_seek_on_loader_restores_on_error() {
    let bytes = [0u8; 16];
    let mut loader = ResFileLoader::new(&bytes, LoadOptions::default());
    loader.skip(4).unwrap();

    let result = loader.temporary_seek(12, |l| l.read_u64());

    assert!(matches!(result, Err(Error::UnexpectedEof { .. })));
    assert_eq!(loader.position(), 4);
}

#[test]
fn saver_rejects_unknown_versions() {
    let result = ResFileSaver::new(
        Version::new(0, 3, 0, 0),
        ByteOrder::Little,
        SaveOptions::default(),
    );

    assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
}
