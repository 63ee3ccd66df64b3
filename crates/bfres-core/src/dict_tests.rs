use crate::dict::{ROOT_REFERENCE, ResDict, build_nodes, find};
use crate::Error;

#[test]
fn every_key_is_reachable() {
    let keys = [
        "Mt_Body", "Mt_Eye", "Mt_Hair", "a", "b", "c", "ab", "ba", "Skin", "skin",
    ];

    let nodes = build_nodes(&keys).unwrap();

    assert_eq!(nodes.len(), keys.len() + 1);
    assert_eq!(nodes[0].reference, ROOT_REFERENCE);
    assert_eq!(nodes[0].key, "");
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(find(&nodes, key), Some(i + 1), "key {key}");
    }
    assert_eq!(find(&nodes, "missing"), None);
    assert_eq!(find(&nodes, ""), None);
}

#[test]
fn small_trie_shape() {
    let nodes = build_nodes(&["a", "b"]).unwrap();

    // 'a' = 0x61 differs from the empty root key at bit 0,
    // 'b' = 0x62 differs at bit 1
    assert_eq!(nodes[0].left, 1);
    assert_eq!((nodes[1].reference, nodes[1].left, nodes[1].right), (0, 2, 1));
    assert_eq!((nodes[2].reference, nodes[2].left, nodes[2].right), (1, 0, 2));
}

#[test]
fn duplicate_and_empty_keys_are_rejected() {
    assert!(matches!(
        build_nodes(&["x", "x"]),
        Err(Error::DuplicateKey(k)) if k == "x"
    ));
    assert!(matches!(build_nodes(&[""]), Err(Error::EmptyKey)));
}

#[test]
fn from_parts_checks_counts() {
    let err = ResDict::from_parts(vec!["a".into()], vec![1, 2]).unwrap_err();

    assert!(matches!(err, Error::DictCountMismatch { keys: 1, values: 2 }));
}

#[test]
fn dict_keeps_insertion_order() {
    let mut dict: ResDict<u32> = [("second", 2), ("first", 1)].into_iter().collect();
    dict.insert("third", 3);
    dict.insert("second", 20);

    let keys: Vec<_> = dict.keys().map(String::as_str).collect();
    assert_eq!(keys, ["second", "first", "third"]);
    assert_eq!(dict.get("second"), Some(&20));
    assert_eq!(dict.index_of("third"), Some(2));
    assert_eq!(dict.get_index(1), Some(("first", &1)));

    assert_eq!(dict.remove("first"), Some(1));
    assert_eq!(dict.len(), 2);
}
