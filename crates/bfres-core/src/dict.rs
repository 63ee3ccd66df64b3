//! Name dictionaries (`_DIC`).
//!
//! In memory a dictionary is an insertion-ordered map. On disk it is a
//! Patricia trie: node 0 is a root with an empty key, node `i + 1` holds key
//! `i`, and each inner node tests one key bit. Bits are numbered from the
//! least significant bit of the key's last byte.

use indexmap::IndexMap;
use indexmap::map::{Iter, Keys, Values, ValuesMut};

use crate::error::{Error, Result, narrow_len};

/// Signature of a dictionary block.
pub const DICT_SIGNATURE: [u8; 4] = *b"_DIC";

/// Reference bit of the root node.
pub const ROOT_REFERENCE: u32 = u32::MAX;

/// Ordered name → value map backed by a `_DIC` block on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct ResDict<T> {
    entries: IndexMap<String, T>,
}

impl<T> Default for ResDict<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T> ResDict<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair keys read from a `_DIC` block with separately loaded values.
    pub fn from_parts(keys: Vec<String>, values: Vec<T>) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(Error::DictCountMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        let mut entries = IndexMap::with_capacity(keys.len());
        for (key, value) in keys.into_iter().zip(values) {
            if entries.contains_key(&key) {
                return Err(Error::DuplicateKey(key));
            }
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    /// Insert or replace; a replaced value keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: T) -> Option<T> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn get_index(&self, index: usize) -> Option<(&str, &T)> {
        self.entries.get_index(index).map(|(k, v)| (k.as_str(), v))
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, String, T> {
        self.entries.keys()
    }

    pub fn values(&self) -> Values<'_, String, T> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, String, T> {
        self.entries.values_mut()
    }

    pub fn iter(&self) -> Iter<'_, String, T> {
        self.entries.iter()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for ResDict<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<'d, T> IntoIterator for &'d ResDict<T> {
    type Item = (&'d String, &'d T);
    type IntoIter = Iter<'d, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Anything the saver can write as a `_DIC` block.
pub trait DictKeys: 'static {
    fn dict_keys(&self) -> Vec<&str>;
}

impl<T: 'static> DictKeys for ResDict<T> {
    fn dict_keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// One trie node as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DictNode {
    pub reference: u32,
    pub left: u16,
    pub right: u16,
    pub key: String,
}

impl DictNode {
    fn root() -> Self {
        Self {
            reference: ROOT_REFERENCE,
            left: 0,
            right: 0,
            key: String::new(),
        }
    }

    fn depth(&self) -> i64 {
        if self.reference == ROOT_REFERENCE {
            -1
        } else {
            i64::from(self.reference)
        }
    }

    fn child(&self, key: &[u8]) -> usize {
        if bit(key, self.reference) {
            self.right as usize
        } else {
            self.left as usize
        }
    }
}

fn bit(key: &[u8], n: u32) -> bool {
    let byte = (n / 8) as usize;
    if byte >= key.len() {
        return false;
    }
    (key[key.len() - 1 - byte] >> (n % 8)) & 1 == 1
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<u32> {
    let bits = (a.len().max(b.len()) * 8) as u32;
    (0..bits).find(|&n| bit(a, n) != bit(b, n))
}

fn search(nodes: &[DictNode], key: &[u8]) -> usize {
    let mut parent = 0;
    let mut current = nodes[0].left as usize;
    while nodes[parent].depth() < nodes[current].depth() {
        parent = current;
        current = nodes[current].child(key);
    }
    current
}

/// Build the trie for `keys`, root first.
pub fn build_nodes(keys: &[&str]) -> Result<Vec<DictNode>> {
    let mut nodes = Vec::with_capacity(keys.len() + 1);
    nodes.push(DictNode::root());

    for key in keys {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        let bytes = key.as_bytes();
        let closest = search(&nodes, bytes);
        let Some(reference) = first_difference(bytes, nodes[closest].key.as_bytes()) else {
            return Err(Error::DuplicateKey((*key).to_owned()));
        };

        let mut parent = 0;
        let mut current = nodes[0].left as usize;
        while nodes[parent].depth() < nodes[current].depth()
            && nodes[current].depth() < i64::from(reference)
        {
            parent = current;
            current = nodes[current].child(bytes);
        }

        let index: u16 = narrow_len("dictionary size", nodes.len())?;
        let current = current as u16;
        let (left, right) = if bit(bytes, reference) {
            (current, index)
        } else {
            (index, current)
        };
        nodes.push(DictNode {
            reference,
            left,
            right,
            key: (*key).to_owned(),
        });

        if parent == 0 || !bit(bytes, nodes[parent].reference) {
            nodes[parent].left = index;
        } else {
            nodes[parent].right = index;
        }
    }
    Ok(nodes)
}

/// Walk the trie for `key`. Returns the node index (never the root).
pub fn find(nodes: &[DictNode], key: &str) -> Option<usize> {
    if nodes.is_empty() {
        return None;
    }
    let index = search(nodes, key.as_bytes());
    (index != 0 && nodes[index].key == key).then_some(index)
}
