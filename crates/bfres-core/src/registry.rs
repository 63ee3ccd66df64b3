//! Deferred-write ledger of the saver.
//!
//! Every reserved child becomes an [`ItemEntry`] keyed by the identity of the
//! borrowed value it was reserved for. Later reservations of the same value
//! only add offset sites, so a shared child is written once.

use std::any::TypeId;
use std::collections::HashMap;

use crate::dict::DictKeys;
use crate::error::Result;
use crate::res_data::ResData;
use crate::saver::ResFileSaver;

/// What a queued entry writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    ResData,
    List,
    Dict,
    Custom,
}

impl ItemKind {
    pub fn name(self) -> &'static str {
        match self {
            ItemKind::ResData => "chunk",
            ItemKind::List => "list",
            ItemKind::Dict => "dictionary",
            ItemKind::Custom => "custom block",
        }
    }
}

/// Identity of a borrowed value: its address and type, plus the kind of write.
///
/// The type takes part so a struct and its first field never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ItemKey {
    address: usize,
    type_id: TypeId,
    kind: ItemKind,
}

impl ItemKey {
    pub(crate) fn of<T: ?Sized + 'static>(value: &T, kind: ItemKind) -> Self {
        Self {
            address: value as *const T as *const () as usize,
            type_id: TypeId::of::<T>(),
            kind,
        }
    }
}

pub(crate) type CustomWriter<'a> = Box<dyn FnOnce(&mut ResFileSaver<'a>) -> Result<()> + 'a>;

pub(crate) enum Payload<'a> {
    Data(&'a dyn ResData),
    /// Registry indices of the element entries.
    List(Vec<usize>),
    Dict(&'a dyn DictKeys),
    /// Taken when the entry is written.
    Custom(Option<CustomWriter<'a>>),
}

pub(crate) struct ItemEntry<'a> {
    pub(crate) payload: Payload<'a>,
    pub(crate) kind: ItemKind,
    pub(crate) pending_offsets: Vec<u64>,
    pub(crate) target: Option<u64>,
    /// End of the bytes written at `target`, for chunks.
    pub(crate) end: Option<u64>,
    /// Registry index of the owning list; such entries are written by the list.
    pub(crate) list: Option<usize>,
    pub(crate) align: u64,
}

impl<'a> ItemEntry<'a> {
    pub(crate) fn new(payload: Payload<'a>, kind: ItemKind) -> Self {
        Self {
            payload,
            kind,
            pending_offsets: Vec::new(),
            target: None,
            end: None,
            list: None,
            align: 8,
        }
    }
}

#[derive(Default)]
pub(crate) struct ItemRegistry<'a> {
    pub(crate) entries: Vec<ItemEntry<'a>>,
    lookup: HashMap<ItemKey, usize>,
}

impl<'a> ItemRegistry<'a> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Index of the entry for `key`, creating it with `make` on first use.
    /// The flag tells whether the entry is new.
    pub(crate) fn register(
        &mut self,
        key: ItemKey,
        make: impl FnOnce() -> ItemEntry<'a>,
    ) -> (usize, bool) {
        if let Some(&index) = self.lookup.get(&key) {
            return (index, false);
        }
        let index = self.entries.len();
        self.entries.push(make());
        self.lookup.insert(key, index);
        (index, true)
    }

    pub(crate) fn add_site(&mut self, index: usize, site: u64) {
        self.entries[index].pending_offsets.push(site);
    }
}
