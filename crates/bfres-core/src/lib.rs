//! Serialization engine for BFRES containers.
//!
//! This crate contains the format-independent machinery:
//! - Byte cursors with scoped seeks and byte-order overrides
//! - The graph loader (offset following, per-offset sharing, string cache)
//! - The graph saver (deferred writes, backpatching, string pool, data blocks)
//! - Relocation table and name dictionary encoding
//!
//! Chunks plug into the engine through [`ResData`].

pub mod cursor;
pub mod dict;
mod error;
pub mod loader;
mod options;
mod registry;
pub mod relocation;
mod res_data;
pub mod saver;
pub mod string_pool;
mod version;

#[cfg(test)]
mod dict_tests;
#[cfg(test)]
mod graph_tests;
#[cfg(test)]
mod version_tests;

pub use cursor::{ByteOrder, ByteReader, ByteWriter, StringEncoding, align_up};
pub use dict::{DictKeys, ResDict};
pub use error::{Error, Result, narrow, narrow_len};
pub use loader::ResFileLoader;
pub use options::{LoadOptions, SaveOptions};
pub use registry::ItemKind;
pub use relocation::{
    RelocationEntry, RelocationSection, RelocationTable, RelocationTableBuilder, SectionRegion,
};
pub use res_data::ResData;
pub use saver::{BufferRegion, ListSlot, OffsetSlot, ResFileSaver};
pub use version::{Revision, Version};
