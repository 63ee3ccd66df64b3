//! String pool (`_STR`) builder.
//!
//! Strings are deduplicated by value and encoding. Every site that references a string is
//! remembered and backpatched with the address of the pooled bytes once the
//! pool is emitted.

use std::collections::{BTreeMap, HashSet};

use crate::cursor::{ByteWriter, StringEncoding};
use crate::error::{Result, narrow, narrow_len};

/// Signature of the string pool block.
pub const STRING_POOL_SIGNATURE: [u8; 4] = *b"_STR";

/// Written at string sites until the pool is emitted.
pub const PLACEHOLDER_OFFSET: u64 = 0xFFFF_FFFF_0000_0000;

#[derive(Debug)]
struct StringEntry {
    encoding: StringEncoding,
    pending_offsets: Vec<u64>,
    resolved: Option<u64>,
}

/// Position and size of an emitted pool block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StringPoolLayout {
    pub offset: u64,
    pub size: u32,
    pub count: u32,
}

/// Collects pooled strings and their reference sites.
///
/// A value referenced in two encodings is pooled once per encoding.
#[derive(Debug, Default)]
pub struct StringPool {
    entries: BTreeMap<String, Vec<StringEntry>>,
    default_encoding: StringEncoding,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool whose untagged reservations use `encoding`.
    pub fn with_encoding(encoding: StringEncoding) -> Self {
        Self {
            entries: BTreeMap::new(),
            default_encoding: encoding,
        }
    }

    /// Record a reference to `value` written at `site`. `None` uses the
    /// pool's default encoding.
    pub fn reserve(&mut self, value: &str, encoding: Option<StringEncoding>, site: u64) {
        let encoding = encoding.unwrap_or(self.default_encoding);
        let entries = self.entries.entry(value.to_owned()).or_default();
        match entries.iter_mut().find(|e| e.encoding == encoding) {
            Some(entry) => entry.pending_offsets.push(site),
            None => entries.push(StringEntry {
                encoding,
                pending_offsets: vec![site],
                resolved: None,
            }),
        }
    }

    /// Number of pooled strings, counting each encoding of a value.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.contains_key(value)
    }

    /// Sites referencing `value`, in every encoding.
    pub fn sites(&self, value: &str) -> Vec<u64> {
        self.entries
            .get(value)
            .into_iter()
            .flatten()
            .flat_map(|e| e.pending_offsets.iter().copied())
            .collect()
    }

    /// Address of the pooled bytes of `value` in the default encoding, or
    /// in the first encoding it was reserved with.
    pub fn position(&self, value: &str) -> Option<u64> {
        let entries = self.entries.get(value)?;
        entries
            .iter()
            .find(|e| e.encoding == self.default_encoding)
            .or(entries.first())
            .and_then(|e| e.resolved)
    }

    /// Known strings that are still referenced come first, in their known
    /// order; the rest follow in sorted order.
    pub fn emission_order<'s>(&'s self, known: &'s [String]) -> Vec<&'s str> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut order = Vec::with_capacity(self.entries.len());

        for value in known {
            if self.entries.contains_key(value.as_str()) && seen.insert(value.as_str()) {
                order.push(value.as_str());
            }
        }
        for value in self.entries.keys() {
            if seen.insert(value.as_str()) {
                order.push(value.as_str());
            }
        }
        order
    }

    /// Emit the `_STR` block at the next 8-byte boundary and patch every site.
    ///
    /// The next-block field is left zero for the caller to fill.
    pub fn write(
        &mut self,
        writer: &mut ByteWriter,
        known: &[String],
    ) -> Result<StringPoolLayout> {
        let order: Vec<String> = self
            .emission_order(known)
            .into_iter()
            .map(str::to_owned)
            .collect();

        writer.align(8)?;
        let start = writer.position();
        writer.write_signature(&STRING_POOL_SIGNATURE)?;
        writer.write_u32(0)?;
        writer.write_u32(0)?;
        writer.write_u32(0)?;
        let count: u32 = narrow_len("string count", self.len())?;
        writer.write_u32(count)?;

        for value in &order {
            let Some(entries) = self.entries.get_mut(value) else {
                continue;
            };
            for entry in entries {
                writer.align(2)?;
                let data = writer.position() + 2;
                writer.write_prefixed_string(value, entry.encoding)?;
                writer.align(2)?;

                entry.resolved = Some(data);
                for &site in &entry.pending_offsets {
                    writer.write_u64_at(site, data)?;
                }
                log::trace!(
                    "pooled {value:?} ({}) at {data:#x} ({} sites)",
                    entry.encoding.name(),
                    entry.pending_offsets.len()
                );
            }
        }

        writer.align(8)?;
        let size: u32 = narrow("string pool size", writer.position() - start)?;
        writer.write_u32_at(start + 8, size)?;

        Ok(StringPoolLayout {
            offset: start,
            size,
            count,
        })
    }
}
