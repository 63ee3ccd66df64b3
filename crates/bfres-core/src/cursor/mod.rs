//! Positionable, endian-aware primitive reader and writer.
//!
//! Both cursors keep a byte order that can be switched mid-stream with
//! `with_byte_order` and support scoped `temporary_seek`, which always
//! restores the previous position, also when the inner closure fails.

mod encoding;
mod reader;
mod writer;


pub use encoding::StringEncoding;
pub use reader::ByteReader;
pub use writer::ByteWriter;

/// Byte order of multi-byte scalars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Decode a byte order mark read as big-endian bytes.
    pub fn from_mark(mark: [u8; 2]) -> Option<Self> {
        match mark {
            [0xFE, 0xFF] => Some(ByteOrder::Big),
            [0xFF, 0xFE] => Some(ByteOrder::Little),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        }
    }
}

/// Round `value` up to a multiple of `align`. Alignments of 0 and 1 are no-ops.
pub const fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}
