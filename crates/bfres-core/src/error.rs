//! Error type shared by the loader, the saver and every chunk.

use std::io;

use crate::version::Version;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading or writing a container.
///
/// Every failure is fatal for the operation in flight; the first error
/// propagates to the caller of `load`/`save`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of data: needed {needed} bytes at {offset:#x}, data is {len} bytes")]
    UnexpectedEof {
        offset: u64,
        needed: usize,
        len: usize,
    },

    #[error("offset {offset:#x} is outside the data ({len} bytes)")]
    OffsetOutOfBounds { offset: u64, len: usize },

    #[error("invalid signature at {offset:#x}: expected {expected:?}, found {found:?}")]
    InvalidSignature {
        offset: u64,
        expected: String,
        found: String,
    },

    #[error("invalid byte order mark {0:#06x}")]
    InvalidByteOrderMark(u16),

    #[error("unsupported version {0}")]
    UnsupportedVersion(Version),

    #[error("file size mismatch: header says {header}, actual {actual}")]
    SizeMismatch { header: u32, actual: usize },

    #[error("invalid {what}: {value:#x}")]
    InvalidValue { what: &'static str, value: u64 },

    #[error("{what} does not fit its field: {value}")]
    ValueOutOfRange { what: &'static str, value: u64 },

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("relocation entry at {offset:#x} ({hint}) covers no structs")]
    EmptyRelocationEntry { offset: u64, hint: String },

    #[error("offset {offset:#x} was already loaded as a different type")]
    ConflictingType { offset: u64 },

    #[error("missing {0}")]
    MissingData(&'static str),

    #[error("dictionary has {keys} keys but {values} values")]
    DictCountMismatch { keys: usize, values: usize },

    #[error("duplicate dictionary key {0:?}")]
    DuplicateKey(String),

    #[error("dictionary keys must not be empty")]
    EmptyKey,

    #[error("string at {offset:#x} is not valid {encoding}")]
    InvalidString { offset: u64, encoding: &'static str },

    #[error("{kind} entry was referenced from {sites} offsets but never written")]
    UnresolvedReference { kind: &'static str, sites: usize },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn signature(offset: u64, expected: &[u8], found: &[u8]) -> Self {
        Self::InvalidSignature {
            offset,
            expected: String::from_utf8_lossy(expected).into_owned(),
            found: String::from_utf8_lossy(found).into_owned(),
        }
    }
}

/// Narrow a count or index to the width of its on-disk field.
pub fn narrow<T: TryFrom<u64>>(what: &'static str, value: impl Into<u64>) -> Result<T> {
    let value = value.into();
    T::try_from(value).map_err(|_| Error::ValueOutOfRange { what, value })
}

/// [`narrow`] for `usize` lengths.
pub fn narrow_len<T: TryFrom<u64>>(what: &'static str, len: usize) -> Result<T> {
    narrow(what, len as u64)
}
