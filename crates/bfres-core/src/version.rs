//! Container version tuple and the layout revision derived from it.

use std::fmt;

use crate::error::{Error, Result};

/// Four-part version packed into one `u32` in the file header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub major2: u8,
    pub minor: u8,
    pub minor2: u8,
}

impl Version {
    pub const fn new(major: u8, major2: u8, minor: u8, minor2: u8) -> Self {
        Self {
            major,
            major2,
            minor,
            minor2,
        }
    }

    pub const fn from_packed(value: u32) -> Self {
        Self {
            major: (value >> 24) as u8,
            major2: (value >> 16) as u8,
            minor: (value >> 8) as u8,
            minor2: value as u8,
        }
    }

    pub const fn packed(self) -> u32 {
        (self.major as u32) << 24
            | (self.major2 as u32) << 16
            | (self.minor as u32) << 8
            | self.minor2 as u32
    }

    /// Layout revision for this version, or `UnsupportedVersion`.
    pub fn revision(self) -> Result<Revision> {
        match (self.major, self.major2) {
            (0, 5..=8) => Ok(Revision::V5),
            (0, 9) => Ok(Revision::V9),
            (0, 10) => Ok(Revision::V10),
            _ => Err(Error::UnsupportedVersion(self)),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.major2, self.minor, self.minor2
        )
    }
}

/// On-disk layout family. Chunks branch on this instead of raw version numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Revision {
    /// Versions 0.5 through 0.8.
    V5,
    /// Adds reserved header and bone blocks, four-component bounding radii.
    V9,
    /// Adds per-material sampler and texture slot arrays.
    V10,
}

impl Revision {
    /// Whether the layout carries the extra reserved blocks introduced in 0.9.
    pub fn has_reserved_blocks(self) -> bool {
        self >= Revision::V9
    }

    pub fn has_material_slots(self) -> bool {
        self >= Revision::V10
    }
}
