//! Loader and saver configuration.

use crate::cursor::StringEncoding;

/// Configuration for [`ResFileLoader`](crate::ResFileLoader).
#[derive(Clone, Copy, Debug)]
pub struct LoadOptions {
    pub(crate) default_encoding: StringEncoding,
    pub(crate) validate_relocation_table: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            default_encoding: StringEncoding::Utf8,
            validate_relocation_table: true,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoding used for strings whose field does not name one.
    pub fn default_encoding(mut self, value: StringEncoding) -> Self {
        self.default_encoding = value;
        self
    }

    /// Parse the `_RLT` block while loading and reject a malformed one.
    pub fn validate_relocation_table(mut self, value: bool) -> Self {
        self.validate_relocation_table = value;
        self
    }

    pub fn encoding(&self) -> StringEncoding {
        self.default_encoding
    }

    pub fn validates_relocation_table(&self) -> bool {
        self.validate_relocation_table
    }
}

/// Configuration for [`ResFileSaver`](crate::ResFileSaver).
#[derive(Clone, Copy, Debug)]
pub struct SaveOptions {
    pub(crate) default_encoding: StringEncoding,
    pub(crate) preserve_string_order: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            default_encoding: StringEncoding::Utf8,
            preserve_string_order: true,
        }
    }
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_encoding(mut self, value: StringEncoding) -> Self {
        self.default_encoding = value;
        self
    }

    /// Emit strings known from the loaded file first, in their original order.
    /// When off, the pool is emitted in sorted order only.
    pub fn preserve_string_order(mut self, value: bool) -> Self {
        self.preserve_string_order = value;
        self
    }

    pub fn encoding(&self) -> StringEncoding {
        self.default_encoding
    }

    pub fn preserves_string_order(&self) -> bool {
        self.preserve_string_order
    }
}
