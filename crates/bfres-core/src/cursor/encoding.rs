use super::ByteOrder;

/// Character encoding of a pooled string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StringEncoding {
    Ascii,
    #[default]
    Utf8,
    /// UTF-16 in the container's byte order.
    Utf16,
}

impl StringEncoding {
    pub fn name(self) -> &'static str {
        match self {
            StringEncoding::Ascii => "ASCII",
            StringEncoding::Utf8 => "UTF-8",
            StringEncoding::Utf16 => "UTF-16",
        }
    }

    /// Width of the zero terminator in bytes.
    pub fn terminator_len(self) -> usize {
        match self {
            StringEncoding::Utf16 => 2,
            _ => 1,
        }
    }

    /// Encode without terminator. `None` if the value is not representable.
    pub fn encode(self, value: &str, order: ByteOrder) -> Option<Vec<u8>> {
        match self {
            StringEncoding::Ascii if !value.is_ascii() => None,
            StringEncoding::Ascii | StringEncoding::Utf8 => Some(value.as_bytes().to_vec()),
            StringEncoding::Utf16 => Some(
                value
                    .encode_utf16()
                    .flat_map(|unit| match order {
                        ByteOrder::Little => unit.to_le_bytes(),
                        ByteOrder::Big => unit.to_be_bytes(),
                    })
                    .collect(),
            ),
        }
    }

    /// Decode bytes without terminator. `None` if they are malformed.
    pub fn decode(self, bytes: &[u8], order: ByteOrder) -> Option<String> {
        match self {
            StringEncoding::Ascii if !bytes.is_ascii() => None,
            StringEncoding::Ascii | StringEncoding::Utf8 => {
                std::str::from_utf8(bytes).ok().map(str::to_owned)
            }
            StringEncoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return None;
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match order {
                        ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
                        ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units).ok()
            }
        }
    }
}
