use crate::error::{Error, Result};

use super::{ByteOrder, StringEncoding, align_up};

macro_rules! write_scalars {
    ($($name:ident, $at:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, value: $ty) -> Result<()> {
                let bytes = match self.order {
                    ByteOrder::Little => value.to_le_bytes(),
                    ByteOrder::Big => value.to_be_bytes(),
                };
                self.write_bytes(&bytes)
            }

            /// Overwrite an earlier site without moving the cursor.
            pub fn $at(&mut self, pos: u64, value: $ty) -> Result<()> {
                self.temporary_seek(pos, |w| w.$name(value))
            }
        )*
    };
}

/// Writing cursor over a growable buffer.
///
/// Writes overwrite existing bytes at the cursor and extend the buffer past
/// its end, so earlier sites can be backpatched after a seek.
#[derive(Clone, Debug, Default)]
pub struct ByteWriter {
    data: Vec<u8>,
    pos: usize,
    order: ByteOrder,
}

impl ByteWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        match usize::try_from(pos) {
            Ok(p) if p <= self.data.len() => {
                self.pos = p;
                Ok(())
            }
            _ => Err(Error::OffsetOutOfBounds {
                offset: pos,
                len: self.data.len(),
            }),
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Run `f` at `pos`, then restore the current position even if `f` fails.
    pub fn temporary_seek<T>(
        &mut self,
        pos: u64,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.pos;
        let result = self.seek(pos).and_then(|()| f(self));
        self.pos = saved;
        result
    }

    /// Run `f` with a different byte order, restoring the previous one afterwards.
    pub fn with_byte_order<T>(
        &mut self,
        order: ByteOrder,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = std::mem::replace(&mut self.order, order);
        let result = f(self);
        self.order = saved;
        result
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    pub fn write_zeros(&mut self, count: usize) -> Result<()> {
        self.write_bytes(&vec![0; count])
    }

    /// Zero-fill up to the next multiple of `align`.
    pub fn align(&mut self, align: u64) -> Result<()> {
        let target = align_up(self.position(), align);
        self.write_zeros((target - self.position()) as usize)
    }

    write_scalars! {
        write_u16, write_u16_at: u16,
        write_i16, write_i16_at: i16,
        write_u32, write_u32_at: u32,
        write_i32, write_i32_at: i32,
        write_u64, write_u64_at: u64,
        write_i64, write_i64_at: i64,
        write_f32, write_f32_at: f32,
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_signature(&mut self, tag: &[u8; 4]) -> Result<()> {
        self.write_bytes(tag)
    }

    /// Write a `u16` byte length, the encoded bytes and the terminator.
    pub fn write_prefixed_string(&mut self, value: &str, encoding: StringEncoding) -> Result<()> {
        let at = self.position();
        let bytes = encoding
            .encode(value, self.order)
            .ok_or(Error::InvalidString {
                offset: at,
                encoding: encoding.name(),
            })?;
        let len: u16 = crate::error::narrow_len("string length", bytes.len())?;
        self.write_u16(len)?;
        self.write_bytes(&bytes)?;
        self.write_zeros(encoding.terminator_len())
    }
}
