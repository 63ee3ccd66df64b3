use crate::error::{Error, Result};

use super::{ByteOrder, StringEncoding, align_up};

macro_rules! read_scalars {
    ($($name:ident -> $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> Result<$ty> {
                let bytes = self.read_array()?;
                Ok(match self.order {
                    ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                    ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                })
            }
        )*
    };
}

/// Reading cursor over a borrowed byte slice.
#[derive(Clone, Debug)]
pub struct ByteReader<'d> {
    data: &'d [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'d> ByteReader<'d> {
    pub fn new(data: &'d [u8], order: ByteOrder) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    pub fn data(&self) -> &'d [u8] {
        self.data
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

    /// Move to an absolute position. The end of the data is a valid position.
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

    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.seek(self.position() + count)
    }

    /// Skip forward to the next multiple of `align`.
    pub fn align(&mut self, align: u64) -> Result<()> {
        self.seek(align_up(self.position(), align))
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

    pub(crate) fn restore(&mut self, pos: u64) {
        self.pos = pos as usize;
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'d [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::UnexpectedEof {
                offset: self.pos as u64,
                needed: count,
                len: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    read_scalars! {
        read_u16 -> u16,
        read_i16 -> i16,
        read_u32 -> u32,
        read_i32 -> i32,
        read_u64 -> u64,
        read_i64 -> i64,
        read_f32 -> f32,
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read an 8-byte absolute offset. Zero means "absent".
    pub fn read_offset(&mut self) -> Result<u64> {
        self.read_u64()
    }

    /// Read a four-character tag and compare it with `expected`.
    pub fn read_signature(&mut self, expected: &[u8; 4]) -> Result<()> {
        let at = self.position();
        let found = self.read_array::<4>()?;
        if &found != expected {
            return Err(Error::signature(at, expected, &found));
        }
        Ok(())
    }

    /// Read `count` elements with `read`.
    pub fn read_vec<T>(
        &mut self,
        count: usize,
        mut read: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(count.min(self.data.len()));
        for _ in 0..count {
            out.push(read(self)?);
        }
        Ok(out)
    }

    /// Decode exactly `len` bytes as a string.
    pub fn read_string(&mut self, len: usize, encoding: StringEncoding) -> Result<String> {
        let at = self.position();
        let bytes = self.read_bytes(len)?;
        encoding
            .decode(bytes, self.order)
            .ok_or(Error::InvalidString {
                offset: at,
                encoding: encoding.name(),
            })
    }

    /// Read up to (and consume) a zero terminator.
    pub fn read_zero_terminated(&mut self, encoding: StringEncoding) -> Result<String> {
        let start = self.pos;
        let width = encoding.terminator_len();
        let mut end = start;
        loop {
            let unit = self.data.get(end..end + width).ok_or(Error::UnexpectedEof {
                offset: end as u64,
                needed: width,
                len: self.data.len(),
            })?;
            if unit.iter().all(|&b| b == 0) {
                break;
            }
            end += width;
        }
        let value = self.read_string(end - start, encoding)?;
        self.pos += width;
        Ok(value)
    }

    /// Read a `u16` byte length followed by the encoded bytes and terminator.
    pub fn read_prefixed_string(&mut self, encoding: StringEncoding) -> Result<String> {
        let len = self.read_u16()? as usize;
        let value = self.read_string(len, encoding)?;
        self.skip(encoding.terminator_len() as u64)?;
        Ok(value)
    }
}
