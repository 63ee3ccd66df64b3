//! Flat arrays referenced by offset: numbers, raw bytes, and string tables.

use bfres_core::{
    ByteReader, ByteWriter, RelocationSection, ResDict, ResFileLoader, ResFileSaver, Result,
    StringEncoding, narrow_len,
};

pub(crate) fn read_f32s<const N: usize>(reader: &mut ByteReader<'_>) -> Result<[f32; N]> {
    let mut values = [0.0; N];
    for value in &mut values {
        *value = reader.read_f32()?;
    }
    Ok(values)
}

pub(crate) fn write_f32s(writer: &mut ByteWriter, values: &[f32]) -> Result<()> {
    values.iter().try_for_each(|&v| writer.write_f32(v))
}

macro_rules! numeric_arrays {
    ($($load:ident, $save:ident, $ty:ty, $read:ident, $write:ident;)*) => {
        $(
            pub(crate) fn $load(
                loader: &mut ResFileLoader<'_>,
                count: usize,
                offset: u64,
            ) -> Result<Vec<$ty>> {
                let values = loader.load_custom_at(offset, |l| l.read_vec(count, |r| r.$read()))?;
                Ok(values.unwrap_or_default())
            }

            pub(crate) fn $save<'a>(saver: &mut ResFileSaver<'a>, values: &'a [$ty]) -> Result<()> {
                if values.is_empty() {
                    return saver.write_null();
                }
                saver.save_custom(values, move |s| values.iter().try_for_each(|&v| s.$write(v)))
            }
        )*
    };
}

numeric_arrays! {
    load_u16s, save_u16s, u16, read_u16, write_u16;
    load_i16s, save_i16s, i16, read_i16, write_i16;
    load_i32s, save_i32s, i32, read_i32, write_i32;
    load_i64s, save_i64s, i64, read_i64, write_i64;
    load_f32s, save_f32s, f32, read_f32, write_f32;
    load_i8s, save_i8s, i8, read_i8, write_i8;
}

pub(crate) fn load_bytes(loader: &mut ResFileLoader<'_>, count: usize, offset: u64) -> Result<Vec<u8>> {
    let bytes = loader.load_custom_at(offset, |l| Ok(l.read_bytes(count)?.to_vec()))?;
    Ok(bytes.unwrap_or_default())
}

pub(crate) fn save_bytes<'a>(saver: &mut ResFileSaver<'a>, bytes: &'a [u8]) -> Result<()> {
    if bytes.is_empty() {
        return saver.write_null();
    }
    saver.save_custom(bytes, move |s| s.write_bytes(bytes))
}

/// Read `count` string offsets at `offset`. `None` uses the default encoding.
pub(crate) fn load_strings(
    loader: &mut ResFileLoader<'_>,
    count: usize,
    offset: u64,
    encoding: Option<StringEncoding>,
) -> Result<Vec<String>> {
    let encoding = encoding.unwrap_or(loader.options().encoding());
    let values = loader.load_custom_at(offset, |l| {
        let mut values = Vec::with_capacity(count.min(l.len()));
        for _ in 0..count {
            values.push(l.load_string_encoded(encoding)?.unwrap_or_default());
        }
        Ok(values)
    })?;
    Ok(values.unwrap_or_default())
}

/// Reserve an offset to a table of string offsets, relocated as one run.
pub(crate) fn save_strings<'a>(
    saver: &mut ResFileSaver<'a>,
    values: &'a [String],
    encoding: Option<StringEncoding>,
    hint: &'static str,
) -> Result<()> {
    if values.is_empty() {
        return saver.write_null();
    }
    saver.save_custom(values, move |s| {
        write_string_table(s, values.iter().map(String::as_str), encoding, hint)
    })
}

/// [`save_strings`] over the values of a name dictionary.
pub(crate) fn save_string_values<'a>(
    saver: &mut ResFileSaver<'a>,
    values: &'a ResDict<String>,
    hint: &'static str,
) -> Result<()> {
    if values.is_empty() {
        return saver.write_null();
    }
    saver.save_custom(values, move |s| {
        write_string_table(s, values.values().map(String::as_str), None, hint)
    })
}

fn write_string_table<'s>(
    saver: &mut ResFileSaver<'_>,
    values: impl ExactSizeIterator<Item = &'s str>,
    encoding: Option<StringEncoding>,
    hint: &'static str,
) -> Result<()> {
    let pos = saver.position();
    saver.save_relocate_entry_to_section(
        pos,
        narrow_len("string table length", values.len())?,
        1,
        0,
        RelocationSection::Main,
        hint,
    )?;
    for value in values {
        match encoding {
            Some(encoding) => saver.save_string_encoded(Some(value), encoding)?,
            None => saver.save_string(Some(value))?,
        }
    }
    Ok(())
}
