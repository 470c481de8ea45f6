//! Little-endian primitives for the section cache format.
//!
//! Every multi-byte field in a cache file is little-endian. Strings are a
//! `u32` byte length followed by UTF-8 bytes.

use std::io::{Read, Write};

use crate::error::PagerError;

/// Upper bound on any string field, guards against reading garbage lengths.
pub const MAX_STRING_BYTES: u32 = 4096;

pub(crate) fn write_u8<W: Write>(w: &mut W, value: u8) -> Result<(), PagerError> {
    w.write_all(&[value])?;
    Ok(())
}

pub(crate) fn write_bool<W: Write>(w: &mut W, value: bool) -> Result<(), PagerError> {
    write_u8(w, value as u8)
}

pub(crate) fn write_u16<W: Write>(w: &mut W, value: u16) -> Result<(), PagerError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_i16<W: Write>(w: &mut W, value: i16) -> Result<(), PagerError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<(), PagerError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_i32<W: Write>(w: &mut W, value: i32) -> Result<(), PagerError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f32<W: Write>(w: &mut W, value: f32) -> Result<(), PagerError> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_str<W: Write>(w: &mut W, value: &str) -> Result<(), PagerError> {
    let len = u32::try_from(value.len())
        .ok()
        .filter(|&len| len <= MAX_STRING_BYTES)
        .ok_or_else(|| PagerError::Format(format!("string of {} bytes", value.len())))?;
    write_u32(w, len)?;
    w.write_all(value.as_bytes())?;
    Ok(())
}

fn read_array<R: Read, const N: usize>(r: &mut R) -> Result<[u8; N], PagerError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_u8<R: Read>(r: &mut R) -> Result<u8, PagerError> {
    Ok(read_array::<R, 1>(r)?[0])
}

pub(crate) fn read_bool<R: Read>(r: &mut R) -> Result<bool, PagerError> {
    Ok(read_u8(r)? != 0)
}

pub(crate) fn read_u16<R: Read>(r: &mut R) -> Result<u16, PagerError> {
    Ok(u16::from_le_bytes(read_array(r)?))
}

pub(crate) fn read_i16<R: Read>(r: &mut R) -> Result<i16, PagerError> {
    Ok(i16::from_le_bytes(read_array(r)?))
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> Result<u32, PagerError> {
    Ok(u32::from_le_bytes(read_array(r)?))
}

pub(crate) fn read_i32<R: Read>(r: &mut R) -> Result<i32, PagerError> {
    Ok(i32::from_le_bytes(read_array(r)?))
}

pub(crate) fn read_f32<R: Read>(r: &mut R) -> Result<f32, PagerError> {
    Ok(f32::from_le_bytes(read_array(r)?))
}

pub(crate) fn read_string<R: Read>(r: &mut R) -> Result<String, PagerError> {
    let len = read_u32(r)?;
    if len > MAX_STRING_BYTES {
        return Err(PagerError::Format(format!("string length {}", len)));
    }
    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| PagerError::Format("string is not UTF-8".into()))
}
