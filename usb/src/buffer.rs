// Register values travel to and from the sensors as fixed width integers inside raw USB
// transfer buffers. Different sensors disagree on byte order, so every field is available in
// both flavours. The functions here never own or resize the buffer, they only touch the first
// two (or four) bytes of whatever slice they are handed; to address a field at an offset,
// pass `&mut buffer[offset..]`.
//
// All of these panic if the slice is shorter than the field, exactly like slice indexing.
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use strum::Display;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Big,
    #[default]
    Little,
}

/// Writes `value` most-significant byte first.
///
/// The field is exactly 16 bits wide; wider values must be narrowed by the caller
/// (`value as u16`), which keeps only the low 16 bits.
pub fn write_u16_be(buffer: &mut [u8], value: u16) {
    BigEndian::write_u16(buffer, value);
}

/// Writes `value` least-significant byte first. See [`write_u16_be`] for truncation.
pub fn write_u16_le(buffer: &mut [u8], value: u16) {
    LittleEndian::write_u16(buffer, value);
}

pub fn read_u16_be(buffer: &[u8]) -> u16 {
    BigEndian::read_u16(buffer)
}

pub fn read_u16_le(buffer: &[u8]) -> u16 {
    LittleEndian::read_u16(buffer)
}

pub fn write_u32_be(buffer: &mut [u8], value: u32) {
    BigEndian::write_u32(buffer, value);
}

pub fn write_u32_le(buffer: &mut [u8], value: u32) {
    LittleEndian::write_u32(buffer, value);
}

pub fn read_u32_be(buffer: &[u8]) -> u32 {
    BigEndian::read_u32(buffer)
}

pub fn read_u32_le(buffer: &[u8]) -> u32 {
    LittleEndian::read_u32(buffer)
}

pub fn write_u16(buffer: &mut [u8], value: u16, endian: Endian) {
    match endian {
        Endian::Big => write_u16_be(buffer, value),
        Endian::Little => write_u16_le(buffer, value),
    }
}

pub fn read_u16(buffer: &[u8], endian: Endian) -> u16 {
    match endian {
        Endian::Big => read_u16_be(buffer),
        Endian::Little => read_u16_le(buffer),
    }
}

/// Formats a buffer as space separated hex pairs, eight bytes per line.
pub fn to_hex(buffer: &[u8]) -> String {
    let mut output = String::with_capacity(buffer.len() * 3);
    for (index, chunk) in buffer.chunks(8).enumerate() {
        if index > 0 {
            output.push('\n');
        }
        for (position, byte) in chunk.iter().enumerate() {
            if position > 0 {
                output.push(' ');
            }
            // Writing to a String can't fail.
            let _ = write!(output, "{:02x}", byte);
        }
    }
    output
}

pub fn debug_dump(title: &str, buffer: &[u8]) {
    debug!("{} ({} bytes):\n{}", title, buffer.len(), to_hex(buffer));
}
