// Sensor registers are read and written with vendor control transfers addressed to the
// claimed interface. Each register holds a 16 bit value in the sensor's preferred byte order;
// a reading is three consecutive registers, one per channel.
use crate::buffer::{read_u16, write_u16, Endian};
use crate::device::SensorHandle;
use crate::error::{Result, SensorError};
use crate::math::Vec3;
use log::debug;
use rusb::RequestType;
use std::future::Future;

pub const REGISTER_WIDTH: usize = 2;
pub const READING_WIDTH: usize = REGISTER_WIDTH * 3;

pub fn encode_register(value: u16, endian: Endian) -> [u8; REGISTER_WIDTH] {
    let mut buffer = [0; REGISTER_WIDTH];
    write_u16(&mut buffer, value, endian);
    buffer
}

pub fn decode_register(reply: &[u8], endian: Endian) -> Result<u16> {
    check_length(reply, REGISTER_WIDTH)?;
    Ok(read_u16(reply, endian))
}

/// Decodes three consecutive registers into a raw, uncalibrated reading.
pub fn decode_reading(reply: &[u8], endian: Endian) -> Result<Vec3> {
    check_length(reply, READING_WIDTH)?;
    let channel = |index: usize| read_u16(&reply[index * REGISTER_WIDTH..], endian) as f32;
    Ok(Vec3::new(channel(0), channel(1), channel(2)))
}

fn check_length(reply: &[u8], expected: usize) -> Result<()> {
    if reply.len() < expected {
        return Err(SensorError::MalformedResponse {
            expected,
            received: reply.len(),
        });
    }
    Ok(())
}

impl SensorHandle {
    pub fn read_register_u16(
        &self,
        request: u8,
        value: u16,
        index: u16,
        endian: Endian,
    ) -> impl Future<Output = Result<u16>> + Send + 'static {
        let transfer = self.read_control(RequestType::Vendor, request, value, index, REGISTER_WIDTH);
        async move {
            let reply = transfer.await?;
            debug!("Register {:#04x} replied {:x?}", request, reply);
            decode_register(&reply, endian)
        }
    }

    pub fn write_register_u16(
        &self,
        request: u8,
        value: u16,
        index: u16,
        register: u16,
        endian: Endian,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let data = encode_register(register, endian).to_vec();
        let transfer = self.write_control(RequestType::Vendor, request, value, index, data);
        async move {
            let written = transfer.await?;
            if written != REGISTER_WIDTH {
                return Err(SensorError::MalformedResponse {
                    expected: REGISTER_WIDTH,
                    received: written,
                });
            }
            Ok(())
        }
    }

    pub fn read_reading(
        &self,
        request: u8,
        value: u16,
        index: u16,
        endian: Endian,
    ) -> impl Future<Output = Result<Vec3>> + Send + 'static {
        let transfer = self.read_control(RequestType::Vendor, request, value, index, READING_WIDTH);
        async move {
            let reply = transfer.await?;
            crate::buffer::debug_dump("Sensor reading", &reply);
            decode_reading(&reply, endian)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn register_encoding_follows_endian() {
        assert_eq!(encode_register(0x1234, Endian::Big), [0x12, 0x34]);
        assert_eq!(encode_register(0x1234, Endian::Little), [0x34, 0x12]);
    }

    #[test]
    fn register_decoding() {
        assert_eq!(decode_register(&[0x00, 0xff], Endian::Big).unwrap(), 255);
        assert_eq!(decode_register(&[0x00, 0x20], Endian::Little).unwrap(), 8192);
        // Trailing bytes are ignored.
        assert_eq!(decode_register(&[0x01, 0x00, 0xee], Endian::Little).unwrap(), 1);
    }

    #[test]
    fn short_register_reply_is_malformed() {
        let error = decode_register(&[0x01], Endian::Big).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert!(matches!(
            error,
            SensorError::MalformedResponse {
                expected: 2,
                received: 1
            }
        ));
    }

    #[test]
    fn reading_has_three_channels() {
        let reply = [0x00, 0x01, 0x00, 0x02, 0x01, 0x00];
        let reading = decode_reading(&reply, Endian::Big).unwrap();
        assert_eq!(reading, Vec3::new(1.0, 2.0, 256.0));

        let reading = decode_reading(&reply, Endian::Little).unwrap();
        assert_eq!(reading, Vec3::new(256.0, 512.0, 1.0));
    }

    #[test]
    fn short_reading_is_malformed() {
        assert!(decode_reading(&[0; 4], Endian::Little).is_err());
    }
}
