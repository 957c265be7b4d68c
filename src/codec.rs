// Motion Command wire format
//
// Fixed layout, big-endian, no length prefix:
// [speed f64][steer i8][steer% f64][cam_v i8][cam_v% f64][cam_h i8][cam_h% f64]
//  0          8         9           17        18          26        27      = 35 bytes
//
// An optional CRC-8 trailer (poly 0x07, init 0x00) over those 35 bytes can be
// required with `Framing::Crc8`; plain framing is the default.

use crate::error::{Result, VehicleError};
use crate::messages::{HorizontalDirection, MotionCommand, Movement, VerticalDirection};

pub const MESSAGE_LEN: usize = 35;
pub const CRC_MESSAGE_LEN: usize = MESSAGE_LEN + 1;

const CRC8_POLY: u8 = 0x07;

/// How datagrams carry a Motion Command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    #[default]
    Plain,
    Crc8,
}

impl Framing {
    pub fn decode(self, bytes: &[u8]) -> Result<MotionCommand> {
        match self {
            Framing::Plain => decode(bytes),
            Framing::Crc8 => decode_with_crc(bytes),
        }
    }

    pub fn encode(self, command: &MotionCommand) -> Vec<u8> {
        match self {
            Framing::Plain => encode(command).to_vec(),
            Framing::Crc8 => encode_with_crc(command).to_vec(),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let available = self.bytes.len() - self.pos;
        if available < N {
            return Err(VehicleError::TruncatedMessage {
                field,
                needed: N,
                available,
            });
        }

        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn f64(&mut self, field: &'static str) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take(field)?))
    }

    fn i8(&mut self, field: &'static str) -> Result<i8> {
        Ok(i8::from_be_bytes(self.take(field)?))
    }
}

/// Decode one Motion Command; bytes past the 35th are ignored
///
/// Unknown direction codes are kept, not rejected.
pub fn decode(bytes: &[u8]) -> Result<MotionCommand> {
    let mut reader = Reader::new(bytes);

    let speed = reader.f64("speed")?;
    let steer = reader.i8("direction")?;
    let steer_magnitude = reader.f64("steer magnitude")?;
    let vertical = reader.i8("camera vertical")?;
    let vertical_magnitude = reader.f64("camera vertical magnitude")?;
    let horizontal = reader.i8("camera horizontal")?;
    let horizontal_magnitude = reader.f64("camera horizontal magnitude")?;

    Ok(MotionCommand {
        speed,
        steer: Movement::new(HorizontalDirection::from(steer), steer_magnitude),
        camera_vertical: Movement::new(VerticalDirection::from(vertical), vertical_magnitude),
        camera_horizontal: Movement::new(
            HorizontalDirection::from(horizontal),
            horizontal_magnitude,
        ),
    })
}

pub fn encode(command: &MotionCommand) -> [u8; MESSAGE_LEN] {
    let mut out = [0u8; MESSAGE_LEN];
    out[0..8].copy_from_slice(&command.speed.to_be_bytes());
    out[8] = command.steer.direction.code() as u8;
    out[9..17].copy_from_slice(&command.steer.magnitude.to_be_bytes());
    out[17] = command.camera_vertical.direction.code() as u8;
    out[18..26].copy_from_slice(&command.camera_vertical.magnitude.to_be_bytes());
    out[26] = command.camera_horizontal.direction.code() as u8;
    out[27..35].copy_from_slice(&command.camera_horizontal.magnitude.to_be_bytes());
    out
}

/// CRC-8/SMBUS: poly 0x07, init 0x00, no reflection
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, &byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
        crc
    })
}

pub fn decode_with_crc(bytes: &[u8]) -> Result<MotionCommand> {
    let command = decode(bytes)?;
    let received = *bytes
        .get(MESSAGE_LEN)
        .ok_or(VehicleError::TruncatedMessage {
            field: "crc8",
            needed: 1,
            available: 0,
        })?;

    let expected = crc8(&bytes[..MESSAGE_LEN]);
    if expected != received {
        return Err(VehicleError::ChecksumMismatch { expected, received });
    }
    Ok(command)
}

pub fn encode_with_crc(command: &MotionCommand) -> [u8; CRC_MESSAGE_LEN] {
    let mut out = [0u8; CRC_MESSAGE_LEN];
    let payload = encode(command);
    out[..MESSAGE_LEN].copy_from_slice(&payload);
    out[MESSAGE_LEN] = crc8(&payload);
    out
}
