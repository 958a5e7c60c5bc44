//! GetInfo command (0x30): extended device identification.
//!
//! The response length depends on the generation: old and transition boards
//! answer a 27-byte block, new boards append two more interface slots (and,
//! when the battery voltage is reported, two further bytes for a 31-byte
//! total). With no expected generation set, the decoder infers the family
//! from the actual payload length: 28 bytes or more means a new board.

use crate::error::{ConfigError, DecodeError};
use crate::protocol::wire;
use crate::types::{Generation, ROLE_GENERATION_THRESHOLD};

use super::{codes, Command};

/// GetInfo request. Carries no payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetInfo {
    expected: Option<Generation>,
}

impl GetInfo {
    /// Auto-detect the response family from its length.
    pub fn new() -> Self {
        Self { expected: None }
    }

    /// Fix the expected generation instead of inferring it.
    pub fn for_generation(generation: Generation) -> Self {
        Self {
            expected: Some(generation),
        }
    }
}

/// Fields common to every generation, 27 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub board_id: u8,
    pub firmware_version: u16,
    pub firmware_crc: u16,
    /// Accumulated awake time, seconds.
    pub work_time: u32,
    /// Accumulated sleep time, seconds.
    pub sleep_time: u32,
    pub group_id: u8,
    pub flags: u8,
    pub active_tariff_crc: u16,
    pub planned_tariff_crc: u16,
    /// Seconds since the last clock correction.
    pub time_since_correction: u32,
    pub reserve: u16,
    pub interface1_type: u8,
    pub interface2_type: u8,
}

impl DeviceInfo {
    pub const WIRE_SIZE: usize = 27;

    const FLAG_100A: u8 = 0x80;
    const FLAG_STREET_LIGHTING: u8 = 0x40;

    /// 3-byte current fields on the instant-value command.
    pub fn supports_100a(&self) -> bool {
        self.flags & Self::FLAG_100A != 0
    }

    /// Street-lighting control relay present (new generation).
    pub fn street_lighting_control(&self) -> bool {
        self.flags & Self::FLAG_STREET_LIGHTING != 0
    }

    fn decode(payload: &[u8]) -> Self {
        Self {
            board_id: payload[0],
            firmware_version: wire::read_u16(payload, 1),
            firmware_crc: wire::read_u16(payload, 3),
            work_time: wire::read_u32(payload, 5),
            sleep_time: wire::read_u32(payload, 9),
            group_id: payload[13],
            flags: payload[14],
            active_tariff_crc: wire::read_u16(payload, 15),
            planned_tariff_crc: wire::read_u16(payload, 17),
            time_since_correction: wire::read_u32(payload, 19),
            reserve: wire::read_u16(payload, 23),
            interface1_type: payload[25],
            interface2_type: payload[26],
        }
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        out[0] = self.board_id;
        wire::write_u16(out, 1, self.firmware_version);
        wire::write_u16(out, 3, self.firmware_crc);
        wire::write_u32(out, 5, self.work_time);
        wire::write_u32(out, 9, self.sleep_time);
        out[13] = self.group_id;
        out[14] = self.flags;
        wire::write_u16(out, 15, self.active_tariff_crc);
        wire::write_u16(out, 17, self.planned_tariff_crc);
        wire::write_u32(out, 19, self.time_since_correction);
        wire::write_u16(out, 23, self.reserve);
        out[25] = self.interface1_type;
        out[26] = self.interface2_type;
        Self::WIRE_SIZE
    }
}

/// New-generation response: the common block plus two more interface slots
/// and, optionally, the backup battery voltage in millivolts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewDeviceInfo {
    pub info: DeviceInfo,
    pub interface3_type: u8,
    pub interface4_type: u8,
    pub battery_voltage: Option<u16>,
}

impl NewDeviceInfo {
    pub fn encode(&self, out: &mut [u8]) -> usize {
        let mut n = self.info.encode(out);
        out[n] = self.interface3_type;
        out[n + 1] = self.interface4_type;
        n += 2;
        if let Some(voltage) = self.battery_voltage {
            wire::write_u16(out, n, voltage);
            n += 2;
        }
        n
    }
}

/// GetInfo response, tagged by encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoResponse {
    /// Old or transition board, 27 bytes.
    Legacy(DeviceInfo),
    /// New board, 29 bytes, 31 with battery voltage.
    New(NewDeviceInfo),
}

impl InfoResponse {
    /// The common field block, whichever family answered.
    pub fn info(&self) -> &DeviceInfo {
        match self {
            Self::Legacy(info) => info,
            Self::New(new) => &new.info,
        }
    }

    pub fn board_id(&self) -> u8 {
        self.info().board_id
    }

    /// Generation implied by the reported board id. The role byte is not
    /// part of this response; the gate value is assumed, as the device
    /// answered a new-protocol command to begin with.
    pub fn generation(&self) -> Option<Generation> {
        Generation::detect(self.board_id(), ROLE_GENERATION_THRESHOLD)
    }

    fn decode(payload: &[u8], expected: Option<Generation>) -> Result<Self, DecodeError> {
        if payload.len() < DeviceInfo::WIRE_SIZE {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: DeviceInfo::WIRE_SIZE,
                max: 31,
            });
        }
        let new_family = match expected {
            Some(generation) => generation == Generation::New,
            None => payload.len() >= DeviceInfo::WIRE_SIZE + 1,
        };
        let info = DeviceInfo::decode(payload);
        if !new_family {
            return Ok(Self::Legacy(info));
        }
        if payload.len() < DeviceInfo::WIRE_SIZE + 1 {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: DeviceInfo::WIRE_SIZE + 1,
                max: 31,
            });
        }
        // Some firmware truncates the response after interface3Type; the
        // missing slots read as zero.
        let interface4_type = payload.get(28).copied().unwrap_or(0);
        let battery_voltage = if payload.len() >= 31 {
            Some(wire::read_u16(payload, 29))
        } else {
            None
        };
        Ok(Self::New(NewDeviceInfo {
            info,
            interface3_type: payload[27],
            interface4_type,
            battery_voltage,
        }))
    }
}

impl Command for GetInfo {
    type Response = InfoResponse;

    fn code(&self) -> u8 {
        codes::GET_INFO
    }

    fn encode_request(&self, _out: &mut [u8]) -> Result<usize, ConfigError> {
        Ok(0)
    }

    fn decode_response(&self, payload: &[u8]) -> Result<Self::Response, DecodeError> {
        InfoResponse::decode(payload, self.expected)
    }

    fn supported_for(&self, _generation: Generation) -> bool {
        true
    }

    fn min_request_size(&self) -> usize {
        0
    }

    fn response_size_range(&self) -> (usize, usize) {
        (DeviceInfo::WIRE_SIZE, 31)
    }
}
