//! ReadStatus command (0x05): energy registers and meter configuration.
//!
//! Old boards take no request payload and answer a 26-byte block; transition
//! and new boards take a one-byte energy-type selector and answer the
//! 30-byte extended block (31 on some new firmware, trailing byte ignored).

use crate::error::{ConfigError, DecodeError};
use crate::protocol::wire;
use crate::types::{ConfigByte, EnergyType, Generation};

use super::{codes, Command};

/// ReadStatus request, parameterized by the target's generation.
#[derive(Debug, Clone, Copy)]
pub struct ReadStatus {
    generation: Generation,
    energy_type: EnergyType,
}

impl ReadStatus {
    pub fn new(generation: Generation, energy_type: EnergyType) -> Self {
        Self {
            generation,
            energy_type,
        }
    }

    pub fn energy_type(&self) -> EnergyType {
        self.energy_type
    }

    fn is_old(&self) -> bool {
        self.generation == Generation::Old
    }
}

/// Old-generation status block, 26 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OldStatus {
    pub total_energy: u32,
    pub config: ConfigByte,
    pub division_coeff: u8,
    pub role_code: u8,
    /// 24 bits on the wire; firmware always reports 1.
    pub multiplication_coeff: u32,
    pub tariffs: [u32; 4],
}

impl OldStatus {
    pub const WIRE_SIZE: usize = 26;

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::WIRE_SIZE {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: Self::WIRE_SIZE,
                max: Self::WIRE_SIZE,
            });
        }
        let mut tariffs = [0u32; 4];
        for (i, tariff) in tariffs.iter_mut().enumerate() {
            *tariff = wire::read_u32(payload, 10 + i * 4);
        }
        Ok(Self {
            total_energy: wire::read_u32(payload, 0),
            config: ConfigByte::from_byte(payload[4]),
            division_coeff: payload[5],
            role_code: payload[6],
            multiplication_coeff: wire::read_u24(payload, 7),
            tariffs,
        })
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        wire::write_u32(out, 0, self.total_energy);
        out[4] = self.config.to_byte();
        out[5] = self.division_coeff;
        out[6] = self.role_code;
        wire::write_u24(out, 7, self.multiplication_coeff);
        for (i, tariff) in self.tariffs.iter().enumerate() {
            wire::write_u32(out, 10 + i * 4, *tariff);
        }
        Self::WIRE_SIZE
    }
}

/// Transition/new-generation status block, 30 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedStatus {
    pub energy_type: EnergyType,
    pub config: ConfigByte,
    pub voltage_transform_coeff: u16,
    pub current_transform_coeff: u16,
    pub total_full: u32,
    pub total_active: u32,
    pub tariffs: [u32; 4],
}

impl ExtendedStatus {
    pub const WIRE_SIZE: usize = 30;

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::WIRE_SIZE {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: Self::WIRE_SIZE,
                max: Self::WIRE_SIZE + 1,
            });
        }
        let mut tariffs = [0u32; 4];
        for (i, tariff) in tariffs.iter_mut().enumerate() {
            *tariff = wire::read_u32(payload, 14 + i * 4);
        }
        Ok(Self {
            energy_type: EnergyType::from_code(payload[0])?,
            config: ConfigByte::from_byte(payload[1]),
            voltage_transform_coeff: wire::read_u16(payload, 2),
            current_transform_coeff: wire::read_u16(payload, 4),
            total_full: wire::read_u32(payload, 6),
            total_active: wire::read_u32(payload, 10),
            tariffs,
        })
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        out[0] = self.energy_type.code();
        out[1] = self.config.to_byte();
        wire::write_u16(out, 2, self.voltage_transform_coeff);
        wire::write_u16(out, 4, self.current_transform_coeff);
        wire::write_u32(out, 6, self.total_full);
        wire::write_u32(out, 10, self.total_active);
        for (i, tariff) in self.tariffs.iter().enumerate() {
            wire::write_u32(out, 14 + i * 4, *tariff);
        }
        Self::WIRE_SIZE
    }
}

/// ReadStatus response, tagged by encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusResponse {
    Old(OldStatus),
    Extended(ExtendedStatus),
}

impl StatusResponse {
    pub fn active_tariff(&self) -> u8 {
        match self {
            Self::Old(status) => status.config.active_tariff,
            Self::Extended(status) => status.config.active_tariff,
        }
    }
}

impl Command for ReadStatus {
    type Response = StatusResponse;

    fn code(&self) -> u8 {
        codes::READ_STATUS
    }

    fn encode_request(&self, out: &mut [u8]) -> Result<usize, ConfigError> {
        if self.is_old() {
            return Ok(0);
        }
        if out.is_empty() {
            return Err(ConfigError::RequestBufferTooSmall { len: 0, need: 1 });
        }
        out[0] = self.energy_type.code();
        Ok(1)
    }

    fn decode_response(&self, payload: &[u8]) -> Result<Self::Response, DecodeError> {
        if self.is_old() {
            OldStatus::decode(payload).map(StatusResponse::Old)
        } else {
            ExtendedStatus::decode(payload).map(StatusResponse::Extended)
        }
    }

    fn supported_for(&self, _generation: Generation) -> bool {
        true
    }

    fn min_request_size(&self) -> usize {
        if self.is_old() {
            0
        } else {
            1
        }
    }

    fn response_size_range(&self) -> (usize, usize) {
        if self.is_old() {
            (OldStatus::WIRE_SIZE, OldStatus::WIRE_SIZE)
        } else {
            (ExtendedStatus::WIRE_SIZE, ExtendedStatus::WIRE_SIZE + 1)
        }
    }
}
