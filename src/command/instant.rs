//! ReadInstantValue command (0x2B): instantaneous electrical values.
//!
//! Not present on old-generation boards. The request selects a parameter
//! group; the catalog decodes the basic group (0x00) and passes every other
//! group through untouched for the host to interpret.
//!
//! Transition boards answer 25 bytes, or 28 with 3-byte currents when the
//! meter supports 100 A. New boards always answer 30 bytes with 24-bit
//! powers and currents.

use crate::error::{ConfigError, DecodeError};
use crate::protocol::wire;
use crate::types::{Generation, ParameterGroup, Payload};

use super::{codes, Command};

/// ReadInstantValue request, parameterized by the target's generation.
#[derive(Debug, Clone, Copy)]
pub struct ReadInstantValue {
    generation: Generation,
    group: ParameterGroup,
}

impl ReadInstantValue {
    pub fn new(generation: Generation, group: ParameterGroup) -> Self {
        Self { generation, group }
    }

    pub fn group(&self) -> ParameterGroup {
        self.group
    }
}

/// Decode the signed cos-phi convention: values at or above 0x8000 carry a
/// negated magnitude in the low bits.
fn cos_phi_value(raw: u16) -> f32 {
    if raw >= 0x8000 {
        (raw - 0x8000) as f32 / -1000.0
    } else {
        raw as f32 / 1000.0
    }
}

/// Transition-generation basic-group response: 16-bit powers, currents
/// either 16-bit or 24-bit depending on the 100 A option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionInstant {
    pub group: ParameterGroup,
    pub voltage_transform_coeff: u16,
    pub current_transform_coeff: u16,
    pub active_power: u16,
    pub reactive_power: u16,
    pub frequency: u16,
    pub cos_phi: u16,
    pub voltage_a: u16,
    pub voltage_b: u16,
    pub voltage_c: u16,
    pub current_a: u32,
    pub current_b: u32,
    pub current_c: u32,
    /// Currents occupy three bytes each (100 A meters).
    pub wide_currents: bool,
}

impl TransitionInstant {
    pub const NARROW_SIZE: usize = 25;
    pub const WIDE_SIZE: usize = 28;

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::NARROW_SIZE {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: Self::NARROW_SIZE,
                max: Self::WIDE_SIZE,
            });
        }
        let wide_currents = payload.len() == Self::WIDE_SIZE;
        let (current_a, current_b, current_c) = if wide_currents {
            (
                wire::read_u24(payload, 19),
                wire::read_u24(payload, 22),
                wire::read_u24(payload, 25),
            )
        } else {
            (
                wire::read_u16(payload, 19) as u32,
                wire::read_u16(payload, 21) as u32,
                wire::read_u16(payload, 23) as u32,
            )
        };
        Ok(Self {
            group: ParameterGroup::from_code(payload[0])?,
            voltage_transform_coeff: wire::read_u16(payload, 1),
            current_transform_coeff: wire::read_u16(payload, 3),
            active_power: wire::read_u16(payload, 5),
            reactive_power: wire::read_u16(payload, 7),
            frequency: wire::read_u16(payload, 9),
            cos_phi: wire::read_u16(payload, 11),
            voltage_a: wire::read_u16(payload, 13),
            voltage_b: wire::read_u16(payload, 15),
            voltage_c: wire::read_u16(payload, 17),
            current_a,
            current_b,
            current_c,
            wide_currents,
        })
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        out[0] = self.group.code();
        wire::write_u16(out, 1, self.voltage_transform_coeff);
        wire::write_u16(out, 3, self.current_transform_coeff);
        wire::write_u16(out, 5, self.active_power);
        wire::write_u16(out, 7, self.reactive_power);
        wire::write_u16(out, 9, self.frequency);
        wire::write_u16(out, 11, self.cos_phi);
        wire::write_u16(out, 13, self.voltage_a);
        wire::write_u16(out, 15, self.voltage_b);
        wire::write_u16(out, 17, self.voltage_c);
        if self.wide_currents {
            wire::write_u24(out, 19, self.current_a);
            wire::write_u24(out, 22, self.current_b);
            wire::write_u24(out, 25, self.current_c);
            Self::WIDE_SIZE
        } else {
            wire::write_u16(out, 19, self.current_a as u16);
            wire::write_u16(out, 21, self.current_b as u16);
            wire::write_u16(out, 23, self.current_c as u16);
            Self::NARROW_SIZE
        }
    }

    pub fn frequency_hz(&self) -> f32 {
        self.frequency as f32 / 100.0
    }

    pub fn cos_phi(&self) -> f32 {
        cos_phi_value(self.cos_phi)
    }

    pub fn voltage_a_volts(&self) -> f32 {
        self.voltage_a as f32 / 100.0
    }

    pub fn voltage_b_volts(&self) -> f32 {
        self.voltage_b as f32 / 100.0
    }

    pub fn voltage_c_volts(&self) -> f32 {
        self.voltage_c as f32 / 100.0
    }

    pub fn current_a_amperes(&self) -> f32 {
        self.current_a as f32 / 1000.0
    }

    pub fn current_b_amperes(&self) -> f32 {
        self.current_b as f32 / 1000.0
    }

    pub fn current_c_amperes(&self) -> f32 {
        self.current_c as f32 / 1000.0
    }

    pub fn active_power_kw(&self) -> f32 {
        self.active_power as f32 / 100.0
    }

    pub fn reactive_power_kvar(&self) -> f32 {
        self.reactive_power as f32 / 100.0
    }
}

/// New-generation basic-group response: 24-bit powers and currents, 30 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewInstant {
    pub group: ParameterGroup,
    pub voltage_transform_coeff: u16,
    pub current_transform_coeff: u16,
    pub active_power: u32,
    pub reactive_power: u32,
    pub frequency: u16,
    pub cos_phi: u16,
    pub voltage_a: u16,
    pub voltage_b: u16,
    pub voltage_c: u16,
    pub current_a: u32,
    pub current_b: u32,
    pub current_c: u32,
}

impl NewInstant {
    pub const WIRE_SIZE: usize = 30;

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::WIRE_SIZE {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: Self::WIRE_SIZE,
                max: Self::WIRE_SIZE,
            });
        }
        Ok(Self {
            group: ParameterGroup::from_code(payload[0])?,
            voltage_transform_coeff: wire::read_u16(payload, 1),
            current_transform_coeff: wire::read_u16(payload, 3),
            active_power: wire::read_u24(payload, 5),
            reactive_power: wire::read_u24(payload, 8),
            frequency: wire::read_u16(payload, 11),
            cos_phi: wire::read_u16(payload, 13),
            voltage_a: wire::read_u16(payload, 15),
            voltage_b: wire::read_u16(payload, 17),
            voltage_c: wire::read_u16(payload, 19),
            current_a: wire::read_u24(payload, 21),
            current_b: wire::read_u24(payload, 24),
            current_c: wire::read_u24(payload, 27),
        })
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        out[0] = self.group.code();
        wire::write_u16(out, 1, self.voltage_transform_coeff);
        wire::write_u16(out, 3, self.current_transform_coeff);
        wire::write_u24(out, 5, self.active_power);
        wire::write_u24(out, 8, self.reactive_power);
        wire::write_u16(out, 11, self.frequency);
        wire::write_u16(out, 13, self.cos_phi);
        wire::write_u16(out, 15, self.voltage_a);
        wire::write_u16(out, 17, self.voltage_b);
        wire::write_u16(out, 19, self.voltage_c);
        wire::write_u24(out, 21, self.current_a);
        wire::write_u24(out, 24, self.current_b);
        wire::write_u24(out, 27, self.current_c);
        Self::WIRE_SIZE
    }

    pub fn frequency_hz(&self) -> f32 {
        self.frequency as f32 / 100.0
    }

    pub fn cos_phi(&self) -> f32 {
        cos_phi_value(self.cos_phi)
    }

    pub fn voltage_a_volts(&self) -> f32 {
        self.voltage_a as f32 / 100.0
    }

    pub fn voltage_b_volts(&self) -> f32 {
        self.voltage_b as f32 / 100.0
    }

    pub fn voltage_c_volts(&self) -> f32 {
        self.voltage_c as f32 / 100.0
    }

    pub fn current_a_amperes(&self) -> f32 {
        self.current_a as f32 / 1000.0
    }

    pub fn current_b_amperes(&self) -> f32 {
        self.current_b as f32 / 1000.0
    }

    pub fn current_c_amperes(&self) -> f32 {
        self.current_c as f32 / 1000.0
    }

    pub fn active_power_kw(&self) -> f32 {
        self.active_power as f32 / 1000.0
    }

    pub fn reactive_power_kvar(&self) -> f32 {
        self.reactive_power as f32 / 1000.0
    }
}

/// ReadInstantValue response, tagged by encoding family. Groups other than
/// basic arrive as raw bytes with the group byte preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstantResponse {
    Transition(TransitionInstant),
    New(NewInstant),
    Raw { group: u8, payload: Payload },
}

impl Command for ReadInstantValue {
    type Response = InstantResponse;

    fn code(&self) -> u8 {
        codes::READ_INSTANT_VALUE
    }

    fn encode_request(&self, out: &mut [u8]) -> Result<usize, ConfigError> {
        if out.is_empty() {
            return Err(ConfigError::RequestBufferTooSmall { len: 0, need: 1 });
        }
        out[0] = self.group.code();
        Ok(1)
    }

    fn decode_response(&self, payload: &[u8]) -> Result<Self::Response, DecodeError> {
        let Some(&group) = payload.first() else {
            return Err(DecodeError::PayloadLength {
                len: 0,
                min: 1,
                max: TransitionInstant::WIDE_SIZE,
            });
        };
        if group != ParameterGroup::Basic.code() {
            let payload = Payload::copy_from(payload)?;
            return Ok(InstantResponse::Raw { group, payload });
        }
        match self.generation {
            Generation::Old => Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: 0,
                max: 0,
            }),
            Generation::Transition => {
                TransitionInstant::decode(payload).map(InstantResponse::Transition)
            }
            Generation::New => NewInstant::decode(payload).map(InstantResponse::New),
        }
    }

    fn supported_for(&self, generation: Generation) -> bool {
        generation != Generation::Old
    }

    fn min_request_size(&self) -> usize {
        1
    }

    fn response_size_range(&self) -> (usize, usize) {
        match self.generation {
            Generation::Old => (0, 0),
            Generation::Transition => (TransitionInstant::NARROW_SIZE, TransitionInstant::WIDE_SIZE),
            Generation::New => (NewInstant::WIRE_SIZE, NewInstant::WIRE_SIZE),
        }
    }
}
