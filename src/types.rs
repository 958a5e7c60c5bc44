//! Core types used throughout meterlink.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Maximum command payload size in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 31;

/// Maximum raw frame size in bytes, after stuffing.
pub const MAX_FRAME_SIZE: usize = 64;

/// Minimum raw frame size in bytes.
pub const MIN_FRAME_SIZE: usize = 10;

/// Role byte threshold separating old-protocol firmware from the
/// transition/new families. The value is opaque to the link layer; meter
/// firmware defines its meaning.
pub const ROLE_GENERATION_THRESHOLD: u8 = 0x32;

/// A 16-bit device address on the radio link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub u16);

impl Address {
    /// Client / broadcast address.
    pub const BROADCAST: Self = Self(0xFFFF);

    /// Production (factory) address, only seen during provisioning.
    pub const PRODUCTION: Self = Self(0x0000);

    const METER_MIN: u16 = 0x0001;
    const METER_MAX: u16 = 0xFDE8;
    const SPECIAL_MIN: u16 = 0xFFDB;
    const SPECIAL_MAX: u16 = 0xFFFE;

    pub fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    /// True for addresses assigned to individual meters.
    pub fn is_meter(self) -> bool {
        (Self::METER_MIN..=Self::METER_MAX).contains(&self.0)
    }

    /// True for the reserved special range.
    pub fn is_special(self) -> bool {
        (Self::SPECIAL_MIN..=Self::SPECIAL_MAX).contains(&self.0)
    }

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    pub fn is_production(self) -> bool {
        self == Self::PRODUCTION
    }

    /// True if the address falls in any recognized range.
    pub fn is_recognized(self) -> bool {
        self.is_meter() || self.is_special() || self.is_broadcast()
    }
}

impl From<u16> for Address {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Meter hardware generation. Selects which payload encoding applies for the
/// generation-dependent commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// First-generation boards. No energy-type selector, 26-byte status.
    Old,
    /// Transition boards: extended status, 16-bit instant powers.
    Transition,
    /// Current boards: extended status, 24-bit instant powers and currents.
    New,
}

impl Generation {
    const OLD_BOARDS: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x0C, 0x0D, 0x11, 0x12];
    const TRANSITION_BOARDS: [u8; 4] = [0x07, 0x08, 0x0A, 0x0B];
    const NEW_BOARDS: [u8; 7] = [0x09, 0x0E, 0x0F, 0x10, 0x20, 0x21, 0x22];

    /// Classify a device from its board id and role byte. Returns `None` for
    /// combinations outside the published tables.
    pub fn detect(board_id: u8, role: u8) -> Option<Self> {
        if Self::OLD_BOARDS.contains(&board_id) {
            return Some(Self::Old);
        }
        if role >= ROLE_GENERATION_THRESHOLD {
            if Self::TRANSITION_BOARDS.contains(&board_id) {
                return Some(Self::Transition);
            }
            if Self::NEW_BOARDS.contains(&board_id) {
                return Some(Self::New);
            }
        }
        None
    }

    /// Board id the server fixtures report for this generation.
    pub fn representative_board_id(self) -> u8 {
        match self {
            Self::Old => 0x01,
            Self::Transition => 0x07,
            Self::New => 0x09,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => write!(f, "old"),
            Self::Transition => write!(f, "transition"),
            Self::New => write!(f, "new"),
        }
    }
}

/// Energy register selector for the status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EnergyType {
    ActiveForward = 0x00,
    ActiveReverse = 0x01,
    ReactiveForward = 0x02,
    ReactiveReverse = 0x03,
    ActiveAbsolute = 0x04,
    ReactiveAbsolute = 0x05,
    /// Per-quadrant reactive registers exist on new-generation boards only.
    ReactiveQ1 = 0x06,
    ReactiveQ2 = 0x07,
    ReactiveQ3 = 0x08,
    ReactiveQ4 = 0x09,
}

impl EnergyType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0x00 => Ok(Self::ActiveForward),
            0x01 => Ok(Self::ActiveReverse),
            0x02 => Ok(Self::ReactiveForward),
            0x03 => Ok(Self::ReactiveReverse),
            0x04 => Ok(Self::ActiveAbsolute),
            0x05 => Ok(Self::ReactiveAbsolute),
            0x06 => Ok(Self::ReactiveQ1),
            0x07 => Ok(Self::ReactiveQ2),
            0x08 => Ok(Self::ReactiveQ3),
            0x09 => Ok(Self::ReactiveQ4),
            _ => Err(DecodeError::UnknownCode {
                what: "energy type",
                code,
            }),
        }
    }
}

impl fmt::Display for EnergyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ActiveForward => "ActiveForward",
            Self::ActiveReverse => "ActiveReverse",
            Self::ReactiveForward => "ReactiveForward",
            Self::ReactiveReverse => "ReactiveReverse",
            Self::ActiveAbsolute => "ActiveAbsolute",
            Self::ReactiveAbsolute => "ReactiveAbsolute",
            Self::ReactiveQ1 => "ReactiveQ1",
            Self::ReactiveQ2 => "ReactiveQ2",
            Self::ReactiveQ3 => "ReactiveQ3",
            Self::ReactiveQ4 => "ReactiveQ4",
        };
        write!(f, "{name}")
    }
}

/// Parameter group selector for the instant-value command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParameterGroup {
    /// Voltages, currents, powers, frequency, cos phi.
    Basic = 0x00,
    /// Phase angles, per-phase power, temperature.
    PhaseAngles = 0x10,
    /// Time, angles, per-phase power, frequency.
    TimeAngles = 0x11,
    /// Total power plus basic values.
    TotalPower = 0x12,
}

impl ParameterGroup {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0x00 => Ok(Self::Basic),
            0x10 => Ok(Self::PhaseAngles),
            0x11 => Ok(Self::TimeAngles),
            0x12 => Ok(Self::TotalPower),
            _ => Err(DecodeError::UnknownCode {
                what: "parameter group",
                code,
            }),
        }
    }
}

/// Meter configuration byte carried in status responses.
///
/// Bits 0-1 decimal point, 2-3 active tariff, 4-5 display digits,
/// 6-7 enabled tariffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigByte {
    pub decimal_point: u8,
    pub active_tariff: u8,
    display_digits: u8,
    enabled_tariffs: u8,
}

impl ConfigByte {
    pub fn from_byte(value: u8) -> Self {
        Self {
            decimal_point: value & 0x03,
            active_tariff: (value >> 2) & 0x03,
            display_digits: (value >> 4) & 0x03,
            enabled_tariffs: (value >> 6) & 0x03,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.enabled_tariffs << 6)
            | (self.display_digits << 4)
            | (self.active_tariff << 2)
            | self.decimal_point
    }

    /// Display width in digits (wire encoding 0..=3 maps to 6/7/8/8).
    pub fn display_digits(self) -> u8 {
        match self.display_digits {
            0 => 6,
            1 => 7,
            _ => 8,
        }
    }

    /// Number of enabled tariffs (wire encoding 0..=3 maps to 1..=4).
    pub fn enabled_tariffs(self) -> u8 {
        self.enabled_tariffs + 1
    }
}

/// Command payload buffer: a protocol-maximum stack array with an explicit
/// length, so the hot path never allocates.
#[derive(Clone, Copy)]
pub struct Payload {
    bytes: [u8; MAX_PAYLOAD_SIZE],
    len: u8,
}

impl Payload {
    pub const EMPTY: Self = Self {
        bytes: [0; MAX_PAYLOAD_SIZE],
        len: 0,
    };

    /// Copy a slice into a payload. Fails if the slice exceeds the protocol
    /// maximum of 31 bytes.
    pub fn copy_from(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(DecodeError::PayloadLength {
                len: data.len(),
                min: 0,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let mut bytes = [0; MAX_PAYLOAD_SIZE];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self {
            bytes,
            len: data.len() as u8,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({:02x?})", self.as_slice())
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Raw frame buffer sized to the protocol maximum of 64 stuffed bytes.
#[derive(Clone, Copy)]
pub struct FrameBuf {
    bytes: [u8; MAX_FRAME_SIZE],
    len: u8,
}

impl FrameBuf {
    pub(crate) fn from_parts(bytes: [u8; MAX_FRAME_SIZE], len: usize) -> Self {
        debug_assert!(len <= MAX_FRAME_SIZE);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for FrameBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameBuf({:02x?})", self.as_slice())
    }
}

impl AsRef<[u8]> for FrameBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_classes() {
        assert!(Address::new(0x0001).is_meter());
        assert!(Address::new(0xFDE8).is_meter());
        assert!(!Address::new(0xFDE9).is_meter());
        assert!(Address::new(0xFFDB).is_special());
        assert!(Address::new(0xFFFE).is_special());
        assert!(Address::BROADCAST.is_broadcast());
        assert!(Address::PRODUCTION.is_production());
        assert!(!Address::new(0xFE00).is_recognized());
    }

    #[test]
    fn generation_table() {
        for id in [0x01, 0x02, 0x03, 0x04, 0x0C, 0x0D, 0x11, 0x12] {
            // Old boards classify regardless of role.
            assert_eq!(Generation::detect(id, 0x00), Some(Generation::Old));
            assert_eq!(Generation::detect(id, 0x32), Some(Generation::Old));
        }
        for id in [0x07, 0x08, 0x0A, 0x0B] {
            assert_eq!(Generation::detect(id, 0x32), Some(Generation::Transition));
            assert_eq!(Generation::detect(id, 0x31), None);
        }
        for id in [0x09, 0x0E, 0x0F, 0x10, 0x20, 0x21, 0x22] {
            assert_eq!(Generation::detect(id, 0x50), Some(Generation::New));
            assert_eq!(Generation::detect(id, 0x00), None);
        }
        assert_eq!(Generation::detect(0x55, 0x32), None);
    }

    #[test]
    fn config_byte_round_trip() {
        let cfg = ConfigByte::from_byte(0b11_10_01_11);
        assert_eq!(cfg.decimal_point, 3);
        assert_eq!(cfg.active_tariff, 1);
        assert_eq!(cfg.display_digits(), 8);
        assert_eq!(cfg.enabled_tariffs(), 4);
        assert_eq!(cfg.to_byte(), 0b11_10_01_11);
    }

    #[test]
    fn payload_bounds() {
        assert!(Payload::copy_from(&[0u8; 31]).is_ok());
        assert!(Payload::copy_from(&[0u8; 32]).is_err());
        let p = Payload::copy_from(&[1, 2, 3]).unwrap();
        assert_eq!(p.as_slice(), &[1, 2, 3]);
        assert_eq!(p.len(), 3);
    }
}
