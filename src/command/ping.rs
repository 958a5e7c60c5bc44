//! Ping command (0x01): communication check, identical on every generation.

use crate::error::{ConfigError, DecodeError};
use crate::protocol::wire;
use crate::types::{Address, Generation};

use super::{codes, Command};

/// Ping request. Carries no payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ping;

/// Ping response: firmware version and the address the device answers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResponse {
    pub firmware_version: u16,
    pub device_address: Address,
}

impl PingResponse {
    pub const WIRE_SIZE: usize = 4;

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::WIRE_SIZE {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: Self::WIRE_SIZE,
                max: Self::WIRE_SIZE,
            });
        }
        Ok(Self {
            firmware_version: wire::read_u16(payload, 0),
            device_address: Address::new(wire::read_u16(payload, 2)),
        })
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        wire::write_u16(out, 0, self.firmware_version);
        wire::write_u16(out, 2, self.device_address.raw());
        Self::WIRE_SIZE
    }
}

impl Command for Ping {
    type Response = PingResponse;

    fn code(&self) -> u8 {
        codes::PING
    }

    fn encode_request(&self, _out: &mut [u8]) -> Result<usize, ConfigError> {
        Ok(0)
    }

    fn decode_response(&self, payload: &[u8]) -> Result<Self::Response, DecodeError> {
        PingResponse::decode(payload)
    }

    fn supported_for(&self, _generation: Generation) -> bool {
        true
    }

    fn min_request_size(&self) -> usize {
        0
    }

    fn response_size_range(&self) -> (usize, usize) {
        (PingResponse::WIRE_SIZE, PingResponse::WIRE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_wire_layout() {
        // firmware 0x0100, address 0x0001 -> 00 01 01 00 little-endian
        let response = PingResponse {
            firmware_version: 0x0100,
            device_address: Address::new(0x0001),
        };
        let mut buf = [0u8; 4];
        assert_eq!(response.encode(&mut buf), 4);
        assert_eq!(buf, [0x00, 0x01, 0x01, 0x00]);
        assert_eq!(PingResponse::decode(&buf).unwrap(), response);
    }

    #[test]
    fn short_response_rejected() {
        assert!(PingResponse::decode(&[0x00, 0x01]).is_err());
    }
}
