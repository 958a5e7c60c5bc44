//! Command catalog: per-command request/response types and the shared
//! command surface used by the client transactor and the server dispatcher.
//!
//! Commands with generation-dependent wire encodings carry their
//! [`Generation`] and decode into tagged variants, one per encoding family,
//! so a caller can never read a field the wire never carried.

mod date_time;
mod info;
mod instant;
mod ping;
mod status;

pub use date_time::{DateTime, ReadDateTime};
pub use info::{DeviceInfo, GetInfo, InfoResponse, NewDeviceInfo};
pub use instant::{InstantResponse, NewInstant, ReadInstantValue, TransitionInstant};
pub use ping::{Ping, PingResponse};
pub use status::{ExtendedStatus, OldStatus, ReadStatus, StatusResponse};

use crate::error::{ConfigError, DecodeError};
use crate::types::Generation;

/// Command codes understood by the built-in catalog. Any other code is the
/// host's business via a registered server handler.
pub mod codes {
    pub const PING: u8 = 0x01;
    pub const READ_STATUS: u8 = 0x05;
    pub const READ_DATE_TIME: u8 = 0x1C;
    pub const READ_INSTANT_VALUE: u8 = 0x2B;
    pub const GET_INFO: u8 = 0x30;
}

/// Human-readable command name for logs.
pub fn command_name(code: u8) -> &'static str {
    match code {
        codes::PING => "Ping",
        codes::READ_STATUS => "ReadStatus",
        codes::READ_DATE_TIME => "ReadDateTime",
        codes::READ_INSTANT_VALUE => "ReadInstantValue",
        codes::GET_INFO => "GetInfo",
        _ => "Unknown",
    }
}

/// The shared surface every protocol command exposes.
pub trait Command {
    /// Typed result the client hands back after a successful transaction.
    type Response;

    /// Wire command code.
    fn code(&self) -> u8;

    /// Serialize the request payload into `out`, returning its length.
    fn encode_request(&self, out: &mut [u8]) -> Result<usize, ConfigError>;

    /// Parse a response payload into the typed result.
    fn decode_response(&self, payload: &[u8]) -> Result<Self::Response, DecodeError>;

    /// Whether the command exists on the given device generation.
    fn supported_for(&self, generation: Generation) -> bool;

    /// Minimum request payload length the server will accept.
    fn min_request_size(&self) -> usize;

    /// Inclusive (min, max) response payload length.
    fn response_size_range(&self) -> (usize, usize);

    /// Whether the device checks the password word for this command.
    fn requires_password(&self) -> bool {
        false
    }

    /// Validate a response payload length against
    /// [`response_size_range`](Command::response_size_range).
    fn check_response_size(&self, len: usize) -> Result<(), DecodeError> {
        let (min, max) = self.response_size_range();
        if len < min || len > max {
            return Err(DecodeError::PayloadLength { len, min, max });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnergyType, ParameterGroup};

    #[test]
    fn generation_support_table() {
        let generations = [Generation::Old, Generation::Transition, Generation::New];
        for generation in generations {
            assert!(Ping.supported_for(generation));
            assert!(ReadDateTime.supported_for(generation));
            assert!(GetInfo::new().supported_for(generation));
            assert!(ReadStatus::new(generation, EnergyType::ActiveForward)
                .supported_for(generation));

            let instant = ReadInstantValue::new(generation, ParameterGroup::Basic);
            assert_eq!(
                instant.supported_for(generation),
                generation != Generation::Old
            );
        }
    }

    #[test]
    fn command_codes_and_names() {
        assert_eq!(Ping.code(), 0x01);
        assert_eq!(
            ReadStatus::new(Generation::New, EnergyType::ActiveForward).code(),
            0x05
        );
        assert_eq!(ReadDateTime.code(), 0x1C);
        assert_eq!(
            ReadInstantValue::new(Generation::New, ParameterGroup::Basic).code(),
            0x2B
        );
        assert_eq!(GetInfo::new().code(), 0x30);

        assert_eq!(command_name(0x01), "Ping");
        assert_eq!(command_name(0xEE), "Unknown");
    }

    #[test]
    fn response_size_ranges_track_generation() {
        assert_eq!(Ping.response_size_range(), (4, 4));
        assert_eq!(ReadDateTime.response_size_range(), (7, 7));
        assert_eq!(GetInfo::new().response_size_range(), (27, 31));
        assert_eq!(
            ReadStatus::new(Generation::Old, EnergyType::ActiveForward).response_size_range(),
            (26, 26)
        );
        assert_eq!(
            ReadStatus::new(Generation::New, EnergyType::ActiveForward).response_size_range(),
            (30, 31)
        );
        assert_eq!(
            ReadInstantValue::new(Generation::Transition, ParameterGroup::Basic)
                .response_size_range(),
            (25, 28)
        );
        assert_eq!(
            ReadInstantValue::new(Generation::New, ParameterGroup::Basic).response_size_range(),
            (30, 30)
        );
    }
}
