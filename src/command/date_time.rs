//! ReadDateTime command (0x1C): device calendar clock, identical on every
//! generation.

use std::fmt;

use crate::error::{ConfigError, DecodeError};
use crate::types::Generation;

use super::{codes, Command};

/// ReadDateTime request. Carries no payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadDateTime;

/// Device calendar time. Seven unsigned bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub day: u8,
    pub month: u8,
    /// Two-digit year, 0..=99.
    pub year: u8,
}

impl DateTime {
    pub const WIRE_SIZE: usize = 7;

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != Self::WIRE_SIZE {
            return Err(DecodeError::PayloadLength {
                len: payload.len(),
                min: Self::WIRE_SIZE,
                max: Self::WIRE_SIZE,
            });
        }
        let value = Self {
            seconds: payload[0],
            minutes: payload[1],
            hours: payload[2],
            day_of_week: payload[3],
            day: payload[4],
            month: payload[5],
            year: payload[6],
        };
        value.validate()?;
        Ok(value)
    }

    pub fn encode(&self, out: &mut [u8]) -> usize {
        out[0] = self.seconds;
        out[1] = self.minutes;
        out[2] = self.hours;
        out[3] = self.day_of_week;
        out[4] = self.day;
        out[5] = self.month;
        out[6] = self.year;
        Self::WIRE_SIZE
    }

    fn validate(&self) -> Result<(), DecodeError> {
        let check = |field, value: u8, min: u8, max: u8| {
            if value < min || value > max {
                Err(DecodeError::FieldRange {
                    field,
                    value: value as u32,
                })
            } else {
                Ok(())
            }
        };
        check("seconds", self.seconds, 0, 59)?;
        check("minutes", self.minutes, 0, 59)?;
        check("hours", self.hours, 0, 23)?;
        check("day_of_week", self.day_of_week, 0, 6)?;
        check("day", self.day, 1, 31)?;
        check("month", self.month, 1, 12)?;
        check("year", self.year, 0, 99)
    }

    pub fn day_of_week_name(&self) -> &'static str {
        match self.day_of_week {
            0 => "Sunday",
            1 => "Monday",
            2 => "Tuesday",
            3 => "Wednesday",
            4 => "Thursday",
            5 => "Friday",
            6 => "Saturday",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}.{:02}.{:02} {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hours, self.minutes, self.seconds
        )
    }
}

impl Command for ReadDateTime {
    type Response = DateTime;

    fn code(&self) -> u8 {
        codes::READ_DATE_TIME
    }

    fn encode_request(&self, _out: &mut [u8]) -> Result<usize, ConfigError> {
        Ok(0)
    }

    fn decode_response(&self, payload: &[u8]) -> Result<Self::Response, DecodeError> {
        DateTime::decode(payload)
    }

    fn supported_for(&self, _generation: Generation) -> bool {
        true
    }

    fn min_request_size(&self) -> usize {
        0
    }

    fn response_size_range(&self) -> (usize, usize) {
        (DateTime::WIRE_SIZE, DateTime::WIRE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuesday_afternoon() -> DateTime {
        DateTime {
            seconds: 30,
            minutes: 45,
            hours: 14,
            day_of_week: 2,
            day: 27,
            month: 5,
            year: 25,
        }
    }

    #[test]
    fn round_trip() {
        let mut buf = [0u8; 7];
        tuesday_afternoon().encode(&mut buf);
        assert_eq!(DateTime::decode(&buf).unwrap(), tuesday_afternoon());
    }

    #[test]
    fn out_of_range_fields_rejected() {
        let mut buf = [0u8; 7];
        tuesday_afternoon().encode(&mut buf);

        let mut bad = buf;
        bad[0] = 60;
        assert!(matches!(
            DateTime::decode(&bad),
            Err(DecodeError::FieldRange { field: "seconds", .. })
        ));

        let mut bad = buf;
        bad[4] = 0; // day zero is out of contract
        assert!(DateTime::decode(&bad).is_err());

        let mut bad = buf;
        bad[5] = 13;
        assert!(DateTime::decode(&bad).is_err());
    }

    #[test]
    fn display_format() {
        assert_eq!(tuesday_afternoon().to_string(), "27.05.25 14:45:30");
        assert_eq!(tuesday_afternoon().day_of_week_name(), "Tuesday");
    }
}
