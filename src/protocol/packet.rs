//! Packet structure, serialization and parsing.

use crate::error::FrameError;
use crate::types::{Address, FrameBuf, Payload, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE};

use super::wire;
use super::{HEADER_SIZE, RESERVE, START1, START2, STOP};

/// Packet direction, bit 5 of the params byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to meter.
    Request,
    /// Meter to client.
    Response,
}

impl Direction {
    fn bit(self) -> u8 {
        match self {
            Self::Request => 1,
            Self::Response => 0,
        }
    }

    fn from_bit(bit: u8) -> Self {
        if bit & 0x01 == 1 {
            Self::Request
        } else {
            Self::Response
        }
    }
}

/// A structured, un-stuffed packet: header fields plus command payload.
///
/// Packets are transient. The transactor and the dispatcher each build one,
/// serialize it once and drop it; no pooling, no interior mutability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Payload is XOR-scrambled on the wire (bit 7 of params).
    pub encoded: bool,
    /// Complex-device flag (bit 6 of params). Zero for simple devices.
    pub complex_version: bool,
    pub direction: Direction,
    pub dest: Address,
    pub src: Address,
    pub command: u8,
    /// Password on requests, device status word on responses.
    pub auth: u32,
    pub payload: Payload,
}

/// Largest possible un-stuffed packet: header, full payload and CRC.
const MAX_UNSTUFFED: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE + 1;

impl Packet {
    /// Build a request packet the way the client transactor does: plain
    /// encoding, simple-device version, the caller's password in the auth
    /// word.
    pub fn request(
        command: u8,
        dest: Address,
        src: Address,
        password: u32,
        payload: Payload,
    ) -> Self {
        Self {
            encoded: false,
            complex_version: false,
            direction: Direction::Request,
            dest,
            src,
            command,
            auth: password,
            payload,
        }
    }

    /// Build the response to `request`: addresses swapped, command echoed,
    /// version and encoding flags copied, the server status in the auth word.
    pub fn response_to(request: &Packet, status: u32, payload: Payload) -> Self {
        Self {
            encoded: request.encoded,
            complex_version: request.complex_version,
            direction: Direction::Response,
            dest: request.src,
            src: request.dest,
            command: request.command,
            auth: status,
            payload,
        }
    }

    pub fn is_request(&self) -> bool {
        self.direction == Direction::Request
    }

    pub fn is_response(&self) -> bool {
        self.direction == Direction::Response
    }

    fn params_byte(&self) -> u8 {
        ((self.encoded as u8) << 7)
            | ((self.complex_version as u8) << 6)
            | (self.direction.bit() << 5)
            | self.payload.len() as u8
    }

    /// Serialize to a framed, stuffed wire frame.
    pub fn pack(&self) -> Result<FrameBuf, FrameError> {
        self.pack_scrambled(None)
    }

    /// Serialize, scrambling the payload when the encoded flag is set and a
    /// key is supplied. Without a key the payload is emitted untouched; the
    /// flag still travels in the params byte.
    pub fn pack_scrambled(&self, key: Option<u8>) -> Result<FrameBuf, FrameError> {
        let mut unstuffed = [0u8; MAX_UNSTUFFED];
        let n = self.payload.len();

        unstuffed[0] = self.params_byte();
        unstuffed[1] = RESERVE;
        wire::write_u16(&mut unstuffed, 2, self.dest.raw());
        wire::write_u16(&mut unstuffed, 4, self.src.raw());
        unstuffed[6] = self.command;
        wire::write_u32(&mut unstuffed, 7, self.auth);
        unstuffed[HEADER_SIZE..HEADER_SIZE + n].copy_from_slice(self.payload.as_slice());

        if self.encoded {
            if let Some(key) = key {
                wire::xor_scramble(&mut unstuffed[HEADER_SIZE..HEADER_SIZE + n], key);
            }
        }

        let body_len = HEADER_SIZE + n;
        unstuffed[body_len] = wire::crc8(&unstuffed[..body_len]);

        // Worst case every body byte escapes to two.
        let mut stuffed = [0u8; MAX_UNSTUFFED * 2];
        let stuffed_len = wire::stuff(&unstuffed[..body_len + 1], &mut stuffed)?;
        if stuffed_len + 3 > MAX_FRAME_SIZE {
            return Err(FrameError::Overflow {
                max: MAX_FRAME_SIZE,
            });
        }

        let mut raw = [0u8; MAX_FRAME_SIZE];
        raw[0] = START1;
        raw[1] = START2;
        raw[2..2 + stuffed_len].copy_from_slice(&stuffed[..stuffed_len]);
        raw[2 + stuffed_len] = STOP;
        Ok(FrameBuf::from_parts(raw, stuffed_len + 3))
    }

    /// Parse a raw wire frame back into a packet.
    pub fn unpack(raw: &[u8]) -> Result<Self, FrameError> {
        Self::unpack_scrambled(raw, None)
    }

    /// Parse, descrambling the payload when the encoded flag is set and a
    /// key is supplied.
    pub fn unpack_scrambled(raw: &[u8], key: Option<u8>) -> Result<Self, FrameError> {
        let len = raw.len();
        if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&len) {
            return Err(FrameError::LengthOutOfBounds {
                len,
                min: MIN_FRAME_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }
        if raw[0] != START1 || raw[1] != START2 || raw[len - 1] != STOP {
            return Err(FrameError::Framing);
        }

        let mut unstuffed = [0u8; MAX_FRAME_SIZE];
        let unstuffed_len = wire::unstuff(&raw[2..len - 1], &mut unstuffed)?;
        if unstuffed_len < HEADER_SIZE + 1 {
            return Err(FrameError::Truncated {
                got: unstuffed_len,
                need: HEADER_SIZE + 1,
            });
        }

        let params = unstuffed[0];
        let data_len = (params & 0x1F) as usize;
        if HEADER_SIZE + data_len + 1 > unstuffed_len {
            return Err(FrameError::Truncated {
                got: unstuffed_len,
                need: HEADER_SIZE + data_len + 1,
            });
        }

        let body_len = HEADER_SIZE + data_len;
        let computed = wire::crc8(&unstuffed[..body_len]);
        let found = unstuffed[body_len];
        if computed != found {
            return Err(FrameError::Crc { computed, found });
        }

        let encoded = params & 0x80 != 0;
        let mut payload = Payload::copy_from(&unstuffed[HEADER_SIZE..body_len])
            .expect("payload length is masked to five bits");
        if encoded {
            if let Some(key) = key {
                wire::xor_scramble(payload.as_mut_slice(), key);
            }
        }

        Ok(Self {
            encoded,
            complex_version: params & 0x40 != 0,
            direction: Direction::from_bit(params >> 5),
            dest: Address::new(wire::read_u16(&unstuffed, 2)),
            src: Address::new(wire::read_u16(&unstuffed, 4)),
            command: unstuffed[6],
            auth: wire::read_u32(&unstuffed, 7),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> Packet {
        Packet::request(
            0x01,
            Address::new(0x0001),
            Address::BROADCAST,
            0,
            Payload::EMPTY,
        )
    }

    #[test]
    fn params_byte_layout() {
        let mut packet = sample_request();
        assert_eq!(packet.params_byte(), 0x20);

        packet.payload = Payload::copy_from(&[0u8; 4]).unwrap();
        packet.direction = Direction::Response;
        assert_eq!(packet.params_byte(), 0x04);

        packet.encoded = true;
        packet.complex_version = true;
        assert_eq!(packet.params_byte(), 0xC4);
    }

    #[test]
    fn pack_unpack_round_trip() {
        let mut packet = sample_request();
        packet.payload = Payload::copy_from(&[0xAA, 0xBB, 0xCC]).unwrap();
        let frame = packet.pack().unwrap();
        let decoded = Packet::unpack(frame.as_slice()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn response_swaps_addresses() {
        let request = Packet::request(
            0x30,
            Address::new(0x0042),
            Address::BROADCAST,
            0x1234,
            Payload::EMPTY,
        );
        let response = Packet::response_to(&request, 0xDEAD_BEEF, Payload::EMPTY);
        assert_eq!(response.dest, request.src);
        assert_eq!(response.src, request.dest);
        assert_eq!(response.command, request.command);
        assert_eq!(response.auth, 0xDEAD_BEEF);
        assert!(response.is_response());
    }

    #[test]
    fn unpack_rejects_bad_framing() {
        let frame = sample_request().pack().unwrap();
        let mut raw = frame.as_slice().to_vec();
        raw[0] = 0x00;
        assert_eq!(Packet::unpack(&raw), Err(FrameError::Framing));
    }

    #[test]
    fn unpack_rejects_short_and_long_frames() {
        assert!(matches!(
            Packet::unpack(&[0x73, 0x55, 0x00, 0x55]),
            Err(FrameError::LengthOutOfBounds { .. })
        ));
        let long = [0u8; 65];
        assert!(matches!(
            Packet::unpack(&long),
            Err(FrameError::LengthOutOfBounds { .. })
        ));
    }

    #[test]
    fn scrambled_payload_round_trips_with_key() {
        let mut packet = sample_request();
        packet.encoded = true;
        packet.payload = Payload::copy_from(&[0x10, 0x20, 0x30]).unwrap();

        let frame = packet.pack_scrambled(Some(0x7F)).unwrap();
        let decoded = Packet::unpack_scrambled(frame.as_slice(), Some(0x7F)).unwrap();
        assert_eq!(decoded.payload.as_slice(), &[0x10, 0x20, 0x30]);
        assert!(decoded.encoded);

        // Without the key the scrambled bytes arrive as-is, flag intact.
        let opaque = Packet::unpack(frame.as_slice()).unwrap();
        assert!(opaque.encoded);
        assert_ne!(opaque.payload.as_slice(), &[0x10, 0x20, 0x30]);
    }

    #[test]
    fn clear_flag_never_touches_payload() {
        let mut packet = sample_request();
        packet.payload = Payload::copy_from(&[0x10, 0x20, 0x30]).unwrap();
        let frame = packet.pack_scrambled(Some(0x7F)).unwrap();
        let decoded = Packet::unpack_scrambled(frame.as_slice(), Some(0x7F)).unwrap();
        assert_eq!(decoded.payload.as_slice(), &[0x10, 0x20, 0x30]);
    }
}
