//! Wire protocol for the meter radio link.
//!
//! Defines the packet format, CRC, byte stuffing and (de)serialization.
//!
//! ## Packet Format
//!
//! Un-stuffed layout between the framing bytes:
//!
//! ```text
//! ┌────────────┬─────────────┬───────────┬──────────┬─────────────┐
//! │ Params (1) │ Reserve (1) │ Dest (2)  │ Src (2)  │ Command (1) │
//! ├────────────┴─────────────┴───────────┴──────────┴─────────────┤
//! │ Password / Status (4)    │ Payload (0..31)      │ CRC-8 (1)   │
//! └──────────────────────────┴──────────────────────┴─────────────┘
//! ```
//!
//! Params byte: bit 7 encoded, bit 6 version, bit 5 direction (1 = request),
//! bits 4..0 payload length. All multi-byte fields little-endian.
//!
//! On the wire the body is byte-stuffed and wrapped as
//! `0x73 0x55 <stuffed body> 0x55`; a valid frame is 10..=64 bytes.

pub mod packet;
pub mod wire;

pub use packet::{Direction, Packet};
pub use wire::{crc8, stuff, unstuff, xor_scramble};

/// First start byte.
pub const START1: u8 = 0x73;

/// Second start byte.
pub const START2: u8 = 0x55;

/// Stop byte.
pub const STOP: u8 = 0x55;

/// Reserve header byte, always zero.
pub const RESERVE: u8 = 0x00;

/// Escape marker introducing a stuffed pair.
pub const STUFF_ESC_MARKER: u8 = 0x73;

/// Substitution for a body `0x55` (`0x73 0x11`).
pub const STUFF_STOP_SUB: u8 = 0x11;

/// Substitution for a body `0x73` (`0x73 0x22`).
pub const STUFF_ESC_MARKER_SUB: u8 = 0x22;

/// Un-stuffed header size: params, reserve, two addresses, command, auth.
pub const HEADER_SIZE: usize = 11;
