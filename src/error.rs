//! Error types for meterlink.

use thiserror::Error;

/// Result type alias for meterlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for meterlink.
#[derive(Error, Debug)]
pub enum Error {
    // Wire-level errors
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    // Transaction errors (client side)
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    // Dispatch errors (server side)
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    // Caller mistakes
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    // Radio adapter errors
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    // General errors (host handler failures and the like)
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Frame parsing and serialization errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad framing bytes")]
    Framing,

    #[error("invalid stuffing sequence")]
    Stuffing,

    #[error("frame length {len} out of bounds {min}..={max}")]
    LengthOutOfBounds { len: usize, min: usize, max: usize },

    #[error("frame truncated: {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },

    #[error("CRC mismatch: computed {computed:#04x}, frame carries {found:#04x}")]
    Crc { computed: u8, found: u8 },

    #[error("stuffed frame would exceed {max} bytes")]
    Overflow { max: usize },
}

/// Payload decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload length {len} outside expected range {min}..={max}")]
    PayloadLength { len: usize, min: usize, max: usize },

    #[error("field {field} out of range: {value}")]
    FieldRange { field: &'static str, value: u32 },

    #[error("unknown {what} code {code:#04x}")]
    UnknownCode { what: &'static str, code: u8 },
}

/// Request/response transaction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("no response before the receive deadline")]
    ReceiveTimeout,

    #[error("response field {0} does not match the request")]
    ResponseMismatch(&'static str),

    #[error("received packet is not a request")]
    NotARequest,

    #[error("received packet is not a response")]
    NotAResponse,
}

/// Server dispatch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no handler registered for command {0:#04x}")]
    NoHandler(u8),

    #[error("handler for command {0:#04x} rejected the request")]
    HandlerRejected(u8),

    #[error("request payload too short for command {command:#04x}: {len} < {min}")]
    RequestTooShort { command: u8, len: usize, min: usize },
}

/// Caller configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("command {command:#04x} is not supported by the {generation} generation")]
    UnsupportedForGeneration {
        command: u8,
        generation: crate::types::Generation,
    },

    #[error("request buffer too small: {len} < {need}")]
    RequestBufferTooSmall { len: usize, need: usize },

    #[error("response buffer too small: {len} < {need}")]
    ResponseBufferTooSmall { len: usize, need: usize },
}

/// Radio adapter errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("transmit failed: {0}")]
    TransmitFailed(&'static str),

    #[error("receive failed: {0}")]
    ReceiveFailed(&'static str),

    #[error("radio not ready")]
    NotReady,
}

impl Error {
    /// Check if the error means the peer simply never answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transaction(TransactionError::ReceiveTimeout))
    }

    /// Check if the error points at wire noise rather than peer behavior.
    pub fn is_wire_noise(&self) -> bool {
        matches!(self, Error::Frame(_))
    }
}
