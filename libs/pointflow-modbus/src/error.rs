//! Error types for pointflow-modbus
//!
//! Structural damage to a frame is a [`ModbusError`] and aborts the
//! transaction. Problems a server can answer on the wire are carried as an
//! [`ExceptionCode`](crate::pdu::ExceptionCode) instead.

use thiserror::Error;

use crate::register::Table;

#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("Frame truncated: {0}")]
    Truncated(String),

    #[error("Invalid protocol ID: expected 0, got {0}")]
    ProtocolId(u16),

    #[error("Length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Byte count mismatch: expected {expected}, got {actual}")]
    ByteCount { expected: usize, actual: usize },

    #[error("CRC mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    Crc { expected: u16, actual: u16 },

    #[error("Unknown function code: {0:02X}")]
    UnknownFunction(u8),

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Echo mismatch: {0}")]
    EchoMismatch(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Registers overlap in {table} at address {address}")]
    Overlap { table: Table, address: u16 },

    #[error("Unknown point: {0}")]
    UnknownPoint(String),

    #[error("Register error: {0}")]
    Register(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModbusError {
    pub fn truncated(msg: impl Into<String>) -> Self {
        Self::Truncated(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn echo_mismatch(msg: impl Into<String>) -> Self {
        Self::EchoMismatch(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::UnexpectedResponse(msg.into())
    }

    pub fn register(msg: impl Into<String>) -> Self {
        Self::Register(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ModbusError>;
