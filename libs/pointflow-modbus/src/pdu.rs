//! PDU buffer, reader and exception codes
//!
//! The buffer is a fixed stack array sized to the largest legal PDU.

use std::fmt;

use crate::constants::{self, MAX_PDU_SIZE};
use crate::error::{ModbusError, Result};

/// Exception code carried by a negative response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    NegativeAcknowledge,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailed,
    /// Reserved code 0x00 and anything outside the standard table
    Unknown,
}

impl ExceptionCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x07 => Self::NegativeAcknowledge,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetFailed,
            _ => Self::Unknown,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::ServerDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::ServerDeviceBusy => 0x06,
            Self::NegativeAcknowledge => 0x07,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathUnavailable => 0x0A,
            Self::GatewayTargetFailed => 0x0B,
            Self::Unknown => 0x00,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::ServerDeviceFailure => "Server Device Failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server Device Busy",
            Self::NegativeAcknowledge => "Negative Acknowledge",
            Self::MemoryParityError => "Memory Parity Error",
            Self::GatewayPathUnavailable => "Gateway Path Unavailable",
            Self::GatewayTargetFailed => "Gateway Target Device Failed to Respond",
            Self::Unknown => "Unknown Exception",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:02X})", self.description(), self.code())
    }
}

/// Human-readable function code description, exception bit ignored
pub fn function_code_description(fc: u8) -> &'static str {
    match fc & !constants::EXCEPTION_FLAG {
        constants::FC_READ_COILS => "Read Coils",
        constants::FC_READ_DISCRETE_INPUTS => "Read Discrete Inputs",
        constants::FC_READ_HOLDING_REGISTERS => "Read Holding Registers",
        constants::FC_READ_INPUT_REGISTERS => "Read Input Registers",
        constants::FC_WRITE_SINGLE_COIL => "Write Single Coil",
        constants::FC_WRITE_SINGLE_REGISTER => "Write Single Register",
        constants::FC_WRITE_MULTIPLE_COILS => "Write Multiple Coils",
        constants::FC_WRITE_MULTIPLE_REGISTERS => "Write Multiple Registers",
        constants::FC_MASK_WRITE_REGISTER => "Mask Write Register",
        constants::FC_READ_WRITE_MULTIPLE_REGISTERS => "Read/Write Multiple Registers",
        _ => "Unknown Function",
    }
}

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    #[inline]
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let mut pdu = Self::new();
        pdu.extend(data)?;
        Ok(pdu)
    }

    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ModbusError::malformed("PDU buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> Result<()> {
        self.extend(&value.to_be_bytes())
    }

    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        if self.len + data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::malformed(format!(
                "PDU would exceed max size: {} + {} > {}",
                self.len,
                data.len(),
                MAX_PDU_SIZE
            )));
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .is_some_and(|fc| fc & constants::EXCEPTION_FLAG != 0)
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// Big-endian cursor over received PDU bytes
pub struct PduReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PduReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos + count;
        if end > self.data.len() {
            return Err(ModbusError::truncated(format!(
                "need {} byte(s) at offset {}, have {}",
                count,
                self.pos,
                self.data.len()
            )));
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Pack bits LSB first, as coils travel on the wire
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, _) in bits.iter().enumerate().filter(|(_, on)| **on) {
        bytes[i / 8] |= 1 << (i % 8);
    }
    bytes
}

pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count.min(bytes.len() * 8))
        .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}
