//! Modbus protocol constants

// ============================================================================
// Frame sizes
// ============================================================================

/// MBAP header without the unit id: transaction id, protocol id and length
pub const MBAP_HEADER_LEN: usize = 6;

/// RS485 ADU (256) minus slave address and CRC
pub const MAX_PDU_SIZE: usize = 253;

/// Largest MBAP length field: unit id plus PDU
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Unit id plus CRC around an RTU PDU
pub const RTU_OVERHEAD: usize = 3;

// ============================================================================
// Quantity limits
// ============================================================================

pub const MAX_READ_BITS: u16 = 2000;
pub const MAX_READ_WORDS: u16 = 125;
pub const MAX_WRITE_BITS: u16 = 1968;
pub const MAX_WRITE_WORDS: u16 = 123;

/// Read side of FC17
pub const MAX_READ_WRITE_READ_WORDS: u16 = 125;
/// Write side of FC17
pub const MAX_READ_WRITE_WRITE_WORDS: u16 = 121;

// ============================================================================
// Function codes
// ============================================================================

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
pub const FC_MASK_WRITE_REGISTER: u8 = 0x16;
pub const FC_READ_WRITE_MULTIPLE_REGISTERS: u8 = 0x17;

/// High bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Wire value of a coil switched on
pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;
