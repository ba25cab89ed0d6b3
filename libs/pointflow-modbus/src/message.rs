//! Typed requests and responses
//!
//! ```text
//!   request PDU  ─decode─▶ Request + Option<ExceptionCode>   (server)
//!   Request      ─encode─▶ request PDU                        (client)
//!   response PDU ─decode─▶ Response                           (client)
//!   Response     ─encode─▶ response PDU                       (server)
//! ```
//!
//! Request decoding separates structural damage (an error) from values a
//! server answers with an exception response (a flag). Quantities out of
//! range and non-canonical coil values are flags.

use tracing::debug;

use crate::constants::*;
use crate::error::{ModbusError, Result};
use crate::pdu::{pack_bits, unpack_bits, ExceptionCode, ModbusPdu, PduReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadCoils {
        address: u16,
        quantity: u16,
    },
    ReadDiscreteInputs {
        address: u16,
        quantity: u16,
    },
    ReadHoldingRegisters {
        address: u16,
        quantity: u16,
    },
    ReadInputRegisters {
        address: u16,
        quantity: u16,
    },
    WriteSingleCoil {
        address: u16,
        value: bool,
    },
    WriteSingleRegister {
        address: u16,
        value: u16,
    },
    WriteMultipleCoils {
        address: u16,
        values: Vec<bool>,
    },
    WriteMultipleRegisters {
        address: u16,
        values: Vec<u16>,
    },
    MaskWriteRegister {
        address: u16,
        and_mask: u16,
        or_mask: u16,
    },
    ReadWriteMultipleRegisters {
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        values: Vec<u16>,
    },
    /// Function this codec does not implement, kept for the exception reply
    Unsupported {
        function: u8,
        data: Vec<u8>,
    },
}

/// Decoded request with the exception a server must answer it with, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    pub request: Request,
    pub exception: Option<ExceptionCode>,
    /// PDU bytes following the function code
    pub data_length: usize,
}

fn check_quantity(quantity: u16, max: u16, flag: &mut Option<ExceptionCode>) {
    if quantity == 0 || quantity > max {
        debug!("Quantity {} outside 1..={}", quantity, max);
        flag.get_or_insert(ExceptionCode::IllegalDataValue);
    }
}

fn read_words(reader: &mut PduReader<'_>, count: usize) -> Result<Vec<u16>> {
    (0..count).map(|_| reader.u16()).collect()
}

impl Request {
    pub fn function_code(&self) -> u8 {
        match self {
            Self::ReadCoils { .. } => FC_READ_COILS,
            Self::ReadDiscreteInputs { .. } => FC_READ_DISCRETE_INPUTS,
            Self::ReadHoldingRegisters { .. } => FC_READ_HOLDING_REGISTERS,
            Self::ReadInputRegisters { .. } => FC_READ_INPUT_REGISTERS,
            Self::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
            Self::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Self::WriteMultipleCoils { .. } => FC_WRITE_MULTIPLE_COILS,
            Self::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
            Self::MaskWriteRegister { .. } => FC_MASK_WRITE_REGISTER,
            Self::ReadWriteMultipleRegisters { .. } => FC_READ_WRITE_MULTIPLE_REGISTERS,
            Self::Unsupported { function, .. } => *function,
        }
    }

    pub fn encode(&self) -> Result<ModbusPdu> {
        let mut pdu = ModbusPdu::new();
        pdu.push(self.function_code())?;
        match self {
            Self::ReadCoils { address, quantity }
            | Self::ReadDiscreteInputs { address, quantity }
            | Self::ReadHoldingRegisters { address, quantity }
            | Self::ReadInputRegisters { address, quantity } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(*quantity)?;
            },
            Self::WriteSingleCoil { address, value } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(if *value { COIL_ON } else { COIL_OFF })?;
            },
            Self::WriteSingleRegister { address, value } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(*value)?;
            },
            Self::WriteMultipleCoils { address, values } => {
                let bytes = pack_bits(values);
                pdu.push_u16(*address)?;
                pdu.push_u16(values.len() as u16)?;
                pdu.push(bytes.len() as u8)?;
                pdu.extend(&bytes)?;
            },
            Self::WriteMultipleRegisters { address, values } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(values.len() as u16)?;
                pdu.push((values.len() * 2) as u8)?;
                for value in values {
                    pdu.push_u16(*value)?;
                }
            },
            Self::MaskWriteRegister {
                address,
                and_mask,
                or_mask,
            } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(*and_mask)?;
                pdu.push_u16(*or_mask)?;
            },
            Self::ReadWriteMultipleRegisters {
                read_address,
                read_quantity,
                write_address,
                values,
            } => {
                pdu.push_u16(*read_address)?;
                pdu.push_u16(*read_quantity)?;
                pdu.push_u16(*write_address)?;
                pdu.push_u16(values.len() as u16)?;
                pdu.push((values.len() * 2) as u8)?;
                for value in values {
                    pdu.push_u16(*value)?;
                }
            },
            Self::Unsupported { data, .. } => pdu.extend(data)?,
        }
        Ok(pdu)
    }

    /// Decode a request PDU, function code included
    pub fn decode(pdu: &[u8]) -> Result<DecodedRequest> {
        let (&function, data) = pdu
            .split_first()
            .ok_or_else(|| ModbusError::truncated("empty request PDU"))?;
        let mut reader = PduReader::new(data);
        let mut exception = None;

        let request = match function {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS => {
                let address = reader.u16()?;
                let quantity = reader.u16()?;
                check_quantity(quantity, MAX_READ_BITS, &mut exception);
                if function == FC_READ_COILS {
                    Self::ReadCoils { address, quantity }
                } else {
                    Self::ReadDiscreteInputs { address, quantity }
                }
            },
            FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => {
                let address = reader.u16()?;
                let quantity = reader.u16()?;
                check_quantity(quantity, MAX_READ_WORDS, &mut exception);
                if function == FC_READ_HOLDING_REGISTERS {
                    Self::ReadHoldingRegisters { address, quantity }
                } else {
                    Self::ReadInputRegisters { address, quantity }
                }
            },
            FC_WRITE_SINGLE_COIL => {
                let address = reader.u16()?;
                let raw = reader.u16()?;
                if raw != COIL_ON && raw != COIL_OFF {
                    debug!("Non-canonical coil value {:04X} at {}", raw, address);
                    exception = Some(ExceptionCode::IllegalDataValue);
                }
                Self::WriteSingleCoil {
                    address,
                    value: raw != 0,
                }
            },
            FC_WRITE_SINGLE_REGISTER => Self::WriteSingleRegister {
                address: reader.u16()?,
                value: reader.u16()?,
            },
            FC_WRITE_MULTIPLE_COILS => {
                let address = reader.u16()?;
                let quantity = reader.u16()?;
                let byte_count = usize::from(reader.u8()?);
                check_quantity(quantity, MAX_WRITE_BITS, &mut exception);
                let expected = usize::from(quantity).div_ceil(8);
                if exception.is_none() && byte_count != expected {
                    return Err(ModbusError::ByteCount {
                        expected,
                        actual: byte_count,
                    });
                }
                let bytes = reader.bytes(byte_count)?;
                Self::WriteMultipleCoils {
                    address,
                    values: unpack_bits(bytes, usize::from(quantity)),
                }
            },
            FC_WRITE_MULTIPLE_REGISTERS => {
                let address = reader.u16()?;
                let quantity = reader.u16()?;
                let byte_count = usize::from(reader.u8()?);
                check_quantity(quantity, MAX_WRITE_WORDS, &mut exception);
                let values =
                    Self::decode_write_words(&mut reader, quantity, byte_count, exception)?;
                Self::WriteMultipleRegisters { address, values }
            },
            FC_MASK_WRITE_REGISTER => Self::MaskWriteRegister {
                address: reader.u16()?,
                and_mask: reader.u16()?,
                or_mask: reader.u16()?,
            },
            FC_READ_WRITE_MULTIPLE_REGISTERS => {
                let read_address = reader.u16()?;
                let read_quantity = reader.u16()?;
                let write_address = reader.u16()?;
                let write_quantity = reader.u16()?;
                let byte_count = usize::from(reader.u8()?);
                check_quantity(read_quantity, MAX_READ_WRITE_READ_WORDS, &mut exception);
                check_quantity(write_quantity, MAX_READ_WRITE_WRITE_WORDS, &mut exception);
                let values =
                    Self::decode_write_words(&mut reader, write_quantity, byte_count, exception)?;
                Self::ReadWriteMultipleRegisters {
                    read_address,
                    read_quantity,
                    write_address,
                    values,
                }
            },
            _ => {
                debug!("Unsupported function code {:02X}", function);
                exception = Some(ExceptionCode::IllegalFunction);
                Self::Unsupported {
                    function,
                    data: reader.bytes(data.len())?.to_vec(),
                }
            },
        };

        Ok(DecodedRequest {
            request,
            exception,
            data_length: reader.consumed(),
        })
    }

    fn decode_write_words(
        reader: &mut PduReader<'_>,
        quantity: u16,
        byte_count: usize,
        exception: Option<ExceptionCode>,
    ) -> Result<Vec<u16>> {
        let expected = usize::from(quantity) * 2;
        if exception.is_none() && byte_count != expected {
            return Err(ModbusError::ByteCount {
                expected,
                actual: byte_count,
            });
        }
        let bytes = reader.bytes(byte_count)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Bits as received, padded to whole bytes until matched to a request
    ReadCoils(Vec<bool>),
    ReadDiscreteInputs(Vec<bool>),
    ReadHoldingRegisters(Vec<u16>),
    ReadInputRegisters(Vec<u16>),
    WriteSingleCoil {
        address: u16,
        value: bool,
    },
    WriteSingleRegister {
        address: u16,
        value: u16,
    },
    WriteMultipleCoils {
        address: u16,
        quantity: u16,
    },
    WriteMultipleRegisters {
        address: u16,
        quantity: u16,
    },
    MaskWriteRegister {
        address: u16,
        and_mask: u16,
        or_mask: u16,
    },
    ReadWriteMultipleRegisters(Vec<u16>),
    Exception {
        function: u8,
        code: ExceptionCode,
    },
}

impl Response {
    /// Function code without the exception flag
    pub fn function_code(&self) -> u8 {
        match self {
            Self::ReadCoils(_) => FC_READ_COILS,
            Self::ReadDiscreteInputs(_) => FC_READ_DISCRETE_INPUTS,
            Self::ReadHoldingRegisters(_) => FC_READ_HOLDING_REGISTERS,
            Self::ReadInputRegisters(_) => FC_READ_INPUT_REGISTERS,
            Self::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
            Self::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
            Self::WriteMultipleCoils { .. } => FC_WRITE_MULTIPLE_COILS,
            Self::WriteMultipleRegisters { .. } => FC_WRITE_MULTIPLE_REGISTERS,
            Self::MaskWriteRegister { .. } => FC_MASK_WRITE_REGISTER,
            Self::ReadWriteMultipleRegisters(_) => FC_READ_WRITE_MULTIPLE_REGISTERS,
            Self::Exception { function, .. } => *function,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception { .. })
    }

    pub fn exception(request: &Request, code: ExceptionCode) -> Self {
        Self::Exception {
            function: request.function_code(),
            code,
        }
    }

    pub fn encode(&self) -> Result<ModbusPdu> {
        let mut pdu = ModbusPdu::new();
        match self {
            Self::Exception { function, code } => {
                pdu.push(function | EXCEPTION_FLAG)?;
                pdu.push(code.code())?;
                return Ok(pdu);
            },
            _ => pdu.push(self.function_code())?,
        }
        match self {
            Self::ReadCoils(bits) | Self::ReadDiscreteInputs(bits) => {
                let bytes = pack_bits(bits);
                pdu.push(bytes.len() as u8)?;
                pdu.extend(&bytes)?;
            },
            Self::ReadHoldingRegisters(words)
            | Self::ReadInputRegisters(words)
            | Self::ReadWriteMultipleRegisters(words) => {
                pdu.push((words.len() * 2) as u8)?;
                for word in words {
                    pdu.push_u16(*word)?;
                }
            },
            Self::WriteSingleCoil { address, value } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(if *value { COIL_ON } else { COIL_OFF })?;
            },
            Self::WriteSingleRegister { address, value } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(*value)?;
            },
            Self::WriteMultipleCoils { address, quantity }
            | Self::WriteMultipleRegisters { address, quantity } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(*quantity)?;
            },
            Self::MaskWriteRegister {
                address,
                and_mask,
                or_mask,
            } => {
                pdu.push_u16(*address)?;
                pdu.push_u16(*and_mask)?;
                pdu.push_u16(*or_mask)?;
            },
            Self::Exception { .. } => {},
        }
        Ok(pdu)
    }

    /// Decode a response PDU, returning it with the data bytes consumed
    pub fn decode(pdu: &[u8]) -> Result<(Self, usize)> {
        let (&function, data) = pdu
            .split_first()
            .ok_or_else(|| ModbusError::truncated("empty response PDU"))?;
        let mut reader = PduReader::new(data);

        if function & EXCEPTION_FLAG != 0 {
            let code = ExceptionCode::from_code(reader.u8()?);
            let response = Self::Exception {
                function: function & !EXCEPTION_FLAG,
                code,
            };
            return Ok((response, reader.consumed()));
        }

        let response = match function {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS => {
                let byte_count = usize::from(reader.u8()?);
                let bits = unpack_bits(reader.bytes(byte_count)?, byte_count * 8);
                if function == FC_READ_COILS {
                    Self::ReadCoils(bits)
                } else {
                    Self::ReadDiscreteInputs(bits)
                }
            },
            FC_READ_HOLDING_REGISTERS
            | FC_READ_INPUT_REGISTERS
            | FC_READ_WRITE_MULTIPLE_REGISTERS => {
                let byte_count = usize::from(reader.u8()?);
                if byte_count % 2 != 0 {
                    return Err(ModbusError::malformed(format!(
                        "odd register byte count {}",
                        byte_count
                    )));
                }
                let words = read_words(&mut reader, byte_count / 2)?;
                match function {
                    FC_READ_HOLDING_REGISTERS => Self::ReadHoldingRegisters(words),
                    FC_READ_INPUT_REGISTERS => Self::ReadInputRegisters(words),
                    _ => Self::ReadWriteMultipleRegisters(words),
                }
            },
            FC_WRITE_SINGLE_COIL => {
                let address = reader.u16()?;
                let value = match reader.u16()? {
                    COIL_ON => true,
                    COIL_OFF => false,
                    raw => {
                        return Err(ModbusError::malformed(format!(
                            "coil value {:04X} in response",
                            raw
                        )))
                    },
                };
                Self::WriteSingleCoil { address, value }
            },
            FC_WRITE_SINGLE_REGISTER => Self::WriteSingleRegister {
                address: reader.u16()?,
                value: reader.u16()?,
            },
            FC_WRITE_MULTIPLE_COILS => Self::WriteMultipleCoils {
                address: reader.u16()?,
                quantity: reader.u16()?,
            },
            FC_WRITE_MULTIPLE_REGISTERS => Self::WriteMultipleRegisters {
                address: reader.u16()?,
                quantity: reader.u16()?,
            },
            FC_MASK_WRITE_REGISTER => Self::MaskWriteRegister {
                address: reader.u16()?,
                and_mask: reader.u16()?,
                or_mask: reader.u16()?,
            },
            _ => return Err(ModbusError::UnknownFunction(function)),
        };
        Ok((response, reader.consumed()))
    }
}
