//! Application data units: MBAP or serial prefix around a PDU
//!
//! ```text
//!   TCP: [trans_id:2][protocol_id:2][length:2][unit_id:1][PDU...]
//!   RTU: [unit_id:1][PDU...][CRC:2 little-endian]
//! ```

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::constants::*;
use crate::error::{ModbusError, Result};
use crate::message::{Request, Response};
use crate::pdu::{function_code_description, ExceptionCode, ModbusPdu};

/// Framing used on a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameMode {
    #[default]
    Tcp,
    Rtu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    /// Always 0 for Modbus
    pub protocol_id: u16,
    /// Bytes following the length field: unit id plus PDU
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn new(transaction_id: u16, unit_id: u8) -> Self {
        Self {
            transaction_id,
            protocol_id: 0,
            length: 0,
            unit_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Mbap(MbapHeader),
    Serial { unit_id: u8 },
}

impl Prefix {
    pub fn mbap(transaction_id: u16, unit_id: u8) -> Self {
        Self::Mbap(MbapHeader::new(transaction_id, unit_id))
    }

    pub fn serial(unit_id: u8) -> Self {
        Self::Serial { unit_id }
    }

    pub fn unit_id(&self) -> u8 {
        match self {
            Self::Mbap(header) => header.unit_id,
            Self::Serial { unit_id } => *unit_id,
        }
    }

    pub fn transaction_id(&self) -> Option<u16> {
        match self {
            Self::Mbap(header) => Some(header.transaction_id),
            Self::Serial { .. } => None,
        }
    }

    pub fn mode(&self) -> FrameMode {
        match self {
            Self::Mbap(_) => FrameMode::Tcp,
            Self::Serial { .. } => FrameMode::Rtu,
        }
    }

    /// Whether the declared length covers exactly `bytes` of PDU data
    ///
    /// The MBAP length counts the unit id and function code on top of the
    /// data. Serial frames carry no length.
    pub fn check_data_length(&self, bytes: usize) -> bool {
        match self {
            Self::Mbap(header) => usize::from(header.length) == bytes + 2,
            Self::Serial { .. } => true,
        }
    }

    /// Prefix of the answer to a frame carrying this prefix
    pub fn reply(&self) -> Self {
        match self {
            Self::Mbap(header) => Self::mbap(header.transaction_id, header.unit_id),
            Self::Serial { unit_id } => Self::serial(*unit_id),
        }
    }

    fn write(&self, pdu: &ModbusPdu, dst: &mut BytesMut) {
        match self {
            Self::Mbap(header) => {
                dst.reserve(MBAP_HEADER_LEN + 1 + pdu.len());
                dst.put_u16(header.transaction_id);
                dst.put_u16(0);
                dst.put_u16((pdu.len() + 1) as u16);
                dst.put_u8(header.unit_id);
                dst.put_slice(pdu.as_slice());
            },
            Self::Serial { unit_id } => {
                let start = dst.len();
                dst.reserve(pdu.len() + RTU_OVERHEAD);
                dst.put_u8(*unit_id);
                dst.put_slice(pdu.as_slice());
                let crc = crc16(&dst[start..]);
                dst.put_u16_le(crc);
            },
        }
    }
}

/// CRC-16/Modbus, sent least significant byte first
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Request PDU length from the start of a serial frame, `None` if more bytes are needed
pub fn rtu_request_pdu_len(adu: &[u8]) -> Result<Option<usize>> {
    let Some(&function) = adu.get(1) else {
        return Ok(None);
    };
    let len = match function {
        FC_READ_COILS..=FC_WRITE_SINGLE_REGISTER => Some(5),
        FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => {
            adu.get(6).map(|&count| 6 + usize::from(count))
        },
        FC_MASK_WRITE_REGISTER => Some(7),
        FC_READ_WRITE_MULTIPLE_REGISTERS => adu.get(10).map(|&count| 10 + usize::from(count)),
        _ => return Err(ModbusError::UnknownFunction(function)),
    };
    Ok(len)
}

/// Response PDU length from the start of a serial frame, `None` if more bytes are needed
pub fn rtu_response_pdu_len(adu: &[u8]) -> Result<Option<usize>> {
    let Some(&function) = adu.get(1) else {
        return Ok(None);
    };
    if function & EXCEPTION_FLAG != 0 {
        return Ok(Some(2));
    }
    let len = match function {
        FC_READ_COILS..=FC_READ_INPUT_REGISTERS | FC_READ_WRITE_MULTIPLE_REGISTERS => {
            adu.get(2).map(|&count| 2 + usize::from(count))
        },
        FC_WRITE_SINGLE_COIL
        | FC_WRITE_SINGLE_REGISTER
        | FC_WRITE_MULTIPLE_COILS
        | FC_WRITE_MULTIPLE_REGISTERS => Some(5),
        FC_MASK_WRITE_REGISTER => Some(7),
        _ => return Err(ModbusError::UnknownFunction(function)),
    };
    Ok(len)
}

/// Split a complete frame into its prefix and PDU
fn split_adu(mode: FrameMode, adu: &[u8]) -> Result<(Prefix, &[u8])> {
    match mode {
        FrameMode::Tcp => {
            if adu.len() < MBAP_HEADER_LEN + 2 {
                return Err(ModbusError::truncated("TCP frame too short"));
            }
            let header = MbapHeader {
                transaction_id: u16::from_be_bytes([adu[0], adu[1]]),
                protocol_id: u16::from_be_bytes([adu[2], adu[3]]),
                length: u16::from_be_bytes([adu[4], adu[5]]),
                unit_id: adu[6],
            };
            debug!(
                "MBAP header: trans_id={:04X}, protocol_id={:04X}, length={}, unit_id={}",
                header.transaction_id, header.protocol_id, header.length, header.unit_id
            );
            if header.protocol_id != 0 {
                return Err(ModbusError::ProtocolId(header.protocol_id));
            }
            if adu.len() != MBAP_HEADER_LEN + usize::from(header.length) {
                return Err(ModbusError::LengthMismatch {
                    declared: usize::from(header.length),
                    actual: adu.len() - MBAP_HEADER_LEN,
                });
            }
            Ok((Prefix::Mbap(header), &adu[MBAP_HEADER_LEN + 1..]))
        },
        FrameMode::Rtu => {
            if adu.len() < 4 {
                return Err(ModbusError::truncated("RTU frame too short"));
            }
            let (body, tail) = adu.split_at(adu.len() - 2);
            let received = u16::from_le_bytes([tail[0], tail[1]]);
            let calculated = crc16(body);
            if received != calculated {
                return Err(ModbusError::Crc {
                    expected: calculated,
                    actual: received,
                });
            }
            Ok((Prefix::serial(body[0]), &body[1..]))
        },
    }
}

fn check_length(prefix: &Prefix, data_length: usize, pdu_len: usize) -> Result<()> {
    if !prefix.check_data_length(data_length) || data_length + 1 != pdu_len {
        return Err(ModbusError::LengthMismatch {
            declared: pdu_len + 1,
            actual: data_length + 2,
        });
    }
    Ok(())
}

/// Request with its prefix, as seen by a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub prefix: Prefix,
    pub request: Request,
    /// Set when the request must be answered with an exception
    pub exception: Option<ExceptionCode>,
}

impl RequestFrame {
    pub fn new(prefix: Prefix, request: Request) -> Self {
        Self {
            prefix,
            request,
            exception: None,
        }
    }

    /// Decode one complete frame
    pub fn decode(mode: FrameMode, adu: &[u8]) -> Result<Self> {
        let (prefix, pdu) = split_adu(mode, adu)?;
        let decoded = Request::decode(pdu)?;
        check_length(&prefix, decoded.data_length, pdu.len())?;
        debug!(
            "Request decoded: unit_id={}, FC={:02X} ({}), exception={:?}",
            prefix.unit_id(),
            decoded.request.function_code(),
            function_code_description(decoded.request.function_code()),
            decoded.exception
        );
        Ok(Self {
            prefix,
            request: decoded.request,
            exception: decoded.exception,
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let pdu = self.request.encode()?;
        self.prefix.write(&pdu, dst);
        Ok(())
    }
}

/// Response with its prefix, as seen by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub prefix: Prefix,
    pub response: Response,
}

impl ResponseFrame {
    pub fn new(prefix: Prefix, response: Response) -> Self {
        Self { prefix, response }
    }

    pub fn decode(mode: FrameMode, adu: &[u8]) -> Result<Self> {
        let (prefix, pdu) = split_adu(mode, adu)?;
        let (response, data_length) = Response::decode(pdu)?;
        check_length(&prefix, data_length, pdu.len())?;
        debug!(
            "Response decoded: unit_id={}, FC={:02X} ({}), exception={}",
            prefix.unit_id(),
            response.function_code(),
            function_code_description(response.function_code()),
            response.is_exception()
        );
        Ok(Self { prefix, response })
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let pdu = self.response.encode()?;
        self.prefix.write(&pdu, dst);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_crc16() {
        // CRC travels low byte first
        assert_eq!(crc16(&[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02]).to_le_bytes(), [0xB6, 0x63]);
        assert_eq!(
            crc16(&[0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00]).to_le_bytes(),
            [0xFB, 0xF9]
        );
    }

    #[test]
    fn test_check_data_length() {
        let prefix = Prefix::Mbap(MbapHeader {
            length: 6,
            ..MbapHeader::new(1, 1)
        });
        assert!(prefix.check_data_length(4));
        assert!(!prefix.check_data_length(5));
        assert!(Prefix::serial(1).check_data_length(99));
    }

    #[test]
    fn test_mbap_request_round_trip() {
        let frame = RequestFrame::new(
            Prefix::mbap(0x0102, 0x11),
            Request::ReadHoldingRegisters {
                address: 0x006B,
                quantity: 3,
            },
        );
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x01, 0x02, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]
        );

        let decoded = RequestFrame::decode(FrameMode::Tcp, &buf).unwrap();
        assert_eq!(decoded.prefix.transaction_id(), Some(0x0102));
        assert_eq!(decoded.prefix.unit_id(), 0x11);
        assert_eq!(decoded.request, frame.request);
    }

    #[test]
    fn test_rtu_request_round_trip() {
        let frame = RequestFrame::new(
            Prefix::serial(0x01),
            Request::ReadHoldingRegisters {
                address: 0x082B,
                quantity: 2,
            },
        );
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02, 0xB6, 0x63]);
        assert_eq!(RequestFrame::decode(FrameMode::Rtu, &buf).unwrap(), frame);

        buf[7] ^= 0xFF;
        assert!(matches!(
            RequestFrame::decode(FrameMode::Rtu, &buf),
            Err(ModbusError::Crc { .. })
        ));
    }

    #[test]
    fn test_mbap_structural_errors() {
        let bad_protocol = [0x00, 0x01, 0x00, 0x01, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        assert!(matches!(
            RequestFrame::decode(FrameMode::Tcp, &bad_protocol),
            Err(ModbusError::ProtocolId(1))
        ));

        // Declared length covers one byte more than the request uses
        let padded = [
            0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00,
        ];
        assert!(matches!(
            RequestFrame::decode(FrameMode::Tcp, &padded),
            Err(ModbusError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_rtu_pdu_lengths() {
        assert_eq!(rtu_request_pdu_len(&[0x01]).unwrap(), None);
        assert_eq!(rtu_request_pdu_len(&[0x01, 0x03]).unwrap(), Some(5));
        assert_eq!(rtu_request_pdu_len(&[0x01, 0x10, 0, 0, 0, 2]).unwrap(), None);
        assert_eq!(rtu_request_pdu_len(&[0x01, 0x10, 0, 0, 0, 2, 4]).unwrap(), Some(10));
        assert_eq!(rtu_request_pdu_len(&[0x01, 0x16]).unwrap(), Some(7));
        assert!(matches!(
            rtu_request_pdu_len(&[0x01, 0x2B]),
            Err(ModbusError::UnknownFunction(0x2B))
        ));

        assert_eq!(rtu_response_pdu_len(&[0x01, 0x83]).unwrap(), Some(2));
        assert_eq!(rtu_response_pdu_len(&[0x01, 0x03, 0x04]).unwrap(), Some(6));
        assert_eq!(rtu_response_pdu_len(&[0x01, 0x05]).unwrap(), Some(5));
    }
}
