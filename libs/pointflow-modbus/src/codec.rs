//! Stream framing for `tokio_util::codec`
//!
//! [`ServerCodec`] decodes requests and encodes responses; [`ClientCodec`]
//! does the reverse. Both wait for a complete frame before decoding it.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN, RTU_OVERHEAD};
use crate::error::{ModbusError, Result};
use crate::frame::{
    rtu_request_pdu_len, rtu_response_pdu_len, FrameMode, RequestFrame, ResponseFrame,
};

/// Length of the next complete frame in `src`, if it has fully arrived
fn frame_len(
    mode: FrameMode,
    src: &BytesMut,
    rtu_pdu_len: fn(&[u8]) -> Result<Option<usize>>,
) -> Result<Option<usize>> {
    match mode {
        FrameMode::Tcp => {
            if src.len() < MBAP_HEADER_LEN {
                return Ok(None);
            }
            let protocol_id = u16::from_be_bytes([src[2], src[3]]);
            if protocol_id != 0 {
                return Err(ModbusError::ProtocolId(protocol_id));
            }
            let length = usize::from(u16::from_be_bytes([src[4], src[5]]));
            if !(2..=MAX_MBAP_LENGTH).contains(&length) {
                return Err(ModbusError::malformed(format!(
                    "MBAP length {} outside 2..={}",
                    length, MAX_MBAP_LENGTH
                )));
            }
            Ok(Some(MBAP_HEADER_LEN + length))
        },
        FrameMode::Rtu => Ok(rtu_pdu_len(&src[..])?.map(|pdu_len| pdu_len + RTU_OVERHEAD)),
    }
}

fn next_frame(
    mode: FrameMode,
    src: &mut BytesMut,
    rtu_pdu_len: fn(&[u8]) -> Result<Option<usize>>,
) -> Result<Option<BytesMut>> {
    let Some(len) = frame_len(mode, src, rtu_pdu_len)? else {
        return Ok(None);
    };
    if src.len() < len {
        src.reserve(len - src.len());
        return Ok(None);
    }
    let adu = src.split_to(len);
    trace!("Frame received: {:02X?}", &adu[..]);
    Ok(Some(adu))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerCodec {
    mode: FrameMode,
}

impl ServerCodec {
    pub fn new(mode: FrameMode) -> Self {
        Self { mode }
    }
}

impl Decoder for ServerCodec {
    type Item = RequestFrame;
    type Error = ModbusError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RequestFrame>> {
        next_frame(self.mode, src, rtu_request_pdu_len)?
            .map(|adu| RequestFrame::decode(self.mode, &adu))
            .transpose()
    }
}

impl Encoder<ResponseFrame> for ServerCodec {
    type Error = ModbusError;

    fn encode(&mut self, frame: ResponseFrame, dst: &mut BytesMut) -> Result<()> {
        frame.encode(dst)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCodec {
    mode: FrameMode,
}

impl ClientCodec {
    pub fn new(mode: FrameMode) -> Self {
        Self { mode }
    }
}

impl Decoder for ClientCodec {
    type Item = ResponseFrame;
    type Error = ModbusError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ResponseFrame>> {
        next_frame(self.mode, src, rtu_response_pdu_len)?
            .map(|adu| ResponseFrame::decode(self.mode, &adu))
            .transpose()
    }
}

impl Encoder<RequestFrame> for ClientCodec {
    type Error = ModbusError;

    fn encode(&mut self, frame: RequestFrame, dst: &mut BytesMut) -> Result<()> {
        frame.encode(dst)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::frame::Prefix;
    use crate::message::{Request, Response};
    use crate::pdu::ExceptionCode;

    #[test]
    fn test_server_waits_for_complete_frame() {
        let mut codec = ServerCodec::new(FrameMode::Tcp);
        let mut buf = BytesMut::from(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x00, 0x10, 0x12, 0x34]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        assert_eq!(
            frame.request,
            Request::WriteSingleCoil {
                address: 0x10,
                value: true
            }
        );
        assert_eq!(frame.exception, Some(ExceptionCode::IllegalDataValue));
    }

    #[test]
    fn test_server_unknown_function() {
        let mut tcp = ServerCodec::new(FrameMode::Tcp);
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x2B, 0x0E][..]);
        let frame = tcp.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.exception, Some(ExceptionCode::IllegalFunction));

        let mut rtu = ServerCodec::new(FrameMode::Rtu);
        let mut buf = BytesMut::from(&[0x01, 0x2B, 0x0E, 0x00, 0x00][..]);
        assert!(matches!(
            rtu.decode(&mut buf),
            Err(ModbusError::UnknownFunction(0x2B))
        ));
    }

    #[test]
    fn test_client_and_server_exchange() {
        let mut client = ClientCodec::new(FrameMode::Rtu);
        let mut server = ServerCodec::new(FrameMode::Rtu);

        let request = RequestFrame::new(
            Prefix::serial(7),
            Request::WriteMultipleRegisters {
                address: 3,
                values: vec![1, 2, 3],
            },
        );
        let mut wire = BytesMut::new();
        client.encode(request.clone(), &mut wire).unwrap();
        assert_eq!(server.decode(&mut wire).unwrap().unwrap(), request);

        let response = ResponseFrame::new(
            request.prefix.reply(),
            Response::WriteMultipleRegisters {
                address: 3,
                quantity: 3,
            },
        );
        server.encode(response.clone(), &mut wire).unwrap();
        assert_eq!(client.decode(&mut wire).unwrap().unwrap(), response);
    }

    #[test]
    fn test_rejects_oversized_mbap_length() {
        let mut codec = ServerCodec::new(FrameMode::Tcp);
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ModbusError::Malformed(_))
        ));
    }
}
