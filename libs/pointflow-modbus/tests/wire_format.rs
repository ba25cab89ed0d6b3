//! Wire Format Tests
//!
//! Coil encoding, word orders of multi-register values and frame
//! validation through the public codec types.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use bytes::BytesMut;
use pointflow_modbus::{
    ExceptionCode, FrameMode, ModbusError, Prefix, RegisterBank, RegisterKind, RegisterSpec,
    RegisterValue, Request, RequestFrame, ResponseFrame, Response, ServerCodec, Table, WordOrder,
};
use tokio_util::codec::Decoder;

// ============================================================================
// Write single coil
// ============================================================================

#[test]
fn test_coil_on_is_ff00() {
    let frame = RequestFrame::new(
        Prefix::mbap(1, 1),
        Request::WriteSingleCoil {
            address: 0,
            value: true,
        },
    );
    let mut buf = BytesMut::new();
    frame.encode(&mut buf).unwrap();
    assert_eq!(&buf[buf.len() - 2..], &[0xFF, 0x00]);
}

#[test]
fn test_any_nonzero_coil_decodes_on() {
    for raw in [0xFF00u16, 0x0001, 0x8000, 0xFFFF] {
        let [hi, lo] = raw.to_be_bytes();
        let adu = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x09, hi, lo];
        let frame = RequestFrame::decode(FrameMode::Tcp, &adu).unwrap();
        assert_eq!(
            frame.request,
            Request::WriteSingleCoil {
                address: 9,
                value: true
            }
        );
        let expected = (raw != 0xFF00).then_some(ExceptionCode::IllegalDataValue);
        assert_eq!(frame.exception, expected, "raw {:04X}", raw);
    }
}

// ============================================================================
// Multi-register values
// ============================================================================

#[test]
fn test_long_register_word_orders() {
    let spec = RegisterSpec::new(Table::HoldingRegisters, 10, RegisterKind::Long).with_point("p");
    let value = RegisterValue::Int(0x1122_3344_5566_7788);

    let mut words = Vec::new();
    for order in [WordOrder::MiddleEndian, WordOrder::BigEndian] {
        let mut bank = RegisterBank::new(order);
        bank.declare(spec.clone()).unwrap();
        bank.set_point_value("p", value.clone()).unwrap();
        assert_eq!(bank.point_value("p").unwrap(), value);
        words.push(bank.read_words(Table::HoldingRegisters, 10, 4).unwrap());
    }
    assert_eq!(words[0], vec![0x7788, 0x5566, 0x3344, 0x1122]);
    assert_eq!(words[1], vec![0x1122, 0x3344, 0x5566, 0x7788]);
}

#[test]
fn test_integer_register_from_wire() {
    let mut bank = RegisterBank::new(WordOrder::MiddleEndian);
    bank.declare(
        RegisterSpec::new(Table::HoldingRegisters, 0, RegisterKind::Integer { signed: true })
            .with_point("p"),
    )
    .unwrap();
    bank.write_words(0, &[0xFFFF, 0xFFFF]).unwrap();
    assert_eq!(bank.point_value("p").unwrap(), RegisterValue::Int(-1));
}

// ============================================================================
// Frame validation
// ============================================================================

#[test]
fn test_stream_of_rtu_requests() {
    let mut wire = BytesMut::new();
    for (unit_id, address) in [(1u8, 0u16), (2, 8)] {
        RequestFrame::new(
            Prefix::serial(unit_id),
            Request::ReadDiscreteInputs {
                address,
                quantity: 16,
            },
        )
        .encode(&mut wire)
        .unwrap();
    }

    let mut codec = ServerCodec::new(FrameMode::Rtu);
    let first = codec.decode(&mut wire).unwrap().unwrap();
    let second = codec.decode(&mut wire).unwrap().unwrap();
    assert!(codec.decode(&mut wire).unwrap().is_none());
    assert_eq!(first.prefix.unit_id(), 1);
    assert_eq!(
        second.request,
        Request::ReadDiscreteInputs {
            address: 8,
            quantity: 16
        }
    );
}

#[test]
fn test_response_length_mismatch() {
    // Declares 7 bytes after the length field for a 6-byte write echo
    let adu = [
        0x00, 0x05, 0x00, 0x00, 0x00, 0x07, 0x01, 0x06, 0x00, 0x01, 0x00, 0x02, 0x00,
    ];
    assert!(matches!(
        ResponseFrame::decode(FrameMode::Tcp, &adu),
        Err(ModbusError::LengthMismatch { .. })
    ));

    let adu = [0x00, 0x05, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x02];
    assert_eq!(
        ResponseFrame::decode(FrameMode::Tcp, &adu).unwrap().response,
        Response::WriteSingleRegister {
            address: 1,
            value: 2
        }
    );
}
