//! Client-side matching of responses to outstanding requests
//!
//! MBAP responses are matched by transaction id. Serial lines carry no id,
//! so their responses answer requests in the order they were sent.

use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{ModbusError, Result};
use crate::frame::{FrameMode, Prefix, RequestFrame, ResponseFrame};
use crate::message::{Request, Response};

#[derive(Debug, Clone)]
struct Outstanding {
    unit_id: u8,
    request: Request,
}

#[derive(Debug)]
pub struct TransactionTracker {
    mode: FrameMode,
    next_transaction_id: u16,
    by_id: FxHashMap<u16, Outstanding>,
    serial: VecDeque<Outstanding>,
}

impl TransactionTracker {
    pub fn new(mode: FrameMode) -> Self {
        Self {
            mode,
            next_transaction_id: 1,
            by_id: FxHashMap::default(),
            serial: VecDeque::new(),
        }
    }

    /// Next MBAP transaction id, wrapping from 0xFFFF to 0x0000
    pub fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    /// Frame a request and remember it until its response arrives
    pub fn submit(&mut self, unit_id: u8, request: Request) -> RequestFrame {
        let outstanding = Outstanding {
            unit_id,
            request: request.clone(),
        };
        let prefix = match self.mode {
            FrameMode::Tcp => {
                let transaction_id = self.next_transaction_id();
                if self.by_id.insert(transaction_id, outstanding).is_some() {
                    warn!(
                        "Transaction {:04X} reused while still outstanding",
                        transaction_id
                    );
                }
                Prefix::mbap(transaction_id, unit_id)
            },
            FrameMode::Rtu => {
                self.serial.push_back(outstanding);
                Prefix::serial(unit_id)
            },
        };
        debug!(
            "Request submitted: unit_id={}, FC={:02X}, trans_id={:?}",
            unit_id,
            request.function_code(),
            prefix.transaction_id()
        );
        RequestFrame::new(prefix, request)
    }

    pub fn pending(&self) -> usize {
        self.by_id.len() + self.serial.len()
    }

    /// Match a response to its request and check what it echoes
    ///
    /// Exception responses are returned as they are. Bit reads are trimmed
    /// to the requested quantity.
    pub fn complete(&mut self, frame: ResponseFrame) -> Result<(Request, Response)> {
        let outstanding = match frame.prefix {
            Prefix::Mbap(header) => self.by_id.remove(&header.transaction_id).ok_or_else(|| {
                ModbusError::unexpected(format!(
                    "unknown transaction ID {:04X}",
                    header.transaction_id
                ))
            })?,
            Prefix::Serial { unit_id } => self.serial.pop_front().ok_or_else(|| {
                ModbusError::unexpected(format!("no request outstanding for unit {}", unit_id))
            })?,
        };

        if frame.prefix.unit_id() != outstanding.unit_id {
            return Err(ModbusError::echo_mismatch(format!(
                "unit id {} answered a request to {}",
                frame.prefix.unit_id(),
                outstanding.unit_id
            )));
        }
        let expected_fc = outstanding.request.function_code();
        if frame.response.function_code() != expected_fc {
            return Err(ModbusError::echo_mismatch(format!(
                "FC={:02X} answered FC={:02X}",
                frame.response.function_code(),
                expected_fc
            )));
        }

        let response = verify_echo(&outstanding.request, frame.response)?;
        Ok((outstanding.request, response))
    }
}

fn mismatch(field: &str, expected: impl fmt::Debug, actual: impl fmt::Debug) -> ModbusError {
    ModbusError::echo_mismatch(format!(
        "{} expected {:?}, got {:?}",
        field, expected, actual
    ))
}

fn expect_words(expected: u16, words: &[u16]) -> Result<()> {
    if words.len() != usize::from(expected) {
        return Err(ModbusError::ByteCount {
            expected: usize::from(expected) * 2,
            actual: words.len() * 2,
        });
    }
    Ok(())
}

fn expect_bits(expected: u16, bits: &[bool]) -> Result<Vec<bool>> {
    let bytes = usize::from(expected).div_ceil(8);
    if bits.len() != bytes * 8 {
        return Err(ModbusError::ByteCount {
            expected: bytes,
            actual: bits.len() / 8,
        });
    }
    Ok(bits[..usize::from(expected)].to_vec())
}

fn verify_echo(request: &Request, response: Response) -> Result<Response> {
    match (request, &response) {
        (_, Response::Exception { .. }) => {},
        (Request::ReadCoils { quantity, .. }, Response::ReadCoils(bits)) => {
            return Ok(Response::ReadCoils(expect_bits(*quantity, bits)?));
        },
        (Request::ReadDiscreteInputs { quantity, .. }, Response::ReadDiscreteInputs(bits)) => {
            return Ok(Response::ReadDiscreteInputs(expect_bits(*quantity, bits)?));
        },
        (Request::ReadHoldingRegisters { quantity, .. }, Response::ReadHoldingRegisters(words))
        | (Request::ReadInputRegisters { quantity, .. }, Response::ReadInputRegisters(words))
        | (
            Request::ReadWriteMultipleRegisters {
                read_quantity: quantity,
                ..
            },
            Response::ReadWriteMultipleRegisters(words),
        ) => expect_words(*quantity, words)?,
        (
            Request::WriteSingleCoil { address, value },
            Response::WriteSingleCoil {
                address: echoed_address,
                value: echoed_value,
            },
        ) => {
            if (address, value) != (echoed_address, echoed_value) {
                return Err(mismatch(
                    "coil",
                    (address, value),
                    (echoed_address, echoed_value),
                ));
            }
        },
        (
            Request::WriteSingleRegister { address, value },
            Response::WriteSingleRegister {
                address: echoed_address,
                value: echoed_value,
            },
        ) => {
            if (address, value) != (echoed_address, echoed_value) {
                return Err(mismatch(
                    "register",
                    (address, value),
                    (echoed_address, echoed_value),
                ));
            }
        },
        (
            Request::WriteMultipleCoils { address, values },
            Response::WriteMultipleCoils {
                address: echoed_address,
                quantity,
            },
        ) => {
            if (*address, values.len()) != (*echoed_address, usize::from(*quantity)) {
                return Err(mismatch(
                    "coils",
                    (address, values.len()),
                    (echoed_address, quantity),
                ));
            }
        },
        (
            Request::WriteMultipleRegisters { address, values },
            Response::WriteMultipleRegisters {
                address: echoed_address,
                quantity,
            },
        ) => {
            if (*address, values.len()) != (*echoed_address, usize::from(*quantity)) {
                return Err(mismatch(
                    "registers",
                    (address, values.len()),
                    (echoed_address, quantity),
                ));
            }
        },
        (
            Request::MaskWriteRegister {
                address,
                and_mask,
                or_mask,
            },
            Response::MaskWriteRegister { .. },
        ) => {
            let expected = Response::MaskWriteRegister {
                address: *address,
                and_mask: *and_mask,
                or_mask: *or_mask,
            };
            if response != expected {
                return Err(mismatch("mask write", expected, &response));
            }
        },
        (request, response) => {
            return Err(ModbusError::unexpected(format!(
                "{:?} does not answer {:?}",
                response, request
            )))
        },
    }
    Ok(response)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::pdu::ExceptionCode;

    #[test]
    fn test_transaction_ids_wrap() {
        let mut tracker = TransactionTracker::new(FrameMode::Tcp);
        tracker.next_transaction_id = 0xFFFF;
        assert_eq!(tracker.next_transaction_id(), 0xFFFF);
        assert_eq!(tracker.next_transaction_id(), 0x0000);
        assert_eq!(tracker.next_transaction_id(), 0x0001);
    }

    #[test]
    fn test_mbap_matched_by_id() {
        let mut tracker = TransactionTracker::new(FrameMode::Tcp);
        let first = tracker.submit(
            1,
            Request::ReadCoils {
                address: 0,
                quantity: 3,
            },
        );
        let second = tracker.submit(
            1,
            Request::WriteSingleRegister {
                address: 4,
                value: 9,
            },
        );
        assert_eq!(tracker.pending(), 2);

        // Answers arrive out of order
        let (request, _) = tracker
            .complete(ResponseFrame::new(
                second.prefix.reply(),
                Response::WriteSingleRegister {
                    address: 4,
                    value: 9,
                },
            ))
            .unwrap();
        assert_eq!(request, second.request);

        let (_, response) = tracker
            .complete(ResponseFrame::new(
                first.prefix.reply(),
                Response::ReadCoils(vec![true, false, true, true, false, false, false, false]),
            ))
            .unwrap();
        assert_eq!(response, Response::ReadCoils(vec![true, false, true]));
        assert_eq!(tracker.pending(), 0);

        assert!(matches!(
            tracker.complete(ResponseFrame::new(
                first.prefix.reply(),
                Response::ReadCoils(vec![false; 8])
            )),
            Err(ModbusError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_serial_fifo_and_echo_mismatch() {
        let mut tracker = TransactionTracker::new(FrameMode::Rtu);
        tracker.submit(
            2,
            Request::WriteSingleCoil {
                address: 7,
                value: true,
            },
        );
        tracker.submit(
            2,
            Request::ReadHoldingRegisters {
                address: 0,
                quantity: 2,
            },
        );

        let result = tracker.complete(ResponseFrame::new(
            Prefix::serial(2),
            Response::WriteSingleCoil {
                address: 7,
                value: false,
            },
        ));
        assert!(matches!(result, Err(ModbusError::EchoMismatch(_))));

        let result = tracker.complete(ResponseFrame::new(
            Prefix::serial(2),
            Response::ReadHoldingRegisters(vec![1]),
        ));
        assert!(matches!(result, Err(ModbusError::ByteCount { .. })));
    }

    #[test]
    fn test_exception_passes_through() {
        let mut tracker = TransactionTracker::new(FrameMode::Tcp);
        let frame = tracker.submit(
            1,
            Request::ReadInputRegisters {
                address: 100,
                quantity: 1,
            },
        );
        let exception = Response::exception(&frame.request, ExceptionCode::IllegalDataAddress);
        let (_, response) = tracker
            .complete(ResponseFrame::new(frame.prefix.reply(), exception.clone()))
            .unwrap();
        assert_eq!(response, exception);
    }

    #[test]
    fn test_wrong_unit_and_function() {
        let mut tracker = TransactionTracker::new(FrameMode::Tcp);
        let frame = tracker.submit(
            1,
            Request::ReadCoils {
                address: 0,
                quantity: 1,
            },
        );
        let result = tracker.complete(ResponseFrame::new(
            Prefix::mbap(frame.prefix.transaction_id().unwrap(), 9),
            Response::ReadCoils(vec![false; 8]),
        ));
        assert!(matches!(result, Err(ModbusError::EchoMismatch(_))));

        let frame = tracker.submit(
            1,
            Request::ReadCoils {
                address: 0,
                quantity: 1,
            },
        );
        let result = tracker.complete(ResponseFrame::new(
            frame.prefix.reply(),
            Response::ReadDiscreteInputs(vec![false; 8]),
        ));
        assert!(matches!(result, Err(ModbusError::EchoMismatch(_))));
    }
}
