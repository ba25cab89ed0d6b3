//! Server-side execution of decoded requests against a register bank

use tracing::{debug, warn};

use crate::bank::{RegisterBank, WireResult};
use crate::frame::{RequestFrame, ResponseFrame};
use crate::message::{Request, Response};
use crate::pdu::ExceptionCode;
use crate::register::Table;

/// Answers requests addressed to one unit
#[derive(Debug, Clone, Copy)]
pub struct RequestProcessor {
    unit_id: u8,
}

impl RequestProcessor {
    pub fn new(unit_id: u8) -> Self {
        Self { unit_id }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Build the response to a request frame
    ///
    /// Returns `None` for frames addressed to another unit. Unit 0 is the
    /// broadcast address: writes are applied but not answered.
    pub fn process(&self, frame: &RequestFrame, bank: &mut RegisterBank) -> Option<ResponseFrame> {
        let unit_id = frame.prefix.unit_id();
        let broadcast = unit_id == 0 && frame.prefix.transaction_id().is_none();
        if unit_id != self.unit_id && !broadcast {
            debug!("Ignoring request for unit {}", unit_id);
            return None;
        }

        let response = match frame.exception {
            Some(code) => Err(code),
            None => execute(&frame.request, bank),
        }
        .unwrap_or_else(|code| {
            warn!(
                "Request FC={:02X} answered with exception {}",
                frame.request.function_code(),
                code
            );
            Response::exception(&frame.request, code)
        });

        if broadcast {
            return None;
        }
        Some(ResponseFrame::new(frame.prefix.reply(), response))
    }
}

fn execute(request: &Request, bank: &mut RegisterBank) -> WireResult<Response> {
    let response = match request {
        Request::ReadCoils { address, quantity } => {
            Response::ReadCoils(bank.read_bits(Table::Coils, *address, *quantity)?)
        },
        Request::ReadDiscreteInputs { address, quantity } => {
            Response::ReadDiscreteInputs(bank.read_bits(
                Table::DiscreteInputs,
                *address,
                *quantity,
            )?)
        },
        Request::ReadHoldingRegisters { address, quantity } => Response::ReadHoldingRegisters(
            bank.read_words(Table::HoldingRegisters, *address, *quantity)?,
        ),
        Request::ReadInputRegisters { address, quantity } => Response::ReadInputRegisters(
            bank.read_words(Table::InputRegisters, *address, *quantity)?,
        ),
        Request::WriteSingleCoil { address, value } => {
            bank.write_bits(*address, &[*value])?;
            Response::WriteSingleCoil {
                address: *address,
                value: *value,
            }
        },
        Request::WriteSingleRegister { address, value } => {
            bank.write_words(*address, &[*value])?;
            Response::WriteSingleRegister {
                address: *address,
                value: *value,
            }
        },
        Request::WriteMultipleCoils { address, values } => {
            bank.write_bits(*address, values)?;
            Response::WriteMultipleCoils {
                address: *address,
                quantity: values.len() as u16,
            }
        },
        Request::WriteMultipleRegisters { address, values } => {
            bank.write_words(*address, values)?;
            Response::WriteMultipleRegisters {
                address: *address,
                quantity: values.len() as u16,
            }
        },
        Request::MaskWriteRegister {
            address,
            and_mask,
            or_mask,
        } => {
            bank.mask_write(*address, *and_mask, *or_mask)?;
            Response::MaskWriteRegister {
                address: *address,
                and_mask: *and_mask,
                or_mask: *or_mask,
            }
        },
        Request::ReadWriteMultipleRegisters {
            read_address,
            read_quantity,
            write_address,
            values,
        } => {
            // Both ranges must be mapped before anything is written
            bank.read_words(Table::HoldingRegisters, *read_address, *read_quantity)?;
            bank.write_words(*write_address, values)?;
            Response::ReadWriteMultipleRegisters(bank.read_words(
                Table::HoldingRegisters,
                *read_address,
                *read_quantity,
            )?)
        },
        Request::Unsupported { .. } => return Err(ExceptionCode::IllegalFunction),
    };
    Ok(response)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::frame::Prefix;
    use crate::register::{RegisterKind, RegisterSpec, RegisterValue};
    use crate::word_order::WordOrder;
    use tracing_test::traced_test;

    fn bank() -> RegisterBank {
        let mut bank = RegisterBank::new(WordOrder::BigEndian);
        bank.declare(
            RegisterSpec::new(Table::HoldingRegisters, 0, RegisterKind::Float)
                .with_point("setpoint"),
        )
        .unwrap();
        bank.declare(RegisterSpec::new(Table::Coils, 0, RegisterKind::BitArray { len: 4 }))
            .unwrap();
        bank
    }

    fn frame(request: Request) -> RequestFrame {
        RequestFrame::new(Prefix::mbap(9, 1), request)
    }

    #[test]
    fn test_write_then_read_point() {
        let processor = RequestProcessor::new(1);
        let mut bank = bank();

        let response = processor
            .process(
                &frame(Request::WriteMultipleRegisters {
                    address: 0,
                    values: vec![0x4120, 0x0000],
                }),
                &mut bank,
            )
            .unwrap();
        assert_eq!(response.prefix, Prefix::mbap(9, 1));
        assert_eq!(
            response.response,
            Response::WriteMultipleRegisters {
                address: 0,
                quantity: 2
            }
        );
        assert_eq!(bank.point_value("setpoint").unwrap(), RegisterValue::Float(10.0));
    }

    #[test]
    fn test_read_write_leaves_registers_on_bad_read_range() {
        let processor = RequestProcessor::new(1);
        let mut bank = bank();
        let request = |read_address| {
            frame(Request::ReadWriteMultipleRegisters {
                read_address,
                read_quantity: 1,
                write_address: 0,
                values: vec![0x4120, 0x0000],
            })
        };

        let response = processor.process(&request(500), &mut bank).unwrap();
        assert_eq!(
            response.response,
            Response::Exception {
                function: 0x17,
                code: ExceptionCode::IllegalDataAddress
            }
        );
        assert_eq!(
            bank.read_words(Table::HoldingRegisters, 0, 2).unwrap(),
            vec![0, 0]
        );

        let response = processor.process(&request(0), &mut bank).unwrap();
        assert_eq!(response.response, Response::ReadWriteMultipleRegisters(vec![0x4120]));
        assert_eq!(bank.point_value("setpoint").unwrap(), RegisterValue::Float(10.0));
    }

    #[test]
    fn test_flagged_request_answered_with_exception() {
        let processor = RequestProcessor::new(1);
        let mut bank = bank();
        let mut request = frame(Request::WriteSingleCoil {
            address: 0,
            value: true,
        });
        request.exception = Some(ExceptionCode::IllegalDataValue);

        let response = processor.process(&request, &mut bank).unwrap();
        assert_eq!(
            response.response,
            Response::Exception {
                function: 0x05,
                code: ExceptionCode::IllegalDataValue
            }
        );
        assert_eq!(bank.read_bits(Table::Coils, 0, 1).unwrap(), vec![false]);
    }

    #[test]
    #[traced_test]
    fn test_bank_errors_become_exceptions() {
        let processor = RequestProcessor::new(1);
        let mut bank = bank();
        let response = processor
            .process(
                &frame(Request::ReadCoils {
                    address: 2,
                    quantity: 4,
                }),
                &mut bank,
            )
            .unwrap();
        assert_eq!(
            response.response,
            Response::Exception {
                function: 0x01,
                code: ExceptionCode::IllegalDataAddress
            }
        );
        assert!(logs_contain("FC=01 answered with exception"));
    }

    #[test]
    fn test_other_unit_and_broadcast() {
        let processor = RequestProcessor::new(1);
        let mut bank = bank();
        let other = RequestFrame::new(
            Prefix::mbap(1, 2),
            Request::ReadCoils {
                address: 0,
                quantity: 1,
            },
        );
        assert!(processor.process(&other, &mut bank).is_none());

        let broadcast = RequestFrame::new(
            Prefix::serial(0),
            Request::WriteSingleCoil {
                address: 3,
                value: true,
            },
        );
        assert!(processor.process(&broadcast, &mut bank).is_none());
        assert_eq!(bank.read_bits(Table::Coils, 3, 1).unwrap(), vec![true]);
    }
}
