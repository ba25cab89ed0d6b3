//! Pointflow Modbus
//!
//! Register bank and transaction codec for exposing point values over
//! Modbus TCP and RTU framing.
//!
//! ```text
//!   bytes ─▶ ServerCodec ─▶ RequestFrame ─▶ RequestProcessor ─▶ RegisterBank
//!                                                 │
//!   bytes ◀─ ServerCodec ◀─ ResponseFrame ◀───────┘
//!
//!   client: TransactionTracker::submit ─▶ ClientCodec ─▶ ... ─▶ complete
//! ```

pub mod bank;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod message;
pub mod pdu;
pub mod processor;
pub mod register;
pub mod server;
pub mod tracker;
pub mod word_order;

pub use bank::{RegisterBank, WireResult};
pub use codec::{ClientCodec, ServerCodec};
pub use config::RegisterMapConfig;
pub use error::{ModbusError, Result};
pub use frame::{crc16, FrameMode, MbapHeader, Prefix, RequestFrame, ResponseFrame};
pub use message::{DecodedRequest, Request, Response};
pub use pdu::{ExceptionCode, ModbusPdu};
pub use processor::RequestProcessor;
pub use register::{RegisterKind, RegisterSpec, RegisterValue, Table};
pub use server::{serve, serve_until, SharedBank};
pub use tracker::TransactionTracker;
pub use word_order::WordOrder;
