//! Register declarations and value packing
//!
//! A register spans one or more consecutive addresses of a table. Its
//! content is a run of 16-bit words; bit tables hold one 0/1 word per bit.
//!
//! | kind       | words | point value          |
//! |------------|-------|----------------------|
//! | `word`     | 1     | `Int`                |
//! | `integer`  | 2     | `Int`                |
//! | `float`    | 2     | `Float` (f32 bits)   |
//! | `long`     | 4     | `Int`                |
//! | `double`   | 4     | `Float` (f64 bits)   |
//! | `array`    | len   | `Words`              |
//! | `masked`   | 1     | `Int`, masked bits   |
//! | `stamp`    | 4     | `Stamp`, ms of epoch |
//! | `sequence` | 1     | `Int`                |
//! | `bit`      | 1     | `Bool`               |
//! | `bit_array`| len   | `Bits`               |

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModbusError, Result};
use crate::word_order::WordOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Coils,
        Table::DiscreteInputs,
        Table::HoldingRegisters,
        Table::InputRegisters,
    ];

    pub fn is_bits(&self) -> bool {
        matches!(self, Self::Coils | Self::DiscreteInputs)
    }

    /// Coils and holding registers accept writes from the wire
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Coils | Self::HoldingRegisters)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Coils => 0,
            Self::DiscreteInputs => 1,
            Self::HoldingRegisters => 2,
            Self::InputRegisters => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coils => "coils",
            Self::DiscreteInputs => "discrete_inputs",
            Self::HoldingRegisters => "holding_registers",
            Self::InputRegisters => "input_registers",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegisterKind {
    Word {
        #[serde(default)]
        signed: bool,
    },
    Integer {
        #[serde(default)]
        signed: bool,
    },
    Float,
    Long,
    Double,
    Array {
        len: u16,
    },
    Masked {
        mask: u16,
    },
    Stamp,
    Sequence,
    Bit,
    BitArray {
        len: u16,
    },
}

impl RegisterKind {
    /// Number of consecutive addresses covered
    pub fn width(&self) -> u16 {
        match self {
            Self::Word { .. } | Self::Masked { .. } | Self::Sequence | Self::Bit => 1,
            Self::Integer { .. } | Self::Float => 2,
            Self::Long | Self::Double | Self::Stamp => 4,
            Self::Array { len } | Self::BitArray { len } => *len,
        }
    }

    pub fn is_bit(&self) -> bool {
        matches!(self, Self::Bit | Self::BitArray { .. })
    }

    /// Stamp and sequence registers belong to the bank, not to a point
    pub fn is_bank_managed(&self) -> bool {
        matches!(self, Self::Stamp | Self::Sequence)
    }

    /// Bits a wire write may change
    pub fn write_mask(&self) -> u16 {
        match self {
            Self::Masked { mask } => *mask,
            Self::Bit | Self::BitArray { .. } => 1,
            _ => 0xFFFF,
        }
    }

    /// Point value held by `words`
    pub fn decode(&self, order: WordOrder, words: &[u16]) -> RegisterValue {
        match self {
            Self::Word { signed: true } => RegisterValue::Int(i64::from(words[0] as i16)),
            Self::Word { signed: false } | Self::Sequence => {
                RegisterValue::Int(i64::from(words[0]))
            },
            Self::Masked { mask } => RegisterValue::Int(i64::from(words[0] & mask)),
            Self::Integer { signed } => {
                let raw = order.join(words) as u32;
                if *signed {
                    RegisterValue::Int(i64::from(raw as i32))
                } else {
                    RegisterValue::Int(i64::from(raw))
                }
            },
            Self::Long => RegisterValue::Int(order.join(words) as i64),
            Self::Float => {
                RegisterValue::Float(f64::from(f32::from_bits(order.join(words) as u32)))
            },
            Self::Double => RegisterValue::Float(f64::from_bits(order.join(words))),
            Self::Array { .. } => RegisterValue::Words(words.to_vec()),
            Self::Stamp => {
                let millis = order.join(words) as i64;
                match Utc.timestamp_millis_opt(millis).single() {
                    Some(stamp) => RegisterValue::Stamp(stamp),
                    None => RegisterValue::Int(millis),
                }
            },
            Self::Bit => RegisterValue::Bool(words[0] != 0),
            Self::BitArray { .. } => {
                RegisterValue::Bits(words.iter().map(|word| *word != 0).collect())
            },
        }
    }

    /// Store `value` into `words`, whose length is this kind's width
    pub fn encode(&self, order: WordOrder, value: &RegisterValue, words: &mut [u16]) -> Result<()> {
        match self {
            Self::Word { signed } => {
                let int = value.as_int()?;
                let (min, max) = if *signed {
                    (i64::from(i16::MIN), i64::from(i16::MAX))
                } else {
                    (0, i64::from(u16::MAX))
                };
                words[0] = in_range(int, min, max)? as u16;
            },
            Self::Sequence => words[0] = in_range(value.as_int()?, 0, i64::from(u16::MAX))? as u16,
            Self::Masked { mask } => {
                let bits = in_range(value.as_int()?, 0, i64::from(u16::MAX))? as u16;
                words[0] = (words[0] & !mask) | (bits & mask);
            },
            Self::Integer { signed } => {
                let int = value.as_int()?;
                let (min, max) = if *signed {
                    (i64::from(i32::MIN), i64::from(i32::MAX))
                } else {
                    (0, i64::from(u32::MAX))
                };
                order.split(u64::from(in_range(int, min, max)? as u32), words);
            },
            Self::Long => order.split(value.as_int()? as u64, words),
            Self::Float => order.split(u64::from((value.as_float()? as f32).to_bits()), words),
            Self::Double => order.split(value.as_float()?.to_bits(), words),
            Self::Stamp => match value {
                RegisterValue::Stamp(stamp) => order.split(stamp.timestamp_millis() as u64, words),
                other => order.split(other.as_int()? as u64, words),
            },
            Self::Array { len } => match value {
                RegisterValue::Words(values) if values.len() == usize::from(*len) => {
                    words.copy_from_slice(values);
                },
                other => return Err(mismatch(self, other)),
            },
            Self::Bit => words[0] = u16::from(value.as_bool()?),
            Self::BitArray { len } => match value {
                RegisterValue::Bits(bits) if bits.len() == usize::from(*len) => {
                    for (word, bit) in words.iter_mut().zip(bits) {
                        *word = u16::from(*bit);
                    }
                },
                other => return Err(mismatch(self, other)),
            },
        }
        Ok(())
    }
}

fn in_range(value: i64, min: i64, max: i64) -> Result<i64> {
    if value < min || value > max {
        return Err(ModbusError::register(format!(
            "{} outside {}..={}",
            value, min, max
        )));
    }
    Ok(value)
}

fn mismatch(kind: &RegisterKind, value: &RegisterValue) -> ModbusError {
    ModbusError::register(format!("{:?} cannot hold {:?}", kind, value))
}

/// Register declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSpec {
    pub table: Table,

    /// Zero-based wire address of the first word or bit
    pub address: u16,

    #[serde(flatten)]
    pub kind: RegisterKind,

    /// Refuse wire writes even in a writable table
    #[serde(default)]
    pub read_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<String>,
}

impl RegisterSpec {
    pub fn new(table: Table, address: u16, kind: RegisterKind) -> Self {
        Self {
            table,
            address,
            kind,
            read_only: false,
            point: None,
        }
    }

    pub fn with_point(mut self, point: impl Into<String>) -> Self {
        self.point = Some(point.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Whether the wire may write this register
    pub fn is_writable(&self) -> bool {
        self.table.is_writable() && !self.read_only
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Words(Vec<u16>),
    Bits(Vec<bool>),
    Stamp(DateTime<Utc>),
}

impl RegisterValue {
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(value) => Ok(*value),
            Self::Bool(value) => Ok(i64::from(*value)),
            Self::Float(value) if value.fract() == 0.0 => Ok(*value as i64),
            Self::Stamp(stamp) => Ok(stamp.timestamp_millis()),
            other => Err(ModbusError::register(format!("{:?} is not an integer", other))),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Self::Float(value) => Ok(*value),
            Self::Int(value) => Ok(*value as f64),
            other => Err(ModbusError::register(format!("{:?} is not a number", other))),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(value) => Ok(*value),
            Self::Int(value) => Ok(*value != 0),
            other => Err(ModbusError::register(format!("{:?} is not a boolean", other))),
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::Words(words) => write!(f, "{:04X?}", words),
            Self::Bits(bits) => {
                let text: String = bits.iter().map(|bit| if *bit { '1' } else { '0' }).collect();
                f.write_str(&text)
            },
            Self::Stamp(stamp) => write!(f, "{}", stamp.to_rfc3339()),
        }
    }
}
