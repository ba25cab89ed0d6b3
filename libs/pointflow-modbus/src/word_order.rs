//! Word order for multi-register values
//!
//! Bytes inside a register are always big-endian on the wire. Only the
//! order of the 16-bit words differs between devices.
//!
//! For the 64-bit value `0x1122334455667788`:
//! - `BigEndian` (ABCD...): `[0x1122, 0x3344, 0x5566, 0x7788]`
//! - `MiddleEndian` (CDAB...): `[0x7788, 0x5566, 0x3344, 0x1122]`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModbusError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WordOrder {
    /// Most significant word first
    #[default]
    BigEndian,

    /// Least significant word first, a common PLC layout
    MiddleEndian,
}

impl WordOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD",
            Self::MiddleEndian => "CDAB",
        }
    }

    pub fn is_middle_endian(&self) -> bool {
        matches!(self, Self::MiddleEndian)
    }

    /// Split the low `words.len() * 16` bits of `value` into words
    pub fn split(&self, value: u64, words: &mut [u16]) {
        let count = words.len();
        for (i, word) in words.iter_mut().enumerate() {
            let shift = match self {
                Self::BigEndian => 16 * (count - 1 - i),
                Self::MiddleEndian => 16 * i,
            };
            *word = (value >> shift) as u16;
        }
    }

    /// Join up to four words into an unsigned value
    pub fn join(&self, words: &[u16]) -> u64 {
        let fold = |value: u64, word: &u16| (value << 16) | u64::from(*word);
        match self {
            Self::BigEndian => words.iter().fold(0, fold),
            Self::MiddleEndian => words.iter().rev().fold(0, fold),
        }
    }
}

impl FromStr for WordOrder {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_uppercase().replace('-', "");
        match normalized.as_str() {
            "ABCD" | "ABCDEFGH" | "BE" | "BIG_ENDIAN" | "BIGENDIAN" => Ok(Self::BigEndian),
            "CDAB" | "GHEFCDAB" | "ME" | "MIDDLE_ENDIAN" | "MIDDLEENDIAN" => {
                Ok(Self::MiddleEndian)
            },
            _ => Err(ModbusError::config(format!("Unknown word order: {}", s))),
        }
    }
}

impl TryFrom<String> for WordOrder {
    type Error = ModbusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WordOrder> for String {
    fn from(order: WordOrder) -> Self {
        order.as_str().to_string()
    }
}

impl fmt::Display for WordOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("ABCD".parse::<WordOrder>().unwrap(), WordOrder::BigEndian);
        assert_eq!("be".parse::<WordOrder>().unwrap(), WordOrder::BigEndian);
        assert_eq!("CD-AB".parse::<WordOrder>().unwrap(), WordOrder::MiddleEndian);
        assert_eq!("ME".parse::<WordOrder>().unwrap(), WordOrder::MiddleEndian);
        assert!("DCBA".parse::<WordOrder>().is_err());
    }

    #[test]
    fn test_split_and_join_32_bits() {
        let mut words = [0u16; 2];
        WordOrder::MiddleEndian.split(0x1234_5678, &mut words);
        assert_eq!(words, [0x5678, 0x1234]);
        assert_eq!(WordOrder::MiddleEndian.join(&words), 0x1234_5678);

        WordOrder::BigEndian.split(0x1234_5678, &mut words);
        assert_eq!(words, [0x1234, 0x5678]);
        assert_eq!(WordOrder::BigEndian.join(&words), 0x1234_5678);
    }

    #[test]
    fn test_serde_names() {
        let order: WordOrder = serde_yaml::from_str("CDAB").unwrap();
        assert_eq!(order, WordOrder::MiddleEndian);
        assert_eq!(serde_yaml::to_string(&order).unwrap().trim(), "CDAB");
    }
}
