//! Hex text helpers for frame dumps

use std::fmt::Write;

use crate::error::{ConfigError, Result};

/// Encode bytes as space separated uppercase pairs
/// Example: [0x12, 0x34, 0xAB] -> "12 34 AB"
pub fn encode_spaced(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        // Writing to String buffer is infallible
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Decode hex text, ignoring whitespace, `:` and `-` separators and an optional `0x` prefix
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(ConfigError::invalid_value(format!(
            "Odd number of hex digits in '{}'",
            text
        )));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let high = nibble(pair[0]);
            let low = nibble(pair[1]);
            match (high, low) {
                (Some(h), Some(l)) => Ok((h << 4) | l),
                _ => Err(ConfigError::invalid_value(format!(
                    "Invalid hex digits '{}{}'",
                    pair[0] as char, pair[1] as char
                ))),
            }
        })
        .collect()
}

fn nibble(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_encode_spaced() {
        assert_eq!(encode_spaced(&[0x12, 0x34, 0xAB]), "12 34 AB");
        assert_eq!(encode_spaced(&[]), "");
        assert_eq!(encode_spaced(&[0x0F]), "0F");
    }

    #[test]
    fn test_decode_separators() {
        assert_eq!(decode("0x0103").unwrap(), vec![0x01, 0x03]);
        assert_eq!(decode("01 03 08 2b").unwrap(), vec![0x01, 0x03, 0x08, 0x2B]);
        assert_eq!(decode("01:03-ff").unwrap(), vec![0x01, 0x03, 0xFF]);
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode("010"), Err(ConfigError::InvalidValue(_))));
        assert!(matches!(decode("0G"), Err(ConfigError::InvalidValue(_))));
    }
}
