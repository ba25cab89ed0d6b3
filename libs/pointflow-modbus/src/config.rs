//! Register map definitions
//!
//! ```yaml
//! word_order: CDAB
//! unit_id: 1
//! registers:
//!   - { table: holding_registers, address: 0, type: float, point: tank.level }
//!   - { table: holding_registers, address: 2, type: sequence, read_only: true }
//!   - { table: coils, address: 0, type: bit, point: pump.on }
//! ```

use std::path::Path;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::bank::RegisterBank;
use crate::error::{ModbusError, Result};
use crate::register::RegisterSpec;
use crate::word_order::WordOrder;

fn default_unit_id() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMapConfig {
    #[serde(default)]
    pub word_order: WordOrder,

    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    #[serde(default)]
    pub registers: Vec<RegisterSpec>,
}

impl Default for RegisterMapConfig {
    fn default() -> Self {
        Self {
            word_order: WordOrder::default(),
            unit_id: default_unit_id(),
            registers: Vec::new(),
        }
    }
}

impl RegisterMapConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                ModbusError::config(format!(
                    "Failed to load {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ModbusError::config(e.to_string()))
    }

    /// Declare every register in a new bank
    pub fn build_bank(&self) -> Result<RegisterBank> {
        let mut bank = RegisterBank::new(self.word_order);
        for spec in &self.registers {
            bank.declare(spec.clone())?;
        }
        Ok(bank)
    }
}
