//! Register bank: an arena of declared registers over the four tables
//!
//! ```text
//!   tables[t]: address ──▶ register index ──▶ Register { spec, offset }
//!                                                          │
//!   content:  [ w0 w1 w2 w3 | w0 | w0 w1 | ... ] ◀─────────┘
//! ```
//!
//! Every address a register covers is indexed, so array members (minions)
//! resolve to their array with the address difference as the word offset.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{ModbusError, Result};
use crate::pdu::ExceptionCode;
use crate::register::{RegisterKind, RegisterSpec, RegisterValue, Table};
use crate::word_order::WordOrder;

/// Result of an access from the wire
pub type WireResult<T> = std::result::Result<T, ExceptionCode>;

#[derive(Debug, Clone)]
struct Register {
    spec: RegisterSpec,
    offset: usize,
}

impl Register {
    fn width(&self) -> usize {
        usize::from(self.spec.kind.width())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterBank {
    word_order: WordOrder,
    registers: Vec<Register>,
    content: Vec<u16>,
    tables: [BTreeMap<u16, usize>; 4],
    points: FxHashMap<String, usize>,
}

impl RegisterBank {
    pub fn new(word_order: WordOrder) -> Self {
        Self {
            word_order,
            ..Self::default()
        }
    }

    pub fn word_order(&self) -> WordOrder {
        self.word_order
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Add a register, rejecting overlaps with earlier declarations
    pub fn declare(&mut self, spec: RegisterSpec) -> Result<()> {
        let kind = spec.kind;
        if kind.is_bit() != spec.table.is_bits() {
            return Err(ModbusError::config(format!(
                "{:?} register cannot live in {}",
                kind, spec.table
            )));
        }
        if kind.width() == 0 {
            return Err(ModbusError::config(format!(
                "Empty register at {} {}",
                spec.table, spec.address
            )));
        }
        let end = u32::from(spec.address) + u32::from(kind.width());
        if end > 0x1_0000 {
            return Err(ModbusError::config(format!(
                "Register at {} {} runs past the last address",
                spec.table, spec.address
            )));
        }
        let last = (end - 1) as u16;

        let index = &mut self.tables[spec.table.index()];
        if let Some((&address, _)) = index.range(spec.address..=last).next() {
            return Err(ModbusError::Overlap {
                table: spec.table,
                address,
            });
        }

        match &spec.point {
            Some(_) if kind.is_bank_managed() => {
                return Err(ModbusError::config(format!(
                    "{:?} register at {} {} cannot map a point",
                    kind, spec.table, spec.address
                )));
            },
            Some(point) if self.points.contains_key(point) => {
                return Err(ModbusError::config(format!(
                    "Point {} mapped twice",
                    point
                )));
            },
            _ => {},
        }

        let id = self.registers.len();
        for address in spec.address..=last {
            index.insert(address, id);
        }
        if let Some(point) = &spec.point {
            self.points.insert(point.clone(), id);
        }
        debug!(
            "Register declared: {} {}..={} {:?} point={:?}",
            spec.table, spec.address, last, kind, spec.point
        );

        let offset = self.content.len();
        self.content.resize(offset + usize::from(kind.width()), 0);
        self.registers.push(Register { spec, offset });
        Ok(())
    }

    /// Register covering an address, with the word offset inside it
    pub fn register_at(&self, table: Table, address: u16) -> Option<(&RegisterSpec, u16)> {
        let id = *self.tables[table.index()].get(&address)?;
        let spec = &self.registers[id].spec;
        Some((spec, address - spec.address))
    }

    pub fn specs(&self) -> impl Iterator<Item = &RegisterSpec> {
        self.registers.iter().map(|register| &register.spec)
    }

    fn words(&self, register: &Register) -> &[u16] {
        &self.content[register.offset..register.offset + register.width()]
    }

    fn point_register(&self, point: &str) -> Result<usize> {
        self.points
            .get(point)
            .copied()
            .ok_or_else(|| ModbusError::UnknownPoint(point.to_string()))
    }

    pub fn point_value(&self, point: &str) -> Result<RegisterValue> {
        let register = &self.registers[self.point_register(point)?];
        Ok(register.spec.kind.decode(self.word_order, self.words(register)))
    }

    /// Update a point's register and bump every sequence register
    pub fn set_point_value(&mut self, point: &str, value: RegisterValue) -> Result<()> {
        let id = self.point_register(point)?;
        let register = &self.registers[id];
        let range = register.offset..register.offset + register.width();
        register
            .spec
            .kind
            .encode(self.word_order, &value, &mut self.content[range])?;
        trace!("Point {} set to {}", point, value);

        for register in &self.registers {
            if register.spec.kind == RegisterKind::Sequence {
                let word = &mut self.content[register.offset];
                *word = word.wrapping_add(1);
            }
        }
        Ok(())
    }

    /// Write the update stamp into every stamp register
    pub fn set_stamp(&mut self, stamp: DateTime<Utc>) -> Result<()> {
        let value = RegisterValue::Stamp(stamp);
        for register in &self.registers {
            if register.spec.kind == RegisterKind::Stamp {
                let range = register.offset..register.offset + register.width();
                register
                    .spec
                    .kind
                    .encode(self.word_order, &value, &mut self.content[range])?;
            }
        }
        trace!("Stamp registers set to {}", stamp.to_rfc3339());
        Ok(())
    }

    /// Content slots for `quantity` addresses, each with its register
    fn slots(
        &self,
        table: Table,
        address: u16,
        quantity: u16,
    ) -> WireResult<Vec<(usize, usize)>> {
        let index = &self.tables[table.index()];
        (0..quantity)
            .map(|n| {
                let address = address
                    .checked_add(n)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                let id = *index
                    .get(&address)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                let register = &self.registers[id];
                Ok((id, register.offset + usize::from(address - register.spec.address)))
            })
            .collect()
    }

    fn writable_slots(
        &self,
        table: Table,
        address: u16,
        quantity: u16,
    ) -> WireResult<Vec<(usize, usize)>> {
        let slots = self.slots(table, address, quantity)?;
        if slots
            .iter()
            .any(|&(id, _)| !self.registers[id].spec.is_writable())
        {
            debug!("Write refused at {} {}", table, address);
            return Err(ExceptionCode::IllegalDataAddress);
        }
        Ok(slots)
    }

    fn store(&mut self, (id, slot): (usize, usize), value: u16) {
        let mask = self.registers[id].spec.kind.write_mask();
        let word = &mut self.content[slot];
        *word = (*word & !mask) | (value & mask);
    }

    pub fn read_bits(&self, table: Table, address: u16, quantity: u16) -> WireResult<Vec<bool>> {
        if !table.is_bits() {
            return Err(ExceptionCode::IllegalFunction);
        }
        Ok(self
            .slots(table, address, quantity)?
            .into_iter()
            .map(|(_, slot)| self.content[slot] != 0)
            .collect())
    }

    pub fn read_words(&self, table: Table, address: u16, quantity: u16) -> WireResult<Vec<u16>> {
        if table.is_bits() {
            return Err(ExceptionCode::IllegalFunction);
        }
        Ok(self
            .slots(table, address, quantity)?
            .into_iter()
            .map(|(_, slot)| self.content[slot])
            .collect())
    }

    /// Write coils; nothing changes unless every target is writable
    pub fn write_bits(&mut self, address: u16, values: &[bool]) -> WireResult<()> {
        let slots = self.writable_slots(Table::Coils, address, values.len() as u16)?;
        for (slot, value) in slots.into_iter().zip(values) {
            self.store(slot, u16::from(*value));
        }
        Ok(())
    }

    /// Write holding registers; nothing changes unless every target is writable
    pub fn write_words(&mut self, address: u16, values: &[u16]) -> WireResult<()> {
        let slots = self.writable_slots(Table::HoldingRegisters, address, values.len() as u16)?;
        for (slot, value) in slots.into_iter().zip(values) {
            self.store(slot, *value);
        }
        Ok(())
    }

    /// `(current AND and_mask) OR (or_mask AND NOT and_mask)` on one holding register
    pub fn mask_write(&mut self, address: u16, and_mask: u16, or_mask: u16) -> WireResult<()> {
        let slots = self.writable_slots(Table::HoldingRegisters, address, 1)?;
        let slot = slots[0];
        let current = self.content[slot.1];
        self.store(slot, (current & and_mask) | (or_mask & !and_mask));
        Ok(())
    }
}
