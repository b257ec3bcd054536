//! # Register Store
//!
//! Four independently addressed tables per unit:
//!
//! | Kind | Cell | Access |
//! |------|------|--------|
//! | Coil | `bool` | read/write |
//! | Discrete Input | `bool` | read-only |
//! | Input Register | `u16` | read-only |
//! | Holding Register | `u16` | read/write |
//!
//! Every access is bounds-checked against the table capacity before any
//! cell is touched, so a failing write never applies partially.
//!
//! The store itself is not synchronized; see [`crate::context::SlaveContext`].

use std::fmt;

use crate::constants::{HOLDING_REGISTER_SEED, INPUT_REGISTER_SEED, TABLE_CAPACITY};
use crate::error::{ModbusError, ModbusResult};

/// The four Modbus data tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    Coil,
    DiscreteInput,
    InputRegister,
    HoldingRegister,
}

impl RegisterKind {
    /// Whether clients may write this table
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }

    /// Whether cells are single bits
    pub fn is_bit(self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coil => "coils",
            Self::DiscreteInput => "discrete_inputs",
            Self::InputRegister => "input_registers",
            Self::HoldingRegister => "holding_registers",
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-capacity sequence of cells addressed from zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTable<T> {
    kind: RegisterKind,
    cells: Vec<T>,
}

impl<T: Copy> RegisterTable<T> {
    pub fn new(kind: RegisterKind, len: usize, fill: T) -> Self {
        Self {
            kind,
            cells: vec![fill; len],
        }
    }

    /// Table holding `values` followed by `fill` up to `len` cells
    pub fn from_values(kind: RegisterKind, len: usize, values: &[T], fill: T) -> Self {
        let mut table = Self::new(kind, len, fill);
        let n = values.len().min(len);
        table.cells[..n].copy_from_slice(&values[..n]);
        table
    }

    #[inline]
    pub fn kind(&self) -> RegisterKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn span(&self, offset: u16, count: usize) -> ModbusResult<std::ops::Range<usize>> {
        let start = offset as usize;
        match start.checked_add(count) {
            Some(end) if end <= self.cells.len() => Ok(start..end),
            _ => Err(ModbusError::AddressOutOfRange {
                kind: self.kind,
                offset,
                count,
                capacity: self.cells.len(),
            }),
        }
    }

    pub fn read(&self, offset: u16, count: usize) -> ModbusResult<Vec<T>> {
        let range = self.span(offset, count)?;
        Ok(self.cells[range].to_vec())
    }

    pub fn write(&mut self, offset: u16, values: &[T]) -> ModbusResult<()> {
        let range = self.span(offset, values.len())?;
        self.cells[range].copy_from_slice(values);
        Ok(())
    }

    /// Single cell, `None` when out of range
    pub fn get(&self, offset: u16) -> Option<T> {
        self.cells.get(offset as usize).copied()
    }
}

/// Data tables of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterStore {
    coils: RegisterTable<bool>,
    discrete_inputs: RegisterTable<bool>,
    input_registers: RegisterTable<u16>,
    holding_registers: RegisterTable<u16>,
}

impl RegisterStore {
    /// Zeroed store with `capacity` cells per table
    pub fn new(capacity: usize) -> Self {
        Self {
            coils: RegisterTable::new(RegisterKind::Coil, capacity, false),
            discrete_inputs: RegisterTable::new(RegisterKind::DiscreteInput, capacity, false),
            input_registers: RegisterTable::new(RegisterKind::InputRegister, capacity, 0),
            holding_registers: RegisterTable::new(RegisterKind::HoldingRegister, capacity, 0),
        }
    }

    /// Initial image of the emulated device
    ///
    /// - coils: all off
    /// - discrete inputs: on, off, on, off, ...
    /// - input registers: telemetry defaults, then zeros
    /// - holding registers: configuration defaults, then zeros
    pub fn seeded() -> Self {
        let pattern: Vec<bool> = (0..TABLE_CAPACITY).map(|i| i % 2 == 0).collect();
        Self {
            coils: RegisterTable::new(RegisterKind::Coil, TABLE_CAPACITY, false),
            discrete_inputs: RegisterTable::from_values(
                RegisterKind::DiscreteInput,
                TABLE_CAPACITY,
                &pattern,
                false,
            ),
            input_registers: RegisterTable::from_values(
                RegisterKind::InputRegister,
                TABLE_CAPACITY,
                &INPUT_REGISTER_SEED,
                0,
            ),
            holding_registers: RegisterTable::from_values(
                RegisterKind::HoldingRegister,
                TABLE_CAPACITY,
                &HOLDING_REGISTER_SEED,
                0,
            ),
        }
    }

    /// Capacity of the given table
    pub fn capacity(&self, kind: RegisterKind) -> usize {
        match kind {
            RegisterKind::Coil => self.coils.len(),
            RegisterKind::DiscreteInput => self.discrete_inputs.len(),
            RegisterKind::InputRegister => self.input_registers.len(),
            RegisterKind::HoldingRegister => self.holding_registers.len(),
        }
    }

    fn bit_table(&self, kind: RegisterKind) -> ModbusResult<&RegisterTable<bool>> {
        match kind {
            RegisterKind::Coil => Ok(&self.coils),
            RegisterKind::DiscreteInput => Ok(&self.discrete_inputs),
            _ => Err(ModbusError::IllegalOperation {
                kind,
                operation: "bit access",
            }),
        }
    }

    fn register_table(&self, kind: RegisterKind) -> ModbusResult<&RegisterTable<u16>> {
        match kind {
            RegisterKind::InputRegister => Ok(&self.input_registers),
            RegisterKind::HoldingRegister => Ok(&self.holding_registers),
            _ => Err(ModbusError::IllegalOperation {
                kind,
                operation: "register access",
            }),
        }
    }

    pub fn read_bits(&self, kind: RegisterKind, offset: u16, count: usize) -> ModbusResult<Vec<bool>> {
        self.bit_table(kind)?.read(offset, count)
    }

    pub fn read_registers(
        &self,
        kind: RegisterKind,
        offset: u16,
        count: usize,
    ) -> ModbusResult<Vec<u16>> {
        self.register_table(kind)?.read(offset, count)
    }

    /// Client-facing bit write; only coils are writable
    pub fn write_bits(&mut self, kind: RegisterKind, offset: u16, values: &[bool]) -> ModbusResult<()> {
        check_writable(kind, true)?;
        self.coils.write(offset, values)
    }

    /// Client-facing register write; only holding registers are writable
    pub fn write_registers(
        &mut self,
        kind: RegisterKind,
        offset: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        check_writable(kind, false)?;
        self.holding_registers.write(offset, values)
    }

    /// Device-side update of input registers (sensor simulation)
    pub fn set_input_registers(&mut self, offset: u16, values: &[u16]) -> ModbusResult<()> {
        self.input_registers.write(offset, values)
    }

    /// Device-side update of discrete inputs
    pub fn set_discrete_inputs(&mut self, offset: u16, values: &[bool]) -> ModbusResult<()> {
        self.discrete_inputs.write(offset, values)
    }

    pub fn input_register(&self, offset: u16) -> Option<u16> {
        self.input_registers.get(offset)
    }

    pub fn holding_register(&self, offset: u16) -> Option<u16> {
        self.holding_registers.get(offset)
    }
}

/// Coils are the only writable bit table, holding registers the only
/// writable word table
fn check_writable(kind: RegisterKind, bit: bool) -> ModbusResult<()> {
    if kind.is_writable() && kind.is_bit() == bit {
        Ok(())
    } else {
        Err(ModbusError::IllegalOperation {
            kind,
            operation: "write",
        })
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::seeded()
    }
}
