//! Modbus protocol definitions
//!
//! Function codes, exception codes and the decoded request type served by
//! the dispatcher. [`Request`] is a closed enum: each supported function
//! code is one variant, so adding or removing support is a change the
//! compiler checks at every `match`.

use std::fmt;

use crate::constants::{
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    FC_WRITE_MULTIPLE_COILS, FC_WRITE_MULTIPLE_REGISTERS, FC_WRITE_SINGLE_COIL,
    FC_WRITE_SINGLE_REGISTER, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};

/// Modbus slave/unit identifier
pub type SlaveId = u8;

/// MBAP transaction identifier
pub type TransactionId = u16;

/// Supported Modbus function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusFunction {
    ReadCoils = FC_READ_COILS,
    ReadDiscreteInputs = FC_READ_DISCRETE_INPUTS,
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    ReadInputRegisters = FC_READ_INPUT_REGISTERS,
    WriteSingleCoil = FC_WRITE_SINGLE_COIL,
    WriteSingleRegister = FC_WRITE_SINGLE_REGISTER,
    WriteMultipleCoils = FC_WRITE_MULTIPLE_COILS,
    WriteMultipleRegisters = FC_WRITE_MULTIPLE_REGISTERS,
}

impl ModbusFunction {
    /// Every function code the slave answers, in ascending order
    pub const ALL: [ModbusFunction; 8] = [
        Self::ReadCoils,
        Self::ReadDiscreteInputs,
        Self::ReadHoldingRegisters,
        Self::ReadInputRegisters,
        Self::WriteSingleCoil,
        Self::WriteSingleRegister,
        Self::WriteMultipleCoils,
        Self::WriteMultipleRegisters,
    ];

    pub fn from_u8(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.to_u8() == code)
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.to_u8())
    }
}

/// Modbus exception codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModbusException {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetFailed = 0x0B,
}

impl ModbusException {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::IllegalFunction),
            0x02 => Some(Self::IllegalDataAddress),
            0x03 => Some(Self::IllegalDataValue),
            0x04 => Some(Self::ServerDeviceFailure),
            0x05 => Some(Self::Acknowledge),
            0x06 => Some(Self::ServerDeviceBusy),
            0x08 => Some(Self::MemoryParityError),
            0x0A => Some(Self::GatewayPathUnavailable),
            0x0B => Some(Self::GatewayTargetFailed),
            _ => None,
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::ServerDeviceFailure => "Server Device Failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server Device Busy",
            Self::MemoryParityError => "Memory Parity Error",
            Self::GatewayPathUnavailable => "Gateway Path Unavailable",
            Self::GatewayTargetFailed => "Gateway Target Device Failed to Respond",
        }
    }
}

impl fmt::Display for ModbusException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.to_u8())
    }
}

/// A decoded request PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadCoils { address: u16, quantity: u16 },
    ReadDiscreteInputs { address: u16, quantity: u16 },
    ReadHoldingRegisters { address: u16, quantity: u16 },
    ReadInputRegisters { address: u16, quantity: u16 },
    /// `value` is the raw wire value; only 0x0000 and 0xFF00 are legal
    WriteSingleCoil { address: u16, value: u16 },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleCoils { address: u16, values: Vec<bool> },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
}

impl Request {
    /// Decode a request PDU (function code followed by payload)
    ///
    /// Unknown function codes yield [`ModbusException::IllegalFunction`];
    /// truncated payloads, inconsistent byte counts and quantities outside
    /// the protocol limits yield [`ModbusException::IllegalDataValue`].
    /// Address ranges are not checked here since they depend on the table.
    pub fn decode(pdu: &[u8]) -> Result<Self, ModbusException> {
        let (&code, payload) = pdu
            .split_first()
            .ok_or(ModbusException::IllegalFunction)?;
        let function = ModbusFunction::from_u8(code).ok_or(ModbusException::IllegalFunction)?;

        match function {
            ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs => {
                let (address, quantity) = read_pair(payload)?;
                check_quantity(quantity, MAX_READ_COILS)?;
                Ok(if function == ModbusFunction::ReadCoils {
                    Self::ReadCoils { address, quantity }
                } else {
                    Self::ReadDiscreteInputs { address, quantity }
                })
            }
            ModbusFunction::ReadHoldingRegisters | ModbusFunction::ReadInputRegisters => {
                let (address, quantity) = read_pair(payload)?;
                check_quantity(quantity, MAX_READ_REGISTERS)?;
                Ok(if function == ModbusFunction::ReadHoldingRegisters {
                    Self::ReadHoldingRegisters { address, quantity }
                } else {
                    Self::ReadInputRegisters { address, quantity }
                })
            }
            ModbusFunction::WriteSingleCoil => {
                let (address, value) = read_pair(payload)?;
                Ok(Self::WriteSingleCoil { address, value })
            }
            ModbusFunction::WriteSingleRegister => {
                let (address, value) = read_pair(payload)?;
                Ok(Self::WriteSingleRegister { address, value })
            }
            ModbusFunction::WriteMultipleCoils => {
                let (address, quantity, data) = read_block(payload)?;
                check_quantity(quantity, MAX_WRITE_COILS)?;
                if data.len() != (quantity as usize).div_ceil(8) {
                    return Err(ModbusException::IllegalDataValue);
                }
                Ok(Self::WriteMultipleCoils {
                    address,
                    values: unpack_bits(data, quantity as usize),
                })
            }
            ModbusFunction::WriteMultipleRegisters => {
                let (address, quantity, data) = read_block(payload)?;
                check_quantity(quantity, MAX_WRITE_REGISTERS)?;
                if data.len() != quantity as usize * 2 {
                    return Err(ModbusException::IllegalDataValue);
                }
                let values = data
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect();
                Ok(Self::WriteMultipleRegisters { address, values })
            }
        }
    }

    pub fn function(&self) -> ModbusFunction {
        match self {
            Self::ReadCoils { .. } => ModbusFunction::ReadCoils,
            Self::ReadDiscreteInputs { .. } => ModbusFunction::ReadDiscreteInputs,
            Self::ReadHoldingRegisters { .. } => ModbusFunction::ReadHoldingRegisters,
            Self::ReadInputRegisters { .. } => ModbusFunction::ReadInputRegisters,
            Self::WriteSingleCoil { .. } => ModbusFunction::WriteSingleCoil,
            Self::WriteSingleRegister { .. } => ModbusFunction::WriteSingleRegister,
            Self::WriteMultipleCoils { .. } => ModbusFunction::WriteMultipleCoils,
            Self::WriteMultipleRegisters { .. } => ModbusFunction::WriteMultipleRegisters,
        }
    }
}

fn read_pair(payload: &[u8]) -> Result<(u16, u16), ModbusException> {
    match payload {
        [a0, a1, b0, b1] => Ok((u16::from_be_bytes([*a0, *a1]), u16::from_be_bytes([*b0, *b1]))),
        _ => Err(ModbusException::IllegalDataValue),
    }
}

/// Starting address, quantity and the data following the byte count
fn read_block(payload: &[u8]) -> Result<(u16, u16, &[u8]), ModbusException> {
    if payload.len() < 5 {
        return Err(ModbusException::IllegalDataValue);
    }
    let (address, quantity) = read_pair(&payload[..4])?;
    let byte_count = payload[4] as usize;
    let data = &payload[5..];
    if data.len() != byte_count {
        return Err(ModbusException::IllegalDataValue);
    }
    Ok((address, quantity, data))
}

fn check_quantity(quantity: u16, max: usize) -> Result<(), ModbusException> {
    if quantity == 0 || quantity as usize > max {
        Err(ModbusException::IllegalDataValue)
    } else {
        Ok(())
    }
}

/// Pack bits LSB-first, eight per byte
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack `count` bits LSB-first
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_from_u8() {
        for function in ModbusFunction::ALL {
            assert_eq!(ModbusFunction::from_u8(function.to_u8()), Some(function));
        }
        assert_eq!(ModbusFunction::from_u8(0x07), None);
        assert_eq!(ModbusFunction::from_u8(0x2B), None);
        assert_eq!(ModbusFunction::from_u8(0x83), None);
    }

    #[test]
    fn test_decode_read_request() {
        let request = Request::decode(&[0x03, 0x00, 0x6B, 0x00, 0x03]).unwrap();
        assert_eq!(
            request,
            Request::ReadHoldingRegisters {
                address: 0x6B,
                quantity: 3
            }
        );
        assert_eq!(request.function(), ModbusFunction::ReadHoldingRegisters);
    }

    #[test]
    fn test_decode_unknown_function() {
        assert_eq!(
            Request::decode(&[0x2B, 0x0E, 0x01, 0x00]),
            Err(ModbusException::IllegalFunction)
        );
        assert_eq!(Request::decode(&[]), Err(ModbusException::IllegalFunction));
    }

    #[test]
    fn test_decode_quantity_limits() {
        assert_eq!(
            Request::decode(&[0x04, 0x00, 0x00, 0x00, 0x00]),
            Err(ModbusException::IllegalDataValue)
        );
        // 126 registers
        assert_eq!(
            Request::decode(&[0x03, 0x00, 0x00, 0x00, 0x7E]),
            Err(ModbusException::IllegalDataValue)
        );
        // 2000 coils is the last legal count
        assert!(Request::decode(&[0x01, 0x00, 0x00, 0x07, 0xD0]).is_ok());
        assert_eq!(
            Request::decode(&[0x01, 0x00, 0x00, 0x07, 0xD1]),
            Err(ModbusException::IllegalDataValue)
        );
    }

    #[test]
    fn test_decode_truncated_payload() {
        assert_eq!(
            Request::decode(&[0x06, 0x00, 0x01, 0x00]),
            Err(ModbusException::IllegalDataValue)
        );
        assert_eq!(
            Request::decode(&[0x06, 0x00, 0x01, 0x00, 0x7B, 0x00]),
            Err(ModbusException::IllegalDataValue)
        );
    }

    #[test]
    fn test_decode_write_multiple_coils() {
        // 10 coils starting at 0x13: CD 01 -> 1011 0011 10
        let request =
            Request::decode(&[0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01]).unwrap();
        assert_eq!(
            request,
            Request::WriteMultipleCoils {
                address: 0x13,
                values: vec![true, false, true, true, false, false, true, true, true, false],
            }
        );
    }

    #[test]
    fn test_decode_write_multiple_coils_byte_count_mismatch() {
        assert_eq!(
            Request::decode(&[0x0F, 0x00, 0x13, 0x00, 0x0A, 0x01, 0xCD]),
            Err(ModbusException::IllegalDataValue)
        );
    }

    #[test]
    fn test_decode_write_multiple_registers() {
        let request = Request::decode(&[
            0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02,
        ])
        .unwrap();
        assert_eq!(
            request,
            Request::WriteMultipleRegisters {
                address: 1,
                values: vec![0x000A, 0x0102],
            }
        );

        // Quantity says 2 registers but only one follows
        assert_eq!(
            Request::decode(&[0x10, 0x00, 0x01, 0x00, 0x02, 0x02, 0x00, 0x0A]),
            Err(ModbusException::IllegalDataValue)
        );
    }

    #[test]
    fn test_pack_unpack_bits() {
        let bits = [true, false, true, false, false, false, false, false, true];
        let packed = pack_bits(&bits);
        assert_eq!(packed, vec![0x05, 0x01]);
        assert_eq!(unpack_bits(&packed, bits.len()), bits.to_vec());
    }

    #[test]
    fn test_exception_display() {
        assert_eq!(
            ModbusException::IllegalDataAddress.to_string(),
            "Illegal Data Address (0x02)"
        );
        assert_eq!(ModbusException::from_u8(0x0B), Some(ModbusException::GatewayTargetFailed));
        assert_eq!(ModbusException::from_u8(0x07), None);
    }
}
