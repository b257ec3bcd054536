//! Response PDU data structure
//!
//! Responses are built on a fixed-size stack array to avoid heap
//! allocation on the per-request path.

use tracing::debug;

use crate::constants::{EXCEPTION_FLAG, MAX_PDU_SIZE};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{pack_bits, ModbusException, ModbusFunction};

/// PDU with stack-allocated fixed array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    /// Fixed-size buffer (stack)
    data: [u8; MAX_PDU_SIZE],
    /// Actual data length
    len: usize,
}

impl ModbusPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from a byte slice
    pub fn from_slice(data: &[u8]) -> ModbusResult<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::Protocol {
                message: format!("PDU too large: {} bytes (max {})", data.len(), MAX_PDU_SIZE),
            });
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();
        Ok(pdu)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(ModbusError::Protocol {
                message: "PDU buffer full".to_string(),
            });
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ModbusResult<()> {
        self.extend(&value.to_be_bytes())
    }

    /// Extend with a byte slice
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> ModbusResult<()> {
        if self.len + data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::Protocol {
                message: format!(
                    "PDU would exceed max size: {} + {} > {}",
                    self.len,
                    data.len(),
                    MAX_PDU_SIZE
                ),
            });
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        if self.len > 0 {
            Some(self.data[0])
        } else {
            None
        }
    }

    /// Check if exception response
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .map(|fc| fc & EXCEPTION_FLAG != 0)
            .unwrap_or(false)
    }

    /// Get exception code
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() && self.len > 1 {
            Some(self.data[1])
        } else {
            None
        }
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            pdu: ModbusPdu::new(),
        }
    }

    #[inline]
    pub fn function_code(mut self, fc: u8) -> ModbusResult<Self> {
        self.pdu.push(fc)?;
        Ok(self)
    }

    #[inline]
    pub fn address(mut self, addr: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(addr)?;
        Ok(self)
    }

    #[inline]
    pub fn word(mut self, value: u16) -> ModbusResult<Self> {
        self.pdu.push_u16(value)?;
        Ok(self)
    }

    #[inline]
    pub fn byte(mut self, b: u8) -> ModbusResult<Self> {
        self.pdu.push(b)?;
        Ok(self)
    }

    #[inline]
    pub fn data(mut self, data: &[u8]) -> ModbusResult<Self> {
        self.pdu.extend(data)?;
        Ok(self)
    }

    #[inline]
    pub fn build(self) -> ModbusPdu {
        if let Some(fc) = self.pdu.function_code() {
            debug!(
                "PDU built: FC={:02X}{}, total_len={}",
                fc,
                if self.pdu.is_exception() { " (exception)" } else { "" },
                self.pdu.len()
            );
        }
        self.pdu
    }

    /// FC01/FC02 response: byte count followed by bits packed LSB-first
    pub fn read_bits_response(function: ModbusFunction, bits: &[bool]) -> ModbusResult<ModbusPdu> {
        let packed = pack_bits(bits);
        Ok(PduBuilder::new()
            .function_code(function.to_u8())?
            .byte(packed.len() as u8)?
            .data(&packed)?
            .build())
    }

    /// FC03/FC04 response: byte count followed by big-endian registers
    pub fn read_registers_response(
        function: ModbusFunction,
        registers: &[u16],
    ) -> ModbusResult<ModbusPdu> {
        let mut builder = PduBuilder::new()
            .function_code(function.to_u8())?
            .byte((registers.len() * 2) as u8)?;
        for &value in registers {
            builder = builder.word(value)?;
        }
        Ok(builder.build())
    }

    /// FC05/FC06 echo and FC15/FC16 address + quantity response
    pub fn echo_response(function: ModbusFunction, address: u16, value: u16) -> ModbusResult<ModbusPdu> {
        Ok(PduBuilder::new()
            .function_code(function.to_u8())?
            .address(address)?
            .word(value)?
            .build())
    }

    /// Exception response: function code with the high bit set, then the code
    ///
    /// Takes the raw function byte so unsupported codes can be answered too.
    pub fn exception_response(function_code: u8, exception: ModbusException) -> ModbusPdu {
        let mut pdu = ModbusPdu::new();
        pdu.data[0] = function_code | EXCEPTION_FLAG;
        pdu.data[1] = exception.to_u8();
        pdu.len = 2;
        debug!(
            "PDU built: FC={:02X} (exception), code={:02X}",
            pdu.data[0], pdu.data[1]
        );
        pdu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdu_basic_operations() {
        let mut pdu = ModbusPdu::new();
        assert!(pdu.is_empty());

        pdu.push(0x03).unwrap();
        assert_eq!(pdu.function_code(), Some(0x03));
        assert!(!pdu.is_exception());

        pdu.push_u16(0x0100).unwrap();
        pdu.push_u16(0x000A).unwrap();
        assert_eq!(pdu.as_slice(), &[0x03, 0x01, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn test_pdu_overflow() {
        let mut pdu = ModbusPdu::from_slice(&[0u8; MAX_PDU_SIZE]).unwrap();
        assert!(pdu.push(0x00).is_err());
        assert!(ModbusPdu::from_slice(&[0u8; MAX_PDU_SIZE + 1]).is_err());
    }

    #[test]
    fn test_read_registers_response() {
        let pdu =
            PduBuilder::read_registers_response(ModbusFunction::ReadInputRegisters, &[1234, 567, 890])
                .unwrap();
        assert_eq!(
            pdu.as_slice(),
            &[0x04, 0x06, 0x04, 0xD2, 0x02, 0x37, 0x03, 0x7A]
        );
    }

    #[test]
    fn test_read_bits_response() {
        let bits = [true, false, true, false, true, false, true, false, true, false];
        let pdu = PduBuilder::read_bits_response(ModbusFunction::ReadDiscreteInputs, &bits).unwrap();
        assert_eq!(pdu.as_slice(), &[0x02, 0x02, 0x55, 0x01]);
    }

    #[test]
    fn test_echo_response() {
        let pdu = PduBuilder::echo_response(ModbusFunction::WriteSingleCoil, 0x00AC, 0xFF00).unwrap();
        assert_eq!(pdu.as_slice(), &[0x05, 0x00, 0xAC, 0xFF, 0x00]);
    }

    #[test]
    fn test_exception_response() {
        let pdu = PduBuilder::exception_response(0x03, ModbusException::IllegalDataAddress);
        assert!(pdu.is_exception());
        assert_eq!(pdu.exception_code(), Some(0x02));
        assert_eq!(pdu.as_slice(), &[0x83, 0x02]);

        let pdu = PduBuilder::exception_response(0x2B, ModbusException::IllegalFunction);
        assert_eq!(pdu.as_slice(), &[0xAB, 0x01]);
    }
}
