//! Modbus protocol constants and device defaults
//!
//! Protocol limits follow the Modbus Application Protocol specification:
//! - Maximum PDU size: 253 bytes (inherited from RS485 ADU limit of 256 bytes)
//! - Register/coil limits are calculated to fit within the PDU size constraint
//!
//! Device defaults describe the emulated slave: one unit with four tables
//! of [`TABLE_CAPACITY`] cells each.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Bytes preceding the data counted by the MBAP length field
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) = 6 bytes
/// The Unit ID (byte 6) is counted by the length field itself
pub const MBAP_HEADER_LEN: usize = 6;

/// Full MBAP header including the Unit ID
pub const MBAP_HEADER_WITH_UNIT_LEN: usize = MBAP_HEADER_LEN + 1;

/// Protocol identifier carried by every Modbus/TCP frame
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum MBAP length field value (Unit ID + PDU) = 254 bytes
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Minimum MBAP length field value (Unit ID + Function Code)
pub const MIN_MBAP_LENGTH: usize = 2;

/// Initial capacity of a connection receive buffer
///
/// One maximal frame is 6 + 254 = 260 bytes; 512 leaves room for a
/// second pipelined frame to start arriving.
pub const RECEIVE_BUFFER_SIZE: usize = 512;

// ============================================================================
// Quantity Limits (per request)
// ============================================================================

/// FC03/FC04: 1 + 1 + N × 2 ≤ 253 → N ≤ 125
pub const MAX_READ_REGISTERS: usize = 125;

/// FC16: 1 + 2 + 2 + 1 + N × 2 ≤ 253 → N ≤ 123
pub const MAX_WRITE_REGISTERS: usize = 123;

/// FC01/FC02: specification caps at 2000 bits
pub const MAX_READ_COILS: usize = 2000;

/// FC15: specification caps at 0x7B0 coils
pub const MAX_WRITE_COILS: usize = 1968;

// ============================================================================
// Function Codes
// ============================================================================

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// High bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

/// FC05 value for ON
pub const COIL_ON: u16 = 0xFF00;

/// FC05 value for OFF
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Device Defaults
// ============================================================================

/// Cells per table on the emulated device
pub const TABLE_CAPACITY: usize = 100;

/// Modbus TCP default port
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Unit identifier served when none is configured
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Sensor simulator tick (5 seconds)
pub const DEFAULT_SIMULATION_INTERVAL_MS: u64 = 5000;

/// Telemetry defaults for input registers 0-9
///
/// temperature (°C × 10), humidity (% × 10), pressure (kPa), voltage (mV),
/// current (mA), power (W), energy counter (Wh), battery (%), CPU
/// temperature (°C), signal strength (%)
pub const INPUT_REGISTER_SEED: [u16; 10] = [1234, 567, 890, 2450, 1500, 3600, 12345, 98, 25, 85];

/// Configuration defaults for holding registers 0-9
///
/// enable flag, temperature setpoint, humidity setpoint, alarm threshold,
/// sample rate (s), reset counter, device address, baud rate, parity
/// (0 none, 1 odd, 2 even), stop bits
pub const HOLDING_REGISTER_SEED: [u16; 10] = [1, 100, 50, 1000, 5, 0, 12, 9600, 1, 1];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MBAP_HEADER_LEN, 6);
        assert_eq!(MBAP_HEADER_WITH_UNIT_LEN, 7);
        assert_eq!(MAX_MBAP_LENGTH, 254);
        assert!(RECEIVE_BUFFER_SIZE >= MBAP_HEADER_LEN + MAX_MBAP_LENGTH);
    }

    #[test]
    fn test_quantity_limits_fit_pdu() {
        assert!(1 + 1 + MAX_READ_REGISTERS * 2 <= MAX_PDU_SIZE);
        assert!(1 + 2 + 2 + 1 + MAX_WRITE_REGISTERS * 2 <= MAX_PDU_SIZE);
        assert!(1 + 1 + MAX_READ_COILS.div_ceil(8) <= MAX_PDU_SIZE);
        assert!(1 + 2 + 2 + 1 + MAX_WRITE_COILS.div_ceil(8) <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_seeds_fit_tables() {
        assert!(INPUT_REGISTER_SEED.len() <= TABLE_CAPACITY);
        assert!(HOLDING_REGISTER_SEED.len() <= TABLE_CAPACITY);
    }
}
