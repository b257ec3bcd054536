//! Request dispatcher
//!
//! Turns one request PDU into exactly one response PDU. Checks run in a
//! fixed order and the first failure becomes the exception code:
//!
//! 1. unit id must be served (`0x0B` Gateway Target Device Failed)
//! 2. function code must be supported (`0x01` Illegal Function)
//! 3. payload shape and quantity limits (`0x03` Illegal Data Value);
//!    a count over the protocol limit answers `0x03` even when it also
//!    overruns the table
//! 4. address span must fit the table (`0x02` Illegal Data Address)
//! 5. value domain, e.g. FC05 value 0x0000/0xFF00 (`0x03`)
//!
//! Dispatch is stateless across requests; all state lives in the
//! [`ServerContext`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::{COIL_OFF, COIL_ON};
use crate::context::{ServerContext, SlaveContext};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::{ModbusPdu, PduBuilder};
use crate::protocol::{ModbusException, Request, SlaveId};
use crate::store::{RegisterKind, RegisterStore};

/// Executes decoded requests against the server context
#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: Arc<ServerContext>,
}

impl Dispatcher {
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Answer a request PDU addressed to `unit_id`
    ///
    /// Never fails: every problem is expressed as an exception PDU.
    pub fn dispatch(&self, unit_id: SlaveId, pdu: &[u8]) -> ModbusPdu {
        let function_code = pdu.first().copied().unwrap_or_default();

        let Some(slave) = self.context.get(unit_id) else {
            warn!("Request for unknown unit {} (FC={:02X})", unit_id, function_code);
            return PduBuilder::exception_response(function_code, ModbusException::GatewayTargetFailed);
        };

        let request = match Request::decode(pdu) {
            Ok(request) => request,
            Err(exception) => {
                debug!(
                    "Rejected request FC={:02X} for unit {}: {}",
                    function_code, unit_id, exception
                );
                return PduBuilder::exception_response(function_code, exception);
            }
        };

        debug!("Unit {}: {:?}", unit_id, request);

        match execute(slave, &request) {
            Ok(response) => response,
            Err(e) => {
                let exception = e.to_exception();
                debug!(
                    "Unit {}: {} failed: {} -> {}",
                    unit_id,
                    request.function(),
                    e,
                    exception
                );
                PduBuilder::exception_response(function_code, exception)
            }
        }
    }
}

fn execute(slave: &SlaveContext, request: &Request) -> ModbusResult<ModbusPdu> {
    let function = request.function();

    match request {
        Request::ReadCoils { address, quantity } => {
            let bits = slave.read(|s| s.read_bits(RegisterKind::Coil, *address, *quantity as usize))?;
            PduBuilder::read_bits_response(function, &bits)
        }
        Request::ReadDiscreteInputs { address, quantity } => {
            let bits = slave
                .read(|s| s.read_bits(RegisterKind::DiscreteInput, *address, *quantity as usize))?;
            PduBuilder::read_bits_response(function, &bits)
        }
        Request::ReadHoldingRegisters { address, quantity } => {
            let registers = slave.read(|s| {
                s.read_registers(RegisterKind::HoldingRegister, *address, *quantity as usize)
            })?;
            PduBuilder::read_registers_response(function, &registers)
        }
        Request::ReadInputRegisters { address, quantity } => {
            let registers = slave.read(|s| {
                s.read_registers(RegisterKind::InputRegister, *address, *quantity as usize)
            })?;
            PduBuilder::read_registers_response(function, &registers)
        }
        Request::WriteSingleCoil { address, value } => {
            slave.write(|s| {
                check_span(s, RegisterKind::Coil, *address, 1)?;
                let state = coil_state(*value)?;
                s.write_bits(RegisterKind::Coil, *address, &[state])
            })?;
            PduBuilder::echo_response(function, *address, *value)
        }
        Request::WriteSingleRegister { address, value } => {
            slave.write(|s| s.write_registers(RegisterKind::HoldingRegister, *address, &[*value]))?;
            PduBuilder::echo_response(function, *address, *value)
        }
        Request::WriteMultipleCoils { address, values } => {
            slave.write(|s| s.write_bits(RegisterKind::Coil, *address, values))?;
            PduBuilder::echo_response(function, *address, values.len() as u16)
        }
        Request::WriteMultipleRegisters { address, values } => {
            slave.write(|s| s.write_registers(RegisterKind::HoldingRegister, *address, values))?;
            PduBuilder::echo_response(function, *address, values.len() as u16)
        }
    }
}

fn check_span(store: &RegisterStore, kind: RegisterKind, offset: u16, count: usize) -> ModbusResult<()> {
    let capacity = store.capacity(kind);
    if offset as usize + count > capacity {
        return Err(ModbusError::AddressOutOfRange {
            kind,
            offset,
            count,
            capacity,
        });
    }
    Ok(())
}

fn coil_state(value: u16) -> ModbusResult<bool> {
    match value {
        COIL_ON => Ok(true),
        COIL_OFF => Ok(false),
        other => Err(ModbusError::invalid_data(format!(
            "coil value must be 0x0000 or 0xFF00, got 0x{:04X}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(ServerContext::single(1)))
    }

    fn holding(dispatcher: &Dispatcher, offset: u16) -> u16 {
        dispatcher
            .context()
            .get(1)
            .unwrap()
            .snapshot()
            .unwrap()
            .holding_register(offset)
            .unwrap()
    }

    #[test]
    fn test_read_input_registers_seed() {
        let d = dispatcher();
        let response = d.dispatch(1, &[0x04, 0x00, 0x00, 0x00, 0x03]);
        assert_eq!(
            response.as_slice(),
            &[0x04, 0x06, 0x04, 0xD2, 0x02, 0x37, 0x03, 0x7A]
        );
    }

    #[test]
    fn test_read_discrete_inputs() {
        let d = dispatcher();
        let response = d.dispatch(1, &[0x02, 0x00, 0x00, 0x00, 0x0A]);
        assert_eq!(response.as_slice(), &[0x02, 0x02, 0x55, 0x01]);
    }

    #[test]
    fn test_write_then_read_holding_register() {
        let d = dispatcher();
        let response = d.dispatch(1, &[0x06, 0x00, 0x01, 0x00, 0x7B]);
        assert_eq!(response.as_slice(), &[0x06, 0x00, 0x01, 0x00, 0x7B]);

        let response = d.dispatch(1, &[0x03, 0x00, 0x01, 0x00, 0x01]);
        assert_eq!(response.as_slice(), &[0x03, 0x02, 0x00, 0x7B]);
    }

    #[test]
    fn test_write_multiple_registers() {
        let d = dispatcher();
        let response = d.dispatch(
            1,
            &[0x10, 0x00, 0x0A, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02],
        );
        assert_eq!(response.as_slice(), &[0x10, 0x00, 0x0A, 0x00, 0x02]);
        assert_eq!(holding(&d, 10), 0x000A);
        assert_eq!(holding(&d, 11), 0x0102);
    }

    #[test]
    fn test_write_coils() {
        let d = dispatcher();
        assert_eq!(
            d.dispatch(1, &[0x05, 0x00, 0x03, 0xFF, 0x00]).as_slice(),
            &[0x05, 0x00, 0x03, 0xFF, 0x00]
        );
        assert_eq!(
            d.dispatch(1, &[0x0F, 0x00, 0x08, 0x00, 0x03, 0x01, 0x05]).as_slice(),
            &[0x0F, 0x00, 0x08, 0x00, 0x03]
        );
        // coils 0-15: bit 3 and bits 8, 10
        assert_eq!(
            d.dispatch(1, &[0x01, 0x00, 0x00, 0x00, 0x10]).as_slice(),
            &[0x01, 0x02, 0x08, 0x05]
        );
    }

    #[test]
    fn test_out_of_range_read() {
        let d = dispatcher();
        let response = d.dispatch(1, &[0x03, 0x00, 0x5F, 0x00, 0x0A]);
        assert_eq!(response.as_slice(), &[0x83, 0x02]);
    }

    #[test]
    fn test_out_of_range_write_does_not_mutate() {
        let d = dispatcher();
        let before = d.context().get(1).unwrap().snapshot().unwrap();
        let response = d.dispatch(
            1,
            &[0x10, 0x00, 0x63, 0x00, 0x02, 0x04, 0x00, 0x01, 0x00, 0x02],
        );
        assert_eq!(response.as_slice(), &[0x90, 0x02]);
        assert_eq!(d.context().get(1).unwrap().snapshot().unwrap(), before);
    }

    #[test]
    fn test_invalid_coil_value() {
        let d = dispatcher();
        let response = d.dispatch(1, &[0x05, 0x00, 0x00, 0x12, 0x34]);
        assert_eq!(response.as_slice(), &[0x85, 0x03]);
        let coils = d.dispatch(1, &[0x01, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(coils.as_slice(), &[0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_coil_address_checked_before_value() {
        let d = dispatcher();
        let response = d.dispatch(1, &[0x05, 0x00, 0x64, 0x12, 0x34]);
        assert_eq!(response.as_slice(), &[0x85, 0x02]);
    }

    #[test]
    fn test_unsupported_function() {
        let d = dispatcher();
        assert_eq!(d.dispatch(1, &[0x2B, 0x0E, 0x01, 0x00]).as_slice(), &[0xAB, 0x01]);
        assert_eq!(d.dispatch(1, &[0x07]).as_slice(), &[0x87, 0x01]);
    }

    #[test]
    fn test_unknown_unit() {
        let d = dispatcher();
        let response = d.dispatch(9, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(response.as_slice(), &[0x83, 0x0B]);
    }

    #[test]
    fn test_quantity_limit_checked_before_address() {
        let d = dispatcher();
        // 126 registers exceeds the protocol limit and the table
        assert_eq!(
            d.dispatch(1, &[0x03, 0x00, 0x00, 0x00, 0x7E]).as_slice(),
            &[0x83, 0x03]
        );
        // within the limit but past capacity
        assert_eq!(
            d.dispatch(1, &[0x03, 0x00, 0x5F, 0x00, 0x0A]).as_slice(),
            &[0x83, 0x02]
        );
        assert_eq!(
            d.dispatch(1, &[0x04, 0x00, 0x00, 0x00, 0x65]).as_slice(),
            &[0x84, 0x02]
        );
    }

    #[test]
    fn test_zero_quantity() {
        let d = dispatcher();
        assert_eq!(
            d.dispatch(1, &[0x03, 0x00, 0x00, 0x00, 0x00]).as_slice(),
            &[0x83, 0x03]
        );
    }
}
