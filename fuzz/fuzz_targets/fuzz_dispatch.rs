#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use modbus_test_slave::{Dispatcher, ServerContext};

#[derive(Debug, arbitrary::Arbitrary)]
struct Input {
    unit_id: u8,
    pdu: Vec<u8>,
}

// Dispatch never panics, and exceptions carry one of the known codes
fuzz_target!(|input: Input| {
    let dispatcher = Dispatcher::new(Arc::new(ServerContext::single(1)));
    let response = dispatcher.dispatch(input.unit_id, &input.pdu);
    if response.is_exception() {
        assert_eq!(response.len(), 2);
        assert!(matches!(
            response.exception_code(),
            Some(0x01 | 0x02 | 0x03 | 0x04 | 0x0B)
        ));
    }
});
