#![no_main]

use std::sync::Arc;

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use modbus_test_slave::{encode_frame, Dispatcher, FrameDecoder, MbapHeader, ServerContext};

// Arbitrary byte streams through the full request path. A decoded frame
// must always yield a well-formed response frame echoing its header.
fuzz_target!(|data: &[u8]| {
    let dispatcher = Dispatcher::new(Arc::new(ServerContext::single(1)));
    let mut decoder = FrameDecoder::new();
    let mut rx = BytesMut::from(data);

    while let Ok(Some(frame)) = decoder.decode(&mut rx) {
        let response = dispatcher.dispatch(frame.unit_id(), &frame.pdu);
        assert!(!response.is_empty());
        assert_eq!(response.as_slice()[0] & 0x7F, frame.function_code() & 0x7F);

        let mut tx = BytesMut::new();
        encode_frame(frame.transaction_id(), frame.unit_id(), &response, &mut tx);
        let header = MbapHeader::decode(&tx[..7]).expect("response header must decode");
        assert_eq!(header.transaction_id, frame.transaction_id());
        assert_eq!(header.frame_len(), tx.len());
    }
});
