//! Request path benchmarks: frame extraction and dispatch
//!
//! Run with: cargo bench --bench dispatch
use std::sync::Arc;

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use modbus_test_slave::{encode_frame, Dispatcher, FrameDecoder, ServerContext};

const UNIT: u8 = 1;

fn frame(transaction_id: u16, pdu: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(7 + pdu.len());
    out.extend_from_slice(&transaction_id.to_be_bytes());
    out.extend_from_slice(&[0x00, 0x00]);
    out.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    out.push(UNIT);
    out.extend_from_slice(pdu);
    out
}

fn bench_dispatch(c: &mut Criterion) {
    let dispatcher = Dispatcher::new(Arc::new(ServerContext::single(UNIT)));
    let mut group = c.benchmark_group("dispatch");

    for quantity in [1u16, 10, 125] {
        let mut pdu = vec![0x03, 0x00, 0x00];
        pdu.extend_from_slice(&quantity.to_be_bytes());
        group.bench_with_input(
            BenchmarkId::new("read_holding_registers", quantity),
            &pdu,
            |b, pdu| b.iter(|| dispatcher.dispatch(UNIT, black_box(pdu))),
        );
    }

    group.bench_function("write_single_register", |b| {
        let pdu = [0x06, 0x00, 0x01, 0x00, 0x7B];
        b.iter(|| dispatcher.dispatch(UNIT, black_box(&pdu)))
    });

    group.bench_function("illegal_address", |b| {
        let pdu = [0x03, 0x00, 0x5F, 0x00, 0x0A];
        b.iter(|| dispatcher.dispatch(UNIT, black_box(&pdu)))
    });

    group.finish();
}

fn bench_framing(c: &mut Criterion) {
    let dispatcher = Dispatcher::new(Arc::new(ServerContext::single(UNIT)));
    let mut batch = Vec::new();
    for tid in 0..64u16 {
        batch.extend(frame(tid, &[0x04, 0x00, 0x00, 0x00, 0x0A]));
    }

    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(batch.len() as u64));

    group.bench_function("decode_64_frames", |b| {
        let mut decoder = FrameDecoder::new();
        b.iter(|| {
            let mut buf = BytesMut::from(&batch[..]);
            let mut count = 0;
            while let Ok(Some(frame)) = decoder.decode(&mut buf) {
                black_box(&frame);
                count += 1;
            }
            count
        })
    });

    group.bench_function("decode_dispatch_encode_64_frames", |b| {
        let mut decoder = FrameDecoder::new();
        let mut tx = BytesMut::with_capacity(64 * 32);
        b.iter(|| {
            let mut rx = BytesMut::from(&batch[..]);
            tx.clear();
            while let Ok(Some(frame)) = decoder.decode(&mut rx) {
                let response = dispatcher.dispatch(frame.unit_id(), &frame.pdu);
                encode_frame(frame.transaction_id(), frame.unit_id(), &response, &mut tx);
            }
            black_box(tx.len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_framing);
criterion_main!(benches);
