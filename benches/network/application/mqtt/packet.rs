use criterion::{BatchSize, Criterion, Throughput};
use mqtt_uplink::network::Read;
use mqtt_uplink::network::application::mqtt::packet::{
    decode_remaining_length, encode_remaining_length,
};
use mqtt_uplink::network::application::mqtt::{Request, Response};
use mqtt_uplink::network::error::Error;
use std::hint::black_box;

struct Frame<'a> {
    data: &'a [u8],
}

impl Read for Frame<'_> {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let len = buf.len().min(self.data.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        self.data = &self.data[len..];
        Ok(len)
    }
}

fn publish_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; payload.len() + 64];
    let len = Request::Publish {
        topic: "sensors/temp",
        payload,
        retain: false,
    }
    .encode(&mut buf)
    .expect("frame fits");
    buf.truncate(len);
    buf
}

pub fn bench_encode_connect(c: &mut Criterion) {
    let mut buf = [0u8; 128];
    c.bench_function("encode_connect", |b| {
        b.iter(|| {
            Request::connect(
                black_box("sensor-1"),
                black_box("sensor-1"),
                black_box("secret"),
                600,
            )
            .encode(&mut buf)
            .expect("Failed to encode")
        })
    });
}

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_publish");
    let payload = br#"{"v":21.5,"unit":"C","battery":87}"#;
    let mut buf = [0u8; 128];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("qos0", |b| {
        b.iter(|| {
            Request::Publish {
                topic: black_box("sensors/temp"),
                payload: black_box(payload),
                retain: true,
            }
            .encode(&mut buf)
            .expect("Failed to encode")
        })
    });
    group.finish();
}

pub fn bench_decode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_publish");
    for size in [16usize, 128, 512] {
        let frame = publish_frame(&vec![b'7'; size]);
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_function(format!("{size}B"), |b| {
            b.iter_batched_ref(
                || Frame { data: &frame },
                |stream| Response::read_from(stream).expect("Failed to decode"),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

pub fn bench_remaining_length(c: &mut Criterion) {
    c.bench_function("remaining_length_roundtrip", |b| {
        b.iter(|| {
            for value in [0usize, 127, 128, 16_383, 16_384, 2_097_152, 268_435_455] {
                let encoded = encode_remaining_length(black_box(value)).expect("in range");
                black_box(decode_remaining_length(&encoded).expect("well formed"));
            }
        })
    });
}
