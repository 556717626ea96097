use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::mqtt::packet::bench_encode_connect,
    network::application::mqtt::packet::bench_encode_publish,
    network::application::mqtt::packet::bench_decode_publish,
    network::application::mqtt::packet::bench_remaining_length
);
criterion_main!(benches);
