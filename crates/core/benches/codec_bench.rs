//! Benchmarks for the envelope codec and gateway round trip

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pulse_core::cipher::{decode, encode, generate_key, open, seal};
use pulse_core::gateway::{InputVerifier, KeyGateway, LocalGateway};
use pulse_core::{AccountId, SystemClock, Wallet};

const BODY: &str = "Meet me at the usual place, bring the notes from Tuesday.";

fn bench_xor_encode(c: &mut Criterion) {
    c.bench_function("xor_encode", |b| {
        b.iter(|| black_box(encode(black_box(BODY), black_box(123456))))
    });
}

fn bench_xor_decode(c: &mut Criterion) {
    let ciphertext = encode(BODY, 123456);

    c.bench_function("xor_decode", |b| {
        b.iter(|| black_box(decode(black_box(&ciphertext), black_box(123456)).unwrap()))
    });
}

fn bench_sealed_roundtrip(c: &mut Criterion) {
    c.bench_function("sealed_roundtrip", |b| {
        b.iter(|| {
            let sealed = seal(black_box(BODY), 123456).unwrap();
            black_box(open(&sealed, 123456).unwrap())
        })
    });
}

fn bench_key_generation(c: &mut Criterion) {
    c.bench_function("key_generation", |b| b.iter(|| black_box(generate_key())));
}

fn bench_input_proof(c: &mut Criterion) {
    let gateway = LocalGateway::with_verifier(Wallet::from_seed(&[1u8; 32]), Arc::new(SystemClock));
    let contract = AccountId::new([2u8; 32]);
    let caller = AccountId::new([3u8; 32]);

    c.bench_function("input_proof_create_and_verify", |b| {
        b.iter(|| {
            let input = gateway.create_encrypted_input(&contract, &caller, 42).unwrap();
            black_box(
                gateway
                    .verify_input(&input.handles[0], &input.input_proof, &contract, &caller)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_xor_encode,
    bench_xor_decode,
    bench_sealed_roundtrip,
    bench_key_generation,
    bench_input_proof
);
criterion_main!(benches);
