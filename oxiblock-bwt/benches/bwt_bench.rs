use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use oxiblock_bwt::{Bwt, DivSufSort, Mtft};
use oxiblock_core::ByteTransform;

fn test_block(len: usize) -> Vec<u8> {
    // Mildly compressible pseudo-text.
    let words: [&[u8]; 4] = [b"block ", b"sorting ", b"entropy ", b"rank "];
    let mut out = Vec::with_capacity(len);
    let mut state = 0x2545_F491u32;
    while out.len() < len {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        out.extend_from_slice(words[(state >> 16) as usize % words.len()]);
    }
    out.truncate(len);
    out
}

fn bench_suffix_array(c: &mut Criterion) {
    let data = test_block(1 << 20);
    let mut dss = DivSufSort::new();
    let mut sa = vec![0i32; data.len()];
    c.bench_function("divsufsort 1MiB", |b| {
        b.iter(|| {
            dss.compute_suffix_array(black_box(&data), &mut sa);
            black_box(sa[0])
        })
    });
}

fn bench_bwt_roundtrip(c: &mut Criterion) {
    let data = test_block(1 << 20);
    let mut bwt = Bwt::new();
    let mut transformed = vec![0u8; data.len()];
    let mut recovered = vec![0u8; data.len()];

    c.bench_function("bwt forward 1MiB", |b| {
        b.iter(|| bwt.forward(black_box(&data), &mut transformed).unwrap())
    });
    bwt.forward(&data, &mut transformed).unwrap();
    c.bench_function("bwt inverse 1MiB", |b| {
        b.iter(|| bwt.inverse(black_box(&transformed), &mut recovered).unwrap())
    });
}

fn bench_mtf(c: &mut Criterion) {
    let data = test_block(1 << 20);
    let mut bwt = Bwt::new();
    let mut transformed = vec![0u8; data.len()];
    bwt.forward(&data, &mut transformed).unwrap();

    let mut mtf = Mtft::new();
    let mut ranks = vec![0u8; data.len()];
    c.bench_function("mtf forward post-bwt 1MiB", |b| {
        b.iter(|| mtf.forward(black_box(&transformed), &mut ranks).unwrap())
    });
}

criterion_group!(benches, bench_suffix_array, bench_bwt_roundtrip, bench_mtf);
criterion_main!(benches);
