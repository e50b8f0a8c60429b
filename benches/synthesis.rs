//! Benchmarks for the synthesis hot path.
//!
//! Run with: `cargo bench --bench synthesis`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lpcnet::{lpc_from_cepstrum, LPCNetState, FRAME_SIZE, LPC_ORDER, NB_FEATURES};

fn generate_features(seed: u32) -> Vec<f32> {
    let mut v = Vec::with_capacity(NB_FEATURES);
    let mut state = seed;
    for _ in 0..NB_FEATURES {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        v.push((state as i32 >> 16) as f32 / 65536.0);
    }
    v
}

fn bench_synthesize_frame(c: &mut Criterion) {
    let mut st = LPCNetState::with_seed(42);
    let features = generate_features(1);
    let mut pcm = vec![0i16; FRAME_SIZE];
    // Get past warm-up so the generation loop actually runs.
    for _ in 0..4 {
        st.synthesize(&features, &mut pcm);
    }
    c.bench_function("synthesize_frame", |b| {
        b.iter(|| {
            st.synthesize(black_box(&features), &mut pcm);
            black_box(&pcm);
        })
    });
}

fn bench_lpc_from_cepstrum(c: &mut Criterion) {
    let features = generate_features(2);
    let mut lpc = vec![0.0f32; LPC_ORDER];
    c.bench_function("lpc_from_cepstrum", |b| {
        b.iter(|| {
            lpc_from_cepstrum(&mut lpc, black_box(&features));
            black_box(&lpc);
        })
    });
}

criterion_group!(benches, bench_synthesize_frame, bench_lpc_from_cepstrum);
criterion_main!(benches);
