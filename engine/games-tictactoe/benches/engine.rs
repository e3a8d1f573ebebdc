use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use engine_core::Environment;
use games_tictactoe::{State, TicTacToe};

fn bench_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("tictactoe_reset");
    group.bench_function("reset", |b| {
        let mut env = TicTacToe::new();
        b.iter(|| black_box(env.reset().unwrap()));
    });
    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("tictactoe_step");
    group.bench_function("step_center", |b| {
        b.iter_batched(
            TicTacToe::new,
            |mut env| black_box(env.step(4).unwrap()),
            BatchSize::SmallInput,
        );
    });
    group.bench_function("legal_actions_midgame", |b| {
        let mut env = TicTacToe::new();
        for m in [4, 0, 2, 6] {
            env.step(m).unwrap();
        }
        b.iter(|| black_box(env.legal_actions()));
    });
    group.finish();
}

fn bench_observation(c: &mut Criterion) {
    let mut group = c.benchmark_group("tictactoe_observation");
    group.bench_function("observation", |b| {
        let state = State::new();
        b.iter(|| black_box(state.observation()));
    });
    group.finish();
}

criterion_group!(benches, bench_reset, bench_step, bench_observation);
criterion_main!(benches);
