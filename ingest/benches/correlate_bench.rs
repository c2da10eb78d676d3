use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use txflow_ingest::classify::split;
use txflow_ingest::correlate::match_sides;
use txflow_ingest::resolver::{InputResolution, ResolvedInput};
use txflow_ingest::AddressIndex;
use txflow_types::{RawInput, RawOutput, RawTx, User};

fn make_index(addresses: usize) -> AddressIndex {
    let users: Vec<User> = (0..addresses / 10)
        .map(|u| {
            let owned: Vec<String> = (0..10).map(|a| format!("addr-{u}-{a}")).collect();
            let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
            User::new(format!("user-{u}")).with_wallet(0, &refs)
        })
        .collect();
    AddressIndex::from_users(&users).0
}

fn make_tx(outputs: usize) -> (RawTx, InputResolution) {
    let raw = RawTx {
        txid: "bench".into(),
        hash: "bench".into(),
        inputs: vec![RawInput::spend("prev", 0)],
        outputs: (0..outputs)
            .map(|n| RawOutput::new(n as u32, 1_000, vec![format!("addr-{n}-{}", n % 10)]))
            .collect(),
        block_time: None,
    };
    let inputs = InputResolution {
        resolved: vec![ResolvedInput {
            value: 1_000 * outputs as i64 + 500,
            addresses: vec!["addr-0-0".into()],
        }],
        failed: 0,
        coinbase: false,
    };
    (raw, inputs)
}

fn bench_match_sides(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_sides");
    let index = make_index(100_000);

    for outputs in [1, 10, 100, 1000] {
        let (raw, inputs) = make_tx(outputs);
        group.bench_with_input(BenchmarkId::new("outputs", outputs), &outputs, |b, _| {
            b.iter(|| {
                black_box(match_sides(
                    black_box(&raw),
                    black_box(&inputs),
                    -1,
                    &index,
                    0,
                ))
            });
        });
    }

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let index = make_index(1_000);
    let (raw, inputs) = make_tx(50);
    let unified = match_sides(&raw, &inputs, 100, &index, 0)
        .expect("amounts in range")
        .expect("tracked");

    c.bench_function("split_two_sided", |b| {
        b.iter(|| black_box(split(black_box(unified.clone()), 110)));
    });
}

criterion_group!(benches, bench_match_sides, bench_split);
criterion_main!(benches);
