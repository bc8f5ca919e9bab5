use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use grove::{Parser, ParserConfig};
use std::hint::black_box;

#[path = "../tests/common/mod.rs"]
mod common;

/// `1 + 2 * (3 - 4) ^ 5 / ...` with `terms` operands.
fn expression(terms: usize) -> String {
    let ops = ["+", "*", "-", "/", "^"];
    let mut out = String::from("1");
    for i in 1..terms {
        let op = ops[i % ops.len()];
        if i % 7 == 0 {
            out.push_str(&format!(" {op} ({i} - {})", i + 1));
        } else {
            out.push_str(&format!(" {op} {i}"));
        }
    }
    out
}

fn bench_arithmetic(c: &mut Criterion) {
    let grammar = common::arithmetic();
    let configs = [
        ("default", ParserConfig::default()),
        (
            "memo_off",
            ParserConfig {
                enable_memoization: false,
                ..ParserConfig::default()
            },
        ),
        (
            "memoize_rules",
            ParserConfig {
                memoize_rules: true,
                ..ParserConfig::default()
            },
        ),
    ];

    let mut group = c.benchmark_group("arithmetic");
    for terms in [10, 100, 1000] {
        let input = expression(terms);
        group.throughput(Throughput::Bytes(input.len() as u64));
        for (name, config) in &configs {
            let parser = Parser::new(&grammar).with_config(config.clone());
            group.bench_with_input(BenchmarkId::new(*name, terms), &input, |b, input| {
                b.iter(|| parser.parse(black_box(input.as_str())));
            });
        }
    }
    group.finish();
}

fn bench_left_recursion(c: &mut Criterion) {
    let grammar = common::left_recursive_a();
    let input = "a".repeat(200);
    let parser = Parser::new(&grammar);

    c.bench_function("left_recursion_200", |b| {
        b.iter(|| parser.parse(black_box(input.as_str())));
    });
}

fn bench_left_assoc_chain(c: &mut Criterion) {
    let grammar = common::arithmetic();
    let parser = Parser::new(&grammar);

    let mut group = c.benchmark_group("left_assoc_chain");
    for terms in [500, 1000, 2000] {
        let input = vec!["1"; terms].join("+");
        group.throughput(Throughput::Elements(terms as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &input, |b, input| {
            b.iter(|| parser.parse(black_box(input.as_str())));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_arithmetic,
    bench_left_recursion,
    bench_left_assoc_chain
);
criterion_main!(benches);
