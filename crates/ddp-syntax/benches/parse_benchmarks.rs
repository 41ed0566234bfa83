//! Benchmarks for lexing and parsing `.ddp` files.
//!
//! Every keystroke in the editor ends in a reparse, so these run on the
//! latency path of diagnostics and all position queries:
//! - Small files: < 100μs
//! - Files with 200 declarations: < 2ms
//! - Alias heavy files: < 5ms

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ddp_syntax::lexer::tokenize;
use ddp_syntax::{DdpParser, ModuleParser, ParseRequest};
use std::collections::HashMap;
use std::hint::black_box;
use std::path::Path;

const SMALL_FILE: &str = r#"
[Adds two numbers.]
public func add(a: int, b: int): int alias "add <a> and <b>" {
    return a + b;
}

struct Point { x: int, y: int = 0 } alias "point at <x> <y>";

var sum = add 1 and 2;
var p = point at sum 3;
if sum > 2 {
    sum = sum - 1;
}
"#;

/// File with `count` functions, each called once.
fn generate_file(count: usize) -> String {
    let mut content = String::new();
    for i in 0..count {
        content.push_str(&format!(
            "[Function number {i}.]\nfunc f{i}(a: int, b: int): int alias \"step {i} with <a> and <b>\" {{\n    var t = a * b;\n    while t > {i} {{\n        t = t - 1;\n    }}\n    return t;\n}}\n"
        ));
    }
    for i in 0..count {
        content.push_str(&format!("var v{i} = step {i} with {i} and 2;\n"));
    }
    content
}

/// File where every call must try many aliases sharing a first word.
fn generate_alias_heavy_file(count: usize) -> String {
    let mut content = String::new();
    for i in 0..count {
        content.push_str(&format!(
            "func g{i}(x: int): int alias \"compute <x> variant {i}\" {{ return x; }}\n"
        ));
    }
    for i in 0..count {
        content.push_str(&format!("var r{i} = compute {i} variant {i};\n"));
    }
    content
}

fn parse(source: &str) {
    let request = ParseRequest::new("/bench/main.ddp", source, HashMap::new());
    let _ = DdpParser::new().parse(request, &mut |_| {});
}

fn bench_lexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexing");
    let file = Path::new("/bench/main.ddp");

    group.bench_function("small_file", |b| {
        b.iter(|| tokenize(black_box(file), black_box(SMALL_FILE)))
    });

    let large = generate_file(200);
    group.bench_function("large_200_funcs", |b| {
        b.iter(|| tokenize(black_box(file), black_box(&large)))
    });

    group.finish();
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    group.bench_function("small_file", |b| b.iter(|| parse(black_box(SMALL_FILE))));

    for count in [10, 50, 200] {
        let source = generate_file(count);
        group.bench_with_input(BenchmarkId::new("funcs", count), &source, |b, source| {
            b.iter(|| parse(black_box(source)))
        });
    }

    group.finish();
}

/// Alias resolution tries every candidate with a matching first word.
fn bench_alias_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("alias_resolution");

    for count in [10, 50, 100] {
        let source = generate_alias_heavy_file(count);
        group.bench_with_input(BenchmarkId::new("shared_prefix", count), &source, |b, source| {
            b.iter(|| parse(black_box(source)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lexing, bench_parsing, bench_alias_resolution);
criterion_main!(benches);
