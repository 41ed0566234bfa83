//! LSP handler performance benchmarks.
//!
//! Handlers answer from the cached analysis, so apart from the reparse
//! benchmark these measure a single tree walk:
//! - Reparse after an edit: < 5ms for 100 functions
//! - Hover and completion: < 1ms
//! - Full semantic tokens: < 5ms

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ddpls::config::CompletionConfig;
use ddpls::document::DocumentManager;
use ddpls::handlers::{handle_completion, handle_hover, handle_semantic_tokens_full};
use std::hint::black_box;
use tokio::runtime::Runtime;
use tower_lsp_server::ls_types::{
    CompletionParams, HoverParams, Position, SemanticTokensParams, TextDocumentIdentifier,
    TextDocumentPositionParams, Uri,
};

/// Document with `count` functions, each called once at the end.
fn generate_document(count: usize) -> String {
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

fn position_params(uri: &Uri, position: Position) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        position,
    }
}

fn open(rt: &Runtime, manager: &DocumentManager, path: &str, content: &str) -> Uri {
    let uri = Uri::from_file_path(path).unwrap();
    rt.block_on(manager.add_and_parse(uri.clone(), content.to_string()))
        .expect("parse failed");
    uri
}

fn bench_reparse(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("reparse");
    let manager = DocumentManager::default();

    for count in [10, 100] {
        let content = generate_document(count);
        let uri = open(&rt, &manager, &format!("/bench/reparse_{count}.ddp"), &content);

        group.bench_with_input(BenchmarkId::from_parameter(count), &uri, |b, uri| {
            b.iter(|| rt.block_on(manager.reparse(black_box(uri))).unwrap());
        });
    }

    group.finish();
}

fn bench_hover_handler(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = DocumentManager::default();
    let content = generate_document(100);
    let uri = open(&rt, &manager, "/bench/hover.ddp", &content);
    // `step 50 with ...` in the call block
    let position = Position::new(100 * 8 + 50, 10);

    c.bench_function("hover_handler/call_100_functions", |b| {
        b.iter(|| {
            rt.block_on(async {
                let params = HoverParams {
                    text_document_position_params: position_params(&uri, position),
                    work_done_progress_params: Default::default(),
                };
                handle_hover(black_box(&manager), black_box(params)).await
            })
        })
    });
}

fn bench_completion_handler(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = DocumentManager::default();
    let content = generate_document(100);
    let uri = open(&rt, &manager, "/bench/completion.ddp", &content);
    let config = CompletionConfig::default();
    // inside the body of the last function
    let position = Position::new(99 * 8 + 3, 4);

    let mut group = c.benchmark_group("completion_handler");
    for snippets in [false, true] {
        group.bench_with_input(BenchmarkId::new("snippets", snippets), &snippets, |b, &snippets| {
            b.iter(|| {
                rt.block_on(async {
                    let params = CompletionParams {
                        text_document_position: position_params(&uri, position),
                        work_done_progress_params: Default::default(),
                        partial_result_params: Default::default(),
                        context: None,
                    };
                    handle_completion(black_box(&manager), black_box(params), &config, snippets)
                        .await
                })
            })
        });
    }
    group.finish();
}

fn bench_semantic_tokens_handler(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = DocumentManager::default();
    let mut group = c.benchmark_group("semantic_tokens_full");

    for count in [10, 100] {
        let content = generate_document(count);
        let uri = open(&rt, &manager, &format!("/bench/tokens_{count}.ddp"), &content);

        group.bench_with_input(BenchmarkId::from_parameter(count), &uri, |b, uri| {
            b.iter(|| {
                rt.block_on(async {
                    let params = SemanticTokensParams {
                        text_document: TextDocumentIdentifier { uri: uri.clone() },
                        work_done_progress_params: Default::default(),
                        partial_result_params: Default::default(),
                    };
                    handle_semantic_tokens_full(black_box(&manager), black_box(params)).await
                })
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_reparse,
    bench_hover_handler,
    bench_completion_handler,
    bench_semantic_tokens_handler
);
criterion_main!(benches);


