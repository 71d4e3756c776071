//! Benchmarks for scriptpad-core: analysis and completion latency.
//!
//! Performance targets:
//! - Reparse of a 500-line script: < 2ms
//! - Re-bind against cached libraries: < 1ms
//! - Completion on a clean snapshot: < 100μs (runs on every keystroke)

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use scriptpad_core::binder;
use scriptpad_core::library::{self, Library};
use scriptpad_core::syntax::SyntaxTree;
use scriptpad_core::{AnalysisSnapshot, CompletionEngine, SnapshotKey, SourceDocument};
use std::hint::black_box;
use std::sync::Arc;

/// Builds a script with `functions` small functions and a call to each.
fn generate_script(functions: usize) -> String {
    let mut out = String::new();
    for i in 0..functions {
        out.push_str(&format!(
            "fn helper_{i}(value, scale) {{\n    let total = value * scale + {i};\n    if total > 10 {{\n        return total;\n    }}\n    return Math.Abs(total);\n}}\n\n"
        ));
    }
    out.push_str("let result = 0;\n");
    for i in 0..functions {
        out.push_str(&format!("result = result + helper_{i}({i}, 2);\n"));
    }
    out.push_str("print(result);\n");
    out
}

fn snapshot_for(text: &str) -> AnalysisSnapshot {
    let syntax = Arc::new(SyntaxTree::parse(Arc::from(text)));
    let bound = binder::bind(&syntax, &[library::prelude()]);
    AnalysisSnapshot::assemble(SnapshotKey::new(0, 0), syntax, bound, Vec::new())
}

/// Benchmark lexing and parsing.
///
/// Every text edit triggers a full reparse.
fn bench_reparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reparse");

    for functions in [10, 60, 250] {
        let text: Arc<str> = Arc::from(generate_script(functions));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_lines", text.lines().count())),
            &text,
            |b, text| b.iter(|| SyntaxTree::parse(black_box(Arc::clone(text)))),
        );
    }

    group.finish();
}

/// Benchmark binding an existing tree, as a reference-only change does.
fn bench_rebind(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebind");

    let extra = Arc::new(
        Library::from_json(
            r#"{ "name": "geometry", "symbols": [
                { "name": "Geometry", "kind": "namespace", "members": [
                    { "name": "Circle", "kind": "class" } ] } ] }"#,
        )
        .unwrap(),
    );

    for functions in [10, 60, 250] {
        let syntax = SyntaxTree::parse(Arc::from(generate_script(functions)));
        let libraries = vec![library::prelude(), Arc::clone(&extra)];
        group.bench_with_input(
            BenchmarkId::from_parameter(functions),
            &syntax,
            |b, syntax| b.iter(|| binder::bind(black_box(syntax), &libraries)),
        );
    }

    group.finish();
}

/// Benchmark completion queries against a clean snapshot.
fn bench_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("completion");

    let mut text = generate_script(60);
    let scope_caret = text.find("    if total").unwrap();
    text.push_str("Math.S");
    let member_caret = text.len();
    let snapshot = snapshot_for(&text);

    group.bench_function("scope_empty_prefix", |b| {
        b.iter(|| CompletionEngine::complete(&snapshot, black_box(scope_caret)))
    });

    group.bench_function("member_access", |b| {
        b.iter(|| CompletionEngine::complete(&snapshot, black_box(member_caret)))
    });

    group.finish();
}

/// Benchmark single-character edits on a large document.
fn bench_replace(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace");
    let text = generate_script(250);

    group.bench_function("insert_char", |b| {
        let mut document = SourceDocument::new(text.clone());
        let mut toggle = false;
        b.iter(|| {
            let insert = if toggle { "a" } else { "b" };
            toggle = !toggle;
            document.replace(black_box(0), 0, insert).unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_reparse,
    bench_rebind,
    bench_completion,
    bench_replace
);
criterion_main!(benches);
