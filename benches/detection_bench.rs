//! Benchmarks for smell detection and suggestion over generated sources.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use refactron::{DetectionThresholds, RefactoringSuggester, SmellDetector};
use std::hint::black_box;
use std::path::{Path, PathBuf};

/// A file with `functions` functions mixing nesting, duplication and short names.
fn generate_source(functions: usize) -> String {
    let mut source = String::new();
    for i in 0..functions {
        source.push_str(&format!(
            r#"
function handle{i}(req, d) {{
  const user = req.user.name.trim();
  const mail = req.user.email.toLowerCase();
  save(user, mail);
  if (req.kind === "a" && d > {i}) {{
    if (req.flags.retry || req.flags.force) {{
      if (d % 2 === 0) {{
        for (const item of req.items) {{
          if (item.active && !item.locked) {{
            process(item, d);
          }}
        }}
      }}
    }}
  }}
  return d;
}}
"#
        ));
    }
    source
}

fn bench_detection(c: &mut Criterion) {
    let detector = SmellDetector::new(DetectionThresholds::default());
    let mut group = c.benchmark_group("detect");
    for functions in [5, 20, 50] {
        let source = generate_source(functions);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(functions), &source, |b, source| {
            b.iter(|| detector.detect(black_box(source), Path::new("bench.js")))
        });
    }
    group.finish();
}

fn bench_detect_many(c: &mut Criterion) {
    let detector = SmellDetector::new(DetectionThresholds::default());
    let inputs: Vec<(PathBuf, String)> = (0..16)
        .map(|i| (PathBuf::from(format!("file_{i}.js")), generate_source(10)))
        .collect();
    c.bench_function("detect_many_16_files", |b| {
        b.iter(|| detector.detect_many(black_box(&inputs)))
    });
}

fn bench_suggestions(c: &mut Criterion) {
    let detector = SmellDetector::new(DetectionThresholds::default());
    let suggester = RefactoringSuggester::default();
    let source = generate_source(10);
    let file = Path::new("bench.js");
    let smells = detector.detect(&source, file).unwrap_or_default();
    c.bench_function("suggest_10_functions", |b| {
        b.iter(|| suggester.suggest(black_box(&source), file, &smells))
    });
}

criterion_group!(benches, bench_detection, bench_detect_many, bench_suggestions);
criterion_main!(benches);
