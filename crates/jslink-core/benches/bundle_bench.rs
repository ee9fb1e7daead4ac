use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jslink_core::fs::MemoryFileSystem;
use jslink_core::parse::{EcmaScanner, ModuleParser, ParseInput};
use jslink_core::loader::Loader;
use jslink_core::{BuildOptions, Bundler};
use std::path::PathBuf;
use std::sync::Arc;

/// A chain of `size` modules, each importing the next and a shared helper.
fn project(size: usize) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = (0..size)
        .map(|i| {
            let next = if i + 1 < size {
                format!("import {{ f{} }} from './m{}.js';\n", i + 1, i + 1)
            } else {
                String::new()
            };
            let call = if i + 1 < size {
                format!("f{}(x)", i + 1)
            } else {
                "x".to_string()
            };
            let source = format!(
                "{next}import {{ helper }} from './helper.js';\n\
                 const scale = {i};\n\
                 export function f{i}(x) {{ return helper({call}) * scale; }}\n\
                 export function unused{i}() {{ return `unused ${{scale}}`; }}\n"
            );
            (format!("/p/m{i}.js"), source)
        })
        .collect();
    files.push(("/p/helper.js".to_string(), "export const helper = (x) => x + 1;\n".to_string()));
    files
}

fn bundler(files: &[(String, String)], workers: usize) -> Bundler {
    let fs = Arc::new(MemoryFileSystem::with_files(
        files.iter().map(|(path, source)| (path.as_str(), source.as_str())),
    ));
    let options = BuildOptions {
        entry_points: vec!["./m0.js".to_string()],
        working_dir: PathBuf::from("/p"),
        workers,
        ..BuildOptions::default()
    };
    Bundler::new(options).with_file_system(fs)
}

fn bench_scan_module(c: &mut Criterion) {
    let source = project(2).remove(0).1;
    c.bench_function("scan_module", |b| {
        b.iter(|| {
            let input = ParseInput {
                path: "m0.js",
                source: black_box(&source),
                loader: Loader::Js,
            };
            if let Ok(parsed) = EcmaScanner.parse(&input) {
                black_box(&parsed);
            }
        })
    });
}

fn bench_bundle_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bundle_scaling");

    for size in [10, 50, 200].iter() {
        let files = project(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &files, |b, files| {
            b.iter(|| {
                let mut bundler = bundler(files, 4);
                if let Ok(result) = bundler.build() {
                    black_box(&result.output_files);
                }
            })
        });
    }
    group.finish();
}

fn bench_rebuild_from_cache(c: &mut Criterion) {
    let files = project(100);
    let mut bundler = bundler(&files, 4);
    let _ = bundler.build();
    c.bench_function("rebuild_cached_100", |b| {
        b.iter(|| {
            if let Ok(result) = bundler.rebuild() {
                black_box(&result.output_files);
            }
        })
    });
}

criterion_group!(
    benches,
    bench_scan_module,
    bench_bundle_scaling,
    bench_rebuild_from_cache
);
criterion_main!(benches);
