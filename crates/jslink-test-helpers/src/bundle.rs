//! Bundling helpers for tests.
//!
//! Every build here runs against an in-memory file system rooted at `/p`, so
//! fixtures are plain `(path, source)` pairs.

use jslink_core::fs::MemoryFileSystem;
use jslink_core::parse::{EcmaScanner, ModuleParser, ParseError, ParseInput, ParsedModule};
use jslink_core::{
    BuildFailure, BuildOptions, BuildResult, Bundler, HookFilter, LoadOutcome, Plugin, ResolveOutcome,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Namespace used by [`virtual_plugin`].
pub const VIRTUAL_NAMESPACE: &str = "virtual";

/// Options for an in-memory project rooted at `/p`.
pub fn test_options(entries: &[&str]) -> BuildOptions {
    BuildOptions {
        entry_points: entries.iter().map(|entry| entry.to_string()).collect(),
        working_dir: PathBuf::from("/p"),
        workers: 4,
        ..BuildOptions::default()
    }
}

/// A bundler over `files`, configured by `configure`.
pub fn bundler(files: &[(&str, &str)], entries: &[&str], configure: impl FnOnce(&mut BuildOptions)) -> Bundler {
    let mut options = test_options(entries);
    configure(&mut options);
    let fs = Arc::new(MemoryFileSystem::with_files(files.iter().copied()));
    Bundler::new(options).with_file_system(fs)
}

/// Bundle `files` with custom options.
pub fn bundle_files(
    files: &[(&str, &str)],
    entries: &[&str],
    configure: impl FnOnce(&mut BuildOptions),
) -> Result<BuildResult, BuildFailure> {
    bundler(files, entries, configure).build()
}

/// Bundle `files` with default options.
pub fn bundle(files: &[(&str, &str)], entries: &[&str]) -> Result<BuildResult, BuildFailure> {
    bundle_files(files, entries, |_| {})
}

/// Bundle the entry `./in.js` and return its single output.
///
/// # Returns
/// The chunk text, or the rendered errors
pub fn bundle_single(files: &[(&str, &str)]) -> Result<String, String> {
    let result = bundle(files, &["./in.js"]).map_err(|failure| failure.render())?;
    match result.output_files.as_slice() {
        [file] => Ok(file.text().to_string()),
        files => Err(format!("expected one output file, got {}", files.len())),
    }
}

/// Plugin serving `modules` from memory: specifiers equal to a module name
/// resolve into [`VIRTUAL_NAMESPACE`] and load the given source as JS.
pub fn virtual_plugin(name: &str, modules: &[(&str, &str)]) -> Plugin {
    let modules: Arc<FxHashMap<String, String>> = Arc::new(
        modules
            .iter()
            .map(|(path, source)| (path.to_string(), source.to_string()))
            .collect(),
    );
    let known = Arc::clone(&modules);
    let any = HookFilter::new(".*").expect("valid pattern");
    Plugin::new(name)
        .on_resolve(any.clone(), move |args| {
            Ok(if known.contains_key(&args.path) {
                ResolveOutcome::resolved(args.path.clone(), VIRTUAL_NAMESPACE)
            } else {
                ResolveOutcome::Declined
            })
        })
        .on_load(any.namespace(VIRTUAL_NAMESPACE), move |args| {
            Ok(match modules.get(&args.path) {
                Some(source) => LoadOutcome::js(source.as_bytes()),
                None => LoadOutcome::Declined,
            })
        })
}

/// [`EcmaScanner`] that counts how often each path is parsed.
#[derive(Default)]
pub struct CountingParser {
    counts: Mutex<FxHashMap<String, usize>>,
}

impl CountingParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, path: &str) -> usize {
        self.counts.lock().get(path).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> FxHashMap<String, usize> {
        self.counts.lock().clone()
    }

    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }
}

impl ModuleParser for CountingParser {
    fn name(&self) -> &str {
        "counting-ecma-scanner"
    }

    fn parse(&self, input: &ParseInput<'_>) -> Result<ParsedModule, ParseError> {
        *self.counts.lock().entry(input.path.to_string()).or_default() += 1;
        EcmaScanner.parse(input)
    }
}
