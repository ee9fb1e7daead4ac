//! Build driver.
//!
//! A build runs the phases in a fixed order: scan (concurrent), link, chunk,
//! rename, print (one task per chunk), metafile, write. Only the scan talks
//! to plugins and the file system for reading; everything after it is a pure
//! function of the module graph and the options.

use crate::cache::ParseCache;
use crate::chunker::{build_chunks, Chunk, ChunkGraph};
use crate::error::{BuildError, BuildFailure, ErrorCollector, Warning};
use crate::fs::{normalize_path, relative_path, FileSystem, OsFileSystem};
use crate::graph::ModuleGraph;
use crate::ids::ChunkIdx;
use crate::metafile::{Metafile, MetafileOutput};
use crate::options::{BuildOptions, SourceMapMode};
use crate::parse::{EcmaScanner, ModuleParser};
use crate::plugin::Plugin;
use crate::printer::{print_chunk, print_css, strategy, ChunkImport, PrintContext, PrintedChunk, PrintedCss};
use crate::renamer::{export_alias, rename_chunks};
use crate::resolver::Resolver;
use crate::scheduler::{scan, ScanContext};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span};

/// Cancels a running build from another thread.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// One emitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl OutputFile {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.contents).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Chunks, stylesheets and source maps, in chunk order.
    pub output_files: Vec<OutputFile>,
    pub warnings: Vec<Warning>,
    pub metafile: Option<Metafile>,
    /// Modules parsed during this build rather than taken from the cache.
    pub parsed_modules: usize,
}

impl BuildResult {
    pub fn output(&self, path: impl AsRef<Path>) -> Option<&OutputFile> {
        let path = path.as_ref();
        self.output_files
            .iter()
            .find(|file| file.path == path || file.path.ends_with(path))
    }
}

/// Reusable build driver. Keeps the parse cache between builds.
pub struct Bundler {
    options: BuildOptions,
    plugins: Vec<Plugin>,
    parser: Arc<dyn ModuleParser>,
    fs: Arc<dyn FileSystem>,
    cache: ParseCache,
    abort: AbortHandle,
}

impl Bundler {
    pub fn new(options: BuildOptions) -> Self {
        let parser: Arc<dyn ModuleParser> = Arc::new(EcmaScanner);
        let cache = ParseCache::new(parser.name(), options.parse_hash());
        Self {
            options,
            plugins: Vec::new(),
            parser,
            fs: Arc::new(OsFileSystem),
            cache,
            abort: AbortHandle::new(),
        }
    }

    /// Plugins are consulted in registration order.
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ModuleParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_cache(mut self, cache: ParseCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut BuildOptions {
        &mut self.options
    }

    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    pub fn build(&mut self) -> Result<BuildResult, BuildFailure> {
        let _span = info_span!("build", entries = self.options.entry_points.len()).entered();
        self.cache.validate(self.parser.name(), &self.options.parse_hash());

        // Phase 1: discover, load and parse
        let resolver = Resolver::new(Arc::clone(&self.fs), &self.options);
        let ctx = ScanContext {
            options: &self.options,
            plugins: &self.plugins,
            parser: self.parser.as_ref(),
            resolver: &resolver,
            fs: self.fs.as_ref(),
            cache: &self.cache,
            abort: &self.abort,
        };
        let scanned = scan(&ctx)?;
        let mut parsed_modules = 0;
        for module in scanned.modules.iter().filter(|module| module.freshly_parsed) {
            parsed_modules += 1;
            self.cache.insert(
                module.key.clone(),
                module.source_hash.clone(),
                module.parsed.as_ref().clone(),
            );
        }
        let live_keys: rustc_hash::FxHashSet<_> = scanned.modules.iter().map(|module| module.key.clone()).collect();
        self.cache.retain(|key| live_keys.contains(key));

        // Phase 2: link
        let mut graph = ModuleGraph::link(scanned)?;
        graph.pin_names(&self.options.pinned_names);
        self.check_abort(&graph)?;

        // Phase 3: chunks and names
        let mut chunks = build_chunks(&graph, &self.options);
        let names = rename_chunks(&graph, &chunks, &self.options);
        chunks.set_export_aliases(|chunk, symbol| export_alias(&names, chunk, symbol));
        let paths = self.output_paths(&graph, &chunks)?;
        self.check_abort(&graph)?;

        // Phase 4: print every chunk in parallel
        let format = strategy(self.options.format, self.options.global_name.as_deref());
        let print_ctx = PrintContext {
            graph: &graph,
            chunks: &chunks,
            names: &names,
            options: &self.options,
            format: format.as_ref(),
        };
        let printed: Vec<Result<Printed, BuildError>> = chunks
            .chunks
            .par_iter()
            .map(|chunk| print_outputs(&print_ctx, chunk, &paths[chunk.idx.index()]))
            .collect();
        let mut errors = ErrorCollector::default();
        let mut outputs = Vec::with_capacity(printed.len());
        for result in printed {
            match result {
                Ok(printed) => outputs.push(printed),
                Err(error) => errors.push(error),
            }
        }
        if !errors.is_empty() {
            return Err(errors.into_failure(graph.warnings.clone()));
        }

        // Phase 5: metafile and files
        let metafile = self
            .options
            .metafile
            .then(|| self.metafile(&graph, &chunks, &paths, &outputs));
        let output_files = self.output_files(&paths, outputs)?;
        if self.options.write {
            self.write(&output_files, &graph)?;
        }

        info!(
            modules = graph.modules.len(),
            chunks = chunks.chunks.len(),
            files = output_files.len(),
            "build finished"
        );
        Ok(BuildResult {
            output_files,
            warnings: graph.warnings,
            metafile,
            parsed_modules,
        })
    }

    /// Build again, reusing parses of modules whose source is unchanged.
    pub fn rebuild(&mut self) -> Result<BuildResult, BuildFailure> {
        debug!(cached = self.cache.len(), "rebuild");
        self.build()
    }

    fn check_abort(&self, graph: &ModuleGraph) -> Result<(), BuildFailure> {
        if self.abort.is_aborted() {
            return Err(BuildFailure::new(vec![BuildError::Aborted], graph.warnings.clone()));
        }
        Ok(())
    }

    fn output_paths(&self, graph: &ModuleGraph, chunks: &ChunkGraph) -> Result<Vec<ChunkPaths>, BuildFailure> {
        let js_chunks = chunks.chunks.iter().filter(|chunk| chunk.has_js(graph)).count();
        if let Some(outfile) = &self.options.outfile {
            if chunks.chunks.len() != 1 || js_chunks > 1 {
                return Err(BuildFailure::new(
                    vec![BuildError::InvalidOptions(format!(
                        "\"outfile\" needs a build with a single output, this one has {} chunks; use \"outdir\"",
                        chunks.chunks.len()
                    ))],
                    graph.warnings.clone(),
                ));
            }
            let js = normalize_path(&self.options.working_dir.join(outfile));
            let css = js.with_extension("css");
            return Ok(vec![ChunkPaths { js, css }]);
        }
        let dir = normalize_path(&self.options.output_dir());
        Ok(chunks
            .chunks
            .iter()
            .map(|chunk| ChunkPaths {
                js: dir.join(&chunk.file_name),
                css: dir.join(
                    chunk
                        .css_file_name
                        .clone()
                        .unwrap_or_else(|| chunk.file_name.replace(".js", ".css")),
                ),
            })
            .collect())
    }

    /// Path as it appears in the metafile: relative to the working directory.
    fn display_path(&self, path: &Path) -> String {
        relative_path(&self.options.working_dir, path).unwrap_or_else(|| path.to_string_lossy().replace('\\', "/"))
    }

    fn metafile(&self, graph: &ModuleGraph, chunks: &ChunkGraph, paths: &[ChunkPaths], outputs: &[Printed]) -> Metafile {
        let mut metafile = Metafile::default();
        let mut contributed = Vec::new();
        for printed in outputs {
            let chunk = chunks.chunk(printed.chunk);
            let chunk_paths = &paths[chunk.idx.index()];
            let css_path = printed.css.as_ref().map(|_| self.display_path(&chunk_paths.css));

            if let Some(js) = &printed.js {
                let mut output = MetafileOutput::new(js.code.len());
                for (module, bytes) in &js.module_bytes {
                    output.add_input(&graph.module(*module).pretty_path, *bytes);
                    contributed.push(*module);
                }
                for import in &js.imports {
                    match import {
                        ChunkImport::Chunk { chunk, kind } => {
                            output.add_import(self.display_path(&paths[chunk.index()].js), *kind, false)
                        }
                        ChunkImport::External { path, kind } => output.add_import(path.clone(), *kind, true),
                    }
                }
                output.exports = js.exports.clone();
                if let Some(module) = chunk.root_module().filter(|_| chunk.is_entry()) {
                    output.entry_point = Some(graph.module(module).pretty_path.clone());
                }
                output.css_bundle = css_path.clone();
                metafile.outputs.insert(self.display_path(&chunk_paths.js), output);
            }
            if let (Some(css), Some(css_path)) = (&printed.css, css_path) {
                let mut output = MetafileOutput::new(css.code.len());
                for (module, bytes) in &css.module_bytes {
                    output.add_input(&graph.module(*module).pretty_path, *bytes);
                    contributed.push(*module);
                }
                if printed.js.is_none() {
                    if let Some(module) = chunk.root_module().filter(|_| chunk.is_entry()) {
                        output.entry_point = Some(graph.module(module).pretty_path.clone());
                    }
                }
                metafile.outputs.insert(css_path, output);
            }
        }
        metafile.add_inputs(graph, contributed);
        metafile
    }

    fn output_files(&self, paths: &[ChunkPaths], outputs: Vec<Printed>) -> Result<Vec<OutputFile>, BuildFailure> {
        let mut files = Vec::new();
        for printed in outputs {
            let chunk_paths = &paths[printed.chunk.index()];
            if let Some(js) = printed.js {
                let map = match (self.options.sourcemap, js.map) {
                    (SourceMapMode::Linked | SourceMapMode::External, Some(map)) => Some(
                        map.to_json()
                            .map_err(|e| BuildFailure::single(BuildError::Internal(format!("source map: {e}"))))?,
                    ),
                    _ => None,
                };
                files.push(OutputFile {
                    path: chunk_paths.js.clone(),
                    contents: js.code.into_bytes(),
                });
                if let Some(map) = map {
                    let mut path = chunk_paths.js.clone().into_os_string();
                    path.push(".map");
                    files.push(OutputFile {
                        path: PathBuf::from(path),
                        contents: map.into_bytes(),
                    });
                }
            }
            if let Some(css) = printed.css {
                files.push(OutputFile {
                    path: chunk_paths.css.clone(),
                    contents: css.code.into_bytes(),
                });
            }
        }
        Ok(files)
    }

    fn write(&self, files: &[OutputFile], graph: &ModuleGraph) -> Result<(), BuildFailure> {
        let mut errors = ErrorCollector::default();
        for file in files {
            if let Err(source) = self.fs.write(&file.path, &file.contents) {
                errors.push(BuildError::Io {
                    path: file.path.clone(),
                    source,
                });
            }
        }
        if !errors.is_empty() {
            return Err(errors.into_failure(graph.warnings.clone()));
        }
        debug!(files = files.len(), "wrote outputs");
        Ok(())
    }
}

/// Build `options` once against the real file system.
pub fn build(options: BuildOptions) -> Result<BuildResult, BuildFailure> {
    Bundler::new(options).build()
}

#[derive(Debug, Clone)]
struct ChunkPaths {
    js: PathBuf,
    css: PathBuf,
}

struct Printed {
    chunk: ChunkIdx,
    js: Option<PrintedChunk>,
    css: Option<PrintedCss>,
}

fn print_outputs(ctx: &PrintContext<'_>, chunk: &Chunk, paths: &ChunkPaths) -> Result<Printed, BuildError> {
    let js = if chunk.has_js(ctx.graph) {
        let name = paths
            .js
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| chunk.file_name.clone());
        Some(print_chunk(ctx, chunk, &name)?)
    } else {
        None
    };
    let css = print_css(ctx.graph, ctx.chunks, chunk.idx);
    Ok(Printed {
        chunk: chunk.idx,
        js,
        css,
    })
}
