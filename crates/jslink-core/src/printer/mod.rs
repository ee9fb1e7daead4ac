//! Chunk printing.
//!
//! Live parts are copied from the original source text with three kinds of
//! edits: identifier occurrences get their final names, `require()` and
//! `import()` calls are pointed at wrappers, namespace objects or chunk
//! files, and module syntax is replaced by plain declarations. Everything
//! else is byte-for-byte the input, which keeps the source map exact.

mod css;
mod format;
mod writer;

pub use css::{print_css, PrintedCss};
pub use format::{export_clause, strategy, ChunkExports, CjsFormat, EsmFormat, FormatStrategy, IifeFormat};
pub use writer::{CodeWriter, SourceRef};

use crate::chunker::{Chunk, ChunkGraph};
use crate::error::BuildError;
use crate::graph::{Binding, Module, ModuleGraph, RecordTarget};
use crate::ids::{ChunkIdx, ImportRecordIdx, ModuleIdx, PartIdx, SymbolIdx, SymbolRef};
use crate::loader::{is_identifier, quote_js_string};
use crate::options::{BuildOptions, SourceMapMode};
use crate::parse::{ImportKind, Part, PartShape, Shorthand, Span};
use crate::renamer::{root_export_local, ChunkNames};
use crate::shaker::LiveSet;
use crate::sourcemap::{LineIndex, SourceMap};
use indexmap::{IndexMap, IndexSet};
use jslink_runtime::Helper;
use std::collections::BTreeSet;
use tracing::{debug_span, trace};

/// Everything shared by the chunks of one build.
pub struct PrintContext<'a> {
    pub graph: &'a ModuleGraph,
    pub chunks: &'a ChunkGraph,
    pub names: &'a [ChunkNames],
    pub options: &'a BuildOptions,
    pub format: &'a dyn FormatStrategy,
}

/// How a chunk refers to another output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkImport {
    Chunk { chunk: ChunkIdx, kind: ImportKind },
    External { path: String, kind: ImportKind },
}

#[derive(Debug, Clone)]
pub struct PrintedChunk {
    pub chunk: ChunkIdx,
    pub code: String,
    pub map: Option<SourceMap>,
    /// Bytes of `code` produced by each module.
    pub module_bytes: IndexMap<ModuleIdx, usize>,
    pub imports: Vec<ChunkImport>,
    /// Names the chunk exports, sorted.
    pub exports: Vec<String>,
}

struct ChunkPrinter<'a> {
    ctx: &'a PrintContext<'a>,
    chunk: &'a Chunk,
    names: &'a ChunkNames,
    live: &'a LiveSet,
    writer: CodeWriter,
    helpers: BTreeSet<Helper>,
    imports: IndexSet<(bool, ChunkImportKey)>,
    module_bytes: IndexMap<ModuleIdx, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChunkImportKey {
    Chunk(ChunkIdx),
    External(String),
}

/// Print the JavaScript of `chunk`. `output_name` is the file name the
/// chunk is written under, used for the source map.
pub fn print_chunk(ctx: &PrintContext<'_>, chunk: &Chunk, output_name: &str) -> Result<PrintedChunk, BuildError> {
    let _span = debug_span!("print", chunk = %chunk.file_name).entered();
    let mut writer = CodeWriter::new();
    if ctx.options.sourcemap.is_enabled() {
        writer = writer.with_source_map(output_name);
    }
    let mut printer = ChunkPrinter {
        ctx,
        chunk,
        names: &ctx.names[chunk.idx.index()],
        live: ctx.chunks.live_set(chunk),
        writer,
        helpers: BTreeSet::new(),
        imports: IndexSet::new(),
        module_bytes: IndexMap::new(),
    };

    for idx in &chunk.modules {
        if !ctx.graph.module(*idx).is_css() {
            printer.print_module(*idx)?;
        }
    }
    let (exports_text, exports) = printer.exports()?;
    printer.writer.write(&exports_text);
    if let Some(epilogue) = ctx.format.epilogue() {
        printer.writer.write(&epilogue);
    }
    if let Some(footer) = &ctx.options.footer {
        printer.writer.writeln(footer);
    }

    let prefix = printer.prefix()?;
    let ChunkPrinter {
        writer,
        imports,
        module_bytes,
        ..
    } = printer;
    let (mut code, map) = writer.finish(&prefix);
    match (ctx.options.sourcemap, &map) {
        (SourceMapMode::Linked, Some(_)) => {
            code.push_str(&format!("//# sourceMappingURL={output_name}.map\n"));
        }
        (SourceMapMode::Inline, Some(map)) => {
            let url = map
                .to_data_url()
                .map_err(|e| BuildError::Internal(format!("source map for {output_name}: {e}")))?;
            code.push_str(&format!("//# sourceMappingURL={url}\n"));
        }
        _ => {}
    }

    let imports = imports
        .into_iter()
        .map(|(dynamic, key)| {
            let kind = if dynamic {
                ImportKind::Dynamic
            } else {
                ImportKind::Static
            };
            match key {
                ChunkImportKey::Chunk(chunk) => ChunkImport::Chunk { chunk, kind },
                ChunkImportKey::External(path) => ChunkImport::External { path, kind },
            }
        })
        .collect();
    trace!(bytes = code.len(), "printed chunk");
    Ok(PrintedChunk {
        chunk: chunk.idx,
        code,
        map: if ctx.options.sourcemap == SourceMapMode::Inline {
            None
        } else {
            map
        },
        module_bytes,
        imports,
        exports,
    })
}

impl<'a> ChunkPrinter<'a> {
    fn graph(&self) -> &'a ModuleGraph {
        self.ctx.graph
    }

    fn symbol_name(&self, symbol: SymbolRef) -> Result<&'a str, BuildError> {
        self.names.name(symbol).ok_or_else(|| {
            BuildError::Internal(format!(
                "symbol {} of {} has no name in {}",
                self.graph().symbol(symbol).name,
                self.graph().module(symbol.module).pretty_path,
                self.chunk.file_name
            ))
        })
    }

    fn binding_text(&self, binding: &Binding) -> Result<String, BuildError> {
        Ok(match binding {
            Binding::Symbol(symbol) => self.symbol_name(*symbol)?.to_string(),
            Binding::Property { object, name } => {
                let object = self.symbol_name(*object)?;
                if is_identifier(name) {
                    format!("{object}.{name}")
                } else {
                    format!("{object}[{}]", quote_js_string(name))
                }
            }
            Binding::Undefined => "void 0".to_string(),
        })
    }

    fn occurrence_text(&self, module: &Module, symbol: SymbolIdx) -> Result<String, BuildError> {
        match module.import_bindings.get(&symbol) {
            Some(binding) => self.binding_text(binding),
            None => Ok(self.symbol_name(SymbolRef::new(module.idx, symbol))?.to_string()),
        }
    }

    /// Whether a live part produces any output.
    fn part_prints(&self, module: &Module, part: &Part) -> bool {
        match part.shape {
            PartShape::Import { record } | PartShape::ExportFrom { record } => match module.target(record) {
                RecordTarget::External(_) => true,
                RecordTarget::Module(target) => self.graph().module(*target).is_commonjs(),
            },
            PartShape::ExportClause => false,
            _ => true,
        }
    }

    fn print_module(&mut self, idx: ModuleIdx) -> Result<(), BuildError> {
        let module = self.graph().module(idx);
        // The namespace object goes first so getters exist before any code runs.
        let mut parts: Vec<PartIdx> = Vec::new();
        if self.live.is_part_live(idx, module.namespace_part) {
            parts.push(module.namespace_part);
        }
        parts.extend(
            self.live
                .live_parts(idx)
                .filter(|part| *part != module.namespace_part)
                .filter(|part| self.part_prints(module, module.part(*part))),
        );
        if parts.is_empty() {
            return Ok(());
        }

        for name in &module.ast.unbound {
            if let Some(helper) = Helper::from_name(name) {
                self.helpers.insert(helper);
            }
        }
        if !self.writer.is_empty() {
            self.writer.write("\n");
        }
        self.writer.writeln(&format!("// {}", module.pretty_path));
        let start = self.writer.len();

        let lines = LineIndex::new(&module.source);
        let id = if self.writer.has_source_map() {
            self.writer.add_source(&module.pretty_path, &module.source)
        } else {
            0
        };
        let source = SourceRef {
            id,
            text: &module.source,
            lines: &lines,
        };
        for part in parts {
            self.print_part(module, part, source)?;
        }
        *self.module_bytes.entry(idx).or_default() += self.writer.len() - start;
        Ok(())
    }

    fn print_part(&mut self, module: &Module, part_idx: PartIdx, source: SourceRef<'_>) -> Result<(), BuildError> {
        let part = module.part(part_idx);
        match &part.shape {
            PartShape::Stmt => {
                self.copy_part(module, part, source, part.span.start, part.span.end)?;
                self.writer.write("\n");
            }
            PartShape::ExportDecl { body } => {
                self.copy_part(module, part, source, *body, part.span.end)?;
                self.writer.write("\n");
            }
            PartShape::ExportDefaultDecl {
                body,
                symbol,
                name_insert,
            } => {
                match name_insert {
                    Some(at) => {
                        self.copy_part(module, part, source, *body, *at)?;
                        let name = self.symbol_name(SymbolRef::new(module.idx, *symbol))?;
                        self.writer.write(&format!(" {name}"));
                        self.copy_part(module, part, source, *at, part.span.end)?;
                    }
                    None => self.copy_part(module, part, source, *body, part.span.end)?,
                }
                self.writer.write("\n");
            }
            PartShape::ExportDefaultExpr { expr, symbol } => {
                let name = self.symbol_name(SymbolRef::new(module.idx, *symbol))?;
                self.writer.write(&format!("var {name} = "));
                self.copy_part(module, part, source, expr.start, expr.end)?;
                self.writer.write(";\n");
            }
            PartShape::Import { record } | PartShape::ExportFrom { record } => {
                let text = self.import_statement(module, *record)?;
                self.writer.write(&text);
            }
            PartShape::ExportClause => {}
            PartShape::NamespaceObject => {
                let text = self.namespace_object(module)?;
                self.writer.write(&text);
            }
            PartShape::CommonJsWrapper => self.commonjs_wrapper(module, part, source)?,
        }
        Ok(())
    }

    /// Copy `start..end` of a part, applying renames and record rewrites.
    fn copy_part(
        &mut self,
        module: &Module,
        part: &Part,
        source: SourceRef<'_>,
        start: u32,
        end: u32,
    ) -> Result<(), BuildError> {
        let range = Span::new(start, end);
        let mut edits: Vec<(Span, Edit)> = part
            .occurrences
            .iter()
            .filter(|occurrence| range.contains(occurrence.span))
            .map(|occurrence| (occurrence.span, Edit::Occurrence(occurrence.symbol, occurrence.shorthand)))
            .collect();
        edits.extend(part.import_records.iter().filter_map(|record| {
            let rec = module.ast.record(*record);
            (matches!(rec.kind, ImportKind::Require | ImportKind::Dynamic) && range.contains(rec.span))
                .then_some((rec.span, Edit::Record(*record)))
        }));
        edits.sort_by_key(|(span, _)| span.start);

        let mut cursor = start;
        for (span, edit) in edits {
            if span.start < cursor {
                continue;
            }
            self.writer.copy(source, cursor, span.start);
            let original = &module.source[span.start as usize..span.end as usize];
            match edit {
                Edit::Occurrence(symbol, shorthand) => {
                    let text = self.occurrence_text(module, symbol)?;
                    if text == original {
                        self.writer.copy(source, span.start, span.end);
                    } else if shorthand == Shorthand::Property {
                        self.writer
                            .substitute(source, span.start, original, &format!("{original}: {text}"));
                    } else {
                        self.writer.substitute(source, span.start, original, &text);
                    }
                }
                Edit::Record(record) => {
                    let text = self.record_text(module, record)?;
                    self.writer.substitute(source, span.start, original, &text);
                }
            }
            cursor = span.end;
        }
        self.writer.copy(source, cursor, end);
        Ok(())
    }

    /// Expression replacing a `require()` or `import()` call.
    fn record_text(&mut self, module: &Module, record: ImportRecordIdx) -> Result<String, BuildError> {
        let kind = module.ast.record(record).kind;
        let target = match module.target(record) {
            RecordTarget::External(path) => {
                let dynamic = kind == ImportKind::Dynamic;
                self.imports
                    .insert((dynamic, ChunkImportKey::External(path.clone())));
                let callee = if dynamic { "import" } else { "require" };
                return Ok(format!("{callee}({})", quote_js_string(path)));
            }
            RecordTarget::Module(target) => self.graph().module(*target),
        };

        if kind == ImportKind::Dynamic && self.ctx.chunks.splitting {
            if let Some(chunk) = self.ctx.chunks.root_chunks.get(&target.idx) {
                self.imports.insert((true, ChunkImportKey::Chunk(*chunk)));
                let path = format!("./{}", self.ctx.chunks.chunk(*chunk).file_name);
                return Ok(format!("import({})", quote_js_string(&path)));
            }
        }

        let value = if let Some((wrapper, _)) = target.wrapper {
            let call = format!("{}()", self.symbol_name(SymbolRef::new(target.idx, wrapper))?);
            if kind == ImportKind::Dynamic {
                self.helpers.insert(Helper::ToEsm);
                format!("__toESM({call})")
            } else {
                call
            }
        } else if target.is_css() {
            "{}".to_string()
        } else {
            let namespace = self.symbol_name(SymbolRef::new(target.idx, target.namespace_symbol))?;
            if kind == ImportKind::Dynamic {
                namespace.to_string()
            } else {
                self.helpers.insert(Helper::ToCommonJs);
                format!("__toCommonJS({namespace})")
            }
        };
        Ok(match kind {
            ImportKind::Dynamic if target.is_css() => "Promise.resolve().then(() => ({}))".to_string(),
            ImportKind::Dynamic => format!("Promise.resolve().then(() => {value})"),
            _ => value,
        })
    }

    /// Replacement for an import or re-export statement that is printed.
    fn import_statement(&mut self, module: &Module, record: ImportRecordIdx) -> Result<String, BuildError> {
        let binding = match module.record_imports[record.index()] {
            Some(symbol) => Some(self.symbol_name(SymbolRef::new(module.idx, symbol))?),
            None => None,
        };
        match module.target(record) {
            RecordTarget::External(path) => {
                self.imports
                    .insert((false, ChunkImportKey::External(path.clone())));
                if self.ctx.format.external_import_uses_to_esm(binding.is_some()) {
                    self.helpers.insert(Helper::ToEsm);
                }
                Ok(self.ctx.format.external_import(path, binding))
            }
            RecordTarget::Module(target) => {
                let target = self.graph().module(*target);
                let Some((wrapper, _)) = target.wrapper else {
                    return Ok(String::new());
                };
                let wrapper = self.symbol_name(SymbolRef::new(target.idx, wrapper))?;
                Ok(match binding {
                    Some(binding) => {
                        self.helpers.insert(Helper::ToEsm);
                        format!("var {binding} = __toESM({wrapper}());\n")
                    }
                    None => format!("{wrapper}();\n"),
                })
            }
        }
    }

    fn namespace_object(&mut self, module: &Module) -> Result<String, BuildError> {
        let name = self.symbol_name(SymbolRef::new(module.idx, module.namespace_symbol))?;
        let mut out = format!("var {name} = {{}};\n");
        let mut exports: Vec<(&String, &Binding)> = module.resolved_exports.iter().collect();
        if exports.is_empty() {
            return Ok(out);
        }
        exports.sort_by(|a, b| a.0.cmp(b.0));
        let mut items = Vec::with_capacity(exports.len());
        for (export, binding) in exports {
            let key = if is_identifier(export) {
                export.clone()
            } else {
                quote_js_string(export)
            };
            items.push(format!("  {key}: () => {}", self.binding_text(binding)?));
        }
        self.helpers.insert(Helper::Export);
        out.push_str(&format!("__export({name}, {{\n{}\n}});\n", items.join(",\n")));
        Ok(out)
    }

    fn commonjs_wrapper(&mut self, module: &Module, part: &Part, source: SourceRef<'_>) -> Result<(), BuildError> {
        let Some((wrapper, _)) = module.wrapper else {
            return Err(BuildError::Internal(format!(
                "{} has a wrapper part but no wrapper",
                module.pretty_path
            )));
        };
        let name = self.symbol_name(SymbolRef::new(module.idx, wrapper))?;
        self.helpers.insert(Helper::CommonJs);
        self.writer.write(&format!(
            "var {name} = __commonJS({{\n  {}(exports, module) {{\n",
            quote_js_string(&module.pretty_path)
        ));
        let end = module.source.trim_end().len() as u32;
        let body = Part {
            occurrences: Vec::new(),
            ..part.clone()
        };
        self.copy_part(module, &body, source, 0, end)?;
        self.writer.write("\n  }\n});\n");
        Ok(())
    }

    /// The tail exposing the root's exports, and the sorted export names.
    fn exports(&mut self) -> Result<(String, Vec<String>), BuildError> {
        let mut exports = ChunkExports::default();
        let mut temps = String::new();
        if let Some(root) = self.chunk.root_module() {
            let module = self.graph().module(root);
            if let Some((wrapper, _)) = module.wrapper {
                exports.commonjs_wrapper = Some(self.symbol_name(SymbolRef::new(root, wrapper))?.to_string());
            } else {
                // A root printed in another chunk keeps its namespace object there.
                if self.chunk.modules.contains(&root) && self.live.is_part_live(root, module.namespace_part) {
                    exports.namespace =
                        Some(self.symbol_name(SymbolRef::new(root, module.namespace_symbol))?.to_string());
                }
                if self.ctx.format.supports_chunk_imports() {
                    for (export, binding) in &module.resolved_exports {
                        let local = root_export_local(self.names, export, binding).ok_or_else(|| {
                            BuildError::Internal(format!("export {export:?} of {} has no local", module.pretty_path))
                        })?;
                        if !matches!(binding, Binding::Symbol(_)) {
                            temps.push_str(&format!("var {local} = {};\n", self.binding_text(binding)?));
                        }
                        exports.names.push((local.to_string(), export.clone()));
                    }
                }
            }
        }
        for (symbol, alias) in &self.chunk.exports_to_other_chunks {
            let local = self.symbol_name(*symbol)?.to_string();
            let pair = (local, alias.clone());
            if !exports.names.contains(&pair) {
                exports.names.push(pair);
            }
        }
        exports.names.sort_by(|a, b| a.1.cmp(&b.1));

        if self.ctx.format.exports_use_to_commonjs(&exports) {
            self.helpers.insert(Helper::ToCommonJs);
        }
        let mut names: Vec<String> = exports.names.iter().map(|(_, name)| name.clone()).collect();
        if exports.commonjs_wrapper.is_some() && self.ctx.format.supports_chunk_imports() {
            names.push("default".to_string());
        }
        names.sort();
        names.dedup();
        let text = format!("{temps}{}", self.ctx.format.exports(&exports));
        Ok((text, names))
    }

    /// Banner, format prologue, chunk imports and helpers.
    fn prefix(&mut self) -> Result<String, BuildError> {
        let mut prefix = String::new();
        if let Some(banner) = &self.ctx.options.banner {
            prefix.push_str(banner);
            prefix.push('\n');
        }
        if let Some(prologue) = self.ctx.format.prologue() {
            prefix.push_str(&prologue);
        }
        if self.ctx.format.supports_chunk_imports() {
            prefix.push_str(&self.chunk_imports()?);
        }
        if !self.helpers.is_empty() {
            prefix.push_str(&jslink_runtime::render(self.helpers.iter().copied()));
            if !self.writer.is_empty() {
                prefix.push('\n');
            }
        }
        Ok(prefix)
    }

    fn chunk_imports(&mut self) -> Result<String, BuildError> {
        let graph = self.graph();
        let chunks = self.ctx.chunks;
        let chunk = self.chunk;
        let mut out = String::new();
        for &other in &chunk.import_order {
            let exporter = chunks.chunk(other);
            let path = quote_js_string(&format!("./{}", exporter.file_name));
            self.imports.insert((false, ChunkImportKey::Chunk(other)));
            let Some(symbols) = chunk.imports_from.get(&other) else {
                out.push_str(&format!("import {path};\n"));
                continue;
            };
            let mut items = Vec::with_capacity(symbols.len());
            for symbol in symbols {
                let alias = exporter.exports_to_other_chunks.get(symbol).ok_or_else(|| {
                    BuildError::Internal(format!(
                        "{} does not export {}",
                        exporter.file_name,
                        graph.symbol(*symbol).name
                    ))
                })?;
                let local = self.symbol_name(*symbol)?;
                items.push(if alias == local {
                    alias.clone()
                } else {
                    format!("{alias} as {local}")
                });
            }
            items.sort();
            out.push_str(&format!("import {{ {} }} from {path};\n", items.join(", ")));
        }
        Ok(out)
    }
}

enum Edit {
    Occurrence(SymbolIdx, Shorthand),
    Record(ImportRecordIdx),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::build_chunks;
    use crate::graph::test_support::link_files;
    use crate::options::OutputFormat;
    use crate::renamer::{export_alias, rename_chunks};

    fn print_with(files: &[(&str, &str)], entries: &[&str], options: BuildOptions) -> Vec<String> {
        let graph = link_files(files, entries).unwrap();
        let mut chunks = build_chunks(&graph, &options);
        let names = rename_chunks(&graph, &chunks, &options);
        chunks.set_export_aliases(|chunk, symbol| export_alias(&names, chunk, symbol));
        let format = strategy(options.format, options.global_name.as_deref());
        let ctx = PrintContext {
            graph: &graph,
            chunks: &chunks,
            names: &names,
            options: &options,
            format: format.as_ref(),
        };
        chunks
            .chunks
            .iter()
            .map(|chunk| print_chunk(&ctx, chunk, &chunk.file_name).unwrap().code)
            .collect()
    }

    fn print(files: &[(&str, &str)]) -> String {
        print_with(files, &["./in.js"], BuildOptions::default()).remove(0)
    }

    #[test]
    fn test_default_export_chain() {
        let code = print(&[
            ("/p/in.js", "import dep from './dep.js';\nexport default dep === 123;\n"),
            ("/p/dep.js", "export default 123;\n"),
        ]);
        assert_eq!(
            code,
            "// dep.js\nvar dep_default = 123;\n\n// in.js\nvar in_default = dep_default === 123;\nexport {\n  in_default as default\n};\n"
        );
    }

    #[test]
    fn test_renamed_shorthand_and_export_keyword() {
        let code = print(&[
            ("/p/in.js", "import { x as y } from './a';\nconst x = 2;\nexport const obj = { x, y };\n"),
            ("/p/a.js", "export const x = 1;\n"),
        ]);
        insta::assert_snapshot!(code, @r###"
        // a.js
        const x = 1;

        // in.js
        const x2 = 2;
        const obj = { x: x2, y: x };
        export {
          obj
        };
        "###);
    }

    #[test]
    fn test_commonjs_interop() {
        let code = print(&[
            ("/p/in.js", "import lib from './lib.cjs';\nconsole.log(lib.value, require('./lib.cjs'));\n"),
            ("/p/lib.cjs", "exports.value = 1;\n"),
        ]);
        assert!(code.contains("var require_lib = __commonJS({\n  \"lib.cjs\"(exports, module) {\nexports.value = 1;\n  }\n});\n"));
        assert!(code.contains("var import_lib = __toESM(require_lib());\n"));
        assert!(code.contains("console.log(import_lib.default.value, require_lib());"));
        assert!(code.starts_with("var __create = Object.create;\n"));
    }

    #[test]
    fn test_require_of_esm_uses_namespace() {
        let code = print(&[
            ("/p/in.js", "const m = require('./m.js');\nconsole.log(m.a);\n"),
            ("/p/m.js", "export const a = 1;\n"),
        ]);
        assert!(code.contains("// m.js\nvar m_exports = {};\n__export(m_exports, {\n  a: () => a\n});\nconst a = 1;\n"));
        assert!(code.contains("const m = __toCommonJS(m_exports);"));
    }

    #[test]
    fn test_split_chunks_import_each_other() {
        let outputs = print_with(
            &[
                ("/p/a.js", "import { s } from './shared';\nconsole.log('a', s);\nexport const load = () => import('./lazy');\n"),
                ("/p/b.js", "import { s } from './shared';\nconsole.log('b', s);\n"),
                ("/p/shared.js", "export const s = 1;\n"),
                ("/p/lazy.js", "export default 'lazy';\n"),
            ],
            &["./a.js", "./b.js"],
            BuildOptions::default(),
        );
        assert_eq!(outputs.len(), 4);
        let shared_import = outputs[0].lines().next().unwrap();
        assert!(shared_import.starts_with("import { s } from \"./chunk-"));
        assert!(outputs[0].contains("const load = () => import(\"./chunk-"));
        assert!(outputs[3].contains("const s = 1;\nexport {\n  s\n};\n"));
        assert!(outputs[2].contains("var lazy_default = 'lazy';\nexport {\n  lazy_default as default\n};\n"));
    }

    #[test]
    fn test_iife_with_global_name() {
        let options = BuildOptions {
            format: OutputFormat::Iife,
            global_name: Some("lib".into()),
            ..BuildOptions::default()
        };
        let code = print_with(&[("/p/in.js", "export const a = 1;\n")], &["./in.js"], options).remove(0);
        assert!(code.starts_with("var lib = (() => {\n"));
        assert!(code.ends_with("const a = 1;\nreturn in_exports;\n})();\n"));
    }

    #[test]
    fn test_inlined_dynamic_import_without_splitting() {
        let options = BuildOptions {
            format: OutputFormat::Cjs,
            ..BuildOptions::default()
        };
        let code = print_with(
            &[
                ("/p/in.js", "import('./lazy').then((m) => m.default);\n"),
                ("/p/lazy.js", "export default 1;\n"),
            ],
            &["./in.js"],
            options,
        )
        .remove(0);
        assert!(code.contains("Promise.resolve().then(() => lazy_exports).then((m) => m.default);"));
        assert!(code.ends_with("module.exports = __toCommonJS(in_exports);\n"));
    }

    #[test]
    fn test_banner_footer_and_linked_source_map() {
        let options = BuildOptions {
            banner: Some("/* banner */".into()),
            footer: Some("/* footer */".into()),
            sourcemap: SourceMapMode::Linked,
            ..BuildOptions::default()
        };
        let code = print_with(&[("/p/in.js", "console.log(1);\n")], &["./in.js"], options).remove(0);
        assert_eq!(
            code,
            "/* banner */\n// in.js\nconsole.log(1);\n/* footer */\n//# sourceMappingURL=in.js.map\n"
        );
    }
}
