//! The linked module graph.
//!
//! Built once the scheduler has drained. Provisional ids are replaced by
//! [`ModuleIdx`]s from a depth-first walk over the entry points, every module
//! gets its synthesized symbols (namespace object, CommonJS wrapper, interop
//! imports), and every named import is bound to its final target. After
//! [`ModuleGraph::link`] returns the graph is never mutated again.

mod bindings;
mod deps;
mod order;

pub use bindings::Binding;
pub use deps::LiveItem;

use crate::error::{BuildError, BuildFailure, Warning};
use crate::ids::{ImportRecordIdx, ModuleIdx, PartIdx, SymbolIdx, SymbolRef};
use crate::loader::Loader;
use crate::parse::{
    identifier_stem, ImportKind, LocalExport, ParsedModule, Part, PartShape, Span, Symbol,
    SymbolFlags, SymbolKind,
};
use crate::plugin::ModuleKey;
use crate::scheduler::{ScanResult, ScanTarget};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, debug_span, trace};

/// Where an import record of a linked module points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordTarget {
    Module(ModuleIdx),
    External(String),
}

/// How a module's exports are exposed to importers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    /// Has `import`/`export` syntax.
    Esm,
    /// Uses free `module`/`exports`; wrapped in `__commonJS`.
    CommonJs,
    /// Neither; has no exports.
    None,
    Css,
}

/// A module of the linked graph.
#[derive(Debug, Clone)]
pub struct Module {
    pub idx: ModuleIdx,
    pub key: ModuleKey,
    pub pretty_path: String,
    pub source: Arc<str>,
    pub loader: Loader,
    pub ast: Arc<ParsedModule>,
    /// `ast.symbols` followed by synthesized symbols.
    pub symbols: Vec<Symbol>,
    /// `ast.parts` followed by synthesized parts.
    pub parts: Vec<Part>,
    /// Targets of `ast.import_records`, index for index.
    pub import_targets: Vec<RecordTarget>,
    /// Declared side effects; `None` means undeclared.
    pub side_effects: Option<bool>,
    pub format: ModuleFormat,
    /// Base for synthesized names.
    pub stem: String,
    pub namespace_symbol: SymbolIdx,
    pub namespace_part: PartIdx,
    /// `require_<stem>` and its part, for CommonJS modules.
    pub wrapper: Option<(SymbolIdx, PartIdx)>,
    /// `import_<name>` per static record that targets CommonJS or an external
    /// and binds names.
    pub record_imports: Vec<Option<SymbolIdx>>,
    /// Final binding of every import local.
    pub import_bindings: FxHashMap<SymbolIdx, Binding>,
    /// Every export visible to importers, including `export *` names.
    pub resolved_exports: IndexMap<String, Binding>,
    /// Parts declaring each symbol.
    pub symbol_parts: Vec<Vec<PartIdx>>,
    /// Position in [`ModuleGraph::exec_order`].
    pub exec_index: usize,
    pub source_hash: String,
}

impl Module {
    pub fn symbol(&self, symbol: SymbolIdx) -> &Symbol {
        &self.symbols[symbol.index()]
    }

    pub fn part(&self, part: PartIdx) -> &Part {
        &self.parts[part.index()]
    }

    pub fn target(&self, record: ImportRecordIdx) -> &RecordTarget {
        &self.import_targets[record.index()]
    }

    pub fn target_module(&self, record: ImportRecordIdx) -> Option<ModuleIdx> {
        match self.target(record) {
            RecordTarget::Module(target) => Some(*target),
            RecordTarget::External(_) => None,
        }
    }

    pub fn is_commonjs(&self) -> bool {
        self.format == ModuleFormat::CommonJs
    }

    pub fn is_css(&self) -> bool {
        self.format == ModuleFormat::Css
    }

    /// Whether `symbol` is the local alias of an `import` declaration.
    pub fn is_import_local(&self, symbol: SymbolIdx) -> bool {
        self.import_bindings.contains_key(&symbol)
    }

    /// Parts present in the source, excluding synthesized ones.
    pub fn source_parts(&self) -> impl Iterator<Item = (PartIdx, &Part)> {
        self.parts[..self.ast.parts.len()]
            .iter()
            .enumerate()
            .map(|(i, part)| (PartIdx::new(i), part))
    }

    /// Importing this module for its effects alone can be dropped.
    pub fn is_side_effect_free(&self) -> bool {
        self.side_effects == Some(false)
    }
}

#[derive(Debug)]
pub struct ModuleGraph {
    pub modules: Vec<Module>,
    /// Entry modules in configured order.
    pub entries: Vec<ModuleIdx>,
    /// Dependencies before dependents; cycles broken by first discovery.
    pub exec_order: Vec<ModuleIdx>,
    pub warnings: Vec<Warning>,
}

impl ModuleGraph {
    /// Link the scheduler's output into the final graph.
    pub fn link(scan: ScanResult) -> Result<Self, BuildFailure> {
        let _span = debug_span!("link", modules = scan.modules.len()).entered();

        // Phase 1: deterministic numbering, independent of completion order
        let numbering = order::number_modules(&scan);
        let mut slots: Vec<Option<_>> = scan.modules.into_iter().map(Some).collect();
        let mut modules = Vec::with_capacity(numbering.order.len());
        for (final_index, provisional) in numbering.order.iter().enumerate() {
            let Some(scanned) = slots[*provisional].take() else {
                return Err(BuildFailure::single(BuildError::Internal(format!(
                    "module {provisional} numbered twice"
                ))));
            };
            let targets = scanned
                .targets
                .iter()
                .map(|target| match target {
                    ScanTarget::Module(id) => numbering.final_of[*id]
                        .map(RecordTarget::Module)
                        .ok_or_else(|| {
                            BuildFailure::single(BuildError::Internal(format!(
                                "import of unnumbered module {id}"
                            )))
                        }),
                    ScanTarget::External(path) => Ok(RecordTarget::External(path.clone())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            modules.push(Module::new(ModuleIdx::new(final_index), scanned, targets));
        }
        let entries = scan
            .entries
            .iter()
            .map(|id| numbering.final_of[*id])
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                BuildFailure::single(BuildError::Internal("entry point was not numbered".into()))
            })?;

        // Phase 2: formats are known for every module, so interop symbols can
        // be synthesized
        let formats: Vec<ModuleFormat> = modules.iter().map(|module| module.format).collect();
        for module in &mut modules {
            module.synthesize_record_imports(&formats);
        }

        // Phase 3: execution order
        let exec_order = order::exec_order(&modules, &entries);
        for (position, idx) in exec_order.iter().enumerate() {
            modules[idx.index()].exec_index = position;
        }

        let mut graph = ModuleGraph {
            modules,
            entries,
            exec_order,
            warnings: Vec::new(),
        };

        // Phase 4: exports and import bindings
        bindings::bind(&mut graph)?;

        debug!(
            modules = graph.modules.len(),
            warnings = graph.warnings.len(),
            "linked module graph"
        );
        Ok(graph)
    }

    pub fn module(&self, idx: ModuleIdx) -> &Module {
        &self.modules[idx.index()]
    }

    pub fn symbol(&self, symbol: SymbolRef) -> &Symbol {
        self.module(symbol.module).symbol(symbol.symbol)
    }

    /// The symbol an occurrence of `symbol` ultimately reads: import locals
    /// are replaced by the object or symbol they are bound to.
    pub fn canonical_symbol(&self, symbol: SymbolRef) -> Option<SymbolRef> {
        match self.module(symbol.module).import_bindings.get(&symbol.symbol) {
            Some(binding) => binding.symbol(),
            None => Some(symbol),
        }
    }

    pub fn is_entry(&self, idx: ModuleIdx) -> bool {
        self.entries.contains(&idx)
    }

    /// Mark the entry modules' own top-level symbols named in `names` so the
    /// renamer leaves them alone.
    pub fn pin_names(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        for entry in self.entries.clone() {
            let module = &mut self.modules[entry.index()];
            for (i, symbol) in module.symbols.iter_mut().enumerate() {
                let pinnable = !module.import_bindings.contains_key(&SymbolIdx::new(i))
                    && symbol.kind != SymbolKind::Import
                    && symbol.kind != SymbolKind::Generated;
                if pinnable && names.contains(&symbol.name) {
                    symbol.flags |= SymbolFlags::MUST_NOT_RENAME;
                    trace!(module = %module.pretty_path, name = %symbol.name, "pinned");
                }
            }
        }
    }
}

impl Module {
    fn new(
        idx: ModuleIdx,
        scanned: crate::scheduler::ScannedModule,
        import_targets: Vec<RecordTarget>,
    ) -> Self {
        let ast = scanned.parsed;
        let format = if ast.is_css() {
            ModuleFormat::Css
        } else if ast.is_commonjs() {
            ModuleFormat::CommonJs
        } else if ast.has_esm_syntax {
            ModuleFormat::Esm
        } else {
            ModuleFormat::None
        };
        let stem = identifier_stem(&scanned.pretty_path);
        let mut symbols = ast.symbols.clone();
        let mut parts = ast.parts.clone();

        let namespace_symbol = SymbolIdx::new(symbols.len());
        symbols.push(Symbol::new(format!("{stem}_exports"), SymbolKind::Generated));
        let namespace_part = PartIdx::new(parts.len());
        let mut part = Part::new(Span::default(), PartShape::NamespaceObject);
        part.declared.push(namespace_symbol);
        parts.push(part);

        let wrapper = (format == ModuleFormat::CommonJs).then(|| {
            let symbol = SymbolIdx::new(symbols.len());
            symbols.push(Symbol::new(format!("require_{stem}"), SymbolKind::Generated));
            let part_idx = PartIdx::new(parts.len());
            let mut part = Part::new(Span::new(0, scanned.source.len() as u32), PartShape::CommonJsWrapper);
            part.declared.push(symbol);
            part.import_records = (0..ast.import_records.len())
                .map(ImportRecordIdx::new)
                .collect();
            parts.push(part);
            (symbol, part_idx)
        });

        let record_count = ast.import_records.len();
        Self {
            idx,
            key: scanned.key,
            pretty_path: scanned.pretty_path,
            source: scanned.source,
            loader: scanned.loader,
            ast,
            symbols,
            parts,
            import_targets,
            side_effects: scanned.side_effects,
            format,
            stem,
            namespace_symbol,
            namespace_part,
            wrapper,
            record_imports: vec![None; record_count],
            import_bindings: FxHashMap::default(),
            resolved_exports: IndexMap::new(),
            symbol_parts: Vec::new(),
            exec_index: 0,
            source_hash: scanned.source_hash,
        }
    }

    /// Declare `import_<name>` on import statements whose target is CommonJS
    /// or external and that bind at least one name.
    fn synthesize_record_imports(&mut self, formats: &[ModuleFormat]) {
        let mut binds_names = vec![false; self.ast.import_records.len()];
        for import in &self.ast.named_imports {
            binds_names[import.record.index()] = true;
        }
        for export in self.ast.exports.values() {
            if let LocalExport::ReExport { record, .. } = export {
                binds_names[record.index()] = true;
            }
        }

        for part_index in 0..self.ast.parts.len() {
            let record = match self.parts[part_index].shape {
                PartShape::Import { record } | PartShape::ExportFrom { record } => record,
                _ => continue,
            };
            if !binds_names[record.index()] || self.ast.record(record).kind != ImportKind::Static {
                continue;
            }
            let base = match &self.import_targets[record.index()] {
                RecordTarget::External(path) => identifier_stem(path),
                RecordTarget::Module(target) if formats[target.index()] == ModuleFormat::CommonJs => {
                    identifier_stem(&self.ast.record(record).specifier)
                }
                RecordTarget::Module(_) => continue,
            };
            let symbol = SymbolIdx::new(self.symbols.len());
            self.symbols
                .push(Symbol::new(format!("import_{base}"), SymbolKind::Generated));
            self.parts[part_index].declared.push(symbol);
            self.record_imports[record.index()] = Some(symbol);
        }

        let mut symbol_parts = vec![Vec::new(); self.symbols.len()];
        for (part_index, part) in self.parts.iter().enumerate() {
            for symbol in &part.declared {
                symbol_parts[symbol.index()].push(PartIdx::new(part_index));
            }
        }
        self.symbol_parts = symbol_parts;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::bundler::AbortHandle;
    use crate::cache::ParseCache;
    use crate::fs::MemoryFileSystem;
    use crate::options::BuildOptions;
    use crate::parse::EcmaScanner;
    use crate::resolver::Resolver;
    use crate::scheduler::{scan, ScanContext};
    use std::path::PathBuf;

    /// Scan and link an in-memory project rooted at `/p`.
    pub fn link_files(files: &[(&str, &str)], entries: &[&str]) -> Result<ModuleGraph, BuildFailure> {
        let fs = Arc::new(MemoryFileSystem::with_files(files.iter().copied()));
        let options = BuildOptions {
            entry_points: entries.iter().map(|e| e.to_string()).collect(),
            working_dir: PathBuf::from("/p"),
            workers: 2,
            external: vec!["node:*".to_string()],
            ..BuildOptions::default()
        };
        let resolver = Resolver::new(fs.clone(), &options);
        let cache = ParseCache::default();
        let abort = AbortHandle::new();
        let ctx = ScanContext {
            options: &options,
            plugins: &[],
            parser: &EcmaScanner,
            resolver: &resolver,
            fs: fs.as_ref(),
            cache: &cache,
            abort: &abort,
        };
        ModuleGraph::link(scan(&ctx)?)
    }

    pub fn module_named<'g>(graph: &'g ModuleGraph, path: &str) -> &'g Module {
        graph
            .modules
            .iter()
            .find(|module| module.pretty_path == path)
            .unwrap_or_else(|| panic!("no module {path}"))
    }

    pub fn symbol_named(module: &Module, name: &str) -> SymbolIdx {
        module
            .symbols
            .iter()
            .position(|symbol| symbol.name == name)
            .map(SymbolIdx::new)
            .unwrap_or_else(|| panic!("no symbol {name} in {}", module.pretty_path))
    }
}
