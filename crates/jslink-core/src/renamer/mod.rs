//! Final names for every live top-level symbol of a chunk.
//!
//! Modules of a chunk are concatenated into one scope, so two symbols that
//! were declared in different files may now collide. Names are handed out in
//! link order: the first symbol keeps its declared name and later ones get a
//! per-base counter suffix (`x`, `x2`, `x3`). Nothing is hashed, so the same
//! graph always produces the same names.
//!
//! A symbol referenced from inside a nested scope must also stay clear of
//! the names that scope declares. Symbol tables are never written to; each
//! chunk gets its own [`NameTable`].

mod reserved;

pub(crate) use reserved::is_reserved_word;

use crate::chunker::{Chunk, ChunkGraph};
use crate::graph::{Binding, ModuleGraph, RecordTarget};
use crate::ids::{ChunkIdx, SymbolIdx, SymbolRef};
use crate::loader::is_identifier;
use crate::options::{BuildOptions, OutputFormat};
use crate::parse::SymbolFlags;
use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, debug_span, trace, warn};

/// Names in use in one output scope.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: FxHashMap<SymbolRef, String>,
    taken: FxHashSet<String>,
    next_suffix: FxHashMap<String, u32>,
}

impl NameTable {
    /// Make `name` unavailable to every symbol.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Give `symbol` exactly `name` and take it from every other symbol.
    pub fn pin(&mut self, symbol: SymbolRef, name: &str) {
        self.taken.insert(name.to_string());
        self.names.insert(symbol, name.to_string());
    }

    /// Name `symbol` after `base`, adding a counter suffix if `base` is taken
    /// or listed in `avoid`. A symbol that already has a name keeps it.
    pub fn assign(&mut self, symbol: SymbolRef, base: &str, avoid: &FxHashSet<String>) -> &str {
        if !self.names.contains_key(&symbol) {
            let name = self.fresh(base, avoid);
            self.names.insert(symbol, name);
        }
        &self.names[&symbol]
    }

    /// An unused name derived from `base`, not bound to any symbol.
    pub fn fresh(&mut self, base: &str, avoid: &FxHashSet<String>) -> String {
        if !self.taken.contains(base) && !avoid.contains(base) {
            self.taken.insert(base.to_string());
            return base.to_string();
        }
        let counter = self.next_suffix.entry(base.to_string()).or_insert(2);
        loop {
            let candidate = format!("{base}{counter}");
            *counter += 1;
            if !self.taken.contains(&candidate) && !avoid.contains(&candidate) {
                self.taken.insert(candidate.clone());
                return candidate;
            }
        }
    }

    pub fn get(&self, symbol: SymbolRef) -> Option<&str> {
        self.names.get(&symbol).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Naming result for one chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkNames {
    pub table: NameTable,
    /// Export name to a temporary holding it, for entry exports that are
    /// properties of an interop object or undefined.
    pub export_temps: IndexMap<String, String>,
    /// Names other chunks import this chunk's symbols under.
    pub export_aliases: FxHashMap<SymbolRef, String>,
}

impl ChunkNames {
    pub fn name(&self, symbol: SymbolRef) -> Option<&str> {
        self.table.get(symbol)
    }
}

type AvoidMap = FxHashMap<SymbolRef, FxHashSet<String>>;

/// Assign final names in every chunk. Returns one [`ChunkNames`] per chunk,
/// index for index.
pub fn rename_chunks(graph: &ModuleGraph, chunks: &ChunkGraph, options: &BuildOptions) -> Vec<ChunkNames> {
    let _span = debug_span!("rename", chunks = chunks.chunks.len()).entered();
    let avoid = shadowing_constraints(graph);
    let empty = FxHashSet::default();

    // Phase 1: symbols declared in each chunk, chunks independent of each other
    let mut names: Vec<ChunkNames> = chunks
        .chunks
        .par_iter()
        .map(|chunk| ChunkNames {
            table: name_chunk(graph, chunks, chunk, options, &avoid),
            ..ChunkNames::default()
        })
        .collect();

    // Phase 2: imported symbols reuse the exporter's name where possible
    for chunk in &chunks.chunks {
        let imports: Vec<(SymbolRef, String)> = chunk
            .imports_from
            .iter()
            .flat_map(|(other, symbols)| {
                let exporter = &names[other.index()];
                symbols.iter().map(move |symbol| {
                    let base = exporter
                        .name(*symbol)
                        .map(str::to_string)
                        .unwrap_or_else(|| graph.symbol(*symbol).name.clone());
                    (*symbol, base)
                })
            })
            .collect();
        let table = &mut names[chunk.idx.index()].table;
        for (symbol, base) in imports {
            let name = table.assign(symbol, &base, avoid.get(&symbol).unwrap_or(&empty));
            trace!(chunk = %chunk.idx, symbol = %name, "named cross-chunk import");
        }
    }

    // Phase 3: temporaries for re-exported interop properties, then aliases
    // for cross-chunk exports that do not clash with the root's exports
    if options.format == OutputFormat::Esm {
        for chunk in &chunks.chunks {
            let entry = &mut names[chunk.idx.index()];
            entry.export_temps = export_temps(graph, chunk, &mut entry.table);
            entry.export_aliases = export_aliases(graph, chunk, entry);
        }
    }

    debug!(
        symbols = names.iter().map(|n| n.table.len()).sum::<usize>(),
        "renamed"
    );
    names
}

/// Final export aliases for [`ChunkGraph::set_export_aliases`].
pub fn export_alias(names: &[ChunkNames], chunk: ChunkIdx, symbol: SymbolRef) -> Option<String> {
    names[chunk.index()].export_aliases.get(&symbol).cloned()
}

/// Local name an entry export is read from, once names are final.
pub fn root_export_local<'n>(names: &'n ChunkNames, export: &str, binding: &Binding) -> Option<&'n str> {
    match binding {
        Binding::Symbol(symbol) => names.name(*symbol),
        Binding::Property { .. } | Binding::Undefined => {
            names.export_temps.get(export).map(String::as_str)
        }
    }
}

fn export_aliases(graph: &ModuleGraph, chunk: &Chunk, names: &ChunkNames) -> FxHashMap<SymbolRef, String> {
    let mut root_exports: FxHashMap<&str, Option<&str>> = FxHashMap::default();
    if let Some(root) = chunk.root_module() {
        let module = graph.module(root);
        if !module.is_commonjs() {
            for (export, binding) in &module.resolved_exports {
                root_exports.insert(export, root_export_local(names, export, binding));
            }
        }
    }
    let mut used: FxHashSet<String> = FxHashSet::default();
    let mut aliases = FxHashMap::default();
    for symbol in chunk.exports_to_other_chunks.keys() {
        let local = names
            .name(*symbol)
            .map(str::to_string)
            .unwrap_or_else(|| graph.symbol(*symbol).name.clone());
        let clashes = |alias: &str, used: &FxHashSet<String>| {
            used.contains(alias)
                || root_exports
                    .get(alias)
                    .is_some_and(|root_local| *root_local != Some(local.as_str()))
        };
        let mut alias = local.clone();
        let mut counter = 2;
        while clashes(&alias, &used) {
            alias = format!("{local}_{counter}");
            counter += 1;
        }
        used.insert(alias.clone());
        aliases.insert(*symbol, alias);
    }
    aliases
}

/// Names every symbol must stay clear of, because the places it is printed
/// sit inside nested scopes that declare them. Import locals and interop
/// calls print another symbol's name, so their constraints move to it.
fn shadowing_constraints(graph: &ModuleGraph) -> AvoidMap {
    let mut avoid: AvoidMap = FxHashMap::default();
    let mut add = |symbol: SymbolRef, names: &[String]| {
        if !names.is_empty() {
            avoid.entry(symbol).or_default().extend(names.iter().cloned());
        }
    };
    for module in &graph.modules {
        for (i, symbol) in module.symbols.iter().enumerate() {
            let local = SymbolIdx::new(i);
            let target = match module.import_bindings.get(&local) {
                Some(binding) => binding.symbol(),
                None => Some(SymbolRef::new(module.idx, local)),
            };
            if let Some(target) = target {
                add(target, &symbol.shadowing_names);
            }
        }
        for (i, record) in module.ast.import_records.iter().enumerate() {
            let RecordTarget::Module(target) = &module.import_targets[i] else {
                continue;
            };
            let target = graph.module(*target);
            let symbol = match target.wrapper {
                Some((wrapper, _)) => wrapper,
                None => target.namespace_symbol,
            };
            add(SymbolRef::new(target.idx, symbol), &record.shadowing_names);
        }
    }
    avoid
}

fn name_chunk(
    graph: &ModuleGraph,
    chunks: &ChunkGraph,
    chunk: &Chunk,
    options: &BuildOptions,
    avoid: &AvoidMap,
) -> NameTable {
    let live = chunks.live_set(chunk);
    let empty = FxHashSet::default();
    let mut table = NameTable::default();

    for word in reserved::RESERVED_WORDS.iter().chain(reserved::OUTPUT_GLOBALS) {
        table.reserve(*word);
    }
    for helper in jslink_runtime::Helper::ALL {
        table.reserve(helper.name());
    }
    for name in &options.reserved_names {
        table.reserve(name.clone());
    }
    if let Some(global) = &options.global_name {
        if let Some(root) = global.split('.').next() {
            table.reserve(root);
        }
    }
    for idx in &chunk.modules {
        for name in &graph.module(*idx).ast.unbound {
            table.reserve(name.clone());
        }
    }

    let mut ordered: Vec<SymbolRef> = Vec::new();
    for idx in &chunk.modules {
        let module = graph.module(*idx);
        for part in live.live_parts(*idx) {
            for symbol in &module.part(part).declared {
                if !module.is_import_local(*symbol) {
                    ordered.push(SymbolRef::new(*idx, *symbol));
                }
            }
        }
    }

    // Pinned symbols claim their names before anything else is named.
    for symbol in &ordered {
        let declared = graph.symbol(*symbol);
        if declared.flags.contains(SymbolFlags::MUST_NOT_RENAME) {
            if table.is_taken(&declared.name) {
                warn!(name = %declared.name, chunk = %chunk.file_name, "pinned name is already in use");
                continue;
            }
            table.pin(*symbol, &declared.name);
        }
    }
    for symbol in ordered {
        let declared = graph.symbol(symbol);
        table.assign(symbol, &declared.name, avoid.get(&symbol).unwrap_or(&empty));
    }
    table
}

fn export_temps(graph: &ModuleGraph, chunk: &Chunk, table: &mut NameTable) -> IndexMap<String, String> {
    let mut temps = IndexMap::new();
    let Some(root) = chunk.root_module() else {
        return temps;
    };
    let module = graph.module(root);
    if module.is_commonjs() {
        return temps;
    }
    let empty = FxHashSet::default();
    for (export, binding) in &module.resolved_exports {
        if matches!(binding, Binding::Property { .. } | Binding::Undefined) {
            let temp = table.fresh(&temp_base(export), &empty);
            temps.insert(export.clone(), temp);
        }
    }
    temps.sort_keys();
    temps
}

/// An identifier to hold export `name`.
fn temp_base(name: &str) -> String {
    if is_identifier(name) && !is_reserved_word(name) {
        return name.to_string();
    }
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    format!("_{cleaned}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::build_chunks;
    use crate::graph::test_support::{link_files, module_named, symbol_named};

    fn rename(files: &[(&str, &str)], entries: &[&str]) -> (ModuleGraph, ChunkGraph, Vec<ChunkNames>) {
        let graph = link_files(files, entries).unwrap();
        let options = BuildOptions::default();
        let chunks = build_chunks(&graph, &options);
        let names = rename_chunks(&graph, &chunks, &options);
        (graph, chunks, names)
    }

    fn final_name<'n>(graph: &ModuleGraph, names: &'n ChunkNames, path: &str, symbol: &str) -> &'n str {
        let module = module_named(graph, path);
        names
            .name(SymbolRef::new(module.idx, symbol_named(module, symbol)))
            .unwrap()
    }

    #[test]
    fn test_name_table_counter_suffixes() {
        let mut table = NameTable::default();
        let empty = FxHashSet::default();
        let sym = |i| SymbolRef::new(crate::ids::ModuleIdx::new(0), SymbolIdx::new(i));
        assert_eq!(table.assign(sym(0), "x", &empty), "x");
        assert_eq!(table.assign(sym(1), "x", &empty), "x2");
        table.reserve("x3");
        assert_eq!(table.assign(sym(2), "x", &empty), "x4");
        assert_eq!(table.assign(sym(0), "y", &empty), "x");
        let avoid: FxHashSet<String> = ["z".to_string()].into_iter().collect();
        assert_eq!(table.fresh("z", &avoid), "z2");
    }

    #[test]
    fn test_collisions_are_resolved_in_link_order() {
        let (graph, _, names) = rename(
            &[
                ("/p/in.js", "import { x as a } from './a'; import { x as b } from './b'; const x = a + b; console.log(x);"),
                ("/p/a.js", "export const x = 1;"),
                ("/p/b.js", "export const x = 2;"),
            ],
            &["./in.js"],
        );
        assert_eq!(final_name(&graph, &names[0], "a.js", "x"), "x");
        assert_eq!(final_name(&graph, &names[0], "b.js", "x"), "x2");
        assert_eq!(final_name(&graph, &names[0], "in.js", "x"), "x3");
    }

    #[test]
    fn test_globals_are_never_taken() {
        let (graph, _, names) = rename(
            &[
                ("/p/in.js", "import { console as c } from './lib'; console.log(c);"),
                ("/p/lib.js", "export const console = 1;"),
            ],
            &["./in.js"],
        );
        assert_eq!(final_name(&graph, &names[0], "lib.js", "console"), "console2");
    }

    #[test]
    fn test_references_under_shadowing_scopes_avoid_the_shadow() {
        let (graph, _, names) = rename(
            &[
                ("/p/in.js", "import { y } from './a'; import { f } from './lib'; console.log(y, f(1));"),
                ("/p/a.js", "export const y = 1;"),
                ("/p/lib.js", "const y = 2; export function f(y2) { return y + y2; }"),
            ],
            &["./in.js"],
        );
        assert_eq!(final_name(&graph, &names[0], "a.js", "y"), "y");
        assert_eq!(final_name(&graph, &names[0], "lib.js", "y"), "y3");
    }

    #[test]
    fn test_import_locals_pass_shadowing_to_their_target() {
        let (graph, _, names) = rename(
            &[
                ("/p/in.js", "import { value } from './b'; import { value as other } from './a'; export function read(value2) { return value + other + value2; }"),
                ("/p/b.js", "export let value = 1;"),
                ("/p/a.js", "export const value = 0;"),
            ],
            &["./in.js"],
        );
        assert_eq!(final_name(&graph, &names[0], "b.js", "value"), "value");
        assert_eq!(final_name(&graph, &names[0], "a.js", "value"), "value3");
    }

    #[test]
    fn test_cross_chunk_imports_reuse_exported_names() {
        let (graph, chunks, names) = rename(
            &[
                ("/p/a.js", "import { s as t } from './shared'; const s = 0; console.log(t, s);"),
                ("/p/b.js", "import { s } from './shared'; console.log(s);"),
                ("/p/shared.js", "export const s = 1;"),
            ],
            &["./a.js", "./b.js"],
        );
        let shared = module_named(&graph, "shared.js");
        let s = SymbolRef::new(shared.idx, symbol_named(shared, "s"));
        assert_eq!(names[2].name(s), Some("s"));
        // a.js declares its own `s`, so the import there is suffixed.
        assert_eq!(names[0].name(s), Some("s2"));
        assert_eq!(names[1].name(s), Some("s"));
        assert_eq!(export_alias(&names, chunks.chunks[2].idx, s).as_deref(), Some("s"));
    }

    #[test]
    fn test_export_temps_for_interop_properties() {
        let (_, _, names) = rename(
            &[
                ("/p/in.js", "export { x, default } from './lib.cjs';"),
                ("/p/lib.cjs", "exports.x = 1;"),
            ],
            &["./in.js"],
        );
        let temps: Vec<(&str, &str)> = names[0]
            .export_temps
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(temps, vec![("default", "_default"), ("x", "x")]);
    }

    #[test]
    fn test_pinned_name_wins_over_earlier_declaration() {
        let mut graph = link_files(
            &[
                ("/p/in.js", "import { count as a } from './a'; const count = a + 1; console.log(count);"),
                ("/p/a.js", "export const count = 1;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        graph.pin_names(&["count".to_string()]);
        let options = BuildOptions::default();
        let chunks = build_chunks(&graph, &options);
        let names = rename_chunks(&graph, &chunks, &options);
        assert_eq!(final_name(&graph, &names[0], "in.js", "count"), "count");
        assert_eq!(final_name(&graph, &names[0], "a.js", "count"), "count2");
    }

    #[test]
    fn test_pinning_skips_non_entry_modules() {
        let mut graph = link_files(
            &[
                ("/p/in.js", "import { count } from './a'; console.log(count);"),
                ("/p/a.js", "export const count = 1;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        graph.pin_names(&["count".to_string()]);
        let a = module_named(&graph, "a.js");
        assert!(a.symbols.iter().all(|symbol| !symbol.flags.contains(SymbolFlags::MUST_NOT_RENAME)));
    }

    #[test]
    fn test_renaming_is_deterministic() {
        let files = [
            ("/p/in.js", "import { a } from './x'; import { a as b } from './y'; export const a2 = a + b;"),
            ("/p/x.js", "export const a = 1;"),
            ("/p/y.js", "export const a = 2;"),
        ];
        let (_, _, first) = rename(&files, &["./in.js"]);
        let (_, _, second) = rename(&files, &["./in.js"]);
        let mut first: Vec<_> = first[0].table.names.iter().collect();
        let mut second: Vec<_> = second[0].table.names.iter().collect();
        first.sort();
        second.sort();
        assert_eq!(first, second);
    }
}
