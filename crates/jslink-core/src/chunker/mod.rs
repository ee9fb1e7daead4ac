//! Partitioning of the shaken graph into output chunks.
//!
//! With code splitting every root (static entry or `import()` target) owns a
//! bit, and each live module is tagged with the set of roots that reach it
//! through eager edges. Modules with the same bit set share a chunk, so code
//! reached from two roots lands in a shared chunk instead of being copied.
//! Symbols that cross a chunk boundary are recorded so the printer can emit
//! matching `export`/`import` statements.
//!
//! Imports of other chunks are hoisted, so they run before any code of the
//! importing chunk. When a chunk's own modules have to run before another
//! chunk it depends on, those modules move to a chunk of their own that is
//! imported first.
//!
//! Without splitting each entry gets one self-contained chunk built from its
//! own shake.

use crate::graph::{LiveItem, ModuleGraph, RecordTarget};
use crate::ids::{ChunkIdx, EntryBits, ModuleIdx, PartIdx, SymbolRef};
use crate::options::{BuildOptions, OutputFormat};
use crate::parse::PartShape;
use crate::shaker::{self, LiveSet, ShakeConfig};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::{debug, debug_span, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Index into the configured entry points.
    Entry { entry: usize, module: ModuleIdx },
    /// Target of an `import()`.
    Dynamic { module: ModuleIdx },
    Shared,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub idx: ChunkIdx,
    pub kind: ChunkKind,
    pub bits: EntryBits,
    /// JavaScript and CSS modules, in execution order.
    pub modules: Vec<ModuleIdx>,
    pub file_name: String,
    /// Set when the chunk contains stylesheets.
    pub css_file_name: Option<String>,
    /// Index into [`ChunkGraph::live_sets`].
    pub live: usize,
    /// Symbols this chunk reads from other chunks, by exporting chunk.
    pub imports_from: IndexMap<ChunkIdx, Vec<SymbolRef>>,
    /// Symbols other chunks read from this one, with their export alias.
    /// Aliases are the final names and are filled in after renaming.
    pub exports_to_other_chunks: IndexMap<SymbolRef, String>,
    /// Chunks imported only to run them first.
    pub side_effect_imports: Vec<ChunkIdx>,
    /// Every chunk this one imports, in the order they have to run.
    pub import_order: Vec<ChunkIdx>,
}

impl Chunk {
    /// The module whose exports this chunk exposes.
    pub fn root_module(&self) -> Option<ModuleIdx> {
        match self.kind {
            ChunkKind::Entry { module, .. } | ChunkKind::Dynamic { module } => Some(module),
            ChunkKind::Shared => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self.kind, ChunkKind::Entry { .. })
    }

    /// Whether the chunk is written as a JavaScript file. A root chunk whose
    /// modules all moved to shared chunks still re-exports its root.
    pub fn has_js(&self, graph: &ModuleGraph) -> bool {
        self.modules.iter().any(|idx| !graph.module(*idx).is_css())
            || self.root_module().is_some_and(|root| !graph.module(root).is_css())
    }
}

#[derive(Debug, Clone)]
pub struct ChunkGraph {
    pub chunks: Vec<Chunk>,
    pub live_sets: Vec<LiveSet>,
    /// Owning chunk of each module; only meaningful with splitting.
    pub module_chunk: Vec<Option<ChunkIdx>>,
    /// Chunk created for each root module, for `import()` rewriting.
    pub root_chunks: FxHashMap<ModuleIdx, ChunkIdx>,
    pub splitting: bool,
}

impl ChunkGraph {
    pub fn chunk(&self, idx: ChunkIdx) -> &Chunk {
        &self.chunks[idx.index()]
    }

    pub fn live_set(&self, chunk: &Chunk) -> &LiveSet {
        &self.live_sets[chunk.live]
    }

    /// Record the final names other chunks import under.
    pub fn set_export_aliases(&mut self, alias: impl Fn(ChunkIdx, SymbolRef) -> Option<String>) {
        for chunk in &mut self.chunks {
            let idx = chunk.idx;
            for (symbol, name) in chunk.exports_to_other_chunks.iter_mut() {
                if let Some(final_name) = alias(idx, *symbol) {
                    *name = final_name;
                }
            }
        }
    }
}

/// Build chunks for `graph` according to `options`.
pub fn build_chunks(graph: &ModuleGraph, options: &BuildOptions) -> ChunkGraph {
    let _span = debug_span!("chunk", splitting = options.code_splitting()).entered();
    let chunks = if options.code_splitting() {
        split_chunks(graph, options)
    } else {
        per_entry_chunks(graph, options)
    };
    debug!(chunks = chunks.chunks.len(), "chunked");
    chunks
}

/// One self-contained chunk per entry with dynamic imports inlined.
fn per_entry_chunks(graph: &ModuleGraph, options: &BuildOptions) -> ChunkGraph {
    let config = ShakeConfig {
        inline_dynamic: true,
        entry_namespace: options.format == OutputFormat::Cjs
            || (options.format == OutputFormat::Iife && options.global_name.is_some()),
    };
    let mut names = FileNames::default();
    let mut chunks = Vec::new();
    let mut live_sets = Vec::new();
    let mut root_chunks = FxHashMap::default();

    for (entry, module) in graph.entries.iter().enumerate() {
        let live = shaker::shake_entry(graph, *module, config);
        let mut modules: Vec<ModuleIdx> = live.live_modules().collect();
        modules.sort_by_key(|idx| graph.module(*idx).exec_index);
        let idx = ChunkIdx::new(chunks.len());
        let mut bits = EntryBits::with_capacity(graph.entries.len());
        bits.set(entry);
        let file_name = names.entry_name(&graph.module(*module).pretty_path);
        root_chunks.entry(*module).or_insert(idx);
        chunks.push(Chunk {
            idx,
            kind: ChunkKind::Entry {
                entry,
                module: *module,
            },
            bits,
            css_file_name: css_name(graph, &modules, &file_name),
            modules,
            file_name,
            live: live_sets.len(),
            imports_from: IndexMap::new(),
            exports_to_other_chunks: IndexMap::new(),
            side_effect_imports: Vec::new(),
            import_order: Vec::new(),
        });
        live_sets.push(live);
    }

    ChunkGraph {
        chunks,
        live_sets,
        module_chunk: vec![None; graph.modules.len()],
        root_chunks,
        splitting: false,
    }
}

fn split_chunks(graph: &ModuleGraph, options: &BuildOptions) -> ChunkGraph {
    let shake = shaker::shake_split(graph);
    let live = shake.live;

    // Phase 1: one bit per root
    let mut roots: Vec<(ChunkKind, ModuleIdx)> = graph
        .entries
        .iter()
        .enumerate()
        .map(|(entry, module)| (ChunkKind::Entry { entry, module: *module }, *module))
        .collect();
    roots.extend(
        shake
            .dynamic_roots
            .iter()
            .map(|module| (ChunkKind::Dynamic { module: *module }, *module)),
    );
    let module_bits = propagate_bits(graph, &live, &roots);

    // Phase 2: group included modules by bit set
    let mut names = FileNames::default();
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut root_chunks = FxHashMap::default();
    for (bit, (kind, module)) in roots.iter().enumerate() {
        let mut bits = EntryBits::with_capacity(roots.len());
        bits.set(bit);
        let idx = ChunkIdx::new(chunks.len());
        root_chunks.entry(*module).or_insert(idx);
        let file_name = match kind {
            ChunkKind::Entry { .. } => names.entry_name(&graph.module(*module).pretty_path),
            _ => String::new(),
        };
        chunks.push(empty_chunk(idx, *kind, bits, file_name));
    }
    let mut by_bits: FxHashMap<EntryBits, ChunkIdx> = chunks
        .iter()
        .map(|chunk| (chunk.bits.clone(), chunk.idx))
        .collect();

    let mut shared_keys: Vec<&EntryBits> = live
        .live_modules()
        .map(|idx| &module_bits[idx.index()])
        .filter(|bits| !by_bits.contains_key(*bits) && !bits.is_empty())
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    shared_keys.sort();
    for bits in shared_keys {
        let idx = ChunkIdx::new(chunks.len());
        by_bits.insert(bits.clone(), idx);
        chunks.push(empty_chunk(idx, ChunkKind::Shared, bits.clone(), String::new()));
    }

    let mut module_chunk = vec![None; graph.modules.len()];
    for idx in &graph.exec_order {
        if !live.is_module_live(*idx) {
            continue;
        }
        let bits = &module_bits[idx.index()];
        let chunk = match by_bits.get(bits) {
            Some(chunk) => *chunk,
            None => {
                warn!(module = %graph.module(*idx).pretty_path, "live module reached by no root");
                ChunkIdx::new(0)
            }
        };
        module_chunk[idx.index()] = Some(chunk);
        chunks[chunk.index()].modules.push(*idx);
    }

    // Phase 3: move code that has to run ahead of a dependency out of the way
    let mut next = 0;
    while next < chunks.len() {
        let steps = run_order(graph, &live, &module_chunk, &chunks, chunks[next].idx);
        let root = chunks[next].root_module();
        let segments = leading_segments(graph, &live, &steps)
            .into_iter()
            .take_while(|segment| !root.is_some_and(|root| segment.contains(&root)));
        for modules in segments {
            let idx = ChunkIdx::new(chunks.len());
            trace!(from = %chunks[next].idx, to = %idx, modules = modules.len(), "split ahead of a dependency");
            chunks[next].modules.retain(|module| !modules.contains(module));
            for module in &modules {
                module_chunk[module.index()] = Some(idx);
            }
            let mut prefix = empty_chunk(idx, ChunkKind::Shared, chunks[next].bits.clone(), String::new());
            prefix.modules = modules;
            chunks.push(prefix);
        }
        next += 1;
    }

    // Phase 4: names for everything that is not a static entry
    for chunk in &mut chunks {
        if chunk.file_name.is_empty() {
            chunk.file_name = hashed_name(graph, chunk, &options.chunk_prefix);
        }
        chunk.css_file_name = css_name(graph, &chunk.modules, &chunk.file_name);
    }

    // Phase 5: cross-chunk bindings
    link_chunks(graph, &live, &module_chunk, &mut chunks);

    ChunkGraph {
        chunks,
        live_sets: vec![live],
        module_chunk,
        root_chunks,
        splitting: true,
    }
}

fn empty_chunk(idx: ChunkIdx, kind: ChunkKind, bits: EntryBits, file_name: String) -> Chunk {
    Chunk {
        idx,
        kind,
        bits,
        modules: Vec::new(),
        file_name,
        css_file_name: None,
        live: 0,
        imports_from: IndexMap::new(),
        exports_to_other_chunks: IndexMap::new(),
        side_effect_imports: Vec::new(),
        import_order: Vec::new(),
    }
}

/// Tag every module with the roots that reach it through eager edges of live
/// code. Import statements count even when their part is not live, and the
/// walk passes through modules that were shaken away so re-exports of
/// side-effect-free modules still carry their bits.
fn propagate_bits(graph: &ModuleGraph, live: &LiveSet, roots: &[(ChunkKind, ModuleIdx)]) -> Vec<EntryBits> {
    let mut bits = vec![EntryBits::with_capacity(roots.len()); graph.modules.len()];
    for (bit, (_, root)) in roots.iter().enumerate() {
        let mut stack = vec![*root];
        while let Some(idx) = stack.pop() {
            if bits[idx.index()].has(bit) {
                continue;
            }
            bits[idx.index()].set(bit);
            for target in eager_targets(graph, live, idx) {
                if !bits[target.index()].has(bit) {
                    stack.push(target);
                }
            }
        }
    }
    bits
}

/// Modules `idx` imports eagerly, in source order.
fn eager_targets(graph: &ModuleGraph, live: &LiveSet, idx: ModuleIdx) -> Vec<ModuleIdx> {
    let module = graph.module(idx);
    let module_live = live.is_module_live(idx);
    let mut targets = Vec::new();
    for (part_idx, part) in module.parts.iter().enumerate() {
        let is_import = matches!(part.shape, PartShape::Import { .. } | PartShape::ExportFrom { .. });
        let part_live = module_live && live.is_part_live(idx, PartIdx::new(part_idx));
        if !is_import && !part_live {
            continue;
        }
        for record in &part.import_records {
            if !module.ast.record(*record).kind.is_eager() {
                continue;
            }
            if let Some(target) = module.target_module(*record) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }
    targets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// A module of the chunk finishes running.
    Own(ModuleIdx),
    /// Another chunk has to have run by now.
    Enter(ChunkIdx),
}

/// What running `chunk` on its own would do, in order: its root's imports
/// depth first, then its remaining modules. Modules of other chunks are not
/// entered; importing that chunk runs them.
fn run_order(
    graph: &ModuleGraph,
    live: &LiveSet,
    module_chunk: &[Option<ChunkIdx>],
    chunks: &[Chunk],
    chunk: ChunkIdx,
) -> Vec<Step> {
    let this = &chunks[chunk.index()];
    let foreign = |idx: ModuleIdx| match module_chunk[idx.index()] {
        Some(other) if other != chunk => Some(other),
        _ => None,
    };
    let mut visited: FxHashSet<ModuleIdx> = FxHashSet::default();
    let mut entered: FxHashSet<ChunkIdx> = FxHashSet::default();
    let mut steps = Vec::new();
    let mut enter = |other: ChunkIdx, steps: &mut Vec<Step>| {
        if chunks[other.index()].has_js(graph) && entered.insert(other) {
            steps.push(Step::Enter(other));
        }
    };

    for start in this.root_module().into_iter().chain(this.modules.iter().copied()) {
        if !visited.insert(start) {
            continue;
        }
        if let Some(other) = foreign(start) {
            enter(other, &mut steps);
            continue;
        }
        // (module, its eager imports, next import to look at)
        let mut stack = vec![(start, eager_targets(graph, live, start), 0)];
        while let Some((idx, targets, cursor)) = stack.last_mut() {
            if let Some(&target) = targets.get(*cursor) {
                *cursor += 1;
                if !visited.insert(target) {
                    continue;
                }
                match foreign(target) {
                    Some(other) => enter(other, &mut steps),
                    None => {
                        let targets = eager_targets(graph, live, target);
                        stack.push((target, targets, 0));
                    }
                }
            } else {
                let idx = *idx;
                stack.pop();
                if module_chunk[idx.index()] == Some(chunk) {
                    steps.push(Step::Own(idx));
                }
            }
        }
    }
    steps
}

/// Groups of a chunk's modules that run code before some other chunk the
/// chunk depends on. Modules without effects stay where they are.
fn leading_segments(graph: &ModuleGraph, live: &LiveSet, steps: &[Step]) -> Vec<Vec<ModuleIdx>> {
    let mut segments = Vec::new();
    let mut pending: Vec<ModuleIdx> = Vec::new();
    for step in steps {
        match step {
            Step::Own(idx) => pending.push(*idx),
            Step::Enter(_) => {
                if pending.iter().any(|idx| has_effects(graph, live, *idx)) {
                    segments.push(std::mem::take(&mut pending));
                }
            }
        }
    }
    // The last group stays behind as the chunk itself.
    if pending.is_empty() {
        segments.pop();
    }
    segments
}

/// Whether running `idx` can be observed.
fn has_effects(graph: &ModuleGraph, live: &LiveSet, idx: ModuleIdx) -> bool {
    let module = graph.module(idx);
    if module.is_css() {
        return false;
    }
    live.live_parts(idx).any(|part_idx| {
        let part = module.part(part_idx);
        part.has_side_effects
            && match part.shape {
                PartShape::Import { record } | PartShape::ExportFrom { record } => {
                    matches!(module.target(record), RecordTarget::External(_))
                }
                _ => true,
            }
    })
}

/// `<prefix>-<HASH>.js`, stable across builds for the same contents.
fn hashed_name(graph: &ModuleGraph, chunk: &Chunk, prefix: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    match chunk.kind {
        ChunkKind::Dynamic { module } => {
            hasher.update(b"dynamic\0");
            hasher.update(graph.module(module).key.to_string().as_bytes());
        }
        ChunkKind::Entry { module, .. } => {
            hasher.update(b"entry\0");
            hasher.update(graph.module(module).key.to_string().as_bytes());
        }
        ChunkKind::Shared => {
            hasher.update(b"shared\0");
        }
    }
    let mut keys: Vec<String> = chunk
        .modules
        .iter()
        .map(|idx| graph.module(*idx).key.to_string())
        .collect();
    keys.sort();
    for key in keys {
        hasher.update(b"\0");
        hasher.update(key.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    format!("{prefix}-{}.js", hex[..8].to_ascii_uppercase())
}

fn css_name(graph: &ModuleGraph, modules: &[ModuleIdx], file_name: &str) -> Option<String> {
    modules
        .iter()
        .any(|idx| graph.module(*idx).is_css())
        .then(|| format!("{}.css", file_name.strip_suffix(".js").unwrap_or(file_name)))
}

/// Entry file names with `-2`, `-3`, ... on collision.
#[derive(Default)]
struct FileNames {
    taken: FxHashSet<String>,
}

impl FileNames {
    fn entry_name(&mut self, pretty_path: &str) -> String {
        let stem = file_stem(pretty_path);
        let mut candidate = format!("{stem}.js");
        let mut counter = 2;
        while !self.taken.insert(candidate.clone()) {
            candidate = format!("{stem}-{counter}.js");
            counter += 1;
        }
        candidate
    }
}

/// File name without directories or extension, reduced to safe characters.
fn file_stem(pretty_path: &str) -> String {
    let base = pretty_path
        .rsplit(['/', '\\', ':'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(pretty_path);
    let base = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "out".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Fill `imports_from`, `exports_to_other_chunks`, `side_effect_imports`
/// and `import_order`.
fn link_chunks(graph: &ModuleGraph, live: &LiveSet, module_chunk: &[Option<ChunkIdx>], chunks: &mut [Chunk]) {
    let owner = |symbol: SymbolRef| module_chunk[symbol.module.index()];
    let mut deps = Vec::new();
    let mut exports: Vec<IndexSet<SymbolRef>> = vec![IndexSet::new(); chunks.len()];

    for chunk in chunks.iter_mut() {
        let mut needed: BTreeMap<ChunkIdx, FxHashSet<SymbolRef>> = BTreeMap::new();
        let need = |symbol: SymbolRef, needed: &mut BTreeMap<ChunkIdx, FxHashSet<SymbolRef>>| {
            let Some(symbol) = graph.canonical_symbol(symbol) else {
                return;
            };
            match owner(symbol) {
                Some(other) if other != chunk.idx => {
                    needed.entry(other).or_default().insert(symbol);
                }
                _ => {}
            }
        };

        for module in &chunk.modules {
            for part in live.live_parts(*module) {
                deps.clear();
                graph.part_dependencies(*module, part, false, &mut deps);
                for dep in &deps {
                    if let LiveItem::Symbol(symbol) = dep {
                        need(*symbol, &mut needed);
                    }
                }
            }
        }
        // The root's exports are re-exported from this chunk.
        if let Some(root) = chunk.root_module() {
            let module = graph.module(root);
            if let Some((wrapper, _)) = module.wrapper {
                need(SymbolRef::new(root, wrapper), &mut needed);
            }
            for binding in module.resolved_exports.values() {
                if let Some(symbol) = binding.symbol() {
                    need(symbol, &mut needed);
                }
            }
        }

        for (other, symbols) in needed {
            let mut symbols: Vec<SymbolRef> = symbols.into_iter().collect();
            symbols.sort();
            exports[other.index()].extend(symbols.iter().copied());
            trace!(from = %other, to = %chunk.idx, count = symbols.len(), "cross-chunk import");
            chunk.imports_from.insert(other, symbols);
        }
    }

    for (chunk, symbols) in chunks.iter_mut().zip(exports) {
        let mut symbols: Vec<SymbolRef> = symbols.into_iter().collect();
        symbols.sort();
        chunk.exports_to_other_chunks = symbols
            .into_iter()
            .map(|symbol| (symbol, graph.symbol(symbol).name.clone()))
            .collect();
    }

    // Chunks run in the order the chunk reaches them; chunks only read from
    // follow in index order.
    let orders: Vec<Vec<ChunkIdx>> = chunks
        .iter()
        .map(|chunk| {
            let mut order: Vec<ChunkIdx> = run_order(graph, live, module_chunk, chunks, chunk.idx)
                .into_iter()
                .filter_map(|step| match step {
                    Step::Enter(other) => Some(other),
                    Step::Own(_) => None,
                })
                .collect();
            for other in chunk.imports_from.keys() {
                if !order.contains(other) {
                    order.push(*other);
                }
            }
            order
        })
        .collect();
    for (chunk, order) in chunks.iter_mut().zip(orders) {
        chunk.side_effect_imports = order
            .iter()
            .copied()
            .filter(|other| !chunk.imports_from.contains_key(other))
            .collect();
        chunk.import_order = order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::link_files;

    fn chunk_summary(graph: &ModuleGraph, chunks: &ChunkGraph) -> Vec<(String, Vec<String>)> {
        chunks
            .chunks
            .iter()
            .map(|chunk| {
                (
                    chunk.file_name.clone(),
                    chunk
                        .modules
                        .iter()
                        .map(|idx| graph.module(*idx).pretty_path.clone())
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_shared_dependency_gets_its_own_chunk() {
        let graph = link_files(
            &[
                ("/p/a.js", "import { s } from './shared'; console.log('a', s);"),
                ("/p/b.js", "import { s } from './shared'; console.log('b', s);"),
                ("/p/shared.js", "export const s = 1;"),
            ],
            &["./a.js", "./b.js"],
        )
        .unwrap();
        let chunks = build_chunks(&graph, &BuildOptions::default());
        let summary = chunk_summary(&graph, &chunks);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0], ("a.js".to_string(), vec!["a.js".to_string()]));
        assert_eq!(summary[1], ("b.js".to_string(), vec!["b.js".to_string()]));
        assert!(summary[2].0.starts_with("chunk-"));
        assert_eq!(summary[2].1, vec!["shared.js"]);

        let shared = ChunkIdx::new(2);
        for entry in &chunks.chunks[..2] {
            assert_eq!(entry.imports_from.keys().copied().collect::<Vec<_>>(), vec![shared]);
        }
        assert_eq!(chunks.chunks[2].exports_to_other_chunks.len(), 1);
    }

    #[test]
    fn test_chunk_names_are_stable_and_unique() {
        let files = [
            ("/p/a/index.js", "import('./lazy');"),
            ("/p/b/index.js", "import('../a/lazy');"),
            ("/p/a/lazy.js", "export default 1;"),
        ];
        let graph = link_files(&files, &["./a/index.js", "./b/index.js"]).unwrap();
        let first = build_chunks(&graph, &BuildOptions::default());
        let again = build_chunks(&graph, &BuildOptions::default());
        let names: Vec<&str> = first.chunks.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names[..2], ["index.js", "index-2.js"]);
        assert!(names[2].starts_with("chunk-") && names[2].len() == "chunk-XXXXXXXX.js".len());
        assert_eq!(
            names,
            again.chunks.iter().map(|c| c.file_name.as_str()).collect::<Vec<_>>()
        );
        let lazy = first.chunks[2].root_module().unwrap();
        assert_eq!(first.root_chunks[&lazy], ChunkIdx::new(2));
    }

    #[test]
    fn test_without_splitting_modules_are_duplicated() {
        let graph = link_files(
            &[
                ("/p/a.js", "import { s } from './shared'; console.log(s);"),
                ("/p/b.js", "import { s } from './shared'; console.log(s); import('./lazy');"),
                ("/p/shared.js", "export const s = 1;"),
                ("/p/lazy.js", "console.log('lazy');"),
            ],
            &["./a.js", "./b.js"],
        )
        .unwrap();
        let options = BuildOptions {
            splitting: false,
            ..BuildOptions::default()
        };
        let chunks = build_chunks(&graph, &options);
        let summary = chunk_summary(&graph, &chunks);
        assert_eq!(summary[0].1, vec!["shared.js", "a.js"]);
        assert_eq!(summary[1].1, vec!["shared.js", "b.js", "lazy.js"]);
    }

    #[test]
    fn test_entry_imported_by_another_entry() {
        let graph = link_files(
            &[
                ("/p/a.js", "export const a = 1; console.log('a');"),
                ("/p/b.js", "import { a } from './a'; console.log(a);"),
            ],
            &["./a.js", "./b.js"],
        )
        .unwrap();
        let chunks = build_chunks(&graph, &BuildOptions::default());
        assert_eq!(chunks.chunks.len(), 3);
        let shared = &chunks.chunks[2];
        assert_eq!(shared.kind, ChunkKind::Shared);
        assert!(chunks.chunks[0].modules.is_empty());
        // The facade re-exports `a`, so it imports it.
        assert_eq!(chunks.chunks[0].imports_from.len(), 1);
        assert_eq!(chunks.chunks[0].import_order, vec![ChunkIdx::new(2)]);
        assert!(chunks.chunks[0].has_js(&graph));
    }

    #[test]
    fn test_effects_ahead_of_a_shared_chunk_get_their_own_chunk() {
        let graph = link_files(
            &[
                ("/p/a.js", "import './first.js'; import './shared.js'; console.log('a');"),
                ("/p/b.js", "import './shared.js'; console.log('b');"),
                ("/p/first.js", "console.log('first');"),
                ("/p/shared.js", "console.log('shared');"),
            ],
            &["./a.js", "./b.js"],
        )
        .unwrap();
        let chunks = build_chunks(&graph, &BuildOptions::default());
        let summary = chunk_summary(&graph, &chunks);
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[0].1, vec!["a.js"]);
        assert_eq!(summary[2].1, vec!["shared.js"]);
        assert_eq!(summary[3].1, vec!["first.js"]);
        assert!(summary[3].0.starts_with("chunk-"));

        let a = &chunks.chunks[0];
        assert_eq!(a.import_order, vec![ChunkIdx::new(3), ChunkIdx::new(2)]);
        assert_eq!(a.side_effect_imports, a.import_order);
        assert_eq!(chunks.chunks[1].import_order, vec![ChunkIdx::new(2)]);
    }

    #[test]
    fn test_declarations_ahead_of_a_shared_chunk_stay() {
        let graph = link_files(
            &[
                ("/p/a.js", "import { f } from './first.js'; import { s } from './shared.js'; console.log(f, s);"),
                ("/p/b.js", "import { s } from './shared.js'; console.log(s);"),
                ("/p/first.js", "export const f = 1;"),
                ("/p/shared.js", "export const s = 2;"),
            ],
            &["./a.js", "./b.js"],
        )
        .unwrap();
        let chunks = build_chunks(&graph, &BuildOptions::default());
        let summary = chunk_summary(&graph, &chunks);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].1, vec!["first.js", "a.js"]);
    }
}
