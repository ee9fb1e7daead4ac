//! Part-level tree shaking.
//!
//! A mark phase over [`LiveItem`]s: roots are the entry modules and their
//! exports, and liveness spreads along the edges defined in
//! `graph::deps`. Nothing in the graph is mutated; the result is a
//! [`LiveSet`] of per-part keep bits.
//!
//! Modules whose side effects are undeclared are assumed to have them, so
//! every side-effecting statement of an included module stays.

use crate::graph::{LiveItem, ModuleGraph};
use crate::ids::{ModuleIdx, PartIdx, SymbolRef};
use rustc_hash::FxHashSet;
use std::fmt;
use tracing::{debug, debug_span};

/// Which modules and parts survive shaking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSet {
    modules: Vec<bool>,
    parts: Vec<Vec<bool>>,
}

impl LiveSet {
    fn empty(graph: &ModuleGraph) -> Self {
        Self {
            modules: vec![false; graph.modules.len()],
            parts: graph
                .modules
                .iter()
                .map(|module| vec![false; module.parts.len()])
                .collect(),
        }
    }

    pub fn is_module_live(&self, idx: ModuleIdx) -> bool {
        self.modules[idx.index()]
    }

    pub fn is_part_live(&self, idx: ModuleIdx, part: PartIdx) -> bool {
        self.parts[idx.index()][part.index()]
    }

    /// Live parts of one module, in source order (synthesized parts last).
    pub fn live_parts(&self, idx: ModuleIdx) -> impl Iterator<Item = PartIdx> + '_ {
        self.parts[idx.index()]
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(i, _)| PartIdx::new(i))
    }

    pub fn live_modules(&self) -> impl Iterator<Item = ModuleIdx> + '_ {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(i, _)| ModuleIdx::new(i))
    }

    pub fn stats(&self) -> ShakeStats {
        ShakeStats {
            live_modules: self.modules.iter().filter(|live| **live).count(),
            total_modules: self.modules.len(),
            live_parts: self.parts.iter().flatten().filter(|live| **live).count(),
            total_parts: self.parts.iter().map(Vec::len).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShakeStats {
    pub live_modules: usize,
    pub total_modules: usize,
    pub live_parts: usize,
    pub total_parts: usize,
}

impl fmt::Display for ShakeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} modules, {}/{} statements live",
            self.live_modules, self.total_modules, self.live_parts, self.total_parts
        )
    }
}

/// How roots are treated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakeConfig {
    /// Bundle `import()` targets into the importer's chunk.
    pub inline_dynamic: bool,
    /// Keep the entry's namespace object (CommonJS output, IIFE with a global name).
    pub entry_namespace: bool,
}

struct Marker<'g> {
    graph: &'g ModuleGraph,
    config: ShakeConfig,
    live: LiveSet,
    symbols: FxHashSet<SymbolRef>,
    worklist: Vec<LiveItem>,
    scratch: Vec<LiveItem>,
}

impl<'g> Marker<'g> {
    fn new(graph: &'g ModuleGraph, config: ShakeConfig) -> Self {
        Self {
            graph,
            config,
            live: LiveSet::empty(graph),
            symbols: FxHashSet::default(),
            worklist: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// A root module with all of its exports.
    fn add_root(&mut self, idx: ModuleIdx, with_namespace: bool) {
        let module = self.graph.module(idx);
        self.worklist.push(LiveItem::Module(idx));
        self.worklist.extend(
            module
                .resolved_exports
                .values()
                .filter_map(|binding| binding.symbol())
                .map(LiveItem::Symbol),
        );
        if with_namespace && !module.is_commonjs() {
            self.worklist
                .push(LiveItem::Symbol(SymbolRef::new(idx, module.namespace_symbol)));
        }
    }

    fn run(&mut self) {
        while let Some(item) = self.worklist.pop() {
            let mut deps = std::mem::take(&mut self.scratch);
            deps.clear();
            match item {
                LiveItem::Module(idx) => {
                    if self.live.modules[idx.index()] {
                        continue;
                    }
                    self.live.modules[idx.index()] = true;
                    self.graph.module_dependencies(idx, &mut deps);
                }
                LiveItem::Part(idx, part) => {
                    let slot = &mut self.live.parts[idx.index()][part.index()];
                    if *slot {
                        continue;
                    }
                    *slot = true;
                    self.graph
                        .part_dependencies(idx, part, self.config.inline_dynamic, &mut deps);
                }
                LiveItem::Symbol(symbol) => {
                    if !self.symbols.insert(symbol) {
                        continue;
                    }
                    self.graph.symbol_dependencies(symbol, &mut deps);
                }
            }
            self.worklist.extend(deps.drain(..));
            self.scratch = deps;
        }
    }
}

/// Shake for one self-contained output rooted at `entry`.
pub fn shake_entry(graph: &ModuleGraph, entry: ModuleIdx, config: ShakeConfig) -> LiveSet {
    let _span = debug_span!("shake", entry = %graph.module(entry).pretty_path).entered();
    let mut marker = Marker::new(graph, config);
    marker.add_root(entry, config.entry_namespace);
    marker.run();
    debug!(stats = %marker.live.stats(), "shaken");
    marker.live
}

/// Result of shaking every entry at once for code splitting.
#[derive(Debug, Clone)]
pub struct SplitShake {
    pub live: LiveSet,
    /// `import()` targets that became roots, in discovery order.
    pub dynamic_roots: Vec<ModuleIdx>,
}

/// Shake all entries together. Every `import()` target reached from live code
/// becomes a root of its own until no new ones appear.
pub fn shake_split(graph: &ModuleGraph) -> SplitShake {
    let _span = debug_span!("shake", entries = graph.entries.len()).entered();
    let mut marker = Marker::new(
        graph,
        ShakeConfig {
            inline_dynamic: false,
            entry_namespace: false,
        },
    );
    let mut roots: FxHashSet<ModuleIdx> = graph.entries.iter().copied().collect();
    for entry in &graph.entries {
        marker.add_root(*entry, false);
    }
    let mut dynamic_roots = Vec::new();
    loop {
        marker.run();
        let mut discovered = Vec::new();
        for idx in marker.live.live_modules() {
            for part in marker.live.live_parts(idx) {
                for target in graph.dynamic_imports(idx, part) {
                    if roots.insert(target) {
                        discovered.push(target);
                    }
                }
            }
        }
        if discovered.is_empty() {
            break;
        }
        for target in &discovered {
            marker.add_root(*target, false);
        }
        dynamic_roots.extend(discovered);
    }
    debug!(stats = %marker.live.stats(), dynamic = dynamic_roots.len(), "shaken");
    SplitShake {
        live: marker.live,
        dynamic_roots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{link_files, module_named, symbol_named};

    fn live_statements(graph: &ModuleGraph, live: &LiveSet, path: &str) -> Vec<String> {
        let module = module_named(graph, path);
        live.live_parts(module.idx)
            .filter(|part| part.index() < module.ast.parts.len())
            .map(|part| {
                let span = module.part(part).span;
                module.source[span.start as usize..span.end as usize].to_string()
            })
            .collect()
    }

    #[test]
    fn test_unused_declarations_are_dropped() {
        let graph = link_files(
            &[
                ("/p/in.js", "import { used } from './lib'; console.log(used());"),
                ("/p/lib.js", "export function used() { return helper(); }\nfunction helper() { return 1; }\nexport const unused = 2;\nexport function alsoUnused() {}"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let live = shake_entry(&graph, graph.entries[0], ShakeConfig::default());
        assert_eq!(
            live_statements(&graph, &live, "lib.js"),
            vec!["export function used() { return helper(); }", "function helper() { return 1; }"]
        );
        assert_eq!(live_statements(&graph, &live, "in.js"), vec!["console.log(used());"]);
    }

    #[test]
    fn test_side_effects_of_included_modules_are_kept() {
        let graph = link_files(
            &[
                ("/p/in.js", "import './effects';"),
                ("/p/effects.js", "const unused = 1;\nwindow.ready = true;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let live = shake_entry(&graph, graph.entries[0], ShakeConfig::default());
        assert_eq!(live_statements(&graph, &live, "effects.js"), vec!["window.ready = true;"]);
    }

    #[test]
    fn test_side_effect_free_module_without_used_exports_is_excluded() {
        let graph = link_files(
            &[
                ("/p/in.js", "import { a } from './pkg/a.js'; import './pkg/b.js'; a();"),
                ("/p/pkg/package.json", r#"{"sideEffects": false}"#),
                ("/p/pkg/a.js", "export function a() {}"),
                ("/p/pkg/b.js", "console.log('b');"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let live = shake_entry(&graph, graph.entries[0], ShakeConfig::default());
        assert!(live.is_module_live(module_named(&graph, "pkg/a.js").idx));
        assert!(!live.is_module_live(module_named(&graph, "pkg/b.js").idx));
    }

    #[test]
    fn test_entry_exports_and_namespace_roots() {
        let graph = link_files(
            &[("/p/in.js", "export const a = 1; const b = 2; export { b as c };")],
            &["./in.js"],
        )
        .unwrap();
        let entry = module_named(&graph, "in.js");
        let live = shake_entry(&graph, entry.idx, ShakeConfig::default());
        assert_eq!(live.stats().live_parts, 2);
        assert!(!live.is_part_live(entry.idx, entry.namespace_part));

        let with_ns = shake_entry(
            &graph,
            entry.idx,
            ShakeConfig {
                entry_namespace: true,
                ..ShakeConfig::default()
            },
        );
        assert!(with_ns.is_part_live(entry.idx, entry.namespace_part));
    }

    #[test]
    fn test_commonjs_module_is_atomic() {
        let graph = link_files(
            &[
                ("/p/in.js", "const lib = require('./lib.cjs'); lib.x;"),
                ("/p/lib.cjs", "const unused = 1;\nexports.x = 1;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let lib = module_named(&graph, "lib.cjs");
        let live = shake_entry(&graph, graph.entries[0], ShakeConfig::default());
        let (_, wrapper_part) = lib.wrapper.unwrap();
        assert!(live.is_part_live(lib.idx, wrapper_part));
        assert_eq!(live.live_parts(lib.idx).count(), 1);
        let wrapper_symbol = symbol_named(lib, "require_lib");
        assert_eq!(lib.wrapper.map(|(symbol, _)| symbol), Some(wrapper_symbol));
    }

    #[test]
    fn test_dynamic_targets_become_roots() {
        let graph = link_files(
            &[
                ("/p/in.js", "export const load = () => import('./lazy');"),
                ("/p/lazy.js", "import('./lazier'); export const x = 1; const dead = 2;"),
                ("/p/lazier.js", "export default 3;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let split = shake_split(&graph);
        let roots: Vec<&str> = split
            .dynamic_roots
            .iter()
            .map(|idx| graph.module(*idx).pretty_path.as_str())
            .collect();
        assert_eq!(roots, vec!["lazy.js", "lazier.js"]);
        assert_eq!(
            live_statements(&graph, &split.live, "lazy.js"),
            vec!["import('./lazier');", "export const x = 1;"]
        );
    }
}
