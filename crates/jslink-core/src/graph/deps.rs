//! Liveness edges between modules, parts and symbols.
//!
//! The tree shaker walks these edges to compute live sets and the chunker
//! walks them again to find symbols used across chunk boundaries, so both
//! passes agree on what a part needs.

use super::{ModuleFormat, ModuleGraph, RecordTarget};
use crate::ids::{ImportRecordIdx, ModuleIdx, PartIdx, SymbolRef};
use crate::parse::{ImportKind, PartShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LiveItem {
    Module(ModuleIdx),
    Part(ModuleIdx, PartIdx),
    Symbol(SymbolRef),
}

impl ModuleGraph {
    /// What becomes live when `idx` is included at all.
    pub fn module_dependencies(&self, idx: ModuleIdx, out: &mut Vec<LiveItem>) {
        let module = self.module(idx);
        if let Some((_, wrapper)) = module.wrapper {
            // CommonJS modules are atomic.
            out.push(LiveItem::Part(idx, wrapper));
            return;
        }
        for (part_idx, part) in module.source_parts() {
            match part.shape {
                PartShape::Import { record } | PartShape::ExportFrom { record } => {
                    match module.target(record) {
                        RecordTarget::External(_) => out.push(LiveItem::Part(idx, part_idx)),
                        RecordTarget::Module(target) => {
                            let target_module = self.module(*target);
                            if target_module.is_side_effect_free() {
                                continue;
                            }
                            if target_module.is_commonjs() {
                                out.push(LiveItem::Part(idx, part_idx));
                            } else {
                                out.push(LiveItem::Module(*target));
                            }
                        }
                    }
                }
                _ if part.has_side_effects => out.push(LiveItem::Part(idx, part_idx)),
                _ => {}
            }
        }
    }

    /// What a live part needs. With `inline_dynamic`, `import()` targets are
    /// bundled into the importer's chunk and count as dependencies.
    pub fn part_dependencies(
        &self,
        idx: ModuleIdx,
        part_idx: PartIdx,
        inline_dynamic: bool,
        out: &mut Vec<LiveItem>,
    ) {
        let module = self.module(idx);
        let part = module.part(part_idx);
        out.push(LiveItem::Module(idx));
        out.extend(
            part.references
                .iter()
                .map(|symbol| LiveItem::Symbol(SymbolRef::new(idx, *symbol))),
        );
        for record in &part.import_records {
            self.record_dependencies(idx, *record, inline_dynamic, out);
        }
        if part.shape == PartShape::NamespaceObject {
            out.extend(
                module
                    .resolved_exports
                    .values()
                    .filter_map(|binding| binding.symbol())
                    .map(LiveItem::Symbol),
            );
        }
    }

    /// An import local stands for its binding; anything else needs the parts
    /// declaring it.
    pub fn symbol_dependencies(&self, symbol: SymbolRef, out: &mut Vec<LiveItem>) {
        let module = self.module(symbol.module);
        if let Some(binding) = module.import_bindings.get(&symbol.symbol) {
            out.extend(binding.symbol().map(LiveItem::Symbol));
            return;
        }
        if let Some(parts) = module.symbol_parts.get(symbol.symbol.index()) {
            out.extend(parts.iter().map(|part| LiveItem::Part(symbol.module, *part)));
        }
    }

    fn record_dependencies(
        &self,
        idx: ModuleIdx,
        record: ImportRecordIdx,
        inline_dynamic: bool,
        out: &mut Vec<LiveItem>,
    ) {
        let module = self.module(idx);
        let Some(target) = module.target_module(record) else {
            return;
        };
        let target_module = self.module(target);
        let kind = module.ast.record(record).kind;
        match kind {
            ImportKind::CssImport => out.push(LiveItem::Module(target)),
            ImportKind::Dynamic if !inline_dynamic => {}
            ImportKind::Static if !target_module.is_commonjs() => {}
            ImportKind::Static
            | ImportKind::Require
            | ImportKind::Dynamic
            | ImportKind::EntryPoint => {
                out.push(LiveItem::Module(target));
                match (target_module.format, target_module.wrapper) {
                    (_, Some((wrapper, _))) => {
                        out.push(LiveItem::Symbol(SymbolRef::new(target, wrapper)))
                    }
                    (ModuleFormat::Css, _) => {}
                    _ => out.push(LiveItem::Symbol(SymbolRef::new(
                        target,
                        target_module.namespace_symbol,
                    ))),
                }
            }
        }
    }

    /// Targets of `import()` calls made by a part.
    pub fn dynamic_imports(&self, idx: ModuleIdx, part_idx: PartIdx) -> impl Iterator<Item = ModuleIdx> + '_ {
        let module = self.module(idx);
        module.part(part_idx).import_records.iter().filter_map(move |record| {
            (module.ast.record(*record).kind == ImportKind::Dynamic)
                .then(|| module.target_module(*record))
                .flatten()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_import_part_of_commonjs_needs_wrapper() {
        let graph = link_files(
            &[
                ("/p/in.js", "import lib from './lib.cjs'; lib();"),
                ("/p/lib.cjs", "module.exports = () => 1;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let entry = module_named(&graph, "in.js");
        let lib = module_named(&graph, "lib.cjs");
        let (wrapper, _) = lib.wrapper.unwrap();

        let mut module_deps = Vec::new();
        graph.module_dependencies(entry.idx, &mut module_deps);
        assert!(module_deps.contains(&LiveItem::Part(entry.idx, PartIdx::new(0))));

        let mut part_deps = Vec::new();
        graph.part_dependencies(entry.idx, PartIdx::new(0), false, &mut part_deps);
        assert!(part_deps.contains(&LiveItem::Symbol(SymbolRef::new(lib.idx, wrapper))));
    }

    #[test]
    fn test_side_effect_free_targets_are_not_pulled_in() {
        let graph = link_files(
            &[
                ("/p/in.js", "import './pure/index.js'; import { used } from './pure/used.js'; used();"),
                ("/p/pure/package.json", r#"{"sideEffects": false}"#),
                ("/p/pure/index.js", "console.log('dropped');"),
                ("/p/pure/used.js", "export function used() {}"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let entry = module_named(&graph, "in.js");
        let mut deps = Vec::new();
        graph.module_dependencies(entry.idx, &mut deps);
        assert_eq!(deps, vec![LiveItem::Part(entry.idx, PartIdx::new(2))]);
    }

    #[test]
    fn test_dynamic_imports_are_roots_unless_inlined() {
        let graph = link_files(
            &[
                ("/p/in.js", "export const load = () => import('./lazy');"),
                ("/p/lazy.js", "export const x = 1;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let entry = module_named(&graph, "in.js");
        let lazy = module_named(&graph, "lazy.js");
        assert_eq!(graph.dynamic_imports(entry.idx, PartIdx::new(0)).collect::<Vec<_>>(), vec![lazy.idx]);

        let mut split = Vec::new();
        graph.part_dependencies(entry.idx, PartIdx::new(0), false, &mut split);
        assert!(!split.contains(&LiveItem::Module(lazy.idx)));

        let mut inlined = Vec::new();
        graph.part_dependencies(entry.idx, PartIdx::new(0), true, &mut inlined);
        assert!(inlined.contains(&LiveItem::Symbol(SymbolRef::new(lazy.idx, lazy.namespace_symbol))));
    }
}
