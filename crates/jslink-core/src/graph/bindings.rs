//! Export tables and import binding resolution.
//!
//! Named imports are followed through local re-exports, `export { x } from`
//! and `export *` chains until they land on a declared symbol, a namespace
//! object, or a property of a CommonJS/external module object. Every walk
//! carries its own visited set so import cycles terminate.

use super::{Module, ModuleFormat, ModuleGraph, RecordTarget};
use crate::error::{BuildError, BuildFailure, ErrorCollector, Location, Warning};
use crate::ids::{ImportRecordIdx, ModuleIdx, SymbolRef};
use crate::parse::LocalExport;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// What an import (or export) refers to after linking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    Symbol(SymbolRef),
    /// `object.name`, for names imported from CommonJS or external modules.
    Property { object: SymbolRef, name: String },
    /// Imported from a module that has no exports.
    Undefined,
}

impl Binding {
    /// The symbol that must be live for this binding to be readable.
    pub fn symbol(&self) -> Option<SymbolRef> {
        match self {
            Binding::Symbol(symbol) => Some(*symbol),
            Binding::Property { object, .. } => Some(*object),
            Binding::Undefined => None,
        }
    }
}

type Visited = FxHashSet<(ModuleIdx, String)>;

struct Resolver<'g> {
    modules: &'g [Module],
}

enum Outcome {
    Found(Binding),
    Missing,
}

impl<'g> Resolver<'g> {
    fn resolve_import(
        &self,
        importer: ModuleIdx,
        record: ImportRecordIdx,
        imported: Option<&str>,
        visited: &mut Visited,
    ) -> Outcome {
        let module = &self.modules[importer.index()];
        let object = || match module.record_imports[record.index()] {
            Some(symbol) => {
                let object = SymbolRef::new(importer, symbol);
                match imported {
                    None => Binding::Symbol(object),
                    Some(name) => Binding::Property {
                        object,
                        name: name.to_string(),
                    },
                }
            }
            None => Binding::Undefined,
        };
        let target = match module.target(record) {
            RecordTarget::External(_) => return Outcome::Found(object()),
            RecordTarget::Module(target) => &self.modules[target.index()],
        };
        match (target.format, imported) {
            (ModuleFormat::CommonJs, _) => Outcome::Found(object()),
            (ModuleFormat::Esm | ModuleFormat::None, None) => Outcome::Found(Binding::Symbol(
                SymbolRef::new(target.idx, target.namespace_symbol),
            )),
            (ModuleFormat::Esm, Some(name)) => match self.resolve_export(target.idx, name, visited) {
                Some(binding) => Outcome::Found(binding),
                None => Outcome::Missing,
            },
            (ModuleFormat::None | ModuleFormat::Css, _) => Outcome::Found(Binding::Undefined),
        }
    }

    fn resolve_export(&self, target: ModuleIdx, name: &str, visited: &mut Visited) -> Option<Binding> {
        let module = &self.modules[target.index()];
        if module.format != ModuleFormat::Esm || !visited.insert((target, name.to_string())) {
            return None;
        }

        if let Some(export) = module.ast.exports.get(name) {
            let (record, imported) = match export {
                LocalExport::Symbol(symbol) => match module.ast.named_import(*symbol) {
                    Some(import) => (import.record, import.imported.as_deref()),
                    None => return Some(Binding::Symbol(SymbolRef::new(target, *symbol))),
                },
                LocalExport::ReExport { record, imported } => (*record, imported.as_deref()),
            };
            return match self.resolve_import(target, record, imported, visited) {
                Outcome::Found(binding) => Some(binding),
                Outcome::Missing => None,
            };
        }

        // `export *` never forwards a default export.
        if name == "default" {
            return None;
        }
        let mut found: Option<Binding> = None;
        for star in &module.ast.star_exports {
            let Some(next) = module.target_module(*star) else {
                continue;
            };
            if let Some(binding) = self.resolve_export(next, name, visited) {
                match &found {
                    None => found = Some(binding),
                    Some(existing) if *existing == binding => {}
                    // Ambiguous between two star exports.
                    Some(_) => return None,
                }
            }
        }
        found
    }

    /// Every name importers can see on `target`, own exports first.
    fn export_names(&self, target: ModuleIdx, visited: &mut FxHashSet<ModuleIdx>, out: &mut IndexSet<String>, include_default: bool) {
        let module = &self.modules[target.index()];
        if module.format != ModuleFormat::Esm || !visited.insert(target) {
            return;
        }
        for name in module.ast.exports.keys() {
            if include_default || name != "default" {
                out.insert(name.clone());
            }
        }
        for star in &module.ast.star_exports {
            if let Some(next) = module.target_module(*star) {
                self.export_names(next, visited, out, false);
            }
        }
    }

    fn exports_of(&self, target: ModuleIdx) -> IndexMap<String, Binding> {
        let mut names = IndexSet::new();
        self.export_names(target, &mut FxHashSet::default(), &mut names, true);
        names
            .into_iter()
            .filter_map(|name| {
                let binding = self.resolve_export(target, &name, &mut Visited::default())?;
                Some((name, binding))
            })
            .collect()
    }

    /// Bind every import local of `importer`, collecting problems.
    fn imports_of(&self, importer: ModuleIdx) -> ImportResult {
        let module = &self.modules[importer.index()];
        let mut result = ImportResult::default();
        for import in &module.ast.named_imports {
            let mut visited = Visited::default();
            let imported = import.imported.as_deref();
            let binding = match self.resolve_import(importer, import.record, imported, &mut visited) {
                Outcome::Found(binding) => binding,
                Outcome::Missing => {
                    let target = module
                        .target_module(import.record)
                        .map(|target| self.modules[target.index()].pretty_path.clone())
                        .unwrap_or_default();
                    result.errors.push(BuildError::MissingExport {
                        importer: module.pretty_path.clone(),
                        target,
                        name: imported.unwrap_or("*").to_string(),
                        location: Some(self.location(module, import.record)),
                    });
                    Binding::Undefined
                }
            };
            if let (Some(name), Some(target)) = (imported, module.target_module(import.record)) {
                let target = &self.modules[target.index()];
                if matches!(target.format, ModuleFormat::None | ModuleFormat::Css) {
                    result.warnings.push(Warning::new(
                        format!(
                            "Import \"{name}\" will always be undefined because the file \"{}\" has no exports",
                            target.pretty_path
                        ),
                        Some(self.location(module, import.record)),
                    ));
                }
            }
            result.bindings.insert(import.local, binding);
        }

        // Named re-exports must exist too.
        for (exported, export) in &module.ast.exports {
            let LocalExport::ReExport { record, imported: Some(name) } = export else {
                continue;
            };
            let Some(target) = module.target_module(*record) else {
                continue;
            };
            if self.modules[target.index()].format != ModuleFormat::Esm {
                continue;
            }
            if self.resolve_export(target, name, &mut Visited::default()).is_none() {
                tracing::trace!(exported = %exported, "re-export target missing");
                result.errors.push(BuildError::MissingExport {
                    importer: module.pretty_path.clone(),
                    target: self.modules[target.index()].pretty_path.clone(),
                    name: name.clone(),
                    location: Some(self.location(module, *record)),
                });
            }
        }
        result
    }

    fn location(&self, module: &Module, record: ImportRecordIdx) -> Location {
        let span = module.ast.record(record).span;
        Location::from_offset(&module.pretty_path, &module.source, span.start as usize)
    }
}

#[derive(Default)]
struct ImportResult {
    bindings: FxHashMap<crate::ids::SymbolIdx, Binding>,
    errors: Vec<BuildError>,
    warnings: Vec<Warning>,
}

/// Fill in `resolved_exports` and `import_bindings` for every module.
pub(super) fn bind(graph: &mut ModuleGraph) -> Result<(), BuildFailure> {
    let (exports, imports): (Vec<_>, Vec<_>) = {
        let resolver = Resolver {
            modules: &graph.modules,
        };
        (0..graph.modules.len())
            .into_par_iter()
            .map(|index| {
                let idx = ModuleIdx::new(index);
                (resolver.exports_of(idx), resolver.imports_of(idx))
            })
            .unzip()
    };

    let mut errors = ErrorCollector::default();
    for (module, (exports, imports)) in graph.modules.iter_mut().zip(exports.into_iter().zip(imports)) {
        module.resolved_exports = exports;
        module.import_bindings = imports.bindings;
        for error in imports.errors {
            errors.push(error);
        }
        graph.warnings.extend(imports.warnings);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into_failure(std::mem::take(&mut graph.warnings)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_default_import_binds_to_declaration() {
        let graph = link_files(
            &[
                ("/p/in.js", "import dep from './dep'; export default dep === 123;"),
                ("/p/dep.js", "export default 123;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let entry = module_named(&graph, "in.js");
        let dep = module_named(&graph, "dep.js");
        let local = symbol_named(entry, "dep");
        assert_eq!(
            entry.import_bindings[&local],
            Binding::Symbol(SymbolRef::new(dep.idx, symbol_named(dep, "dep_default")))
        );
    }

    #[test]
    fn test_re_export_chains_and_stars() {
        let graph = link_files(
            &[
                ("/p/in.js", "import { a, b, c } from './mid';"),
                ("/p/mid.js", "export { x as a } from './x'; export * from './y'; import { z } from './z'; export { z as c };"),
                ("/p/x.js", "export const x = 1;"),
                ("/p/y.js", "export const b = 2; export default 3;"),
                ("/p/z.js", "export let z = 4;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let entry = module_named(&graph, "in.js");
        let bound = |local: &str, module: &str, symbol: &str| {
            let target = module_named(&graph, module);
            assert_eq!(
                entry.import_bindings[&symbol_named(entry, local)],
                Binding::Symbol(SymbolRef::new(target.idx, symbol_named(target, symbol)))
            );
        };
        bound("a", "x.js", "x");
        bound("b", "y.js", "b");
        bound("c", "z.js", "z");

        let mid = module_named(&graph, "mid.js");
        let names: Vec<&str> = mid.resolved_exports.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_ambiguous_star_export_is_dropped() {
        let graph = link_files(
            &[
                ("/p/in.js", "export * from './a'; export * from './b';"),
                ("/p/a.js", "export const same = 1; export const onlyA = 1;"),
                ("/p/b.js", "export const same = 2;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let entry = module_named(&graph, "in.js");
        assert!(entry.resolved_exports.contains_key("onlyA"));
        assert!(!entry.resolved_exports.contains_key("same"));
    }

    #[test]
    fn test_commonjs_and_external_imports_are_properties() {
        let graph = link_files(
            &[
                ("/p/in.js", "import lib, { helper } from './lib.cjs'; import * as fs from 'node:fs'; use(lib, helper, fs);"),
                ("/p/lib.cjs", "exports.helper = 1;"),
            ],
            &["./in.js"],
        )
        .unwrap_or_else(|failure| panic!("{}", failure.render()));
        let entry = module_named(&graph, "in.js");
        let import_lib = SymbolRef::new(entry.idx, symbol_named(entry, "import_lib"));
        assert_eq!(
            entry.import_bindings[&symbol_named(entry, "helper")],
            Binding::Property {
                object: import_lib,
                name: "helper".to_string()
            }
        );
        let import_fs = SymbolRef::new(entry.idx, symbol_named(entry, "import_fs"));
        assert_eq!(
            entry.import_bindings[&symbol_named(entry, "fs")],
            Binding::Symbol(import_fs)
        );
    }

    #[test]
    fn test_missing_export_is_an_error() {
        let failure = link_files(
            &[
                ("/p/in.js", "import { nope } from './dep';"),
                ("/p/dep.js", "export const yes = 1;"),
            ],
            &["./in.js"],
        )
        .unwrap_err();
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(
            failure.errors[0].render(),
            "in.js:1:21: ERROR: No matching export in \"dep.js\" for import \"nope\""
        );
    }

    #[test]
    fn test_import_from_script_warns() {
        let graph = link_files(
            &[
                ("/p/in.js", "import { x } from './plain';"),
                ("/p/plain.js", "window.x = 1;"),
            ],
            &["./in.js"],
        )
        .unwrap();
        assert_eq!(graph.warnings.len(), 1);
        assert!(graph.warnings[0].text.contains("will always be undefined"));
    }
}
