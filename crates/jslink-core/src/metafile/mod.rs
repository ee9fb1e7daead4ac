//! Machine-readable build report.
//!
//! The JSON layout follows the field names bundler tooling already consumes
//! (`bytesInOutput`, `entryPoint`, `cssBundle`), with maps kept in insertion
//! order so the serialized document is stable.

mod analyze;

pub use analyze::{analyze_metafile, format_size};

use crate::graph::{ModuleFormat, ModuleGraph, RecordTarget};
use crate::ids::ModuleIdx;
use crate::parse::ImportKind;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafile {
    pub inputs: IndexMap<String, MetafileInput>,
    pub outputs: IndexMap<String, MetafileOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafileInput {
    pub bytes: usize,
    pub imports: Vec<MetafileImport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafileImport {
    pub path: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutput {
    pub bytes: usize,
    pub inputs: IndexMap<String, OutputInput>,
    pub imports: Vec<MetafileImport>,
    pub exports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_bundle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputInput {
    pub bytes_in_output: usize,
}

impl Metafile {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Record every module of the graph that contributed to some output.
    pub fn add_inputs(&mut self, graph: &ModuleGraph, contributed: impl IntoIterator<Item = ModuleIdx>) {
        let mut modules: Vec<ModuleIdx> = contributed.into_iter().collect();
        modules.sort();
        modules.dedup();
        for idx in modules {
            let module = graph.module(idx);
            let imports = module
                .ast
                .import_records
                .iter()
                .zip(&module.import_targets)
                .map(|(record, target)| match target {
                    RecordTarget::Module(target) => MetafileImport {
                        path: graph.module(*target).pretty_path.clone(),
                        kind: record.kind.as_str().to_string(),
                        external: false,
                    },
                    RecordTarget::External(path) => MetafileImport {
                        path: path.clone(),
                        kind: record.kind.as_str().to_string(),
                        external: true,
                    },
                })
                .collect();
            let format = match module.format {
                ModuleFormat::Esm => Some("esm".to_string()),
                ModuleFormat::CommonJs => Some("cjs".to_string()),
                ModuleFormat::None | ModuleFormat::Css => None,
            };
            self.inputs.insert(
                module.pretty_path.clone(),
                MetafileInput {
                    bytes: module.source.len(),
                    imports,
                    format,
                },
            );
        }
    }
}

impl MetafileOutput {
    pub fn new(bytes: usize) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    /// Add the bytes `module` wrote into this output.
    pub fn add_input(&mut self, path: &str, bytes: usize) {
        self.inputs
            .entry(path.to_string())
            .or_insert(OutputInput { bytes_in_output: 0 })
            .bytes_in_output += bytes;
    }

    pub fn add_import(&mut self, path: impl Into<String>, kind: ImportKind, external: bool) {
        let import = MetafileImport {
            path: path.into(),
            kind: kind.as_str().to_string(),
            external,
        };
        if !self.imports.contains(&import) {
            self.imports.push(import);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::link_files;

    #[test]
    fn test_serializes_camel_case() {
        let mut output = MetafileOutput::new(40);
        output.add_input("in.js", 30);
        output.add_input("in.js", 2);
        output.add_import("node:fs", ImportKind::Static, true);
        output.add_import("node:fs", ImportKind::Static, true);
        output.entry_point = Some("in.js".to_string());
        let mut metafile = Metafile::default();
        metafile.outputs.insert("out/in.js".to_string(), output);

        let json = metafile.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outputs"]["out/in.js"]["inputs"]["in.js"]["bytesInOutput"], 32);
        assert_eq!(value["outputs"]["out/in.js"]["entryPoint"], "in.js");
        assert_eq!(value["outputs"]["out/in.js"]["imports"].as_array().unwrap().len(), 1);
        assert_eq!(value["outputs"]["out/in.js"]["imports"][0]["external"], true);
        assert!(value["outputs"]["out/in.js"].get("cssBundle").is_none());
        assert_eq!(Metafile::from_json(&json).unwrap(), metafile);
    }

    #[test]
    fn test_inputs_list_resolved_imports() {
        let graph = link_files(
            &[
                ("/p/in.js", "import { a } from './a.js';\nimport 'node:fs';\nconsole.log(a);\n"),
                ("/p/a.js", "export const a = 1;\n"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let mut metafile = Metafile::default();
        metafile.add_inputs(&graph, graph.exec_order.iter().copied());
        let keys: Vec<&str> = metafile.inputs.keys().map(String::as_str).collect();
        assert_eq!(keys, ["in.js", "a.js"]);
        let input = &metafile.inputs["in.js"];
        assert_eq!(input.format.as_deref(), Some("esm"));
        assert_eq!(
            input.imports,
            vec![
                MetafileImport {
                    path: "a.js".into(),
                    kind: "import-statement".into(),
                    external: false,
                },
                MetafileImport {
                    path: "node:fs".into(),
                    kind: "import-statement".into(),
                    external: true,
                },
            ]
        );
        assert_eq!(metafile.inputs["a.js"].bytes, 20);
    }
}
