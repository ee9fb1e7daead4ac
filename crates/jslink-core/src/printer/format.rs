use crate::loader::quote_js_string;
use crate::options::OutputFormat;

/// What the tail of a root chunk exposes.
#[derive(Debug, Clone, Default)]
pub struct ChunkExports {
    /// `(local, exported)` pairs, sorted by exported name.
    pub names: Vec<(String, String)>,
    /// Final name of the root's namespace object, when it is printed.
    pub namespace: Option<String>,
    /// Final name of the root's `require_x` wrapper, for CommonJS roots.
    pub commonjs_wrapper: Option<String>,
}

/// Per-format pieces of a chunk.
pub trait FormatStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether chunks can import each other with `import` statements.
    fn supports_chunk_imports(&self) -> bool {
        false
    }

    /// Statement replacing an import of an external module. `binding` is the
    /// local holding its namespace, if any name is read from it.
    fn external_import(&self, path: &str, binding: Option<&str>) -> String {
        let path = quote_js_string(path);
        match binding {
            Some(binding) => format!("var {binding} = __toESM(require({path}));\n"),
            None => format!("require({path});\n"),
        }
    }

    /// Whether [`FormatStrategy::external_import`] output calls `__toESM`.
    fn external_import_uses_to_esm(&self, binding: bool) -> bool {
        binding
    }

    /// Text before everything else in the chunk.
    fn prologue(&self) -> Option<String> {
        None
    }

    /// Statements exposing the root module's exports.
    fn exports(&self, exports: &ChunkExports) -> String;

    /// Whether [`FormatStrategy::exports`] output calls `__toCommonJS`.
    fn exports_use_to_commonjs(&self, _exports: &ChunkExports) -> bool {
        false
    }

    /// Text after the exports.
    fn epilogue(&self) -> Option<String> {
        None
    }
}

pub struct EsmFormat;

impl FormatStrategy for EsmFormat {
    fn name(&self) -> &str {
        "esm"
    }

    fn supports_chunk_imports(&self) -> bool {
        true
    }

    fn external_import(&self, path: &str, binding: Option<&str>) -> String {
        let path = quote_js_string(path);
        match binding {
            Some(binding) => format!("import * as {binding} from {path};\n"),
            None => format!("import {path};\n"),
        }
    }

    fn external_import_uses_to_esm(&self, _binding: bool) -> bool {
        false
    }

    fn exports(&self, exports: &ChunkExports) -> String {
        if let Some(wrapper) = &exports.commonjs_wrapper {
            return format!("export default {wrapper}();\n");
        }
        export_clause(&exports.names)
    }
}

pub struct CjsFormat;

impl FormatStrategy for CjsFormat {
    fn name(&self) -> &str {
        "cjs"
    }

    fn exports(&self, exports: &ChunkExports) -> String {
        match (&exports.commonjs_wrapper, &exports.namespace) {
            (Some(wrapper), _) => format!("module.exports = {wrapper}();\n"),
            (None, Some(namespace)) => format!("module.exports = __toCommonJS({namespace});\n"),
            (None, None) => String::new(),
        }
    }

    fn exports_use_to_commonjs(&self, exports: &ChunkExports) -> bool {
        exports.commonjs_wrapper.is_none() && exports.namespace.is_some()
    }
}

pub struct IifeFormat {
    pub global_name: Option<String>,
}

impl FormatStrategy for IifeFormat {
    fn name(&self) -> &str {
        "iife"
    }

    fn prologue(&self) -> Option<String> {
        let Some(global) = &self.global_name else {
            return Some("(() => {\n".to_string());
        };
        // `a.b.c` creates the intermediate objects first.
        let segments: Vec<&str> = global.split('.').collect();
        let mut out = String::new();
        if segments.len() == 1 {
            out.push_str(&format!("var {global} = (() => {{\n"));
            return Some(out);
        }
        out.push_str(&format!("var {0} = {0} || {{}};\n", segments[0]));
        for depth in 2..segments.len() {
            let path = segments[..depth].join(".");
            out.push_str(&format!("{path} = {path} || {{}};\n"));
        }
        out.push_str(&format!("{global} = (() => {{\n"));
        Some(out)
    }

    fn exports(&self, exports: &ChunkExports) -> String {
        match (&self.global_name, &exports.commonjs_wrapper, &exports.namespace) {
            (Some(_), Some(wrapper), _) => format!("return {wrapper}();\n"),
            (Some(_), None, Some(namespace)) => format!("return {namespace};\n"),
            (None, Some(wrapper), _) => format!("{wrapper}();\n"),
            _ => String::new(),
        }
    }

    fn epilogue(&self) -> Option<String> {
        Some("})();\n".to_string())
    }
}

/// Strategy for `format`.
pub fn strategy(format: OutputFormat, global_name: Option<&str>) -> Box<dyn FormatStrategy> {
    match format {
        OutputFormat::Esm => Box::new(EsmFormat),
        OutputFormat::Cjs => Box::new(CjsFormat),
        OutputFormat::Iife => Box::new(IifeFormat {
            global_name: global_name.map(str::to_string),
        }),
    }
}

/// `export {\n  a,\n  b as c\n};\n`, or nothing for an empty list.
pub fn export_clause(names: &[(String, String)]) -> String {
    if names.is_empty() {
        return String::new();
    }
    let items: Vec<String> = names
        .iter()
        .map(|(local, exported)| {
            let exported_text = if crate::loader::is_identifier(exported) {
                exported.clone()
            } else {
                quote_js_string(exported)
            };
            if local == exported {
                local.clone()
            } else {
                format!("{local} as {exported_text}")
            }
        })
        .collect();
    format!("export {{\n  {}\n}};\n", items.join(",\n  "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn test_esm_export_clause() {
        let exports = ChunkExports {
            names: names(&[("in_default", "default"), ("x", "x"), ("y2", "a-b")]),
            ..ChunkExports::default()
        };
        assert_eq!(
            EsmFormat.exports(&exports),
            "export {\n  in_default as default,\n  x,\n  y2 as \"a-b\"\n};\n"
        );
        assert_eq!(EsmFormat.exports(&ChunkExports::default()), "");
    }

    #[test]
    fn test_commonjs_roots() {
        let exports = ChunkExports {
            commonjs_wrapper: Some("require_in".into()),
            ..ChunkExports::default()
        };
        assert_eq!(EsmFormat.exports(&exports), "export default require_in();\n");
        assert_eq!(CjsFormat.exports(&exports), "module.exports = require_in();\n");
        assert!(!CjsFormat.exports_use_to_commonjs(&exports));
    }

    #[test]
    fn test_external_imports() {
        assert_eq!(
            EsmFormat.external_import("node:fs", Some("import_fs")),
            "import * as import_fs from \"node:fs\";\n"
        );
        assert_eq!(CjsFormat.external_import("x", None), "require(\"x\");\n");
        assert_eq!(
            CjsFormat.external_import("x", Some("import_x")),
            "var import_x = __toESM(require(\"x\"));\n"
        );
    }

    #[test]
    fn test_iife_global_name() {
        let format = IifeFormat {
            global_name: Some("lib".into()),
        };
        assert_eq!(format.prologue().unwrap(), "var lib = (() => {\n");
        let exports = ChunkExports {
            namespace: Some("in_exports".into()),
            ..ChunkExports::default()
        };
        assert_eq!(format.exports(&exports), "return in_exports;\n");

        let nested = IifeFormat {
            global_name: Some("a.b.c".into()),
        };
        assert_eq!(
            nested.prologue().unwrap(),
            "var a = a || {};\na.b = a.b || {};\na.b.c = (() => {\n"
        );
        let anonymous = IifeFormat { global_name: None };
        assert_eq!(anonymous.prologue().unwrap(), "(() => {\n");
        assert_eq!(anonymous.exports(&exports), "");
    }
}
