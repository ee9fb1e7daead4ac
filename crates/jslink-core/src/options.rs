//! Build configuration.

use crate::loader::Loader;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Module format of emitted chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Esm,
    Iife,
    Cjs,
}

/// How source maps are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    #[default]
    None,
    /// `<chunk>.map` next to the chunk plus a `sourceMappingURL` comment.
    Linked,
    /// `<chunk>.map` without the comment.
    External,
    /// A base64 `data:` URL in the `sourceMappingURL` comment.
    Inline,
}

impl SourceMapMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, SourceMapMode::None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    /// Specifiers of the entry modules, resolved like imports from `working_dir`.
    pub entry_points: Vec<String>,
    pub working_dir: PathBuf,
    /// Output directory; defaults to `out` under `working_dir`.
    pub outdir: Option<PathBuf>,
    /// Output file for a build that yields exactly one chunk.
    pub outfile: Option<PathBuf>,
    pub format: OutputFormat,
    /// Split shared and lazily loaded code into separate chunks (ESM only).
    pub splitting: bool,
    pub sourcemap: SourceMapMode,
    pub metafile: bool,
    /// Write outputs to disk in addition to returning them.
    pub write: bool,
    /// Size of the resolve/load/parse worker pool.
    pub workers: usize,
    /// Specifier patterns left as imports in the output. `*` matches any run of characters.
    pub external: Vec<String>,
    /// Variable that receives the entry's exports in `iife` format.
    pub global_name: Option<String>,
    pub banner: Option<String>,
    pub footer: Option<String>,
    /// Names never assigned to or taken from a bundled symbol.
    pub reserved_names: Vec<String>,
    /// Top-level names of the entry modules that keep their declared name;
    /// colliding symbols from other modules are renamed instead.
    pub pinned_names: Vec<String>,
    pub resolve_extensions: Vec<String>,
    /// `package.json` fields consulted for bare specifiers, in order.
    pub main_fields: Vec<String>,
    /// Extension (with leading dot) to loader overrides.
    pub loaders: IndexMap<String, Loader>,
    /// File-name prefix for shared chunks.
    pub chunk_prefix: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entry_points: Vec::new(),
            working_dir: PathBuf::from("."),
            outdir: None,
            outfile: None,
            format: OutputFormat::Esm,
            splitting: true,
            sourcemap: SourceMapMode::None,
            metafile: false,
            write: false,
            workers: default_workers(),
            external: Vec::new(),
            global_name: None,
            banner: None,
            footer: None,
            reserved_names: Vec::new(),
            pinned_names: Vec::new(),
            resolve_extensions: [".tsx", ".ts", ".jsx", ".js", ".mjs", ".cjs", ".css", ".json"]
                .into_iter()
                .map(String::from)
                .collect(),
            main_fields: vec!["module".to_string(), "main".to_string()],
            loaders: IndexMap::new(),
            chunk_prefix: "chunk".to_string(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl BuildOptions {
    pub fn new<I, S>(entry_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entry_points: entry_points.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Splitting only applies to ESM output; other formats cannot express
    /// cross-chunk imports.
    pub fn code_splitting(&self) -> bool {
        self.splitting && self.format == OutputFormat::Esm
    }

    pub fn output_dir(&self) -> PathBuf {
        match &self.outdir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.working_dir.join(dir),
            None => self.working_dir.join("out"),
        }
    }

    /// Whether `specifier` matches one of the `external` patterns.
    pub fn is_external(&self, specifier: &str) -> bool {
        self.external
            .iter()
            .any(|pattern| wildcard_match(pattern, specifier))
    }

    /// Stable digest of everything that influences parsing, for cache invalidation.
    pub fn parse_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (ext, loader) in &self.loaders {
            hasher.update(ext.as_bytes());
            hasher.update(loader.as_str().as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// `*` matches any (possibly empty) run of characters; everything else is literal.
pub(crate) fn wildcard_match(pattern: &str, text: &str) -> bool {
    let Some(star) = pattern.find('*') else {
        return pattern == text || text.starts_with(&format!("{pattern}/"));
    };
    let (prefix, suffix) = (&pattern[..star], &pattern[star + 1..]);
    text.len() >= prefix.len() + suffix.len() && text.starts_with(prefix) && text.ends_with(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BuildOptions::default();
        assert!(options.splitting);
        assert!(options.workers >= 1);
        assert_eq!(options.format, OutputFormat::Esm);
        assert_eq!(options.main_fields, vec!["module", "main"]);
    }

    #[test]
    fn test_splitting_requires_esm() {
        let mut options = BuildOptions::new(["./a.js"]);
        assert!(options.code_splitting());
        options.format = OutputFormat::Iife;
        assert!(!options.code_splitting());
    }

    #[test]
    fn test_external_patterns() {
        let options = BuildOptions {
            external: vec!["react".to_string(), "node:*".to_string()],
            ..BuildOptions::default()
        };
        assert!(options.is_external("react"));
        assert!(options.is_external("react/jsx-runtime"));
        assert!(options.is_external("node:fs"));
        assert!(!options.is_external("preact"));
        assert!(!options.is_external("./react"));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: BuildOptions = serde_json::from_str(
            r#"{"entryPoints": ["./in.js"], "format": "iife", "globalName": "lib"}"#,
        )
        .unwrap();
        assert_eq!(options.entry_points, vec!["./in.js"]);
        assert_eq!(options.format, OutputFormat::Iife);
        assert_eq!(options.global_name.as_deref(), Some("lib"));
        assert!(options.splitting);
    }
}
