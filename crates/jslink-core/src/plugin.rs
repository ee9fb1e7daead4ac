//! The resolve/load plugin protocol.
//!
//! A [`Plugin`] is a name plus ordered `on_resolve` and `on_load` hooks. Each
//! hook is a [`HookFilter`] (regex over the path, optional namespace) and a
//! callback returning a structured outcome. Plugins are consulted in
//! registration order and the first answer that does not decline wins; when
//! every plugin declines, the default file-system resolver and loader run.

use crate::loader::Loader;
use crate::parse::ImportKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Namespace of modules that live on the file system.
pub const FILE_NAMESPACE: &str = "file";

/// Resolved identity of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleKey {
    pub namespace: String,
    pub path: String,
}

impl ModuleKey {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self::new(FILE_NAMESPACE, path)
    }

    pub fn is_file(&self) -> bool {
        self.namespace == FILE_NAMESPACE
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_file() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}:{}", self.namespace, self.path)
        }
    }
}

/// Opaque data a resolve hook hands to the matching load hook.
pub type PluginData = Option<Arc<serde_json::Value>>;

#[derive(Debug, Clone)]
pub struct ResolveArgs {
    /// The specifier as written.
    pub path: String,
    /// Pretty path of the importing module; `None` for entry points.
    pub importer: Option<String>,
    /// Namespace of the importer (`file` for entry points).
    pub namespace: String,
    /// Directory relative specifiers are resolved against.
    pub resolve_dir: Option<PathBuf>,
    pub kind: ImportKind,
    pub plugin_data: PluginData,
}

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved {
        path: String,
        namespace: String,
        /// `Some(false)` allows unused imports of the module to be dropped.
        side_effects: Option<bool>,
        plugin_data: PluginData,
    },
    /// Leave the import in the output untouched.
    External,
    Declined,
}

impl ResolveOutcome {
    /// Resolve into `namespace` with nothing else declared.
    pub fn resolved(path: impl Into<String>, namespace: impl Into<String>) -> Self {
        ResolveOutcome::Resolved {
            path: path.into(),
            namespace: namespace.into(),
            side_effects: None,
            plugin_data: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub path: String,
    pub namespace: String,
    pub plugin_data: PluginData,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded {
        contents: Vec<u8>,
        /// [`Loader::Default`] picks from the path's extension, falling back to JS.
        loader: Loader,
        /// Directory used to resolve this module's own imports.
        resolve_dir: Option<PathBuf>,
    },
    Declined,
}

impl LoadOutcome {
    pub fn js(contents: impl Into<Vec<u8>>) -> Self {
        LoadOutcome::Loaded {
            contents: contents.into(),
            loader: Loader::Js,
            resolve_dir: None,
        }
    }
}

/// A failure reported by a plugin callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginError {
    pub message: String,
}

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PluginError {}

/// Which paths a hook is offered.
#[derive(Debug, Clone)]
pub struct HookFilter {
    pattern: Regex,
    namespace: Option<String>,
}

impl HookFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            namespace: None,
        })
    }

    /// Restrict the hook to one namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn matches(&self, path: &str, namespace: &str) -> bool {
        if let Some(expected) = &self.namespace {
            if expected != namespace {
                return false;
            }
        }
        self.pattern.is_match(path)
    }
}

pub type ResolveCallback =
    Arc<dyn Fn(&ResolveArgs) -> Result<ResolveOutcome, PluginError> + Send + Sync>;
pub type LoadCallback = Arc<dyn Fn(&LoadArgs) -> Result<LoadOutcome, PluginError> + Send + Sync>;

#[derive(Clone)]
pub struct Plugin {
    name: String,
    resolve_hooks: Vec<(HookFilter, ResolveCallback)>,
    load_hooks: Vec<(HookFilter, LoadCallback)>,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("resolve_hooks", &self.resolve_hooks.len())
            .field("load_hooks", &self.load_hooks.len())
            .finish()
    }
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolve_hooks: Vec::new(),
            load_hooks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn on_resolve<F>(mut self, filter: HookFilter, callback: F) -> Self
    where
        F: Fn(&ResolveArgs) -> Result<ResolveOutcome, PluginError> + Send + Sync + 'static,
    {
        self.resolve_hooks.push((filter, Arc::new(callback)));
        self
    }

    pub fn on_load<F>(mut self, filter: HookFilter, callback: F) -> Self
    where
        F: Fn(&LoadArgs) -> Result<LoadOutcome, PluginError> + Send + Sync + 'static,
    {
        self.load_hooks.push((filter, Arc::new(callback)));
        self
    }

    /// Run this plugin's matching resolve hooks in order.
    pub fn resolve(&self, args: &ResolveArgs) -> Result<ResolveOutcome, PluginError> {
        for (filter, callback) in &self.resolve_hooks {
            // Entry points are matched in the namespace of their importer.
            if !filter.matches(&args.path, &args.namespace) {
                continue;
            }
            match callback(args)? {
                ResolveOutcome::Declined => continue,
                outcome => return Ok(outcome),
            }
        }
        Ok(ResolveOutcome::Declined)
    }

    /// Run this plugin's matching load hooks in order.
    pub fn load(&self, args: &LoadArgs) -> Result<LoadOutcome, PluginError> {
        for (filter, callback) in &self.load_hooks {
            if !filter.matches(&args.path, &args.namespace) {
                continue;
            }
            match callback(args)? {
                LoadOutcome::Declined => continue,
                outcome => return Ok(outcome),
            }
        }
        Ok(LoadOutcome::Declined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_args(path: &str, namespace: &str) -> ResolveArgs {
        ResolveArgs {
            path: path.to_string(),
            importer: None,
            namespace: namespace.to_string(),
            resolve_dir: None,
            kind: ImportKind::EntryPoint,
            plugin_data: None,
        }
    }

    #[test]
    fn test_filter_matches_namespace() {
        let filter = HookFilter::new("^<.*>$").unwrap().namespace("virtual");
        assert!(filter.matches("<dep>", "virtual"));
        assert!(!filter.matches("<dep>", "file"));
        assert!(!filter.matches("dep", "virtual"));
    }

    #[test]
    fn test_first_non_declined_hook_wins() {
        let plugin = Plugin::new("test")
            .on_resolve(HookFilter::new(".*").unwrap(), |_| Ok(ResolveOutcome::Declined))
            .on_resolve(HookFilter::new("^a$").unwrap(), |args| {
                Ok(ResolveOutcome::resolved(format!("/{}", args.path), "file"))
            })
            .on_resolve(HookFilter::new(".*").unwrap(), |_| Ok(ResolveOutcome::External));

        match plugin.resolve(&resolve_args("a", "file")).unwrap() {
            ResolveOutcome::Resolved { path, .. } => assert_eq!(path, "/a"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            plugin.resolve(&resolve_args("b", "file")).unwrap(),
            ResolveOutcome::External
        ));
    }

    #[test]
    fn test_errors_propagate() {
        let plugin = Plugin::new("broken").on_load(HookFilter::new(".*").unwrap(), |_| {
            Err(PluginError::new("boom"))
        });
        let args = LoadArgs {
            path: "x".to_string(),
            namespace: "file".to_string(),
            plugin_data: None,
        };
        assert_eq!(plugin.load(&args).unwrap_err().message, "boom");
    }

    #[test]
    fn test_module_key_display() {
        assert_eq!(ModuleKey::file("/p/a.js").to_string(), "/p/a.js");
        assert_eq!(ModuleKey::new("virtual", "<dep>").to_string(), "virtual:<dep>");
    }
}
