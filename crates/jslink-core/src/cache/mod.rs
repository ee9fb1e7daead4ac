//! Parse cache for incremental rebuilds.
//!
//! Parsing is the only per-module work worth keeping between builds: the graph,
//! shaking, chunking and renaming are always redone wholesale. Entries are keyed
//! by module identity and validated by a `blake3` hash of the source text, and
//! the whole cache is dropped when the parser or the parse-relevant options
//! change.

mod module;

pub use module::CachedModule;

use crate::parse::ParsedModule;
use crate::plugin::ModuleKey;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cache format version - increment when the serialized layout changes
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("cache version {found} is not supported (expected {CACHE_VERSION})")]
    VersionMismatch { found: u32 },
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Hash of module source text used to validate cache entries.
pub fn hash_source(source: &str) -> String {
    blake3::hash(source.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseCache {
    version: u32,
    /// Name of the parser that produced the entries.
    parser: String,
    /// `BuildOptions::parse_hash` at the time the entries were produced.
    options_hash: String,
    modules: FxHashMap<ModuleKey, CachedModule>,
}

impl ParseCache {
    pub fn new(parser: impl Into<String>, options_hash: impl Into<String>) -> Self {
        Self {
            version: CACHE_VERSION,
            parser: parser.into(),
            options_hash: options_hash.into(),
            modules: FxHashMap::default(),
        }
    }

    /// Drop every entry when the parser or the parse-relevant options changed.
    pub fn validate(&mut self, parser: &str, options_hash: &str) {
        if self.parser != parser || self.options_hash != options_hash {
            if !self.modules.is_empty() {
                tracing::debug!(
                    dropped = self.modules.len(),
                    "parse cache invalidated by parser or options change"
                );
            }
            *self = Self::new(parser, options_hash);
        }
    }

    /// The cached parse of `key`, if its source is unchanged.
    pub fn get(&self, key: &ModuleKey, source_hash: &str) -> Option<&ParsedModule> {
        self.modules
            .get(key)
            .filter(|entry| entry.is_fresh(source_hash))
            .map(|entry| &entry.parsed)
    }

    pub fn insert(&mut self, key: ModuleKey, source_hash: String, parsed: ParsedModule) {
        self.modules
            .insert(key.clone(), CachedModule::new(key, source_hash, parsed));
    }

    /// Forget modules that are no longer part of the graph.
    pub fn retain(&mut self, mut keep: impl FnMut(&ModuleKey) -> bool) {
        self.modules.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(CacheError::from)
    }

    /// Deserialize from binary format, rejecting other cache versions
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cache: ParseCache = bincode::deserialize(bytes)?;
        if cache.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                found: cache.version,
            });
        }
        Ok(cache)
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Loader;
    use crate::parse::{EcmaScanner, ModuleParser, ParseInput};

    fn parsed(source: &str) -> ParsedModule {
        EcmaScanner
            .parse(&ParseInput {
                path: "a.js",
                source,
                loader: Loader::Js,
            })
            .unwrap()
    }

    #[test]
    fn test_hit_requires_same_source_hash() {
        let mut cache = ParseCache::new("ecma-scanner", "opts");
        let key = ModuleKey::file("/p/a.js");
        let source = "export const a = 1;";
        cache.insert(key.clone(), hash_source(source), parsed(source));

        assert!(cache.get(&key, &hash_source(source)).is_some());
        assert!(cache.get(&key, &hash_source("export const a = 2;")).is_none());
        assert!(cache.get(&ModuleKey::file("/p/b.js"), &hash_source(source)).is_none());
    }

    #[test]
    fn test_validate_drops_entries_on_change() {
        let mut cache = ParseCache::new("ecma-scanner", "opts");
        cache.insert(ModuleKey::file("/p/a.js"), hash_source(""), parsed(""));

        cache.validate("ecma-scanner", "opts");
        assert_eq!(cache.len(), 1);
        cache.validate("other-parser", "opts");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_round_trip_and_version_check() {
        let mut cache = ParseCache::new("ecma-scanner", "opts");
        let source = "import x from './x'; export default x;";
        cache.insert(ModuleKey::file("/p/a.js"), hash_source(source), parsed(source));

        let bytes = cache.to_bytes().unwrap();
        let restored = ParseCache::from_bytes(&bytes).unwrap();
        assert_eq!(
            restored.get(&ModuleKey::file("/p/a.js"), &hash_source(source)),
            Some(&parsed(source))
        );

        let mut stale = cache.clone();
        stale.version = CACHE_VERSION + 1;
        let error = ParseCache::from_bytes(&stale.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(error, CacheError::VersionMismatch { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/parse.bin");
        let cache = ParseCache::new("ecma-scanner", "opts");
        cache.save(&path).unwrap();
        assert_eq!(ParseCache::load(&path).unwrap().len(), 0);
    }
}
