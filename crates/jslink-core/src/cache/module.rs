use serde::{Deserialize, Serialize};

use crate::parse::ParsedModule;
use crate::plugin::ModuleKey;

/// One cached parse result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedModule {
    pub key: ModuleKey,

    /// Content hash of the source the module was parsed from
    pub source_hash: String,

    pub parsed: ParsedModule,
}

impl CachedModule {
    pub fn new(key: ModuleKey, source_hash: String, parsed: ParsedModule) -> Self {
        Self {
            key,
            source_hash,
            parsed,
        }
    }

    /// Whether the entry was parsed from source with `source_hash`.
    pub fn is_fresh(&self, source_hash: &str) -> bool {
        self.source_hash == source_hash
    }
}
