//! The parser boundary.
//!
//! The linker only consumes [`ParsedModule`]s. [`EcmaScanner`] is the built-in
//! implementation; any other parser can be plugged in through [`ModuleParser`].

mod css;
mod lexer;
mod module;
mod purity;
mod scanner;
mod tokens;

pub use css::scan_css;
pub use lexer::{Lexer, Token, TokenKind};
pub use module::{
    ImportKind, ImportRecord, LocalExport, NamedImport, Occurrence, ParsedModule, Part, PartShape,
    Shorthand, SourceKind, Span, Symbol, SymbolFlags, SymbolKind,
};
pub use scanner::EcmaScanner;

use crate::loader::Loader;
use std::fmt;

/// Everything a parser gets to see about one module.
#[derive(Debug, Clone, Copy)]
pub struct ParseInput<'a> {
    /// Pretty path, used for diagnostics and synthesized names.
    pub path: &'a str,
    pub source: &'a str,
    pub loader: Loader,
}

/// A syntax error at a byte offset of the module source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

pub trait ModuleParser: Send + Sync {
    /// Identifies the parser in the persisted cache.
    fn name(&self) -> &str {
        "custom"
    }

    fn parse(&self, input: &ParseInput<'_>) -> Result<ParsedModule, ParseError>;
}

/// Turn a path into a readable identifier stem: `src/my-lib.js` -> `my_lib`.
pub fn identifier_stem(path: &str) -> String {
    let file_name = path
        .rsplit(['/', '\\', ':'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(path);
    let mut stem = file_name;
    if let Some((base, _)) = stem.split_once('.') {
        if !base.is_empty() {
            stem = base;
        }
    }
    // `index` says nothing; use the directory name instead.
    if stem == "index" {
        let parent = path
            .rsplit(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .nth(1);
        if let Some(parent) = parent {
            stem = parent;
        }
    }

    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if lexer::is_id_continue(c) {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_').to_string();
    match out.chars().next() {
        None => "module".to_string(),
        Some(c) if !lexer::is_id_start(c) => format!("_{out}"),
        Some(_) => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_stem() {
        assert_eq!(identifier_stem("src/my-lib.js"), "my_lib");
        assert_eq!(identifier_stem("dep.js"), "dep");
        assert_eq!(identifier_stem("virtual:<dep>"), "dep");
        assert_eq!(identifier_stem("node_modules/react/index.js"), "react");
        assert_eq!(identifier_stem("2d.js"), "_2d");
        assert_eq!(identifier_stem("a/.hidden"), "hidden");
        assert_eq!(identifier_stem("<>"), "module");
    }
}
