//! The owned, serializable result of parsing one module.
//!
//! Everything the linker needs is expressed in terms of byte spans into the
//! module's source text plus per-module symbol slots, so the linker never has
//! to look at an AST.

use crate::ids::{ImportRecordIdx, PartIdx, SymbolIdx};
use bitflags::bitflags;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Half-open byte range into the module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    pub fn contains(self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    /// Local alias created by an `import` declaration.
    Import,
    /// Synthesized by the linker (`x_exports`, `require_x`, `import_x`).
    Generated,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SymbolFlags: u8 {
        /// Keeps its declared name in the output.
        const MUST_NOT_RENAME = 1 << 0;
        /// Appears in the module's export table.
        const EXPORTED = 1 << 1;
        /// Synthesized `export default <expr>` binding.
        const DEFAULT_EXPORT = 1 << 2;
    }
}

/// One top-level declared name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub flags: SymbolFlags,
    /// Names declared in nested scopes that enclose a reference to this symbol.
    /// The symbol must never be renamed to one of these.
    pub shadowing_names: Vec<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: SymbolFlags::empty(),
            shadowing_names: Vec::new(),
        }
    }
}

/// How an identifier occurrence has to be printed when its symbol is renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shorthand {
    None,
    /// `{ x }` in an object literal or object pattern; prints as `x: name`.
    Property,
}

/// A source occurrence of a top-level symbol, either binding or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub span: Span,
    pub symbol: SymbolIdx,
    pub shorthand: Shorthand,
}

/// Print shape of a top-level statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartShape {
    /// Printed verbatim apart from substitutions.
    Stmt,
    /// `import ... from "x"`; never printed verbatim.
    Import { record: ImportRecordIdx },
    /// `export ... from "x"` and `export * from "x"`.
    ExportFrom { record: ImportRecordIdx },
    /// `export { a, b as c }`; removed from the output.
    ExportClause,
    /// `export <declaration>`; `body` starts at the declaration.
    ExportDecl { body: u32 },
    /// `export default function/class`; `name_insert` is set for anonymous
    /// declarations and points just after the `function`/`class` keyword.
    ExportDefaultDecl {
        body: u32,
        symbol: SymbolIdx,
        name_insert: Option<u32>,
    },
    /// `export default <expr>`, printed as `var <symbol> = <expr>;`.
    ExportDefaultExpr { expr: Span, symbol: SymbolIdx },
    /// Linker-synthesized `x_exports` namespace object.
    NamespaceObject,
    /// Linker-synthesized `require_x` wrapper around a CommonJS module.
    CommonJsWrapper,
}

/// A top-level statement, the unit of tree shaking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub span: Span,
    pub declared: Vec<SymbolIdx>,
    /// Top-level symbols referenced anywhere inside the statement, deduplicated.
    pub references: Vec<SymbolIdx>,
    /// Occurrences to rewrite on printing, sorted by span.
    pub occurrences: Vec<Occurrence>,
    /// `require()` and `import()` records used by this statement, plus the
    /// record of an import/re-export statement.
    pub import_records: Vec<ImportRecordIdx>,
    pub has_side_effects: bool,
    pub shape: PartShape,
}

impl Part {
    pub fn new(span: Span, shape: PartShape) -> Self {
        Self {
            span,
            declared: Vec::new(),
            references: Vec::new(),
            occurrences: Vec::new(),
            import_records: Vec::new(),
            has_side_effects: false,
            shape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// `import` declarations and `export ... from`.
    Static,
    /// `import("x")`.
    Dynamic,
    /// `require("x")`.
    Require,
    /// CSS `@import`.
    CssImport,
    /// A build entry point; never produced by a parser.
    EntryPoint,
}

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::Static => "import-statement",
            ImportKind::Dynamic => "dynamic-import",
            ImportKind::Require => "require-call",
            ImportKind::CssImport => "import-rule",
            ImportKind::EntryPoint => "entry-point",
        }
    }

    /// Edges that run the target before the importer finishes evaluating.
    pub fn is_eager(self) -> bool {
        !matches!(self, ImportKind::Dynamic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Specifier text without quotes.
    pub specifier: String,
    pub kind: ImportKind,
    /// The string literal for static imports; the whole call for
    /// `require()`/`import()`.
    pub span: Span,
    /// Names declared in nested scopes around a `require()`/`import()` call.
    pub shadowing_names: Vec<String>,
}

/// One binding created by an `import` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedImport {
    pub local: SymbolIdx,
    /// `None` for `* as ns`.
    pub imported: Option<String>,
    pub record: ImportRecordIdx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalExport {
    Symbol(SymbolIdx),
    /// `export { a as b } from "x"`; `imported` is `None` for `export * as ns from "x"`.
    ReExport {
        record: ImportRecordIdx,
        imported: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceKind {
    #[default]
    Script,
    Css,
}

/// Parser output for one module.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedModule {
    pub kind: SourceKind,
    pub symbols: Vec<Symbol>,
    pub parts: Vec<Part>,
    pub import_records: Vec<ImportRecord>,
    pub named_imports: Vec<NamedImport>,
    /// Export name to local binding, in declaration order.
    pub exports: IndexMap<String, LocalExport>,
    /// `export * from` records, in source order.
    pub star_exports: Vec<ImportRecordIdx>,
    /// Free identifiers, sorted.
    pub unbound: Vec<String>,
    /// Every name declared in a nested scope, sorted.
    pub nested_names: Vec<String>,
    /// Has `import`/`export` syntax.
    pub has_esm_syntax: bool,
    /// References free `module` or `exports`.
    pub uses_commonjs: bool,
}

impl ParsedModule {
    pub fn symbol(&self, idx: SymbolIdx) -> &Symbol {
        &self.symbols[idx.index()]
    }

    pub fn part(&self, idx: PartIdx) -> &Part {
        &self.parts[idx.index()]
    }

    pub fn record(&self, idx: ImportRecordIdx) -> &ImportRecord {
        &self.import_records[idx.index()]
    }

    pub fn named_import(&self, local: SymbolIdx) -> Option<&NamedImport> {
        self.named_imports.iter().find(|import| import.local == local)
    }

    /// CommonJS when it touches `module`/`exports` and has no ESM syntax.
    pub fn is_commonjs(&self) -> bool {
        self.uses_commonjs && !self.has_esm_syntax
    }

    pub fn is_css(&self) -> bool {
        self.kind == SourceKind::Css
    }
}
