//! The built-in ECMAScript module scanner.
//!
//! One walk over the token stream splits the module into top-level statements,
//! builds a scope tree (blocks, functions, arrows, classes, `catch` and `for`
//! heads, with `var` hoisted to the nearest function), and records import and
//! export forms. References are resolved against the scope tree afterwards so
//! only genuine top-level bindings end up linked and renamed.

use super::lexer::{string_value, Lexer, TokenKind};
use super::module::{
    ImportKind, ImportRecord, LocalExport, NamedImport, Occurrence, ParsedModule, Part, PartShape,
    Shorthand, SourceKind, Span, Symbol, SymbolFlags, SymbolKind,
};
use super::purity::Purity;
use super::tokens::TokenStream;
use super::{identifier_stem, scan_css, ModuleParser, ParseError, ParseInput};
use crate::ids::{ImportRecordIdx, SymbolIdx};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

type Result<T> = std::result::Result<T, ParseError>;

const MODULE_SCOPE: usize = 0;

/// Parses JavaScript (and the module-level subset of TypeScript) into a
/// [`ParsedModule`]; CSS is delegated to [`scan_css`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EcmaScanner;

impl ModuleParser for EcmaScanner {
    fn name(&self) -> &str {
        "ecma-scanner"
    }

    fn parse(&self, input: &ParseInput<'_>) -> Result<ParsedModule> {
        if input.loader.is_css() {
            return scan_css(input.source);
        }
        let tokens = Lexer::new(input.source).tokenize()?;
        let stream = TokenStream::new(input.source, &tokens)?;
        let mut scanner = Scanner::new(&stream, input);
        scanner.run()?;
        scanner.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    TopLevel(SymbolIdx),
    Local,
}

struct Scope<'a> {
    parent: Option<usize>,
    /// Target of `var` declarations.
    function_like: bool,
    names: FxHashMap<&'a str, Binding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Param,
}

impl DeclKind {
    fn symbol_kind(self) -> SymbolKind {
        match self {
            DeclKind::Var | DeclKind::Param => SymbolKind::Var,
            DeclKind::Let => SymbolKind::Let,
            DeclKind::Const => SymbolKind::Const,
            DeclKind::Function => SymbolKind::Function,
            DeclKind::Class => SymbolKind::Class,
        }
    }
}

/// Where an expression walk stops, besides the end of its range.
#[derive(Debug, Clone, Copy, Default)]
struct Stop {
    comma: bool,
    /// `;` and automatic semicolon insertion.
    statement: bool,
    /// `in` / `of` in a `for` head.
    in_of: bool,
    /// The `:` ending a `case` label.
    colon: bool,
    /// The `{` opening a class body.
    brace: bool,
}

impl Stop {
    const NONE: Stop = Stop {
        comma: false,
        statement: false,
        in_of: false,
        colon: false,
        brace: false,
    };
    const STATEMENT: Stop = Stop {
        statement: true,
        ..Stop::NONE
    };
    const COMMA: Stop = Stop {
        comma: true,
        ..Stop::NONE
    };

    fn with_comma(self) -> Stop {
        Stop {
            comma: true,
            ..self
        }
    }
}

/// Top-level statement classification for side-effect inference.
#[derive(Debug, Clone)]
enum StmtInfo {
    Pure,
    Impure,
    Declarations(Vec<(usize, usize)>),
    Class(usize, usize),
    Expression(usize, usize),
}

struct PartBuilder {
    start: usize,
    end: usize,
    declared: Vec<SymbolIdx>,
    occurrences: Vec<Occurrence>,
    references: Vec<SymbolIdx>,
    records: Vec<usize>,
    shape: PartShape,
    info: StmtInfo,
}

struct RecordBuilder {
    record: ImportRecord,
    scope: usize,
    /// The `require` token of a `require("x")` candidate.
    require_token: Option<usize>,
    /// Locals bound by an import statement, for TypeScript import elision.
    locals: Vec<SymbolIdx>,
    bare_import: bool,
}

struct PendingRef {
    token: usize,
    scope: usize,
    part: usize,
    shorthand: Shorthand,
}

struct Scanner<'s, 'a> {
    s: &'s TokenStream<'a>,
    typescript: bool,
    default_name: String,
    scopes: Vec<Scope<'a>>,
    symbols: Vec<Symbol>,
    parts: Vec<PartBuilder>,
    current_part: usize,
    records: Vec<RecordBuilder>,
    named_imports: Vec<NamedImport>,
    exports: IndexMap<String, LocalExport>,
    pending_exports: Vec<(String, usize)>,
    star_exports: Vec<usize>,
    refs: Vec<PendingRef>,
    nested_names: FxHashSet<&'a str>,
    has_esm_syntax: bool,
    last_initializers: Vec<(usize, usize)>,
}

impl<'s, 'a> Scanner<'s, 'a> {
    fn new(s: &'s TokenStream<'a>, input: &ParseInput<'_>) -> Self {
        Self {
            s,
            typescript: input.loader.is_typescript(),
            default_name: format!("{}_default", identifier_stem(input.path)),
            scopes: vec![Scope {
                parent: None,
                function_like: true,
                names: FxHashMap::default(),
            }],
            symbols: Vec::new(),
            parts: Vec::new(),
            current_part: 0,
            records: Vec::new(),
            named_imports: Vec::new(),
            exports: IndexMap::new(),
            pending_exports: Vec::new(),
            star_exports: Vec::new(),
            refs: Vec::new(),
            nested_names: FxHashSet::default(),
            has_esm_syntax: false,
            last_initializers: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        let end = self.s.len();
        let mut i = 0;
        while i < end {
            let next = self.top_level_statement(i, end)?;
            i = next.max(i + 1);
        }
        Ok(())
    }

    // ===== Top level =====

    fn top_level_statement(&mut self, i: usize, end: usize) -> Result<usize> {
        if self.typescript {
            if let Some(next) = self.skip_typescript_statement(i, end) {
                return Ok(next);
            }
        }
        self.current_part = self.parts.len();
        self.parts.push(PartBuilder {
            start: i,
            end: i,
            declared: Vec::new(),
            occurrences: Vec::new(),
            references: Vec::new(),
            records: Vec::new(),
            shape: PartShape::Stmt,
            info: StmtInfo::Impure,
        });

        let s = self.s;
        let next = if s.at(i, "import") && !s.at(i + 1, "(") && !s.at(i + 1, ".") {
            self.part_mut().info = StmtInfo::Pure;
            self.import_declaration(i, end)?
        } else if s.at(i, "export") {
            self.export_declaration(i, end)?
        } else {
            let info = self.classify(i);
            let next = self.statement(i, end, MODULE_SCOPE)?;
            self.part_mut().info = self.finish_info(info, i, next);
            next
        };
        self.part_mut().end = next.max(i + 1);
        Ok(next)
    }

    fn part_mut(&mut self) -> &mut PartBuilder {
        &mut self.parts[self.current_part]
    }

    /// Provisional classification before walking; declarations and classes
    /// get their ranges filled in by [`Self::finish_info`].
    fn classify(&self, i: usize) -> StmtInfo {
        let s = self.s;
        match s.text(i) {
            ";" if s.kind(i) == Some(TokenKind::Punct) => StmtInfo::Pure,
            "var" | "const" if s.is_ident(i) => StmtInfo::Declarations(Vec::new()),
            "let" if self.starts_binding(i + 1) => StmtInfo::Declarations(Vec::new()),
            "function" if s.is_ident(i) => StmtInfo::Pure,
            "async" if s.at(i + 1, "function") && !s.newline_before(i + 1) => StmtInfo::Pure,
            "class" if s.is_ident(i) => StmtInfo::Class(i, i),
            "if" | "for" | "while" | "do" | "try" | "switch" | "with" | "throw" | "return"
            | "break" | "continue" | "debugger"
                if s.is_ident(i) =>
            {
                StmtInfo::Impure
            }
            "{" if s.kind(i) == Some(TokenKind::Punct) => StmtInfo::Impure,
            _ if s.is_ident(i) && s.at(i + 1, ":") => StmtInfo::Impure,
            _ => StmtInfo::Expression(i, i),
        }
    }

    fn finish_info(&mut self, info: StmtInfo, start: usize, next: usize) -> StmtInfo {
        match info {
            StmtInfo::Declarations(_) => {
                StmtInfo::Declarations(std::mem::take(&mut self.last_initializers))
            }
            StmtInfo::Class(_, _) => StmtInfo::Class(start, next),
            StmtInfo::Expression(_, _) => {
                let end = if next > start && self.s.at(next - 1, ";") {
                    next - 1
                } else {
                    next
                };
                StmtInfo::Expression(start, end)
            }
            other => other,
        }
    }

    /// TypeScript-only statements are dropped without producing a part.
    fn skip_typescript_statement(&self, i: usize, end: usize) -> Option<usize> {
        let s = self.s;
        let (start, offset) = if s.at(i, "export") && !s.at(i + 1, "default") {
            (i + 1, 1)
        } else {
            (i, 0)
        };
        let text = s.text(start);
        let type_only = match text {
            "interface" | "declare" => s.is_ident(start + 1) || s.at(start + 1, "{"),
            "type" => {
                s.is_ident(start + 1) && (s.at(start + 2, "=") || s.at(start + 2, "<"))
                    || (offset == 1 && (s.at(start + 1, "{") || s.at(start + 1, "*")))
            }
            "import" if offset == 0 => {
                s.at(start + 1, "type")
                    && (s.at(start + 2, "{")
                        || s.at(start + 2, "*")
                        || (s.is_ident(start + 2) && !s.at(start + 2, "from")))
            }
            _ => false,
        };
        if !type_only {
            return None;
        }
        if text == "interface" {
            let mut k = start + 1;
            while k < end && !s.at(k, "{") {
                k = s.skip(k);
            }
            return Some(s.skip(k).min(end));
        }
        Some(s.statement_end(start, end))
    }

    fn import_declaration(&mut self, i: usize, end: usize) -> Result<usize> {
        let s = self.s;
        self.has_esm_syntax = true;
        let mut m = i + 1;
        let mut locals: Vec<(usize, Option<String>)> = Vec::new();

        if s.kind(m) == Some(TokenKind::String) {
            let record = self.add_record(m, ImportKind::Static, MODULE_SCOPE);
            self.records[record].bare_import = true;
            self.part_mut().shape = PartShape::Import {
                record: ImportRecordIdx::new(record),
            };
            self.part_mut().records.push(record);
            let next = self.skip_import_attributes(m + 1);
            return Ok(self.skip_semicolon(next, end));
        }

        if s.is_binding_ident(m) && !s.at(m, "from") || (s.at(m, "from") && s.at(m + 1, "from"))
        {
            locals.push((m, Some("default".to_string())));
            m += 1;
            if s.at(m, ",") {
                m += 1;
            }
        }
        if s.at(m, "*") {
            if !s.at(m + 1, "as") {
                return Err(s.error_at(m + 1, "Expected \"as\""));
            }
            locals.push((m + 2, None));
            m += 3;
        } else if s.at(m, "{") {
            let close = s.close_of(m)?;
            let mut n = m + 1;
            while n < close {
                if s.at(n, ",") {
                    n += 1;
                    continue;
                }
                if self.typescript
                    && s.at(n, "type")
                    && !matches!(s.text(n + 1), "," | "}" | "as")
                {
                    while n < close && !s.at(n, ",") {
                        n += 1;
                    }
                    continue;
                }
                let imported = self.module_export_name(n)?;
                if s.at(n + 1, "as") {
                    locals.push((n + 2, Some(imported)));
                    n += 3;
                } else {
                    locals.push((n, Some(imported)));
                    n += 1;
                }
            }
            m = close + 1;
        }

        if !s.at(m, "from") {
            return Err(s.error_at(m, "Expected \"from\""));
        }
        if s.kind(m + 1) != Some(TokenKind::String) {
            return Err(s.error_at(m + 1, "Expected a module specifier string"));
        }
        let record = self.add_record(m + 1, ImportKind::Static, MODULE_SCOPE);
        for (token, imported) in locals {
            if !s.is_binding_ident(token) {
                return Err(s.error_at(token, "Expected an identifier"));
            }
            let symbol = self.declare_top_level(token, SymbolKind::Import, false);
            self.records[record].locals.push(symbol);
            self.named_imports.push(NamedImport {
                local: symbol,
                imported,
                record: ImportRecordIdx::new(record),
            });
        }
        self.part_mut().shape = PartShape::Import {
            record: ImportRecordIdx::new(record),
        };
        self.part_mut().records.push(record);
        let next = self.skip_import_attributes(m + 2);
        Ok(self.skip_semicolon(next, end))
    }

    fn export_declaration(&mut self, i: usize, end: usize) -> Result<usize> {
        let s = self.s;
        self.has_esm_syntax = true;
        let m = i + 1;

        if s.at(m, "default") {
            return self.export_default(m + 1, end);
        }

        if s.at(m, "*") {
            self.part_mut().info = StmtInfo::Pure;
            let (record, next) = if s.at(m + 1, "as") {
                let name = self.module_export_name(m + 2)?;
                let record = self.expect_from(m + 3)?;
                self.exports.insert(
                    name,
                    LocalExport::ReExport {
                        record: ImportRecordIdx::new(record),
                        imported: None,
                    },
                );
                (record, m + 5)
            } else {
                let record = self.expect_from(m + 1)?;
                self.star_exports.push(record);
                (record, m + 3)
            };
            self.part_mut().shape = PartShape::ExportFrom {
                record: ImportRecordIdx::new(record),
            };
            self.part_mut().records.push(record);
            let next = self.skip_import_attributes(next);
            return Ok(self.skip_semicolon(next, end));
        }

        if s.at(m, "{") {
            self.part_mut().info = StmtInfo::Pure;
            let close = s.close_of(m)?;
            let mut specs: Vec<(usize, String)> = Vec::new();
            let mut n = m + 1;
            while n < close {
                if s.at(n, ",") {
                    n += 1;
                    continue;
                }
                if self.typescript
                    && s.at(n, "type")
                    && !matches!(s.text(n + 1), "," | "}" | "as")
                {
                    while n < close && !s.at(n, ",") {
                        n += 1;
                    }
                    continue;
                }
                if s.at(n + 1, "as") {
                    specs.push((n, self.module_export_name(n + 2)?));
                    n += 3;
                } else {
                    specs.push((n, self.module_export_name(n)?));
                    n += 1;
                }
            }
            let mut next = close + 1;
            if s.at(next, "from") {
                let record = self.expect_from(next)?;
                for (local, exported) in specs {
                    let imported = self.module_export_name(local)?;
                    self.exports.insert(
                        exported,
                        LocalExport::ReExport {
                            record: ImportRecordIdx::new(record),
                            imported: Some(imported),
                        },
                    );
                }
                self.part_mut().shape = PartShape::ExportFrom {
                    record: ImportRecordIdx::new(record),
                };
                self.part_mut().records.push(record);
                next = self.skip_import_attributes(next + 2);
            } else {
                self.pending_exports
                    .extend(specs.into_iter().map(|(local, exported)| (exported, local)));
                self.part_mut().shape = PartShape::ExportClause;
            }
            return Ok(self.skip_semicolon(next, end));
        }

        // `export <declaration>`
        let before = self.parts[self.current_part].declared.len();
        let info = self.classify(m);
        let next = self.statement(m, end, MODULE_SCOPE)?;
        let info = self.finish_info(info, m, next);
        let part = self.part_mut();
        part.info = info;
        part.shape = PartShape::ExportDecl {
            body: s.token(m).start,
        };
        let declared: Vec<SymbolIdx> = self.parts[self.current_part].declared[before..].to_vec();
        for symbol in declared {
            let name = self.symbols[symbol.index()].name.clone();
            self.symbols[symbol.index()].flags |= SymbolFlags::EXPORTED;
            self.exports.insert(name, LocalExport::Symbol(symbol));
        }
        Ok(next)
    }

    fn export_default(&mut self, d: usize, end: usize) -> Result<usize> {
        let s = self.s;
        let is_async_function = s.at(d, "async") && s.at(d + 1, "function") && !s.newline_before(d + 1);
        if s.at(d, "function") || s.at(d, "class") || is_async_function {
            let keyword = if is_async_function { d + 1 } else { d };
            let is_class = s.at(keyword, "class");
            let mut name_token = keyword + 1;
            if !is_class && s.at(name_token, "*") {
                name_token += 1;
            }
            let named = s.is_binding_ident(name_token)
                && !(is_class && matches!(s.text(name_token), "extends" | "implements"));
            let (symbol, next, name_insert) = if named {
                let next = if is_class {
                    self.class(keyword, end, MODULE_SCOPE, true)?
                } else {
                    self.function(keyword, end, MODULE_SCOPE, true)?
                };
                let name = s.text(name_token);
                let Some(Binding::TopLevel(symbol)) = self.scopes[MODULE_SCOPE].names.get(name).copied()
                else {
                    return Err(s.error_at(name_token, "Expected a declaration name"));
                };
                (symbol, next, None)
            } else {
                let kind = if is_class {
                    SymbolKind::Class
                } else {
                    SymbolKind::Function
                };
                let symbol = self.new_symbol(self.default_name.clone(), kind);
                self.part_mut().declared.push(symbol);
                let next = if is_class {
                    self.class(keyword, end, MODULE_SCOPE, false)?
                } else {
                    self.function(keyword, end, MODULE_SCOPE, false)?
                };
                (symbol, next, Some(s.token(name_token - 1).end))
            };
            self.symbols[symbol.index()].flags |= SymbolFlags::EXPORTED;
            self.exports
                .insert("default".to_string(), LocalExport::Symbol(symbol));
            let part = self.part_mut();
            part.info = if is_class {
                StmtInfo::Class(keyword, next)
            } else {
                StmtInfo::Pure
            };
            part.shape = PartShape::ExportDefaultDecl {
                body: s.token(d).start,
                symbol,
                name_insert,
            };
            return Ok(next);
        }

        let symbol = self.new_symbol(self.default_name.clone(), SymbolKind::Var);
        self.symbols[symbol.index()].flags |= SymbolFlags::EXPORTED | SymbolFlags::DEFAULT_EXPORT;
        self.part_mut().declared.push(symbol);
        let next = self.expression(d, end, MODULE_SCOPE, Stop::STATEMENT)?;
        if next == d {
            return Err(s.error_at(d, "Expected an expression"));
        }
        self.exports
            .insert("default".to_string(), LocalExport::Symbol(symbol));
        let part = self.part_mut();
        part.info = StmtInfo::Expression(d, next);
        part.shape = PartShape::ExportDefaultExpr {
            expr: Span::new(s.token(d).start, s.token(next - 1).end),
            symbol,
        };
        Ok(self.skip_semicolon(next, end))
    }

    /// `from "x"` at `m`; returns the new record.
    fn expect_from(&mut self, m: usize) -> Result<usize> {
        let s = self.s;
        if !s.at(m, "from") {
            return Err(s.error_at(m, "Expected \"from\""));
        }
        if s.kind(m + 1) != Some(TokenKind::String) {
            return Err(s.error_at(m + 1, "Expected a module specifier string"));
        }
        Ok(self.add_record(m + 1, ImportKind::Static, MODULE_SCOPE))
    }

    fn module_export_name(&self, i: usize) -> Result<String> {
        let s = self.s;
        match s.kind(i) {
            Some(TokenKind::Ident) => Ok(s.text(i).to_string()),
            Some(TokenKind::String) => Ok(string_value(s.text(i))),
            _ => Err(s.error_at(i, "Expected an export name")),
        }
    }

    fn skip_import_attributes(&self, m: usize) -> usize {
        let s = self.s;
        if (s.at(m, "with") || s.at(m, "assert")) && s.at(m + 1, "{") && !s.newline_before(m) {
            return s.skip(m + 1);
        }
        m
    }

    // ===== Statements =====

    fn statements(&mut self, start: usize, end: usize, scope: usize) -> Result<()> {
        let mut i = start;
        while i < end {
            let next = self.statement(i, end, scope)?;
            i = next.max(i + 1);
        }
        Ok(())
    }

    fn statement(&mut self, i: usize, end: usize, scope: usize) -> Result<usize> {
        let s = self.s;
        if i >= end {
            return Ok(end);
        }
        if s.kind(i) == Some(TokenKind::Punct) {
            match s.text(i) {
                ";" => return Ok(i + 1),
                "{" => return self.block(i, scope),
                _ => {}
            }
        }
        if s.is_ident(i) {
            match s.text(i) {
                "var" if self.starts_binding(i + 1) => {
                    let next = self.variable_declaration(i, end, scope, DeclKind::Var, Stop::STATEMENT)?;
                    return Ok(self.skip_semicolon(next, end));
                }
                "let" if self.starts_binding(i + 1) => {
                    let next = self.variable_declaration(i, end, scope, DeclKind::Let, Stop::STATEMENT)?;
                    return Ok(self.skip_semicolon(next, end));
                }
                "const" if !s.at(i + 1, "enum") => {
                    let next =
                        self.variable_declaration(i, end, scope, DeclKind::Const, Stop::STATEMENT)?;
                    return Ok(self.skip_semicolon(next, end));
                }
                "function" => return self.function(i, end, scope, true),
                "async" if s.at(i + 1, "function") && !s.newline_before(i + 1) => {
                    return self.function(i + 1, end, scope, true);
                }
                "class" => return self.class(i, end, scope, true),
                "if" => {
                    let next = self.paren_expression(i + 1, scope)?;
                    let next = self.statement(next, end, scope)?;
                    if s.at(next, "else") {
                        return self.statement(next + 1, end, scope);
                    }
                    return Ok(next);
                }
                "while" | "with" => {
                    let next = self.paren_expression(i + 1, scope)?;
                    return self.statement(next, end, scope);
                }
                "do" => {
                    let next = self.statement(i + 1, end, scope)?;
                    if s.at(next, "while") {
                        let next = self.paren_expression(next + 1, scope)?;
                        return Ok(self.skip_semicolon(next, end));
                    }
                    return Ok(next);
                }
                "for" => return self.for_statement(i, end, scope),
                "try" => return self.try_statement(i, end, scope),
                "switch" => {
                    let next = self.paren_expression(i + 1, scope)?;
                    return self.block(next, scope);
                }
                "case" => {
                    let stop = Stop {
                        colon: true,
                        ..Stop::NONE
                    };
                    let next = self.expression(i + 1, end, scope, stop)?;
                    return Ok(if s.at(next, ":") { next + 1 } else { next });
                }
                "default" if s.at(i + 1, ":") => return Ok(i + 2),
                "return" | "throw" => {
                    let k = i + 1;
                    if k < end && !s.newline_before(k) && !s.at(k, ";") && !s.at(k, "}") {
                        let next = self.expression(k, end, scope, Stop::STATEMENT)?;
                        return Ok(self.skip_semicolon(next, end));
                    }
                    return Ok(self.skip_semicolon(k, end));
                }
                "break" | "continue" => {
                    let mut next = i + 1;
                    if s.is_ident(next) && !s.newline_before(next) {
                        next += 1;
                    }
                    return Ok(self.skip_semicolon(next, end));
                }
                "debugger" => return Ok(self.skip_semicolon(i + 1, end)),
                "import" if !s.at(i + 1, "(") && !s.at(i + 1, ".") => {
                    return Err(s.error_at(i, "Unexpected \"import\""));
                }
                "export" => return Err(s.error_at(i, "Unexpected \"export\"")),
                _ if s.at(i + 1, ":") && s.is_binding_ident(i) => {
                    return self.statement(i + 2, end, scope);
                }
                _ => {}
            }
        }
        let next = self.expression(i, end, scope, Stop::STATEMENT)?;
        Ok(self.skip_semicolon(next.max(i + 1), end))
    }

    fn block(&mut self, open: usize, scope: usize) -> Result<usize> {
        let s = self.s;
        if !s.at(open, "{") {
            return Err(s.error_at(open, "Expected \"{\""));
        }
        let close = s.close_of(open)?;
        let block = self.push_scope(scope, false);
        self.statements(open + 1, close, block)?;
        Ok(close + 1)
    }

    fn paren_expression(&mut self, open: usize, scope: usize) -> Result<usize> {
        let s = self.s;
        if !s.at(open, "(") {
            return Err(s.error_at(open, "Expected \"(\""));
        }
        let close = s.close_of(open)?;
        self.expression(open + 1, close, scope, Stop::NONE)?;
        Ok(close + 1)
    }

    fn skip_semicolon(&self, i: usize, end: usize) -> usize {
        if i < end && self.s.at(i, ";") {
            i + 1
        } else {
            i
        }
    }

    fn starts_binding(&self, i: usize) -> bool {
        let s = self.s;
        s.is_binding_ident(i) && !matches!(s.text(i), "in" | "instanceof" | "of")
            || s.at(i, "[")
            || s.at(i, "{")
    }

    fn variable_declaration(
        &mut self,
        keyword: usize,
        end: usize,
        scope: usize,
        kind: DeclKind,
        stop: Stop,
    ) -> Result<usize> {
        let s = self.s;
        let mut m = keyword + 1;
        let mut initializers = Vec::new();
        loop {
            m = self.binding(m, scope, scope, kind)?;
            if self.typescript && s.at(m, "!") {
                m += 1;
            }
            if self.typescript && s.at(m, ":") {
                m = self.skip_type(m + 1, end);
            }
            if s.at(m, "=") {
                let start = m + 1;
                m = self.expression(start, end, scope, stop.with_comma())?;
                initializers.push((start, m));
            }
            if m < end && s.at(m, ",") {
                m += 1;
                continue;
            }
            break;
        }
        self.last_initializers = initializers;
        Ok(m)
    }

    fn for_statement(&mut self, i: usize, end: usize, scope: usize) -> Result<usize> {
        let s = self.s;
        let mut open = i + 1;
        if s.at(open, "await") {
            open += 1;
        }
        if !s.at(open, "(") {
            return Err(s.error_at(open, "Expected \"(\""));
        }
        let close = s.close_of(open)?;
        let head = self.push_scope(scope, false);
        let init_stop = Stop {
            comma: true,
            in_of: true,
            ..Stop::NONE
        };

        let mut h = open + 1;
        let declaration = match s.text(h) {
            "var" if s.is_ident(h) => Some(DeclKind::Var),
            "let" if s.is_ident(h) && self.starts_binding(h + 1) => Some(DeclKind::Let),
            "const" if s.is_ident(h) => Some(DeclKind::Const),
            _ => None,
        };
        if let Some(kind) = declaration {
            h = self.variable_declaration(h, close, head, kind, init_stop)?;
        }
        while h < close {
            if s.at(h, ";") || s.at(h, "in") || s.at(h, "of") || s.at(h, ",") {
                h += 1;
                continue;
            }
            let next = self.expression(h, close, head, init_stop)?;
            h = next.max(h + 1);
        }
        self.statement(close + 1, end, head)
    }

    fn try_statement(&mut self, i: usize, _end: usize, scope: usize) -> Result<usize> {
        let s = self.s;
        let mut m = self.block(i + 1, scope)?;
        if s.at(m, "catch") {
            m += 1;
            let catch_scope = self.push_scope(scope, false);
            if s.at(m, "(") {
                let close = s.close_of(m)?;
                self.binding(m + 1, catch_scope, catch_scope, DeclKind::Let)?;
                m = close + 1;
            }
            if !s.at(m, "{") {
                return Err(s.error_at(m, "Expected \"{\""));
            }
            let close = s.close_of(m)?;
            self.statements(m + 1, close, catch_scope)?;
            m = close + 1;
        }
        if s.at(m, "finally") {
            m = self.block(m + 1, scope)?;
        }
        Ok(m)
    }

    /// A function starting at the `function` keyword.
    fn function(&mut self, keyword: usize, end: usize, scope: usize, declaration: bool) -> Result<usize> {
        let s = self.s;
        let mut m = keyword + 1;
        if s.at(m, "*") {
            m += 1;
        }
        let function_scope = self.push_scope(scope, true);
        if s.is_binding_ident(m) {
            if declaration {
                self.declare(m, scope, DeclKind::Function, Shorthand::None);
            } else {
                self.declare(m, function_scope, DeclKind::Function, Shorthand::None);
            }
            m += 1;
        }
        m = self.skip_type_parameters(m);
        if !s.at(m, "(") {
            return Err(s.error_at(m, "Expected \"(\""));
        }
        let close = s.close_of(m)?;
        self.parameters(m + 1, close, function_scope)?;
        m = close + 1;
        if self.typescript && s.at(m, ":") {
            while m < end && !s.at(m, "{") && !s.at(m, ";") && !s.asi_break(m) {
                m = s.skip(m);
            }
        }
        if s.at(m, "{") {
            let body_close = s.close_of(m)?;
            self.statements(m + 1, body_close, function_scope)?;
            return Ok(body_close + 1);
        }
        // Overload signature without a body.
        Ok(self.skip_semicolon(m, end))
    }

    fn class(&mut self, keyword: usize, end: usize, scope: usize, declaration: bool) -> Result<usize> {
        let s = self.s;
        let mut m = keyword + 1;
        let class_scope = self.push_scope(scope, false);
        if s.is_binding_ident(m) && !matches!(s.text(m), "implements") {
            if declaration {
                self.declare(m, scope, DeclKind::Class, Shorthand::None);
            } else {
                self.declare(m, class_scope, DeclKind::Class, Shorthand::None);
            }
            m += 1;
        }
        m = self.skip_type_parameters(m);
        if s.at(m, "extends") {
            let stop = Stop {
                brace: true,
                ..Stop::NONE
            };
            m = self.expression(m + 1, end, scope, stop)?;
        }
        while m < end && !s.at(m, "{") {
            m = s.skip(m);
        }
        if !s.at(m, "{") {
            return Err(s.error_at(m, "Expected \"{\""));
        }
        let close = s.close_of(m)?;
        self.class_body(m, close, class_scope)?;
        Ok(close + 1)
    }

    fn class_body(&mut self, open: usize, close: usize, scope: usize) -> Result<()> {
        let s = self.s;
        let mut m = open + 1;
        while m < close {
            if s.at(m, ";") {
                m += 1;
                continue;
            }
            if s.at(m, "static") && s.at(m + 1, "{") {
                let block_close = s.close_of(m + 1)?;
                let block = self.push_scope(scope, true);
                self.statements(m + 2, block_close, block)?;
                m = block_close + 1;
                continue;
            }
            if s.at(m, "@") {
                m = self.expression(m + 1, close, scope, Stop::NONE.with_comma())?.max(m + 2);
                continue;
            }
            while is_class_modifier(s.text(m))
                && s.is_ident(m)
                && !matches!(s.text(m + 1), "(" | "=" | ";" | "}" | "?" | "!" | ":" | "<")
            {
                m += 1;
            }
            if s.at(m, "*") {
                m += 1;
            }
            if s.at(m, "[") {
                let key_close = s.close_of(m)?;
                self.expression(m + 1, key_close, scope, Stop::NONE)?;
                m = key_close + 1;
            } else {
                m += 1;
            }
            while s.at(m, "?") || s.at(m, "!") {
                m += 1;
            }
            if s.at(m, "(") || s.at(m, "<") {
                m = self.method(m, close, scope)?;
                continue;
            }
            // Field.
            if self.typescript && s.at(m, ":") {
                m = self.skip_type(m + 1, close);
            }
            if s.at(m, "=") {
                let initializer_scope = self.push_scope(scope, true);
                m = self.expression(m + 1, close, initializer_scope, Stop::STATEMENT)?;
            }
            m = self.skip_semicolon(m, close);
        }
        Ok(())
    }

    /// A method starting at its parameter list (or type parameters).
    fn method(&mut self, m: usize, end: usize, scope: usize) -> Result<usize> {
        let s = self.s;
        let method_scope = self.push_scope(scope, true);
        let open = self.skip_type_parameters(m);
        if !s.at(open, "(") {
            return Err(s.error_at(open, "Expected \"(\""));
        }
        let close = s.close_of(open)?;
        self.parameters(open + 1, close, method_scope)?;
        let mut k = close + 1;
        while k < end && !s.at(k, "{") && !s.at(k, ";") && !s.asi_break(k) {
            k = s.skip(k);
        }
        if s.at(k, "{") {
            let body_close = s.close_of(k)?;
            self.statements(k + 1, body_close, method_scope)?;
            return Ok(body_close + 1);
        }
        Ok(self.skip_semicolon(k, end))
    }

    fn parameters(&mut self, start: usize, end: usize, scope: usize) -> Result<()> {
        let s = self.s;
        let mut k = start;
        while k < end {
            if s.at(k, ",") || s.at(k, "...") {
                k += 1;
                continue;
            }
            if self.typescript
                && matches!(s.text(k), "public" | "private" | "protected" | "readonly" | "override")
                && s.is_ident(k + 1)
            {
                k += 1;
                continue;
            }
            let next = self.binding(k, scope, scope, DeclKind::Param)?;
            k = next.max(k + 1);
            if s.at(k, "?") {
                k += 1;
            }
            if self.typescript && s.at(k, ":") {
                k = self.skip_type(k + 1, end);
            }
            if s.at(k, "=") {
                k = self.expression(k + 1, end, scope, Stop::COMMA)?;
            }
        }
        Ok(())
    }

    /// A binding pattern at `k`. Names go to `decl_scope`; default values are
    /// walked in `walk_scope`.
    fn binding(
        &mut self,
        k: usize,
        decl_scope: usize,
        walk_scope: usize,
        kind: DeclKind,
    ) -> Result<usize> {
        let s = self.s;
        if s.is_binding_ident(k) {
            self.declare(k, decl_scope, kind, Shorthand::None);
            return Ok(k + 1);
        }
        if s.at(k, "[") {
            let close = s.close_of(k)?;
            let mut m = k + 1;
            while m < close {
                if s.at(m, ",") || s.at(m, "...") {
                    m += 1;
                    continue;
                }
                let next = self.binding(m, decl_scope, walk_scope, kind)?;
                m = next.max(m + 1);
                if s.at(m, "=") {
                    m = self.expression(m + 1, close, walk_scope, Stop::COMMA)?;
                }
            }
            return Ok(close + 1);
        }
        if s.at(k, "{") {
            let close = s.close_of(k)?;
            let mut m = k + 1;
            while m < close {
                if s.at(m, ",") {
                    m += 1;
                    continue;
                }
                if s.at(m, "...") {
                    m = self.binding(m + 1, decl_scope, walk_scope, kind)?;
                    continue;
                }
                if s.at(m, "[") {
                    let key_close = s.close_of(m)?;
                    self.expression(m + 1, key_close, walk_scope, Stop::NONE)?;
                    m = key_close + 1;
                    if s.at(m, ":") {
                        m = self.binding(m + 1, decl_scope, walk_scope, kind)?;
                    }
                } else if s.at(m + 1, ":") {
                    m = self.binding(m + 2, decl_scope, walk_scope, kind)?;
                } else {
                    if s.is_binding_ident(m) {
                        self.declare(m, decl_scope, kind, Shorthand::Property);
                    }
                    m += 1;
                }
                if s.at(m, "=") {
                    m = self.expression(m + 1, close, walk_scope, Stop::COMMA)?;
                }
            }
            return Ok(close + 1);
        }
        Ok(k + 1)
    }

    // ===== Expressions =====

    fn should_stop(&self, j: usize, start: usize, stop: Stop, ternaries: usize) -> bool {
        let s = self.s;
        if s.kind(j) == Some(TokenKind::Punct) {
            match s.text(j) {
                "," if stop.comma => return true,
                ";" if stop.statement || stop.in_of => return true,
                ":" if stop.colon && ternaries == 0 => return true,
                "{" if stop.brace => return true,
                _ => {}
            }
        }
        if stop.in_of && s.is_ident(j) && matches!(s.text(j), "in" | "of") && j > start {
            return true;
        }
        stop.statement && j > start && s.asi_break(j)
    }

    fn expression(&mut self, start: usize, end: usize, scope: usize, stop: Stop) -> Result<usize> {
        let s = self.s;
        let mut j = start;
        let mut ternaries = 0usize;
        while j < end {
            if self.should_stop(j, start, stop, ternaries) {
                break;
            }
            match s.kind(j) {
                Some(TokenKind::Ident) => j = self.expression_ident(j, end, scope, stop)?,
                Some(TokenKind::Punct) => match s.text(j) {
                    "(" => {
                        let close = s.close_of(j)?;
                        if s.at(close + 1, "=>") {
                            j = self.arrow(j, close, end, scope, stop)?;
                        } else {
                            self.expression(j + 1, close, scope, Stop::NONE)?;
                            j = close + 1;
                        }
                    }
                    "[" => {
                        let close = s.close_of(j)?;
                        self.expression(j + 1, close, scope, Stop::NONE)?;
                        j = close + 1;
                    }
                    "{" => {
                        let close = s.close_of(j)?;
                        self.object_literal(j, close, scope)?;
                        j = close + 1;
                    }
                    "." | "?." => {
                        j += 1;
                        if matches!(s.kind(j), Some(TokenKind::Ident | TokenKind::PrivateName)) {
                            j += 1;
                        }
                    }
                    "?" => {
                        ternaries += 1;
                        j += 1;
                    }
                    ":" => {
                        ternaries = ternaries.saturating_sub(1);
                        j += 1;
                    }
                    "<" if self.typescript && s.at(j + 1, ">") => j += 2,
                    _ => j += 1,
                },
                Some(TokenKind::TemplateHead | TokenKind::TemplateMiddle) => {
                    let close = s.close_of(j)?;
                    self.expression(j + 1, close, scope, Stop::NONE)?;
                    j = close;
                }
                _ => j += 1,
            }
        }
        Ok(j)
    }

    fn expression_ident(&mut self, j: usize, end: usize, scope: usize, stop: Stop) -> Result<usize> {
        let s = self.s;
        match s.text(j) {
            "function" => return self.function(j, end, scope, false),
            "class" => return self.class(j, end, scope, false),
            "async" if s.at(j + 1, "function") && !s.newline_before(j + 1) => {
                return self.function(j + 1, end, scope, false);
            }
            "async" if s.is_binding_ident(j + 1) && s.at(j + 2, "=>") => {
                return self.arrow_single(j + 1, end, scope, stop);
            }
            "async" if s.at(j + 1, "(") && !s.newline_before(j + 1) => {
                let close = s.close_of(j + 1)?;
                if s.at(close + 1, "=>") {
                    return self.arrow(j + 1, close, end, scope, stop);
                }
            }
            "import" => return self.import_call(j, scope),
            "new" if s.at(j + 1, ".") => return Ok(j + 3),
            "as" | "satisfies" if self.typescript && j > 0 && s.can_end_expression(j - 1) => {
                return Ok(self.skip_type(j + 1, end));
            }
            _ => {}
        }
        if !s.is_binding_ident(j) {
            return Ok(j + 1);
        }
        if s.at(j + 1, "=>") {
            return self.arrow_single(j, end, scope, stop);
        }
        if s.text(j) == "require" && s.at(j + 1, "(") && s.kind(j + 2) == Some(TokenKind::String) && s.at(j + 3, ")") {
            let record = self.add_record(j + 2, ImportKind::Require, scope);
            let builder = &mut self.records[record];
            builder.require_token = Some(j);
            builder.record.span = Span::new(s.token(j).start, s.token(j + 3).end);
            self.parts[self.current_part].records.push(record);
        }
        self.reference(j, scope, Shorthand::None);
        Ok(j + 1)
    }

    /// `import(...)` and `import.meta`.
    fn import_call(&mut self, j: usize, scope: usize) -> Result<usize> {
        let s = self.s;
        if s.at(j + 1, ".") {
            return Ok(j + 3);
        }
        if !s.at(j + 1, "(") {
            return Ok(j + 1);
        }
        let close = s.close_of(j + 1)?;
        let literal = matches!(s.kind(j + 2), Some(TokenKind::String | TokenKind::Template));
        if literal && (close == j + 3 || s.at(j + 3, ",")) {
            let record = self.add_record(j + 2, ImportKind::Dynamic, scope);
            self.records[record].record.span = Span::new(s.token(j).start, s.token(close).end);
            self.parts[self.current_part].records.push(record);
        }
        self.expression(j + 2, close, scope, Stop::NONE)?;
        Ok(close + 1)
    }

    fn arrow(&mut self, open: usize, close: usize, end: usize, scope: usize, stop: Stop) -> Result<usize> {
        let arrow_scope = self.push_scope(scope, true);
        self.parameters(open + 1, close, arrow_scope)?;
        self.arrow_body(close + 2, end, arrow_scope, stop)
    }

    fn arrow_single(&mut self, param: usize, end: usize, scope: usize, stop: Stop) -> Result<usize> {
        let arrow_scope = self.push_scope(scope, true);
        self.declare(param, arrow_scope, DeclKind::Param, Shorthand::None);
        self.arrow_body(param + 2, end, arrow_scope, stop)
    }

    fn arrow_body(&mut self, k: usize, end: usize, scope: usize, stop: Stop) -> Result<usize> {
        let s = self.s;
        if s.at(k, "{") {
            let close = s.close_of(k)?;
            self.statements(k + 1, close, scope)?;
            return Ok(close + 1);
        }
        let body_stop = Stop {
            brace: false,
            ..stop.with_comma()
        };
        self.expression(k, end, scope, body_stop)
    }

    fn object_literal(&mut self, open: usize, close: usize, scope: usize) -> Result<()> {
        let s = self.s;
        let mut m = open + 1;
        while m < close {
            if s.at(m, ",") {
                m += 1;
                continue;
            }
            if s.at(m, "...") {
                m = self.expression(m + 1, close, scope, Stop::COMMA)?;
                continue;
            }
            let mut key = m;
            while matches!(s.text(key), "get" | "set" | "async")
                && s.is_ident(key)
                && key + 1 < close
                && !matches!(s.text(key + 1), "," | ":" | "(" | "=" | "}")
            {
                key += 1;
            }
            if s.at(key, "*") {
                key += 1;
            }
            let after_key = if s.at(key, "[") {
                let key_close = s.close_of(key)?;
                self.expression(key + 1, key_close, scope, Stop::NONE)?;
                key_close + 1
            } else {
                key + 1
            };
            if s.at(after_key, ":") {
                m = self.expression(after_key + 1, close, scope, Stop::COMMA)?;
            } else if s.at(after_key, "(") || s.at(after_key, "<") {
                m = self.method(after_key, close, scope)?;
            } else if key == m && s.is_binding_ident(key) {
                self.reference(key, scope, Shorthand::Property);
                m = after_key;
                if s.at(m, "=") {
                    m = self.expression(m + 1, close, scope, Stop::COMMA)?;
                }
            } else {
                m = after_key;
            }
        }
        Ok(())
    }

    // ===== TypeScript =====

    fn skip_type_parameters(&self, m: usize) -> usize {
        let s = self.s;
        if !self.typescript || !s.at(m, "<") {
            return m;
        }
        let mut depth = 0i32;
        let mut k = m;
        while k < s.len() {
            match s.text(k) {
                "<" => depth += 1,
                ">" => depth -= 1,
                ">>" => depth -= 2,
                _ => {}
            }
            k = s.skip(k);
            if depth <= 0 {
                break;
            }
        }
        k
    }

    /// Skip a type annotation up to `,`, `=`, `;`, `)` or a statement break.
    fn skip_type(&self, m: usize, end: usize) -> usize {
        let s = self.s;
        let mut depth = 0i32;
        let mut k = m;
        while k < end {
            if depth == 0 {
                if matches!(s.text(k), "," | "=" | ";" | ")")
                    && s.kind(k) == Some(TokenKind::Punct)
                {
                    break;
                }
                if k > m && s.asi_break(k) && !s.at(k, "|") && !s.at(k, "&") {
                    break;
                }
                if s.at(k, "{") && k > m && s.can_end_expression(k - 1) && !s.at(k - 1, ":") {
                    break;
                }
            }
            match s.text(k) {
                "<" => depth += 1,
                ">" => depth -= 1,
                ">>" => depth -= 2,
                _ => {}
            }
            k = s.skip(k);
        }
        k
    }

    // ===== Scopes and symbols =====

    fn push_scope(&mut self, parent: usize, function_like: bool) -> usize {
        self.scopes.push(Scope {
            parent: Some(parent),
            function_like,
            names: FxHashMap::default(),
        });
        self.scopes.len() - 1
    }

    fn new_symbol(&mut self, name: String, kind: SymbolKind) -> SymbolIdx {
        self.symbols.push(Symbol::new(name, kind));
        SymbolIdx::new(self.symbols.len() - 1)
    }

    fn declare(&mut self, token: usize, scope: usize, kind: DeclKind, shorthand: Shorthand) {
        let mut target = scope;
        if matches!(kind, DeclKind::Var) {
            while !self.scopes[target].function_like {
                match self.scopes[target].parent {
                    Some(parent) => target = parent,
                    None => break,
                }
            }
        }
        let name = self.s.text(token);
        if target == MODULE_SCOPE {
            self.declare_top_level(token, kind.symbol_kind(), true);
            if let Some(occurrence) = self.parts[self.current_part].occurrences.last_mut() {
                occurrence.shorthand = shorthand;
            }
        } else {
            self.scopes[target].names.insert(name, Binding::Local);
            self.nested_names.insert(name);
        }
    }

    fn declare_top_level(&mut self, token: usize, kind: SymbolKind, occurrence: bool) -> SymbolIdx {
        let name = self.s.text(token);
        let symbol = match self.scopes[MODULE_SCOPE].names.get(name) {
            Some(Binding::TopLevel(symbol)) => *symbol,
            _ => {
                let symbol = self.new_symbol(name.to_string(), kind);
                self.scopes[MODULE_SCOPE]
                    .names
                    .insert(name, Binding::TopLevel(symbol));
                symbol
            }
        };
        let t = self.s.token(token);
        let part = &mut self.parts[self.current_part];
        if !part.declared.contains(&symbol) {
            part.declared.push(symbol);
        }
        if occurrence {
            part.occurrences.push(Occurrence {
                span: Span::new(t.start, t.end),
                symbol,
                shorthand: Shorthand::None,
            });
        }
        symbol
    }

    fn reference(&mut self, token: usize, scope: usize, shorthand: Shorthand) {
        self.refs.push(PendingRef {
            token,
            scope,
            part: self.current_part,
            shorthand,
        });
    }

    fn add_record(&mut self, literal: usize, kind: ImportKind, scope: usize) -> usize {
        let s = self.s;
        let raw = s.text(literal);
        let specifier = if s.kind(literal) == Some(TokenKind::Template) {
            raw.trim_matches('`').to_string()
        } else {
            string_value(raw)
        };
        let t = s.token(literal);
        self.records.push(RecordBuilder {
            record: ImportRecord {
                specifier,
                kind,
                span: Span::new(t.start, t.end),
                shadowing_names: Vec::new(),
            },
            scope,
            require_token: None,
            locals: Vec::new(),
            bare_import: false,
        });
        self.records.len() - 1
    }

    fn lookup(&self, mut scope: usize, name: &str) -> Option<(Binding, usize)> {
        loop {
            if let Some(binding) = self.scopes[scope].names.get(name) {
                return Some((*binding, scope));
            }
            scope = self.scopes[scope].parent?;
        }
    }

    /// Names declared in the nested scopes enclosing `scope`.
    fn enclosing_names(&self, mut scope: usize, out: &mut BTreeSet<String>) {
        while scope != MODULE_SCOPE {
            out.extend(self.scopes[scope].names.keys().map(|name| name.to_string()));
            match self.scopes[scope].parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
    }

    // ===== Finishing =====

    fn finish(mut self) -> Result<ParsedModule> {
        let s = self.s;
        let refs = std::mem::take(&mut self.refs);
        let mut unbound: BTreeSet<&str> = BTreeSet::new();
        let mut bound: FxHashSet<usize> = FxHashSet::default();
        let mut symbol_scopes: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); self.symbols.len()];
        let mut referenced: FxHashSet<SymbolIdx> = FxHashSet::default();

        for r in &refs {
            let name = s.text(r.token);
            match self.lookup(r.scope, name) {
                Some((Binding::TopLevel(symbol), _)) => {
                    bound.insert(r.token);
                    referenced.insert(symbol);
                    if r.scope != MODULE_SCOPE {
                        symbol_scopes[symbol.index()].insert(r.scope);
                    }
                    let t = s.token(r.token);
                    let part = &mut self.parts[r.part];
                    part.occurrences.push(Occurrence {
                        span: Span::new(t.start, t.end),
                        symbol,
                        shorthand: r.shorthand,
                    });
                    if !part.references.contains(&symbol) {
                        part.references.push(symbol);
                    }
                }
                Some((Binding::Local, _)) => {
                    bound.insert(r.token);
                }
                None => {
                    unbound.insert(name);
                }
            }
        }

        for (exported, token) in std::mem::take(&mut self.pending_exports) {
            let local = self.module_export_name(token)?;
            match self.scopes[MODULE_SCOPE].names.get(local.as_str()) {
                Some(Binding::TopLevel(symbol)) => {
                    let symbol = *symbol;
                    referenced.insert(symbol);
                    self.symbols[symbol.index()].flags |= SymbolFlags::EXPORTED;
                    self.exports.insert(exported, LocalExport::Symbol(symbol));
                }
                _ => {
                    return Err(s.error_at(
                        token,
                        format!("\"{local}\" is not declared in this file"),
                    ));
                }
            }
        }

        for (symbol, scopes) in symbol_scopes.iter().enumerate() {
            let mut names = BTreeSet::new();
            for scope in scopes {
                self.enclosing_names(*scope, &mut names);
            }
            self.symbols[symbol].shadowing_names = names.into_iter().collect();
        }

        // Drop `require` calls where `require` is a local binding, and
        // TypeScript imports whose bindings are only used as types.
        let keep: Vec<bool> = self
            .records
            .iter()
            .map(|record| {
                if let Some(token) = record.require_token {
                    return self.lookup(record.scope, s.text(token)).is_none();
                }
                if self.typescript
                    && record.record.kind == ImportKind::Static
                    && !record.bare_import
                    && !record.locals.is_empty()
                {
                    return record.locals.iter().any(|local| referenced.contains(local));
                }
                true
            })
            .collect();
        let mut remap = vec![None; self.records.len()];
        let mut records = Vec::new();
        for (old, builder) in self.records.iter().enumerate() {
            if keep[old] {
                remap[old] = Some(ImportRecordIdx::new(records.len()));
                let mut record = builder.record.clone();
                if builder.scope != MODULE_SCOPE {
                    let mut names = BTreeSet::new();
                    self.enclosing_names(builder.scope, &mut names);
                    record.shadowing_names = names.into_iter().collect();
                }
                records.push(record);
            }
        }

        let named_imports: Vec<NamedImport> = self
            .named_imports
            .iter()
            .filter_map(|import| {
                let record = remap[import.record.index()]?;
                Some(NamedImport {
                    record,
                    ..import.clone()
                })
            })
            .collect();
        let exports: IndexMap<String, LocalExport> = self
            .exports
            .iter()
            .filter_map(|(name, export)| {
                let export = match export {
                    LocalExport::Symbol(symbol) => LocalExport::Symbol(*symbol),
                    LocalExport::ReExport { record, imported } => LocalExport::ReExport {
                        record: remap[record.index()]?,
                        imported: imported.clone(),
                    },
                };
                Some((name.clone(), export))
            })
            .collect();
        let star_exports = self
            .star_exports
            .iter()
            .filter_map(|record| remap[*record])
            .collect();

        let purity = Purity::new(s, &bound);
        let mut parts = Vec::with_capacity(self.parts.len());
        for builder in std::mem::take(&mut self.parts) {
            let shape = match builder.shape {
                PartShape::Import { record } => match remap[record.index()] {
                    Some(record) => PartShape::Import { record },
                    // Elided type-only import.
                    None => continue,
                },
                PartShape::ExportFrom { record } => match remap[record.index()] {
                    Some(record) => PartShape::ExportFrom { record },
                    None => continue,
                },
                other => other,
            };
            let has_side_effects = match &builder.info {
                StmtInfo::Pure => false,
                StmtInfo::Impure => true,
                StmtInfo::Declarations(initializers) => !initializers
                    .iter()
                    .all(|(start, end)| purity.is_pure_expression(*start, *end)),
                StmtInfo::Class(start, end) => !purity.is_pure_class(*start, *end),
                StmtInfo::Expression(start, end) => !purity.is_pure_expression(*start, *end),
            };
            let first = s.token(builder.start);
            let last = s.token(builder.end.saturating_sub(1).max(builder.start));
            let mut occurrences = builder.occurrences;
            occurrences.sort_by_key(|occurrence| occurrence.span.start);
            occurrences.dedup_by_key(|occurrence| occurrence.span.start);
            let mut part = Part::new(Span::new(first.start, last.end), shape);
            part.declared = builder.declared;
            part.references = builder.references;
            part.occurrences = occurrences;
            part.import_records = builder
                .records
                .iter()
                .filter_map(|record| remap[*record])
                .collect();
            part.has_side_effects = has_side_effects;
            parts.push(part);
        }

        let mut nested_names: Vec<String> =
            self.nested_names.iter().map(|name| name.to_string()).collect();
        nested_names.sort();
        let uses_commonjs = unbound.contains("module") || unbound.contains("exports");

        Ok(ParsedModule {
            kind: SourceKind::Script,
            symbols: self.symbols,
            parts,
            import_records: records,
            named_imports,
            exports,
            star_exports,
            unbound: unbound.into_iter().map(str::to_string).collect(),
            nested_names,
            has_esm_syntax: self.has_esm_syntax,
            uses_commonjs,
        })
    }
}

fn is_class_modifier(text: &str) -> bool {
    matches!(
        text,
        "static"
            | "get"
            | "set"
            | "async"
            | "accessor"
            | "public"
            | "private"
            | "protected"
            | "readonly"
            | "declare"
            | "abstract"
            | "override"
    )
}
