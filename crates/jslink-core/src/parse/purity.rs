//! Conservative side-effect inference for top-level statements.
//!
//! Only expressions that are obviously free of observable effects count as
//! pure: literals, function and arrow expressions, classes without static
//! initialization, object/array literals of pure values, references to
//! declared bindings and `/* @__PURE__ */` calls with pure arguments.
//! Member access and references to unknown globals may throw or run getters,
//! so they are treated as side effects.

use super::lexer::TokenKind;
use super::tokens::TokenStream;
use rustc_hash::FxHashSet;

/// Unbound globals that are safe to read.
const PURE_GLOBALS: &[&str] = &["undefined", "NaN", "Infinity"];

pub(super) struct Purity<'s, 'a> {
    stream: &'s TokenStream<'a>,
    /// Identifier tokens that resolved to a declared binding.
    bound: &'s FxHashSet<usize>,
}

impl<'s, 'a> Purity<'s, 'a> {
    pub fn new(stream: &'s TokenStream<'a>, bound: &'s FxHashSet<usize>) -> Self {
        Self { stream, bound }
    }

    pub fn is_pure_expression(&self, start: usize, end: usize) -> bool {
        let s = self.stream;
        let mut j = start;
        while j < end {
            let token = s.token(j);
            if token.pure_before {
                match self.skip_pure_call(j, end) {
                    Some(next) => {
                        j = next;
                        continue;
                    }
                    None => return false,
                }
            }
            let text = s.text(j);
            match token.kind {
                TokenKind::Number | TokenKind::String | TokenKind::Regex | TokenKind::Template => {
                    j += 1;
                }
                TokenKind::TemplateHead | TokenKind::TemplateMiddle => {
                    let Ok(close) = s.close_of(j) else {
                        return false;
                    };
                    if !self.is_pure_expression(j + 1, close) {
                        return false;
                    }
                    j = close;
                }
                TokenKind::TemplateTail => j += 1,
                TokenKind::PrivateName => j += 1,
                TokenKind::Ident => match text {
                    "function" => match self.skip_function(j) {
                        Some(next) => j = next,
                        None => return false,
                    },
                    "async" if s.at(j + 1, "function") => match self.skip_function(j + 1) {
                        Some(next) => j = next,
                        None => return false,
                    },
                    "async" if s.at(j + 2, "=>") => j = self.skip_arrow_body(j + 3, end),
                    "async" if s.at(j + 1, "(") => match s.close_of(j + 1) {
                        Ok(close) if s.at(close + 1, "=>") => {
                            j = self.skip_arrow_body(close + 2, end);
                        }
                        _ => return false,
                    },
                    "class" => match self.class_end(j, end) {
                        Some(next) if self.is_pure_class(j, next) => j = next,
                        _ => return false,
                    },
                    "true" | "false" | "null" | "this" | "void" => j += 1,
                    "typeof" if s.is_ident(j + 1) => j += 2,
                    "typeof" => j += 1,
                    _ if s.at(j + 1, "=>") => j = self.skip_arrow_body(j + 2, end),
                    _ => {
                        if !self.is_pure_reference(j) || self.is_accessed(j + 1) {
                            return false;
                        }
                        j += 1;
                    }
                },
                TokenKind::Punct => match text {
                    "(" => {
                        let Ok(close) = s.close_of(j) else {
                            return false;
                        };
                        if s.at(close + 1, "=>") {
                            j = self.skip_arrow_body(close + 2, end);
                        } else if j > start && s.can_end_expression(j - 1) {
                            // call
                            return false;
                        } else {
                            if !self.is_pure_expression(j + 1, close) || self.is_accessed(close + 1)
                            {
                                return false;
                            }
                            j = close + 1;
                        }
                    }
                    "[" => {
                        let Ok(close) = s.close_of(j) else {
                            return false;
                        };
                        if (j > start && s.can_end_expression(j - 1))
                            || !self.is_pure_expression(j + 1, close)
                            || self.is_accessed(close + 1)
                        {
                            return false;
                        }
                        j = close + 1;
                    }
                    "{" => {
                        let Ok(close) = s.close_of(j) else {
                            return false;
                        };
                        if !self.is_pure_object(j, close) || self.is_accessed(close + 1) {
                            return false;
                        }
                        j = close + 1;
                    }
                    "," | "?" | ":" | "===" | "!==" | "==" | "!=" | "&&" | "||" | "??" | "!"
                    | "~" | "-" | "+" | "*" | "/" | "%" | "<" | ">" | "<=" | ">=" | "**" | "&"
                    | "|" | "^" | "<<" | ">>" | ">>>" | ";" => j += 1,
                    _ => return false,
                },
            }
        }
        true
    }

    fn is_pure_reference(&self, j: usize) -> bool {
        let s = self.stream;
        if self.bound.contains(&j) {
            return true;
        }
        PURE_GLOBALS.contains(&s.text(j))
    }

    /// Whether the token at `j` starts a member access, call or assignment.
    fn is_accessed(&self, j: usize) -> bool {
        let s = self.stream;
        if j >= s.len() {
            return false;
        }
        if s.kind(j) == Some(TokenKind::Template) || s.kind(j) == Some(TokenKind::TemplateHead) {
            return true;
        }
        s.kind(j) == Some(TokenKind::Punct)
            && !s.newline_before(j)
            && matches!(
                s.text(j),
                "." | "?." | "(" | "[" | "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "**=" | "<<="
                    | ">>=" | ">>>=" | "&=" | "|=" | "^=" | "&&=" | "||=" | "??=" | "++" | "--"
            )
    }

    /// `/* @__PURE__ */ f(args)` or `/* @__PURE__ */ new F(args)`; returns the
    /// index after the call when every argument is pure.
    fn skip_pure_call(&self, j: usize, end: usize) -> Option<usize> {
        let s = self.stream;
        let mut k = j;
        if s.at(k, "new") {
            k += 1;
        }
        while k < end {
            match s.kind(k) {
                Some(TokenKind::Ident | TokenKind::PrivateName) => k += 1,
                Some(TokenKind::Punct) if matches!(s.text(k), "." | "?.") => k += 1,
                _ => break,
            }
        }
        if k == j || !s.at(k, "(") {
            return None;
        }
        let close = s.close_of(k).ok()?;
        if !self.is_pure_expression(k + 1, close) || self.is_accessed(close + 1) {
            return None;
        }
        Some(close + 1)
    }

    /// Skip a function expression starting at the `function` keyword.
    fn skip_function(&self, j: usize) -> Option<usize> {
        let s = self.stream;
        let mut k = j + 1;
        while k < s.len() && !s.at(k, "{") {
            k = s.skip(k);
        }
        let close = s.close_of(k).ok()?;
        if self.is_accessed(close + 1) {
            return None;
        }
        Some(close + 1)
    }

    fn skip_arrow_body(&self, j: usize, end: usize) -> usize {
        let s = self.stream;
        if s.at(j, "{") {
            return s.skip(j);
        }
        let mut k = j;
        while k < end && !s.at(k, ",") && !s.at(k, ";") && !(k > j && s.asi_break(k)) {
            k = s.skip(k);
        }
        k
    }

    /// Index just past the class body of a class starting at `j`.
    fn class_end(&self, j: usize, end: usize) -> Option<usize> {
        let s = self.stream;
        let mut k = j + 1;
        while k < end && !s.at(k, "{") {
            k = s.skip(k);
        }
        let close = s.close_of(k).ok()?;
        Some(close + 1)
    }

    /// A class is pure unless its heritage, computed keys or static
    /// initialization can run code.
    pub fn is_pure_class(&self, start: usize, end: usize) -> bool {
        let s = self.stream;
        let mut k = start + 1;
        while k < end && !s.at(k, "{") && !s.at(k, "extends") {
            if s.at(k, "@") {
                return false;
            }
            k = s.skip(k);
        }
        if s.at(k, "extends") {
            let heritage = k + 1;
            while k < end && !s.at(k, "{") {
                k = s.skip(k);
            }
            if !self.is_pure_expression(heritage, k) {
                return false;
            }
        }
        let Ok(close) = s.close_of(k) else {
            return false;
        };

        let mut m = k + 1;
        while m < close {
            if s.at(m, ";") {
                m += 1;
                continue;
            }
            if s.at(m, "@") {
                return false;
            }
            let is_static = s.at(m, "static") && !matches!(s.text(m + 1), "(" | "=" | ";");
            if is_static && s.at(m + 1, "{") {
                return false;
            }
            while is_modifier(s.text(m)) && !matches!(s.text(m + 1), "(" | "=" | ";" | "}") {
                m += 1;
            }
            if s.at(m, "*") {
                m += 1;
            }
            if s.at(m, "[") {
                let Ok(key_close) = s.close_of(m) else {
                    return false;
                };
                if !self.is_pure_expression(m + 1, key_close) {
                    return false;
                }
                m = key_close + 1;
            } else {
                m += 1;
            }
            while s.at(m, "?") || s.at(m, "!") {
                m += 1;
            }
            if s.at(m, "(") || s.at(m, "<") {
                while m < close && !s.at(m, "{") {
                    m = s.skip(m);
                }
                m = s.skip(m);
                continue;
            }
            // Field: skip a type annotation, then the initializer.
            let mut value = None;
            let mut e = m;
            while e < close && !s.at(e, ";") && !(e > m && s.asi_break(e)) {
                if s.at(e, "=") && value.is_none() {
                    value = Some(e + 1);
                }
                e = s.skip(e);
            }
            if let Some(value) = value {
                if is_static && !self.is_pure_expression(value, e) {
                    return false;
                }
            }
            m = e;
        }
        true
    }

    fn is_pure_object(&self, open: usize, close: usize) -> bool {
        let s = self.stream;
        let mut m = open + 1;
        while m < close {
            let mut member_end = m;
            while member_end < close && !s.at(member_end, ",") {
                member_end = s.skip(member_end);
            }
            if member_end > m && !self.is_pure_member(m, member_end) {
                return false;
            }
            m = member_end + 1;
        }
        true
    }

    fn is_pure_member(&self, start: usize, end: usize) -> bool {
        let s = self.stream;
        if s.at(start, "...") {
            return false;
        }
        let mut key = start;
        while matches!(s.text(key), "get" | "set" | "async" | "*")
            && key + 1 < end
            && !matches!(s.text(key + 1), ":" | "(" | "=")
        {
            key += 1;
        }
        let after_key = if s.at(key, "[") {
            let Ok(key_close) = s.close_of(key) else {
                return false;
            };
            if !self.is_pure_expression(key + 1, key_close) {
                return false;
            }
            key_close + 1
        } else {
            key + 1
        };
        if s.at(after_key, ":") {
            return self.is_pure_expression(after_key + 1, end);
        }
        if s.at(after_key, "(") {
            return true;
        }
        // Shorthand property.
        after_key == end && self.is_pure_reference(key)
    }
}

fn is_modifier(text: &str) -> bool {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::lexer::Lexer;

    fn pure(src: &str, bound: &[&str]) -> bool {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let stream = TokenStream::new(src, &tokens).unwrap();
        let bound: FxHashSet<usize> = (0..tokens.len())
            .filter(|&i| bound.contains(&stream.text(i)))
            .collect();
        Purity::new(&stream, &bound).is_pure_expression(0, tokens.len())
    }

    #[test]
    fn test_literals_and_functions() {
        assert!(pure("1 + 2", &[]));
        assert!(pure("`a${1}b`", &[]));
        assert!(pure("function () { sideEffect() }", &[]));
        assert!(pure("(a, b) => a + b", &[]));
        assert!(pure("x => { x.y = 1 }", &[]));
        assert!(pure("{ a: 1, b: [2, 3], c() { go() } }", &[]));
        assert!(pure("undefined", &[]));
    }

    #[test]
    fn test_references() {
        assert!(pure("a === 123", &["a"]));
        assert!(!pure("window", &[]));
        assert!(!pure("a.b", &["a"]));
        assert!(!pure("a()", &["a"]));
        assert!(!pure("a = 1", &["a"]));
        assert!(pure("typeof window", &[]));
    }

    #[test]
    fn test_pure_annotation() {
        assert!(pure("/* @__PURE__ */ create(1, 2)", &[]));
        assert!(pure("/* #__PURE__ */ new Map()", &[]));
        assert!(!pure("/* @__PURE__ */ create(go())", &["go"]));
        assert!(!pure("create(1)", &["create"]));
    }

    #[test]
    fn test_classes() {
        assert!(pure("class { method() { go() } field = go() }", &[]));
        assert!(!pure("class { static field = go() }", &["go"]));
        assert!(!pure("class { static { go() } }", &[]));
        assert!(pure("class extends Base {}", &["Base"]));
        assert!(!pure("class extends mixin(Base) {}", &["mixin", "Base"]));
        assert!(!pure("class { [key()]() {} }", &["key"]));
    }

    #[test]
    fn test_spread_is_impure() {
        assert!(!pure("{ ...other }", &["other"]));
        assert!(!pure("[...items]", &["items"]));
    }
}
