//! A tokenizer for the ECMAScript module subset the scanner understands.
//!
//! Tokens only carry byte ranges; their text is sliced back out of the source.
//! Whether `/` starts a regular expression is decided from the previous
//! significant token, and template literals are split at `${` / `}` so the
//! substitutions are ordinary token runs.

use super::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier names, including keywords.
    Ident,
    /// `#name`
    PrivateName,
    Number,
    String,
    Regex,
    /// A template without substitutions.
    Template,
    /// `` `...${ ``
    TemplateHead,
    /// `}...${`
    TemplateMiddle,
    /// `` }...` ``
    TemplateTail,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: u32,
    pub end: u32,
    /// A line terminator occurs between the previous token and this one.
    pub newline_before: bool,
    /// Preceded by a `/* @__PURE__ */` or `/* #__PURE__ */` comment.
    pub pure_before: bool,
}

// Longest first.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@",
];

/// Keywords after which a `/` starts a regular expression.
const REGEX_AFTER_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await", "extends",
];

pub struct Lexer<'a> {
    source: &'a str,
    next: usize,
    tokens: Vec<Token>,
    /// Open-brace counts inside each active template substitution.
    template_depths: Vec<u32>,
    newline_before: bool,
    pure_before: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            next: 0,
            tokens: Vec::new(),
            template_depths: Vec::new(),
            newline_before: false,
            pure_before: false,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        if self.source.starts_with("#!") {
            self.next = self.source.find('\n').unwrap_or(self.source.len());
        }
        loop {
            self.skip_trivia()?;
            if self.at_end() {
                break;
            }
            self.lex_token()?;
        }
        if !self.template_depths.is_empty() {
            return Err(ParseError::new("Unterminated template literal", self.source.len()));
        }
        Ok(self.tokens)
    }

    fn at_end(&self) -> bool {
        self.next >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.next..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.next..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.next += c.len_utf8();
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    self.newline_before = true;
                    self.bump();
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    let end = self.source[self.next..]
                        .find(['\n', '\r'])
                        .map_or(self.source.len(), |offset| self.next + offset);
                    self.note_comment(self.next, end);
                    self.next = end;
                }
                '/' if self.peek_at(1) == Some('*') => {
                    let start = self.next;
                    let Some(offset) = self.source[start + 2..].find("*/") else {
                        return Err(ParseError::new("Unterminated comment", start));
                    };
                    let end = start + 2 + offset + 2;
                    if self.source[start..end].contains(['\n', '\r', '\u{2028}', '\u{2029}']) {
                        self.newline_before = true;
                    }
                    self.note_comment(start, end);
                    self.next = end;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn note_comment(&mut self, start: usize, end: usize) {
        let text = &self.source[start..end];
        if text.contains("@__PURE__") || text.contains("#__PURE__") {
            self.pure_before = true;
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            start: start as u32,
            end: self.next as u32,
            newline_before: std::mem::take(&mut self.newline_before),
            pure_before: std::mem::take(&mut self.pure_before),
        });
    }

    fn lex_token(&mut self) -> Result<(), ParseError> {
        let start = self.next;
        let Some(c) = self.peek() else {
            return Ok(());
        };
        match c {
            '"' | '\'' => {
                self.lex_string(c)?;
                self.push(TokenKind::String, start);
            }
            '`' => {
                self.bump();
                let kind = self.lex_template_chunk(TokenKind::Template, TokenKind::TemplateHead)?;
                self.push(kind, start);
            }
            '}' if self.template_depths.last() == Some(&0) => {
                self.template_depths.pop();
                self.bump();
                let kind =
                    self.lex_template_chunk(TokenKind::TemplateTail, TokenKind::TemplateMiddle)?;
                self.push(kind, start);
            }
            '#' => {
                self.bump();
                self.lex_identifier_rest();
                self.push(TokenKind::PrivateName, start);
            }
            c if is_id_start(c) => {
                self.lex_identifier_rest();
                self.push(TokenKind::Ident, start);
            }
            c if c.is_ascii_digit() => {
                self.lex_number();
                self.push(TokenKind::Number, start);
            }
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_number();
                self.push(TokenKind::Number, start);
            }
            '/' if self.regex_allowed() => {
                self.lex_regex()?;
                self.push(TokenKind::Regex, start);
            }
            _ => {
                let rest = &self.source[start..];
                let Some(punct) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) else {
                    return Err(ParseError::new(format!("Unexpected \"{c}\""), start));
                };
                // `a?.5:b` is a conditional, not optional chaining.
                let len = if *punct == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit())
                {
                    1
                } else {
                    punct.len()
                };
                self.next += len;
                match &rest[..len] {
                    "{" => {
                        if let Some(depth) = self.template_depths.last_mut() {
                            *depth += 1;
                        }
                    }
                    "}" => {
                        if let Some(depth) = self.template_depths.last_mut() {
                            *depth = depth.saturating_sub(1);
                        }
                    }
                    _ => {}
                }
                self.push(TokenKind::Punct, start);
            }
        }
        Ok(())
    }

    fn lex_identifier_rest(&mut self) {
        while let Some(c) = self.peek() {
            if is_id_continue(c) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self) {
        let mut seen_dot = false;
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let accept = c.is_ascii_alphanumeric()
                || c == '_'
                || (c == '.' && !seen_dot)
                || ((c == '+' || c == '-') && matches!(prev, 'e' | 'E') && !self.is_hex_number());
            if !accept {
                break;
            }
            if c == '.' {
                seen_dot = true;
            }
            prev = c;
            self.bump();
        }
    }

    fn is_hex_number(&self) -> bool {
        let digits = &self.source[..self.next];
        let start = digits
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .map_or(0, |i| i + 1);
        let text = &digits[start..];
        text.starts_with("0x") || text.starts_with("0X")
    }

    fn lex_string(&mut self, quote: char) -> Result<(), ParseError> {
        let start = self.next;
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') | Some('\r') => {
                    return Err(ParseError::new("Unterminated string literal", start));
                }
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    /// Lex template characters after a `` ` `` or a closing `}`.
    fn lex_template_chunk(
        &mut self,
        closed: TokenKind,
        open: TokenKind,
    ) -> Result<TokenKind, ParseError> {
        let start = self.next;
        loop {
            match self.bump() {
                None => return Err(ParseError::new("Unterminated template literal", start)),
                Some('\\') => {
                    self.bump();
                }
                Some('`') => return Ok(closed),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    self.template_depths.push(0);
                    return Ok(open);
                }
                Some(_) => {}
            }
        }
    }

    fn lex_regex(&mut self) -> Result<(), ParseError> {
        let start = self.next;
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') | Some('\r') => {
                    return Err(ParseError::new("Unterminated regular expression", start));
                }
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        self.lex_identifier_rest();
        Ok(())
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        let text = &self.source[prev.start as usize..prev.end as usize];
        match prev.kind {
            TokenKind::Ident => REGEX_AFTER_KEYWORDS.contains(&text),
            TokenKind::Punct => !matches!(text, ")" | "]" | "++" | "--"),
            TokenKind::TemplateHead | TokenKind::TemplateMiddle => true,
            _ => false,
        }
    }
}

pub fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

pub fn is_id_continue(c: char) -> bool {
    c == '$' || c == '_' || c == '\u{200c}' || c == '\u{200d}' || c.is_alphanumeric()
}

/// Cooked value of a string literal token, without quotes.
pub fn string_value(raw: &str) -> String {
    let inner = &raw[1..raw.len().saturating_sub(1).max(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some('u') => {
                let rest = chars.as_str();
                let (hex, consumed) = match rest.strip_prefix('{') {
                    Some(braced) => {
                        let close = braced.find('}').unwrap_or(braced.len());
                        (&braced[..close], (close + 2).min(rest.len()))
                    }
                    None => {
                        let len = rest
                            .char_indices()
                            .take(4)
                            .take_while(|(_, c)| c.is_ascii_hexdigit())
                            .count();
                        (&rest[..len], len)
                    }
                };
                if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
                chars = rest[consumed..].chars();
            }
            Some('\n') => {}
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, source[t.start as usize..t.end as usize].to_string()))
            .collect()
    }

    #[test]
    fn test_regex_versus_division() {
        let tokens = kinds("a = b / c / d; x = /re[/]/g.test(s)");
        assert_eq!(tokens[3], (TokenKind::Punct, "/".to_string()));
        assert!(tokens.contains(&(TokenKind::Regex, "/re[/]/g".to_string())));
    }

    #[test]
    fn test_template_substitutions() {
        let tokens = kinds("`a${b + `c${d}`}e`");
        let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::TemplateHead,
                TokenKind::Ident,
                TokenKind::Punct,
                TokenKind::TemplateHead,
                TokenKind::Ident,
                TokenKind::TemplateTail,
                TokenKind::TemplateTail,
            ]
        );
    }

    #[test]
    fn test_object_inside_template_substitution() {
        let tokens = kinds("`${ {a: 1}.a }`");
        assert_eq!(tokens.last().unwrap().0, TokenKind::TemplateTail);
        assert_eq!(tokens.iter().filter(|(_, t)| t == "{").count(), 1);
    }

    #[test]
    fn test_newlines_and_pure_comments() {
        let tokens = Lexer::new("a\n/* @__PURE__ */ f()").tokenize().unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(tokens[1].pure_before);
        assert!(!tokens[2].pure_before);
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("1.5e-3 0xFF 1_000n .5 1..toString");
        assert_eq!(tokens[0].1, "1.5e-3");
        assert_eq!(tokens[1].1, "0xFF");
        assert_eq!(tokens[2].1, "1_000n");
        assert_eq!(tokens[3].1, ".5");
        assert_eq!(tokens[4].1, "1.");
    }

    #[test]
    fn test_unterminated_string() {
        let error = Lexer::new("let s = 'oops").tokenize().unwrap_err();
        assert_eq!(error.offset, 8);
    }

    #[test]
    fn test_string_value() {
        assert_eq!(string_value(r#""a\"b""#), "a\"b");
        assert_eq!(string_value(r"'A\x42'"), "AB");
        assert_eq!(string_value(r#""\u{1F600}""#), "\u{1F600}");
    }
}
