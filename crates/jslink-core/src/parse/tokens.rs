//! Bracket-matched token stream shared by the scanner and the purity check.

use super::lexer::{Token, TokenKind};
use super::ParseError;

const NO_MATCH: usize = usize::MAX;

/// Words that never act as a value reference.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "this", "super", "null", "true", "false", "new", "typeof", "void", "delete", "in",
    "instanceof", "yield", "await", "let", "arguments", "debugger", "return", "throw", "case",
    "default", "else", "do", "if", "for", "while", "with", "switch", "try", "catch", "finally",
    "break", "continue", "var", "const", "function", "class", "extends", "import", "export",
    "enum",
];

pub(super) struct TokenStream<'a> {
    pub src: &'a str,
    pub tokens: &'a [Token],
    matching: Vec<usize>,
}

impl<'a> TokenStream<'a> {
    pub fn new(src: &'a str, tokens: &'a [Token]) -> Result<Self, ParseError> {
        let mut matching = vec![NO_MATCH; tokens.len()];
        let mut stack: Vec<usize> = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            let text = &src[token.start as usize..token.end as usize];
            let closes = match (token.kind, text) {
                (TokenKind::Punct, "(" | "[" | "{") | (TokenKind::TemplateHead, _) => {
                    stack.push(i);
                    continue;
                }
                (TokenKind::Punct, ")") => Some("("),
                (TokenKind::Punct, "]") => Some("["),
                (TokenKind::Punct, "}") => Some("{"),
                (TokenKind::TemplateMiddle | TokenKind::TemplateTail, _) => None,
                _ => continue,
            };
            let Some(open) = stack.pop() else {
                return Err(ParseError::new(
                    format!("Unexpected \"{}\"", first_char(text)),
                    token.start as usize,
                ));
            };
            let open_token = tokens[open];
            let open_text = &src[open_token.start as usize..open_token.end as usize];
            let matches = match closes {
                Some(expected) => open_token.kind == TokenKind::Punct && open_text == expected,
                None => matches!(
                    open_token.kind,
                    TokenKind::TemplateHead | TokenKind::TemplateMiddle
                ),
            };
            if !matches {
                return Err(ParseError::new(
                    format!("Unexpected \"{}\"", first_char(text)),
                    token.start as usize,
                ));
            }
            matching[open] = i;
            matching[i] = open;
            if token.kind == TokenKind::TemplateMiddle {
                stack.push(i);
            }
        }
        if let Some(open) = stack.pop() {
            let expected = match &src[tokens[open].start as usize..tokens[open].end as usize] {
                "(" => ")",
                "[" => "]",
                _ => "}",
            };
            return Err(ParseError::new(format!("Expected \"{expected}\""), src.len()));
        }
        Ok(Self {
            src,
            tokens,
            matching,
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn token(&self, i: usize) -> Token {
        self.tokens[i]
    }

    pub fn kind(&self, i: usize) -> Option<TokenKind> {
        self.tokens.get(i).map(|t| t.kind)
    }

    pub fn text(&self, i: usize) -> &'a str {
        match self.tokens.get(i) {
            Some(t) => &self.src[t.start as usize..t.end as usize],
            None => "",
        }
    }

    /// Punctuator or identifier `i` reads exactly `text`.
    pub fn at(&self, i: usize, text: &str) -> bool {
        matches!(self.kind(i), Some(TokenKind::Punct | TokenKind::Ident)) && self.text(i) == text
    }

    pub fn is_ident(&self, i: usize) -> bool {
        self.kind(i) == Some(TokenKind::Ident)
    }

    /// An identifier that can name a binding or be referenced.
    pub fn is_binding_ident(&self, i: usize) -> bool {
        self.is_ident(i) && !EXPRESSION_KEYWORDS.contains(&self.text(i))
    }

    pub fn newline_before(&self, i: usize) -> bool {
        self.tokens.get(i).is_some_and(|t| t.newline_before)
    }

    pub fn is_open(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::TemplateHead) => true,
            Some(TokenKind::Punct) => matches!(self.text(i), "(" | "[" | "{"),
            _ => false,
        }
    }

    /// Index of the token closing the bracket opened at `i`.
    pub fn close_of(&self, i: usize) -> Result<usize, ParseError> {
        match self.matching.get(i) {
            Some(&close) if close != NO_MATCH && close > i => Ok(close),
            _ => Err(self.error_at(i, "Expected a bracket")),
        }
    }

    /// Index just past the bracketed group (or whole template) starting at `i`,
    /// or `i + 1` for any other token.
    pub fn skip(&self, i: usize) -> usize {
        if !self.is_open(i) {
            return i + 1;
        }
        let mut close = self.matching[i];
        while self.kind(close) == Some(TokenKind::TemplateMiddle) {
            close = self.matching[close];
        }
        close + 1
    }

    pub fn can_end_expression(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Ident) => !matches!(
                self.text(i),
                "in" | "instanceof" | "typeof" | "new" | "delete" | "void" | "return" | "throw"
                    | "case" | "do" | "else" | "yield" | "await" | "extends"
            ),
            Some(TokenKind::Punct) => matches!(self.text(i), ")" | "]" | "}" | "++" | "--"),
            Some(TokenKind::TemplateMiddle | TokenKind::TemplateHead) | None => false,
            Some(_) => true,
        }
    }

    fn continues_expression(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Punct) => !matches!(self.text(i), "{" | "++" | "--" | "!" | "~" | "@"),
            Some(TokenKind::Template | TokenKind::TemplateHead) => true,
            Some(TokenKind::Ident) => {
                matches!(self.text(i), "in" | "instanceof" | "as" | "satisfies")
            }
            _ => false,
        }
    }

    /// Automatic semicolon insertion ends the statement before token `i`.
    pub fn asi_break(&self, i: usize) -> bool {
        i > 0
            && i < self.len()
            && self.newline_before(i)
            && self.can_end_expression(i - 1)
            && !self.continues_expression(i)
    }

    /// Index just past the statement starting at `i` without looking inside it.
    pub fn statement_end(&self, i: usize, end: usize) -> usize {
        let mut j = i;
        while j < end {
            if j > i && self.asi_break(j) {
                return j;
            }
            if self.at(j, ";") {
                return j + 1;
            }
            if self.at(j, "}") {
                return j;
            }
            j = self.skip(j);
        }
        end.min(j)
    }

    pub fn error_at(&self, i: usize, message: impl Into<String>) -> ParseError {
        let offset = self
            .tokens
            .get(i)
            .map_or(self.src.len(), |t| t.start as usize);
        ParseError::new(message, offset)
    }
}

fn first_char(text: &str) -> &str {
    text.get(..1).unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::lexer::Lexer;

    #[test]
    fn test_bracket_matching_and_skip() {
        let src = "f(a[1], {b: `x${c}y${d}`})";
        let tokens = Lexer::new(src).tokenize().unwrap();
        let stream = TokenStream::new(src, &tokens).unwrap();
        assert_eq!(stream.close_of(1).unwrap(), tokens.len() - 1);
        let template = (0..tokens.len())
            .find(|&i| stream.kind(i) == Some(TokenKind::TemplateHead))
            .unwrap();
        assert_eq!(stream.text(stream.skip(template)), "}");
    }

    #[test]
    fn test_mismatched_brackets() {
        let src = "f(a]";
        let tokens = Lexer::new(src).tokenize().unwrap();
        let error = TokenStream::new(src, &tokens).err().unwrap();
        assert_eq!(error.message, "Unexpected \"]\"");
        assert_eq!(error.offset, 3);
    }

    #[test]
    fn test_asi_break() {
        let src = "a = b\nc()\nd\n(e)";
        let tokens = Lexer::new(src).tokenize().unwrap();
        let stream = TokenStream::new(src, &tokens).unwrap();
        assert_eq!(stream.statement_end(0, tokens.len()), 3);
        // `d\n(e)` is a call, not two statements.
        assert_eq!(stream.statement_end(6, tokens.len()), tokens.len());
    }
}
