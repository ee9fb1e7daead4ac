//! `@import` discovery for stylesheets.

use super::module::{ImportKind, ImportRecord, ParsedModule, Part, PartShape, SourceKind, Span};
use super::ParseError;
use crate::ids::ImportRecordIdx;
use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)|"([^"]*)"|'([^']*)')[^;]*;?"#)
        .expect("import rule pattern is valid")
});

/// Scan a stylesheet. Each `@import` becomes a [`ImportKind::CssImport`]
/// record whose span covers the whole rule; the sheet itself is a single
/// part with side effects.
pub fn scan_css(source: &str) -> Result<ParsedModule, ParseError> {
    let masked = mask_comments(source)?;
    let mut records = Vec::new();
    for captures in IMPORT_RULE.captures_iter(&masked) {
        let Some(rule) = captures.get(0) else {
            continue;
        };
        let specifier = (1..=5)
            .find_map(|group| captures.get(group))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        if specifier.is_empty() {
            return Err(ParseError::new("Expected a URL in @import", rule.start()));
        }
        records.push(ImportRecord {
            specifier,
            kind: ImportKind::CssImport,
            span: Span::new(rule.start() as u32, rule.end() as u32),
            shadowing_names: Vec::new(),
        });
    }

    let mut part = Part::new(Span::new(0, source.len() as u32), PartShape::Stmt);
    part.has_side_effects = true;
    part.import_records = (0..records.len()).map(ImportRecordIdx::new).collect();

    Ok(ParsedModule {
        kind: SourceKind::Css,
        parts: vec![part],
        import_records: records,
        ..ParsedModule::default()
    })
}

/// Replace comment bodies with spaces so offsets stay valid.
fn mask_comments(source: &str) -> Result<String, ParseError> {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
                i += 1;
            }
            None if b == b'"' || b == b'\'' => {
                quote = Some(b);
                i += 1;
            }
            None if b == b'/' && bytes.get(i + 1) == Some(&b'*') => {
                let Some(close) = source[i + 2..].find("*/") else {
                    return Err(ParseError::new("Expected \"*/\"", source.len()));
                };
                let end = i + 2 + close + 2;
                for byte in &mut out[i..end] {
                    if *byte != b'\n' {
                        *byte = b' ';
                    }
                }
                i = end;
            }
            None => i += 1,
        }
    }
    // Only ASCII bytes were replaced, and only whole comments, so the
    // result is still valid UTF-8.
    String::from_utf8(out).map_err(|e| ParseError::new("Invalid UTF-8", e.utf8_error().valid_up_to()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_rules() {
        let source = "@import \"./a.css\";\n@import url(b.css) screen;\n/* @import \"c.css\"; */\n.x { color: red }\n";
        let module = scan_css(source).unwrap();
        assert!(module.is_css());
        let specifiers: Vec<&str> = module
            .import_records
            .iter()
            .map(|r| r.specifier.as_str())
            .collect();
        assert_eq!(specifiers, vec!["./a.css", "b.css"]);
        let first = module.import_records[0].span;
        assert_eq!(&source[first.start as usize..first.end as usize], "@import \"./a.css\";");
        assert_eq!(module.parts.len(), 1);
        assert!(module.parts[0].has_side_effects);
    }

    #[test]
    fn test_unterminated_comment() {
        let error = scan_css("a { } /* open").unwrap_err();
        assert_eq!(error.message, "Expected \"*/\"");
    }
}
