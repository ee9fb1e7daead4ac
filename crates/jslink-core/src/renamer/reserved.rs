/// Words no binding may use, in sloppy or strict mode, plus names with
/// special meaning at the top level.
pub(super) const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "public", "return", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
    "Infinity", "NaN",
];

/// Free names the printer itself emits.
pub(super) const OUTPUT_GLOBALS: &[&str] = &["module", "exports", "require", "Promise"];

pub(crate) fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}
