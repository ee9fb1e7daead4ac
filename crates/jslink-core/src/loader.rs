//! Loader kinds and lowering of non-script contents to ES modules.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    Js,
    Jsx,
    Ts,
    Tsx,
    Css,
    Json,
    Text,
    Base64,
    Binary,
    Empty,
    /// Pick from the file extension.
    #[default]
    Default,
}

impl Loader {
    pub fn as_str(self) -> &'static str {
        match self {
            Loader::Js => "js",
            Loader::Jsx => "jsx",
            Loader::Ts => "ts",
            Loader::Tsx => "tsx",
            Loader::Css => "css",
            Loader::Json => "json",
            Loader::Text => "text",
            Loader::Base64 => "base64",
            Loader::Binary => "binary",
            Loader::Empty => "empty",
            Loader::Default => "default",
        }
    }

    /// Loader implied by a path's extension; `None` when the extension is unknown.
    pub fn from_path(path: &str) -> Option<Loader> {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let ext = file_name.rsplit_once('.')?.1;
        Some(match ext {
            "js" | "mjs" | "cjs" => Loader::Js,
            "jsx" => Loader::Jsx,
            "ts" | "mts" | "cts" => Loader::Ts,
            "tsx" => Loader::Tsx,
            "css" => Loader::Css,
            "json" => Loader::Json,
            "txt" => Loader::Text,
            _ => return None,
        })
    }

    pub fn is_css(self) -> bool {
        matches!(self, Loader::Css)
    }

    /// Loaders whose contents are scanned as script without lowering.
    pub fn is_script(self) -> bool {
        matches!(self, Loader::Js | Loader::Jsx | Loader::Ts | Loader::Tsx)
    }

    pub fn is_typescript(self) -> bool {
        matches!(self, Loader::Ts | Loader::Tsx)
    }
}

/// Turn raw contents into module source text for `loader`.
///
/// Script and CSS contents must be UTF-8 and are returned unchanged; other
/// loaders produce a synthesized ES module.
pub fn lower(loader: Loader, contents: &[u8]) -> Result<String, String> {
    match loader {
        Loader::Js | Loader::Jsx | Loader::Ts | Loader::Tsx | Loader::Css | Loader::Default => {
            String::from_utf8(contents.to_vec())
                .map_err(|_| "File contents are not valid UTF-8".to_string())
        }
        Loader::Text => {
            let text = String::from_utf8_lossy(contents);
            Ok(format!("export default {};\n", quote_js_string(&text)))
        }
        Loader::Base64 => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(contents);
            Ok(format!("export default \"{encoded}\";\n"))
        }
        Loader::Binary => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(contents);
            Ok(format!(
                "export default /* @__PURE__ */ __toBinary(\"{encoded}\");\n"
            ))
        }
        Loader::Json => {
            let text = std::str::from_utf8(contents)
                .map_err(|_| "JSON file is not valid UTF-8".to_string())?;
            lower_json(text)
        }
        Loader::Empty => Ok(String::new()),
    }
}

fn lower_json(text: &str) -> Result<String, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("Invalid JSON: {e}"))?;

    let serde_json::Value::Object(map) = &value else {
        return Ok(format!("export default {value};\n"));
    };

    let mut out = String::new();
    let mut fields = Vec::new();
    for (key, field) in map {
        if is_identifier(key) && !crate::renamer::is_reserved_word(key) {
            let _ = writeln!(out, "var {key} = {field};");
            fields.push(key.clone());
        }
    }
    // Keys that are not valid bindings are kept as plain properties.
    out.push_str("export default {");
    let mut first = true;
    for (key, field) in map {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str("\n  ");
        if fields.contains(key) {
            out.push_str(key);
        } else {
            let _ = write!(out, "{}: {field}", quote_js_string(key));
        }
    }
    if !map.is_empty() {
        out.push('\n');
    }
    out.push_str("};\n");
    if !fields.is_empty() {
        let _ = writeln!(out, "export {{ {} }};", fields.join(", "));
    }
    Ok(out)
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric())
}

/// Quote `text` as a double-quoted JavaScript string literal.
pub fn quote_js_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
