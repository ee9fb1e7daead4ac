//! The parts of `package.json` the resolver reads.

use glob::{MatchOptions, Pattern};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PackageJson {
    /// Directory containing the `package.json`.
    pub dir: PathBuf,
    value: Value,
    side_effects: SideEffects,
}

#[derive(Debug, Clone)]
enum SideEffects {
    Undeclared,
    All(bool),
    Globs(Vec<Pattern>),
}

impl PackageJson {
    pub fn parse(dir: PathBuf, text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let side_effects = match value.get("sideEffects") {
            Some(Value::Bool(flag)) => SideEffects::All(*flag),
            Some(Value::Array(items)) => SideEffects::Globs(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|glob| compile_side_effects_glob(&dir, glob))
                    .collect(),
            ),
            _ => SideEffects::Undeclared,
        };
        Ok(Self {
            dir,
            value,
            side_effects,
        })
    }

    /// First string value among `fields`.
    pub fn main_entry(&self, fields: &[String]) -> Option<&str> {
        fields
            .iter()
            .find_map(|field| self.value.get(field.as_str()).and_then(Value::as_str))
            .filter(|entry| !entry.is_empty())
    }

    /// Declared side effects of `file`, or `None` when the package says nothing.
    pub fn side_effects(&self, file: &Path) -> Option<bool> {
        match &self.side_effects {
            SideEffects::Undeclared => None,
            SideEffects::All(flag) => Some(*flag),
            SideEffects::Globs(patterns) => {
                let options = MatchOptions {
                    require_literal_separator: true,
                    ..MatchOptions::new()
                };
                Some(
                    patterns
                        .iter()
                        .any(|pattern| pattern.matches_path_with(file, options)),
                )
            }
        }
    }
}

/// Globs without a `/` match in any directory, like bundlers treat them.
fn compile_side_effects_glob(dir: &Path, glob: &str) -> Option<Pattern> {
    let glob = glob.trim_start_matches("./");
    let relative = if glob.contains('/') {
        glob.to_string()
    } else {
        format!("**/{glob}")
    };
    let full = dir.join(relative);
    Pattern::new(&full.to_string_lossy()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_fields_in_order() {
        let pkg = PackageJson::parse(
            PathBuf::from("/p/node_modules/lib"),
            r#"{"main": "./main.js", "module": "./esm.js"}"#,
        )
        .unwrap();
        let fields = vec!["module".to_string(), "main".to_string()];
        assert_eq!(pkg.main_entry(&fields), Some("./esm.js"));
        assert_eq!(pkg.main_entry(&fields[1..]), Some("./main.js"));
    }

    #[test]
    fn test_side_effects_forms() {
        let dir = PathBuf::from("/p/node_modules/lib");
        let none = PackageJson::parse(dir.clone(), "{}").unwrap();
        assert_eq!(none.side_effects(&dir.join("a.js")), None);

        let pure = PackageJson::parse(dir.clone(), r#"{"sideEffects": false}"#).unwrap();
        assert_eq!(pure.side_effects(&dir.join("a.js")), Some(false));

        let globs =
            PackageJson::parse(dir.clone(), r#"{"sideEffects": ["*.css", "./src/polyfill.js"]}"#)
                .unwrap();
        assert_eq!(globs.side_effects(&dir.join("styles/x.css")), Some(true));
        assert_eq!(globs.side_effects(&dir.join("src/polyfill.js")), Some(true));
        assert_eq!(globs.side_effects(&dir.join("src/util.js")), Some(false));
    }
}
