//! Build diagnostics.
//!
//! Errors from resolution, loading and parsing are collected per queue item and
//! reported together once the scheduler drains. Errors raised by the linking
//! passes (`Internal`) indicate a broken invariant on an already validated graph.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Upper bound on collected errors per build.
pub const MAX_COLLECTED_ERRORS: usize = 100;

/// A position inside an input file, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Pretty path of the file (relative to the working directory, or `ns:path`).
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 0-based column in UTF-16 code units.
    pub column: u32,
    pub line_text: String,
}

impl Location {
    /// Location of byte `offset` in `source`.
    pub fn from_offset(file: impl Into<String>, source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[offset..]
            .find('\n')
            .map_or(source.len(), |i| offset + i);
        let line = source[..line_start].matches('\n').count() as u32 + 1;
        let column = source
            .get(line_start..offset)
            .map_or(0, |prefix| prefix.encode_utf16().count() as u32);
        Self {
            file: file.into(),
            line,
            column,
            line_text: source[line_start..line_end].trim_end_matches('\r').to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Could not resolve \"{specifier}\"{}", importer_suffix(.importer))]
    Unresolved {
        specifier: String,
        importer: Option<String>,
        location: Option<Location>,
    },

    #[error("Could not load \"{module}\": {reason}")]
    Load {
        module: String,
        reason: String,
        location: Option<Location>,
    },

    #[error("{message}")]
    Parse {
        message: String,
        location: Option<Location>,
    },

    #[error("[plugin {plugin}] {message}")]
    Plugin {
        plugin: String,
        hook: &'static str,
        message: String,
        location: Option<Location>,
    },

    #[error("No matching export in \"{target}\" for import \"{name}\"")]
    MissingExport {
        importer: String,
        target: String,
        name: String,
        location: Option<Location>,
    },

    #[error("Failed to write \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The build was aborted")]
    Aborted,

    #[error("Invalid build options: {0}")]
    InvalidOptions(String),

    #[error("Internal linker error: {0}")]
    Internal(String),
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn importer_suffix(importer: &Option<String>) -> String {
    match importer {
        Some(importer) => format!(" from \"{importer}\""),
        None => String::new(),
    }
}

impl BuildError {
    pub fn location(&self) -> Option<&Location> {
        match self {
            BuildError::Unresolved { location, .. }
            | BuildError::Load { location, .. }
            | BuildError::Parse { location, .. }
            | BuildError::Plugin { location, .. }
            | BuildError::MissingExport { location, .. } => location.as_ref(),
            BuildError::Io { .. }
            | BuildError::Aborted
            | BuildError::InvalidOptions(_)
            | BuildError::Internal(_) => None,
        }
    }

    /// Render as `file:line:col: ERROR: text` when a location is known.
    pub fn render(&self) -> String {
        match self.location() {
            Some(location) => format!("{location}: ERROR: {self}"),
            None => format!("ERROR: {self}"),
        }
    }
}

/// A non-fatal diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub text: String,
    pub location: Option<Location>,
}

impl Warning {
    pub fn new(text: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            text: text.into(),
            location,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: WARNING: {}", self.text),
            None => write!(f, "WARNING: {}", self.text),
        }
    }
}

/// Every error collected by a failed build.
#[derive(Debug, Error)]
#[error("Build failed with {} error{}", .errors.len(), plural(.errors.len()))]
pub struct BuildFailure {
    pub errors: Vec<BuildError>,
    pub warnings: Vec<Warning>,
    /// Errors dropped after [`MAX_COLLECTED_ERRORS`] was reached.
    pub dropped_errors: usize,
}

impl BuildFailure {
    pub fn new(errors: Vec<BuildError>, warnings: Vec<Warning>) -> Self {
        Self {
            errors,
            warnings,
            dropped_errors: 0,
        }
    }

    pub fn single(error: BuildError) -> Self {
        Self::new(vec![error], Vec::new())
    }

    /// All errors rendered one per line, followed by an overflow note.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for error in &self.errors {
            out.push_str(&error.render());
            out.push('\n');
        }
        if self.dropped_errors > 0 {
            out.push_str(&format!(
                "... and {} more error{} not shown\n",
                self.dropped_errors,
                plural(self.dropped_errors)
            ));
        }
        out
    }
}

/// Bounded error sink shared by scheduler workers.
///
/// Workers finish in any order, so errors are reported sorted by file,
/// position and message. Past the cap only the first errors in that order
/// are kept.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<BuildError>,
    dropped: usize,
}

impl ErrorCollector {
    pub fn push(&mut self, error: BuildError) {
        self.errors.push(error);
        if self.errors.len() >= 2 * MAX_COLLECTED_ERRORS {
            self.trim();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len().min(MAX_COLLECTED_ERRORS)
    }

    fn trim(&mut self) {
        self.errors.sort_by_cached_key(error_order);
        if self.errors.len() > MAX_COLLECTED_ERRORS {
            if self.dropped == 0 {
                tracing::warn!(cap = MAX_COLLECTED_ERRORS, "error cap reached, dropping further errors");
            }
            self.dropped += self.errors.len() - MAX_COLLECTED_ERRORS;
            self.errors.truncate(MAX_COLLECTED_ERRORS);
        }
    }

    pub fn into_failure(mut self, warnings: Vec<Warning>) -> BuildFailure {
        self.trim();
        BuildFailure {
            errors: self.errors,
            warnings,
            dropped_errors: self.dropped,
        }
    }
}

/// Errors without a location sort first.
fn error_order(error: &BuildError) -> (Option<(String, u32, u32)>, String) {
    let position = error
        .location()
        .map(|location| (location.file.clone(), location.line, location.column));
    (position, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_message_includes_importer() {
        let error = BuildError::Unresolved {
            specifier: "./missing".to_string(),
            importer: Some("src/main.js".to_string()),
            location: None,
        };
        assert_eq!(
            error.to_string(),
            "Could not resolve \"./missing\" from \"src/main.js\""
        );
    }

    #[test]
    fn test_render_with_location() {
        let error = BuildError::Parse {
            message: "Unterminated string literal".to_string(),
            location: Some(Location {
                file: "a.js".to_string(),
                line: 3,
                column: 7,
                line_text: "let s = 'oops".to_string(),
            }),
        };
        assert_eq!(error.render(), "a.js:3:7: ERROR: Unterminated string literal");
    }

    #[test]
    fn test_location_from_offset() {
        let source = "let a = 1;\nlet é = 'x';\n";
        let location = Location::from_offset("a.js", source, source.find('\'').unwrap());
        assert_eq!(location.line, 2);
        assert_eq!(location.column, 8);
        assert_eq!(location.line_text, "let é = 'x';");
    }

    #[test]
    fn test_collector_caps_errors() {
        let mut collector = ErrorCollector::default();
        for i in 0..(MAX_COLLECTED_ERRORS + 5) {
            collector.push(BuildError::Internal(format!("e{i}")));
        }
        let failure = collector.into_failure(Vec::new());
        assert_eq!(failure.errors.len(), MAX_COLLECTED_ERRORS);
        assert_eq!(failure.dropped_errors, 5);
        assert!(failure.render().ends_with("... and 5 more errors not shown\n"));
    }

    #[test]
    fn test_collected_errors_sorted_by_position() {
        let unresolved = |file: &str, line: u32, specifier: &str| BuildError::Unresolved {
            specifier: specifier.to_string(),
            importer: Some(file.to_string()),
            location: Some(Location {
                file: file.to_string(),
                line,
                column: 7,
                line_text: String::new(),
            }),
        };
        let mut collector = ErrorCollector::default();
        collector.push(unresolved("b.js", 1, "./x"));
        collector.push(unresolved("a.js", 2, "./y"));
        collector.push(BuildError::Aborted);
        collector.push(unresolved("a.js", 1, "./z"));
        let failure = collector.into_failure(Vec::new());
        let order: Vec<String> = failure.errors.iter().map(|error| error.to_string()).collect();
        assert_eq!(
            order,
            [
                "The build was aborted",
                "Could not resolve \"./z\" from \"a.js\"",
                "Could not resolve \"./y\" from \"a.js\"",
                "Could not resolve \"./x\" from \"b.js\"",
            ]
        );
    }

    #[test]
    fn test_capped_errors_do_not_depend_on_arrival_order() {
        let error = |i: usize| BuildError::Internal(format!("e{i:04}"));
        let mut forward = ErrorCollector::default();
        for i in 0..MAX_COLLECTED_ERRORS * 3 {
            forward.push(error(i));
        }
        let mut backward = ErrorCollector::default();
        for i in (0..MAX_COLLECTED_ERRORS * 3).rev() {
            backward.push(error(i));
        }
        let forward = forward.into_failure(Vec::new());
        let backward = backward.into_failure(Vec::new());
        assert_eq!(forward.dropped_errors, MAX_COLLECTED_ERRORS * 2);
        assert_eq!(forward.render(), backward.render());
        assert_eq!(forward.errors[0].to_string(), "Internal linker error: e0000");
    }

    #[test]
    fn test_failure_display() {
        let failure = BuildFailure::new(
            vec![BuildError::Aborted, BuildError::Internal("x".to_string())],
            Vec::new(),
        );
        assert_eq!(failure.to_string(), "Build failed with 2 errors");
    }
}
