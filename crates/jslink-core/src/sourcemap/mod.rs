//! Source map composition.
//!
//! The printer emits code strictly front to back, so mappings arrive in
//! generated order and are merged into per-line segment lists without any
//! searching. Segments are placed at the start of every verbatim run of
//! copied source and at every substituted name; columns inside a run map one
//! to one, which is what lets [`SourceMap::lookup`] recover exact positions.
//!
//! Lines and columns are zero-based. Columns count UTF-16 code units.

mod vlq;

use base64::Engine as _;
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceMapError {
    #[error("invalid base64 digit {0:?} in mappings")]
    InvalidBase64(char),
    #[error("mappings end in the middle of a value")]
    Truncated,
    #[error("mapping value does not fit in 64 bits")]
    Overflow,
    #[error("segment with {0} fields")]
    BadSegment(usize),
    #[error("segment refers to missing {0} {1}")]
    OutOfRange(&'static str, i64),
    #[error("invalid source map JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for SourceMapError {
    fn from(err: serde_json::Error) -> Self {
        SourceMapError::Json(err.to_string())
    }
}

/// A version 3 source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(default)]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

/// Where a generated position came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source: String,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

/// One decoded segment with absolute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub original: Option<OriginalPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: u32,
    pub line: u32,
    pub column: u32,
    pub name: Option<u32>,
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String, SourceMapError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SourceMapError> {
        Ok(serde_json::from_str(json)?)
    }

    /// `data:` URL for an inline `sourceMappingURL`.
    pub fn to_data_url(&self) -> Result<String, SourceMapError> {
        let json = self.to_json()?;
        Ok(format!(
            "data:application/json;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(json)
        ))
    }

    /// Decode `mappings` into absolute segments per generated line.
    pub fn decode(&self) -> Result<Vec<Vec<Segment>>, SourceMapError> {
        let input = self.mappings.as_bytes();
        let mut lines = vec![Vec::new()];
        let mut pos = 0;
        let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);
        let mut generated = 0i64;
        let mut fields = [0i64; 5];

        while pos < input.len() {
            match input[pos] {
                b';' => {
                    lines.push(Vec::new());
                    generated = 0;
                    pos += 1;
                    continue;
                }
                b',' => {
                    pos += 1;
                    continue;
                }
                _ => {}
            }
            let mut count = 0;
            while pos < input.len() && !matches!(input[pos], b',' | b';') {
                if count == fields.len() {
                    return Err(SourceMapError::BadSegment(count + 1));
                }
                fields[count] = vlq::decode(input, &mut pos)?;
                count += 1;
            }
            generated += fields[0];
            let original = match count {
                1 => None,
                4 | 5 => {
                    source += fields[1];
                    line += fields[2];
                    column += fields[3];
                    let segment_name = (count == 5).then(|| {
                        name += fields[4];
                        name
                    });
                    if source < 0 || source as usize >= self.sources.len() {
                        return Err(SourceMapError::OutOfRange("source", source));
                    }
                    if let Some(n) = segment_name {
                        if n < 0 || n as usize >= self.names.len() {
                            return Err(SourceMapError::OutOfRange("name", n));
                        }
                    }
                    Some(OriginalPosition {
                        source: source as u32,
                        line: line as u32,
                        column: column as u32,
                        name: segment_name.map(|n| n as u32),
                    })
                }
                n => return Err(SourceMapError::BadSegment(n)),
            };
            if let Some(segments) = lines.last_mut() {
                segments.push(Segment {
                    generated_column: generated as u32,
                    original,
                });
            }
        }
        Ok(lines)
    }

    /// Original position of a generated position. Inside a copied run the
    /// column offset from the run start carries over; a substituted name
    /// maps to the original name's start.
    pub fn lookup(&self, line: u32, column: u32) -> Option<OriginalLocation> {
        let lines = self.decode().ok()?;
        let segments = lines.get(line as usize)?;
        let index = segments.partition_point(|segment| segment.generated_column <= column);
        let segment = segments.get(index.checked_sub(1)?)?;
        let original = segment.original?;
        let column = match original.name {
            Some(_) => original.column,
            None => original.column + (column - segment.generated_column),
        };
        Some(OriginalLocation {
            source: self.sources[original.source as usize].clone(),
            line: original.line,
            column,
            name: original.name.map(|n| self.names[n as usize].clone()),
        })
    }
}

/// Byte offsets to line/column positions for one source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i as u32 + 1),
        );
        Self { line_starts }
    }

    /// Zero-based line and UTF-16 column of byte `offset`.
    pub fn position(&self, source: &str, offset: u32) -> (u32, u32) {
        let line = self.line_starts.partition_point(|start| *start <= offset) - 1;
        let start = self.line_starts[line] as usize;
        let column = source
            .get(start..offset as usize)
            .map_or(0, |text| text.encode_utf16().count());
        (line as u32, column as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawSegment {
    column: u32,
    original: Option<OriginalPosition>,
}

/// Accumulates mappings in generated order.
#[derive(Debug, Clone, Default)]
pub struct SourceMapBuilder {
    file: Option<String>,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    source_ids: FxHashMap<String, u32>,
    names: IndexSet<String>,
    lines: Vec<Vec<RawSegment>>,
}

impl SourceMapBuilder {
    pub fn new(file: Option<&str>) -> Self {
        Self {
            file: file.map(str::to_string),
            ..Self::default()
        }
    }

    /// Register a source, returning its index. Registering twice is a no-op.
    pub fn add_source(&mut self, path: &str, content: Option<&str>) -> u32 {
        if let Some(id) = self.source_ids.get(path) {
            return *id;
        }
        let id = self.sources.len() as u32;
        self.sources.push(path.to_string());
        self.sources_content.push(content.map(str::to_string));
        self.source_ids.insert(path.to_string(), id);
        id
    }

    /// Map a generated position to an original one, or mark it as generated
    /// code with `original = None`. Positions must not go backwards.
    pub fn add_mapping(
        &mut self,
        line: u32,
        column: u32,
        original: Option<(u32, u32, u32)>,
        name: Option<&str>,
    ) {
        let original = original.map(|(source, line, column)| OriginalPosition {
            source,
            line,
            column,
            name: name.map(|n| self.names.insert_full(n.to_string()).0 as u32),
        });
        if self.lines.len() <= line as usize {
            self.lines.resize_with(line as usize + 1, Vec::new);
        }
        let segments = &mut self.lines[line as usize];
        match segments.last_mut() {
            Some(last) if last.column == column => last.original = original,
            // Consecutive generated runs collapse into one.
            Some(last) if last.original.is_none() && original.is_none() => {}
            _ => segments.push(RawSegment { column, original }),
        }
    }

    /// Shift everything down by `count` generated lines.
    pub fn prepend_lines(&mut self, count: u32) {
        if count > 0 && !self.lines.is_empty() {
            self.lines
                .splice(0..0, std::iter::repeat_with(Vec::new).take(count as usize));
        }
    }

    pub fn build(self) -> SourceMap {
        let mut mappings = String::new();
        let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);
        for (i, segments) in self.lines.iter().enumerate() {
            if i > 0 {
                mappings.push(';');
            }
            let mut generated = 0i64;
            for (j, segment) in segments.iter().enumerate() {
                if j > 0 {
                    mappings.push(',');
                }
                vlq::encode(segment.column as i64 - generated, &mut mappings);
                generated = segment.column as i64;
                if let Some(original) = segment.original {
                    vlq::encode(original.source as i64 - source, &mut mappings);
                    vlq::encode(original.line as i64 - line, &mut mappings);
                    vlq::encode(original.column as i64 - column, &mut mappings);
                    source = original.source as i64;
                    line = original.line as i64;
                    column = original.column as i64;
                    if let Some(n) = original.name {
                        vlq::encode(n as i64 - name, &mut mappings);
                        name = n as i64;
                    }
                }
            }
        }
        SourceMap {
            version: 3,
            file: self.file,
            sources: self.sources,
            sources_content: self.sources_content,
            names: self.names.into_iter().collect(),
            mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_encodes_relative_fields() {
        let mut builder = SourceMapBuilder::new(Some("out.js"));
        let a = builder.add_source("a.js", Some("let x = 1;\n"));
        builder.add_mapping(0, 0, Some((a, 0, 0)), None);
        builder.add_mapping(0, 4, Some((a, 0, 4)), Some("x"));
        builder.add_mapping(0, 6, Some((a, 0, 5)), None);
        builder.add_mapping(1, 0, None, None);
        let map = builder.build();
        assert_eq!(map.mappings, "AAAA,IAAIA,EAAC;A");
        assert_eq!(map.names, vec!["x"]);
        assert_eq!(
            map.to_json().unwrap(),
            r#"{"version":3,"file":"out.js","sources":["a.js"],"sourcesContent":["let x = 1;\n"],"names":["x"],"mappings":"AAAA,IAAIA,EAAC;A"}"#
        );
    }

    #[test]
    fn test_lookup_inside_runs_and_names() {
        let mut builder = SourceMapBuilder::new(None);
        let a = builder.add_source("a.js", None);
        // `var x2 = y;` printed from `var x = y;`
        builder.add_mapping(0, 0, Some((a, 3, 2)), None);
        builder.add_mapping(0, 4, Some((a, 3, 6)), Some("x"));
        builder.add_mapping(0, 6, Some((a, 3, 7)), None);
        let map = builder.build();

        let at = |column| map.lookup(0, column).map(|loc| (loc.line, loc.column, loc.name));
        assert_eq!(at(0), Some((3, 2, None)));
        assert_eq!(at(2), Some((3, 4, None)));
        assert_eq!(at(5), Some((3, 6, Some("x".to_string()))));
        assert_eq!(at(9), Some((3, 10, None)));
        assert_eq!(map.lookup(4, 0), None);
    }

    #[test]
    fn test_generated_code_is_unmapped() {
        let mut builder = SourceMapBuilder::new(None);
        let a = builder.add_source("a.js", None);
        builder.add_mapping(0, 0, None, None);
        builder.add_mapping(0, 3, None, None);
        builder.add_mapping(0, 8, Some((a, 0, 0)), None);
        let map = builder.build();
        assert_eq!(map.mappings, "A,QAAA");
        assert_eq!(map.lookup(0, 5), None);
        assert_eq!(map.lookup(0, 8).map(|loc| loc.source), Some("a.js".to_string()));
    }

    #[test]
    fn test_prepend_lines_shifts_mappings() {
        let mut builder = SourceMapBuilder::new(None);
        let a = builder.add_source("a.js", None);
        builder.add_mapping(0, 0, Some((a, 1, 0)), None);
        builder.prepend_lines(2);
        let map = builder.build();
        assert_eq!(map.mappings, ";;AACA");
        assert_eq!(map.lookup(2, 0).map(|loc| loc.line), Some(1));
    }

    #[test]
    fn test_line_index_counts_utf16() {
        let source = "a\n\u{1F600}b = 1;\n";
        let index = LineIndex::new(source);
        assert_eq!(index.position(source, 0), (0, 0));
        let b = source.find('b').unwrap() as u32;
        assert_eq!(index.position(source, b), (1, 2));
        assert_eq!(index.position(source, source.len() as u32), (2, 0));
    }

    #[test]
    fn test_decode_rejects_bad_mappings() {
        let map = SourceMap {
            version: 3,
            file: None,
            sources: vec!["a.js".into()],
            sources_content: vec![],
            names: vec![],
            mappings: "AA".into(),
        };
        assert_eq!(map.decode(), Err(SourceMapError::BadSegment(2)));
        let map = SourceMap {
            mappings: "ACAA".into(),
            ..map
        };
        assert_eq!(map.decode(), Err(SourceMapError::OutOfRange("source", 1)));
    }

    #[test]
    fn test_data_url_round_trips() {
        let mut builder = SourceMapBuilder::new(None);
        builder.add_source("a.js", None);
        let map = builder.build();
        let url = map.to_data_url().unwrap();
        let encoded = url.strip_prefix("data:application/json;base64,").unwrap();
        let json = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(SourceMap::from_json(std::str::from_utf8(&json).unwrap()).unwrap(), map);
    }
}
