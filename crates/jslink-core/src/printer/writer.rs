use crate::sourcemap::{LineIndex, SourceMap, SourceMapBuilder};

/// Original text the writer is copying from, for mappings.
#[derive(Clone, Copy)]
pub struct SourceRef<'a> {
    pub id: u32,
    pub text: &'a str,
    pub lines: &'a LineIndex,
}

impl SourceRef<'_> {
    fn position(&self, offset: u32) -> (u32, u32, u32) {
        let (line, column) = self.lines.position(self.text, offset);
        (self.id, line, column)
    }
}

/// Output buffer that tracks the generated position and feeds the source
/// map as text is appended.
pub struct CodeWriter {
    output: String,
    line: u32,
    column: u32,
    source_map: Option<SourceMapBuilder>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            line: 0,
            column: 0,
            source_map: None,
        }
    }

    pub fn with_source_map(mut self, file: &str) -> Self {
        self.source_map = Some(SourceMapBuilder::new(Some(file)));
        self
    }

    pub fn has_source_map(&self) -> bool {
        self.source_map.is_some()
    }

    pub fn add_source(&mut self, path: &str, content: &str) -> u32 {
        self.source_map
            .as_mut()
            .map_or(0, |map| map.add_source(path, Some(content)))
    }

    /// Append generated text that has no original position.
    pub fn write(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(map) = &mut self.source_map {
            map.add_mapping(self.line, self.column, None, None);
        }
        self.advance(s);
    }

    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.write("\n");
    }

    /// Copy `source.text[start..end]` verbatim, mapping every line of it.
    pub fn copy(&mut self, source: SourceRef<'_>, start: u32, end: u32) {
        let Some(text) = source.text.get(start as usize..end as usize) else {
            return;
        };
        if text.is_empty() {
            return;
        }
        if self.source_map.is_none() {
            self.advance(text);
            return;
        }
        let mut offset = start;
        for piece in text.split_inclusive('\n') {
            if let Some(map) = &mut self.source_map {
                map.add_mapping(self.line, self.column, Some(source.position(offset)), None);
            }
            self.advance(piece);
            offset += piece.len() as u32;
        }
    }

    /// Append `replacement` in place of the identifier at `offset`.
    pub fn substitute(&mut self, source: SourceRef<'_>, offset: u32, original_name: &str, replacement: &str) {
        if let Some(map) = &mut self.source_map {
            map.add_mapping(
                self.line,
                self.column,
                Some(source.position(offset)),
                Some(original_name),
            );
        }
        self.advance(replacement);
    }

    fn advance(&mut self, s: &str) {
        self.output.push_str(s);
        for piece in s.split_inclusive('\n') {
            if piece.ends_with('\n') {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += piece.encode_utf16().count() as u32;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn ends_with_newline(&self) -> bool {
        self.output.is_empty() || self.output.ends_with('\n')
    }

    /// The text and map, with `prefix` placed in front of both.
    pub fn finish(self, prefix: &str) -> (String, Option<SourceMap>) {
        let lines = prefix.matches('\n').count() as u32;
        let map = self.source_map.map(|mut map| {
            map.prepend_lines(lines);
            map.build()
        });
        let mut code = String::with_capacity(prefix.len() + self.output.len());
        code.push_str(prefix);
        code.push_str(&self.output);
        (code, map)
    }
}

impl Default for CodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_maps_each_line() {
        let text = "let a = 1;\nlet b = 2;\n";
        let lines = LineIndex::new(text);
        let mut writer = CodeWriter::new().with_source_map("out.js");
        let id = writer.add_source("a.js", text);
        let source = SourceRef { id, text, lines: &lines };
        writer.writeln("// a.js");
        writer.copy(source, 0, text.len() as u32);
        let (code, map) = writer.finish("");
        assert_eq!(code, "// a.js\nlet a = 1;\nlet b = 2;\n");
        let map = map.unwrap();
        assert_eq!(map.lookup(0, 3), None);
        assert_eq!(map.lookup(2, 4).map(|loc| (loc.line, loc.column)), Some((1, 4)));
    }

    #[test]
    fn test_substitution_and_prefix() {
        let text = "x + 1";
        let lines = LineIndex::new(text);
        let mut writer = CodeWriter::new().with_source_map("out.js");
        let id = writer.add_source("a.js", text);
        let source = SourceRef { id, text, lines: &lines };
        writer.substitute(source, 0, "x", "x2");
        writer.copy(source, 1, 5);
        let (code, map) = writer.finish("var helper;\n");
        assert_eq!(code, "var helper;\nx2 + 1");
        let map = map.unwrap();
        let loc = map.lookup(1, 1).unwrap();
        assert_eq!((loc.column, loc.name.as_deref()), (0, Some("x")));
        assert_eq!(map.lookup(1, 5).map(|loc| loc.column), Some(4));
    }
}
