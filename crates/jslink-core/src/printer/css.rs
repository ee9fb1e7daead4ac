use crate::chunker::ChunkGraph;
use crate::graph::{ModuleGraph, RecordTarget};
use crate::ids::{ChunkIdx, ModuleIdx};
use indexmap::IndexMap;

/// Stylesheet output of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintedCss {
    pub code: String,
    /// Bytes of `code` produced by each module.
    pub module_bytes: IndexMap<ModuleIdx, usize>,
}

/// Concatenate the live stylesheets of a chunk in execution order.
///
/// `@import` rules of bundled files are dropped since their targets are
/// already part of the output; external ones stay in place.
pub fn print_css(graph: &ModuleGraph, chunks: &ChunkGraph, chunk: ChunkIdx) -> Option<PrintedCss> {
    let chunk = chunks.chunk(chunk);
    let live = chunks.live_set(chunk);
    let mut blocks = Vec::new();
    let mut module_bytes = IndexMap::new();
    for idx in &chunk.modules {
        let module = graph.module(*idx);
        if !module.is_css() || !live.is_module_live(*idx) {
            continue;
        }
        let mut spans: Vec<_> = module
            .ast
            .import_records
            .iter()
            .enumerate()
            .filter(|(i, _)| matches!(module.import_targets[*i], RecordTarget::Module(_)))
            .map(|(_, record)| record.span)
            .collect();
        spans.sort_by_key(|span| span.start);

        let mut body = String::with_capacity(module.source.len());
        let mut cursor = 0usize;
        for span in spans {
            body.push_str(&module.source[cursor..span.start as usize]);
            cursor = span.end as usize;
        }
        body.push_str(&module.source[cursor..]);
        let body = body.trim();

        let block = if body.is_empty() {
            format!("/* {} */\n", module.pretty_path)
        } else {
            format!("/* {} */\n{body}\n", module.pretty_path)
        };
        module_bytes.insert(*idx, block.len() - module.pretty_path.len() - 7);
        blocks.push(block);
    }
    if blocks.is_empty() {
        return None;
    }
    Some(PrintedCss {
        code: blocks.join("\n"),
        module_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::build_chunks;
    use crate::graph::test_support::link_files;
    use crate::options::BuildOptions;

    #[test]
    fn test_bundled_imports_are_inlined_in_order() {
        let graph = link_files(
            &[
                ("/p/in.js", "import './main.css';\n"),
                ("/p/main.css", "@import './reset.css';\n@import 'node:font.css';\nbody { color: red; }\n"),
                ("/p/reset.css", "* { margin: 0; }\n"),
            ],
            &["./in.js"],
        )
        .unwrap();
        let chunks = build_chunks(&graph, &BuildOptions::default());
        let css = print_css(&graph, &chunks, ChunkIdx::new(0)).unwrap();
        assert_eq!(
            css.code,
            "/* reset.css */\n* { margin: 0; }\n\n/* main.css */\n@import 'node:font.css';\nbody { color: red; }\n"
        );
        assert_eq!(css.module_bytes.len(), 2);
    }

    #[test]
    fn test_chunk_without_stylesheets() {
        let graph = link_files(&[("/p/in.js", "console.log(1);\n")], &["./in.js"]).unwrap();
        let chunks = build_chunks(&graph, &BuildOptions::default());
        assert_eq!(print_css(&graph, &chunks, ChunkIdx::new(0)), None);
    }
}
