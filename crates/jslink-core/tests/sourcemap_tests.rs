use jslink_core::sourcemap::SourceMap;
use jslink_core::{BuildResult, SourceMapMode};
use jslink_test_helpers::bundle_files;

fn build(files: &[(&str, &str)], mode: SourceMapMode) -> BuildResult {
    bundle_files(files, &["./in.js"], |options| options.sourcemap = mode).unwrap()
}

fn linked_map(result: &BuildResult) -> SourceMap {
    SourceMap::from_json(result.output("out/in.js.map").unwrap().text()).unwrap()
}

/// Generated (line, column) of the first occurrence of `needle`.
fn position_of(code: &str, needle: &str) -> (u32, u32) {
    let offset = code.find(needle).unwrap();
    let line = code[..offset].matches('\n').count() as u32;
    let line_start = code[..offset].rfind('\n').map_or(0, |i| i + 1);
    (line, code[line_start..offset].encode_utf16().count() as u32)
}

#[test]
fn test_positions_map_back_to_each_module() {
    let files = [
        ("/p/in.js", "import { value } from './dep.js';\n\nconsole.log(value);\n"),
        ("/p/dep.js", "// leading comment\nexport const value = 42;\n"),
    ];
    let result = build(&files, SourceMapMode::Linked);
    let code = result.output("out/in.js").unwrap().text();
    assert!(code.ends_with("//# sourceMappingURL=in.js.map\n"));
    let map = linked_map(&result);
    assert_eq!(map.sources, ["dep.js", "in.js"]);
    assert_eq!(
        map.sources_content,
        [Some(files[1].1.to_string()), Some(files[0].1.to_string())]
    );

    let (line, column) = position_of(code, "42");
    let original = map.lookup(line, column).unwrap();
    assert_eq!((original.source.as_str(), original.line, original.column), ("dep.js", 1, 21));

    let (line, column) = position_of(code, "console");
    let original = map.lookup(line, column + 8).unwrap();
    assert_eq!((original.source.as_str(), original.line, original.column), ("in.js", 2, 8));

    // The module comment is generated.
    let (line, column) = position_of(code, "// in.js");
    assert_eq!(map.lookup(line, column), None);
}

#[test]
fn test_renamed_identifier_keeps_original_name() {
    let result = build(
        &[
            ("/p/in.js", "import { x as fromDep } from './dep.js';\nconst x = fromDep * 2;\nconsole.log(x);\n"),
            ("/p/dep.js", "export const x = 1;\n"),
        ],
        SourceMapMode::External,
    );
    let code = result.output("out/in.js").unwrap().text();
    assert!(!code.contains("sourceMappingURL"));
    let map = linked_map(&result);

    let (line, column) = position_of(code, "x2 = x * 2");
    let original = map.lookup(line, column).unwrap();
    assert_eq!(original.source, "in.js");
    assert_eq!((original.line, original.column), (1, 6));
    assert_eq!(original.name.as_deref(), Some("x"));

    let original = map.lookup(line, column + 5).unwrap();
    assert_eq!((original.line, original.column), (1, 10));
    assert_eq!(original.name.as_deref(), Some("fromDep"));
}

#[test]
fn test_inline_map_has_no_separate_file() {
    let result = build(&[("/p/in.js", "console.log('é', 1);\n")], SourceMapMode::Inline);
    assert_eq!(result.output_files.len(), 1);
    let code = result.output_files[0].text();
    assert!(code.contains("//# sourceMappingURL=data:application/json;base64,"));
}

#[test]
fn test_helpers_shift_mappings() {
    let result = build(
        &[
            ("/p/in.js", "const lib = require('./lib.cjs');\nconsole.log(lib);\n"),
            ("/p/lib.cjs", "module.exports = 1;\n"),
        ],
        SourceMapMode::Linked,
    );
    let code = result.output("out/in.js").unwrap().text();
    let map = linked_map(&result);
    let (line, column) = position_of(code, "console.log(lib)");
    let original = map.lookup(line, column).unwrap();
    assert_eq!((original.source.as_str(), original.line, original.column), ("in.js", 1, 0));
}

mod lookup {
    use jslink_core::sourcemap::SourceMapBuilder;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    type Mapping = (u32, u32, Option<&'static str>);

    fn mappings_strategy() -> impl Strategy<Value = BTreeMap<(u32, u32), Mapping>> {
        let original = (0u32..2, 0u32..50, 0u32..200, prop::option::of(prop_oneof![Just("a"), Just("b")]))
            .prop_map(|(source, line, column, name)| ((source, line), column, name));
        proptest::collection::btree_map((0u32..8, 0u32..120), original, 1..40).prop_map(|map| {
            map.into_iter()
                .map(|(generated, ((source, line), column, name))| {
                    (generated, (source * 1000 + line, column, name))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_lookup_returns_recorded_positions(mappings in mappings_strategy()) {
            let mut builder = SourceMapBuilder::new(Some("out.js"));
            builder.add_source("zero.js", None);
            builder.add_source("one.js", None);
            for ((line, column), (packed, original_column, name)) in &mappings {
                builder.add_mapping(*line, *column, Some((packed / 1000, packed % 1000, *original_column)), *name);
            }
            let map = builder.build();
            let map = jslink_core::sourcemap::SourceMap::from_json(&map.to_json().unwrap()).unwrap();

            for ((line, column), (packed, original_column, name)) in &mappings {
                let found = map.lookup(*line, *column).unwrap();
                let source = if packed / 1000 == 0 { "zero.js" } else { "one.js" };
                prop_assert_eq!(found.source.as_str(), source);
                prop_assert_eq!(found.line, packed % 1000);
                prop_assert_eq!(found.column, *original_column);
                prop_assert_eq!(found.name.as_deref(), *name);
            }
        }
    }
}
