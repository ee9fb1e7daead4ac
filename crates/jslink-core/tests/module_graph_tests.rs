//! Module graph behavior observed through bundled output: re-export chains,
//! namespace imports, execution order and non-script loaders.

use jslink_core::BuildError;
use jslink_test_helpers::{bundle, bundle_single};

#[test]
fn test_re_export_chain_binds_to_declaration() {
    let code = bundle_single(&[
        ("/p/in.js", "import { value } from './index.js';\nconsole.log(value);\n"),
        ("/p/index.js", "export * from './middle.js';\n"),
        ("/p/middle.js", "export { inner as value } from './inner.js';\n"),
        ("/p/inner.js", "export const inner = 'deep';\n"),
    ])
    .unwrap();
    assert!(code.contains("// inner.js\nconst inner = 'deep';\n"));
    assert!(code.contains("console.log(inner);"));
    // Pure re-export modules contribute no code.
    assert!(!code.contains("// index.js"));
    assert!(!code.contains("// middle.js"));
}

#[test]
fn test_namespace_import_builds_export_object() {
    let code = bundle_single(&[
        ("/p/in.js", "import * as math from './math.js';\nconsole.log(math);\n"),
        ("/p/math.js", "export const one = 1;\nexport function two() { return 2; }\n"),
    ])
    .unwrap();
    assert!(code.contains("var math_exports = {};\n__export(math_exports, {\n  one: () => one,\n  two: () => two\n});\n"));
    assert!(code.contains("console.log(math_exports);"));
    assert!(code.starts_with("var __defProp"));
}

#[test]
fn test_namespace_member_access_uses_binding() {
    let code = bundle_single(&[
        ("/p/in.js", "import * as math from './math.js';\nconsole.log(math.one);\n"),
        ("/p/math.js", "export const one = 1;\n"),
    ])
    .unwrap();
    assert!(code.contains("const one = 1;"));
}

#[test]
fn test_dependencies_execute_first() {
    let code = bundle_single(&[
        ("/p/in.js", "import './a.js';\nimport './b.js';\nconsole.log('in');\n"),
        ("/p/a.js", "import './c.js';\nconsole.log('a');\n"),
        ("/p/b.js", "import './c.js';\nconsole.log('b');\n"),
        ("/p/c.js", "console.log('c');\n"),
    ])
    .unwrap();
    let order: Vec<usize> = ["// c.js", "// a.js", "// b.js", "// in.js"]
        .iter()
        .map(|comment| code.find(comment).unwrap())
        .collect();
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(code.matches("console.log('c');").count(), 1);
}

#[test]
fn test_json_named_and_default_imports() {
    let code = bundle_single(&[
        ("/p/in.js", "import config, { port } from './config.json';\nconsole.log(config.host, port);\n"),
        ("/p/config.json", r#"{"host": "localhost", "port": 8080}"#),
    ])
    .unwrap();
    assert!(code.contains("// config.json\n"));
    assert!(code.contains("8080"));
    assert!(code.contains("\"localhost\""));
}

#[test]
fn test_text_import_is_a_default_string() {
    let code = bundle_single(&[
        ("/p/in.js", "import notes from './notes.txt';\nconsole.log(notes);\n"),
        ("/p/notes.txt", "line one\nline two\n"),
    ])
    .unwrap();
    assert!(code.contains("\"line one\\nline two\\n\""));
}

#[test]
fn test_typescript_type_only_statements_are_elided() {
    let code = bundle_single(&[
        ("/p/in.js", "import { area } from './shape.ts';\nconsole.log(area);\n"),
        (
            "/p/shape.ts",
            "export interface Shape { w: number; h: number }\nexport type Area = number;\nexport const area = 6;\n",
        ),
    ])
    .unwrap();
    assert!(code.contains("const area = 6;"));
    assert!(!code.contains("interface"));
    assert!(!code.contains("type Area"));
}

#[test]
fn test_unresolved_entry_is_reported() {
    let failure = bundle(&[("/p/in.js", "")], &["./nope.js"]).unwrap_err();
    assert!(matches!(
        failure.errors.as_slice(),
        [BuildError::Unresolved { specifier, .. }] if specifier == "./nope.js"
    ));
}
