//! JavaScript helper code that jslink injects into bundles.
//!
//! Helpers are emitted once per chunk that needs them, in the fixed order of
//! [`Helper::ALL`], after their transitive dependencies have been added. Keeping
//! the order fixed (instead of first-use order) keeps chunk bytes stable.

/// A single runtime helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Helper {
    Create,
    DefProp,
    GetOwnPropDesc,
    GetOwnPropNames,
    GetProtoOf,
    HasOwnProp,
    CommonJs,
    Export,
    CopyProps,
    ToEsm,
    ToCommonJs,
    ToBinary,
}

impl Helper {
    /// Every helper in emission order.
    pub const ALL: [Helper; 12] = [
        Helper::Create,
        Helper::DefProp,
        Helper::GetOwnPropDesc,
        Helper::GetOwnPropNames,
        Helper::GetProtoOf,
        Helper::HasOwnProp,
        Helper::CommonJs,
        Helper::Export,
        Helper::CopyProps,
        Helper::ToEsm,
        Helper::ToCommonJs,
        Helper::ToBinary,
    ];

    /// The top-level binding this helper declares.
    pub fn name(self) -> &'static str {
        match self {
            Helper::Create => "__create",
            Helper::DefProp => "__defProp",
            Helper::GetOwnPropDesc => "__getOwnPropDesc",
            Helper::GetOwnPropNames => "__getOwnPropNames",
            Helper::GetProtoOf => "__getProtoOf",
            Helper::HasOwnProp => "__hasOwnProp",
            Helper::CommonJs => "__commonJS",
            Helper::Export => "__export",
            Helper::CopyProps => "__copyProps",
            Helper::ToEsm => "__toESM",
            Helper::ToCommonJs => "__toCommonJS",
            Helper::ToBinary => "__toBinary",
        }
    }

    pub fn from_name(name: &str) -> Option<Helper> {
        Helper::ALL.into_iter().find(|helper| helper.name() == name)
    }

    /// Helpers referenced by this helper's source.
    pub fn dependencies(self) -> &'static [Helper] {
        match self {
            Helper::CommonJs => &[Helper::GetOwnPropNames],
            Helper::Export => &[Helper::DefProp],
            Helper::CopyProps => &[
                Helper::DefProp,
                Helper::GetOwnPropDesc,
                Helper::GetOwnPropNames,
                Helper::HasOwnProp,
            ],
            Helper::ToEsm => &[
                Helper::Create,
                Helper::DefProp,
                Helper::GetProtoOf,
                Helper::CopyProps,
            ],
            Helper::ToCommonJs => &[Helper::DefProp, Helper::CopyProps],
            _ => &[],
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Helper::Create => "var __create = Object.create;\n",
            Helper::DefProp => "var __defProp = Object.defineProperty;\n",
            Helper::GetOwnPropDesc => "var __getOwnPropDesc = Object.getOwnPropertyDescriptor;\n",
            Helper::GetOwnPropNames => "var __getOwnPropNames = Object.getOwnPropertyNames;\n",
            Helper::GetProtoOf => "var __getProtoOf = Object.getPrototypeOf;\n",
            Helper::HasOwnProp => "var __hasOwnProp = Object.prototype.hasOwnProperty;\n",
            Helper::CommonJs => COMMONJS,
            Helper::Export => EXPORT,
            Helper::CopyProps => COPY_PROPS,
            Helper::ToEsm => TO_ESM,
            Helper::ToCommonJs => TO_COMMONJS,
            Helper::ToBinary => TO_BINARY,
        }
    }
}

/// Expand `requested` with every transitive dependency, in emission order.
pub fn closure(requested: impl IntoIterator<Item = Helper>) -> Vec<Helper> {
    let mut needed = [false; Helper::ALL.len()];
    let mut stack: Vec<Helper> = requested.into_iter().collect();
    while let Some(helper) = stack.pop() {
        let slot = &mut needed[helper as usize];
        if *slot {
            continue;
        }
        *slot = true;
        stack.extend_from_slice(helper.dependencies());
    }
    Helper::ALL
        .into_iter()
        .filter(|helper| needed[*helper as usize])
        .collect()
}

/// Render the source of `requested` helpers and their dependencies.
pub fn render(requested: impl IntoIterator<Item = Helper>) -> String {
    closure(requested)
        .into_iter()
        .map(Helper::source)
        .collect()
}

const COMMONJS: &str = r#"var __commonJS = (cb, mod) => function __require() {
  return mod || (0, cb[__getOwnPropNames(cb)[0]])((mod = { exports: {} }).exports, mod), mod.exports;
};
"#;

const EXPORT: &str = r#"var __export = (target, all) => {
  for (var name in all)
    __defProp(target, name, { get: all[name], enumerable: true });
};
"#;

const COPY_PROPS: &str = r#"var __copyProps = (to, from, except, desc) => {
  if (from && typeof from === "object" || typeof from === "function") {
    for (let key of __getOwnPropNames(from))
      if (!__hasOwnProp.call(to, key) && key !== except)
        __defProp(to, key, { get: () => from[key], enumerable: !(desc = __getOwnPropDesc(from, key)) || desc.enumerable });
  }
  return to;
};
"#;

const TO_ESM: &str = r#"var __toESM = (mod, isNodeMode, target) => (target = mod != null ? __create(__getProtoOf(mod)) : {}, __copyProps(
  isNodeMode || !mod || !mod.__esModule ? __defProp(target, "default", { value: mod, enumerable: true }) : target,
  mod
));
"#;

const TO_COMMONJS: &str =
    "var __toCommonJS = (mod) => __copyProps(__defProp({}, \"__esModule\", { value: true }), mod);\n";

const TO_BINARY: &str = r#"var __toBinary = (base64) => {
  var bytes = typeof atob === "function" ? atob(base64) : Buffer.from(base64, "base64").toString("binary");
  var out = new Uint8Array(bytes.length);
  for (var i = 0; i < bytes.length; i++) out[i] = bytes.charCodeAt(i);
  return out;
};
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_pulls_dependencies_in_order() {
        let helpers = closure([Helper::ToEsm]);
        assert_eq!(
            helpers,
            vec![
                Helper::Create,
                Helper::DefProp,
                Helper::GetOwnPropDesc,
                Helper::GetOwnPropNames,
                Helper::GetProtoOf,
                Helper::HasOwnProp,
                Helper::CopyProps,
                Helper::ToEsm,
            ]
        );
    }

    #[test]
    fn test_closure_is_order_independent() {
        let a = closure([Helper::Export, Helper::CommonJs]);
        let b = closure([Helper::CommonJs, Helper::Export]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_declares_every_name_once() {
        let source = render([Helper::ToCommonJs, Helper::Export]);
        assert_eq!(source.matches("var __defProp =").count(), 1);
        assert!(source.contains("var __toCommonJS ="));
        assert!(source.contains("var __export ="));
        assert!(!source.contains("var __toESM ="));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Helper::from_name("__toBinary"), Some(Helper::ToBinary));
        assert_eq!(Helper::from_name("toBinary"), None);
    }
}
