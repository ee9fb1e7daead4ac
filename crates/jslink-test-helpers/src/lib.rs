//! Fixtures shared by the jslink test suites.

pub mod bundle;
pub mod js_executor;

pub use bundle::{bundle, bundle_files, bundle_single, virtual_plugin, CountingParser};
pub use js_executor::JsExecutor;
