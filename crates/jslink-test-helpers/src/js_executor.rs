//! JavaScript execution helpers for testing bundled output
//!
//! Bundles are run with a `node` binary from `PATH`. Suites call
//! [`JsExecutor::detect`] and skip evaluation when no runtime is installed,
//! so the text-level assertions still run everywhere.

use jslink_core::OutputFile;
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Executor for running bundled chunks in tests
pub struct JsExecutor {
    node: String,
}

impl JsExecutor {
    /// Find a usable `node` binary.
    ///
    /// # Returns
    ///
    /// `None` when `node --version` cannot be run
    pub fn detect() -> Option<Self> {
        let node = std::env::var("JSLINK_NODE").unwrap_or_else(|_| "node".to_string());
        let ok = Command::new(&node)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        ok.then_some(Self { node })
    }

    /// Runs a script and returns its standard output.
    ///
    /// # Errors
    ///
    /// Returns the standard error text if the process fails
    pub fn run_script(&self, code: &str) -> Result<String, String> {
        self.run(code, "cjs")
    }

    /// Imports an ES module chunk and prints `JSON.stringify` of its `default`
    /// export.
    ///
    /// # Errors
    ///
    /// Returns an error if the module fails to evaluate
    pub fn default_export(&self, code: &str) -> Result<String, String> {
        let dir = tempfile::tempdir().map_err(|e| format!("temp dir: {e}"))?;
        let module = dir.path().join("bundle.mjs");
        std::fs::write(&module, code).map_err(|e| format!("write bundle: {e}"))?;
        let driver = format!(
            "import({}).then((m) => console.log(JSON.stringify(m.default)));",
            js_string(&module)
        );
        self.run(&driver, "mjs").map(|out| out.trim_end().to_string())
    }

    /// Writes `files` into a temporary directory and runs `entry` from it.
    ///
    /// # Errors
    ///
    /// Returns the standard error text if the process fails
    pub fn run_files(&self, files: &[(&str, &str)], entry: &str) -> Result<String, String> {
        let dir = tempfile::tempdir().map_err(|e| format!("temp dir: {e}"))?;
        for (path, contents) in files {
            let path = dir.path().join(path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| format!("mkdir: {e}"))?;
            }
            std::fs::write(&path, contents).map_err(|e| format!("write {}: {e}", path.display()))?;
        }
        let output = Command::new(&self.node)
            .arg(dir.path().join(entry))
            .output()
            .map_err(|e| format!("spawn node: {e}"))?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).into_owned());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Writes the outputs of a split ESM build side by side and runs the one
    /// named `entry`.
    ///
    /// # Errors
    ///
    /// Returns the standard error text if the process fails
    pub fn run_chunks(&self, outputs: &[OutputFile], entry: &str) -> Result<String, String> {
        let mut files: Vec<(String, &str)> = vec![("package.json".to_string(), r#"{"type":"module"}"#)];
        for output in outputs {
            let name = output
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| format!("output without a file name: {}", output.path.display()))?;
            files.push((name, output.text()));
        }
        let files: Vec<(&str, &str)> = files.iter().map(|(name, code)| (name.as_str(), *code)).collect();
        self.run_files(&files, entry)
    }

    fn run(&self, code: &str, extension: &str) -> Result<String, String> {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .map_err(|e| format!("temp file: {e}"))?;
        file.write_all(code.as_bytes())
            .map_err(|e| format!("write script: {e}"))?;
        let output = Command::new(&self.node)
            .arg(file.path())
            .output()
            .map_err(|e| format!("spawn node: {e}"))?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).into_owned());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn js_string(path: &Path) -> String {
    let url = format!("file://{}", path.display()).replace('\\', "/");
    format!("\"{}\"", url.replace('"', "\\\""))
}
