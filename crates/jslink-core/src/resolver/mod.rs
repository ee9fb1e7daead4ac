//! Default file-system resolution, used once every plugin has declined.
//!
//! Relative and absolute specifiers probe the exact path, then each configured
//! extension, then `index.*` inside a directory. Bare specifiers walk
//! `node_modules` directories upwards and honour `package.json` main fields.

mod package_json;

pub use package_json::PackageJson;

use crate::fs::{normalize_path, FileSystem};
use crate::options::BuildOptions;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Path {
        path: PathBuf,
        /// From the nearest `package.json` declaring `sideEffects`.
        side_effects: Option<bool>,
    },
    External,
    NotFound,
}

#[derive(Debug)]
pub struct Resolver {
    fs: Arc<dyn FileSystem>,
    extensions: Vec<String>,
    main_fields: Vec<String>,
    external: Vec<String>,
    package_cache: Mutex<FxHashMap<PathBuf, Option<Arc<PackageJson>>>>,
}

impl Resolver {
    pub fn new(fs: Arc<dyn FileSystem>, options: &BuildOptions) -> Self {
        Self {
            fs,
            extensions: options.resolve_extensions.clone(),
            main_fields: options.main_fields.clone(),
            external: options.external.clone(),
            package_cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn resolve(&self, specifier: &str, resolve_dir: &Path) -> Resolution {
        if self
            .external
            .iter()
            .any(|pattern| crate::options::wildcard_match(pattern, specifier))
        {
            return Resolution::External;
        }

        let found = if is_path_specifier(specifier) {
            let path = normalize_path(&resolve_dir.join(specifier));
            self.load_as_file(&path).or_else(|| self.load_as_directory(&path))
        } else {
            self.load_node_module(specifier, resolve_dir)
        };

        match found {
            Some(path) => {
                trace!(specifier, path = %path.display(), "resolved");
                let side_effects = self.declared_side_effects(&path);
                Resolution::Path { path, side_effects }
            }
            None => Resolution::NotFound,
        }
    }

    fn load_as_file(&self, path: &Path) -> Option<PathBuf> {
        if self.fs.is_file(path) {
            return Some(path.to_path_buf());
        }
        let base = path.as_os_str().to_string_lossy();
        self.extensions
            .iter()
            .map(|ext| PathBuf::from(format!("{base}{ext}")))
            .find(|candidate| self.fs.is_file(candidate))
    }

    fn load_as_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !self.fs.is_dir(dir) {
            return None;
        }
        if let Some(pkg) = self.package_json(dir) {
            if let Some(entry) = pkg.main_entry(&self.main_fields) {
                let target = normalize_path(&dir.join(entry));
                if let Some(found) = self
                    .load_as_file(&target)
                    .or_else(|| self.load_index(&target))
                {
                    return Some(found);
                }
            }
        }
        self.load_index(dir)
    }

    fn load_index(&self, dir: &Path) -> Option<PathBuf> {
        self.extensions
            .iter()
            .map(|ext| dir.join(format!("index{ext}")))
            .find(|candidate| self.fs.is_file(candidate))
    }

    fn load_node_module(&self, specifier: &str, resolve_dir: &Path) -> Option<PathBuf> {
        let (name, subpath) = split_package_name(specifier);
        let mut dir = Some(normalize_path(resolve_dir));
        while let Some(current) = dir {
            let package_dir = current.join("node_modules").join(name);
            if self.fs.is_dir(&package_dir) {
                let found = if subpath.is_empty() {
                    self.load_as_directory(&package_dir)
                } else {
                    let target = package_dir.join(subpath);
                    self.load_as_file(&target)
                        .or_else(|| self.load_as_directory(&target))
                };
                if found.is_some() {
                    return found;
                }
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        None
    }

    fn package_json(&self, dir: &Path) -> Option<Arc<PackageJson>> {
        if let Some(cached) = self.package_cache.lock().get(dir) {
            return cached.clone();
        }
        let path = dir.join("package.json");
        let parsed = if self.fs.is_file(&path) {
            self.fs
                .read(&path)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .and_then(|text| match PackageJson::parse(dir.to_path_buf(), &text) {
                    Ok(pkg) => Some(Arc::new(pkg)),
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "ignoring malformed package.json");
                        None
                    }
                })
        } else {
            None
        };
        self.package_cache
            .lock()
            .insert(dir.to_path_buf(), parsed.clone());
        parsed
    }

    /// `sideEffects` of the nearest enclosing `package.json`.
    fn declared_side_effects(&self, file: &Path) -> Option<bool> {
        let mut dir = file.parent();
        while let Some(current) = dir {
            if let Some(pkg) = self.package_json(current) {
                return pkg.side_effects(file);
            }
            dir = current.parent();
        }
        None
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

/// `@scope/pkg/sub` -> (`@scope/pkg`, `sub`); `pkg/sub` -> (`pkg`, `sub`).
fn split_package_name(specifier: &str) -> (&str, &str) {
    let mut slashes = specifier.match_indices('/').map(|(i, _)| i);
    let split = if specifier.starts_with('@') {
        slashes.nth(1)
    } else {
        slashes.next()
    };
    match split {
        Some(i) => (&specifier[..i], &specifier[i + 1..]),
        None => (specifier, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn resolver(files: &[(&str, &str)]) -> Resolver {
        let fs = MemoryFileSystem::with_files(files.iter().copied());
        Resolver::new(
            Arc::new(fs),
            &BuildOptions {
                external: vec!["node:*".to_string()],
                ..BuildOptions::default()
            },
        )
    }

    fn path(resolution: Resolution) -> PathBuf {
        match resolution {
            Resolution::Path { path, .. } => path,
            other => panic!("expected a path, got {other:?}"),
        }
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let r = resolver(&[("/p/src/a.ts", ""), ("/p/src/b/index.js", "")]);
        assert_eq!(path(r.resolve("./a", Path::new("/p/src"))), PathBuf::from("/p/src/a.ts"));
        assert_eq!(
            path(r.resolve("../src/b", Path::new("/p/src"))),
            PathBuf::from("/p/src/b/index.js")
        );
        assert_eq!(r.resolve("./missing", Path::new("/p/src")), Resolution::NotFound);
    }

    #[test]
    fn test_node_modules_walk_and_main_fields() {
        let r = resolver(&[
            ("/p/node_modules/lib/package.json", r#"{"module": "esm/index.js", "main": "cjs.js"}"#),
            ("/p/node_modules/lib/esm/index.js", ""),
            ("/p/node_modules/lib/cjs.js", ""),
            ("/p/node_modules/@s/pkg/util.js", ""),
        ]);
        assert_eq!(
            path(r.resolve("lib", Path::new("/p/src/deep"))),
            PathBuf::from("/p/node_modules/lib/esm/index.js")
        );
        assert_eq!(
            path(r.resolve("@s/pkg/util", Path::new("/p"))),
            PathBuf::from("/p/node_modules/@s/pkg/util.js")
        );
    }

    #[test]
    fn test_externals_and_side_effects() {
        let r = resolver(&[
            ("/p/node_modules/pure/package.json", r#"{"main": "i.js", "sideEffects": false}"#),
            ("/p/node_modules/pure/i.js", ""),
        ]);
        assert_eq!(r.resolve("node:fs", Path::new("/p")), Resolution::External);
        assert_eq!(
            r.resolve("pure", Path::new("/p")),
            Resolution::Path {
                path: PathBuf::from("/p/node_modules/pure/i.js"),
                side_effects: Some(false),
            }
        );
    }

    #[test]
    fn test_split_package_name() {
        assert_eq!(split_package_name("react"), ("react", ""));
        assert_eq!(split_package_name("react/jsx-runtime"), ("react", "jsx-runtime"));
        assert_eq!(split_package_name("@s/pkg/a/b"), ("@s/pkg", "a/b"));
    }
}
