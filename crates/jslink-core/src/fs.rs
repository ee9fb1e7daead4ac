//! File system abstraction used by default resolution, loading and output writing.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait FileSystem: Send + Sync + std::fmt::Debug {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }
}

/// In-memory file system, keyed by normalized absolute-or-relative paths.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<FxHashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<Path>,
        C: Into<Vec<u8>>,
    {
        let fs = Self::new();
        for (path, contents) in files {
            fs.insert(path, contents);
        }
        fs
    }

    pub fn insert(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .insert(normalize_path(path.as_ref()), contents.into());
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.write().remove(&normalize_path(path.as_ref()))
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files
            .read()
            .get(&normalize_path(path.as_ref()))
            .cloned()
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.contents(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.read().contains_key(&normalize_path(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = normalize_path(path);
        self.files
            .read()
            .keys()
            .any(|file| file != &dir && file.starts_with(&dir))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.insert(path, contents.to_vec());
        Ok(())
    }
}

/// Normalize a path by resolving `.` and `..` components without filesystem access.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }
    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

/// Relative path from `from_dir` to `to`, using `/` separators.
///
/// Returns `None` when the two paths share no common prefix.
pub fn relative_path(from_dir: &Path, to: &Path) -> Option<String> {
    let from = normalize_path(from_dir);
    let to = normalize_path(to);
    let from_components: Vec<_> = from.components().filter(|c| *c != Component::CurDir).collect();
    let to_components: Vec<_> = to.components().filter(|c| *c != Component::CurDir).collect();

    let common_len = from_components
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common_len == 0 && from.has_root() != to.has_root() {
        return None;
    }

    let mut parts: Vec<String> = Vec::new();
    for _ in common_len..from_components.len() {
        parts.push("..".to_string());
    }
    for component in &to_components[common_len..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/project"), Path::new("/project/src/a.js")).as_deref(),
            Some("src/a.js")
        );
        assert_eq!(
            relative_path(Path::new("/project/out"), Path::new("/project/src/a.js")).as_deref(),
            Some("../src/a.js")
        );
        assert_eq!(
            relative_path(Path::new("."), Path::new("src/a.js")).as_deref(),
            Some("src/a.js")
        );
    }

    #[test]
    fn test_memory_fs_dirs() {
        let fs = MemoryFileSystem::with_files([("/p/src/a.js", "x"), ("/p/package.json", "{}")]);
        assert!(fs.is_file(Path::new("/p/src/./a.js")));
        assert!(fs.is_dir(Path::new("/p/src")));
        assert!(fs.is_dir(Path::new("/p")));
        assert!(!fs.is_dir(Path::new("/p/src/a.js")));
        assert!(!fs.is_file(Path::new("/p/src")));
        assert_eq!(fs.read(Path::new("/p/src/a.js")).unwrap(), b"x");
        assert!(fs.read(Path::new("/p/b.js")).is_err());
    }
}
