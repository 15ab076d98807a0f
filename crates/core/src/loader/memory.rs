use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{assemble, ListedModule, ListedPackage, Locator, Package, PackageLoader};
use crate::error::{DeepcoverError, DeepcoverResult};

/// Loader over in-memory Go sources.
///
/// Every registered package is part of the dependency closure of every load;
/// the locator's pattern picks the root packages (exact import path, or a
/// `prefix/...` wildcard). Sources live under the virtual directory
/// `/memory/<import path>`.
#[derive(Default)]
pub struct MemoryLoader {
    packages: Vec<ListedPackage>,
    files: HashMap<PathBuf, String>,
    failing: HashSet<String>,
    module_queries: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package of `module` (or outside any module when `None`).
    pub fn package(mut self, module: Option<&str>, import_path: &str, files: &[(&str, &str)]) -> Self {
        let name = import_path.rsplit('/').next().unwrap_or(import_path).to_string();
        let dir = Self::dir_of(import_path);
        let go_files = self.add_files(&dir, files);
        self.packages.push(ListedPackage {
            dir,
            import_path: import_path.to_string(),
            name,
            go_files,
            module: module.map(|m| ListedModule { path: m.to_string() }),
            ..Default::default()
        });
        self
    }

    /// Register a standard-library package; it has no sources and no module.
    pub fn standard(mut self, import_path: &str) -> Self {
        self.packages.push(ListedPackage {
            dir: Self::dir_of(import_path),
            import_path: import_path.to_string(),
            name: import_path.rsplit('/').next().unwrap_or(import_path).to_string(),
            standard: true,
            ..Default::default()
        });
        self
    }

    /// In-package `_test.go` files of an already registered package.
    pub fn test_files(mut self, import_path: &str, files: &[(&str, &str)]) -> Self {
        let dir = Self::dir_of(import_path);
        let names = self.add_files(&dir, files);
        if let Some(pkg) = self.packages.iter_mut().find(|p| p.import_path == import_path) {
            pkg.test_go_files.extend(names);
        }
        self
    }

    /// External test files (`package foo_test`) of an already registered package.
    pub fn xtest_files(mut self, import_path: &str, files: &[(&str, &str)]) -> Self {
        let dir = Self::dir_of(import_path);
        let names = self.add_files(&dir, files);
        if let Some(pkg) = self.packages.iter_mut().find(|p| p.import_path == import_path) {
            pkg.x_test_go_files.extend(names);
        }
        self
    }

    /// Attach a load diagnostic to a registered package.
    pub fn package_error(mut self, import_path: &str, message: &str) -> Self {
        if let Some(pkg) = self.packages.iter_mut().find(|p| p.import_path == import_path) {
            pkg.error = Some(super::ListedError { pos: String::new(), err: message.to_string() });
        }
        self
    }

    /// Make module queries for `import_path` fail.
    pub fn failing_module_query(mut self, import_path: &str) -> Self {
        self.failing.insert(import_path.to_string());
        self
    }

    /// Number of `module_of` calls served so far.
    pub fn module_queries(&self) -> usize {
        self.module_queries.load(Ordering::SeqCst)
    }

    fn dir_of(import_path: &str) -> PathBuf {
        Path::new("/memory").join(import_path)
    }

    fn add_files(&mut self, dir: &Path, files: &[(&str, &str)]) -> Vec<String> {
        files
            .iter()
            .map(|(name, source)| {
                self.files.insert(dir.join(name), source.to_string());
                name.to_string()
            })
            .collect()
    }

    fn find(&self, import_path: &str) -> Option<&ListedPackage> {
        self.packages.iter().find(|p| p.import_path == import_path)
    }
}

fn matches_pattern(pattern: &str, import_path: &str) -> bool {
    match pattern.strip_suffix("/...") {
        Some(prefix) => {
            import_path == prefix
                || import_path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
        }
        None => pattern == import_path,
    }
}

impl PackageLoader for MemoryLoader {
    fn load(&self, locator: &Locator) -> DeepcoverResult<Vec<Package>> {
        if !self.packages.iter().any(|p| matches_pattern(&locator.pattern, &p.import_path)) {
            return Ok(Vec::new());
        }
        let listed: Vec<ListedPackage> = self
            .packages
            .iter()
            .map(|p| ListedPackage {
                dep_only: !matches_pattern(&locator.pattern, &p.import_path),
                ..p.clone()
            })
            .collect();
        assemble(listed, |path: &Path| {
            self.files.get(path).cloned().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no source {}", path.display()))
            })
        })
    }

    fn module_of(&self, _locator: &Locator, package: &str) -> DeepcoverResult<Option<String>> {
        self.module_queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(package) {
            return Err(DeepcoverError::Loader(format!("module query for {package} failed")));
        }
        let found = self
            .find(package)
            .or_else(|| package.strip_suffix("_test").and_then(|base| self.find(base)));
        Ok(found.and_then(|p| p.module_path().map(str::to_string)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_patterns_match_subpackages_only_on_path_boundaries() {
        assert!(matches_pattern("example.com/m/...", "example.com/m"));
        assert!(matches_pattern("example.com/m/...", "example.com/m/sub"));
        assert!(!matches_pattern("example.com/m/...", "example.com/mod"));
        assert!(matches_pattern("example.com/m", "example.com/m"));
        assert!(!matches_pattern("example.com/m", "example.com/m/sub"));
    }

    #[test]
    fn unmatched_pattern_loads_nothing() {
        let loader = MemoryLoader::new().package(Some("example.com/m"), "example.com/m", &[(
            "a.go",
            "package m\n",
        )]);
        let pkgs = loader.load(&Locator::import_path("example.com/other")).unwrap();
        assert!(pkgs.is_empty());
    }

    #[test]
    fn module_queries_are_counted() {
        let loader = MemoryLoader::new().standard("fmt");
        assert_eq!(loader.module_of(&Locator::import_path("."), "fmt").unwrap(), None);
        assert_eq!(loader.module_queries(), 1);
    }
}
