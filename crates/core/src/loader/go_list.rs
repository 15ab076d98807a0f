use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{assemble, ListedPackage, Locator, Package, PackageLoader};
use crate::error::{DeepcoverError, DeepcoverResult};
use crate::util::{command_line, stderr_tail};

/// When set, `go list` is not run; its JSON stream is read from this file instead.
pub const FAKE_GO_LIST_ENV: &str = "DEEPCOVER_FAKE_GO_LIST";

/// Loader backed by `go list -e -json -deps`.
pub struct GoListLoader {
    go: PathBuf,
}

impl GoListLoader {
    pub fn new(go: impl Into<PathBuf>) -> Self {
        Self { go: go.into() }
    }

    fn list(
        &self,
        locator: &Locator,
        patterns: &[String],
        deps: bool,
    ) -> DeepcoverResult<Vec<ListedPackage>> {
        if let Some(fake) = std::env::var_os(FAKE_GO_LIST_ENV) {
            let path = PathBuf::from(fake);
            let body = fs::read(&path).map_err(|e| DeepcoverError::io_path("read", &path, e))?;
            return decode(&body);
        }

        let mut cmd = Command::new(&self.go);
        cmd.args(["list", "-e", "-json"]);
        if deps {
            cmd.arg("-deps");
        }
        cmd.args(patterns);
        locator.apply(&mut cmd);
        debug!(command = %command_line(&cmd), "listing packages");

        let output = cmd.output().map_err(|e| {
            DeepcoverError::Loader(format!("failed to spawn {}: {e}", self.go.display()))
        })?;
        if !output.status.success() {
            return Err(DeepcoverError::Loader(format!(
                "go list exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        decode(&output.stdout)
    }
}

impl Default for GoListLoader {
    fn default() -> Self {
        Self::new("go")
    }
}

impl PackageLoader for GoListLoader {
    fn load(&self, locator: &Locator) -> DeepcoverResult<Vec<Package>> {
        let mut listed = self.list(locator, std::slice::from_ref(&locator.pattern), true)?;
        let mut seen: HashSet<String> = listed.iter().map(|p| p.import_path.clone()).collect();

        // Test-only imports are not part of the -deps closure of the package itself.
        let missing: BTreeSet<String> = listed
            .iter()
            .filter(|p| !p.dep_only)
            .flat_map(|p| p.test_imports.iter().chain(&p.x_test_imports))
            .filter(|import| !seen.contains(*import))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let patterns: Vec<String> = missing.into_iter().collect();
            debug!(count = patterns.len(), "listing test-only imports");
            for mut extra in self.list(locator, &patterns, true)? {
                if seen.insert(extra.import_path.clone()) {
                    extra.dep_only = true;
                    listed.push(extra);
                }
            }
        }

        assemble(listed, |path: &Path| fs::read_to_string(path))
    }

    fn module_of(&self, locator: &Locator, package: &str) -> DeepcoverResult<Option<String>> {
        let lookup = |path: &str| -> DeepcoverResult<Option<ListedPackage>> {
            let listed = self.list(locator, &[path.to_string()], false)?;
            Ok(listed.into_iter().find(|p| p.import_path == path && p.error.is_none()))
        };

        let mut found = lookup(package)?;
        if found.is_none() {
            if let Some(base) = package.strip_suffix("_test") {
                found = lookup(base)?;
            }
        }
        Ok(found.and_then(|p| p.module_path().map(str::to_string)))
    }

    fn name(&self) -> &'static str {
        "go-list"
    }
}

fn decode(body: &[u8]) -> DeepcoverResult<Vec<ListedPackage>> {
    serde_json::Deserializer::from_slice(body)
        .into_iter::<ListedPackage>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DeepcoverError::Loader(format!("failed to decode go list output: {e}")))
}
