//! Package-to-module resolution with an injectable memo table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{DeepcoverError, DeepcoverResult};
use crate::loader::{Locator, PackageLoader};

/// Memo of module verdicts keyed by package path.
///
/// `None` records "outside any module" and is cached like a positive verdict.
/// The first verdict recorded for a path is never replaced.
#[derive(Debug, Default)]
pub struct ModuleCache {
    verdicts: Mutex<HashMap<String, Option<String>>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, package: &str) -> Option<Option<String>> {
        self.lock().get(package).cloned()
    }

    /// Record `verdict` unless one already exists; returns the verdict in effect.
    pub fn seed(&self, package: &str, verdict: Option<String>) -> Option<String> {
        self.lock().entry(package.to_string()).or_insert(verdict).clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<String>>> {
        // A poisoned map still holds only complete verdicts.
        self.verdicts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Answers "which module does this package belong to", asking the loader on a miss.
pub struct ModuleResolver<'a> {
    loader: &'a dyn PackageLoader,
    cache: &'a ModuleCache,
    locator: &'a Locator,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(loader: &'a dyn PackageLoader, cache: &'a ModuleCache, locator: &'a Locator) -> Self {
        Self { loader, cache, locator }
    }

    pub fn resolve(&self, package: &str) -> DeepcoverResult<Option<String>> {
        if let Some(verdict) = self.cache.get(package) {
            return Ok(verdict);
        }
        let verdict = self.loader.module_of(self.locator, package).map_err(|e| {
            DeepcoverError::ModuleResolve { package: package.to_string(), message: e.to_string() }
        })?;
        debug!(package, module = verdict.as_deref().unwrap_or("-"), "resolved module");
        Ok(self.cache.seed(package, verdict))
    }
}
