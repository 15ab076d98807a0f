//! deepcover-core
//!
//! Deep test coverage for Go packages: find every first-party function
//! transitively reachable from the tests selected by a regex, instrument the
//! packages they live in, run the tests once, and report per-function
//! coverage with a size-weighted total.
//!
//! All logic lives here so frontends (the CLI, embedders) stay thin. External
//! tools sit behind two traits: `PackageLoader` (`go list`) and `Toolchain`
//! (`go test`, `go tool cover`).

pub mod analysis;
pub mod callgraph;
pub mod config;
pub mod coverage;
pub mod dependencies;
pub mod error;
pub mod loader;
pub mod model;
pub mod module;
pub mod report;
pub mod syntax;
mod util;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

pub use config::{CoverMode, DeepcoverConfig, MatchRule};
pub use coverage::{GoToolchain, Toolchain};
pub use error::{DeepcoverError, DeepcoverResult};
pub use loader::{GoListLoader, Locator, MemoryLoader, PackageLoader};
pub use model::{CoverageReport, CoverageRow, DependencyEntry, FunctionId, TargetDependencies};
pub use module::ModuleCache;

use analysis::AnalysisDataset;
use dependencies::Dependency;
use module::ModuleResolver;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Analyze `path` with the local `go` toolchain and default configuration.
pub fn deepcover(path: &str, regex: &str) -> DeepcoverResult<CoverageReport> {
    Deepcover::go(DeepcoverConfig::default()).run(path, regex)
}

/// Wires the loader, module cache and toolchain and runs the phases in order.
pub struct Deepcover {
    loader: Box<dyn PackageLoader>,
    toolchain: Box<dyn Toolchain>,
    config: DeepcoverConfig,
    cache: Option<Arc<ModuleCache>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Deepcover {
    pub fn new<L, T>(loader: L, toolchain: T) -> Self
    where
        L: PackageLoader + 'static,
        T: Toolchain + 'static,
    {
        Self {
            loader: Box::new(loader),
            toolchain: Box::new(toolchain),
            config: DeepcoverConfig::default(),
            cache: None,
            cancel: None,
        }
    }

    /// `go list` and `go test` with the binary named by `config`.
    pub fn go(config: DeepcoverConfig) -> Self {
        let go = config.resolve_go_binary();
        Self::new(GoListLoader::new(&go), GoToolchain::new(&go)).with_config(config)
    }

    pub fn with_config(mut self, config: DeepcoverConfig) -> Self {
        self.config = config;
        self
    }

    /// Share module verdicts across runs; by default every run starts empty.
    pub fn with_module_cache(mut self, cache: Arc<ModuleCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Checked between phases; a set flag ends the run with `Cancelled`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &DeepcoverConfig {
        &self.config
    }

    /// Dependency sets of every target without running any test.
    pub fn analyze(&self, path: &str, regex: &str) -> DeepcoverResult<Vec<TargetDependencies>> {
        self.with_dependencies(path, regex, |_, _, all| {
            Ok(all
                .into_iter()
                .map(|(target, deps)| TargetDependencies {
                    target,
                    dependencies: deps.iter().map(entry).collect(),
                })
                .collect())
        })
    }

    /// Full run: analysis, dependency extraction, one instrumented test run.
    pub fn run(&self, path: &str, pattern: &str) -> DeepcoverResult<CoverageReport> {
        self.with_dependencies(path, pattern, |locator, dataset, all| {
            let collapsed = coverage::collapse(all.into_values().flatten());
            debug!(dependencies = collapsed.len(), "collapsed dependency sets");

            self.checkpoint("coverage")?;
            let rows = coverage::cover(
                self.toolchain.as_ref(),
                dataset,
                locator,
                pattern,
                &collapsed,
                &self.config,
            )?;

            let report = report::assemble(rows);
            info!(
                rows = report.coverages.len(),
                total = report.approx_total,
                "coverage report ready"
            );
            Ok(report)
        })
    }

    /// Load and analyze `path`, extract every target's dependencies and hand
    /// them to `then` while the dataset they borrow is alive.
    fn with_dependencies<R>(
        &self,
        path: &str,
        pattern: &str,
        then: impl for<'d> FnOnce(
            &Locator,
            &'d AnalysisDataset,
            BTreeMap<FunctionId, Vec<Dependency<'d>>>,
        ) -> DeepcoverResult<R>,
    ) -> DeepcoverResult<R> {
        let regex = Regex::new(pattern)?;
        let locator = Locator::parse(path);
        let local = ModuleCache::new();
        let cache = self.cache.as_deref().unwrap_or(&local);

        self.checkpoint("analysis")?;
        let dataset = analysis::build(self.loader.as_ref(), cache, &locator, &regex)?;

        self.checkpoint("dependency extraction")?;
        let resolver = ModuleResolver::new(self.loader.as_ref(), cache, &locator);
        let all = dependencies::extract_all(&dataset, &resolver)?;
        then(&locator, &dataset, all)
    }

    fn checkpoint(&self, phase: &'static str) -> DeepcoverResult<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::SeqCst) => Err(DeepcoverError::Cancelled(phase)),
            _ => Ok(()),
        }
    }
}

fn entry(dep: &Dependency<'_>) -> DependencyEntry {
    DependencyEntry {
        function: dep.id.clone(),
        module: dep.module.clone(),
        weight: dep.weight,
        location: dep
            .decl
            .and_then(|d| d.file_name().map(|name| format!("{name}:{}", d.line))),
    }
}
