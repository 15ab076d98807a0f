//! Analysis dataset construction.
//!
//! Loads the packages behind a locator, builds the CHA call graph, selects
//! the target functions matching the test regex and records every
//! first-party declaration for size weighting.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use petgraph::stable_graph::NodeIndex;
use regex::Regex;
use tracing::{debug, info};

use crate::callgraph::{cha, CallGraph};
use crate::error::{DeepcoverError, DeepcoverResult, PackageDiagnostic};
use crate::loader::{Locator, Package, PackageLoader};
use crate::model::FunctionId;
use crate::module::ModuleCache;
use crate::syntax::FuncDecl;

/// Everything the later phases need from one load.
#[derive(Debug)]
pub struct AnalysisDataset {
    pub graph: CallGraph,
    pub targets: BTreeMap<FunctionId, NodeIndex>,
    pub syntax: HashMap<FunctionId, FuncDecl>,
    pub files: FileIndex,
}

/// Which package each parsed source file belongs to.
///
/// Files are keyed both as `<import path>/<file name>` (how `go tool cover`
/// prints them) and by their path on disk.
#[derive(Debug, Default)]
pub struct FileIndex {
    owners: HashMap<String, String>,
    xtest: HashSet<String>,
}

impl FileIndex {
    pub fn from_packages(packages: &[Package]) -> Self {
        let mut index = Self::default();
        for pkg in packages {
            if pkg.xtest {
                index.xtest.insert(pkg.import_path.clone());
            }
            // External test files live in the directory of the package they test.
            let owner_path = pkg.import_path.strip_suffix("_test").filter(|_| pkg.xtest);
            for file in &pkg.syntax {
                let Some(name) = file.path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let dir_key = owner_path.unwrap_or(&pkg.import_path);
                index.owners.insert(format!("{dir_key}/{name}"), pkg.import_path.clone());
                index.owners.insert(file.path.to_string_lossy().to_string(), pkg.import_path.clone());
            }
        }
        index
    }

    /// Package owning `file`, given as printed by the summary tool or as a disk path.
    pub fn package_of(&self, file: &str) -> Option<&str> {
        self.owners.get(file).map(String::as_str)
    }

    pub fn is_xtest(&self, package: &str) -> bool {
        self.xtest.contains(package)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Build the dataset for `locator`, selecting targets whose short name matches `regex`.
///
/// Module verdicts known from the load are recorded in `cache`.
pub fn build(
    loader: &dyn PackageLoader,
    cache: &ModuleCache,
    locator: &Locator,
    regex: &Regex,
) -> DeepcoverResult<AnalysisDataset> {
    debug!(locator = %locator, loader = loader.name(), "loading packages");
    let packages = loader.load(locator)?;
    if packages.is_empty() {
        return Err(DeepcoverError::NoPackages(locator.to_string()));
    }

    let diagnostics: Vec<PackageDiagnostic> = packages
        .iter()
        .filter(|p| !p.errors.is_empty())
        .map(|p| PackageDiagnostic { package: p.import_path.clone(), messages: p.errors.clone() })
        .collect();
    if !diagnostics.is_empty() {
        return Err(DeepcoverError::Load(diagnostics));
    }

    for pkg in &packages {
        cache.seed(&pkg.import_path, pkg.module_path().map(str::to_string));
    }

    let mut graph = cha::build(&packages);
    let purged = graph.delete_synthetic_nodes();
    debug!(purged, nodes = graph.node_count(), edges = graph.edge_count(), "purged dispatch nodes");

    let mut targets = BTreeMap::new();
    for pkg in packages.iter().filter(|p| p.is_root()) {
        for decl in pkg.syntax.iter().flat_map(|f| f.funcs.iter()) {
            if decl.receiver.is_some() {
                continue;
            }
            let id = decl.id(&pkg.import_path);
            if id.is_builtin() || !regex.is_match(id.short_name()) {
                continue;
            }
            let node = graph.find(&id).ok_or_else(|| DeepcoverError::TargetNotFound(id.clone()))?;
            targets.insert(id, node);
        }
    }

    let mut syntax = HashMap::new();
    for pkg in &packages {
        for decl in pkg.syntax.iter().flat_map(|f| f.funcs.iter()) {
            let id = decl.id(&pkg.import_path);
            if !id.is_builtin() {
                syntax.insert(id, decl.clone());
            }
        }
    }

    let files = FileIndex::from_packages(&packages);
    info!(
        packages = packages.len(),
        targets = targets.len(),
        declarations = syntax.len(),
        "analysis dataset ready"
    );
    Ok(AnalysisDataset { graph, targets, syntax, files })
}

impl AnalysisDataset {
    pub fn decl(&self, id: &FunctionId) -> Option<&FuncDecl> {
        self.syntax.get(id)
    }

    /// Package of `file`, falling back to its directory part when the file is unknown.
    pub fn package_of_file<'a>(&'a self, file: &'a str) -> Option<&'a str> {
        self.files
            .package_of(file)
            .or_else(|| Path::new(file).parent().and_then(|p| p.to_str()).filter(|p| !p.is_empty()))
    }
}
