//! Core data model shared by the analysis phases.
//!
//! - `FunctionId`: the key every phase agrees on.
//! - `CoverageRow` / `CoverageReport`: what the orchestrator hands back to frontends.
//! - `TargetDependencies`: owned dependency listing for frontends that skip the test run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one analyzable function within a load.
///
/// Package-level functions use their bare name (`Top`). Methods carry their
/// receiver, `(*Struct).Method` or `(Struct).Method`, so two types in one
/// package can declare the same method name without colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId {
    pub package: String,
    pub name: String,
}

impl FunctionId {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self { package: package.into(), name: name.into() }
    }

    /// Build the id of a method declared on `receiver`.
    pub fn method(package: impl Into<String>, receiver: &str, pointer: bool, name: &str) -> Self {
        let star = if pointer { "*" } else { "" };
        Self::new(package, format!("({star}{receiver}).{name}"))
    }

    /// Name without receiver qualification; what `go tool cover -func` prints.
    pub fn short_name(&self) -> &str {
        match self.name.rsplit_once(").") {
            Some((_, method)) => method,
            None => &self.name,
        }
    }

    pub fn is_method(&self) -> bool {
        self.name.starts_with('(')
    }

    /// Entry/init hooks never count as targets or dependencies.
    pub fn is_builtin(&self) -> bool {
        !self.is_method() && is_builtin_name(&self.name)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// `init`, `init#N` and `main`.
pub fn is_builtin_name(name: &str) -> bool {
    match name.strip_prefix("init") {
        Some("") => true,
        Some(rest) => rest.starts_with('#'),
        None => name == "main",
    }
}

/// Coverage of one retained function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRow {
    /// Source location as printed by the summary tool (`pkg/file.go:12:`).
    pub path: String,
    pub function: String,
    pub percent: f64,
    /// Estimated basic blocks of the paired declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl CoverageRow {
    pub fn new(path: impl Into<String>, function: impl Into<String>, percent: f64) -> Self {
        Self { path: path.into(), function: function.into(), percent, weight: None }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageReport {
    pub coverages: Vec<CoverageRow>,
    pub approx_total: f64,
}

/// One dependency as reported without running tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub function: FunctionId,
    pub module: String,
    pub weight: u32,
    /// `file.go:line` of the declaration, when one was parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Dependency set of one target, root first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDependencies {
    pub target: FunctionId,
    pub dependencies: Vec<DependencyEntry>,
}
