//! Error type shared by every analysis phase.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::model::FunctionId;

/// Diagnostics attached to one loaded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDiagnostic {
    pub package: String,
    pub messages: Vec<String>,
}

impl fmt::Display for PackageDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load package {}: {}", self.package, self.messages.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum DeepcoverError {
    #[error("no packages found for {0}")]
    NoPackages(String),

    /// Every package that carried diagnostics, in load order, on one line.
    #[error("{}", join_diagnostics(.0))]
    Load(Vec<PackageDiagnostic>),

    /// The package loader itself could not run.
    #[error("failed to load packages: {0}")]
    Loader(String),

    /// A regex match has no call-graph node. Indicates an inconsistent build.
    #[error("failed to find callgraph node for function {0}")]
    TargetNotFound(FunctionId),

    #[error("start node is nil")]
    NilRoot,

    #[error("root function is not in a module: {0}")]
    RootNotInModule(FunctionId),

    #[error("failed to resolve module of {package}: {message}")]
    ModuleResolve { package: String, message: String },

    #[error("{command} failed: {detail}")]
    Invocation { command: String, detail: String },

    #[error("invalid coverage percentage {field:?} in row {row:?}")]
    Parse { row: String, field: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("analysis cancelled before {0}")]
    Cancelled(&'static str),
}

impl DeepcoverError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DeepcoverError::Io { context: context.into(), source }
    }

    pub(crate) fn io_path(action: &str, path: &Path, source: std::io::Error) -> Self {
        DeepcoverError::Io { context: format!("failed to {action} {}", path.display()), source }
    }
}

fn join_diagnostics(diags: &[PackageDiagnostic]) -> String {
    diags.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Convenience result type for the analysis core.
pub type DeepcoverResult<T> = Result<T, DeepcoverError>;
