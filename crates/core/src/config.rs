//! Run configuration shared by the library facade and the CLI.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeepcoverError;

/// Overrides the `go` binary when the configuration does not name one.
pub const GO_BINARY_ENV: &str = "DEEPCOVER_GO";

/// Coverage counter mode handed to `go test -covermode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverMode {
    Set,
    Count,
    /// Safe with parallel tests.
    #[default]
    Atomic,
}

impl CoverMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CoverMode::Set => "set",
            CoverMode::Count => "count",
            CoverMode::Atomic => "atomic",
        }
    }
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverMode {
    type Err = DeepcoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "set" => Ok(CoverMode::Set),
            "count" => Ok(CoverMode::Count),
            "atomic" => Ok(CoverMode::Atomic),
            other => Err(DeepcoverError::Config(format!(
                "unknown cover mode {other:?} (expected set, count or atomic)"
            ))),
        }
    }
}

/// How a summary row is paired with a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRule {
    /// The row's file must belong to the dependency's package.
    #[default]
    Ownership,
    /// The dependency's package path must occur somewhere in the row's path.
    Substring,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchRule::Ownership => "ownership",
            MatchRule::Substring => "substring",
        })
    }
}

impl FromStr for MatchRule {
    type Err = DeepcoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ownership" => Ok(MatchRule::Ownership),
            "substring" => Ok(MatchRule::Substring),
            other => Err(DeepcoverError::Config(format!(
                "unknown match rule {other:?} (expected ownership or substring)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepcoverConfig {
    /// `go` binary to run; falls back to `DEEPCOVER_GO`, then `go` on `PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_binary: Option<PathBuf>,
    pub cover_mode: CoverMode,
    pub match_rule: MatchRule,
    /// Extra arguments placed before the package pattern of `go test`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_args: Vec<String>,
}

impl DeepcoverConfig {
    pub fn resolve_go_binary(&self) -> PathBuf {
        self.go_binary
            .clone()
            .or_else(|| std::env::var_os(GO_BINARY_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("go"))
    }
}
