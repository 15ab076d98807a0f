//! Coverage orchestration: instrument the packages of every dependency, run
//! the tests once, summarize the profile and keep the rows that belong to a
//! dependency.

mod parse;
mod toolchain;

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::analysis::{AnalysisDataset, FileIndex};
use crate::config::{DeepcoverConfig, MatchRule};
use crate::dependencies::Dependency;
use crate::error::{DeepcoverError, DeepcoverResult};
use crate::loader::Locator;
use crate::model::CoverageRow;

pub use parse::{collapse_tabs, parse_row, parse_summary};
pub use toolchain::{GoToolchain, TestInvocation, Toolchain, FAKE_COVER_FUNC_ENV};

const PROFILE_NAME: &str = "coverage.out";

/// Union of dependency sets, first occurrence wins.
pub fn collapse<'a, I>(dependencies: I) -> Vec<Dependency<'a>>
where
    I: IntoIterator<Item = Dependency<'a>>,
{
    let mut seen = HashSet::new();
    dependencies.into_iter().filter(|d| seen.insert(d.id.clone())).collect()
}

/// Packages to instrument, in dependency order. External test packages are
/// never instrumented.
pub fn package_set(dependencies: &[Dependency<'_>], files: &FileIndex) -> Vec<String> {
    let mut seen = HashSet::new();
    dependencies
        .iter()
        .map(|d| d.id.package.as_str())
        .filter(|p| !files.is_xtest(p))
        .filter(|p| seen.insert(*p))
        .map(str::to_string)
        .collect()
}

/// Run the tests matching `regex` with every dependency's package
/// instrumented and return the summary rows that pair with a dependency.
///
/// Nothing is spawned when there is no package to instrument.
pub fn cover(
    toolchain: &dyn Toolchain,
    dataset: &AnalysisDataset,
    locator: &Locator,
    regex: &str,
    dependencies: &[Dependency<'_>],
    config: &DeepcoverConfig,
) -> DeepcoverResult<Vec<CoverageRow>> {
    let packages = package_set(dependencies, &dataset.files);
    if packages.is_empty() {
        debug!("no packages to instrument");
        return Ok(Vec::new());
    }

    let dir = tempfile::Builder::new()
        .prefix("deepcover-")
        .tempdir()
        .map_err(|e| DeepcoverError::io("failed to create coverage profile directory", e))?;
    let profile = dir.path().join(PROFILE_NAME);
    let invocation = TestInvocation {
        locator,
        regex,
        profile: &profile,
        mode: config.cover_mode,
        packages: &packages,
        extra_args: &config.test_args,
    };
    info!(toolchain = toolchain.name(), packages = packages.len(), mode = %config.cover_mode, "running tests");

    let summary = run_and_summarize(toolchain, &invocation);
    let removed = dir
        .close()
        .map_err(|e| DeepcoverError::io("failed to remove coverage profile directory", e));
    let summary = summary?;
    removed?;

    let rows = parse_summary(&summary)?;
    let kept = reconcile(rows, dependencies, dataset, config.match_rule);
    debug!(rows = kept.len(), "reconciled coverage rows");
    Ok(kept)
}

fn run_and_summarize(
    toolchain: &dyn Toolchain,
    invocation: &TestInvocation<'_>,
) -> DeepcoverResult<String> {
    toolchain.run_tests(invocation)?;
    toolchain.summarize(invocation.locator, invocation.profile)
}

/// Keep the rows that belong to some dependency, weighted by its size.
///
/// When several dependencies match a row (same-named methods of one
/// package), the one whose declaration spans the row's line wins.
pub fn reconcile(
    rows: Vec<CoverageRow>,
    dependencies: &[Dependency<'_>],
    dataset: &AnalysisDataset,
    rule: MatchRule,
) -> Vec<CoverageRow> {
    let mut kept = Vec::new();
    for row in rows {
        let location = row.path.clone();
        let (file, line) = split_location(&location);
        let owner = match rule {
            MatchRule::Ownership => dataset.package_of_file(file),
            MatchRule::Substring => None,
        };
        let candidates: Vec<&Dependency<'_>> = dependencies
            .iter()
            .filter(|d| row.function == d.id.short_name() || row.function == d.id.name)
            .filter(|d| match rule {
                MatchRule::Ownership => owner == Some(d.id.package.as_str()),
                MatchRule::Substring => row.path.contains(&d.id.package),
            })
            .collect();

        let paired = candidates
            .iter()
            .find(|d| declared_at(d, file, line))
            .or_else(|| candidates.first());
        let weight = paired.map(|d| d.weight);
        if rule == MatchRule::Ownership && dataset.files.package_of(file).is_none() {
            warn!(path = %row.path, "summary row names a file outside the load");
        }
        if let Some(weight) = weight {
            kept.push(row.with_weight(weight));
        }
    }
    kept
}

/// Split `pkg/file.go:12:` into the file and its line.
fn split_location(path: &str) -> (&str, Option<usize>) {
    let trimmed = path.strip_suffix(':').unwrap_or(path);
    match trimmed.rsplit_once(':') {
        Some((file, line)) => match line.parse() {
            Ok(line) => (file, Some(line)),
            Err(_) => (trimmed, None),
        },
        None => (trimmed, None),
    }
}

fn declared_at(dep: &Dependency<'_>, file: &str, line: Option<usize>) -> bool {
    let Some(decl) = dep.decl else {
        return false;
    };
    let Some(line) = line else {
        return false;
    };
    (decl.line..=decl.end_line).contains(&line)
        && decl.file_name() == Path::new(file).file_name().and_then(|n| n.to_str())
}
