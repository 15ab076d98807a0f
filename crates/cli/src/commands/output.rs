use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use deepcover_core::{CoverageReport, TargetDependencies};

/// Report wrapper emitted by `--json`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    pub version: &'static str,
    pub path: &'a str,
    pub run: &'a str,
    #[serde(flatten)]
    pub report: &'a CoverageReport,
}

impl<'a> JsonReport<'a> {
    pub fn new(path: &'a str, run: &'a str, report: &'a CoverageReport) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            version: deepcover_core::version(),
            path,
            run,
            report,
        }
    }
}

/// Three-column table, each column padded to its widest cell plus two.
pub fn format_table(report: &CoverageReport) -> String {
    let percents: Vec<String> =
        report.coverages.iter().map(|row| format!("{:.1}%", row.percent)).collect();
    let path_w = column_width("PATH", report.coverages.iter().map(|r| r.path.len()));
    let name_w = column_width("FUNCTION", report.coverages.iter().map(|r| r.function.len()));
    let cov_w = column_width("COVERAGE", percents.iter().map(String::len));

    let title = format!("{:<path_w$} {:<name_w$} {:<cov_w$}", "PATH", "FUNCTION", "COVERAGE");
    let mut out = String::new();
    out.push_str(&title);
    out.push('\n');
    out.push_str(&"-".repeat(title.len()));
    out.push('\n');
    for (row, percent) in report.coverages.iter().zip(&percents) {
        out.push_str(&format!("{:<path_w$} {:<name_w$} {:<cov_w$}", row.path, row.function, percent));
        out.push('\n');
    }
    out.push_str(&format!("Total: {:.2}%\n", report.approx_total));
    out
}

fn column_width(header: &str, cells: impl Iterator<Item = usize>) -> usize {
    cells.fold(header.len(), usize::max) + 2
}

/// `<function>\t\t<path>\t\t<percent>%` per row, then the total.
pub fn format_coverage_file(report: &CoverageReport) -> String {
    let mut out = String::new();
    for row in &report.coverages {
        out.push_str(&format!("{}\t\t{}\t\t{:.2}%\n", row.function, row.path, row.percent));
    }
    out.push_str(&format!("Total: {:.2}%\n", report.approx_total));
    out
}

pub fn write_coverage_file(path: &Path, report: &CoverageReport) -> Result<()> {
    fs::write(path, format_coverage_file(report))
        .with_context(|| format!("Failed to write coverage file {}", path.display()))
}

/// One block per target: the target line, then its dependencies indented.
pub fn format_dependencies(targets: &[TargetDependencies]) -> String {
    if targets.is_empty() {
        return "Targets: (none)\n".to_string();
    }
    let mut out = String::new();
    for target in targets {
        out.push_str(&format!("{} ({} dependencies)\n", target.target, target.dependencies.len()));
        for dep in &target.dependencies {
            let location = dep.location.as_deref().unwrap_or("-");
            out.push_str(&format!("  - {} [{}] weight={}\n", dep.function, location, dep.weight));
        }
    }
    out
}
