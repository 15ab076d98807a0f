use std::path::Path;

use anyhow::{Context, Result};
use deepcover_core::Deepcover;
use tracing::info;

use crate::commands::output::{format_table, write_coverage_file, JsonReport};

/// Run the tests matching `run` under `path` and report deep coverage.
///
/// JSON goes to stdout when `json` is set; otherwise the coverage file is
/// written to `output`, or a table is printed.
pub fn coverage_command(
    engine: &Deepcover,
    path: &str,
    run: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let report =
        engine.run(path, run).with_context(|| format!("Failed to compute coverage of {path}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::new(path, run, &report))?);
        return Ok(());
    }

    match output {
        Some(file) => {
            write_coverage_file(file, &report)?;
            info!(rows = report.coverages.len(), file = %file.display(), "wrote coverage file");
        }
        None => print!("{}", format_table(&report)),
    }
    Ok(())
}
