use anyhow::{Context, Result};
use deepcover_core::Deepcover;

use crate::commands::output::format_dependencies;

/// Print each target's dependency set without running any test.
pub fn dependencies_command(engine: &Deepcover, path: &str, run: &str, json: bool) -> Result<()> {
    let targets = engine
        .analyze(path, run)
        .with_context(|| format!("Failed to extract dependencies of {path}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
    } else {
        print!("{}", format_dependencies(&targets));
    }
    Ok(())
}
