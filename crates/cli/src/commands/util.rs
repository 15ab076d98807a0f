use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use deepcover_core::{CoverMode, DeepcoverConfig, MatchRule};

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cover_mode: Option<String>,
    pub match_rule: Option<String>,
}

/// Load the configuration file, or the defaults when none is given.
///
/// `.yaml`/`.yml` files are read as YAML, everything else as JSON.
pub fn load_config(path: Option<&Path>) -> Result<DeepcoverConfig> {
    let Some(path) = path else {
        return Ok(DeepcoverConfig::default());
    };
    let body = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let config = if matches!(ext, "yaml" | "yml") {
        serde_yaml::from_str(&body)
            .with_context(|| format!("Failed to parse YAML config {}", path.display()))?
    } else {
        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse JSON config {}", path.display()))?
    };
    Ok(config)
}

pub fn apply_overrides(
    mut config: DeepcoverConfig,
    overrides: &ConfigOverrides,
) -> Result<DeepcoverConfig> {
    if let Some(mode) = &overrides.cover_mode {
        config.cover_mode = mode.parse::<CoverMode>()?;
    }
    if let Some(rule) = &overrides.match_rule {
        config.match_rule = rule.parse::<MatchRule>()?;
    }
    Ok(config)
}
