//! Parser for `go tool cover -func` output.

use crate::error::{DeepcoverError, DeepcoverResult};
use crate::model::CoverageRow;

/// Replace every run of tabs with a single tab.
pub fn collapse_tabs(row: &str) -> String {
    let mut out = String::with_capacity(row.len());
    let mut previous_tab = false;
    for c in row.chars() {
        if c == '\t' {
            if !previous_tab {
                out.push(c);
            }
            previous_tab = true;
        } else {
            out.push(c);
            previous_tab = false;
        }
    }
    out
}

/// Parse one summary row.
///
/// Blank rows, the `total:` line and rows with fewer than three fields yield
/// `Ok(None)`. An unparseable percentage is an error.
pub fn parse_row(row: &str) -> DeepcoverResult<Option<CoverageRow>> {
    let trimmed = row.trim();
    if trimmed.is_empty() || trimmed.to_lowercase().starts_with("total") {
        return Ok(None);
    }

    let collapsed = collapse_tabs(trimmed);
    let fields: Vec<&str> = collapsed.split('\t').collect();
    if fields.len() < 3 {
        return Ok(None);
    }
    let (path, function) = (fields[0].trim(), fields[1].trim());
    if path.is_empty() || function.is_empty() {
        return Ok(None);
    }

    let raw = fields[2].trim();
    let percent: f64 = raw.strip_suffix('%').unwrap_or(raw).trim().parse().map_err(|_| {
        DeepcoverError::Parse { row: row.to_string(), field: raw.to_string() }
    })?;
    Ok(Some(CoverageRow::new(path, function, percent)))
}

/// Parse a whole summary; the first bad row aborts.
pub fn parse_summary(text: &str) -> DeepcoverResult<Vec<CoverageRow>> {
    let mut rows = Vec::new();
    for line in text.lines() {
        if let Some(row) = parse_row(line)? {
            rows.push(row);
        }
    }
    Ok(rows)
}
