//! Final report assembly.

use crate::model::{CoverageReport, CoverageRow};

/// Size-weighted mean coverage. Rows without a positive weight are ignored;
/// no weight at all gives 0.
pub fn approx_total(rows: &[CoverageRow]) -> f64 {
    let (weighted, total) = rows
        .iter()
        .filter_map(|r| r.weight.filter(|w| *w > 0).map(|w| (f64::from(w), r.percent)))
        .fold((0.0, 0.0), |(sum, total), (w, p)| (sum + w * p, total + w));
    if total == 0.0 {
        0.0
    } else {
        weighted / total
    }
}

pub fn assemble(coverages: Vec<CoverageRow>) -> CoverageReport {
    let approx_total = approx_total(&coverages);
    CoverageReport { coverages, approx_total }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(weight: Option<u32>, percent: f64) -> CoverageRow {
        let row = CoverageRow::new("m/a.go:1:", "F", percent);
        match weight {
            Some(w) => row.with_weight(w),
            None => row,
        }
    }

    #[test]
    fn weights_by_size() {
        let total = approx_total(&[row(Some(10), 100.0), row(Some(20), 50.0)]);
        assert!((total - 66.666_666).abs() < 1e-4, "got {total}");
    }

    #[test]
    fn zero_weight_rows_are_ignored() {
        assert_eq!(approx_total(&[row(Some(0), 100.0), row(None, 10.0)]), 0.0);
        assert_eq!(approx_total(&[row(Some(0), 100.0), row(Some(4), 25.0)]), 25.0);
        assert_eq!(approx_total(&[]), 0.0);
    }

    #[test]
    fn assemble_keeps_rows() {
        let report = assemble(vec![row(Some(2), 40.0)]);
        assert_eq!(report.coverages.len(), 1);
        assert_eq!(report.approx_total, 40.0);
    }
}
