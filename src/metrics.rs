//! Derived metrics: log10 intensities, group averages and the EXP:CTRL ratio.
//!
//! All numeric edge cases resolve to a cell value rather than an error:
//! a zero intensity has no log, a missing average has no ratio, and a
//! division by a zero control average is replaced by a finite sentinel so
//! that downstream tools never see an infinity.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::identifier::round_to;
use crate::samples::{SampleClass, SampleSheet, PEAK_AREA_SUFFIX};
use crate::table::{Cell, Table};

/// Suffix of derived log10 columns
pub const LOG10_SUFFIX: &str = "_log10";

/// Name of the derived ratio column
pub const RATIO_COLUMN: &str = "EXP:CTRL_ratio";

/// Decimal places kept for log10 values and ratios
pub const METRIC_DECIMALS: i32 = 2;

/// Result of `EXP_avg / CTRL_avg` when both averages are zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroRatioPolicy {
    /// Not a number, the arithmetic result
    #[default]
    Nan,
    /// Positive sentinel, as if EXP were marginally above zero
    Sentinel,
    /// Empty cell
    Null,
}

/// Settings for the derived-metric stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// How to resolve a 0/0 ratio
    pub zero_ratio: ZeroRatioPolicy,
    /// Finite stand-in for an infinite ratio
    pub sentinel: f64,
    /// Column holding the CTRL group average
    pub ctrl_average: String,
    /// Column holding the EXP group average
    pub exp_average: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            zero_ratio: ZeroRatioPolicy::Nan,
            sentinel: 1e10,
            ctrl_average: "GNPSGROUP:CTRL".to_string(),
            exp_average: "GNPSGROUP:EXP".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Name of the log10 column derived from the CTRL average
    pub fn ctrl_log10(&self) -> String {
        log10_column(&self.ctrl_average)
    }

    /// Name of the log10 column derived from the EXP average
    pub fn exp_log10(&self) -> String {
        log10_column(&self.exp_average)
    }

    /// Average column for a sample class
    pub fn average_column(&self, class: SampleClass) -> &str {
        match class {
            SampleClass::Ctrl => &self.ctrl_average,
            SampleClass::Exp => &self.exp_average,
        }
    }
}

/// Name of the log10 column derived from `column`
pub fn log10_column(column: &str) -> String {
    format!("{}{}", column, LOG10_SUFFIX)
}

/// log10 of an intensity rounded to two decimals
///
/// Zero, negative and missing intensities have no log and yield `None`.
pub fn log10_rounded(value: Option<f64>) -> Option<f64> {
    let v = value?;
    if v == 0.0 {
        return None;
    }
    let log = v.log10();
    log.is_finite().then(|| round_to(log, METRIC_DECIMALS))
}

/// EXP:CTRL ratio rounded to two decimals, with sentinel substitution
pub fn ratio(exp: Option<f64>, ctrl: Option<f64>, config: &MetricsConfig) -> Option<f64> {
    let (exp, ctrl) = (exp?, ctrl?);
    if exp.is_nan() || ctrl.is_nan() {
        return None;
    }
    if ctrl == 0.0 {
        return if exp > 0.0 {
            Some(config.sentinel)
        } else if exp < 0.0 {
            Some(-config.sentinel)
        } else {
            match config.zero_ratio {
                ZeroRatioPolicy::Nan => Some(f64::NAN),
                ZeroRatioPolicy::Sentinel => Some(config.sentinel),
                ZeroRatioPolicy::Null => None,
            }
        };
    }
    let r = exp / ctrl;
    if r.is_infinite() {
        return Some(config.sentinel.copysign(r));
    }
    Some(round_to(r, METRIC_DECIMALS))
}

/// Append `<column>_log10` computed from an existing numeric column
pub fn add_log10_column(table: &mut Table, column: &str) -> Result<String> {
    let col = table.require_column(column)?;
    let values = (0..table.len())
        .map(|row| Cell::from_opt(log10_rounded(table.number(row, col))))
        .collect();
    let name = log10_column(column);
    table.set_column(name.clone(), values);
    Ok(name)
}

/// Per-sample intensity columns, in table order
pub fn peak_area_columns(table: &Table) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| c.ends_with(PEAK_AREA_SUFFIX))
        .cloned()
        .collect()
}

/// Fill in the group-average columns from per-sample intensities
///
/// Averages already supplied (by the network node table) are kept. Null
/// intensities are skipped; a feature with no intensity in any sample of
/// the class gets a null average.
pub fn add_group_averages(
    table: &mut Table,
    sheet: &SampleSheet,
    config: &MetricsConfig,
) -> Result<()> {
    for class in [SampleClass::Ctrl, SampleClass::Exp] {
        let target = config.average_column(class);
        if table.has_column(target) {
            debug!("Using supplied {} averages", target);
            continue;
        }

        let cols: Vec<usize> = sheet
            .of_class(class)
            .filter_map(|s| table.column_index(&s.peak_area_column()))
            .collect();
        if cols.is_empty() {
            return Err(PipelineError::missing_column(
                format!("{}{}", class, PEAK_AREA_SUFFIX),
                table.name(),
            ));
        }

        let values = (0..table.len())
            .map(|row| {
                let present: Vec<f64> = cols
                    .iter()
                    .filter_map(|&c| table.number(row, c))
                    .filter(|v| !v.is_nan())
                    .collect();
                if present.is_empty() {
                    Cell::Null
                } else {
                    Cell::Number(present.iter().sum::<f64>() / present.len() as f64)
                }
            })
            .collect();
        debug!("Computed {} from {} sample columns", target, cols.len());
        table.set_column(target.to_string(), values);
    }
    Ok(())
}

/// Add every derived column to a joined table
///
/// Appends a log10 column for each per-sample intensity column and for
/// both group averages, then the ratio column. Group averages must already
/// be present (see [`add_group_averages`]).
pub fn enrich(table: &mut Table, config: &MetricsConfig) -> Result<()> {
    for column in peak_area_columns(table) {
        add_log10_column(table, &column)?;
    }

    let ctrl = table.require_column(&config.ctrl_average)?;
    let exp = table.require_column(&config.exp_average)?;
    add_log10_column(table, &config.ctrl_average)?;
    add_log10_column(table, &config.exp_average)?;

    let ratios = (0..table.len())
        .map(|row| Cell::from_opt(ratio(table.number(row, exp), table.number(row, ctrl), config)))
        .collect();
    table.set_column(RATIO_COLUMN, ratios);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Delimiter;
    use std::path::Path;

    #[test]
    fn test_log10_rounding() {
        assert_eq!(log10_rounded(Some(1.2e6)), Some(6.08));
        assert_eq!(log10_rounded(Some(100.0)), Some(2.0));
        assert_eq!(log10_rounded(Some(0.0)), None);
        assert_eq!(log10_rounded(Some(-5.0)), None);
        assert_eq!(log10_rounded(None), None);
    }

    #[test]
    fn test_ratio_sentinel() {
        let cfg = MetricsConfig::default();
        assert_eq!(ratio(Some(1.2e6), Some(0.0), &cfg), Some(1e10));
        assert_eq!(ratio(Some(-3.0), Some(0.0), &cfg), Some(-1e10));
        assert_eq!(ratio(Some(10.0), Some(3.0), &cfg), Some(3.33));
        assert_eq!(ratio(None, Some(3.0), &cfg), None);
        assert_eq!(ratio(Some(1.0), None, &cfg), None);
    }

    #[test]
    fn test_zero_over_zero_policy() {
        let mut cfg = MetricsConfig::default();
        assert!(ratio(Some(0.0), Some(0.0), &cfg).unwrap().is_nan());
        cfg.zero_ratio = ZeroRatioPolicy::Sentinel;
        assert_eq!(ratio(Some(0.0), Some(0.0), &cfg), Some(1e10));
        cfg.zero_ratio = ZeroRatioPolicy::Null;
        assert_eq!(ratio(Some(0.0), Some(0.0), &cfg), None);
    }

    #[test]
    fn test_enrich_with_computed_averages() {
        let data = "row ID,a_CTRL.mzML Peak area,b.mzML Peak area,c.mzML Peak area
4867,0,1200000,
5,100,,
";
        let mut table = Table::from_reader(data.as_bytes(), Delimiter::Comma, "joined").unwrap();
        let files = ["a_CTRL.mzML", "b.mzML", "c.mzML"];
        let sheet = SampleSheet::from_filenames("j", Path::new("."), &files, "CTRL").unwrap();
        let cfg = MetricsConfig::default();

        add_group_averages(&mut table, &sheet, &cfg).unwrap();
        enrich(&mut table, &cfg).unwrap();

        assert_eq!(table.value(0, "GNPSGROUP:EXP"), Some(&Cell::Number(1.2e6)));
        assert_eq!(table.value(0, "GNPSGROUP:CTRL_log10"), Some(&Cell::Null));
        assert_eq!(table.value(0, "GNPSGROUP:EXP_log10"), Some(&Cell::Number(6.08)));
        assert_eq!(table.value(0, RATIO_COLUMN), Some(&Cell::Number(1e10)));
        assert_eq!(table.value(0, "a_CTRL.mzML Peak area_log10"), Some(&Cell::Null));

        assert_eq!(table.value(1, "GNPSGROUP:EXP"), Some(&Cell::Null));
        assert_eq!(table.value(1, RATIO_COLUMN), Some(&Cell::Null));
        assert_eq!(table.value(1, "GNPSGROUP:CTRL_log10"), Some(&Cell::Number(2.0)));
    }

    #[test]
    fn test_enrich_requires_averages() {
        let mut table =
            Table::from_reader("row ID\n1\n".as_bytes(), Delimiter::Comma, "bare").unwrap();
        let err = enrich(&mut table, &MetricsConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }
}
