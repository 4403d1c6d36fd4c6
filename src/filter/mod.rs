//! Composable threshold filters and the named result sets built from them.
//!
//! A [`Filter`] is a conjunction of [`Predicate`]s evaluated row by row on
//! the enriched feature table, plus an output ordering:
//!
//! ```ignore
//! Filtered Peaks of Interest:
//!     GNPSGROUP:CTRL_log10 < 5 (or empty)
//!     GNPSGROUP:EXP_log10  > 6
//!     log2.FC.             > 2
//!     p.value              < 0.05
//!     ordered by GNPSGROUP:EXP_log10, descending
//! ```
//!
//! Empty and NaN cells fail every predicate, except a [`Predicate::Below`]
//! that explicitly lets them through. A feature absent from the control
//! group has no CTRL log10, and that is exactly the feature of interest.

pub mod annotation;
pub mod network;


use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::join::{ROW_ID, ROW_MZ, ROW_RT};
use crate::metrics::{MetricsConfig, RATIO_COLUMN};
use crate::standard::{best_match, MzRt, TargetCompound, Window};
use crate::table::{Cell, Table};

use annotation::AnnotationConfig;

/// Name of the main result set
pub const PEAKS_OF_INTEREST: &str = "Filtered Peaks of Interest";
/// Name of the host-metabolite result set
pub const HOST_METABOLITES: &str = "Upreg Likely Host Metabolites";
/// Name of the internal-standard result set
pub const STANDARD_CANDIDATES: &str = "Standard Candidates";
/// Name of the annotated-feature result set
pub const ALL_COMPOUND_MATCHES: &str = "All Cmpd Matches";
/// Name of the confident-annotation result set
pub const COMPOUND_MATCHES_NO_SUSPECT: &str = "Cmpd Matches No Sus";

/// Network node table m/z column, preferred over the quant table's
pub const PRECURSOR_MASS: &str = "precursor mass";
/// Network node table retention time column, preferred over the quant table's
pub const RT_MEAN: &str = "RTMean";

/// Row-level condition on one column
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Pass rows whose value is strictly below `cutoff`
    Below {
        /// Column tested
        column: String,
        /// Exclusive upper bound
        cutoff: f64,
        /// Also pass empty and NaN cells
        null_passes: bool,
    },
    /// Pass rows whose value is strictly above `cutoff`
    Above {
        /// Column tested
        column: String,
        /// Exclusive lower bound
        cutoff: f64,
    },
    /// Pass rows whose value lies within `center ± tolerance`, inclusive
    Within {
        /// Column tested
        column: String,
        /// Window center
        center: f64,
        /// Half width of the window
        tolerance: f64,
    },
    /// Pass rows with any non-empty value
    NotNull {
        /// Column tested
        column: String,
    },
    /// Pass rows whose text does not contain `pattern`
    Excludes {
        /// Column tested
        column: String,
        /// Substring that disqualifies a row
        pattern: String,
    },
}

impl Predicate {
    /// Strict upper bound; empty cells fail
    pub fn below(column: impl Into<String>, cutoff: f64) -> Self {
        Predicate::Below {
            column: column.into(),
            cutoff,
            null_passes: false,
        }
    }

    /// Strict upper bound that empty cells pass
    pub fn below_or_null(column: impl Into<String>, cutoff: f64) -> Self {
        Predicate::Below {
            column: column.into(),
            cutoff,
            null_passes: true,
        }
    }

    /// Strict lower bound
    pub fn above(column: impl Into<String>, cutoff: f64) -> Self {
        Predicate::Above {
            column: column.into(),
            cutoff,
        }
    }

    /// Inclusive window
    pub fn within(column: impl Into<String>, center: f64, tolerance: f64) -> Self {
        Predicate::Within {
            column: column.into(),
            center,
            tolerance,
        }
    }

    /// Column the predicate reads
    pub fn column(&self) -> &str {
        match self {
            Predicate::Below { column, .. }
            | Predicate::Above { column, .. }
            | Predicate::Within { column, .. }
            | Predicate::NotNull { column }
            | Predicate::Excludes { column, .. } => column,
        }
    }

    fn test(&self, cell: &Cell) -> bool {
        let number = cell.as_f64().filter(|v| !v.is_nan());
        match self {
            Predicate::Below {
                cutoff,
                null_passes,
                ..
            } => match number {
                Some(v) => v < *cutoff,
                None => *null_passes && !matches!(cell, Cell::Text(_)),
            },
            Predicate::Above { cutoff, .. } => number.map(|v| v > *cutoff).unwrap_or(false),
            Predicate::Within {
                center, tolerance, ..
            } => number
                .map(|v| (v - center).abs() <= *tolerance)
                .unwrap_or(false),
            Predicate::NotNull { .. } => match cell {
                Cell::Null => false,
                Cell::Number(v) => !v.is_nan(),
                Cell::Text(s) => !s.trim().is_empty(),
            },
            Predicate::Excludes { pattern, .. } => match cell {
                Cell::Text(s) => !s.contains(pattern.as_str()),
                Cell::Number(v) => !v.is_nan(),
                Cell::Null => false,
            },
        }
    }
}

/// Row order of a result set
#[derive(Debug, Clone, PartialEq)]
pub enum SortOrder {
    /// Descending by a numeric column, empty cells last, ties stable
    Descending(String),
    /// Ascending by row id
    RowId,
}

/// A named conjunction of predicates
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    predicates: Vec<Predicate>,
    order: SortOrder,
}

impl Filter {
    /// Create a filter that passes every row, in row id order
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicates: Vec::new(),
            order: SortOrder::RowId,
        }
    }

    /// Add a predicate
    pub fn add(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Set the output ordering
    pub fn order_by(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Result set name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Predicates in evaluation order
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// One flag per table row: does the row satisfy every predicate
    pub fn mask(&self, table: &Table) -> Result<Vec<bool>> {
        let columns = self
            .predicates
            .iter()
            .map(|p| table.require_column(p.column()))
            .collect::<Result<Vec<_>>>()?;

        Ok((0..table.len())
            .map(|row| {
                self.predicates
                    .iter()
                    .zip(&columns)
                    .all(|(p, &col)| p.test(table.cell(row, col)))
            })
            .collect())
    }

    /// Select and order the passing rows
    pub fn apply(&self, table: &Table) -> Result<ResultSet> {
        let mask = self.mask(table)?;
        let passing: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, &keep)| keep)
            .map(|(i, _)| i)
            .collect();

        let sort_col = match &self.order {
            SortOrder::Descending(column) => column.as_str(),
            SortOrder::RowId => ROW_ID,
        };
        let order = match table.column_index(sort_col) {
            Some(col) => {
                table.sorted_indices(&passing, col, matches!(self.order, SortOrder::Descending(_)))
            }
            None => {
                warn!("Cannot order {} by missing column '{}'", self.name, sort_col);
                passing
            }
        };

        debug!("{}: {} of {} rows", self.name, order.len(), table.len());
        Ok(ResultSet {
            name: self.name.clone(),
            table: table.select_rows(&order).with_name(self.name.clone()),
        })
    }
}

/// A named, ordered subset of the enriched table
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    /// Set name, also the output sheet name
    pub name: String,
    /// Selected rows with every column of the source table
    pub table: Table,
}

impl ResultSet {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if no row passed
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Numeric cutoffs of the standard result sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cutoffs {
    /// CTRL log10 must be below this (or absent)
    pub ctrl_log10: f64,
    /// EXP log10 must be above this
    pub exp_log10: f64,
    /// Log2 fold change must be above this
    pub log2_fc: f64,
    /// t-test p-value must be below this
    pub p_value: f64,
    /// Optional EXP:CTRL ratio floor for the peaks of interest
    pub ratio: Option<f64>,
    /// CTRL log10 floor for host metabolites
    pub host_ctrl_log10: f64,
    /// EXP:CTRL ratio floor for host metabolites
    pub host_ratio: f64,
    /// m/z tolerance of standard and target windows
    pub mz_dev: f64,
    /// Retention time tolerance of standard and target windows
    pub rt_dev: f64,
}

impl Default for Cutoffs {
    fn default() -> Self {
        Self {
            ctrl_log10: 5.0,
            exp_log10: 6.0,
            log2_fc: 2.0,
            p_value: 0.05,
            ratio: None,
            host_ctrl_log10: 5.0,
            host_ratio: 10.0,
            mz_dev: 0.1,
            rt_dev: 0.5,
        }
    }
}

impl Cutoffs {
    /// Window used for standard and target searches
    pub fn window(&self) -> Window {
        Window {
            mz_tolerance: self.mz_dev,
            rt_tolerance: self.rt_dev,
        }
    }
}

/// Columns holding a feature's m/z and retention time
///
/// The network tool's consensus values are preferred when the node table was
/// joined; the quant table's own values are used otherwise.
pub fn position_columns(table: &Table) -> (&'static str, &'static str) {
    let mz = if table.has_column(PRECURSOR_MASS) {
        PRECURSOR_MASS
    } else {
        ROW_MZ
    };
    let rt = if table.has_column(RT_MEAN) {
        RT_MEAN
    } else {
        ROW_RT
    };
    (mz, rt)
}

/// Features likely produced by the experimental organism
pub fn peaks_of_interest(cutoffs: &Cutoffs, metrics: &MetricsConfig) -> Filter {
    let mut filter = Filter::new(PEAKS_OF_INTEREST)
        .add(Predicate::above("log2.FC.", cutoffs.log2_fc))
        .add(Predicate::below("p.value", cutoffs.p_value))
        .add(Predicate::below_or_null(metrics.ctrl_log10(), cutoffs.ctrl_log10))
        .add(Predicate::above(metrics.exp_log10(), cutoffs.exp_log10));
    if let Some(ratio) = cutoffs.ratio {
        filter = filter.add(Predicate::above(RATIO_COLUMN, ratio));
    }
    filter.order_by(SortOrder::Descending(metrics.exp_log10()))
}

/// Host features strongly up-regulated by the experimental condition
pub fn host_metabolites(cutoffs: &Cutoffs, metrics: &MetricsConfig) -> Filter {
    Filter::new(HOST_METABOLITES)
        .add(Predicate::above(metrics.ctrl_log10(), cutoffs.host_ctrl_log10))
        .add(Predicate::above(RATIO_COLUMN, cutoffs.host_ratio))
        .order_by(SortOrder::Descending(metrics.exp_log10()))
}

/// Features inside an m/z and retention time window, in row id order
pub fn window_filter(
    name: impl Into<String>,
    target: MzRt,
    window: &Window,
    columns: (&str, &str),
) -> Filter {
    Filter::new(name)
        .add(Predicate::within(columns.0, target.mz, window.mz_tolerance))
        .add(Predicate::within(columns.1, target.rt, window.rt_tolerance))
        .order_by(SortOrder::RowId)
}

/// Features with any library annotation
pub fn compound_matches(annotation: &AnnotationConfig, metrics: &MetricsConfig) -> Filter {
    Filter::new(ALL_COMPOUND_MATCHES)
        .add(Predicate::NotNull {
            column: annotation.column.clone(),
        })
        .order_by(SortOrder::Descending(metrics.exp_log10()))
}

/// Features with a library annotation not marked as low confidence
pub fn compound_matches_no_suspect(
    annotation: &AnnotationConfig,
    metrics: &MetricsConfig,
) -> Filter {
    Filter::new(COMPOUND_MATCHES_NO_SUSPECT)
        .add(Predicate::NotNull {
            column: annotation.column.clone(),
        })
        .add(Predicate::Excludes {
            column: annotation.column.clone(),
            pattern: annotation.suspect_marker.clone(),
        })
        .order_by(SortOrder::Descending(metrics.exp_log10()))
}

/// Everything needed to derive a job's result sets
#[derive(Debug, Clone)]
pub struct FilterContext<'a> {
    /// Threshold values
    pub cutoffs: &'a Cutoffs,
    /// Derived column names
    pub metrics: &'a MetricsConfig,
    /// Annotation column and marker
    pub annotation: &'a AnnotationConfig,
    /// Expected position of the internal standard
    pub standard: MzRt,
    /// Target compounds applicable to this job
    pub targets: Vec<&'a TargetCompound>,
}

/// Every filter of a job, in output order
///
/// The annotation sets are left out when the table carries no annotation
/// column.
pub fn standard_filters(table: &Table, ctx: &FilterContext<'_>) -> Vec<Filter> {
    let columns = position_columns(table);
    let window = ctx.cutoffs.window();

    let mut filters = vec![
        peaks_of_interest(ctx.cutoffs, ctx.metrics),
        host_metabolites(ctx.cutoffs, ctx.metrics),
    ];
    if table.has_column(&ctx.annotation.column) {
        filters.push(compound_matches(ctx.annotation, ctx.metrics));
        filters.push(compound_matches_no_suspect(ctx.annotation, ctx.metrics));
    } else {
        debug!("No '{}' column; skipping annotation sets", ctx.annotation.column);
    }
    filters.push(window_filter(STANDARD_CANDIDATES, ctx.standard, &window, columns));
    for target in &ctx.targets {
        filters.push(window_filter(
            target.sheet_name(),
            target.position(),
            &window,
            columns,
        ));
    }
    filters
}

/// Apply every filter of a job to the enriched table
pub fn result_sets(table: &Table, ctx: &FilterContext<'_>) -> Result<Vec<ResultSet>> {
    let columns = position_columns(table);
    standard_filters(table, ctx)
        .iter()
        .map(|f| {
            let set = f.apply(table)?;
            if set.name == STANDARD_CANDIDATES {
                closest_to(set, ctx.standard, &ctx.cutoffs.window(), columns)
            } else {
                Ok(set)
            }
        })
        .collect()
}

/// Reduce a window set to its single row closest in m/z to `target`
///
/// Rows are visited in the set's order, so the first of equally close rows
/// is kept. The set comes back empty when no row lies inside `window`.
pub fn closest_to(
    set: ResultSet,
    target: MzRt,
    window: &Window,
    columns: (&str, &str),
) -> Result<ResultSet> {
    let mz_col = set.table.require_column(columns.0)?;
    let rt_col = set.table.require_column(columns.1)?;
    let candidates = (0..set.len()).filter_map(|r| {
        Some((r, set.table.number(r, mz_col)?, set.table.number(r, rt_col)?))
    });
    let keep: Vec<usize> = best_match(candidates, target, window).into_iter().collect();
    if keep.is_empty() {
        warn!("{}: no row within the window", set.name);
    }
    Ok(ResultSet {
        table: set.table.select_rows(&keep).with_name(set.name.clone()),
        name: set.name,
    })
}
