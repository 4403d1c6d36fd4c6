//! Cross-table reconciliation.
//!
//! The quant table written by the batch tool is the anchor: the joined table
//! has exactly one row per anchor row, ordered by ascending row id, keyed by
//! the canonical [`FeatureId`]. Side tables (statistics exports, the network
//! node table) are left-joined onto it. Every key cell, on either side, goes
//! through [`Cell::to_key`] so that `12`, `12.0` and `12/239.0947mz/0.03min`
//! meet on the same row.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::identifier::FeatureId;
use crate::samples::PEAK_AREA_SUFFIX;
use crate::table::{Cell, Table};

/// Quant table row id column
pub const ROW_ID: &str = "row ID";
/// Quant table m/z column
pub const ROW_MZ: &str = "row m/z";
/// Quant table retention time column
pub const ROW_RT: &str = "row retention time";
/// Join key column of the output, holding the bare row id
pub const SHARED_NAME: &str = "shared name";
/// Canonical identifier column of the output
pub const FEATURE_ID: &str = "feature_id";
/// Suffix given to normalized-abundance columns
pub const NORMALIZED_SUFFIX: &str = "_normalized";

/// Largest row id every float-typed export still represents exactly (2^53)
const MAX_ROW_ID: f64 = 9_007_199_254_740_992.0;

/// How a side table's key column is located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyColumn {
    /// Column with this name
    Named(String),
    /// Whatever the first column is called (possibly nothing)
    First,
}

/// A table to be left-joined onto the anchor
#[derive(Debug, Clone)]
pub struct SideTable {
    table: Table,
    key: KeyColumn,
    keep: Option<Vec<String>>,
    renames: Vec<(String, String)>,
    suffix: Option<String>,
}

impl SideTable {
    /// Join every non-key column of `table`, keyed by `key`
    pub fn new(table: Table, key: KeyColumn) -> Self {
        Self {
            table,
            key,
            keep: None,
            renames: Vec::new(),
            suffix: None,
        }
    }

    /// Restrict the joined columns to these (names after renaming)
    pub fn keep<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.keep = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Rename a column before it is joined
    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    /// Append a suffix to every joined column name
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Statistics fold-change export: `MetaboAnalyst_ID`, `Log2_FoldChange`
    pub fn fold_change(table: Table) -> Self {
        Self::new(table, KeyColumn::Named("MetaboAnalyst_ID".to_string()))
            .rename("Log2_FoldChange", "log2.FC.")
            .keep(["log2.FC."])
    }

    /// Statistics t-test export, keyed by its unnamed first column
    pub fn t_test(table: Table) -> Self {
        Self::new(table, KeyColumn::First).keep(["p.value"])
    }

    /// Statistics normalized-abundance export
    pub fn normalized(table: Table) -> Self {
        Self::new(table, KeyColumn::Named("MetaboAnalyst_ID".to_string()))
            .suffix(NORMALIZED_SUFFIX)
    }

    /// Network node table, keyed by `shared name`
    pub fn node_table(table: Table) -> Self {
        Self::new(table, KeyColumn::Named(SHARED_NAME.to_string()))
    }

    fn key_index(&self) -> Result<usize> {
        match &self.key {
            KeyColumn::Named(name) => self.table.require_column(name),
            KeyColumn::First if self.table.columns().is_empty() => Err(
                PipelineError::missing_column("<first column>", self.table.name()),
            ),
            KeyColumn::First => Ok(0),
        }
    }

    fn output_name(&self, column: &str) -> String {
        let renamed = self
            .renames
            .iter()
            .find(|(from, _)| from == column)
            .map(|(_, to)| to.as_str())
            .unwrap_or(column);
        match &self.suffix {
            Some(suffix) => format!("{}{}", renamed, suffix),
            None => renamed.to_string(),
        }
    }
}

/// Build the anchor table from a quant table
///
/// The result holds `shared name`, `feature_id`, the row id, m/z and
/// retention time columns and every per-sample intensity column, sorted by
/// row id. A row without row id, m/z or retention time is a
/// [`PipelineError::MissingValue`].
pub fn anchor(quant: &Table) -> Result<Table> {
    let ids = sorted_features(quant)?;

    let mut columns = vec![
        SHARED_NAME.to_string(),
        FEATURE_ID.to_string(),
        ROW_ID.to_string(),
        ROW_MZ.to_string(),
        ROW_RT.to_string(),
    ];
    let area_cols: Vec<usize> = quant
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.ends_with(PEAK_AREA_SUFFIX))
        .map(|(i, _)| i)
        .collect();
    columns.extend(area_cols.iter().map(|&i| quant.columns()[i].clone()));

    let mut out = Table::new("joined feature table", columns);
    for (id, row) in ids {
        let mut cells = vec![
            Cell::Text(id.key()),
            Cell::Text(id.to_string()),
            Cell::Number(id.row_id as f64),
            Cell::Number(id.mz),
            Cell::Number(id.rt),
        ];
        cells.extend(area_cols.iter().map(|&c| quant.cell(row, c).clone()));
        out.push_row(cells);
    }
    debug!(
        "Anchored {} features with {} sample columns",
        out.len(),
        area_cols.len()
    );
    Ok(out)
}

/// Identifier of every quant table row with its row index, by ascending row id
pub fn sorted_features(quant: &Table) -> Result<Vec<(FeatureId, usize)>> {
    let id_col = quant.require_column(ROW_ID)?;
    let mz_col = quant.require_column(ROW_MZ)?;
    let rt_col = quant.require_column(ROW_RT)?;

    let mut ids = Vec::with_capacity(quant.len());
    for row in 0..quant.len() {
        ids.push((feature_id(quant, row, id_col, mz_col, rt_col)?, row));
    }
    ids.sort_by_key(|(id, _)| id.row_id);
    Ok(ids)
}

fn feature_id(
    quant: &Table,
    row: usize,
    id_col: usize,
    mz_col: usize,
    rt_col: usize,
) -> Result<FeatureId> {
    let required = |col: usize| {
        quant
            .number(row, col)
            .filter(|v| !v.is_nan())
            .ok_or_else(|| PipelineError::MissingValue {
                column: quant.columns()[col].clone(),
                row,
            })
    };
    let raw_id = required(id_col)?;
    if !(0.0..=MAX_ROW_ID).contains(&raw_id) || raw_id.fract() != 0.0 {
        return Err(PipelineError::InvalidNumber {
            column: ROW_ID.to_string(),
            value: quant.cell(row, id_col).to_string(),
        });
    }
    Ok(FeatureId::new(raw_id as u64, required(mz_col)?, required(rt_col)?))
}

/// Left-join a side table onto `base` through its `shared name` column
///
/// Side rows whose key matches no base row are ignored; base rows without a
/// match get null cells. When a key occurs more than once in the side table
/// the first occurrence wins. Side columns whose output name is already
/// taken are skipped.
pub fn left_join(base: &mut Table, side: &SideTable) -> Result<()> {
    let base_key = base.require_column(SHARED_NAME)?;
    let side_key = side.key_index()?;
    let side_table = &side.table;

    let mut index: HashMap<String, usize> = HashMap::with_capacity(side_table.len());
    for row in 0..side_table.len() {
        if let Some(key) = side_table.cell(row, side_key).to_key() {
            if index.contains_key(&key) {
                debug!("Duplicate key {} in {}", key, side_table.name());
                continue;
            }
            index.insert(key, row);
        }
    }

    let matches: Vec<Option<usize>> = (0..base.len())
        .map(|row| {
            base.cell(row, base_key)
                .to_key()
                .and_then(|k| index.get(&k).copied())
        })
        .collect();

    let mut joined = 0;
    for (col, source) in side_table.columns().iter().enumerate() {
        if col == side_key {
            continue;
        }
        let name = side.output_name(source);
        if let Some(keep) = &side.keep {
            if !keep.contains(&name) {
                continue;
            }
        }
        if base.has_column(&name) {
            warn!(
                "Column '{}' from {} already present; keeping existing values",
                name,
                side_table.name()
            );
            continue;
        }
        let values = matches
            .iter()
            .map(|m| m.map(|r| side_table.cell(r, col).clone()).unwrap_or(Cell::Null))
            .collect();
        base.set_column(name, values);
        joined += 1;
    }

    let matched = matches.iter().filter(|m| m.is_some()).count();
    debug!(
        "Joined {} columns from {} ({}/{} rows matched)",
        joined,
        side_table.name(),
        matched,
        base.len()
    );
    Ok(())
}

/// Anchor the quant table and left-join every side table in order
pub fn join(quant: &Table, sides: &[SideTable]) -> Result<Table> {
    let mut table = anchor(quant)?;
    for side in sides {
        left_join(&mut table, side)?;
    }
    Ok(table)
}
