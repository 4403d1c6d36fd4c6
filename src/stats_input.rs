//! Input table for the statistics package.
//!
//! The layout is transposed relative to the quant table: the first row
//! names the samples, the second row gives each sample's class, and each
//! following row is one feature, labelled by its [`FeatureId`], with the
//! sample intensities across.
//!
//! ```text
//! Filename,c1_CTRL.mzML,e1.mzML
//! Class,CTRL,EXP
//! 12/239.0947mz/0.03min,400,500
//! 4867/504.3237mz/7.46min,0,1200000
//! ```

use log::{debug, info};

use crate::error::Result;
use crate::identifier::FeatureId;
use crate::join::sorted_features;
use crate::samples::SampleSheet;
use crate::standard::{best_match, MzRt, Window};
use crate::table::{Cell, Table};

/// Header of the first column
pub const FILENAME: &str = "Filename";
/// Label of the class row
pub const CLASS: &str = "Class";

/// The statistics input table and the features it lists
#[derive(Debug, Clone)]
pub struct StatsInput {
    /// Table ready to be written as CSV
    pub table: Table,
    /// Listed features, in table order
    pub features: Vec<FeatureId>,
}

impl StatsInput {
    /// Build from a quant table and the job's sample sheet
    ///
    /// Features are listed by ascending row id; features eluting before
    /// `rt_min_cutoff` minutes are left out. Every sample in the sheet must
    /// have an intensity column in the quant table.
    pub fn build(quant: &Table, sheet: &SampleSheet, rt_min_cutoff: f64) -> Result<Self> {
        let area_cols = sheet
            .samples
            .iter()
            .map(|s| quant.require_column(&s.peak_area_column()))
            .collect::<Result<Vec<_>>>()?;

        let mut columns = vec![FILENAME.to_string()];
        columns.extend(sheet.samples.iter().map(|s| s.filename.clone()));
        let mut table = Table::new("statistics input", columns);

        let mut class_row = vec![Cell::from(CLASS)];
        class_row.extend(sheet.samples.iter().map(|s| Cell::from(s.class.label())));
        table.push_row(class_row);

        let mut features = Vec::new();
        let mut dropped = 0;
        for (id, row) in sorted_features(quant)? {
            if id.rt < rt_min_cutoff {
                dropped += 1;
                continue;
            }
            let mut cells = vec![Cell::Text(id.to_string())];
            cells.extend(area_cols.iter().map(|&c| quant.cell(row, c).clone()));
            table.push_row(cells);
            features.push(id);
        }

        if dropped > 0 {
            debug!(
                "Dropped {} features eluting before {} min",
                dropped, rt_min_cutoff
            );
        }
        info!(
            "Statistics input: {} features x {} samples",
            features.len(),
            sheet.samples.len()
        );
        Ok(Self { table, features })
    }

    /// Feature closest in m/z to `target` within `window`
    ///
    /// Matching uses the rounded values printed in the identifiers, so the
    /// result agrees with what the statistics package sees.
    pub fn find_standard(&self, target: MzRt, window: &Window) -> Option<FeatureId> {
        let candidates = self
            .features
            .iter()
            .enumerate()
            .map(|(i, id)| (i, id.rounded_mz(), id.rounded_rt()));
        best_match(candidates, target, window).map(|i| self.features[i])
    }
}
