//! Report output: one CSV per sheet plus a manifest.
//!
//! A job's report directory holds the full enriched table (`All`), a
//! condensed view (`All Peaks Simple`), every result set, and the cutoffs
//! that produced them (`Filter Parameters`). In every sheet the configured
//! columns of interest come first, in configured order.

mod manifest;
mod summary;

pub use manifest::{Manifest, SheetEntry};
pub use summary::{JobStatus, JobSummary, RunSummary};

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::filter::{
    Cutoffs, ResultSet, ALL_COMPOUND_MATCHES, COMPOUND_MATCHES_NO_SUSPECT, HOST_METABOLITES,
    PEAKS_OF_INTEREST, STANDARD_CANDIDATES,
};
use crate::identifier::round_to;
use crate::metrics::MetricsConfig;
use crate::standard::{MzRt, TargetCompound};
use crate::table::{Cell, Delimiter, Table};

/// Condensed sheet of the columns of interest
pub const ALL_PEAKS_SIMPLE: &str = "All Peaks Simple";
/// Full enriched table
pub const ALL: &str = "All";
/// Cutoffs used for this report
pub const FILTER_PARAMETERS: &str = "Filter Parameters";
/// Manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";

/// Sheets written unless configured otherwise
pub const DEFAULT_SHEETS: [&str; 8] = [
    ALL_PEAKS_SIMPLE,
    ALL,
    PEAKS_OF_INTEREST,
    HOST_METABOLITES,
    ALL_COMPOUND_MATCHES,
    COMPOUND_MATCHES_NO_SUSPECT,
    STANDARD_CANDIDATES,
    FILTER_PARAMETERS,
];

/// Report layout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Sheets to write, in order; target sheets are appended automatically
    pub sheets: Vec<String>,
    /// Columns moved to the front of every sheet
    pub columns_of_interest: Vec<String>,
    /// Columns printed in scientific notation in the condensed sheet
    pub scientific_columns: Vec<String>,
    /// Columns rounded to two decimals in the condensed sheet
    pub rounded_columns: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        Self {
            sheets: strings(&DEFAULT_SHEETS),
            columns_of_interest: strings(&[
                "shared name",
                "precursor mass",
                "RTMean",
                "log2.FC.",
                "p.value",
                "Compound_Name",
                "Suspect_Compound_Match",
                "Analog:MQScore",
                "GNPSGROUP:EXP",
                "GNPSGROUP:CTRL",
                "GNPSGROUP:EXP_log10",
                "GNPSGROUP:CTRL_log10",
                "EXP:CTRL_ratio",
                "GNPSLinkout_Cluster",
            ]),
            scientific_columns: strings(&["GNPSGROUP:EXP", "GNPSGROUP:CTRL", "p.value"]),
            rounded_columns: strings(&[
                "log2.FC.",
                "GNPSGROUP:EXP_log10",
                "GNPSGROUP:CTRL_log10",
            ]),
        }
    }
}

impl ReportConfig {
    /// Reject sheet names that no job could ever produce
    pub fn validate(&self, targets: &[TargetCompound]) -> Result<()> {
        for sheet in &self.sheets {
            let known = DEFAULT_SHEETS.contains(&sheet.as_str())
                || targets.iter().any(|t| &t.sheet_name() == sheet);
            if !known {
                return Err(PipelineError::UnknownSheet(sheet.clone()));
            }
        }
        Ok(())
    }
}

/// File name of a sheet inside the report directory
pub fn sheet_file_name(sheet: &str) -> String {
    let stem: String = sheet
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}.csv", stem)
}

/// Report directory of a job below the output root
pub fn report_dir(output: &Path, job: &str) -> std::path::PathBuf {
    output
        .join(job)
        .join(format!("{}_Filtered_Peaks_of_Interest", job))
}

/// Format like Python's `'{:.2e}'`: two decimals, signed two-digit exponent
pub fn scientific(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{:.2e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => formatted,
    }
}

/// Parameter/Value table of the cutoffs in effect
pub fn parameters_table(
    cutoffs: &Cutoffs,
    metrics: &MetricsConfig,
    standard_name: &str,
    standard: MzRt,
) -> Table {
    let mut table = Table::new(
        FILTER_PARAMETERS,
        vec!["Parameter".to_string(), "Value".to_string()],
    );
    let mut push = |name: &str, value: Cell| table.push_row(vec![Cell::from(name), value]);

    push("log2_fc", Cell::Number(cutoffs.log2_fc));
    push("p_value", Cell::Number(cutoffs.p_value));
    push("ctrl_log10", Cell::Number(cutoffs.ctrl_log10));
    push("exp_log10", Cell::Number(cutoffs.exp_log10));
    push("ratio", Cell::from_opt(cutoffs.ratio));
    push("host_ctrl_log10", Cell::Number(cutoffs.host_ctrl_log10));
    push("host_ratio", Cell::Number(cutoffs.host_ratio));
    push("mz_dev", Cell::Number(cutoffs.mz_dev));
    push("rt_dev", Cell::Number(cutoffs.rt_dev));
    push(&format!("{}_mz", standard_name), Cell::Number(standard.mz));
    push(&format!("{}_rt", standard_name), Cell::Number(standard.rt));
    push("zero_ratio", Cell::from(format!("{:?}", metrics.zero_ratio).to_lowercase()));
    push("sentinel", Cell::Number(metrics.sentinel));
    table
}

/// Condensed view: columns of interest only, with display formatting
pub fn simple_table(all: &Table, config: &ReportConfig) -> Table {
    let mut table = all
        .select_columns(&config.columns_of_interest)
        .with_name(ALL_PEAKS_SIMPLE);

    for column in &config.scientific_columns {
        if let Some(col) = table.column_index(column) {
            let values = (0..table.len())
                .map(|row| match table.cell(row, col) {
                    Cell::Number(v) => Cell::Text(scientific(*v)),
                    other => other.clone(),
                })
                .collect();
            table.set_column(column.clone(), values);
        }
    }
    for column in &config.rounded_columns {
        if let Some(col) = table.column_index(column) {
            let values = (0..table.len())
                .map(|row| match table.cell(row, col) {
                    Cell::Number(v) => Cell::Number(round_to(*v, 2)),
                    other => other.clone(),
                })
                .collect();
            table.set_column(column.clone(), values);
        }
    }
    table
}

/// Everything that goes into one job's report
#[derive(Debug, Clone)]
pub struct JobReport<'a> {
    /// Job name
    pub job: &'a str,
    /// Full enriched table
    pub all: &'a Table,
    /// Result sets in output order
    pub sets: &'a [ResultSet],
    /// Parameter/Value table
    pub parameters: Table,
    /// Identifier of the internal standard feature, when known
    pub standard_feature: Option<String>,
}

impl JobReport<'_> {
    fn sheet(&self, name: &str, config: &ReportConfig) -> Option<Table> {
        match name {
            ALL_PEAKS_SIMPLE => Some(simple_table(self.all, config)),
            ALL => Some(self.all.clone()),
            FILTER_PARAMETERS => Some(self.parameters.clone()),
            _ => self
                .sets
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.table.clone()),
        }
    }

    /// Write every configured sheet and the manifest into `dir`
    pub fn write(&self, dir: &Path, config: &ReportConfig) -> Result<Manifest> {
        fs::create_dir_all(dir)?;

        let mut names: Vec<&str> = config.sheets.iter().map(String::as_str).collect();
        for set in self.sets {
            let builtin = DEFAULT_SHEETS.contains(&set.name.as_str());
            if !builtin && !names.contains(&set.name.as_str()) {
                names.push(&set.name);
            }
        }

        let mut manifest = Manifest::new(self.job);
        manifest.standard_feature = self.standard_feature.clone();

        for name in names {
            let Some(table) = self.sheet(name, config) else {
                debug!("Sheet '{}' does not apply to job {}", name, self.job);
                continue;
            };
            let table = if name == FILTER_PARAMETERS {
                table
            } else {
                table.with_columns_first(&config.columns_of_interest)
            };
            let file = sheet_file_name(name);
            table.write_path(dir.join(&file))?;
            debug!("Wrote {} ({} rows)", file, table.len());
            manifest.sheets.push(SheetEntry {
                name: name.to_string(),
                file,
                rows: table.len(),
            });
        }

        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(dir.join(MANIFEST_FILE), json + "\n")?;
        info!(
            "Wrote {} sheets for job {} to {}",
            manifest.sheets.len(),
            self.job,
            dir.display()
        );
        Ok(manifest)
    }
}

/// Write a table as CSV, creating parent directories
pub fn write_table(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    table.write(fs::File::create(path)?, Delimiter::from_path(path))
}
