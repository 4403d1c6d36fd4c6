//! TOML configuration.
//!
//! Every section is optional and falls back to the workflow defaults, so
//! an empty file is a valid configuration:
//!
//! ```toml
//! # featurelink.toml
//! [paths]
//! job_table = "input/jobs.csv"
//!
//! [cutoffs]
//! exp_log10 = 6.5
//! ratio = 100.0
//!
//! [metrics]
//! zero_ratio = "null"
//!
//! [[targets]]
//! name = "Baumin"
//! ionization = "POS"
//! mz = 523.1249
//! rt = 4.67
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::filter::annotation::AnnotationConfig;
use crate::filter::Cutoffs;
use crate::metrics::MetricsConfig;
use crate::report::ReportConfig;
use crate::standard::{Ionization, StandardsConfig, TargetCompound};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory layout
    pub paths: PathsConfig,
    /// Raw file discovery
    pub samples: SamplesConfig,
    /// File naming conventions of the external tools
    pub files: FilesConfig,
    /// Derived-metric settings
    pub metrics: MetricsConfig,
    /// Filter thresholds
    pub cutoffs: Cutoffs,
    /// Internal standard
    pub standards: StandardsConfig,
    /// Annotation handling
    pub annotation: AnnotationConfig,
    /// Report layout
    pub report: ReportConfig,
    /// Named target compounds
    pub targets: Vec<TargetCompound>,
}

/// Directory layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw data root; one folder per job and per control folder
    pub data: PathBuf,
    /// Working directory; one folder per job
    pub temp: PathBuf,
    /// Report root
    pub output: PathBuf,
    /// Job table (CSV)
    pub job_table: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: PathBuf::from("data"),
            temp: PathBuf::from("temp"),
            output: PathBuf::from("output"),
            job_table: PathBuf::from("input/jobs.csv"),
        }
    }
}

/// Raw file discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplesConfig {
    /// Raw data file extension
    pub extension: String,
    /// File name substring marking a control when controls share the job folder
    pub control_marker: String,
}

impl Default for SamplesConfig {
    fn default() -> Self {
        Self {
            extension: ".mzML".to_string(),
            control_marker: "CTRL".to_string(),
        }
    }
}

/// File naming conventions
///
/// Names ending in a suffix are prefixed with the job name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Quant table written by the batch tool
    pub quant_suffix: String,
    /// Sample sheet (`Filename`/`Class`)
    pub metadata_suffix: String,
    /// Network sample sheet (`filename`/`ATTRIBUTE_GROUP`)
    pub network_metadata_suffix: String,
    /// Statistics package input
    pub stats_input_suffix: String,
    /// Folder of statistics outputs inside the job's temp folder
    pub stats_folder: String,
    /// Fold-change export
    pub fold_change_suffix: String,
    /// t-test export (not job-prefixed)
    pub t_test_file: String,
    /// Normalized-abundance export
    pub normalized_suffix: String,
    /// Network node table, CSV export or GraphML
    pub node_table_suffixes: Vec<String>,
    /// Enriched node table written next to the report
    pub node_table_output_suffix: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            quant_suffix: "_gnps_quant.csv".to_string(),
            metadata_suffix: "_metadata.tsv".to_string(),
            network_metadata_suffix: "_metadata_gnps.tsv".to_string(),
            stats_input_suffix: "_MetaboAnalyst_input.csv".to_string(),
            stats_folder: "MetaboAnalystR_Output".to_string(),
            fold_change_suffix: "_fc_all.csv".to_string(),
            t_test_file: "t_test_all.csv".to_string(),
            normalized_suffix: "_normalized_data_transposed.csv".to_string(),
            node_table_suffixes: vec![
                "_node_table.csv".to_string(),
                ".graphml".to_string(),
            ],
            node_table_output_suffix: "_node_table.csv".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file {}: {}", path.display(), e),
            ))
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.report.validate(&config.targets)?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Targets searched for in jobs of one ionization mode
    pub fn targets_for(&self, ionization: Ionization) -> Vec<&TargetCompound> {
        self.targets
            .iter()
            .filter(|t| t.ionization == ionization)
            .collect()
    }

    /// Raw data folder of a job or control folder
    pub fn data_folder(&self, name: &str) -> PathBuf {
        self.paths.data.join(name)
    }

    /// Working folder of a job
    pub fn temp_folder(&self, job: &str) -> PathBuf {
        self.paths.temp.join(job)
    }

    /// File in a job's working folder named `<job><suffix>`
    pub fn temp_file(&self, job: &str, suffix: &str) -> PathBuf {
        self.temp_folder(job).join(format!("{}{}", job, suffix))
    }

    /// Batch tool quant table of a job
    pub fn quant_path(&self, job: &str) -> PathBuf {
        self.temp_file(job, &self.files.quant_suffix)
    }

    fn stats_folder(&self, job: &str) -> PathBuf {
        self.temp_folder(job).join(&self.files.stats_folder)
    }

    /// Statistics fold-change export of a job
    pub fn fold_change_path(&self, job: &str) -> PathBuf {
        self.stats_folder(job)
            .join(format!("{}{}", job, self.files.fold_change_suffix))
    }

    /// Statistics t-test export of a job
    pub fn t_test_path(&self, job: &str) -> PathBuf {
        self.stats_folder(job).join(&self.files.t_test_file)
    }

    /// Statistics normalized-abundance export of a job
    pub fn normalized_path(&self, job: &str) -> PathBuf {
        self.stats_folder(job)
            .join(format!("{}{}", job, self.files.normalized_suffix))
    }

    /// First existing network node table of a job
    pub fn node_table_path(&self, job: &str) -> Option<PathBuf> {
        self.files
            .node_table_suffixes
            .iter()
            .map(|suffix| self.temp_file(job, suffix))
            .find(|p| p.is_file())
    }

    /// Enriched node table written next to a job's report
    pub fn node_table_output_path(&self, job: &str) -> PathBuf {
        self.paths
            .output
            .join(job)
            .join(format!("{}{}", job, self.files.node_table_output_suffix))
    }
}
