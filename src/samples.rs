//! Sample classification and sample sheets.
//!
//! Raw data files are assigned to the CTRL or EXP class by convention:
//! every file found in a job's control folder is a control; when a job keeps
//! its controls alongside the experimental files (control folder equal to
//! the job folder), files whose name contains the control marker are
//! controls. A job without a single control file cannot be analysed and is
//! rejected before any table is touched.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::table::{Cell, Table};

/// Suffix the batch tool appends to per-sample intensity columns
pub const PEAK_AREA_SUFFIX: &str = " Peak area";

/// Sample group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SampleClass {
    /// Control group
    Ctrl,
    /// Experimental group
    Exp,
}

impl SampleClass {
    /// Label used in sample sheets and group-average columns
    pub fn label(&self) -> &'static str {
        match self {
            SampleClass::Ctrl => "CTRL",
            SampleClass::Exp => "EXP",
        }
    }
}

impl fmt::Display for SampleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One raw data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// File name without directory
    pub filename: String,
    /// Assigned class
    pub class: SampleClass,
    /// Folder the file was found in
    pub folder: PathBuf,
}

impl Sample {
    /// Name of this sample's intensity column in the quant table
    pub fn peak_area_column(&self) -> String {
        format!("{}{}", self.filename, PEAK_AREA_SUFFIX)
    }

    /// Full path of the raw file
    pub fn path(&self) -> PathBuf {
        self.folder.join(&self.filename)
    }
}

/// All samples of one job, controls first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSheet {
    /// Samples in sheet order
    pub samples: Vec<Sample>,
}

impl SampleSheet {
    /// Classify file names that all live in one folder by the control marker
    pub fn from_filenames<S: AsRef<str>>(
        job: &str,
        folder: &Path,
        filenames: &[S],
        control_marker: &str,
    ) -> Result<Self> {
        let mut ctrl = Vec::new();
        let mut exp = Vec::new();
        for name in filenames {
            let name = name.as_ref();
            let class = if name.contains(control_marker) {
                SampleClass::Ctrl
            } else {
                SampleClass::Exp
            };
            let sample = Sample {
                filename: name.to_string(),
                class,
                folder: folder.to_path_buf(),
            };
            match class {
                SampleClass::Ctrl => ctrl.push(sample),
                SampleClass::Exp => exp.push(sample),
            }
        }
        Self::from_groups(job, folder, ctrl, exp)
    }

    /// Scan a job's data folders and classify every raw file
    ///
    /// Files are listed in name order so repeated runs produce identical
    /// sheets.
    pub fn collect(
        job: &str,
        job_folder: &Path,
        control_folder: &Path,
        extension: &str,
        control_marker: &str,
    ) -> Result<Self> {
        let job_files = list_raw_files(job_folder, extension)?;

        if job_folder == control_folder {
            debug!("Job {} keeps controls in its own folder", job);
            return Self::from_filenames(job, job_folder, &job_files, control_marker);
        }

        let ctrl_files = list_raw_files(control_folder, extension)?;
        let ctrl = ctrl_files
            .iter()
            .map(|f| Sample {
                filename: f.clone(),
                class: SampleClass::Ctrl,
                folder: control_folder.to_path_buf(),
            })
            .collect();
        let exp = job_files
            .iter()
            .filter(|f| !ctrl_files.contains(f))
            .map(|f| Sample {
                filename: f.clone(),
                class: SampleClass::Exp,
                folder: job_folder.to_path_buf(),
            })
            .collect();

        Self::from_groups(job, control_folder, ctrl, exp)
    }

    fn from_groups(
        job: &str,
        control_folder: &Path,
        ctrl: Vec<Sample>,
        exp: Vec<Sample>,
    ) -> Result<Self> {
        if ctrl.is_empty() {
            return Err(PipelineError::NoControlFiles {
                job: job.to_string(),
                folder: control_folder.to_path_buf(),
            });
        }
        info!(
            "Job {}: {} CTRL and {} EXP samples",
            job,
            ctrl.len(),
            exp.len()
        );
        let mut samples = ctrl;
        samples.extend(exp);
        Ok(Self { samples })
    }

    /// Samples of one class, in sheet order
    pub fn of_class(&self, class: SampleClass) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(move |s| s.class == class)
    }

    /// Number of samples in a class
    pub fn count(&self, class: SampleClass) -> usize {
        self.of_class(class).count()
    }

    /// Generic sample sheet (`Filename`, `Class`)
    pub fn metadata_table(&self) -> Table {
        self.sheet(["Filename", "Class"])
    }

    /// Molecular-networking sample sheet (`filename`, `ATTRIBUTE_GROUP`)
    pub fn network_metadata_table(&self) -> Table {
        self.sheet(["filename", "ATTRIBUTE_GROUP"])
    }

    fn sheet(&self, header: [&str; 2]) -> Table {
        let mut table = Table::new(
            "sample sheet",
            header.iter().map(|h| h.to_string()).collect(),
        );
        for s in &self.samples {
            table.push_row(vec![
                Cell::Text(s.filename.clone()),
                Cell::Text(s.class.label().to_string()),
            ]);
        }
        table
    }
}

/// List raw data files with the given extension, sorted by name
fn list_raw_files(folder: &Path, extension: &str) -> Result<Vec<String>> {
    if !folder.is_dir() {
        return Err(PipelineError::MissingInput(format!(
            "data folder {} does not exist",
            folder.display()
        )));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(extension) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();
    Ok(files)
}
