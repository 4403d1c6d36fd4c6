//! The job table: one row per analysis job.
//!
//! The table is read once at the start of a run. The only value ever
//! written back is the identifier of each job's internal-standard feature,
//! and it is written back one job at a time so that a failure in a later
//! job does not lose the results already recorded for earlier ones.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};
use crate::standard::{parse_ionization, Ionization};

/// Job table column holding the job name
pub const JOB_NAME: &str = "Job Name";
/// Job table column holding the control folder name
pub const CONTROL_FOLDER: &str = "Control Folder";
/// Job table column holding the ionization mode
pub const IONIZATION: &str = "Ionization";
/// Job table column holding the EXP replicate count
pub const EXP_REPLICATES: &str = "EXP num replicates";
/// Job table column holding the CTRL replicate count
pub const CTRL_REPLICATES: &str = "CTRL num replicates";
/// Job table column holding the batch template file name
pub const BATCH_TEMPLATE: &str = "Batch Template";
/// Job table column holding the minimum retention time
pub const RT_MIN_CUTOFF: &str = "RT minimum cutoff";

/// Configuration of one job, as read from the job table
#[derive(Debug, Clone, PartialEq)]
pub struct JobMetadata {
    /// Position among the jobs of the table, blank rows not counted
    pub index: usize,
    /// Unique job name, also the name of its data folder
    pub name: String,
    /// Folder holding the job's control files
    pub control_folder: String,
    /// Raw ionization label
    pub ionization: String,
    /// Number of EXP replicates, if recorded
    pub exp_replicates: Option<u32>,
    /// Number of CTRL replicates, if recorded
    pub ctrl_replicates: Option<u32>,
    /// Batch-tool parameter template reference
    pub batch_template: Option<String>,
    /// Features eluting earlier than this (minutes) are dropped from the
    /// statistics input
    pub rt_min_cutoff: f64,
    /// Previously recorded standard feature identifier
    pub standard_feature: Option<String>,
}

impl JobMetadata {
    /// Parsed ionization mode
    pub fn ionization(&self) -> Result<Ionization> {
        parse_ionization(&self.name, &self.ionization)
    }
}

/// The job table with its raw cells, so unknown columns survive write-back
///
/// Cells are kept exactly as read, including surrounding whitespace and
/// blank rows; values are trimmed only when a job is looked at.
#[derive(Debug, Clone)]
pub struct JobTable {
    path: Option<PathBuf>,
    raw_headers: Vec<String>,
    /// Header names used for lookup, BOM and whitespace removed
    headers: Vec<String>,
    records: Vec<Vec<String>>,
    /// Record position of each job; blank rows are not jobs
    jobs: Vec<usize>,
    record_column: String,
}

impl JobTable {
    /// Load the job table from a CSV file
    pub fn open<P: AsRef<Path>>(path: P, record_column: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingInput(format!(
                "job table {}",
                path.display()
            )));
        }
        let file = File::open(path)?;
        let mut table = Self::from_reader(BufReader::new(file), record_column)?;
        table.path = Some(path.to_path_buf());
        info!("Loaded {} jobs from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse a job table from a reader (not backed by a file)
    pub fn from_reader<R: Read>(reader: R, record_column: &str) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let raw_headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let headers: Vec<String> = raw_headers
            .iter()
            .map(|s| s.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        for required in [JOB_NAME, CONTROL_FOLDER, IONIZATION] {
            if !headers.iter().any(|h| h == required) {
                return Err(PipelineError::missing_column(required, "job table"));
            }
        }

        let mut records = Vec::new();
        let mut jobs = Vec::new();
        for record in csv_reader.records() {
            let row: Vec<String> = record?.iter().map(str::to_string).collect();
            if row.iter().any(|c| !c.trim().is_empty()) {
                jobs.push(records.len());
            }
            records.push(row);
        }

        Ok(Self {
            path: None,
            raw_headers,
            headers,
            records,
            jobs,
            record_column: record_column.to_string(),
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn text(&self, job: usize, name: &str) -> Option<&str> {
        let record = &self.records[self.jobs[job]];
        self.column(name)
            .and_then(|c| record.get(c))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn number<T: std::str::FromStr>(&self, row: usize, name: &str) -> Result<Option<T>> {
        match self.text(row, name) {
            None => Ok(None),
            Some(raw) => {
                // Spreadsheet exports often carry integers as "3.0"
                let trimmed = raw.strip_suffix(".0").unwrap_or(raw);
                trimmed
                    .parse::<T>()
                    .or_else(|_| raw.parse::<T>())
                    .map(Some)
                    .map_err(|_| PipelineError::InvalidNumber {
                        column: name.to_string(),
                        value: raw.to_string(),
                    })
            }
        }
    }

    /// Number of jobs
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True if the table lists no jobs
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Typed view of one row
    pub fn job(&self, index: usize) -> Result<JobMetadata> {
        let name = self
            .text(index, JOB_NAME)
            .ok_or_else(|| PipelineError::MissingValue {
                column: JOB_NAME.to_string(),
                row: index,
            })?
            .to_string();
        let control_folder = self
            .text(index, CONTROL_FOLDER)
            .ok_or_else(|| PipelineError::MissingValue {
                column: CONTROL_FOLDER.to_string(),
                row: index,
            })?
            .to_string();

        Ok(JobMetadata {
            index,
            name,
            control_folder,
            ionization: self.text(index, IONIZATION).unwrap_or_default().to_string(),
            exp_replicates: self.number(index, EXP_REPLICATES)?,
            ctrl_replicates: self.number(index, CTRL_REPLICATES)?,
            batch_template: self.text(index, BATCH_TEMPLATE).map(str::to_string),
            rt_min_cutoff: self.number(index, RT_MIN_CUTOFF)?.unwrap_or(0.0),
            standard_feature: self.text(index, &self.record_column).map(str::to_string),
        })
    }

    /// Typed view of every row
    pub fn jobs(&self) -> Result<Vec<JobMetadata>> {
        (0..self.len()).map(|i| self.job(i)).collect()
    }

    /// Find a job by name
    pub fn find(&self, name: &str) -> Result<JobMetadata> {
        (0..self.len())
            .find(|&i| self.text(i, JOB_NAME) == Some(name))
            .map(|i| self.job(i))
            .unwrap_or_else(|| Err(PipelineError::UnknownJob(name.to_string())))
    }

    /// Record a job's standard feature and persist the table immediately
    ///
    /// Only the record column changes; when it is new, it is appended to
    /// every row that spans the full header.
    pub fn record_standard_feature(&mut self, index: usize, feature: &str) -> Result<()> {
        let col = match self.column(&self.record_column) {
            Some(c) => c,
            None => {
                let col = self.headers.len();
                self.headers.push(self.record_column.clone());
                self.raw_headers.push(self.record_column.clone());
                for row in self.records.iter_mut().filter(|r| r.len() == col) {
                    row.push(String::new());
                }
                col
            }
        };
        let row = &mut self.records[self.jobs[index]];
        if row.len() <= col {
            row.resize(col + 1, String::new());
        }
        row[col] = feature.to_string();
        debug!("Recorded {} = {} for job row {}", self.record_column, feature, index);
        self.save()
    }

    /// Write the table as CSV
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(writer);
        csv_writer.write_record(&self.raw_headers)?;
        for row in &self.records {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Persist to the backing file by replacing it with a fully written copy
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        self.write(tmp.as_file_mut())?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(path).map_err(|e| PipelineError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const JOBS: &str = "Job Name,Control Folder,Ionization,EXP num replicates,CTRL num replicates,RT minimum cutoff,Notes
JobA,CtrlA,POS,3,3.0,0.5,first
JobB,CtrlB,NEG,,,,
";

    #[test]
    fn test_parse_jobs() {
        let table = JobTable::from_reader(JOBS.as_bytes(), "Standard Feature").unwrap();
        assert_eq!(table.len(), 2);
        let a = table.job(0).unwrap();
        assert_eq!(a.name, "JobA");
        assert_eq!(a.ctrl_replicates, Some(3));
        assert_eq!(a.rt_min_cutoff, 0.5);
        assert_eq!(a.ionization().unwrap(), Ionization::Positive);

        let b = table.find("JobB").unwrap();
        assert_eq!(b.exp_replicates, None);
        assert_eq!(b.rt_min_cutoff, 0.0);
        assert!(table.find("JobC").is_err());
    }

    #[test]
    fn test_write_back_keeps_cells_verbatim() {
        let jobs = concat!(
            "Job Name,Control Folder,Ionization,Notes\n",
            " JobA ,CtrlA, POS,  spaced note \n",
            ",,,\n",
            "JobB,CtrlB,NEG,\n",
        );
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        std::fs::write(&path, jobs).unwrap();

        let mut table = JobTable::open(&path, "Standard Feature").unwrap();
        assert_eq!(table.len(), 2);
        let a = table.job(0).unwrap();
        assert_eq!(a.name, "JobA");
        assert_eq!(a.ionization().unwrap(), Ionization::Positive);
        assert_eq!(table.job(1).unwrap().name, "JobB");

        table.record_standard_feature(1, "7/227.9655mz/4.8min").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            concat!(
                "Job Name,Control Folder,Ionization,Notes,Standard Feature\n",
                " JobA ,CtrlA, POS,  spaced note ,\n",
                ",,,,\n",
                "JobB,CtrlB,NEG,,7/227.9655mz/4.8min\n",
            )
        );
    }

    #[test]
    fn test_missing_required_column() {
        let err = JobTable::from_reader("Job Name,Ionization\nA,POS\n".as_bytes(), "x").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn test_record_standard_feature_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        std::fs::write(&path, JOBS).unwrap();

        let mut table = JobTable::open(&path, "Standard Feature").unwrap();
        table
            .record_standard_feature(1, "12/227.9655mz/4.8min")
            .unwrap();

        let reloaded = JobTable::open(&path, "Standard Feature").unwrap();
        assert_eq!(
            reloaded.job(1).unwrap().standard_feature.as_deref(),
            Some("12/227.9655mz/4.8min")
        );
        assert_eq!(reloaded.job(0).unwrap().standard_feature, None);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().next().unwrap().ends_with("Notes,Standard Feature"));
        assert!(text.contains("first"));
    }
}
