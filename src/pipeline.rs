//! Sequential per-job orchestration.
//!
//! Jobs are processed one at a time in job-table order. The first error
//! stops the run; files already written (including standard identifiers
//! recorded in the job table for earlier jobs) stay in place.

use std::fmt;
use std::fs;
use std::path::Path;

use log::{error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::filter::annotation::split_suspect_matches;
use crate::filter::network::{add_selection_columns, expand_clusters, COMPONENT_INDEX};
use crate::filter::{peaks_of_interest, result_sets, FilterContext, STANDARD_CANDIDATES};
use crate::graphml;
use crate::job::{JobMetadata, JobTable};
use crate::join::{join, SideTable};
use crate::metrics::{add_group_averages, enrich};
use crate::report::{parameters_table, report_dir, write_table, JobReport, JobSummary, RunSummary};
use crate::samples::SampleSheet;
use crate::stats_input::StatsInput;
use crate::table::Table;

/// Pipeline stage selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Sample sheets, statistics input, standard discovery
    Prepare,
    /// Join, enrich, filter, report
    Reconcile,
    /// Prepare then reconcile, per job
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Prepare => "prepare",
            Stage::Reconcile => "reconcile",
            Stage::Run => "run",
        })
    }
}

fn read_required(path: &Path, what: &str) -> Result<Table> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput(format!(
            "{} {}",
            what,
            path.display()
        )));
    }
    Table::from_path(path)
}

/// Runs stages over the jobs of a job table
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    jobs: JobTable,
    summary: RunSummary,
}

impl Pipeline {
    /// Open the configured job table
    pub fn new(config: Config) -> Result<Self> {
        let jobs = JobTable::open(&config.paths.job_table, &config.standards.record_column)?;
        Ok(Self::with_jobs(config, jobs))
    }

    /// Use an already loaded job table
    pub fn with_jobs(config: Config, jobs: JobTable) -> Self {
        Self {
            config,
            jobs,
            summary: RunSummary::default(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Summary of the last run, including the job that failed
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Run a stage over every job, or only the named one
    pub fn run(&mut self, stage: Stage, only: Option<&str>) -> Result<()> {
        self.summary = RunSummary::new(stage.to_string());
        let jobs = match only {
            Some(name) => vec![self.jobs.find(name)?],
            None => self.jobs.jobs()?,
        };
        info!("Running {} on {} jobs", stage, jobs.len());

        for job in &jobs {
            match self.run_job(stage, job) {
                Ok(summary) => self.summary.add_job(summary),
                Err(e) => {
                    error!("Job {} failed: {}", job.name, e);
                    self.summary
                        .add_job(JobSummary::failed(job.name.clone(), e.to_string()));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn run_job(&mut self, stage: Stage, job: &JobMetadata) -> Result<JobSummary> {
        match stage {
            Stage::Prepare => self.prepare(job),
            Stage::Reconcile => self.reconcile(job),
            Stage::Run => {
                let prepared = self.prepare(job)?;
                let mut summary = self.reconcile(&self.jobs.job(job.index)?)?;
                if summary.standard_feature.is_none() {
                    summary.standard_feature = prepared.standard_feature;
                }
                Ok(summary)
            }
        }
    }

    fn sample_sheet(&self, job: &JobMetadata) -> Result<SampleSheet> {
        let samples = &self.config.samples;
        SampleSheet::collect(
            &job.name,
            &self.config.data_folder(&job.name),
            &self.config.data_folder(&job.control_folder),
            &samples.extension,
            &samples.control_marker,
        )
    }

    /// Sample sheets, statistics input and standard discovery for one job
    ///
    /// The discovered standard is written to the job table before this
    /// returns.
    pub fn prepare(&mut self, job: &JobMetadata) -> Result<JobSummary> {
        info!("Preparing job {}", job.name);
        let config = &self.config;
        let sheet = self.sample_sheet(job)?;
        let ionization = if config.standards.search {
            Some(job.ionization()?)
        } else {
            None
        };

        fs::create_dir_all(config.temp_folder(&job.name))?;
        sheet
            .metadata_table()
            .write_path(config.temp_file(&job.name, &config.files.metadata_suffix))?;
        sheet
            .network_metadata_table()
            .write_path(config.temp_file(&job.name, &config.files.network_metadata_suffix))?;

        let quant = read_required(&config.quant_path(&job.name), "quant table")?;
        let input = StatsInput::build(&quant, &sheet, job.rt_min_cutoff)?;
        input
            .table
            .write_path(config.temp_file(&job.name, &config.files.stats_input_suffix))?;

        let mut summary = JobSummary::ok(job.name.clone());
        summary.features = input.features.len();

        if let Some(ionization) = ionization {
            let standards = &config.standards;
            let target = standards.position(ionization);
            let found = input
                .find_standard(target, &standards.window)
                .ok_or_else(|| PipelineError::NoStandardMatch {
                    job: job.name.clone(),
                    standard: standards.name.clone(),
                })?;
            let id = found.to_string();
            info!("Job {}: {} feature is {}", job.name, standards.name, id);
            self.jobs.record_standard_feature(job.index, &id)?;
            summary.standard_feature = Some(id);
        }
        Ok(summary)
    }

    /// Join, enrich, filter and report one job
    pub fn reconcile(&self, job: &JobMetadata) -> Result<JobSummary> {
        info!("Reconciling job {}", job.name);
        let config = &self.config;
        let ionization = job.ionization()?;
        let sheet = self.sample_sheet(job)?;

        let quant = read_required(&config.quant_path(&job.name), "quant table")?;
        let mut sides = vec![
            SideTable::fold_change(read_required(
                &config.fold_change_path(&job.name),
                "fold-change export",
            )?),
            SideTable::t_test(read_required(&config.t_test_path(&job.name), "t-test export")?),
            SideTable::normalized(read_required(
                &config.normalized_path(&job.name),
                "normalized abundance export",
            )?),
        ];
        let has_network = match config.node_table_path(&job.name) {
            Some(path) => {
                let nodes = if path.extension().is_some_and(|e| e == "graphml") {
                    graphml::read_node_table(&path)?
                } else {
                    Table::from_path(&path)?
                };
                sides.push(SideTable::node_table(nodes));
                true
            }
            None => {
                warn!("No network node table for job {}", job.name);
                false
            }
        };

        let mut table = join(&quant, &sides)?;
        if config.annotation.split_suspect {
            split_suspect_matches(&mut table, &config.annotation);
        }
        add_group_averages(&mut table, &sheet, &config.metrics)?;
        enrich(&mut table, &config.metrics)?;

        let standard = config.standards.position(ionization);
        let ctx = FilterContext {
            cutoffs: &config.cutoffs,
            metrics: &config.metrics,
            annotation: &config.annotation,
            standard,
            targets: config.targets_for(ionization),
        };
        let sets = result_sets(&table, &ctx)?;
        let standard_missing = sets
            .iter()
            .any(|s| s.name == STANDARD_CANDIDATES && s.is_empty());
        if standard_missing && config.standards.search {
            return Err(PipelineError::NoStandardMatch {
                job: job.name.clone(),
                standard: config.standards.name.clone(),
            });
        }

        let mut summary = JobSummary::ok(job.name.clone());
        summary.features = table.len();
        summary.standard_feature = job.standard_feature.clone();
        summary.sets = sets.iter().map(|s| (s.name.clone(), s.len())).collect();
        if standard_missing {
            summary.warn(format!("no {} candidates", config.standards.name));
        }

        if has_network && table.has_column(COMPONENT_INDEX) {
            let mask = peaks_of_interest(&config.cutoffs, &config.metrics).mask(&table)?;
            let selection = expand_clusters(&table, &mask)?;
            let mut nodes = table.with_columns_first(&config.report.columns_of_interest);
            add_selection_columns(&mut nodes, &selection);
            write_table(&nodes, &config.node_table_output_path(&job.name))?;
            info!(
                "Job {}: {} network nodes retained around {} selected",
                job.name,
                selection.retained(),
                mask.iter().filter(|&&m| m).count()
            );
        }

        let report = JobReport {
            job: &job.name,
            all: &table,
            sets: &sets,
            parameters: parameters_table(
                &config.cutoffs,
                &config.metrics,
                &config.standards.name,
                standard,
            ),
            standard_feature: job.standard_feature.clone(),
        };
        report.write(&report_dir(&config.paths.output, &job.name), &config.report)?;
        Ok(summary)
    }
}
