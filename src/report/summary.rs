use std::fmt;

#[cfg(feature = "colorized_output")]
use console::style;

/// Outcome of one job
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// Job completed
    Ok,
    /// Job completed but something needs attention
    Warning(String),
    /// Job aborted the run
    Failed(String),
}

impl JobStatus {
    fn is_ok(&self) -> bool {
        matches!(self, JobStatus::Ok)
    }

    fn is_failed(&self) -> bool {
        matches!(self, JobStatus::Failed(_))
    }
}

/// What happened to one job
#[derive(Debug, Clone)]
pub struct JobSummary {
    /// Job name
    pub name: String,
    /// Number of features in the joined table
    pub features: usize,
    /// Row count per result set, in output order
    pub sets: Vec<(String, usize)>,
    /// Internal standard identifier, if discovered or recorded
    pub standard_feature: Option<String>,
    /// Outcome
    pub status: JobStatus,
}

impl JobSummary {
    /// Summary of a completed job
    pub fn ok(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: 0,
            sets: Vec::new(),
            standard_feature: None,
            status: JobStatus::Ok,
        }
    }

    /// Summary of a job that stopped the run
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed(message.into()),
            ..Self::ok(name)
        }
    }

    /// Downgrade a completed job to a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        if self.status.is_ok() {
            self.status = JobStatus::Warning(message.into());
        }
    }
}

/// Console summary of a pipeline run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Stage that was run (prepare, reconcile, run)
    pub stage: String,
    /// Per-job results in processing order
    pub jobs: Vec<JobSummary>,
}

impl RunSummary {
    /// Empty summary for a stage
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            jobs: Vec::new(),
        }
    }

    /// Record a job
    pub fn add_job(&mut self, job: JobSummary) {
        self.jobs.push(job);
    }

    /// True if any job failed
    pub fn has_failures(&self) -> bool {
        self.jobs.iter().any(|j| j.status.is_failed())
    }

    /// Number of jobs completed without warnings
    pub fn success_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_ok()).count()
    }

    /// Number of jobs with warnings
    pub fn warning_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| matches!(j.status, JobStatus::Warning(_)))
            .count()
    }

    /// Number of failed jobs
    pub fn failure_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_failed()).count()
    }

    /// Format the summary with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static WARN: Emoji<'_, '_> = Emoji("⚠", "[WARN]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();
            output.push_str(&format!(
                "{} {}\n",
                style("featurelink").bold().cyan(),
                style(&self.stage).bold()
            ));

            for job in &self.jobs {
                let symbol = match &job.status {
                    JobStatus::Ok => OK,
                    JobStatus::Warning(_) => WARN,
                    JobStatus::Failed(_) => FAIL,
                };
                let name = match &job.status {
                    JobStatus::Ok => style(job.name.as_str()).green(),
                    JobStatus::Warning(_) => style(job.name.as_str()).yellow(),
                    JobStatus::Failed(_) => style(job.name.as_str()).red(),
                };
                output.push_str(&format!("[{}] {}", symbol, name));
                if job.features > 0 {
                    output.push_str(&format!(" ({} features)", job.features));
                }
                match &job.status {
                    JobStatus::Ok => output.push('\n'),
                    JobStatus::Warning(msg) => {
                        output.push_str(&format!(" - {}: {}\n", style("WARNING").yellow().bold(), msg))
                    }
                    JobStatus::Failed(msg) => {
                        output.push_str(&format!(" - {}: {}\n", style("FAILED").red().bold(), msg))
                    }
                }
                if let Some(standard) = &job.standard_feature {
                    output.push_str(&format!("    standard: {}\n", style(standard).dim()));
                }
                for (set, rows) in &job.sets {
                    output.push_str(&format!("    {:<32} {:>6}\n", set, rows));
                }
            }

            output.push('\n');
            output.push_str(&format!(
                "{}: {} ok, {} warnings, {} failed\n",
                style("Summary").bold(),
                style(self.success_count()).green(),
                style(self.warning_count()).yellow(),
                style(self.failure_count()).red()
            ));
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "featurelink {}", self.stage)?;

        for job in &self.jobs {
            let symbol = match &job.status {
                JobStatus::Ok => "✓",
                JobStatus::Warning(_) => "⚠",
                JobStatus::Failed(_) => "✗",
            };
            write!(f, "[{}] {}", symbol, job.name)?;
            if job.features > 0 {
                write!(f, " ({} features)", job.features)?;
            }
            match &job.status {
                JobStatus::Ok => writeln!(f)?,
                JobStatus::Warning(msg) => writeln!(f, " - WARNING: {}", msg)?,
                JobStatus::Failed(msg) => writeln!(f, " - FAILED: {}", msg)?,
            }
            if let Some(standard) = &job.standard_feature {
                writeln!(f, "    standard: {}", standard)?;
            }
            for (set, rows) in &job.sets {
                writeln!(f, "    {:<32} {:>6}", set, rows)?;
            }
        }

        writeln!(f)?;
        write!(
            f,
            "Summary: {} ok, {} warnings, {} failed",
            self.success_count(),
            self.warning_count(),
            self.failure_count()
        )
    }
}
