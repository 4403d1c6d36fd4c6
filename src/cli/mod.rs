use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use featurelink::config::Config;
use featurelink::pipeline::{Pipeline, Stage};

mod identify;

/// featurelink - feature reconciliation and filtering for LC-MS/MS jobs
#[derive(Parser)]
#[command(name = "featurelink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Load settings from a TOML config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write sample sheets and statistics input, locate the internal standard
    Prepare {
        /// Only process this job
        #[arg(long, value_name = "NAME")]
        job: Option<String>,
    },

    /// Join tool outputs, derive metrics, filter and write reports
    Reconcile {
        /// Only process this job
        #[arg(long, value_name = "NAME")]
        job: Option<String>,
    },

    /// Prepare then reconcile each job
    Run {
        /// Only process this job
        #[arg(long, value_name = "NAME")]
        job: Option<String>,
    },

    /// Build a feature identifier, or decompose one
    Identify {
        /// Identifier (`row/mzmz/rtmin`) or bare row ID
        #[arg(value_name = "ID", conflicts_with_all = ["row_id", "mz", "rt"])]
        id: Option<String>,

        /// Row ID of the feature
        #[arg(long, requires_all = ["mz", "rt"])]
        row_id: Option<u64>,

        /// Precursor m/z
        #[arg(long)]
        mz: Option<f64>,

        /// Retention time in minutes
        #[arg(long)]
        rt: Option<f64>,
    },

    /// Print the default configuration as TOML
    DefaultConfig,
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn run_stage(config: Option<PathBuf>, stage: Stage, job: Option<String>) -> Result<()> {
    let config = load_config(config)?;
    let job_table = config.paths.job_table.clone();
    let mut pipeline = Pipeline::new(config)
        .with_context(|| format!("Failed to open job table: {}", job_table.display()))?;

    let result = pipeline.run(stage, job.as_deref());

    #[cfg(feature = "colorized_output")]
    {
        println!("{}", pipeline.summary().format_colored());
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("{}", pipeline.summary());
    }

    result.with_context(|| format!("{} stage aborted", stage))
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Prepare { job } => run_stage(cli.config, Stage::Prepare, job),
        Commands::Reconcile { job } => run_stage(cli.config, Stage::Reconcile, job),
        Commands::Run { job } => run_stage(cli.config, Stage::Run, job),
        Commands::Identify { id, row_id, mz, rt } => identify::run(id, row_id, mz, rt),
        Commands::DefaultConfig => {
            let toml = load_config(cli.config)?
                .to_toml()
                .context("Failed to render configuration")?;
            print!("{}", toml);
            Ok(())
        }
    }
}
