//! # featurelink
//!
//! Command-line driver for the feature reconciliation pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # Sample sheets, statistics input and standard discovery
//! featurelink -v prepare
//!
//! # After the statistics and networking tools have run
//! featurelink -v --config featurelink.toml reconcile --job JobA
//!
//! # Identifier helper
//! featurelink identify --row-id 4867 --mz 504.32372 --rt 7.4631
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
