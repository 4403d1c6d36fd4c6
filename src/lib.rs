//! # featurelink - Feature Reconciliation for LC-MS/MS Metabolomics
//!
//! `featurelink` stitches together the per-feature outputs of the tools in
//! an untargeted metabolomics workflow (batch feature detection, a
//! statistics package and a molecular-networking service), derives
//! abundance metrics and writes filtered feature lists for each job.
//!
//! ## Key Features
//!
//! - **Canonical Feature Identifiers**: every tool's representation of a
//!   feature reduces to one join key, the batch tool's row ID. The display
//!   identifier `row/mzmz/rtmin` is deterministic.
//!
//! - **Anchored Joins**: the quant table is the anchor; statistics and
//!   network tables are left-joined so no feature is ever dropped.
//!
//! - **Derived Metrics**: log10 peak areas and an EXP:CTRL ratio with an
//!   explicit policy for zero control abundance.
//!
//! - **Declarative Filters**: named predicate sets producing the report
//!   sheets, plus cluster expansion over the molecular network.
//!
//! - **Internal Standard Discovery**: the standard feature is located per
//!   job and recorded back into the job table atomically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use featurelink::config::Config;
//! use featurelink::pipeline::{Pipeline, Stage};
//!
//! let config = Config::from_file("featurelink.toml".as_ref())?;
//! let mut pipeline = Pipeline::new(config)?;
//! pipeline.run(Stage::Reconcile, None)?;
//! println!("{}", pipeline.summary());
//! # Ok::<(), featurelink::error::PipelineError>(())
//! ```
//!
//! ## Stages
//!
//! 1. **prepare**: sample sheets, statistics input and standard discovery.
//! 2. *(external tools run)*
//! 3. **reconcile**: join, enrich, filter and write the report directory.
//!
//! Jobs run sequentially and the first error aborts the run.

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod filter;
pub mod graphml;
pub mod identifier;
pub mod job;
pub mod join;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod samples;
pub mod standard;
pub mod stats_input;
pub mod table;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{PipelineError, Result};
    pub use crate::filter::{Filter, Predicate, ResultSet, SortOrder};
    pub use crate::identifier::{row_key, FeatureId};
    pub use crate::job::{JobMetadata, JobTable};
    pub use crate::join::{join, SideTable};
    pub use crate::metrics::{MetricsConfig, ZeroRatioPolicy};
    pub use crate::pipeline::{Pipeline, Stage};
    pub use crate::report::{Manifest, RunSummary};
    pub use crate::samples::{SampleClass, SampleSheet};
    pub use crate::standard::{Ionization, MzRt, TargetCompound, Window};
    pub use crate::table::{Cell, Table};
}
