//! `manifest.json` describing a job's report directory.
//!
//! The manifest carries no timestamps: two runs over the same inputs
//! produce the same bytes.

use serde::{Deserialize, Serialize};

/// One written sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetEntry {
    /// Sheet name
    pub name: String,
    /// File name relative to the report directory
    pub file: String,
    /// Number of data rows
    pub rows: usize,
}

/// Index of a job's report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Job name
    pub job: String,
    /// Name and version of the crate that wrote the report
    pub generator: String,
    /// Identifier of the internal standard feature, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_feature: Option<String>,
    /// Written sheets, in output order
    pub sheets: Vec<SheetEntry>,
}

impl Manifest {
    /// Empty manifest for a job
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            standard_feature: None,
            sheets: Vec::new(),
        }
    }

    /// Row count of a sheet, if written
    pub fn rows(&self, sheet: &str) -> Option<usize> {
        self.sheets.iter().find(|s| s.name == sheet).map(|s| s.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_serialization() {
        let mut manifest = Manifest::new("JobA");
        manifest.sheets.push(SheetEntry {
            name: "All".to_string(),
            file: "All.csv".to_string(),
            rows: 3,
        });

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(!json.contains("standard_feature"));
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
        assert_eq!(back.rows("All"), Some(3));
        assert_eq!(back.rows("None"), None);
    }
}
