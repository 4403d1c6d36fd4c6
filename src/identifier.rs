//! Canonical feature identifiers.
//!
//! Every external tool in the workflow refers to a detected feature in its
//! own way: the batch tool uses an integer `row ID`, the statistics package
//! a composite string such as `4867/504.3237mz/7.46min`, and the network
//! tool a `shared name` that may arrive as a string or a float. The
//! identifier defined here is the composite form; [`row_key`] reduces any of
//! the three representations to the same join key.
//!
//! ## Rounding
//!
//! m/z is rounded to 4 decimal places and retention time to 2, using
//! round-half-to-even on the exact binary value. Once rounded the
//! identifier is lossy: two raw (m/z, rt) pairs that round identically
//! produce the same suffix, so uniqueness rests on the row id prefix.

use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Decimal places kept for m/z in identifiers
pub const MZ_DECIMALS: i32 = 4;

/// Decimal places kept for retention time in identifiers
pub const RT_DECIMALS: i32 = 2;

/// Round `value` to `places` decimal places, ties to even
///
/// Rounds the exact binary value, so `550.85155` (stored just below the
/// midpoint) gives `550.8515` even though `550.85155 * 1e4` rounds up.
pub fn round_to(value: f64, places: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    match usize::try_from(places) {
        Ok(places) => format!("{:.*}", places, value).parse().unwrap_or(value),
        Err(_) => {
            let scale = 10f64.powi(places);
            (value * scale).round_ties_even() / scale
        }
    }
}

/// Render a float in shortest round-trip form, always with a fractional part
///
/// `500.0` renders as `"500.0"` and `239.0947` as `"239.0947"`, which is the
/// form the statistics package echoes back in its output tables.
pub fn format_decimal(value: f64) -> String {
    let s = value.to_string();
    if !value.is_finite() || s.contains('.') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Composite identifier of one detected feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureId {
    /// Row id assigned by the batch tool, unique within a job
    pub row_id: u64,
    /// Mass-to-charge ratio
    pub mz: f64,
    /// Retention time in minutes
    pub rt: f64,
}

impl FeatureId {
    /// Create an identifier from raw (unrounded) values
    pub fn new(row_id: u64, mz: f64, rt: f64) -> Self {
        Self { row_id, mz, rt }
    }

    /// m/z as it appears in the identifier
    pub fn rounded_mz(&self) -> f64 {
        round_to(self.mz, MZ_DECIMALS)
    }

    /// Retention time as it appears in the identifier
    pub fn rounded_rt(&self) -> f64 {
        round_to(self.rt, RT_DECIMALS)
    }

    /// Join key shared by every tool's representation of this feature
    pub fn key(&self) -> String {
        self.row_id.to_string()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}mz/{}min",
            self.row_id,
            format_decimal(self.rounded_mz()),
            format_decimal(self.rounded_rt())
        )
    }
}

impl FromStr for FeatureId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PipelineError::InvalidIdentifier(s.to_string());
        let mut parts = s.trim().split('/');

        let row_id = parts
            .next()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .ok_or_else(invalid)?;
        let mz = parts
            .next()
            .and_then(|p| p.strip_suffix("mz"))
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(invalid)?;
        let rt = parts
            .next()
            .and_then(|p| p.strip_suffix("min"))
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(invalid)?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(FeatureId { row_id, mz, rt })
    }
}

/// Reduce any tool's feature key to the canonical join key
///
/// Accepts a full identifier (`12/239.0947mz/0.03min`), a bare row id
/// (`12`) or a float-typed row id (`12.0`), and returns the trimmed row-id
/// component (`12`).
pub fn row_key(raw: &str) -> String {
    let head = raw.trim().split('/').next().unwrap_or("").trim();
    match head.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 && head.contains('.') => {
            format!("{}", v as i64)
        }
        _ => head.to_string(),
    }
}
