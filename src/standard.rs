//! Reference-standard and target-compound lookup.
//!
//! Each job is spiked with an internal standard whose m/z and retention time
//! depend on the ionization mode. After peak detection the feature that
//! best represents the standard is located by a window search and recorded
//! in the job table, so downstream normalization can refer to it by
//! identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Ionization mode of an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ionization {
    /// Positive mode
    #[serde(rename = "POS")]
    Positive,
    /// Negative mode
    #[serde(rename = "NEG")]
    Negative,
}

impl Ionization {
    /// Label used in job tables
    pub fn label(&self) -> &'static str {
        match self {
            Ionization::Positive => "POS",
            Ionization::Negative => "NEG",
        }
    }
}

impl fmt::Display for Ionization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Ionization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "POS" => Ok(Ionization::Positive),
            "NEG" => Ok(Ionization::Negative),
            other => Err(other.to_string()),
        }
    }
}

/// An expected m/z and retention time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MzRt {
    /// Mass-to-charge ratio
    pub mz: f64,
    /// Retention time in minutes
    pub rt: f64,
}

/// Search window around an expected m/z and retention time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Allowed absolute m/z deviation (inclusive)
    pub mz_tolerance: f64,
    /// Allowed absolute retention time deviation in minutes (inclusive)
    pub rt_tolerance: f64,
}

impl Window {
    /// True if (mz, rt) lies within the window around `target`
    pub fn contains(&self, target: MzRt, mz: f64, rt: f64) -> bool {
        (mz - target.mz).abs() <= self.mz_tolerance && (rt - target.rt).abs() <= self.rt_tolerance
    }
}

/// Internal standard definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardsConfig {
    /// Standard name, used in messages and sheet names
    pub name: String,
    /// Expected position in positive mode
    pub pos: MzRt,
    /// Expected position in negative mode
    pub neg: MzRt,
    /// Discovery window
    pub window: Window,
    /// Whether jobs carry the standard; a missing match is then fatal
    pub search: bool,
    /// Job table column receiving the discovered identifier
    pub record_column: String,
}

impl Default for StandardsConfig {
    fn default() -> Self {
        Self {
            name: "ABMBA".to_string(),
            pos: MzRt {
                mz: 229.9811,
                rt: 4.685,
            },
            neg: MzRt {
                mz: 227.9655,
                rt: 4.8,
            },
            window: Window {
                mz_tolerance: 0.1,
                rt_tolerance: 1.0,
            },
            search: true,
            record_column: "Standard Feature".to_string(),
        }
    }
}

impl StandardsConfig {
    /// Expected position for an ionization mode
    pub fn position(&self, ionization: Ionization) -> MzRt {
        match ionization {
            Ionization::Positive => self.pos,
            Ionization::Negative => self.neg,
        }
    }
}

/// A named compound searched for in every job of a given ionization mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCompound {
    /// Compound name; the result sheet is called `Putative <name>`
    pub name: String,
    /// Ionization mode the position applies to
    pub ionization: Ionization,
    /// Expected m/z
    pub mz: f64,
    /// Expected retention time in minutes
    pub rt: f64,
}

impl TargetCompound {
    /// Expected position
    pub fn position(&self) -> MzRt {
        MzRt {
            mz: self.mz,
            rt: self.rt,
        }
    }

    /// Name of the result sheet for this target
    pub fn sheet_name(&self) -> String {
        format!("Putative {}", self.name)
    }
}

/// Pick the candidate closest in m/z to the target
///
/// `candidates` yields `(index, mz, rt)`; only those inside `window` are
/// considered. Ties keep the earliest candidate. Returns `None` when nothing
/// falls inside the window.
pub fn best_match<I>(candidates: I, target: MzRt, window: &Window) -> Option<usize>
where
    I: IntoIterator<Item = (usize, f64, f64)>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, mz, rt) in candidates {
        if !window.contains(target, mz, rt) {
            continue;
        }
        let diff = (mz - target.mz).abs();
        match best {
            Some((_, d)) if d <= diff => {}
            _ => best = Some((idx, diff)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Parse an ionization label, attributing failures to a job
pub fn parse_ionization(job: &str, value: &str) -> Result<Ionization, PipelineError> {
    value
        .parse()
        .map_err(|value| PipelineError::InvalidIonization {
            job: job.to_string(),
            value,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_match_prefers_closest_mz() {
        let target = MzRt { mz: 229.9811, rt: 4.685 };
        let window = Window {
            mz_tolerance: 0.1,
            rt_tolerance: 1.0,
        };
        let candidates = vec![
            (0, 229.9811 + 0.08, 4.7),
            (1, 229.9811 - 0.02, 5.2),
            (2, 229.9811 + 0.5, 4.685),
        ];
        assert_eq!(best_match(candidates, target, &window), Some(1));
    }

    #[test]
    fn test_best_match_none_in_window() {
        let target = MzRt { mz: 100.0, rt: 1.0 };
        let window = Window {
            mz_tolerance: 0.1,
            rt_tolerance: 0.5,
        };
        assert_eq!(best_match(vec![(0, 100.0, 2.0), (1, 101.0, 1.0)], target, &window), None);
    }

    #[test]
    fn test_window_is_inclusive() {
        let target = MzRt { mz: 100.0, rt: 1.0 };
        let window = Window {
            mz_tolerance: 0.5,
            rt_tolerance: 0.5,
        };
        assert!(window.contains(target, 100.5, 1.5));
        assert!(!window.contains(target, 100.5001, 1.0));
    }

    #[test]
    fn test_ionization_parsing() {
        assert_eq!(parse_ionization("j", "POS").unwrap(), Ionization::Positive);
        assert_eq!(parse_ionization("j", " NEG ").unwrap(), Ionization::Negative);
        let err = parse_ionization("j", "pos").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidIonization { .. }));
    }

    #[test]
    fn test_standard_position_by_mode() {
        let cfg = StandardsConfig::default();
        assert_eq!(cfg.position(Ionization::Positive).mz, 229.9811);
        assert_eq!(cfg.position(Ionization::Negative).rt, 4.8);
    }
}
