use std::fmt;

use crate::identifier::row_key;

/// A single nullable table value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Empty field
    Null,
    /// Numeric field
    Number(f64),
    /// Any other text
    Text(String),
}

impl Cell {
    /// Type a raw CSV field
    ///
    /// Infinity spellings and overflowing literals stay text; `NaN` is the
    /// only non-finite number read.
    pub fn parse(raw: &str) -> Cell {
        let s = raw.trim();
        if s.is_empty() {
            return Cell::Null;
        }
        if s == "NaN" || s == "nan" {
            return Cell::Number(f64::NAN);
        }
        let numeric_start = s
            .chars()
            .next()
            .map(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
            .unwrap_or(false);
        if numeric_start {
            if let Ok(v) = s.parse::<f64>() {
                if !v.is_infinite() {
                    return Cell::Number(v);
                }
            }
        }
        Cell::Text(raw.to_string())
    }

    /// Cell from an optional number
    pub fn from_opt(value: Option<f64>) -> Cell {
        value.map(Cell::Number).unwrap_or(Cell::Null)
    }

    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True for [`Cell::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Join key for this cell, regardless of how the tool typed it
    ///
    /// `12`, `12.0`, `"12"` and `"12/239.0947mz/0.03min"` all map to `"12"`.
    pub fn to_key(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Number(v) if v.is_nan() => None,
            Cell::Number(v) => Some(row_key(&format_number(*v))),
            Cell::Text(s) => {
                let key = row_key(s);
                if key.is_empty() {
                    None
                } else {
                    Some(key)
                }
            }
        }
    }
}

/// Render a number for output; integral values print without a fraction
pub(crate) fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        v.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(v) => f.write_str(&format_number(*v)),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}
