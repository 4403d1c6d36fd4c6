//! Separation of low-confidence library matches.
//!
//! The network service labels tentative library hits with a marker (by
//! default `Suspect`). These are moved out of the annotation column into
//! their own column so that "has an annotation" means a confident match.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::table::{Cell, Table};

/// Annotation column settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Column holding library compound names
    pub column: String,
    /// Substring marking a low-confidence match
    pub suspect_marker: String,
    /// Move marked matches into `suspect_column`
    pub split_suspect: bool,
    /// Column receiving marked matches
    pub suspect_column: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            column: "Compound_Name".to_string(),
            suspect_marker: "Suspect".to_string(),
            split_suspect: true,
            suspect_column: "Suspect_Compound_Match".to_string(),
        }
    }
}

/// Move marked annotations into the suspect column
///
/// Returns the number of annotations moved. A table without an annotation
/// column is left untouched.
pub fn split_suspect_matches(table: &mut Table, config: &AnnotationConfig) -> usize {
    let Some(col) = table.column_index(&config.column) else {
        return 0;
    };

    let mut names = Vec::with_capacity(table.len());
    let mut suspects = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let cell = table.cell(row, col);
        match cell.as_str() {
            Some(s) if s.contains(config.suspect_marker.as_str()) => {
                names.push(Cell::Null);
                suspects.push(cell.clone());
            }
            _ => {
                names.push(cell.clone());
                suspects.push(Cell::Null);
            }
        }
    }

    let moved = suspects.iter().filter(|c| !c.is_null()).count();
    table.set_column(config.column.clone(), names);
    table.set_column(config.suspect_column.clone(), suspects);
    debug!("Moved {} suspect annotations", moved);
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Delimiter;

    #[test]
    fn test_split_suspect() {
        let data = "shared name,Compound_Name
1,Suspect related to Tryptophan
2,Tryptophan
3,
";
        let mut table = Table::from_reader(data.as_bytes(), Delimiter::Comma, "nodes").unwrap();
        let moved = split_suspect_matches(&mut table, &AnnotationConfig::default());

        assert_eq!(moved, 1);
        assert_eq!(table.value(0, "Compound_Name"), Some(&Cell::Null));
        assert_eq!(
            table.value(0, "Suspect_Compound_Match"),
            Some(&Cell::from("Suspect related to Tryptophan"))
        );
        assert_eq!(table.value(1, "Compound_Name"), Some(&Cell::from("Tryptophan")));
        assert_eq!(table.value(2, "Suspect_Compound_Match"), Some(&Cell::Null));
    }

    #[test]
    fn test_missing_annotation_column() {
        let mut table =
            Table::from_reader("shared name\n1\n".as_bytes(), Delimiter::Comma, "nodes").unwrap();
        assert_eq!(split_suspect_matches(&mut table, &AnnotationConfig::default()), 0);
        assert!(!table.has_column("Suspect_Compound_Match"));
    }
}
