//! Cluster expansion over the molecular network.
//!
//! A filter selects individual nodes. For network display the whole
//! cluster of each selected node is kept, so that its neighbours remain
//! visible. Clusters are identified by the node table's `componentindex`;
//! `-1` marks singletons, which do not form a cluster and are kept only when
//! they pass the filter themselves.

use std::collections::HashSet;

use crate::error::Result;
use crate::table::{Cell, Table};

/// Node table column holding the cluster index
pub const COMPONENT_INDEX: &str = "componentindex";
/// Output flag: the node itself passed the filter
pub const KEEP_NODE: &str = "keep_node";
/// Output flag: the node belongs to a kept cluster
pub const KEEP_COMPONENT: &str = "keep_componentindex";
/// Component index of nodes without any edge
pub const SINGLETON: i64 = -1;

/// Per-node retention flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSelection {
    /// Node passed the filter
    pub keep_node: Vec<bool>,
    /// Node's cluster contains a passing node
    pub keep_component: Vec<bool>,
}

impl ClusterSelection {
    /// Number of nodes retained for display
    pub fn retained(&self) -> usize {
        self.keep_component.iter().filter(|&&k| k).count()
    }
}

fn component(cell: &Cell) -> Option<i64> {
    cell.as_f64()
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .map(|v| v as i64)
}

/// Expand a node mask to whole clusters
///
/// Nodes with an unreadable component index behave like singletons.
pub fn expand_clusters(table: &Table, mask: &[bool]) -> Result<ClusterSelection> {
    let col = table.require_column(COMPONENT_INDEX)?;
    let components: Vec<Option<i64>> = (0..table.len())
        .map(|row| component(table.cell(row, col)))
        .collect();

    let kept: HashSet<i64> = components
        .iter()
        .zip(mask)
        .filter_map(|(c, &keep)| if keep { *c } else { None })
        .filter(|&c| c != SINGLETON)
        .collect();

    let keep_component = components
        .iter()
        .zip(mask)
        .map(|(c, &keep)| match c {
            Some(c) if *c != SINGLETON => kept.contains(c),
            _ => keep,
        })
        .collect();

    Ok(ClusterSelection {
        keep_node: mask.to_vec(),
        keep_component,
    })
}

/// Write the selection flags onto the table as `TRUE`/`FALSE` text columns
pub fn add_selection_columns(table: &mut Table, selection: &ClusterSelection) {
    let flag = |b: &bool| Cell::from(if *b { "TRUE" } else { "FALSE" });
    table.set_column(KEEP_NODE, selection.keep_node.iter().map(flag).collect());
    table.set_column(
        KEEP_COMPONENT,
        selection.keep_component.iter().map(flag).collect(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Delimiter;

    fn nodes() -> Table {
        let data = "shared name,componentindex
1,3
2,3
3,-1
4,-1
5,7
6,
";
        Table::from_reader(data.as_bytes(), Delimiter::Comma, "nodes").unwrap()
    }

    #[test]
    fn test_cluster_members_follow_passing_node() {
        let mask = [true, false, false, true, false, false];
        let sel = expand_clusters(&nodes(), &mask).unwrap();
        assert_eq!(sel.keep_node, mask.to_vec());
        assert_eq!(
            sel.keep_component,
            vec![true, true, false, true, false, false]
        );
        assert_eq!(sel.retained(), 3);
    }

    #[test]
    fn test_passing_singleton_does_not_pull_other_singletons() {
        let mask = [false, false, true, false, false, true];
        let sel = expand_clusters(&nodes(), &mask).unwrap();
        assert_eq!(
            sel.keep_component,
            vec![false, false, true, false, false, true]
        );
    }

    #[test]
    fn test_selection_columns() {
        let mut table = nodes();
        let mask = [false, false, false, false, true, false];
        let sel = expand_clusters(&table, &mask).unwrap();
        add_selection_columns(&mut table, &sel);
        assert_eq!(table.value(4, KEEP_NODE), Some(&Cell::from("TRUE")));
        assert_eq!(table.value(0, KEEP_COMPONENT), Some(&Cell::from("FALSE")));
    }
}
