//! Node table extraction from the molecular-networking GraphML export.
//!
//! Only node attributes are read; edges are skipped. The node id becomes
//! the `shared name` join key, and every `<key for="node">` declaration
//! becomes a column in declaration order.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{PipelineError, Result};
use crate::join::SHARED_NAME;
use crate::table::{Cell, Table};

/// Attribute value of an element, unescaped
fn get_attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| PipelineError::Xml(quick_xml::Error::from(e)))?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Column layout declared by `<key>` elements
#[derive(Debug)]
struct Keys {
    /// key id -> column position
    positions: HashMap<String, usize>,
    columns: Vec<String>,
}

impl Keys {
    fn new() -> Self {
        Self {
            positions: HashMap::new(),
            columns: vec![SHARED_NAME.to_string()],
        }
    }

    fn declare(&mut self, e: &BytesStart) -> Result<()> {
        let target = get_attribute(e, "for")?.unwrap_or_else(|| "all".to_string());
        if target != "node" && target != "all" {
            return Ok(());
        }
        if let (Some(id), Some(name)) = (get_attribute(e, "id")?, get_attribute(e, "attr.name")?) {
            // The node id already fills this column
            if name != SHARED_NAME {
                self.positions.insert(id, self.columns.len());
                self.columns.push(name);
            }
        }
        Ok(())
    }

    fn new_row(&self, e: &BytesStart) -> Result<Vec<Cell>> {
        let id = get_attribute(e, "id")?.unwrap_or_default();
        let mut row = vec![Cell::Null; self.columns.len()];
        row[0] = Cell::parse(&id);
        Ok(row)
    }
}

/// Read the node table of a GraphML file
pub fn read_node_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let table = parse_node_table(BufReader::new(file))?;
    Ok(table.with_name(path.display().to_string()))
}

/// Parse GraphML from any buffered reader
pub fn parse_node_table<R: BufRead>(input: R) -> Result<Table> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut keys = Keys::new();
    let mut nodes: Vec<Vec<Cell>> = Vec::new();

    let mut current: Option<Vec<Cell>> = None;
    let mut current_col: Option<usize> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"key" => keys.declare(e)?,
                b"node" => current = Some(keys.new_row(e)?),
                b"data" if current.is_some() => {
                    current_col = get_attribute(e, "key")?
                        .and_then(|k| keys.positions.get(&k).copied());
                    text.clear();
                }
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"key" => keys.declare(e)?,
                b"node" => nodes.push(keys.new_row(e)?),
                _ => {}
            },
            Event::Text(ref t) if current_col.is_some() => {
                text.push_str(&t.unescape()?);
            }
            Event::CData(ref t) if current_col.is_some() => {
                text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"data" => {
                    if let (Some(row), Some(col)) = (current.as_mut(), current_col.take()) {
                        row[col] = Cell::parse(&text);
                    }
                }
                b"node" => {
                    if let Some(row) = current.take() {
                        nodes.push(row);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let mut table = Table::new("network node table", keys.columns);
    for row in nodes {
        table.push_row(row);
    }
    debug!(
        "Read {} nodes with {} attributes",
        table.len(),
        table.columns().len() - 1
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPHML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="d0" for="node" attr.name="precursor mass" attr.type="double"/>
  <key id="d1" for="node" attr.name="componentindex" attr.type="int"/>
  <key id="d2" for="node" attr.name="Compound_Name" attr.type="string"/>
  <key id="d3" for="edge" attr.name="cosine_score" attr.type="double"/>
  <graph edgedefault="undirected">
    <node id="12">
      <data key="d0">239.0947</data>
      <data key="d1">-1</data>
    </node>
    <node id="4867">
      <data key="d0">504.3237</data>
      <data key="d1">3</data>
      <data key="d2">Tryptophan &amp; co</data>
    </node>
    <node id="5"/>
    <edge source="12" target="4867">
      <data key="d3">0.8</data>
    </edge>
  </graph>
</graphml>
"#;

    #[test]
    fn test_parse_nodes() {
        let table = parse_node_table(GRAPHML.as_bytes()).unwrap();
        assert_eq!(
            table.columns(),
            &["shared name", "precursor mass", "componentindex", "Compound_Name"]
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.value(0, "shared name"), Some(&Cell::Number(12.0)));
        assert_eq!(table.value(0, "componentindex"), Some(&Cell::Number(-1.0)));
        assert_eq!(table.value(0, "Compound_Name"), Some(&Cell::Null));
        assert_eq!(
            table.value(1, "Compound_Name"),
            Some(&Cell::from("Tryptophan & co"))
        );
        assert_eq!(table.value(2, "precursor mass"), Some(&Cell::Null));
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_node_table("<graphml><node id=\"1\"></graph>".as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::Xml(_)));
    }
}
