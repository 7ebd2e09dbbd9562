use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use datanet_abstract::{AttrValue, Attrs, Topology};

use crate::error::{DatanetError, Result};

/// Source of topology graphs. Swappable so callers can plug other formats.
///
/// Node indices of the returned topology are the node labels when the file
/// gives them, and the file's node ids otherwise.
pub trait GraphReader: Send + Sync {
    fn read_graph(&self, path: &Path) -> Result<Topology>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GmlGraphReader;

impl GraphReader for GmlGraphReader {
    fn read_graph(&self, path: &Path) -> Result<Topology> {
        let text = fs::read_to_string(path).map_err(|e| DatanetError::artifact_io(path, e))?;
        parse_gml(&text).map_err(|message| DatanetError::Graph {
            path: path.to_path_buf(),
            message,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Key(String),
    Int(i64),
    Real(f64),
    Str(String),
    Open,
    Close,
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '[' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ']' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, c)) => value.push(c),
                        None => return Err(format!("unterminated string at byte {start}")),
                    }
                }
                tokens.push(Token::Str(value));
            }
            _ => {
                let mut end = text.len();
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || c == '[' || c == ']' || c == '"' {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                let word = &text[start..end];
                let first = word.chars().next().unwrap_or_default();
                if first.is_ascii_alphabetic() || first == '_' {
                    tokens.push(Token::Key(word.to_string()));
                } else if let Ok(v) = word.parse::<i64>() {
                    tokens.push(Token::Int(v));
                } else if let Ok(v) = word.parse::<f64>() {
                    tokens.push(Token::Real(v));
                } else {
                    return Err(format!("unexpected '{word}' at byte {start}"));
                }
            }
        }
    }
    Ok(tokens)
}

type Pairs = Vec<(String, AttrValue)>;

fn parse_list<I>(tokens: &mut I, nested: bool) -> std::result::Result<Pairs, String>
where
    I: Iterator<Item = Token>,
{
    let mut pairs = Vec::new();
    loop {
        let key = match tokens.next() {
            Some(Token::Key(key)) => key,
            Some(Token::Close) if nested => return Ok(pairs),
            None if !nested => return Ok(pairs),
            None => return Err("missing ']'".to_string()),
            Some(other) => return Err(format!("expected a key, found {other:?}")),
        };
        let value = match tokens.next() {
            Some(Token::Int(v)) => AttrValue::Int(v),
            Some(Token::Real(v)) => AttrValue::Float(v),
            // Numeric strings read back as integers.
            Some(Token::Str(s)) => match s.parse::<i64>() {
                Ok(v) => AttrValue::Int(v),
                Err(_) => AttrValue::Str(s),
            },
            Some(Token::Open) => AttrValue::List(parse_list(tokens, true)?),
            Some(other) => return Err(format!("'{key}' has no value, found {other:?}")),
            None => return Err(format!("'{key}' has no value")),
        };
        pairs.push((key, value));
    }
}

fn id_of(attrs: &Attrs, key: &str, what: &str) -> std::result::Result<usize, String> {
    attrs
        .get(key)
        .and_then(AttrValue::as_i64)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| format!("{what} without a valid '{key}'"))
}

/// Parses the GML subset the simulator emits: nested `key value` lists,
/// integers, reals and quoted strings, with `#` line comments.
pub fn parse_gml(text: &str) -> std::result::Result<Topology, String> {
    let mut tokens = tokenize(text)?.into_iter();
    let top = parse_list(&mut tokens, false)?;
    let body = top
        .into_iter()
        .find_map(|(key, value)| match (key.as_str(), value) {
            ("graph", AttrValue::List(body)) => Some(body),
            _ => None,
        })
        .ok_or("no 'graph [ ... ]' block")?;

    let mut graph_attrs = BTreeMap::new();
    let mut nodes: BTreeMap<usize, Attrs> = BTreeMap::new();
    // file node id -> node index
    let mut index_of: BTreeMap<usize, usize> = BTreeMap::new();
    let mut edges = Vec::new();
    for (key, value) in body {
        match (key.as_str(), value) {
            ("node", AttrValue::List(fields)) => {
                let attrs: Attrs = fields.into_iter().collect();
                let id = id_of(&attrs, "id", "node")?;
                let index = match attrs.get("label") {
                    Some(_) => id_of(&attrs, "label", "node")?,
                    None => id,
                };
                if index_of.insert(id, index).is_some() {
                    return Err(format!("node id {id} defined twice"));
                }
                if nodes.insert(index, attrs).is_some() {
                    return Err(format!("node {index} defined twice"));
                }
            }
            ("edge", AttrValue::List(fields)) => {
                let attrs: Attrs = fields.into_iter().collect();
                let source = id_of(&attrs, "source", "edge")?;
                let target = id_of(&attrs, "target", "edge")?;
                edges.push((source, target, attrs));
            }
            (_, value) => {
                graph_attrs.insert(key.clone(), value);
            }
        }
    }

    let count = nodes.len();
    if nodes.keys().enumerate().any(|(expected, &index)| expected != index) {
        return Err(format!("node indices are not exactly 0..{count}"));
    }
    let directed = graph_attrs
        .get("directed")
        .and_then(AttrValue::as_i64)
        .is_some_and(|v| v != 0);
    let mut topology = Topology::new(directed, graph_attrs, nodes.into_values().collect());
    for (source, target, attrs) in edges {
        let endpoints = index_of.get(&source).zip(index_of.get(&target));
        let added = endpoints.and_then(|(&s, &t)| topology.add_edge(s, t, attrs));
        if added.is_none() {
            return Err(format!("edge ({source}, {target}) references an unknown node"));
        }
    }
    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"
graph [
  directed 0
  # three routers
  node [ id 0 label "0" levelsQoS 2 ]
  node [ id 1 label "1" ]
  node [ id 2 label "2" ]
  edge [ source 0 target 1 bandwidth "10000kbps" ]
  edge [ source 1 target 2 bandwidth 40000 ]
  edge [ source 2 target 0 bandwidth 2.5e4 ]
]
"#;

    #[test]
    fn reads_triangle() {
        let topology = parse_gml(TRIANGLE).unwrap();
        assert_eq!(topology.node_count(), 3);
        assert!(!topology.is_directed());
        assert_eq!(topology.edge_count(), 3);
        assert_eq!(topology.link_bandwidth(1, 0), Some(10000.0));
        assert_eq!(topology.link_bandwidth(1, 2), Some(40000.0));
        assert_eq!(topology.link_bandwidth(0, 2), Some(25000.0));
        assert_eq!(
            topology.node_attr(0, "levelsQoS").and_then(AttrValue::as_i64),
            Some(2)
        );
        // "0" destringizes to an integer label.
        assert_eq!(topology.node_attr(1, "label"), Some(&AttrValue::Int(1)));
    }

    #[test]
    fn nodes_are_indexed_by_label() {
        let text = r#"graph [
  directed 1
  node [ id 10 label "1" ]
  node [ id 11 label "0" ]
  edge [ source 10 target 11 bandwidth 7 ]
]"#;
        let topology = parse_gml(text).unwrap();
        assert_eq!(topology.link_bandwidth(1, 0), Some(7.0));
        assert_eq!(topology.link_bandwidth(0, 1), None);
        assert_eq!(topology.node_attr(0, "id"), Some(&AttrValue::Int(11)));

        let err = parse_gml(r#"graph [ node [ id 0 label "r0" ] ]"#).unwrap_err();
        assert!(err.contains("'label'"));
    }

    #[test]
    fn node_ids_must_be_dense() {
        let err = parse_gml("graph [ node [ id 0 ] node [ id 2 ] ]").unwrap_err();
        assert!(err.contains("0..2"));
    }

    #[test]
    fn rejects_dangling_edges_and_bad_syntax() {
        assert!(parse_gml("graph [ node [ id 0 ] edge [ source 0 target 1 ] ]").is_err());
        assert!(parse_gml("graph [ node [ id 0 ]").is_err());
        assert!(parse_gml("graph [ label \"open ]").is_err());
        assert!(parse_gml("node [ id 0 ]").is_err());
    }

    #[test]
    fn reader_reports_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        fs::write(&path, "graph [").unwrap();
        let err = GmlGraphReader.read_graph(&path).unwrap_err();
        assert!(matches!(err, DatanetError::Graph { .. }));

        let missing = GmlGraphReader
            .read_graph(&dir.path().join("absent.txt"))
            .unwrap_err();
        assert!(matches!(missing, DatanetError::MissingArtifact { .. }));
    }
}
