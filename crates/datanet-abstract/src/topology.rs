use petgraph::graph::{Graph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::matrix::SquareMatrix;

/// Value of a node, edge or graph attribute in a graph description file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<(String, AttrValue)>),
}

impl AttrValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric reading of the value. Strings such as `"10000kbps"` yield
    /// their leading number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Str(s) => leading_number(s),
            AttrValue::List(_) => None,
        }
    }
}

fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

pub type Attrs = BTreeMap<String, AttrValue>;

/// Node/edge attributed graph of a network. Node ids are `0..node_count()`
/// and map one to one onto petgraph node indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    directed: bool,
    graph_attrs: Attrs,
    graph: Graph<Attrs, Attrs>,
}

impl Topology {
    pub fn new(directed: bool, graph_attrs: Attrs, nodes: Vec<Attrs>) -> Self {
        let mut graph = Graph::with_capacity(nodes.len(), 0);
        for attrs in nodes {
            graph.add_node(attrs);
        }
        Self {
            directed,
            graph_attrs,
            graph,
        }
    }

    /// Adds a link; `None` when either endpoint is not a node.
    pub fn add_edge(&mut self, source: usize, target: usize, attrs: Attrs) -> Option<usize> {
        let count = self.node_count();
        if source >= count || target >= count {
            return None;
        }
        let edge = self
            .graph
            .add_edge(NodeIndex::new(source), NodeIndex::new(target), attrs);
        Some(edge.index())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// `(source, target, attrs)` of every link, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &Attrs)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| (e.source().index(), e.target().index(), &e.weight))
    }

    pub fn graph_attr(&self, key: &str) -> Option<&AttrValue> {
        self.graph_attrs.get(key)
    }

    pub fn node_attrs(&self, node: usize) -> Option<&Attrs> {
        self.graph.node_weight(NodeIndex::new(node))
    }

    pub fn node_attr(&self, node: usize, key: &str) -> Option<&AttrValue> {
        self.node_attrs(node)?.get(key)
    }

    /// Attributes of a link joining `src` to `dst` (either direction for
    /// undirected graphs).
    pub fn edge(&self, src: usize, dst: usize) -> Option<&Attrs> {
        let count = self.node_count();
        if src >= count || dst >= count {
            return None;
        }
        let (a, b) = (NodeIndex::new(src), NodeIndex::new(dst));
        let edge = if self.directed {
            self.graph.find_edge(a, b)
        } else {
            self.graph.find_edge_undirected(a, b).map(|(edge, _)| edge)
        };
        self.graph.edge_weight(edge?)
    }

    pub fn neighbors(&self, node: usize) -> Vec<usize> {
        if node >= self.node_count() {
            return Vec::new();
        }
        let index = NodeIndex::new(node);
        let adjacent = if self.directed {
            self.graph.neighbors(index)
        } else {
            self.graph.neighbors_undirected(index)
        };
        let mut out: Vec<usize> = adjacent.map(NodeIndex::index).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn link_bandwidth(&self, src: usize, dst: usize) -> Option<f64> {
        self.edge(src, dst)?.get("bandwidth")?.as_f64()
    }

    /// Bandwidth of every adjacent pair; `None` where nodes are not adjacent.
    pub fn bandwidth_matrix(&self) -> SquareMatrix<Option<f64>> {
        SquareMatrix::from_fn(self.node_count(), |src, dst| self.link_bandwidth(src, dst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bandwidth(bw: AttrValue) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert("bandwidth".to_string(), bw);
        attrs
    }

    #[test]
    fn bandwidth_reads_numbers_and_unit_strings() {
        let mut topo = Topology::new(true, Attrs::new(), vec![Attrs::new(); 3]);
        topo.add_edge(0, 1, bandwidth(AttrValue::Int(10_000))).unwrap();
        topo.add_edge(1, 2, bandwidth(AttrValue::Str("25000kbps".to_string())))
            .unwrap();
        let m = topo.bandwidth_matrix();
        assert_eq!(m[(0, 1)], Some(10_000.0));
        assert_eq!(m[(1, 2)], Some(25_000.0));
        assert_eq!(m[(1, 0)], None);
        assert_eq!(topo.neighbors(1), vec![2]);
        assert_eq!(topo.edge_count(), 2);
    }

    #[test]
    fn undirected_edges_match_both_ways() {
        let mut topo = Topology::new(false, Attrs::new(), vec![Attrs::new(); 2]);
        topo.add_edge(0, 1, bandwidth(AttrValue::Float(5.5))).unwrap();
        assert_eq!(topo.link_bandwidth(1, 0), Some(5.5));
        assert_eq!(topo.neighbors(1), vec![0]);
    }

    #[test]
    fn out_of_range_nodes_are_absent() {
        let mut topo = Topology::new(true, Attrs::new(), vec![Attrs::new(); 2]);
        assert_eq!(topo.add_edge(0, 2, Attrs::new()), None);
        assert_eq!(topo.edge(0, 5), None);
        assert!(topo.neighbors(9).is_empty());
        assert_eq!(topo.node_attrs(2), None);
        assert_eq!(topo.edges().count(), 0);
    }
}
