use serde::{Deserialize, Serialize};
use std::fmt;

use crate::matrix::SquareMatrix;

/// Logical paths: cell `(src, dst)` is the node sequence from `src` to
/// `dst` inclusive. Undefined cells mean the pair is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingMatrix {
    paths: SquareMatrix<Option<Vec<usize>>>,
}

impl RoutingMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            paths: SquareMatrix::from_fn(size, |_, _| None),
        }
    }

    pub fn size(&self) -> usize {
        self.paths.size()
    }

    pub fn path(&self, src: usize, dst: usize) -> Option<&[usize]> {
        self.paths.get(src, dst)?.as_deref()
    }

    /// Stores a path, returning the one it replaced.
    pub fn insert(&mut self, src: usize, dst: usize, path: Vec<usize>) -> Option<Vec<usize>> {
        self.paths.get_mut(src, dst)?.replace(path)
    }

    /// Ordered pairs with `src != dst` that have no path.
    pub fn undefined_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.paths
            .iter()
            .filter(|((src, dst), path)| src != dst && path.is_none())
            .map(|(pos, _)| pos)
    }
}

/// Physical endpoint such as `r0` (router 0), `s3` (switch 3) or `t1`
/// (traffic generator 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub kind: String,
    pub id: usize,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.id)
    }
}

/// Port label `<node>-<peer>-<count>`: port `count` of `node` facing `peer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortLabel {
    pub node: Endpoint,
    pub peer: Endpoint,
    pub count: u32,
}

impl fmt::Display for PortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.node, self.peer, self.count)
    }
}

/// Physical paths: cell `(src, dst)` lists every port label traversed from
/// the source traffic generator to the destination traffic generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPathMatrix {
    paths: SquareMatrix<Option<Vec<String>>>,
}

impl PhysicalPathMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            paths: SquareMatrix::from_fn(size, |_, _| None),
        }
    }

    pub fn size(&self) -> usize {
        self.paths.size()
    }

    pub fn path(&self, src: usize, dst: usize) -> Option<&[String]> {
        self.paths.get(src, dst)?.as_deref()
    }

    pub fn insert(&mut self, src: usize, dst: usize, path: Vec<String>) -> Option<Vec<String>> {
        self.paths.get_mut(src, dst)?.replace(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_pairs_skip_diagonal() {
        let mut routing = RoutingMatrix::new(2);
        routing.insert(0, 1, vec![0, 1]);
        let missing: Vec<_> = routing.undefined_pairs().collect();
        assert_eq!(missing, vec![(1, 0)]);
        assert_eq!(routing.path(0, 1), Some(&[0, 1][..]));
        assert_eq!(routing.path(0, 0), None);
    }

    #[test]
    fn port_label_display() {
        let label = PortLabel {
            node: Endpoint {
                kind: "r".to_string(),
                id: 0,
            },
            peer: Endpoint {
                kind: "s".to_string(),
                id: 3,
            },
            count: 1,
        };
        assert_eq!(label.to_string(), "r0-s3-1");
    }
}
