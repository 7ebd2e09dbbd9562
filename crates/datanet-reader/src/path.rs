use std::collections::HashMap;

use datanet_abstract::{Endpoint, PhysicalPathMatrix, PortLabel, RoutingMatrix};
use tracing::debug;

use crate::error::{DatanetError, Result};

/// Reads one `src n1 n2 ... dst` path per line.
pub fn decode_routing(text: &str, size: usize, require_full: bool) -> Result<RoutingMatrix> {
    let mut routing = RoutingMatrix::new(size);
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let context = format!("routing file, line {}", number + 1);
        let path = line
            .split_whitespace()
            .map(|raw| {
                let node: usize = raw.parse().map_err(|_| {
                    DatanetError::structural(&context, format!("'{raw}' is not a node id"))
                })?;
                if node >= size {
                    return Err(DatanetError::structural(
                        &context,
                        format!("node {node} outside a {size}-node network"),
                    ));
                }
                Ok(node)
            })
            .collect::<Result<Vec<_>>>()?;
        let (src, dst) = match (path.first(), path.last()) {
            (Some(&src), Some(&dst)) if path.len() >= 2 => (src, dst),
            _ => {
                return Err(DatanetError::structural(&context, "path needs at least two nodes"));
            }
        };
        if src == dst {
            return Err(DatanetError::structural(&context, format!("path loops back to {src}")));
        }
        if routing.insert(src, dst, path).is_some() {
            return Err(DatanetError::structural(
                &context,
                format!("pair ({src}, {dst}) routed twice"),
            ));
        }
    }

    if require_full {
        if let Some((src, dst)) = routing.undefined_pairs().next() {
            return Err(DatanetError::structural(
                "routing file",
                format!("no path for pair ({src}, {dst})"),
            ));
        }
    } else {
        let missing = routing.undefined_pairs().count();
        if missing > 0 {
            debug!("routing leaves {} pairs unreachable", missing);
        }
    }
    Ok(routing)
}

pub fn parse_endpoint(raw: &str) -> Option<Endpoint> {
    let split = raw.find(|c: char| c.is_ascii_digit())?;
    let (kind, id) = raw.split_at(split);
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(Endpoint {
        kind: kind.to_string(),
        id: id.parse().ok()?,
    })
}

/// Parses `<type><id>-<peerType><peerId>-<count>`.
pub fn parse_port_label(raw: &str) -> Option<PortLabel> {
    let mut parts = raw.split('-');
    let node = parse_endpoint(parts.next()?)?;
    let peer = parse_endpoint(parts.next()?)?;
    let count = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(PortLabel { node, peer, count })
}

/// Port labels of every physical segment, keyed by the endpoints it joins.
#[derive(Debug, Clone, Default)]
pub struct PortSegments {
    segments: HashMap<(Endpoint, Endpoint), Vec<String>>,
}

impl PortSegments {
    pub fn get(&self, from: &Endpoint, to: &Endpoint) -> Option<&[String]> {
        self.segments
            .get(&(from.clone(), to.clone()))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

pub fn decode_port_segments(text: &str) -> Result<PortSegments> {
    let mut segments = HashMap::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let context = format!("port file, line {}", number + 1);
        let labels = line
            .split_whitespace()
            .map(|raw| {
                parse_port_label(raw).ok_or_else(|| {
                    DatanetError::structural(&context, format!("'{raw}' is not a port label"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let (Some(first), Some(last)) = (labels.first(), labels.last()) else {
            continue;
        };
        let key = (first.node.clone(), last.peer.clone());
        let raw: Vec<String> = labels.iter().map(PortLabel::to_string).collect();
        if segments.insert(key, raw).is_some() {
            return Err(DatanetError::structural(
                &context,
                format!("segment {}->{} listed twice", first.node, last.peer),
            ));
        }
    }
    Ok(PortSegments { segments })
}

/// Physical endpoints a routed node is reached through.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttachment {
    pub tg: Endpoint,
    pub node: Endpoint,
}

/// Reads `nodeId tgEndpoint nodeEndpoint` lines; every node must appear once.
pub fn decode_tg_mapping(text: &str, size: usize) -> Result<Vec<NodeAttachment>> {
    let mut slots: Vec<Option<NodeAttachment>> = vec![None; size];
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let context = format!("tg mapping, line {}", number + 1);
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [id, tg, node] = parts.as_slice() else {
            return Err(DatanetError::structural(
                &context,
                format!("expected 'nodeId tg node', got {} fields", parts.len()),
            ));
        };
        let id: usize = id
            .parse()
            .ok()
            .filter(|&id| id < size)
            .ok_or_else(|| DatanetError::structural(&context, format!("bad node id '{id}'")))?;
        let endpoint = |raw: &str| {
            parse_endpoint(raw).ok_or_else(|| {
                DatanetError::structural(&context, format!("'{raw}' is not an endpoint"))
            })
        };
        let attachment = NodeAttachment {
            tg: endpoint(*tg)?,
            node: endpoint(*node)?,
        };
        if slots[id].replace(attachment).is_some() {
            return Err(DatanetError::structural(&context, format!("node {id} mapped twice")));
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(id, slot)| {
            slot.ok_or_else(|| {
                DatanetError::structural(
                    "tg mapping",
                    format!("node {id} has no traffic generator"),
                )
            })
        })
        .collect()
}

/// Concatenates port segments along every logical path.
pub fn build_physical_paths(
    routing: &RoutingMatrix,
    segments: &PortSegments,
    attachments: &[NodeAttachment],
) -> Result<PhysicalPathMatrix> {
    let size = routing.size();
    if attachments.len() != size {
        return Err(DatanetError::structural(
            "tg mapping",
            format!("{} nodes mapped, routing has {size}", attachments.len()),
        ));
    }
    let segment = |from: &Endpoint, to: &Endpoint, src: usize, dst: usize| {
        segments.get(from, to).ok_or_else(|| {
            DatanetError::structural(
                format!("physical path ({src}, {dst})"),
                format!("no port segment from {from} to {to}"),
            )
        })
    };

    let mut physical = PhysicalPathMatrix::new(size);
    for src in 0..size {
        for dst in 0..size {
            let Some(hops) = routing.path(src, dst) else {
                continue;
            };
            let mut labels = Vec::new();
            let first = &attachments[src];
            labels.extend_from_slice(segment(&first.tg, &first.node, src, dst)?);
            for pair in hops.windows(2) {
                let (a, b) = (&attachments[pair[0]].node, &attachments[pair[1]].node);
                labels.extend_from_slice(segment(a, b, src, dst)?);
            }
            let last = &attachments[dst];
            labels.extend_from_slice(segment(&last.node, &last.tg, src, dst)?);
            physical.insert(src, dst, labels);
        }
    }
    Ok(physical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_node_routing() {
        let routing = decode_routing("0 1 2\n2 1 0\n", 3, false).unwrap();
        assert_eq!(routing.path(0, 2), Some(&[0, 1, 2][..]));
        assert_eq!(routing.path(2, 0), Some(&[2, 1, 0][..]));
        assert_eq!(routing.path(0, 0), None);
        assert_eq!(routing.path(1, 0), None);
    }

    #[test]
    fn full_routing_requirement() {
        assert!(decode_routing("0 1\n", 2, true).is_err());
        assert!(decode_routing("0 1\n1 0\n", 2, true).is_ok());
    }

    #[test]
    fn malformed_routing_lines() {
        assert!(decode_routing("0\n", 3, false).is_err());
        assert!(decode_routing("0 5\n", 3, false).is_err());
        assert!(decode_routing("0 x 2\n", 3, false).is_err());
        assert!(decode_routing("0 2\n0 1 2\n", 3, false).is_err());
    }

    #[test]
    fn port_labels() {
        let label = parse_port_label("r10-s3-2").unwrap();
        assert_eq!(label.node.kind, "r");
        assert_eq!(label.node.id, 10);
        assert_eq!(label.peer.to_string(), "s3");
        assert_eq!(label.count, 2);
        assert!(parse_port_label("r10-s3").is_none());
        assert!(parse_port_label("10-s3-1").is_none());
    }

    const PORTS: &str = "t0-r0-1\nr0-t0-1\nt1-r1-1\nr1-t1-1\nr0-s5-2 s5-r1-3\nr1-s5-4 s5-r0-1\n";
    const TGS: &str = "0 t0 r0\n1 t1 r1\n";

    #[test]
    fn physical_path_stitches_segments() {
        let routing = decode_routing("0 1\n1 0\n", 2, false).unwrap();
        let segments = decode_port_segments(PORTS).unwrap();
        let tgs = decode_tg_mapping(TGS, 2).unwrap();
        let physical = build_physical_paths(&routing, &segments, &tgs).unwrap();

        assert_eq!(
            physical.path(0, 1).unwrap(),
            &["t0-r0-1", "r0-s5-2", "s5-r1-3", "r1-t1-1"]
        );
        assert_eq!(physical.path(1, 1), None);
    }

    #[test]
    fn missing_segment_is_an_error() {
        let routing = decode_routing("0 1\n1 0\n", 2, false).unwrap();
        let ports = "t0-r0-1\nr0-t0-1\nt1-r1-1\nr1-t1-1\nr0-r1-1\n";
        let segments = decode_port_segments(ports).unwrap();
        let tgs = decode_tg_mapping(TGS, 2).unwrap();
        let err = build_physical_paths(&routing, &segments, &tgs).unwrap_err();
        assert!(err.to_string().contains("no port segment from r1 to r0"));
    }

    #[test]
    fn tg_mapping_must_cover_every_node() {
        assert!(decode_tg_mapping("0 t0 r0\n", 2).is_err());
        assert!(decode_tg_mapping("0 t0 r0\n0 t1 r1\n", 2).is_err());
    }
}
