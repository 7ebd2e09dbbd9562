use std::collections::BTreeMap;

use datanet_abstract::{GlobalCounters, ResultCell, SquareMatrix, TrafficCell};

use crate::error::{DatanetError, Result};
use crate::record::{self, Measurement};

pub const CLASS_SEPARATOR: char = '#';
const CLASS_HEADER_FIELDS: usize = 4;

#[derive(Debug, Clone)]
pub struct ClassResults {
    pub tos: u32,
    pub global: GlobalCounters,
    pub pairs: SquareMatrix<Measurement>,
}

/// Decodes `#`-separated class blocks, each shaped like a results line
/// with the class tag in place of the capture time.
pub fn decode_qos_line(line: &str, size: usize) -> Result<Vec<ClassResults>> {
    let mut classes: Vec<ClassResults> = Vec::new();
    for (index, block) in line
        .trim_end()
        .split(CLASS_SEPARATOR)
        .filter(|b| !b.trim().is_empty())
        .enumerate()
    {
        let context = format!("QoS block {index}");
        let (header, groups) = record::split_line(block, &context)?;
        let header = record::parse_fields(header, &context)?;
        if header.len() != CLASS_HEADER_FIELDS {
            return Err(DatanetError::structural(
                &context,
                format!("header has {} fields, expected {CLASS_HEADER_FIELDS}", header.len()),
            ));
        }
        if header[0] < 0.0 || header[0].fract() != 0.0 {
            return Err(DatanetError::structural(
                &context,
                format!("class tag {} is not an integer", header[0]),
            ));
        }
        let tos = u32::try_from(header[0] as i64).map_err(|_| {
            DatanetError::structural(&context, format!("class tag {} is out of range", header[0]))
        })?;
        if classes.iter().any(|c| c.tos == tos) {
            return Err(DatanetError::structural(&context, format!("class {tos} repeated")));
        }
        record::network_size(groups.len(), Some(size), &context)?;
        classes.push(ClassResults {
            tos,
            global: GlobalCounters {
                total_pkts: header[1],
                total_losses: header[2],
                avg_delay: header[3],
            },
            pairs: record::decode_pairs(&groups, size, &context)?,
        });
    }
    if classes.is_empty() {
        return Err(DatanetError::structural("QoS line", "no class blocks"));
    }
    Ok(classes)
}

/// Adds the per-class figures under every cell's `qos` key and returns the
/// per-class global counters. Non-QoS fields are left untouched.
pub fn attach_qos(
    classes: Vec<ClassResults>,
    results: &mut SquareMatrix<ResultCell>,
    traffic: &mut SquareMatrix<TrafficCell>,
) -> BTreeMap<u32, GlobalCounters> {
    for (_, cell) in results.iter_mut() {
        cell.qos = Some(BTreeMap::new());
    }
    for (_, cell) in traffic.iter_mut() {
        cell.qos = Some(BTreeMap::new());
    }

    let mut globals = BTreeMap::new();
    for class in classes {
        for ((src, dst), m) in class.pairs.iter() {
            if let Some(qos) = results.get_mut(src, dst).and_then(|c| c.qos.as_mut()) {
                qos.insert(class.tos, m.perf.clone());
            }
            if let Some(qos) = traffic.get_mut(src, dst).and_then(|c| c.qos.as_mut()) {
                qos.insert(class.tos, m.traffic);
            }
        }
        globals.insert(class.tos, class.global);
    }
    globals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{assemble_matrices, decode_results_line, decode_traffic_matrix};

    const TUPLE: &str = "10,5,1.5,12.3,2.1,1,2,3,4,5";

    fn block(tos: u32, n: usize) -> String {
        format!("{tos},100,2,0.01|{}", vec![TUPLE; n * n].join(";"))
    }

    #[test]
    fn every_cell_gets_every_class() {
        let line = format!("{}#{}", block(0, 2), block(2, 2));
        let classes = decode_qos_line(&line, 2).unwrap();

        let line = format!("1,1,1,1|{}", vec![TUPLE; 4].join(";"));
        let results = decode_results_line(&line, Some(2)).unwrap();
        let tm = decode_traffic_matrix("0\n", 2).unwrap();
        let (mut r, mut t) = assemble_matrices(&results, None, tm).unwrap();
        let before = r[(0, 1)].aggregate.clone();
        let globals = attach_qos(classes, &mut r, &mut t);

        assert_eq!(globals.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        for (_, cell) in r.iter() {
            let tags: Vec<u32> = cell.qos.as_ref().unwrap().keys().copied().collect();
            assert_eq!(tags, vec![0, 2]);
        }
        assert!(t.iter().all(|(_, c)| c.qos.as_ref().is_some_and(|q| q.len() == 2)));
        assert_eq!(r[(0, 1)].aggregate, before);
    }

    #[test]
    fn repeated_class_and_wrong_size_are_rejected() {
        let line = format!("{}#{}", block(1, 2), block(1, 2));
        assert!(decode_qos_line(&line, 2).is_err());
        assert!(decode_qos_line(&block(0, 3), 2).is_err());
        assert!(decode_qos_line("", 2).is_err());
    }

    #[test]
    fn class_tag_must_fit_u32() {
        let line = format!("4294967296,100,2,0.01|{TUPLE}");
        let err = decode_qos_line(&line, 1).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(decode_qos_line(&format!("-1,100,2,0.01|{TUPLE}"), 1).is_err());
        assert_eq!(decode_qos_line(&block(4294967295, 1), 1).unwrap()[0].tos, u32::MAX);
    }

    #[test]
    fn trailing_separator_is_dropped_before_size_check() {
        let line = format!("{};", block(0, 3));
        let err = decode_qos_line(&line, 2).unwrap_err();
        assert!(err.to_string().contains("topology has 2"));
        assert_eq!(decode_qos_line(&format!("{};", block(0, 2)), 2).unwrap().len(), 1);
    }
}
