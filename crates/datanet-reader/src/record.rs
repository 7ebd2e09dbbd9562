use datanet_abstract::{
    GlobalCounters, PerfRecord, ResultCell, SquareMatrix, TrafficAggregate, TrafficCell,
    TrafficDescriptor, exact_side,
};

use crate::distribution;
use crate::error::{DatanetError, Result};

pub const HEADER_SEPARATOR: char = '|';
pub const GROUP_SEPARATOR: char = ';';
pub const FIELD_SEPARATOR: char = ',';
pub const FLOW_SEPARATOR: char = ':';
/// Flow-level group stating that the aggregate is the pair's only flow.
pub const AGGREGATE_FLOW_MARKER: &str = "*";

/// Mandatory leading fields of a performance tuple; jitter may follow.
const PERF_MIN_FIELDS: usize = 10;
const PERF_MAX_FIELDS: usize = 11;
const RESULTS_HEADER_FIELDS: usize = 4;

/// Traffic and performance figures read from one performance tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub traffic: TrafficAggregate,
    pub perf: PerfRecord,
}

/// Content of one aggregate results line.
#[derive(Debug, Clone)]
pub struct DecodedResults {
    pub capture_time: f64,
    pub global: GlobalCounters,
    pub pairs: SquareMatrix<Measurement>,
}

/// Content of one per-run traffic-matrix file.
#[derive(Debug, Clone)]
pub struct DecodedTrafficMatrix {
    pub max_link_load: f64,
    pub flows: SquareMatrix<Vec<TrafficDescriptor>>,
}

/// Validates a row-major group count against the known network size.
/// Group `i` belongs to pair `(i / N, i % N)`.
pub fn network_size(group_count: usize, expected: Option<usize>, context: &str) -> Result<usize> {
    let side = exact_side(group_count).ok_or_else(|| {
        DatanetError::structural(
            context,
            format!("{group_count} src-dst groups is not a perfect square"),
        )
    })?;
    match expected {
        Some(n) if n != side => Err(DatanetError::structural(
            context,
            format!("{group_count} groups describe {side} nodes, topology has {n}"),
        )),
        _ => Ok(side),
    }
}

pub fn parse_fields(text: &str, context: &str) -> Result<Vec<f64>> {
    text.split(FIELD_SEPARATOR)
        .map(|raw| {
            raw.trim().parse::<f64>().map_err(|_| {
                DatanetError::structural(context, format!("'{}' is not a number", raw.trim()))
            })
        })
        .collect()
}

pub fn decode_measurement(fields: &[f64], context: &str) -> Result<Measurement> {
    if !(PERF_MIN_FIELDS..=PERF_MAX_FIELDS).contains(&fields.len()) {
        return Err(DatanetError::structural(
            context,
            format!(
                "performance tuple has {} fields, expected {PERF_MIN_FIELDS} or {PERF_MAX_FIELDS}",
                fields.len()
            ),
        ));
    }
    Ok(Measurement {
        traffic: TrafficAggregate {
            avg_bw: fields[0],
            pkts_gen: fields[1],
        },
        perf: PerfRecord {
            pkts_drop: fields[2],
            avg_delay: fields[3],
            avg_ln_delay: fields[4],
            p10: fields[5],
            p20: fields[6],
            p50: fields[7],
            p80: fields[8],
            p90: fields[9],
            jitter: fields.get(10).copied(),
        },
    })
}

/// Writes a measurement back in the positional tuple layout.
pub fn encode_measurement(m: &Measurement) -> String {
    let p = &m.perf;
    let mut fields = vec![
        m.traffic.avg_bw,
        m.traffic.pkts_gen,
        p.pkts_drop,
        p.avg_delay,
        p.avg_ln_delay,
        p.p10,
        p.p20,
        p.p50,
        p.p80,
        p.p90,
    ];
    fields.extend(p.jitter);
    fields
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(&FIELD_SEPARATOR.to_string())
}

fn split_groups<'a>(line: &'a str, context: &str) -> Result<(&'a str, Vec<&'a str>)> {
    let (header, body) = line.trim_end().split_once(HEADER_SEPARATOR).ok_or_else(|| {
        DatanetError::structural(context, format!("missing '{HEADER_SEPARATOR}' separator"))
    })?;
    Ok((header, body.split(GROUP_SEPARATOR).collect()))
}

/// Splits `header|g;g;...`. Results and QoS groups are never empty, so the
/// empty group left by a trailing separator is always dropped.
pub(crate) fn split_line<'a>(line: &'a str, context: &str) -> Result<(&'a str, Vec<&'a str>)> {
    let (header, mut groups) = split_groups(line, context)?;
    if groups.len() > 1 && groups.last().is_some_and(|g| g.trim().is_empty()) {
        groups.pop();
    }
    Ok((header, groups))
}

pub(crate) fn decode_pairs(
    groups: &[&str],
    size: usize,
    context: &str,
) -> Result<SquareMatrix<Measurement>> {
    let cells = groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let ctx = format!("{context}, pair ({}, {})", i / size, i % size);
            decode_measurement(&parse_fields(group, &ctx)?, &ctx)
        })
        .collect::<Result<Vec<_>>>()?;
    SquareMatrix::from_row_major(size, cells)
        .ok_or_else(|| DatanetError::structural(context, "group count changed while decoding"))
}

/// Decodes `capture_time,total_pkts,total_losses,avg_delay|g;g;...`.
pub fn decode_results_line(line: &str, expected: Option<usize>) -> Result<DecodedResults> {
    let context = "results line";
    let (header, groups) = split_line(line, context)?;
    let header = parse_fields(header, "results header")?;
    if header.len() != RESULTS_HEADER_FIELDS {
        return Err(DatanetError::structural(
            "results header",
            format!("{} fields, expected {RESULTS_HEADER_FIELDS}", header.len()),
        ));
    }
    let size = network_size(groups.len(), expected, context)?;
    Ok(DecodedResults {
        capture_time: header[0],
        global: GlobalCounters {
            total_pkts: header[1],
            total_losses: header[2],
            avg_delay: header[3],
        },
        pairs: decode_pairs(&groups, size, context)?,
    })
}

/// Decodes a flow-level results line: same outer shape, each group split
/// into flows. `aggregates` provides the copy used for the `*` marker.
pub fn decode_flow_results_line(
    line: &str,
    aggregates: &SquareMatrix<Measurement>,
) -> Result<SquareMatrix<Vec<Measurement>>> {
    let context = "flow results line";
    let size = aggregates.size();
    let (_, mut groups) = split_groups(line, context)?;
    // an empty group is a pair without flows, so only a surplus one is dropped
    if groups.len() == size * size + 1 && groups.last().is_some_and(|g| g.trim().is_empty()) {
        groups.pop();
    }
    network_size(groups.len(), Some(size), context)?;

    let mut cells = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let (src, dst) = (i / size, i % size);
        let ctx = format!("{context}, pair ({src}, {dst})");
        let group = group.trim();
        let flows = if group.is_empty() {
            Vec::new()
        } else if group == AGGREGATE_FLOW_MARKER {
            vec![aggregates[(src, dst)].clone()]
        } else {
            group
                .split(FLOW_SEPARATOR)
                .enumerate()
                .map(|(k, flow)| {
                    let ctx = format!("{ctx}, flow {k}");
                    decode_measurement(&parse_fields(flow, &ctx)?, &ctx)
                })
                .collect::<Result<Vec<_>>>()?
        };
        cells.push(flows);
    }
    SquareMatrix::from_row_major(size, cells)
        .ok_or_else(|| DatanetError::structural(context, "group count changed while decoding"))
}

fn parse_index(raw: &str, size: usize, what: &str, context: &str) -> Result<usize> {
    let value: usize = raw.trim().parse().map_err(|_| {
        DatanetError::structural(context, format!("{what} '{}' is not a node id", raw.trim()))
    })?;
    if value >= size {
        return Err(DatanetError::structural(
            context,
            format!("{what} {value} outside a {size}-node network"),
        ));
    }
    Ok(value)
}

/// Decodes a traffic-matrix file: the maximum link load, then one
/// `src;dst;flow;...;tos` line per pair that carries traffic.
pub fn decode_traffic_matrix(text: &str, size: usize) -> Result<DecodedTrafficMatrix> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, first) = lines
        .next()
        .ok_or_else(|| DatanetError::structural("traffic matrix", "file is empty"))?;
    let max_link_load = first.trim().parse::<f64>().map_err(|_| {
        DatanetError::structural(
            "traffic matrix, line 1",
            format!("max link load '{}' is not a number", first.trim()),
        )
    })?;

    let mut flows: SquareMatrix<Option<Vec<TrafficDescriptor>>> =
        SquareMatrix::from_fn(size, |_, _| None);
    for (number, line) in lines {
        let context = format!("traffic matrix, line {}", number + 1);
        let line = line.trim_end();
        let line = line.strip_suffix(GROUP_SEPARATOR).unwrap_or(line);
        let parts: Vec<&str> = line.split(GROUP_SEPARATOR).collect();
        if parts.len() < 3 {
            return Err(DatanetError::structural(
                &context,
                format!("expected src;dst;flows...;tos, got {} fields", parts.len()),
            ));
        }
        let src = parse_index(parts[0], size, "src", &context)?;
        let dst = parse_index(parts[1], size, "dst", &context)?;
        if src == dst {
            return Err(DatanetError::structural(
                &context,
                format!("flow from node {src} to itself"),
            ));
        }
        let tos_raw = parts[parts.len() - 1].trim();
        let tos: u32 = tos_raw.parse().map_err(|_| {
            DatanetError::structural(
                &context,
                format!("class-of-service tag '{tos_raw}' is not an integer"),
            )
        })?;

        let mut pair_flows = Vec::with_capacity(parts.len() - 3);
        for (k, raw) in parts[2..parts.len() - 1].iter().enumerate() {
            let ctx = format!("{context}, flow {k}");
            let fields = parse_fields(raw, &ctx)?;
            let (time, size_dist, cursor) = distribution::decode_flow(&fields, 0)
                .map_err(|e| DatanetError::structural(&ctx, e.to_string()))?;
            if cursor != fields.len() {
                return Err(DatanetError::structural(
                    &ctx,
                    format!("{} unexpected fields after size distribution", fields.len() - cursor),
                ));
            }
            pair_flows.push(TrafficDescriptor {
                time,
                size: size_dist,
                tos,
                avg_bw: None,
                pkts_gen: None,
            });
        }

        if flows[(src, dst)].replace(pair_flows).is_some() {
            return Err(DatanetError::structural(
                &context,
                format!("pair ({src}, {dst}) listed twice"),
            ));
        }
    }

    Ok(DecodedTrafficMatrix {
        max_link_load,
        // pairs never listed carry no flow, which is a valid state
        flows: flows.into_map(Option::unwrap_or_default),
    })
}

/// Builds the result and traffic matrices of one sample from the decoded
/// pieces, attaching flow-level measurements when present.
pub fn assemble_matrices(
    results: &DecodedResults,
    flow_results: Option<SquareMatrix<Vec<Measurement>>>,
    traffic: DecodedTrafficMatrix,
) -> Result<(SquareMatrix<ResultCell>, SquareMatrix<TrafficCell>)> {
    let size = results.pairs.size();
    if traffic.flows.size() != size {
        return Err(DatanetError::structural(
            "traffic matrix",
            format!("{} nodes, results describe {size}", traffic.flows.size()),
        ));
    }

    let mut result_cells = Vec::with_capacity(size * size);
    let mut traffic_cells = Vec::with_capacity(size * size);
    let mut descriptors = traffic.flows;
    for ((src, dst), measured) in results.pairs.iter() {
        let mut flows = std::mem::take(&mut descriptors[(src, dst)]);
        let measured_flows = match &flow_results {
            Some(per_flow) => {
                let per_flow = &per_flow[(src, dst)];
                if per_flow.len() != flows.len() {
                    return Err(DatanetError::structural(
                        format!("pair ({src}, {dst})"),
                        format!(
                            "{} flows in traffic matrix, {} in flow results",
                            flows.len(),
                            per_flow.len()
                        ),
                    ));
                }
                for (descriptor, m) in flows.iter_mut().zip(per_flow) {
                    descriptor.avg_bw = Some(m.traffic.avg_bw);
                    descriptor.pkts_gen = Some(m.traffic.pkts_gen);
                }
                Some(per_flow.iter().map(|m| m.perf.clone()).collect())
            }
            None => None,
        };
        result_cells.push(ResultCell {
            aggregate: measured.perf.clone(),
            flows: measured_flows,
            qos: None,
        });
        traffic_cells.push(TrafficCell {
            aggregate: measured.traffic,
            flows,
            qos: None,
        });
    }

    let mismatch = || DatanetError::structural("sample matrices", "cell count is not N x N");
    Ok((
        SquareMatrix::from_row_major(size, result_cells).ok_or_else(mismatch)?,
        SquareMatrix::from_row_major(size, traffic_cells).ok_or_else(mismatch)?,
    ))
}
