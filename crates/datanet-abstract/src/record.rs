use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::traffic::TrafficDescriptor;

/// Delay/loss metrics measured for one src-dst pair or one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfRecord {
    pub pkts_drop: f64,
    pub avg_delay: f64,
    pub avg_ln_delay: f64,
    pub p10: f64,
    pub p20: f64,
    pub p50: f64,
    pub p80: f64,
    pub p90: f64,
    /// Older simulator builds do not report jitter.
    pub jitter: Option<f64>,
}

/// Traffic actually generated on a pair, as measured by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficAggregate {
    pub avg_bw: f64,
    pub pkts_gen: f64,
}

/// Network-wide counters of one run (or of one class of service).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalCounters {
    pub total_pkts: f64,
    pub total_losses: f64,
    pub avg_delay: f64,
}

/// One cell of the performance matrix.
///
/// `flows` is `None` when the archive has no flow-level results; `qos` is
/// `None` when it has no class-of-service results. Neither is ever filled
/// with placeholder data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultCell {
    pub aggregate: PerfRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flows: Option<Vec<PerfRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qos: Option<BTreeMap<u32, PerfRecord>>,
}

/// One cell of the traffic matrix. An empty `flows` list means no flow was
/// defined on the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficCell {
    pub aggregate: TrafficAggregate,
    pub flows: Vec<TrafficDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qos: Option<BTreeMap<u32, TrafficAggregate>>,
}
