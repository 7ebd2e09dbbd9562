use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use datanet_abstract::{
    GlobalCounters, PhysicalPathMatrix, ResultCell, RoutingMatrix, SizeDistribution,
    SquareMatrix, TimeDistribution, Topology, TrafficCell, TrafficDescriptor,
};
use serde::Serialize;

use crate::archive::archive_stem;
use crate::error::{DatanetError, Result};
use crate::trace::{PacketTrace, TraceKey, TraceStore};

/// Where a sample came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SampleId {
    pub archive: PathBuf,
    /// Zero-based position of the run inside its archive.
    pub run_index: usize,
    /// Run identifier from the index line.
    pub run_id: String,
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.archive.display(), self.run_index)
    }
}

/// Immutable once built. Topology artifacts are shared with other samples
/// through the reader's cache.
#[derive(Clone)]
pub struct Sample {
    pub(crate) id: SampleId,
    pub(crate) capture_time: f64,
    pub(crate) global: GlobalCounters,
    pub(crate) global_qos: Option<BTreeMap<u32, GlobalCounters>>,
    pub(crate) max_link_load: f64,
    pub(crate) results: SquareMatrix<ResultCell>,
    pub(crate) traffic: SquareMatrix<TrafficCell>,
    pub(crate) topology: Arc<Topology>,
    pub(crate) routing: Arc<RoutingMatrix>,
    pub(crate) physical_topology: Option<Arc<Topology>>,
    pub(crate) physical_paths: Option<Arc<PhysicalPathMatrix>>,
    pub(crate) traces: Option<Arc<dyn TraceStore>>,
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("id", &self.id)
            .field("network_size", &self.network_size())
            .field("capture_time", &self.capture_time)
            .field("global", &self.global)
            .field("max_link_load", &self.max_link_load)
            .finish_non_exhaustive()
    }
}

impl Sample {
    pub fn id(&self) -> &SampleId {
        &self.id
    }

    pub fn network_size(&self) -> usize {
        self.results.size()
    }

    pub fn capture_time(&self) -> f64 {
        self.capture_time
    }

    pub fn global_counters(&self) -> GlobalCounters {
        self.global
    }

    /// Per-class global counters; `None` when the archive has no QoS results.
    pub fn global_qos(&self) -> Option<&BTreeMap<u32, GlobalCounters>> {
        self.global_qos.as_ref()
    }

    pub fn max_link_load(&self) -> f64 {
        self.max_link_load
    }

    pub fn results(&self) -> &SquareMatrix<ResultCell> {
        &self.results
    }

    pub fn traffic(&self) -> &SquareMatrix<TrafficCell> {
        &self.traffic
    }

    pub fn result(&self, src: usize, dst: usize) -> Option<&ResultCell> {
        self.results.get(src, dst)
    }

    pub fn traffic_cell(&self, src: usize, dst: usize) -> Option<&TrafficCell> {
        self.traffic.get(src, dst)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn shared_topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn routing(&self) -> &RoutingMatrix {
        &self.routing
    }

    pub fn shared_routing(&self) -> &Arc<RoutingMatrix> {
        &self.routing
    }

    /// Logical path of a pair; `None` when unreachable.
    pub fn path(&self, src: usize, dst: usize) -> Option<&[usize]> {
        self.routing.path(src, dst)
    }

    pub fn physical_topology(&self) -> Option<&Topology> {
        self.physical_topology.as_deref()
    }

    pub fn physical_paths(&self) -> Option<&PhysicalPathMatrix> {
        self.physical_paths.as_deref()
    }

    pub fn physical_path(&self, src: usize, dst: usize) -> Option<&[String]> {
        self.physical_paths.as_ref()?.path(src, dst)
    }

    /// Flows defined on a pair; empty when the pair carries no traffic.
    pub fn flows(&self, src: usize, dst: usize) -> &[TrafficDescriptor] {
        self.traffic
            .get(src, dst)
            .map(|cell| cell.flows.as_slice())
            .unwrap_or_default()
    }

    pub fn flow(&self, src: usize, dst: usize, flow: usize) -> Option<&TrafficDescriptor> {
        self.flows(src, dst).get(flow)
    }

    pub fn time_distribution(
        &self,
        src: usize,
        dst: usize,
        flow: usize,
    ) -> Option<&TimeDistribution> {
        self.flow(src, dst, flow).map(|f| &f.time)
    }

    pub fn size_distribution(
        &self,
        src: usize,
        dst: usize,
        flow: usize,
    ) -> Option<&SizeDistribution> {
        self.flow(src, dst, flow).map(|f| &f.size)
    }

    pub fn avg_pkt_size(&self, src: usize, dst: usize, flow: usize) -> Option<f64> {
        self.size_distribution(src, dst, flow)
            .map(SizeDistribution::avg_pkt_size)
    }

    pub fn eq_lambda(&self, src: usize, dst: usize, flow: usize) -> Option<f64> {
        self.time_distribution(src, dst, flow)
            .map(TimeDistribution::eq_lambda)
    }

    pub fn trace_key(&self) -> TraceKey {
        TraceKey {
            archive_stem: archive_stem(&self.id.archive),
            run_index: self.id.run_index,
        }
    }

    /// Loads the per-packet trace of this run from the reader's trace store.
    pub fn packet_trace(&self) -> Result<PacketTrace> {
        let key = self.trace_key();
        match &self.traces {
            Some(store) => store.load(&key),
            None => Err(DatanetError::MissingTrace {
                key: key.to_string(),
            }),
        }
    }
}
