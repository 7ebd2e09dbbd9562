use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datanet_abstract::{DatanetConfig, PhysicalPathMatrix, RoutingMatrix, Topology};
use tracing::{debug, info, warn};

use crate::archive::{
    ArchiveSource, FLOW_RESULTS_MEMBER, INDEX_MEMBER, LineStream, MemberSet, QOS_RESULTS_MEMBER,
    RESULTS_MEMBER, traffic_member,
};
use crate::cache::{PhysicalPathKey, TopologyCache, normalize};
use crate::error::{DatanetError, Result};
use crate::gml::GraphReader;
use crate::path::{build_physical_paths, decode_port_segments, decode_routing, decode_tg_mapping};
use crate::qos::{attach_qos, decode_qos_line};
use crate::record::{
    GROUP_SEPARATOR, assemble_matrices, decode_flow_results_line, decode_results_line,
    decode_traffic_matrix,
};
use crate::sample::{Sample, SampleId};
use crate::trace::TraceStore;

/// Artifact file names referenced by one index line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub run_id: String,
    pub graph: String,
    pub routing: String,
    pub physical_graph: Option<String>,
    pub l2_paths: Option<String>,
    pub tg_paths: Option<String>,
}

pub fn parse_index_line(line: &str, context: &str) -> Result<IndexEntry> {
    let fields: Vec<&str> = line.trim_end().split(GROUP_SEPARATOR).map(str::trim).collect();
    if fields.len() < 3 || fields.len() > 6 {
        return Err(DatanetError::structural(
            context,
            format!("expected 3 to 6 ';'-separated fields, got {}", fields.len()),
        ));
    }
    let required = |i: usize, what: &str| {
        let value = fields[i];
        if value.is_empty() {
            Err(DatanetError::structural(context, format!("empty {what}")))
        } else {
            Ok(value.to_string())
        }
    };
    let optional = |i: usize| {
        fields
            .get(i)
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };
    Ok(IndexEntry {
        run_id: required(0, "run id")?,
        graph: required(1, "graph file")?,
        routing: required(2, "routing file")?,
        physical_graph: optional(3),
        l2_paths: optional(4),
        tg_paths: optional(5),
    })
}

/// Everything a session needs besides the archive itself. Owned by the
/// reader and lent to one session at a time.
pub struct SampleAssembler {
    pub(crate) config: DatanetConfig,
    pub(crate) cache: TopologyCache,
    pub(crate) graphs: Arc<dyn GraphReader>,
    pub(crate) traces: Option<Arc<dyn TraceStore>>,
}

impl SampleAssembler {
    pub fn new(
        config: DatanetConfig,
        graphs: Arc<dyn GraphReader>,
        traces: Option<Arc<dyn TraceStore>>,
    ) -> Self {
        Self {
            config,
            cache: TopologyCache::default(),
            graphs,
            traces,
        }
    }

    pub fn cache(&self) -> &TopologyCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn topology(&mut self, path: &Path) -> Result<Arc<Topology>> {
        let key = normalize(path)?;
        let graphs = Arc::clone(&self.graphs);
        self.cache
            .graphs
            .get_or_try_decode(key, || graphs.read_graph(path))
    }

    fn routing(&mut self, path: &Path, size: usize) -> Result<Arc<RoutingMatrix>> {
        let key = normalize(path)?;
        let require_full = self.config.require_full_routing;
        let routing = self.cache.routings.get_or_try_decode(key, || {
            decode_routing(&read_artifact(path)?, size, require_full)
        })?;
        if routing.size() != size {
            return Err(DatanetError::structural(
                path.display().to_string(),
                format!("routing covers {} nodes, topology has {size}", routing.size()),
            ));
        }
        Ok(routing)
    }

    fn physical_paths(
        &mut self,
        routing_path: &Path,
        routing: &RoutingMatrix,
        l2: &Path,
        tg: &Path,
    ) -> Result<Arc<PhysicalPathMatrix>> {
        let key = PhysicalPathKey {
            routing: normalize(routing_path)?,
            l2: normalize(l2)?,
            tg: normalize(tg)?,
        };
        self.cache.physical_paths.get_or_try_decode(key, || {
            let segments = decode_port_segments(&read_artifact(l2)?)?;
            let attachments = decode_tg_mapping(&read_artifact(tg)?, routing.size())?;
            build_physical_paths(routing, &segments, &attachments)
        })
    }
}

fn read_artifact(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| DatanetError::artifact_io(path, e))
}

/// Open archive plus the run cursor inside it. The index and the per-run
/// members are read in lockstep; any error leaves the session unusable.
pub struct ArchiveSession {
    archive: PathBuf,
    base: PathBuf,
    members: MemberSet,
    index: LineStream,
    results: LineStream,
    flow_results: Option<LineStream>,
    qos_results: Option<LineStream>,
    run_index: usize,
}

impl ArchiveSession {
    pub fn open(source: &dyn ArchiveSource, archive: &Path) -> Result<Self> {
        let members = source.open(archive)?;
        let mandatory = |name: &str| {
            members.lines(name).ok_or_else(|| {
                DatanetError::structural(archive.display().to_string(), format!("no {name} member"))
            })
        };
        let index = mandatory(INDEX_MEMBER)?;
        let results = mandatory(RESULTS_MEMBER)?;

        let flow_results = members.lines(FLOW_RESULTS_MEMBER);
        let qos_results = members.lines(QOS_RESULTS_MEMBER);
        debug!(
            "{}: flow results {}, QoS results {}",
            archive.display(),
            if flow_results.is_some() { "present" } else { "absent" },
            if qos_results.is_some() { "present" } else { "absent" },
        );
        info!("opened archive {}", archive.display());

        Ok(Self {
            archive: archive.to_path_buf(),
            base: archive.parent().map(Path::to_path_buf).unwrap_or_default(),
            members,
            index,
            results,
            flow_results,
            qos_results,
            run_index: 0,
        })
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Index of the run the next call decodes (or the one that failed).
    pub fn run_index(&self) -> usize {
        self.run_index
    }

    fn artifact(&self, dir: &str, name: &str) -> PathBuf {
        self.base.join(dir).join(name)
    }

    /// Decodes the next run, or `None` once the index or one of the
    /// per-run members is exhausted.
    pub fn next_sample(&mut self, assembler: &mut SampleAssembler) -> Result<Option<Sample>> {
        let Some(index_line) = self.index.next_line()? else {
            return Ok(None);
        };
        let entry = parse_index_line(&index_line, &self.index.context())?;
        let Some(results_line) = next_per_run(&mut self.results, self.run_index)? else {
            return Ok(None);
        };
        let flow_line = match self.flow_results.as_mut() {
            Some(stream) => match next_per_run(stream, self.run_index)? {
                Some(line) => Some(line),
                None => return Ok(None),
            },
            None => None,
        };
        let qos_line = match self.qos_results.as_mut() {
            Some(stream) => match next_per_run(stream, self.run_index)? {
                Some(line) => Some(line),
                None => return Ok(None),
            },
            None => None,
        };

        let config = assembler.config.clone();
        let topology = assembler.topology(&self.artifact(&config.graphs_dir, &entry.graph))?;
        let size = topology.node_count();
        let results = decode_results_line(&results_line, Some(size))
            .map_err(|e| located(e, &self.results.context()))?;

        let routing_path = self.artifact(&config.routings_dir, &entry.routing);
        let routing = assembler.routing(&routing_path, size)?;

        let physical_topology = match &entry.physical_graph {
            Some(name) => {
                let path = self.artifact(&config.physical_graphs_dir, name);
                Some(assembler.topology(&path)?)
            }
            None => None,
        };
        let physical_paths = match (&entry.l2_paths, &entry.tg_paths) {
            (Some(l2), Some(tg)) => Some(assembler.physical_paths(
                &routing_path,
                &routing,
                &self.artifact(&config.l2_paths_dir, l2),
                &self.artifact(&config.tg_paths_dir, tg),
            )?),
            (None, None) => None,
            _ => {
                return Err(DatanetError::structural(
                    self.index.context(),
                    "port file and tg file must be given together",
                ));
            }
        };

        let tm_name = traffic_member(&entry.run_id);
        let tm_text = self.members.read_to_string(&tm_name).ok_or_else(|| {
            DatanetError::structural(
                self.archive.display().to_string(),
                format!("no {tm_name} member"),
            )
        })??;
        let traffic_matrix =
            decode_traffic_matrix(&tm_text, size).map_err(|e| located(e, &tm_name))?;
        let max_link_load = traffic_matrix.max_link_load;

        let flow_results = match (&flow_line, &self.flow_results) {
            (Some(line), Some(stream)) => Some(
                decode_flow_results_line(line, &results.pairs)
                    .map_err(|e| located(e, &stream.context()))?,
            ),
            _ => None,
        };
        let (mut result_cells, mut traffic_cells) =
            assemble_matrices(&results, flow_results, traffic_matrix)?;

        let global_qos = match (&qos_line, &self.qos_results) {
            (Some(line), Some(stream)) => {
                let classes =
                    decode_qos_line(line, size).map_err(|e| located(e, &stream.context()))?;
                Some(attach_qos(classes, &mut result_cells, &mut traffic_cells))
            }
            _ => None,
        };

        let sample = Sample {
            id: SampleId {
                archive: self.archive.clone(),
                run_index: self.run_index,
                run_id: entry.run_id,
            },
            capture_time: results.capture_time,
            global: results.global,
            global_qos,
            max_link_load,
            results: result_cells,
            traffic: traffic_cells,
            topology,
            routing,
            physical_topology,
            physical_paths,
            traces: assembler.traces.clone(),
        };
        self.run_index += 1;
        Ok(Some(sample))
    }
}

/// Next line of a per-run member. A member shorter than the index ends the
/// archive there.
fn next_per_run(stream: &mut LineStream, run_index: usize) -> Result<Option<String>> {
    let line = stream.next_line()?;
    if line.is_none() {
        warn!("{} ends before run {run_index}, closing archive", stream.member());
    }
    Ok(line)
}

/// Prefixes a structural error with the member position it came from.
fn located(err: DatanetError, location: &str) -> DatanetError {
    match err {
        DatanetError::StructuralDecode { context, message } => DatanetError::StructuralDecode {
            context: format!("{location}: {context}"),
            message,
        },
        other => other,
    }
}
