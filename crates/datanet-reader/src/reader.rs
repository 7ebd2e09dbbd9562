use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datanet_abstract::DatanetConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveSource, TarGzSource, archive_intensity, enumerate_archives};
use crate::assembler::{ArchiveSession, SampleAssembler};
use crate::cache::CacheStats;
use crate::control::ScanHandle;
use crate::error::{DatanetError, Result};
use crate::gml::{GmlGraphReader, GraphReader};
use crate::sample::Sample;
use crate::trace::{FsTraceStore, TraceStore};

/// Counters of one scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub samples: u64,
    pub archives_opened: u64,
    /// Archives abandoned after an archive-local error.
    pub archives_failed: u64,
    pub cache: CacheStats,
}

/// Builder for [`DatanetReader`]. Every collaborator has a default.
pub struct ReaderBuilder {
    data_root: PathBuf,
    config: DatanetConfig,
    graph_reader: Option<Arc<dyn GraphReader>>,
    archive_source: Option<Arc<dyn ArchiveSource>>,
    trace_store: Option<Arc<dyn TraceStore>>,
}

impl ReaderBuilder {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            config: DatanetConfig::default(),
            graph_reader: None,
            archive_source: None,
            trace_store: None,
        }
    }

    pub fn config(mut self, config: DatanetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn graph_reader(mut self, reader: Arc<dyn GraphReader>) -> Self {
        self.graph_reader = Some(reader);
        self
    }

    pub fn archive_source(mut self, source: Arc<dyn ArchiveSource>) -> Self {
        self.archive_source = Some(source);
        self
    }

    pub fn trace_store(mut self, store: Arc<dyn TraceStore>) -> Self {
        self.trace_store = Some(store);
        self
    }

    /// Enumerates the archives under the data root, keeping only those
    /// matching the configured intensity.
    pub fn build(self) -> Result<DatanetReader> {
        let data_root = std::path::absolute(&self.data_root).map_err(|source| DatanetError::Io {
            path: self.data_root.clone(),
            source,
        })?;
        let mut archives = enumerate_archives(&data_root)?;
        if let Some(wanted) = self.config.intensity {
            archives.retain(|path| match archive_intensity(path) {
                Some(found) => {
                    let keep = wanted.overlaps(found);
                    if !keep {
                        debug!("{}: intensity {found} outside {wanted}", path.display());
                    }
                    keep
                }
                None => {
                    warn!("{}: no intensity in archive name, skipped", path.display());
                    false
                }
            });
        }
        let traces = self.trace_store.unwrap_or_else(|| {
            Arc::new(FsTraceStore::new(data_root.join(&self.config.traces_dir)))
        });
        let graphs = self
            .graph_reader
            .unwrap_or_else(|| Arc::new(GmlGraphReader));
        info!("dataset {}: {} archives", data_root.display(), archives.len());
        Ok(DatanetReader {
            data_root,
            archives,
            selection: None,
            source: self
                .archive_source
                .unwrap_or_else(|| Arc::new(TarGzSource)),
            assembler: SampleAssembler::new(self.config, graphs, Some(traces)),
            handle: ScanHandle::new(),
            last_stats: ScanStats::default(),
        })
    }
}

/// Reader over every archive of a dataset directory.
pub struct DatanetReader {
    data_root: PathBuf,
    archives: Vec<PathBuf>,
    selection: Option<Vec<PathBuf>>,
    source: Arc<dyn ArchiveSource>,
    assembler: SampleAssembler,
    handle: ScanHandle,
    last_stats: ScanStats,
}

impl DatanetReader {
    pub fn builder(data_root: impl Into<PathBuf>) -> ReaderBuilder {
        ReaderBuilder::new(data_root)
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn config(&self) -> &DatanetConfig {
        &self.assembler.config
    }

    /// Archive identities, relative to the data root, in scan order.
    pub fn available_files(&self) -> Vec<PathBuf> {
        self.archives
            .iter()
            .map(|path| self.identity(path))
            .collect()
    }

    fn identity(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.data_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Restricts later scans to `files`, given as returned by
    /// [`available_files`](Self::available_files) or as paths that resolve
    /// to an enumerated archive. Rejected as a whole if any entry is unknown.
    pub fn set_files_to_process<I, P>(&mut self, files: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut wanted = Vec::new();
        for file in files {
            let file = file.as_ref();
            let full = if file.is_absolute() {
                file.to_path_buf()
            } else {
                self.data_root.join(file)
            };
            if !self.archives.contains(&full) {
                return Err(DatanetError::InvalidSelection {
                    identity: file.display().to_string(),
                });
            }
            wanted.push(full);
        }
        let selected = self
            .archives
            .iter()
            .filter(|a| wanted.contains(a))
            .cloned()
            .collect();
        self.selection = Some(selected);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Clonable control for the scans of this reader.
    pub fn handle(&self) -> ScanHandle {
        self.handle.clone()
    }

    pub fn clear_cache(&mut self) {
        self.assembler.clear_cache();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.assembler.cache().stats()
    }

    /// Counters of the most recently finished pass.
    pub fn last_scan_stats(&self) -> ScanStats {
        self.last_stats
    }

    /// Starts a pass over the selected archives. A pending cancel is cleared.
    pub fn scan(&mut self) -> Samples<'_> {
        self.handle.rearm();
        let mut queue: Vec<PathBuf> = self
            .selection
            .clone()
            .unwrap_or_else(|| self.archives.clone());
        let config = &self.assembler.config;
        if config.shuffle {
            queue.shuffle(&mut StdRng::seed_from_u64(config.seed));
        }
        let cache_before = self.cache_stats();
        Samples {
            reader: self,
            queue: queue.into(),
            session: None,
            stats: ScanStats::default(),
            cache_before,
            finished: false,
        }
    }
}

/// Pull-based sample sequence of one pass.
///
/// Archive-local failures are logged and the pass moves on to the next
/// archive. Cancel and abort surface once as `Err`, then the iterator ends.
pub struct Samples<'r> {
    reader: &'r mut DatanetReader,
    queue: VecDeque<PathBuf>,
    session: Option<ArchiveSession>,
    stats: ScanStats,
    cache_before: CacheStats,
    finished: bool,
}

impl Samples<'_> {
    /// Counters of this pass so far.
    pub fn stats(&self) -> ScanStats {
        let mut stats = self.stats;
        stats.cache = self.cache_delta();
        stats
    }

    fn cache_delta(&self) -> CacheStats {
        let now = self.reader.cache_stats();
        CacheStats {
            decodes: now.decodes.saturating_sub(self.cache_before.decodes),
            hits: now.hits.saturating_sub(self.cache_before.hits),
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.session = None;
        let stats = self.stats();
        self.reader.last_stats = stats;
        info!(
            "scan finished: {} samples from {} archives, {} archives failed",
            stats.samples, stats.archives_opened, stats.archives_failed
        );
    }

    fn stop(&mut self, err: DatanetError) -> Option<Result<Sample>> {
        self.finish();
        Some(Err(err))
    }
}

impl Iterator for Samples<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if let Err(err) = self.reader.handle.check() {
                return self.stop(err);
            }

            if self.session.is_none() {
                let Some(archive) = self.queue.pop_front() else {
                    self.finish();
                    return None;
                };
                match ArchiveSession::open(self.reader.source.as_ref(), &archive) {
                    Ok(session) => {
                        self.stats.archives_opened += 1;
                        self.session = Some(session);
                    }
                    Err(err) if err.is_archive_local() => {
                        error!(
                            "skipping archive {} at run 0: {}",
                            archive.display(),
                            err
                        );
                        self.stats.archives_failed += 1;
                        continue;
                    }
                    Err(err) => return self.stop(err),
                }
            }

            let Some(session) = self.session.as_mut() else {
                continue;
            };
            match session.next_sample(&mut self.reader.assembler) {
                Ok(Some(sample)) => {
                    self.stats.samples += 1;
                    return Some(Ok(sample));
                }
                Ok(None) => {
                    self.session = None;
                }
                Err(err) if err.is_archive_local() => {
                    error!(
                        "skipping archive {} at run {}: {}",
                        session.archive().display(),
                        session.run_index(),
                        err
                    );
                    self.stats.archives_failed += 1;
                    self.session = None;
                }
                Err(err) => return self.stop(err),
            }
        }
    }
}
