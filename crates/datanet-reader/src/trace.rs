use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DatanetError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub src: usize,
    pub dst: usize,
    pub flow: usize,
    pub timestamp: f64,
    /// `None` when the packet was dropped.
    pub delay: Option<f64>,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketTrace {
    pub packets: Vec<PacketRecord>,
}

impl PacketTrace {
    pub fn dropped(&self) -> usize {
        self.packets.iter().filter(|p| p.delay.is_none()).count()
    }

    pub fn between(&self, src: usize, dst: usize) -> impl Iterator<Item = &PacketRecord> {
        self.packets
            .iter()
            .filter(move |p| p.src == src && p.dst == dst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceKey {
    pub archive_stem: String,
    pub run_index: usize,
}

impl std::fmt::Display for TraceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.archive_stem, self.run_index)
    }
}

/// Loads per-packet traces on demand; samples only carry the key.
pub trait TraceStore: Send + Sync {
    fn load(&self, key: &TraceKey) -> Result<PacketTrace>;
}

/// Reads `<root>/<archive stem>/<run index>.json`.
#[derive(Debug, Clone)]
pub struct FsTraceStore {
    root: PathBuf,
}

impl FsTraceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_path(&self, key: &TraceKey) -> PathBuf {
        self.root
            .join(&key.archive_stem)
            .join(format!("{}.json", key.run_index))
    }
}

impl TraceStore for FsTraceStore {
    fn load(&self, key: &TraceKey) -> Result<PacketTrace> {
        let path = self.blob_path(key);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DatanetError::MissingTrace {
                key: key.to_string(),
            },
            _ => DatanetError::Io {
                path: path.clone(),
                source: e,
            },
        })?;
        serde_json::from_str(&text).map_err(|e| {
            DatanetError::structural(path.display().to_string(), format!("bad trace: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(run_index: usize) -> TraceKey {
        TraceKey {
            archive_stem: "results_1".to_string(),
            run_index,
        }
    }

    #[test]
    fn loads_stored_trace() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTraceStore::new(dir.path());
        fs::create_dir_all(dir.path().join("results_1")).unwrap();
        fs::write(
            store.blob_path(&key(0)),
            r#"[{"src":0,"dst":1,"flow":0,"timestamp":0.5,"delay":0.01,"size":1000},
                {"src":0,"dst":1,"flow":0,"timestamp":0.6,"delay":null,"size":1000}]"#,
        )
        .unwrap();

        let trace = store.load(&key(0)).unwrap();
        assert_eq!(trace.packets.len(), 2);
        assert_eq!(trace.dropped(), 1);
        assert_eq!(trace.between(0, 1).count(), 2);
        assert_eq!(trace.between(1, 0).count(), 0);
    }

    #[test]
    fn absent_blob_is_missing_trace() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsTraceStore::new(dir.path()).load(&key(3)).unwrap_err();
        assert!(matches!(err, DatanetError::MissingTrace { ref key } if key == "results_1#3"));
    }
}
