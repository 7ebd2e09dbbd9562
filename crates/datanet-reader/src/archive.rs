use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use datanet_abstract::Intensity;
use flate2::read::MultiGzDecoder;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{DatanetError, Result};

pub const INDEX_MEMBER: &str = "input_files.txt";
pub const RESULTS_MEMBER: &str = "simulationResults.txt";
pub const FLOW_RESULTS_MEMBER: &str = "flowSimulationResults.txt";
pub const QOS_RESULTS_MEMBER: &str = "qosSimulationResults.txt";
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

pub fn traffic_member(run_id: &str) -> String {
    format!("traffic_matrices/tm_{run_id}.txt")
}

/// File name of an archive without its `.tar.gz` suffix.
pub fn archive_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(ARCHIVE_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

/// Intensity carried by the third `_`-separated field of an archive name,
/// as in `results_geant_600-1000_3.tar.gz`.
pub fn archive_intensity(path: &Path) -> Option<Intensity> {
    archive_stem(path).split('_').nth(2)?.parse().ok()
}

/// Every `*.tar.gz` below `root`, sorted. Symlinks are not followed.
pub fn enumerate_archives(root: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            DatanetError::Io {
                path,
                source: e.into(),
            }
        })?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(ARCHIVE_SUFFIX)
        {
            archives.push(entry.into_path());
        }
    }
    archives.sort();
    debug!("found {} archives under {}", archives.len(), root.display());
    Ok(archives)
}

/// Opens an archive and exposes its members by name.
pub trait ArchiveSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<MemberSet>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzSource;

impl ArchiveSource for TarGzSource {
    fn open(&self, path: &Path) -> Result<MemberSet> {
        let wrap = |source: std::io::Error| DatanetError::Archive {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(wrap)?;
        let mut archive = tar::Archive::new(MultiGzDecoder::new(file));
        let mut members = Vec::new();
        for entry in archive.entries().map_err(wrap)? {
            let mut entry = entry.map_err(wrap)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry.path().map_err(wrap)?.into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(wrap)?;
            members.push((name, data));
        }
        Ok(MemberSet::from_members(members))
    }
}

/// Decompressed members of one archive.
#[derive(Debug, Clone, Default)]
pub struct MemberSet {
    members: BTreeMap<String, Arc<[u8]>>,
}

impl MemberSet {
    pub fn from_members(members: Vec<(PathBuf, Vec<u8>)>) -> Self {
        let parts: Vec<(Vec<String>, Vec<u8>)> = members
            .into_iter()
            .map(|(path, data)| {
                let components = path
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect();
                (components, data)
            })
            .collect();

        let top = parts.first().and_then(|(c, _)| c.first().cloned());
        let strip = top.is_some_and(|top| {
            parts
                .iter()
                .all(|(c, _)| c.len() > 1 && c.first() == Some(&top))
        });

        let members = parts
            .into_iter()
            .map(|(components, data)| {
                let skip = usize::from(strip);
                (components[skip..].join("/"), Arc::from(data))
            })
            .collect();
        Self { members }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn lines(&self, name: &str) -> Option<LineStream> {
        self.members.get(name).map(|data| LineStream {
            member: name.to_string(),
            data: Arc::clone(data),
            pos: 0,
            line: 0,
        })
    }

    pub fn read_to_string(&self, name: &str) -> Option<Result<String>> {
        self.members.get(name).map(|data| {
            String::from_utf8(data.to_vec())
                .map_err(|e| DatanetError::structural(name, format!("not UTF-8: {e}")))
        })
    }
}

/// Sequential reader over one member's lines.
#[derive(Debug, Clone)]
pub struct LineStream {
    member: String,
    data: Arc<[u8]>,
    pos: usize,
    line: usize,
}

impl LineStream {
    /// Next line without its terminator; `None` at end of member or blank line.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let rest = &self.data[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }
        let (raw, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        self.line += 1;
        let text = std::str::from_utf8(raw).map_err(|e| {
            DatanetError::structural(self.context(), format!("not UTF-8: {e}"))
        })?;
        let text = text.trim_end_matches('\r');
        if text.trim().is_empty() {
            self.pos = self.data.len();
            return Ok(None);
        }
        Ok(Some(text.to_string()))
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    /// `member, line N` for the line last returned.
    pub fn context(&self) -> String {
        format!("{}, line {}", self.member, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, text: &str) -> (PathBuf, Vec<u8>) {
        (PathBuf::from(name), text.as_bytes().to_vec())
    }

    #[test]
    fn strips_common_top_directory() {
        let set = MemberSet::from_members(vec![
            member("run_a/input_files.txt", "1;g;r\n"),
            member("run_a/traffic_matrices/tm_1.txt", "0.5\n"),
        ]);
        let names: Vec<_> = set.names().collect();
        assert_eq!(names, vec!["input_files.txt", "traffic_matrices/tm_1.txt"]);
        assert_eq!(traffic_member("1"), "traffic_matrices/tm_1.txt");
    }

    #[test]
    fn intensity_comes_from_third_name_field() {
        let range = archive_intensity(Path::new("data/results_geant_600-1000_3.tar.gz"));
        assert_eq!(range, Some(Intensity::Range(600, 1000)));
        let single = archive_intensity(Path::new("results_nsf_800_0.tar.gz"));
        assert_eq!(single, Some(Intensity::Single(800)));
        assert_eq!(archive_intensity(Path::new("a.tar.gz")), None);
        assert_eq!(archive_intensity(Path::new("results_nsf_low_0.tar.gz")), None);
    }

    #[test]
    fn keeps_flat_layout() {
        let set = MemberSet::from_members(vec![
            member("input_files.txt", ""),
            member("traffic_matrices/tm_1.txt", ""),
        ]);
        assert!(set.contains("traffic_matrices/tm_1.txt"));
        assert!(set.contains(INDEX_MEMBER));
    }

    #[test]
    fn line_stream_stops_at_blank_line() {
        let set = MemberSet::from_members(vec![member("a.txt", "one\r\ntwo\n\nthree\n")]);
        let mut lines = set.lines("a.txt").unwrap();
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("one"));
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("two"));
        assert_eq!(lines.context(), "a.txt, line 2");
        assert_eq!(lines.next_line().unwrap(), None);
        assert_eq!(lines.next_line().unwrap(), None);
        assert!(set.lines("b.txt").is_none());
    }

    #[test]
    fn archive_stem_drops_suffix() {
        assert_eq!(archive_stem(Path::new("/data/results_1.tar.gz")), "results_1");
        assert_eq!(archive_stem(Path::new("plain")), "plain");
    }

    #[test]
    fn enumeration_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b.tar.gz", "a.tar.gz", "sub/c.tar.gz", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let found: Vec<_> = enumerate_archives(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a.tar.gz"),
                PathBuf::from("b.tar.gz"),
                PathBuf::from("sub/c.tar.gz"),
            ]
        );
    }
}
