use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatanetError {
    /// Field counts, tags or layouts that do not match the record schema.
    #[error("{context}: {message}")]
    StructuralDecode { context: String, message: String },

    /// A graph, routing, port-mapping or tg file named by an index line is absent.
    #[error("missing artifact {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Per-packet trace requested but no blob exists for it.
    #[error("no packet trace stored for {key}")]
    MissingTrace { key: String },

    /// Caller selected an archive the scanner never enumerated.
    #[error("archive {identity} is not part of the dataset")]
    InvalidSelection { identity: String },

    #[error("cannot read archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse graph {}: {message}", path.display())]
    Graph { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("scan cancelled")]
    Cancelled,

    #[error("scan aborted")]
    Aborted,
}

impl DatanetError {
    pub fn structural(context: impl Into<String>, message: impl Into<String>) -> Self {
        DatanetError::StructuralDecode {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Reading a file that may simply not exist: `NotFound` becomes
    /// [`DatanetError::MissingArtifact`].
    pub fn artifact_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            DatanetError::MissingArtifact { path }
        } else {
            DatanetError::Io { path, source }
        }
    }

    /// True for failures confined to the archive being processed.
    pub fn is_archive_local(&self) -> bool {
        matches!(
            self,
            DatanetError::StructuralDecode { .. }
                | DatanetError::MissingArtifact { .. }
                | DatanetError::Archive { .. }
                | DatanetError::Graph { .. }
                | DatanetError::Io { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DatanetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_signals_are_not_archive_local() {
        assert!(DatanetError::structural("line 1", "bad").is_archive_local());
        assert!(!DatanetError::Cancelled.is_archive_local());
        assert!(!DatanetError::Aborted.is_archive_local());
        assert!(
            !DatanetError::InvalidSelection {
                identity: "x".to_string()
            }
            .is_archive_local()
        );
    }

    #[test]
    fn not_found_maps_to_missing_artifact() {
        let err = DatanetError::artifact_io(
            "graphs/g.txt",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, DatanetError::MissingArtifact { .. }));
    }
}
