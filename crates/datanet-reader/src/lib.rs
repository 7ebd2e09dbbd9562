pub mod archive;
pub mod assembler;
pub mod cache;
pub mod control;
pub mod distribution;
pub mod error;
pub mod gml;
pub mod path;
pub mod qos;
pub mod reader;
pub mod record;
pub mod sample;
pub mod trace;

pub use archive::{ArchiveSource, MemberSet, TarGzSource};
pub use cache::CacheStats;
pub use control::ScanHandle;
pub use error::{DatanetError, Result};
pub use gml::{GmlGraphReader, GraphReader};
pub use reader::{DatanetReader, ReaderBuilder, Samples, ScanStats};
pub use sample::{Sample, SampleId};
pub use trace::{FsTraceStore, PacketRecord, PacketTrace, TraceKey, TraceStore};

pub use datanet_abstract as model;
