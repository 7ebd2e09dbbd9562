use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use datanet_abstract::{DatanetConfig, DatanetConfigOverride, Intensity};
use datanet_reader::{DatanetReader, Sample, ScanStats};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and decode network simulation datasets")]
struct Args {
    /// Dataset directory holding the `.tar.gz` archives.
    #[arg(long, global = true, default_value = ".")]
    data_root: PathBuf,

    /// TOML file overriding the reader configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only read archives at this intensity, `800` or `400-1000`.
    #[arg(long, global = true)]
    intensity: Option<Intensity>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the archives found under the data root.
    List,
    /// Decode samples and print one summary line per sample.
    Scan {
        /// Archives to scan, as printed by `list`. Defaults to all.
        #[arg(long, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Stop after this many samples.
        #[arg(long)]
        limit: Option<usize>,

        /// Write a JSON report of the scan.
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct SampleSummary {
    archive: String,
    run_index: usize,
    run_id: String,
    network_size: usize,
    capture_time: f64,
    total_pkts: f64,
    total_losses: f64,
    avg_delay: f64,
    max_link_load: f64,
    flows: usize,
    qos_classes: Vec<u32>,
}

impl SampleSummary {
    fn from_sample(sample: &Sample) -> Self {
        let global = sample.global_counters();
        Self {
            archive: sample.id().archive.display().to_string(),
            run_index: sample.id().run_index,
            run_id: sample.id().run_id.clone(),
            network_size: sample.network_size(),
            capture_time: sample.capture_time(),
            total_pkts: global.total_pkts,
            total_losses: global.total_losses,
            avg_delay: global.avg_delay,
            max_link_load: sample.max_link_load(),
            flows: sample.traffic().iter().map(|(_, cell)| cell.flows.len()).sum(),
            qos_classes: sample
                .global_qos()
                .map(|classes| classes.keys().copied().collect())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ScanReport {
    data_root: PathBuf,
    config: DatanetConfig,
    stats: ScanStats,
    samples: Vec<SampleSummary>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(intensity) = args.intensity {
        config.intensity = Some(intensity);
    }
    let mut reader = DatanetReader::builder(&args.data_root)
        .config(config)
        .build()
        .with_context(|| format!("Failed to open dataset {}", args.data_root.display()))?;

    match args.command {
        Command::List => {
            for file in reader.available_files() {
                println!("{}", file.display());
            }
        }
        Command::Scan { files, limit, json } => {
            if !files.is_empty() {
                reader
                    .set_files_to_process(&files)
                    .context("Invalid archive selection")?;
            }
            let report = run_scan(&mut reader, limit)?;
            if let Some(path) = &json {
                write_report(path, &report)?;
            }
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DatanetConfig> {
    let mut config = DatanetConfig::default();
    if let Some(path) = path {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let overrides: DatanetConfigOverride =
            toml::from_str(&content).context("Failed to parse config file")?;
        overrides.apply_to(&mut config);
    }
    Ok(config)
}

fn run_scan(reader: &mut DatanetReader, limit: Option<usize>) -> Result<ScanReport> {
    let data_root = reader.data_root().to_path_buf();
    let config = reader.config().clone();
    let limit = limit.unwrap_or(usize::MAX);

    let mut summaries = Vec::new();
    let mut samples = reader.scan();
    while summaries.len() < limit {
        let Some(item) = samples.next() else {
            break;
        };
        let sample = item.context("Scan stopped")?;
        let summary = SampleSummary::from_sample(&sample);
        println!(
            "{}#{} run={} nodes={} delay={:.6} losses={} flows={}",
            summary.archive,
            summary.run_index,
            summary.run_id,
            summary.network_size,
            summary.avg_delay,
            summary.total_losses,
            summary.flows
        );
        summaries.push(summary);
    }
    let stats = samples.stats();
    if stats.archives_failed > 0 {
        warn!("{} archives could not be decoded", stats.archives_failed);
    }
    info!(
        "{} samples, {} cache decodes, {} cache hits",
        summaries.len(),
        stats.cache.decodes,
        stats.cache.hits
    );

    Ok(ScanReport {
        data_root,
        config,
        stats,
        samples: summaries,
    })
}

fn write_report(path: &Path, report: &ScanReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize scan report")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datanet.toml");
        fs::write(&path, "graphs_dir = \"topologies\"\nshuffle = true\nseed = 11\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.graphs_dir, "topologies");
        assert!(config.shuffle);
        assert_eq!(config.seed, 11);
        assert_eq!(config.routings_dir, "routings");

        assert_eq!(load_config(None).unwrap(), DatanetConfig::default());
    }

    #[test]
    fn intensity_flag_parses_ranges() {
        let args = Args::try_parse_from(["datanet", "list", "--intensity", "400-1000"]).unwrap();
        assert_eq!(args.intensity, Some(Intensity::Range(400, 1000)));
        assert!(Args::try_parse_from(["datanet", "--intensity", "high", "list"]).is_err());
    }

    #[test]
    fn unreadable_config_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/datanet.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn scan_of_empty_dataset_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = DatanetReader::builder(dir.path()).build().unwrap();
        let report = run_scan(&mut reader, None).unwrap();
        assert!(report.samples.is_empty());
        assert_eq!(report.stats, ScanStats::default());

        let out = dir.path().join("report.json");
        write_report(&out, &report).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
        assert_eq!(json["stats"]["samples"], 0);
        assert_eq!(json["config"]["traces_dir"], "pkts_info");
    }
}
