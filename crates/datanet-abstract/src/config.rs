use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Traffic intensity a scan is restricted to: one value or an inclusive
/// `lo-hi` range. In TOML either `intensity = 800` or `intensity = [400, 1000]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Intensity {
    Single(u64),
    Range(u64, u64),
}

impl Intensity {
    /// Inclusive bounds, lowest first.
    pub fn bounds(self) -> (u64, u64) {
        match self {
            Intensity::Single(v) => (v, v),
            Intensity::Range(a, b) => (a.min(b), a.max(b)),
        }
    }

    /// True when `self` shares at least one value with `other`.
    pub fn overlaps(self, other: Intensity) -> bool {
        let (lo, hi) = self.bounds();
        let (other_lo, other_hi) = other.bounds();
        lo <= other_hi && other_lo <= hi
    }
}

impl FromStr for Intensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = |raw: &str| {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| format!("'{s}' is not an intensity or lo-hi range"))
        };
        match s.split_once('-') {
            Some((lo, hi)) => Ok(Intensity::Range(number(lo)?, number(hi)?)),
            None => Ok(Intensity::Single(number(s)?)),
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intensity::Single(v) => write!(f, "{v}"),
            Intensity::Range(lo, hi) => write!(f, "{lo}-{hi}"),
        }
    }
}

/// Where a dataset keeps its shared artifacts and how a scan walks it.
///
/// Artifact directories are resolved against the directory holding the
/// archive; `traces_dir` is resolved against the data root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatanetConfig {
    pub graphs_dir: String,
    pub routings_dir: String,
    pub physical_graphs_dir: String,
    pub l2_paths_dir: String,
    pub tg_paths_dir: String,
    pub traces_dir: String,
    /// Visit archives in a seeded random order instead of sorted order.
    pub shuffle: bool,
    pub seed: u64,
    /// Treat any undefined src != dst routing cell as a decoding error.
    pub require_full_routing: bool,
    /// Only scan archives whose name carries an overlapping intensity.
    pub intensity: Option<Intensity>,
}

impl Default for DatanetConfig {
    fn default() -> Self {
        Self {
            graphs_dir: "graphs".to_string(),
            routings_dir: "routings".to_string(),
            physical_graphs_dir: "physical_graphs".to_string(),
            l2_paths_dir: "l2_paths".to_string(),
            tg_paths_dir: "tg_paths".to_string(),
            traces_dir: "pkts_info".to_string(),
            shuffle: false,
            seed: 0,
            require_full_routing: false,
            intensity: None,
        }
    }
}

/// Partial configuration, typically read from a TOML file, layered on top
/// of [`DatanetConfig::default`].
#[derive(Deserialize, Debug, Clone, Default)]
pub struct DatanetConfigOverride {
    pub graphs_dir: Option<String>,
    pub routings_dir: Option<String>,
    pub physical_graphs_dir: Option<String>,
    pub l2_paths_dir: Option<String>,
    pub tg_paths_dir: Option<String>,
    pub traces_dir: Option<String>,
    pub shuffle: Option<bool>,
    pub seed: Option<u64>,
    pub require_full_routing: Option<bool>,
    pub intensity: Option<Intensity>,
}

impl DatanetConfigOverride {
    pub fn apply_to(&self, config: &mut DatanetConfig) {
        if let Some(v) = &self.graphs_dir {
            config.graphs_dir = v.clone();
        }
        if let Some(v) = &self.routings_dir {
            config.routings_dir = v.clone();
        }
        if let Some(v) = &self.physical_graphs_dir {
            config.physical_graphs_dir = v.clone();
        }
        if let Some(v) = &self.l2_paths_dir {
            config.l2_paths_dir = v.clone();
        }
        if let Some(v) = &self.tg_paths_dir {
            config.tg_paths_dir = v.clone();
        }
        if let Some(v) = &self.traces_dir {
            config.traces_dir = v.clone();
        }
        if let Some(v) = self.shuffle {
            config.shuffle = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.require_full_routing {
            config.require_full_routing = v;
        }
        if let Some(v) = self.intensity {
            config.intensity = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_only_touches_present_fields() {
        let partial: DatanetConfigOverride =
            toml::from_str("routings_dir = \"paths\"\nshuffle = true\nseed = 7\n").unwrap();
        let mut config = DatanetConfig::default();
        partial.apply_to(&mut config);

        assert_eq!(config.routings_dir, "paths");
        assert!(config.shuffle);
        assert_eq!(config.seed, 7);
        assert_eq!(config.graphs_dir, "graphs");
        assert!(!config.require_full_routing);
        assert_eq!(config.intensity, None);
    }

    #[test]
    fn intensity_accepts_single_value_or_range() {
        let single: DatanetConfigOverride = toml::from_str("intensity = 800\n").unwrap();
        assert_eq!(single.intensity, Some(Intensity::Single(800)));
        let range: DatanetConfigOverride = toml::from_str("intensity = [400, 1000]\n").unwrap();
        assert_eq!(range.intensity, Some(Intensity::Range(400, 1000)));

        let mut config = DatanetConfig::default();
        range.apply_to(&mut config);
        assert_eq!(config.intensity, Some(Intensity::Range(400, 1000)));

        assert_eq!("600-1000".parse::<Intensity>(), Ok(Intensity::Range(600, 1000)));
        assert_eq!("750".parse::<Intensity>(), Ok(Intensity::Single(750)));
        assert!("high".parse::<Intensity>().is_err());
        assert_eq!(Intensity::Range(600, 1000).to_string(), "600-1000");
    }

    #[test]
    fn intensity_overlap_is_inclusive() {
        let wanted = Intensity::Range(400, 1000);
        assert!(wanted.overlaps(Intensity::Range(1000, 1400)));
        assert!(wanted.overlaps(Intensity::Single(400)));
        assert!(!wanted.overlaps(Intensity::Range(1001, 1400)));
        assert!(Intensity::Single(800).overlaps(Intensity::Range(600, 1000)));
        assert!(!Intensity::Single(800).overlaps(Intensity::Single(801)));
    }
}
