use serde::{Deserialize, Serialize};

/// Inter-arrival time model of a generated flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeDistribution {
    Exponential {
        eq_lambda: f64,
        avg_pkts_lambda: f64,
        exp_max_factor: f64,
    },
    Deterministic {
        eq_lambda: f64,
        avg_pkts_lambda: f64,
    },
    Uniform {
        eq_lambda: f64,
        min_pkt_lambda: f64,
        max_pkt_lambda: f64,
    },
    Normal {
        eq_lambda: f64,
        avg_pkts_lambda: f64,
        std_dev: f64,
    },
    OnOff {
        eq_lambda: f64,
        pkts_lambda_on: f64,
        avg_t_off: f64,
        avg_t_on: f64,
        exp_max_factor: f64,
    },
    /// Poisson Pareto burst process.
    Ppbp {
        eq_lambda: f64,
        burst_gen_lambda: f64,
        bitrate: f64,
        pareto_min_size: f64,
        pareto_max_size: f64,
        pareto_alfa: f64,
        exp_max_factor: f64,
    },
    ConstantRate {
        eq_lambda: f64,
        avg_pkts_lambda: f64,
    },
    MultiBurst {
        eq_lambda: f64,
        burst_gap: f64,
        burst_duration: f64,
        pkts_per_burst: f64,
        num_bursts: f64,
        exp_max_factor: f64,
    },
}

impl TimeDistribution {
    /// Equivalent bit rate every time model carries as its first parameter.
    pub fn eq_lambda(&self) -> f64 {
        match self {
            TimeDistribution::Exponential { eq_lambda, .. }
            | TimeDistribution::Deterministic { eq_lambda, .. }
            | TimeDistribution::Uniform { eq_lambda, .. }
            | TimeDistribution::Normal { eq_lambda, .. }
            | TimeDistribution::OnOff { eq_lambda, .. }
            | TimeDistribution::Ppbp { eq_lambda, .. }
            | TimeDistribution::ConstantRate { eq_lambda, .. }
            | TimeDistribution::MultiBurst { eq_lambda, .. } => *eq_lambda,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeDistribution::Exponential { .. } => "EXPONENTIAL_T",
            TimeDistribution::Deterministic { .. } => "DETERMINISTIC_T",
            TimeDistribution::Uniform { .. } => "UNIFORM_T",
            TimeDistribution::Normal { .. } => "NORMAL_T",
            TimeDistribution::OnOff { .. } => "ONOFF_T",
            TimeDistribution::Ppbp { .. } => "PPBP_T",
            TimeDistribution::ConstantRate { .. } => "CBR_T",
            TimeDistribution::MultiBurst { .. } => "MULTIBURST_T",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeCandidate {
    pub size: f64,
    pub prob: f64,
}

/// Packet size model of a generated flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizeDistribution {
    Deterministic {
        avg_pkt_size: f64,
    },
    Uniform {
        avg_pkt_size: f64,
        min_size: f64,
        max_size: f64,
    },
    Binomial {
        avg_pkt_size: f64,
        pkt_size_1: f64,
        pkt_size_2: f64,
    },
    Generic {
        avg_pkt_size: f64,
        candidates: Vec<SizeCandidate>,
    },
}

impl SizeDistribution {
    pub fn avg_pkt_size(&self) -> f64 {
        match self {
            SizeDistribution::Deterministic { avg_pkt_size }
            | SizeDistribution::Uniform { avg_pkt_size, .. }
            | SizeDistribution::Binomial { avg_pkt_size, .. }
            | SizeDistribution::Generic { avg_pkt_size, .. } => *avg_pkt_size,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SizeDistribution::Deterministic { .. } => "DETERMINISTIC_S",
            SizeDistribution::Uniform { .. } => "UNIFORM_S",
            SizeDistribution::Binomial { .. } => "BINOMIAL_S",
            SizeDistribution::Generic { .. } => "GENERIC_S",
        }
    }
}

/// Generation parameters of one flow plus what the simulator measured for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficDescriptor {
    pub time: TimeDistribution,
    pub size: SizeDistribution,
    /// Class-of-service tag.
    pub tos: u32,
    /// Filled from flow-level results when the archive carries them.
    pub avg_bw: Option<f64>,
    pub pkts_gen: Option<f64>,
}
