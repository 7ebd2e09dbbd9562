use datanet_abstract::{SizeCandidate, SizeDistribution, TimeDistribution};

use crate::error::{DatanetError, Result};

struct TimeLayout {
    arity: usize,
    build: fn(&[f64]) -> TimeDistribution,
}

/// Indexed by tag value.
const TIME_LAYOUTS: [TimeLayout; 8] = [
    TimeLayout {
        arity: 3,
        build: |p| TimeDistribution::Exponential {
            eq_lambda: p[0],
            avg_pkts_lambda: p[1],
            exp_max_factor: p[2],
        },
    },
    TimeLayout {
        arity: 2,
        build: |p| TimeDistribution::Deterministic {
            eq_lambda: p[0],
            avg_pkts_lambda: p[1],
        },
    },
    TimeLayout {
        arity: 3,
        build: |p| TimeDistribution::Uniform {
            eq_lambda: p[0],
            min_pkt_lambda: p[1],
            max_pkt_lambda: p[2],
        },
    },
    TimeLayout {
        arity: 3,
        build: |p| TimeDistribution::Normal {
            eq_lambda: p[0],
            avg_pkts_lambda: p[1],
            std_dev: p[2],
        },
    },
    TimeLayout {
        arity: 5,
        build: |p| TimeDistribution::OnOff {
            eq_lambda: p[0],
            pkts_lambda_on: p[1],
            avg_t_off: p[2],
            avg_t_on: p[3],
            exp_max_factor: p[4],
        },
    },
    TimeLayout {
        arity: 7,
        build: |p| TimeDistribution::Ppbp {
            eq_lambda: p[0],
            burst_gen_lambda: p[1],
            bitrate: p[2],
            pareto_min_size: p[3],
            pareto_max_size: p[4],
            pareto_alfa: p[5],
            exp_max_factor: p[6],
        },
    },
    TimeLayout {
        arity: 2,
        build: |p| TimeDistribution::ConstantRate {
            eq_lambda: p[0],
            avg_pkts_lambda: p[1],
        },
    },
    TimeLayout {
        arity: 6,
        build: |p| TimeDistribution::MultiBurst {
            eq_lambda: p[0],
            burst_gap: p[1],
            burst_duration: p[2],
            pkts_per_burst: p[3],
            num_bursts: p[4],
            exp_max_factor: p[5],
        },
    },
];

const SIZE_GENERIC_TAG: usize = 3;

/// Fixed-arity size layouts; the generic layout is handled separately.
const SIZE_LAYOUTS: [(usize, fn(&[f64]) -> SizeDistribution); 3] = [
    (1, |p| SizeDistribution::Deterministic { avg_pkt_size: p[0] }),
    (3, |p| SizeDistribution::Uniform {
        avg_pkt_size: p[0],
        min_size: p[1],
        max_size: p[2],
    }),
    (3, |p| SizeDistribution::Binomial {
        avg_pkt_size: p[0],
        pkt_size_1: p[1],
        pkt_size_2: p[2],
    }),
];

/// Decodes one time block starting at `cursor`. Returns the cursor past
/// the block.
pub fn decode_time(fields: &[f64], cursor: usize) -> Result<(TimeDistribution, usize)> {
    let tag = read_count(fields, cursor, "time distribution tag")?;
    let layout = TIME_LAYOUTS.get(tag).ok_or_else(|| {
        DatanetError::structural(
            format!("time distribution at field {cursor}"),
            format!("unsupported tag {tag}"),
        )
    })?;
    let params = take(fields, cursor + 1, layout.arity, "time distribution")?;
    Ok(((layout.build)(params), cursor + 1 + layout.arity))
}

/// Decodes one size block starting at `cursor`.
pub fn decode_size(fields: &[f64], cursor: usize) -> Result<(SizeDistribution, usize)> {
    let tag = read_count(fields, cursor, "size distribution tag")?;
    if tag == SIZE_GENERIC_TAG {
        return decode_generic_size(fields, cursor);
    }
    let (arity, build) = SIZE_LAYOUTS.get(tag).ok_or_else(|| {
        DatanetError::structural(
            format!("size distribution at field {cursor}"),
            format!("unsupported tag {tag}"),
        )
    })?;
    let params = take(fields, cursor + 1, *arity, "size distribution")?;
    Ok((build(params), cursor + 1 + arity))
}

/// Time block followed by size block, as laid out for every flow.
pub fn decode_flow(
    fields: &[f64],
    cursor: usize,
) -> Result<(TimeDistribution, SizeDistribution, usize)> {
    let (time, cursor) = decode_time(fields, cursor)?;
    let (size, cursor) = decode_size(fields, cursor)?;
    Ok((time, size, cursor))
}

fn decode_generic_size(fields: &[f64], cursor: usize) -> Result<(SizeDistribution, usize)> {
    let avg_pkt_size = take(fields, cursor + 1, 1, "generic size distribution")?[0];
    let count = read_count(fields, cursor + 2, "generic size candidate count")?;
    let len = count.checked_mul(2).ok_or_else(|| {
        DatanetError::structural(
            format!("generic size candidate count at field {}", cursor + 2),
            format!("{count} candidates is out of range"),
        )
    })?;
    let pairs = take(fields, cursor + 3, len, "generic size candidates")?;
    let candidates = pairs
        .chunks_exact(2)
        .map(|pair| SizeCandidate {
            size: pair[0],
            prob: pair[1],
        })
        .collect();
    Ok((
        SizeDistribution::Generic {
            avg_pkt_size,
            candidates,
        },
        cursor + 3 + len,
    ))
}

fn take<'a>(fields: &'a [f64], start: usize, len: usize, what: &str) -> Result<&'a [f64]> {
    let end = start.checked_add(len);
    end.and_then(|end| fields.get(start..end)).ok_or_else(|| {
        DatanetError::structural(
            format!("{what} at field {start}"),
            format!(
                "needs {len} fields, only {} left",
                fields.len().saturating_sub(start)
            ),
        )
    })
}

/// Reads a field that must hold a non-negative integer (tags and counts).
fn read_count(fields: &[f64], at: usize, what: &str) -> Result<usize> {
    let value = *fields.get(at).ok_or_else(|| {
        DatanetError::structural(format!("{what} at field {at}"), "line ends before field")
    })?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(DatanetError::structural(
            format!("{what} at field {at}"),
            format!("unsupported tag {value}"),
        ));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_consumes_three_parameters() {
        let fields = [0.0, 100.0, 0.5, 10.0, 99.0];
        let (time, cursor) = decode_time(&fields, 0).unwrap();
        assert_eq!(cursor, 4);
        assert_eq!(
            time,
            TimeDistribution::Exponential {
                eq_lambda: 100.0,
                avg_pkts_lambda: 0.5,
                exp_max_factor: 10.0
            }
        );
    }

    #[test]
    fn on_off_consumes_five_parameters() {
        let fields = [7.0, 4.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let (time, cursor) = decode_time(&fields, 1).unwrap();
        assert_eq!(cursor, 7);
        assert!(matches!(time, TimeDistribution::OnOff { avg_t_on, .. } if avg_t_on == 4.0));
    }

    #[test]
    fn cursor_advance_per_time_tag() {
        let expected = [4, 3, 4, 4, 6, 8, 3, 7];
        for (tag, advance) in expected.iter().enumerate() {
            let mut fields = vec![tag as f64];
            fields.extend(std::iter::repeat_n(1.0, 8));
            let (_, cursor) = decode_time(&fields, 0).unwrap();
            assert_eq!(cursor, *advance, "tag {tag}");
        }
    }

    #[test]
    fn unknown_or_fractional_tags_are_rejected() {
        let err = decode_time(&[9.0, 1.0, 1.0, 1.0], 0).unwrap_err();
        assert!(err.to_string().contains("unsupported tag 9"));
        assert!(decode_time(&[1.5, 1.0, 1.0], 0).is_err());
        assert!(decode_size(&[4.0, 1.0], 0).is_err());
        assert!(decode_size(&[-1.0, 1.0], 0).is_err());
    }

    #[test]
    fn truncated_block_is_a_field_count_error() {
        let err = decode_time(&[5.0, 1.0, 2.0], 0).unwrap_err();
        assert!(err.to_string().contains("needs 7 fields"));
    }

    #[test]
    fn generic_size_with_two_candidates_consumes_six_fields() {
        let fields = [3.0, 750.0, 2.0, 500.0, 0.5, 1000.0, 0.5, 42.0];
        let (size, cursor) = decode_size(&fields, 0).unwrap();
        // past the tag: avg size, count, then two (size, prob) pairs
        assert_eq!(cursor - 1, 2 + 2 * 2);
        match size {
            SizeDistribution::Generic {
                avg_pkt_size,
                candidates,
            } => {
                assert_eq!(avg_pkt_size, 750.0);
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[1].size, 1000.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn binomial_reads_distinct_sizes() {
        let (size, _) = decode_size(&[2.0, 800.0, 300.0, 1300.0], 0).unwrap();
        assert_eq!(
            size,
            SizeDistribution::Binomial {
                avg_pkt_size: 800.0,
                pkt_size_1: 300.0,
                pkt_size_2: 1300.0
            }
        );
    }

    #[test]
    fn flow_block_resumes_after_size() {
        let fields = [6.0, 1000.0, 1.25, 0.0, 1000.0, 3.0];
        let (time, size, cursor) = decode_flow(&fields, 0).unwrap();
        assert_eq!(time.name(), "CBR_T");
        assert_eq!(size.avg_pkt_size(), 1000.0);
        assert_eq!(cursor, 5);
        assert_eq!(fields[cursor], 3.0);
    }
}
