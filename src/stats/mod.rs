//! Latency and delivery analysis of probe sessions
//!
//! Works either on a finished [`ProbeSession`] or on the text of the event
//! logs. The log parsers are tolerant: blank lines, `#` comments and rows that
//! do not parse are skipped, so a partially written or empty log yields fewer
//! samples rather than an error.

use crate::error::{ErrorContext, Result};
use crate::eventlog::LogPaths;
use crate::probe::ProbeSession;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Summary of round-trip samples in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RttSummary {
    pub count: usize,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl RttSummary {
    /// `None` when there are no samples
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Some(Self {
            count: sorted.len(),
            mean_ms: sorted.iter().sum::<f64>() / sorted.len() as f64,
            p95_ms: percentile(&sorted, 95.0),
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
        })
    }
}

/// Loss over one second of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossBucket {
    /// Seconds since the first event of either log
    pub second: u64,
    pub sent: u64,
    pub received: u64,
    /// `(sent - received) / sent * 100`, or zero when nothing was sent
    pub loss_pct: f64,
}

/// Everything reported at the end of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub sent: u64,
    pub received: u64,
    /// Overall loss in percent; `None` when nothing was sent
    pub loss_pct: Option<f64>,
    pub rtt: Option<RttSummary>,
    pub timeline: Vec<LossBucket>,
}

impl SessionAnalysis {
    /// Analyze the samples a session kept in memory
    pub fn from_session(session: &ProbeSession) -> Self {
        Self::from_samples(&session.sent_at, &session.acked_at, &session.rtt_ms)
    }

    /// Analyze the three event logs on disk
    pub fn from_logs(paths: &LogPaths) -> Result<Self> {
        let sent = parse_timestamps(&read_log(&paths.sent)?);
        let recv = parse_timestamps(&read_log(&paths.recv)?);
        let rtt = parse_rtt_samples(&read_log(&paths.rtt)?);
        Ok(Self::from_samples(&sent, &recv, &rtt))
    }

    pub fn from_samples(sent: &[f64], recv: &[f64], rtt_ms: &[f64]) -> Self {
        Self {
            sent: sent.len() as u64,
            received: recv.len() as u64,
            loss_pct: overall_loss(sent.len() as u64, recv.len() as u64).map(|l| l * 100.0),
            rtt: RttSummary::from_samples(rtt_ms),
            timeline: per_second_loss(sent, recv),
        }
    }
}

/// Loss fraction over a whole run; `None` when nothing was sent
pub fn overall_loss(sent: u64, received: u64) -> Option<f64> {
    if sent == 0 {
        return None;
    }
    Some((sent as f64 - received as f64) / sent as f64)
}

/// Longest span filled with empty seconds; past it only populated seconds
/// are reported
const MAX_FILLED_SECS: u64 = 2 * 86_400;

/// Bucket send and receive timestamps into one-second slots and compute the
/// loss of each.
///
/// Slot zero starts at the earliest timestamp of either list. A slot where
/// nothing was sent reports zero loss. A slot can go negative when acks
/// spill over from the previous second; that is reported as is. A stray
/// timestamp far from the rest, such as a truncated last line, only adds its
/// own slot.
pub fn per_second_loss(sent: &[f64], recv: &[f64]) -> Vec<LossBucket> {
    if sent.is_empty() {
        return Vec::new();
    }

    let t0 = sent.iter().chain(recv.iter()).copied().fold(f64::INFINITY, f64::min);

    let mut slots: BTreeMap<u64, (u64, u64)> = BTreeMap::new();
    for &t in sent {
        slots.entry(slot_of(t, t0)).or_default().0 += 1;
    }
    for &t in recv {
        slots.entry(slot_of(t, t0)).or_default().1 += 1;
    }

    if let Some(&last) = slots.keys().next_back() {
        if last <= MAX_FILLED_SECS {
            for second in 0..last {
                slots.entry(second).or_default();
            }
        }
    }

    slots
        .into_iter()
        .map(|(second, (sent, received))| LossBucket {
            second,
            sent,
            received,
            loss_pct: if sent == 0 {
                0.0
            } else {
                (sent as f64 - received as f64) / sent as f64 * 100.0
            },
        })
        .collect()
}

// Float to integer casts saturate, so huge offsets cannot overflow.
fn slot_of(t: f64, t0: f64) -> u64 {
    (t - t0).floor() as u64
}

/// Linear-interpolated percentile of already sorted values
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

/// Timestamps of a sent or recv log
pub fn parse_timestamps(text: &str) -> Vec<f64> {
    data_lines(text)
        .filter_map(|line| line.split_whitespace().next()?.parse::<f64>().ok())
        .filter(|t| t.is_finite())
        .collect()
}

/// RTT column of an rtt log; rows with fewer than three columns are skipped
pub fn parse_rtt_samples(text: &str) -> Vec<f64> {
    data_lines(text)
        .filter_map(|line| line.split_whitespace().nth(2)?.parse::<f64>().ok())
        .filter(|rtt| rtt.is_finite())
        .collect()
}

fn data_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Missing logs read as empty
fn read_log(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}


#[cfg(test)]
mod comprehensive_tests;
