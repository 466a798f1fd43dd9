//! Append-only event logs produced by probe sessions
//!
//! Three files, one record per line, never rewritten:
//! - sent log: send timestamp in seconds (`%.6f`)
//! - recv log: acknowledgement timestamp in seconds (`%.6f`)
//! - rtt log: `send_ts ack_ts rtt_ms` (`%.6f %.6f %.4f`)
//!
//! These files are the contract consumed by the analysis tooling, so the
//! formats here must not drift.

use crate::error::{ErrorContext, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Locations of the three event logs
#[derive(Debug, Clone, PartialEq)]
pub struct LogPaths {
    pub sent: PathBuf,
    pub recv: PathBuf,
    pub rtt: PathBuf,
}

impl LogPaths {
    /// Standard file names under `dir`
    pub fn in_dir(dir: PathBuf) -> Self {
        Self {
            sent: dir.join(crate::defaults::SENT_LOG_NAME),
            recv: dir.join(crate::defaults::RECV_LOG_NAME),
            rtt: dir.join(crate::defaults::RTT_LOG_NAME),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.sent, &self.recv, &self.rtt]
    }
}

/// One round-trip sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttRecord {
    pub send_ts: f64,
    pub ack_ts: f64,
    pub rtt_ms: f64,
}

impl RttRecord {
    /// Build a record, deriving the RTT from the two timestamps
    pub fn new(send_ts: f64, ack_ts: f64) -> Self {
        Self {
            send_ts,
            ack_ts,
            rtt_ms: (ack_ts - send_ts) * 1000.0,
        }
    }

    /// Line as written to the rtt log, without the newline
    pub fn to_line(&self) -> String {
        format!("{} {} {:.4}", format_timestamp(self.send_ts), format_timestamp(self.ack_ts), self.rtt_ms)
    }
}

/// Seconds with microsecond precision, the timestamp format of every log
pub fn format_timestamp(ts: f64) -> String {
    format!("{:.6}", ts)
}

/// Current wall-clock time in fractional seconds since the epoch
pub fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Appends records to the sent, recv and rtt logs
pub struct EventLogWriter {
    paths: LogPaths,
    sent: File,
    recv: File,
    rtt: File,
}

impl EventLogWriter {
    /// Open all three logs in append mode, creating files and directories as needed
    pub fn open(paths: &LogPaths) -> Result<Self> {
        for path in paths.all() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
        }

        Ok(Self {
            paths: paths.clone(),
            sent: open_append(&paths.sent)?,
            recv: open_append(&paths.recv)?,
            rtt: open_append(&paths.rtt)?,
        })
    }

    /// Paths this writer appends to
    pub fn paths(&self) -> &LogPaths {
        &self.paths
    }

    /// Append a send timestamp
    pub fn record_sent(&mut self, ts: f64) -> Result<()> {
        append_line(&mut self.sent, &format_timestamp(ts))
            .with_context(|| format!("writing {}", self.paths.sent.display()))
    }

    /// Append an acknowledgement timestamp
    pub fn record_received(&mut self, ts: f64) -> Result<()> {
        append_line(&mut self.recv, &format_timestamp(ts))
            .with_context(|| format!("writing {}", self.paths.recv.display()))
    }

    /// Append a round-trip sample
    pub fn record_rtt(&mut self, record: &RttRecord) -> Result<()> {
        append_line(&mut self.rtt, &record.to_line())
            .with_context(|| format!("writing {}", self.paths.rtt.display()))
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))
}

// A single write per record keeps lines whole for concurrent readers.
fn append_line(file: &mut File, line: &str) -> std::io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rtt_record_line_format() {
        let record = RttRecord::new(1000.25, 1000.375);
        assert_eq!(record.rtt_ms, 125.0);
        assert_eq!(record.to_line(), "1000.250000 1000.375000 125.0000");
    }

    #[test]
    fn test_timestamp_has_microsecond_precision() {
        assert_eq!(format_timestamp(12.5), "12.500000");
        assert_eq!(format_timestamp(0.0000014), "0.000001");
    }

    #[test]
    fn test_open_creates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let paths = LogPaths::in_dir(temp.path().join("nested").join("logs"));

        let writer = EventLogWriter::open(&paths).unwrap();
        assert!(paths.sent.exists());
        assert!(paths.recv.exists());
        assert!(paths.rtt.exists());
        assert_eq!(writer.paths(), &paths);
    }

    #[test]
    fn test_records_append_one_per_line() {
        let temp = TempDir::new().unwrap();
        let paths = LogPaths::in_dir(temp.path().to_path_buf());

        let mut writer = EventLogWriter::open(&paths).unwrap();
        writer.record_sent(10.0).unwrap();
        writer.record_sent(10.1).unwrap();
        writer.record_received(10.05).unwrap();
        writer.record_rtt(&RttRecord::new(10.0, 10.05)).unwrap();

        let sent = fs::read_to_string(&paths.sent).unwrap();
        assert_eq!(sent, "10.000000\n10.100000\n");

        let recv = fs::read_to_string(&paths.recv).unwrap();
        assert_eq!(recv, "10.050000\n");

        let rtt = fs::read_to_string(&paths.rtt).unwrap();
        assert_eq!(rtt.lines().count(), 1);
        assert!(rtt.starts_with("10.000000 10.050000 50.0"));
    }

    #[test]
    fn test_reopen_appends_instead_of_truncating() {
        let temp = TempDir::new().unwrap();
        let paths = LogPaths::in_dir(temp.path().to_path_buf());

        EventLogWriter::open(&paths).unwrap().record_sent(1.0).unwrap();
        EventLogWriter::open(&paths).unwrap().record_sent(2.0).unwrap();

        let sent = fs::read_to_string(&paths.sent).unwrap();
        assert_eq!(sent.lines().collect::<Vec<_>>(), vec!["1.000000", "2.000000"]);
    }

    #[test]
    fn test_open_fails_when_dir_is_a_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let paths = LogPaths::in_dir(blocker);
        let error = EventLogWriter::open(&paths).err().unwrap();
        assert_eq!(error.category(), "IO");
    }

    #[test]
    fn test_wall_clock_is_after_epoch() {
        assert!(wall_clock_secs() > 1_600_000_000.0);
    }
}
