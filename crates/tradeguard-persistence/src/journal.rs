//! Decision journal.
//!
//! Appends every risk decision, with the inputs that produced it, to a
//! JSON Lines file per UTC day (`decisions_YYYY-MM-DD.jsonl`). Files are
//! opened in append mode, so restarts never truncate earlier entries.
//!
//! Records leave the buffer one at a time, as each line reaches the file. A
//! failed flush keeps only the records that were not written.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tradeguard_core::{ActionParams, Clock, PortfolioSnapshot, RiskDecision};

use crate::error::PersistenceResult;

/// One journaled decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub action: ActionParams,
    pub portfolio: PortfolioSnapshot,
    pub decision: RiskDecision,
}

struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Buffered JSON Lines writer for [`DecisionRecord`]s.
pub struct DecisionJournal {
    base_dir: PathBuf,
    clock: Arc<dyn Clock>,
    buffer: Vec<DecisionRecord>,
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
}

impl DecisionJournal {
    /// Create a journal writing under `base_dir`. The directory is created
    /// if missing. A `max_buffer_size` of 0 behaves like 1.
    pub fn new(
        base_dir: impl AsRef<Path>,
        max_buffer_size: usize,
        clock: Arc<dyn Clock>,
    ) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        let max_buffer_size = max_buffer_size.max(1);
        Ok(Self {
            base_dir,
            clock,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            active_writer: None,
        })
    }

    /// Journal a decision, stamped with the current time.
    pub fn record(
        &mut self,
        action: &ActionParams,
        portfolio: &PortfolioSnapshot,
        decision: &RiskDecision,
    ) -> PersistenceResult<()> {
        let record = DecisionRecord {
            timestamp: self.clock.now(),
            action: *action,
            portfolio: *portfolio,
            decision: decision.clone(),
        };
        self.add_record(record)
    }

    /// Buffer a record, flushing once the buffer is full.
    pub fn add_record(&mut self, record: DecisionRecord) -> PersistenceResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Path of the journal file for `date` (`YYYY-MM-DD`).
    pub fn file_for(&self, date: &str) -> PathBuf {
        self.base_dir.join(format!("decisions_{date}.jsonl"))
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush journal on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed decision journal"
            );
        }
    }

    fn open_writer(&self, date: &str) -> PersistenceResult<ActiveWriter> {
        let path = self.file_for(date);
        info!(path = %path.display(), "Opening decision journal (append mode)");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        })
    }

    /// Write buffered records to the current day's file.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = self.clock.now().format("%Y-%m-%d").to_string();

        if self
            .active_writer
            .as_ref()
            .is_some_and(|w| w.date != today)
        {
            self.close_active_writer();
        }

        let mut active = match self.active_writer.take() {
            Some(active) => active,
            None => self.open_writer(&today)?,
        };

        let (written, result) = Self::write_records(&mut active.writer, &self.buffer);
        self.buffer.drain(..written);
        active.records_written += written;

        match result {
            Ok(()) => {
                debug!(date = %today, records = written, "Flushed decisions to journal");
                self.active_writer = Some(active);
                Ok(())
            }
            Err(e) => {
                // Bytes stuck in the writer must not reach the file on a later flush.
                let (_file, _unwritten) = active.writer.into_parts();
                warn!(
                    date = %today,
                    written,
                    pending = self.buffer.len(),
                    error = %e,
                    "Journal write failed"
                );
                Err(e)
            }
        }
    }

    /// Write `records` one line at a time. Returns how many lines reached
    /// the underlying writer before the first error.
    fn write_records<W: Write>(
        writer: &mut W,
        records: &[DecisionRecord],
    ) -> (usize, PersistenceResult<()>) {
        for (written, record) in records.iter().enumerate() {
            if let Err(e) = Self::write_line(writer, record) {
                return (written, Err(e));
            }
        }
        (records.len(), Ok(()))
    }

    fn write_line<W: Write>(writer: &mut W, record: &DecisionRecord) -> PersistenceResult<()> {
        let json = serde_json::to_string(record)?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }

    /// Flush pending records and close the file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }
}

impl Drop for DecisionJournal {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, "Failed to flush journal on drop");
        }
        self.close_active_writer();
    }
}

impl std::fmt::Debug for DecisionJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionJournal")
            .field("base_dir", &self.base_dir)
            .field("pending", &self.buffer.len())
            .field("max_buffer_size", &self.max_buffer_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::io::{self, BufRead, BufReader};
    use tempfile::TempDir;
    use tradeguard_core::ManualClock;

    fn clock() -> Arc<ManualClock> {
        // 2023-11-14T22:13:20Z
        Arc::new(ManualClock::at_millis(1_700_000_000_000))
    }

    fn portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_value_usd: dec!(50000),
            deployed_capital_usd: dec!(10000),
            day_start_equity_usd: dec!(50000),
            current_equity_usd: dec!(49000.25),
            open_positions: 2,
            daily_trade_count: 4,
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        BufReader::new(file).lines().map_while(Result::ok).collect()
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().filter_map(|e| e.ok()).count()
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let clock = clock();
        let mut journal = DecisionJournal::new(temp_dir.path(), 100, clock.clone()).unwrap();

        let action = ActionParams::new(dec!(1000), dec!(2.15), dec!(15));
        for _ in 0..3 {
            journal
                .record(&action, &portfolio(), &RiskDecision::approved(vec![]))
                .unwrap();
        }
        journal
            .record(&action, &portfolio(), &RiskDecision::denied(35, "Daily loss"))
            .unwrap();
        journal.close().unwrap();

        let lines = read_lines(&journal.file_for("2023-11-14"));
        assert_eq!(lines.len(), 4);

        let record: DecisionRecord = serde_json::from_str(&lines[3]).unwrap();
        assert_eq!(record.timestamp, clock.now());
        assert_eq!(record.action, action);
        assert_eq!(record.portfolio.current_equity_usd, dec!(49000.25));
        assert!(!record.decision.allowed);
        assert_eq!(record.decision.risk_score, 35);
    }

    #[test]
    fn test_buffer_flushes_at_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = DecisionJournal::new(temp_dir.path(), 2, clock()).unwrap();
        let action = ActionParams::new(dec!(1000), dec!(0), dec!(0));
        let decision = RiskDecision::approved(vec![]);

        journal.record(&action, &portfolio(), &decision).unwrap();
        assert_eq!(journal.pending(), 1);
        assert_eq!(file_count(temp_dir.path()), 0);

        journal.record(&action, &portfolio(), &decision).unwrap();
        assert_eq!(journal.pending(), 0);
        assert_eq!(read_lines(&journal.file_for("2023-11-14")).len(), 2);
    }

    #[test]
    fn test_append_mode() {
        let temp_dir = TempDir::new().unwrap();
        let action = ActionParams::new(dec!(1000), dec!(0), dec!(0));
        let decision = RiskDecision::approved(vec![]);

        for _ in 0..2 {
            let mut journal = DecisionJournal::new(temp_dir.path(), 100, clock()).unwrap();
            for _ in 0..3 {
                journal.record(&action, &portfolio(), &decision).unwrap();
            }
            journal.close().unwrap();
        }

        let path = temp_dir.path().join("decisions_2023-11-14.jsonl");
        assert_eq!(read_lines(&path).len(), 6);
    }

    #[test]
    fn test_daily_rotation_follows_clock() {
        let temp_dir = TempDir::new().unwrap();
        let clock = clock();
        let mut journal = DecisionJournal::new(temp_dir.path(), 1, clock.clone()).unwrap();
        let action = ActionParams::new(dec!(1000), dec!(0), dec!(0));
        let decision = RiskDecision::approved(vec![]);

        journal.record(&action, &portfolio(), &decision).unwrap();
        clock.advance(Duration::hours(2));
        journal.record(&action, &portfolio(), &decision).unwrap();
        journal.close().unwrap();

        assert_eq!(read_lines(&journal.file_for("2023-11-14")).len(), 1);
        assert_eq!(read_lines(&journal.file_for("2023-11-15")).len(), 1);
    }

    #[test]
    fn test_drop_flushes_pending() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut journal = DecisionJournal::new(temp_dir.path(), 100, clock()).unwrap();
            journal
                .record(
                    &ActionParams::new(dec!(1000), dec!(0), dec!(0)),
                    &portfolio(),
                    &RiskDecision::approved(vec![]),
                )
                .unwrap();
        }

        let path = temp_dir.path().join("decisions_2023-11-14.jsonl");
        assert_eq!(read_lines(&path).len(), 1);
    }

    #[test]
    fn test_empty_flush_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = DecisionJournal::new(temp_dir.path(), 100, clock()).unwrap();

        journal.flush().unwrap();
        assert_eq!(file_count(temp_dir.path()), 0);
    }

    /// Accepts a fixed number of flushed lines, then reports a full disk.
    struct FillingSink {
        accepted: Vec<u8>,
        pending: Vec<u8>,
        flushes_left: usize,
    }

    impl Write for FillingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.pending.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.flushes_left == 0 {
                return Err(io::Error::other("no space left"));
            }
            self.flushes_left -= 1;
            self.accepted.append(&mut self.pending);
            Ok(())
        }
    }

    fn record(trade_value_usd: rust_decimal::Decimal) -> DecisionRecord {
        DecisionRecord {
            timestamp: clock().now(),
            action: ActionParams::new(trade_value_usd, dec!(0), dec!(0)),
            portfolio: portfolio(),
            decision: RiskDecision::approved(vec![]),
        }
    }

    #[test]
    fn test_write_records_reports_lines_written_before_failure() {
        let mut sink = FillingSink {
            accepted: Vec::new(),
            pending: Vec::new(),
            flushes_left: 2,
        };
        let records: Vec<_> = [dec!(1), dec!(2), dec!(3), dec!(4)]
            .into_iter()
            .map(record)
            .collect();

        let (written, result) = DecisionJournal::write_records(&mut sink, &records);

        assert_eq!(written, 2);
        assert!(result.is_err());
        let lines: Vec<DecisionRecord> = String::from_utf8(sink.accepted)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines, records[..2].to_vec());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_flush_retries_each_record_once() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let mut journal = DecisionJournal::new(temp_dir.path(), 100, clock()).unwrap();
        let path = journal.file_for("2023-11-14");
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        journal.add_record(record(dec!(100))).unwrap();
        journal.add_record(record(dec!(200))).unwrap();
        assert!(journal.flush().is_err());
        assert_eq!(journal.pending(), 2);

        std::fs::remove_file(&path).unwrap();
        journal.add_record(record(dec!(300))).unwrap();
        journal.close().unwrap();
        assert_eq!(journal.pending(), 0);

        let values: Vec<_> = read_lines(&path)
            .iter()
            .map(|l| {
                serde_json::from_str::<DecisionRecord>(l)
                    .unwrap()
                    .action
                    .trade_value_usd
            })
            .collect();
        assert_eq!(values, vec![dec!(100), dec!(200), dec!(300)]);
    }
}
