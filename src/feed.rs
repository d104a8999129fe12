// feed.rs
use crate::types::Sample;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Emitted by the poller once a sample has landed in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesEvent {
    Updated { symbol: String, sample: Sample },
    FetchFailed { symbol: String, error: String },
}

pub type EventSender = mpsc::Sender<SeriesEvent>;
pub type EventReceiver = mpsc::Receiver<SeriesEvent>;

pub fn create_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}

/// A recorded sample, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSample {
    pub symbol: String,
    pub ts: DateTime<Utc>,
    pub price: f64,
}

impl RecordedSample {
    pub fn sample(&self) -> Sample {
        Sample::new(self.ts, self.price)
    }
}

/// Buffers samples in memory and appends them to a daily JSONL file on flush.
pub struct Recorder {
    dir: PathBuf,
    prefix: String,
    buffer: Vec<RecordedSample>,
}

impl Recorder {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)
            .with_context(|| format!("creating recording dir {}", dir.display()))?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            buffer: Vec::new(),
        })
    }

    pub fn push(&mut self, symbol: &str, sample: Sample) {
        self.buffer.push(RecordedSample {
            symbol: symbol.to_string(),
            ts: sample.ts,
            price: sample.price,
        });
    }

    /// One file per day, named after the wall clock at flush time.
    pub fn path_for(&self, day: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("{}_{}.jsonl", self.prefix, day.format("%Y%m%d")))
    }

    /// Writes the buffered samples and returns how many were written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let path = self.path_for(Utc::now());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;

        let n = self.buffer.len();
        for rec in self.buffer.drain(..) {
            let line = serde_json::to_string(&rec)?;
            writeln!(file, "{}", line)?;
        }
        tracing::debug!(path = %path.display(), samples = n, "recording flushed");
        Ok(n)
    }
}

/// Reads a recording back. Lines that do not decode are skipped.
pub fn replay_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<RecordedSample>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    Ok(reader
        .lines()
        .map_while(|line| line.ok())
        .filter_map(|l| serde_json::from_str::<RecordedSample>(&l).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn flush_then_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = Recorder::new(dir.path(), "live").unwrap();
        let ts = Utc.timestamp_opt(1_724_716_800, 0).unwrap();
        rec.push("BTCUSDT", Sample::new(ts, 64000.5));
        rec.push("ETHUSDT", Sample::new(ts, 2700.0));
        assert_eq!(rec.flush().unwrap(), 2);
        // buffer drained by the first flush
        assert_eq!(rec.flush().unwrap(), 0);

        let path = rec.path_for(Utc::now());
        let back = replay_from_file(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].symbol, "BTCUSDT");
        assert_eq!(back[0].sample(), Sample::new(ts, 64000.5));
    }

    #[test]
    fn replay_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.jsonl");
        std::fs::write(
            &path,
            "not json\n{\"symbol\":\"X\",\"ts\":\"2024-08-27T00:00:00Z\",\"price\":1.0}\n\n",
        )
        .unwrap();
        let back = replay_from_file(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].price, 1.0);
    }

    #[tokio::test]
    async fn channel_delivers_in_order() {
        let (tx, mut rx) = create_channel(4);
        let ts = Utc.timestamp_opt(0, 0).unwrap();
        for p in [1.0, 2.0] {
            tx.send(SeriesEvent::Updated {
                symbol: "X".into(),
                sample: Sample::new(ts, p),
            })
            .await
            .unwrap();
        }
        drop(tx);
        let mut prices = Vec::new();
        while let Some(SeriesEvent::Updated { sample, .. }) = rx.recv().await {
            prices.push(sample.price);
        }
        assert_eq!(prices, vec![1.0, 2.0]);
    }
}
