// store.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

/// Directory that receives CSV downloads.
pub struct ExportStore {
    base: PathBuf,
}

impl ExportStore {
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        create_dir_all(&base)
            .with_context(|| format!("creating export dir {}", base.display()))?;
        Ok(Self { base })
    }

    pub fn realtime_name(symbol: &str) -> String {
        format!("{}_realtime_data.csv", symbol)
    }

    pub fn historical_name(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!("{}_historical_{}_{}.csv", symbol, start, end)
    }

    /// Writes `bytes` to `name` under the export dir, replacing any older file.
    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.base.join(name);
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_match_dashboard_downloads() {
        let start = NaiveDate::from_ymd_opt(2024, 8, 26).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 8, 27).unwrap();
        assert_eq!(ExportStore::realtime_name("BTCUSDT"), "BTCUSDT_realtime_data.csv");
        assert_eq!(
            ExportStore::historical_name("ETHUSDT", start, end),
            "ETHUSDT_historical_2024-08-26_2025-08-27.csv"
        );
    }

    #[test]
    fn save_creates_dir_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExportStore::new(dir.path().join("downloads")).unwrap();
        store.save("a.csv", b"Time,Close\n").unwrap();
        let path = store.save("a.csv", b"Time,Close\n1,2\n").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"Time,Close\n1,2\n");
    }
}
