// config.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    pub symbols: Vec<String>,
    pub poll_interval_secs: u64,
    pub window_size: usize,
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub out_dir: String,
    pub pause_between_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    pub enabled: bool,
    pub dir: String,
    pub flush_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub save_logs: bool,
    pub log_file_path: String,
    pub rewrite_last_logs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub tracking: TrackingConfig,
    pub export: ExportConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tracking.symbols.is_empty() {
            bail!("tracking.symbols must name at least one symbol");
        }
        if self.tracking.symbols.iter().any(|s| s.trim().is_empty()) {
            bail!("tracking.symbols must not contain blank entries");
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be greater than zero");
        }
        if self.tracking.window_size == 0 {
            bail!("tracking.window_size must be greater than zero");
        }
        if self.tracking.poll_interval_secs == 0 {
            bail!("tracking.poll_interval_secs must be greater than zero");
        }
        if self.recording.enabled && self.recording.flush_interval_secs == 0 {
            bail!("recording.flush_interval_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Defaults, then the optional file at `path` (any extension the `config`
/// crate understands), then `SPOT__SECTION__KEY` environment variables.
pub fn load_config(path: &str) -> Result<AppConfig> {
    let cfg: AppConfig = config::Config::builder()
        .set_default("api.base_url", "http://localhost:5000")?
        .set_default("api.timeout_secs", 10)?
        .set_default("tracking.symbols", vec!["BTCUSDT", "ETHUSDT", "BNBUSDT"])?
        .set_default("tracking.poll_interval_secs", 5)?
        .set_default("tracking.window_size", 60)?
        .set_default("export.out_dir", "downloads")?
        .set_default("export.pause_between_ms", 500)?
        .set_default("recording.enabled", false)?
        .set_default("recording.dir", "recordings")?
        .set_default("recording.flush_interval_secs", 30)?
        .set_default("logging.level", "info")?
        .set_default("logging.save_logs", false)?
        .set_default("logging.log_file_path", "logs/spot-window.log")?
        .set_default("logging.rewrite_last_logs", true)?
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("SPOT")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("tracking.symbols")
                .try_parsing(true),
        )
        .build()
        .context("loading configuration")?
        .try_deserialize()
        .context("deserializing configuration")?;

    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let cfg = load_config(missing.to_str().unwrap()).unwrap();
        assert_eq!(cfg.tracking.symbols, ["BTCUSDT", "ETHUSDT", "BNBUSDT"]);
        assert_eq!(cfg.tracking.window_size, 60);
        assert_eq!(cfg.tracking.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.export.pause_between_ms, 500);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spot.toml");
        std::fs::write(
            &path,
            "[tracking]\nsymbols = [\"SOLUSDT\"]\nwindow_size = 3\n\n[api]\nbase_url = \"http://backend:5000\"\n",
        )
        .unwrap();
        let cfg = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.tracking.symbols, ["SOLUSDT"]);
        assert_eq!(cfg.tracking.window_size, 3);
        assert_eq!(cfg.api.base_url, "http://backend:5000");
        assert_eq!(cfg.api.timeout_secs, 10);
    }

    #[test]
    fn zero_window_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[tracking]\nwindow_size = 0\n").unwrap();
        assert!(load_config(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn blank_symbol_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.toml");
        std::fs::write(&path, "[tracking]\nsymbols = [\"BTCUSDT\", \"\"]\n").unwrap();
        let err = load_config(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("blank"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeout.toml");
        std::fs::write(&path, "[api]\ntimeout_secs = 0\n").unwrap();
        let err = load_config(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("api.timeout_secs"));
    }
}
