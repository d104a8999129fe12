// logging.rs
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// Where the log file for this run goes. Unless `rewrite_last_logs` is set,
/// every run gets its own timestamped file next to `log_file_path`.
pub fn log_file_for_run(cfg: &LoggingConfig) -> PathBuf {
    if cfg.rewrite_last_logs {
        return PathBuf::from(&cfg.log_file_path);
    }
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    PathBuf::from(format!(
        "{}-{}.log",
        cfg.log_file_path.trim_end_matches(".log"),
        stamp
    ))
}

pub fn setup_logging(cfg: &LoggingConfig) -> Result<()> {
    let level = cfg
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    if !cfg.save_logs {
        fmt().with_env_filter(env_filter).with_target(false).init();
        return Ok(());
    }

    let path = log_file_for_run(cfg);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir).with_context(|| format!("creating log dir {}", dir.display()))?;
    }
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(rewrite: bool) -> LoggingConfig {
        LoggingConfig {
            level: "debug".into(),
            save_logs: true,
            log_file_path: "logs/spot-window.log".into(),
            rewrite_last_logs: rewrite,
        }
    }

    #[test]
    fn rewrite_keeps_the_configured_path() {
        assert_eq!(log_file_for_run(&cfg(true)), PathBuf::from("logs/spot-window.log"));
    }

    #[test]
    fn runs_get_timestamped_files() {
        let p = log_file_for_run(&cfg(false));
        let name = p.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("spot-window-"));
        assert!(name.ends_with(".log"));
    }
}
