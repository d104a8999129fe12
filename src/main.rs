// main.rs
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use spot_window::config::{load_config, AppConfig};
use spot_window::feed::{create_channel, replay_from_file, EventReceiver, Recorder, SeriesEvent};
use spot_window::logging::setup_logging;
use spot_window::poller::{self, PollSettings};
use spot_window::render;
use spot_window::rest::{PriceSource, RestClient};
use spot_window::series::{SeriesCache, SharedSeries};
use spot_window::store::ExportStore;
use spot_window::telemetry::PollStats;
use spot_window::tui::{self, TuiTerminal};
use spot_window::types::Sample;
use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "spot-window", version, about = "Live and historical crypto spot prices")]
struct Cli {
    /// Config file, extension optional.
    #[arg(long, short, env = "SPOT_CONFIG", default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the tracked symbols and redraw their windows as samples arrive.
    Live {
        /// Stop after this many seconds instead of waiting for a quit key.
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Daily closes for a symbol between two dates.
    History {
        symbol: String,
        #[arg(long, default_value = "2024-08-26")]
        start: NaiveDate,
        #[arg(long, default_value = "2025-08-27")]
        end: NaiveDate,
        /// Draw the closes as a chart until a quit key is pressed.
        #[arg(long)]
        chart: bool,
    },
    /// Save a CSV export from the backend.
    Download {
        #[command(subcommand)]
        kind: DownloadKind,
    },
    /// Backend health and per-symbol row counts.
    Status,
    /// Print the windows rebuilt from a recording made by `live`.
    Replay { path: String },
}

#[derive(Subcommand)]
enum DownloadKind {
    /// Samples the backend collected from its live stream.
    Realtime {
        #[arg(required_unless_present = "all")]
        symbol: Option<String>,
        /// Every tracked symbol, one file each.
        #[arg(long, conflicts_with = "symbol")]
        all: bool,
    },
    Historical {
        symbol: String,
        #[arg(long, default_value = "2024-08-26")]
        start: NaiveDate,
        #[arg(long, default_value = "2025-08-27")]
        end: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    setup_logging(&cfg.logging)?;

    let client = RestClient::new(&cfg.api.base_url, Duration::from_secs(cfg.api.timeout_secs))?;

    match cli.command {
        Command::Live { duration_secs } => live(&cfg, client, duration_secs).await,
        Command::History {
            symbol,
            start,
            end,
            chart,
        } => history(&client, &symbol, start, end, chart).await,
        Command::Download { kind } => download(&cfg, &client, kind).await,
        Command::Status => status(&client).await,
        Command::Replay { path } => replay(&cfg, &path),
    }
}

async fn live(cfg: &AppConfig, client: RestClient, duration_secs: Option<u64>) -> Result<()> {
    let cache = SeriesCache::new(cfg.tracking.symbols.iter().cloned(), cfg.tracking.window_size)
        .shared();
    let stats = Arc::new(PollStats::new()?);
    let (tx, mut rx) = create_channel(cfg.tracking.symbols.len() * 4);

    let mut recorder = if cfg.recording.enabled {
        Some(Recorder::new(&cfg.recording.dir, "live")?)
    } else {
        None
    };

    let source: Arc<dyn PriceSource> = Arc::new(client);
    let settings = PollSettings {
        interval: cfg.tracking.poll_interval(),
        fetch_timeout: cfg.tracking.poll_interval().min(Duration::from_secs(cfg.api.timeout_secs)),
    };
    let handle = poller::spawn(source, cache.clone(), settings, Some(tx), stats.clone());

    let mut terminal = if std::io::stdout().is_terminal() {
        Some(tui::init_terminal().context("setting up the terminal")?)
    } else {
        None
    };
    let watched = watch(
        &cache,
        &mut rx,
        terminal.as_mut(),
        recorder.as_mut(),
        Duration::from_secs(cfg.recording.flush_interval_secs.max(1)),
        duration_secs,
    )
    .await;

    handle.shutdown();
    if let Some(t) = terminal.as_mut() {
        tui::restore_terminal(t).context("restoring the terminal")?;
    }
    if let Some(rec) = recorder.as_mut() {
        rec.flush()?;
    }
    watched?;

    println!("{}", render::status_lines(&cache.read()));
    let s = stats.summary().await;
    info!(
        fetches = s.fetches,
        failures = s.failures,
        discarded = s.discarded,
        p50_ms = s.p50_ms,
        p95_ms = s.p95_ms,
        p99_ms = s.p99_ms,
        "live session finished"
    );
    Ok(())
}

/// Consumes poller events until a quit key, Ctrl-C or the deadline. With a
/// terminal the dashboard is redrawn in place, otherwise one line is printed
/// per event.
async fn watch(
    cache: &SharedSeries,
    rx: &mut EventReceiver,
    mut terminal: Option<&mut TuiTerminal>,
    mut recorder: Option<&mut Recorder>,
    flush_every: Duration,
    duration_secs: Option<u64>,
) -> Result<()> {
    let mut errors: HashMap<String, String> = HashMap::new();
    let mut quit = terminal.as_ref().map(|_| tui::spawn_quit_listener());

    let mut flush = interval(flush_every);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let deadline = duration_secs.map(|s| Instant::now() + Duration::from_secs(s));
    let stop = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(stop);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    if let Some(t) = terminal.as_deref_mut() {
        redraw(t, cache, &errors)?;
    }
    loop {
        tokio::select! {
            Some(event) = rx.recv() => match event {
                SeriesEvent::Updated { symbol, sample } => {
                    errors.remove(&symbol);
                    if let Some(rec) = recorder.as_deref_mut() {
                        rec.push(&symbol, sample);
                    }
                    match terminal.as_deref_mut() {
                        Some(t) => redraw(t, cache, &errors)?,
                        None => println!("{}", render::status_line(&cache.read(), &symbol)),
                    }
                }
                SeriesEvent::FetchFailed { symbol, error } => match terminal.as_deref_mut() {
                    Some(t) => {
                        errors.insert(symbol, error);
                        redraw(t, cache, &errors)?;
                    }
                    None => println!("{symbol:<10} fetch failed: {error}"),
                },
            },
            _ = flush.tick() => {
                if let Some(rec) = recorder.as_deref_mut() {
                    if let Err(e) = rec.flush() {
                        error!(error = %e, "recording flush failed");
                    }
                }
            }
            _ = quit_pressed(&mut quit) => {
                info!("quit key pressed");
                break;
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = &mut stop => break,
        }
    }
    Ok(())
}

fn redraw(terminal: &mut TuiTerminal, cache: &SharedSeries, errors: &HashMap<String, String>) -> Result<()> {
    let cache = cache.read();
    terminal.draw(|f| render::draw_dashboard(f, &cache, errors))?;
    Ok(())
}

/// Resolves once the quit listener fires. Never resolves without a listener.
async fn quit_pressed(quit: &mut Option<mpsc::Receiver<()>>) {
    if let Some(rx) = quit.as_mut() {
        if rx.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}

async fn history(
    client: &RestClient,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    chart: bool,
) -> Result<()> {
    let closes = client
        .historical_closes(symbol, start, end)
        .await
        .with_context(|| format!("fetching {symbol} history {start}..{end}"))?;
    info!(symbol, points = closes.len(), "historical data loaded");

    let Some(sum) = render::summarize(&closes) else {
        println!("{symbol}: no data between {start} and {end}");
        return Ok(());
    };
    if chart && std::io::stdout().is_terminal() {
        let title = format!("{symbol} Historical Price ({start} to {end})");
        show_chart(&title, symbol, &closes).await?;
    }
    println!("{symbol} {start} .. {end}");
    println!(
        "points {}  first {}  last {}  low {}  high {}  change {:+.2}%",
        sum.points,
        render::format_usd(Some(sum.first)),
        render::format_usd(Some(sum.last)),
        render::format_usd(Some(sum.min)),
        render::format_usd(Some(sum.max)),
        sum.change_pct,
    );
    Ok(())
}

async fn show_chart(title: &str, symbol: &str, samples: &[Sample]) -> Result<()> {
    let mut terminal = tui::init_terminal().context("setting up the terminal")?;
    let mut quit = tui::spawn_quit_listener();
    let drawn = terminal
        .draw(|f| {
            let area = f.size();
            render::draw_price_chart(f, area, title, symbol, samples)
        })
        .map(|_| ());
    if drawn.is_ok() {
        quit.recv().await;
    }
    tui::restore_terminal(&mut terminal).context("restoring the terminal")?;
    drawn?;
    Ok(())
}

async fn download(cfg: &AppConfig, client: &RestClient, kind: DownloadKind) -> Result<()> {
    let store = ExportStore::new(&cfg.export.out_dir)?;
    match kind {
        DownloadKind::Realtime { symbol, all } => {
            let symbols = if all {
                cfg.tracking.symbols.clone()
            } else {
                symbol.into_iter().collect()
            };
            let pause = Duration::from_millis(cfg.export.pause_between_ms);
            let mut failed = Vec::new();
            for (i, sym) in symbols.iter().enumerate() {
                if i > 0 {
                    sleep(pause).await;
                }
                match client.realtime_csv(sym).await {
                    Ok(bytes) => {
                        let path = store.save(&ExportStore::realtime_name(sym), &bytes)?;
                        info!(symbol = %sym, path = %path.display(), bytes = bytes.len(), "saved");
                        println!("{}", path.display());
                    }
                    Err(e) => {
                        warn!(symbol = %sym, error = %e, "download failed");
                        failed.push(sym.clone());
                    }
                }
            }
            if !failed.is_empty() {
                anyhow::bail!("download failed for {}", failed.join(", "));
            }
        }
        DownloadKind::Historical { symbol, start, end } => {
            let bytes = client
                .historical_csv(&symbol, start, end)
                .await
                .with_context(|| format!("downloading {symbol} history"))?;
            let path = store.save(&ExportStore::historical_name(&symbol, start, end), &bytes)?;
            info!(%symbol, path = %path.display(), bytes = bytes.len(), "saved");
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn status(client: &RestClient) -> Result<()> {
    let health = client.health().await.context("health check")?;
    println!("backend {} ({})", health.status, client.base_url());
    let db = client.database_status().await.context("database status")?;
    println!("database {}", db.database);
    for (coin, st) in &db.coins {
        println!("  {coin:<10} {:>8} records  {}", st.records, st.status);
    }
    Ok(())
}

fn replay(cfg: &AppConfig, path: &str) -> Result<()> {
    let recorded = replay_from_file(path)?;
    let mut symbols: Vec<String> = Vec::new();
    for r in &recorded {
        if !symbols.contains(&r.symbol) {
            symbols.push(r.symbol.clone());
        }
    }
    let mut cache = SeriesCache::new(symbols, cfg.tracking.window_size);
    for r in &recorded {
        cache.append(&r.symbol, r.sample());
    }
    info!(path, samples = recorded.len(), "replayed recording");
    println!("{}", render::status_lines(&cache));
    Ok(())
}
