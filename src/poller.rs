// poller.rs
use crate::error::ApiError;
use crate::feed::{EventSender, SeriesEvent};
use crate::rest::PriceSource;
use crate::series::{Applied, SharedSeries};
use crate::telemetry::PollStats;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(4),
        }
    }
}

/// Owns the poll timer. Dropping the handle tears the session down: the
/// cache stops accepting samples and no further ticks fire.
pub struct PollerHandle {
    cache: SharedSeries,
    timer: JoinHandle<()>,
}

impl PollerHandle {
    pub fn cache(&self) -> &SharedSeries {
        &self.cache
    }

    pub fn shutdown(self) {}
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cache.write().deactivate();
        self.timer.abort();
        info!("poller stopped");
    }
}

#[derive(Clone)]
struct Ctx {
    source: Arc<dyn PriceSource>,
    cache: SharedSeries,
    events: Option<EventSender>,
    stats: Arc<PollStats>,
    fetch_timeout: Duration,
}

/// Starts polling every tracked symbol of `cache`. The first tick fires
/// immediately.
pub fn spawn(
    source: Arc<dyn PriceSource>,
    cache: SharedSeries,
    settings: PollSettings,
    events: Option<EventSender>,
    stats: Arc<PollStats>,
) -> PollerHandle {
    let ctx = Ctx {
        source,
        cache: cache.clone(),
        events,
        stats,
        fetch_timeout: settings.fetch_timeout,
    };
    let timer = tokio::spawn(run(ctx, settings.interval));
    PollerHandle { cache, timer }
}

async fn run(ctx: Ctx, period: Duration) {
    let symbols = ctx.cache.read().symbols().to_vec();
    info!(?symbols, period_ms = period.as_millis() as u64, "poller started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq: u64 = 0;

    loop {
        ticker.tick().await;
        let active = ctx.cache.read().is_active();
        if !active {
            break;
        }
        seq += 1;
        // Each symbol resolves on its own; a slow or failing one never holds up the rest.
        for symbol in &symbols {
            tokio::spawn(fetch_one(ctx.clone(), symbol.clone(), seq));
        }
    }
}

async fn fetch_one(ctx: Ctx, symbol: String, seq: u64) {
    let started = Instant::now();
    let result = match tokio::time::timeout(ctx.fetch_timeout, ctx.source.latest(&symbol)).await {
        Ok(r) => r,
        Err(_) => Err(ApiError::Timeout(ctx.fetch_timeout)),
    };
    ctx.stats
        .record_fetch_ms(started.elapsed().as_millis() as u64)
        .await;

    match result {
        Ok(sample) => {
            let applied = ctx.cache.write().append_tagged(&symbol, seq, sample);
            match applied {
                Applied::Appended => {
                    debug!(%symbol, tick = seq, price = sample.price, "sample appended");
                    send(&ctx, SeriesEvent::Updated { symbol, sample }).await;
                }
                Applied::Evicted(oldest) => {
                    debug!(%symbol, tick = seq, price = sample.price, evicted_ts = %oldest.ts, "sample appended, window full");
                    send(&ctx, SeriesEvent::Updated { symbol, sample }).await;
                }
                Applied::Inactive => {
                    ctx.stats.record_discard();
                    debug!(%symbol, tick = seq, "late result after teardown discarded");
                }
                Applied::Superseded => {
                    ctx.stats.record_discard();
                    debug!(%symbol, tick = seq, "result from an older tick discarded");
                }
                Applied::UnknownSymbol => {
                    ctx.stats.record_discard();
                    warn!(%symbol, "sample for untracked symbol rejected");
                }
            }
        }
        Err(e) => {
            ctx.stats.record_failure();
            if e.is_not_found() {
                warn!(%symbol, tick = seq, "no data available yet");
            } else {
                warn!(%symbol, tick = seq, error = %e, "fetch failed, window unchanged");
            }
            let active = ctx.cache.read().is_active();
            if active {
                send(
                    &ctx,
                    SeriesEvent::FetchFailed {
                        symbol,
                        error: e.to_string(),
                    },
                )
                .await;
            }
        }
    }
}

async fn send(ctx: &Ctx, event: SeriesEvent) {
    if let Some(tx) = &ctx.events {
        // receiver gone means nobody is rendering any more
        let _ = tx.send(event).await;
    }
}
