// render.rs
use crate::series::SeriesCache;
use crate::types::Sample;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
    Frame,
};
use std::collections::HashMap;

// Dashboard palette
pub const PRICE_UP: Color = Color::Rgb(40, 167, 69);
pub const PRICE_DOWN: Color = Color::Rgb(220, 53, 69);
pub const BTC_ORANGE: Color = Color::Rgb(247, 147, 26);
pub const ETH_BLUE: Color = Color::Rgb(98, 126, 234);
pub const BNB_YELLOW: Color = Color::Rgb(243, 186, 47);
pub const TEXT_DIM: Color = Color::Rgb(128, 128, 128);
pub const BORDER_DIM: Color = Color::Rgb(48, 48, 48);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Unknown,
}

impl Trend {
    /// A price equal to the previous one counts as up. A missing or zero
    /// price on either side has no trend.
    pub fn between(previous: Option<f64>, current: Option<f64>) -> Self {
        match (previous, current) {
            (Some(p), Some(c)) if p == 0.0 || c == 0.0 => Trend::Unknown,
            (Some(p), Some(c)) if c >= p => Trend::Up,
            (Some(_), Some(_)) => Trend::Down,
            _ => Trend::Unknown,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Trend::Up => "▲",
            Trend::Down => "▼",
            Trend::Unknown => "·",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Trend::Up => PRICE_UP,
            Trend::Down => PRICE_DOWN,
            Trend::Unknown => Color::Reset,
        }
    }
}

pub fn series_color(symbol: &str) -> Color {
    match symbol {
        "BTCUSDT" => BTC_ORANGE,
        "ETHUSDT" => ETH_BLUE,
        _ => BNB_YELLOW,
    }
}

/// `$67,012.35`. No price yet, or a zero price, renders as `Loading...`.
pub fn format_usd(price: Option<f64>) -> String {
    let Some(price) = price.filter(|p| p.is_finite() && *p != 0.0) else {
        return "Loading...".to_string();
    };
    let cents = (price.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if price < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

fn trend_of(cache: &SeriesCache, symbol: &str) -> Trend {
    Trend::between(
        cache.previous(symbol).map(|s| s.price),
        cache.latest(symbol).map(|s| s.price),
    )
}

/// Plain one-line status for `symbol`, used when stdout is not a terminal.
pub fn status_line(cache: &SeriesCache, symbol: &str) -> String {
    let price = format_usd(cache.latest(symbol).map(|s| s.price));
    format!(
        "{symbol:<10} {price:>14} {} ({}/{})",
        trend_of(cache, symbol).marker(),
        cache.len(symbol),
        cache.capacity(),
    )
}

pub fn status_lines(cache: &SeriesCache) -> String {
    cache
        .symbols()
        .iter()
        .map(|s| status_line(cache, s))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Price table on top, one line chart per tracked symbol below.
/// `errors` holds the last fetch failure per symbol, if any.
pub fn draw_dashboard(frame: &mut Frame, cache: &SeriesCache, errors: &HashMap<String, String>) {
    let symbols = cache.symbols();
    let table_height = symbols.len() as u16 + 3;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(table_height), Constraint::Min(0)])
        .split(frame.size());

    frame.render_widget(price_table(cache, errors), chunks[0]);

    if symbols.is_empty() {
        return;
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, symbols.len() as u32); symbols.len()])
        .split(chunks[1]);

    for (symbol, area) in symbols.iter().zip(rows.iter()) {
        let window = cache.snapshot(symbol);
        draw_price_chart(
            frame,
            *area,
            &format!("{symbol} Real-Time Price"),
            symbol,
            &window,
        );
    }
}

fn price_table<'a>(cache: &'a SeriesCache, errors: &'a HashMap<String, String>) -> Table<'a> {
    let header = Row::new(vec!["Coin", "Current Price (USD)", "", "Window", "Last error"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = cache.symbols().iter().map(move |symbol| {
        let trend = trend_of(cache, symbol);
        let price = format_usd(cache.latest(symbol).map(|s| s.price));
        let error = errors.get(symbol).cloned().unwrap_or_default();
        Row::new(vec![
            Cell::from(symbol.as_str()).style(Style::default().fg(series_color(symbol))),
            Cell::from(format!("{price:>19}")).style(Style::default().fg(trend.color())),
            Cell::from(trend.marker()).style(Style::default().fg(trend.color())),
            Cell::from(format!("{}/{}", cache.len(symbol), cache.capacity())),
            Cell::from(error).style(Style::default().fg(PRICE_DOWN)),
        ])
    });

    Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(20),
            Constraint::Length(2),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(" Real-Time Spot Rates ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BORDER_DIM)),
    )
}

/// Line chart of `samples` with time on the x axis.
pub fn draw_price_chart(frame: &mut Frame, area: Rect, title: &str, symbol: &str, samples: &[Sample]) {
    let block = Block::default()
        .title(format!(" {title} "))
        .title_style(
            Style::default()
                .fg(series_color(symbol))
                .add_modifier(Modifier::BOLD),
        )
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_DIM));

    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        frame.render_widget(
            Paragraph::new("Loading...")
                .style(Style::default().fg(TEXT_DIM))
                .block(block),
            area,
        );
        return;
    };

    let points = chart_points(samples);
    let x_max = points.last().map_or(1.0, |p| p.0.max(1.0));
    let (y_lo, y_hi) = price_bounds(samples);

    let dataset = Dataset::default()
        .name(format!("{symbol} Price"))
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(series_color(symbol)))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .title("Time")
                .style(Style::default().fg(TEXT_DIM))
                .bounds([0.0, x_max])
                .labels(axis_labels(first, last).into_iter().map(Span::raw).collect()),
        )
        .y_axis(
            Axis::default()
                .title("Price (USD)")
                .style(Style::default().fg(TEXT_DIM))
                .bounds([y_lo, y_hi])
                .labels(vec![
                    Span::raw(format_usd(Some(y_lo))),
                    Span::raw(format_usd(Some(y_hi))),
                ]),
        );
    frame.render_widget(chart, area);
}

/// Clock times for an intraday window, dates otherwise.
fn axis_labels(first: &Sample, last: &Sample) -> [String; 2] {
    let fmt = if first.ts.date_naive() == last.ts.date_naive() {
        "%H:%M:%S"
    } else {
        "%Y-%m-%d"
    };
    [
        first.ts.format(fmt).to_string(),
        last.ts.format(fmt).to_string(),
    ]
}

/// Seconds since the first sample against price.
pub fn chart_points(samples: &[Sample]) -> Vec<(f64, f64)> {
    let Some(origin) = samples.first().map(|s| s.ts) else {
        return Vec::new();
    };
    samples
        .iter()
        .map(|s| ((s.ts - origin).num_milliseconds() as f64 / 1000.0, s.price))
        .collect()
}

/// Price range padded so a flat series still gets a visible band.
pub fn price_bounds(samples: &[Sample]) -> (f64, f64) {
    let lo = samples.iter().map(|s| s.price).fold(f64::INFINITY, f64::min);
    let hi = samples.iter().map(|s| s.price).fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.0005).max(0.01);
    ((lo - pad).max(0.0), hi + pad)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub points: usize,
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub change_pct: f64,
}

pub fn summarize(closes: &[Sample]) -> Option<HistorySummary> {
    let first = closes.first()?.price;
    let last = closes.last()?.price;
    let min = closes.iter().map(|s| s.price).fold(f64::INFINITY, f64::min);
    let max = closes.iter().map(|s| s.price).fold(f64::NEG_INFINITY, f64::max);
    let change_pct = if first != 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };
    Some(HistorySummary {
        points: closes.len(),
        first,
        last,
        min,
        max,
        change_pct,
    })
}
