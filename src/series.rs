// series.rs
// Each tracked symbol owns a FIFO window of at most `capacity` samples. The
// symbol set is fixed at construction. A deactivated cache rejects samples
// but keeps serving its last windows.

use crate::types::Sample;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub const DEFAULT_WINDOW: usize = 60;

pub type SharedSeries = Arc<RwLock<SeriesCache>>;

/// Result of offering a sample to the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Applied {
    Appended,
    /// Appended, and the oldest sample was pushed out.
    Evicted(Sample),
    UnknownSymbol,
    /// The cache was torn down before the sample arrived.
    Inactive,
    /// A result from a newer tick was already applied for this symbol.
    Superseded,
}

#[derive(Debug, Default)]
struct Window {
    samples: VecDeque<Sample>,
    last_seq: Option<u64>,
}

#[derive(Debug)]
pub struct SeriesCache {
    capacity: usize,
    order: Vec<String>,
    windows: HashMap<String, Window>,
    active: bool,
}

impl SeriesCache {
    /// One empty window per symbol. Duplicate symbols collapse into one window.
    pub fn new<I, S>(symbols: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capacity = capacity.max(1);
        let mut order = Vec::new();
        let mut windows = HashMap::new();
        for s in symbols {
            let s = s.into();
            if windows.contains_key(&s) {
                continue;
            }
            windows.insert(
                s.clone(),
                Window {
                    samples: VecDeque::with_capacity(capacity),
                    last_seq: None,
                },
            );
            order.push(s);
        }
        Self {
            capacity,
            order,
            windows,
            active: true,
        }
    }

    pub fn shared(self) -> SharedSeries {
        Arc::new(RwLock::new(self))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tracked symbols in the order they were registered.
    pub fn symbols(&self) -> &[String] {
        &self.order
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Pushes `sample` to the back of `symbol`'s window. Samples sharing a
    /// timestamp with the previous one are kept as separate points.
    pub fn append(&mut self, symbol: &str, sample: Sample) -> Applied {
        if !self.active {
            return Applied::Inactive;
        }
        let capacity = self.capacity;
        match self.windows.get_mut(symbol) {
            Some(w) => push_bounded(&mut w.samples, capacity, sample),
            None => Applied::UnknownSymbol,
        }
    }

    /// Like [`append`](Self::append), but drops results from a tick that is not
    /// newer than the last one applied for the symbol.
    pub fn append_tagged(&mut self, symbol: &str, seq: u64, sample: Sample) -> Applied {
        if !self.active {
            return Applied::Inactive;
        }
        let capacity = self.capacity;
        let Some(w) = self.windows.get_mut(symbol) else {
            return Applied::UnknownSymbol;
        };
        if w.last_seq.is_some_and(|last| seq <= last) {
            return Applied::Superseded;
        }
        w.last_seq = Some(seq);
        push_bounded(&mut w.samples, capacity, sample)
    }

    /// Copy of the current window, oldest first. Unknown symbols yield an
    /// empty window.
    pub fn snapshot(&self, symbol: &str) -> Vec<Sample> {
        self.windows
            .get(symbol)
            .map(|w| w.samples.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, symbol: &str) -> Option<Sample> {
        self.windows.get(symbol)?.samples.back().copied()
    }

    pub fn previous(&self, symbol: &str) -> Option<Sample> {
        let samples = &self.windows.get(symbol)?.samples;
        samples.len().checked_sub(2).and_then(|i| samples.get(i)).copied()
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.windows.get(symbol).map_or(0, |w| w.samples.len())
    }
}

fn push_bounded(samples: &mut VecDeque<Sample>, capacity: usize, sample: Sample) -> Applied {
    samples.push_back(sample);
    if samples.len() > capacity {
        if let Some(old) = samples.pop_front() {
            return Applied::Evicted(old);
        }
    }
    Applied::Appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_724_716_800 + secs, 0).unwrap()
    }

    fn s(secs: i64, price: f64) -> Sample {
        Sample::new(t(secs), price)
    }

    #[test]
    fn window_keeps_last_three_in_order() {
        let mut cache = SeriesCache::new(["X", "Y"], 3);
        for (i, p) in [100.0, 101.0, 102.0, 103.0].into_iter().enumerate() {
            cache.append("X", s(i as i64 + 1, p));
            assert!(cache.snapshot("Y").is_empty());
        }
        assert_eq!(cache.snapshot("X"), vec![s(2, 101.0), s(3, 102.0), s(4, 103.0)]);
        assert!(cache.snapshot("Y").is_empty());
    }

    #[test]
    fn overflow_reports_the_evicted_sample() {
        let mut cache = SeriesCache::new(["X"], 2);
        assert_eq!(cache.append("X", s(1, 1.0)), Applied::Appended);
        assert_eq!(cache.append("X", s(2, 2.0)), Applied::Appended);
        assert_eq!(cache.append("X", s(3, 3.0)), Applied::Evicted(s(1, 1.0)));
    }

    #[test]
    fn n_plus_k_appends_leave_exactly_n() {
        let n = DEFAULT_WINDOW;
        let mut cache = SeriesCache::new(["BTCUSDT"], n);
        for k in 0..(n + 17) {
            cache.append("BTCUSDT", s(k as i64, k as f64));
        }
        let snap = cache.snapshot("BTCUSDT");
        assert_eq!(snap.len(), n);
        let expected: Vec<Sample> = (17..n + 17).map(|k| s(k as i64, k as f64)).collect();
        assert_eq!(snap, expected);
    }

    #[test]
    fn unknown_symbol_is_rejected_without_mutation() {
        let mut cache = SeriesCache::new(["X"], 3);
        cache.append("X", s(1, 1.0));
        assert_eq!(cache.append("Z", s(2, 2.0)), Applied::UnknownSymbol);
        assert_eq!(cache.append_tagged("Z", 1, s(2, 2.0)), Applied::UnknownSymbol);
        assert!(cache.snapshot("Z").is_empty());
        assert_eq!(cache.snapshot("X"), vec![s(1, 1.0)]);
        assert_eq!(cache.symbols(), ["X".to_string()]);
    }

    #[test]
    fn duplicate_timestamps_are_kept() {
        let mut cache = SeriesCache::new(["X"], 5);
        cache.append("X", s(1, 10.0));
        cache.append("X", s(1, 10.0));
        assert_eq!(cache.len("X"), 2);
    }

    #[test]
    fn older_tick_results_are_superseded() {
        let mut cache = SeriesCache::new(["X", "Y"], 5);
        assert_eq!(cache.append_tagged("X", 2, s(2, 2.0)), Applied::Appended);
        assert_eq!(cache.append_tagged("X", 1, s(1, 1.0)), Applied::Superseded);
        assert_eq!(cache.append_tagged("X", 2, s(2, 2.5)), Applied::Superseded);
        // sequence tracking is per symbol
        assert_eq!(cache.append_tagged("Y", 1, s(1, 1.0)), Applied::Appended);
        assert_eq!(cache.snapshot("X"), vec![s(2, 2.0)]);
    }

    #[test]
    fn deactivated_cache_freezes() {
        let mut cache = SeriesCache::new(["X"], 3);
        cache.append("X", s(1, 1.0));
        cache.deactivate();
        assert!(!cache.is_active());
        assert_eq!(cache.append("X", s(2, 2.0)), Applied::Inactive);
        assert_eq!(cache.append_tagged("X", 9, s(2, 2.0)), Applied::Inactive);
        assert_eq!(cache.snapshot("X"), vec![s(1, 1.0)]);
    }

    #[test]
    fn latest_and_previous() {
        let mut cache = SeriesCache::new(["X"], 3);
        assert_eq!(cache.latest("X"), None);
        cache.append("X", s(1, 1.0));
        assert_eq!(cache.previous("X"), None);
        cache.append("X", s(2, 2.0));
        assert_eq!(cache.latest("X"), Some(s(2, 2.0)));
        assert_eq!(cache.previous("X"), Some(s(1, 1.0)));
    }

    #[test]
    fn zero_capacity_is_clamped_and_duplicates_collapse() {
        let mut cache = SeriesCache::new(["X", "X"], 0);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.symbols().len(), 1);
        cache.append("X", s(1, 1.0));
        cache.append("X", s(2, 2.0));
        assert_eq!(cache.snapshot("X"), vec![s(2, 2.0)]);
    }
}
