//! A sliding window event counter over per-second buckets.
//!
//! `EventCounter` maps each Unix epoch second to an atomic counter of the
//! events recorded in that second. Queries sum the buckets of the last N
//! seconds; a background task periodically evicts buckets that fell out of
//! the retention window.
//!
//! This allows efficient computation of:
//! - Number of events within the last N seconds (`count_last_seconds()`)
//! - Fixed-window convenience counts (`count_last_minute()`,
//!   `count_last_hour()`, `count_last_day()`)
//!
//! Counts are eventually consistent under concurrent writes: a query may or
//! may not observe events added while it is running, but once all writes for
//! a second have completed the count for that second is exact.
//!
//! ## Example
//! ```rust,ignore
//! let counter = EventCounter::new(); // inside a tokio runtime
//! counter.add_event_at(chrono::Local::now());
//! let last_minute = counter.count_last_minute()?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::debug;

use crate::error::{Error, Result};
use crate::evictor::Evictor;
use crate::Config;

type DashMap<K, V> = dashmap::DashMap<K, V, ahash::RandomState>;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: i64 = 60;
/// Seconds per hour.
pub const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
/// Seconds per day.
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// The bucket map shared between the counter handle and the evictor task.
///
/// Keys are epoch seconds, values the number of events recorded in that
/// second. A bucket exists only once an event lands in its second and is
/// removed only by an eviction pass.
pub(crate) struct Buckets {
    freq: DashMap<i64, AtomicU64>,
    retention_secs: i64,
}

impl Buckets {
    fn new(retention_secs: i64) -> Self {
        Buckets {
            freq: DashMap::default(),
            retention_secs,
        }
    }

    /// Records one event in the bucket for `second`.
    ///
    /// Events older than the retention window are dropped without error.
    #[inline]
    pub(crate) fn record(&self, second: i64) {
        if second < current_second() - self.retention_secs + 1 {
            debug!("dropping stale event at second {}", second);
            return;
        }
        // The read path avoids the shard write lock once the bucket exists;
        // increments on the same second contend only on the atomic itself.
        if let Some(counter) = self.freq.get(&second) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            self.freq
                .entry(second)
                .or_default()
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Sums the buckets with keys in `[from, to]`, absent buckets count zero.
    ///
    /// Probes every second in the range, so the cost is O(window length)
    /// regardless of how many events were recorded.
    #[inline]
    pub(crate) fn sum_range(&self, from: i64, to: i64) -> u64 {
        (from..=to)
            .map(|second| {
                self.freq
                    .get(&second)
                    .map(|counter| counter.load(Ordering::Relaxed))
                    .unwrap_or(0)
            })
            .sum()
    }

    /// Removes every bucket that fell out of the retention window, returning
    /// the number removed.
    pub(crate) fn evict_expired(&self) -> usize {
        let horizon = current_second() - self.retention_secs + 1;
        self.evict_older_than(horizon)
    }

    /// Removes every bucket with a key strictly below `horizon`.
    ///
    /// `retain` locks one shard at a time, so writers and readers on other
    /// shards are never blocked for the whole sweep.
    fn evict_older_than(&self, horizon: i64) -> usize {
        let mut removed = 0;
        self.freq.retain(|&second, _| {
            if second < horizon {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    #[inline]
    fn len(&self) -> usize {
        self.freq.len()
    }
}

/// A thread-safe sliding-window event counter.
///
/// Clients record timestamped events and query how many occurred within the
/// last N seconds, bounded by the retention window (one day by default).
/// Share one instance across producers and consumers, by reference or in an
/// `Arc`; all operations take `&self`.
///
/// Construction spawns a background eviction task and therefore must happen
/// inside a tokio runtime. The task is stopped by [`EventCounter::shutdown`]
/// or aborted when the counter is dropped; it never keeps the process alive.
pub struct EventCounter {
    buckets: Arc<Buckets>,
    evictor: Evictor,
}

impl EventCounter {
    /// Creates an event counter with the default config: buckets are kept
    /// for one day and swept every 60 seconds.
    pub fn new() -> Self {
        Self::build(Config::default())
    }

    /// Creates an event counter with the given eviction interval and
    /// retention window.
    ///
    /// # Parameters
    /// - `cfg`: Configuration for the counter. `max_retention` is truncated
    ///   to whole seconds and must be at least one second;
    ///   `eviction_interval` must be non-zero.
    ///
    /// # Returns
    /// Returns the counter, or `Error::InvalidConfig` if a field is out of
    /// range.
    pub fn with_config(cfg: Config) -> Result<Self> {
        if cfg.max_retention.as_secs() == 0 {
            return Err(Error::InvalidConfig(
                "max_retention must be at least one second".into(),
            ));
        }
        if cfg.eviction_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "eviction_interval must be non-zero".into(),
            ));
        }
        Ok(Self::build(cfg))
    }

    fn build(cfg: Config) -> Self {
        let buckets = Arc::new(Buckets::new(cfg.max_retention.as_secs() as i64));
        let evictor = Evictor::spawn(buckets.clone(), cfg.eviction_interval);
        EventCounter { buckets, evictor }
    }

    /// Records one event at the given Unix epoch second.
    ///
    /// Events older than the retention window are silently dropped; they
    /// predate anything a query can still return. Safe to call from any
    /// number of concurrent tasks or threads, on the same or different
    /// seconds.
    #[inline]
    pub fn add_event(&self, second: i64) {
        self.buckets.record(second);
    }

    /// Records one event at the given wall-clock time.
    ///
    /// The timestamp is converted to epoch seconds with the local timezone
    /// offset; sub-second precision truncates to the containing second.
    #[inline]
    pub fn add_event_at(&self, time: DateTime<Local>) {
        self.add_event(time.timestamp());
    }

    /// Returns the number of events recorded within the last `seconds`
    /// seconds, boundary inclusive: an event exactly `seconds - 1` seconds
    /// old counts, one exactly `seconds` old does not.
    ///
    /// # Parameters
    /// - `seconds`: The window length; must be positive. A window longer
    ///   than the retention may undercount, since older buckets may already
    ///   have been evicted.
    ///
    /// # Returns
    /// Returns the count, or `Error::InvalidWindow` if `seconds` is not
    /// positive.
    pub fn count_last_seconds(&self, seconds: i64) -> Result<u64> {
        if seconds <= 0 {
            return Err(Error::InvalidWindow(seconds));
        }
        let now = current_second();
        Ok(self.buckets.sum_range(now - seconds + 1, now))
    }

    /// Returns the number of events recorded within the last minute.
    #[inline]
    pub fn count_last_minute(&self) -> Result<u64> {
        self.count_last_seconds(SECONDS_PER_MINUTE)
    }

    /// Returns the number of events recorded within the last hour.
    #[inline]
    pub fn count_last_hour(&self) -> Result<u64> {
        self.count_last_seconds(SECONDS_PER_HOUR)
    }

    /// Returns the number of events recorded within the last day.
    #[inline]
    pub fn count_last_day(&self) -> Result<u64> {
        self.count_last_seconds(SECONDS_PER_DAY)
    }

    /// Runs one eviction pass immediately, returning the number of buckets
    /// removed. The background task runs the same pass on its interval.
    #[inline]
    pub fn evict_expired(&self) -> usize {
        self.buckets.evict_expired()
    }

    /// Returns the number of populated buckets, including any stale ones the
    /// evictor has not swept yet.
    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the background evictor and waits for the task to exit.
    pub async fn shutdown(mut self) {
        self.evictor.shutdown().await;
    }
}

impl Default for EventCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the current Unix time in seconds.
#[inline]
pub(crate) fn current_second() -> i64 {
    Local::now().timestamp()
}
