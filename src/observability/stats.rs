//! Operational counters and the `__stats__` view.
//!
//! # Responsibilities
//! - Per-node counters for access, error, not-chosen, stale and timed-out
//!   events, plus one scalar total
//! - Rolling arrival log for 1/5/15-minute request rates
//! - Derived percentages, error rates and uptime breakdown
//!
//! # Design Decisions
//! - One lock per counter group; no lock is held across an await point
//! - Counters only grow for the life of the process
//! - Snapshot values are rounded the way dashboards already expect them:
//!   shares to 2 decimals, error rates to 3

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::RateLimitConfig;

/// Arrivals older than this are pruned from the log.
pub const ARRIVAL_RETENTION: Duration = Duration::from_secs(15 * 60);

const SECONDS_IN_MINUTE: u64 = 60;
const SECONDS_IN_HOUR: u64 = 3_600;
const SECONDS_IN_DAY: u64 = 86_400;
// calendar-naive: 30-day months, 365-day years
const SECONDS_IN_MONTH: u64 = 30 * SECONDS_IN_DAY;
const SECONDS_IN_YEAR: u64 = 365 * SECONDS_IN_DAY;

/// Counter group selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Access,
    Error,
    NotChosen,
    Stale,
    TimedOut,
}

type CounterMap = HashMap<String, u64>;

pub struct StatsAggregator {
    started_at: DateTime<Utc>,
    started: Instant,
    rate_limit: RateLimitParams,
    total: AtomicU64,
    access: Mutex<CounterMap>,
    error: Mutex<CounterMap>,
    not_chosen: Mutex<CounterMap>,
    stale: Mutex<CounterMap>,
    timed_out: Mutex<CounterMap>,
    arrivals: Mutex<VecDeque<Instant>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StatsAggregator {
    pub fn new(rate_limit: &RateLimitConfig) -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            rate_limit: RateLimitParams {
                window_ms: rate_limit.window_ms,
                max_requests: rate_limit.max_requests,
            },
            total: AtomicU64::new(0),
            access: Mutex::default(),
            error: Mutex::default(),
            not_chosen: Mutex::default(),
            stale: Mutex::default(),
            timed_out: Mutex::default(),
            arrivals: Mutex::default(),
        }
    }

    fn group(&self, counter: Counter) -> &Mutex<CounterMap> {
        match counter {
            Counter::Access => &self.access,
            Counter::Error => &self.error,
            Counter::NotChosen => &self.not_chosen,
            Counter::Stale => &self.stale,
            Counter::TimedOut => &self.timed_out,
        }
    }

    pub fn increment(&self, counter: Counter, key: &str) {
        let mut map = lock(self.group(counter));
        *map.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, counter: Counter, key: &str) -> u64 {
        lock(self.group(counter)).get(key).copied().unwrap_or(0)
    }

    /// A request was committed to `node`: bumps the total and its access count.
    pub fn record_dispatch(&self, node: &str) {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.increment(Counter::Access, node);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Append an arrival and drop those outside the retention window.
    pub fn record_arrival(&self) {
        self.record_arrival_at(Instant::now());
    }

    pub fn record_arrival_at(&self, now: Instant) {
        let mut log = lock(&self.arrivals);
        log.push_back(now);
        if let Some(cutoff) = now.checked_sub(ARRIVAL_RETENTION) {
            while log.front().is_some_and(|t| *t <= cutoff) {
                log.pop_front();
            }
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let seconds = now.duration_since(self.started).as_secs();
        let total = self.total();

        let access = lock(&self.access).clone();
        let error = lock(&self.error).clone();
        let rps_stats = {
            let log = lock(&self.arrivals);
            RpsStats::from_arrivals(log.iter(), now)
        };
        let up = UptimeBreakdown::from_secs(seconds);

        StatsSnapshot {
            total,
            rps: overall_rps(total, seconds),
            rps_stats,
            rate_limit: self.rate_limit.clone(),
            seconds,
            uptime: Uptime {
                start_time: self.started_at,
                current_time: Utc::now(),
                seconds: up.seconds,
                minutes: up.minutes,
                hours: up.hours,
                days: up.days,
                month: up.months,
                year: up.years,
            },
            access_counters: access_percentages(&access, total),
            error_counters: error_rates(&error, &access),
            not_chosen_counters: sorted(&lock(&self.not_chosen)),
            jussi_behind_counters: sorted(&lock(&self.stale)),
            timed_out_counters: sorted(&lock(&self.timed_out)),
        }
    }
}

fn sorted(map: &CounterMap) -> BTreeMap<String, u64> {
    map.iter().map(|(k, v)| (k.clone(), *v)).collect()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Total requests over whole seconds since start; 0 during the first second.
pub fn overall_rps(total: u64, seconds: u64) -> f64 {
    if seconds == 0 {
        return 0.0;
    }
    round_to(total as f64 / seconds as f64, 2)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessShare {
    pub percent: f64,
    pub count: u64,
}

/// Each node's share of the total, in percent.
pub fn access_percentages(access: &CounterMap, total: u64) -> BTreeMap<String, AccessShare> {
    access
        .iter()
        .map(|(node, &count)| {
            let percent = if total == 0 {
                0.0
            } else {
                round_to(count as f64 / total as f64 * 100.0, 2)
            };
            (node.clone(), AccessShare { percent, count })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRate {
    pub err_rate: f64,
    pub total: u64,
    pub error_count: u64,
    pub succ_rate: f64,
}

/// Error and success rates for every node that has errors.
pub fn error_rates(errors: &CounterMap, access: &CounterMap) -> BTreeMap<String, ErrorRate> {
    errors
        .iter()
        .map(|(node, &error_count)| {
            let total = access.get(node).copied().unwrap_or(0);
            let rate = if total > 0 {
                let pct = error_count as f64 / total as f64 * 100.0;
                ErrorRate {
                    err_rate: round_to(pct, 3),
                    total,
                    error_count,
                    succ_rate: round_to(100.0 - pct, 3),
                }
            } else {
                ErrorRate {
                    err_rate: 0.0,
                    total: 0,
                    error_count: 0,
                    succ_rate: 100.0,
                }
            };
            (node.clone(), rate)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpsStats {
    #[serde(rename = "1min")]
    pub one_min: f64,
    #[serde(rename = "5min")]
    pub five_min: f64,
    #[serde(rename = "15min")]
    pub fifteen_min: f64,
}

impl RpsStats {
    /// Count arrivals newer than `now - window`, divided by the window in seconds.
    pub fn from_arrivals<'a, I>(arrivals: I, now: Instant) -> Self
    where
        I: IntoIterator<Item = &'a Instant>,
    {
        let windows = [60u64, 5 * 60, 15 * 60];
        let mut counts = [0u64; 3];
        for t in arrivals {
            let age = now.saturating_duration_since(*t);
            for (count, secs) in counts.iter_mut().zip(windows) {
                if age < Duration::from_secs(secs) {
                    *count += 1;
                }
            }
        }
        let rate = |i: usize| round_to(counts[i] as f64 / windows[i] as f64, 2);
        Self {
            one_min: rate(0),
            five_min: rate(1),
            fifteen_min: rate(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitParams {
    #[serde(rename = "windowMs")]
    pub window_ms: u64,
    #[serde(rename = "maxRequests")]
    pub max_requests: u32,
}

/// Uptime split by successive floor-divide and modulo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UptimeBreakdown {
    pub years: u64,
    pub months: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl UptimeBreakdown {
    pub fn from_secs(mut secs: u64) -> Self {
        let years = secs / SECONDS_IN_YEAR;
        secs %= SECONDS_IN_YEAR;
        let months = secs / SECONDS_IN_MONTH;
        secs %= SECONDS_IN_MONTH;
        let days = secs / SECONDS_IN_DAY;
        secs %= SECONDS_IN_DAY;
        let hours = secs / SECONDS_IN_HOUR;
        secs %= SECONDS_IN_HOUR;
        let minutes = secs / SECONDS_IN_MINUTE;
        Self {
            years,
            months,
            days,
            hours,
            minutes,
            seconds: secs % SECONDS_IN_MINUTE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Uptime {
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "currentTime")]
    pub current_time: DateTime<Utc>,
    pub seconds: u64,
    pub minutes: u64,
    pub hours: u64,
    pub days: u64,
    pub month: u64,
    pub year: u64,
}

/// Everything attached to GET bodies under `__stats__`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub rps: f64,
    pub rps_stats: RpsStats,
    pub rate_limit: RateLimitParams,
    pub seconds: u64,
    pub uptime: Uptime,
    pub access_counters: BTreeMap<String, AccessShare>,
    pub error_counters: BTreeMap<String, ErrorRate>,
    pub not_chosen_counters: BTreeMap<String, u64>,
    pub jussi_behind_counters: BTreeMap<String, u64>,
    pub timed_out_counters: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn map(entries: &[(&str, u64)]) -> CounterMap {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn access_share_of_total() {
        let out = access_percentages(&map(&[("a", 30), ("b", 70)]), 100);
        assert_eq!(out["a"], AccessShare { percent: 30.0, count: 30 });
        assert_eq!(out["b"], AccessShare { percent: 70.0, count: 70 });
    }

    #[test]
    fn access_share_rounds_to_two_places() {
        let out = access_percentages(&map(&[("a", 1)]), 3);
        assert_eq!(out["a"].percent, 33.33);
    }

    #[test]
    fn error_rate_three_places() {
        let out = error_rates(&map(&[("a", 1)]), &map(&[("a", 3)]));
        assert_eq!(
            out["a"],
            ErrorRate {
                err_rate: 33.333,
                total: 3,
                error_count: 1,
                succ_rate: 66.667,
            }
        );
    }

    #[test]
    fn error_rate_without_access_defaults() {
        let out = error_rates(&map(&[("ghost", 4)]), &map(&[]));
        assert_eq!(
            out["ghost"],
            ErrorRate {
                err_rate: 0.0,
                total: 0,
                error_count: 0,
                succ_rate: 100.0,
            }
        );
    }

    #[test]
    fn error_rate_serializes_camel_case() {
        let out = error_rates(&map(&[("a", 1)]), &map(&[("a", 3)]));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["a"]["errRate"], 33.333);
        assert_eq!(json["a"]["errorCount"], 1);
        assert_eq!(json["a"]["succRate"], 66.667);
    }

    #[test]
    fn uptime_one_year_one_second() {
        let up = UptimeBreakdown::from_secs(365 * 86_400 + 1);
        assert_eq!(
            up,
            UptimeBreakdown {
                years: 1,
                seconds: 1,
                ..UptimeBreakdown::default()
            }
        );
    }

    #[test]
    fn uptime_zero() {
        assert_eq!(UptimeBreakdown::from_secs(0), UptimeBreakdown::default());
    }

    #[test]
    fn uptime_mixed_units() {
        let secs = 2 * SECONDS_IN_MONTH + 3 * SECONDS_IN_DAY + 4 * 3_600 + 5 * 60 + 6;
        let up = UptimeBreakdown::from_secs(secs);
        assert_eq!((up.months, up.days, up.hours, up.minutes, up.seconds), (2, 3, 4, 5, 6));
    }

    #[test]
    fn rolling_rates_by_window() {
        let now = Instant::now() + Duration::from_secs(20 * 60);
        let arrivals = vec![
            now - Duration::from_secs(10),
            now - Duration::from_secs(30),
            now - Duration::from_secs(120),
            now - Duration::from_secs(600),
            now - Duration::from_secs(1_000),
        ];
        let rps = RpsStats::from_arrivals(arrivals.iter(), now);
        assert_eq!(rps.one_min, round_to(2.0 / 60.0, 2));
        assert_eq!(rps.five_min, round_to(3.0 / 300.0, 2));
        assert_eq!(rps.fifteen_min, round_to(4.0 / 900.0, 2));
    }

    #[test]
    fn arrival_log_is_pruned() {
        let stats = StatsAggregator::new(&RateLimitConfig::default());
        let base = Instant::now();
        stats.record_arrival_at(base);
        stats.record_arrival_at(base + Duration::from_secs(60));
        stats.record_arrival_at(base + ARRIVAL_RETENTION + Duration::from_secs(1));
        assert_eq!(lock(&stats.arrivals).len(), 2);
    }

    #[test]
    fn overall_rps_guards_first_second() {
        assert_eq!(overall_rps(10, 0), 0.0);
        assert_eq!(overall_rps(10, 4), 2.5);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(StatsAggregator::new(&RateLimitConfig::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        stats.record_dispatch("node");
                        stats.increment(Counter::Error, "node");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.total(), 4_000);
        assert_eq!(stats.count(Counter::Access, "node"), 4_000);
        assert_eq!(stats.count(Counter::Error, "node"), 4_000);
    }

    #[test]
    fn snapshot_serializes_expected_keys() {
        let stats = StatsAggregator::new(&RateLimitConfig::default());
        stats.record_dispatch("https://a");
        stats.increment(Counter::Stale, "https://b");
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["total"], 1);
        assert!(json["rps_stats"].get("15min").is_some());
        assert_eq!(json["rate_limit"]["windowMs"], 60_000);
        assert!(json["uptime"].get("startTime").is_some());
        assert_eq!(json["access_counters"]["https://a"]["percent"], 100.0);
        assert_eq!(json["jussi_behind_counters"]["https://b"], 1);
    }
}
