use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::key::MeterKey;
use crate::metrics::{Aggregate, Timer};
use crate::snapshot::{MetricPoint, MetricType};

/// Percentile and SLA configuration, fixed when the timer is first registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerConfig {
    /// Quantiles in `(0, 1]` to publish as extra points.
    pub percentiles: Vec<f64>,
    /// Boundaries whose hit counts (`sample <= boundary`) are published.
    pub sla: Vec<Duration>,
    /// Keep at most this many recent samples for percentiles. `None` keeps all.
    pub max_samples: Option<usize>,
}

impl TimerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn percentiles(mut self, percentiles: impl IntoIterator<Item = f64>) -> Self {
        self.percentiles = percentiles.into_iter().collect();
        self
    }

    #[must_use]
    pub fn sla(mut self, boundaries: impl IntoIterator<Item = Duration>) -> Self {
        self.sla = boundaries.into_iter().collect();
        self
    }

    #[must_use]
    pub fn max_samples(mut self, limit: usize) -> Self {
        self.max_samples = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.percentiles.iter().find(|p| !(**p > 0.0 && **p <= 1.0)) {
            Some(p) => Err(Error::InvalidPercentile(*p)),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct SlaBucket {
    boundary: Duration,
    boundary_ms: f64,
    hits: AtomicU64,
}

#[derive(Debug)]
struct Samples {
    values: VecDeque<f64>,
    limit: Option<usize>,
}

impl Samples {
    fn push(&mut self, ms: f64) {
        if let Some(limit) = self.limit {
            if limit == 0 {
                return;
            }
            while self.values.len() >= limit {
                self.values.pop_front();
            }
        }
        self.values.push_back(ms);
    }
}

#[derive(Debug)]
struct TimerState {
    config: TimerConfig,
    clock: Arc<dyn Clock>,
    agg: Aggregate,
    samples: Option<Mutex<Samples>>,
    sla: Box<[SlaBucket]>,
}

/// In-memory timer. Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct AtomicTimer {
    state: Arc<TimerState>,
}

impl AtomicTimer {
    pub fn new(config: TimerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`AtomicTimer::new`], measuring guards and blocks with `clock`.
    pub fn with_clock(config: TimerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let samples = (!config.percentiles.is_empty()).then(|| {
            Mutex::new(Samples {
                values: VecDeque::new(),
                limit: config.max_samples,
            })
        });
        let sla = config
            .sla
            .iter()
            .map(|b| SlaBucket {
                boundary: *b,
                boundary_ms: duration_ms(*b),
                hits: AtomicU64::new(0),
            })
            .collect();

        Ok(Self {
            state: Arc::new(TimerState {
                config,
                clock,
                agg: Aggregate::new(),
                samples,
                sla,
            }),
        })
    }

    pub fn config(&self) -> &TimerConfig {
        &self.state.config
    }

    pub fn count(&self) -> i64 {
        self.state.agg.read().count
    }

    pub(crate) fn collect(&self, key: &MeterKey, out: &mut Vec<MetricPoint>) {
        let state = &self.state;
        out.push(state.agg.point(MetricType::Timer, key));

        if let Some(samples) = &state.samples {
            let mut sorted: Vec<f64> = samples.lock().values.iter().copied().collect();
            if !sorted.is_empty() {
                sorted.sort_by(f64::total_cmp);
                for p in &state.config.percentiles {
                    let tags = key.tags().with("percentile", &format!("{p:?}"));
                    out.push(
                        MetricPoint::new(MetricType::Timer, key.name(), &tags)
                            .with_value(nearest_rank(&sorted, *p)),
                    );
                }
            }
        }

        for bucket in state.sla.iter() {
            let tags = key
                .tags()
                .with("sla", &bucket.boundary.as_millis().to_string());
            let hits = bucket.hits.load(Ordering::Relaxed);
            out.push(
                MetricPoint::new(MetricType::Timer, key.name(), &tags)
                    .with_count(i64::try_from(hits).unwrap_or(i64::MAX)),
            );
        }
    }
}

impl Timer for AtomicTimer {
    fn record(&self, duration: Duration) {
        let state = &self.state;
        let ms = duration_ms(duration);

        state.agg.accumulate(ms);
        if let Some(samples) = &state.samples {
            samples.lock().push(ms);
        }
        for bucket in state.sla.iter() {
            if ms <= bucket.boundary_ms {
                bucket.hits.fetch_add(1, Ordering::Relaxed);
            }
        }
        state.agg.publish();
    }

    fn clock(&self) -> &dyn Clock {
        &*self.state.clock
    }
}

/// Records elapsed time into its timer when dropped, unless already stopped.
#[must_use = "dropping the guard immediately records a near-zero duration"]
pub struct TimerGuard<'a, T: Timer + ?Sized> {
    timer: &'a T,
    start: Instant,
    recorded: bool,
}

impl<'a, T: Timer + ?Sized> TimerGuard<'a, T> {
    pub fn new(timer: &'a T) -> Self {
        Self {
            timer,
            start: timer.clock().now(),
            recorded: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timer.clock().now().saturating_duration_since(self.start)
    }

    /// Records now and returns the recorded duration.
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        let elapsed = self.elapsed();
        if !self.recorded {
            self.recorded = true;
            self.timer.record(elapsed);
        }
        elapsed
    }
}

impl<T: Timer + ?Sized> Drop for TimerGuard<'_, T> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[inline]
pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Nearest-rank percentile over an ascending, non-empty slice.
pub(crate) fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let rank = ((p * n as f64).ceil() as usize).clamp(1, n.max(1)) - 1;
    sorted.get(rank).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagSet;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn nearest_rank_uses_ceil_indexing() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(nearest_rank(&sorted, 0.5), 30.0);
        assert_eq!(nearest_rank(&sorted, 0.9), 50.0);
        assert_eq!(nearest_rank(&sorted, 1.0), 50.0);
        assert_eq!(nearest_rank(&sorted, 0.01), 10.0);
        assert_eq!(nearest_rank(&[7.0], 0.5), 7.0);
    }

    #[test]
    fn config_rejects_out_of_range_percentiles() {
        assert!(TimerConfig::new().percentiles([0.5, 1.0]).validate().is_ok());
        assert!(matches!(
            TimerConfig::new().percentiles([0.0]).validate(),
            Err(Error::InvalidPercentile(p)) if p == 0.0
        ));
        assert!(TimerConfig::new().percentiles([1.5]).validate().is_err());
        assert!(TimerConfig::new().percentiles([f64::NAN]).validate().is_err());
    }

    #[test]
    fn timer_aggregates_and_sla_buckets() {
        let timer = match AtomicTimer::new(TimerConfig::new().sla([ms(20), ms(40)])) {
            Ok(t) => t,
            Err(err) => panic!("timer creation failed: {err}"),
        };
        timer.record(ms(10));
        timer.record(ms(30));
        timer.record(ms(50));

        let key = MeterKey::new("latency", TagSet::new());
        let mut points = Vec::new();
        timer.collect(&key, &mut points);

        assert_eq!(points.len(), 3);
        let base = &points[0];
        assert_eq!(base.count, Some(3));
        assert_eq!(base.sum, Some(90.0));
        assert_eq!(base.min, Some(10.0));
        assert_eq!(base.max, Some(50.0));

        assert_eq!(points[1].tags.get("sla").map(String::as_str), Some("20"));
        assert_eq!(points[1].count, Some(1));
        assert_eq!(points[2].tags.get("sla").map(String::as_str), Some("40"));
        assert_eq!(points[2].count, Some(2));
    }

    #[test]
    fn sample_limit_keeps_most_recent() {
        let config = TimerConfig::new().percentiles([1.0]).max_samples(2);
        let timer = match AtomicTimer::new(config) {
            Ok(t) => t,
            Err(err) => panic!("timer creation failed: {err}"),
        };
        timer.record(ms(100));
        timer.record(ms(1));
        timer.record(ms(2));

        let key = MeterKey::new("t", TagSet::new());
        let mut points = Vec::new();
        timer.collect(&key, &mut points);

        // Aggregates still see every sample; the percentile only the retained window.
        assert_eq!(points[0].max, Some(100.0));
        assert_eq!(points[1].tags.get("percentile").map(String::as_str), Some("1.0"));
        assert_eq!(points[1].value, Some(2.0));
    }

    #[test]
    fn no_percentile_points_without_samples() {
        let timer = match AtomicTimer::new(TimerConfig::new().percentiles([0.5])) {
            Ok(t) => t,
            Err(err) => panic!("timer creation failed: {err}"),
        };
        let mut points = Vec::new();
        timer.collect(&MeterKey::new("t", TagSet::new()), &mut points);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].min, Some(0.0));
        assert_eq!(points[0].max, Some(0.0));
    }

    #[test]
    fn guard_records_on_drop_and_stop_records_once() {
        let timer = match AtomicTimer::new(TimerConfig::new()) {
            Ok(t) => t,
            Err(err) => panic!("timer creation failed: {err}"),
        };

        {
            let _guard = timer.start();
        }
        assert_eq!(timer.count(), 1);

        let guard = timer.start();
        let _ = guard.stop();
        assert_eq!(timer.count(), 2);

        let out = timer.record_with(|| 41 + 1);
        assert_eq!(out, 42);
        assert_eq!(timer.count(), 3);
    }

    #[test]
    fn record_with_records_when_block_panics() {
        let timer = match AtomicTimer::new(TimerConfig::new()) {
            Ok(t) => t,
            Err(err) => panic!("timer creation failed: {err}"),
        };

        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            timer.record_with(|| -> i32 { panic!("boom") })
        }));
        assert!(res.is_err());
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn guard_measures_with_injected_clock() {
        let clock = Arc::new(crate::clock::ManualClock::new());
        let timer = match AtomicTimer::with_clock(TimerConfig::new(), clock.clone()) {
            Ok(t) => t,
            Err(err) => panic!("timer creation failed: {err}"),
        };

        let guard = timer.start();
        clock.advance(ms(25));
        assert_eq!(guard.elapsed(), ms(25));
        assert_eq!(guard.stop(), ms(25));

        let out = timer.record_with(|| {
            clock.advance(ms(15));
            "done"
        });
        assert_eq!(out, "done");

        let mut points = Vec::new();
        timer.collect(&MeterKey::new("t", TagSet::new()), &mut points);
        assert_eq!(points[0].count, Some(2));
        assert_eq!(points[0].sum, Some(40.0));
        assert_eq!(points[0].min, Some(15.0));
        assert_eq!(points[0].max, Some(25.0));
    }

    #[test]
    fn record_ms_matches_duration_record() {
        let timer = match AtomicTimer::new(TimerConfig::new().sla([ms(100)])) {
            Ok(t) => t,
            Err(err) => panic!("timer creation failed: {err}"),
        };
        timer.record_ms(100);
        timer.record_ms(250);

        let mut points = Vec::new();
        timer.collect(&MeterKey::new("t", TagSet::new()), &mut points);
        assert_eq!(points[0].sum, Some(350.0));
        assert_eq!(points[1].count, Some(1));
    }
}
