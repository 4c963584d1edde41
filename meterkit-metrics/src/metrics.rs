use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::key::MeterKey;
use crate::snapshot::{MetricPoint, MetricType};
use crate::timer::{AtomicTimer, TimerGuard};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum MeterKind {
    Counter,
    Gauge,
    Timer,
    Summary,
}

/// A monotonically increasing count.
pub trait Counter {
    fn inc(&self, delta: i64);

    fn increment(&self) {
        self.inc(1);
    }
}

/// The last value passed to [`Gauge::set`].
pub trait Gauge {
    fn set(&self, value: f64);
}

/// Records durations.
pub trait Timer {
    fn record(&self, duration: Duration);

    /// Records a duration already measured in whole milliseconds.
    fn record_ms(&self, millis: u64) {
        self.record(Duration::from_millis(millis));
    }

    /// Time source used by [`Timer::start`] and the block-measuring helpers.
    fn clock(&self) -> &dyn Clock {
        &SystemClock
    }

    /// Starts a measurement that records the elapsed time when dropped (or on [`TimerGuard::stop`]).
    fn start(&self) -> TimerGuard<'_, Self> {
        TimerGuard::new(self)
    }

    /// Records the wall-clock time spent in `f`, even if `f` panics.
    fn record_with<T>(&self, f: impl FnOnce() -> T) -> T
    where
        Self: Sized,
    {
        let _guard = self.start();
        f()
    }

    /// Records the time until `fut` completes. A future dropped before completion still records.
    fn record_async<F>(&self, fut: F) -> impl Future<Output = F::Output>
    where
        Self: Sized,
        F: Future,
    {
        async move {
            let _guard = self.start();
            fut.await
        }
    }
}

/// Tracks the distribution of unit-less sampled amounts (sizes, counts per batch, ...).
pub trait DistributionSummary {
    fn record(&self, amount: f64);
}

/// `f64` stored as its bit pattern, with CAS-loop read-modify-write.
#[derive(Debug)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.0.load(order))
    }

    #[inline]
    pub(crate) fn store(&self, value: f64, order: Ordering) {
        self.0.store(value.to_bits(), order);
    }

    #[inline]
    pub(crate) fn fetch_add(&self, delta: f64) {
        self.update(|cur| cur + delta);
    }

    #[inline]
    pub(crate) fn fetch_min(&self, value: f64) {
        self.update(|cur| cur.min(value));
    }

    #[inline]
    pub(crate) fn fetch_max(&self, value: f64) {
        self.update(|cur| cur.max(value));
    }

    fn update(&self, f: impl Fn(f64) -> f64) {
        let mut cur = self.0.load(Ordering::Relaxed);
        loop {
            let next = f(f64::from_bits(cur)).to_bits();
            if next == cur {
                return;
            }
            match self
                .0
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => cur = actual,
            }
        }
    }
}

/// count/sum/min/max shared by timers and summaries.
///
/// `count` is published last (release) and read first (acquire), so a reader that
/// sees a non-zero count also sees the min/max of at least that many samples.
#[derive(Debug)]
pub(crate) struct Aggregate {
    count: AtomicI64,
    sum: AtomicF64,
    min: AtomicF64,
    max: AtomicF64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AggregateReading {
    pub count: i64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Aggregate {
    pub(crate) fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
            sum: AtomicF64::new(0.0),
            min: AtomicF64::new(f64::INFINITY),
            max: AtomicF64::new(f64::NEG_INFINITY),
        }
    }

    #[inline]
    pub(crate) fn accumulate(&self, value: f64) {
        self.sum.fetch_add(value);
        self.min.fetch_min(value);
        self.max.fetch_max(value);
    }

    #[inline]
    pub(crate) fn publish(&self) {
        self.count.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn read(&self) -> AggregateReading {
        let count = self.count.load(Ordering::Acquire);
        let sum = self.sum.load(Ordering::Relaxed);
        if count == 0 {
            return AggregateReading {
                count,
                sum,
                min: 0.0,
                max: 0.0,
            };
        }
        AggregateReading {
            count,
            sum,
            min: self.min.load(Ordering::Relaxed),
            max: self.max.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn point(&self, kind: MetricType, key: &MeterKey) -> MetricPoint {
        let r = self.read();
        MetricPoint::new(kind, key.name(), key.tags())
            .with_count(r.count)
            .with_sum(r.sum)
            .with_min(r.min)
            .with_max(r.max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AtomicCounter {
    count: Arc<AtomicI64>,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Counter for AtomicCounter {
    #[inline]
    fn inc(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct AtomicGauge {
    value: Arc<AtomicF64>,
}

impl AtomicGauge {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicF64::new(0.0)),
        }
    }

    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for AtomicGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl Gauge for AtomicGauge {
    #[inline]
    fn set(&self, value: f64) {
        self.value.store(value, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone)]
pub struct AtomicSummary {
    agg: Arc<Aggregate>,
}

impl AtomicSummary {
    pub fn new() -> Self {
        Self {
            agg: Arc::new(Aggregate::new()),
        }
    }

    pub fn count(&self) -> i64 {
        self.agg.read().count
    }
}

impl Default for AtomicSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionSummary for AtomicSummary {
    #[inline]
    fn record(&self, amount: f64) {
        self.agg.accumulate(amount);
        self.agg.publish();
    }
}

/// Registry-side storage for one meter.
#[derive(Debug, Clone)]
pub(crate) enum Meter {
    Counter(AtomicCounter),
    Gauge(AtomicGauge),
    Timer(AtomicTimer),
    Summary(AtomicSummary),
}

impl Meter {
    pub(crate) fn kind(&self) -> MeterKind {
        match self {
            Meter::Counter(_) => MeterKind::Counter,
            Meter::Gauge(_) => MeterKind::Gauge,
            Meter::Timer(_) => MeterKind::Timer,
            Meter::Summary(_) => MeterKind::Summary,
        }
    }

    pub(crate) fn collect(&self, key: &MeterKey, out: &mut Vec<MetricPoint>) {
        match self {
            Meter::Counter(c) => out.push(
                MetricPoint::new(MetricType::Counter, key.name(), key.tags()).with_count(c.get()),
            ),
            Meter::Gauge(g) => out.push(
                MetricPoint::new(MetricType::Gauge, key.name(), key.tags()).with_value(g.get()),
            ),
            Meter::Timer(t) => t.collect(key, out),
            Meter::Summary(s) => out.push(s.agg.point(MetricType::Summary, key)),
        }
    }
}
