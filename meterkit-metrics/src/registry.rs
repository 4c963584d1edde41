use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::key::MeterKey;
use crate::metrics::{
    AtomicCounter, AtomicGauge, AtomicSummary, Counter, DistributionSummary, Gauge, Meter,
    MeterKind, Timer,
};
use crate::snapshot::MetricsSnapshot;
use crate::tags::TagSet;
use crate::timer::{AtomicTimer, TimerConfig};

/// Get-or-create access to meters plus snapshot export.
///
/// Accessors are idempotent by `(name, tags)`: asking twice returns handles to the same
/// meter. A timer keeps the config it was first registered with.
pub trait MeterRegistry: Send + Sync {
    type Counter: Counter;
    type Gauge: Gauge;
    type Timer: Timer;
    type Summary: DistributionSummary;

    fn counter(&self, name: &str, tags: &TagSet) -> Result<Self::Counter>;

    fn gauge(&self, name: &str, tags: &TagSet) -> Result<Self::Gauge>;

    fn timer(&self, name: &str, tags: &TagSet, config: &TimerConfig) -> Result<Self::Timer>;

    fn summary(&self, name: &str, tags: &TagSet) -> Result<Self::Summary>;

    fn snapshot(&self) -> MetricsSnapshot;

    /// Time source for measured operations run against this registry.
    fn clock(&self) -> &dyn Clock {
        &SystemClock
    }
}

#[derive(Debug, Clone)]
struct Entry {
    key: MeterKey,
    meter: Meter,
}

#[derive(Debug, Default)]
struct Index {
    slots: AHashMap<MeterKey, usize>,
    // creation order
    entries: Vec<Entry>,
}

impl Index {
    fn get(&self, key: &MeterKey) -> Option<&Meter> {
        let slot = *self.slots.get(key)?;
        self.entries.get(slot).map(|e| &e.meter)
    }
}

/// Lock-light in-memory registry. Meter updates never touch the index lock.
#[derive(Debug)]
pub struct InMemoryRegistry {
    index: RwLock<Index>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose timers and measured operations read time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            clock,
        }
    }

    /// Number of distinct meters registered.
    pub fn len(&self) -> usize {
        self.index.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_or_insert(
        &self,
        key: MeterKey,
        create: impl FnOnce() -> Result<Meter>,
    ) -> Result<(MeterKey, Meter)> {
        {
            let index = self.index.read();
            if let Some(meter) = index.get(&key) {
                return Ok((key, meter.clone()));
            }
        }

        let mut index = self.index.write();

        // Check again to avoid race
        if let Some(meter) = index.get(&key) {
            return Ok((key, meter.clone()));
        }

        let meter = create()?;
        tracing::debug!(meter = %key, kind = %meter.kind(), "registered meter");

        let slot = index.entries.len();
        index.entries.push(Entry {
            key: key.clone(),
            meter: meter.clone(),
        });
        index.slots.insert(key.clone(), slot);
        Ok((key, meter))
    }
}

fn mismatch(key: MeterKey, registered: &Meter, requested: MeterKind) -> Error {
    Error::KindMismatch {
        key,
        registered: registered.kind(),
        requested,
    }
}

impl MeterRegistry for InMemoryRegistry {
    type Counter = AtomicCounter;
    type Gauge = AtomicGauge;
    type Timer = AtomicTimer;
    type Summary = AtomicSummary;

    fn counter(&self, name: &str, tags: &TagSet) -> Result<AtomicCounter> {
        let key = MeterKey::new(name, tags.clone());
        match self.get_or_insert(key, || Ok(Meter::Counter(AtomicCounter::new())))? {
            (_, Meter::Counter(c)) => Ok(c),
            (key, other) => Err(mismatch(key, &other, MeterKind::Counter)),
        }
    }

    fn gauge(&self, name: &str, tags: &TagSet) -> Result<AtomicGauge> {
        let key = MeterKey::new(name, tags.clone());
        match self.get_or_insert(key, || Ok(Meter::Gauge(AtomicGauge::new())))? {
            (_, Meter::Gauge(g)) => Ok(g),
            (key, other) => Err(mismatch(key, &other, MeterKind::Gauge)),
        }
    }

    fn timer(&self, name: &str, tags: &TagSet, config: &TimerConfig) -> Result<AtomicTimer> {
        let key = MeterKey::new(name, tags.clone());
        let created = || -> Result<Meter> {
            let timer = AtomicTimer::with_clock(config.clone(), Arc::clone(&self.clock))?;
            Ok(Meter::Timer(timer))
        };
        match self.get_or_insert(key, created)? {
            (key, Meter::Timer(t)) => {
                if t.config() != config {
                    tracing::debug!(
                        meter = %key,
                        "timer already registered; keeping its original config"
                    );
                }
                Ok(t)
            }
            (key, other) => Err(mismatch(key, &other, MeterKind::Timer)),
        }
    }

    fn summary(&self, name: &str, tags: &TagSet) -> Result<AtomicSummary> {
        let key = MeterKey::new(name, tags.clone());
        match self.get_or_insert(key, || Ok(Meter::Summary(AtomicSummary::new())))? {
            (_, Meter::Summary(s)) => Ok(s),
            (key, other) => Err(mismatch(key, &other, MeterKind::Summary)),
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        // Copy the handles out so meter creation is not blocked while values are read.
        let mut entries = self.index.read().entries.clone();
        entries.sort_by_key(|e| e.meter.kind());

        let mut points = Vec::with_capacity(entries.len());
        for e in &entries {
            e.meter.collect(&e.key, &mut points);
        }
        MetricsSnapshot::new(points)
    }

    fn clock(&self) -> &dyn Clock {
        &*self.clock
    }
}
