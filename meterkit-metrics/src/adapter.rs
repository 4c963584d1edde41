//! Contract for forwarding the registry surface to an external metrics backend.
//!
//! A [`Backend`] owns native meters; [`BackendRegistry`] exposes it as a
//! [`MeterRegistry`] and translates native readings back into [`MetricPoint`]s.
//! Export is best-effort: unknown meter types are skipped and a meter that fails to
//! read is logged and left out, without failing the rest of the snapshot.

use crate::error::Result;
use crate::key::MeterKey;
use crate::metrics::{Counter, DistributionSummary, Gauge, Timer};
use crate::registry::MeterRegistry;
use crate::snapshot::{MetricPoint, MetricType, MetricsSnapshot};
use crate::tags::TagSet;
use crate::timer::TimerConfig;

/// Current state of one backend meter, in this crate's units (milliseconds for time).
#[derive(Debug, Clone, PartialEq)]
pub enum NativeReading {
    Counter { count: f64 },
    Gauge { value: f64 },
    Timer { count: i64, total_ms: f64, max_ms: f64 },
    Summary { count: i64, total: f64, max: f64 },
    LongTaskTimer { active_tasks: i64, duration_ms: f64 },
    /// A meter type with no mapping; skipped on export.
    Unknown,
}

pub trait NativeMeter {
    fn key(&self) -> MeterKey;

    fn read(&self) -> Result<NativeReading>;
}

pub trait Backend: Send + Sync {
    type Counter: Counter;
    type Gauge: Gauge;
    type Timer: Timer;
    type Summary: DistributionSummary;

    fn register_counter(&self, key: &MeterKey) -> Result<Self::Counter>;

    fn register_gauge(&self, key: &MeterKey) -> Result<Self::Gauge>;

    fn register_timer(&self, key: &MeterKey, config: &TimerConfig) -> Result<Self::Timer>;

    fn register_summary(&self, key: &MeterKey) -> Result<Self::Summary>;

    /// Visits every meter the backend knows about, including ones registered elsewhere.
    fn for_each_meter(&self, visit: &mut dyn FnMut(&dyn NativeMeter));
}

#[derive(Debug)]
pub struct BackendRegistry<B> {
    backend: B,
}

impl<B: Backend> BackendRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Maps one native meter to a point. `Ok(None)` means the type has no mapping.
pub fn translate(meter: &dyn NativeMeter) -> Result<Option<MetricPoint>> {
    let key = meter.key();
    let point = |kind| MetricPoint::new(kind, key.name(), key.tags());

    let point = match meter.read()? {
        NativeReading::Counter { count } => {
            // Backends commonly count in f64; the exported shape is integral.
            point(MetricType::Counter).with_count(count as i64)
        }
        NativeReading::Gauge { value } => point(MetricType::Gauge).with_value(value),
        NativeReading::Timer {
            count,
            total_ms,
            max_ms,
        } => point(MetricType::Timer)
            .with_count(count)
            .with_sum(total_ms)
            .with_max(max_ms),
        NativeReading::Summary { count, total, max } => point(MetricType::Summary)
            .with_count(count)
            .with_sum(total)
            .with_max(max),
        NativeReading::LongTaskTimer {
            active_tasks,
            duration_ms,
        } => point(MetricType::LongTaskTimer)
            .with_count(active_tasks)
            .with_sum(duration_ms),
        NativeReading::Unknown => return Ok(None),
    };

    Ok(Some(point))
}

impl<B: Backend> MeterRegistry for BackendRegistry<B> {
    type Counter = B::Counter;
    type Gauge = B::Gauge;
    type Timer = B::Timer;
    type Summary = B::Summary;

    fn counter(&self, name: &str, tags: &TagSet) -> Result<B::Counter> {
        self.backend
            .register_counter(&MeterKey::new(name, tags.clone()))
    }

    fn gauge(&self, name: &str, tags: &TagSet) -> Result<B::Gauge> {
        self.backend.register_gauge(&MeterKey::new(name, tags.clone()))
    }

    fn timer(&self, name: &str, tags: &TagSet, config: &TimerConfig) -> Result<B::Timer> {
        config.validate()?;
        self.backend
            .register_timer(&MeterKey::new(name, tags.clone()), config)
    }

    fn summary(&self, name: &str, tags: &TagSet) -> Result<B::Summary> {
        self.backend
            .register_summary(&MeterKey::new(name, tags.clone()))
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let mut points = Vec::new();
        self.backend.for_each_meter(&mut |meter| match translate(meter) {
            Ok(Some(point)) => points.push(point),
            Ok(None) => {
                tracing::trace!(meter = %meter.key(), "skipping meter with unknown type");
            }
            Err(err) => {
                tracing::warn!(meter = %meter.key(), error = %err, "dropping meter from snapshot");
            }
        });
        MetricsSnapshot::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::metrics::{AtomicCounter, AtomicGauge, AtomicSummary};
    use crate::timer::AtomicTimer;
    use parking_lot::Mutex;

    /// Backend double: keeps handles from the in-memory meters plus injected raw meters.
    #[derive(Default)]
    struct FakeBackend {
        counters: Mutex<Vec<(MeterKey, AtomicCounter)>>,
        gauges: Mutex<Vec<(MeterKey, AtomicGauge)>>,
        timers: Mutex<Vec<(MeterKey, AtomicTimer)>>,
        summaries: Mutex<Vec<(MeterKey, AtomicSummary)>>,
        raw: Vec<RawMeter>,
        reject: Option<&'static str>,
    }

    struct RawMeter {
        key: MeterKey,
        reading: std::result::Result<NativeReading, &'static str>,
    }

    impl NativeMeter for RawMeter {
        fn key(&self) -> MeterKey {
            self.key.clone()
        }

        fn read(&self) -> Result<NativeReading> {
            self.reading.clone().map_err(|reason| Error::Translation {
                name: self.key.name().to_string(),
                reason: reason.to_string(),
            })
        }
    }

    struct Live(MeterKey, NativeReading);

    impl NativeMeter for Live {
        fn key(&self) -> MeterKey {
            self.0.clone()
        }

        fn read(&self) -> Result<NativeReading> {
            Ok(self.1.clone())
        }
    }

    fn find_or_push<T: Clone>(
        list: &Mutex<Vec<(MeterKey, T)>>,
        key: &MeterKey,
        make: impl FnOnce() -> T,
    ) -> T {
        let mut list = list.lock();
        if let Some((_, m)) = list.iter().find(|(k, _)| k == key) {
            return m.clone();
        }
        let m = make();
        list.push((key.clone(), m.clone()));
        m
    }

    impl Backend for FakeBackend {
        type Counter = AtomicCounter;
        type Gauge = AtomicGauge;
        type Timer = AtomicTimer;
        type Summary = AtomicSummary;

        fn register_counter(&self, key: &MeterKey) -> Result<AtomicCounter> {
            if self.reject == Some(key.name()) {
                return Err(Error::Backend(format!("rejected {key}")));
            }
            Ok(find_or_push(&self.counters, key, AtomicCounter::new))
        }

        fn register_gauge(&self, key: &MeterKey) -> Result<AtomicGauge> {
            Ok(find_or_push(&self.gauges, key, AtomicGauge::new))
        }

        fn register_timer(&self, key: &MeterKey, config: &TimerConfig) -> Result<AtomicTimer> {
            let mut timers = self.timers.lock();
            if let Some((_, t)) = timers.iter().find(|(k, _)| k == key) {
                return Ok(t.clone());
            }
            let t = AtomicTimer::new(config.clone())?;
            timers.push((key.clone(), t.clone()));
            Ok(t)
        }

        fn register_summary(&self, key: &MeterKey) -> Result<AtomicSummary> {
            Ok(find_or_push(&self.summaries, key, AtomicSummary::new))
        }

        fn for_each_meter(&self, visit: &mut dyn FnMut(&dyn NativeMeter)) {
            for (k, c) in self.counters.lock().iter() {
                visit(&Live(k.clone(), NativeReading::Counter { count: c.get() as f64 }));
            }
            for (k, g) in self.gauges.lock().iter() {
                visit(&Live(k.clone(), NativeReading::Gauge { value: g.get() }));
            }
            for (k, t) in self.timers.lock().iter() {
                let mut points = Vec::new();
                t.collect(k, &mut points);
                let base = &points[0];
                visit(&Live(
                    k.clone(),
                    NativeReading::Timer {
                        count: base.count.unwrap_or(0),
                        total_ms: base.sum.unwrap_or(0.0),
                        max_ms: base.max.unwrap_or(0.0),
                    },
                ));
            }
            for (k, s) in self.summaries.lock().iter() {
                visit(&Live(
                    k.clone(),
                    NativeReading::Summary {
                        count: s.count(),
                        total: 0.0,
                        max: 0.0,
                    },
                ));
            }
            for raw in &self.raw {
                visit(raw);
            }
        }
    }

    fn raw(name: &str, reading: std::result::Result<NativeReading, &'static str>) -> RawMeter {
        RawMeter {
            key: MeterKey::new(name, TagSet::new()),
            reading,
        }
    }

    #[test]
    fn snapshot_translates_known_meters_and_skips_the_rest() {
        let backend = FakeBackend {
            raw: vec![
                raw(
                    "function.counter",
                    Ok(NativeReading::Counter { count: 1.0 }),
                ),
                raw(
                    "long.task.timer",
                    Ok(NativeReading::LongTaskTimer {
                        active_tasks: 1,
                        duration_ms: 10.0,
                    }),
                ),
                raw("mystery", Ok(NativeReading::Unknown)),
                raw("broken", Err("meter vanished")),
            ],
            ..FakeBackend::default()
        };
        let registry = BackendRegistry::new(backend);

        let none = TagSet::new();
        let _ = registry.counter("counter", &none).map(|c| c.increment());
        let _ = registry.gauge("gauge", &none).map(|g| g.set(2.0));
        let _ = registry
            .timer("timer", &none, &TimerConfig::default())
            .map(|t| t.record(std::time::Duration::from_millis(10)));
        let _ = registry.summary("summary", &none).map(|s| s.record(3.0));

        let snapshot = registry.snapshot();
        let names: Vec<_> = snapshot.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "counter",
                "gauge",
                "timer",
                "summary",
                "function.counter",
                "long.task.timer"
            ]
        );

        assert_eq!(snapshot.find("counter").and_then(|p| p.count), Some(1));
        assert_eq!(snapshot.find("gauge").and_then(|p| p.value), Some(2.0));
        assert_eq!(snapshot.find("timer").and_then(|p| p.count), Some(1));
        assert_eq!(snapshot.find("summary").and_then(|p| p.count), Some(1));
        assert_eq!(snapshot.find("function.counter").and_then(|p| p.count), Some(1));

        let ltt = snapshot
            .find("long.task.timer")
            .unwrap_or_else(|| panic!("missing long task timer"));
        assert_eq!(ltt.kind, MetricType::LongTaskTimer);
        assert_eq!(ltt.count, Some(1));

        let prom = snapshot.to_prometheus_lines();
        for name in ["counter", "function_counter", "long_task_timer"] {
            assert!(prom.iter().any(|l| l.starts_with(name)), "missing {name}");
        }
    }

    #[test]
    fn registration_errors_surface_to_caller() {
        let registry = BackendRegistry::new(FakeBackend {
            reject: Some("denied"),
            ..FakeBackend::default()
        });
        assert!(matches!(
            registry.counter("denied", &TagSet::new()),
            Err(Error::Backend(_))
        ));
        assert!(matches!(
            registry.timer("t", &TagSet::new(), &TimerConfig::new().percentiles([0.0])),
            Err(Error::InvalidPercentile(_))
        ));
        assert!(registry.snapshot().is_empty());
    }
}
