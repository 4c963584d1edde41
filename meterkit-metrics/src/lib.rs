//! In-process meters (counters, gauges, timers, distribution summaries) with
//! point-in-time snapshots and JSON, OpenTelemetry JSON and Prometheus export.

pub mod adapter;
pub mod clock;
pub mod error;
pub mod export;
pub mod key;
pub mod measure;
pub mod metrics;
pub mod registry;
pub mod snapshot;
pub mod tags;
pub mod timer;

pub use adapter::{Backend, BackendRegistry, NativeMeter, NativeReading};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use key::MeterKey;
pub use measure::{
    measure, measure_async, measure_async_with_kind, measure_infallible, measure_with_kind,
};
pub use metrics::{
    AtomicCounter, AtomicGauge, AtomicSummary, Counter, DistributionSummary, Gauge, MeterKind,
    Timer,
};
pub use registry::{InMemoryRegistry, MeterRegistry};
pub use snapshot::{MetricPoint, MetricType, MetricsSnapshot};
pub use tags::TagSet;
pub use timer::{AtomicTimer, TimerConfig, TimerGuard};
