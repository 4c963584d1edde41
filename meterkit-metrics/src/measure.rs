//! Measured operations built on the public [`MeterRegistry`] surface.
//!
//! Every invocation of a measured unit of work emits:
//! - `<prefix>.duration` timer sample,
//! - `<prefix>.total` counter increment,
//! - exactly one of `<prefix>.success` or `<prefix>.failure` (tagged `exception=<kind>`).
//!
//! Metric failures are logged and never replace the caller's result.

use std::borrow::Cow;
use std::convert::Infallible;
use std::time::Instant;

use crate::metrics::{Counter, Timer};
use crate::registry::MeterRegistry;
use crate::tags::TagSet;
use crate::timer::TimerConfig;

/// `exception` tag value for a unit of work that panicked.
pub const PANIC_KIND: &str = "panic";
/// `exception` tag value for a future dropped before completion.
pub const CANCELLED_KIND: &str = "cancelled";

/// Measures a fallible unit of work. The result is returned unchanged.
///
/// Failures are tagged with the short type name of `E` (see [`failure_kind`]). Use
/// [`measure_with_kind`] when the type name is not specific enough, e.g. for
/// `io::Error` or `anyhow::Error`.
///
/// A panic inside `f` is recorded as a failure with `exception=panic` and then resumes unwinding.
pub fn measure<R, T, E, F>(registry: &R, prefix: &str, tags: &TagSet, f: F) -> Result<T, E>
where
    R: MeterRegistry + ?Sized,
    F: FnOnce() -> Result<T, E>,
{
    measure_with_kind(registry, prefix, tags, |_: &E| failure_kind::<E>(), f)
}

/// Like [`measure`], but the `exception` tag of a failure is computed from the error value.
///
/// ```
/// use meterkit_metrics::{measure::measure_with_kind, InMemoryRegistry, TagSet};
///
/// let registry = InMemoryRegistry::new();
/// let read = measure_with_kind(
///     &registry,
///     "config.read",
///     &TagSet::new(),
///     |e: &std::io::Error| format!("{:?}", e.kind()),
///     || std::fs::read_to_string("/definitely/not/here"),
/// );
/// assert!(read.is_err());
/// ```
pub fn measure_with_kind<R, T, E, K, S, F>(
    registry: &R,
    prefix: &str,
    tags: &TagSet,
    kind: K,
    f: F,
) -> Result<T, E>
where
    R: MeterRegistry + ?Sized,
    K: FnOnce(&E) -> S,
    S: Into<Cow<'static, str>>,
    F: FnOnce() -> Result<T, E>,
{
    let guard = Measurement::start(registry, prefix, tags);
    let result = f();
    guard.finish(outcome(&result, kind));
    result
}

/// Measures a unit of work that cannot fail. Only a panic produces a failure.
pub fn measure_infallible<R, T, F>(registry: &R, prefix: &str, tags: &TagSet, f: F) -> T
where
    R: MeterRegistry + ?Sized,
    F: FnOnce() -> T,
{
    match measure(registry, prefix, tags, || Ok::<T, Infallible>(f())) {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Async counterpart of [`measure`]. If the returned future is dropped before `fut`
/// completes, the attempt is recorded as a failure with `exception=cancelled`.
pub async fn measure_async<R, T, E, Fut>(
    registry: &R,
    prefix: &str,
    tags: &TagSet,
    fut: Fut,
) -> Result<T, E>
where
    R: MeterRegistry + ?Sized,
    Fut: Future<Output = Result<T, E>>,
{
    measure_async_with_kind(registry, prefix, tags, |_: &E| failure_kind::<E>(), fut).await
}

/// Async counterpart of [`measure_with_kind`].
pub async fn measure_async_with_kind<R, T, E, K, S, Fut>(
    registry: &R,
    prefix: &str,
    tags: &TagSet,
    kind: K,
    fut: Fut,
) -> Result<T, E>
where
    R: MeterRegistry + ?Sized,
    K: FnOnce(&E) -> S,
    S: Into<Cow<'static, str>>,
    Fut: Future<Output = Result<T, E>>,
{
    let guard = Measurement::start(registry, prefix, tags);
    let result = fut.await;
    guard.finish(outcome(&result, kind));
    result
}

fn outcome<T, E, K, S>(result: &Result<T, E>, kind: K) -> Outcome
where
    K: FnOnce(&E) -> S,
    S: Into<Cow<'static, str>>,
{
    match result {
        Ok(_) => Outcome::Success,
        Err(err) => Outcome::Failure(kind(err).into()),
    }
}

/// Short name of the error type, e.g. `ParseIntError` or `Box<dyn Error>`.
pub fn failure_kind<E: ?Sized>() -> String {
    short_type_name(std::any::type_name::<E>())
}

fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
            continue;
        }
        out.push(c);
        if !(c.is_alphanumeric() || c == '_') {
            segment_start = out.len();
        }
    }
    out
}

#[derive(Debug)]
enum Outcome {
    Success,
    Failure(Cow<'static, str>),
}

struct Measurement<'a, R: MeterRegistry + ?Sized> {
    registry: &'a R,
    prefix: &'a str,
    tags: &'a TagSet,
    start: Instant,
    done: bool,
}

impl<'a, R: MeterRegistry + ?Sized> Measurement<'a, R> {
    fn start(registry: &'a R, prefix: &'a str, tags: &'a TagSet) -> Self {
        Self {
            registry,
            prefix,
            tags,
            start: registry.clock().now(),
            done: false,
        }
    }

    fn finish(mut self, outcome: Outcome) {
        self.done = true;
        self.emit(outcome);
    }

    fn emit(&self, outcome: Outcome) {
        let elapsed = self
            .registry
            .clock()
            .now()
            .saturating_duration_since(self.start);
        let prefix = self.prefix;

        match self
            .registry
            .timer(&format!("{prefix}.duration"), self.tags, &TimerConfig::default())
        {
            Ok(t) => t.record(elapsed),
            Err(err) => tracing::warn!(%prefix, error = %err, "failed to record duration"),
        }
        self.increment(&format!("{prefix}.total"), self.tags);

        match outcome {
            Outcome::Success => self.increment(&format!("{prefix}.success"), self.tags),
            Outcome::Failure(kind) => {
                let tags = self.tags.with("exception", &kind);
                self.increment(&format!("{prefix}.failure"), &tags);
            }
        }
    }

    fn increment(&self, name: &str, tags: &TagSet) {
        match self.registry.counter(name, tags) {
            Ok(c) => c.increment(),
            Err(err) => tracing::warn!(counter = %name, error = %err, "failed to record counter"),
        }
    }
}

impl<R: MeterRegistry + ?Sized> Drop for Measurement<'_, R> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let kind = if std::thread::panicking() {
            PANIC_KIND
        } else {
            CANCELLED_KIND
        };
        self.emit(Outcome::Failure(Cow::Borrowed(kind)));
    }
}
