//! Wire formats for [`MetricsSnapshot`](crate::MetricsSnapshot).
//!
//! Every exporter is a pure function of the snapshot: point order is preserved and
//! identical snapshots produce byte-identical output.

pub mod json;
pub mod otel;
pub mod prometheus;
