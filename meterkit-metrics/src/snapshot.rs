use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::export;
use crate::tags::TagSet;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Timer,
    Summary,
    LongTaskTimer,
    /// Any type string this crate does not know (only produced when parsing foreign snapshots).
    #[serde(other)]
    Other,
}

/// One exported series. Derived series (percentiles, SLA buckets) carry an extra tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    #[serde(rename = "type")]
    pub kind: MetricType,
    pub name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl MetricPoint {
    pub fn new(kind: MetricType, name: &str, tags: &TagSet) -> Self {
        Self {
            kind,
            name: name.to_string(),
            tags: tags.to_map(),
            value: None,
            count: None,
            sum: None,
            min: None,
            max: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn with_sum(mut self, sum: f64) -> Self {
        self.sum = Some(sum);
        self
    }

    #[must_use]
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Point-in-time copy of every meter in a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub points: Vec<MetricPoint>,
}

impl MetricsSnapshot {
    pub fn new(points: Vec<MetricPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricPoint> + '_ {
        self.points.iter()
    }

    /// First point named `name` (the base point for timers with derived series).
    pub fn find(&self, name: &str) -> Option<&MetricPoint> {
        self.points.iter().find(|p| p.name == name)
    }

    /// First point named `name` whose tags include every pair in `tags`.
    pub fn find_tagged(&self, name: &str, tags: &[(&str, &str)]) -> Option<&MetricPoint> {
        self.points
            .iter()
            .find(|p| p.name == name && tags.iter().all(|(k, v)| p.tag(k) == Some(*v)))
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        export::json::to_json(self, pretty)
    }

    /// Exact inverse of [`to_json`](Self::to_json) only for finite values; see
    /// [`export::json::from_json`].
    pub fn from_json(text: &str) -> Result<Self> {
        export::json::from_json(text)
    }

    pub fn to_open_telemetry_json_lines(&self) -> Result<Vec<String>> {
        export::otel::to_json_lines(self)
    }

    pub fn to_prometheus_lines(&self) -> Vec<String> {
        export::prometheus::to_lines(self)
    }

    pub fn to_prometheus_text(&self) -> String {
        export::prometheus::to_text(self)
    }
}

impl<'a> IntoIterator for &'a MetricsSnapshot {
    type Item = &'a MetricPoint;
    type IntoIter = std::slice::Iter<'a, MetricPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
