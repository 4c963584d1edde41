//! OpenTelemetry-shaped JSON, one self-contained document per point.
//!
//! No clock is read here: `startTimeUnixNano` and `timeUnixNano` are always `"0"`
//! and callers that need real timestamps must stamp documents themselves.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::snapshot::{MetricPoint, MetricType, MetricsSnapshot};

const UNSET_TIME: &str = "0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Metric<'a> {
    name: &'a str,
    #[serde(flatten)]
    data: Data<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Data<'a> {
    Sum(Sum<'a>),
    Gauge(Gauge<'a>),
    Summary(Summary<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sum<'a> {
    data_points: [NumberDataPoint<'a>; 1],
    aggregation_temporality: &'static str,
    is_monotonic: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Gauge<'a> {
    data_points: [NumberDataPoint<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    data_points: [SummaryDataPoint<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NumberDataPoint<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<KeyValue<'a>>,
    start_time_unix_nano: &'static str,
    time_unix_nano: &'static str,
    // int64 is a decimal string in OTLP/JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    as_int: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    as_double: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDataPoint<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<KeyValue<'a>>,
    start_time_unix_nano: &'static str,
    time_unix_nano: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
}

#[derive(Debug, Serialize)]
struct KeyValue<'a> {
    key: &'a str,
    value: AnyValue<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnyValue<'a> {
    string_value: &'a str,
}

fn attributes(tags: &BTreeMap<String, String>) -> Vec<KeyValue<'_>> {
    tags.iter()
        .map(|(k, v)| KeyValue {
            key: k,
            value: AnyValue { string_value: v },
        })
        .collect()
}

fn number_point(
    p: &MetricPoint,
    as_int: Option<String>,
    as_double: Option<f64>,
) -> NumberDataPoint<'_> {
    NumberDataPoint {
        attributes: attributes(&p.tags),
        start_time_unix_nano: UNSET_TIME,
        time_unix_nano: UNSET_TIME,
        as_int,
        as_double,
    }
}

fn metric(p: &MetricPoint) -> Metric<'_> {
    let data = match p.kind {
        MetricType::Counter => Data::Sum(Sum {
            data_points: [number_point(p, p.count.map(|c| c.to_string()), None)],
            aggregation_temporality: "CUMULATIVE",
            is_monotonic: true,
        }),
        MetricType::Gauge => Data::Gauge(Gauge {
            data_points: [number_point(p, None, p.value)],
        }),
        MetricType::Timer | MetricType::Summary | MetricType::LongTaskTimer | MetricType::Other => {
            Data::Summary(Summary {
                data_points: [SummaryDataPoint {
                    attributes: attributes(&p.tags),
                    start_time_unix_nano: UNSET_TIME,
                    time_unix_nano: UNSET_TIME,
                    value: p.value,
                    count: p.count.map(|c| c.to_string()),
                    sum: p.sum,
                    min: p.min,
                    max: p.max,
                }],
            })
        }
    };

    Metric { name: &p.name, data }
}

pub fn to_json_lines(snapshot: &MetricsSnapshot) -> Result<Vec<String>> {
    snapshot
        .points
        .iter()
        .map(|p| -> Result<String> { Ok(serde_json::to_string(&metric(p))?) })
        .collect()
}
