//! Prometheus text exposition lines (no `# TYPE`/`# HELP` headers).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::snapshot::{MetricPoint, MetricType, MetricsSnapshot};

pub fn to_lines(snapshot: &MetricsSnapshot) -> Vec<String> {
    let mut out = Vec::with_capacity(snapshot.len());
    for p in snapshot {
        write_point(p, &mut out);
    }
    out
}

/// Newline-terminated lines, ready to serve from a scrape endpoint.
pub fn to_text(snapshot: &MetricsSnapshot) -> String {
    let mut text = String::new();
    for line in to_lines(snapshot) {
        text.push_str(&line);
        text.push('\n');
    }
    text
}

fn write_point(p: &MetricPoint, out: &mut Vec<String>) {
    let name = sanitize_name(&p.name);
    let labels = render_labels(&p.tags);
    let line = |suffix: &str, value: &str| format!("{name}{suffix}{labels} {value}");

    match p.kind {
        MetricType::Counter => {
            if let Some(count) = p.count {
                out.push(line("", &count.to_string()));
            }
        }
        MetricType::Gauge => {
            if let Some(value) = p.value {
                out.push(line("", &format_float(value)));
            }
        }
        MetricType::Timer | MetricType::Summary => {
            if let Some(value) = p.value {
                out.push(line("", &format_float(value)));
            }
            if let Some(count) = p.count {
                out.push(line("_count", &count.to_string()));
            }
            if let Some(sum) = p.sum {
                out.push(line("_sum", &format_float(sum)));
            }
            if let Some(min) = p.min {
                out.push(line("_min", &format_float(min)));
            }
            if let Some(max) = p.max {
                out.push(line("_max", &format_float(max)));
            }
        }
        MetricType::LongTaskTimer => {
            if let Some(count) = p.count {
                out.push(line("_count", &count.to_string()));
            }
            if let Some(sum) = p.sum {
                out.push(line("_sum", &format_float(sum)));
            }
        }
        MetricType::Other => {
            if let Some(value) = p.value {
                out.push(line("", &format_float(value)));
            }
        }
    }
}

pub fn sanitize_name(name: &str) -> String {
    name.replace('.', "_")
}

/// `{k="v",...}` in key order, or empty when there are no tags.
fn render_labels(tags: &BTreeMap<String, String>) -> String {
    if tags.is_empty() {
        return String::new();
    }

    let mut out = String::from("{");
    for (i, (k, v)) in tags.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{k}=\"{}\"", escape_label_value(v));
    }
    out.push('}');
    out
}

fn escape_label_value(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for ch in v.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}
