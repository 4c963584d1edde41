use crate::error::Result;
use crate::snapshot::MetricsSnapshot;

/// `{"points":[...]}`; `pretty` only changes whitespace.
///
/// Non-finite floats have no JSON representation and are written as `null`.
pub fn to_json(snapshot: &MetricsSnapshot, pretty: bool) -> Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(snapshot)?
    } else {
        serde_json::to_string(snapshot)?
    };
    Ok(out)
}

/// Parses the output of [`to_json`].
///
/// The round trip is exact only for finite values. A non-finite float was written as
/// `null` and comes back as `None`, and a `type` this crate does not know parses as
/// [`MetricType::Other`](crate::snapshot::MetricType::Other) and is re-emitted as `"other"`.
pub fn from_json(text: &str) -> Result<MetricsSnapshot> {
    Ok(serde_json::from_str(text)?)
}
