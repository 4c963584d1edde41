use crate::key::MeterKey;
use crate::metrics::MeterKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("meter `{key}` is registered as a {registered}, not a {requested}")]
    KindMismatch {
        key: MeterKey,
        registered: MeterKind,
        requested: MeterKind,
    },

    #[error("percentile {0} is outside (0, 1]")]
    InvalidPercentile(f64),

    #[error("backend registration failed: {0}")]
    Backend(String),

    #[error("failed to translate backend meter `{name}`: {reason}")]
    Translation { name: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
