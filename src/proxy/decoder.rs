//! Post-processing of downstream response bodies.

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::proxy::types::Payload;

/// Time-series forecast returned by the `/ts` service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResult {
    pub datas: Vec<String>,
    pub values: Vec<f64>,
    pub futures: Vec<String>,
    pub predictions: Vec<f64>,
}

/// Decoder applied to a fully-read response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decoder {
    /// Pass the bytes through unchanged.
    #[default]
    Raw,
    /// Parse a `TimeSeriesResult`.
    TimeSeries,
}

impl Decoder {
    /// Decode `body` into a payload. The error is a human-readable cause.
    pub fn decode(self, body: Bytes) -> Result<Payload, String> {
        match self {
            Decoder::Raw => Ok(Payload::Binary(body)),
            Decoder::TimeSeries => {
                let series: TimeSeriesResult = serde_json::from_slice(&body)
                    .map_err(|e| format!("can not unmarshal time-series: {e}"))?;
                serde_json::to_value(series)
                    .map(Payload::Structured)
                    .map_err(|e| format!("can not re-encode time-series: {e}"))
            }
        }
    }
}
