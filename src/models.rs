use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One downsampled bin as returned by the graph endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Epoch milliseconds, UTC.
    pub timestamp: i64,
    #[serde(default)]
    pub samples: u64,
    /// Metric value fields (`count`, `mean`, `m1Rate`, ...).
    #[serde(flatten)]
    pub values: Map<String, Value>,
    /// Display instant. Derived per render, never sent back.
    #[serde(skip)]
    pub date: Option<DateTime<Utc>>,
}

impl DataPoint {
    pub fn new(timestamp: i64, samples: u64) -> Self {
        Self {
            timestamp,
            samples,
            values: Map::new(),
            date: None,
        }
    }

    pub fn with_value(mut self, field: &str, value: f64) -> Self {
        self.values.insert(field.to_string(), Value::from(value));
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub percentile: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistogramResponse {
    #[serde(default)]
    pub bin: Vec<HistogramBin>,
}

/// A graph stored through the save-graph endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedGraph {
    pub id: String,
    pub location: String,
}
