pub mod api;
pub mod config;
pub mod error;
pub mod labels;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod query;
pub mod range;
pub mod timezone;

pub use error::{ConsoleError, Result};
pub use models::{DataPoint, HistogramBin, SavedGraph};
pub use query::{MetricsFilter, QueryConfig};
pub use range::{downsample_interval, range_to_millis, Range, RateUnit};
