pub mod client;
pub mod search;

pub use client::ConsoleClient;
pub use search::{Debouncer, MetricSearch};
