//! Core screening logic and the abstractions over its data sources

pub mod cache;
pub mod config;
pub mod currency;
pub mod export;
pub mod instrument;
pub mod log;
pub mod metrics;
pub mod scan;
pub mod score;
pub mod screen;
pub mod universe;

// Re-export main types for cleaner imports
pub use cache::Cache;
pub use currency::CurrencyRateProvider;
pub use instrument::{FundamentalsProvider, InstrumentRecord};
pub use metrics::{Metric, MetricsRow};
pub use universe::IndexMembershipProvider;
