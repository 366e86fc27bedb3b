//! PS3 Update Collector
//!
//! Resolves noisy catalog entries to title IDs, fetches each title's update
//! manifest under a worker limit with retry, and merges the parsed update
//! records back onto every entry sharing the title.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CollectionReport, CollectorError, UpdateCollector};
pub use domain::{MergedEntry, RawEntry, TitleId, UpdateKind, UpdateRecord};
pub use infrastructure::config::AppConfig;
