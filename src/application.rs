//! Application layer module
//!
//! Orchestrates title resolution, manifest fetching and the final merge.

pub mod aggregator;
pub mod collector;
pub mod resolver;
pub mod scheduler;

pub use aggregator::{dedup_exact, merge, TitleGroups};
pub use collector::{CollectionReport, CollectorError, UpdateCollector};
pub use resolver::{ResolutionSource, ResolutionStats, TitleIdResolver};
pub use scheduler::{FetchOutcome, FetchProgress, FetchScheduler, OutcomeClass, StatusCounts};
