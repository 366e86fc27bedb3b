//! Domain module - title IDs, catalog entries and update records
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod catalog;
pub mod identifier;
pub mod update;

pub use catalog::{MergedEntry, RawEntry};
pub use identifier::{is_valid_title_id, scan_title_ids, InvalidTitleId, TitleId};
pub use update::{UpdateKind, UpdateRecord};
