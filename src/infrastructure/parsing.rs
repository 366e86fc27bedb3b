//! Parsing infrastructure for update manifests and catalog listing pages

pub mod catalog_parser;
pub mod config;
pub mod context;
pub mod error;
pub mod manifest_parser;

// Re-export public types
pub use catalog_parser::CatalogParser;
pub use config::ParsingConfig;
pub use context::ParseContext;
pub use error::{ParsingError, ParsingResult};
pub use manifest_parser::{parse_manifest, try_parse_manifest};

use scraper::Html;

/// HTML parser trait with context support
pub trait ContextualParser {
    type Output;
    type Context;

    /// Parse HTML with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}
