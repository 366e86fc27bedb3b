//! Parsing error types for manifest and catalog extraction
//!
//! Manifest errors never escape the parser boundary (a bad manifest is an
//! empty update list); catalog errors are logged per page by the scraper.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Malformed XML: {message}")]
    MalformedXml { message: String },

    #[error("XML document ended with {depth} unclosed element(s)")]
    TruncatedDocument { depth: usize },

    #[error("XML document has no root element")]
    EmptyDocument,

    #[error("XML document has content after the root element")]
    TrailingContent,

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No catalog table found on page {page}")]
    TableNotFound { page: u32 },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },
}

impl ParsingError {
    pub fn malformed(message: impl ToString) -> Self {
        Self::MalformedXml {
            message: message.to_string(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for parsing operations
pub type ParsingResult<T> = Result<T, ParsingError>;
