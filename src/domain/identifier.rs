//! # Title Identifier Value Object
//!
//! Canonical title IDs (`BLUS30443`, `NPEB00123`, ...) are the only join key
//! between catalog rows and update manifests. A title ID is exactly four
//! uppercase ASCII letters followed by five ASCII digits.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Length of a canonical title ID (4 letters + 5 digits)
pub const TITLE_ID_LEN: usize = 9;

static TITLE_ID_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z]{4}[0-9]{5})\b").expect("static title id pattern")
});

/// Validated title identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TitleId(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a title ID (expected 4 letters followed by 5 digits)")]
pub struct InvalidTitleId(pub String);

/// `true` iff `s` is exactly 4 uppercase ASCII letters followed by 5 ASCII digits.
#[must_use]
pub fn is_valid_title_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == TITLE_ID_LEN
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4..].iter().all(u8::is_ascii_digit)
}

impl TitleId {
    /// Accepts an already-canonical ID without touching it.
    pub fn parse(s: &str) -> Result<Self, InvalidTitleId> {
        if is_valid_title_id(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidTitleId(s.to_string()))
        }
    }

    /// Normalizes a declared ID as catalogs write it (`" bces-98765 "`,
    /// `"BLUS 30443"`) and validates the result.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        Self::parse(&cleaned).ok()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Four-letter region/publisher prefix (`BLUS`, `BCES`, ...)
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..4]
    }
}

impl TryFrom<String> for TitleId {
    type Error = InvalidTitleId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_title_id(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidTitleId(value))
        }
    }
}

impl From<TitleId> for String {
    fn from(id: TitleId) -> Self {
        id.0
    }
}

impl AsRef<str> for TitleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scans free text for word-bounded title IDs.
///
/// The text is upper-cased first, so `blus30443` inside an NFO still counts.
/// Results are de-duplicated and keep their first-seen order.
#[must_use]
pub fn scan_title_ids(text: &str) -> Vec<TitleId> {
    if text.is_empty() {
        return Vec::new();
    }
    let upper = text.to_uppercase();
    let mut seen = HashSet::new();
    TITLE_ID_IN_TEXT
        .captures_iter(&upper)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|candidate| seen.insert(*candidate))
        .filter_map(|candidate| TitleId::parse(candidate).ok())
        .collect()
}
