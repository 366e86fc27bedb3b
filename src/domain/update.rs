//! Update records parsed out of a title's update manifest.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Package flavour listed by a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    /// Standard signed package (`<package>` node)
    #[serde(rename = "NPDRM")]
    Primary,
    /// Unlocked variant (`<url>` node)
    #[serde(rename = "DRM-Free")]
    Secondary,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("NPDRM"),
            Self::Secondary => f.write_str("DRM-Free"),
        }
    }
}

/// One downloadable update package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateRecord {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub version: Option<String>,
    pub url: String,
    pub sha1: Option<String>,
    pub size_bytes: Option<u64>,
    pub filename: String,
}

impl UpdateRecord {
    /// Builds a record; the filename is always derived from `url`.
    pub fn new(
        kind: UpdateKind,
        version: Option<String>,
        url: String,
        sha1: Option<String>,
        size_bytes: Option<u64>,
    ) -> Self {
        let filename = filename_from_url(&url);
        Self {
            kind,
            version,
            url,
            sha1,
            size_bytes,
            filename,
        }
    }
}

/// Last path segment of a download URL, ignoring query and fragment.
///
/// Relative or otherwise unparsable references fall back to the text after
/// the last `/`.
pub fn filename_from_url(reference: &str) -> String {
    if let Ok(parsed) = url::Url::parse(reference) {
        if let Some(last) = parsed.path_segments().and_then(|mut segments| segments.next_back()) {
            return last.to_string();
        }
        return String::new();
    }
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Parses a manifest size attribute. Only plain ASCII digit strings count.
///
/// A digit string past `u64::MAX` is reported as unknown (`None`).
pub fn parse_size(raw: Option<&str>) -> Option<u64> {
    let raw = raw?;
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match raw.parse() {
        Ok(size) => Some(size),
        Err(e) => {
            debug!("Manifest size {} out of range: {}", raw, e);
            None
        }
    }
}
