//! Catalog entries as scraped, and the same entries enriched with updates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::identifier::TitleId;
use super::update::UpdateRecord;

/// Field names produced by the catalog table extractor
pub mod fields {
    pub const EX: &str = "EX";
    pub const ID: &str = "ID";
    pub const REGION: &str = "REGION";
    pub const TITLE: &str = "TITLE";
    pub const FOLDER: &str = "FOLDER";
    pub const DISC_ID: &str = "DISC_ID";
    pub const RELEASED: &str = "RELEASED";
    pub const STREET: &str = "STREET";
    pub const NUKE: &str = "NUKE";
    pub const SIZE: &str = "SIZE";
    pub const TYPE: &str = "TYPE";
}

/// One catalog row. Immutable once built; the identifier may be missing or junk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Plain text columns keyed by field name
    #[serde(flatten)]
    fields: BTreeMap<String, String>,
    /// Primary supplemental link (the NFO page)
    #[serde(rename = "NFO", default)]
    nfo: Option<String>,
    /// Every other link found on the row
    #[serde(rename = "ROW_LINKS", default)]
    row_links: Vec<String>,
}

impl RawEntry {
    pub fn new(fields: BTreeMap<String, String>, nfo: Option<String>, row_links: Vec<String>) -> Self {
        Self {
            fields,
            nfo,
            row_links,
        }
    }

    /// Convenience constructor for catalogs that only carry text columns.
    pub fn from_fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_nfo(mut self, nfo: impl Into<String>) -> Self {
        self.nfo = Some(nfo.into());
        self
    }

    #[must_use]
    pub fn with_row_links(mut self, links: Vec<String>) -> Self {
        self.row_links = links;
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn declared_id(&self) -> Option<&str> {
        self.field(fields::DISC_ID)
    }

    pub fn nfo(&self) -> Option<&str> {
        self.nfo.as_deref()
    }

    pub fn row_links(&self) -> &[String] {
        &self.row_links
    }

    pub fn has_links(&self) -> bool {
        self.nfo.is_some() || !self.row_links.is_empty()
    }

    /// Supplemental links in lookup order: NFO first, then row links not seen yet.
    pub fn supplemental_links(&self) -> Vec<&str> {
        let mut links: Vec<&str> = Vec::with_capacity(self.row_links.len() + 1);
        if let Some(nfo) = self.nfo.as_deref() {
            links.push(nfo);
        }
        for link in &self.row_links {
            if !links.contains(&link.as_str()) {
                links.push(link);
            }
        }
        links
    }

    /// Human-facing name: first non-blank of TITLE, FOLDER, DISC_ID.
    pub fn display_title(&self) -> &str {
        [fields::TITLE, fields::FOLDER, fields::DISC_ID]
            .iter()
            .filter_map(|name| self.field(name))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }
}

/// A catalog row plus the update list of the title it resolved to.
///
/// Serializes as the original catalog fields with an extra `updates` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
    #[serde(skip)]
    pub title_id: Option<TitleId>,
    #[serde(flatten)]
    pub entry: RawEntry,
    pub updates: Vec<UpdateRecord>,
}

impl MergedEntry {
    pub fn new(title_id: TitleId, entry: RawEntry, updates: Vec<UpdateRecord>) -> Self {
        Self {
            title_id: Some(title_id),
            entry,
            updates,
        }
    }
}
