//! Selector and header configuration for catalog table extraction

use serde::{Deserialize, Serialize};

/// Column headers a catalog table is expected to carry, in display form
pub const EXPECTED_HEADERS: [&str; 12] = [
    "EX", "ID", "REGION", "TITLE", "FOLDER", "DISC ID", "NFO", "RELEASED", "STREET", "NUKE",
    "SIZE", "TYPE",
];

/// Catalog table parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingConfig {
    /// A table is the main one when its header row holds all of these
    pub expected_headers: Vec<String>,

    pub selectors: CatalogSelectors,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            expected_headers: EXPECTED_HEADERS.iter().map(|h| (*h).to_string()).collect(),
            selectors: CatalogSelectors::default(),
        }
    }
}

/// CSS selectors for catalog listing pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSelectors {
    pub table: String,
    pub row: String,
    pub header_cell: String,
    pub data_cell: String,
    /// Header row cells when the table has no `th`
    pub any_cell: String,
    pub link: String,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            table: "table".to_string(),
            row: "tr".to_string(),
            header_cell: "th".to_string(),
            data_cell: "td".to_string(),
            any_cell: "th, td".to_string(),
            link: "a[href]".to_string(),
        }
    }
}
