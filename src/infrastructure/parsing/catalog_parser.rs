//! Catalog listing page parser
//!
//! Locates the main table on a listing page, maps its header row to column
//! indexes and turns every data row into a [`RawEntry`].

use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::config::{CatalogSelectors, ParsingConfig};
use super::{ContextualParser, ParseContext, ParsingError, ParsingResult};
use crate::domain::catalog::{fields, RawEntry};

/// Text columns copied onto each entry: (header as displayed, field name)
const TEXT_COLUMNS: [(&str, &str); 11] = [
    ("EX", fields::EX),
    ("ID", fields::ID),
    ("REGION", fields::REGION),
    ("TITLE", fields::TITLE),
    ("FOLDER", fields::FOLDER),
    ("DISC ID", fields::DISC_ID),
    ("RELEASED", fields::RELEASED),
    ("STREET", fields::STREET),
    ("NUKE", fields::NUKE),
    ("SIZE", fields::SIZE),
    ("TYPE", fields::TYPE),
];

const NFO_HEADER: &str = "NFO";

/// Parser for catalog listing pages
pub struct CatalogParser {
    expected_headers: Vec<String>,
    table: Selector,
    row: Selector,
    header_cell: Selector,
    data_cell: Selector,
    any_cell: Selector,
    link: Selector,
}

impl CatalogParser {
    /// Create a new catalog parser with default selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> ParsingResult<Self> {
        let CatalogSelectors {
            table,
            row,
            header_cell,
            data_cell,
            any_cell,
            link,
        } = &config.selectors;

        Ok(Self {
            expected_headers: config.expected_headers.iter().map(|h| normalize_header(h)).collect(),
            table: compile(table)?,
            row: compile(row)?,
            header_cell: compile(header_cell)?,
            data_cell: compile(data_cell)?,
            any_cell: compile(any_cell)?,
            link: compile(link)?,
        })
    }

    /// Parse raw page HTML
    pub fn parse_page(&self, html: &str, context: &ParseContext) -> ParsingResult<Vec<RawEntry>> {
        let document = Html::parse_document(html);
        self.parse_with_context(&document, context)
    }

    /// The table whose header row lists every expected header, else the one with most rows.
    fn find_main_table<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let tables: Vec<ElementRef<'a>> = document.select(&self.table).collect();

        if let Some(table) = tables.iter().copied().find(|table| {
            let headers = self.table_headers(*table);
            !headers.is_empty() && self.expected_headers.iter().all(|h| headers.contains(h))
        }) {
            return Some(table);
        }

        // 첫 번째 최대값 유지
        let mut largest: Option<(usize, ElementRef<'a>)> = None;
        for table in tables {
            let rows = table.select(&self.row).count();
            if largest.map_or(true, |(best, _)| rows > best) {
                largest = Some((rows, table));
            }
        }
        if largest.is_some() {
            debug!("No table carries the expected headers, using the largest one");
        }
        largest.map(|(_, table)| table)
    }

    /// `th` texts, or the first row's `td` texts when the table has no `th`
    fn table_headers(&self, table: ElementRef<'_>) -> Vec<String> {
        let headers: Vec<String> = table
            .select(&self.header_cell)
            .map(|cell| normalize_header(&cell_text(cell)))
            .collect();
        if !headers.is_empty() {
            return headers;
        }
        table
            .select(&self.row)
            .next()
            .map(|first| {
                first
                    .select(&self.data_cell)
                    .map(|cell| normalize_header(&cell_text(cell)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn first_link(&self, cell: ElementRef<'_>, context: &ParseContext) -> Option<String> {
        cell.select(&self.link)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve(href, context))
    }

    fn row_links(&self, cells: &[ElementRef<'_>], context: &ParseContext) -> Vec<String> {
        cells
            .iter()
            .flat_map(|cell| cell.select(&self.link))
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve(href, context))
            .collect()
    }
}

impl ContextualParser for CatalogParser {
    type Output = Vec<RawEntry>;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        let table = self
            .find_main_table(html)
            .ok_or(ParsingError::TableNotFound { page: context.page })?;

        let rows: Vec<ElementRef<'_>> = table.select(&self.row).collect();
        let Some(header_row) = rows
            .iter()
            .copied()
            .find(|tr| tr.select(&self.header_cell).next().is_some())
            .or_else(|| rows.first().copied())
        else {
            return Ok(Vec::new());
        };

        let mut columns: HashMap<String, usize> = HashMap::new();
        for (index, cell) in header_row.select(&self.any_cell).enumerate() {
            columns.entry(normalize_header(&cell_text(cell))).or_insert(index);
        }

        let mut entries = Vec::new();
        for tr in rows.iter().copied().filter(|tr| *tr != header_row) {
            let cells: Vec<ElementRef<'_>> = tr.select(&self.data_cell).collect();
            if cells.is_empty() {
                continue;
            }
            let cell_for = |header: &str| columns.get(header).and_then(|&i| cells.get(i)).copied();

            let mut values = BTreeMap::new();
            for (header, field) in TEXT_COLUMNS {
                let text = cell_for(header).map(cell_text).unwrap_or_default();
                let text = if field == fields::DISC_ID {
                    text.to_uppercase()
                } else {
                    text
                };
                values.insert(field.to_string(), text);
            }

            let nfo = cell_for(NFO_HEADER).and_then(|cell| self.first_link(cell, context));
            entries.push(RawEntry::new(values, nfo, self.row_links(&cells, context)));
        }

        debug!("Parsed {} catalog rows from page {}", entries.len(), context.page);
        Ok(entries)
    }
}

fn compile(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e))
}

/// Stripped text pieces of a cell, concatenated
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).filter(|piece| !piece.is_empty()).collect()
}

fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn resolve(href: &str, context: &ParseContext) -> Option<String> {
    let resolved = context.resolve_link(href);
    if resolved.is_none() {
        warn!("Skipping unresolvable link '{}' on page {}", href, context.page);
    }
    resolved.map(String::from)
}
