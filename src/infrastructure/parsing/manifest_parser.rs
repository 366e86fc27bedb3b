//! Title update manifest parser
//!
//! A manifest is a small XML document listing `<package>` elements (primary
//! updates) and, on some titles, `<url>` elements (the unlocked variant).
//! Anything that is not well-formed yields no records at all.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use super::{ParsingError, ParsingResult};
use crate::domain::update::{parse_size, UpdateKind, UpdateRecord};

const PACKAGE_TAG: &[u8] = b"package";
const URL_TAG: &[u8] = b"url";

/// Attributes of one `<url>` element, kept until every package version is known
struct SecondaryNode {
    url: Option<String>,
    sha1: Option<String>,
    size: Option<String>,
}

/// Parse a manifest payload into update records.
///
/// Primary records come first in document order, then secondary records.
/// Malformed or truncated input returns an empty list.
pub fn parse_manifest(payload: &[u8]) -> Vec<UpdateRecord> {
    match try_parse_manifest(payload) {
        Ok(records) => records,
        Err(e) => {
            debug!("Discarding manifest: {}", e);
            Vec::new()
        }
    }
}

/// Same as [`parse_manifest`] but reports why a document was rejected.
pub fn try_parse_manifest(payload: &[u8]) -> ParsingResult<Vec<UpdateRecord>> {
    let mut reader = Reader::from_reader(payload);

    let mut primary: Vec<UpdateRecord> = Vec::new();
    let mut versions: Vec<String> = Vec::new();
    let mut secondary_nodes: Vec<SecondaryNode> = Vec::new();

    let mut depth: usize = 0;
    let mut root_seen = false;

    loop {
        let event = reader.read_event().map_err(ParsingError::malformed)?;
        match event {
            Event::Start(element) => {
                enter_element(&mut depth, &mut root_seen)?;
                visit(&element, &mut primary, &mut versions, &mut secondary_nodes)?;
                depth += 1;
            }
            Event::Empty(element) => {
                enter_element(&mut depth, &mut root_seen)?;
                visit(&element, &mut primary, &mut versions, &mut secondary_nodes)?;
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ParsingError::malformed("unmatched closing tag"))?;
            }
            Event::Text(text) if depth == 0 && !text.iter().all(u8::is_ascii_whitespace) => {
                return Err(ParsingError::malformed("text outside the root element"));
            }
            Event::CData(_) if depth == 0 => {
                return Err(ParsingError::malformed("CDATA outside the root element"));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParsingError::TruncatedDocument { depth });
    }
    if !root_seen {
        return Err(ParsingError::EmptyDocument);
    }

    // 보조 레코드는 url 노드 순번과 같은 위치의 패키지 버전을 사용
    let secondary = secondary_nodes
        .into_iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let url = node.url?;
            Some(UpdateRecord::new(
                UpdateKind::Secondary,
                versions.get(index).cloned(),
                url,
                node.sha1,
                parse_size(node.size.as_deref()),
            ))
        });

    primary.extend(secondary);
    Ok(primary)
}

fn enter_element(depth: &mut usize, root_seen: &mut bool) -> ParsingResult<()> {
    if *depth == 0 {
        if *root_seen {
            return Err(ParsingError::TrailingContent);
        }
        *root_seen = true;
    }
    Ok(())
}

fn visit(
    element: &BytesStart<'_>,
    primary: &mut Vec<UpdateRecord>,
    versions: &mut Vec<String>,
    secondary_nodes: &mut Vec<SecondaryNode>,
) -> ParsingResult<()> {
    match element.name().as_ref() {
        PACKAGE_TAG => {
            let version = attribute(element, "version")?;
            if let Some(v) = &version {
                versions.push(v.clone());
            }
            if let Some(url) = attribute(element, "url")? {
                let size = attribute(element, "size")?;
                primary.push(UpdateRecord::new(
                    UpdateKind::Primary,
                    version,
                    url,
                    attribute(element, "sha1sum")?,
                    parse_size(size.as_deref()),
                ));
            }
        }
        URL_TAG => secondary_nodes.push(SecondaryNode {
            url: attribute(element, "url")?,
            sha1: attribute(element, "sha1sum")?,
            size: attribute(element, "size")?,
        }),
        _ => {}
    }
    Ok(())
}

/// Unescaped attribute value; missing and empty values are both `None`.
fn attribute(element: &BytesStart<'_>, name: &str) -> ParsingResult<Option<String>> {
    let Some(attr) = element
        .try_get_attribute(name)
        .map_err(ParsingError::malformed)?
    else {
        return Ok(None);
    };
    let value = attr.unescape_value().map_err(ParsingError::malformed)?;
    Ok(Some(value.into_owned()).filter(|v| !v.is_empty()))
}
