//! Sitemap document parsing.
//!
//! Handles both `<urlset>` sitemaps and `<sitemapindex>` files from the
//! Sitemaps protocol 0.9, plus the Google image extension. Anything in
//! another namespace (video, news, xhtml links) is skipped.

use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use tracing::debug;

use crate::error::ParseError;
use crate::record::{PageRecord, SitemapDocument};

pub const SITEMAP_NS: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";
pub const IMAGE_NS: &[u8] = b"http://www.google.com/schemas/sitemap-image/1.1";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    UrlSet,
    SitemapIndex,
    Url,
    Sitemap,
    Loc,
    LastMod,
    Image,
    ImageLoc,
    Other,
}

#[derive(Default)]
struct Entry {
    loc: Option<String>,
    lastmod: Option<String>,
    images: Vec<String>,
}

/// Parse one sitemap document.
pub fn parse(xml: &[u8]) -> Result<SitemapDocument, ParseError> {
    if xml.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(xml)
            .read_to_end(&mut inflated)
            .map_err(|e| ParseError::MalformedDocument(format!("invalid gzip stream: {e}")))?;
        return parse_xml(&inflated);
    }
    parse_xml(xml)
}

fn parse_xml(xml: &[u8]) -> Result<SitemapDocument, ParseError> {
    let mut reader = NsReader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Tag> = Vec::new();
    let mut root: Option<Tag> = None;
    let mut root_closed = false;

    let mut text = String::new();
    let mut entry = Entry::default();
    let mut image_loc: Option<String> = None;
    let mut entry_count = 0usize;

    let mut records = Vec::new();
    let mut children = Vec::new();

    loop {
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| ParseError::MalformedDocument(e.to_string()))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let parent = stack.last().copied();
                let tag = match parent {
                    None => {
                        if root_closed {
                            return Err(ParseError::MalformedDocument(
                                "multiple root elements".to_string(),
                            ));
                        }
                        let tag = classify_root(&ns, e.local_name().as_ref())?;
                        root = Some(tag);
                        tag
                    }
                    Some(parent) => classify(&ns, e.local_name().as_ref(), parent),
                };

                match tag {
                    Tag::Url | Tag::Sitemap => {
                        entry = Entry::default();
                        entry_count += 1;
                    }
                    Tag::Image => image_loc = None,
                    Tag::Loc | Tag::LastMod | Tag::ImageLoc => text.clear(),
                    _ => {}
                }

                if is_empty {
                    close(tag, &mut text, &mut entry, &mut image_loc);
                    finish_entry(tag, entry_count, &mut entry, &mut records, &mut children)?;
                    if stack.is_empty() {
                        root_closed = true;
                    }
                } else {
                    stack.push(tag);
                }
            }
            Event::End(_) => {
                // quick-xml already rejects mismatched end names
                let Some(tag) = stack.pop() else {
                    return Err(ParseError::MalformedDocument(
                        "unexpected closing tag".to_string(),
                    ));
                };
                close(tag, &mut text, &mut entry, &mut image_loc);
                finish_entry(tag, entry_count, &mut entry, &mut records, &mut children)?;
                if stack.is_empty() {
                    root_closed = true;
                }
            }
            Event::Text(ref e) => {
                if stack.is_empty() {
                    return Err(ParseError::MalformedDocument(
                        "text outside of the root element".to_string(),
                    ));
                }
                if collects_text(stack.last().copied()) {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| ParseError::MalformedDocument(err.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(ref e) => {
                if collects_text(stack.last().copied()) {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::MalformedDocument(format!(
            "unexpected end of document, {} element(s) left open",
            stack.len()
        )));
    }

    match root {
        Some(Tag::UrlSet) => {
            debug!("Parsed urlset with {} records", records.len());
            Ok(SitemapDocument::UrlSet(records))
        }
        Some(Tag::SitemapIndex) => {
            debug!("Parsed sitemap index with {} children", children.len());
            Ok(SitemapDocument::Index(children))
        }
        _ => Err(ParseError::MalformedDocument(
            "document has no root element".to_string(),
        )),
    }
}

fn in_sitemap_ns(ns: &ResolveResult) -> bool {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => *uri == SITEMAP_NS,
        // Plenty of real sitemaps omit the xmlns declaration entirely
        ResolveResult::Unbound => true,
        ResolveResult::Unknown(_) => false,
    }
}

fn in_image_ns(ns: &ResolveResult) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == IMAGE_NS)
}

fn classify_root(ns: &ResolveResult, local: &[u8]) -> Result<Tag, ParseError> {
    match local {
        b"urlset" if in_sitemap_ns(ns) => Ok(Tag::UrlSet),
        b"sitemapindex" if in_sitemap_ns(ns) => Ok(Tag::SitemapIndex),
        _ => Err(ParseError::MalformedDocument(format!(
            "unrecognized root element <{}>",
            String::from_utf8_lossy(local)
        ))),
    }
}

fn classify(ns: &ResolveResult, local: &[u8], parent: Tag) -> Tag {
    match (parent, local) {
        (Tag::UrlSet, b"url") if in_sitemap_ns(ns) => Tag::Url,
        (Tag::SitemapIndex, b"sitemap") if in_sitemap_ns(ns) => Tag::Sitemap,
        (Tag::Url | Tag::Sitemap, b"loc") if in_sitemap_ns(ns) => Tag::Loc,
        (Tag::Url, b"lastmod") if in_sitemap_ns(ns) => Tag::LastMod,
        (Tag::Url, b"image") if in_image_ns(ns) => Tag::Image,
        (Tag::Image, b"loc") if in_image_ns(ns) => Tag::ImageLoc,
        _ => Tag::Other,
    }
}

fn collects_text(tag: Option<Tag>) -> bool {
    matches!(tag, Some(Tag::Loc | Tag::LastMod | Tag::ImageLoc))
}

fn close(tag: Tag, text: &mut String, entry: &mut Entry, image_loc: &mut Option<String>) {
    match tag {
        Tag::Loc => {
            if entry.loc.is_none() {
                entry.loc = non_empty(text);
            }
        }
        Tag::LastMod => entry.lastmod = non_empty(text),
        Tag::ImageLoc => {
            if image_loc.is_none() {
                *image_loc = non_empty(text);
            }
        }
        Tag::Image => {
            if let Some(loc) = image_loc.take() {
                entry.images.push(loc);
            }
        }
        _ => {}
    }
}

fn finish_entry(
    tag: Tag,
    position: usize,
    entry: &mut Entry,
    records: &mut Vec<PageRecord>,
    children: &mut Vec<String>,
) -> Result<(), ParseError> {
    match tag {
        Tag::Url => {
            let entry = std::mem::take(entry);
            let url = entry.loc.ok_or_else(|| {
                ParseError::MalformedRecord(format!("<url> #{position} has no <loc>"))
            })?;
            let lastmod = entry.lastmod.as_deref().and_then(parse_lastmod);
            records.push(
                PageRecord::new(url)
                    .with_lastmod(lastmod)
                    .with_images(entry.images),
            );
        }
        Tag::Sitemap => {
            let entry = std::mem::take(entry);
            let loc = entry.loc.ok_or_else(|| {
                ParseError::MalformedRecord(format!("<sitemap> #{position} has no <loc>"))
            })?;
            children.push(loc);
        }
        _ => {}
    }
    Ok(())
}

fn non_empty(text: &mut String) -> Option<String> {
    let value = text.trim().to_string();
    text.clear();
    if value.is_empty() { None } else { Some(value) }
}

/// Parse a `<lastmod>` value into a timezone-naive timestamp.
///
/// Accepts the W3C datetime profile of ISO 8601 (`YYYY`, `YYYY-MM`,
/// `YYYY-MM-DD`, date-times with or without seconds and fraction) and the
/// common space-separated variant. Offsets are converted to UTC and then
/// dropped, so values from different zones compare on the same clock.
pub fn parse_lastmod(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let normalized = match value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        Some(rest) => format!("{rest}+00:00"),
        None => value.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.naive_utc());
    }

    const OFFSET_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M%:z",
    ];
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Some(dt.naive_utc());
        }
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    // Reduced precision forms: YYYY-MM and YYYY
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
        let year: i32 = value.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0);
    }

    None
}
