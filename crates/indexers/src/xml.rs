//! Torznab RSS/XML response parsing.
//!
//! The teacher's own RSS parser (`radarr-core`'s `rss.rs`) is an ad-hoc
//! regex scraper that cannot reliably pull `<torznab:attr name="..."
//! value="...">` elements out of an arbitrarily-ordered XML tree. Torznab
//! responses need a real XML reader, so this module uses `quick-xml`
//! instead, in `serialize`/event-reader mode.

use chrono::{DateTime, Utc};
use cross_seed_core::{Candidate, CrossSeedError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

#[derive(Debug, Default)]
struct RawItem {
    title: Option<String>,
    guid: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    size: Option<u64>,
    info_hash: Option<String>,
    seeders: Option<i64>,
    category: Vec<i64>,
}

/// Parse a Torznab `<rss><channel>[<item>...]` search response body.
pub fn parse_search_response(body: &str, indexer_id: i64, indexer_name: &str) -> Result<Vec<Candidate>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut candidates = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut in_tag: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "item" {
                    current = Some(RawItem::default());
                } else if name == "torznab:attr" || name == "attr" {
                    if let Some(item) = current.as_mut() {
                        apply_torznab_attr(&e, item);
                    }
                } else {
                    in_tag = Some(name.to_string());
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "torznab:attr" || name == "attr" {
                    if let Some(item) = current.as_mut() {
                        apply_torznab_attr(&e, item);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(tag), Some(item)) = (in_tag.as_deref(), current.as_mut()) {
                    let text = t.unescape().unwrap_or_default().into_owned();
                    match tag {
                        "title" => item.title = Some(text),
                        "guid" => item.guid = Some(text),
                        "link" | "enclosure" => item.link = Some(text),
                        "pubDate" => item.pub_date = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "item" {
                    if let Some(item) = current.take() {
                        candidates.push(into_candidate(item, indexer_id, indexer_name));
                    }
                }
                in_tag = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CrossSeedError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(candidates)
}

fn local_name(raw: &[u8]) -> String {
    let s = std::str::from_utf8(raw).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s).to_string()
}

fn apply_torznab_attr(e: &quick_xml::events::BytesStart, item: &mut RawItem) {
    let mut attr_name = None;
    let mut attr_value = None;
    for attr in e.attributes().flatten() {
        let key = local_name(attr.key.as_ref());
        let value = attr.unescape_value().unwrap_or_default().into_owned();
        match key.as_str() {
            "name" => attr_name = Some(value),
            "value" => attr_value = Some(value),
            _ => {}
        }
    }
    if let (Some(name), Some(value)) = (attr_name, attr_value) {
        match name.as_str() {
            "size" => item.size = value.parse().ok(),
            "infohash" => item.info_hash = Some(value.to_lowercase()),
            "seeders" => item.seeders = value.parse().ok(),
            "category" => {
                if let Ok(c) = value.parse() {
                    item.category.push(c);
                }
            }
            _ => {}
        }
    }
}

fn into_candidate(item: RawItem, indexer_id: i64, indexer_name: &str) -> Candidate {
    Candidate {
        indexer_id,
        indexer_name: indexer_name.to_string(),
        guid: item.guid.clone().unwrap_or_else(|| item.link.clone().unwrap_or_default()),
        name: item.title.unwrap_or_default(),
        size: item.size.unwrap_or(0),
        link: item.link.unwrap_or_default(),
        pub_date: item
            .pub_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
            .map(|d| d.with_timezone(&Utc)),
        info_hash: item.info_hash,
        seeders: item.seeders,
        category: item.category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <item>
      <title>Show.Name.S01.1080p-GRP</title>
      <guid>https://indexer.example/details/123</guid>
      <link>https://indexer.example/download/123</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <torznab:attr name="size" value="2048"/>
      <torznab:attr name="infohash" value="ABCDEF0123456789"/>
      <torznab:attr name="seeders" value="12"/>
      <torznab:attr name="category" value="5000"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_torznab_attrs() {
        let candidates = parse_search_response(SAMPLE, 1, "indexer1").unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.name, "Show.Name.S01.1080p-GRP");
        assert_eq!(c.size, 2048);
        assert_eq!(c.info_hash.as_deref(), Some("abcdef0123456789"));
        assert_eq!(c.seeders, Some(12));
        assert_eq!(c.category, vec![5000]);
    }

    #[test]
    fn empty_channel_yields_no_candidates() {
        let body = r#"<rss><channel></channel></rss>"#;
        let candidates = parse_search_response(body, 1, "indexer1").unwrap();
        assert!(candidates.is_empty());
    }
}
