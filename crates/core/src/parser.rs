//! Release name parsing: extracts title, year, season/episode, resolution,
//! release group, and repack/proper flags from a free-form release name.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Movie,
    Episode,
    Season,
    Anime,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub title: String,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub resolution: Option<String>,
    pub release_group: Option<String>,
    pub repack: bool,
    pub proper: bool,
    pub media_type: MediaType,
}

fn season_episode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bS(\d{1,2})(?:E(\d{1,3}))?\b").unwrap())
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap())
}

fn resolution_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(480p|576p|720p|1080p|1080i|2160p|4320p)\b").unwrap())
}

fn group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-([A-Za-z0-9]+)$").unwrap())
}

fn anime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\[([^\]]+)\]\s*(.+?)\s*-\s*(\d{1,4})\b").unwrap())
}

fn clean_separators(s: &str) -> String {
    s.replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a release name. Deterministic and idempotent: re-parsing the
/// extracted `title` reproduces the same title.
pub fn parse_release_name(name: &str) -> ParsedName {
    let repack = Regex::new(r"(?i)\brepack\b").unwrap().is_match(name);
    let proper = Regex::new(r"(?i)\bproper\b").unwrap().is_match(name);

    let resolution = resolution_re()
        .captures(name)
        .map(|c| c[1].to_lowercase());

    let release_group = group_re()
        .captures(name)
        .map(|c| c[1].to_string())
        .filter(|g| !g.eq_ignore_ascii_case("repack") && !g.eq_ignore_ascii_case("proper"));

    if let Some(caps) = anime_re().captures(name) {
        let title = clean_separators(&caps[2]);
        return ParsedName {
            title,
            year: year_re().captures(name).and_then(|c| c[1].parse().ok()),
            season: None,
            episode: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            resolution,
            release_group,
            repack,
            proper,
            media_type: MediaType::Anime,
        };
    }

    if let Some(caps) = season_episode_re().captures(name) {
        let season: Option<u32> = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let episode: Option<u32> = caps.get(2).and_then(|m| m.as_str().parse().ok());
        let title = clean_separators(&name[..caps.get(0).unwrap().start()]);
        let media_type = if episode.is_some() {
            MediaType::Episode
        } else {
            MediaType::Season
        };
        return ParsedName {
            title,
            year: year_re().captures(name).and_then(|c| c[1].parse().ok()),
            season,
            episode,
            resolution,
            release_group,
            repack,
            proper,
            media_type,
        };
    }

    if let Some(caps) = year_re().captures(name) {
        let title = clean_separators(&name[..caps.get(0).unwrap().start()]);
        if !title.is_empty() {
            return ParsedName {
                title,
                year: caps[1].parse().ok(),
                season: None,
                episode: None,
                resolution,
                release_group,
                repack,
                proper,
                media_type: MediaType::Movie,
            };
        }
    }

    ParsedName {
        title: clean_separators(name),
        year: None,
        season: None,
        episode: None,
        resolution,
        release_group,
        repack,
        proper,
        media_type: MediaType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_movie_with_year_and_resolution() {
        let parsed = parse_release_name("The.Movie.2020.1080p.BluRay-GRP");
        assert_eq!(parsed.title, "The Movie");
        assert_eq!(parsed.year, Some(2020));
        assert_eq!(parsed.resolution.as_deref(), Some("1080p"));
        assert_eq!(parsed.release_group.as_deref(), Some("GRP"));
        assert_eq!(parsed.media_type, MediaType::Movie);
    }

    #[test]
    fn parses_episode() {
        let parsed = parse_release_name("Show.Name.S02E05.720p.WEB-GRP");
        assert_eq!(parsed.title, "Show Name");
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, Some(5));
        assert_eq!(parsed.media_type, MediaType::Episode);
    }

    #[test]
    fn parses_season_pack() {
        let parsed = parse_release_name("Show.Name.S01.1080p-GRP");
        assert_eq!(parsed.season, Some(1));
        assert_eq!(parsed.episode, None);
        assert_eq!(parsed.media_type, MediaType::Season);
    }

    #[test]
    fn idempotent_on_extracted_title() {
        let parsed = parse_release_name("The.Movie.2020.1080p.BluRay-GRP");
        let reparsed = parse_release_name(&parsed.title);
        assert_eq!(reparsed.title, parsed.title);
    }

    #[test]
    fn falls_back_to_other() {
        let parsed = parse_release_name("random-archive-v3");
        assert_eq!(parsed.media_type, MediaType::Other);
    }
}
