//! Heuristic track extraction from service markup.
//!
//! Two layers: structured data blocks embedded in the page (parsed as JSON
//! and walked recursively), and a bank of regexes run over the raw markup.
//! Both are best-effort. Artist/title may come out swapped or truncated on
//! unusual pages, and callers accept that.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::{TrackDescriptor, SEPARATOR};

/// Upper bound on descriptors produced by the regex scrape.
pub const MAX_SCRAPED_TRACKS: usize = 50;

static STATE_ASSIGNMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.*?\});",
        r"(?s)window\.__PRELOADED_STATE__\s*=\s*(\{.*?\});",
        r"(?s)window\.Spotify\s*=\s*(\{.*?\});",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static DATA_SCRIPTS: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse(
        r#"script#__NEXT_DATA__, script#resource, script[type="application/ld+json"]"#,
    )
    .ok()
});

static PATTERN_BANK: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // schema.org JSON-LD
        r#"(?si)"@type":"MusicRecording".*?"name":"([^"]+)".*?"byArtist".*?"name":"([^"]+)""#,
        // Open Graph music tags
        r#"(?si)<meta property="music:song" content="([^"]+)""#,
        r#"(?si)<meta property="og:title" content="([^"]*?(?:by|-).*?)""#,
        // microdata
        r#"(?si)itemprop="name"[^>]*>([^<]+)<.*?itemprop="byArtist"[^>]*>([^<]+)<"#,
        // inline service JSON fragments
        r#"(?si)"track":\{"uri":"spotify:track:[^"]*","name":"([^"]+)".*?"artists":\[\{"name":"([^"]+)""#,
        r#"(?si)"name":"([^"]+)"[^}]*"artists":\[\{"name":"([^"]+)""#,
        r#"(?si)"title":"([^"]+)"[^}]*"subtitle":"([^"]+)""#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Raw text of every structured-data block found in the page.
pub fn structured_blocks(html: &str) -> Vec<String> {
    let mut blocks: Vec<String> = STATE_ASSIGNMENTS
        .iter()
        .flat_map(|re| re.captures_iter(html))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if let Some(selector) = DATA_SCRIPTS.as_ref() {
        let document = Html::parse_document(html);
        blocks.extend(
            document
                .select(selector)
                .map(|el| el.text().collect::<String>())
                .filter(|text| !text.trim().is_empty()),
        );
    }

    blocks
}

/// Parses each structured block and collects tracks from all of them.
/// Blocks that are not valid JSON are skipped.
pub fn structured_extract(html: &str, service_name: &str) -> Vec<TrackDescriptor> {
    let mut seen = HashSet::new();
    let mut tracks = Vec::new();

    for block in structured_blocks(html) {
        let value: Value = match serde_json::from_str(&block) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("structured block skipped: {}", e);
                continue;
            }
        };
        for candidate in tracks_from_json(&value) {
            if let Some(track) = accept(&candidate, service_name) {
                if seen.insert(track.clone()) {
                    tracks.push(track);
                }
            }
        }
    }

    tracks
}

/// Walks a JSON document and returns `"{artist} - {name}"` for every object
/// carrying both `name` and a non-empty `artists` array, in discovery order
/// without duplicates.
pub fn tracks_from_json(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    walk(value, &mut found);
    found
}

fn walk(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let (Some(name), Some(artists)) = (map.get("name"), map.get("artists")) {
                let track_name = name.as_str().unwrap_or_default().trim();
                let artist_name = first_artist(artists);
                if !track_name.is_empty() && !artist_name.is_empty() {
                    let candidate = format!("{artist_name}{SEPARATOR}{track_name}");
                    if !found.contains(&candidate) {
                        found.push(candidate);
                    }
                }
            }
            for child in map.values() {
                walk(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, found);
            }
        }
        _ => {}
    }
}

fn first_artist(artists: &Value) -> &str {
    let first = match artists.as_array().and_then(|a| a.first()) {
        Some(first) => first,
        None => return "",
    };
    match first {
        Value::Object(artist) => artist
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim(),
        Value::String(name) => name.trim(),
        _ => "",
    }
}

/// Runs the regex bank over raw markup. Output is deduplicated, filtered
/// and capped at [`MAX_SCRAPED_TRACKS`].
pub fn pattern_extract(html: &str, service_name: &str) -> Vec<TrackDescriptor> {
    let mut candidates: Vec<String> = Vec::new();

    for re in PATTERN_BANK.iter() {
        for caps in re.captures_iter(html) {
            let candidate = match (caps.get(1), caps.get(2)) {
                (Some(first), Some(second)) => {
                    let (first, second) = (first.as_str().trim(), second.as_str().trim());
                    if first.chars().count() <= 1 || second.chars().count() <= 1 {
                        continue;
                    }
                    format!("{first}{SEPARATOR}{second}")
                }
                (Some(single), None) => {
                    let single = single.as_str().trim();
                    if !single.contains(SEPARATOR) && !single.contains(" by ") {
                        continue;
                    }
                    single.to_string()
                }
                _ => continue,
            };
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }

    filter_candidates(candidates, service_name, Some(MAX_SCRAPED_TRACKS))
}

/// Collapses whitespace, drops duplicates and anything [`accept`] rejects,
/// then truncates to `limit`.
pub fn filter_candidates<I>(candidates: I, service_name: &str, limit: Option<usize>) -> Vec<TrackDescriptor>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut tracks = Vec::new();

    for candidate in candidates {
        let Some(track) = accept(&candidate, service_name) else {
            continue;
        };
        if seen.insert(track.clone()) {
            tracks.push(track);
        }
        if limit.is_some_and(|max| tracks.len() >= max) {
            break;
        }
    }

    tracks
}

/// Shape check shared by every strategy: whitespace collapsed, longer than
/// five characters, contains the separator and does not start with the
/// service's own name.
pub fn accept(candidate: &str, service_name: &str) -> Option<TrackDescriptor> {
    let cleaned = collapse_whitespace(candidate);
    let service = service_name.trim().to_lowercase();
    if !service.is_empty() && cleaned.to_lowercase().starts_with(&service) {
        return None;
    }
    TrackDescriptor::new(&cleaned)
}

fn collapse_whitespace(s: &str) -> String {
    match WHITESPACE.as_ref() {
        Some(re) => re.replace_all(s, " ").trim().to_string(),
        None => s.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texts(tracks: &[TrackDescriptor]) -> Vec<&str> {
        tracks.iter().map(|t| t.as_str()).collect()
    }

    #[test]
    fn test_json_walk_finds_nested_tracks() {
        let doc = json!({
            "entities": {
                "items": [
                    {"name": "Blueming", "artists": [{"name": "IU"}]},
                    {"wrapper": {"name": "Dynamite", "artists": ["BTS"]}}
                ]
            }
        });
        assert_eq!(tracks_from_json(&doc), vec!["IU - Blueming", "BTS - Dynamite"]);
    }

    #[test]
    fn test_json_walk_dedupes_identical_objects() {
        let track = json!({"name": "Never Gonna Give You Up", "artists": [{"name": "Rick Astley"}]});
        let doc = json!({"a": [track.clone(), track.clone()], "b": track});
        assert_eq!(
            tracks_from_json(&doc),
            vec!["Rick Astley - Never Gonna Give You Up"]
        );
    }

    #[test]
    fn test_json_walk_ignores_incomplete_objects() {
        let doc = json!([
            {"name": "No Artists"},
            {"name": "Empty", "artists": []},
            {"name": "", "artists": [{"name": "Someone"}]},
            {"name": "Numeric", "artists": [42]}
        ]);
        assert!(tracks_from_json(&doc).is_empty());
    }

    #[test]
    fn test_structured_extract_from_window_state() {
        let html = r#"<html><script>window.__INITIAL_STATE__ = {"tracks":[{"name":"Hype Boy","artists":[{"name":"NewJeans"}]}]};</script></html>"#;
        let tracks = structured_extract(html, "spotify");
        assert_eq!(texts(&tracks), vec!["NewJeans - Hype Boy"]);
    }

    #[test]
    fn test_structured_extract_from_next_data_script() {
        let html = r#"<html><body>
            <script id="__NEXT_DATA__" type="application/json">{"props":{"list":[
                {"name":"Song One","artists":[{"name":"Band"}]},
                {"name":"Song Two","artists":[{"name":"Band"}]}
            ]}}</script></body></html>"#;
        let tracks = structured_extract(html, "spotify");
        assert_eq!(texts(&tracks), vec!["Band - Song One", "Band - Song Two"]);
    }

    #[test]
    fn test_structured_extract_skips_broken_json() {
        let html = r#"<script>window.Spotify = {not json};</script>"#;
        assert!(structured_extract(html, "spotify").is_empty());
    }

    #[test]
    fn test_pattern_extract_title_subtitle_pairs() {
        let html = r#"{"title":"Ditto","subtitle":"NewJeans"},{"title":"OMG","subtitle":"NewJeans"}"#;
        let tracks = pattern_extract(html, "spotify");
        assert_eq!(texts(&tracks), vec!["Ditto - NewJeans", "OMG - NewJeans"]);
    }

    #[test]
    fn test_pattern_extract_og_title() {
        let html = r#"<meta property="og:title" content="Daft Punk - One More Time"/>"#;
        let tracks = pattern_extract(html, "spotify");
        assert_eq!(texts(&tracks), vec!["Daft Punk - One More Time"]);
    }

    #[test]
    fn test_pattern_extract_drops_service_placeholders() {
        let html = r#"<meta property="og:title" content="Spotify - Web Player"/>"#;
        assert!(pattern_extract(html, "spotify").is_empty());
    }

    #[test]
    fn test_filter_rejects_short_and_unseparated() {
        let candidates = vec![
            "a - b".to_string(),
            "No separator here".to_string(),
            "Artist   -   Title".to_string(),
            "Artist - Title".to_string(),
            "Valid  -  Tune".to_string(),
        ];
        let tracks = filter_candidates(candidates, "spotify", None);
        assert_eq!(texts(&tracks), vec!["Artist - Title", "Valid - Tune"]);
    }

    #[test]
    fn test_filter_caps_output() {
        let candidates = (0..120).map(|i| format!("Artist {i} - Song {i}"));
        let tracks = filter_candidates(candidates, "spotify", Some(MAX_SCRAPED_TRACKS));
        assert_eq!(tracks.len(), MAX_SCRAPED_TRACKS);
        assert_eq!(tracks[0].as_str(), "Artist 0 - Song 0");
    }

    #[test]
    fn test_pattern_extract_caps_at_fifty() {
        let html: String = (0..80)
            .map(|i| format!(r#"{{"title":"Song number {i}","subtitle":"Artist {i}"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        assert_eq!(pattern_extract(&html, "spotify").len(), MAX_SCRAPED_TRACKS);
    }
}
