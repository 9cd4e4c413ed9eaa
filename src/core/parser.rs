use std::path::Path;

use crate::core::tagger::TrackTags;
use crate::models::SEPARATOR;

/// Guess artist and title from a downloaded file's name.
///
/// Supported patterns:
/// - "Artist - Title.mp3"
/// - "01. Artist - Title.mp3"
/// - "Title.mp3" (fallback)
pub fn parse_filename(path: &Path) -> TrackTags {
    let stem = match path.file_stem().and_then(|s| s.to_str()) {
        Some(s) => s.trim().to_string(),
        None => return TrackTags::default(),
    };

    let without_number = strip_track_number(&stem).unwrap_or(&stem);

    if let Some(tags) = try_artist_title(without_number) {
        return tags;
    }

    TrackTags {
        artist: None,
        title: if without_number.is_empty() {
            None
        } else {
            Some(without_number.to_string())
        },
    }
}

fn try_artist_title(stem: &str) -> Option<TrackTags> {
    let (artist, title) = stem.split_once(SEPARATOR)?;
    let (artist, title) = (artist.trim(), title.trim());
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(TrackTags {
        artist: Some(artist.to_string()),
        title: Some(title.to_string()),
    })
}

fn strip_track_number(stem: &str) -> Option<&str> {
    let digits = stem.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return None;
    }

    let rest = &stem[digits..];
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    if !rest.starts_with(' ') {
        return None;
    }

    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    Some(rest)
}
