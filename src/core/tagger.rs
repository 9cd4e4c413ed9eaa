use std::path::Path;

use anyhow::Result;
use id3::{Tag, TagLike, Version};

/// 파일에서 읽거나 파일명에서 추정한 아티스트/제목.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub title: Option<String>,
}

/// MP3 파일에서 ID3 태그를 읽는다.
/// 태그가 없거나 제목/아티스트가 모두 비어있으면 None을 반환한다.
pub fn read_tags(path: &Path) -> Result<Option<TrackTags>> {
    let tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if tag.title().is_none() && tag.artist().is_none() {
        return Ok(None);
    }

    Ok(Some(TrackTags {
        artist: tag.artist().map(|s| s.to_string()),
        title: tag.title().map(|s| s.to_string()),
    }))
}

/// 다운로드한 MP3에 ID3v2.4 아티스트/제목을 기록한다.
/// 기존 태그가 있으면 해당 필드만 덮어쓰고 빈 값은 건너뛴다.
pub fn write_tags(path: &Path, artist: &str, title: &str) -> Result<()> {
    let mut tag = Tag::read_from_path(path).unwrap_or_else(|_| Tag::new());

    if !artist.is_empty() {
        tag.set_artist(artist);
        tag.set_album_artist(artist);
    }
    if !title.is_empty() {
        tag.set_title(title);
    }

    tag.write_to_path(path, Version::Id3v24)?;
    Ok(())
}
