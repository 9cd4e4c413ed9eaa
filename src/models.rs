use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 아티스트와 제목 사이의 구분자.
pub const SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Track,
    Album,
    Playlist,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Playlist => "playlist",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "playlist" => Ok(Self::Playlist),
            other => Err(format!("지원하지 않는 콘텐츠 종류: {other}")),
        }
    }
}

/// URL에서 파싱한 `{kind, id}` 쌍. 생성 후 변경되지 않는다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentReference {
    kind: ContentKind,
    id: String,
}

impl ContentReference {
    /// id가 비어 있거나 영숫자가 아니면 None.
    pub fn new(kind: ContentKind, id: &str) -> Option<Self> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self {
            kind,
            id: id.to_string(),
        })
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// `"Artist - Title"` 형식의 트랙 설명 문자열.
///
/// 검색어로 그대로 쓰이며 텍스트 외의 식별자는 없다.
/// 스크래핑한 후보는 [`TrackDescriptor::new`]의 형식 검사를 거치고,
/// 메타데이터 엔드포인트의 트랙 제목은 [`TrackDescriptor::from_title`]로 그대로 받는다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackDescriptor(String);

impl TrackDescriptor {
    /// 비어 있지 않고, 구분자를 포함하며, 5자보다 길 때만 생성된다.
    pub fn new(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.chars().count() <= 5 || !text.contains(SEPARATOR) {
            return None;
        }
        Some(Self(text.to_string()))
    }

    /// 메타데이터 엔드포인트가 알려준 트랙 제목. 비어 있지만 않으면 된다.
    /// 제목만 있고 아티스트가 없는 경우에도 그대로 검색어로 쓴다.
    pub fn from_title(title: &str) -> Option<Self> {
        let title = title.trim();
        (!title.is_empty()).then(|| Self(title.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 첫 번째 구분자에서 (아티스트, 제목)으로 나눈다.
    pub fn split(&self) -> (&str, &str) {
        match self.0.split_once(SEPARATOR) {
            Some((artist, title)) => (artist.trim(), title.trim()),
            None => ("", self.0.as_str()),
        }
    }
}

impl fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TrackDescriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub track: TrackDescriptor,
    pub success: bool,
}

/// 배치 한 번의 집계 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl DownloadStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &DownloadOutcome) {
        if outcome.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn attempted(&self) -> usize {
        self.successful + self.failed
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Aac,
    M4a,
    Opus,
    Vorbis,
    Flac,
    Wav,
    Alac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 8] = [
        Self::Mp3,
        Self::Aac,
        Self::M4a,
        Self::Opus,
        Self::Vorbis,
        Self::Flac,
        Self::Wav,
        Self::Alac,
    ];

    /// yt-dlp `--audio-format`에 넘기는 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Alac => "alac",
        }
    }

    /// 변환 후 만들어지는 파일 확장자.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Aac | Self::M4a | Self::Alac => "m4a",
            Self::Vorbis => "ogg",
            other => other.as_str(),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == ext)
            .or_else(|| Self::ALL.into_iter().find(|f| f.extension() == ext))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("지원하지 않는 오디오 형식: {s}"))
    }
}

/// 변환 품질. `Auto`는 소스가 제공하는 최고 비트레이트를 사용한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Quality {
    #[default]
    Auto,
    Kbps(u32),
}

impl Quality {
    /// yt-dlp `--audio-quality` 인자.
    pub fn ytdlp_arg(&self) -> String {
        match self {
            Self::Auto => "0".to_string(),
            Self::Kbps(k) => format!("{k}K"),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Kbps(k) => write!(f, "{k}"),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "auto" {
            return Ok(Self::Auto);
        }
        let digits = s.trim_end_matches('k');
        match digits.parse::<u32>() {
            Ok(k) if k > 0 => Ok(Self::Kbps(k)),
            _ => Err(format!("품질은 'auto' 또는 kbps 숫자여야 합니다: {s}")),
        }
    }
}

impl TryFrom<String> for Quality {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quality> for String {
    fn from(q: Quality) -> Self {
        q.to_string()
    }
}

/// 출력 디렉토리에서 찾은 오디오 파일.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub path: PathBuf,
    pub format: Option<AudioFormat>,
    pub size: u64,
    pub artist: Option<String>,
    pub title: Option<String>,
    /// ID3 태그에서 읽었는지 (아니면 파일명에서 추정)
    pub has_tags: bool,
}

impl AudioFile {
    pub fn filename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("알 수 없음")
    }

    pub fn tag_summary(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(a), Some(t)) => format!("{a}{SEPARATOR}{t}"),
            (None, Some(t)) => t.clone(),
            _ => "-".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(s: &str) -> TrackDescriptor {
        TrackDescriptor::new(s).unwrap()
    }

    #[test]
    fn test_descriptor_requires_separator_and_length() {
        assert!(TrackDescriptor::new("a - b").is_none());
        assert!(TrackDescriptor::new("Artist Title").is_none());
        assert!(TrackDescriptor::new("   ").is_none());
        assert_eq!(descriptor("  IU - Blueming ").as_str(), "IU - Blueming");
    }

    #[test]
    fn test_title_descriptor_only_needs_text() {
        let d = TrackDescriptor::from_title("  Bohemian Rhapsody ").unwrap();
        assert_eq!(d.as_str(), "Bohemian Rhapsody");
        assert_eq!(d.split(), ("", "Bohemian Rhapsody"));
        assert!(TrackDescriptor::from_title(" \t ").is_none());
    }

    #[test]
    fn test_descriptor_split_keeps_extra_separators_in_title() {
        let d = descriptor("Queen - Bohemian Rhapsody - Remastered 2011");
        assert_eq!(d.split(), ("Queen", "Bohemian Rhapsody - Remastered 2011"));
    }

    #[test]
    fn test_reference_rejects_non_alphanumeric_id() {
        assert!(ContentReference::new(ContentKind::Track, "abc-123").is_none());
        assert!(ContentReference::new(ContentKind::Track, "").is_none());
        let r = ContentReference::new(ContentKind::Album, "4aawyAB9vmqN3uQ7FjRGTy").unwrap();
        assert_eq!(r.kind(), ContentKind::Album);
        assert_eq!(r.id(), "4aawyAB9vmqN3uQ7FjRGTy");
    }

    #[test]
    fn test_stats_record_and_rate() {
        let mut stats = DownloadStats::new(4);
        for success in [true, false, true, true] {
            stats.record(&DownloadOutcome {
                track: descriptor("Artist - Song"),
                success,
            });
        }
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.attempted(), 4);
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(DownloadStats::default().success_rate(), 0.0);
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("auto".parse::<Quality>(), Ok(Quality::Auto));
        assert_eq!("192".parse::<Quality>(), Ok(Quality::Kbps(192)));
        assert_eq!("320K".parse::<Quality>(), Ok(Quality::Kbps(320)));
        assert!("0".parse::<Quality>().is_err());
        assert!("best".parse::<Quality>().is_err());
        assert_eq!(Quality::Kbps(192).ytdlp_arg(), "192K");
        assert_eq!(Quality::Auto.ytdlp_arg(), "0");
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(AudioFormat::Vorbis.extension(), "ogg");
        assert_eq!(AudioFormat::Alac.extension(), "m4a");
        assert_eq!(AudioFormat::Flac.extension(), "flac");
        assert_eq!("OPUS".parse::<AudioFormat>(), Ok(AudioFormat::Opus));
        assert_eq!(AudioFormat::from_extension("OGG"), Some(AudioFormat::Vorbis));
        assert_eq!(AudioFormat::from_extension("txt"), None);
    }
}
