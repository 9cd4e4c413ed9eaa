use std::path::Path;

use anyhow::Result;

use crate::core::{parser, tagger};
use crate::models::{AudioFile, AudioFormat};

/// 디렉토리를 재귀 탐색하여 지원하는 오디오 파일을 모두 찾는다.
/// 숨김 디렉토리는 건너뛰며, 결과는 경로 순으로 정렬된다.
pub fn scan_directory(dir: &Path) -> Result<Vec<AudioFile>> {
    if !dir.is_dir() {
        anyhow::bail!("{}은(는) 디렉토리가 아닙니다", dir.display());
    }

    let mut files = Vec::new();
    collect_audio_files(dir, &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn collect_audio_files(dir: &Path, files: &mut Vec<AudioFile>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            if !is_hidden(&path) {
                collect_audio_files(&path, files)?;
            }
        } else if let Some(format) = audio_format(&path) {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(load_audio_file(&path, format, size));
        }
    }

    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// 확장자로 오디오 형식을 판별한다 (대소문자 무시).
fn audio_format(path: &Path) -> Option<AudioFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioFormat::from_extension)
}

/// MP3는 ID3 태그를 먼저 보고, 없으면 파일명에서 아티스트/제목을 추정한다.
fn load_audio_file(path: &Path, format: AudioFormat, size: u64) -> AudioFile {
    let from_tags = match format {
        AudioFormat::Mp3 => tagger::read_tags(path).ok().flatten(),
        _ => None,
    };
    let has_tags = from_tags.is_some();
    let tags = from_tags.unwrap_or_else(|| parser::parse_filename(path));

    AudioFile {
        path: path.to_path_buf(),
        format: Some(format),
        size,
        artist: tags.artist,
        title: tags.title,
        has_tags,
    }
}
