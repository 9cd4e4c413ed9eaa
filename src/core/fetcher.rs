use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::progress::ProgressSink;
use crate::core::{naming, tagger};
use crate::error::{Error, Result};
use crate::models::{AudioFormat, Quality, TrackDescriptor};

/// 오디오 소스 검색 결과 하나.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub url: String,
    pub uploader: Option<String>,
    pub duration_secs: Option<u64>,
}

/// `제목 [id] 업로더 3:32` 형태. 모르는 항목은 빠진다.
impl fmt::Display for SearchHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.id)?;
        if let Some(uploader) = &self.uploader {
            write!(f, " {uploader}")?;
        }
        if let Some(secs) = self.duration_secs {
            write!(f, " {}:{:02}", secs / 60, secs % 60)?;
        }
        Ok(())
    }
}

/// 트랙 하나를 받을 때의 변환 옵션.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchRequest {
    pub format: AudioFormat,
    pub quality: Quality,
    /// 플레이리스트/앨범 이름 하위 폴더
    pub subfolder: Option<String>,
}

/// "텍스트로 검색, 최고 음질 다운로드, 코덱/비트레이트로 변환" 기능을 제공하는 엔진.
pub trait AudioEngine: Send + Sync {
    fn name(&self) -> &str;
    /// 상위 1개 결과를 검색한다. 결과가 없으면 `Ok(None)`.
    fn search(&self, query: &str) -> Result<Option<SearchHit>>;
    /// 검색 결과를 받아 `target_dir` 안에 변환된 파일을 만들고 경로를 돌려준다.
    fn download(
        &self,
        hit: &SearchHit,
        target_dir: &Path,
        request: &FetchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf>;
}

/// 배치가 트랙마다 호출하는 경계.
/// 트랙 단위 실패는 `Ok(false)`가 되고, 배치를 멈춰야 하는 에러만 `Err`로 올라간다.
pub trait TrackFetch {
    /// 출력 디렉토리를 만들고 쓰기 가능한지 확인한다. 실패하면 배치를 중단한다.
    fn prepare(&self, request: &FetchRequest) -> Result<PathBuf>;
    fn fetch(
        &self,
        track: &TrackDescriptor,
        request: &FetchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<bool>;
}

pub struct Fetcher<E> {
    engine: E,
    output_dir: PathBuf,
    tag_files: bool,
}

impl<E: AudioEngine> Fetcher<E> {
    pub fn new(engine: E, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            tag_files: false,
        }
    }

    pub fn with_tagging(mut self, enabled: bool) -> Self {
        self.tag_files = enabled;
        self
    }

    /// 출력 디렉토리(필요하면 하위 폴더 포함)를 만들고 쓰기 가능 여부를 확인한다.
    pub fn target_dir(&self, subfolder: Option<&str>) -> Result<PathBuf> {
        let dir = match subfolder.and_then(naming::folder_name) {
            Some(name) => self.output_dir.join(name),
            None => self.output_dir.clone(),
        };

        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| Error::output_dir(&dir, e))?;
            tracing::info!("'{}' 디렉토리를 만들었습니다", dir.display());
        }

        tempfile::NamedTempFile::new_in(&dir).map_err(|e| Error::output_dir(&dir, e))?;
        Ok(dir)
    }

    /// 검색, 다운로드, 변환을 수행하고 만들어진 파일 경로를 돌려준다.
    pub fn try_fetch(
        &self,
        track: &TrackDescriptor,
        request: &FetchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let target_dir = self.target_dir(request.subfolder.as_deref())?;

        tracing::info!("검색 중: '{}' ({})", track, self.engine.name());
        let hit = self
            .engine
            .search(track.as_str())?
            .ok_or_else(|| Error::NoResultsFound(track.to_string()))?;
        tracing::info!("찾음: {hit}");

        let path = self.engine.download(&hit, &target_dir, request, progress)?;
        verify_output(&path)?;

        if self.tag_files && request.format == AudioFormat::Mp3 {
            let (artist, title) = track.split();
            if let Err(e) = tagger::write_tags(&path, artist, title) {
                tracing::warn!("태그 기록 실패 ({}): {}", path.display(), e);
            }
        }

        Ok(path)
    }
}

impl<E: AudioEngine> TrackFetch for Fetcher<E> {
    fn prepare(&self, request: &FetchRequest) -> Result<PathBuf> {
        self.target_dir(request.subfolder.as_deref())
    }

    fn fetch(
        &self,
        track: &TrackDescriptor,
        request: &FetchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<bool> {
        match self.try_fetch(track, request, progress) {
            Ok(path) => {
                tracing::info!("완료: {}", path.display());
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!("다운로드 실패 '{}': {}", track, e);
                Ok(false)
            }
        }
    }
}

/// 결과 파일이 없거나 비어 있으면 지우고 변환 실패로 처리한다.
fn verify_output(path: &Path) -> Result<()> {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size > 0 {
        return Ok(());
    }
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
    Err(Error::Transcode(format!(
        "결과 파일이 없거나 비어 있습니다: {}",
        path.display()
    )))
}
