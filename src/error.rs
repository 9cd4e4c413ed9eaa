//! 라이브러리 계층의 에러 타입.
//!
//! 해석기/다운로더 내부는 `thiserror` 기반의 [`Error`]를 사용하고,
//! CLI 계층은 `anyhow`로 감싸서 사용자에게 출력한다.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL이 서비스 도메인/경로 형식과 맞지 않음
    #[error("올바르지 않은 URL입니다: {0}")]
    InvalidReference(String),

    #[error("HTTP 요청 실패: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON 파싱 실패: {0}")]
    Json(#[from] serde_json::Error),

    /// 오디오 소스 검색 결과가 없음
    #[error("검색 결과가 없습니다: {0}")]
    NoResultsFound(String),

    /// 다운로드 또는 변환 결과 파일이 없거나 비어 있음
    #[error("오디오 변환 실패: {0}")]
    Transcode(String),

    /// 외부 도구 실행 실패
    #[error("{tool} 실행 실패: {message}")]
    Tool { tool: String, message: String },

    #[error("{tool}이(가) {secs}초 안에 끝나지 않았습니다")]
    Timeout { tool: String, secs: u64 },

    /// 출력 디렉토리를 만들거나 쓸 수 없음. 배치 전체를 중단한다.
    #[error("출력 디렉토리를 사용할 수 없습니다 ({}): {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("설정 에러: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_reference(url: impl Into<String>) -> Self {
        Self::InvalidReference(url.into())
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn output_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputDir {
            path: path.into(),
            source,
        }
    }

    /// 배치를 중단시켜야 하는 에러인지 여부.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidReference(_) | Self::OutputDir { .. })
    }
}
