pub mod direct;
pub mod embed;
pub mod oembed;
pub mod web;
pub mod youtube;

use crate::error::Result;
use crate::models::{ContentReference, TrackDescriptor};

/// 트랙 목록 추출 전략.
/// 해석기는 등록된 순서대로 전략을 시도하고 처음으로 트랙을 돌려준 전략에서 멈춘다.
pub trait TrackSource: Send + Sync {
    /// 로그에 표시할 이름.
    fn name(&self) -> &str;
    /// 콘텐츠 참조와 원본 URL로 트랙 목록을 추출한다.
    fn extract(&self, reference: &ContentReference, url: &str) -> Result<Extraction>;
}

/// 전략 하나의 결과. 앨범/플레이리스트 이름만 알아낸 경우 `tracks`는 비어 있다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub tracks: Vec<TrackDescriptor>,
    pub title: Option<String>,
}

impl Extraction {
    pub fn tracks(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            tracks,
            title: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// 페이지 본문을 가져오는 HTTP 계층.
pub trait PageFetcher: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String>;
}
