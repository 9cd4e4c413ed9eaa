use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::core::extract;
use crate::error::Result;
use crate::models::ContentReference;
use crate::sources::{Extraction, PageFetcher, TrackSource};

/// 일반 콘텐츠 페이지에 정규식 스크래핑을 적용하는 마지막 전략.
pub struct DirectSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    service_name: String,
}

impl DirectSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, service: &ServiceConfig) -> Self {
        Self {
            fetcher,
            base_url: service.base_url(),
            service_name: service.name.clone(),
        }
    }
}

impl TrackSource for DirectSource {
    fn name(&self) -> &str {
        "Direct Page"
    }

    fn extract(&self, reference: &ContentReference, _url: &str) -> Result<Extraction> {
        let page_url = format!("{}/{}/{}", self.base_url, reference.kind(), reference.id());
        let html = self.fetcher.fetch_text(&page_url)?;
        Ok(Extraction::tracks(extract::pattern_extract(
            &html,
            &self.service_name,
        )))
    }
}
