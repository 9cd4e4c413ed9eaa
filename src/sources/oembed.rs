use std::sync::Arc;

use serde::Deserialize;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::models::{ContentKind, ContentReference, TrackDescriptor};
use crate::sources::{Extraction, PageFetcher, TrackSource};

/// 서비스의 oEmbed 메타데이터 엔드포인트를 조회하는 전략.
/// 단일 트랙이면 응답의 title을 그대로 유일한 트랙으로 쓰고,
/// 앨범/플레이리스트는 이름만 알려주므로 트랙은 비어 있다.
pub struct OEmbedSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    title: String,
}

impl OEmbedSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, service: &ServiceConfig) -> Self {
        let base_url = service.base_url();
        Self {
            fetcher,
            endpoint: format!("{base_url}/oembed"),
            base_url,
        }
    }

    /// 사용자가 넣은 URL 대신 `{base}/{kind}/{id}` 정규 URL로 조회한다.
    fn request_url(&self, reference: &ContentReference) -> Result<String> {
        let canonical = format!("{}/{}/{}", self.base_url, reference.kind(), reference.id());
        let request = reqwest::Url::parse_with_params(&self.endpoint, &[("url", canonical.as_str())])
            .map_err(|e| Error::invalid_reference(format!("{canonical} ({e})")))?;
        Ok(request.to_string())
    }
}

impl TrackSource for OEmbedSource {
    fn name(&self) -> &str {
        "oEmbed API"
    }

    fn extract(&self, reference: &ContentReference, _url: &str) -> Result<Extraction> {
        let body = self.fetcher.fetch_text(&self.request_url(reference)?)?;
        let response: OEmbedResponse = serde_json::from_str(&body)?;

        let Some(title) = TrackDescriptor::from_title(&response.title) else {
            return Ok(Extraction::empty());
        };

        if reference.kind() != ContentKind::Track {
            tracing::info!("{} 발견: {}", reference.kind(), title);
            return Ok(Extraction {
                tracks: Vec::new(),
                title: Some(title.to_string()),
            });
        }

        Ok(Extraction::tracks(vec![title]))
    }
}
