use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::core::extract;
use crate::error::Result;
use crate::models::ContentReference;
use crate::sources::{Extraction, PageFetcher, TrackSource};

/// 임베드용 페이지를 가져와 구조화 데이터 블록에서 트랙을 찾는 전략.
/// 블록에서 아무것도 나오지 않으면 정규식 스크래핑으로 대체한다.
pub struct EmbedSource {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    service_name: String,
}

impl EmbedSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, service: &ServiceConfig) -> Self {
        Self {
            fetcher,
            base_url: service.base_url(),
            service_name: service.name.clone(),
        }
    }

    fn embed_url(&self, reference: &ContentReference) -> String {
        format!(
            "{}/embed/{}/{}",
            self.base_url,
            reference.kind(),
            reference.id()
        )
    }
}

impl TrackSource for EmbedSource {
    fn name(&self) -> &str {
        "Embed Page"
    }

    fn extract(&self, reference: &ContentReference, _url: &str) -> Result<Extraction> {
        let html = self.fetcher.fetch_text(&self.embed_url(reference))?;

        let tracks = extract::structured_extract(&html, &self.service_name);
        if !tracks.is_empty() {
            return Ok(Extraction::tracks(tracks));
        }

        tracing::debug!("구조화 데이터가 없어 정규식 추출로 전환합니다");
        Ok(Extraction::tracks(extract::pattern_extract(
            &html,
            &self.service_name,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;
    use crate::test_utils::FakePages;

    fn service() -> ServiceConfig {
        ServiceConfig {
            domain: "open.example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_fetches_embed_url_for_reference() {
        let pages = FakePages::new().with(
            "https://open.example.com/embed/album/abc123",
            r#"<script id="resource" type="application/json">{"tracks":{"items":[{"name":"Intro","artists":[{"name":"Artist"}]}]}}</script>"#,
        );
        let source = EmbedSource::new(pages.shared(), &service());
        let reference = ContentReference::new(ContentKind::Album, "abc123").unwrap();

        let result = source.extract(&reference, "ignored").unwrap();
        assert_eq!(result.tracks[0].as_str(), "Artist - Intro");
        assert_eq!(
            pages.requested(),
            vec!["https://open.example.com/embed/album/abc123".to_string()]
        );
    }

    #[test]
    fn test_falls_back_to_patterns_without_structured_data() {
        let pages = FakePages::new().with(
            "https://open.example.com/embed/playlist/p1",
            r#"<div>{"title":"Super Shy","subtitle":"NewJeans"}</div>"#,
        );
        let source = EmbedSource::new(pages.shared(), &service());
        let reference = ContentReference::new(ContentKind::Playlist, "p1").unwrap();

        let result = source.extract(&reference, "ignored").unwrap();
        assert_eq!(result.tracks.len(), 1);
        assert_eq!(result.tracks[0].as_str(), "Super Shy - NewJeans");
    }
}
