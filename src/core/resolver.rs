use std::sync::Arc;

use regex::Regex;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::models::{ContentKind, ContentReference, TrackDescriptor};
use crate::sources::direct::DirectSource;
use crate::sources::embed::EmbedSource;
use crate::sources::oembed::OEmbedSource;
use crate::sources::{PageFetcher, TrackSource};

/// URL 하나를 해석한 결과.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub reference: ContentReference,
    pub tracks: Vec<TrackDescriptor>,
    /// 앨범/플레이리스트 이름 (전략이 알려준 경우)
    pub title: Option<String>,
}

/// 서비스 URL과 URI(`name:kind:id`)를 인식하는 패턴.
pub struct ReferenceParser {
    url_pattern: Regex,
    uri_pattern: Regex,
}

impl ReferenceParser {
    pub fn new(service: &ServiceConfig) -> Result<Self> {
        let url_pattern = Regex::new(&format!(
            r"(?i)^(?:https?://)?{}/(?:intl-[a-z]{{2}}(?:-[a-z]+)?/)?(track|album|playlist)/([A-Za-z0-9]+)/?$",
            regex::escape(&service.domain)
        ))
        .map_err(|e| Error::Config(format!("서비스 도메인으로 패턴을 만들 수 없습니다: {e}")))?;

        let uri_pattern = Regex::new(&format!(
            r"(?i)^{}:(track|album|playlist):([A-Za-z0-9]+)$",
            regex::escape(&service.name)
        ))
        .map_err(|e| Error::Config(format!("서비스 이름으로 패턴을 만들 수 없습니다: {e}")))?;

        Ok(Self {
            url_pattern,
            uri_pattern,
        })
    }

    /// 쿼리 문자열과 프래그먼트를 제거한 뒤 `{kind, id}`를 추출한다.
    /// 네트워크 요청은 하지 않는다.
    pub fn parse(&self, url: &str) -> Result<ContentReference> {
        let trimmed = url.trim();
        let stripped = trimmed.split(['?', '#']).next().unwrap_or_default();

        let caps = self
            .url_pattern
            .captures(stripped)
            .or_else(|| self.uri_pattern.captures(stripped))
            .ok_or_else(|| Error::invalid_reference(trimmed))?;

        let kind: ContentKind = caps[1]
            .parse()
            .map_err(|_| Error::invalid_reference(trimmed))?;
        ContentReference::new(kind, &caps[2]).ok_or_else(|| Error::invalid_reference(trimmed))
    }
}

/// URL 한 번만 파싱할 때 쓰는 단축 함수.
pub fn parse_reference(url: &str, service: &ServiceConfig) -> Result<ContentReference> {
    ReferenceParser::new(service)?.parse(url)
}

/// 여러 추출 전략을 순서대로 시도하여 트랙 목록을 만든다.
pub struct Resolver {
    parser: ReferenceParser,
    strategies: Vec<Box<dyn TrackSource>>,
}

impl Resolver {
    /// oEmbed → 임베드 페이지 → 직접 페이지 순서의 기본 전략 구성.
    pub fn new(service: &ServiceConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let strategies: Vec<Box<dyn TrackSource>> = vec![
            Box::new(OEmbedSource::new(Arc::clone(&fetcher), service)),
            Box::new(EmbedSource::new(Arc::clone(&fetcher), service)),
            Box::new(DirectSource::new(fetcher, service)),
        ];
        Self::with_strategies(service, strategies)
    }

    pub fn with_strategies(
        service: &ServiceConfig,
        strategies: Vec<Box<dyn TrackSource>>,
    ) -> Result<Self> {
        Ok(Self {
            parser: ReferenceParser::new(service)?,
            strategies,
        })
    }

    pub fn parse_reference(&self, url: &str) -> Result<ContentReference> {
        self.parser.parse(url)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// URL을 파싱하고 트랙을 해석한다. 트랙이 없는 것은 에러가 아니다.
    pub fn resolve(&self, url: &str) -> Result<Resolution> {
        let reference = self.parse_reference(url)?;
        tracing::info!("{} 감지 (ID: {})", reference.kind(), reference.id());
        let (tracks, title) = self.run_strategies(&reference, url);
        Ok(Resolution {
            reference,
            tracks,
            title,
        })
    }

    pub fn resolve_tracks(&self, reference: &ContentReference, url: &str) -> Vec<TrackDescriptor> {
        self.run_strategies(reference, url).0
    }

    fn run_strategies(
        &self,
        reference: &ContentReference,
        url: &str,
    ) -> (Vec<TrackDescriptor>, Option<String>) {
        let mut title = None;

        for strategy in &self.strategies {
            tracing::info!("{} 시도 중...", strategy.name());
            match strategy.extract(reference, url) {
                Ok(extraction) => {
                    if title.is_none() {
                        title = extraction.title;
                    }
                    if !extraction.tracks.is_empty() {
                        tracing::info!(
                            "{}(으)로 트랙 {}개를 찾았습니다",
                            strategy.name(),
                            extraction.tracks.len()
                        );
                        return (extraction.tracks, title);
                    }
                    tracing::info!("{}에서 트랙을 찾지 못했습니다", strategy.name());
                }
                Err(e) => {
                    tracing::warn!("{} 실패: {}", strategy.name(), e);
                }
            }
        }

        (Vec::new(), title)
    }
}
