use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::sources::PageFetcher;

/// 서비스 페이지용 blocking HTTP 클라이언트.
/// 브라우저와 비슷한 헤더와 요청 타임아웃을 설정한다.
pub struct WebClient {
    client: reqwest::blocking::Client,
}

impl WebClient {
    pub fn new(service: &ServiceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::blocking::Client::builder()
            .user_agent(service.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(service.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self { client })
    }
}

impl PageFetcher for WebClient {
    fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::debug!("GET {}", url);
        let body = self.client.get(url).send()?.error_for_status()?.text()?;
        Ok(body)
    }
}
