use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{AudioFormat, Quality};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub format: AudioFormat,
    pub quality: Quality,
    /// 트랙 사이 대기 시간(초)
    pub delay_secs: u64,
    /// MP3 결과에 아티스트/제목 ID3 태그를 기록
    pub tag_files: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloaded"),
            format: AudioFormat::Mp3,
            quality: Quality::Auto,
            delay_secs: 0,
            tag_files: true,
        }
    }
}

/// 메타데이터를 가져올 음악 서비스.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub domain: String,
    /// URI 스킴(`name:track:id`)과 자리표시자 필터에 쓰이는 서비스 이름
    pub name: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            domain: "open.spotify.com".to_string(),
            name: "spotify".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 20,
        }
    }
}

impl ServiceConfig {
    pub fn base_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ytdlp: String,
    pub ffmpeg: String,
    pub socket_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            socket_timeout_secs: 30,
            search_timeout_secs: 60,
            download_timeout_secs: 900,
        }
    }
}

pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("trackgrab")
        .join("config.toml")
}

pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(e) => {
            tracing::warn!("설정 파일을 읽을 수 없습니다 ({}): {}", path.display(), e);
            Config::default()
        }
    }
}

fn parse_config(content: &str) -> Config {
    toml::from_str(content).unwrap_or_else(|e| {
        tracing::warn!("설정 파일 형식이 잘못되어 기본값을 사용합니다: {}", e);
        Config::default()
    })
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}
