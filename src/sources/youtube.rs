use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::config::ToolsConfig;
use crate::core::fetcher::{AudioEngine, FetchRequest, SearchHit};
use crate::core::progress::{parse_progress_line, ProgressSink};
use crate::error::{Error, Result};

const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const STDERR_TAIL_LINES: usize = 20;

/// `yt-dlp` 실행 파일로 YouTube를 검색하고 오디오를 추출하는 엔진.
pub struct YtDlpEngine {
    binary: String,
    ffmpeg: Option<String>,
    socket_timeout_secs: u64,
    search_timeout: Duration,
    download_timeout: Duration,
}

/// `--dump-json --flat-playlist` 결과 한 줄.
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl From<SearchEntry> for SearchHit {
    fn from(entry: SearchEntry) -> Self {
        let url = entry
            .webpage_url
            .or(entry.url)
            .filter(|u| u.starts_with("http"))
            .unwrap_or_else(|| format!("{YOUTUBE_WATCH_URL}{}", entry.id));
        SearchHit {
            title: entry.title.unwrap_or_else(|| entry.id.clone()),
            id: entry.id,
            url,
            uploader: entry.uploader.or(entry.channel),
            duration_secs: entry.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64),
        }
    }
}

impl YtDlpEngine {
    pub fn new(tools: &ToolsConfig) -> Self {
        // 기본값이면 PATH 검색에 맡긴다
        let ffmpeg = Some(tools.ffmpeg.trim())
            .filter(|f| !f.is_empty() && *f != "ffmpeg")
            .map(str::to_string);
        Self {
            binary: tools.ytdlp.clone(),
            ffmpeg,
            socket_timeout_secs: tools.socket_timeout_secs,
            search_timeout: Duration::from_secs(tools.search_timeout_secs),
            download_timeout: Duration::from_secs(tools.download_timeout_secs),
        }
    }

    fn search_args(&self, query: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            format!("ytsearch1:{query}"),
        ]
    }

    fn download_args(
        &self,
        hit: &SearchHit,
        target_dir: &Path,
        temp_dir: &Path,
        request: &FetchRequest,
    ) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            request.format.as_str().to_string(),
            "--audio-quality".to_string(),
            request.quality.ytdlp_arg(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            "-P".to_string(),
            format!("home:{}", target_dir.display()),
            "-P".to_string(),
            format!("temp:{}", temp_dir.display()),
            "-o".to_string(),
            "%(title)s.%(ext)s".to_string(),
        ];
        if let Some(ffmpeg) = &self.ffmpeg {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.clone());
        }
        args.push(hit.url.clone());
        args
    }
}

impl AudioEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "YouTube (yt-dlp)"
    }

    fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        let output = run_streaming(
            &self.binary,
            &self.search_args(query),
            self.search_timeout,
            &mut |_| {},
        )?;
        output.ensure_success(&self.binary)?;

        output
            .stdout
            .iter()
            .find(|line| line.trim_start().starts_with('{'))
            .map(|line| parse_search_line(line))
            .transpose()
    }

    fn download(
        &self,
        hit: &SearchHit,
        target_dir: &Path,
        request: &FetchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        // 중간 파일은 이 디렉토리에만 생기고 drop 시 지워진다
        let temp_dir = tempfile::Builder::new().prefix("trackgrab-").tempdir()?;
        let args = self.download_args(hit, target_dir, temp_dir.path(), request);

        let output = run_streaming(&self.binary, &args, self.download_timeout, &mut |line| {
            if let Some(update) = parse_progress_line(line) {
                progress.report(&update);
            }
        })?;
        output.ensure_success(&self.binary)?;

        final_path(&output.stdout).ok_or_else(|| {
            Error::Transcode(format!(
                "{}가 결과 파일 경로를 출력하지 않았습니다",
                self.binary
            ))
        })
    }
}

fn parse_search_line(line: &str) -> Result<SearchHit> {
    let entry: SearchEntry = serde_json::from_str(line.trim())?;
    Ok(entry.into())
}

/// `--print after_move:filepath`가 출력한 마지막 경로.
fn final_path(stdout: &[String]) -> Option<PathBuf> {
    stdout
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('['))
        .last()
        .map(PathBuf::from)
}

/// 외부 프로세스 실행 결과.
#[derive(Debug)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: Vec<String>,
    pub stderr_tail: Vec<String>,
}

impl ToolOutput {
    fn ensure_success(&self, tool: &str) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let message = self
            .stderr_tail
            .iter()
            .rev()
            .find(|l| l.contains("ERROR"))
            .or_else(|| self.stderr_tail.last())
            .cloned()
            .unwrap_or_else(|| "알 수 없는 오류로 종료했습니다".to_string());
        Err(Error::tool(tool, message))
    }
}

enum StreamLine {
    Out(String),
    Err(String),
}

fn forward_lines<R: Read + Send + 'static>(
    reader: R,
    tx: Sender<StreamLine>,
    wrap: fn(String) -> StreamLine,
) {
    std::thread::spawn(move || {
        for line in BufReader::new(reader).lines().map_while(|l| l.ok()) {
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    });
}

/// 프로세스를 실행하며 stdout/stderr를 줄 단위로 `on_line`에 넘긴다.
/// `timeout`이 지나면 프로세스를 종료하고 `Error::Timeout`을 돌려준다.
pub fn run_streaming(
    binary: &str,
    args: &[String],
    timeout: Duration,
    on_line: &mut dyn FnMut(&str),
) -> Result<ToolOutput> {
    tracing::debug!("실행: {} {}", binary, args.join(" "));

    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::tool(binary, format!("실행할 수 없습니다: {e}")))?;

    let (tx, rx) = mpsc::channel();
    if let Some(out) = child.stdout.take() {
        forward_lines(out, tx.clone(), StreamLine::Out);
    }
    if let Some(err) = child.stderr.take() {
        forward_lines(err, tx.clone(), StreamLine::Err);
    }
    drop(tx);

    let deadline = Instant::now() + timeout;
    let mut stdout = Vec::new();
    let mut stderr_tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(StreamLine::Out(line)) => {
                tracing::debug!("{binary}: {line}");
                on_line(&line);
                stdout.push(line);
            }
            Ok(StreamLine::Err(line)) => {
                tracing::debug!("{binary} (stderr): {line}");
                on_line(&line);
                if stderr_tail.len() == STDERR_TAIL_LINES {
                    stderr_tail.pop_front();
                }
                stderr_tail.push_back(line);
            }
            Err(RecvTimeoutError::Timeout) => return Err(kill_for_timeout(&mut child, binary, timeout)),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            return Err(kill_for_timeout(&mut child, binary, timeout));
        }
        std::thread::sleep(Duration::from_millis(50));
    };

    Ok(ToolOutput {
        success: status.success(),
        stdout,
        stderr_tail: stderr_tail.into(),
    })
}

fn kill_for_timeout(child: &mut Child, binary: &str, timeout: Duration) -> Error {
    tracing::warn!("{}가 {}초 안에 끝나지 않아 종료합니다", binary, timeout.as_secs());
    let _ = child.kill();
    let _ = child.wait();
    Error::Timeout {
        tool: binary.to_string(),
        secs: timeout.as_secs(),
    }
}

/// 도구가 실행 가능한지 확인하고 버전 줄을 돌려준다.
pub fn probe_tool(binary: &str, version_arg: &str) -> Result<String> {
    let output = Command::new(binary)
        .arg(version_arg)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::tool(binary, format!("실행할 수 없습니다: {e}")))?;

    if !output.status.success() {
        return Err(Error::tool(
            binary,
            format!("버전 확인이 실패했습니다 ({})", output.status),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}
