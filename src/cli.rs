use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use dialoguer::{Confirm, Input, Select};

use crate::config::{self, Config};
use crate::console::{self, BatchView};
use crate::core::batch::{spawn_batch, Batch, BatchOptions, CancelFlag};
use crate::core::fetcher::{FetchRequest, Fetcher};
use crate::core::resolver::{parse_reference, Resolver};
use crate::core::scanner;
use crate::models::{AudioFormat, DownloadStats, Quality};
use crate::sources::web::WebClient;
use crate::sources::youtube::{probe_tool, YtDlpEngine};

#[derive(Parser)]
#[command(name = "trackgrab", version, about = "음악 서비스 링크의 트랙을 찾아 오디오 파일로 받는 도구")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 로그를 자세히 출력 (-v: info, -vv: debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 트랙/앨범/플레이리스트를 다운로드
    Download(DownloadArgs),
    /// 다운로드 없이 트랙 목록만 출력
    Tracks {
        /// 트랙, 앨범 또는 플레이리스트 URL
        url: String,
    },
    /// 받은 오디오 파일 목록
    Files {
        /// 기본값: 설정의 출력 디렉토리
        directory: Option<PathBuf>,
    },
    /// yt-dlp와 ffmpeg 설치 확인
    Check,
    /// 기본 다운로드 설정 편집
    Config,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// 트랙, 앨범 또는 플레이리스트 URL
    pub url: String,

    /// 오디오 형식
    #[arg(short, long, value_enum)]
    pub format: Option<AudioFormat>,

    /// 품질: auto 또는 kbps (예: 192, 320k)
    #[arg(short, long)]
    pub quality: Option<Quality>,

    /// 출력 디렉토리
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 출력 디렉토리 안의 하위 폴더 이름
    #[arg(long, conflicts_with = "auto_folder")]
    pub folder: Option<String>,

    /// 앨범/플레이리스트 이름으로 하위 폴더 생성
    #[arg(long)]
    pub auto_folder: bool,

    /// 트랙 사이 대기 시간(초)
    #[arg(long)]
    pub delay: Option<u64>,

    /// MP3에 ID3 태그를 쓰지 않음
    #[arg(long)]
    pub no_tags: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Download(args) => cmd_download(args),
        Commands::Tracks { url } => cmd_tracks(&url),
        Commands::Files { directory } => cmd_files(directory),
        Commands::Check => cmd_check(),
        Commands::Config => cmd_config(),
    }
}

fn build_resolver(cfg: &Config) -> Result<Resolver> {
    let client = WebClient::new(&cfg.service).context("HTTP 클라이언트를 만들 수 없습니다")?;
    Ok(Resolver::new(&cfg.service, Arc::new(client))?)
}

fn cmd_download(args: DownloadArgs) -> Result<()> {
    let cfg = config::load_config();

    let output_dir = args.output.unwrap_or_else(|| cfg.download.output_dir.clone());
    let options = BatchOptions {
        request: FetchRequest {
            format: args.format.unwrap_or(cfg.download.format),
            quality: args.quality.unwrap_or(cfg.download.quality),
            subfolder: args.folder,
        },
        delay: Duration::from_secs(args.delay.unwrap_or(cfg.download.delay_secs)),
        auto_folder: args.auto_folder,
    };

    println!(
        "{}",
        console::item(&format!(
            "형식: {}, 품질: {}, 저장 위치: {}",
            options.request.format,
            options.request.quality,
            output_dir.display()
        ))
    );

    let fetcher = Fetcher::new(YtDlpEngine::new(&cfg.tools), output_dir)
        .with_tagging(cfg.download.tag_files && !args.no_tags);
    let batch = Batch::new(build_resolver(&cfg)?, fetcher, options);
    let handle = spawn_batch(batch, args.url.clone());

    let cancel = handle.cancel_flag();
    ctrlc::set_handler(move || {
        if on_interrupt(&cancel) {
            std::process::exit(130);
        }
        eprintln!(
            "\n{}",
            console::warning("현재 트랙을 마친 뒤 멈춥니다. 한 번 더 누르면 바로 종료합니다.")
        );
    })
    .context("Ctrl-C 핸들러를 설치할 수 없습니다")?;

    let mut view = BatchView::new();
    for event in handle.events() {
        view.handle(&event);
    }
    let finished = view.finished();
    drop(view);

    let result = handle.join();
    // 치명적 에러로 멈춘 배치도 그때까지의 결과를 보여 준다
    if let Some(stats) = result.as_ref().ok().copied().or(finished) {
        print_summary(&stats);
    }
    result.with_context(|| format!("'{}' 다운로드를 진행할 수 없습니다", args.url))?;
    Ok(())
}

/// 첫 번째 Ctrl-C는 배치를 취소하고, 이미 취소된 뒤라면 즉시 종료해야 함을 알린다.
fn on_interrupt(cancel: &CancelFlag) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    tracing::warn!("사용자가 중단을 요청했습니다");
    cancel.cancel();
    false
}

fn print_summary(stats: &DownloadStats) {
    if stats.total == 0 {
        println!("{}", console::warning("받을 트랙이 없습니다."));
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["전체", "성공", "실패", "성공률"]);
    table.add_row(vec![
        Cell::new(stats.total),
        Cell::new(stats.successful),
        Cell::new(stats.failed),
        Cell::new(format!("{:.1}%", stats.success_rate())),
    ]);
    println!("\n{table}");

    if stats.attempted() < stats.total {
        println!(
            "{}",
            console::warning(&format!(
                "{}개 트랙은 시도하지 않았습니다",
                stats.total - stats.attempted()
            ))
        );
    }
}

fn cmd_tracks(url: &str) -> Result<()> {
    let cfg = config::load_config();
    let reference = parse_reference(url, &cfg.service)
        .with_context(|| format!("'{url}'을(를) 해석할 수 없습니다"))?;
    let resolver = build_resolver(&cfg)?;
    tracing::info!("추출 순서: {}", resolver.strategy_names().join(" → "));
    let tracks = resolver.resolve_tracks(&reference, url);

    if tracks.is_empty() {
        println!("{}", console::failure("트랙을 찾지 못했습니다"));
        return Ok(());
    }

    for (i, track) in tracks.iter().enumerate() {
        println!("{:>3}. {}", i + 1, track);
    }
    println!(
        "\n{}",
        console::success(&format!("{reference}: 트랙 {}개", tracks.len()))
    );
    Ok(())
}

fn cmd_files(directory: Option<PathBuf>) -> Result<()> {
    let directory = directory.unwrap_or_else(|| config::load_config().download.output_dir);
    if !directory.exists() {
        println!("{}에 받은 파일이 없습니다", directory.display());
        return Ok(());
    }

    let files = scanner::scan_directory(&directory)?;
    if files.is_empty() {
        println!("{}에서 오디오 파일을 찾을 수 없습니다", directory.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["파일", "형식", "크기", "아티스트 - 제목", "태그"]);

    for file in &files {
        table.add_row(vec![
            Cell::new(relative(&file.path, &directory)),
            Cell::new(file.format.map(|f| f.extension()).unwrap_or("-")),
            Cell::new(format_size(file.size)),
            Cell::new(file.tag_summary()),
            Cell::new(if file.has_tags { "있음" } else { "없음" }),
        ]);
    }

    println!("{table}");
    println!(
        "\n총 {} 파일, {}",
        files.len(),
        format_size(files.iter().map(|f| f.size).sum())
    );
    Ok(())
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

fn cmd_check() -> Result<()> {
    let cfg = config::load_config();
    let mut ready = true;

    for (name, binary, arg) in [
        ("yt-dlp", cfg.tools.ytdlp.as_str(), "--version"),
        ("ffmpeg", cfg.tools.ffmpeg.as_str(), "-version"),
    ] {
        match probe_tool(binary, arg) {
            Ok(version) => println!("{}", console::success(&format!("{name}: {version}"))),
            Err(e) => {
                ready = false;
                println!("{}", console::failure(&format!("{name}: {e}")));
            }
        }
    }

    if !ready {
        println!(
            "\n{}",
            console::warning("다운로드하려면 yt-dlp와 ffmpeg가 필요합니다. 'trackgrab config'에서 경로를 지정할 수 있습니다.")
        );
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let mut cfg = config::load_config();

    println!("다운로드 설정");
    println!("(파일: {})\n", config::config_path().display());

    let output_dir: String = Input::new()
        .with_prompt("출력 디렉토리")
        .with_initial_text(cfg.download.output_dir.display().to_string())
        .interact_text()?;

    let formats: Vec<&str> = AudioFormat::ALL.iter().map(|f| f.as_str()).collect();
    let current = AudioFormat::ALL
        .iter()
        .position(|f| *f == cfg.download.format)
        .unwrap_or(0);
    let format_idx = Select::new()
        .with_prompt("오디오 형식")
        .items(&formats)
        .default(current)
        .interact()?;

    let quality: String = Input::new()
        .with_prompt("품질 (auto 또는 kbps)")
        .with_initial_text(cfg.download.quality.to_string())
        .validate_with(|input: &String| input.parse::<Quality>().map(|_| ()))
        .interact_text()?;

    let delay_secs: u64 = Input::new()
        .with_prompt("트랙 사이 대기 시간(초)")
        .default(cfg.download.delay_secs)
        .interact_text()?;

    let tag_files = Confirm::new()
        .with_prompt("MP3에 아티스트/제목 태그 쓰기")
        .default(cfg.download.tag_files)
        .interact()?;

    let ytdlp: String = Input::new()
        .with_prompt("yt-dlp 실행 파일")
        .with_initial_text(cfg.tools.ytdlp.clone())
        .interact_text()?;

    let ffmpeg: String = Input::new()
        .with_prompt("ffmpeg 실행 파일")
        .with_initial_text(cfg.tools.ffmpeg.clone())
        .interact_text()?;

    cfg.download.output_dir = PathBuf::from(output_dir);
    cfg.download.format = AudioFormat::ALL[format_idx];
    cfg.download.quality = quality
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    cfg.download.delay_secs = delay_secs;
    cfg.download.tag_files = tag_files;
    cfg.tools.ytdlp = ytdlp;
    cfg.tools.ffmpeg = ffmpeg;

    config::save_config(&cfg)?;
    println!("\n설정이 저장되었습니다!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_second_interrupt_exits() {
        let cancel = CancelFlag::new();
        assert!(!on_interrupt(&cancel));
        assert!(cancel.is_cancelled());
        assert!(on_interrupt(&cancel));
    }

    #[test]
    fn test_download_flags() {
        let cli = Cli::try_parse_from([
            "trackgrab",
            "-vv",
            "download",
            "https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3",
            "-f",
            "flac",
            "-q",
            "320k",
            "--auto-folder",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.format, Some(AudioFormat::Flac));
                assert_eq!(args.quality, Some(Quality::Kbps(320)));
                assert!(args.auto_folder);
                assert!(args.folder.is_none());
            }
            _ => panic!("download 명령이어야 합니다"),
        }
    }

    #[test]
    fn test_folder_conflicts_with_auto_folder() {
        let result = Cli::try_parse_from([
            "trackgrab",
            "download",
            "https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3",
            "--folder",
            "x",
            "--auto-folder",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_quality_is_rejected() {
        let result = Cli::try_parse_from([
            "trackgrab",
            "download",
            "https://open.spotify.com/track/4iV5W9uYEdYUVa79Axb7Rh",
            "-q",
            "loud",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "0.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
