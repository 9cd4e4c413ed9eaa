//! 터미널 출력 도우미. 배치 이벤트를 진행 막대와 상태 줄로 바꾼다.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::batch::{BatchEvent, BatchState};
use crate::models::DownloadStats;

pub fn success(msg: &str) -> String {
    format!("✓ {msg}")
}

pub fn failure(msg: &str) -> String {
    format!("✗ {msg}")
}

pub fn warning(msg: &str) -> String {
    format!("⚠ {msg}")
}

pub fn item(msg: &str) -> String {
    format!("• {msg}")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(msg.to_string());
    pb
}

fn track_bar(prefix: String, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_prefix(prefix);
    pb.set_message(msg.to_string());
    pb
}

/// 배치 이벤트를 받아 화면을 갱신한다.
#[derive(Default)]
pub struct BatchView {
    state: BatchState,
    stats: Option<DownloadStats>,
    resolving: Option<ProgressBar>,
    current: Option<ProgressBar>,
    current_track: String,
}

impl BatchView {
    pub fn new() -> Self {
        Self {
            state: BatchState::Idle,
            stats: None,
            resolving: None,
            current: None,
            current_track: String::new(),
        }
    }

    /// 배치가 `Done`에 도달했을 때의 통계. 중간에 중단된 배치도 포함한다.
    pub fn finished(&self) -> Option<DownloadStats> {
        self.stats.filter(|_| self.state == BatchState::Done)
    }

    pub fn handle(&mut self, event: &BatchEvent) {
        match event {
            BatchEvent::StateChanged(state) => {
                self.state = *state;
                if *state == BatchState::Resolving {
                    self.resolving = Some(spinner("트랙 목록을 가져오는 중..."));
                }
            }
            BatchEvent::Resolved { count, title } => {
                if let Some(pb) = self.resolving.take() {
                    pb.finish_and_clear();
                }
                let name = title.as_deref().map(|t| format!(" ({t})")).unwrap_or_default();
                if *count == 0 {
                    println!("{}", failure("트랙을 찾지 못했습니다"));
                } else {
                    println!("{}", success(&format!("트랙 {count}개를 찾았습니다{name}")));
                }
            }
            BatchEvent::TrackStarted { index, total, track } => {
                self.current = Some(track_bar(format!("[{index}/{total}]"), track.as_str()));
                self.current_track = track.to_string();
            }
            BatchEvent::Progress { update, .. } => {
                if let Some(pb) = &self.current {
                    pb.set_position(update.percent.round() as u64);
                    if let Some(speed) = &update.speed {
                        let eta = update.eta.as_deref().map(|e| format!(", {e}")).unwrap_or_default();
                        pb.set_message(format!("{} ({speed}{eta})", self.current_track));
                    }
                }
            }
            BatchEvent::TrackFinished { index, outcome } => {
                if let Some(pb) = self.current.take() {
                    pb.finish_and_clear();
                }
                let line = format!("{index}. {}", outcome.track);
                if outcome.success {
                    println!("{}", success(&line));
                } else {
                    println!("{}", failure(&line));
                }
            }
            BatchEvent::Finished(stats) => {
                self.stats = Some(*stats);
                if let Some(pb) = self.current.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }
}

impl Drop for BatchView {
    fn drop(&mut self) {
        for pb in [self.resolving.take(), self.current.take()].into_iter().flatten() {
            pb.finish_and_clear();
        }
    }
}
