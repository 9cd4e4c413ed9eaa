use std::sync::LazyLock;

use regex::Regex;

/// 다운로드 진행 상황. 표시용이며 제어 흐름에는 영향을 주지 않는다.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percent: f32,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

/// 진행 상황을 받는 관찰자.
pub trait ProgressSink {
    fn report(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate),
{
    fn report(&self, update: &ProgressUpdate) {
        self(update)
    }
}

static PROGRESS_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\[download\]\s+(\d+(?:\.\d+)?)%(?:.*?\bat\s+(\S+))?(?:.*?\bETA\s+(\S+))?",
    )
    .ok()
});

/// yt-dlp `--newline` 진행 줄을 파싱한다.
///
/// 예: `[download]  45.2% of    3.10MiB at    1.20MiB/s ETA 00:02`
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let caps = PROGRESS_LINE.as_ref()?.captures(line.trim())?;
    let percent = caps[1].parse::<f32>().ok()?.clamp(0.0, 100.0);
    let known = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.starts_with("Unknown") && s != "N/A")
    };
    Some(ProgressUpdate {
        percent,
        speed: known(2),
        eta: known(3),
    })
}
