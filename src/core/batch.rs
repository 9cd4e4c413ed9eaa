use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::core::fetcher::{FetchRequest, TrackFetch};
use crate::core::progress::ProgressUpdate;
use crate::core::resolver::Resolver;
use crate::error::{Error, Result};
use crate::models::{ContentKind, DownloadOutcome, DownloadStats, TrackDescriptor};

const CANCEL_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Resolving,
    Downloading,
    Done,
}

/// 배치 진행 중에 관찰자에게 전달되는 이벤트.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    StateChanged(BatchState),
    Resolved {
        count: usize,
        title: Option<String>,
    },
    /// `index`는 1부터 시작한다
    TrackStarted {
        index: usize,
        total: usize,
        track: TrackDescriptor,
    },
    Progress {
        index: usize,
        update: ProgressUpdate,
    },
    TrackFinished {
        index: usize,
        outcome: DownloadOutcome,
    },
    Finished(DownloadStats),
}

/// 트랙 사이에서 확인하는 협조적 취소 플래그.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub request: FetchRequest,
    /// 트랙 사이 대기 시간. 마지막 트랙 뒤에는 기다리지 않는다.
    pub delay: Duration,
    /// 하위 폴더가 지정되지 않았으면 앨범/플레이리스트 이름을 쓴다
    pub auto_folder: bool,
}

/// URL 하나에 대한 해석과 순차 다운로드.
pub struct Batch<F> {
    resolver: Resolver,
    fetcher: F,
    options: BatchOptions,
    cancel: CancelFlag,
}

impl<F: TrackFetch> Batch<F> {
    pub fn new(resolver: Resolver, fetcher: F, options: BatchOptions) -> Self {
        Self {
            resolver,
            fetcher,
            options,
            cancel: CancelFlag::new(),
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// 해석 후 트랙을 하나씩 받는다.
    ///
    /// 잘못된 URL과 출력 디렉토리 문제만 에러로 돌려주고,
    /// 개별 트랙 실패는 통계에만 반영된다.
    /// 도중에 중단되면 그때까지의 통계가 `Finished` 이벤트로 먼저 나간다.
    pub fn run(&self, url: &str, on_event: &mut dyn FnMut(BatchEvent)) -> Result<DownloadStats> {
        let on_event = RefCell::new(on_event);
        let emit = |event: BatchEvent| {
            let mut observer = on_event.borrow_mut();
            (*observer)(event)
        };

        emit(BatchEvent::StateChanged(BatchState::Resolving));
        let resolution = self.resolver.resolve(url)?;
        let total = resolution.tracks.len();
        emit(BatchEvent::Resolved {
            count: total,
            title: resolution.title.clone(),
        });

        let mut stats = DownloadStats::new(total);
        if total == 0 {
            tracing::warn!("트랙을 찾지 못했습니다: {}", url);
            return Ok(self.finish(stats, &emit));
        }

        let request = self.request_for(resolution.reference.kind(), resolution.title.as_deref());
        self.fetcher.prepare(&request)?;
        emit(BatchEvent::StateChanged(BatchState::Downloading));

        for (i, track) in resolution.tracks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("취소되었습니다 ({}/{} 완료)", stats.attempted(), total);
                break;
            }

            let index = i + 1;
            emit(BatchEvent::TrackStarted {
                index,
                total,
                track: track.clone(),
            });

            let sink = |update: &ProgressUpdate| {
                emit(BatchEvent::Progress {
                    index,
                    update: update.clone(),
                })
            };
            let success = match self.fetcher.fetch(track, &request, &sink) {
                Ok(success) => success,
                Err(e) => {
                    tracing::error!("배치 중단 ({}/{} 완료): {}", stats.attempted(), total, e);
                    self.finish(stats, &emit);
                    return Err(e);
                }
            };
            let outcome = DownloadOutcome {
                track: track.clone(),
                success,
            };
            stats.record(&outcome);
            emit(BatchEvent::TrackFinished { index, outcome });

            if index < total {
                self.pause();
            }
        }

        Ok(self.finish(stats, &emit))
    }

    fn request_for(&self, kind: ContentKind, title: Option<&str>) -> FetchRequest {
        let mut request = self.options.request.clone();
        if request.subfolder.is_none() && self.options.auto_folder && kind != ContentKind::Track {
            request.subfolder = title.map(str::to_string);
        }
        request
    }

    /// 대기 중에도 취소를 확인한다.
    fn pause(&self) {
        let deadline = Instant::now() + self.options.delay;
        while !self.cancel.is_cancelled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(CANCEL_POLL));
        }
    }

    fn finish(&self, stats: DownloadStats, emit: &dyn Fn(BatchEvent)) -> DownloadStats {
        tracing::info!(
            "완료: 전체 {}, 성공 {}, 실패 {}",
            stats.total,
            stats.successful,
            stats.failed
        );
        emit(BatchEvent::StateChanged(BatchState::Done));
        emit(BatchEvent::Finished(stats));
        stats
    }
}

/// 백그라운드 스레드에서 실행 중인 배치.
pub struct BatchHandle {
    cancel: CancelFlag,
    events: Receiver<BatchEvent>,
    worker: JoinHandle<Result<DownloadStats>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 다른 스레드(시그널 핸들러 등)에 넘길 취소 플래그.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    pub fn join(self) -> Result<DownloadStats> {
        self.worker
            .join()
            .map_err(|_| Error::tool("batch", "작업 스레드가 비정상 종료했습니다"))?
    }
}

/// 배치를 별도 스레드에서 실행하고 이벤트를 채널로 보낸다.
pub fn spawn_batch<F>(batch: Batch<F>, url: impl Into<String>) -> BatchHandle
where
    F: TrackFetch + Send + 'static,
{
    let url = url.into();
    let cancel = batch.cancel_flag();
    let (tx, rx) = mpsc::channel();

    let worker = std::thread::spawn(move || {
        batch.run(&url, &mut |event| {
            // 수신 측이 사라져도 배치는 끝까지 진행한다
            let _ = tx.send(event);
        })
    });

    BatchHandle {
        cancel,
        events: rx,
        worker,
    }
}
