//! 테스트 전용 가짜 협력자들.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::fetcher::{AudioEngine, FetchRequest, SearchHit, TrackFetch};
use crate::core::progress::{ProgressSink, ProgressUpdate};
use crate::error::{Error, Result};
use crate::models::{ContentReference, TrackDescriptor};
use crate::sources::{Extraction, PageFetcher, TrackSource};

pub fn descriptor(text: &str) -> TrackDescriptor {
    TrackDescriptor::new(text).expect("유효한 테스트 트랙")
}

pub fn descriptors(texts: &[&str]) -> Vec<TrackDescriptor> {
    texts.iter().map(|t| descriptor(t)).collect()
}

/// 호출 횟수 카운터. 소유자가 다른 곳으로 옮겨간 뒤에도 읽을 수 있다.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// URL 접두사로 응답을 고르는 가짜 페이지 fetcher.
#[derive(Clone, Default)]
pub struct FakePages {
    inner: Arc<FakePagesInner>,
}

#[derive(Default)]
struct FakePagesInner {
    pages: Vec<(String, String)>,
    requested: Mutex<Vec<String>>,
}

impl FakePages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, prefix: &str, body: &str) -> Self {
        let mut pages = self.inner.pages.clone();
        pages.push((prefix.to_string(), body.to_string()));
        Self {
            inner: Arc::new(FakePagesInner {
                pages,
                requested: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn shared(&self) -> Arc<dyn PageFetcher> {
        Arc::new(self.clone())
    }

    pub fn requested(&self) -> Vec<String> {
        self.inner.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl PageFetcher for FakePages {
    fn fetch_text(&self, url: &str) -> Result<String> {
        if let Ok(mut requested) = self.inner.requested.lock() {
            requested.push(url.to_string());
        }
        self.inner
            .pages
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, body)| body.clone())
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("404: {url}"),
                ))
            })
    }
}

/// 미리 정해 둔 결과를 차례로 돌려주는 전략. 다 쓰면 빈 결과.
pub struct ScriptedSource {
    name: String,
    script: Mutex<VecDeque<Result<Extraction>>>,
    calls: CallCounter,
}

impl ScriptedSource {
    pub fn new(name: &str, script: Vec<Result<Extraction>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            calls: CallCounter::default(),
        }
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl TrackSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, _reference: &ContentReference, _url: &str) -> Result<Extraction> {
        self.calls.bump();
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| Ok(Extraction::empty()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineBehavior {
    Succeed,
    NoResults,
    EmptyFile,
    Fail,
}

/// 파일을 직접 만들어 내는 가짜 오디오 엔진.
pub struct FakeEngine {
    behavior: EngineBehavior,
}

impl FakeEngine {
    pub fn new(behavior: EngineBehavior) -> Self {
        Self { behavior }
    }
}

impl AudioEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        match self.behavior {
            EngineBehavior::NoResults => Ok(None),
            _ => Ok(Some(SearchHit {
                id: "fake123".to_string(),
                title: query.to_string(),
                url: "https://video.example.com/fake123".to_string(),
                uploader: None,
                duration_secs: Some(180),
            })),
        }
    }

    fn download(
        &self,
        hit: &SearchHit,
        target_dir: &Path,
        request: &FetchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let path = target_dir.join(format!("{}.{}", hit.title, request.format.extension()));
        match self.behavior {
            EngineBehavior::Fail => Err(Error::tool("fake", "download exploded")),
            EngineBehavior::EmptyFile => {
                std::fs::write(&path, b"")?;
                Ok(path)
            }
            _ => {
                for percent in [50.0, 100.0] {
                    progress.report(&ProgressUpdate {
                        percent,
                        speed: None,
                        eta: None,
                    });
                }
                std::fs::write(&path, b"fake audio payload")?;
                Ok(path)
            }
        }
    }
}

/// 정해 둔 성공/실패 순서대로 응답하는 가짜 트랙 fetcher.
pub struct FakeFetch {
    results: RefCell<VecDeque<bool>>,
    pub fetched: RefCell<Vec<TrackDescriptor>>,
    pub prepared: RefCell<Vec<FetchRequest>>,
    prepare_error: bool,
}

impl FakeFetch {
    pub fn new(results: &[bool]) -> Self {
        Self {
            results: RefCell::new(results.iter().copied().collect()),
            fetched: RefCell::new(Vec::new()),
            prepared: RefCell::new(Vec::new()),
            prepare_error: false,
        }
    }

    pub fn failing_prepare() -> Self {
        Self {
            prepare_error: true,
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.fetched.borrow().len()
    }
}

impl TrackFetch for FakeFetch {
    fn prepare(&self, request: &FetchRequest) -> Result<PathBuf> {
        self.prepared.borrow_mut().push(request.clone());
        if self.prepare_error {
            return Err(Error::output_dir(
                "/nonexistent/out",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ));
        }
        Ok(PathBuf::from("downloaded"))
    }

    fn fetch(
        &self,
        track: &TrackDescriptor,
        _request: &FetchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<bool> {
        self.fetched.borrow_mut().push(track.clone());
        progress.report(&ProgressUpdate {
            percent: 100.0,
            speed: None,
            eta: None,
        });
        Ok(self.results.borrow_mut().pop_front().unwrap_or(true))
    }
}
