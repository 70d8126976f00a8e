//! Shared fakes for worker integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use maskclip_media::{FfmpegCommand, MediaError, MediaResult, TranscodeEngine};
use maskclip_models::{SessionId, VolumeOption};
use maskclip_worker::{
    EventDispatcher, MediaSource, PipelineConfig, SessionManager, Transport, TransportError,
    TransportResult,
};

pub const MIB: u64 = 1024 * 1024;

/// One recorded engine invocation.
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub args: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

impl EngineCall {
    /// Value following `flag` in the argument list.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1).map(String::as_str)
    }
}

/// Engine that writes a placeholder output, optionally failing one call.
///
/// A gated engine records each call, then waits for a permit before running it.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    fail_on_call: Option<usize>,
    gate: Option<Semaphore>,
}

impl FakeEngine {
    pub fn failing_on_call(index: usize) -> Self {
        Self {
            fail_on_call: Some(index),
            ..Default::default()
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        }
    }

    /// Let `calls` more gated invocations run.
    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscodeEngine for FakeEngine {
    async fn execute(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(EngineCall {
                args: cmd.build_args(),
                inputs: cmd.inputs().to_vec(),
                output: cmd.output().to_path_buf(),
            });
            calls.len() - 1
        };

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("Engine gate closed").forget();
        }

        if self.fail_on_call == Some(index) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with status 1",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            ));
        }

        tokio::fs::write(cmd.output(), b"transcoded").await?;
        Ok(())
    }
}

/// Everything the pipeline sent back to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(SessionId, String),
    Options(SessionId, String, Vec<VolumeOption>),
    /// Delivered path and whether it existed at delivery time
    Video(SessionId, PathBuf, bool),
}

#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<Outbound>>,
    fail_delivery: bool,
    fail_options: bool,
}

impl FakeTransport {
    pub fn failing_delivery() -> Self {
        Self {
            fail_delivery: true,
            ..Default::default()
        }
    }

    pub fn failing_options() -> Self {
        Self {
            fail_options: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Text(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deliveries(&self) -> Vec<(PathBuf, bool)> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Video(_, path, existed) => Some((path, existed)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&self, session_id: &SessionId, text: &str) -> TransportResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Outbound::Text(session_id.clone(), text.to_string()));
        Ok(())
    }

    async fn present_options(
        &self,
        session_id: &SessionId,
        prompt: &str,
        options: &[VolumeOption],
    ) -> TransportResult<()> {
        if self.fail_options {
            return Err(TransportError::send_failed("Forbidden: bot was blocked by the user"));
        }
        self.sent.lock().unwrap().push(Outbound::Options(
            session_id.clone(),
            prompt.to_string(),
            options.to_vec(),
        ));
        Ok(())
    }

    async fn deliver(&self, session_id: &SessionId, path: &Path) -> TransportResult<()> {
        if self.fail_delivery {
            return Err(TransportError::send_failed("Bad Request: file is too big"));
        }
        let existed = tokio::fs::try_exists(path).await.unwrap_or(false);
        self.sent.lock().unwrap().push(Outbound::Video(
            session_id.clone(),
            path.to_path_buf(),
            existed,
        ));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBehavior {
    Succeed,
    /// Write a partial file, then fail
    Fail,
    Panic,
    /// Write a partial file, then never finish
    Hang,
}

/// Upload body that records how often it was fetched.
///
/// A gated source writes a partial file and waits for a permit before finishing.
pub struct FakeSource {
    behavior: SourceBehavior,
    fetches: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeSource {
    pub fn new(behavior: SourceBehavior) -> Self {
        Self {
            behavior,
            fetches: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    /// Succeeding source held open until a permit is added to the returned gate.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let source = Self {
            gate: Some(gate.clone()),
            ..Self::ok()
        };
        (source, gate)
    }

    pub fn ok() -> Self {
        Self::new(SourceBehavior::Succeed)
    }

    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    async fn fetch_to(&self, dest: &Path) -> TransportResult<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            tokio::fs::write(dest, b"partial").await?;
            gate.acquire().await.expect("Source gate closed").forget();
        }
        match self.behavior {
            SourceBehavior::Succeed => {
                tokio::fs::write(dest, b"uploaded video").await?;
                Ok(())
            }
            SourceBehavior::Fail => {
                tokio::fs::write(dest, b"partial").await?;
                Err(TransportError::download_failed("connection reset"))
            }
            SourceBehavior::Panic => panic!("download task panicked"),
            SourceBehavior::Hang => {
                tokio::fs::write(dest, b"partial").await?;
                std::future::pending().await
            }
        }
    }
}

/// Manager wired to fakes over a temporary staging root.
pub struct Harness {
    pub dir: TempDir,
    pub engine: Arc<FakeEngine>,
    pub transport: Arc<FakeTransport>,
    pub manager: Arc<SessionManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(FakeEngine::default(), FakeTransport::default(), |c| c)
    }

    pub fn with_engine(engine: FakeEngine) -> Self {
        Self::build(engine, FakeTransport::default(), |c| c)
    }

    pub fn with_transport(transport: FakeTransport) -> Self {
        Self::build(FakeEngine::default(), transport, |c| c)
    }

    pub fn with_config(configure: impl FnOnce(PipelineConfig) -> PipelineConfig) -> Self {
        Self::build(FakeEngine::default(), FakeTransport::default(), configure)
    }

    pub fn build(
        engine: FakeEngine,
        transport: FakeTransport,
        configure: impl FnOnce(PipelineConfig) -> PipelineConfig,
    ) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(&staging).expect("Failed to create staging dir");
        let mask = dir.path().join("mask.mp4");
        std::fs::write(&mask, b"mask").expect("Failed to write mask");

        let config = configure(
            PipelineConfig::default()
                .with_staging_dir(&staging)
                .with_mask_path(&mask),
        );

        let engine = Arc::new(engine);
        let transport = Arc::new(transport);
        let manager = Arc::new(SessionManager::new(
            config,
            engine.clone(),
            transport.clone(),
        ));

        Self {
            dir,
            engine,
            transport,
            manager,
        }
    }

    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(self.manager.clone())
    }

    /// Files currently present in the staging root.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.manager.staging().root())
            .expect("Failed to read staging dir")
            .map(|entry| entry.expect("Failed to read entry").path())
            .collect()
    }
}

/// Poll `condition` until it holds, failing the test after about five seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Timed out waiting for {}", what);
}

/// Wait until the manager holds no active job.
pub async fn wait_until_idle(manager: &SessionManager) {
    for _ in 0..1000 {
        if manager.active_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Timed out waiting for the active-job map to drain");
}

pub fn session(id: i64) -> SessionId {
    SessionId::from(id)
}
