//! Shared test harness for pipeline integration tests.
//!
//! Provides stub [`Encoder`]s that stand in for ffmpeg, a flaky
//! [`Destination`], and a [`TestHarness`] wiring an [`Orchestrator`] to
//! temporary input, scratch and output directories.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pf_av::{EncodeOutput, EncodeRequest, Encoder, LogSender, ScratchArea};
use pf_core::events::EventBus;
use pf_core::SourceImage;
use pf_pipeline::{CreatedFile, Destination, DirectoryDestination, NoShare, Orchestrator};
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Stub encoders
// ---------------------------------------------------------------------------

/// Copies the input to the output verbatim and reports success.
pub struct CopyEncoder;

impl CopyEncoder {
    fn copy(request: &EncodeRequest, log: &LogSender) -> EncodeOutput {
        log.send(&format!("Input #0, from '{}'", request.input));
        match std::fs::copy(&request.input, &request.output) {
            Ok(_) => {
                log.send("video:1kB muxing overhead: 0.1%");
                EncodeOutput {
                    return_code: 0,
                    log: format!("converted {}\n", request.input),
                }
            }
            Err(e) => EncodeOutput {
                return_code: 1,
                log: format!("{}: {e}\n", request.input),
            },
        }
    }
}

#[async_trait]
impl Encoder for CopyEncoder {
    fn name(&self) -> &str {
        "copy"
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        log: &LogSender,
        _cancel: &CancellationToken,
    ) -> pf_core::Result<EncodeOutput> {
        Ok(Self::copy(request, log))
    }
}

/// Always exits non-zero without writing anything.
pub struct FailingEncoder;

#[async_trait]
impl Encoder for FailingEncoder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        log: &LogSender,
        _cancel: &CancellationToken,
    ) -> pf_core::Result<EncodeOutput> {
        let line = format!("{}: Invalid data found when processing input", request.input);
        log.send(&line);
        Ok(EncodeOutput {
            return_code: 1,
            log: format!("{line}\n"),
        })
    }
}

/// Stages its copy right away, then holds the result until released (or
/// cancelled).
#[derive(Default)]
pub struct BlockingEncoder {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl Encoder for BlockingEncoder {
    fn name(&self) -> &str {
        "blocking"
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        log: &LogSender,
        cancel: &CancellationToken,
    ) -> pf_core::Result<EncodeOutput> {
        let out = CopyEncoder::copy(request, log);
        self.started.notify_one();
        tokio::select! {
            _ = self.release.notified() => Ok(out),
            _ = cancel.cancelled() => Err(pf_core::Error::Cancelled("encode killed".into())),
        }
    }
}

/// Copies like [`CopyEncoder`] while recording how many encodes overlap.
#[derive(Default)]
pub struct OverlapCounter {
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Encoder for OverlapCounter {
    fn name(&self) -> &str {
        "overlap"
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        log: &LogSender,
        _cancel: &CancellationToken,
    ) -> pf_core::Result<EncodeOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let out = CopyEncoder::copy(request, log);

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Stub destinations
// ---------------------------------------------------------------------------

/// Plain directory that refuses the `refuse_at`-th file it is asked for
/// (zero-based), as if permission was revoked for that one document.
pub struct RefusingOnce {
    dir: DirectoryDestination,
    refuse_at: usize,
    calls: AtomicUsize,
}

impl RefusingOnce {
    pub fn new(dir: &Path, refuse_at: usize) -> Self {
        Self {
            dir: DirectoryDestination::new(dir.to_path_buf()).expect("failed to open output dir"),
            refuse_at,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Destination for RefusingOnce {
    fn describe(&self) -> String {
        format!("refusing {}", self.dir.describe())
    }

    fn create(&self, name: &str, media_type: &str) -> pf_core::Result<CreatedFile> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.refuse_at {
            return Err(pf_core::Error::destination(format!(
                "permission revoked for {name}"
            )));
        }
        self.dir.create(name, media_type)
    }

    fn discard(&self, created: CreatedFile) -> pf_core::Result<()> {
        self.dir.discard(created)
    }

    fn local_root(&self) -> Option<&Path> {
        self.dir.local_root()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Orchestrator plus the temporary directories it works in.
pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub input: TempDir,
    pub output: TempDir,
    pub scratch: TempDir,
    /// Parent directory the orchestrator stages runs under.
    pub scratch_root: PathBuf,
}

impl TestHarness {
    /// Harness saving into a plain output directory.
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        let output = TempDir::new().expect("failed to create output dir");
        let destination = Arc::new(
            DirectoryDestination::new(output.path().to_path_buf())
                .expect("failed to open output dir"),
        );
        Self::with_destination(encoder, destination, output)
    }

    /// Harness saving into a custom destination. `output` is kept alive for
    /// the destination's backing directory.
    pub fn with_destination(
        encoder: Arc<dyn Encoder>,
        destination: Arc<dyn Destination>,
        output: TempDir,
    ) -> Self {
        let scratch = TempDir::new().expect("failed to create scratch dir");
        let root = scratch.path().join("staging");
        Self::assemble(encoder, destination, output, scratch, root)
    }

    /// Harness with its own output directory staging under `other`'s
    /// scratch root, like a second process on the same machine.
    pub fn sharing_scratch_with(other: &TestHarness, encoder: Arc<dyn Encoder>) -> Self {
        let output = TempDir::new().expect("failed to create output dir");
        let destination = Arc::new(
            DirectoryDestination::new(output.path().to_path_buf())
                .expect("failed to open output dir"),
        );
        let scratch = TempDir::new().expect("failed to create scratch dir");
        let root = other.scratch_root.clone();
        Self::assemble(encoder, destination, output, scratch, root)
    }

    fn assemble(
        encoder: Arc<dyn Encoder>,
        destination: Arc<dyn Destination>,
        output: TempDir,
        scratch: TempDir,
        scratch_root: PathBuf,
    ) -> Self {
        let input = TempDir::new().expect("failed to create input dir");
        let orchestrator = Orchestrator::new(
            encoder,
            destination,
            Arc::new(NoShare),
            ScratchArea::new(scratch_root.clone()),
            Arc::new(EventBus::default()),
        );

        Self {
            orchestrator,
            input,
            output,
            scratch,
            scratch_root,
        }
    }

    /// Write `count` small fake images into the input directory.
    pub fn write_images(&self, count: usize) -> Vec<SourceImage> {
        (0..count)
            .map(|i| {
                let path = self.input.path().join(format!("photo_{i}.png"));
                std::fs::write(&path, fake_png(i)).expect("failed to write input image");
                SourceImage::new(path.to_string_lossy().as_ref())
            })
            .collect()
    }

    /// Files currently in the output directory, sorted by name.
    pub fn output_files(&self) -> Vec<PathBuf> {
        list_files(self.output.path())
    }
}

/// Distinct content per index so copies can be told apart.
pub fn fake_png(index: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend(format!("image-{index}").into_bytes());
    bytes
}

/// Regular files directly inside `dir`, sorted, skipping hidden ones.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("failed to read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            !p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
        })
        .collect();
    files.sort();
    files
}
