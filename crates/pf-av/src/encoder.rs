//! The encoder seam and its ffmpeg implementation.
//!
//! [`Encoder`] is the one method the pipeline needs from a codec tool:
//! hand it an input, an output path and format-specific settings, get back
//! the tool's return code and everything it printed. Tests substitute a
//! deterministic stub for [`FfmpegEncoder`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use pf_core::EncodeSettings;
use tokio_util::sync::CancellationToken;

use crate::command::{LogSender, ToolCommand};
use crate::tools::ToolRegistry;

/// Chroma layout every output is normalized to.
const PIXEL_FORMAT: &str = "yuv420p";

/// What to encode and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    /// Input argument for the tool (a local path or a URL it can open).
    pub input: String,
    /// Where the tool writes its output.
    pub output: PathBuf,
    pub settings: EncodeSettings,
}

/// Terminal state of one encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutput {
    /// The tool's return code. `0` means success.
    pub return_code: i32,
    /// Accumulated log text.
    pub log: String,
}

impl EncodeOutput {
    pub fn succeeded(&self) -> bool {
        self.return_code == 0
    }
}

/// An external codec tool.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// A short, human-readable name for this encoder (e.g. "ffmpeg").
    fn name(&self) -> &str;

    /// Run one encode to completion.
    ///
    /// Log lines are forwarded to `log` as the tool produces them. An `Err`
    /// means the invocation layer itself failed (the tool could not be
    /// started, timed out, or was cancelled); a tool that ran and reported
    /// failure yields `Ok` with a non-zero return code.
    async fn encode(
        &self,
        request: &EncodeRequest,
        log: &LogSender,
        cancel: &CancellationToken,
    ) -> pf_core::Result<EncodeOutput>;
}

/// [`Encoder`] backed by the ffmpeg command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    /// Use the ffmpeg found by the registry, with its configured timeout.
    pub fn from_registry(registry: &ToolRegistry) -> pf_core::Result<Self> {
        let tool = registry.require("ffmpeg")?;
        Ok(Self::new(tool.path.clone(), tool.timeout))
    }

    /// Argument list for a request, excluding the program itself.
    pub fn args(request: &EncodeRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-y".into(),
            "-i".into(),
            request.input.clone(),
        ];

        match &request.settings {
            EncodeSettings::Avif { crf, tuning } => {
                args.extend([
                    "-crf".to_string(),
                    crf.to_string(),
                    // Constant quality mode: no bitrate target.
                    "-b:v".to_string(),
                    "0".to_string(),
                    "-threads".to_string(),
                    tuning.threads.to_string(),
                    "-cpu-used".to_string(),
                    tuning.cpu_used.to_string(),
                    "-row-mt".to_string(),
                    if tuning.row_mt { "1" } else { "0" }.to_string(),
                    "-tiles".to_string(),
                    tuning.tiles(),
                ]);
            }
            EncodeSettings::Webp { quality } => {
                args.extend(["-q".to_string(), quality.to_string()]);
            }
        }

        args.extend([
            "-pix_fmt".to_string(),
            PIXEL_FORMAT.to_string(),
            request.output.to_string_lossy().into_owned(),
        ]);
        args
    }

    /// Build the [`ToolCommand`] for a request.
    pub fn command(&self, request: &EncodeRequest) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(Self::args(request)).timeout(self.timeout);
        cmd
    }

    /// Full command line for a request, as printed by `--dry-run`.
    pub fn command_line(&self, request: &EncodeRequest) -> String {
        self.command(request).command_line()
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        log: &LogSender,
        cancel: &CancellationToken,
    ) -> pf_core::Result<EncodeOutput> {
        let output = self.command(request).run_streaming(log, cancel).await?;
        let return_code = output.code();

        if return_code != 0 {
            tracing::debug!(
                "ffmpeg exited with code {return_code} for {}",
                request.input
            );
        }

        Ok(EncodeOutput {
            return_code,
            log: output.log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_core::{AvifTuning, Crf, WebpQuality};

    fn avif_request() -> EncodeRequest {
        EncodeRequest {
            input: "/in/cat.jpg".into(),
            output: PathBuf::from("/scratch/0001.avif"),
            settings: EncodeSettings::Avif {
                crf: Crf::new(28).unwrap(),
                tuning: AvifTuning::default(),
            },
        }
    }

    #[test]
    fn avif_args() {
        let args = FfmpegEncoder::args(&avif_request());
        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostdin", "-y", "-i", "/in/cat.jpg", "-crf", "28", "-b:v",
                "0", "-threads", "4", "-cpu-used", "4", "-row-mt", "1", "-tiles", "2x2",
                "-pix_fmt", "yuv420p", "/scratch/0001.avif",
            ]
        );
    }

    #[test]
    fn webp_args() {
        let request = EncodeRequest {
            input: "/in/dog.png".into(),
            output: PathBuf::from("/scratch/0002.webp"),
            settings: EncodeSettings::Webp {
                quality: WebpQuality::new(56).unwrap(),
            },
        };
        let args = FfmpegEncoder::args(&request);
        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostdin", "-y", "-i", "/in/dog.png", "-q", "56", "-pix_fmt",
                "yuv420p", "/scratch/0002.webp",
            ]
        );
        assert!(!args.contains(&"-tiles".to_string()));
    }

    #[test]
    fn tuning_is_reflected() {
        let mut request = avif_request();
        request.settings = EncodeSettings::Avif {
            crf: Crf::new(10).unwrap(),
            tuning: AvifTuning {
                threads: 8,
                cpu_used: 6,
                row_mt: false,
                tile_columns: 4,
                tile_rows: 1,
            },
        };
        let line = FfmpegEncoder::new(PathBuf::from("ffmpeg"), Duration::from_secs(1))
            .command_line(&request);
        assert!(line.starts_with("ffmpeg -hide_banner"));
        assert!(line.contains("-crf 10"));
        assert!(line.contains("-threads 8"));
        assert!(line.contains("-cpu-used 6"));
        assert!(line.contains("-row-mt 0"));
        assert!(line.contains("-tiles 4x1"));
    }

    /// Write an executable shell script standing in for ffmpeg.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fake_ffmpeg_success_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        // The output path is the last argument.
        let program = fake_ffmpeg(
            dir.path(),
            r#"echo "encoding" >&2
for last; do :; done
printf 'AVIF' > "$last""#,
        );
        let mut request = avif_request();
        request.output = dir.path().join("out.avif");

        let encoder = FfmpegEncoder::new(program, Duration::from_secs(10));
        let out = encoder
            .encode(&request, &LogSender::noop(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(out.succeeded());
        assert_eq!(out.log, "encoding\n");
        assert_eq!(std::fs::read(&request.output).unwrap(), b"AVIF");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fake_ffmpeg_failure_keeps_log() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(
            dir.path(),
            "echo 'Invalid data found when processing input' >&2\nexit 1",
        );

        let encoder = FfmpegEncoder::new(program, Duration::from_secs(10));
        let out = encoder
            .encode(&avif_request(), &LogSender::noop(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!out.succeeded());
        assert_eq!(out.return_code, 1);
        assert_eq!(out.log, "Invalid data found when processing input\n");
    }

    #[test]
    fn from_registry_requires_ffmpeg() {
        assert!(FfmpegEncoder::from_registry(&ToolRegistry::default()).is_err());
    }
}
