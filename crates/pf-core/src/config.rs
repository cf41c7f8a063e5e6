//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! sub-configs for tools, encoding defaults and output. Every section
//! defaults sensibly so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::job::AvifTuning;
use crate::media::TargetFormat;
use crate::quality::{Crf, WebpQuality};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub encode: EncodeConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Serialize the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("config serialize error: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.tools.timeout_secs == 0 {
            warnings.push("tools.timeout_secs is 0; encodes will time out immediately".into());
        }

        if let Some(ref path) = self.tools.ffmpeg_path {
            if !path.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path '{}' does not exist",
                    path.display()
                ));
            }
        }

        if self.encode.parallelism == 0 {
            warnings.push("encode.parallelism is 0; one job at a time will be used".into());
        }

        let tuning = &self.encode.avif;
        if tuning.threads == 0 {
            warnings.push("encode.avif.threads is 0; the encoder will pick a count".into());
        }
        if tuning.tile_columns == 0 || tuning.tile_rows == 0 {
            warnings.push(format!(
                "encode.avif tile grid {} has an empty dimension",
                tuning.tiles()
            ));
        }

        match self.output.destination.as_deref() {
            None => warnings.push(
                "output.destination is not set; pass --output or run `pixforge set-output`".into(),
            ),
            Some(token) if token.trim().is_empty() => {
                warnings.push("output.destination is empty".into())
            }
            _ => {}
        }

        if self.output.share_command.is_none() && !self.output.share_args.is_empty() {
            warnings.push("output.share_args is set but output.share_command is not".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// External tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit ffmpeg binary; `PATH` is searched when unset.
    pub ffmpeg_path: Option<PathBuf>,
    /// Per-image encode timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    300
}

/// Encoding defaults applied when the command line does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub format: TargetFormat,
    pub crf: Crf,
    pub webp_quality: WebpQuality,
    /// Number of jobs encoded concurrently within a run.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    pub avif: AvifTuning,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            format: TargetFormat::default(),
            crf: Crf::default(),
            webp_quality: WebpQuality::default(),
            parallelism: default_parallelism(),
            avif: AvifTuning::default(),
        }
    }
}

fn default_parallelism() -> usize {
    1
}

/// Where results go once encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Persisted destination token (`tree:<dir>`, `file://<dir>` or a path).
    pub destination: Option<String>,
    /// Staging directory for encoder output. Cleared at the start of every run.
    pub scratch_dir: PathBuf,
    /// Program handed each published file after a successful copy.
    pub share_command: Option<String>,
    /// Extra arguments placed before the file locator.
    pub share_args: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            destination: None,
            scratch_dir: std::env::temp_dir().join("pixforge-scratch"),
            share_command: None,
            share_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.tools.timeout_secs, 300);
        assert_eq!(cfg.encode.format, TargetFormat::Avif);
        assert_eq!(cfg.encode.crf.value(), 28);
        assert_eq!(cfg.encode.webp_quality.value(), 56);
        assert_eq!(cfg.encode.parallelism, 1);
        assert_eq!(cfg.encode.avif, AvifTuning::default());
        assert!(cfg.output.destination.is_none());
    }

    #[test]
    fn default_config_only_warns_about_destination() {
        let warnings = Config::default().validate();
        assert_eq!(warnings.len(), 1, "unexpected warnings: {:?}", warnings);
        assert!(warnings[0].contains("output.destination"));
    }

    #[test]
    fn parse_toml_config() {
        let toml = r#"
            [tools]
            timeout_secs = 60

            [encode]
            format = "webp"
            crf = 20
            webp_quality = 90

            [encode.avif]
            threads = 8

            [output]
            destination = "tree:/sdcard/Pictures"
        "#;
        let cfg = Config::from_toml(toml).unwrap();
        assert_eq!(cfg.tools.timeout_secs, 60);
        assert_eq!(cfg.encode.format, TargetFormat::Webp);
        assert_eq!(cfg.encode.crf.value(), 20);
        assert_eq!(cfg.encode.webp_quality.value(), 90);
        assert_eq!(cfg.encode.avif.threads, 8);
        assert_eq!(cfg.encode.avif.cpu_used, 4);
        assert_eq!(cfg.output.destination.as_deref(), Some("tree:/sdcard/Pictures"));
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn out_of_range_crf_rejected() {
        let err = Config::from_toml("[encode]\ncrf = 80\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = Config::default();
        cfg.output.destination = Some("/tmp/out".into());
        let text = cfg.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), cfg);
    }

    #[test]
    fn share_args_without_command_warns() {
        let mut cfg = Config::default();
        cfg.output.share_args = vec!["--new-window".into()];
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("share_command")));
    }

    #[test]
    fn zero_parallelism_warns() {
        let mut cfg = Config::default();
        cfg.encode.parallelism = 0;
        assert!(cfg.validate().iter().any(|w| w.contains("parallelism")));
    }
}
