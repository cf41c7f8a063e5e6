//! Wiring between configuration, command-line overrides and the pipeline.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use pf_av::{Encoder, ScratchArea};
use pf_core::config::{Config, EncodeConfig, OutputConfig};
use pf_core::events::EventBus;
use pf_core::quality::slider;
use pf_core::{Crf, EncodeSettings, TargetFormat, WebpQuality};
use pf_pipeline::{CommandShare, Destination, DestinationToken, NoShare, Orchestrator, Share};

/// Quality overrides taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct QualityOverrides {
    pub format: Option<TargetFormat>,
    pub crf: Option<u32>,
    pub webp_quality: Option<u32>,
    /// Unified 0-100 quality, converted to the format's own scale.
    pub slider: Option<f64>,
}

/// Combine configured encoding defaults with command-line overrides.
///
/// The AVIF CRF and the WEBP quality stay independent; the slider is the
/// only place one scale is derived from the other.
pub fn resolve_settings(
    defaults: &EncodeConfig,
    overrides: &QualityOverrides,
) -> Result<EncodeSettings> {
    let format = overrides.format.unwrap_or(defaults.format);

    if let Some(percent) = overrides.slider {
        if !(0.0..=100.0).contains(&percent) {
            bail!("--slider must be between 0 and 100, got {percent}");
        }
    }

    let settings = match format {
        TargetFormat::Avif => {
            if overrides.webp_quality.is_some() {
                bail!("--webp-quality only applies to webp output; use --crf for avif");
            }
            let crf = match (overrides.crf, overrides.slider) {
                (Some(crf), _) => Crf::new(crf)?,
                (None, Some(percent)) => Crf::new(slider::percent_to_crf(percent).min(Crf::MAX))?,
                (None, None) => defaults.crf,
            };
            EncodeSettings::Avif {
                crf,
                tuning: defaults.avif.clone(),
            }
        }
        TargetFormat::Webp => {
            if overrides.crf.is_some() {
                bail!("--crf only applies to avif output; use --webp-quality for webp");
            }
            let quality = match (overrides.webp_quality, overrides.slider) {
                (Some(q), _) => WebpQuality::new(q)?,
                (None, Some(percent)) => WebpQuality::new(percent.round() as u32)?,
                (None, None) => defaults.webp_quality,
            };
            EncodeSettings::Webp { quality }
        }
    };

    Ok(settings)
}

/// Destination for this run: the command-line override, else the persisted token.
pub fn resolve_destination(
    cli_output: Option<&str>,
    output: &OutputConfig,
) -> Result<DestinationToken> {
    let raw = cli_output
        .or(output.destination.as_deref())
        .context("No output destination; pass --output or run `pixforge set-output <dir>`")?;
    raw.parse::<DestinationToken>()
        .with_context(|| format!("Invalid output destination {raw:?}"))
}

/// Share step configured for this run.
pub fn build_share(output: &OutputConfig, disabled: bool) -> Arc<dyn Share> {
    match (&output.share_command, disabled) {
        (Some(program), false) => Arc::new(CommandShare::new(program, output.share_args.clone())),
        _ => Arc::new(NoShare),
    }
}

/// Assemble an orchestrator from configuration and the chosen backends.
///
/// Fails when the scratch directory would contain the destination.
pub fn build_orchestrator(
    config: &Config,
    encoder: Arc<dyn Encoder>,
    destination: Arc<dyn Destination>,
    share: Arc<dyn Share>,
    events: Arc<EventBus>,
) -> Result<Orchestrator> {
    let scratch = ScratchArea::new(config.output.scratch_dir.clone());
    if let Some(root) = destination.local_root() {
        scratch
            .check_disjoint(root)
            .context("Set output.scratch_dir to a directory outside the destination")?;
    }
    Ok(Orchestrator::new(encoder, destination, share, scratch, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn defaults() -> EncodeConfig {
        EncodeConfig::default()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let settings = resolve_settings(&defaults(), &QualityOverrides::default()).unwrap();
        assert_eq!(settings.format(), TargetFormat::Avif);
        assert_eq!(settings.quality_value(), 28);
    }

    #[test]
    fn webp_default_quality_is_independent_of_crf() {
        let mut cfg = defaults();
        cfg.crf = Crf::new(10).unwrap();
        let overrides = QualityOverrides {
            format: Some(TargetFormat::Webp),
            ..Default::default()
        };
        let settings = resolve_settings(&cfg, &overrides).unwrap();
        assert_eq!(settings.quality_value(), 56);
    }

    #[test]
    fn slider_maps_onto_each_scale() {
        let avif = resolve_settings(
            &defaults(),
            &QualityOverrides {
                slider: Some(100.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(avif.quality_value(), 0);

        // 0% would be CRF 65, which the encoder caps at 63.
        let worst = resolve_settings(
            &defaults(),
            &QualityOverrides {
                slider: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(worst.quality_value(), Crf::MAX);

        let webp = resolve_settings(
            &defaults(),
            &QualityOverrides {
                format: Some(TargetFormat::Webp),
                slider: Some(56.9),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(webp.quality_value(), 57);
    }

    #[test]
    fn mismatched_quality_flag_rejected() {
        let err = resolve_settings(
            &defaults(),
            &QualityOverrides {
                format: Some(TargetFormat::Webp),
                crf: Some(20),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("--crf"));

        assert!(resolve_settings(
            &defaults(),
            &QualityOverrides {
                webp_quality: Some(80),
                ..Default::default()
            },
        )
        .is_err());
    }

    #[test]
    fn out_of_range_values_rejected() {
        for overrides in [
            QualityOverrides {
                crf: Some(64),
                ..Default::default()
            },
            QualityOverrides {
                slider: Some(120.0),
                ..Default::default()
            },
        ] {
            assert!(resolve_settings(&defaults(), &overrides).is_err());
        }
    }

    #[test]
    fn cli_destination_overrides_config() {
        let mut output = OutputConfig::default();
        output.destination = Some("tree:/persisted".into());

        assert_eq!(
            resolve_destination(None, &output).unwrap(),
            DestinationToken::Tree(PathBuf::from("/persisted"))
        );
        assert_eq!(
            resolve_destination(Some("/tmp/out"), &output).unwrap(),
            DestinationToken::Directory(PathBuf::from("/tmp/out"))
        );
    }

    #[test]
    fn missing_destination_is_an_error() {
        let err = resolve_destination(None, &OutputConfig::default()).unwrap_err();
        assert!(err.to_string().contains("set-output"));
    }

    #[test]
    fn scratch_dir_around_destination_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output.scratch_dir = tmp.path().to_path_buf();
        let encoder: Arc<dyn Encoder> = Arc::new(pf_av::FfmpegEncoder::new(
            PathBuf::from("ffmpeg"),
            std::time::Duration::from_secs(1),
        ));
        let build = |config: &Config, dest: PathBuf| {
            let destination = DestinationToken::Directory(dest).open().unwrap();
            build_orchestrator(
                config,
                Arc::clone(&encoder),
                destination,
                Arc::new(NoShare),
                Arc::new(EventBus::default()),
            )
        };

        let err = build(&config, tmp.path().to_path_buf()).err().unwrap();
        assert!(format!("{err:#}").contains("must not contain"));
        assert!(build(&config, tmp.path().join("Pictures")).is_err());

        config.output.scratch_dir = tmp.path().join("scratch");
        assert!(build(&config, tmp.path().join("Pictures")).is_ok());
    }

    #[test]
    fn share_disabled_by_flag() {
        let mut output = OutputConfig::default();
        assert!(!build_share(&output, false).enabled());

        output.share_command = Some("xdg-open".into());
        assert!(build_share(&output, false).enabled());
        assert!(!build_share(&output, true).enabled());
    }
}
