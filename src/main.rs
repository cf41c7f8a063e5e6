mod cli;

use pixforge::{app, config, report, selection};

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Cli, Commands, ConvertArgs};
use pf_av::{EncodeRequest, Encoder, FfmpegEncoder, ToolRegistry};
use pf_core::events::{EventBus, EventPayload};
use pf_pipeline::{job_for, RunRequest, StartError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "pixforge=trace,pf_core=trace,pf_av=trace,pf_pipeline=trace".to_string()
        } else {
            "pixforge=debug,pf_core=debug,pf_av=debug,pf_pipeline=debug".to_string()
        }
    });

    // Progress goes to stdout; keep logs on stderr so --json stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert(args) => convert(args, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::SetOutput { token } => set_output(&token, cli.config.as_deref()),
        Commands::ShowConfig => show_config(cli.config.as_deref()),
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("pixforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn convert(args: ConvertArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let images = selection::collect(&args.inputs, args.recursive, std::io::stdin().lock())?;
    if images.is_empty() {
        bail!(StartError::SelectionEmpty);
    }

    let settings = app::resolve_settings(
        &config.encode,
        &app::QualityOverrides {
            format: args.format,
            crf: args.crf,
            webp_quality: args.webp_quality,
            slider: args.slider,
        },
    )?;
    let token = app::resolve_destination(args.output.as_deref(), &config.output)?;
    let registry = ToolRegistry::discover(&config.tools);

    if args.dry_run {
        let encoder = FfmpegEncoder::from_registry(&registry).unwrap_or_else(|_| {
            FfmpegEncoder::new(
                PathBuf::from("ffmpeg"),
                std::time::Duration::from_secs(config.tools.timeout_secs),
            )
        });
        // Runs stage in a fresh `run-*` directory; show where it will live.
        let staging = config.output.scratch_dir.join("run-XXXXXX");

        println!("[DRY RUN] {} image(s) -> {token}", images.len());
        for image in &images {
            let job = job_for(image.clone(), &settings);
            let request = EncodeRequest {
                input: job.source.input_arg(),
                output: staging.join(&job.output_file_name),
                settings: job.settings.clone(),
            };
            println!("{}", encoder.command_line(&request));
        }
        return Ok(());
    }

    let encoder: Arc<dyn Encoder> = Arc::new(FfmpegEncoder::from_registry(&registry)?);
    let destination = token.open()?;
    let share = app::build_share(&config.output, args.no_share);
    let parallelism = args.jobs.unwrap_or(config.encode.parallelism);

    tracing::info!("Saving to {}", destination.describe());

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let events = Arc::new(EventBus::default());
        let orchestrator =
            app::build_orchestrator(&config, encoder, destination, share, events)?;

        let mut rx = orchestrator.events().subscribe();
        let quiet = args.json;
        let printer = tokio::spawn(async move {
            let mut progress = report::ProgressPrinter::default();
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if !quiet {
                            if let Some(line) = progress.line_for(&event) {
                                println!("{line}");
                            }
                        }
                        if matches!(event.payload, EventPayload::RunFinished { .. }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!("Progress output skipped {n} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let handle = orchestrator.start(
            RunRequest::new(images, settings).with_parallelism(parallelism),
        )?;

        let cancel = handle.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping the current image and skipping the rest");
                cancel.cancel();
            }
        });

        let report = handle.wait().await?;
        let _ = printer.await;
        anyhow::Ok(report)
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report::summary(&report));
    }

    if !report.all_succeeded() {
        bail!(
            "{} of {} image(s) were not converted",
            report.failed + report.cancelled,
            report.outcomes.len()
        );
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or set tools.ffmpeg_path in the config.");
    }

    Ok(())
}

fn set_output(token: &str, config_path: Option<&Path>) -> Result<()> {
    let parsed: pf_pipeline::DestinationToken = token.parse()?;
    let path = config::config_path_for_write(config_path);

    config::persist::set_destination(&path, &parsed.to_string())?;

    println!("✓ Output destination set to {parsed}");
    println!("  Saved in {}", path.display());
    Ok(())
}

fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("✓ Configuration is valid");
    println!("  Format: {}", config.encode.format);
    println!("  AVIF CRF: {}", config.encode.crf);
    println!("  WEBP quality: {}", config.encode.webp_quality);
    println!(
        "  Destination: {}",
        config.output.destination.as_deref().unwrap_or("(not set)")
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
