//! Longform video assembler - command line front end
//!
//! Usage:
//!   lfv assemble run.json            # segment, fit, assemble, mix, composite, render
//!   lfv generate requests.json -o media/
//!   lfv config                       # print the config, writing defaults if missing

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};

use lfv_core::config::{ConfigManager, Settings};
use lfv_core::generation::{
    DispatchConfig, Dispatcher, GeneratedMedia, GenerationRequest, HttpGenerationService,
};
use lfv_core::logging::{init_tracing, LogCallback, LogLevel};
use lfv_core::manifest::RunManifest;
use lfv_core::orchestrator::{create_standard_pipeline, RunProcessor, RunSpec};

/// Narration-driven longform video assembler
#[derive(Parser)]
#[command(name = "lfv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assemble a narrated video from scene clips, audio beds and overlays")]
struct Cli {
    /// Config file (created with defaults if missing)
    #[arg(short, long, default_value = "lfv.toml")]
    config: PathBuf,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and render a video from a run spec
    Assemble {
        /// Run spec (JSON)
        spec: PathBuf,

        /// Override the configured output folder
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Generate media through the configured service
    Generate {
        /// Generation requests (JSON array)
        requests: PathBuf,

        /// Where downloaded media is written
        #[arg(short, long, default_value = "media")]
        output_dir: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    let mut config = ConfigManager::new(&cli.config);
    config
        .load_or_create()
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let settings = config.settings().clone();

    match cli.command {
        Commands::Assemble { spec, output_dir } => {
            config.ensure_dirs_exist().context("creating configured folders")?;
            assemble(settings, &spec, output_dir).await
        }
        Commands::Generate {
            requests,
            output_dir,
        } => generate(&settings, &requests, &output_dir).await,
        Commands::Config => {
            let content = std::fs::read_to_string(config.path())
                .with_context(|| format!("reading {}", config.path().display()))?;
            println!("{}", content);
            Ok(())
        }
    }
}

async fn assemble(settings: Settings, spec_path: &Path, output_dir: Option<PathBuf>) -> Result<()> {
    let json = std::fs::read_to_string(spec_path)
        .with_context(|| format!("reading run spec {}", spec_path.display()))?;
    let spec = RunSpec::from_json(&json)
        .with_context(|| format!("parsing run spec {}", spec_path.display()))?;

    let processor = match output_dir {
        Some(dir) => {
            let paths = settings.paths.clone();
            RunProcessor::new(
                settings,
                PathBuf::from(paths.logs_folder),
                PathBuf::from(paths.temp_root),
                dir,
            )
        }
        None => RunProcessor::from_settings(settings),
    };

    let pipeline = create_standard_pipeline();
    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping after the current step");
            cancel.cancel();
        }
    });

    let log_callback: LogCallback = Box::new(|line: &str| println!("{}", line));
    let result = tokio::task::spawn_blocking(move || {
        processor.process_run_with(&pipeline, spec, Some(log_callback), None)
    })
    .await
    .context("run task panicked")?;

    if !result.success {
        bail!(result.error.unwrap_or_else(|| "run failed".to_string()));
    }

    if let Some(path) = &result.output_path {
        println!("Output: {}", path.display());
    }
    if let Some(path) = &result.manifest_path {
        println!("Manifest: {}", path.display());
    }
    if !result.steps_skipped.is_empty() {
        println!("Skipped: {}", result.steps_skipped.join(", "));
    }
    Ok(())
}

async fn generate(settings: &Settings, requests_path: &Path, output_dir: &Path) -> Result<()> {
    let json = std::fs::read_to_string(requests_path)
        .with_context(|| format!("reading requests {}", requests_path.display()))?;
    let requests: Vec<GenerationRequest> = serde_json::from_str(&json)
        .with_context(|| format!("parsing requests {}", requests_path.display()))?;

    let key_var = &settings.generation.api_key_env;
    let api_key = std::env::var(key_var)
        .with_context(|| format!("environment variable {} is not set", key_var))?;

    let manifest_path = output_dir.join("manifest.json");
    let mut manifest = RunManifest::load_or_create("generate", &manifest_path)?;

    let mut pending = Vec::new();
    for request in requests {
        let params = serde_json::to_value(&request)?;
        let stage = stage_name(&request);
        if let Some(existing) = manifest.reusable(&stage, Some(request.index), &params) {
            println!("Reusing {}", existing.display());
        } else {
            pending.push((request, params));
        }
    }
    if pending.is_empty() {
        println!("Nothing to generate");
        return Ok(());
    }

    let service = HttpGenerationService::from_settings(&settings.generation, api_key, output_dir);
    let dispatcher = Dispatcher::new(
        Arc::new(service),
        DispatchConfig::from_settings(&settings.generation),
    );

    let batch: Vec<GenerationRequest> = pending.iter().map(|(r, _)| r.clone()).collect();
    let results = tokio::select! {
        results = dispatcher.dispatch_all(batch) => results,
        _ = tokio::signal::ctrl_c() => {
            dispatcher.cancel_all();
            bail!("Interrupted; outstanding requests cancelled");
        }
    };

    let mut failures = 0;
    for ((request, params), result) in pending.into_iter().zip(results) {
        match result {
            Ok(media) => {
                write_alignment(&media)?;
                manifest.record(&stage_name(&request), Some(request.index), params, &media.path)?;
                println!("{} {:03}: {}", media.kind, media.index, media.path.display());
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {:03} failed: {}", request.kind, request.index, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} request(s) failed", failures);
    }
    Ok(())
}

fn stage_name(request: &GenerationRequest) -> String {
    format!("generate/{}", request.kind)
}

/// Speech alignment goes next to the audio so a run spec can point at it.
fn write_alignment(media: &GeneratedMedia) -> Result<()> {
    if let Some(alignment) = &media.alignment {
        let path = media.path.with_extension("alignment.json");
        std::fs::write(&path, serde_json::to_string_pretty(alignment)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
