use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use brandscout_contracts::models::ModelRegistry;
use brandscout_contracts::runs::new_run_id;
use brandscout_engine::compositor::composite_encoded;
use brandscout_engine::config::{Credentials, EngineConfig};
use brandscout_engine::pipeline::RunInputs;
use brandscout_engine::raster::ImageUpload;
use brandscout_engine::recorder::RunRecorder;
use brandscout_engine::MockupEngine;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DRYRUN_VISION_MODEL: &str = "dryrun-vision-1";
const DRYRUN_IMAGE_MODEL: &str = "dryrun-image-1";

#[derive(Debug, Parser)]
#[command(
    name = "brandscout",
    version,
    about = "Product mockups from a logo and a few style references"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze the references, synthesize a background and place the logo on it
    Run(RunArgs),
    /// Place a logo onto an existing background, offline
    Composite(CompositeArgs),
    /// List the models the engine knows about
    Models,
    /// Print the default configuration as TOML
    Config,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    logo: Option<PathBuf>,
    #[arg(long = "reference")]
    references: Vec<PathBuf>,
    /// Run directory; defaults to runs/<run id>
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    analysis_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    aspect_ratio: Option<String>,
    /// Use the offline providers; no credentials or network needed
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Parser)]
struct CompositeArgs {
    #[arg(long)]
    background: PathBuf,
    #[arg(long)]
    logo: PathBuf,
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("brandscout error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => run_mockup(args),
        Command::Composite(args) => run_composite(args),
        Command::Models => {
            print_models();
            Ok(0)
        }
        Command::Config => {
            print!("{}", EngineConfig::default().to_toml_string()?);
            Ok(0)
        }
    }
}

fn run_mockup(args: RunArgs) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            EngineConfig::from_file(path)?
        }
        None => EngineConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let engine = MockupEngine::new(config, &Credentials::from_env())?;
    for note in engine.notes() {
        eprintln!("note: {note}");
    }

    let inputs = RunInputs {
        logo: args.logo.as_deref().map(read_upload).transpose()?,
        references: args
            .references
            .iter()
            .map(|path| read_upload(path))
            .collect::<Result<Vec<_>>>()?,
    };

    let run_id = new_run_id();
    let run_dir = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from("runs").join(&run_id));
    let recorder = RunRecorder::new(&run_dir, &run_id)?;
    info!(
        run_id = recorder.run_id(),
        analysis_model = %engine.analysis_model().name,
        synthesis_model = %engine.synthesis_model().name,
        "starting mockup run"
    );

    let mut events = recorder.events();
    let outcome = engine.run(inputs, &mut events);
    let summary = recorder.finish(&outcome)?;

    match outcome {
        Ok(result) => {
            for warning in &result.warnings {
                warn!("{warning}");
            }
            println!("Style: {}", result.style);
            println!(
                "Mockup: {} (logo {}x{} at {},{})",
                recorder.mockup_path().display(),
                result.placement.width,
                result.placement.height,
                result.placement.x,
                result.placement.y
            );
            debug!(summary = %recorder.summary_path().display(), "run recorded");
            Ok(0)
        }
        Err(err) => {
            let stage = err
                .stage()
                .map(|stage| stage.to_string())
                .unwrap_or_else(|| "configuration".to_string());
            eprintln!("brandscout: run failed while {stage}: {}", err.chain_text());
            eprintln!("summary: {}", recorder.summary_path().display());
            debug!(final_state = %summary.final_state, "run recorded");
            Ok(1)
        }
    }
}

fn apply_overrides(config: &mut EngineConfig, args: &RunArgs) {
    if args.dryrun {
        config.analysis.model = Some(DRYRUN_VISION_MODEL.to_string());
        config.synthesis.model = Some(DRYRUN_IMAGE_MODEL.to_string());
    }
    if let Some(model) = &args.analysis_model {
        config.analysis.model = Some(model.clone());
    }
    if let Some(model) = &args.image_model {
        config.synthesis.model = Some(model.clone());
    }
    if let Some(ratio) = &args.aspect_ratio {
        config.synthesis.aspect_ratio = ratio.clone();
    }
}

fn read_upload(path: &Path) -> Result<ImageUpload> {
    ImageUpload::from_path(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run_composite(args: CompositeArgs) -> Result<i32> {
    let background = fs::read(&args.background)
        .with_context(|| format!("failed to read {}", args.background.display()))?;
    let logo =
        fs::read(&args.logo).with_context(|| format!("failed to read {}", args.logo.display()))?;
    let (image, placement) = composite_encoded(&background, &logo)?;
    if let Some(parent) = args.out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    image
        .save(&args.out)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!(
        "{} ({}x{}, logo {}x{} at {},{})",
        args.out.display(),
        image.width(),
        image.height(),
        placement.width,
        placement.height,
        placement.x,
        placement.y
    );
    Ok(0)
}

fn print_models() {
    let registry = ModelRegistry::default();
    for model in registry.list() {
        println!(
            "{:<32} {:<8} {}",
            model.name,
            model.provider,
            model.capabilities.join(",")
        );
    }
}
