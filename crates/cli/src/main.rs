mod config;
mod persist;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use events::Event;
use generator::OpenRouterGenerator;
use indicatif::{ProgressBar, ProgressStyle};
use orchestrator::GenerationOrchestrator;
use schemaforge_core::{GenerationMode, ModeConfig, Session};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{resolve_api_key, SchemaforgeConfig, CONFIG_FILE};
use crate::persist::ArtifactWriter;

const DEFAULT_OUT_DIR: &str = "schemaforge-out";

#[derive(Parser)]
#[command(name = "schemaforge")]
#[command(about = "Generate a database design phase by phase", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one generation session
    Generate {
        #[arg(short, long, value_enum, default_value_t = ModeArg::Standard)]
        mode: ModeArg,

        /// Description of the system the database is for
        #[arg(short, long)]
        request: String,

        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,

        #[arg(short, long, default_value = DEFAULT_OUT_DIR)]
        out: PathBuf,

        #[arg(long)]
        api_key: Option<String>,
    },
    /// List the phases and slots of each mode
    Modes,
    /// Write a default config file
    Init {
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Standard,
    Enhanced,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Standard => GenerationMode::Standard,
            ModeArg::Enhanced => GenerationMode::Enhanced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            mode,
            request,
            config,
            out,
            api_key,
        } => generate(mode.into(), request, &config, out, api_key).await,
        Commands::Modes => {
            list_modes();
            Ok(())
        }
        Commands::Init { config } => init_config(&config).await,
    }
}

async fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    let content = SchemaforgeConfig::default().to_toml()?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. export {}=<your key>", config::API_KEY_ENV);
    println!("  2. schemaforge generate --request \"<what the database is for>\"");
    Ok(())
}

fn list_modes() {
    for mode in GenerationMode::ALL {
        let table = ModeConfig::for_mode(mode);
        println!("{}", mode.as_str().bold());

        println!("  phases:");
        for (i, spec) in table.phases.iter().enumerate() {
            let deps: Vec<&str> = spec.depends_on.iter().map(|d| d.as_str()).collect();
            if deps.is_empty() {
                println!("    {}. {}", i + 1, spec.id);
            } else {
                println!("    {}. {} (reads {})", i + 1, spec.id, deps.join(", "));
            }
        }

        println!("  slots:");
        for rule in &table.slot_rules {
            let sources: Vec<&str> = rule.sources.iter().map(|p| p.as_str()).collect();
            println!("    {} <- {}", rule.slot, sources.join(" + "));
        }
        println!();
    }
}

async fn generate(
    mode: GenerationMode,
    request: String,
    config_path: &Path,
    out: PathBuf,
    api_key: Option<String>,
) -> Result<()> {
    init_tracing();

    let config = SchemaforgeConfig::load(config_path).await?;
    let api_key = resolve_api_key(api_key)?;
    let generator = OpenRouterGenerator::new(api_key, config.generator.clone())
        .context("Failed to create generator")?;

    tracing::info!(model = %config.generator.model, mode = %mode, "Starting generation");

    let orchestrator = GenerationOrchestrator::new(Arc::new(generator), config.orchestrator);
    let mut events = orchestrator.subscribe();
    let handle = orchestrator.start(mode, request)?;

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling generation");
            token.cancel();
        }
    });

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    render_progress(&bar, &orchestrator);

    let writer = ArtifactWriter::new(&out);
    let mut written = None;

    while let Some(envelope) = events.recv().await {
        match envelope.event {
            Event::SessionStateChanged { .. } => render_progress(&bar, &orchestrator),
            Event::PhaseRetrying {
                phase,
                attempt,
                delay_ms,
                reason,
                ..
            } => bar.println(format!(
                "{} {} attempt {} failed ({}), retrying in {}ms",
                "retry".yellow(),
                phase,
                attempt,
                reason,
                delay_ms
            )),
            Event::PhaseCompleted { phase, .. } => {
                bar.println(format!("{} {}", "done".green(), phase.title()))
            }
            Event::SessionFinalized {
                session_id,
                raw_phase_outputs,
                artifacts,
            } => {
                written = Some(
                    writer
                        .write_finalized(session_id, &raw_phase_outputs, &artifacts)
                        .await?,
                );
                break;
            }
            Event::SessionFailed { .. } => break,
            _ => {}
        }
    }

    let session = handle.wait().await?;
    match written {
        Some(dir) => {
            bar.finish_with_message("complete");
            println!();
            println!("{} {} artifacts written to {}", "✓".green(), session.artifacts.len(), dir.display());
            Ok(())
        }
        None => {
            bar.abandon_with_message("stopped");
            report_failure(&session);
            anyhow::bail!("generation did not complete")
        }
    }
}

fn render_progress(bar: &ProgressBar, orchestrator: &GenerationOrchestrator) {
    let progress = orchestrator.get_progress();
    bar.set_position(u64::from(progress.percent));
    bar.set_message(progress.current_phase_label.unwrap_or_else(|| "finishing".to_string()));
}

fn report_failure(session: &Session) {
    println!();
    for entry in &session.log {
        println!(
            "  {} [{}] {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.source,
            entry.message
        );
    }
    println!();

    match &session.error {
        Some(error) if !error.kind.is_operational_failure() => {
            println!("{} {}", "cancelled".yellow(), error.message);
        }
        Some(error) => println!("{} {}", "failed".red().bold(), error),
        None => println!("{} session ended without finalizing", "failed".red().bold()),
    }
    println!("Completed phases are kept above; run generate again to start a new session.");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schemaforge=info,orchestrator=info,generator=info".into()),
        )
        .init();
}
