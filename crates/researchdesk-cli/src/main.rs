use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use researchdesk_core::report::{self, ExportFormat};
use researchdesk_core::{
    Config, ConfigLoader, HistoryStore, ProgressTracker, ReplayAgent, ResearchDepth,
    ResearchPipeline, SUGGESTED_QUESTIONS, SessionConfig, SessionOutcome, TelemetryOptions,
    init_metrics_from_env, init_telemetry, render_history,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "researchdesk-cli",
    version,
    about = "Run research sessions and render their reports"
)]
struct Cli {
    /// Path to a `researchdesk.toml` (falls back to RESEARCHDESK_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one or more research sessions against a replayed agent result.
    Run(RunArgs),
    /// Render a saved JSON export as Markdown, summary or JSON.
    Render(RenderArgs),
    /// Print example research questions.
    Suggest,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Research question; repeat to run several sessions in order.
    #[arg(long = "question", short = 'q', required = true)]
    questions: Vec<String>,

    /// Stored agent result (bare result or JSON export) to replay.
    #[arg(long)]
    replay: PathBuf,

    /// Research depth (quick, standard, comprehensive).
    #[arg(long)]
    depth: Option<ResearchDepth>,

    /// Disable hypothesis generation.
    #[arg(long)]
    no_hypothesis: bool,

    /// Disable multi-agent analysis.
    #[arg(long)]
    no_multi_agent: bool,

    /// Let the replayed agent report its own stages instead of the timer.
    #[arg(long)]
    report_stages: bool,

    /// Write exports in these formats (markdown, json, summary).
    #[arg(long = "export")]
    exports: Vec<ExportFormat>,

    /// Directory for exports (defaults to `[export].output_dir`).
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSON export produced by `run --export json`.
    #[arg(long)]
    input: PathBuf,

    /// Output format.
    #[arg(long, default_value = "markdown")]
    format: ExportFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(cli.config.clone())?;

    init_telemetry(TelemetryOptions::with_level(config.logging.level.clone()))?;
    init_metrics_from_env("researchdesk-cli");

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args, &config).await?,
            Command::Render(args) => render_command(args)?,
            Command::Suggest => suggest_command(),
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs, config: &Config) -> Result<()> {
    let mut agent = ReplayAgent::from_json_file(&args.replay)?;
    if args.report_stages {
        agent = agent.reporting_stages();
    }

    let history = Arc::new(HistoryStore::new());
    let pipeline = ResearchPipeline::builder(agent)
        .with_config(config)
        .with_history(history.clone())
        .build();

    let mut session_config = config.session_defaults();
    if let Some(depth) = args.depth {
        session_config.depth = depth;
    }
    session_config.enable_hypothesis &= !args.no_hypothesis;
    session_config.enable_multi_agent &= !args.no_multi_agent;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.export.output_dir.clone());

    let mut failures = 0usize;
    for question in &args.questions {
        info!(question = %question, "starting research session");
        let outcome = run_with_progress(&pipeline, question, session_config).await?;

        match outcome.failure_message() {
            Some(message) => {
                failures += 1;
                println!("{message}\n");
            }
            None => {
                print_outcome(&outcome);
                export_outcome(&outcome, &args.exports, &output_dir)?;
            }
        }
    }

    println!("{}", pipeline.memory_statistics().await.render_markdown());
    println!(
        "{}",
        render_history(&history.recent(config.history.recent_window))
    );

    if failures == args.questions.len() {
        bail!("all {failures} research sessions failed");
    }
    Ok(())
}

async fn run_with_progress(
    pipeline: &ResearchPipeline,
    question: &str,
    session_config: SessionConfig,
) -> Result<SessionOutcome> {
    let tracker = ProgressTracker::new();
    let mut updates = tracker.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            eprintln!(
                "[{:>3.0}%] {} ({})",
                snapshot.fraction * 100.0,
                snapshot.message,
                snapshot.source.as_str()
            );
            if snapshot.stage.is_terminal() {
                break;
            }
        }
    });

    let outcome = pipeline
        .run_with_tracker(question, session_config, &tracker)
        .await?;
    if let Err(err) = printer.await {
        warn!(error = %err, "progress printer stopped unexpectedly");
    }
    Ok(outcome)
}

fn print_outcome(outcome: &SessionOutcome) {
    let Some(views) = outcome.views() else {
        return;
    };

    println!("# {}\n", outcome.session.question());
    println!("## Final Answer\n\n{}\n", views.final_answer);
    println!("{}", views.process.render_markdown());
    println!("{}", views.intelligence.render_markdown());
    println!("{}", views.quality.render_markdown());

    match serde_json::to_string_pretty(&serde_json::json!({
        "timeline": views.timeline,
        "quality_radar": views.radar,
        "source_distribution": views.sources,
    })) {
        Ok(datasets) => println!("## Chart Data\n\n```json\n{datasets}\n```\n"),
        Err(err) => warn!(error = %err, "unable to serialise chart datasets"),
    }
}

fn export_outcome(
    outcome: &SessionOutcome,
    formats: &[ExportFormat],
    output_dir: &Path,
) -> Result<()> {
    let Some(result) = outcome.result.as_deref() else {
        return Ok(());
    };
    let timestamp = outcome.session.ended_at().unwrap_or_else(Utc::now);

    for format in formats {
        let path = report::write_export(
            output_dir,
            *format,
            result,
            outcome.session.question().text(),
            timestamp,
        )
        .with_context(|| format!("failed to write {} export", format.as_str()))?;
        info!(path = %path.display(), format = format.as_str(), "export written");
        println!("Exported {} to {}", format.as_str(), path.display());
    }
    Ok(())
}

fn render_command(args: RenderArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let export = report::parse_json(&raw)
        .with_context(|| format!("invalid export {}", args.input.display()))?;

    let rendered = report::render(
        args.format,
        &export.result,
        &export.metadata.question,
        export.metadata.timestamp,
    )?;
    println!("{rendered}");
    Ok(())
}

fn suggest_command() {
    println!("Research question suggestions:\n");
    for question in SUGGESTED_QUESTIONS {
        println!("- {question}");
    }
}
