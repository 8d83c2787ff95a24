//! CodeAsk headless runner
//!
//! Drives the same services the desktop UI calls, from the command line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use codeask_core::{NodeKind, SelectableFileNode};
use codeask_desktop::services::analysis::AnalysisProgress;
use codeask_desktop::AppState;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Run LLM analyses over local code folders
#[derive(Parser)]
#[command(name = "codeask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List model bindings
    Models,
    /// List local analysis and plugin definitions
    Analyses,
    /// Show the filtered file tree of a project
    Tree(TreeArgs),
    /// Run an analysis over a project
    Run(RunArgs),
    /// Run a plugin over a project
    Plugin(PluginArgs),
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root directory
    #[arg(short, long)]
    project: PathBuf,

    /// Keep only files ending in these extensions (repeatable)
    #[arg(short, long = "ext")]
    extensions: Vec<String>,
}

#[derive(Args)]
struct SelectionArgs {
    /// Select every visible file
    #[arg(long)]
    all: bool,

    /// Select a file or directory, relative to the project root (repeatable)
    #[arg(short, long)]
    select: Vec<PathBuf>,
}

#[derive(Args)]
struct TreeArgs {
    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Analysis definition id
    #[arg(short, long)]
    analysis: String,
}

#[derive(Args)]
struct PluginArgs {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Plugin definition id
    #[arg(long)]
    plugin: String,

    /// Re-run files whose stored result is up to date
    #[arg(long)]
    full: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let state = AppState::initialize().context("failed to initialize application state")?;

    match cli.command {
        Commands::Models => {
            for model in state.models().list() {
                println!(
                    "{}\t{}\t{}\tconcurrency={}\t{}",
                    model.id,
                    model.name,
                    if model.base_url.is_empty() { "(default endpoint)" } else { model.base_url.as_str() },
                    model.concurrency_limit,
                    if model.enabled { "enabled" } else { "disabled" }
                );
            }
        }
        Commands::Analyses => {
            for def in state.analyses().list() {
                println!("analysis\t{}\t{}", def.id, def.name);
            }
            for def in state.plugins().list() {
                println!("plugin\t{}\t{}", def.id, def.name);
            }
        }
        Commands::Tree(args) => {
            let project = open(&state, &args.project).await?;
            print_tree(&project.selection.snapshot(), 0);
            println!("{} visible files", project.selection.visible_file_count());
        }
        Commands::Run(args) => {
            let project = open(&state, &args.project).await?;
            select(&state, &project.root, &args.selection).await?;
            let token = cancel_on_ctrl_c();

            let outcome = state
                .run_analysis(&args.analysis, Some(token), log_progress)
                .await?;

            if outcome.cancelled {
                bail!("analysis cancelled");
            }
            println!("{}", outcome.result.summary_text);
            info!(
                files = outcome.result.per_file_results.len(),
                errors = outcome.result.error_count(),
                persisted = outcome.persisted,
                "run finished"
            );
            if let Some(err) = outcome.stage2_error {
                bail!("summary failed: {}", err);
            }
        }
        Commands::Plugin(args) => {
            let project = open(&state, &args.project).await?;
            select(&state, &project.root, &args.selection).await?;
            let token = cancel_on_ctrl_c();

            let outcome = state
                .run_plugin(&args.plugin, !args.full, Some(token), log_progress)
                .await?;

            if outcome.cancelled {
                bail!("plugin run cancelled");
            }
            for (path, result) in &outcome.execution.files {
                println!("== {} [{}]\n{}\n", path, result.status, result.content);
            }
            info!(
                processed = outcome.processed,
                skipped = outcome.skipped,
                persisted = outcome.persisted,
                "plugin run finished"
            );
        }
    }

    Ok(())
}

async fn open(state: &AppState, args: &ProjectArgs) -> anyhow::Result<codeask_desktop::OpenProject> {
    let root = std::fs::canonicalize(&args.project)
        .with_context(|| format!("cannot open {}", args.project.display()))?;
    let extensions = (!args.extensions.is_empty()).then(|| args.extensions.clone());
    Ok(state.open_project(&root, extensions).await?)
}

async fn select(state: &AppState, root: &Path, args: &SelectionArgs) -> anyhow::Result<()> {
    if args.all {
        state.select_all(true).await?;
    }
    for rel in &args.select {
        let id = root.join(rel).to_string_lossy().to_string();
        state.toggle_selection(&id, true).await?;
    }
    if state.selected_files().await?.is_empty() {
        bail!("no files selected; pass --all or --select");
    }
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn log_progress(progress: AnalysisProgress) {
    info!(
        stage = ?progress.stage,
        percent = progress.percent.round(),
        completed = progress.completed_files,
        total = progress.total_files,
        "progress"
    );
}

fn print_tree(nodes: &[SelectableFileNode], depth: usize) {
    for node in nodes.iter().filter(|n| !n.hidden) {
        let marker = if node.kind == NodeKind::Directory { "/" } else { "" };
        println!("{}{}{}", "  ".repeat(depth), node.name, marker);
        print_tree(&node.children, depth + 1);
    }
}
