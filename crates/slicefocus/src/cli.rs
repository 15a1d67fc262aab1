//! Command-line driver running focus sessions against a backend and printing the renderer
//! calls they produce.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::app::controller::{EditorEvent, FocusModeController};
use crate::domain::model::{EditorSnapshot, FocusMode};
use crate::domain::range::Selection;
use crate::infra::backend::{self, Backend, CommandBackend, ReplayBackend};
use crate::infra::config::Config;
use crate::infra::render::{RecordingRenderer, RenderCommand, TracingReporter};

#[derive(Debug, Parser)]
#[command(author, version, about = "Interactive slice highlighting driven by an analysis backend", long_about = None)]
pub struct Cli {
    /// Extra config file layered over the user and workspace config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the analyzable bodies of a file
    Spans {
        file: String,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Turn focus mode on at a selection and print the resulting render calls
    Focus {
        file: String,
        /// Selection anchor (byte offset)
        start: usize,
        /// Selection end; defaults to a collapsed cursor at `start`
        end: Option<usize>,
        /// Pin a mark at START END before rendering
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        mark: Option<Vec<usize>>,
        /// Promote the slice to editor selections instead of highlighting it
        #[arg(long)]
        select: bool,
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Answer from a recorded fixture instead of running the backend command
    #[arg(long)]
    replay: Option<PathBuf>,
}

/// Output of the `focus` subcommand.
#[derive(Debug, Serialize)]
struct FocusReport {
    mode: FocusMode,
    commands: Vec<RenderCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_with_override(path)?,
        None => Config::load()?,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(execute(cli.command, config))
}

async fn execute(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Spans { file, source } => {
            let backend = source.backend(&config)?;
            let spans = backend::spans(&*backend, &file).await?;
            print_json(&spans)
        }
        Commands::Focus {
            file,
            start,
            end,
            mark,
            select,
            source,
        } => {
            let backend = source.backend(&config)?;
            let selection = Selection::new(start, end.unwrap_or(start));
            let mark = mark.map(|bounds| Selection::new(bounds[0], bounds[1]));
            let report = run_focus(backend, config, file, selection, mark, select).await;
            print_json(&report)
        }
    }
}

async fn run_focus(
    backend: Arc<dyn Backend>,
    config: Config,
    file: String,
    selection: Selection,
    mark: Option<Selection>,
    select: bool,
) -> FocusReport {
    let renderer = Arc::new(RecordingRenderer::new());
    let mut controller = FocusModeController::new(
        backend,
        renderer.clone(),
        Arc::new(TracingReporter),
        config.focus,
    );

    let initial = mark.unwrap_or(selection);
    controller
        .handle(EditorEvent::ActiveEditorChanged(Some(EditorSnapshot::new(
            file.clone(),
            initial,
        ))))
        .await;
    controller.toggle().await;

    if mark.is_some() {
        controller.mark().await;
        controller
            .handle(EditorEvent::SelectionChanged {
                filename: file,
                selection,
            })
            .await;
    }

    if select {
        controller.select().await;
    }

    FocusReport {
        mode: controller.mode(),
        commands: renderer.take(),
        error: controller.last_error().map(ToString::to_string),
    }
}

impl SourceArgs {
    fn backend(&self, config: &Config) -> Result<Arc<dyn Backend>> {
        Ok(match &self.replay {
            Some(path) => Arc::new(ReplayBackend::from_file(path)?),
            None => Arc::new(CommandBackend::from_config(&config.backend)),
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}
