use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::{cursor, terminal};
use directories::ProjectDirs;
use readerview_core::{FilePositionStore, Orientation, PositionStore, Purpose, Size, ViewerConfig};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

mod chooser;
mod manifest;
mod viewer;

use manifest::{parse_page_size, Manifest, ManifestProvider};

#[derive(Debug, Parser)]
#[command(
    name = "readerview",
    version,
    about = "paged document viewport driven from the terminal"
)]
struct Args {
    /// Viewer settings; defaults to config.toml in the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Page through a list of page sizes, drawn as outlines
    View(ViewArgs),
    /// List openable documents under a directory
    Choose(ChooseArgs),
}

#[derive(Debug, clap::Args)]
struct ViewArgs {
    /// TOML file with one [[pages]] table per page
    manifest: Option<PathBuf>,

    /// Number of synthetic pages when no manifest is given
    #[arg(long, default_value_t = 10)]
    pages: usize,

    /// Size of each synthetic page, WIDTHxHEIGHT
    #[arg(long, value_parser = parse_page_size, default_value = "800x1100")]
    page_size: Size,

    /// Stack pages top to bottom
    #[arg(long)]
    vertical: bool,

    /// Page to open on (0-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,
}

#[derive(Debug, clap::Args)]
struct ChooseArgs {
    #[arg(default_value = ".")]
    root: PathBuf,

    #[arg(long, value_enum, default_value_t = PurposeArg::Documents)]
    purpose: PurposeArg,

    /// Rescan when files are added or removed
    #[arg(long)]
    watch: bool,

    /// Print the list and exit
    #[arg(long, conflicts_with = "watch")]
    print: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PurposeArg {
    Documents,
    KeyFile,
}

impl From<PurposeArg> for Purpose {
    fn from(value: PurposeArg) -> Self {
        match value {
            PurposeArg::Documents => Purpose::Documents,
            PurposeArg::KeyFile => Purpose::KeyFile,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopAction {
    Continue,
    ContinueRedraw,
    ClearRedraw,
    Quit,
}

pub(crate) struct RawModeGuard;

impl RawModeGuard {
    pub(crate) fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "readerview", "readerview")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
    let mut config = ViewerConfig::load_or_default(&config_path)?;

    match args.command {
        Command::View(view) => {
            if view.vertical {
                config.orientation = Orientation::Vertical;
            }
            let manifest = match &view.manifest {
                Some(path) => Manifest::load(path)?,
                None => Manifest::uniform(view.pages, view.page_size),
            };
            info!(pages = manifest.pages.len(), "opening viewer");
            viewer::run(config, ManifestProvider::new(manifest), view.page)?;
        }
        Command::Choose(choose) => {
            let purpose = Purpose::from(choose.purpose);
            if choose.print {
                chooser::print(&choose.root, purpose).await?;
                return Ok(());
            }
            let positions_dir = project_dirs.data_local_dir().join("positions");
            let store: Arc<dyn PositionStore> = Arc::new(FilePositionStore::new(positions_dir)?);
            if let Some(path) = chooser::run(&choose.root, purpose, store, choose.watch).await? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

pub(crate) fn combine_status(base: Option<String>, pending_input: Option<&str>) -> Option<String> {
    match (base, pending_input.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(pending)) => {
            base.push_str(" | ");
            base.push_str(pending);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(pending)) => Some(pending.to_string()),
        (None, None) => None,
    }
}

pub(crate) fn truncate_with_ellipsis(mut text: String, width: usize) -> String {
    if text.len() > width {
        if width <= 3 {
            text = text.chars().take(width).collect();
        } else {
            let mut truncated = text.chars().take(width - 3).collect::<String>();
            truncated.push_str("...");
            text = truncated;
        }
    }
    if text.len() < width {
        text.push_str(&" ".repeat(width - text.len()));
    }
    text
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "readerview.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // stdout belongs to the screen and to `choose` output
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
