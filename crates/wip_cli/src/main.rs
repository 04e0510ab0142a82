//! `wip` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, resolve configuration and start logging.
//! - Open the configured backend and run exactly one navigation command.
//! - Print one result string; refusals still exit zero.

mod fuzzy;
mod terminal;

use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use terminal::Terminal;
use wip_core::db::open_db;
use wip_core::{
    init_logging, ConfigOverrides, ExternalEditor, JsonStateRepository, NavigationService,
    NoteEdit, RepoError, SqliteStateRepository, StateRepository, StorageBackend, WipConfig,
};

#[derive(Parser)]
#[command(name = "wip", version = wip_core::core_version())]
#[command(about = "Track the nested work-in-progress you are focused on")]
struct Cli {
    /// State directory (defaults to $WIP_HOME, then ~/.wip).
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,
    /// Storage backend (defaults to $WIP_BACKEND, then sqlite).
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,
    /// Log level for the file log (defaults to $WIP_LOG).
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Sqlite,
    Json,
}

impl From<BackendArg> for StorageBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Sqlite => Self::Sqlite,
            BackendArg::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new WIP as a child of the current WIP
    Push {
        /// Name of the new WIP
        name: String,
        /// Optional notes for the new WIP
        #[arg(long)]
        notes: Option<String>,
    },
    /// Display the name, path, and notes for the current WIP
    Current,
    /// Delete the current WIP and set the parent WIP to be current
    Pop,
    /// Edit the note for the current WIP
    Note {
        /// New note content; opens $EDITOR when omitted
        note: Option<String>,
        /// Append to the existing note instead of replacing it
        #[arg(long, requires = "note")]
        append: bool,
    },
    /// Set current to the parent node and display the new current node
    Up,
    /// List children and select which child to set as current
    Down,
    /// Print the full path to the current WIP
    Path,
    /// Interactively switch to a WIP based on path
    Switch,
    /// List archived WIPs, most recent first
    Archive {
        /// Show at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=command_failed module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, Box<dyn Error>> {
    let overrides = ConfigOverrides {
        state_dir: cli.state_dir,
        backend: cli.backend.map(Into::into),
        log_level: cli.log_level,
    };
    let config = WipConfig::resolve(overrides)?;
    if let Err(err) = init_logging(config.log_level, &config.log_dir()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    match config.backend {
        StorageBackend::Sqlite => {
            fs::create_dir_all(&config.state_dir)?;
            let conn = open_db(config.state_db_path()).map_err(RepoError::from)?;
            let repo = SqliteStateRepository::try_new(&conn)?;
            execute(cli.command, repo, &config)
        }
        StorageBackend::Json => {
            let repo = JsonStateRepository::new(config.state_document_path());
            execute(cli.command, repo, &config)
        }
    }
}

fn execute<R: StateRepository>(
    command: Commands,
    repo: R,
    config: &WipConfig,
) -> Result<String, Box<dyn Error>> {
    let mut service = NavigationService::open(repo)?;
    if let Some(warning) = service.focus_warning() {
        eprintln!("{warning}");
    }

    let output = match command {
        Commands::Push { name, notes } => service.push(&name, notes)?.to_string(),
        Commands::Current => service.current_info(),
        Commands::Pop => service.pop()?.to_string(),
        Commands::Note { note, append } => {
            let edit = match note {
                Some(text) if append => NoteEdit::Append(text),
                Some(text) => NoteEdit::Replace(text),
                None => NoteEdit::Interactive,
            };
            let mut editor = ExternalEditor::new(config.editor.as_str());
            service.edit_note(edit, &mut editor)?.to_string()
        }
        Commands::Up => service.up()?.to_string(),
        Commands::Down => service.down(&mut Terminal::stdio())?.to_string(),
        Commands::Path => service.path(),
        Commands::Switch => service.switch(&mut Terminal::stdio())?.to_string(),
        Commands::Archive { limit } => render_archive(&service, limit),
    };
    Ok(output)
}

fn render_archive<R: StateRepository>(
    service: &NavigationService<R>,
    limit: Option<usize>,
) -> String {
    let records = service.archive_log(limit);
    if records.is_empty() {
        return "Archive is empty".to_string();
    }
    records
        .iter()
        .map(|record| {
            format!(
                "{} (created_at_ms={}, archived_at_ms={})",
                record.path, record.created_at, record.archived_at
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
