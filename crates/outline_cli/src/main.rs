//! Command-line front end for the outline store.
//!
//! # Responsibility
//! - Open a state database and drive exports and imports against it.
//! - Deliver export artifacts by writing their bytes into a directory.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use outline_core::{
    core_version, default_log_level, init_stderr_logging, open_db, ExportArtifact, ExportFormat,
    OutlineStore, SqliteKeyValueRepository,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "outline_cli", about = "Export and import outline projects", version)]
struct Cli {
    /// Log level for stderr output.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the core version.
    Version,
    /// Export the current project, or every project as a JSON backup.
    Export(ExportArgs),
    /// Merge a JSON archive into the state database.
    Import(ImportArgs),
    /// List projects in the state database.
    List(DbArgs),
}

#[derive(Args)]
struct DbArgs {
    /// SQLite state file; created when missing.
    #[arg(long, value_name = "FILE")]
    db: PathBuf,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    db: DbArgs,
    #[arg(long, value_enum, default_value_t = FormatChoice::Markdown)]
    format: FormatChoice,
    /// Output directory.
    #[arg(long, value_name = "DIR")]
    out: PathBuf,
    /// Back up every project (JSON only).
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct ImportArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Archive produced by `export --format json`.
    archive: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatChoice {
    Markdown,
    Docx,
    Json,
}

impl From<FormatChoice> for ExportFormat {
    fn from(value: FormatChoice) -> Self {
        match value {
            FormatChoice::Markdown => Self::Markdown,
            FormatChoice::Docx => Self::Docx,
            FormatChoice::Json => Self::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_stderr_logging(level).map_err(|err| anyhow!(err))?;

    match cli.command {
        Commands::Version => {
            println!("outline_core version={}", core_version());
            Ok(())
        }
        Commands::Export(args) => run_export(&args),
        Commands::Import(args) => run_import(&args),
        Commands::List(args) => run_list(&args),
    }
}

fn run_export(args: &ExportArgs) -> Result<()> {
    let conn = open_db(&args.db.db).with_context(|| format!("opening {}", args.db.db.display()))?;
    let store = OutlineStore::load(SqliteKeyValueRepository::try_new(&conn)?)?;

    let format = ExportFormat::from(args.format);
    let artifact = if args.all {
        if format != ExportFormat::Json {
            return Err(anyhow!("--all is only supported with --format json"));
        }
        store.export_all_json()?
    } else {
        store
            .export_current(format)
            .ok_or_else(|| anyhow!("no current project to export"))??
    };
    let path = deliver(&artifact, &args.out)?;
    println!("{}", path.display());
    Ok(())
}

fn run_import(args: &ImportArgs) -> Result<()> {
    let payload = fs::read_to_string(&args.archive)
        .with_context(|| format!("reading {}", args.archive.display()))?;
    let conn = open_db(&args.db.db).with_context(|| format!("opening {}", args.db.db.display()))?;
    let mut store = OutlineStore::load(SqliteKeyValueRepository::try_new(&conn)?)?;

    let report = store.import_archive(&payload)?;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    println!(
        "imported {} project(s), {} id(s) reassigned",
        report.imported.len(),
        report.reassigned_ids
    );
    Ok(())
}

fn run_list(args: &DbArgs) -> Result<()> {
    let conn = open_db(&args.db).with_context(|| format!("opening {}", args.db.display()))?;
    let store = OutlineStore::load(SqliteKeyValueRepository::try_new(&conn)?)?;
    let current = store.current_project_id();
    for project in store.projects() {
        let marker = if Some(project.id.as_str()) == current { "*" } else { " " };
        println!("{marker} {}  {}  ({} root items)", project.id, project.name, project.lists.len());
    }
    Ok(())
}

/// Writes the artifact into `dir`, creating the directory when needed.
fn deliver(artifact: &ExportArtifact, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(&artifact.file_name);
    fs::write(&path, &artifact.bytes).with_context(|| format!("writing {}", path.display()))?;
    info!(
        "event=artifact_write module=cli status=ok format={} bytes={}",
        artifact.format.extension(),
        artifact.bytes.len()
    );
    Ok(path)
}
